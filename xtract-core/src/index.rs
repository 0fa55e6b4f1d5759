//! Vector index over one embedding per corpus row.
//!
//! Row `i` of the index belongs to row `i` of the corpus. Scores are reported
//! in the index's own convention (see [`Metric`]) and never rescaled.

use std::path::Path;

use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};

use crate::corpus::{Corpus, RawRecord};
use crate::embeddings::Encoder;
use crate::error::{IndexError, LoadError};

/// Score convention of a flat index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Dot product, higher is more similar. Equals cosine similarity for
    /// unit-norm embeddings.
    #[default]
    InnerProduct,
    /// Squared euclidean distance, lower is more similar.
    L2,
}

impl Metric {
    pub fn higher_is_better(self) -> bool {
        matches!(self, Metric::InnerProduct)
    }

    fn score(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Metric::InnerProduct => a.iter().zip(b).map(|(x, y)| x * y).sum(),
            Metric::L2 => a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum(),
        }
    }
}

/// One nearest-neighbour hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub row: usize,
    pub score: f32,
}

/// Query interface of a nearest-neighbour index.
pub trait VectorIndex: Send + Sync {
    /// Return up to `k` nearest rows, best first.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, IndexError>;

    /// Number of indexed vectors.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Vector dimensionality.
    fn dimensions(&self) -> usize;

    fn metric(&self) -> Metric;
}

/// Exhaustive-scan index over a dense row-major matrix.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    data: Vec<f32>,
    dims: usize,
    metric: Metric,
}

impl FlatIndex {
    /// Build from a row-major buffer of `rows * dims` floats.
    pub fn from_flat(data: Vec<f32>, dims: usize, metric: Metric) -> Result<Self, LoadError> {
        if dims == 0 {
            return Err(LoadError::Index {
                message: "embedding dimension must be non-zero".to_string(),
            });
        }
        if data.len() % dims != 0 {
            return Err(LoadError::Index {
                message: format!(
                    "buffer of {} floats is not a multiple of dimension {}",
                    data.len(),
                    dims
                ),
            });
        }
        Ok(Self { data, dims, metric })
    }

    /// Build from a list of equally sized rows.
    pub fn from_rows(rows: Vec<Vec<f32>>, metric: Metric) -> Result<Self, LoadError> {
        let dims = rows.first().map(Vec::len).unwrap_or(0);
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != dims) {
            return Err(LoadError::Index {
                message: format!("row {} has {} dimensions, expected {}", i, row.len(), dims),
            });
        }
        let data = rows.into_iter().flatten().collect();
        Self::from_flat(data, dims, metric)
    }

    /// Load a 2-D `.npy` embedding matrix.
    pub fn load_npy(path: &Path, metric: Metric) -> Result<Self, LoadError> {
        let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let (data, rows, dims) = parse_npy(&bytes).map_err(|message| LoadError::Matrix {
            path: path.to_path_buf(),
            message,
        })?;
        tracing::info!(path = %path.display(), rows, dims, "Loaded embedding matrix");
        Self::from_flat(data, dims, metric)
    }

    /// Encode every record's query text and index the results.
    pub async fn build(
        corpus: &Corpus,
        encoder: &dyn Encoder,
        metric: Metric,
        concurrency: usize,
    ) -> Result<Self, LoadError> {
        tracing::info!(
            records = corpus.len(),
            provider = encoder.provider_name(),
            "Building vector index from corpus"
        );
        let rows: Vec<Vec<f32>> = stream::iter(corpus.records())
            .map(|record| async move { encoder.encode(&query_text(record)).await })
            .buffered(concurrency.max(1))
            .try_collect()
            .await
            .map_err(|e| LoadError::Index {
                message: e.to_string(),
            })?;
        if rows.is_empty() {
            return Self::from_flat(Vec::new(), encoder.dimensions(), metric);
        }
        Self::from_rows(rows, metric)
    }

    fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.dims..(i + 1) * self.dims]
    }
}

impl VectorIndex for FlatIndex {
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, IndexError> {
        if query.len() != self.dims {
            return Err(IndexError::DimensionMismatch {
                expected: self.dims,
                got: query.len(),
            });
        }

        let mut hits: Vec<Neighbor> = (0..self.len())
            .map(|row| Neighbor {
                row,
                score: self.metric.score(query, self.row(row)),
            })
            .collect();

        // Stable sort keeps row order for ties.
        if self.metric.higher_is_better() {
            hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        } else {
            hits.sort_by(|a, b| a.score.total_cmp(&b.score));
        }
        hits.truncate(k);
        Ok(hits)
    }

    fn len(&self) -> usize {
        self.data.len() / self.dims
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn metric(&self) -> Metric {
        self.metric
    }
}

/// The text a record is embedded from: `"<title>. <abstract>"`.
pub fn query_text(record: &RawRecord) -> String {
    format!(
        "{}. {}",
        record.field("title").unwrap_or(""),
        record.field("abstract").unwrap_or("")
    )
}

const NPY_MAGIC: &[u8] = b"\x93NUMPY";

/// Parse a little-endian, C-order, 2-D float32/float64 `.npy` buffer.
fn parse_npy(bytes: &[u8]) -> Result<(Vec<f32>, usize, usize), String> {
    if bytes.len() < 10 || &bytes[..6] != NPY_MAGIC {
        return Err("not an .npy file".to_string());
    }
    let major = bytes[6];
    let (header_len, header_start) = match major {
        1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
        2 | 3 => {
            if bytes.len() < 12 {
                return Err("truncated header".to_string());
            }
            (
                u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize,
                12,
            )
        }
        v => return Err(format!("unsupported .npy version {}", v)),
    };
    let data_start = header_start + header_len;
    let header = bytes
        .get(header_start..data_start)
        .and_then(|h| std::str::from_utf8(h).ok())
        .ok_or_else(|| "truncated or non-UTF-8 header".to_string())?;

    let descr = header_value(header, "descr").ok_or("header has no 'descr'")?;
    let width = match descr.trim_matches(|c: char| c == '\'' || c == '"') {
        "<f4" | "f4" | "=f4" => 4,
        "<f8" | "f8" | "=f8" => 8,
        other => return Err(format!("unsupported dtype {}", other)),
    };
    let fortran = header_value(header, "fortran_order").ok_or("header has no 'fortran_order'")?;
    if fortran.trim() != "False" {
        return Err("Fortran-ordered arrays are not supported".to_string());
    }
    let shape = header_value(header, "shape").ok_or("header has no 'shape'")?;
    let dims: Vec<usize> = shape
        .trim_matches(|c: char| c == '(' || c == ')')
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<usize>().map_err(|e| format!("bad shape {}: {}", shape, e)))
        .collect::<Result<_, _>>()?;
    let [rows, cols] = dims[..] else {
        return Err(format!("expected a 2-D matrix, got shape {}", shape));
    };

    let payload = &bytes[data_start.min(bytes.len())..];
    let expected = rows
        .checked_mul(cols)
        .and_then(|n| n.checked_mul(width))
        .ok_or_else(|| format!("shape {} overflows", shape))?;
    if payload.len() < expected {
        return Err(format!(
            "payload has {} bytes, shape needs {}",
            payload.len(),
            expected
        ));
    }
    let data = if width == 4 {
        payload[..expected]
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    } else {
        payload[..expected]
            .chunks_exact(8)
            .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]) as f32)
            .collect()
    };
    Ok((data, rows, cols))
}

/// Extract the raw text of `key` from a numpy header dict literal.
fn header_value<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let needle_single = format!("'{}':", key);
    let needle_double = format!("\"{}\":", key);
    let start = header
        .find(&needle_single)
        .map(|i| i + needle_single.len())
        .or_else(|| header.find(&needle_double).map(|i| i + needle_double.len()))?;
    let rest = header[start..].trim_start();
    let end = if rest.starts_with('(') {
        rest.find(')').map(|i| i + 1)?
    } else {
        rest.find([',', '}']).unwrap_or(rest.len())
    };
    Some(rest[..end].trim())
}
