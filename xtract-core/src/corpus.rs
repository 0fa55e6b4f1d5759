//! In-memory, read-only paper corpus loaded from a CSV dataset.
//!
//! Column names are canonicalized (trimmed, lower-cased) at load time so the
//! rest of the crate can look fields up by their lower-case name. Empty cells
//! are dropped, which lets the normalizer treat "missing column" and "empty
//! cell" identically.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use csv::ReaderBuilder;

use crate::error::LoadError;

/// Name of the canonical identifier column.
pub const ID_COLUMN: &str = "id";

/// One row of the dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    id: String,
    fields: HashMap<String, String>,
}

impl RawRecord {
    /// Build a record from an id and `(column, value)` pairs. Empty values are
    /// ignored.
    pub fn new<K, V>(id: impl Into<String>, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let fields = fields
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(_, v)| !v.trim().is_empty())
            .collect();
        Self {
            id: id.into(),
            fields,
        }
    }

    /// The canonical identifier. Never empty for records owned by a [`Corpus`].
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Value of a column, or `None` if the column is absent or the cell empty.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// First present value among `names`.
    pub fn first_field(&self, names: &[&str]) -> Option<&str> {
        names.iter().find_map(|name| self.field(name))
    }
}

/// How the identifier column was chosen at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdSource {
    /// The dataset has a canonical `id` column.
    Canonical,
    /// A column whose name contains `arxiv` or `id` was used.
    Inferred(String),
    /// No candidate column; ids were synthesized as `paper_<row>`.
    Synthesized,
}

/// The loaded corpus. Immutable after construction.
#[derive(Debug, Clone)]
pub struct Corpus {
    columns: Vec<String>,
    records: Vec<RawRecord>,
    id_source: IdSource,
}

impl Corpus {
    /// Load a corpus from a CSV file on disk.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let corpus = Self::from_reader(file)?;
        tracing::info!(
            path = %path.display(),
            records = corpus.len(),
            columns = corpus.columns.len(),
            "Loaded corpus"
        );
        Ok(corpus)
    }

    /// Load a corpus from any CSV source with a header row.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, LoadError> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_reader(reader);

        let columns: Vec<String> = rdr
            .headers()
            .map_err(csv_error)?
            .iter()
            .map(canonical_column)
            .collect();
        if columns.iter().all(|c| c.is_empty()) {
            return Err(LoadError::Csv {
                message: "missing header row".to_string(),
            });
        }

        let id_source = infer_id_source(&columns);
        let id_col = match &id_source {
            IdSource::Canonical => columns.iter().position(|c| c == ID_COLUMN),
            IdSource::Inferred(name) => columns.iter().position(|c| c == name),
            IdSource::Synthesized => None,
        };
        match &id_source {
            IdSource::Canonical => {}
            IdSource::Inferred(name) => {
                tracing::warn!(column = %name, "No 'id' column, using inferred identifier column")
            }
            IdSource::Synthesized => {
                tracing::warn!("No identifier column found, synthesizing paper_<row> ids")
            }
        }

        let mut records = Vec::new();
        for (row, result) in rdr.records().enumerate() {
            let rec = result.map_err(csv_error)?;
            let mut fields = HashMap::with_capacity(columns.len());
            for (col, value) in columns.iter().zip(rec.iter()) {
                if col.is_empty() || value.trim().is_empty() {
                    continue;
                }
                // Keep the first occurrence of a duplicated column name.
                fields
                    .entry(col.clone())
                    .or_insert_with(|| value.to_string());
            }

            let id = id_col
                .and_then(|i| rec.get(i))
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("paper_{}", row));
            fields.insert(ID_COLUMN.to_string(), id.clone());

            records.push(RawRecord { id, fields });
        }

        Ok(Self {
            columns,
            records,
            id_source,
        })
    }

    /// Build a corpus directly from records (ids are taken as given).
    pub fn from_records(columns: Vec<String>, records: Vec<RawRecord>) -> Self {
        Self {
            columns,
            records,
            id_source: IdSource::Canonical,
        }
    }

    /// All records in original order.
    pub fn records(&self) -> &[RawRecord] {
        &self.records
    }

    pub fn get(&self, row: usize) -> Option<&RawRecord> {
        self.records.get(row)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Canonical column names in header order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn id_source(&self) -> &IdSource {
        &self.id_source
    }

    /// Fail unless at least one of `required` is a column of this corpus.
    pub fn require_any_column(&self, required: &[String]) -> Result<(), LoadError> {
        if required.iter().any(|name| self.has_column(name)) {
            Ok(())
        } else {
            Err(LoadError::MissingColumns {
                expected: required.join(", "),
            })
        }
    }
}

fn canonical_column(name: &str) -> String {
    name.trim().trim_start_matches('\u{feff}').to_lowercase()
}

fn csv_error(err: csv::Error) -> LoadError {
    LoadError::Csv {
        message: err.to_string(),
    }
}

/// Pick the identifier column: `id` if present, else the first column whose
/// name contains `arxiv` or `id`.
fn infer_id_source(columns: &[String]) -> IdSource {
    if columns.iter().any(|c| c == ID_COLUMN) {
        return IdSource::Canonical;
    }
    columns
        .iter()
        .find(|c| c.contains("arxiv") || c.contains("id"))
        .map(|c| IdSource::Inferred(c.clone()))
        .unwrap_or(IdSource::Synthesized)
}
