//! Property-based tests for core components using proptest.

use proptest::prelude::*;
use std::sync::Arc;

use xtract_core::embeddings::LocalEncoder;
use xtract_core::index::query_text;
use xtract_core::{
    normalize, Corpus, FlatIndex, IdentifierResolver, KeywordSearchEngine, Metric, RawRecord,
    SimilarityEngine, VectorIndex,
};

fn corpus_from(titles: &[String]) -> Arc<Corpus> {
    let records = titles
        .iter()
        .enumerate()
        .map(|(i, title)| {
            RawRecord::new(
                format!("p{}", i),
                [("title", title.clone()), ("abstract", format!("abstract {}", i))],
            )
        })
        .collect();
    Arc::new(Corpus::from_records(
        vec!["id".into(), "title".into(), "abstract".into()],
        records,
    ))
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

// --- Keyword search properties ---

proptest! {
    #[test]
    fn keyword_results_contain_query(
        titles in prop::collection::vec("[a-zA-Z ]{1,24}", 1..20),
        query in "[a-zA-Z]{1,3}",
        limit in 0usize..30,
    ) {
        let corpus = corpus_from(&titles);
        let engine = KeywordSearchEngine::new(corpus, &["title".to_string(), "abstract".to_string()]);
        let results = engine.search(&query, limit).unwrap();
        prop_assert!(results.len() <= limit);
        let needle = query.to_lowercase();
        for r in &results {
            let hay = format!("{} {}", r.paper.title, r.paper.abstract_text).to_lowercase();
            prop_assert!(hay.contains(&needle));
        }
    }

    #[test]
    fn keyword_results_keep_corpus_order(
        titles in prop::collection::vec("[ab ]{1,8}", 1..20),
    ) {
        let corpus = corpus_from(&titles);
        let engine = KeywordSearchEngine::new(corpus, &["title".to_string()]);
        let rows: Vec<usize> = engine
            .search("a", 100)
            .unwrap()
            .iter()
            .map(|r| r.paper.id[1..].parse().unwrap())
            .collect();
        prop_assert!(rows.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn whitespace_queries_are_rejected(query in "[ \t\n]{0,6}") {
        let engine = KeywordSearchEngine::new(corpus_from(&["x".to_string()]), &["title".to_string()]);
        prop_assert!(engine.search(&query, 10).is_err());
    }
}

// --- Identifier resolution properties ---

proptest! {
    #[test]
    fn resolving_a_resolved_id_is_stable(
        ids in prop::collection::vec("[a-z0-9./-]{1,12}", 1..15),
        pick in any::<prop::sample::Index>(),
    ) {
        let records = ids.iter().map(|id| RawRecord::new(id.clone(), [("title", "t")])).collect();
        let corpus = Arc::new(Corpus::from_records(vec!["id".into(), "title".into()], records));
        let resolver = IdentifierResolver::new(corpus.clone());

        let query = pick.get(&ids);
        let row = resolver.resolve(query).unwrap();
        let resolved_id = corpus.get(row).unwrap().id().to_string();
        prop_assert_eq!(resolver.resolve(&resolved_id).unwrap(), row);
    }

    #[test]
    fn exact_id_resolves_to_first_occurrence(
        ids in prop::collection::vec("[A-Z0-9]{1,6}", 1..15),
        pick in any::<prop::sample::Index>(),
    ) {
        let records = ids.iter().map(|id| RawRecord::new(id.clone(), [("title", "t")])).collect();
        let corpus = Arc::new(Corpus::from_records(vec!["id".into(), "title".into()], records));
        let resolver = IdentifierResolver::new(corpus);

        let query = pick.get(&ids);
        let first = ids.iter().position(|id| id == query).unwrap();
        prop_assert_eq!(resolver.resolve(query).unwrap(), first);
    }
}

// --- Normalization properties ---

proptest! {
    #[test]
    fn normalized_record_is_fully_populated(
        title in prop::option::of("[a-zA-Z ]{1,20}"),
        citations in prop::option::of("[0-9.\\-a-z]{1,6}"),
    ) {
        let mut fields = Vec::new();
        if let Some(t) = &title {
            fields.push(("title", t.clone()));
        }
        if let Some(c) = &citations {
            fields.push(("citations", c.clone()));
        }
        let paper = normalize(&RawRecord::new("", fields), None);
        prop_assert_eq!(paper.id.as_str(), "unknown");
        prop_assert!(!paper.title.is_empty());
        prop_assert!(!paper.authors.is_empty());
        prop_assert!(!paper.update_date.is_empty());
        prop_assert!(!paper.journal.is_empty());
    }
}

// --- Similarity properties ---

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn recommend_never_returns_self(
        titles in prop::collection::vec("[a-z]{2,6}( [a-z]{2,6}){0,4}", 2..12),
        pick in any::<prop::sample::Index>(),
        top_k in 0usize..15,
    ) {
        let corpus = corpus_from(&titles);
        let encoder = LocalEncoder::new(32);
        let rows = corpus
            .records()
            .iter()
            .map(|r| encoder.encode_text(&query_text(r)))
            .collect();
        let index = FlatIndex::from_rows(rows, Metric::InnerProduct).unwrap();
        let resolver = Arc::new(IdentifierResolver::new(corpus.clone()));
        let engine = SimilarityEngine::new(
            corpus.clone(),
            resolver,
            Box::new(index),
            Box::new(encoder),
        )
        .unwrap();

        let target = format!("p{}", pick.index(titles.len()));
        let results = runtime().block_on(engine.recommend(&target, top_k)).unwrap();
        prop_assert!(results.len() <= top_k);
        prop_assert!(results.len() <= titles.len() - 1);
        prop_assert!(results.iter().all(|r| r.paper.id != target));
    }

    #[test]
    fn flat_index_scores_sorted(
        rows in prop::collection::vec(prop::collection::vec(-1.0f32..1.0, 4), 1..20),
        query in prop::collection::vec(-1.0f32..1.0, 4),
        l2 in any::<bool>(),
    ) {
        let metric = if l2 { Metric::L2 } else { Metric::InnerProduct };
        let index = FlatIndex::from_rows(rows.clone(), metric).unwrap();
        let hits = index.search(&query, rows.len()).unwrap();
        prop_assert_eq!(hits.len(), rows.len());
        let ordered = hits.windows(2).all(|w| {
            if l2 { w[0].score <= w[1].score } else { w[0].score >= w[1].score }
        });
        prop_assert!(ordered);
    }
}
