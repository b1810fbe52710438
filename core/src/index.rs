use serde::Serialize;
use std::cmp::Ordering;
use std::path::Path;

use crate::config::IndexConfig;
use crate::document::{corpus_fingerprint, load_documents, Document};
use crate::error::{IndexError, Result};
use crate::vectorizer::{cosine, TermVector, TfidfVectorizer};

pub const DEFAULT_TOP_K: usize = 6;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hit {
    pub document: Document,
    /// Cosine similarity in [0, 1].
    pub score: f32,
}

/// Hits sorted by descending score; equal scores keep corpus order.
pub type QueryResult = Vec<Hit>;

/// A TF-IDF index over a fixed corpus. The vectorizer fitted during build is
/// the only one ever used to transform queries against it.
#[derive(Debug, Clone)]
pub struct DocumentIndex {
    documents: Vec<Document>,
    vectorizer: TfidfVectorizer,
    vectors: Vec<TermVector>,
    fingerprint: String,
    config_fingerprint: String,
}

impl DocumentIndex {
    /// Fit over `documents`. An empty corpus is logged and produces an index
    /// that answers every query with an empty result.
    pub fn build(documents: Vec<Document>, config: &IndexConfig) -> Self {
        if documents.is_empty() {
            tracing::warn!(error = %IndexError::EmptyCorpus, "building empty index");
        }
        let contents: Vec<&str> = documents.iter().map(|d| d.content.as_str()).collect();
        let (vectorizer, vectors) = TfidfVectorizer::fit(&contents, config);
        let fingerprint = corpus_fingerprint(&documents);
        tracing::info!(num_docs = documents.len(), num_terms = vectorizer.vocabulary_len(), "built document index");
        Self { documents, vectorizer, vectors, fingerprint, config_fingerprint: config.fingerprint() }
    }

    /// Like [`DocumentIndex::build`] but refuses an empty corpus.
    pub fn try_build(documents: Vec<Document>, config: &IndexConfig) -> Result<Self> {
        if documents.is_empty() {
            return Err(IndexError::EmptyCorpus);
        }
        Ok(Self::build(documents, config))
    }

    /// Load documents from a JSON/JSONL source and build.
    pub fn open<P: AsRef<Path>>(path: P, config: &IndexConfig) -> Result<Self> {
        let documents = load_documents(path)?;
        Ok(Self::build(documents, config))
    }

    pub(crate) fn from_parts(
        documents: Vec<Document>,
        vectorizer: TfidfVectorizer,
        vectors: Vec<TermVector>,
        config_fingerprint: String,
    ) -> Self {
        let fingerprint = corpus_fingerprint(&documents);
        Self { documents, vectorizer, vectors, fingerprint, config_fingerprint }
    }

    /// Rank every document against `text` and keep the best `k`.
    pub fn query(&self, text: &str, k: usize) -> QueryResult {
        let k = k.min(self.documents.len());
        if k == 0 {
            return Vec::new();
        }
        let q = self.vectorizer.transform(text);
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, d)| (i, cosine(&q, d)))
            .collect();
        // stable: ties stay in corpus order
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored
            .into_iter()
            .take(k)
            .map(|(i, score)| Hit { document: self.documents[i].clone(), score })
            .collect()
    }

    pub fn search(&self, text: &str) -> QueryResult {
        self.query(text, DEFAULT_TOP_K)
    }

    pub fn len(&self) -> usize { self.documents.len() }

    pub fn is_empty(&self) -> bool { self.documents.is_empty() }

    pub fn documents(&self) -> &[Document] { &self.documents }

    pub fn get(&self, name: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.name == name)
    }

    pub fn vectorizer(&self) -> &TfidfVectorizer { &self.vectorizer }

    pub fn vectors(&self) -> &[TermVector] { &self.vectors }

    pub fn vocabulary_len(&self) -> usize { self.vectorizer.vocabulary_len() }

    pub fn fingerprint(&self) -> &str { &self.fingerprint }

    /// Fingerprint of the [`IndexConfig`] this index was fit with.
    pub fn config_fingerprint(&self) -> &str { &self.config_fingerprint }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs(items: &[(&str, &str)]) -> Vec<Document> {
        items.iter().map(|(n, c)| Document::new(*n, *c)).collect()
    }

    #[test]
    fn budget_report_scenario() {
        let index = DocumentIndex::build(
            docs(&[("A", "quarterly budget report"), ("B", "team meeting notes")]),
            &IndexConfig::default(),
        );
        let hits = index.query("budget report", DEFAULT_TOP_K);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].document.name, "A");
        assert!(hits[0].score > hits[1].score);
        assert!(hits[0].score > 0.0);
    }

    #[test]
    fn empty_corpus_answers_empty() {
        let index = DocumentIndex::build(Vec::new(), &IndexConfig::default());
        assert!(index.is_empty());
        assert!(index.query("anything", 6).is_empty());
        assert!(matches!(
            DocumentIndex::try_build(Vec::new(), &IndexConfig::default()),
            Err(IndexError::EmptyCorpus)
        ));
    }

    #[test]
    fn ties_keep_corpus_order() {
        let index = DocumentIndex::build(
            docs(&[("first", "alpha"), ("second", "beta"), ("third", "alpha")]),
            &IndexConfig::default(),
        );
        let names: Vec<String> = index.query("alpha", 3).into_iter().map(|h| h.document.name).collect();
        assert_eq!(names, vec!["first", "third", "second"]);
        // nothing matches: every score is 0 and order is the corpus order
        let names: Vec<String> = index.query("zzz", 3).into_iter().map(|h| h.document.name).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[test]
    fn k_is_clamped() {
        let index = DocumentIndex::build(docs(&[("a", "x"), ("b", "y")]), &IndexConfig::default());
        assert_eq!(index.query("x", 10).len(), 2);
        assert_eq!(index.query("x", 1).len(), 1);
        assert!(index.query("x", 0).is_empty());
    }

    #[test]
    fn lookup_by_name() {
        let index = DocumentIndex::build(docs(&[("a", "x")]), &IndexConfig::default());
        assert_eq!(index.get("a").map(|d| d.content.as_str()), Some("x"));
        assert!(index.get("b").is_none());
    }
}
