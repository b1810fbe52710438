//! On-disk vector cache. Rows are only trusted together with the vocabulary
//! they were produced by, the fingerprint of the corpus they came from, and
//! the fingerprint of the config they were fit with.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{create_dir_all, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::config::IndexConfig;
use crate::document::{corpus_fingerprint, Document};
use crate::error::{IndexError, LoadError, Result};
use crate::index::DocumentIndex;
use crate::vectorizer::{TermVector, TfidfVectorizer};

pub const CACHE_VERSION: u32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u32,
    pub num_terms: u32,
    pub fingerprint: String,
    pub config_fingerprint: String,
    pub created_at: String,
    pub version: u32,
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn vectors(&self) -> PathBuf { self.root.join("vectors.json") }
    pub fn vocabulary(&self) -> PathBuf { self.root.join("vocabulary.bin") }
    pub fn meta(&self) -> PathBuf { self.root.join("meta.json") }
}

/// Document name -> dense TF-IDF row, one slot per vocabulary term.
pub type VectorRows = BTreeMap<String, Vec<f32>>;

pub fn save_vectors(paths: &IndexPaths, rows: &VectorRows) -> Result<()> {
    let path = paths.vectors();
    let f = File::create(&path).map_err(|e| IndexError::persist(&path, e))?;
    let mut w = BufWriter::new(f);
    serde_json::to_writer_pretty(&mut w, rows).map_err(|e| IndexError::persist(&path, e))?;
    w.flush().map_err(|e| IndexError::persist(&path, e))?;
    Ok(())
}

pub fn load_vectors(paths: &IndexPaths) -> Result<VectorRows> {
    let path = paths.vectors();
    let f = File::open(&path).map_err(|e| IndexError::load(&path, e))?;
    serde_json::from_reader(BufReader::new(f)).map_err(|e| IndexError::load(&path, e))
}

pub fn save_vocabulary(paths: &IndexPaths, vectorizer: &TfidfVectorizer) -> Result<()> {
    let path = paths.vocabulary();
    let bytes = bincode::serialize(vectorizer).map_err(|e| IndexError::persist(&path, e))?;
    let mut f = File::create(&path).map_err(|e| IndexError::persist(&path, e))?;
    f.write_all(&bytes).map_err(|e| IndexError::persist(&path, e))?;
    Ok(())
}

pub fn load_vocabulary(paths: &IndexPaths) -> Result<TfidfVectorizer> {
    let path = paths.vocabulary();
    let mut f = File::open(&path).map_err(|e| IndexError::load(&path, e))?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf).map_err(|e| IndexError::load(&path, e))?;
    let vectorizer: TfidfVectorizer = bincode::deserialize(&buf).map_err(|e| IndexError::load(&path, e))?;
    if !vectorizer.is_consistent() {
        let reason = "vocabulary tables disagree in length or term ids".to_string();
        return Err(IndexError::load(&path, LoadError::InvalidRecord { index: 0, reason }));
    }
    Ok(vectorizer)
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    let path = paths.meta();
    let json = serde_json::to_string_pretty(meta).map_err(|e| IndexError::persist(&path, e))?;
    std::fs::write(&path, json).map_err(|e| IndexError::persist(&path, e))?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let path = paths.meta();
    let buf = std::fs::read_to_string(&path).map_err(|e| IndexError::load(&path, e))?;
    serde_json::from_str(&buf).map_err(|e| IndexError::load(&path, e))
}

/// Write vectors, the fitted vocabulary, and meta for `index`.
pub fn save_index(paths: &IndexPaths, index: &DocumentIndex) -> Result<MetaFile> {
    create_dir_all(&paths.root).map_err(|e| IndexError::persist(&paths.root, e))?;

    let dim = index.vocabulary_len();
    let rows: VectorRows = index
        .documents()
        .iter()
        .zip(index.vectors())
        .map(|(d, v)| (d.name.clone(), v.to_dense(dim)))
        .collect();
    save_vectors(paths, &rows)?;
    save_vocabulary(paths, index.vectorizer())?;

    let meta = MetaFile {
        num_docs: index.len() as u32,
        num_terms: dim as u32,
        fingerprint: index.fingerprint().to_string(),
        config_fingerprint: index.config_fingerprint().to_string(),
        created_at: time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| "".into()),
        version: CACHE_VERSION,
    };
    save_meta(paths, &meta)?;
    tracing::info!(root = %paths.root.display(), num_docs = meta.num_docs, num_terms = meta.num_terms, "saved vector cache");
    Ok(meta)
}

/// Rebuild an index for `documents` from a cache without refitting. The cache
/// must have been written for exactly this corpus and fit with `config`.
pub fn load_index(paths: &IndexPaths, documents: Vec<Document>, config: &IndexConfig) -> Result<DocumentIndex> {
    let meta = load_meta(paths)?;
    if meta.version != CACHE_VERSION {
        return Err(IndexError::VectorizerMismatch(format!(
            "cache version {} is not supported (expected {CACHE_VERSION})",
            meta.version
        )));
    }
    if meta.fingerprint != corpus_fingerprint(&documents) {
        return Err(IndexError::VectorizerMismatch("cache was built from a different corpus".into()));
    }
    let config_fingerprint = config.fingerprint();
    if meta.config_fingerprint != config_fingerprint {
        return Err(IndexError::VectorizerMismatch("cache was fit with different vectorizer settings".into()));
    }

    let vectorizer = load_vocabulary(paths)?;
    let dim = vectorizer.vocabulary_len();
    if vectorizer.num_docs() as usize != documents.len() || meta.num_terms as usize != dim {
        return Err(IndexError::VectorizerMismatch(format!(
            "vocabulary was fit on {} documents and {} terms, cache describes {} and {}",
            vectorizer.num_docs(),
            dim,
            documents.len(),
            meta.num_terms
        )));
    }

    let mut rows = load_vectors(paths)?;
    if rows.len() != documents.len() {
        return Err(IndexError::VectorizerMismatch(format!(
            "cache holds {} rows for {} documents",
            rows.len(),
            documents.len()
        )));
    }
    let mut vectors = Vec::with_capacity(documents.len());
    for d in &documents {
        let row = rows
            .remove(&d.name)
            .ok_or_else(|| IndexError::VectorizerMismatch(format!("no cached row for document {:?}", d.name)))?;
        if row.len() != dim {
            return Err(IndexError::VectorizerMismatch(format!(
                "row for {:?} has {} entries, vocabulary has {dim}",
                d.name,
                row.len()
            )));
        }
        vectors.push(TermVector::from_dense(&row));
    }

    tracing::info!(root = %paths.root.display(), num_docs = documents.len(), num_terms = dim, "loaded vector cache");
    Ok(DocumentIndex::from_parts(documents, vectorizer, vectors, config_fingerprint))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn corpus() -> Vec<Document> {
        vec![
            Document::new("A", "quarterly budget report"),
            Document::new("B", "team meeting notes"),
            Document::new("C", "budget meeting agenda"),
        ]
    }

    #[test]
    fn cached_index_ranks_like_fresh_one() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path().join("cache"));
        let fresh = DocumentIndex::build(corpus(), &IndexConfig::default());
        let meta = save_index(&paths, &fresh).unwrap();
        assert_eq!(meta.num_docs, 3);

        let cached = load_index(&paths, corpus(), &IndexConfig::default()).unwrap();
        for q in ["budget", "meeting notes", "nothing here"] {
            let a = fresh.query(q, 6);
            let b = cached.query(q, 6);
            let names_a: Vec<&str> = a.iter().map(|h| h.document.name.as_str()).collect();
            let names_b: Vec<&str> = b.iter().map(|h| h.document.name.as_str()).collect();
            assert_eq!(names_a, names_b);
            for (x, y) in a.iter().zip(&b) {
                assert!((x.score - y.score).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn vectors_file_maps_names_to_dense_rows() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        let index = DocumentIndex::build(corpus(), &IndexConfig::default());
        save_index(&paths, &index).unwrap();
        let rows = load_vectors(&paths).unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.values().all(|r| r.len() == index.vocabulary_len()));
    }

    #[test]
    fn different_corpus_is_a_mismatch() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        save_index(&paths, &DocumentIndex::build(corpus(), &IndexConfig::default())).unwrap();
        let mut other = corpus();
        other[1].content.push_str(" revised");
        assert!(matches!(load_index(&paths, other, &IndexConfig::default()), Err(IndexError::VectorizerMismatch(_))));
    }

    #[test]
    fn changed_config_is_a_mismatch() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        save_index(&paths, &DocumentIndex::build(corpus(), &IndexConfig::default())).unwrap();

        let stricter = IndexConfig { min_doc_freq: 2, ..IndexConfig::default() };
        assert!(matches!(load_index(&paths, corpus(), &stricter), Err(IndexError::VectorizerMismatch(_))));
        let unstemmed = IndexConfig { stem: false, ..IndexConfig::default() };
        assert!(matches!(load_index(&paths, corpus(), &unstemmed), Err(IndexError::VectorizerMismatch(_))));

        // refit under the new settings is accepted again
        save_index(&paths, &DocumentIndex::build(corpus(), &stricter)).unwrap();
        let cached = load_index(&paths, corpus(), &stricter).unwrap();
        assert_eq!(cached.config_fingerprint(), stricter.fingerprint());
        assert_eq!(cached.vocabulary_len(), 2);
    }

    #[test]
    fn truncated_row_is_a_mismatch() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        save_index(&paths, &DocumentIndex::build(corpus(), &IndexConfig::default())).unwrap();
        let mut rows = load_vectors(&paths).unwrap();
        rows.get_mut("B").unwrap().pop();
        save_vectors(&paths, &rows).unwrap();
        assert!(matches!(load_index(&paths, corpus(), &IndexConfig::default()), Err(IndexError::VectorizerMismatch(_))));
    }

    #[test]
    fn missing_or_corrupt_cache_is_data_load() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        assert!(matches!(load_index(&paths, corpus(), &IndexConfig::default()), Err(IndexError::DataLoad { .. })));

        save_index(&paths, &DocumentIndex::build(corpus(), &IndexConfig::default())).unwrap();
        std::fs::write(paths.vocabulary(), b"\x01\x02garbage").unwrap();
        assert!(matches!(load_index(&paths, corpus(), &IndexConfig::default()), Err(IndexError::DataLoad { .. })));
    }
}
