use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{IndexError, LoadError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Unique within a corpus.
    pub name: String,
    pub content: String,
}

impl Document {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self { name: name.into(), content: content.into() }
    }
}

/// Load documents from a JSON array (or a single object), or from JSONL when the extension is `.jsonl`.
pub fn load_documents<P: AsRef<Path>>(path: P) -> Result<Vec<Document>> {
    let path = path.as_ref();
    let f = File::open(path).map_err(|e| IndexError::load(path, e))?;
    let reader = BufReader::new(f);

    let values = if path.extension().and_then(|s| s.to_str()) == Some("jsonl") {
        let mut values: Vec<serde_json::Value> = Vec::new();
        for line in reader.lines() {
            let line = line.map_err(|e| IndexError::load(path, e))?;
            if line.trim().is_empty() { continue; }
            values.push(serde_json::from_str(&line).map_err(|e| IndexError::load(path, e))?);
        }
        values
    } else {
        match serde_json::from_reader::<_, serde_json::Value>(reader).map_err(|e| IndexError::load(path, e))? {
            serde_json::Value::Array(arr) => arr,
            obj @ serde_json::Value::Object(_) => vec![obj],
            other => {
                let reason = format!("expected an array of documents, found {}", json_kind(&other));
                return Err(IndexError::load(path, LoadError::InvalidRecord { index: 0, reason }));
            }
        }
    };

    let docs = parse_documents(values).map_err(|e| IndexError::load(path, e))?;
    tracing::debug!(path = %path.display(), num_docs = docs.len(), "loaded documents");
    Ok(docs)
}

fn parse_documents(values: Vec<serde_json::Value>) -> std::result::Result<Vec<Document>, LoadError> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut docs = Vec::with_capacity(values.len());
    for (index, v) in values.into_iter().enumerate() {
        let doc: Document = serde_json::from_value(v)
            .map_err(|e| LoadError::InvalidRecord { index, reason: e.to_string() })?;
        if !seen.insert(doc.name.clone()) {
            return Err(LoadError::DuplicateName(doc.name));
        }
        docs.push(doc);
    }
    Ok(docs)
}

fn json_kind(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// SHA-1 over names and contents, in order. Ties a vector cache to the corpus it was fit on.
pub fn corpus_fingerprint(docs: &[Document]) -> String {
    let mut hasher = Sha1::new();
    for d in docs {
        hasher.update((d.name.len() as u64).to_le_bytes());
        hasher.update(d.name.as_bytes());
        hasher.update((d.content.len() as u64).to_le_bytes());
        hasher.update(d.content.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn loads_array_and_ignores_extra_fields() {
        let dir = tempdir().unwrap();
        let p = dir.path().join("docs.json");
        fs::write(&p, r#"[{"name":"A","content":"x","id":7},{"name":"B","content":"y"}]"#).unwrap();
        let docs = load_documents(&p).unwrap();
        assert_eq!(docs, vec![Document::new("A", "x"), Document::new("B", "y")]);
    }

    #[test]
    fn loads_jsonl_skipping_blank_lines() {
        let dir = tempdir().unwrap();
        let p = dir.path().join("docs.jsonl");
        fs::write(&p, "{\"name\":\"A\",\"content\":\"x\"}\n\n{\"name\":\"B\",\"content\":\"y\"}\n").unwrap();
        assert_eq!(load_documents(&p).unwrap().len(), 2);
    }

    #[test]
    fn missing_content_is_invalid_record() {
        let dir = tempdir().unwrap();
        let p = dir.path().join("docs.json");
        fs::write(&p, r#"[{"name":"A","content":"x"},{"name":"B"}]"#).unwrap();
        match load_documents(&p) {
            Err(IndexError::DataLoad { source: LoadError::InvalidRecord { index, .. }, .. }) => assert_eq!(index, 1),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let dir = tempdir().unwrap();
        let p = dir.path().join("docs.json");
        fs::write(&p, r#"[{"name":"A","content":"x"},{"name":"A","content":"y"}]"#).unwrap();
        assert!(matches!(
            load_documents(&p),
            Err(IndexError::DataLoad { source: LoadError::DuplicateName(_), .. })
        ));
    }

    #[test]
    fn scalar_json_is_rejected() {
        let dir = tempdir().unwrap();
        let p = dir.path().join("docs.json");
        fs::write(&p, "42").unwrap();
        assert!(matches!(load_documents(&p), Err(IndexError::DataLoad { .. })));
    }

    #[test]
    fn fingerprint_depends_on_order_and_boundaries() {
        let a = vec![Document::new("A", "x"), Document::new("B", "y")];
        let b = vec![Document::new("B", "y"), Document::new("A", "x")];
        let c = vec![Document::new("Ax", ""), Document::new("B", "y")];
        assert_eq!(corpus_fingerprint(&a), corpus_fingerprint(&a.clone()));
        assert_ne!(corpus_fingerprint(&a), corpus_fingerprint(&b));
        assert_ne!(corpus_fingerprint(&a), corpus_fingerprint(&c));
    }
}
