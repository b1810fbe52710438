//! TF-IDF fitting and transformation.
//!
//! Weights are `tf * idf`, with `idf = ln(1 + N/df)` when smoothing is on and
//! `ln(N/df)` otherwise. `tf` is the raw count, or `1 + ln(count)` with
//! `sublinear_tf`. `N` and `df` are frozen at fit time and reused
//! for every later `transform`, so indexed vectors and query vectors always
//! share one set of statistics.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::IndexConfig;
use crate::tokenizer::Tokenizer;

pub type TermId = u32;

/// Sparse TF-IDF weights, sorted by term id, zeros omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TermVector {
    entries: Vec<(TermId, f32)>,
    norm: f32,
}

impl TermVector {
    pub fn from_entries(mut entries: Vec<(TermId, f32)>) -> Self {
        entries.retain(|(_, w)| *w > 0.0);
        entries.sort_by_key(|(tid, _)| *tid);
        let norm = entries.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
        Self { entries, norm }
    }

    /// Rebuild from a dense row; index is the term id.
    pub fn from_dense(row: &[f32]) -> Self {
        Self::from_entries(row.iter().enumerate().map(|(i, w)| (i as TermId, *w)).collect())
    }

    pub fn to_dense(&self, dim: usize) -> Vec<f32> {
        let mut row = vec![0.0; dim];
        for (tid, w) in &self.entries {
            if let Some(slot) = row.get_mut(*tid as usize) { *slot = *w; }
        }
        row
    }

    pub fn entries(&self) -> &[(TermId, f32)] { &self.entries }

    pub fn norm(&self) -> f32 { self.norm }

    pub fn is_zero(&self) -> bool { self.entries.is_empty() }

    pub fn dot(&self, other: &TermVector) -> f32 {
        let (mut i, mut j, mut acc) = (0, 0, 0.0f32);
        while i < self.entries.len() && j < other.entries.len() {
            let (ta, wa) = self.entries[i];
            let (tb, wb) = other.entries[j];
            match ta.cmp(&tb) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    acc += wa * wb;
                    i += 1;
                    j += 1;
                }
            }
        }
        acc
    }
}

/// Cosine similarity in [0, 1]; 0 when either vector is all-zero.
pub fn cosine(a: &TermVector, b: &TermVector) -> f32 {
    if a.norm == 0.0 || b.norm == 0.0 {
        return 0.0;
    }
    (a.dot(b) / (a.norm * b.norm)).clamp(0.0, 1.0)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    tokenizer: Tokenizer,
    vocabulary: HashMap<String, TermId>,
    /// Indexed by term id.
    terms: Vec<String>,
    df: Vec<u32>,
    idf: Vec<f32>,
    num_docs: u32,
    smoothed_idf: bool,
    sublinear_tf: bool,
}

impl TfidfVectorizer {
    /// Fit on `contents` and return the fitted vectorizer with one vector per input, in order.
    pub fn fit<S: AsRef<str>>(contents: &[S], config: &IndexConfig) -> (Self, Vec<TermVector>) {
        let tokenizer = Tokenizer::from_config(config);
        let n = contents.len();

        let mut tf_per_doc: Vec<HashMap<String, u32>> = Vec::with_capacity(n);
        let mut df_raw: HashMap<String, u32> = HashMap::new();
        for text in contents {
            let mut tf: HashMap<String, u32> = HashMap::new();
            for (term, _pos) in tokenizer.tokenize(text.as_ref()) {
                *tf.entry(term).or_insert(0) += 1;
            }
            for term in tf.keys() {
                *df_raw.entry(term.clone()).or_insert(0) += 1;
            }
            tf_per_doc.push(tf);
        }

        let min_df = config.min_doc_freq.max(1);
        let max_df = config.max_df_count(n);
        if n > 0 && max_df < min_df {
            tracing::warn!(min_df, max_df, num_docs = n, "document-frequency bounds exclude every term");
        }
        let mut terms: Vec<String> = df_raw
            .iter()
            .filter(|&(_, &df)| (df as usize) >= min_df && (df as usize) <= max_df)
            .map(|(t, _)| t.clone())
            .collect();
        // Lexicographic ids keep a fit deterministic.
        terms.sort_unstable();

        let vocabulary: HashMap<String, TermId> =
            terms.iter().enumerate().map(|(i, t)| (t.clone(), i as TermId)).collect();
        let df: Vec<u32> = terms.iter().map(|t| df_raw[t]).collect();
        let num_docs = n as u32;
        let idf: Vec<f32> = df.iter().map(|&d| idf_weight(num_docs, d, config.smoothed_idf)).collect();

        let vectorizer = Self {
            tokenizer,
            vocabulary,
            terms,
            df,
            idf,
            num_docs,
            smoothed_idf: config.smoothed_idf,
            sublinear_tf: config.sublinear_tf,
        };
        let vectors = tf_per_doc.into_iter().map(|tf| vectorizer.weigh(tf)).collect();
        tracing::debug!(num_docs = n, num_terms = vectorizer.terms.len(), "fitted vectorizer");
        (vectorizer, vectors)
    }

    /// Vectorize text against the fitted vocabulary; unknown terms are ignored.
    pub fn transform(&self, text: &str) -> TermVector {
        let mut tf: HashMap<String, u32> = HashMap::new();
        for (term, _pos) in self.tokenizer.tokenize(text) {
            if self.vocabulary.contains_key(&term) {
                *tf.entry(term).or_insert(0) += 1;
            }
        }
        self.weigh(tf)
    }

    fn weigh(&self, tf_raw: HashMap<String, u32>) -> TermVector {
        let entries = tf_raw
            .into_iter()
            .filter_map(|(term, count)| {
                let tid = *self.vocabulary.get(&term)?;
                let tf = match count {
                    0 => 0.0,
                    c if self.sublinear_tf => 1.0 + (c as f32).ln(),
                    c => c as f32,
                };
                Some((tid, tf * self.idf[tid as usize]))
            })
            .collect();
        TermVector::from_entries(entries)
    }

    pub fn vocabulary_len(&self) -> usize { self.terms.len() }

    pub fn num_docs(&self) -> u32 { self.num_docs }

    pub fn term_id(&self, term: &str) -> Option<TermId> { self.vocabulary.get(term).copied() }

    pub fn term(&self, tid: TermId) -> Option<&str> { self.terms.get(tid as usize).map(String::as_str) }

    pub fn doc_freq(&self, tid: TermId) -> Option<u32> { self.df.get(tid as usize).copied() }

    pub fn idf(&self, tid: TermId) -> Option<f32> { self.idf.get(tid as usize).copied() }

    pub fn smoothed_idf(&self) -> bool { self.smoothed_idf }

    pub fn sublinear_tf(&self) -> bool { self.sublinear_tf }

    /// Structural self-check used after deserializing a cached vectorizer.
    pub(crate) fn is_consistent(&self) -> bool {
        self.terms.len() == self.df.len()
            && self.terms.len() == self.idf.len()
            && self.vocabulary.len() == self.terms.len()
            && self.terms.iter().enumerate().all(|(i, t)| self.vocabulary.get(t) == Some(&(i as TermId)))
    }
}

fn idf_weight(n: u32, df: u32, smoothed: bool) -> f32 {
    let ratio = (n.max(1) as f32) / (df.max(1) as f32);
    if smoothed { (1.0 + ratio).ln() } else { ratio.ln() }
}
