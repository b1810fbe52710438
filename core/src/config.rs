//! Vectorizer settings, optionally read from a TOML file.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use crate::error::ConfigError;
use crate::tokenizer::english_stop_words;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Terms seen in fewer documents than this are dropped.
    pub min_doc_freq: usize,
    /// Terms seen in more than this fraction of the corpus are dropped.
    pub max_doc_freq: f32,
    pub stop_words: HashSet<String>,
    pub stem: bool,
    /// Use `ln(1 + N/df)` instead of `ln(N/df)`.
    pub smoothed_idf: bool,
    /// Weigh term counts as `1 + ln(tf)` instead of the raw count.
    pub sublinear_tf: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            min_doc_freq: 1,
            max_doc_freq: 1.0,
            stop_words: english_stop_words(),
            stem: true,
            smoothed_idf: true,
            sublinear_tf: false,
        }
    }
}

impl IndexConfig {
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let s = std::fs::read_to_string(path).map_err(ConfigError::Read)?;
        let config: IndexConfig = toml::from_str(&s).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_doc_freq == 0 {
            return Err(ConfigError::Invalid("min_doc_freq must be at least 1".into()));
        }
        if !(self.max_doc_freq > 0.0 && self.max_doc_freq <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "max_doc_freq must be in (0, 1], got {}",
                self.max_doc_freq
            )));
        }
        Ok(())
    }

    /// SHA-1 over every setting that changes a fit. Stop words are hashed in
    /// sorted, lowercased form so set order does not matter.
    pub fn fingerprint(&self) -> String {
        let mut stop_words: Vec<String> = self.stop_words.iter().map(|w| w.to_lowercase()).collect();
        stop_words.sort_unstable();
        stop_words.dedup();

        let mut hasher = Sha1::new();
        hasher.update((self.min_doc_freq as u64).to_le_bytes());
        hasher.update(self.max_doc_freq.to_bits().to_le_bytes());
        hasher.update([self.stem as u8, self.smoothed_idf as u8, self.sublinear_tf as u8]);
        for w in &stop_words {
            hasher.update((w.len() as u64).to_le_bytes());
            hasher.update(w.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    /// Largest document frequency a term may have in a corpus of `n` documents.
    pub fn max_df_count(&self, n: usize) -> usize {
        // f32 fractions like 0.7 sit just below their decimal value
        (self.max_doc_freq as f64 * n as f64 + 1e-6).floor() as usize
    }
}
