use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, IndexError>;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("failed to load {}: {source}", path.display())]
    DataLoad { path: PathBuf, source: LoadError },

    #[error("failed to write {}: {source}", path.display())]
    Persist { path: PathBuf, source: LoadError },

    #[error("no documents to index")]
    EmptyCorpus,

    #[error("vectorizer mismatch: {0}")]
    VectorizerMismatch(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl IndexError {
    pub(crate) fn load(path: impl Into<PathBuf>, source: impl Into<LoadError>) -> Self {
        IndexError::DataLoad { path: path.into(), source: source.into() }
    }

    pub(crate) fn persist(path: impl Into<PathBuf>, source: impl Into<LoadError>) -> Self {
        IndexError::Persist { path: path.into(), source: source.into() }
    }
}

/// Why an external source could not be read or written.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed binary data: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("record {index}: {reason}")]
    InvalidRecord { index: usize, reason: String },

    #[error("duplicate document name: {0}")]
    DuplicateName(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}
