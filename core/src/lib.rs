//! TF-IDF document similarity: fit once over a fixed corpus, then rank
//! documents against free-text queries by cosine similarity.

pub mod config;
pub mod document;
pub mod error;
pub mod handle;
pub mod index;
pub mod persist;
pub mod tokenizer;
pub mod vectorizer;

pub use config::IndexConfig;
pub use document::{load_documents, Document};
pub use error::{ConfigError, IndexError, LoadError, Result};
pub use handle::IndexHandle;
pub use index::{DocumentIndex, Hit, QueryResult, DEFAULT_TOP_K};
pub use vectorizer::{TermId, TermVector, TfidfVectorizer};
