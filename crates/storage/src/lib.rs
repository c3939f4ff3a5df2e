//! File-backed article storage.
//!
//! Articles live in `{data_dir}/articles.jsonl`, one JSON object per line.
//! The whole file is loaded into memory at open; appends go straight to the
//! file and deletes rewrite it.

pub mod article;
pub mod error;
pub mod store;

pub use article::{ArticleQuery, StoredArticle, DEFAULT_QUERY_LIMIT};
pub use error::StorageError;
pub use store::{dedup_key, ArticleStore, ARTICLES_FILE};
