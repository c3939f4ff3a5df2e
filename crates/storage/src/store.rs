use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;
use indexmap::IndexMap;
use intel_core::{EnrichedItem, RawItem};
use intel_ingest::{IngestError, Persistence};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::article::{ArticleQuery, StoredArticle};
use crate::error::StorageError;

pub const ARTICLES_FILE: &str = "articles.jsonl";

/// Dedup key for an item: hex SHA-256 of its normalized URL.
pub fn dedup_key(item: &RawItem) -> String {
    let digest = Sha256::digest(item.normalized_url().as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[derive(Default)]
struct Inner {
    /// Insertion order is id order.
    articles: IndexMap<u64, StoredArticle>,
    by_key: HashMap<String, u64>,
    next_id: u64,
}

impl Inner {
    fn insert(&mut self, article: StoredArticle) {
        self.next_id = self.next_id.max(article.id + 1);
        self.by_key.insert(article.key.clone(), article.id);
        self.articles.insert(article.id, article);
    }
}

/// JSONL-backed article store. Writers are serialized by the lock; the
/// file is appended on insert and rewritten on delete.
pub struct ArticleStore {
    path: PathBuf,
    inner: RwLock<Inner>,
}

impl ArticleStore {
    /// Open (or create) the store under `data_dir`.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir)?;
        let path = data_dir.join(ARTICLES_FILE);
        let inner = load(&path)?;
        info!(
            path = %path.display(),
            articles = inner.articles.len(),
            "article store opened"
        );
        Ok(Self {
            path,
            inner: RwLock::new(inner),
        })
    }

    pub fn from_config(config: &intel_core::Config) -> Result<Self, StorageError> {
        Self::open(&config.storage.data_dir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>, StorageError> {
        self.inner.read().map_err(|_| StorageError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>, StorageError> {
        self.inner.write().map_err(|_| StorageError::Poisoned)
    }

    /// Store `item` unless an article with the same URL exists. Returns
    /// whether it was newly added.
    pub fn insert(&self, item: &EnrichedItem) -> Result<bool, StorageError> {
        item.item.validate()?;
        let key = dedup_key(&item.item);

        let mut inner = self.write()?;
        if inner.by_key.contains_key(&key) {
            return Ok(false);
        }

        let article = StoredArticle {
            id: inner.next_id,
            key,
            ingested_at: Utc::now(),
            item: item.clone(),
        };

        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut line = serde_json::to_string(&article)?;
        line.push('\n');
        file.write_all(line.as_bytes())?;

        inner.insert(article);
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.read().map(|i| i.articles.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Matching articles, newest first.
    pub fn query(&self, query: &ArticleQuery) -> Result<Vec<StoredArticle>, StorageError> {
        let inner = self.read()?;
        let mut hits: Vec<&StoredArticle> =
            inner.articles.values().filter(|a| query.matches(a)).collect();
        hits.sort_by(|a, b| b.sort_date().cmp(&a.sort_date()).then(b.id.cmp(&a.id)));
        Ok(hits
            .into_iter()
            .take(query.effective_limit())
            .cloned()
            .collect())
    }

    /// Distinct non-empty categories, sorted.
    pub fn categories(&self) -> Result<Vec<String>, StorageError> {
        let inner = self.read()?;
        let mut categories: Vec<String> = inner
            .articles
            .values()
            .map(|a| a.category().trim())
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();
        categories.sort();
        categories.dedup();
        Ok(categories)
    }

    /// Keyword search over title, summary, analysis and signals. Articles
    /// matching more terms rank first; ties go to the newest.
    pub fn search(&self, text: &str, limit: usize) -> Result<Vec<StoredArticle>, StorageError> {
        let terms = search_terms(text);
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let inner = self.read()?;
        let mut scored: Vec<(usize, &StoredArticle)> = inner
            .articles
            .values()
            .filter_map(|a| {
                let haystack = searchable_text(a);
                let score = terms.iter().filter(|t| haystack.contains(t.as_str())).count();
                (score > 0).then_some((score, a))
            })
            .collect();
        scored.sort_by(|(sa, a), (sb, b)| {
            sb.cmp(sa)
                .then(b.sort_date().cmp(&a.sort_date()))
                .then(b.id.cmp(&a.id))
        });
        Ok(scored.into_iter().take(limit).map(|(_, a)| a.clone()).collect())
    }

    /// Remove one article. Returns `false` if no such id.
    pub fn delete(&self, id: u64) -> Result<bool, StorageError> {
        let mut inner = self.write()?;
        let Some((index, _, removed)) = inner.articles.shift_remove_full(&id) else {
            return Ok(false);
        };
        inner.by_key.remove(&removed.key);
        if let Err(e) = rewrite(&self.path, inner.articles.values()) {
            // Put it back in its old slot so memory still matches the file.
            inner.by_key.insert(removed.key.clone(), id);
            inner.articles.shift_insert(index, id, removed);
            return Err(e);
        }
        info!(id, "article deleted");
        Ok(true)
    }

    /// Remove every article. Returns how many were removed.
    pub fn delete_all(&self) -> Result<usize, StorageError> {
        let mut inner = self.write()?;
        let count = inner.articles.len();
        rewrite(&self.path, std::iter::empty())?;
        inner.articles.clear();
        inner.by_key.clear();
        info!(count, "all articles deleted");
        Ok(count)
    }
}

#[async_trait]
impl Persistence for ArticleStore {
    async fn add_item(&self, item: &EnrichedItem) -> Result<bool, IngestError> {
        Ok(self.insert(item)?)
    }
}

fn load(path: &Path) -> Result<Inner, StorageError> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Inner::default()),
        Err(e) => return Err(e.into()),
    };

    let mut inner = Inner::default();
    for (lineno, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<StoredArticle>(&line) {
            Ok(article) => inner.insert(article),
            Err(e) => warn!(
                path = %path.display(),
                line = lineno + 1,
                error = %e,
                "skipping unreadable article line"
            ),
        }
    }
    Ok(inner)
}

/// Replace the file with `articles` via a temp file and rename.
fn rewrite<'a>(
    path: &Path,
    articles: impl Iterator<Item = &'a StoredArticle>,
) -> Result<(), StorageError> {
    let tmp = path.with_extension("jsonl.tmp");
    {
        let mut out = BufWriter::new(File::create(&tmp)?);
        for article in articles {
            serde_json::to_writer(&mut out, article)?;
            out.write_all(b"\n")?;
        }
        out.flush()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn search_terms(text: &str) -> Vec<String> {
    const STOPWORDS: &[&str] = &[
        "the", "and", "for", "what", "about", "with", "any", "are", "was", "were", "news",
        "latest", "articles", "there", "have", "has", "from", "this", "that", "show", "tell",
    ];
    let mut terms: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|t| t.chars().count() >= 3 && !STOPWORDS.contains(&t.as_str()))
        .collect();
    terms.sort();
    terms.dedup();
    terms
}

fn searchable_text(article: &StoredArticle) -> String {
    let item = &article.item;
    let mut text = format!("{} {} {}", item.item.title, item.item.summary, item.item.category);
    if let Some(analysis) = &item.analysis {
        text.push(' ');
        text.push_str(analysis);
    }
    for signal in &item.signals {
        text.push(' ');
        text.push_str(signal);
    }
    text.to_lowercase()
}
