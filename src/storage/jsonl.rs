use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// A stored review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub review_id: String,
    pub customer_id: String,
    pub provider_id: String,
    #[serde(default)]
    pub booking_id: Option<String>,
    pub rating: u8,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Result of [`ReviewStore::insert`]
#[derive(Debug)]
pub enum InsertOutcome {
    Stored(Review),
    /// The customer already reviewed this booking; nothing was written
    DuplicateBooking,
}

/// Append-only JSON-lines review store.
///
/// The whole file is loaded at startup; inserts append one line and then
/// update the in-memory copy under the write lock, so readers never observe
/// a review that failed to reach disk.
pub struct ReviewStore {
    path: Option<PathBuf>,
    reviews: RwLock<Vec<Review>>,
}

impl ReviewStore {
    /// Store without a backing file
    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self {
            path: None,
            reviews: RwLock::new(Vec::new()),
        }
    }

    /// Open (or create) the store at `path` and load every review in it
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create store directory {:?}", parent))?;
        }

        let reviews = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => Self::load(&raw, &path).await?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read review store {:?}", path));
            }
        };

        info!(path = %path.display(), count = reviews.len(), "Review store opened");

        Ok(Self {
            path: Some(path),
            reviews: RwLock::new(reviews),
        })
    }

    /// Parse the file contents. A final line without its newline is the mark
    /// of an interrupted append: it is kept if it parses and cut off if not.
    async fn load(raw: &str, path: &Path) -> Result<Vec<Review>> {
        let complete_len = if raw.ends_with('\n') {
            raw.len()
        } else {
            raw.rfind('\n').map_or(0, |i| i + 1)
        };
        let (complete, tail) = raw.split_at(complete_len);
        let mut reviews = Self::parse_lines(complete, path)?;

        if tail.is_empty() {
            return Ok(reviews);
        }

        match serde_json::from_str::<Review>(tail) {
            Ok(review) => {
                let mut file = tokio::fs::OpenOptions::new()
                    .append(true)
                    .open(path)
                    .await
                    .with_context(|| format!("Failed to open review store {:?}", path))?;
                file.write_all(b"\n").await?;
                file.flush().await?;
                reviews.push(review);
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    bytes = tail.len(),
                    error = %e,
                    "Dropping incomplete trailing review"
                );
                let file = tokio::fs::OpenOptions::new()
                    .write(true)
                    .open(path)
                    .await
                    .with_context(|| format!("Failed to open review store {:?}", path))?;
                file.set_len(complete_len as u64)
                    .await
                    .with_context(|| format!("Failed to truncate review store {:?}", path))?;
            }
        }

        Ok(reviews)
    }

    fn parse_lines(raw: &str, path: &Path) -> Result<Vec<Review>> {
        raw.lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(n, line)| {
                serde_json::from_str(line)
                    .with_context(|| format!("Corrupt review at {:?} line {}", path, n + 1))
            })
            .collect()
    }

    /// Start a request-scoped session on this store
    pub fn session(self: &Arc<Self>) -> StoreSession {
        debug!("Store session acquired");
        StoreSession {
            store: Arc::clone(self),
            opened_at: Instant::now(),
        }
    }

    /// Store `review` unless its author already reviewed the same booking.
    /// The check and the write happen under one write guard.
    pub async fn insert(&self, review: Review) -> Result<InsertOutcome> {
        let mut reviews = self.reviews.write().await;

        if let Some(booking_id) = review.booking_id.as_deref() {
            let taken = reviews.iter().any(|r| {
                r.customer_id == review.customer_id && r.booking_id.as_deref() == Some(booking_id)
            });
            if taken {
                return Ok(InsertOutcome::DuplicateBooking);
            }
        }

        if let Some(path) = &self.path {
            Self::append_line(path, &review).await?;
        }

        reviews.push(review.clone());
        Ok(InsertOutcome::Stored(review))
    }

    /// Append one review line, cutting the file back if the write fails midway
    async fn append_line(path: &Path, review: &Review) -> Result<()> {
        let mut line = serde_json::to_string(review)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .with_context(|| format!("Failed to open review store {:?}", path))?;
        let len_before = file.metadata().await?.len();

        let written = async {
            file.write_all(line.as_bytes()).await?;
            file.flush().await
        }
        .await;

        if let Err(e) = written {
            if let Err(rollback) = file.set_len(len_before).await {
                warn!(path = %path.display(), error = %rollback, "Failed to roll back partial review write");
            }
            return Err(e).with_context(|| format!("Failed to append to review store {:?}", path));
        }

        Ok(())
    }

    pub async fn get(&self, review_id: &str) -> Option<Review> {
        self.reviews
            .read()
            .await
            .iter()
            .find(|r| r.review_id == review_id)
            .cloned()
    }

    /// Reviews matching `filter`, newest first
    async fn select(&self, filter: impl Fn(&Review) -> bool) -> Vec<Review> {
        let mut found: Vec<Review> = self
            .reviews
            .read()
            .await
            .iter()
            .filter(|r| filter(r))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        found
    }

    pub async fn by_provider(&self, provider_id: &str) -> Vec<Review> {
        self.select(|r| r.provider_id == provider_id).await
    }

    pub async fn by_customer(&self, customer_id: &str) -> Vec<Review> {
        self.select(|r| r.customer_id == customer_id).await
    }

    pub async fn count(&self) -> usize {
        self.reviews.read().await.len()
    }
}

/// Store handle scoped to a single request; released when dropped
pub struct StoreSession {
    store: Arc<ReviewStore>,
    opened_at: Instant,
}

impl std::ops::Deref for StoreSession {
    type Target = ReviewStore;

    fn deref(&self) -> &ReviewStore {
        &self.store
    }
}

impl Drop for StoreSession {
    fn drop(&mut self) {
        debug!(elapsed_ms = self.opened_at.elapsed().as_millis() as u64, "Store session released");
    }
}
