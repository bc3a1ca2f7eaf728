//! Single-owner access control.
//!
//! The bot serves exactly one Telegram user. Until someone is registered,
//! the first sender claims the bot; after that everyone else is ignored.
//! The claim is written to an env-style file so it survives restarts.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::core::config;
use crate::core::error::AppResult;

/// Durable storage for the owner id
#[async_trait]
pub trait OwnerStore: Send + Sync {
    async fn save(&self, owner_id: i64) -> AppResult<()>;
}

/// Writes `KEY=<id>` into an env file, replacing an existing `KEY=` line or
/// appending one. The file is created if it does not exist.
#[derive(Debug, Clone)]
pub struct EnvFileOwnerStore {
    path: PathBuf,
    key: String,
}

impl EnvFileOwnerStore {
    pub fn new(path: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            key: key.into(),
        }
    }

    pub fn from_config() -> Self {
        Self::new(
            config::telegram::OWNER_ENV_FILE.as_str(),
            config::telegram::OWNER_ENV_KEY,
        )
    }
}

/// Replace the first `key=` line, or append one
pub fn upsert_env_line(content: &str, key: &str, value: &str) -> String {
    let prefix = format!("{}=", key);
    let entry = format!("{}{}", prefix, value);
    let mut replaced = false;

    let mut lines: Vec<String> = content
        .lines()
        .map(|line| {
            if !replaced && line.starts_with(&prefix) {
                replaced = true;
                entry.clone()
            } else {
                line.to_string()
            }
        })
        .collect();
    if !replaced {
        lines.push(entry);
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

#[async_trait]
impl OwnerStore for EnvFileOwnerStore {
    async fn save(&self, owner_id: i64) -> AppResult<()> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };
        let updated = upsert_env_line(&content, &self.key, &owner_id.to_string());
        tokio::fs::write(&self.path, updated).await?;
        log::info!("Saved owner {} to {}", owner_id, self.path.display());
        Ok(())
    }
}

/// Result of checking a sender against the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorization {
    /// Nobody owned the bot; this sender now does
    Claimed,
    Owner,
    Denied,
}

impl Authorization {
    pub fn is_allowed(self) -> bool {
        !matches!(self, Authorization::Denied)
    }
}

/// The single owner id, guarded for read-test-and-set.
pub struct OwnerRegistry {
    owner: Mutex<Option<i64>>,
    store: Arc<dyn OwnerStore>,
}

impl OwnerRegistry {
    pub fn new(initial: Option<i64>, store: Arc<dyn OwnerStore>) -> Self {
        Self {
            owner: Mutex::new(initial),
            store,
        }
    }

    pub async fn current_owner(&self) -> Option<i64> {
        *self.owner.lock().await
    }

    /// Claim ownership for `user_id` if nobody holds it. Returns whether this
    /// call made the claim.
    pub async fn try_claim(&self, user_id: i64) -> bool {
        let mut owner = self.owner.lock().await;
        if owner.is_some() {
            return false;
        }
        *owner = Some(user_id);
        self.persist(user_id).await;
        true
    }

    /// Check a sender, claiming the bot for them when it is unowned.
    pub async fn authorize(&self, user_id: i64) -> Authorization {
        let mut owner = self.owner.lock().await;
        match *owner {
            Some(id) if id == user_id => Authorization::Owner,
            Some(_) => Authorization::Denied,
            None => {
                *owner = Some(user_id);
                self.persist(user_id).await;
                Authorization::Claimed
            }
        }
    }

    /// Best effort: a failed write keeps the in-memory claim
    async fn persist(&self, user_id: i64) {
        log::info!("Owner registered: {}", user_id);
        if let Err(e) = self.store.save(user_id).await {
            log::error!("Failed to persist owner {}: {}", user_id, e);
        }
    }
}
