//! Account store for the command-line front end
//!
//! Accounts live in a TOML file as a list of `[[accounts]]` tables:
//!
//! ```toml
//! [[accounts]]
//! platform = "mastodon"
//! username = "alice"
//! token = "T1"
//! instance = "https://example.social"
//!
//! [[accounts]]
//! platform = "threads"
//! username = "bob"
//! token = "long-lived-token"
//! user_id = "17841400000"
//! image_url_override = "https://cdn.example/photo.jpg"
//! ```
//!
//! Entries are identified by their `platform:username` key. The engine
//! itself never touches this file; it only receives [`Account`] values.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result, SocialSyncError};
use crate::types::Account;

/// One `[[accounts]]` entry as written on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredAccount {
    pub platform: String,
    pub username: String,
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url_override: Option<String>,
}

impl StoredAccount {
    /// `platform:username`
    pub fn key(&self) -> String {
        format!("{}:{}", self.platform, self.username)
    }

    /// Convert into a validated [`Account`].
    pub fn to_account(&self) -> Result<Account> {
        let mut account = Account::new(&self.platform, &self.username, &self.token)?;
        account.instance = self.instance.clone();
        account.user_id = self.user_id.clone();
        account.image_url_override = self.image_url_override.clone();
        Ok(account)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct AccountsFile {
    #[serde(default)]
    accounts: Vec<StoredAccount>,
}

/// Accounts persisted in a TOML file
#[derive(Debug, Clone)]
pub struct AccountStore {
    path: PathBuf,
    accounts: Vec<StoredAccount>,
}

impl AccountStore {
    /// An empty store that will be saved to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            accounts: Vec::new(),
        }
    }

    /// Load the store from `path`. A missing file yields an empty store.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            tracing::debug!("No accounts file at {}", path.display());
            return Ok(Self::new(path));
        }

        let content = std::fs::read_to_string(&path).map_err(ConfigError::ReadError)?;
        let file: AccountsFile = toml::from_str(&content).map_err(ConfigError::ParseError)?;

        tracing::debug!(
            "Loaded {} account(s) from {}",
            file.accounts.len(),
            path.display()
        );

        Ok(Self {
            path,
            accounts: file.accounts,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the store back to its file, creating parent directories.
    pub fn save(&self) -> Result<()> {
        let write_error = |source| ConfigError::WriteError {
            path: self.path.display().to_string(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(write_error)?;
        }

        let file = AccountsFile {
            accounts: self.accounts.clone(),
        };
        let content = toml::to_string_pretty(&file).map_err(ConfigError::SerializeError)?;
        std::fs::write(&self.path, content).map_err(write_error)?;

        // Tokens are stored in plain text
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .map_err(write_error)?;
        }

        Ok(())
    }

    /// Insert an account, replacing an entry with the same key.
    pub fn upsert(&mut self, account: StoredAccount) {
        let key = account.key();
        match self.accounts.iter_mut().find(|a| a.key() == key) {
            Some(existing) => *existing = account,
            None => self.accounts.push(account),
        }
    }

    /// Remove the entry with `key`; returns whether one existed.
    pub fn remove(&mut self, key: &str) -> bool {
        let before = self.accounts.len();
        self.accounts.retain(|a| a.key() != key);
        self.accounts.len() != before
    }

    /// Keys in file order
    pub fn keys(&self) -> Vec<String> {
        self.accounts.iter().map(StoredAccount::key).collect()
    }

    pub fn entries(&self) -> &[StoredAccount] {
        &self.accounts
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Every stored account, validated
    pub fn to_accounts(&self) -> Result<Vec<Account>> {
        self.accounts.iter().map(StoredAccount::to_account).collect()
    }

    /// The accounts with the given keys, in the order requested. An empty
    /// selection means all accounts.
    pub fn select(&self, keys: &[String]) -> Result<Vec<Account>> {
        if keys.is_empty() {
            return self.to_accounts();
        }

        keys.iter()
            .map(|key| {
                self.accounts
                    .iter()
                    .find(|a| &a.key() == key)
                    .ok_or_else(|| {
                        SocialSyncError::InvalidInput(format!("Unknown account: {}", key))
                    })
                    .and_then(StoredAccount::to_account)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn stored(platform: &str, username: &str, token: &str) -> StoredAccount {
        StoredAccount {
            platform: platform.to_string(),
            username: username.to_string(),
            token: token.to_string(),
            instance: None,
            user_id: None,
            image_url_override: None,
        }
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = AccountStore::load(temp_dir.path().join("accounts.toml")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_load_parses_entries() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("accounts.toml");
        std::fs::write(
            &path,
            r#"
[[accounts]]
platform = "mastodon"
username = "alice"
token = "T1"
instance = "https://example.social"

[[accounts]]
platform = "threads"
username = "bob"
token = "T2"
user_id = "17841400000"
"#,
        )
        .unwrap();

        let store = AccountStore::load(&path).unwrap();
        assert_eq!(store.keys(), vec!["mastodon:alice", "threads:bob"]);

        let accounts = store.to_accounts().unwrap();
        assert_eq!(accounts[0].instance.as_deref(), Some("https://example.social"));
        assert_eq!(accounts[0].token(), "T1");
        assert_eq!(accounts[1].user_id.as_deref(), Some("17841400000"));
    }

    #[test]
    fn test_load_invalid_toml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("accounts.toml");
        std::fs::write(&path, "[[accounts]\nplatform = ").unwrap();

        let result = AccountStore::load(&path);
        assert!(matches!(result, Err(SocialSyncError::Config(_))));
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("accounts.toml");

        let mut store = AccountStore::new(&path);
        store.upsert(stored("bluesky", "user.bsky.social", "app-pass"));
        store.save().unwrap();

        let reloaded = AccountStore::load(&path).unwrap();
        assert_eq!(reloaded.entries(), store.entries());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_upsert_replaces_same_key() {
        let mut store = AccountStore::new("unused.toml");
        store.upsert(stored("mastodon", "alice", "old"));
        store.upsert(stored("pixelfed", "alice", "px"));
        store.upsert(stored("mastodon", "alice", "new"));

        assert_eq!(store.len(), 2);
        assert_eq!(store.entries()[0].token, "new");
    }

    #[test]
    fn test_remove() {
        let mut store = AccountStore::new("unused.toml");
        store.upsert(stored("mastodon", "alice", "T1"));

        assert!(store.remove("mastodon:alice"));
        assert!(!store.remove("mastodon:alice"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_select_in_requested_order() {
        let mut store = AccountStore::new("unused.toml");
        store.upsert(stored("mastodon", "alice", "T1"));
        store.upsert(stored("bluesky", "bob", "T2"));

        let selected = store
            .select(&["bluesky:bob".to_string(), "mastodon:alice".to_string()])
            .unwrap();
        let keys: Vec<String> = selected.iter().map(Account::key).collect();
        assert_eq!(keys, vec!["bluesky:bob", "mastodon:alice"]);

        assert_eq!(store.select(&[]).unwrap().len(), 2);
    }

    #[test]
    fn test_select_unknown_key() {
        let store = AccountStore::new("unused.toml");
        let result = store.select(&["threads:nobody".to_string()]);
        match result {
            Err(SocialSyncError::InvalidInput(msg)) => assert!(msg.contains("threads:nobody")),
            _ => panic!("Expected InvalidInput"),
        }
    }

    #[test]
    fn test_empty_token_rejected_on_conversion() {
        let entry = stored("mastodon", "alice", "");
        assert!(entry.to_account().is_err());
    }
}
