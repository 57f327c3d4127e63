//! Key-value state kept on the device between runs: session, reader and app settings.

use crate::requests::auth::AuthSession;
use crate::requests::Result;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StorageKey {
    Token,
    User,
    Theme,
    ReadingMode,
    FontSize,
    Notifications,
    DataUsage,
    AutoUpdateChapters,
    SelectedCategories,
}

impl StorageKey {
    pub const ALL: [StorageKey; 9] = [
        StorageKey::Token,
        StorageKey::User,
        StorageKey::Theme,
        StorageKey::ReadingMode,
        StorageKey::FontSize,
        StorageKey::Notifications,
        StorageKey::DataUsage,
        StorageKey::AutoUpdateChapters,
        StorageKey::SelectedCategories,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StorageKey::Token => "token",
            StorageKey::User => "user",
            StorageKey::Theme => "theme",
            StorageKey::ReadingMode => "readingMode",
            StorageKey::FontSize => "fontSize",
            StorageKey::Notifications => "notifications",
            StorageKey::DataUsage => "dataUsage",
            StorageKey::AutoUpdateChapters => "autoUpdateChapters",
            StorageKey::SelectedCategories => "selectedCategories",
        }
    }
}

/// String map persisted as one JSON file. Every mutation is written through.
///
/// Writers queue on `write_gate` for the whole write, so the file always holds the latest
/// committed map. A mutation only reaches `entries` once it is on disk.
#[derive(Debug)]
pub struct DeviceStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
    write_gate: tokio::sync::Mutex<()>,
}

impl DeviceStore {
    /// Opens the store at `path`; a missing file is an empty store
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(path = %path.display(), "device store is corrupt, starting empty: {e}");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
            write_gate: tokio::sync::Mutex::new(()),
        })
    }

    pub fn get(&self, key: StorageKey) -> Option<String> {
        self.entries.lock().get(key.as_str()).cloned()
    }

    pub async fn set(&self, key: StorageKey, value: impl Into<String>) -> Result<()> {
        self.set_many([(key, value.into())]).await
    }

    pub async fn set_many(
        &self,
        values: impl IntoIterator<Item = (StorageKey, String)>,
    ) -> Result<()> {
        self.update(|entries| {
            for (key, value) in values {
                entries.insert(key.as_str().to_owned(), value);
            }
        })
        .await
    }

    pub async fn remove(&self, keys: &[StorageKey]) -> Result<()> {
        self.update(|entries| {
            for key in keys {
                entries.remove(key.as_str());
            }
        })
        .await
    }

    /// Applies `change` to a copy of the map, writes the copy and then commits it in memory.
    /// On error neither the file nor the in-memory map has changed
    async fn update(&self, change: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<()> {
        let _gate = self.write_gate.lock().await;

        let mut next = self.entries.lock().clone();
        change(&mut next);

        self.persist(serde_json::to_vec_pretty(&next)?).await?;
        *self.entries.lock() = next;

        Ok(())
    }

    async fn persist(&self, snapshot: Vec<u8>) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }

        // the file on disk is only ever replaced whole
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, snapshot).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        Ok(())
    }

    pub async fn save_session(&self, session: &AuthSession) -> Result<()> {
        let user = serde_json::to_string(&session.user)?;

        self.set_many([
            (StorageKey::Token, session.token.clone()),
            (StorageKey::User, user),
        ])
        .await
    }

    /// Stored session, if both the token and a readable user are there
    pub fn load_session(&self) -> Option<AuthSession> {
        let token = self.get(StorageKey::Token)?;
        let user = self.get(StorageKey::User)?;

        match serde_json::from_str(&user) {
            Ok(user) => Some(AuthSession { token, user }),
            Err(e) => {
                tracing::warn!("stored user is unreadable: {e}");
                None
            }
        }
    }

    pub async fn clear_session(&self) -> Result<()> {
        self.remove(&[StorageKey::Token, StorageKey::User]).await
    }

    /// Settings with defaults filled in for anything missing or unparsable
    pub fn load_settings(&self) -> Settings {
        let defaults = Settings::default();

        Settings {
            theme: self.parse(StorageKey::Theme).unwrap_or(defaults.theme),
            reading_mode: self
                .parse(StorageKey::ReadingMode)
                .unwrap_or(defaults.reading_mode),
            font_size: self.parse(StorageKey::FontSize).unwrap_or(defaults.font_size),
            notifications: self
                .parse(StorageKey::Notifications)
                .unwrap_or(defaults.notifications),
            data_usage: self.parse(StorageKey::DataUsage).unwrap_or(defaults.data_usage),
            auto_update_chapters: self
                .parse(StorageKey::AutoUpdateChapters)
                .unwrap_or(defaults.auto_update_chapters),
            selected_categories: self
                .parse(StorageKey::SelectedCategories)
                .unwrap_or(defaults.selected_categories),
        }
    }

    pub async fn save_settings(&self, settings: &Settings) -> Result<()> {
        self.set_many([
            (StorageKey::Theme, to_stored(&settings.theme)?),
            (StorageKey::ReadingMode, to_stored(&settings.reading_mode)?),
            (StorageKey::FontSize, to_stored(&settings.font_size)?),
            (StorageKey::Notifications, to_stored(&settings.notifications)?),
            (StorageKey::DataUsage, to_stored(&settings.data_usage)?),
            (
                StorageKey::AutoUpdateChapters,
                to_stored(&settings.auto_update_chapters)?,
            ),
            (
                StorageKey::SelectedCategories,
                to_stored(&settings.selected_categories)?,
            ),
        ])
        .await
    }

    /// Values are stored the way the app writes them: bare words for enums, JSON for the rest
    fn parse<T: serde::de::DeserializeOwned>(&self, key: StorageKey) -> Option<T> {
        let raw = self.get(key)?;

        serde_json::from_str(&raw)
            .or_else(|_| serde_json::from_value(serde_json::Value::String(raw.clone())))
            .map_err(|e| tracing::debug!(key = key.as_str(), "ignoring stored value {raw:?}: {e}"))
            .ok()
    }
}

fn to_stored<T: Serialize>(value: &T) -> Result<String> {
    Ok(match serde_json::to_value(value)? {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingMode {
    #[default]
    Paged,
    Vertical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontSize {
    Small,
    #[default]
    Medium,
    Large,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataUsage {
    Low,
    #[default]
    Standard,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub theme: Theme,
    pub reading_mode: ReadingMode,
    pub font_size: FontSize,
    pub notifications: bool,
    pub data_usage: DataUsage,
    pub auto_update_chapters: bool,
    pub selected_categories: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            reading_mode: ReadingMode::default(),
            font_size: FontSize::default(),
            notifications: true,
            data_usage: DataUsage::default(),
            auto_update_chapters: true,
            selected_categories: Vec::new(),
        }
    }
}

impl Settings {
    /// Whether failed pages should be retried on the data-saver tier
    pub fn prefers_data_saver(&self) -> bool {
        self.data_usage == DataUsage::Low
    }
}
