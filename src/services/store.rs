//! Durable month record storage
//!
//! Month records live as one JSON file per `(user, scope, month)` so that
//! concurrent fetches of different months never contend on the same file.

use chrono::NaiveDate;
use directories::BaseDirs;
use fs2::FileExt;
use regex::Regex;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use super::access_keys::AccessKeyRing;
use super::range_planner::months_in_range;
use crate::config::Config;
use crate::types::{MonthRecord, Result, WrapError};

const ACCESS_KEYS_FILE: &str = "access_keys.json";

/// Keeps temp file names unique across concurrent writers of one month
static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Storage for per-month records
pub trait MonthStore: Send + Sync {
    /// Records for every month overlapping `[start, end]`, ordered by month.
    /// Version filtering is left to the caller.
    fn load_range(
        &self,
        user_id: &str,
        private: bool,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<MonthRecord>>;

    /// Insert or overwrite the record for its `(user, scope, month)` key
    fn save(&self, record: &MonthRecord) -> Result<()>;

    /// Reload fallback API keys before a fetch batch
    fn refresh_access_keys(&self) -> Result<()>;
}

fn user_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-][A-Za-z0-9._-]*$").expect("valid regex"))
}

/// Reject user ids that are unsafe as a path component
pub fn validate_user_id(user_id: &str) -> Result<()> {
    if user_id.len() > 100 || !user_id_pattern().is_match(user_id) {
        return Err(WrapError::Config(format!("invalid user id: {:?}", user_id)));
    }
    Ok(())
}

fn scope_dir(private: bool) -> &'static str {
    if private {
        "private"
    } else {
        "public"
    }
}

/// File-backed month store rooted at a directory
pub struct FileMonthStore {
    root: PathBuf,
    keys: AccessKeyRing,
}

impl FileMonthStore {
    /// Store under `~/.wrapstats`
    pub fn new(keys: AccessKeyRing) -> Result<Self> {
        let base_dirs = BaseDirs::new()
            .ok_or_else(|| WrapError::Config("Cannot determine home directory".into()))?;
        let root = base_dirs.home_dir().join(".wrapstats");
        fs::create_dir_all(&root)?;
        Ok(Self { root, keys })
    }

    pub fn with_root(root: PathBuf, keys: AccessKeyRing) -> Self {
        Self { root, keys }
    }

    /// Store at `config.store_dir`, or the default location when unset
    pub fn from_config(config: &Config, keys: AccessKeyRing) -> Result<Self> {
        match &config.store_dir {
            Some(dir) => Ok(Self::with_root(dir.clone(), keys)),
            None => Self::new(keys),
        }
    }

    pub fn user_dir(&self, user_id: &str) -> Result<PathBuf> {
        validate_user_id(user_id)?;
        Ok(self.root.join("users").join(user_id))
    }

    pub fn record_path(&self, user_id: &str, private: bool, month: NaiveDate) -> Result<PathBuf> {
        Ok(self
            .user_dir(user_id)?
            .join(scope_dir(private))
            .join(format!("{}.json", month.format("%Y-%m"))))
    }

    /// Months with a stored record for the user and scope, ascending
    pub fn list_months(&self, user_id: &str, private: bool) -> Result<Vec<NaiveDate>> {
        let pattern = self.user_dir(user_id)?.join(scope_dir(private)).join("*.json");
        let mut months: Vec<NaiveDate> = glob::glob(&pattern.to_string_lossy())
            .map_err(|e| WrapError::Config(format!("bad store path: {}", e)))?
            .filter_map(|entry| entry.ok())
            .filter_map(|path| {
                let stem = path.file_stem()?.to_str()?.to_string();
                NaiveDate::parse_from_str(&format!("{}-01", stem), "%Y-%m-%d").ok()
            })
            .collect();
        months.sort();
        Ok(months)
    }

    /// Remove every stored month for a user. Returns whether anything existed.
    pub fn clear_user(&self, user_id: &str) -> Result<bool> {
        let dir = self.user_dir(user_id)?;
        if !dir.exists() {
            return Ok(false);
        }
        fs::remove_dir_all(&dir)?;
        Ok(true)
    }

    /// Read a single record under a shared lock. Unreadable or corrupt files
    /// are skipped with a warning.
    fn read_record(path: &Path) -> Option<MonthRecord> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to open month record");
                return None;
            }
        };

        if let Err(e) = file.lock_shared() {
            tracing::warn!(path = %path.display(), error = %e, "Failed to acquire read lock");
            return None;
        }

        let mut content = String::new();
        let read = std::io::BufReader::new(&file).read_to_string(&mut content);
        let _ = file.unlock();

        if let Err(e) = read {
            tracing::warn!(path = %path.display(), error = %e, "Failed to read month record");
            return None;
        }

        match serde_json::from_str(&content) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Corrupted month record");
                None
            }
        }
    }

    /// Atomic write (temp file + rename) under an exclusive lock on the target
    fn write_record(path: &Path, content: &str) -> Result<()> {
        let persist = |what: &str, e: std::io::Error| {
            WrapError::Persistence(format!("{} {}: {}", what, path.display(), e))
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| persist("Failed to create dir for", e))?;
        }

        let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
        let temp_path = path.with_extension(format!("json.{}-{}.tmp", std::process::id(), seq));
        {
            let mut file =
                File::create(&temp_path).map_err(|e| persist("Failed to create temp file for", e))?;
            file.write_all(content.as_bytes())
                .map_err(|e| persist("Failed to write temp file for", e))?;
            file.sync_all()
                .map_err(|e| persist("Failed to sync temp file for", e))?;
        }

        let target = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| persist("Failed to open", e))?;

        target
            .lock_exclusive()
            .map_err(|e| persist("Failed to acquire write lock on", e))?;

        let renamed = fs::rename(&temp_path, path).map_err(|e| persist("Failed to rename into", e));
        let _ = target.unlock();
        if renamed.is_err() {
            let _ = fs::remove_file(&temp_path);
        }
        renamed
    }
}

impl MonthStore for FileMonthStore {
    fn load_range(
        &self,
        user_id: &str,
        private: bool,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<MonthRecord>> {
        let mut records = Vec::new();

        for month in months_in_range(start, end) {
            let path = self.record_path(user_id, private, month)?;
            if !path.exists() {
                continue;
            }
            let Some(record) = Self::read_record(&path) else {
                continue;
            };
            if record.user_id != user_id || record.month != month || record.private != private {
                tracing::warn!(
                    path = %path.display(),
                    "Month record key does not match its location, ignoring"
                );
                continue;
            }
            records.push(record);
        }

        Ok(records)
    }

    fn save(&self, record: &MonthRecord) -> Result<()> {
        if super::month_classifier::first_of_month(record.month) != record.month {
            return Err(WrapError::Persistence(format!(
                "month key {} is not the first day of a month",
                record.month
            )));
        }

        let path = self.record_path(&record.user_id, record.private, record.month)?;
        let content = serde_json::to_string_pretty(record)
            .map_err(|e| WrapError::Persistence(format!("Serialization failed: {}", e)))?;

        Self::write_record(&path, &content)?;
        tracing::debug!(
            user = %record.user_id,
            month = %record.month,
            complete = record.complete,
            "Saved month record"
        );
        Ok(())
    }

    fn refresh_access_keys(&self) -> Result<()> {
        let path = self.root.join(ACCESS_KEYS_FILE);
        if !path.exists() {
            return Ok(());
        }

        let content = fs::read_to_string(&path)?;
        let keys: Vec<String> = serde_json::from_str(&content)
            .map_err(|e| WrapError::Parse(format!("Invalid {}: {}", ACCESS_KEYS_FILE, e)))?;

        self.keys.replace(keys);
        tracing::debug!(count = self.keys.len(), "Refreshed access keys");
        Ok(())
    }
}
