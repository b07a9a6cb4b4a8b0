//! Hostel profile and billing settings, persisted as JSON.

use std::{
    cmp::Reverse,
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    core::utils::{ensure_dir, PathResolver},
    currency::{CurrencyCode, LocaleConfig, Money},
    errors::LedgerError,
};

const BACKUP_EXTENSION: &str = "json";
const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M";
const TMP_SUFFIX: &str = "tmp";

/// Identity printed on invoices and statements.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HostelProfile {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Default for HostelProfile {
    fn default() -> Self {
        Self {
            name: "Hostel".into(),
            address: None,
            phone: None,
            email: None,
        }
    }
}

/// What monthly invoicing does when a student already has an invoice for the month.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    #[default]
    Skip,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BillingSettings {
    /// Day of the invoiced month the invoice falls due.
    #[serde(default = "BillingSettings::default_due_day")]
    pub due_day: u32,
    #[serde(default = "BillingSettings::default_prorate")]
    pub prorate_partial_months: bool,
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,
    #[serde(default = "BillingSettings::default_batch_workers")]
    pub batch_workers: usize,
    #[serde(default = "BillingSettings::default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
    /// Largest drift between recorded and recomputed balances that still audits clean.
    #[serde(default)]
    pub balance_tolerance_minor: i64,
}

impl Default for BillingSettings {
    fn default() -> Self {
        Self {
            due_day: Self::default_due_day(),
            prorate_partial_months: Self::default_prorate(),
            duplicate_policy: DuplicatePolicy::default(),
            batch_workers: Self::default_batch_workers(),
            lock_timeout_ms: Self::default_lock_timeout_ms(),
            balance_tolerance_minor: 0,
        }
    }
}

impl BillingSettings {
    pub fn default_due_day() -> u32 {
        10
    }

    pub fn default_prorate() -> bool {
        true
    }

    pub fn default_batch_workers() -> usize {
        4
    }

    pub fn default_lock_timeout_ms() -> u64 {
        5_000
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms.max(1))
    }

    pub fn balance_tolerance(&self) -> Money {
        Money::from_minor(self.balance_tolerance_minor.max(0))
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        if !(1..=31).contains(&self.due_day) {
            return Err(LedgerError::Validation(format!(
                "due day must be within 1..=31, got {}",
                self.due_day
            )));
        }
        if self.batch_workers == 0 {
            return Err(LedgerError::Validation(
                "batch workers must be at least 1".into(),
            ));
        }
        if self.balance_tolerance_minor < 0 {
            return Err(LedgerError::Validation(
                "balance tolerance cannot be negative".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub hostel: HostelProfile,
    #[serde(default)]
    pub currency: CurrencyCode,
    #[serde(default)]
    pub locale: LocaleConfig,
    #[serde(default)]
    pub billing: BillingSettings,
    /// Name of the book the CLI opens.
    #[serde(default = "Config::default_book_name")]
    pub book: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hostel: HostelProfile::default(),
            currency: CurrencyCode::default(),
            locale: LocaleConfig::default(),
            billing: BillingSettings::default(),
            book: Self::default_book_name(),
        }
    }
}

impl Config {
    pub fn default_book_name() -> String {
        "hostel".into()
    }
}

/// Handles persistence and backup management for [`Config`].
#[derive(Debug, Clone)]
pub struct ConfigManager {
    path: PathBuf,
    backups_dir: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Result<Self, LedgerError> {
        Self::with_base_dir(PathResolver::base_dir())
    }

    pub fn with_base_dir(base: PathBuf) -> Result<Self, LedgerError> {
        ensure_dir(&base)?;
        ensure_dir(&PathResolver::config_dir_in(&base))?;
        let backups_dir = PathResolver::config_backup_dir_in(&base);
        ensure_dir(&backups_dir)?;
        Ok(Self {
            path: PathResolver::config_file_in(&base),
            backups_dir,
        })
    }

    pub fn load(&self) -> Result<Config, LedgerError> {
        if self.path.exists() {
            let data = fs::read_to_string(&self.path)?;
            let config: Config = serde_json::from_str(&data)?;
            config.billing.validate()?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    pub fn save(&self, config: &Config) -> Result<(), LedgerError> {
        config.billing.validate()?;
        if let Some(parent) = self.path.parent() {
            ensure_dir(parent)?;
        }
        let json = serde_json::to_string_pretty(config)?;
        let tmp = tmp_path(&self.path);
        write_atomic(&tmp, &json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    pub fn backup(&self, config: &Config, note: Option<&str>) -> Result<String, LedgerError> {
        ensure_dir(&self.backups_dir)?;
        let timestamp = Utc::now().format(BACKUP_TIMESTAMP_FORMAT).to_string();
        let mut name = format!("config_{}", timestamp);
        if let Some(label) = sanitize_note(note) {
            name.push('_');
            name.push_str(&label);
        }
        name.push_str(&format!(".{}", BACKUP_EXTENSION));
        let path = self.backups_dir.join(&name);
        let json = serde_json::to_string_pretty(config)?;
        write_atomic(&path, &json)?;
        Ok(name)
    }

    pub fn restore(&self, backup_name: &str) -> Result<Config, LedgerError> {
        let path = self.backups_dir.join(backup_name);
        if !path.exists() {
            return Err(LedgerError::Storage(format!(
                "configuration backup `{}` not found",
                backup_name
            )));
        }
        let data = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn list_backups(&self) -> Result<Vec<String>, LedgerError> {
        if !self.backups_dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.backups_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(BACKUP_EXTENSION) {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
                entries.push(name.to_string());
            }
        }
        entries.sort_by_key(|name| Reverse(parse_timestamp(name)));
        Ok(entries)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn sanitize_note(note: Option<&str>) -> Option<String> {
    let raw = note?.trim();
    if raw.is_empty() {
        return None;
    }
    let mut sanitized = String::new();
    let mut last_dash = false;
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            sanitized.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if (ch.is_whitespace() || matches!(ch, '-' | '.'))
            && !sanitized.is_empty()
            && !last_dash
        {
            sanitized.push('-');
            last_dash = true;
        }
    }
    let trimmed = sanitized.trim_matches('-').to_string();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn parse_timestamp(name: &str) -> Option<DateTime<Utc>> {
    let trimmed = name.strip_suffix(&format!(".{}", BACKUP_EXTENSION))?;
    let segments: Vec<&str> = trimmed.split('_').collect();
    if segments.len() < 3 {
        return None;
    }
    let date_part = segments.get(1)?;
    let time_part = segments.get(2)?;
    if date_part.len() != 8 || time_part.len() != 4 {
        return None;
    }
    let raw = format!("{}{}", date_part, time_part);
    chrono::NaiveDateTime::parse_from_str(&raw, "%Y%m%d%H%M")
        .ok()
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let ext = match path.extension().and_then(|ext| ext.to_str()) {
        Some(existing) => format!("{}.{}", existing, TMP_SUFFIX),
        None => TMP_SUFFIX.to_string(),
    };
    tmp.set_extension(ext);
    tmp
}

fn write_atomic(path: &Path, data: &str) -> Result<(), LedgerError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let mut file = File::create(path)?;
    file.write_all(data.as_bytes())?;
    file.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().expect("tempdir");
        let manager = ConfigManager::with_base_dir(dir.path().to_path_buf()).expect("manager");
        let config = manager.load().expect("load");
        assert_eq!(config, Config::default());
        assert_eq!(config.billing.due_day, 10);
        assert_eq!(config.billing.duplicate_policy, DuplicatePolicy::Skip);
    }

    #[test]
    fn save_then_load_keeps_profile() {
        let dir = tempdir().expect("tempdir");
        let manager = ConfigManager::with_base_dir(dir.path().to_path_buf()).expect("manager");
        let mut config = Config::default();
        config.hostel.name = "Everest Boys Hostel".into();
        config.hostel.phone = Some("+977-1-5550100".into());
        config.billing.duplicate_policy = DuplicatePolicy::Fail;
        manager.save(&config).expect("save");
        assert_eq!(manager.load().expect("load"), config);
    }

    #[test]
    fn invalid_settings_are_rejected_on_save() {
        let dir = tempdir().expect("tempdir");
        let manager = ConfigManager::with_base_dir(dir.path().to_path_buf()).expect("manager");
        let mut config = Config::default();
        config.billing.due_day = 0;
        assert!(manager.save(&config).is_err());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"hostel":{"name":"Lakeside"},"billing":{"due_day":5}}"#)
                .expect("parse");
        assert_eq!(config.hostel.name, "Lakeside");
        assert_eq!(config.billing.due_day, 5);
        assert_eq!(config.billing.batch_workers, 4);
        assert_eq!(config.currency, CurrencyCode::default());
    }

    #[test]
    fn backups_round_trip() {
        let dir = tempdir().expect("tempdir");
        let manager = ConfigManager::with_base_dir(dir.path().to_path_buf()).expect("manager");
        let config = Config::default();
        let name = manager.backup(&config, Some("Before audit")).expect("backup");
        assert!(name.contains("before-audit"));
        assert_eq!(manager.list_backups().expect("list"), vec![name.clone()]);
        assert_eq!(manager.restore(&name).expect("restore"), config);
    }
}
