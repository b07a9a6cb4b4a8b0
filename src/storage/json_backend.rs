use std::{
    cmp::Reverse,
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::{DateTime, NaiveDateTime, Utc};
use uuid::Uuid;

use crate::{
    core::utils::{ensure_dir, PathResolver},
    errors::LedgerError,
    ledger::{
        BillingMonth, ChangeSet, Discount, HostelBook, Invoice, LedgerEntry, Payment, Room,
        Student, CURRENT_SCHEMA_VERSION,
    },
};

use super::{LedgerStore, Result, SharedBook, DEFAULT_LOCK_TIMEOUT};

const BOOK_EXTENSION: &str = "json";
const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const TMP_SUFFIX: &str = "tmp";
const DEFAULT_RETENTION: usize = 5;

/// Describes a persisted backup artifact for a hostel book.
#[derive(Debug, Clone)]
pub struct BackupInfo {
    pub name: String,
    pub created_at: Option<DateTime<Utc>>,
    pub path: PathBuf,
}

/// Filesystem-backed JSON store. Each write lands atomically via a temporary file.
pub struct JsonStore {
    path: PathBuf,
    backups_dir: PathBuf,
    slug: String,
    retention: usize,
    book: SharedBook,
}

impl JsonStore {
    /// Opens the book called `name` under `root`, creating it when missing.
    pub fn open(root: &Path, name: &str) -> Result<Self> {
        Self::with_options(root, name, DEFAULT_RETENTION, DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_options(
        root: &Path,
        name: &str,
        retention: usize,
        timeout: Duration,
    ) -> Result<Self> {
        let books_dir = PathResolver::books_dir_in(root);
        let backups_root = PathResolver::backup_dir_in(root);
        ensure_dir(&books_dir)?;
        ensure_dir(&backups_root)?;
        let slug = canonical_name(name);
        let path = books_dir.join(format!("{}.{}", slug, BOOK_EXTENSION));
        let book = if path.exists() {
            let mut book = load_book_from_path(&path)?;
            let recovered = book.recover_interrupted_checkouts();
            if !recovered.is_empty() {
                tracing::warn!(
                    students = recovered.len(),
                    "reactivated students left settling by an interrupted checkout"
                );
                save_book_to_path(&book, &path)?;
            }
            book
        } else {
            let book = HostelBook::new(name);
            save_book_to_path(&book, &path)?;
            tracing::info!(path = %path.display(), "created hostel book");
            book
        };
        Ok(Self {
            path,
            backups_dir: backups_root.join(&slug),
            slug,
            retention: retention.max(1),
            book: SharedBook::new(book, timeout),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes a timestamped copy of the current book and prunes old copies.
    pub fn backup(&self, note: Option<&str>) -> Result<BackupInfo> {
        let book = self.book.read()?;
        ensure_dir(&self.backups_dir)?;
        let timestamp = Utc::now().format(BACKUP_TIMESTAMP_FORMAT).to_string();
        let mut stem = format!("{}_{}", self.slug, timestamp);
        if let Some(label) = sanitize_backup_note(note) {
            stem.push('_');
            stem.push_str(&label);
        }
        let file_name = format!("{}.{}", stem, BOOK_EXTENSION);
        let path = self.backups_dir.join(&file_name);
        write_atomic(&path, &serde_json::to_string_pretty(&*book)?)?;
        drop(book);
        self.prune_backups()?;
        tracing::info!(backup = %file_name, "hostel book backed up");
        Ok(BackupInfo {
            created_at: parse_backup_timestamp(&file_name),
            name: file_name,
            path,
        })
    }

    /// Lists backups, newest first.
    pub fn list_backups(&self) -> Result<Vec<BackupInfo>> {
        if !self.backups_dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.backups_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(BOOK_EXTENSION) {
                continue;
            }
            let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            entries.push(BackupInfo {
                name: name.to_string(),
                created_at: parse_backup_timestamp(name),
                path: path.clone(),
            });
        }
        entries.sort_by_key(|info| Reverse((info.created_at, info.name.clone())));
        Ok(entries)
    }

    /// Replaces the live book with a backup's contents.
    pub fn restore(&self, backup: &BackupInfo) -> Result<()> {
        if !backup.path.exists() {
            return Err(LedgerError::Storage(format!(
                "backup `{}` not found",
                backup.name
            )));
        }
        let restored = load_book_from_path(&backup.path)?;
        let mut book = self.book.write()?;
        save_book_to_path(&restored, &self.path)?;
        *book = restored;
        tracing::warn!(backup = %backup.name, "hostel book restored from backup");
        Ok(())
    }

    fn prune_backups(&self) -> Result<()> {
        for stale in self.list_backups()?.into_iter().skip(self.retention) {
            if let Err(err) = fs::remove_file(&stale.path) {
                tracing::warn!(backup = %stale.name, error = %err, "could not prune stale backup");
            }
        }
        Ok(())
    }

    /// Applies `mutate` to a copy, persists it, and only then swaps it in.
    fn commit<T>(&self, mutate: impl FnOnce(&mut HostelBook) -> Result<T>) -> Result<T> {
        let mut book = self.book.write()?;
        let mut next = book.clone();
        let value = mutate(&mut next)?;
        save_book_to_path(&next, &self.path)?;
        *book = next;
        Ok(value)
    }
}

impl LedgerStore for JsonStore {
    fn student(&self, id: Uuid) -> Result<Option<Student>> {
        Ok(self.book.read()?.student(id).cloned())
    }

    fn students(&self) -> Result<Vec<Student>> {
        Ok(self.book.read()?.students.clone())
    }

    fn room(&self, id: Uuid) -> Result<Option<Room>> {
        Ok(self.book.read()?.room(id).cloned())
    }

    fn rooms(&self) -> Result<Vec<Room>> {
        Ok(self.book.read()?.rooms.clone())
    }

    fn entries_for(&self, student_id: Uuid) -> Result<Vec<LedgerEntry>> {
        Ok(self.book.read()?.entries_for(student_id))
    }

    fn invoice_for(&self, student_id: Uuid, month: BillingMonth) -> Result<Option<Invoice>> {
        Ok(self.book.read()?.invoice_for(student_id, month).cloned())
    }

    fn invoices_for(&self, student_id: Uuid) -> Result<Vec<Invoice>> {
        Ok(self.book.read()?.invoices_for(student_id))
    }

    fn discount(&self, id: Uuid) -> Result<Option<Discount>> {
        Ok(self.book.read()?.discount(id).cloned())
    }

    fn payments_for(&self, student_id: Uuid) -> Result<Vec<Payment>> {
        Ok(self.book.read()?.payments_for(student_id))
    }

    fn next_invoice_sequence(&self, month: BillingMonth) -> Result<u32> {
        self.commit(|book| book.next_invoice_sequence(month))
    }

    fn apply(&self, changes: ChangeSet) -> Result<()> {
        self.commit(|book| book.apply(changes))
    }

    fn snapshot(&self) -> Result<HostelBook> {
        Ok(self.book.read()?.clone())
    }
}

pub fn save_book_to_path(book: &HostelBook, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let json = serde_json::to_string_pretty(book)?;
    let tmp = tmp_path(path);
    write_atomic(&tmp, &json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

pub fn load_book_from_path(path: &Path) -> Result<HostelBook> {
    let data = fs::read_to_string(path)?;
    let book: HostelBook = serde_json::from_str(&data)?;
    if book.schema_version > CURRENT_SCHEMA_VERSION {
        return Err(LedgerError::Storage(format!(
            "`{}` was written by a newer schema version ({})",
            path.display(),
            book.schema_version
        )));
    }
    Ok(book)
}

fn canonical_name(name: &str) -> String {
    let sanitized: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' => c,
            _ => '_',
        })
        .collect();
    if sanitized.trim_matches('_').is_empty() {
        "hostel".into()
    } else {
        sanitized
    }
}

fn sanitize_backup_note(note: Option<&str>) -> Option<String> {
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
        } else if (ch.is_whitespace() || matches!(ch, '-' | '.' | '_'))
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

/// Reads the `YYYYMMDD_HHMMSS` pair that follows the slug in a backup file name.
fn parse_backup_timestamp(name: &str) -> Option<DateTime<Utc>> {
    let stem = name.strip_suffix(&format!(".{}", BOOK_EXTENSION))?;
    let parts: Vec<&str> = stem.split('_').collect();
    parts.windows(2).find_map(|pair| {
        let (date, time) = (pair[0], pair[1]);
        if !is_digits(date, 8) || !is_digits(time, 6) {
            return None;
        }
        NaiveDateTime::parse_from_str(&format!("{date}{time}"), "%Y%m%d%H%M%S")
            .ok()
            .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
    })
}

fn is_digits(value: &str, len: usize) -> bool {
    value.len() == len && value.chars().all(|c| c.is_ascii_digit())
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

fn write_atomic(path: &Path, data: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let mut file = File::create(path)?;
    file.write_all(data.as_bytes())?;
    file.flush()?;
    file.sync_all()?;
    Ok(())
}
