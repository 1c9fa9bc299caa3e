//! Flat directory of acquired documents, keyed by file name.
//!
//! The store is the only durable state of a run. Presence on disk is the whole
//! index: there is no manifest. Writers never produce a truncated file under
//! its final name; bytes go to a hidden `.part` file unique to the writer, in
//! the same directory, which is linked into place only if the name is still
//! free once the write is complete.
//!
//! # Example
//!
//! ```no_run
//! use harvester_core::store::DocumentStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = DocumentStore::open("data/labels").await?;
//! if !store.contains("ABC123.pdf").await? {
//!     store.write_if_absent("ABC123.pdf", b"%PDF-1.7").await?;
//! }
//! # Ok(())
//! # }
//! ```

mod error;

pub use error::StoreError;

use std::path::{Path, PathBuf};

use tempfile::TempPath;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};

/// Suffix of in-flight temp files.
const PARTIAL_SUFFIX: &str = ".part";

/// Handle to the document directory.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
}

/// Result of committing a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The temp file was renamed onto the final name.
    Stored(PathBuf),
    /// Another writer produced the final file first; the temp file was discarded.
    AlreadyPresent(PathBuf),
}

impl CommitOutcome {
    /// Final path of the document, whoever wrote it.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Stored(path) | Self::AlreadyPresent(path) => path,
        }
    }
}

impl DocumentStore {
    /// Opens the store, creating the directory when missing.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the directory cannot be created
    /// or the path exists but is not a directory.
    #[instrument(level = "debug", skip(root), fields(root = %root.as_ref().display()))]
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| StoreError::unavailable(&root, e))?;
        let meta = fs::metadata(&root)
            .await
            .map_err(|e| StoreError::unavailable(&root, e))?;
        if !meta.is_dir() {
            return Err(StoreError::unavailable(
                &root,
                std::io::Error::new(std::io::ErrorKind::NotADirectory, "not a directory"),
            ));
        }
        debug!("document store ready");
        Ok(Self { root })
    }

    /// Store root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Final path for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidName`] for names that are not a single
    /// plain path segment.
    pub fn path_for(&self, name: &str) -> Result<PathBuf, StoreError> {
        validate_name(name)?;
        Ok(self.root.join(name))
    }

    /// True when a completed document named `name` exists.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid names or when the metadata lookup fails for
    /// a reason other than absence.
    pub async fn contains(&self, name: &str) -> Result<bool, StoreError> {
        let path = self.path_for(name)?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    /// Starts a write for `name`, returning a handle over a fresh temp file.
    ///
    /// Every call gets its own `.<name>.<random>.part` file, so concurrent
    /// writers of one name never share bytes. Nothing is visible under `name`
    /// until [`PendingWrite::commit`].
    ///
    /// # Errors
    ///
    /// Returns an error for invalid names or when the temp file cannot be
    /// created.
    pub async fn begin_write(&self, name: &str) -> Result<PendingWrite, StoreError> {
        let final_path = self.path_for(name)?;
        let root = self.root.clone();
        let prefix = format!(".{name}.");
        let created = tokio::task::spawn_blocking(move || {
            tempfile::Builder::new()
                .prefix(&prefix)
                .suffix(PARTIAL_SUFFIX)
                .tempfile_in(&root)
        })
        .await
        .map_err(|e| StoreError::io(&self.root, std::io::Error::other(e)))?
        .map_err(|e| StoreError::io(&self.root, e))?;

        let (file, temp) = created.into_parts();
        Ok(PendingWrite {
            file: Some(File::from_std(file)),
            temp_path: temp.to_path_buf(),
            temp: Some(temp),
            final_path,
            finished: false,
        })
    }

    /// Writes `bytes` under `name` unless a document with that name exists.
    ///
    /// # Errors
    ///
    /// Returns an error when the temp write or the rename fails.
    pub async fn write_if_absent(
        &self,
        name: &str,
        bytes: &[u8],
    ) -> Result<CommitOutcome, StoreError> {
        if self.contains(name).await? {
            return Ok(CommitOutcome::AlreadyPresent(self.path_for(name)?));
        }
        let mut pending = self.begin_write(name).await?;
        if let Err(e) = pending.write_all(bytes).await {
            pending.abort().await;
            return Err(e);
        }
        pending.commit().await
    }

    /// Completed document names whose extension matches `ext` (case-insensitive), sorted.
    ///
    /// # Errors
    ///
    /// Returns an error when the directory cannot be read.
    pub async fn list_with_extension(&self, ext: &str) -> Result<Vec<String>, StoreError> {
        let wanted = ext.trim_start_matches('.').to_ascii_lowercase();
        let mut names = Vec::new();
        let mut entries = fs::read_dir(&self.root)
            .await
            .map_err(|e| StoreError::io(&self.root, e))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io(&self.root, e))?
        {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if is_partial_name(&name) {
                continue;
            }
            let is_file = entry.file_type().await.is_ok_and(|t| t.is_file());
            let matches = Path::new(&name)
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(&wanted));
            if is_file && matches {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Removes temp files left behind by an interrupted run. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error when the directory cannot be read.
    #[instrument(level = "debug", skip(self), fields(root = %self.root.display()))]
    pub async fn sweep_partials(&self) -> Result<usize, StoreError> {
        let mut removed = 0;
        let mut entries = fs::read_dir(&self.root)
            .await
            .map_err(|e| StoreError::io(&self.root, e))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io(&self.root, e))?
        {
            let is_partial = entry
                .file_name()
                .to_str()
                .is_some_and(is_partial_name);
            if !is_partial {
                continue;
            }
            match fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) => warn!(path = %entry.path().display(), error = %e, "failed to remove stale partial file"),
            }
        }
        if removed > 0 {
            debug!(removed, "removed stale partial files");
        }
        Ok(removed)
    }
}

/// An in-flight write into the store.
///
/// Dropping a `PendingWrite` without committing removes its temp file. Temp
/// files outliving their process are cleared by
/// [`DocumentStore::sweep_partials`].
#[derive(Debug)]
pub struct PendingWrite {
    file: Option<File>,
    temp: Option<TempPath>,
    temp_path: PathBuf,
    final_path: PathBuf,
    finished: bool,
}

impl PendingWrite {
    /// Path of the hidden temp file.
    #[must_use]
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Mutable access to the temp file for streaming writers.
    ///
    /// # Errors
    ///
    /// Returns an error if the write was already committed or aborted.
    pub fn file_mut(&mut self) -> Result<&mut File, StoreError> {
        let temp_path = self.temp_path.clone();
        self.file.as_mut().ok_or_else(|| {
            StoreError::io(
                temp_path,
                std::io::Error::other("pending write already finished"),
            )
        })
    }

    /// Appends `bytes` to the temp file.
    ///
    /// # Errors
    ///
    /// Returns an error when the write fails.
    pub async fn write_all(&mut self, bytes: &[u8]) -> Result<(), StoreError> {
        let temp_path = self.temp_path.clone();
        self.file_mut()?
            .write_all(bytes)
            .await
            .map_err(|e| StoreError::io(temp_path, e))
    }

    /// Flushes the temp file and links it onto the final name.
    ///
    /// The final name is never replaced: if it appeared meanwhile the temp
    /// file is removed and the existing document is kept untouched.
    ///
    /// # Errors
    ///
    /// Returns an error when syncing or persisting fails; the temp file is
    /// removed in that case.
    pub async fn commit(mut self) -> Result<CommitOutcome, StoreError> {
        self.finished = true;
        if let Some(mut file) = self.file.take() {
            let synced = match file.flush().await {
                Ok(()) => file.sync_all().await,
                Err(e) => Err(e),
            };
            drop(file);
            if let Err(e) = synced {
                drop(self.temp.take());
                return Err(StoreError::io(&self.temp_path, e));
            }
        }

        let Some(temp) = self.temp.take() else {
            return Err(StoreError::io(
                &self.temp_path,
                std::io::Error::other("pending write already finished"),
            ));
        };
        let final_path = self.final_path.clone();
        let persisted = tokio::task::spawn_blocking(move || temp.persist_noclobber(&final_path))
            .await
            .map_err(|e| StoreError::io(&self.final_path, std::io::Error::other(e)))?;

        match persisted {
            Ok(()) => Ok(CommitOutcome::Stored(self.final_path.clone())),
            Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
                debug!(path = %self.final_path.display(), "document appeared during write; discarding temp file");
                drop(e);
                Ok(CommitOutcome::AlreadyPresent(self.final_path.clone()))
            }
            Err(e) => Err(StoreError::io(&self.final_path, e.error)),
        }
    }

    /// Discards the temp file.
    pub async fn abort(mut self) {
        self.finished = true;
        drop(self.file.take());
        let Some(temp) = self.temp.take() else {
            return;
        };
        let removed = tokio::task::spawn_blocking(move || temp.close())
            .await
            .unwrap_or_else(|e| Err(std::io::Error::other(e)));
        if let Err(e) = removed
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!(path = %self.temp_path.display(), error = %e, "failed to remove partial file");
        }
    }
}

impl Drop for PendingWrite {
    fn drop(&mut self) {
        if !self.finished {
            debug!(path = %self.temp_path.display(), "pending write dropped without commit; removing temp file");
        }
    }
}

fn is_partial_name(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(PARTIAL_SUFFIX)
}

fn validate_name(name: &str) -> Result<(), StoreError> {
    if name.is_empty() {
        return Err(StoreError::invalid_name(name, "empty name"));
    }
    if name == "." || name == ".." {
        return Err(StoreError::invalid_name(name, "relative path component"));
    }
    if name.contains(['/', '\\']) {
        return Err(StoreError::invalid_name(name, "contains a path separator"));
    }
    if name.chars().any(char::is_control) {
        return Err(StoreError::invalid_name(name, "contains a control character"));
    }
    if is_partial_name(name) {
        return Err(StoreError::invalid_name(name, "reserved temp file name"));
    }
    Ok(())
}
