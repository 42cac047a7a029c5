//! Zip packaging of a scratch workspace

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("I/O error while archiving: {0}")]
    Io(#[from] io::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("failed to walk {0}")]
    Walk(#[from] walkdir::Error),

    #[error("{0} is not inside the archived directory")]
    OutsideSource(PathBuf),

    #[error("archiving was cancelled")]
    Cancelled,
}

/// Builds one deflate-compressed archive from a directory tree.
///
/// Entry names are paths relative to the source directory with `/`
/// separators. Entries are written in path order with a fixed timestamp and
/// mode, so the same file set always yields the same bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveBuilder;

impl ArchiveBuilder {
    /// Archive `source_dir` into `output_path` on the blocking pool.
    ///
    /// Dropping the returned future cancels the build: the blocking task
    /// stops at its next check and removes whatever it wrote.
    pub async fn build_async(
        &self,
        source_dir: PathBuf,
        output_path: PathBuf,
    ) -> Result<PathBuf, ArchiveError> {
        let builder = *self;
        let cancelled = Arc::new(AtomicBool::new(false));
        let _cancel_on_drop = CancelOnDrop(cancelled.clone());

        tokio::task::spawn_blocking(move || {
            builder.build_cancellable(&source_dir, &output_path, &cancelled)
        })
        .await
        .map_err(|e| ArchiveError::Io(io::Error::other(e)))?
    }

    /// Blocking. Partial output is removed on any failure, cancellation
    /// included.
    fn build_cancellable(
        &self,
        source_dir: &Path,
        output_path: &Path,
        cancelled: &AtomicBool,
    ) -> Result<PathBuf, ArchiveError> {
        let result = self.write_archive(source_dir, output_path, cancelled);
        if result.is_err() {
            if let Err(e) = std::fs::remove_file(output_path) {
                if e.kind() != io::ErrorKind::NotFound {
                    debug!("Could not remove partial archive {}: {}", output_path.display(), e);
                }
            }
        }
        result
    }

    fn write_archive(
        &self,
        source_dir: &Path,
        output_path: &Path,
        cancelled: &AtomicBool,
    ) -> Result<PathBuf, ArchiveError> {
        let check = || {
            if cancelled.load(Ordering::SeqCst) {
                Err(ArchiveError::Cancelled)
            } else {
                Ok(())
            }
        };

        // Checked after creating the file too: the workspace may have been
        // released while the task was queued.
        check()?;
        let file = File::create(output_path)?;
        check()?;
        let mut zip = ZipWriter::new(BufWriter::new(file));

        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(DateTime::default())
            .unix_permissions(0o644);

        let mut entries = 0usize;
        for entry in WalkDir::new(source_dir).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() || entry.path() == output_path {
                continue;
            }
            check()?;

            let name = entry_name(source_dir, entry.path())?;
            zip.start_file(name, options)?;
            let mut input = File::open(entry.path())?;
            io::copy(&mut input, &mut zip)?;
            entries += 1;
        }

        let mut writer = zip.finish()?;
        io::Write::flush(&mut writer)?;
        check()?;

        debug!(
            "Wrote {} entries from {} to {}",
            entries,
            source_dir.display(),
            output_path.display()
        );
        Ok(output_path.to_path_buf())
    }
}

struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

fn entry_name(source_dir: &Path, path: &Path) -> Result<String, ArchiveError> {
    let relative = path
        .strip_prefix(source_dir)
        .map_err(|_| ArchiveError::OutsideSource(path.to_path_buf()))?;

    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}
