//! Per-conversation scratch directories
//!
//! Layout under the downloads root:
//!
//! ```text
//! downloads/
//!   {chat_id}/                      staged media for the in-flight request
//!   instagram_media_{chat_id}.zip   transient archive
//! ```
//!
//! Both paths are removed when the request finishes, whatever the outcome.

use std::io;
use std::path::{Path, PathBuf};

use instagram_types::{ConversationId, StagedFile};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Allocates and tears down scratch workspaces
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
}

/// Scratch space owned by exactly one in-flight request
#[derive(Debug, Clone)]
pub struct ScratchWorkspace {
    pub conversation: ConversationId,
    pub dir: PathBuf,
    pub archive_path: PathBuf,
}

impl WorkspaceManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the downloads root and remove the scratch paths a previous
    /// process left behind. Only `{chat_id}/` directories and
    /// `instagram_media_{chat_id}.zip` files are touched.
    pub async fn prepare(&self) -> io::Result<usize> {
        tokio::fs::create_dir_all(&self.root).await?;

        let mut removed = 0;
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let file_type = entry.file_type().await?;
            let result = if file_type.is_dir() && is_conversation_dir(&path) {
                tokio::fs::remove_dir_all(&path).await
            } else if is_transient_archive(&path) {
                tokio::fs::remove_file(&path).await
            } else {
                continue;
            };

            match result {
                Ok(()) => removed += 1,
                Err(e) => warn!("Failed to remove stale scratch path {}: {}", path.display(), e),
            }
        }

        if removed > 0 {
            info!("Removed {} stale scratch paths from {}", removed, self.root.display());
        }
        Ok(removed)
    }

    /// Allocate the workspace for a conversation.
    ///
    /// An existing directory is reused but emptied first.
    pub async fn acquire(&self, conversation: ConversationId) -> io::Result<ScratchWorkspace> {
        let workspace = self.workspace_for(conversation);

        match tokio::fs::remove_dir_all(&workspace.dir).await {
            Ok(()) => debug!("Cleared leftover workspace {}", workspace.dir.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        remove_if_exists(&workspace.archive_path).await?;

        tokio::fs::create_dir_all(&workspace.dir).await?;
        debug!("Acquired workspace {}", workspace.dir.display());
        Ok(workspace)
    }

    /// Remove every staged file, the directory itself and the transient
    /// archive. Already-removed paths are not an error.
    pub async fn release(&self, workspace: &ScratchWorkspace) -> io::Result<()> {
        let dir_result = match tokio::fs::remove_dir_all(&workspace.dir).await {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        };
        let archive_result = remove_if_exists(&workspace.archive_path).await;

        debug!("Released workspace {}", workspace.dir.display());
        dir_result.and(archive_result)
    }

    fn workspace_for(&self, conversation: ConversationId) -> ScratchWorkspace {
        ScratchWorkspace {
            conversation,
            dir: self.root.join(conversation.workspace_dir_name()),
            archive_path: self.root.join(conversation.archive_file_name()),
        }
    }
}

impl ScratchWorkspace {
    /// Every regular file under the workspace, sorted by path.
    ///
    /// Blocking; call from `spawn_blocking`.
    pub fn staged_files(&self) -> io::Result<Vec<StagedFile>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.dir).sort_by_file_name() {
            let entry = entry.map_err(io::Error::from)?;
            if entry.file_type().is_file() {
                files.push(StagedFile::new(entry.into_path()));
            }
        }
        Ok(files)
    }
}

/// Remove whatever sits at `path`, file or directory.
async fn remove_if_exists(path: &Path) -> io::Result<()> {
    let result = match tokio::fs::symlink_metadata(path).await {
        Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(path).await,
        Ok(_) => tokio::fs::remove_file(path).await,
        Err(e) => Err(e),
    };
    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

fn is_conversation_id(name: &str) -> bool {
    name.parse::<i64>().is_ok()
}

fn is_conversation_dir(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(is_conversation_id)
        .unwrap_or(false)
}

fn is_transient_archive(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.strip_prefix("instagram_media_"))
        .and_then(|n| n.strip_suffix(".zip"))
        .map(is_conversation_id)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use instagram_types::MediaKind;

    fn manager() -> (tempfile::TempDir, WorkspaceManager) {
        let tmp = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(tmp.path().join("downloads"));
        (tmp, manager)
    }

    #[tokio::test]
    async fn test_acquire_creates_conversation_dir() {
        let (_tmp, manager) = manager();
        let ws = manager.acquire(ConversationId::new(42)).await.unwrap();

        assert!(ws.dir.is_dir());
        assert_eq!(ws.dir, manager.root().join("42"));
        assert_eq!(ws.archive_path, manager.root().join("instagram_media_42.zip"));
        assert!(ws.staged_files().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_acquire_empties_leftovers() {
        let (_tmp, manager) = manager();
        let id = ConversationId::new(42);
        let ws = manager.acquire(id).await.unwrap();
        std::fs::write(ws.dir.join("old.jpg"), b"old").unwrap();
        std::fs::write(&ws.archive_path, b"zip").unwrap();

        let ws = manager.acquire(id).await.unwrap();
        assert!(ws.staged_files().unwrap().is_empty());
        assert!(!ws.archive_path.exists());
    }

    #[tokio::test]
    async fn test_release_removes_everything() {
        let (_tmp, manager) = manager();
        let ws = manager.acquire(ConversationId::new(-100)).await.unwrap();
        std::fs::create_dir_all(ws.dir.join("nested")).unwrap();
        std::fs::write(ws.dir.join("a.jpg"), b"a").unwrap();
        std::fs::write(ws.dir.join("nested/b.mp4"), b"b").unwrap();
        std::fs::write(&ws.archive_path, b"zip").unwrap();

        manager.release(&ws).await.unwrap();

        assert!(!ws.dir.exists());
        assert!(!ws.archive_path.exists());
    }

    #[tokio::test]
    async fn test_release_removes_directory_at_archive_path() {
        let (_tmp, manager) = manager();
        let ws = manager.acquire(ConversationId::new(5)).await.unwrap();
        std::fs::create_dir_all(ws.archive_path.join("inner")).unwrap();

        manager.release(&ws).await.unwrap();

        assert!(!ws.archive_path.exists());
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let (_tmp, manager) = manager();
        let ws = manager.acquire(ConversationId::new(1)).await.unwrap();
        manager.release(&ws).await.unwrap();
        manager.release(&ws).await.unwrap();
        assert!(!ws.dir.exists());
    }

    #[tokio::test]
    async fn test_conversations_are_isolated() {
        let (_tmp, manager) = manager();
        let a = manager.acquire(ConversationId::new(1)).await.unwrap();
        let b = manager.acquire(ConversationId::new(2)).await.unwrap();
        std::fs::write(a.dir.join("a.jpg"), b"a").unwrap();

        assert_ne!(a.dir, b.dir);
        assert!(b.staged_files().unwrap().is_empty());

        manager.release(&b).await.unwrap();
        assert_eq!(a.staged_files().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_staged_files_sorted_and_classified() {
        let (_tmp, manager) = manager();
        let ws = manager.acquire(ConversationId::new(5)).await.unwrap();
        std::fs::write(ws.dir.join("b.mp4"), b"v").unwrap();
        std::fs::write(ws.dir.join("a.jpg"), b"i").unwrap();
        std::fs::write(ws.dir.join("c.txt"), b"t").unwrap();

        let files = ws.staged_files().unwrap();
        let kinds: Vec<MediaKind> = files.iter().map(|f| f.kind).collect();
        assert_eq!(kinds, vec![MediaKind::Image, MediaKind::Video, MediaKind::Unknown]);
        assert_eq!(files[0].file_name(), Some("a.jpg"));
    }

    #[tokio::test]
    async fn test_prepare_removes_stale_paths() {
        let (_tmp, manager) = manager();
        std::fs::create_dir_all(manager.root().join("77")).unwrap();
        std::fs::write(manager.root().join("77/old.jpg"), b"x").unwrap();
        std::fs::write(manager.root().join("instagram_media_77.zip"), b"z").unwrap();
        std::fs::write(manager.root().join("README"), b"keep").unwrap();

        let removed = manager.prepare().await.unwrap();

        assert_eq!(removed, 2);
        assert!(!manager.root().join("77").exists());
        assert!(manager.root().join("README").exists());
    }

    #[tokio::test]
    async fn test_prepare_keeps_unrelated_directories() {
        let (_tmp, manager) = manager();
        let project = manager.root().join("important-project/src");
        std::fs::create_dir_all(&project).unwrap();
        std::fs::write(project.join("main.rs"), b"fn main() {}").unwrap();
        std::fs::create_dir_all(manager.root().join("-1001234")).unwrap();
        std::fs::write(manager.root().join("instagram_media_backup.zip"), b"z").unwrap();

        let removed = manager.prepare().await.unwrap();

        assert_eq!(removed, 1);
        assert!(project.join("main.rs").exists());
        assert!(manager.root().join("instagram_media_backup.zip").exists());
        assert!(!manager.root().join("-1001234").exists());
    }
}
