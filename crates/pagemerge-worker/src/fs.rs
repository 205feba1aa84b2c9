//! Filesystem moves shared by relocation and artifact delivery.

use std::io;
use std::path::{Path, PathBuf};

/// `EXDEV`: rename across filesystems.
const CROSS_DEVICE: i32 = 18;

/// Whether a failed rename was caused by a cross-device move.
pub fn is_cross_device(err: &io::Error) -> bool {
    err.raw_os_error() == Some(CROSS_DEVICE) || err.kind() == io::ErrorKind::CrossesDevices
}

/// Move a directory, copying then deleting when `rename` cannot cross devices.
pub async fn move_dir(from: &Path, to: &Path) -> io::Result<()> {
    match tokio::fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device(&e) => {
            copy_dir_recursive(from, to).await?;
            tokio::fs::remove_dir_all(from).await
        }
        Err(e) => Err(e),
    }
}

/// Move a file, copying then deleting when `rename` cannot cross devices.
pub async fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match tokio::fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device(&e) => {
            tokio::fs::copy(from, to).await?;
            tokio::fs::remove_file(from).await
        }
        Err(e) => Err(e),
    }
}

async fn copy_dir_recursive(from: &Path, to: &Path) -> io::Result<()> {
    let mut pending: Vec<(PathBuf, PathBuf)> = vec![(from.to_path_buf(), to.to_path_buf())];

    while let Some((src, dst)) = pending.pop() {
        tokio::fs::create_dir(&dst).await?;
        let mut entries = tokio::fs::read_dir(&src).await?;
        while let Some(entry) = entries.next_entry().await? {
            let target = dst.join(entry.file_name());
            if entry.file_type().await?.is_dir() {
                pending.push((entry.path(), target));
            } else {
                tokio::fs::copy(entry.path(), &target).await?;
            }
        }
    }
    Ok(())
}

/// Regular files directly inside `dir`, sorted by file name.
///
/// Sorting fixes the page order the merge sees regardless of how the
/// platform enumerates the directory.
pub async fn list_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}
