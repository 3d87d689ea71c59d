//! File-based locking: one Block (and so one salvage run) per data file.
//!
//! Cross-platform (fs2) advisory lock on a side file `<data file>.lock`.
//! Lock is released on Drop.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use crate::consts::LOCK_EXT;

pub struct LockGuard {
    file: std::fs::File,
    path: PathBuf,
}

impl LockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        // Ошибку unlock на drop некуда вернуть.
        let _ = FileExt::unlock(&self.file);
    }
}

/// Путь lock-файла для данного файла данных: `<path>.lock`.
pub fn lock_file_path(data_path: &Path) -> PathBuf {
    let mut s = data_path.as_os_str().to_owned();
    s.push(".");
    s.push(LOCK_EXT);
    PathBuf::from(s)
}

/// Try to acquire the exclusive lock. Returns Err if someone else holds it.
pub fn try_acquire_exclusive_lock(data_path: &Path) -> Result<LockGuard> {
    let path = lock_file_path(data_path);
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(&path)
        .with_context(|| format!("open lock file {}", path.display()))?;
    file.try_lock_exclusive()
        .with_context(|| format!("try_lock_exclusive failed: {}", path.display()))?;
    Ok(LockGuard { file, path })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_lock_on_same_file_fails() {
        let t = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let data = std::env::temp_dir().join(format!("bs-lock-{}-{}.bs", std::process::id(), t));

        let g = try_acquire_exclusive_lock(&data).unwrap();
        assert!(g.path().to_string_lossy().ends_with(".bs.lock"));
        assert!(try_acquire_exclusive_lock(&data).is_err());
        drop(g);
        let g2 = try_acquire_exclusive_lock(&data).unwrap();
        let _ = std::fs::remove_file(g2.path());
    }
}
