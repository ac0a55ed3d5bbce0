use std::path::{Path, PathBuf};

/// Scratch files owned by one encode call. Every tracked path is removed when
/// the guard is dropped, whichever way the call exits.
#[derive(Debug, Default)]
pub struct ScratchFiles {
    paths: Vec<PathBuf>,
}

impl ScratchFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `path` before it is created so a partial write is removed too.
    pub fn push(&mut self, path: PathBuf) {
        self.paths.push(path);
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn remove_all(&mut self) {
        for path in self.paths.drain(..) {
            remove_file_best_effort(&path);
        }
    }
}

impl Drop for ScratchFiles {
    fn drop(&mut self) {
        self.remove_all();
    }
}

/// Removes a file, treating "already gone" as success. Failures are logged only.
pub fn remove_file_best_effort(path: &Path) -> bool {
    match std::fs::remove_file(path) {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(e) => {
            log::warn!("failed to remove temp file {}: {}", path.display(), e);
            false
        }
    }
}

/// Removes `dir` when nothing is left in it. Files this process did not
/// track keep the directory alive.
pub fn remove_dir_if_empty(dir: &Path) {
    match std::fs::remove_dir(dir) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::debug!("scratch directory {} not removed: {}", dir.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_removes_files_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.jpg");
        let b = dir.path().join("b.jpg");
        std::fs::write(&a, b"a").unwrap();
        {
            let mut files = ScratchFiles::new();
            files.push(a.clone());
            // never created; must not trip the guard
            files.push(b.clone());
            assert_eq!(files.len(), 2);
        }
        assert!(!a.exists());
        assert!(!b.exists());
    }

    #[test]
    fn test_remove_dir_if_empty_keeps_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = dir.path().join("session");
        std::fs::create_dir(&scratch).unwrap();
        let foreign = scratch.join("left_over.mp4");
        std::fs::write(&foreign, b"x").unwrap();

        remove_dir_if_empty(&scratch);
        assert!(foreign.exists());

        std::fs::remove_file(&foreign).unwrap();
        remove_dir_if_empty(&scratch);
        assert!(!scratch.exists());

        // already gone
        remove_dir_if_empty(&scratch);
    }
}
