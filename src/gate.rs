use std::io;
use std::path::{Path, PathBuf};

/// Whether a new report run may start. Polled once per run, before any input
/// is read; a run already in progress is never interrupted.
pub trait LockGate {
    fn is_locked(&self) -> bool;
}

/// Gate for setups without a remote control channel.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unlocked;

impl LockGate for Unlocked {
    fn is_locked(&self) -> bool {
        false
    }
}

/// Lock state kept in a small status file owned by the control channel.
///
/// The file holds `locked`/`bloqueado` or `unlocked`/`desbloqueado`. Anything
/// else, including a missing file, reads as locked.
#[derive(Debug, Clone)]
pub struct FileLockGate {
    path: PathBuf,
}

impl FileLockGate {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileLockGate { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn set_locked(&self, locked: bool) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, if locked { "locked" } else { "unlocked" })
    }
}

impl LockGate for FileLockGate {
    fn is_locked(&self) -> bool {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => !matches!(
                raw.trim().to_lowercase().as_str(),
                "unlocked" | "desbloqueado"
            ),
            Err(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_or_garbled_status_reads_locked() {
        let dir = tempfile::tempdir().unwrap();
        let gate = FileLockGate::new(dir.path().join("status"));
        assert!(gate.is_locked());

        std::fs::write(gate.path(), "maybe").unwrap();
        assert!(gate.is_locked());
    }

    #[test]
    fn toggles_through_the_status_file() {
        let dir = tempfile::tempdir().unwrap();
        let gate = FileLockGate::new(dir.path().join("state").join("status"));

        gate.set_locked(false).unwrap();
        assert!(!gate.is_locked());
        gate.set_locked(true).unwrap();
        assert!(gate.is_locked());

        std::fs::write(gate.path(), " Desbloqueado\n").unwrap();
        assert!(!gate.is_locked());
        assert!(!Unlocked.is_locked());
    }
}
