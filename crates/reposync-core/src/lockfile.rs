use anyhow::Context;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Exclusive gate held for the length of one run. Released on drop.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    file: File,
}

impl RunLock {
    /// `Ok(None)` when another run already holds the gate.
    pub fn try_acquire(path: &Path) -> anyhow::Result<Option<Self>> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("create lock directory")?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("open run lock {}", path.display()))?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                file.set_len(0).context("truncate run lock")?;
                file.seek(SeekFrom::Start(0)).context("rewind run lock")?;
                write!(file, "{}", std::process::id()).context("record lock holder")?;
                file.flush().context("flush run lock")?;
                Ok(Some(Self {
                    path: path.to_path_buf(),
                    file,
                }))
            }
            Err(err) if is_lock_held(&err) => Ok(None),
            Err(err) => Err(err).context("lock run gate"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// Process id written by the current holder, if it can be read.
pub fn holder_pid(path: &Path) -> Option<u32> {
    let mut contents = String::new();
    File::open(path).ok()?.read_to_string(&mut contents).ok()?;
    contents.trim().parse().ok()
}

fn is_lock_held(err: &std::io::Error) -> bool {
    if err.kind() == std::io::ErrorKind::WouldBlock {
        return true;
    }
    // ERROR_LOCK_VIOLATION
    matches!(err.raw_os_error(), Some(33))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn second_run_is_gated_until_first_releases() {
        let tmp = TempDir::new().unwrap();
        let lock_path = tmp.path().join("run").join("reposync.lock");
        let first = RunLock::try_acquire(&lock_path).unwrap();
        assert!(first.is_some());
        assert_eq!(holder_pid(&lock_path), Some(std::process::id()));
        assert!(RunLock::try_acquire(&lock_path).unwrap().is_none());

        drop(first);
        assert!(RunLock::try_acquire(&lock_path).unwrap().is_some());
    }
}
