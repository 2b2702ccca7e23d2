//! Artifact storage for issuance runs
//!
//! Each run keeps its artifacts in a namespace of its own. The set of keys
//! present in that namespace is the entire persisted state of the pipeline.
//!
//! # Directory Structure
//!
//! ```text
//! root/
//! └── alice@example.com/
//!     ├── private_key.pem              # RSA private key (PKCS#1 PEM)
//!     ├── revocation_password.txt
//!     ├── collection_password.txt
//!     ├── certificate_chain.pem
//!     └── certificate_key_bundle.p12   # PKCS#12, no passphrase
//! ```

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, trace};

use crate::artifact::ArtifactKey;
use crate::error::StoreError;
use crate::ids::RunId;

/// Key-value contract the issuer keeps its state in.
///
/// Implementations must make each `write` atomic per key and immediately
/// visible to later `exists`/`read` calls. Nothing beyond per-key atomicity
/// is required.
pub trait ArtifactStore: Send + Sync {
    /// Whether `key` has been written for `run`.
    fn exists(&self, run: &RunId, key: ArtifactKey) -> Result<bool, StoreError>;

    /// Read a previously written artifact.
    fn read(&self, run: &RunId, key: ArtifactKey) -> Result<Vec<u8>, StoreError>;

    /// Persist an artifact. Artifacts are write-once; writing an existing
    /// key fails with [`StoreError::AlreadyExists`].
    fn write(&self, run: &RunId, key: ArtifactKey, data: &[u8]) -> Result<(), StoreError>;

    /// Filesystem location of an artifact, for collaborators that need a path.
    fn path(&self, run: &RunId, key: ArtifactKey) -> PathBuf;

    /// Where the artifacts of `run` live.
    fn location(&self, run: &RunId) -> PathBuf;

    /// Read an artifact as UTF-8 text.
    fn read_text(&self, run: &RunId, key: ArtifactKey) -> Result<String, StoreError> {
        let bytes = self.read(run, key)?;
        String::from_utf8(bytes).map_err(|e| {
            StoreError::io(
                self.path(run, key),
                io::Error::new(io::ErrorKind::InvalidData, e),
            )
        })
    }
}

/// Filesystem-backed artifact store
///
/// One directory per run under a common root. Writes go to a temporary file
/// in the run directory and are renamed into place without clobbering, so a
/// crash leaves either the whole artifact or none of it.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    /// Root directory holding one subdirectory per run
    root: PathBuf,
}

impl FsArtifactStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(root: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(root).map_err(|e| StoreError::io(root, e))?;

        debug!(root = %root.display(), "Opened artifact store");

        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Get the store root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the run directory with restrictive permissions (0700 on Unix).
    fn ensure_run_dir(&self, run: &RunId) -> Result<PathBuf, StoreError> {
        let dir = self.location(run);
        if dir.is_dir() {
            return Ok(dir);
        }

        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&dir, fs::Permissions::from_mode(0o700))
                .map_err(|e| StoreError::io(&dir, e))?;
        }

        info!(run = %run, path = %dir.display(), "Created issuance run directory");
        Ok(dir)
    }
}

impl ArtifactStore for FsArtifactStore {
    fn exists(&self, run: &RunId, key: ArtifactKey) -> Result<bool, StoreError> {
        let path = self.path(run, key);
        path.try_exists().map_err(|e| StoreError::io(&path, e))
    }

    fn read(&self, run: &RunId, key: ArtifactKey) -> Result<Vec<u8>, StoreError> {
        let path = self.path(run, key);

        match fs::read(&path) {
            Ok(data) => {
                trace!(run = %run, artifact = %key, bytes = data.len(), "Read artifact");
                Ok(data)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StoreError::NotFound {
                run: run.clone(),
                key,
            }),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    fn write(&self, run: &RunId, key: ArtifactKey, data: &[u8]) -> Result<(), StoreError> {
        let dir = self.ensure_run_dir(run)?;
        let path = dir.join(key.file_name());

        // Temporary files are created 0600, which the rename preserves.
        let mut partial = tempfile::Builder::new()
            .prefix(".partial-")
            .tempfile_in(&dir)
            .map_err(|e| StoreError::io(&dir, e))?;
        partial
            .write_all(data)
            .and_then(|()| partial.as_file().sync_all())
            .map_err(|e| StoreError::io(partial.path(), e))?;

        partial.persist_noclobber(&path).map_err(|e| {
            if e.error.kind() == io::ErrorKind::AlreadyExists {
                StoreError::AlreadyExists {
                    run: run.clone(),
                    key,
                }
            } else {
                StoreError::io(&path, e.error)
            }
        })?;

        info!(
            run = %run,
            artifact = %key,
            path = %path.display(),
            bytes = data.len(),
            "Saved artifact"
        );
        Ok(())
    }

    fn path(&self, run: &RunId, key: ArtifactKey) -> PathBuf {
        self.location(run).join(key.file_name())
    }

    fn location(&self, run: &RunId) -> PathBuf {
        self.root.join(run.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_store() -> (TempDir, FsArtifactStore, RunId) {
        let temp_dir = TempDir::new().unwrap();
        let store = FsArtifactStore::new(temp_dir.path()).unwrap();
        let run = RunId::new("alice@example.com").unwrap();
        (temp_dir, store, run)
    }

    #[test]
    fn test_store_creation() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("nested").join("root");
        let store = FsArtifactStore::new(&root).unwrap();
        assert!(store.root().is_dir());
    }

    #[test]
    fn test_write_then_read() {
        let (_temp_dir, store, run) = setup_store();

        assert!(!store.exists(&run, ArtifactKey::PrivateKey).unwrap());
        store.write(&run, ArtifactKey::PrivateKey, b"key bytes").unwrap();

        assert!(store.exists(&run, ArtifactKey::PrivateKey).unwrap());
        assert_eq!(store.read(&run, ArtifactKey::PrivateKey).unwrap(), b"key bytes");
        assert_eq!(
            store.path(&run, ArtifactKey::PrivateKey),
            store.location(&run).join("private_key.pem")
        );
    }

    #[test]
    fn test_read_missing_artifact() {
        let (_temp_dir, store, run) = setup_store();

        let err = store.read(&run, ArtifactKey::Bundle).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { key: ArtifactKey::Bundle, .. }));
    }

    #[test]
    fn test_artifacts_are_write_once() {
        let (_temp_dir, store, run) = setup_store();

        store.write(&run, ArtifactKey::CollectionPassword, b"first").unwrap();
        let err = store
            .write(&run, ArtifactKey::CollectionPassword, b"second")
            .unwrap_err();

        assert!(matches!(err, StoreError::AlreadyExists { .. }));
        assert_eq!(
            store.read(&run, ArtifactKey::CollectionPassword).unwrap(),
            b"first"
        );
    }

    #[test]
    fn test_no_partial_files_left_behind() {
        let (_temp_dir, store, run) = setup_store();

        store.write(&run, ArtifactKey::PrivateKey, b"a").unwrap();
        let _ = store.write(&run, ArtifactKey::PrivateKey, b"b");
        store.write(&run, ArtifactKey::CertificateChain, b"c").unwrap();

        let mut names: Vec<_> = fs::read_dir(store.location(&run))
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();

        assert_eq!(names, vec!["certificate_chain.pem", "private_key.pem"]);
    }

    #[test]
    fn test_runs_are_isolated() {
        let (_temp_dir, store, alice) = setup_store();
        let bob = RunId::new("bob@example.com").unwrap();

        store.write(&alice, ArtifactKey::PrivateKey, b"alice").unwrap();

        assert!(!store.exists(&bob, ArtifactKey::PrivateKey).unwrap());
    }

    #[test]
    fn test_read_text() {
        let (_temp_dir, store, run) = setup_store();

        store.write(&run, ArtifactKey::RevocationPassword, b"hunter2").unwrap();
        assert_eq!(
            store.read_text(&run, ArtifactKey::RevocationPassword).unwrap(),
            "hunter2"
        );

        store.write(&run, ArtifactKey::Bundle, &[0xff, 0xfe]).unwrap();
        assert!(store.read_text(&run, ArtifactKey::Bundle).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let (_temp_dir, store, run) = setup_store();
        store.write(&run, ArtifactKey::PrivateKey, b"secret").unwrap();

        let dir_mode = fs::metadata(store.location(&run)).unwrap().permissions().mode();
        let file_mode = fs::metadata(store.path(&run, ArtifactKey::PrivateKey))
            .unwrap()
            .permissions()
            .mode();

        assert_eq!(dir_mode & 0o777, 0o700);
        assert_eq!(file_mode & 0o777, 0o600);
    }
}
