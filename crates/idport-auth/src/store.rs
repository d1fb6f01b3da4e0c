//! Credential persistence
//!
//! Exactly one credential record lives under a fixed path. All writes use
//! atomic temp-file + rename to prevent corruption on crash, and the file is
//! created with 0600 permissions since it contains live tokens.
//!
//! Loss or corruption of stored data is reported as "no stored credential",
//! never as an error: a client that cannot read its old token simply starts
//! logged out.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use tracing::{debug, warn};

use crate::credential::Credential;
use crate::error::StoreError;

/// Persistence capability for the single credential record.
///
/// `save` runs after every successful acquisition or refresh; `delete` after
/// every logout or terminal grant rejection. Implementations must treat
/// unreadable data as absent.
pub trait SecureStore: Send + Sync {
    fn save<'a>(
        &'a self,
        credential: &'a Credential,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>>;

    fn load(&self) -> Pin<Box<dyn Future<Output = Option<Credential>> + Send + '_>>;

    fn delete(&self) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>>;
}

/// File-backed credential store.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Store the credential record at the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SecureStore for FileCredentialStore {
    fn save<'a>(
        &'a self,
        credential: &'a Credential,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>> {
        Box::pin(async move {
            let json = serde_json::to_string_pretty(credential)
                .map_err(|e| StoreError::Io(format!("serializing credential: {e}")))?;
            write_atomic(&self.path, &json).await
        })
    }

    fn load(&self) -> Pin<Box<dyn Future<Output = Option<Credential>> + Send + '_>> {
        Box::pin(async move {
            let contents = match tokio::fs::read_to_string(&self.path).await {
                Ok(contents) => contents,
                Err(e) => {
                    debug!(path = %self.path.display(), error = %e, "no stored credential");
                    return None;
                }
            };
            match serde_json::from_str::<Credential>(&contents) {
                Ok(credential) => {
                    debug!(path = %self.path.display(), "loaded stored credential");
                    Some(credential)
                }
                Err(e) => {
                    warn!(
                        path = %self.path.display(),
                        error = %e,
                        "stored credential is unreadable, treating as absent"
                    );
                    None
                }
            }
        })
    }

    fn delete(&self) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async move {
            match tokio::fs::remove_file(&self.path).await {
                Ok(()) => {
                    debug!(path = %self.path.display(), "deleted stored credential");
                    Ok(())
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(StoreError::Io(format!("deleting credential file: {e}"))),
            }
        })
    }
}

/// Write the credential record atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target, so a crash mid-write cannot leave a torn record. Permissions
/// are restricted to the owner.
async fn write_atomic(path: &Path, json: &str) -> Result<(), StoreError> {
    let dir = path
        .parent()
        .ok_or_else(|| StoreError::Io("credential path has no parent directory".into()))?;

    let tmp_path = dir.join(format!(".credential.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| StoreError::Io(format!("writing temp credential file: {e}")))?;

    // Set 0600 permissions (unix only)
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| StoreError::Io(format!("setting credential file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| StoreError::Io(format!("renaming temp credential file: {e}")))?;

    debug!(path = %path.display(), "persisted credential");
    Ok(())
}

/// In-memory store for tests and embedders that manage persistence
/// themselves.
#[derive(Default)]
pub struct MemoryCredentialStore {
    slot: tokio::sync::Mutex<Option<Credential>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with an existing credential.
    pub fn with_credential(credential: Credential) -> Self {
        Self {
            slot: tokio::sync::Mutex::new(Some(credential)),
        }
    }
}

impl SecureStore for MemoryCredentialStore {
    fn save<'a>(
        &'a self,
        credential: &'a Credential,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>> {
        Box::pin(async move {
            *self.slot.lock().await = Some(credential.clone());
            Ok(())
        })
    }

    fn load(&self) -> Pin<Box<dyn Future<Output = Option<Credential>> + Send + '_>> {
        Box::pin(async move { self.slot.lock().await.clone() })
    }

    fn delete(&self) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async move {
            *self.slot.lock().await = None;
            Ok(())
        })
    }
}
