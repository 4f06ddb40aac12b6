//! Credential storage.
//!
//! A [`Credential`] is the opaque bearer token the backend issued at
//! login. Exactly one is stored per client profile, under the fixed key
//! [`CREDENTIAL_KEY`]. Its absence means "logged out".
//!
//! Storage goes through the [`CredentialStore`] trait so the session
//! manager never cares where the token lives:
//! - [`FileCredentialStore`] keeps it in a file on disk
//! - [`MemoryCredentialStore`] keeps it in memory (tests, ephemeral CLIs)

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::SessionError;

/// The storage key for the credential. The file store uses it as the
/// file name.
pub const CREDENTIAL_KEY: &str = "token";

/// An opaque bearer token.
///
/// `Debug` is redacted so the token never lands in logs. Use
/// [`expose`](Self::expose) when it actually has to go on the wire.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wraps a raw token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Persistent storage for the single active credential.
///
/// # Example
///
/// ```rust
/// use tether_session::{Credential, CredentialStore, MemoryCredentialStore};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let store = MemoryCredentialStore::default();
/// store.store(&Credential::new("abc")).await.unwrap();
/// assert_eq!(store.load().await.unwrap(), Some(Credential::new("abc")));
///
/// store.clear().await.unwrap();
/// assert_eq!(store.load().await.unwrap(), None);
/// # }
/// ```
pub trait CredentialStore: Send + Sync + 'static {
    /// Reads the stored credential, `None` if there is none.
    fn load(
        &self,
    ) -> impl std::future::Future<Output = Result<Option<Credential>, SessionError>> + Send;

    /// Replaces the stored credential.
    fn store(
        &self,
        credential: &Credential,
    ) -> impl std::future::Future<Output = Result<(), SessionError>> + Send;

    /// Deletes the stored credential. Succeeds if there was none.
    fn clear(&self) -> impl std::future::Future<Output = Result<(), SessionError>> + Send;
}

// ---------------------------------------------------------------------------
// MemoryCredentialStore
// ---------------------------------------------------------------------------

/// Keeps the credential in memory. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    slot: Arc<Mutex<Option<Credential>>>,
}

impl MemoryCredentialStore {
    /// Creates a store that already holds `credential`.
    pub fn with_credential(credential: Credential) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(credential))),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    async fn load(&self) -> Result<Option<Credential>, SessionError> {
        Ok(self.slot.lock().await.clone())
    }

    async fn store(&self, credential: &Credential) -> Result<(), SessionError> {
        *self.slot.lock().await = Some(credential.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), SessionError> {
        self.slot.lock().await.take();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FileCredentialStore
// ---------------------------------------------------------------------------

/// Keeps the credential in `<dir>/token`.
///
/// The directory is created on first write. Surrounding whitespace is
/// trimmed on read and an empty file counts as no credential.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Creates a store rooted at `dir`.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(CREDENTIAL_KEY),
        }
    }

    /// The file the credential is kept in.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> Result<Option<Credential>, SessionError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => {
                let token = contents.trim();
                Ok((!token.is_empty()).then(|| Credential::new(token)))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn store(&self, credential: &Credential) -> Result<(), SessionError> {
        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(&self.path, credential.expose()).await?;
        tracing::debug!(path = %self.path.display(), "stored credential");
        Ok(())
    }

    async fn clear(&self) -> Result<(), SessionError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "cleared credential");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
