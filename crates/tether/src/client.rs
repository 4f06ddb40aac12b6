//! `TetherClient`: the session manager wired to real collaborators.
//!
//! This is the entry point for applications. It ties together all the
//! layers: HTTP auth API + credential file → session, WebSocket →
//! realtime link.

use std::sync::Arc;

use tether_protocol::EventFrame;
use tether_realtime::ConnectionManager;
use tether_session::{
    AuthApi, Credential, CredentialStore, FileCredentialStore, HttpAuthApi, Profile, Session,
    SessionError, SessionManager,
};
use tether_transport::{Connector, WebSocketConnector};
use tokio::sync::{OnceCell, broadcast, watch};

use crate::{ClientConfig, TetherError};

/// How startup ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Startup {
    /// The stored credential is valid; the realtime link is bound.
    SignedIn(Profile),
    /// No credential, or the backend refused it.
    SignedOut,
    /// The backend couldn't be reached. The credential was kept, so
    /// [`SessionManager::check_auth_state`] can be retried later.
    Unverified,
}

impl Startup {
    fn from_check(result: Result<Profile, SessionError>) -> Self {
        match result {
            Ok(profile) => Self::SignedIn(profile),
            Err(SessionError::TransientFailure(_) | SessionError::Storage(_)) => {
                Self::Unverified
            }
            Err(_) => Self::SignedOut,
        }
    }
}

/// A configured client: one session manager, one realtime link.
///
/// The type parameters default to the production stack (HTTP, credential
/// file, WebSocket); tests can substitute any of them via
/// [`from_manager`](Self::from_manager).
///
/// Cheap to clone; clones share the session and the startup result.
///
/// # Example
///
/// ```rust,no_run
/// use tether::prelude::*;
///
/// # async fn run() -> Result<(), TetherError> {
/// let client = TetherClient::from_config(ClientConfig::from_env()?)?;
///
/// if let Startup::SignedIn(profile) = client.start().await {
///     println!("hello {}", profile.name);
/// }
///
/// client.logout().await;
/// # Ok(())
/// # }
/// ```
pub struct TetherClient<
    A = HttpAuthApi,
    S = FileCredentialStore,
    C: Connector = WebSocketConnector,
> {
    session: Arc<SessionManager<A, S, C>>,
    started: Arc<OnceCell<Startup>>,
}

impl<A, S, C: Connector> Clone for TetherClient<A, S, C> {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
            started: Arc::clone(&self.started),
        }
    }
}

impl TetherClient {
    /// Builds the production client described by `config`.
    ///
    /// Nothing touches the network until [`start`](Self::start).
    ///
    /// # Errors
    /// [`TetherError::Api`] if the HTTP client can't be built.
    pub fn from_config(config: ClientConfig) -> Result<Self, TetherError> {
        let api = HttpAuthApi::new(
            config.api_base(),
            config.http.timeout,
            config.http.connect_timeout,
        )?;
        let store = FileCredentialStore::new(&config.credential_path);
        let connection = ConnectionManager::new(
            WebSocketConnector::new(config.http.connect_timeout),
            config.realtime.clone(),
        );

        tracing::debug!(
            mode = %config.mode,
            backend = %config.backend_url,
            realtime = %config.realtime.endpoint,
            "client configured"
        );
        Ok(Self::from_manager(SessionManager::new(api, store, connection)))
    }
}

impl<A, S, C> TetherClient<A, S, C>
where
    A: AuthApi,
    S: CredentialStore,
    C: Connector,
{
    /// Wraps an already-built session manager.
    pub fn from_manager(manager: SessionManager<A, S, C>) -> Self {
        Self {
            session: Arc::new(manager),
            started: Arc::new(OnceCell::new()),
        }
    }

    /// Runs the startup auth check.
    ///
    /// Only the first call does any work. Concurrent and later calls wait
    /// for it and get the same answer.
    pub async fn start(&self) -> Startup {
        self.started
            .get_or_init(|| async {
                tracing::info!("checking stored session");
                Startup::from_check(self.session.check_auth_state().await)
            })
            .await
            .clone()
    }

    /// The startup result, if [`start`](Self::start) has finished.
    pub fn startup(&self) -> Option<&Startup> {
        self.started.get()
    }

    /// A snapshot of the current session.
    pub fn session(&self) -> Session {
        self.session.session()
    }

    /// Subscribes to session changes.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.session.subscribe()
    }

    /// Subscribes to events the server pushes on the realtime link.
    pub fn events(&self) -> broadcast::Receiver<EventFrame> {
        self.session.connection().incoming()
    }

    /// Stores a credential from a login flow. Run
    /// [`SessionManager::check_auth_state`] through [`manager`](Self::manager)
    /// to sign in with it.
    ///
    /// # Errors
    /// [`TetherError::Session`] if the credential can't be written.
    pub async fn set_credential(&self, credential: Credential) -> Result<(), TetherError> {
        Ok(self.session.set_credential(credential).await?)
    }

    /// Logs out. Always leaves the client signed out locally.
    pub async fn logout(&self) {
        self.session.logout().await;
    }

    /// The underlying session manager.
    pub fn manager(&self) -> &SessionManager<A, S, C> {
        &self.session
    }
}
