//! The session manager: authentication state and its realtime side effects.
//!
//! `SessionManager` owns the [`Session`] and is the only thing that
//! changes it. It's responsible for:
//! - Checking the stored credential against the backend on start
//! - Binding the realtime link to the user once they're confirmed
//! - Refreshing the profile on demand
//! - Logging out, always, even when the backend is unreachable
//!
//! ## Ordering
//!
//! ```text
//! check_auth_state:  load credential → is-auth → Session{authenticated} → initialize_for_user
//! logout:            backend logout → teardown link → clear credential → Session::default()
//! ```
//!
//! The link is only bound after the session is authenticated, and torn
//! down before the credential that authorized it is deleted. A later check
//! that fails unbinds it the same way.
//!
//! Applying a check result, storing a credential and logging out run one
//! at a time, so a logout can't slip between a check's freshness test and
//! the realtime binding that follows it.
//!
//! ## Stale results
//!
//! Every operation that replaces the session or the credential bumps a
//! generation counter. A check or fetch remembers the generation it
//! started under and drops its result if the counter moved while it was
//! waiting on the backend, so a slow `is-auth` can't sign the user back
//! in after they logged out.

use std::sync::atomic::{AtomicU64, Ordering};

use tether_protocol::UserId;
use tether_realtime::{ConnectionManager, RealtimeError};
use tether_transport::Connector;
use tokio::sync::{Mutex, watch};

use crate::{ApiError, AuthApi, Credential, CredentialStore, Profile, Session, SessionError};

/// Orchestrates authentication state, the credential, and the realtime
/// link.
///
/// Generic over its three collaborators so each can be swapped out:
/// - `A`: the backend's auth endpoints ([`AuthApi`])
/// - `S`: where the credential lives ([`CredentialStore`])
/// - `C`: how the realtime link is opened
///   ([`Connector`](tether_transport::Connector))
///
/// The connection manager is injected rather than created here, so the
/// process decides how many links exist (one).
pub struct SessionManager<A, S, C: Connector> {
    api: A,
    store: S,
    connection: ConnectionManager<C>,
    state: watch::Sender<Session>,
    generation: AtomicU64,
    transition: Mutex<()>,
}

impl<A, S, C> SessionManager<A, S, C>
where
    A: AuthApi,
    S: CredentialStore,
    C: Connector,
{
    /// Creates a signed-out session manager.
    pub fn new(api: A, store: S, connection: ConnectionManager<C>) -> Self {
        let (state, _) = watch::channel(Session::default());
        Self {
            api,
            store,
            connection,
            state,
            generation: AtomicU64::new(0),
            transition: Mutex::new(()),
        }
    }

    /// A snapshot of the current session.
    pub fn session(&self) -> Session {
        self.state.borrow().clone()
    }

    /// Subscribes to session changes.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    /// The realtime connection this session drives.
    pub fn connection(&self) -> &ConnectionManager<C> {
        &self.connection
    }

    // -----------------------------------------------------------------------
    // check_auth_state
    // -----------------------------------------------------------------------

    /// Validates the stored credential and updates the session.
    ///
    /// Meant to run once per start, before anything else needs the
    /// session. `loading` is `true` for exactly the duration of the call,
    /// including when the call is cancelled midway.
    ///
    /// On success the session becomes authenticated and the realtime link
    /// is bound to the user. A realtime failure is logged and does not
    /// affect the result.
    ///
    /// # Errors
    /// Every error except `Superseded` leaves the session signed out and the
    /// realtime link unbound:
    /// - [`SessionError::NoCredential`]: nothing stored; the backend was
    ///   not contacted.
    /// - [`SessionError::NotAuthenticated`]: backend said no; credential kept.
    /// - [`SessionError::AuthRejected`]: backend rejected the credential;
    ///   realtime link torn down, then the credential deleted.
    /// - [`SessionError::TransientFailure`]: backend unreachable;
    ///   credential kept.
    /// - [`SessionError::Storage`]: the credential couldn't be read.
    /// - [`SessionError::Superseded`]: a logout or a new credential came in
    ///   meanwhile; the session was left as that operation set it.
    pub async fn check_auth_state(&self) -> Result<Profile, SessionError> {
        let generation = self.current_generation();
        self.state.send_modify(|s| s.loading = true);
        let _loading = LoadingGuard(&self.state);

        let outcome = self.verify_credential().await;

        let _transition = self.transition.lock().await;
        let fresh = self.is_current(generation);
        self.state.send_modify(|s| {
            if fresh {
                match &outcome {
                    Ok(profile) => {
                        s.authenticated = true;
                        s.user = Some(profile.clone());
                    }
                    Err(_) => {
                        s.authenticated = false;
                        s.user = None;
                    }
                }
            }
            s.loading = false;
        });

        if !fresh {
            tracing::debug!("discarding stale auth check result");
            return Err(SessionError::Superseded);
        }

        match outcome {
            Ok(profile) => {
                tracing::info!(user_id = %profile.id, "user authenticated");
                self.bind_realtime(&profile.id).await;
                Ok(profile)
            }
            Err(SessionError::AuthRejected { status }) => {
                tracing::warn!(status, "credential rejected, deleting it");
                self.unbind_realtime().await;
                if let Err(e) = self.store.clear().await {
                    tracing::warn!(error = %e, "failed to delete rejected credential");
                }
                Err(SessionError::AuthRejected { status })
            }
            Err(SessionError::NoCredential) => {
                tracing::debug!("no stored credential");
                self.unbind_realtime().await;
                Err(SessionError::NoCredential)
            }
            Err(e) => {
                tracing::info!(error = %e, "no authenticated user");
                self.unbind_realtime().await;
                Err(e)
            }
        }
    }

    /// Loads the credential and asks the backend about it. No side
    /// effects; the caller applies the outcome if it is still current.
    async fn verify_credential(&self) -> Result<Profile, SessionError> {
        let credential = self.store.load().await?.ok_or(SessionError::NoCredential)?;

        match self.api.is_authenticated(&credential).await {
            Ok(response) => response.into_profile().ok_or(SessionError::NotAuthenticated),
            Err(ApiError::Rejected { status }) => Err(SessionError::AuthRejected { status }),
            Err(e) => Err(SessionError::TransientFailure(e)),
        }
    }

    /// Binds the realtime link to `user_id`, replacing a binding left over
    /// from a different user.
    async fn bind_realtime(&self, user_id: &UserId) {
        let result = match self.connection.initialize_for_user(user_id).await {
            Err(RealtimeError::UserMismatch { active, .. }) => {
                tracing::info!(%active, %user_id, "rebinding realtime link to new user");
                self.connection.teardown().await;
                self.connection.initialize_for_user(user_id).await
            }
            other => other,
        };

        match result {
            Ok(outcome) => tracing::debug!(%user_id, ?outcome, "realtime ready"),
            Err(e) => tracing::warn!(%user_id, error = %e, "realtime initialization failed"),
        }
    }

    /// Tears down a link left bound by an earlier check.
    async fn unbind_realtime(&self) {
        if let Some(user_id) = self.connection.initialized_for_user().await {
            tracing::info!(%user_id, "session lost, tearing down realtime link");
        }
        self.connection.teardown().await;
    }

    // -----------------------------------------------------------------------
    // Profile
    // -----------------------------------------------------------------------

    /// Fetches the profile and replaces the session's user with it.
    ///
    /// Never changes `authenticated`. On any failure the user is cleared
    /// and `None` returned; the failure is only logged.
    pub async fn fetch_profile(&self) -> Option<Profile> {
        let generation = self.current_generation();
        let profile = self.request_profile().await;

        if !self.is_current(generation) {
            tracing::debug!("discarding stale profile");
            return None;
        }
        self.state.send_modify(|s| s.user = profile.clone());
        profile
    }

    /// Like [`fetch_profile`](Self::fetch_profile), but a failure leaves
    /// the current user in place. For refreshing after the user changed
    /// their profile elsewhere.
    pub async fn refresh_profile(&self) -> Option<Profile> {
        let generation = self.current_generation();
        let profile = self.request_profile().await?;

        if !self.is_current(generation) {
            tracing::debug!("discarding stale profile");
            return None;
        }
        self.state.send_modify(|s| s.user = Some(profile.clone()));
        Some(profile)
    }

    async fn request_profile(&self) -> Option<Profile> {
        let credential = self.load_quietly().await;

        match self.api.profile(credential.as_ref()).await {
            Ok(response) => {
                let profile = response.into_profile();
                if profile.is_none() {
                    tracing::debug!("profile request returned no user");
                }
                profile
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to fetch profile");
                None
            }
        }
    }

    // -----------------------------------------------------------------------
    // Credential lifecycle
    // -----------------------------------------------------------------------

    /// Stores a credential obtained by a login flow.
    ///
    /// Any check already in flight is superseded. Call
    /// [`check_auth_state`](Self::check_auth_state) afterwards to sign in
    /// with it.
    ///
    /// # Errors
    /// [`SessionError::Storage`] if the credential can't be written.
    pub async fn set_credential(&self, credential: Credential) -> Result<(), SessionError> {
        let _transition = self.transition.lock().await;
        self.bump_generation();
        self.store.store(&credential).await?;
        tracing::debug!("stored new credential");
        Ok(())
    }

    /// Logs out.
    ///
    /// Tells the backend, tears down the realtime link, deletes the
    /// credential and resets the session, in that order. Only the backend
    /// call may fail, and its failure doesn't stop the rest: afterwards
    /// the session is always signed out locally.
    pub async fn logout(&self) {
        self.bump_generation();
        let credential = self.load_quietly().await;

        if let Err(e) = self.api.logout(credential.as_ref()).await {
            tracing::warn!(error = %e, "backend logout failed, clearing local session anyway");
        }

        let _transition = self.transition.lock().await;
        self.connection.teardown().await;

        if let Err(e) = self.store.clear().await {
            tracing::warn!(error = %e, "failed to delete credential");
        }

        self.state.send_replace(Session::default());
        tracing::info!("logged out");
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    async fn load_quietly(&self) -> Option<Credential> {
        match self.store.load().await {
            Ok(credential) => credential,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read credential");
                None
            }
        }
    }

    fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn bump_generation(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    fn is_current(&self, generation: u64) -> bool {
        self.current_generation() == generation
    }
}

/// Clears `loading` when a check ends, however it ends.
struct LoadingGuard<'a>(&'a watch::Sender<Session>);

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0
            .send_if_modified(|s| std::mem::replace(&mut s.loading, false));
    }
}
