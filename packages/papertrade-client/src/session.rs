//! Session store: authentication lifecycle and credential persistence
//!
//! ```text
//! Anonymous -> Authenticating -> Authenticated
//!     ^              |                 |
//!     +--------------+-----------------+   (failure or logout)
//! ```
//!
//! Every login, registration and identity check takes a new session
//! generation when it starts. Its result is only committed, or rolled back,
//! if no other session operation (logout included) started in the meantime.
//! A superseded operation returns [`Error::Superseded`] and leaves state alone.
//!
//! Re-checking the token the session already holds keeps it `Authenticated`
//! while the check runs.
//!
//! The session epoch changes whenever the signed-in identity does: on every
//! reset to `Anonymous` and on a commit for a different user. Holders of
//! per-user state compare it against [`SessionStore::epoch`].

use std::sync::{Arc, Mutex};

use crate::api::{Gateway, RegisterRequest};
use crate::events::{EventBus, StateEvent};
use crate::state::{AuthPhase, SessionState};
use crate::{lock, Error, Result};
use papertrade_core::validation::{LoginForm, RegistrationForm};
use papertrade_core::{CredentialStore, Route, User, UserUpdate};

struct SessionCell {
    state: SessionState,
    generation: u64,
    epoch: u64,
}

struct SessionInner {
    gateway: Arc<dyn Gateway>,
    events: EventBus,
    cell: Mutex<SessionCell>,
    credentials: Mutex<CredentialStore>,
}

/// Owns the token and current user.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<SessionInner>,
}

impl SessionStore {
    /// Create a store. Persisted credentials are loaded but not trusted
    /// until [`SessionStore::check_auth`] validates them.
    pub fn new(gateway: Arc<dyn Gateway>, credentials: CredentialStore, events: EventBus) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                gateway,
                events,
                cell: Mutex::new(SessionCell {
                    state: SessionState::default(),
                    generation: 0,
                    epoch: 0,
                }),
                credentials: Mutex::new(credentials),
            }),
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Snapshot of the current session.
    pub fn state(&self) -> SessionState {
        lock(&self.inner.cell).state.clone()
    }

    /// True once a token has been validated and committed.
    pub fn is_authenticated(&self) -> bool {
        lock(&self.inner.cell).state.is_authenticated()
    }

    /// True for an authenticated session whose user has the admin role.
    pub fn is_admin(&self) -> bool {
        lock(&self.inner.cell).state.is_admin()
    }

    /// Token of the validated session.
    pub fn token(&self) -> Option<String> {
        let cell = lock(&self.inner.cell);
        if cell.state.is_authenticated() {
            cell.state.token.clone()
        } else {
            None
        }
    }

    /// User of the validated session.
    pub fn user(&self) -> Option<User> {
        let cell = lock(&self.inner.cell);
        if cell.state.is_authenticated() {
            cell.state.user.clone()
        } else {
            None
        }
    }

    /// User saved by a previous run, for display before `check_auth` finishes.
    pub fn cached_user(&self) -> Option<User> {
        lock(&self.inner.credentials).user().cloned()
    }

    /// Counter that changes each time the signed-in identity changes.
    pub fn epoch(&self) -> u64 {
        lock(&self.inner.cell).epoch
    }

    /// Bus the store publishes session and navigation events on.
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Resolve `route` against the current session and announce the result.
    pub fn navigate(&self, route: Route) -> Route {
        let (authenticated, admin) = {
            let cell = lock(&self.inner.cell);
            (cell.state.is_authenticated(), cell.state.is_admin())
        };
        let target = route.guard(authenticated, admin);
        if target != route {
            tracing::debug!("Route {} redirected to {}", route, target);
        }
        self.inner.events.publish(StateEvent::Navigate(target));
        target
    }

    // ========================================================================
    // Session Mutations
    // ========================================================================

    /// Validate any persisted token against the identity endpoint.
    ///
    /// Returns `Ok(false)` when nothing was persisted. A rejected token
    /// logs the session out and returns the error.
    pub async fn check_auth(&self) -> Result<bool> {
        let token = {
            let credentials = lock(&self.inner.credentials);
            credentials.token().map(str::to_string)
        };
        let Some(token) = token else {
            tracing::debug!("No persisted session");
            return Ok(false);
        };

        let generation = self.begin(Some(&token));
        match self.inner.gateway.me(token.clone()).await {
            Ok(user) => {
                self.commit(generation, token, user)?;
                Ok(true)
            }
            Err(err) => {
                tracing::warn!("Persisted session rejected: {}", err);
                self.rollback(generation);
                Err(err.into())
            }
        }
    }

    /// Exchange credentials for a token, then load the user behind it.
    pub async fn login(&self, email: &str, password: &str) -> Result<User> {
        LoginForm {
            email: email.to_string(),
            password: password.to_string(),
        }
        .validate()?;

        let generation = self.begin(None);
        tracing::debug!(generation, "Logging in");

        let result = async {
            let token = self
                .inner
                .gateway
                .login(email.to_string(), password.to_string())
                .await?
                .access_token;
            let user = self.inner.gateway.me(token.clone()).await?;
            Ok::<_, Error>((token, user))
        }
        .await;

        self.settle(generation, result)
    }

    /// Register an account and sign straight into it.
    ///
    /// The registration response is used as the user; identity is not
    /// re-queried.
    pub async fn register_and_login(&self, form: &RegistrationForm) -> Result<User> {
        form.validate()?;

        let generation = self.begin(None);
        tracing::debug!(generation, "Registering {}", form.username);

        let result = async {
            let user = self
                .inner
                .gateway
                .register(RegisterRequest {
                    email: form.email.clone(),
                    username: form.username.clone(),
                    password: form.password.clone(),
                })
                .await?;
            let token = self
                .inner
                .gateway
                .login(form.email.clone(), form.password.clone())
                .await?
                .access_token;
            Ok::<_, Error>((token, user))
        }
        .await;

        self.settle(generation, result)
    }

    /// Clear the session and both persisted entries.
    ///
    /// Safe to call at any time, including with no session.
    pub fn logout(&self) {
        tracing::info!("Logging out");
        self.reset(None);
    }

    /// Send a partial profile update.
    ///
    /// Unchanged fields are dropped first; if nothing is left the current
    /// user is returned without a request. A failure leaves state untouched.
    /// The saved user is applied as long as the session still holds the
    /// token the update was sent with.
    pub async fn update_user(&self, update: UserUpdate) -> Result<User> {
        let (token, current, _) = self.authenticated()?;

        let changes = update.changed_from(&current);
        if changes.is_empty() {
            tracing::debug!("Profile update has no changes");
            return Ok(current);
        }

        let user = self.inner.gateway.update_me(token.clone(), changes).await?;
        self.replace_user(&token, user)
    }

    /// Re-fetch the current user, e.g. after an admin changed the role.
    pub async fn refresh_user(&self) -> Result<User> {
        let (token, _, generation) = self.authenticated()?;

        match self.inner.gateway.me(token.clone()).await {
            Ok(user) => self.replace_user(&token, user),
            Err(err) => {
                if err.is_unauthorized() {
                    tracing::warn!("Session token no longer accepted");
                    self.rollback(generation);
                }
                Err(err.into())
            }
        }
    }

    // ========================================================================
    // Generation Handling
    // ========================================================================

    /// Take a new generation.
    ///
    /// `revalidating` is the token about to be checked; if the session is
    /// already authenticated with it, the phase is left as is.
    fn begin(&self, revalidating: Option<&str>) -> u64 {
        let (generation, changed) = {
            let mut cell = lock(&self.inner.cell);
            cell.generation += 1;
            let current = cell.state.is_authenticated()
                && revalidating.is_some()
                && cell.state.token.as_deref() == revalidating;
            if current {
                (cell.generation, None)
            } else {
                cell.state.phase = AuthPhase::Authenticating;
                (cell.generation, Some(cell.state.clone()))
            }
        };
        if let Some(state) = changed {
            self.inner.events.publish(StateEvent::SessionChanged(state));
        }
        generation
    }

    fn settle(&self, generation: u64, result: Result<(String, User)>) -> Result<User> {
        match result {
            Ok((token, user)) => {
                let user = self.commit(generation, token, user)?;
                self.inner
                    .events
                    .publish(StateEvent::Navigate(Route::AUTHENTICATED_LANDING));
                Ok(user)
            }
            Err(err) => {
                tracing::warn!("Authentication failed: {}", err);
                self.rollback(generation);
                Err(err)
            }
        }
    }

    fn commit(&self, generation: u64, token: String, user: User) -> Result<User> {
        let state = {
            let mut cell = lock(&self.inner.cell);
            if cell.generation != generation {
                tracing::warn!(generation, "Discarding superseded session result");
                return Err(Error::Superseded);
            }

            if let Err(err) = lock(&self.inner.credentials).save(&token, &user) {
                tracing::warn!("Failed to persist credentials: {}", err);
            }
            if cell.state.user.as_ref().map(|u| u.id.as_str()) != Some(user.id.as_str()) {
                cell.epoch += 1;
            }
            cell.state = SessionState::authenticated(token, user.clone());
            cell.state.clone()
        };

        tracing::info!("Signed in as {}", user.username);
        self.inner.events.publish(StateEvent::SessionChanged(state));
        Ok(user)
    }

    fn rollback(&self, generation: u64) {
        if !self.reset(Some(generation)) {
            tracing::debug!(generation, "Skipping rollback of superseded operation");
        }
    }

    /// Return to `Anonymous` and clear persisted credentials.
    ///
    /// With `expected` set, only does so if that generation is still current.
    fn reset(&self, expected: Option<u64>) -> bool {
        {
            let mut cell = lock(&self.inner.cell);
            if expected.is_some_and(|g| g != cell.generation) {
                return false;
            }
            cell.generation += 1;
            cell.epoch += 1;
            cell.state = SessionState::default();

            if let Err(err) = lock(&self.inner.credentials).clear() {
                tracing::warn!("Failed to remove persisted credentials: {}", err);
            }
        }

        self.inner
            .events
            .publish(StateEvent::SessionChanged(SessionState::default()));
        self.inner
            .events
            .publish(StateEvent::Navigate(Route::ANONYMOUS_LANDING));
        true
    }

    fn authenticated(&self) -> Result<(String, User, u64)> {
        let cell = lock(&self.inner.cell);
        match (&cell.state.token, &cell.state.user) {
            (Some(token), Some(user)) if cell.state.is_authenticated() => {
                Ok((token.clone(), user.clone(), cell.generation))
            }
            _ => Err(Error::NotAuthenticated),
        }
    }

    /// Swap in a fresh copy of the user fetched with `token`.
    ///
    /// Refused once the session no longer holds that token.
    fn replace_user(&self, token: &str, user: User) -> Result<User> {
        let state = {
            let mut cell = lock(&self.inner.cell);
            if !cell.state.is_authenticated() || cell.state.token.as_deref() != Some(token) {
                tracing::warn!("Discarding user fetched for a previous session");
                return Err(Error::Superseded);
            }
            if let Err(err) = lock(&self.inner.credentials).save_user(&user) {
                tracing::warn!("Failed to persist user: {}", err);
            }
            cell.state.user = Some(user.clone());
            cell.state.clone()
        };

        self.inner.events.publish(StateEvent::SessionChanged(state));
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, FakeGateway, PASSWORD};
    use crate::FALLBACK_MESSAGE;
    use papertrade_core::Role;
    use tempfile::tempdir;
    use tokio::sync::broadcast::error::TryRecvError;

    fn store(gateway: &Arc<FakeGateway>) -> SessionStore {
        SessionStore::new(gateway.clone(), CredentialStore::in_memory(), EventBus::new())
    }

    fn registration(username: &str) -> RegistrationForm {
        RegistrationForm {
            email: format!("{}@example.com", username),
            username: username.to_string(),
            password: PASSWORD.to_string(),
            confirm_password: PASSWORD.to_string(),
        }
    }

    #[tokio::test]
    async fn test_login_success() {
        let gateway = FakeGateway::new();
        gateway.with_account(testing::user("alice", Role::User));
        let session = store(&gateway);

        let user = session.login("alice@example.com", PASSWORD).await.unwrap();

        assert_eq!(user.username, "alice");
        assert!(session.is_authenticated());
        assert_eq!(session.token().as_deref(), Some("token-alice"));
        assert_eq!(gateway.calls(), vec!["login:alice@example.com", "me:token-alice"]);
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let gateway = FakeGateway::new();
        gateway.with_account(testing::user("alice", Role::User));
        let session = store(&gateway);

        let err = session
            .login("alice@example.com", "WrongP@ss1")
            .await
            .unwrap_err();

        assert_eq!(err.user_message(), "Incorrect email or password");
        assert!(!session.is_authenticated());
        assert_eq!(session.state(), SessionState::default());
        assert!(gateway.calls_to("me").is_empty());
    }

    #[tokio::test]
    async fn test_login_rolls_back_when_identity_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        let gateway = FakeGateway::new();
        gateway.with_account(testing::user("alice", Role::User));
        gateway.fail_next("me", testing::rejected(500, "Identity service down"));
        let session = SessionStore::new(
            gateway.clone(),
            CredentialStore::with_path(path.clone()),
            EventBus::new(),
        );

        let err = session.login("alice@example.com", PASSWORD).await.unwrap_err();

        assert_eq!(err.user_message(), "Identity service down");
        assert_eq!(session.state(), SessionState::default());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_login_form_checked_before_network() {
        let gateway = FakeGateway::new();
        let session = store(&gateway);

        let err = session.login("", "").await.unwrap_err();

        assert!(matches!(err, Error::Validation(_)));
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_register_uses_registration_response() {
        let gateway = FakeGateway::new();
        let session = store(&gateway);

        let user = session
            .register_and_login(&registration("bob"))
            .await
            .unwrap();

        assert_eq!(user.username, "bob");
        assert!(session.is_authenticated());
        assert_eq!(session.user(), Some(user));
        assert!(gateway.calls_to("me").is_empty());
    }

    #[tokio::test]
    async fn test_register_duplicate_email_detail_verbatim() {
        let gateway = FakeGateway::new();
        gateway.with_account(testing::user("bob", Role::User));
        let session = store(&gateway);

        let err = session
            .register_and_login(&registration("bob"))
            .await
            .unwrap_err();

        assert_eq!(err.user_message(), "Email already registered");
        assert!(!session.is_authenticated());
        assert!(gateway.calls_to("login").is_empty());
    }

    #[tokio::test]
    async fn test_register_generic_failure_uses_fallback() {
        let gateway = FakeGateway::new();
        gateway.fail_next(
            "register",
            crate::ApiError::Transport("connection reset by peer".to_string()),
        );
        let session = store(&gateway);

        let err = session
            .register_and_login(&registration("bob"))
            .await
            .unwrap_err();

        assert_eq!(err.user_message(), FALLBACK_MESSAGE);
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn test_register_weak_password_never_sent() {
        let gateway = FakeGateway::new();
        let session = store(&gateway);
        let form = RegistrationForm {
            password: "password".to_string(),
            confirm_password: "password".to_string(),
            ..registration("bob")
        };

        let err = session.register_and_login(&form).await.unwrap_err();

        assert!(matches!(err, Error::Validation(_)));
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_check_auth_without_persisted_token() {
        let gateway = FakeGateway::new();
        let session = store(&gateway);

        assert!(!session.check_auth().await.unwrap());
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_check_auth_restores_persisted_session() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        let alice = testing::user("alice", Role::User);
        CredentialStore::with_path(path.clone())
            .save("persisted", &alice)
            .unwrap();

        let gateway = FakeGateway::new();
        gateway.with_token("persisted", alice.clone());
        let session =
            SessionStore::new(gateway.clone(), CredentialStore::with_path(path), EventBus::new());

        assert_eq!(session.cached_user(), Some(alice.clone()));
        assert!(!session.is_authenticated());

        assert!(session.check_auth().await.unwrap());
        assert!(session.is_authenticated());
        assert_eq!(session.user(), Some(alice));

        // Idempotent
        assert!(session.check_auth().await.unwrap());
        assert!(session.is_authenticated());
    }

    #[tokio::test]
    async fn test_recheck_keeps_session_usable() {
        let gateway = FakeGateway::new();
        gateway.with_account(testing::user("alice", Role::User));
        let session = store(&gateway);
        session.login("alice@example.com", PASSWORD).await.unwrap();
        let epoch = session.epoch();
        let mut events = session.events().subscribe();

        gateway.gate("me:token-alice");
        let pending = {
            let session = session.clone();
            tokio::spawn(async move { session.check_auth().await })
        };
        testing::settle().await;

        assert_eq!(session.state().phase, AuthPhase::Authenticated);
        assert_eq!(session.token().as_deref(), Some("token-alice"));

        gateway.release("me:token-alice");
        assert!(pending.await.unwrap().unwrap());
        assert!(session.is_authenticated());
        assert_eq!(session.epoch(), epoch);
        match events.try_recv().unwrap() {
            StateEvent::SessionChanged(state) => assert!(state.is_authenticated()),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_check_auth_rejected_token_logs_out() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        CredentialStore::with_path(path.clone())
            .save("expired", &testing::user("alice", Role::User))
            .unwrap();

        let gateway = FakeGateway::new();
        let session = SessionStore::new(
            gateway.clone(),
            CredentialStore::with_path(path.clone()),
            EventBus::new(),
        );

        assert!(session.check_auth().await.is_err());
        assert!(!session.is_authenticated());
        assert!(session.cached_user().is_none());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_logout_without_session() {
        let gateway = FakeGateway::new();
        let session = store(&gateway);

        session.logout();
        session.logout();

        assert_eq!(session.state(), SessionState::default());
    }

    #[tokio::test]
    async fn test_logout_clears_persisted_entries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        let gateway = FakeGateway::new();
        gateway.with_account(testing::user("alice", Role::User));
        let session = SessionStore::new(
            gateway.clone(),
            CredentialStore::with_path(path.clone()),
            EventBus::new(),
        );

        session.login("alice@example.com", PASSWORD).await.unwrap();
        assert!(path.exists());

        session.logout();
        assert!(!session.is_authenticated());
        assert!(session.token().is_none());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_logout_during_login_wins() {
        let gateway = FakeGateway::new();
        gateway.with_account(testing::user("alice", Role::User));
        gateway.gate("me:token-alice");
        let session = store(&gateway);

        let pending = {
            let session = session.clone();
            tokio::spawn(async move { session.login("alice@example.com", PASSWORD).await })
        };
        testing::settle().await;
        assert_eq!(session.state().phase, AuthPhase::Authenticating);

        session.logout();
        gateway.release("me:token-alice");

        let result = pending.await.unwrap();
        assert!(matches!(result, Err(Error::Superseded)));
        assert_eq!(session.state(), SessionState::default());
        assert!(session.cached_user().is_none());
    }

    #[tokio::test]
    async fn test_stale_failure_does_not_undo_newer_login() {
        let gateway = FakeGateway::new();
        gateway.with_account(testing::user("alice", Role::User));
        gateway.with_account(testing::user("bob", Role::User));
        gateway.gate("login:alice@example.com");
        let session = store(&gateway);

        let slow = {
            let session = session.clone();
            tokio::spawn(async move { session.login("alice@example.com", "WrongP@ss1").await })
        };
        testing::settle().await;

        session.login("bob@example.com", PASSWORD).await.unwrap();
        gateway.release("login:alice@example.com");

        assert!(slow.await.unwrap().is_err());
        assert!(session.is_authenticated());
        assert_eq!(session.user().unwrap().username, "bob");
    }

    #[tokio::test]
    async fn test_update_user_sends_only_changes() {
        let gateway = FakeGateway::new();
        gateway.with_account(testing::user("alice", Role::User));
        let session = store(&gateway);
        session.login("alice@example.com", PASSWORD).await.unwrap();

        let updated = session
            .update_user(UserUpdate {
                email: Some("alice@example.com".to_string()),
                username: Some("alicia".to_string()),
                password: None,
            })
            .await
            .unwrap();

        assert_eq!(updated.username, "alicia");
        assert_eq!(session.user().unwrap().username, "alicia");
        assert_eq!(session.cached_user().unwrap().username, "alicia");
        assert_eq!(
            gateway.calls_to("update_me"),
            vec![r#"update_me:{"username":"alicia"}"#]
        );
    }

    #[tokio::test]
    async fn test_update_user_without_changes_skips_request() {
        let gateway = FakeGateway::new();
        gateway.with_account(testing::user("alice", Role::User));
        let session = store(&gateway);
        session.login("alice@example.com", PASSWORD).await.unwrap();

        let user = session
            .update_user(UserUpdate {
                username: Some("alice".to_string()),
                ..UserUpdate::default()
            })
            .await
            .unwrap();

        assert_eq!(user.username, "alice");
        assert!(gateway.calls_to("update_me").is_empty());
    }

    #[tokio::test]
    async fn test_update_user_failure_leaves_state() {
        let gateway = FakeGateway::new();
        gateway.with_account(testing::user("alice", Role::User));
        let session = store(&gateway);
        session.login("alice@example.com", PASSWORD).await.unwrap();
        let before = session.state();

        gateway.fail_next("update_me", testing::rejected(400, "Username already taken"));
        let err = session
            .update_user(UserUpdate {
                username: Some("bob".to_string()),
                ..UserUpdate::default()
            })
            .await
            .unwrap_err();

        assert_eq!(err.user_message(), "Username already taken");
        assert_eq!(session.state(), before);
    }

    #[tokio::test]
    async fn test_update_user_survives_concurrent_recheck() {
        let gateway = FakeGateway::new();
        gateway.with_account(testing::user("alice", Role::User));
        let session = store(&gateway);
        session.login("alice@example.com", PASSWORD).await.unwrap();

        let key = r#"update_me:{"username":"alicia"}"#;
        gateway.gate(key);
        let pending = {
            let session = session.clone();
            tokio::spawn(async move {
                session
                    .update_user(UserUpdate {
                        username: Some("alicia".to_string()),
                        ..UserUpdate::default()
                    })
                    .await
            })
        };
        testing::settle().await;

        assert!(session.check_auth().await.unwrap());
        gateway.release(key);

        let updated = pending.await.unwrap().unwrap();
        assert_eq!(updated.username, "alicia");
        assert_eq!(session.user().unwrap().username, "alicia");
    }

    #[tokio::test]
    async fn test_update_user_after_logout_is_discarded() {
        let gateway = FakeGateway::new();
        gateway.with_account(testing::user("alice", Role::User));
        let session = store(&gateway);
        session.login("alice@example.com", PASSWORD).await.unwrap();

        let key = r#"update_me:{"username":"alicia"}"#;
        gateway.gate(key);
        let pending = {
            let session = session.clone();
            tokio::spawn(async move {
                session
                    .update_user(UserUpdate {
                        username: Some("alicia".to_string()),
                        ..UserUpdate::default()
                    })
                    .await
            })
        };
        testing::settle().await;

        session.logout();
        gateway.release(key);

        assert!(matches!(pending.await.unwrap(), Err(Error::Superseded)));
        assert_eq!(session.state(), SessionState::default());
        assert!(session.cached_user().is_none());
    }

    #[tokio::test]
    async fn test_epoch_follows_identity() {
        let gateway = FakeGateway::new();
        gateway.with_account(testing::user("alice", Role::User));
        gateway.with_account(testing::user("bob", Role::User));
        let session = store(&gateway);
        let start = session.epoch();

        session.login("alice@example.com", PASSWORD).await.unwrap();
        let alice = session.epoch();
        assert_ne!(alice, start);

        session.login("alice@example.com", PASSWORD).await.unwrap();
        assert_eq!(session.epoch(), alice);

        session.login("bob@example.com", PASSWORD).await.unwrap();
        let bob = session.epoch();
        assert_ne!(bob, alice);

        session.logout();
        assert_ne!(session.epoch(), bob);
    }

    #[tokio::test]
    async fn test_update_user_requires_session() {
        let gateway = FakeGateway::new();
        let session = store(&gateway);

        let err = session.update_user(UserUpdate::default()).await.unwrap_err();
        assert!(matches!(err, Error::NotAuthenticated));
    }

    #[tokio::test]
    async fn test_refresh_user_picks_up_role_change() {
        let gateway = FakeGateway::new();
        gateway.with_account(testing::user("alice", Role::User));
        let session = store(&gateway);
        session.login("alice@example.com", PASSWORD).await.unwrap();
        assert!(!session.is_admin());

        gateway.with_token("token-alice", testing::user("alice", Role::Admin));
        session.refresh_user().await.unwrap();
        assert!(session.is_admin());
    }

    #[tokio::test]
    async fn test_navigate_guards_routes() {
        let gateway = FakeGateway::new();
        gateway.with_account(testing::user("alice", Role::User));
        let session = store(&gateway);

        assert_eq!(session.navigate(Route::Portfolio), Route::Login);

        session.login("alice@example.com", PASSWORD).await.unwrap();
        assert_eq!(session.navigate(Route::Login), Route::Dashboard);
        assert_eq!(session.navigate(Route::Admin), Route::Dashboard);
        assert_eq!(session.navigate(Route::Portfolio), Route::Portfolio);
    }

    #[tokio::test]
    async fn test_login_events() {
        let gateway = FakeGateway::new();
        gateway.with_account(testing::user("alice", Role::User));
        let session = store(&gateway);
        let mut events = session.events().subscribe();

        session.login("alice@example.com", PASSWORD).await.unwrap();

        match events.try_recv().unwrap() {
            StateEvent::SessionChanged(state) => assert_eq!(state.phase, AuthPhase::Authenticating),
            other => panic!("unexpected event: {:?}", other),
        }
        match events.try_recv().unwrap() {
            StateEvent::SessionChanged(state) => assert!(state.is_authenticated()),
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(matches!(
            events.try_recv().unwrap(),
            StateEvent::Navigate(Route::Dashboard)
        ));
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    }
}
