//! Session store: the client-side holder of the logged-in identity.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use reqwest::{Method, StatusCode};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::api::{
    decode, paths, response_message, ApiClient, FindIdRequest, FoundAccount, LoginRequest,
    PasswordChangeRequest, PasswordResetRequest, RegisterRequest, TokenRefreshResponse,
    WithdrawalRequest,
};
use crate::{CellarError, Result};

use super::profile::UserProfile;
use super::storage::{SessionStorage, SESSION_KEY};

/// Snapshot of the session state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    /// Profile of the logged-in user.
    pub user: Option<UserProfile>,
    /// Whether a user is logged in.
    pub is_logged_in: bool,
}

/// Outcome of a registration attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignUpOutcome {
    /// The server created the account (HTTP 201).
    Registered,
    /// 409: the email is taken.
    EmailTaken,
    /// 409: the phone number is taken.
    PhoneTaken,
    /// 409 without a recognised discriminator.
    Conflict,
    /// Any other failure.
    Failed,
}

impl SignUpOutcome {
    /// Classify a 409 by the server discriminator.
    pub fn from_conflict(discriminator: Option<&str>) -> Self {
        let discriminator = discriminator.unwrap_or_default().to_uppercase();
        if discriminator.contains("EMAIL") {
            SignUpOutcome::EmailTaken
        } else if discriminator.contains("PHONE") {
            SignUpOutcome::PhoneTaken
        } else {
            SignUpOutcome::Conflict
        }
    }

    /// Whether the account was created.
    pub fn is_success(&self) -> bool {
        matches!(self, SignUpOutcome::Registered)
    }

    /// User-facing message.
    pub fn message(&self) -> &'static str {
        match self {
            SignUpOutcome::Registered => "Registration complete.",
            SignUpOutcome::EmailTaken => "This email address is already registered.",
            SignUpOutcome::PhoneTaken => "This phone number is already registered.",
            SignUpOutcome::Conflict => "An account with these details already exists.",
            SignUpOutcome::Failed => "Registration failed.",
        }
    }
}

impl std::fmt::Display for SignUpOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Holder of the current identity and login flag.
///
/// State is restored from storage on construction, replaced on login, and
/// cleared on logout. The profile is mirrored into storage under
/// [`SESSION_KEY`].
pub struct SessionStore {
    client: Arc<ApiClient>,
    storage: Arc<dyn SessionStorage>,
    state: RwLock<Session>,
}

impl SessionStore {
    /// Create a store, restoring any persisted session.
    ///
    /// A record that cannot be read or parsed is discarded and the store
    /// starts logged out.
    pub fn new(client: Arc<ApiClient>, storage: Arc<dyn SessionStorage>) -> Self {
        let restored = restore(storage.as_ref());
        if let Some(profile) = &restored {
            client.set_bearer_token(profile.access_token().map(str::to_string));
            info!(
                "Restored session for {}",
                profile.username().unwrap_or("unknown user")
            );
        }

        Self {
            client,
            storage,
            state: RwLock::new(Session {
                is_logged_in: restored.is_some(),
                user: restored,
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Session> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Session> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current session snapshot.
    pub fn session(&self) -> Session {
        self.read().clone()
    }

    /// Profile of the logged-in user.
    pub fn user(&self) -> Option<UserProfile> {
        self.read().user.clone()
    }

    /// Whether a user is logged in.
    pub fn is_logged_in(&self) -> bool {
        self.read().is_logged_in
    }

    /// The HTTP client this store calls through.
    pub fn client(&self) -> &Arc<ApiClient> {
        &self.client
    }

    /// Log in.
    ///
    /// On success the returned profile becomes the session and is persisted.
    /// On any failure the previous state is kept and `None` is returned. A
    /// `null` body is a failure.
    pub async fn login(&self, credentials: &LoginRequest) -> Option<UserProfile> {
        let value: Value = match self.client.post(paths::LOGIN, credentials).await {
            Ok(value) => value,
            Err(e) => {
                warn!("Login failed: {}", e);
                return None;
            }
        };

        if value.is_null() {
            warn!("Login failed: server returned no profile");
            return None;
        }

        let profile = UserProfile::new(value);
        self.client
            .set_bearer_token(profile.access_token().map(str::to_string));
        self.replace(profile.clone());

        info!(
            "Logged in as {}",
            profile.username().unwrap_or("unknown user")
        );
        Some(profile)
    }

    /// Log out locally.
    ///
    /// Clears the profile, the login flag, the bearer token, and the
    /// persisted record. Never calls the server.
    pub fn logout(&self) {
        {
            let mut state = self.write();
            state.user = None;
            state.is_logged_in = false;
        }
        self.client.set_bearer_token(None);
        if let Err(e) = self.storage.remove(SESSION_KEY) {
            warn!("Failed to remove persisted session: {}", e);
        }
        info!("Logged out");
    }

    /// Register a new account.
    ///
    /// Registration does not log the user in.
    pub async fn sign_up(&self, request: &RegisterRequest) -> SignUpOutcome {
        let outcome = match self
            .client
            .execute(Method::POST, paths::REGISTER, Some(request))
            .await
        {
            Ok(response) if response.status() == StatusCode::CREATED => SignUpOutcome::Registered,
            Ok(response) => {
                warn!("Registration returned unexpected status {}", response.status());
                SignUpOutcome::Failed
            }
            Err(e) if e.is_conflict() => SignUpOutcome::from_conflict(e.discriminator()),
            Err(e) => {
                warn!("Registration failed: {}", e);
                SignUpOutcome::Failed
            }
        };
        debug!("Registration outcome: {:?}", outcome);
        outcome
    }

    /// Look up an account id by name and phone number.
    pub async fn find_id(&self, request: &FindIdRequest) -> Result<FoundAccount> {
        let found: FoundAccount = self.client.post(paths::FIND_ID, request).await?;
        debug!("Account lookup succeeded");
        Ok(found)
    }

    /// Reset a forgotten password. Returns the server notice.
    pub async fn reset_password(&self, request: &PasswordResetRequest) -> Result<String> {
        let value: Value = self.client.patch(paths::PASSWORD_RESET, request).await?;
        info!("Password reset for {}", request.user_id);
        Ok(response_message(&value).unwrap_or_else(|| "Password has been reset.".to_string()))
    }

    /// Change the logged-in user's password. Returns the server notice.
    pub async fn change_password(&self, request: &PasswordChangeRequest) -> Result<String> {
        if !self.is_logged_in() {
            return Err(CellarError::NotLoggedIn);
        }
        let value: Value = self.client.patch(paths::PASSWORD_CHANGE, request).await?;
        info!("Password changed");
        Ok(response_message(&value).unwrap_or_else(|| "Password has been changed.".to_string()))
    }

    /// Delete the logged-in user's account, then log out locally.
    pub async fn withdraw(&self, request: &WithdrawalRequest) -> Result<String> {
        if !self.is_logged_in() {
            return Err(CellarError::NotLoggedIn);
        }
        let value = self.client.delete(paths::WITHDRAWAL, Some(request)).await?;
        self.logout();
        Ok(response_message(&value).unwrap_or_else(|| "Account has been deleted.".to_string()))
    }

    /// Exchange the profile's refresh token for a new access token.
    ///
    /// The new token is written into the profile, installed on the client,
    /// and persisted. Fails with [`CellarError::NotLoggedIn`] and changes
    /// nothing when the session was logged out or replaced meanwhile.
    pub async fn refresh_token(&self) -> Result<()> {
        let mut profile = self.user().ok_or(CellarError::NotLoggedIn)?;
        let refresh = profile
            .refresh_token()
            .ok_or_else(|| CellarError::Validation("session has no refresh token".to_string()))?
            .to_string();

        let builder = self
            .client
            .request_with_token(Method::POST, paths::REFRESH, &refresh)?;
        let response = self.client.send(builder).await?;
        let tokens: TokenRefreshResponse = decode(response).await?;

        profile.set_tokens(&tokens.access_token, tokens.refresh_token.as_deref());

        // Only the session that sent `refresh` may take the new tokens. A
        // logout or another login while the request was out wins.
        {
            let mut state = self.write();
            let current = state.user.as_ref().and_then(UserProfile::refresh_token);
            if !state.is_logged_in || current != Some(refresh.as_str()) {
                debug!("Session changed during token refresh, dropping new tokens");
                return Err(CellarError::NotLoggedIn);
            }
            self.client
                .set_bearer_token(Some(tokens.access_token.clone()));
            self.persist(&profile);
            state.user = Some(profile);
        }
        debug!("Access token refreshed");
        Ok(())
    }

    /// Install a profile as the session and persist it.
    fn replace(&self, profile: UserProfile) {
        self.persist(&profile);
        let mut state = self.write();
        state.user = Some(profile);
        state.is_logged_in = true;
    }

    /// Write the profile record to storage.
    fn persist(&self, profile: &UserProfile) {
        match serde_json::to_string(profile) {
            Ok(record) => {
                if let Err(e) = self.storage.set(SESSION_KEY, &record) {
                    warn!("Failed to persist session: {}", e);
                }
            }
            Err(e) => warn!("Failed to serialize session: {}", e),
        }
    }
}

/// Load the persisted profile, dropping unreadable records.
fn restore(storage: &dyn SessionStorage) -> Option<UserProfile> {
    let record = match storage.get(SESSION_KEY) {
        Ok(Some(record)) => record,
        Ok(None) => return None,
        Err(e) => {
            warn!("Failed to read persisted session: {}", e);
            return None;
        }
    };

    match serde_json::from_str::<UserProfile>(&record) {
        Ok(profile) if !profile.as_value().is_null() => Some(profile),
        Ok(_) => {
            discard(storage);
            None
        }
        Err(e) => {
            warn!("Discarding corrupt persisted session: {}", e);
            discard(storage);
            None
        }
    }
}

fn discard(storage: &dyn SessionStorage) {
    if let Err(e) = storage.remove(SESSION_KEY) {
        warn!("Failed to remove persisted session: {}", e);
    }
}
