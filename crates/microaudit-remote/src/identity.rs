//! RestIdentityProvider - IIdentityProvider implementation for the auth API
//!
//! ## Flows
//!
//! | Flow | Request |
//! |------|---------|
//! | password sign-in | `POST /auth/v1/token?grant_type=password` |
//! | refresh          | `POST /auth/v1/token?grant_type=refresh_token` |
//! | sign-up          | `POST /auth/v1/signup` |
//! | current user     | `GET /auth/v1/user` |
//! | sign-out         | `POST /auth/v1/logout` |
//!
//! Every successful sign-in installs the access token on the shared
//! [`RestClient`] and publishes the user on the session channel; sign-out
//! clears both.

use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::watch;
use tracing::{debug, info};

use microaudit_core::domain::OwnerId;
use microaudit_core::ports::{IIdentityProvider, User};

use crate::client::RestClient;
use crate::RemoteError;

// ============================================================================
// Auth API response types
// ============================================================================

/// User object returned by the auth API
#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
    email: Option<String>,
}

impl AuthUser {
    fn into_user(self) -> Result<User, RemoteError> {
        let id = OwnerId::new(self.id)
            .map_err(|e| RemoteError::InvalidResponse(format!("invalid user id: {e}")))?;
        Ok(User::new(id, self.email))
    }
}

/// Token grant response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    user: AuthUser,
}

/// Sign-up response; tokens are absent while email confirmation is pending
#[derive(Debug, Deserialize)]
struct SignUpResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    user: Option<AuthUser>,
    id: Option<String>,
    email: Option<String>,
}

// ============================================================================
// Session
// ============================================================================

/// An authenticated session, as persisted between runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub user: User,
}

/// Identity provider backed by the auth API
pub struct RestIdentityProvider {
    client: Arc<RestClient>,
    session: watch::Sender<Option<User>>,
}

impl RestIdentityProvider {
    /// Creates a signed-out provider sharing `client` with the store adapter
    pub fn new(client: Arc<RestClient>) -> Self {
        let (session, _rx) = watch::channel(None);
        Self { client, session }
    }

    /// Signs in with email and password
    ///
    /// # Errors
    /// Returns [`RemoteError::BadRequest`] for wrong credentials, or any
    /// transport error
    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        debug!(email, "Signing in with password");
        let response = self
            .client
            .request(Method::POST, "/auth/v1/token")
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(RemoteError::from)
            .context("Failed to send sign-in request")?;
        let token: TokenResponse = RestClient::check(response)
            .await?
            .json()
            .await
            .map_err(RemoteError::from)
            .context("Failed to parse sign-in response")?;

        let session = Session {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            user: token.user.into_user()?,
        };
        self.install(&session);
        info!(user_id = %session.user.id, "Signed in");
        Ok(session)
    }

    /// Exchanges a refresh token for a new session
    ///
    /// # Errors
    /// Returns [`RemoteError::BadRequest`] if the refresh token was revoked
    pub async fn refresh(&self, refresh_token: &str) -> Result<Session> {
        let response = self
            .client
            .request(Method::POST, "/auth/v1/token")
            .query(&[("grant_type", "refresh_token")])
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .map_err(RemoteError::from)
            .context("Failed to send refresh request")?;
        let token: TokenResponse = RestClient::check(response)
            .await?
            .json()
            .await
            .map_err(RemoteError::from)
            .context("Failed to parse refresh response")?;

        let session = Session {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            user: token.user.into_user()?,
        };
        self.install(&session);
        debug!(user_id = %session.user.id, "Session refreshed");
        Ok(session)
    }

    /// Creates an account
    ///
    /// Returns the new session when the backend signs the user in right
    /// away, or `None` when the account awaits email confirmation.
    ///
    /// # Errors
    /// Returns [`RemoteError::BadRequest`] if the email is taken or the
    /// password is too weak
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>> {
        let response = self
            .client
            .request(Method::POST, "/auth/v1/signup")
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(RemoteError::from)
            .context("Failed to send sign-up request")?;
        let body: SignUpResponse = RestClient::check(response)
            .await?
            .json()
            .await
            .map_err(RemoteError::from)
            .context("Failed to parse sign-up response")?;

        let Some(access_token) = body.access_token else {
            info!(email, "Account created, confirmation pending");
            return Ok(None);
        };
        let user = match (body.user, body.id) {
            (Some(user), _) => user,
            (None, Some(id)) => AuthUser {
                id,
                email: body.email,
            },
            (None, None) => {
                return Err(RemoteError::InvalidResponse("sign-up without user".into()).into())
            }
        };
        let session = Session {
            access_token,
            refresh_token: body.refresh_token,
            user: user.into_user()?,
        };
        self.install(&session);
        info!(user_id = %session.user.id, "Signed up");
        Ok(Some(session))
    }

    /// Resumes a session from a stored access token
    ///
    /// # Errors
    /// Returns [`RemoteError::Unauthorized`] if the token is no longer valid;
    /// the provider stays signed out in that case
    pub async fn sign_in_with_token(&self, access_token: &str) -> Result<User> {
        self.client.set_access_token(Some(access_token.to_string()));
        match self.fetch_user().await {
            Ok(user) => {
                self.session.send_replace(Some(user.clone()));
                debug!(user_id = %user.id, "Session resumed");
                Ok(user)
            }
            Err(e) => {
                self.client.set_access_token(None);
                Err(e)
            }
        }
    }

    /// Ends the session locally and on the server
    ///
    /// The local session is cleared even if the server call fails.
    ///
    /// # Errors
    /// Returns the transport error of the logout call, if any
    pub async fn sign_out(&self) -> Result<()> {
        let result = if self.client.has_session() {
            match self
                .client
                .request(Method::POST, "/auth/v1/logout")
                .send()
                .await
            {
                Ok(response) => RestClient::check(response).await.map(|_| ()),
                Err(e) => Err(RemoteError::from(e)),
            }
        } else {
            Ok(())
        };

        self.client.set_access_token(None);
        self.session.send_replace(None);
        info!("Signed out");
        result.context("Failed to sign out on the server")
    }

    /// Fetches the user the current token belongs to
    ///
    /// # Errors
    /// Returns [`RemoteError::NotSignedIn`] without a token, or the status
    /// error of the call
    pub async fn fetch_user(&self) -> Result<User> {
        if !self.client.has_session() {
            return Err(RemoteError::NotSignedIn.into());
        }
        let response = self
            .client
            .request(Method::GET, "/auth/v1/user")
            .send()
            .await
            .map_err(RemoteError::from)
            .context("Failed to fetch current user")?;
        let user: AuthUser = RestClient::check(response)
            .await?
            .json()
            .await
            .map_err(RemoteError::from)
            .context("Failed to parse current user")?;
        Ok(user.into_user()?)
    }

    fn install(&self, session: &Session) {
        self.client
            .set_access_token(Some(session.access_token.clone()));
        self.session.send_replace(Some(session.user.clone()));
    }
}

#[async_trait::async_trait]
impl IIdentityProvider for RestIdentityProvider {
    async fn current_user(&self) -> Result<Option<User>> {
        Ok(self.session.borrow().clone())
    }

    fn on_session_change(&self) -> watch::Receiver<Option<User>> {
        self.session.subscribe()
    }
}
