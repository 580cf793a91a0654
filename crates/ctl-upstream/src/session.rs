//! Upstream session management.
//!
//! Each site has exactly one [`Connection`] holding its session cookie and
//! CSRF token. Logins are single-flight: concurrent callers share one
//! pending attempt. After [`MAX_LOGIN_FAILURES`] consecutive failed logins
//! the connection refuses to try again.

use std::fmt;
use std::sync::Arc;

use ctl_core::{Clock, SiteConfig, SystemClock, UpstreamSiteConfig};
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::cookie::{cookie_is_valid, cookie_pair};
use crate::error::{UpstreamError, UpstreamResult};
use crate::transport::{Transport, UpstreamRequest};

/// Consecutive login failures after which logins fail fast.
pub const MAX_LOGIN_FAILURES: u32 = 3;

/// Header carrying the CSRF token.
pub const CSRF_HEADER: &str = "CSRF-Token";

type PendingLogin = Shared<BoxFuture<'static, UpstreamResult<()>>>;

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// No usable session.
    Disconnected,
    /// A login is in flight.
    LoggingIn,
    /// Cookie and CSRF token are set.
    Connected,
}

#[derive(Default)]
struct ConnectionState {
    cookie: Option<String>,
    csrf_token: Option<String>,
    login: Option<PendingLogin>,
    failures: u32,
}

/// Session of one site.
pub struct Connection {
    site: String,
    state: Mutex<ConnectionState>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("site", &self.site)
            .field("status", &self.status())
            .field("failures", &self.failures())
            .finish()
    }
}

impl Connection {
    fn new(site: &str) -> Self {
        Self {
            site: site.to_string(),
            state: Mutex::new(ConnectionState::default()),
        }
    }

    /// Site name.
    #[must_use]
    pub fn site(&self) -> &str {
        &self.site
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        let state = self.state.lock();
        if state.login.is_some() {
            ConnectionStatus::LoggingIn
        } else if state.csrf_token.is_some() && state.cookie.is_some() {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::Disconnected
        }
    }

    /// Consecutive failed logins.
    #[must_use]
    pub fn failures(&self) -> u32 {
        self.state.lock().failures
    }

    /// Drops the session; the next request logs in again.
    pub fn disconnect(&self) {
        let mut state = self.state.lock();
        state.cookie = None;
        state.csrf_token = None;
    }

    /// Returns the cookie pair and CSRF token if the session is usable at
    /// `now`.
    fn session(&self, now: chrono::DateTime<chrono::Utc>) -> Option<(String, String)> {
        let state = self.state.lock();
        let cookie = state.cookie.as_deref()?;
        let token = state.csrf_token.as_deref()?;
        if !cookie_is_valid(cookie, now) {
            tracing::info!(site = %self.site, "Session cookie expired");
            return None;
        }
        Some((cookie_pair(cookie).to_string(), token.to_string()))
    }

    fn finish_login(&self, result: &UpstreamResult<(String, String)>) {
        let mut state = self.state.lock();
        state.login = None;
        match result {
            Ok((cookie, token)) => {
                state.cookie = Some(cookie.clone());
                state.csrf_token = Some(token.clone());
                state.failures = 0;
            }
            Err(_) => {
                state.cookie = None;
                state.csrf_token = None;
                state.failures += 1;
            }
        }
    }
}

/// Registry of per-site connections.
pub struct SessionManager {
    transport: Arc<dyn Transport>,
    connections: DashMap<String, Arc<Connection>>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("connections", &self.connections.len())
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Creates a manager using the wall clock.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_clock(transport, Arc::new(SystemClock))
    }

    /// Creates a manager with an explicit clock.
    #[must_use]
    pub fn with_clock(transport: Arc<dyn Transport>, clock: Arc<dyn Clock>) -> Self {
        Self {
            transport,
            connections: DashMap::new(),
            clock,
        }
    }

    /// The transport used for all requests.
    #[must_use]
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Returns the connection of a site, creating an empty one on first use.
    #[must_use]
    pub fn get_connection(&self, site: &str) -> Arc<Connection> {
        self.connections
            .entry(site.to_string())
            .or_insert_with(|| Arc::new(Connection::new(site)))
            .clone()
    }

    /// Logs in to a site.
    ///
    /// Concurrent callers share a single attempt. Fails fast with
    /// [`UpstreamError::Fatal`] once the connection has failed
    /// [`MAX_LOGIN_FAILURES`] times in a row.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::TransientAuth`] if the credentials are
    /// rejected, [`UpstreamError::Fatal`] if logins are disabled, or the
    /// transport error of the attempt.
    pub async fn login(&self, site: &SiteConfig) -> UpstreamResult<()> {
        let connection = self.get_connection(&site.name);

        let pending = {
            let mut state = connection.state.lock();
            if let Some(pending) = &state.login {
                pending.clone()
            } else {
                if state.failures >= MAX_LOGIN_FAILURES {
                    tracing::error!(site = %site.name, failures = state.failures, "Login disabled");
                    return Err(UpstreamError::Fatal(format!(
                        "{} failed logins in a row for site {}",
                        state.failures, site.name
                    )));
                }
                let attempt = login_attempt(
                    Arc::clone(&self.transport),
                    Arc::clone(&connection),
                    site.upstream.clone(),
                )
                .boxed()
                .shared();
                state.login = Some(attempt.clone());
                attempt
            }
        };

        pending.await
    }

    /// Sends an authenticated GET and returns the JSON body.
    ///
    /// Logs in first if there is no usable session. An auth rejection drops
    /// the session and the whole sequence is retried once; a second
    /// rejection is returned.
    ///
    /// # Errors
    ///
    /// Returns the error of the last attempt.
    pub async fn authenticated_get(&self, url: &str, site: &SiteConfig) -> UpstreamResult<Value> {
        let connection = self.get_connection(&site.name);
        let mut retry_budget: u8 = 1;

        loop {
            match self.try_get(&connection, url, site).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_auth_rejection() => {
                    connection.disconnect();
                    if retry_budget == 0 {
                        tracing::warn!(site = %site.name, url, error = %e, "Authentication rejected again");
                        return Err(e);
                    }
                    retry_budget -= 1;
                    tracing::debug!(site = %site.name, url, "Authentication rejected, logging in again");
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_get(&self, connection: &Connection, url: &str, site: &SiteConfig) -> UpstreamResult<Value> {
        let (cookie, token) = match connection.session(self.clock.now()) {
            Some(session) => session,
            None => {
                self.login(site).await?;
                connection
                    .session(self.clock.now())
                    .ok_or_else(|| UpstreamError::auth("session unusable right after login"))?
            }
        };

        let request = UpstreamRequest::get(url)
            .header("Cookie", cookie)
            .header(CSRF_HEADER, token);
        let response = self.transport.send(request).await?.error_for_status()?;
        Ok(response.body)
    }
}

/// Builds the login request for a site's technical user.
pub(crate) fn login_request(upstream: &UpstreamSiteConfig, user: &str, password: &str) -> UpstreamRequest {
    UpstreamRequest::post_json(
        upstream.api_url("/login"),
        json!({
            "username": user,
            "rememberMe": false,
            "password": password,
        }),
    )
}

/// Returns true if a login response body reports success.
pub(crate) fn login_succeeded(body: &Value) -> bool {
    body.get("status").and_then(Value::as_str) == Some("success")
}

async fn login_attempt(
    transport: Arc<dyn Transport>,
    connection: Arc<Connection>,
    upstream: UpstreamSiteConfig,
) -> UpstreamResult<()> {
    let result = fetch_session(transport.as_ref(), &upstream).await;
    connection.finish_login(&result);

    match result {
        Ok(_) => {
            tracing::debug!(site = %connection.site, "Login completed");
            Ok(())
        }
        Err(e) => {
            tracing::warn!(
                site = %connection.site,
                failures = connection.failures(),
                error = %e,
                "Login failed"
            );
            Err(e)
        }
    }
}

async fn fetch_session(
    transport: &dyn Transport,
    upstream: &UpstreamSiteConfig,
) -> UpstreamResult<(String, String)> {
    let response = transport
        .send(login_request(upstream, &upstream.user, &upstream.password))
        .await?
        .error_for_status()?;
    if !login_succeeded(&response.body) {
        return Err(UpstreamError::auth("login was not successful"));
    }
    let cookie = response
        .set_cookie
        .into_iter()
        .next()
        .ok_or_else(|| UpstreamError::auth("login response carried no session cookie"))?;

    let token_response = transport
        .send(UpstreamRequest::get(upstream.api_url("/csrftoken")).header("Cookie", cookie_pair(&cookie)))
        .await?
        .error_for_status()?;
    let token = token_response
        .body
        .get("data")
        .and_then(Value::as_str)
        .ok_or_else(|| UpstreamError::decode("CSRF token response has no data"))?
        .to_string();

    Ok((cookie, token))
}
