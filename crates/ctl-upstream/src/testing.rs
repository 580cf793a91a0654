//! Scripted transport for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use ctl_core::{AppConfig, SiteConfig};
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::error::UpstreamResult;
use crate::transport::{Transport, UpstreamRequest, UpstreamResponse};

pub(crate) fn site_with(name: &str, extra: &str) -> SiteConfig {
    let config = AppConfig::from_toml_str(&format!(
        r#"
        [[sites]]
        name = "{name}"
        {extra}
        [sites.upstream]
        url = "https://{name}.church.tools/"
        user = "bot"
        password = "pw"
        [sites.ldap]
        dc = "dc={name}"
        admin = "root"
        password = "pw"
        "#
    ))
    .unwrap();
    config.sites.into_iter().next().unwrap()
}

pub(crate) fn site(name: &str) -> SiteConfig {
    site_with(name, "")
}

/// Answers login and CSRF requests itself and serves queued responses for
/// everything else.
#[derive(Default)]
pub(crate) struct FakeTransport {
    requests: Mutex<Vec<UpstreamRequest>>,
    logins: Mutex<VecDeque<UpstreamResponse>>,
    data: Mutex<VecDeque<UpstreamResponse>>,
    reject_logins: bool,
    login_delay: Option<Duration>,
    cookie_ttl: Option<TimeDelta>,
    login_calls: AtomicUsize,
    data_calls: AtomicUsize,
}

impl FakeTransport {
    pub(crate) fn rejecting_logins(mut self) -> Self {
        self.reject_logins = true;
        self
    }

    pub(crate) fn with_login_delay(mut self, delay: Duration) -> Self {
        self.login_delay = Some(delay);
        self
    }

    pub(crate) fn with_cookie_ttl(mut self, ttl: TimeDelta) -> Self {
        self.cookie_ttl = Some(ttl);
        self
    }

    pub(crate) fn push_login(&self, response: UpstreamResponse) {
        self.logins.lock().push_back(response);
    }

    pub(crate) fn push_data(&self, response: UpstreamResponse) {
        self.data.lock().push_back(response);
    }

    pub(crate) fn requests(&self) -> Vec<UpstreamRequest> {
        self.requests.lock().clone()
    }

    /// URLs of all data requests, in order.
    pub(crate) fn data_urls(&self) -> Vec<String> {
        self.requests
            .lock()
            .iter()
            .filter(|r| !r.url.ends_with("/api/login") && !r.url.ends_with("/api/csrftoken"))
            .map(|r| r.url.clone())
            .collect()
    }

    pub(crate) fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn data_calls(&self) -> usize {
        self.data_calls.load(Ordering::SeqCst)
    }

    fn session_cookie(&self) -> String {
        let expires = match self.cookie_ttl {
            Some(ttl) => (Utc::now() + ttl).format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
            None => "Thu, 01 Jan 2099 00:00:00 GMT".to_string(),
        };
        format!("sid=abc; expires={expires}; path=/")
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: UpstreamRequest) -> UpstreamResult<UpstreamResponse> {
        self.requests.lock().push(request.clone());

        if request.url.ends_with("/api/login") {
            self.login_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.login_delay {
                tokio::time::sleep(delay).await;
            }
            let queued = self.logins.lock().pop_front();
            if let Some(response) = queued {
                return Ok(response.with_cookie(self.session_cookie()));
            }
            if self.reject_logins {
                return Ok(UpstreamResponse::new(401, Value::String("Unauthorized".into())));
            }
            return Ok(UpstreamResponse::new(200, json!({"status": "success", "data": {}}))
                .with_cookie(self.session_cookie()));
        }

        if request.url.ends_with("/api/csrftoken") {
            return Ok(UpstreamResponse::new(200, json!({"data": "token-1"})));
        }

        self.data_calls.fetch_add(1, Ordering::SeqCst);
        let queued = self.data.lock().pop_front();
        Ok(queued.unwrap_or_else(|| UpstreamResponse::new(200, json!({"data": []}))))
    }
}
