//! HTTP session against `/api/v2/`.
//!
//! # Design
//! - The SID cookie obtained from `auth/login` is kept behind an async `RwLock` so the
//!   transport can be shared across concurrent orchestrator calls.
//! - A `403` triggers exactly one re-login and retry; a second `403` is surfaced.
//! - Requests are rebuilt for the retry because multipart bodies cannot be cloned.

use async_trait::async_trait;
use reqwest::header::{COOKIE, REFERER, SET_COOKIE};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, StatusCode};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{TransportError, TransportResult};

/// Metainfo payload attached to `torrents/add`.
#[derive(Debug, Clone)]
pub struct MetainfoUpload {
    /// File name reported in the multipart part.
    pub file_name: String,
    /// Raw `.torrent` bytes.
    pub bytes: Vec<u8>,
}

/// Minimal request surface the adapter needs; swapped for a scripted fake in tests.
#[async_trait]
pub trait QbitTransport: Send + Sync {
    /// Establish a session.
    async fn login(&self) -> TransportResult<()>;

    /// `GET` an endpoint and return the raw body.
    async fn get(&self, endpoint: &str, query: &[(&'static str, String)])
    -> TransportResult<String>;

    /// `POST` a url-encoded form and return the raw body.
    async fn post(&self, endpoint: &str, form: &[(&'static str, String)])
    -> TransportResult<String>;

    /// `POST torrents/add` as multipart, optionally carrying metainfo.
    async fn add(
        &self,
        fields: &[(&'static str, String)],
        torrent: Option<MetainfoUpload>,
    ) -> TransportResult<String>;
}

/// reqwest-backed transport.
pub struct HttpQbitTransport {
    client: Client,
    base_url: String,
    username: String,
    password: String,
    sid: RwLock<Option<String>>,
}

impl HttpQbitTransport {
    /// Build a transport for `host` (scheme optional, defaults to `http`).
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(host: &str, username: &str, password: &str) -> TransportResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| TransportError::Build { source })?;
        Ok(Self {
            client,
            base_url: normalize_base_url(host),
            username: username.to_string(),
            password: password.to_string(),
            sid: RwLock::new(None),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/api/v2/{endpoint}", self.base_url)
    }

    async fn execute<F>(&self, endpoint: &str, build: F) -> TransportResult<String>
    where
        F: Fn(&Client, String) -> RequestBuilder + Send + Sync,
    {
        let (status, body) = self.send_once(endpoint, &build).await?;
        if status == StatusCode::FORBIDDEN {
            debug!(endpoint, "qbittorrent session expired; logging in again");
            self.login().await?;
            let (status, body) = self.send_once(endpoint, &build).await?;
            return check_status(endpoint, status, body);
        }
        check_status(endpoint, status, body)
    }

    async fn send_once<F>(&self, endpoint: &str, build: &F) -> TransportResult<(StatusCode, String)>
    where
        F: Fn(&Client, String) -> RequestBuilder + Send + Sync,
    {
        let mut request = build(&self.client, self.url(endpoint)).header(REFERER, &self.base_url);
        if let Some(sid) = self.sid.read().await.as_ref() {
            request = request.header(COOKIE, format!("SID={sid}"));
        }
        let response = request
            .send()
            .await
            .map_err(|source| request_error(endpoint, source))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| request_error(endpoint, source))?;
        Ok((status, body))
    }
}

#[async_trait]
impl QbitTransport for HttpQbitTransport {
    async fn login(&self) -> TransportResult<()> {
        let endpoint = "auth/login";
        let response = self
            .client
            .post(self.url(endpoint))
            .header(REFERER, &self.base_url)
            .form(&[("username", &self.username), ("password", &self.password)])
            .send()
            .await
            .map_err(|source| request_error(endpoint, source))?;

        let sid = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(parse_sid);
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| request_error(endpoint, source))?;

        if body.trim() == "Fails." {
            return Err(TransportError::AuthRejected);
        }
        if !status.is_success() {
            return Err(TransportError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        if let Some(sid) = sid {
            *self.sid.write().await = Some(sid);
            debug!("stored qbittorrent session cookie");
        }
        Ok(())
    }

    async fn get(
        &self,
        endpoint: &str,
        query: &[(&'static str, String)],
    ) -> TransportResult<String> {
        self.execute(endpoint, |client, url| client.get(url).query(query))
            .await
    }

    async fn post(
        &self,
        endpoint: &str,
        form: &[(&'static str, String)],
    ) -> TransportResult<String> {
        self.execute(endpoint, |client, url| client.post(url).form(form))
            .await
    }

    async fn add(
        &self,
        fields: &[(&'static str, String)],
        torrent: Option<MetainfoUpload>,
    ) -> TransportResult<String> {
        self.execute("torrents/add", |client, url| {
            let mut form = Form::new();
            for (name, value) in fields {
                form = form.text(*name, value.clone());
            }
            if let Some(upload) = torrent.as_ref() {
                let part = Part::bytes(upload.bytes.clone()).file_name(upload.file_name.clone());
                form = form.part("torrents", part);
            }
            client.post(url).multipart(form)
        })
        .await
    }
}

fn request_error(endpoint: &str, source: reqwest::Error) -> TransportError {
    TransportError::Request {
        endpoint: endpoint.to_string(),
        source,
    }
}

fn check_status(endpoint: &str, status: StatusCode, body: String) -> TransportResult<String> {
    if status.is_success() {
        Ok(body)
    } else {
        Err(TransportError::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            body,
        })
    }
}

fn parse_sid(cookie: &str) -> Option<String> {
    cookie
        .split(';')
        .next()
        .and_then(|pair| pair.trim().strip_prefix("SID="))
        .map(str::to_string)
}

pub(crate) fn normalize_base_url(host: &str) -> String {
    let trimmed = host.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    }
}
