//! REST clients. One method per remote endpoint; no retries, no caching.
//! Every request goes through [`ApiClient::request`], which attaches the
//! stored bearer credential.

pub mod auth;
pub mod comments;
pub mod posts;
pub mod rooms;
pub mod users;

use reqwest::header::AUTHORIZATION;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use url::Url;

use crate::config::ApiConfig;
use crate::error::{ClientError, ClientResult};
use crate::session::Session;

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    origin: Url,
    session: Session,
}

impl ApiClient {
    pub fn new(config: &ApiConfig, session: Session) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        let origin = Url::parse(&config.origin)?;
        if origin.cannot_be_a_base() {
            return Err(ClientError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase));
        }

        Ok(Self {
            http,
            origin,
            session,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Absolute URL under the origin; each segment is percent-encoded.
    pub fn endpoint(&self, segments: &[&str]) -> ClientResult<Url> {
        let mut url = self.origin.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Media URLs come back either absolute (external hosting) or relative
    /// to the API origin.
    pub fn resolve_media_url(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            return url.to_string();
        }
        match self.origin.join(url) {
            Ok(joined) => joined.to_string(),
            Err(_) => format!("{}{}", self.origin.as_str().trim_end_matches('/'), url),
        }
    }

    /// Build a request, attaching `Authorization: Bearer` when logged in.
    pub fn request(&self, method: Method, url: Url) -> RequestBuilder {
        tracing::debug!("{} {}", method, url);
        let builder = self.http.request(method, url);
        match self.session.credential() {
            Some(token) => builder.header(AUTHORIZATION, format!("Bearer {}", token)),
            None => builder,
        }
    }

    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> ClientResult<T> {
        let response = Self::check(builder.send().await?).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub(crate) async fn send_text(&self, builder: RequestBuilder) -> ClientResult<String> {
        let response = Self::check(builder.send().await?).await?;
        Ok(response.text().await?)
    }

    /// Non-2xx responses become [`ClientError::Api`] with status and body untouched.
    async fn check(response: Response) -> ClientResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        tracing::debug!("API error {}: {}", status, body);
        Err(ClientError::Api { status, body })
    }
}
