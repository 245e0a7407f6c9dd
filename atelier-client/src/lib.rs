//! REST client for the site API.
//!
//! Implements the [`ArticleApi`] and [`ChatApi`] traits from `atelier-core`
//! over `reqwest`. Non-success responses become [`ApiError::Status`] with the
//! body truncated, so server details never flood logs.

pub mod envelope;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde_json::json;
use tracing::{debug, instrument};

use atelier_core::article::{Article, ArticleApi, ArticlePayload, ImageUpload, UploadedImage};
use atelier_core::chat::{ChatApi, ChatConversation, ChatMessage, ConversationFilter};
use atelier_core::config::AtelierConfig;
use atelier_core::error::ApiError;
use atelier_core::ids::{ArticleId, ConversationId};

/// Multipart field name the upload endpoint reads files from
const UPLOAD_FIELD: &str = "images";

/// Site API client
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a client for `base_url` (e.g. `https://example.org/api`)
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("atelier/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(transport)?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            token: token.filter(|t| !t.is_empty()),
        })
    }

    pub fn from_config(config: &AtelierConfig) -> Result<Self, ApiError> {
        Self::new(
            config.api.base_url.clone(),
            config.api.token.clone(),
            config.request_timeout(),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send and return the body of a successful response
    async fn send(&self, request: RequestBuilder) -> Result<String, ApiError> {
        let response = request.send().await.map_err(transport)?;
        let response = check_status(response).await?;
        response.text().await.map_err(transport)
    }
}

/// Percent-encode an id for use as one path segment.
///
/// Encoding keeps `/` from splitting the segment; dot segments are refused
/// because URL normalization would still resolve them.
fn segment(id: &str) -> Result<String, ApiError> {
    match id {
        "" | "." | ".." => Err(ApiError::InvalidId(id.to_owned())),
        _ => Ok(urlencoding::encode(id).into_owned()),
    }
}

fn transport(err: reqwest::Error) -> ApiError {
    ApiError::Transport(err.to_string())
}

async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    debug!(status = status.as_u16(), "request failed");
    Err(ApiError::status(status.as_u16(), envelope::error_message(&body)))
}

#[async_trait]
impl ArticleApi for ApiClient {
    #[instrument(skip(self))]
    async fn get_article(&self, id: &ArticleId) -> Result<Article, ApiError> {
        let body = self
            .send(self.request(Method::GET, &format!("articles/{}", segment(id.as_str())?)))
            .await?;
        envelope::parse_article(&body)
    }

    #[instrument(skip(self, payload), fields(title = %payload.title))]
    async fn create_article(&self, payload: &ArticlePayload) -> Result<Article, ApiError> {
        let body = self
            .send(self.request(Method::POST, "articles").json(payload))
            .await?;
        envelope::parse_article(&body)
    }

    #[instrument(skip(self, payload), fields(title = %payload.title))]
    async fn update_article(&self, id: &ArticleId, payload: &ArticlePayload) -> Result<Article, ApiError> {
        let body = self
            .send(
                self.request(Method::PUT, &format!("articles/{}", segment(id.as_str())?))
                    .json(payload),
            )
            .await?;
        envelope::parse_article(&body)
    }

    #[instrument(skip(self, files), fields(count = files.len()))]
    async fn upload_images(&self, files: Vec<ImageUpload>) -> Result<Vec<UploadedImage>, ApiError> {
        let mut form = Form::new();
        for file in files {
            let mut part = Part::bytes(file.bytes).file_name(file.file_name);
            if let Some(mime) = file.mime {
                part = part.mime_str(&mime).map_err(transport)?;
            }
            form = form.part(UPLOAD_FIELD, part);
        }

        let body = self
            .send(self.request(Method::POST, "articles/upload-images").multipart(form))
            .await?;
        envelope::parse_images(&body)
    }
}

#[async_trait]
impl ChatApi for ApiClient {
    #[instrument(skip(self))]
    async fn list_conversations(&self, filter: &ConversationFilter) -> Result<Vec<ChatConversation>, ApiError> {
        let request = self
            .request(Method::GET, "admin/chat/conversations")
            .query(&filter.query_pairs());
        let body = self.send(request).await?;
        envelope::parse_conversations(&body)
    }

    #[instrument(skip(self))]
    async fn fetch_messages(&self, id: &ConversationId) -> Result<Vec<ChatMessage>, ApiError> {
        let path = format!("admin/chat/conversations/{}/messages", segment(id.as_str())?);
        let body = self.send(self.request(Method::GET, &path)).await?;
        envelope::parse_messages(&body)
    }

    #[instrument(skip(self, text))]
    async fn send_message(&self, id: &ConversationId, text: &str) -> Result<ChatMessage, ApiError> {
        let path = format!("admin/chat/conversations/{}/messages", segment(id.as_str())?);
        let request = self
            .request(Method::POST, &path)
            .json(&json!({ "message": text }));
        let body = self.send(request).await?;
        envelope::parse_message(&body)
    }

    #[instrument(skip(self))]
    async fn mark_read(&self, id: &ConversationId) -> Result<(), ApiError> {
        let path = format!("admin/chat/conversations/{}/read", segment(id.as_str())?);
        self.send(self.request(Method::POST, &path)).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn close_conversation(&self, id: &ConversationId) -> Result<(), ApiError> {
        let path = format!("admin/chat/conversations/{}/close", segment(id.as_str())?);
        self.send(self.request(Method::POST, &path)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> ApiClient {
        ApiClient::new(base, None, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn joins_paths_without_double_slashes() {
        let api = client("https://example.org/api/");
        assert_eq!(api.base_url(), "https://example.org/api");
        assert_eq!(api.url("/articles/4"), "https://example.org/api/articles/4");
        assert_eq!(
            api.url("admin/chat/conversations"),
            "https://example.org/api/admin/chat/conversations"
        );
    }

    #[test]
    fn blank_token_is_ignored() {
        let api = ApiClient::new("http://localhost", Some(String::new()), Duration::from_secs(1)).unwrap();
        assert!(api.token.is_none());
    }

    #[test]
    fn bearer_token_is_attached() {
        let api = ApiClient::new("http://localhost", Some("s3cret".into()), Duration::from_secs(1)).unwrap();
        let request = api.request(Method::GET, "articles/1").build().unwrap();
        assert_eq!(
            request.headers().get("authorization").unwrap(),
            "Bearer s3cret"
        );
    }

    #[test]
    fn conversation_filter_becomes_query() {
        let api = client("http://localhost/api");
        let filter = ConversationFilter {
            status: Some(atelier_core::chat::ConversationStatus::Closed),
            search: Some("ada".into()),
        };
        let request = api
            .request(Method::GET, "admin/chat/conversations")
            .query(&filter.query_pairs())
            .build()
            .unwrap();
        assert_eq!(request.url().query(), Some("status=closed&search=ada"));
    }

    #[test]
    fn ids_are_escaped_as_single_segments() {
        assert_eq!(segment("42").unwrap(), "42");
        assert_eq!(segment("a/../b").unwrap(), "a%2F..%2Fb");
        assert_eq!(segment("x y?").unwrap(), "x%20y%3F");
        for bad in ["", ".", ".."] {
            assert!(matches!(segment(bad), Err(ApiError::InvalidId(_))));
        }

        let api = client("https://example.org/api");
        let path = format!("admin/chat/conversations/{}/read", segment("../../articles").unwrap());
        let request = api.request(Method::POST, &path).build().unwrap();
        assert_eq!(
            request.url().path(),
            "/api/admin/chat/conversations/..%2F..%2Farticles/read"
        );
    }

    #[test]
    fn from_config_uses_api_section() {
        let mut config = AtelierConfig::default();
        config.api.base_url = "https://cms.example.org/api".into();
        let api = ApiClient::from_config(&config).unwrap();
        assert_eq!(api.base_url(), "https://cms.example.org/api");
    }
}
