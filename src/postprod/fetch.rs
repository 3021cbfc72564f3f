//! Document fetching from the collaborative document service.

use reqwest::StatusCode;
use reqwest::blocking::Client;

use super::auth::{AuthError, Credentials};
use super::markup;
use super::pipeline::Cause;
use super::request::DocumentRef;

// =============================================================================
// Errors
// =============================================================================

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("could not reach the document service for {doc}: {source}")]
    Network { doc: String, source: reqwest::Error },

    #[error("not authorized to export document {doc} (HTTP {status})")]
    Unauthorized { doc: String, status: u16 },

    #[error("could not authorize export of document {doc}: {source}")]
    Auth { doc: String, source: AuthError },

    #[error("document {doc} not found")]
    NotFound { doc: String },

    #[error("document service returned HTTP {status} for {doc}")]
    Status { doc: String, status: u16 },

    #[error("document {doc} is not in the expected format: {reason}")]
    Malformed { doc: String, reason: String },
}

impl FetchError {
    pub fn cause(&self) -> Cause {
        match self {
            FetchError::Network { .. } | FetchError::Status { .. } => Cause::Network,
            FetchError::Unauthorized { .. } | FetchError::Auth { .. } => Cause::Unauthorized,
            FetchError::NotFound { .. } => Cause::NotFound,
            FetchError::Malformed { .. } => Cause::Malformed,
        }
    }
}

// =============================================================================
// Document service
// =============================================================================

/// Something that can export a document as HTML.
pub trait DocumentService: Send + Sync {
    fn export_html(&self, doc: &DocumentRef) -> Result<String, FetchError>;
}

/// Google Drive's `files.export` endpoint.
pub struct GoogleDrive {
    client: Client,
    api_base: String,
    credentials: Credentials,
}

impl GoogleDrive {
    pub fn new(client: Client, api_base: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            client,
            api_base: api_base.into(),
            credentials,
        }
    }
}

impl DocumentService for GoogleDrive {
    fn export_html(&self, doc: &DocumentRef) -> Result<String, FetchError> {
        let url = format!(
            "{}/files/{}/export",
            self.api_base.trim_end_matches('/'),
            doc.id()
        );
        let network = |source| FetchError::Network {
            doc: doc.to_string(),
            source,
        };

        let mut request = self.client.get(&url).query(&[("mimeType", "text/html")]);
        let token = self
            .credentials
            .bearer()
            .map_err(|source| FetchError::Auth {
                doc: doc.to_string(),
                source,
            })?;
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        tracing::debug!(doc = %doc, "exporting document");
        let response = request.send().map_err(network)?;
        match response.status() {
            status @ (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => {
                Err(FetchError::Unauthorized {
                    doc: doc.to_string(),
                    status: status.as_u16(),
                })
            }
            StatusCode::NOT_FOUND => Err(FetchError::NotFound {
                doc: doc.to_string(),
            }),
            status if !status.is_success() => Err(FetchError::Status {
                doc: doc.to_string(),
                status: status.as_u16(),
            }),
            _ => response.text().map_err(network),
        }
    }
}

// =============================================================================
// Fetching
// =============================================================================

/// An exported document and the images it references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedContent {
    pub html: String,
    /// Image sources in document order, without duplicates.
    pub image_urls: Vec<String>,
}

pub fn fetch_document(
    service: &dyn DocumentService,
    doc: &DocumentRef,
) -> Result<FetchedContent, FetchError> {
    let html = service.export_html(doc)?;
    if !html.to_ascii_lowercase().contains("<body") {
        return Err(FetchError::Malformed {
            doc: doc.to_string(),
            reason: "export has no <body> element".to_string(),
        });
    }

    let parsed = markup::parse(&html);
    let mut image_urls: Vec<String> = Vec::new();
    for img in markup::find_all(&parsed.nodes, "img") {
        if let Some(src) = img.attr("src")
            && !src.is_empty()
            && !image_urls.iter().any(|url| url == src)
        {
            image_urls.push(src.to_string());
        }
    }

    tracing::info!(doc = %doc, images = image_urls.len(), "fetched document");
    Ok(FetchedContent { html, image_urls })
}
