use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use hyper::{Method, StatusCode};
use log::{debug, error, warn};

use crate::classifier::{ClassifierError, ErrorCategory, GlossClassifier};

const GLOSS: &str = "gloss";

/// A transport-independent HTTP reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: StatusCode,
    pub content_type: &'static str,
    pub body: String,
}

impl HttpReply {
    pub fn text(status: StatusCode, body: impl Into<String>) -> Self {
        Self { status, content_type: "text/plain; charset=utf-8", body: body.into() }
    }

    pub fn json(body: String) -> Self {
        Self { status: StatusCode::OK, content_type: "application/json", body }
    }

    pub fn server_error() -> Self {
        Self::text(StatusCode::INTERNAL_SERVER_ERROR, "500 Server error")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    Classify,
    ClassifyWithScore,
}

impl Endpoint {
    fn from_path(path: &str) -> Option<Self> {
        match path.strip_suffix('/').unwrap_or(path) {
            "/classify" => Some(Self::Classify),
            "/classify-with-score" => Some(Self::ClassifyWithScore),
            _ => None,
        }
    }
}

/// Checks that every required field is present.
///
/// # Errors
/// - `MissingFields` listing the absent fields in `required` order
pub fn require_fields(present: &HashSet<&str>, required: &[&str]) -> Result<(), ClassifierError> {
    let missing: Vec<String> = required
        .iter()
        .filter(|field| !present.contains(*field))
        .map(|field| field.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ClassifierError::MissingFields(missing))
    }
}

/// Turns a failure into the reply the caller sees.
///
/// Client errors name the missing fields; everything else is logged in full
/// and answered with a generic message.
pub fn map_error(err: &ClassifierError) -> HttpReply {
    match err.category() {
        ErrorCategory::ClientError => {
            warn!("Rejected request: {}", err);
            HttpReply::text(StatusCode::BAD_REQUEST, err.to_string())
        }
        ErrorCategory::ServerError => {
            error!("Request failed: {} ({:?})", err, err);
            HttpReply::server_error()
        }
    }
}

/// Parses a query string; the first occurrence of a repeated key wins.
pub fn parse_query(query: Option<&str>) -> HashMap<String, String> {
    let mut params = HashMap::new();
    if let Some(query) = query {
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            params.entry(key.into_owned()).or_insert_with(|| value.into_owned());
        }
    }
    params
}

/// Dispatches requests on `/classify` and `/classify-with-score`.
#[derive(Debug, Clone)]
pub struct Router {
    classifier: Arc<GlossClassifier>,
}

impl Router {
    pub fn new(classifier: Arc<GlossClassifier>) -> Self {
        Self { classifier }
    }

    /// Handles one request. Runs inference, so call it off the async executor.
    pub fn route(
        &self,
        method: &Method,
        path: &str,
        query: Option<&str>,
        body: &[u8],
    ) -> HttpReply {
        let Some(endpoint) = Endpoint::from_path(path) else {
            return HttpReply::text(StatusCode::NOT_FOUND, "404 Not found");
        };

        let gloss = match *method {
            Method::GET => {
                let params = parse_query(query);
                let present: HashSet<&str> = params.keys().map(String::as_str).collect();
                if let Err(err) = require_fields(&present, &[GLOSS]) {
                    return map_error(&err);
                }
                params.get(GLOSS).cloned().unwrap_or_default()
            }
            Method::POST => String::from_utf8_lossy(body).into_owned(),
            _ => return HttpReply::text(StatusCode::METHOD_NOT_ALLOWED, "405 Method not allowed"),
        };
        debug!("{:?} request with a gloss of {} bytes", endpoint, gloss.len());

        let result = match endpoint {
            Endpoint::Classify => self
                .classifier
                .classify(&gloss)
                .map(|class| HttpReply::text(StatusCode::OK, class)),
            Endpoint::ClassifyWithScore => self
                .classifier
                .classify_with_score(&gloss)
                .and_then(|scored| {
                    serde_json::to_string(&scored).map_err(|e| {
                        let message = format!("Failed to serialize result: {}", e);
                        ClassifierError::InternalConsistency(message)
                    })
                })
                .map(HttpReply::json),
        };

        result.unwrap_or_else(|err| map_error(&err))
    }
}
