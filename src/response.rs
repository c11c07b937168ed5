//! Response envelope.
//!
//! Every endpoint answers with the same JSON shape:
//!
//! ```json
//! { "success": true, "message": "...", "data": ..., "total": 3 }
//! { "success": true, "data": [...], "pagination": { "page": 1, "limit": 10, "total": 42, "pages": 5 } }
//! { "success": false, "message": "All fields are required", "errors": { "email": "Email is required" } }
//! { "success": false, "message": "Internal server error", "error": "store error: ..." }
//! ```
//!
//! Status codes follow the error taxonomy: 200 for reads/updates/deletes,
//! 201 for creates, 400 for validation failures, 404 for missing documents,
//! 500 for query and store failures. Error detail is always included.

use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{Map, Value};

use gemstore_core::document::Document;
use gemstore_core::query::PageInfo;
use gemstore_core::repo::Listing;
use gemstore_core::Error;

#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PageInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<BTreeMap<String, String>>,
    /// Endpoint-specific top-level keys (`uploadedImages`, `imageUrl`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl<T> Envelope<T> {
    fn new(success: bool) -> Self {
        Self {
            success,
            message: None,
            data: None,
            total: None,
            pagination: None,
            error: None,
            errors: None,
            extra: Map::new(),
        }
    }
}

/// A successful response.
#[derive(Debug)]
pub struct Reply<T = Value> {
    status: StatusCode,
    body: Envelope<T>,
}

impl<T: Serialize> Reply<T> {
    pub fn ok(data: T) -> Self {
        Self::with_status(StatusCode::OK, data)
    }

    pub fn created(data: T) -> Self {
        Self::with_status(StatusCode::CREATED, data)
    }

    fn with_status(status: StatusCode, data: T) -> Self {
        let mut body = Envelope::new(true);
        body.data = Some(data);
        Self { status, body }
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.body.message = Some(message.into());
        self
    }

    pub fn total(mut self, total: usize) -> Self {
        self.body.total = Some(total);
        self
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.body.extra.insert(key.to_string(), value.into());
        self
    }
}

impl Reply<()> {
    /// 200 with a message and no data.
    pub fn done(message: impl Into<String>) -> Self {
        let mut body = Envelope::new(true);
        body.message = Some(message.into());
        Self {
            status: StatusCode::OK,
            body,
        }
    }
}

impl Reply<Vec<Document>> {
    /// A listing: paginated listings carry `pagination`, the others `total`.
    pub fn listing(listing: Listing) -> Self {
        let mut body = Envelope::new(true);
        match listing.page {
            Some(info) => body.pagination = Some(info),
            None => body.total = Some(listing.items.len()),
        }
        body.data = Some(listing.items);
        Self {
            status: StatusCode::OK,
            body,
        }
    }
}

impl<T: Serialize> IntoResponse for Reply<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// A failed request, rendered as `success: false`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    error: Option<String>,
    errors: Option<BTreeMap<String, String>>,
    extra: Map<String, Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            error: None,
            errors: None,
            extra: Map::new(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        let mut err = Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
        err.error = Some(detail.into());
        err
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::Validation(fe) => {
                let mut api = ApiError::bad_request(fe.message);
                if !fe.fields.is_empty() {
                    api.errors = Some(fe.fields);
                }
                api
            }
            Error::NotFound { ref entity, .. } => {
                ApiError::new(StatusCode::NOT_FOUND, format!("{} not found", entity))
            }
            Error::Query(_) | Error::Store(_) => {
                tracing::error!(error = %err, "request failed");
                ApiError::internal(err.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = Envelope::<()>::new(false);
        body.message = Some(self.message);
        body.error = self.error;
        body.errors = self.errors;
        body.extra = self.extra;
        (self.status, Json(body)).into_response()
    }
}

pub type ApiResult<T = Value> = Result<Reply<T>, ApiError>;
