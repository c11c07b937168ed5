//! HTTP API.
//!
//! All routes live under `/api` and answer with the envelope described in
//! [`crate::response`]. Uploaded files are served back from `/uploads`.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/api/health` | Health check |
//! | `GET` `POST` | `/api/gems` | List (filters, `sortBy`) / create (JSON or multipart `images`) |
//! | `GET`  | `/api/gems/search?q=` | Name prefix search |
//! | `GET` `PUT` `DELETE` | `/api/gems/{id}` | Read / merge-update / delete |
//! | `POST` | `/api/gems/{id}/cart` | Stock check and cart line |
//! | `GET`  | `/api/gem-types` | Gem category index |
//! | `GET` `POST` | `/api/jewelry` | List / create |
//! | `GET` `PUT` `DELETE` | `/api/jewelry/{id}` | Read / update / delete |
//! | `GET` `POST` | `/api/jewelry-types` | List (paginated) / create (multipart `image`) |
//! | `GET`  | `/api/jewelry-types/search?q=` | Substring search on type and description |
//! | `GET` `PUT` `DELETE` | `/api/jewelry-types/{id}` | Read / update / delete |
//! | `PATCH` | `/api/jewelry-types/{id}/toggle` | Flip `isActive` |
//! | `GET` `POST` | `/api/customizations` | List / create |
//! | `GET` `PUT` `DELETE` | `/api/customizations/{id}` | Read / update / delete |
//! | `GET` `POST` | `/api/contact` | List (paginated) / submit |
//! | `GET` `PUT` `DELETE` | `/api/contact/{id}` | Read / status change / delete |
//! | `GET` `POST` | `/api/order` | List / place |
//! | `POST` | `/api/custom-jewellery-request` | Custom design request (multipart `image`) |
//!
//! Unknown routes answer 404 with `{"success": false, "message": "Route not found", "path": ...}`.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted for the storefront and
//! admin frontends.

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, DefaultBodyLimit, FromRequestParts, Path, Query, State},
    http::{request::Parts, StatusCode, Uri},
    routing::{get, patch, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use gemstore_core::document::Document;
use gemstore_core::query::ListParams;
use gemstore_core::repo::gem::CartLine;
use gemstore_core::repo::Repositories;
use gemstore_core::store::DocumentStore;
use gemstore_core::upload::UploadKind;

use crate::config::Config;
use crate::db;
use crate::response::{ApiError, ApiResult, Reply};
use crate::uploads::{Payload, UploadSink};

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    repos: Repositories,
    uploads: UploadSink,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, config: &Config) -> Self {
        Self {
            repos: Repositories::new(store, &config.listing.settings()),
            uploads: UploadSink::new(&config.uploads),
        }
    }
}

/// Builds the router. Used by [`run_server`] and by the integration tests.
pub fn router(state: AppState, config: &Config) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/health", get(handle_health))
        .route("/gems", get(list_gems).post(create_gem))
        .route("/gems/search", get(search_gems))
        .route("/gems/{id}", get(get_gem).put(update_gem).delete(delete_gem))
        .route("/gems/{id}/cart", post(add_gem_to_cart))
        .route("/gem-types", get(list_gem_types))
        .route("/jewelry", get(list_jewelry).post(create_jewelry))
        .route(
            "/jewelry/{id}",
            get(get_jewelry).put(update_jewelry).delete(delete_jewelry),
        )
        .route(
            "/jewelry-types",
            get(list_jewelry_types).post(create_jewelry_type),
        )
        .route("/jewelry-types/search", get(search_jewelry_types))
        .route(
            "/jewelry-types/{id}",
            get(get_jewelry_type)
                .put(update_jewelry_type)
                .delete(delete_jewelry_type),
        )
        .route("/jewelry-types/{id}/toggle", patch(toggle_jewelry_type))
        .route(
            "/customizations",
            get(list_customizations).post(create_customization),
        )
        .route(
            "/customizations/{id}",
            get(get_customization)
                .put(update_customization)
                .delete(delete_customization),
        )
        .route("/contact", get(list_contacts).post(submit_contact))
        .route(
            "/contact/{id}",
            get(get_contact).put(update_contact).delete(delete_contact),
        )
        .route("/order", get(list_orders).post(create_order))
        .route("/custom-jewellery-request", post(create_custom_request));

    let uploads_dir = state.uploads.dir().to_path_buf();

    Router::new()
        .nest("/api", api)
        .nest_service("/uploads", ServeDir::new(uploads_dir))
        .fallback(handle_not_found)
        .layer(DefaultBodyLimit::max(config.server.body_limit_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server on `[server].bind`. Runs until the process is
/// terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let store = db::open_store(config).await?;
    let state = AppState::new(store, config);
    let app = router(state, config);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(bind = %config.server.bind, "gemstore API listening");
    println!("Gemstore API listening on http://{}", config.server.bind);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Client address: first `X-Forwarded-For` entry, else the peer address,
/// else `"unknown"`.
pub struct ClientIp(pub String);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return Ok(ClientIp(ip.to_string()));
        }
        if let Some(ConnectInfo(addr)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
            return Ok(ClientIp(addr.ip().to_string()));
        }
        Ok(ClientIp("unknown".to_string()))
    }
}

type Params = Query<HashMap<String, String>>;

// ============ Health / fallback ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
    store: &'static str,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        timestamp: chrono::Utc::now().to_rfc3339(),
        store: state.repos.store().backend(),
    })
}

async fn handle_not_found(uri: Uri) -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, "Route not found").with("path", uri.path())
}

// ============ Gems ============

async fn list_gems(State(state): State<AppState>, Query(params): Params) -> ApiResult<Vec<Document>> {
    let listing = state.repos.gems.list(&ListParams::from(params)).await?;
    Ok(Reply::listing(listing))
}

async fn create_gem(State(state): State<AppState>, payload: Payload) -> ApiResult<Document> {
    let uploads = state.uploads.save_all(UploadKind::Gem, payload.files).await?;
    let created = state.repos.gems.create(payload.fields, &uploads).await?;
    let count = created.uploaded_images.len();
    Ok(Reply::created(created.gem)
        .message(format!("Gem created successfully with {} images", count))
        .with("uploadedImages", created.uploaded_images))
}

async fn search_gems(State(state): State<AppState>, Query(params): Params) -> ApiResult<Vec<Document>> {
    let hits = state
        .repos
        .gems
        .search(params.get("q").map(String::as_str))
        .await?;
    let count = hits.len();
    Ok(Reply::ok(hits).total(count))
}

async fn get_gem(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Document> {
    Ok(Reply::ok(state.repos.gems.get(&id).await?))
}

async fn update_gem(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Payload,
) -> ApiResult<Document> {
    let mut fields = payload.fields;
    if !payload.files.is_empty() {
        let uploads = state.uploads.save_all(UploadKind::Gem, payload.files).await?;
        let paths: Vec<String> = uploads.iter().map(|u| u.public_path()).collect();
        fields.insert("images".into(), json!(paths));
    }
    let gem = state.repos.gems.update(&id, fields).await?;
    Ok(Reply::ok(gem).message("Gem updated successfully"))
}

async fn delete_gem(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    state.repos.gems.delete(&id).await?;
    Ok(Reply::done("Gem deleted successfully"))
}

async fn add_gem_to_cart(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<CartLine> {
    let line = state.repos.gems.add_to_cart(&id).await?;
    Ok(Reply::ok(line).message("Gem added to cart"))
}

async fn list_gem_types(State(state): State<AppState>) -> ApiResult<Vec<Document>> {
    let entries = state.repos.gem_types().await?;
    let count = entries.len();
    Ok(Reply::ok(entries).total(count))
}

// ============ Jewelry ============

async fn list_jewelry(State(state): State<AppState>, Query(params): Params) -> ApiResult<Vec<Document>> {
    let listing = state.repos.jewelry.list(&ListParams::from(params)).await?;
    Ok(Reply::listing(listing))
}

async fn create_jewelry(State(state): State<AppState>, payload: Payload) -> ApiResult<Document> {
    let uploads = state
        .uploads
        .save_all(UploadKind::Jewelry, payload.files)
        .await?;
    let created = state.repos.jewelry.create(payload.fields, &uploads).await?;
    Ok(Reply::created(created.item)
        .message("Jewelry created successfully")
        .with("uploadedImages", created.uploaded_images))
}

async fn get_jewelry(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Document> {
    Ok(Reply::ok(state.repos.jewelry.get(&id).await?))
}

async fn update_jewelry(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Payload,
) -> ApiResult<Document> {
    let mut fields = payload.fields;
    if !payload.files.is_empty() {
        let uploads = state
            .uploads
            .save_all(UploadKind::Jewelry, payload.files)
            .await?;
        let paths: Vec<String> = uploads.iter().map(|u| u.public_path()).collect();
        fields.insert("images".into(), json!(paths));
    }
    let item = state.repos.jewelry.update(&id, fields).await?;
    Ok(Reply::ok(item).message("Jewelry updated successfully"))
}

async fn delete_jewelry(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    state.repos.jewelry.delete(&id).await?;
    Ok(Reply::done("Jewelry deleted successfully"))
}

// ============ Jewelry types ============

async fn list_jewelry_types(
    State(state): State<AppState>,
    Query(params): Params,
) -> ApiResult<Vec<Document>> {
    let listing = state
        .repos
        .jewelry_types
        .list(&ListParams::from(params))
        .await?;
    Ok(Reply::listing(listing))
}

async fn create_jewelry_type(State(state): State<AppState>, payload: Payload) -> ApiResult<Document> {
    let upload = state
        .uploads
        .save_one(UploadKind::JewelryType, payload.files)
        .await?;
    let created = state
        .repos
        .jewelry_types
        .create(&payload.fields, upload.as_ref())
        .await?;
    Ok(Reply::created(created).message("Jewelry type created successfully"))
}

async fn search_jewelry_types(
    State(state): State<AppState>,
    Query(params): Params,
) -> ApiResult<Vec<Document>> {
    let hits = state
        .repos
        .jewelry_types
        .search(params.get("q").map(String::as_str))
        .await?;
    let count = hits.len();
    Ok(Reply::ok(hits).total(count))
}

async fn get_jewelry_type(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Document> {
    Ok(Reply::ok(state.repos.jewelry_types.get(&id).await?))
}

async fn update_jewelry_type(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Payload,
) -> ApiResult<Document> {
    let mut fields = payload.fields;
    let upload = state
        .uploads
        .save_one(UploadKind::JewelryType, payload.files)
        .await?;
    if let Some(file) = upload {
        fields.insert("image".into(), Value::String(file.public_path()));
    }
    let updated = state.repos.jewelry_types.update(&id, fields).await?;
    Ok(Reply::ok(updated).message("Jewelry type updated successfully"))
}

async fn delete_jewelry_type(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    state.repos.jewelry_types.delete(&id).await?;
    Ok(Reply::done("Jewelry type deleted successfully"))
}

async fn toggle_jewelry_type(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Document> {
    let toggled = state.repos.jewelry_types.toggle(&id).await?;
    let verb = if toggled.active { "activated" } else { "deactivated" };
    Ok(Reply::ok(toggled.jewelry_type).message(format!("Jewelry type {} successfully", verb)))
}

// ============ Customizations ============

async fn list_customizations(
    State(state): State<AppState>,
    Query(params): Params,
) -> ApiResult<Vec<Document>> {
    let listing = state
        .repos
        .customizations
        .list(&ListParams::from(params))
        .await?;
    Ok(Reply::listing(listing))
}

async fn create_customization(State(state): State<AppState>, payload: Payload) -> ApiResult<Document> {
    let created = state.repos.customizations.create(payload.fields).await?;
    Ok(Reply::created(created).message("Customization created successfully"))
}

async fn get_customization(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Document> {
    Ok(Reply::ok(state.repos.customizations.get(&id).await?))
}

async fn update_customization(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Payload,
) -> ApiResult<Document> {
    let updated = state.repos.customizations.update(&id, payload.fields).await?;
    Ok(Reply::ok(updated).message("Customization updated successfully"))
}

async fn delete_customization(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    state.repos.customizations.delete(&id).await?;
    Ok(Reply::done("Customization deleted successfully"))
}

// ============ Contact ============

async fn submit_contact(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    payload: Payload,
) -> ApiResult {
    let contact = state.repos.contacts.submit(&payload.fields, &ip).await?;
    let submitted_at = contact
        .fields
        .get("submittedAt")
        .cloned()
        .unwrap_or(Value::Null);
    Ok(Reply::created(json!({ "id": contact.id, "submittedAt": submitted_at }))
        .message("Contact form submitted successfully"))
}

async fn list_contacts(State(state): State<AppState>, Query(params): Params) -> ApiResult<Vec<Document>> {
    let listing = state.repos.contacts.list(&ListParams::from(params)).await?;
    Ok(Reply::listing(listing))
}

async fn get_contact(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Document> {
    Ok(Reply::ok(state.repos.contacts.get(&id).await?))
}

async fn update_contact(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Payload,
) -> ApiResult<Document> {
    let updated = state.repos.contacts.update_status(&id, &payload.fields).await?;
    Ok(Reply::ok(updated).message("Contact status updated successfully"))
}

async fn delete_contact(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    state.repos.contacts.delete(&id).await?;
    Ok(Reply::done("Contact deleted successfully"))
}

// ============ Orders / custom requests ============

async fn list_orders(State(state): State<AppState>, Query(params): Params) -> ApiResult<Vec<Document>> {
    let listing = state.repos.orders.list(&ListParams::from(params)).await?;
    Ok(Reply::listing(listing))
}

async fn create_order(State(state): State<AppState>, payload: Payload) -> ApiResult<Document> {
    let order = state.repos.orders.create(payload.fields).await?;
    Ok(Reply::created(order).message("Order placed successfully"))
}

async fn create_custom_request(State(state): State<AppState>, payload: Payload) -> ApiResult<Document> {
    let upload = state
        .uploads
        .save_one(UploadKind::CustomRequest, payload.files)
        .await?;
    let request = state
        .repos
        .custom_requests
        .create(payload.fields, upload.as_ref())
        .await?;
    let image_url = request.fields.get("image").cloned().unwrap_or(Value::Null);
    Ok(Reply::created(request)
        .message("Custom jewellery request submitted successfully.")
        .with("imageUrl", image_url))
}
