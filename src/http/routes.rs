//! REST endpoints over the core services.
//!
//! Thin layer: every handler delegates to the store, the sync registry, or
//! the reply generator. Errors surface as JSON `{"detail": ...}` bodies.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::llm::ReplyGenerator;
use crate::model::{Category, KnowledgeDoc, MailAccount};
use crate::store::{EmailFilter, EmailStore};
use crate::sync::{AccountCredentials, SyncOrchestrator, SyncRegistry};

/// Shared state for all API routes.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn EmailStore>,
    pub registry: Arc<SyncRegistry>,
    pub orchestrator: Arc<SyncOrchestrator>,
    pub generator: Arc<ReplyGenerator>,
    /// Name signed under generated replies.
    pub user_name: String,
    /// Scheduling link offered in replies, if configured.
    pub booking_link: Option<String>,
}

fn detail(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<serde_json::Value>) {
    (status, Json(json!({ "detail": message.into() })))
}

fn db_error(e: DatabaseError) -> (StatusCode, Json<serde_json::Value>) {
    match e {
        DatabaseError::NotFound { entity, id } => detail(
            StatusCode::NOT_FOUND,
            format!("{entity} {id} not found"),
        ),
        other => {
            warn!(error = %other, "Database error serving request");
            detail(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
        }
    }
}

/// GET /
async fn banner() -> impl IntoResponse {
    Json(json!({
        "service": "reachmail",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
    }))
}

/// POST /api/accounts/add
///
/// Verifies the credentials against the IMAP server before anything is
/// stored; a failed connect or login is the one hard error an end user
/// sees. On success the (credential-less) account row is upserted and a
/// background sync pass is started unless one is already running.
async fn add_account(
    State(state): State<AppState>,
    Json(creds): Json<AccountCredentials>,
) -> impl IntoResponse {
    if let Err(e) = state.orchestrator.verify_account(&creds).await {
        warn!(account = %creds.email, error = %e, "Account verification failed");
        return detail(StatusCode::BAD_REQUEST, e.to_string()).into_response();
    }

    let account = MailAccount {
        email: creds.email.clone(),
        server: creds.server.clone(),
        port: creds.port,
        added_at: chrono::Utc::now(),
    };
    if let Err(e) = state.store.upsert_account(&account).await {
        return db_error(e).into_response();
    }

    let orchestrator = Arc::clone(&state.orchestrator);
    let key = creds.email.clone();
    let sync_started = state.registry.get_or_start(&key, move |cancel| {
        Box::pin(async move {
            let _ = orchestrator.run_pass(&creds, cancel).await;
        })
    });

    info!(account = %account.email, sync_started, "Account registered");
    Json(json!({
        "status": "connected",
        "email": account.email,
        "sync_started": sync_started,
    }))
    .into_response()
}

/// GET /api/accounts/list
async fn list_accounts(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.list_accounts().await {
        Ok(accounts) => Json(json!({
            "accounts": accounts,
            "active_syncs": state.registry.active(),
        }))
        .into_response(),
        Err(e) => db_error(e).into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct ListEmailsQuery {
    account: Option<String>,
    folder: Option<String>,
    category: Option<String>,
    limit: Option<usize>,
}

/// GET /api/emails
async fn list_emails(
    State(state): State<AppState>,
    Query(query): Query<ListEmailsQuery>,
) -> impl IntoResponse {
    let category = match query.category.as_deref() {
        None => None,
        Some(label) => match Category::from_label(label) {
            Some(c) => Some(c),
            None => {
                return detail(
                    StatusCode::BAD_REQUEST,
                    format!("unknown category {label:?}"),
                )
                .into_response();
            }
        },
    };

    let filter = EmailFilter {
        account: query.account,
        folder: query.folder,
        category,
        limit: query.limit.unwrap_or(EmailFilter::default().limit),
    };
    match state.store.list_emails(&filter).await {
        Ok(emails) => {
            let count = emails.len();
            Json(json!({ "emails": emails, "count": count })).into_response()
        }
        Err(e) => db_error(e).into_response(),
    }
}

/// GET /api/emails/{id}
async fn get_email(State(state): State<AppState>, Path(id): Path<Uuid>) -> impl IntoResponse {
    match state.store.get_email(id).await {
        Ok(Some(email)) => Json(email).into_response(),
        Ok(None) => detail(StatusCode::NOT_FOUND, format!("email {id} not found")).into_response(),
        Err(e) => db_error(e).into_response(),
    }
}

/// POST /api/emails/{id}/read
async fn mark_read(State(state): State<AppState>, Path(id): Path<Uuid>) -> impl IntoResponse {
    match state.store.set_read(id, true).await {
        Ok(()) => Json(json!({ "id": id, "read": true })).into_response(),
        Err(e) => db_error(e).into_response(),
    }
}

/// POST /api/emails/{id}/suggest-reply
///
/// Drafts reply variants from the stored email body and persists the
/// medium variant as the record's suggested reply.
async fn suggest_reply(State(state): State<AppState>, Path(id): Path<Uuid>) -> impl IntoResponse {
    let email = match state.store.get_email(id).await {
        Ok(Some(email)) => email,
        Ok(None) => {
            return detail(StatusCode::NOT_FOUND, format!("email {id} not found"))
                .into_response();
        }
        Err(e) => return db_error(e).into_response(),
    };

    let incoming = format!("Subject: {}\n\n{}", email.subject, email.body);
    let variants = state
        .generator
        .generate(
            &incoming,
            &state.user_name,
            state.booking_link.as_deref(),
            "professional",
        )
        .await;

    if let Err(e) = state.store.set_suggested_reply(id, &variants.medium).await {
        return db_error(e).into_response();
    }
    Json(variants).into_response()
}

#[derive(Debug, Deserialize)]
struct GenerateReplyRequest {
    incoming_email: String,
    user_name: Option<String>,
    booking_link: Option<String>,
    tone: Option<String>,
}

/// POST /api/emails/generate-reply
async fn generate_reply(
    State(state): State<AppState>,
    Json(request): Json<GenerateReplyRequest>,
) -> impl IntoResponse {
    let user_name = request.user_name.as_deref().unwrap_or(&state.user_name);
    let booking_link = request
        .booking_link
        .as_deref()
        .or(state.booking_link.as_deref());
    let tone = request.tone.as_deref().unwrap_or("professional");

    let variants = state
        .generator
        .generate(&request.incoming_email, user_name, booking_link, tone)
        .await;
    Json(variants)
}

#[derive(Debug, Deserialize)]
struct AddKnowledgeRequest {
    content: String,
    #[serde(default)]
    metadata: serde_json::Value,
}

/// POST /api/knowledge/add
async fn add_knowledge(
    State(state): State<AppState>,
    Json(request): Json<AddKnowledgeRequest>,
) -> impl IntoResponse {
    let doc = KnowledgeDoc {
        id: Uuid::new_v4(),
        content: request.content,
        metadata: if request.metadata.is_null() {
            json!({})
        } else {
            request.metadata
        },
        added_at: chrono::Utc::now(),
    };
    match state.store.insert_knowledge(&doc).await {
        Ok(()) => Json(doc).into_response(),
        Err(e) => db_error(e).into_response(),
    }
}

/// GET /api/knowledge/list
async fn list_knowledge(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.list_knowledge().await {
        Ok(docs) => {
            let count = docs.len();
            Json(json!({ "documents": docs, "count": count })).into_response()
        }
        Err(e) => db_error(e).into_response(),
    }
}

/// GET /api/stats
async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    let total = match state.store.count_emails().await {
        Ok(n) => n,
        Err(e) => return db_error(e).into_response(),
    };
    let accounts = match state.store.count_accounts().await {
        Ok(n) => n,
        Err(e) => return db_error(e).into_response(),
    };

    let mut categories = serde_json::Map::new();
    for category in Category::ALL {
        match state.store.count_by_category(category).await {
            Ok(n) => {
                categories.insert(category.as_label().to_string(), json!(n));
            }
            Err(e) => return db_error(e).into_response(),
        }
    }

    Json(json!({
        "total_emails": total,
        "categories": categories,
        "accounts": accounts,
        "active_syncs": state.registry.len(),
    }))
    .into_response()
}

/// Build the full API router.
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(banner))
        .route("/api/accounts/add", post(add_account))
        .route("/api/accounts/list", get(list_accounts))
        .route("/api/emails", get(list_emails))
        .route("/api/emails/{id}", get(get_email))
        .route("/api/emails/{id}/read", post(mark_read))
        .route("/api/emails/{id}/suggest-reply", post(suggest_reply))
        .route("/api/emails/generate-reply", post(generate_reply))
        .route("/api/knowledge/add", post(add_knowledge))
        .route("/api/knowledge/list", get(list_knowledge))
        .route("/api/stats", get(stats))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
