pub mod config;
pub mod request;
pub mod service;
pub mod store;

use std::path::Path;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path as UrlPath, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use santa_core::{Participant, Wish};
use serde::Serialize;
use serde_json::Value;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::config::Config;
use crate::request::WishlistSubmission;
use crate::service::{SantaService, ServiceError};
use crate::store::{AssignmentStore, RosterStore};

#[derive(Clone)]
pub struct AppState {
    service: SantaService,
}

impl AppState {
    pub fn new(service: SantaService) -> Self {
        Self { service }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(SantaService::new(
            RosterStore::new(&config.data_file),
            AssignmentStore::new(&config.assignments_file),
        ))
    }

    pub fn service(&self) -> &SantaService {
        &self.service
    }
}

/// API routes plus the bundled UI from `public_dir`. Unknown paths such as
/// `/Ania` get `index.html` so the page can render that participant.
pub fn app(state: AppState, public_dir: impl AsRef<Path>) -> Router {
    let public_dir = public_dir.as_ref();
    let ui = ServeDir::new(public_dir).fallback(ServeFile::new(public_dir.join("index.html")));

    Router::new()
        .route("/health", get(health))
        .route("/users", get(list_users))
        .route("/assigned/:name", get(get_assigned))
        .route("/wishlist", post(submit_wishlist))
        .fallback_service(ui)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServiceError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Storage(_) | ServiceError::Draw(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(err = %self, "request failed");
        }
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

#[derive(Serialize)]
struct UsersResponse {
    users: Vec<Participant>,
}

async fn list_users(State(state): State<AppState>) -> Json<UsersResponse> {
    let roster = state.service.roster().await;
    Json(UsersResponse {
        users: roster.users,
    })
}

#[derive(Serialize)]
struct AssignedResponse {
    assigned: Option<String>,
    wishlist: Vec<Wish>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

async fn get_assigned(
    State(state): State<AppState>,
    UrlPath(name): UrlPath<String>,
) -> Json<AssignedResponse> {
    let view = state.service.assignment_view(&name).await;
    let message = view
        .assigned
        .is_none()
        .then(|| format!("no assignment for {name}"));
    Json(AssignedResponse {
        assigned: view.assigned,
        wishlist: view.wishlist,
        message,
    })
}

#[derive(Serialize)]
struct WishlistResponse {
    ok: bool,
    wishlist: Vec<Wish>,
}

async fn submit_wishlist(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<WishlistResponse>, ServiceError> {
    let Json(body) = payload.map_err(|rejection| ServiceError::MalformedRequest(rejection.body_text()))?;
    let submission = WishlistSubmission::from_json(body)?;
    let wishlist = state.service.set_wishlist(submission).await?;
    Ok(Json(WishlistResponse { ok: true, wishlist }))
}
