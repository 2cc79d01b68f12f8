use std::{net::SocketAddr, path::PathBuf};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use clap::Parser;
use serde_json::Value;
use shared::{
    domain::{SectionDraft, SectionId, SessionId},
    error::{ApiError, ErrorCode},
    protocol::{SectionEdit, SessionView, SurveyLayoutView},
};
use survey_core::{SessionController, SessionError};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{info, warn};

mod app_state;
mod config;

use app_state::AppState;
use config::{build_gateway, load_settings};

const MAX_REQUEST_BYTES: usize = 64 * 1024;

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

#[derive(Parser, Debug)]
struct Args {
    /// TOML file layered between built-in defaults and the environment.
    /// Falls back to `survey.toml` when present.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let args = Args::parse();

    let settings = load_settings(args.config.as_deref())?;
    let gateway = build_gateway(&settings);
    let state = AppState::new(settings.variant, gateway, settings.max_open_sessions);
    let app = build_router(state);

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, variant = ?settings.variant, "survey server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/survey", get(survey_layout))
        .route("/sessions", post(create_session))
        .route("/sessions/:session_id", get(get_session))
        .route("/sessions/:session_id/advance", post(advance))
        .route("/sessions/:session_id/retreat", post(retreat))
        .route("/sessions/:session_id/sections/:section", put(replace_section))
        .route("/sessions/:session_id/sections/:section/edits", post(edit_section))
        .route("/sessions/:session_id/submit", post(submit))
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BYTES))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn survey_layout(State(state): State<AppState>) -> Json<SurveyLayoutView> {
    Json(SurveyLayoutView::for_variant(state.variant))
}

/// Sessions are only released by a delivered submission, so the registry is
/// capped; a full registry answers 409 until sessions complete.
async fn create_session(State(state): State<AppState>) -> ApiResult<(StatusCode, Json<SessionView>)> {
    let Some(controller) = state.open_session().await else {
        warn!(max_sessions = state.max_sessions(), "session registry full");
        return Err((
            StatusCode::CONFLICT,
            Json(ApiError::new(
                ErrorCode::Conflict,
                format!("too many open sessions (limit {})", state.max_sessions()),
            )),
        ));
    };
    let open_sessions = state.session_count().await;
    info!(
        session_id = %controller.id(),
        open_sessions,
        "session opened"
    );
    Ok((StatusCode::CREATED, Json(controller.view().await)))
}

async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
) -> ApiResult<Json<SessionView>> {
    let controller = lookup(&state, session_id).await?;
    Ok(Json(controller.view().await))
}

async fn advance(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
) -> ApiResult<Json<SessionView>> {
    let controller = lookup(&state, session_id).await?;
    controller.advance().await.map(Json).map_err(rejected)
}

async fn retreat(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
) -> ApiResult<Json<SessionView>> {
    let controller = lookup(&state, session_id).await?;
    controller.retreat().await.map(Json).map_err(rejected)
}

async fn replace_section(
    State(state): State<AppState>,
    Path((session_id, section)): Path<(SessionId, SectionId)>,
    Json(body): Json<Value>,
) -> ApiResult<Json<SessionView>> {
    let controller = lookup(&state, session_id).await?;
    let draft = SectionDraft::from_json(section, body).map_err(|e| {
        validation(format!("invalid {} draft: {e}", section.wire_name()))
    })?;
    controller
        .update_section(section, draft)
        .await
        .map(Json)
        .map_err(rejected)
}

async fn edit_section(
    State(state): State<AppState>,
    Path((session_id, section)): Path<(SessionId, SectionId)>,
    Json(body): Json<Value>,
) -> ApiResult<Json<SessionView>> {
    let controller = lookup(&state, session_id).await?;
    let edit = SectionEdit::from_json(section, body).map_err(|e| {
        validation(format!("invalid {} edit: {e}", section.wire_name()))
    })?;
    controller
        .apply_edit(section, edit)
        .await
        .map(Json)
        .map_err(rejected)
}

async fn submit(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
) -> ApiResult<(StatusCode, Json<SessionView>)> {
    let controller = lookup(&state, session_id).await?;
    let outcome = controller.submit().await.map_err(rejected)?;
    if outcome.delivered {
        state.close_session(session_id).await;
        info!(%session_id, "session closed after submission");
        Ok((StatusCode::OK, Json(outcome.view)))
    } else {
        Ok((StatusCode::BAD_GATEWAY, Json(outcome.view)))
    }
}

async fn lookup(state: &AppState, session_id: SessionId) -> ApiResult<std::sync::Arc<SessionController>> {
    state.session(session_id).await.ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(ApiError::new(
                ErrorCode::NotFound,
                format!("session {session_id} not found"),
            )),
        )
    })
}

fn validation(message: String) -> (StatusCode, Json<ApiError>) {
    warn!(%message, "rejected request body");
    (
        StatusCode::BAD_REQUEST,
        Json(ApiError::new(ErrorCode::Validation, message)),
    )
}

fn rejected(err: SessionError) -> (StatusCode, Json<ApiError>) {
    let (status, code) = match &err {
        SessionError::SectionNotInLayout(_) => (StatusCode::NOT_FOUND, ErrorCode::NotFound),
        SessionError::DraftMismatch { .. } | SessionError::Edit(_) => {
            (StatusCode::BAD_REQUEST, ErrorCode::Validation)
        }
        SessionError::AtLastSection
        | SessionError::AtFirstSection
        | SessionError::Completed
        | SessionError::SubmissionInFlight
        | SessionError::NoSubmissionInFlight
        | SessionError::NotOnLastSection { .. } => (StatusCode::CONFLICT, ErrorCode::Conflict),
    };
    (status, Json(ApiError::new(code, err.to_string())))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
