//! HTTP API endpoints.
//!
//! Every failure is answered with `{"error": ...}` and a matching status
//! code; nothing is retried server-side.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

use crate::auth::{self, AdminPin};
use crate::error::{json_rejection, GameError};
use crate::protocol::{
    AdminOverview, JoinRequest, JoinResponse, ScenarioEntry, ScenarioList, StartGameResponse,
    StateSnapshot, SubmitRequest, SubmitResponse, SuccessResponse,
};
use crate::state::{AppState, SubmitOutcome};
use crate::types::{Player, ScenarioId};
use crate::ws;

/// All API and WebSocket routes
pub fn router(state: Arc<AppState>, admin_pin: Arc<AdminPin>) -> Router {
    let admin_routes = Router::new()
        .route("/api/admin/login", post(auth::admin_login))
        .with_state(admin_pin);

    Router::new()
        .route("/api/start-game", post(start_game))
        .route("/api/reset-game", post(reset_game))
        .route("/api/submit-response", post(submit_response))
        .route("/api/join", post(join))
        .route("/api/players/{id}", get(get_player))
        .route("/api/state", get(get_state))
        .route("/api/scenarios", get(list_scenarios))
        .route("/api/scenarios/{id}", get(get_scenario))
        .route("/api/admin/overview", get(admin_overview))
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
        .merge(admin_routes)
}

/// POST /api/start-game
pub async fn start_game(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StartGameResponse>, GameError> {
    let started = state.start_round().await.map_err(|e| {
        tracing::error!("Error starting game: {}", e);
        e
    })?;

    Ok(Json(StartGameResponse {
        success: true,
        round_ends_at: started.round_ends_at,
        player_count: started.player_count,
    }))
}

/// POST /api/reset-game
pub async fn reset_game(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SuccessResponse>, GameError> {
    state.reset_game().await.map_err(|e| {
        tracing::error!("Error resetting game: {}", e);
        e
    })?;
    Ok(Json(SuccessResponse { success: true }))
}

/// POST /api/submit-response
pub async fn submit_response(
    State(state): State<Arc<AppState>>,
    body: Result<Json<SubmitRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match body {
        Ok(body) => body,
        Err(rejection) => return json_rejection(rejection),
    };

    let Some(player_id) = req.player_id.filter(|id| !id.trim().is_empty()) else {
        return GameError::Validation("Player ID is required".to_string()).into_response();
    };

    match state.submit_response(&player_id, req.response).await {
        Ok(outcome) => Json(SubmitResponse {
            success: true,
            already_submitted: outcome == SubmitOutcome::AlreadySubmitted,
        })
        .into_response(),
        Err(e) => {
            tracing::error!("Error submitting response: {}", e);
            e.into_response()
        }
    }
}

/// POST /api/join
pub async fn join(
    State(state): State<Arc<AppState>>,
    body: Result<Json<JoinRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match body {
        Ok(body) => body,
        Err(rejection) => return json_rejection(rejection),
    };

    match state.join_player(&req.name).await {
        Ok(player) => Json(JoinResponse {
            success: true,
            player_id: player.id.clone(),
            player,
        })
        .into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /api/players/{id}
pub async fn get_player(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Player>, GameError> {
    match state.get_player(&id).await {
        Ok(player) => Ok(Json(player)),
        Err(GameError::PlayerNotFound) => Err(GameError::PlayerNotFound),
        Err(e) => {
            tracing::error!("Error reading player {}: {}", id, e);
            Err(e)
        }
    }
}

/// GET /api/state
pub async fn get_state(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StateSnapshot>, GameError> {
    let snapshot = state.snapshot().await.map_err(|e| {
        tracing::error!("Error reading game snapshot: {}", e);
        e
    })?;
    Ok(Json(snapshot))
}

/// GET /api/admin/overview
pub async fn admin_overview(
    State(state): State<Arc<AppState>>,
) -> Result<Json<AdminOverview>, GameError> {
    let overview = state.admin_overview().await.map_err(|e| {
        tracing::error!("Error building admin overview: {}", e);
        e
    })?;
    Ok(Json(overview))
}

/// GET /api/scenarios
pub async fn list_scenarios(State(state): State<Arc<AppState>>) -> Json<ScenarioList> {
    Json(ScenarioList {
        scenarios: state.catalog.entries(),
    })
}

/// GET /api/scenarios/{id}. Ids outside the catalog get the placeholder text.
pub async fn get_scenario(
    State(state): State<Arc<AppState>>,
    id: Result<Path<ScenarioId>, PathRejection>,
) -> Response {
    match id {
        Ok(Path(id)) => Json::<ScenarioEntry>(state.catalog.entry(id)).into_response(),
        Err(rejection) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": rejection.body_text() })),
        )
            .into_response(),
    }
}
