//! HTTP request surface: the envelope-speaking endpoints in front of the
//! tick engine, session registry, and leaderboard store.

use crate::auth::IdentityVerifier;
use crate::config::Config;
use crate::error::ApiError;
use crate::game::engine::{Engine, JoinError, JoinTicket, SubmitError};
use crate::game::grid::Direction;
use crate::leaderboard::{LeaderboardKind, LeaderboardStore};
use crate::metrics::Metrics;
use crate::protocol::{
    DeltaData, Envelope, JoinData, JoinRequest, LeaderboardData, LeaderboardEntryPayload,
    LoginData, LoginRequest, MapData, MapSize, MoveRequest, StatusData,
};
use crate::rate_limit::RateLimiter;
use crate::session::SessionRegistry;
use crate::shared::names::sanitize_player_name;
use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, Query, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Fallback palette for players that do not pick a color.
const COLOR_POOL: [&str; 8] = [
    "#ff6b6b", "#ffd166", "#06d6a0", "#4dabf7", "#f06595", "#845ef7", "#20c997", "#fcc419",
];

const LOGIN_WINDOW_SECONDS: u32 = 3600;
const JOIN_WINDOW_SECONDS: u32 = 60;
const STATUS_WINDOW_SECONDS: u32 = 60;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub engine: Arc<Engine>,
    pub registry: Arc<SessionRegistry>,
    pub leaderboard: LeaderboardStore,
    pub verifier: IdentityVerifier,
    pub limiter: Arc<RateLimiter>,
    pub metrics: Arc<Metrics>,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/api/game/login", post(login))
        .route("/api/game/join", post(join))
        .route("/api/game/map", get(full_map))
        .route("/api/game/map/delta", get(delta_map))
        .route("/api/game/move", post(submit_move))
        .route("/api/status", get(status))
        .route("/api/leaderboard", get(leaderboard))
        .route("/api/metrics", get(metrics_dump))
        .layer(cors)
        .with_state(state)
}

/// Proxy-aware client address for per-IP rate limiting.
fn client_ip(headers: &HeaderMap, addr: &SocketAddr) -> String {
    if let Some(forwarded) = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
    {
        let first = forwarded.split(',').next().unwrap_or("").trim();
        if !first.is_empty() {
            return first.to_string();
        }
    }
    if let Some(real_ip) = headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
    {
        let trimmed = real_ip.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    addr.ip().to_string()
}

fn enforce_limit(
    state: &AppState,
    key: String,
    max_requests: u32,
    window_seconds: u32,
) -> Result<(), ApiError> {
    if !state.config.rate_limit.enabled {
        return Ok(());
    }
    if state.limiter.check_limit(&key, max_requests, window_seconds) {
        return Ok(());
    }
    Err(ApiError::RateLimited {
        retry_after_seconds: state.limiter.retry_after(&key, window_seconds),
    })
}

fn parse_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|_| ApiError::InvalidRequest("invalid json format".to_string()))
}

async fn login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<Envelope<LoginData>>, ApiError> {
    state.metrics.record_request("login");
    let ip = client_ip(&headers, &addr);
    enforce_limit(
        &state,
        format!("login:{ip}"),
        state.config.rate_limit.login_per_hour,
        LOGIN_WINDOW_SECONDS,
    )?;

    let request = parse_body(payload)?;
    if request.uid.is_empty() || request.paste.is_empty() {
        return Err(ApiError::InvalidRequest(
            "uid and paste cannot be empty".to_string(),
        ));
    }

    let verified = state
        .verifier
        .verify(&request.uid, &request.paste)
        .await
        .map_err(ApiError::internal)?;
    if !verified {
        tracing::warn!(uid = request.uid, "identity verification failed");
        return Err(ApiError::Forbidden("authentication failed".to_string()));
    }

    let key = state.registry.issue_key(&request.uid);
    tracing::info!(uid = request.uid, ip, "login successful");
    Ok(Json(Envelope::success(LoginData { key })))
}

async fn join(
    State(state): State<AppState>,
    payload: Result<Json<JoinRequest>, JsonRejection>,
) -> Result<Json<Envelope<JoinData>>, ApiError> {
    state.metrics.record_request("join");
    let request = parse_body(payload)?;
    if request.key.is_empty() {
        return Err(ApiError::InvalidRequest("key cannot be empty".to_string()));
    }
    if request.name.is_empty() {
        return Err(ApiError::InvalidRequest("name cannot be empty".to_string()));
    }

    let Some(uid) = state.registry.uid_for_key(&request.key) else {
        return Err(ApiError::Unauthorized("invalid key".to_string()));
    };
    enforce_limit(
        &state,
        format!("join:{}", request.key),
        state.config.rate_limit.join_per_minute,
        JOIN_WINDOW_SECONDS,
    )?;

    let name = sanitize_player_name(&request.name, "Player");
    let color = match request.color.filter(|value| !value.is_empty()) {
        Some(color) => color,
        None => COLOR_POOL[state.engine.in_game_count().await % COLOR_POOL.len()].to_string(),
    };

    let previous_token = state.registry.current_token(&uid);
    let grant = state.registry.begin_session(&uid);
    let ticket = JoinTicket {
        player_id: grant.player_id.clone(),
        uid: uid.clone(),
        name: name.clone(),
        color,
        replaces: grant.replaces.clone(),
    };
    match state.engine.join_player(ticket).await {
        Ok(outcome) => {
            tracing::info!(uid, name, player_id = grant.player_id, "player joined");
            Ok(Json(Envelope::success(JoinData {
                token: grant.token,
                id: grant.player_id,
                initial_direction: outcome.initial_direction.as_str().to_string(),
                map_state: outcome.map_state,
            })))
        }
        Err(JoinError::AlreadyInGame) => {
            state.registry.rollback(&uid, &grant, previous_token);
            Err(ApiError::Conflict("already in game".to_string()))
        }
    }
}

async fn full_map(State(state): State<AppState>) -> Json<Envelope<MapData>> {
    state.metrics.record_request("map");
    let map_state = state.engine.snapshot().await;
    Json(Envelope::success(MapData { map_state }))
}

async fn delta_map(State(state): State<AppState>) -> Json<Envelope<DeltaData>> {
    state.metrics.record_request("map_delta");
    let delta_state = state.engine.delta().await;
    Json(Envelope::success(DeltaData { delta_state }))
}

async fn submit_move(
    State(state): State<AppState>,
    payload: Result<Json<MoveRequest>, JsonRejection>,
) -> Result<Json<Envelope<serde_json::Value>>, ApiError> {
    state.metrics.record_request("move");
    let request = parse_body(payload)?;
    if request.token.is_empty() {
        return Err(ApiError::InvalidRequest(
            "token cannot be empty".to_string(),
        ));
    }
    let Some(direction) = Direction::parse(&request.direction) else {
        return Err(ApiError::InvalidRequest("invalid direction".to_string()));
    };
    let Some(player_id) = state.registry.player_for_token(&request.token) else {
        return Err(ApiError::Unauthorized("invalid token".to_string()));
    };

    match state.engine.submit_move(&player_id, direction).await {
        Ok(()) => Ok(Json(Envelope::success(json!({})))),
        Err(SubmitError::PlayerNotInGame) => {
            Err(ApiError::NotFound("player not in game".to_string()))
        }
        Err(SubmitError::DuplicateCommand) => Err(ApiError::DuplicateCommand),
    }
}

async fn status(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<Json<Envelope<StatusData>>, ApiError> {
    state.metrics.record_request("status");
    let ip = client_ip(&headers, &addr);
    enforce_limit(
        &state,
        format!("status:{ip}"),
        state.config.rate_limit.status_per_minute,
        STATUS_WINDOW_SECONDS,
    )?;

    Ok(Json(Envelope::success(StatusData {
        status: "running".to_string(),
        player_count: state.engine.in_game_count().await,
        map_size: MapSize {
            width: state.config.game.map_width,
            height: state.config.game.map_height,
        },
        round_time: state.config.game.round_time_ms,
    })))
}

fn parse_param<T: std::str::FromStr>(
    params: &HashMap<String, String>,
    key: &str,
    fallback: T,
) -> Result<T, ApiError> {
    match params.get(key) {
        Some(value) => value
            .parse()
            .map_err(|_| ApiError::InvalidRequest(format!("invalid {key}"))),
        None => Ok(fallback),
    }
}

async fn leaderboard(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Envelope<LeaderboardData>>, ApiError> {
    state.metrics.record_request("leaderboard");
    let config = &state.config.leaderboard;

    let type_param = params
        .get("type")
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_else(|| "kd".to_string());
    let Some(kind) = LeaderboardKind::parse(&type_param) else {
        return Err(ApiError::InvalidRequest("invalid type".to_string()));
    };
    let limit: i64 = parse_param(&params, "limit", 50.min(config.max_entries))?;
    let offset: i64 = parse_param(&params, "offset", 0)?;
    let start_time: i64 = parse_param(&params, "start_time", 0)?;
    let end_time: i64 = parse_param(&params, "end_time", 0)?;

    let limit = limit.clamp(1, config.max_entries);
    let offset = offset.max(0);

    let entries = state
        .leaderboard
        .top_players(kind, limit, offset, start_time, end_time)
        .await
        .map_err(ApiError::internal)?;

    let entries = entries
        .into_iter()
        .map(|entry| LeaderboardEntryPayload {
            kd: entry.kd(),
            avg_length_per_game: entry.avg_length_per_game(),
            uid: entry.uid,
            name: entry.name,
            season_id: entry.season_id,
            now_length: entry.now_length,
            max_length: entry.max_length,
            kills: entry.kills,
            deaths: entry.deaths,
            games_played: entry.games_played,
            total_food: entry.total_food,
            last_round: entry.last_round,
            timestamp: entry.timestamp,
            rank: entry.rank,
        })
        .collect();

    Ok(Json(Envelope::success(LeaderboardData {
        board_type: kind.as_str().to_string(),
        limit,
        offset,
        start_time,
        end_time,
        refresh_interval_rounds: config.refresh_interval_rounds,
        cache_ttl_seconds: config.cache_ttl_seconds,
        entries,
    })))
}

async fn metrics_dump(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    if !state.metrics.is_enabled() {
        return Err(ApiError::Unavailable("metrics disabled".to_string()));
    }
    let format = params
        .get("format")
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_else(|| "json".to_string());

    if format == "prometheus" {
        return Ok((
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            state.metrics.to_prometheus(),
        )
            .into_response());
    }

    let body = Envelope::success(json!({ "metrics": state.metrics.to_json() }));
    Ok(Json(body).into_response())
}
