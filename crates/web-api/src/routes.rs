use axum::{
    extract::{ws::WebSocketUpgrade, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use application::{LoginRequest, MessageView, RegisterRequest};
use domain::{Message, RoomId, User};

use crate::{
    auth::{bearer_token, optional_bearer_token, SessionResponse},
    error::ApiError,
    state::AppState,
    ws_connection::WebSocketConnection,
};

#[derive(Debug, Deserialize)]
struct CredentialsPayload {
    username: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct SendMessagePayload {
    content: String,
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct StreamQuery {
    token: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register_user))
        .route("/auth/login", post(login_user))
        .route("/auth/logout", post(logout_user))
        .route("/auth/me", get(current_user))
        .route(
            "/rooms/{room_id}/messages",
            post(send_message).get(get_history),
        )
        .route("/rooms/{room_id}/stream", get(stream_room))
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn register_user(
    State(state): State<AppState>,
    Json(payload): Json<CredentialsPayload>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let session = state
        .session_manager
        .register(
            RegisterRequest {
                username: payload.username,
                password: payload.password,
            },
            &state.request_token(),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(session.into())))
}

async fn login_user(
    State(state): State<AppState>,
    Json(payload): Json<CredentialsPayload>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state
        .session_manager
        .login(
            LoginRequest {
                username: payload.username,
                password: payload.password,
            },
            &state.request_token(),
        )
        .await?;

    Ok(Json(session.into()))
}

async fn logout_user(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let token = bearer_token(&headers)?;
    state
        .session_manager
        .logout(token, &state.request_token())
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn current_user(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<User>, ApiError> {
    let token = bearer_token(&headers)?;
    let user = state
        .session_manager
        .validate_token(token, &state.request_token())
        .await?;

    Ok(Json(user))
}

async fn send_message(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<SendMessagePayload>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    let token = bearer_token(&headers)?;
    let message = state
        .message_service
        .send_message_with_auth(
            token,
            payload.content,
            RoomId::from(room_id),
            &state.request_token(),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(message)))
}

/// 最新消息在前
async fn get_history(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Query(query): Query<HistoryQuery>,
    headers: HeaderMap,
) -> Result<Json<Vec<MessageView>>, ApiError> {
    let token = optional_bearer_token(&headers)?;
    let mut views = state
        .message_service
        .get_message_history_with_auth(
            token,
            &RoomId::from(room_id),
            query.limit.unwrap_or(0),
            &state.request_token(),
        )
        .await?;
    views.reverse();

    Ok(Json(views))
}

async fn stream_room(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Query(query): Query<StreamQuery>,
) -> Result<Response, ApiError> {
    let room_id = RoomId::from(room_id);
    let cancel = state.request_token();

    // 升级前完成令牌校验与订阅，失败以 HTTP 状态码返回
    let messages = state
        .message_service
        .stream_messages_with_auth(query.token, room_id.clone(), &cancel)
        .await?;

    let connection = WebSocketConnection::new(room_id, messages, cancel);
    Ok(ws.on_upgrade(move |socket| connection.run(socket)))
}
