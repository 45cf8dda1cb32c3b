use std::sync::Arc;

use axum::{
    extract::State,
    http::{Method, StatusCode},
    middleware,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use parley_shared::types::{ConversationId, MessageId, UserId};
use parley_store::{Conversation, ConversationWithPeer, Database, MessageWithSender, User};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::rate_limit::{rate_limit_middleware, RateLimiter};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    pub fn new(db: Database, config: &ServerConfig) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            rate_limiter: RateLimiter::from_config(config),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        // Identity directory
        .route("/users", post(upsert_user).get(list_other_users))
        .route("/users/:identity_key", get(lookup_user))
        .route("/users/:identity_key/online", post(set_online_status))
        // Conversation registry
        .route(
            "/conversations",
            post(get_or_create_conversation).get(list_conversations),
        )
        .route("/conversations/:id", get(get_conversation))
        // Message log
        .route(
            "/conversations/:id/messages",
            post(send_message).get(list_messages),
        )
        .route("/messages/:id", delete(delete_message))
        // Typing presence and read tracking
        .route(
            "/conversations/:id/typing",
            post(set_typing).get(list_typing_users),
        )
        .route("/conversations/:id/read", post(mark_read))
        .route("/conversations/:id/unread", get(unread_count))
        .layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─── Request / response bodies ───

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertUserRequest {
    identity_key: String,
    name: String,
    email: String,
    #[serde(default)]
    avatar_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserIdResponse {
    user_id: UserId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OnlineStatusRequest {
    is_online: bool,
}

#[derive(Deserialize)]
struct ListUsersQuery {
    exclude: String,
    search: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetOrCreateConversationRequest {
    user_a: UserId,
    user_b: UserId,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConversationIdResponse {
    conversation_id: ConversationId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserQuery {
    user_id: UserId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageRequest {
    sender_id: UserId,
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MessageIdResponse {
    message_id: MessageId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteMessageRequest {
    requester_id: UserId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserBody {
    user_id: UserId,
}

#[derive(Deserialize)]
struct TypingQuery {
    exclude: UserId,
}

#[derive(Serialize)]
struct UnreadCountResponse {
    count: u64,
}

// ─── Handlers ───

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn upsert_user(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<UpsertUserRequest>,
) -> Result<Json<UserIdResponse>, ServerError> {
    let db = state.db.lock().await;
    let user_id = db.upsert_user(&req.identity_key, &req.name, &req.email, &req.avatar_url)?;
    Ok(Json(UserIdResponse { user_id }))
}

async fn set_online_status(
    State(state): State<AppState>,
    ApiPath(identity_key): ApiPath<String>,
    ApiJson(req): ApiJson<OnlineStatusRequest>,
) -> Result<StatusCode, ServerError> {
    let db = state.db.lock().await;
    db.set_online_status(&identity_key, req.is_online)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_other_users(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListUsersQuery>,
) -> Result<Json<Vec<User>>, ServerError> {
    let db = state.db.lock().await;
    let users = db.list_other_users(&query.exclude, query.search.as_deref())?;
    Ok(Json(users))
}

async fn lookup_user(
    State(state): State<AppState>,
    ApiPath(identity_key): ApiPath<String>,
) -> Result<Json<Option<User>>, ServerError> {
    let db = state.db.lock().await;
    Ok(Json(db.get_user_by_identity(&identity_key)?))
}

async fn get_or_create_conversation(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<GetOrCreateConversationRequest>,
) -> Result<Json<ConversationIdResponse>, ServerError> {
    let db = state.db.lock().await;
    let conversation_id = db.get_or_create_conversation(req.user_a, req.user_b)?;
    Ok(Json(ConversationIdResponse { conversation_id }))
}

async fn get_conversation(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ConversationId>,
) -> Result<Json<Conversation>, ServerError> {
    let db = state.db.lock().await;
    db.get_conversation(id)?
        .map(Json)
        .ok_or_else(|| ServerError::NotFound(format!("conversation {id}")))
}

async fn list_conversations(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<UserQuery>,
) -> Result<Json<Vec<ConversationWithPeer>>, ServerError> {
    let db = state.db.lock().await;
    Ok(Json(db.list_conversations_for_user(query.user_id)?))
}

async fn send_message(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ConversationId>,
    ApiJson(req): ApiJson<SendMessageRequest>,
) -> Result<Json<MessageIdResponse>, ServerError> {
    let db = state.db.lock().await;
    let message_id = db.send_message(id, req.sender_id, &req.text)?;
    Ok(Json(MessageIdResponse { message_id }))
}

async fn list_messages(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ConversationId>,
) -> Result<Json<Vec<MessageWithSender>>, ServerError> {
    let db = state.db.lock().await;
    Ok(Json(db.list_messages(id)?))
}

async fn delete_message(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<MessageId>,
    ApiJson(req): ApiJson<DeleteMessageRequest>,
) -> Result<StatusCode, ServerError> {
    let db = state.db.lock().await;
    db.delete_message(id, req.requester_id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn set_typing(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ConversationId>,
    ApiJson(req): ApiJson<UserBody>,
) -> Result<StatusCode, ServerError> {
    let db = state.db.lock().await;
    db.set_typing(id, req.user_id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_typing_users(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ConversationId>,
    ApiQuery(query): ApiQuery<TypingQuery>,
) -> Result<Json<Vec<User>>, ServerError> {
    let db = state.db.lock().await;
    Ok(Json(db.list_typing_users(id, query.exclude)?))
}

async fn mark_read(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ConversationId>,
    ApiJson(req): ApiJson<UserBody>,
) -> Result<StatusCode, ServerError> {
    let db = state.db.lock().await;
    db.mark_read(id, req.user_id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn unread_count(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ConversationId>,
    ApiQuery(query): ApiQuery<UserQuery>,
) -> Result<Json<UnreadCountResponse>, ServerError> {
    let db = state.db.lock().await;
    let count = db.unread_count(id, query.user_id)?;
    Ok(Json(UnreadCountResponse { count }))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
