//! Chat Handlers
//!
//! Chat lifecycle and listener registration. Every handler turns the request
//! into a mediator command or query and maps the aggregate to a response DTO.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::application::commands::{AddListener, CreateChat, DeleteChat};
use crate::application::dto::request::{AddListenerRequest, CreateChatRequest, PaginationQuery};
use crate::application::dto::response::{
    ChatDetailResponse, ChatResponse, ListenerResponse, PageResponse,
};
use crate::application::queries::{GetAllChats, GetChatDetail, GetChatListeners};
use crate::domain::Pagination;
use crate::presentation::http::extractors::{ValidatedJson, ValidatedQuery};
use crate::shared::error::AppError;
use crate::startup::AppState;

/// Create a chat
pub async fn create_chat(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<CreateChatRequest>,
) -> Result<(StatusCode, Json<ChatResponse>), AppError> {
    let chat = state
        .mediator
        .handle_command(CreateChat { title: body.title })
        .await?;

    Ok((StatusCode::CREATED, Json(ChatResponse::from(&chat))))
}

/// List chats
pub async fn list_chats(
    State(state): State<AppState>,
    ValidatedQuery(query): ValidatedQuery<PaginationQuery>,
) -> Result<Json<PageResponse<ChatResponse>>, AppError> {
    let pagination = Pagination::from(query);
    let page = state
        .mediator
        .handle_query(GetAllChats { pagination })
        .await?;

    Ok(Json(PageResponse::from_page(&page, pagination)))
}

/// Get a chat with its messages and listeners
pub async fn get_chat(
    State(state): State<AppState>,
    Path(chat_oid): Path<String>,
) -> Result<Json<ChatDetailResponse>, AppError> {
    let chat = state
        .mediator
        .handle_query(GetChatDetail { chat_oid })
        .await?;

    Ok(Json(ChatDetailResponse::from(&chat)))
}

/// Delete a chat
pub async fn delete_chat(
    State(state): State<AppState>,
    Path(chat_oid): Path<String>,
) -> Result<StatusCode, AppError> {
    state
        .mediator
        .handle_command(DeleteChat { chat_oid })
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Register an external listener on a chat
pub async fn add_listener(
    State(state): State<AppState>,
    Path(chat_oid): Path<String>,
    ValidatedJson(body): ValidatedJson<AddListenerRequest>,
) -> Result<(StatusCode, Json<ListenerResponse>), AppError> {
    let telegram_chat_id = body.telegram_chat_id;
    state
        .mediator
        .handle_command(AddListener {
            chat_oid,
            telegram_chat_id: telegram_chat_id.clone(),
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ListenerResponse {
            oid: telegram_chat_id,
        }),
    ))
}

/// List the listeners of a chat
pub async fn list_listeners(
    State(state): State<AppState>,
    Path(chat_oid): Path<String>,
) -> Result<Json<Vec<ListenerResponse>>, AppError> {
    let listeners = state
        .mediator
        .handle_query(GetChatListeners { chat_oid })
        .await?;

    Ok(Json(listeners.iter().map(ListenerResponse::from).collect()))
}
