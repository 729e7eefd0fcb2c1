//! Message Handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::application::commands::CreateMessage;
use crate::application::dto::request::{CreateMessageRequest, PaginationQuery};
use crate::application::dto::response::{MessageResponse, PageResponse};
use crate::application::queries::GetMessages;
use crate::domain::Pagination;
use crate::presentation::http::extractors::{ValidatedJson, ValidatedQuery};
use crate::shared::error::AppError;
use crate::startup::AppState;

/// Post a message into a chat
///
/// The message is relayed to every socket watching the chat's room.
pub async fn send_message(
    State(state): State<AppState>,
    Path(chat_oid): Path<String>,
    ValidatedJson(body): ValidatedJson<CreateMessageRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    let message = state
        .mediator
        .handle_command(CreateMessage {
            chat_oid,
            text: body.text,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(MessageResponse::from(&message))))
}

/// Get messages of a chat in posting order
pub async fn get_messages(
    State(state): State<AppState>,
    Path(chat_oid): Path<String>,
    ValidatedQuery(query): ValidatedQuery<PaginationQuery>,
) -> Result<Json<PageResponse<MessageResponse>>, AppError> {
    let pagination = Pagination::from(query);
    let page = state
        .mediator
        .handle_query(GetMessages {
            chat_oid,
            pagination,
        })
        .await?;

    Ok(Json(PageResponse::from_page(&page, pagination)))
}
