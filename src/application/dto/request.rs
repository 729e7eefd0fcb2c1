//! Request DTOs
//!
//! Data structures for API request bodies and query strings.

use serde::Deserialize;
use validator::Validate;

use crate::domain::{Pagination, MAX_TEXT_LENGTH, MAX_TITLE_LENGTH};

// `validator` length bounds are `u64`; same values as the domain limits.
const MAX_TITLE_LENGTH_U64: u64 = MAX_TITLE_LENGTH as u64;
const MAX_TEXT_LENGTH_U64: u64 = MAX_TEXT_LENGTH as u64;

/// Create chat request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateChatRequest {
    #[validate(length(min = 1, max = MAX_TITLE_LENGTH_U64, message = "Title must be 1-255 characters"))]
    pub title: String,
}

/// Create message request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateMessageRequest {
    #[validate(length(min = 1, max = MAX_TEXT_LENGTH_U64, message = "Text must be 1-4000 characters"))]
    pub text: String,
}

/// Add listener request
#[derive(Debug, Deserialize, Validate)]
pub struct AddListenerRequest {
    #[validate(length(min = 1, max = 64, message = "Listener id must be 1-64 characters"))]
    pub telegram_chat_id: String,
}

/// `?limit=&offset=` query string
#[derive(Debug, Default, Deserialize, Validate)]
pub struct PaginationQuery {
    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    pub limit: Option<u32>,

    pub offset: Option<u32>,
}

impl From<PaginationQuery> for Pagination {
    fn from(query: PaginationQuery) -> Self {
        Pagination::new(query.limit, query.offset)
    }
}
