//! # Domain Value Objects
//!
//! Immutable value types that represent domain concepts without identity.
//!
//! ## Value Objects
//!
//! - **Title**: Validated chat title
//! - **Text**: Validated message body
//! - **Pagination**: Limit/offset window for collection queries

mod pagination;
mod text;

pub use pagination::*;
pub use text::*;
