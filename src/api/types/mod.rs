//! API request, response and error types

pub mod error;
pub mod query;
pub mod request;

pub use error::{ApiError, ApiErrorResponse, ApiErrorType};
pub use query::QueryBody;
pub use request::{ClassifyResponse, QueryRequest, RetrieveResponse};
