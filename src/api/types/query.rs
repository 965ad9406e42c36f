//! Extractor turning a request body into a validated [`Query`]

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::Json;

use super::error::{ApiError, ApiErrorType};
use super::request::QueryRequest;
use crate::domain::Query;

/// A sanitized query read from a `QueryRequest` body
///
/// Malformed JSON is rejected with the axum rejection's status and code
/// `json_parse_error`; text that fails sanitization is a 400 `invalid_query`.
#[derive(Debug, Clone)]
pub struct QueryBody(pub Query);

impl<S> FromRequest<S> for QueryBody
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(body) = Json::<QueryRequest>::from_request(req, state)
            .await
            .map_err(malformed_body)?;

        let query = Query::new(&body.text)?.with_metadata(body.metadata);
        Ok(QueryBody(query))
    }
}

fn malformed_body(rejection: JsonRejection) -> ApiError {
    let message = match &rejection {
        JsonRejection::JsonDataError(err) => {
            format!("Request body is not a query: {}", err.body_text())
        }
        JsonRejection::JsonSyntaxError(err) => {
            format!("Invalid JSON syntax: {}", err.body_text())
        }
        JsonRejection::MissingJsonContentType(_) => {
            "Missing Content-Type header. Expected 'application/json'.".to_string()
        }
        other => other.body_text(),
    };

    ApiError::new(rejection.status(), ApiErrorType::InvalidRequestError, message)
        .with_code("json_parse_error")
}
