use std::convert::Infallible;

use serde_json::{json, Value};
use warp::{
    body::BodyDeserializeError,
    http::StatusCode,
    reject::{
        InvalidHeader, InvalidQuery, LengthRequired, MethodNotAllowed, PayloadTooLarge,
        Rejection, UnsupportedMediaType,
    },
    reply::Response,
};

use super::reply_json;
use crate::error::ActionError;

/// Payload for a domain error. Validation errors are keyed by field, internal details stay in the log.
pub fn error_body(error: &ActionError) -> Value {
    match error {
        ActionError::Validation { field, message } => json!({ field.as_str(): [message] }),
        ActionError::Query(_) | ActionError::Internal(_) => {
            log::error!("> Request failed: {error}");
            json!({ "error": "Internal server error" })
        }
        e => json!({ "error": e.to_string() }),
    }
}

pub async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    let (status, body) = if let Some(e) = err.find::<ActionError>() {
        (e.status(), error_body(e))
    } else if let Some(e) = err.find::<BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, json!({ "error": e.to_string() }))
    } else if let Some(e) = err.find::<InvalidQuery>() {
        (StatusCode::BAD_REQUEST, json!({ "error": e.to_string() }))
    } else if let Some(e) = err.find::<InvalidHeader>() {
        (StatusCode::BAD_REQUEST, json!({ "error": e.to_string() }))
    } else if err.find::<LengthRequired>().is_some() {
        (
            StatusCode::LENGTH_REQUIRED,
            json!({ "error": "A content length is required" }),
        )
    } else if err.find::<PayloadTooLarge>().is_some() {
        (
            StatusCode::PAYLOAD_TOO_LARGE,
            json!({ "error": "Request body is too large" }),
        )
    } else if err.find::<UnsupportedMediaType>().is_some() {
        (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            json!({ "error": "Expected a JSON body" }),
        )
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, json!({ "error": "Not found." }))
    } else if err.find::<MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            json!({ "error": "Method not allowed" }),
        )
    } else {
        log::error!("> Unhandled rejection: {err:?}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": "Internal server error" }),
        )
    };

    log::trace!("> Rejected request with {status}");
    Ok(reply_json(&body, status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueryError;

    #[test]
    fn validation_errors_are_keyed_by_field() {
        let body = error_body(&ActionError::validation("cooking_time", "Too short."));

        assert_eq!(body, json!({ "cooking_time": ["Too short."] }));
    }

    #[test]
    fn internal_details_are_hidden() {
        let error: ActionError = QueryError::new(String::from("relation \"users\" missing")).into();

        assert_eq!(error_body(&error), json!({ "error": "Internal server error" }));
    }

    #[tokio::test]
    async fn domain_rejections_keep_their_status() {
        let response = handle_rejection(ActionError::InvalidSelfReference.into())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn empty_cart_is_a_bad_request() {
        let response = handle_rejection(ActionError::EmptyCart.into()).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unmatched_route_is_not_found() {
        let response = handle_rejection(warp::reject::not_found()).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
