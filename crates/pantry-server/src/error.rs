// Error handling for the HTTP layer
// Maps `PantryError` to status codes and plain-text bodies

use std::fmt::{Display, Formatter};

use actix_web::{HttpResponse, http::StatusCode, http::header::ContentType};

pub use pantry_common::PantryError;

pub const MISSING_KEY: &str = "missing key in request";
pub const INVALID_BODY: &str = "invalid request body";
pub const KEY_NOT_FOUND: &str = "key not found in cache";
pub const GET_FAILED: &str = "failed to get cache";
pub const SET_FAILED: &str = "failed to set cache";
pub const INVALID_METHOD: &str = "invalid request method";

// Local wrapper so actix-web's ResponseError can be implemented
// (orphan rules forbid implementing it on PantryError directly)
#[derive(Debug)]
pub struct AppError {
    inner: anyhow::Error,
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        AppError { inner: value }
    }
}

impl From<PantryError> for AppError {
    fn from(value: PantryError) -> Self {
        AppError {
            inner: anyhow::Error::from(value),
        }
    }
}

impl AppError {
    pub fn downcast_ref<E: std::error::Error + Send + Sync + 'static>(&self) -> Option<&E> {
        self.inner.downcast_ref::<E>()
    }

    /// Body shown to the client. Internal details never leave the process.
    fn client_message(&self) -> &str {
        match self.downcast_ref::<PantryError>() {
            Some(PantryError::Validation(message)) => message,
            Some(PantryError::NotFound(_)) => KEY_NOT_FOUND,
            Some(PantryError::Internal(message)) => message,
            _ => "internal server error",
        }
    }
}

/// Plain-text response in the `http.Error` shape: message plus newline
pub fn plain_text(status: StatusCode, message: &str) -> HttpResponse {
    HttpResponse::build(status)
        .content_type(ContentType::plaintext())
        .insert_header(("X-Content-Type-Options", "nosniff"))
        .body(format!("{message}\n"))
}

impl actix_web::error::ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self.downcast_ref::<PantryError>() {
            Some(PantryError::Validation(_)) => StatusCode::BAD_REQUEST,
            Some(PantryError::NotFound(_)) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        plain_text(self.status_code(), self.client_message())
    }
}

#[cfg(test)]
mod tests {
    use actix_web::{ResponseError, body::to_bytes};

    use super::*;

    #[test]
    fn test_status_codes() {
        let err = AppError::from(PantryError::validation(MISSING_KEY));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err = AppError::from(PantryError::NotFound("k".to_string()));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

        let err = AppError::from(PantryError::Internal(SET_FAILED.to_string()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let err = AppError::from(anyhow::anyhow!("boom"));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[actix_web::test]
    async fn test_error_bodies_are_plain_text() {
        let resp = AppError::from(PantryError::NotFound("user:1".to_string())).error_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            resp.headers().get("content-type").unwrap(),
            "text/plain; charset=utf-8"
        );
        let body = to_bytes(resp.into_body()).await.unwrap();
        assert_eq!(body, "key not found in cache\n");
    }

    #[actix_web::test]
    async fn test_internal_details_are_hidden() {
        let resp = AppError::from(PantryError::Persistence("password=secret".to_string()))
            .error_response();
        let body = to_bytes(resp.into_body()).await.unwrap();
        assert_eq!(body, "internal server error\n");
    }
}
