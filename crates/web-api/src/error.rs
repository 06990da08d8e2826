use application::ApplicationError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                code,
                message: message.into(),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        use application::ApplicationError as AppErr;

        match error {
            AppErr::InvalidInput(message) => {
                ApiError::new(StatusCode::BAD_REQUEST, "INVALID_INPUT", message)
            }
            AppErr::Unauthorized(message) => ApiError::unauthorized(message),
            AppErr::Conflict(message) => ApiError::new(StatusCode::CONFLICT, "CONFLICT", message),
            AppErr::Store(err) => {
                error!(error = %err, "store operation failed");
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORE_ERROR",
                    "storage unavailable",
                )
            }
            AppErr::Password(err) => {
                error!(error = %err, "password hashing failed");
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "PASSWORD_ERROR",
                    "password processing failed",
                )
            }
            AppErr::Random(err) => {
                error!(error = %err, "random source failed");
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "internal error",
                )
            }
            AppErr::Canceled => ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "CANCELED",
                "request canceled",
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use domain::RepositoryError;

    use super::*;

    #[test]
    fn maps_taxonomy_to_status_codes() {
        let cases = [
            (ApplicationError::invalid_input("short"), StatusCode::BAD_REQUEST),
            (ApplicationError::invalid_credentials(), StatusCode::UNAUTHORIZED),
            (ApplicationError::Conflict("taken".into()), StatusCode::CONFLICT),
            (
                ApplicationError::Store(RepositoryError::NotFound),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (ApplicationError::Canceled, StatusCode::SERVICE_UNAVAILABLE),
        ];

        for (error, expected) in cases {
            assert_eq!(ApiError::from(error).status(), expected);
        }
    }

    #[test]
    fn store_details_stay_out_of_response() {
        let err = ApiError::from(ApplicationError::Store(RepositoryError::storage(
            "password=hunter2 host=db",
        )));
        assert!(!err.body.message.contains("hunter2"));
    }
}
