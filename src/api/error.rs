//! Mapping of lifecycle and storage failures onto HTTP responses

use crate::device::LifecycleError;
use crate::geocoding::GeocodingError;
use crate::storage::StoreError;
use crate::ttn::{ReadBackError, RegistrationError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

fn registration_status(e: &RegistrationError) -> StatusCode {
    match e {
        RegistrationError::Validation(_) => StatusCode::BAD_REQUEST,
        RegistrationError::Timeout { .. }
        | RegistrationError::ReadBack(ReadBackError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
        RegistrationError::StepFailed { .. }
        | RegistrationError::Transport { .. }
        | RegistrationError::ReadBack(_) => StatusCode::BAD_GATEWAY,
    }
}

fn geocoding_status(e: &GeocodingError) -> StatusCode {
    match e {
        GeocodingError::InvalidAddress(_) => StatusCode::BAD_REQUEST,
        GeocodingError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        GeocodingError::Status { .. }
        | GeocodingError::Malformed(_)
        | GeocodingError::Transport(_) => StatusCode::BAD_GATEWAY,
    }
}

fn store_status(e: &StoreError) -> StatusCode {
    match e {
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::Conflict(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        Self::new(store_status(&e), e.to_string())
    }
}

impl From<LifecycleError> for ApiError {
    fn from(e: LifecycleError) -> Self {
        let status = match &e {
            LifecycleError::Registration(e) => registration_status(e),
            LifecycleError::Geocoding(e) => geocoding_status(e),
            LifecycleError::Store(e) => store_status(e),
            LifecycleError::MacImmutable { .. } | LifecycleError::RegisteredName { .. } => {
                StatusCode::CONFLICT
            }
            LifecycleError::NoLocation { .. } => StatusCode::NOT_FOUND,
        };
        Self::new(status, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, error = %self.message, "Request failed");
        }
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ttn::{RegistrationStep, ValidationError};

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                LifecycleError::Registration(ValidationError::MissingDeviceMac.into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                LifecycleError::Registration(RegistrationError::Timeout {
                    step: RegistrationStep::CreateDevice,
                }),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                LifecycleError::Registration(RegistrationError::StepFailed {
                    step: RegistrationStep::ApplicationServer,
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    body: String::new(),
                }),
                StatusCode::BAD_GATEWAY,
            ),
            (
                LifecycleError::Geocoding(GeocodingError::InvalidAddress("x".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                LifecycleError::Geocoding(GeocodingError::Timeout),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                LifecycleError::Store(StoreError::Conflict("field-7".into())),
                StatusCode::CONFLICT,
            ),
            (
                LifecycleError::Store(StoreError::Query("locked".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                LifecycleError::MacImmutable {
                    name: "field-7".into(),
                },
                StatusCode::CONFLICT,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
    }
}
