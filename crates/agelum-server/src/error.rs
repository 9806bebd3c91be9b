use agelum_core::AgelumError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use record_ai::RecordError;

// ---------------------------------------------------------------------------
// Sentinels for statuses that have no core error variant
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct BadRequest(String);

impl std::fmt::Display for BadRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for BadRequest {}

#[derive(Debug)]
struct ConflictError(String);

impl std::fmt::Display for ConflictError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ConflictError {}

#[derive(Debug)]
struct NotFoundError(String);

impl std::fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for NotFoundError {}

// ---------------------------------------------------------------------------
// AppError
// ---------------------------------------------------------------------------

/// Error returned by every handler; rendered as `{"error": "..."}`.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(BadRequest(msg.into()).into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self(ConflictError(msg.into()).into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self(NotFoundError(msg.into()).into())
    }

    pub fn join(e: tokio::task::JoinError) -> Self {
        Self(anyhow::anyhow!("task join error: {e}"))
    }

    fn status(&self) -> StatusCode {
        if self.0.downcast_ref::<BadRequest>().is_some() {
            return StatusCode::BAD_REQUEST;
        }
        if self.0.downcast_ref::<ConflictError>().is_some() {
            return StatusCode::CONFLICT;
        }
        if self.0.downcast_ref::<NotFoundError>().is_some() {
            return StatusCode::NOT_FOUND;
        }
        if let Some(e) = self.0.downcast_ref::<AgelumError>() {
            return match e {
                AgelumError::RepositoryNotFound(_)
                | AgelumError::ItemNotFound { .. }
                | AgelumError::FileNotFound(_)
                | AgelumError::TestNotFound(_) => StatusCode::NOT_FOUND,
                AgelumError::TestExists(_) | AgelumError::ProjectExists(_) => StatusCode::CONFLICT,
                AgelumError::NotADirectory(_)
                | AgelumError::InvalidSettings(_)
                | AgelumError::InvalidState { .. }
                | AgelumError::InvalidKind(_)
                | AgelumError::InvalidPath(_)
                | AgelumError::InvalidTest(_)
                | AgelumError::InvalidId(_)
                | AgelumError::InvalidReport(_) => StatusCode::BAD_REQUEST,
                AgelumError::BrowserToolMissing => StatusCode::SERVICE_UNAVAILABLE,
                AgelumError::HomeNotFound
                | AgelumError::Io(_)
                | AgelumError::Json(_)
                | AgelumError::Yaml(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
        }
        if let Some(e) = self.0.downcast_ref::<RecordError>() {
            return match e {
                RecordError::MissingApiKey | RecordError::UnknownBackend(_) => {
                    StatusCode::BAD_REQUEST
                }
                RecordError::Api { .. } | RecordError::EmptyResponse | RecordError::Parse { .. } => {
                    StatusCode::BAD_GATEWAY
                }
                RecordError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                RecordError::Http(_) | RecordError::Io(_) | RecordError::Process(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            };
        }
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(%status, error = %self.0, "request failed");
        }
        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn not_found_variants_map_to_404() {
        assert_eq!(
            status_of(AppError(AgelumError::TestNotFound("t".into()).into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(AppError(
                AgelumError::ItemNotFound {
                    kind: "task".into(),
                    id: "x".into()
                }
                .into()
            )),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(AppError(AgelumError::RepositoryNotFound("r".into()).into())),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_exists_maps_to_409() {
        assert_eq!(
            status_of(AppError(AgelumError::TestExists("login".into()).into())),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn invalid_input_maps_to_400() {
        assert_eq!(
            status_of(AppError(AgelumError::InvalidPath("../x".into()).into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(AppError(
                AgelumError::InvalidState {
                    kind: "task".into(),
                    state: "nope".into()
                }
                .into()
            )),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(AppError::bad_request("Prompt required")), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn record_errors_map_by_cause() {
        assert_eq!(
            status_of(AppError(RecordError::MissingApiKey.into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(AppError(
                RecordError::Api {
                    status: 429,
                    body: "quota".into()
                }
                .into()
            )),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn missing_browser_tool_maps_to_503() {
        assert_eq!(
            status_of(AppError(AgelumError::BrowserToolMissing.into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn io_and_unknown_errors_map_to_500() {
        let io = std::io::Error::other("disk full");
        assert_eq!(
            status_of(AppError(AgelumError::Io(io).into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(AppError(anyhow::anyhow!("boom"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn sentinels_map_to_their_status() {
        assert_eq!(status_of(AppError::conflict("busy")), StatusCode::CONFLICT);
        assert_eq!(status_of(AppError::not_found("gone")), StatusCode::NOT_FOUND);
    }
}
