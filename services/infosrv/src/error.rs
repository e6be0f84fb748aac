//! Mapping of engine errors onto HTTP responses

use common::AppError;
use remote_rules::RemoteInfoError;
use tracing::error;

/// Convert an engine error into an `AppError` with a matching status
pub fn app_error(err: RemoteInfoError) -> AppError {
    let message = err.to_string();
    match err {
        RemoteInfoError::DuplicateSource(_) => AppError::conflict(message),
        RemoteInfoError::NotFound(_) => AppError::not_found(message),
        RemoteInfoError::Busy(_) => AppError::locked(message),
        RemoteInfoError::InvalidInterval(_) => AppError::invalid_field("interval", message),
        RemoteInfoError::InvalidPattern { .. } => AppError::invalid_field("pattern", message),
        RemoteInfoError::Fetch { .. }
        | RemoteInfoError::LineParse { .. }
        | RemoteInfoError::Database(_)
        | RemoteInfoError::Config(_) => {
            error!("Request failed: {}", message);
            AppError::internal_error("Internal server error").with_details(message)
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (RemoteInfoError::DuplicateSource("u".into()), StatusCode::CONFLICT),
            (RemoteInfoError::NotFound("u".into()), StatusCode::NOT_FOUND),
            (RemoteInfoError::Busy("u".into()), StatusCode::LOCKED),
            (
                RemoteInfoError::InvalidInterval("0".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                RemoteInfoError::InvalidPattern {
                    pattern: "(".into(),
                    reason: "unclosed group".into(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                RemoteInfoError::Database("locked".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(app_error(err).status, status);
        }
    }

    #[test]
    fn test_validation_errors_name_the_field() {
        let err = app_error(RemoteInfoError::InvalidInterval("soon".into()));
        assert!(err.error.field_errors.contains_key("interval"));
    }
}
