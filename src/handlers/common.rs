use axum::{http::StatusCode, Json};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::ApiResponse;

/// Standard created response
pub fn created<T>(response: ApiResponse<T>) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::CREATED, Json(response))
}

/// Parses a path id, answering 400 rather than axum's plain-text rejection.
pub fn parse_id(raw: &str, what: &str) -> Result<Uuid, ServiceError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| ServiceError::ValidationError(format!("Invalid {what} id: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn bad_ids_are_validation_errors() {
        assert_matches!(
            parse_id("nope", "defect"),
            Err(ServiceError::ValidationError(msg)) if msg == "Invalid defect id: nope"
        );
        let id = Uuid::new_v4();
        assert_eq!(parse_id(&id.to_string(), "defect").unwrap(), id);
    }
}
