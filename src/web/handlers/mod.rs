pub mod health;
pub mod queue;
pub mod workflows;

use uuid::Uuid;

use super::errors::ApiError;

/// Parse a caller-supplied UUID, rejecting malformed input before any
/// persistence access. Only the hyphenated 8-4-4-4-12 form is accepted.
pub(crate) fn parse_uuid(raw: &str, field: &str) -> Result<Uuid, ApiError> {
    let err = || ApiError::bad_request(format!("{field} must be a UUID, got '{raw}'"));
    if raw.len() != 36 {
        return Err(err());
    }
    Uuid::parse_str(raw).map_err(|_| err())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uuid_accepts_hyphenated_any_case() {
        assert!(parse_uuid("a9b8c7d6-e5f4-4321-8765-0123456789ab", "documentId").is_ok());
        assert!(parse_uuid("A9B8C7D6-E5F4-4321-8765-0123456789AB", "documentId").is_ok());
    }

    #[test]
    fn test_parse_uuid_rejects_other_forms() {
        // Simple and URN forms are valid UUID encodings but not this API's.
        assert!(parse_uuid("a9b8c7d6e5f443218765_0123456789ab", "documentId").is_err());
        assert!(parse_uuid("urn:uuid:a9b8c7d6-e5f4-4321-8765-0123456789ab", "id").is_err());
        assert!(parse_uuid("not-a-uuid", "workflowId").is_err());
        assert!(parse_uuid("", "workflowId").is_err());
    }
}
