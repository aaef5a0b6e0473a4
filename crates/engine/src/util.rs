//! Input validation and id parsing shared by the stores.

use uuid::Uuid;

use crate::{EngineError, ResultEngine};

/// Trim a caller supplied id and reject empty values.
pub(crate) fn normalize_required_id(value: &str, label: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidInput(format!(
            "{label} must not be empty"
        )));
    }
    Ok(trimmed.to_string())
}

/// Parse a UUID from storage and return a labeled error on failure.
pub(crate) fn parse_uuid(value: &str, label: &str) -> ResultEngine<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| EngineError::InvalidInput(format!("invalid {label} id: {value}")))
}

/// Reject zero or negative ledger amounts.
pub(crate) fn ensure_positive(amount: i64, label: &str) -> ResultEngine<()> {
    if amount <= 0 {
        return Err(EngineError::InvalidAmount(format!("{label} must be > 0")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_ids_are_trimmed() {
        assert_eq!(normalize_required_id("  bob ", "user_id").unwrap(), "bob");
        assert_eq!(
            normalize_required_id("   ", "user_id"),
            Err(EngineError::InvalidInput(
                "user_id must not be empty".to_string()
            ))
        );
    }

    #[test]
    fn parse_uuid_labels_failures() {
        assert!(parse_uuid("not-a-uuid", "booking").is_err());
        let id = Uuid::new_v4();
        assert_eq!(parse_uuid(&id.to_string(), "booking").unwrap(), id);
    }

    #[test]
    fn amounts_must_be_positive() {
        assert!(ensure_positive(1, "amount").is_ok());
        assert!(ensure_positive(0, "amount").is_err());
        assert!(ensure_positive(-3, "amount").is_err());
    }
}
