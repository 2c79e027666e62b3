//! Validation helpers for DTOs.

use validator::ValidationError;

use crate::state::engine::MAX_NAME_LEN;

/// Validates that a display name is non-blank and at most [`MAX_NAME_LEN`]
/// characters once trimmed.
///
/// # Examples
///
/// ```ignore
/// validate_player_name("Ada")    // Ok
/// validate_player_name("   ")    // Err - blank
/// ```
pub fn validate_player_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        let mut err = ValidationError::new("name_blank");
        err.message = Some("Name must not be empty".into());
        return Err(err);
    }

    let len = trimmed.chars().count();
    if len > MAX_NAME_LEN {
        let mut err = ValidationError::new("name_length");
        err.message =
            Some(format!("Name must be at most {MAX_NAME_LEN} characters (got {len})").into());
        return Err(err);
    }

    Ok(())
}
