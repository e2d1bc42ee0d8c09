/// Query string flags
///
/// Flags arrive as raw strings so a malformed value surfaces as a 422 with a
/// readable message instead of axum's plain-text query rejection.

use martialbase_shared::error::{MartialBaseError, MartialBaseResult};
use serde::Deserialize;

/// Membership flags accepted by the add-person endpoints
#[derive(Debug, Default, Deserialize)]
pub struct MembershipFlags {
    pub is_admin: Option<String>,
    pub is_instructor: Option<String>,
    pub is_secretary: Option<String>,
}

impl MembershipFlags {
    pub fn is_admin(&self) -> MartialBaseResult<bool> {
        parse_flag("is_admin", self.is_admin.as_deref())
    }

    pub fn is_instructor(&self) -> MartialBaseResult<bool> {
        parse_flag("is_instructor", self.is_instructor.as_deref())
    }

    pub fn is_secretary(&self) -> MartialBaseResult<bool> {
        parse_flag("is_secretary", self.is_secretary.as_deref())
    }
}

/// Parses a boolean query flag; absent means `false`
pub fn parse_flag(name: &str, value: Option<&str>) -> MartialBaseResult<bool> {
    let Some(value) = value else {
        return Ok(false);
    };

    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(MartialBaseError::Validation(format!(
            "Query parameter '{}' must be true or false, got '{}'.",
            name, value
        ))),
    }
}
