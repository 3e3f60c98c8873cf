use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use validator::{Validate, ValidationError};

/// Caller identity as issued by the auth provider (normally a UUID).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Payload for adding an item.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PantryItem {
    #[validate(
        length(min = 1, max = 200, message = "Item must be between 1 and 200 characters"),
        custom(function = "not_blank")
    )]
    pub item: String,
    #[validate(range(min = 0, message = "Quantity must not be negative"))]
    pub quantity: i64,
    #[serde(default)]
    #[validate(length(max = 50, message = "Unit must be at most 50 characters"))]
    pub unit: String,
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Item must not be blank".into());
        return Err(err);
    }
    Ok(())
}

/// A stored pantry row, owned by exactly one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PantryRow {
    pub id: i64,
    pub user_id: UserId,
    pub item: String,
    pub quantity: i64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

// The hosted table allows a NULL unit.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QuantityUpdate {
    #[validate(range(min = 0, message = "Quantity must not be negative"))]
    pub quantity: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DetailResponse {
    pub detail: String,
}

impl DetailResponse {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}
