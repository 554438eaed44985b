//! Tag entity and name normalization.
//!
//! # Invariants
//! - Names are trimmed and never blank.
//! - Uniqueness is case-insensitive; the stored spelling is preserved.

use super::{check_id, check_timestamps, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable tag identifier.
pub type TagId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Tag {
    /// Key used for case-insensitive uniqueness checks.
    pub fn key(&self) -> String {
        tag_name_key(&self.name)
    }
}

/// Validates a tag before it is trusted by the store.
pub fn validate_tag(tag: &Tag) -> Result<(), ValidationError> {
    check_id("tag", &tag.id)?;
    if tag.name.trim().is_empty() {
        return Err(ValidationError::BlankField {
            entity: "tag",
            field: "name",
        });
    }
    check_timestamps("tag", tag.created_at, tag.updated_at)
}

/// Trims a user-provided tag name; `None` when nothing remains.
pub fn normalize_tag_name(name: &str) -> Option<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Case-folded uniqueness key for a tag name.
pub fn tag_name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::{normalize_tag_name, tag_name_key, validate_tag, Tag};
    use uuid::Uuid;

    #[test]
    fn normalize_preserves_case_and_trims() {
        assert_eq!(normalize_tag_name("  Work "), Some("Work".to_string()));
        assert_eq!(normalize_tag_name(" \t "), None);
    }

    #[test]
    fn key_folds_case() {
        assert_eq!(tag_name_key("IMPORTANT"), tag_name_key(" important"));
    }

    #[test]
    fn validate_rejects_blank_name() {
        let tag = Tag {
            id: Uuid::new_v4(),
            name: "  ".to_string(),
            created_at: 1,
            updated_at: 1,
        };
        assert!(validate_tag(&tag).is_err());
    }
}
