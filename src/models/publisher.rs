use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::validation::{validate_string_length, ValidationError};

pub const NAME_MIN_LENGTH: usize = 2;
pub const DESCRIPTION_MIN_LENGTH: usize = 10;

#[derive(Debug, Clone, Serialize, FromRow, PartialEq)]
pub struct Publisher {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub game_count: i64,
}

/// Minimal publisher view used by the publisher list endpoint
#[derive(Debug, Clone, Serialize, FromRow, PartialEq, Eq)]
pub struct PublisherSummary {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreatePublisherRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPublisher {
    pub name: String,
    pub description: Option<String>,
}

impl CreatePublisherRequest {
    pub fn into_new_publisher(self) -> Result<NewPublisher, ValidationError> {
        validate_name(self.name.as_deref())?;
        validate_description(self.description.as_deref())?;

        Ok(NewPublisher {
            name: self.name.unwrap_or_default(),
            description: self.description,
        })
    }
}

pub fn validate_name(name: Option<&str>) -> Result<Option<&str>, ValidationError> {
    validate_string_length("Publisher name", name, NAME_MIN_LENGTH, false)
}

pub fn validate_description(description: Option<&str>) -> Result<Option<&str>, ValidationError> {
    validate_string_length("Description", description, DESCRIPTION_MIN_LENGTH, true)
}
