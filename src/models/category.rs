use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::validation::{validate_string_length, ValidationError};

pub const NAME_MIN_LENGTH: usize = 2;
pub const DESCRIPTION_MIN_LENGTH: usize = 10;

/// A game category with the number of games filed under it
#[derive(Debug, Clone, Serialize, FromRow, PartialEq)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    /// Derived from the games table, never stored
    pub game_count: i64,
}

/// Body of `POST /api/categories`
#[derive(Debug, Default, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// A category that passed validation and is ready to insert
#[derive(Debug, Clone, PartialEq)]
pub struct NewCategory {
    pub name: String,
    pub description: Option<String>,
}

impl CreateCategoryRequest {
    pub fn into_new_category(self) -> Result<NewCategory, ValidationError> {
        validate_name(self.name.as_deref())?;
        validate_description(self.description.as_deref())?;

        Ok(NewCategory {
            // validate_name rejects None
            name: self.name.unwrap_or_default(),
            description: self.description,
        })
    }
}

pub fn validate_name(name: Option<&str>) -> Result<Option<&str>, ValidationError> {
    validate_string_length("Category name", name, NAME_MIN_LENGTH, false)
}

pub fn validate_description(description: Option<&str>) -> Result<Option<&str>, ValidationError> {
    validate_string_length("Description", description, DESCRIPTION_MIN_LENGTH, true)
}
