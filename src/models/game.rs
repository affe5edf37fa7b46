use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;

use super::validation::{require, validate_string_length, ValidationError};

pub const TITLE_MIN_LENGTH: usize = 2;
pub const DESCRIPTION_MIN_LENGTH: usize = 10;

/// A game row joined with its publisher and category.
///
/// The joined columns are optional because the read query uses outer joins:
/// a game whose publisher or category row is gone still comes back.
#[derive(Debug, Clone, FromRow, PartialEq)]
pub struct Game {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub star_rating: Option<f64>,
    pub category_id: i64,
    pub publisher_id: i64,
    pub joined_publisher_id: Option<i64>,
    pub publisher_name: Option<String>,
    pub joined_category_id: Option<i64>,
    pub category_name: Option<String>,
}

/// Id and name of a related entity, embedded in a game record
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EntityRef {
    pub id: i64,
    pub name: String,
}

/// Denormalized game as returned by every game endpoint
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GameRecord {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub publisher: Option<EntityRef>,
    pub category: Option<EntityRef>,
    #[serde(rename = "starRating")]
    pub star_rating: Option<f64>,
}

impl From<Game> for GameRecord {
    fn from(game: Game) -> Self {
        let publisher = game
            .joined_publisher_id
            .zip(game.publisher_name)
            .map(|(id, name)| EntityRef { id, name });
        let category = game
            .joined_category_id
            .zip(game.category_name)
            .map(|(id, name)| EntityRef { id, name });

        GameRecord {
            id: game.id,
            title: game.title,
            description: game.description,
            publisher,
            category,
            star_rating: game.star_rating,
        }
    }
}

/// Optional filters for the game list, parsed from the query string.
///
/// Values that are empty or not integers are dropped rather than rejected.
/// When a key repeats, its first value wins.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GameFilter {
    pub category_id: Option<i64>,
    pub publisher_id: Option<i64>,
}

impl GameFilter {
    pub fn from_query(query: Option<&str>) -> Self {
        let pairs: Vec<(String, String)> = query
            .and_then(|raw| serde_urlencoded::from_str(raw).ok())
            .unwrap_or_default();
        let first_id = |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .and_then(|(_, value)| value.trim().parse().ok())
        };

        GameFilter {
            category_id: first_id("category_id"),
            publisher_id: first_id("publisher_id"),
        }
    }
}

/// Body of `POST /api/games`
#[derive(Debug, Default, Deserialize)]
pub struct CreateGameRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<i64>,
    pub publisher_id: Option<i64>,
    pub star_rating: Option<f64>,
}

/// Column values for a game insert or a full-row update
#[derive(Debug, Clone, PartialEq)]
pub struct NewGame {
    pub title: String,
    pub description: String,
    pub category_id: i64,
    pub publisher_id: i64,
    pub star_rating: Option<f64>,
}

impl CreateGameRequest {
    /// Check required keys first, then run the field validators
    pub fn into_new_game(self) -> Result<NewGame, ValidationError> {
        let title = require("title", self.title)?;
        let description = require("description", self.description)?;
        let category_id = require("category_id", self.category_id)?;
        let publisher_id = require("publisher_id", self.publisher_id)?;

        validate_title(Some(title.as_str()))?;
        validate_description(Some(description.as_str()))?;

        Ok(NewGame {
            title,
            description,
            category_id,
            publisher_id,
            star_rating: self.star_rating,
        })
    }
}

/// Body of `PUT /api/games/{id}`.
///
/// Each field distinguishes "absent" (outer `None`) from an explicit JSON
/// `null` (`Some(None)`).
#[derive(Debug, Default, Deserialize)]
pub struct UpdateGameRequest {
    #[serde(default, deserialize_with = "present")]
    pub title: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub category_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "present")]
    pub publisher_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "present")]
    pub star_rating: Option<Option<f64>>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Validated partial update; `None` leaves the column untouched
#[derive(Debug, Default, Clone, PartialEq)]
pub struct GameChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<i64>,
    pub publisher_id: Option<i64>,
    pub star_rating: Option<Option<f64>>,
}

impl UpdateGameRequest {
    pub fn into_changes(self) -> Result<GameChanges, ValidationError> {
        let title = match self.title {
            Some(title) => {
                validate_title(title.as_deref())?;
                title
            }
            None => None,
        };
        let description = match self.description {
            Some(description) => {
                validate_description(description.as_deref())?;
                description
            }
            None => None,
        };
        let category_id = match self.category_id {
            Some(id) => Some(id.ok_or(ValidationError::Empty {
                field: "Category ID",
            })?),
            None => None,
        };
        let publisher_id = match self.publisher_id {
            Some(id) => Some(id.ok_or(ValidationError::Empty {
                field: "Publisher ID",
            })?),
            None => None,
        };

        Ok(GameChanges {
            title,
            description,
            category_id,
            publisher_id,
            star_rating: self.star_rating,
        })
    }
}

impl GameChanges {
    /// Merge onto the stored row, producing the full set of column values
    pub fn apply(self, current: &Game) -> NewGame {
        NewGame {
            title: self.title.unwrap_or_else(|| current.title.clone()),
            description: self
                .description
                .unwrap_or_else(|| current.description.clone()),
            category_id: self.category_id.unwrap_or(current.category_id),
            publisher_id: self.publisher_id.unwrap_or(current.publisher_id),
            star_rating: self.star_rating.unwrap_or(current.star_rating),
        }
    }
}

pub fn validate_title(title: Option<&str>) -> Result<Option<&str>, ValidationError> {
    validate_string_length("Title", title, TITLE_MIN_LENGTH, false)
}

pub fn validate_description(description: Option<&str>) -> Result<Option<&str>, ValidationError> {
    validate_string_length("Description", description, DESCRIPTION_MIN_LENGTH, false)
}
