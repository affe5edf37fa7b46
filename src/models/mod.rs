pub mod category;
pub mod game;
pub mod publisher;
pub mod validation;

pub use category::{Category, CreateCategoryRequest, NewCategory};
pub use game::{
    // Database rows
    Game, NewGame,
    // Request payloads
    CreateGameRequest, GameChanges, GameFilter, UpdateGameRequest,
    // Response shapes
    GameRecord,
};
pub use publisher::{CreatePublisherRequest, NewPublisher, Publisher, PublisherSummary};
pub use validation::ValidationError;
