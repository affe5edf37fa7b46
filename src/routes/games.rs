use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, RawQuery, State,
    },
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use sqlx::SqliteConnection;

use crate::{
    db::{self, queries},
    error::{ApiError, ApiResult},
    models::{
        CreateGameRequest, Game, GameChanges, GameFilter, GameRecord, NewGame, UpdateGameRequest,
    },
    AppState,
};

const GAME_NOT_FOUND: ApiError = ApiError::NotFound { resource: "Game" };

/// List games, optionally filtered by category and/or publisher
pub async fn list_games(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
) -> ApiResult<Json<Vec<GameRecord>>> {
    let filter = GameFilter::from_query(query.as_deref());
    tracing::debug!("Listing games with filter {:?}", filter);

    let mut conn = state.db.acquire().await?;
    let games = queries::list_games(&mut conn, &filter).await?;

    Ok(Json(games.into_iter().map(GameRecord::from).collect()))
}

pub async fn get_game(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<GameRecord>> {
    let Path(game_id) = id.map_err(|_| GAME_NOT_FOUND)?;

    let mut conn = state.db.acquire().await?;
    let game = queries::get_game(&mut conn, game_id).await?.ok_or_else(|| {
        tracing::warn!("Game not found: {}", game_id);
        GAME_NOT_FOUND
    })?;

    Ok(Json(game.into()))
}

/// Create a game after checking that its publisher and category exist
pub async fn create_game(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateGameRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<GameRecord>)> {
    let Json(payload) = payload?;
    let new_game = payload.into_new_game()?;

    let mut tx = state.db.begin().await?;
    match insert_checked(&mut tx, &new_game).await {
        Ok(game) => {
            tx.commit().await?;
            tracing::info!("Created game {} ({})", game.title, game.id);
            Ok((StatusCode::CREATED, Json(game.into())))
        }
        Err(e) => {
            db::rollback(tx).await;
            tracing::warn!("Failed to create game '{}': {}", new_game.title, e);
            Err(e)
        }
    }
}

/// Apply a partial update; fields absent from the body keep their values
pub async fn update_game(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateGameRequest>, JsonRejection>,
) -> ApiResult<Json<GameRecord>> {
    let Path(game_id) = id.map_err(|_| GAME_NOT_FOUND)?;
    let Json(payload) = payload?;
    let changes = payload.into_changes()?;

    let mut tx = state.db.begin().await?;
    match update_checked(&mut tx, game_id, changes).await {
        Ok(game) => {
            tx.commit().await?;
            tracing::info!("Updated game {} ({})", game.title, game.id);
            Ok(Json(game.into()))
        }
        Err(e) => {
            db::rollback(tx).await;
            tracing::warn!("Failed to update game {}: {}", game_id, e);
            Err(e)
        }
    }
}

pub async fn delete_game(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Value>> {
    let Path(game_id) = id.map_err(|_| GAME_NOT_FOUND)?;

    let mut tx = state.db.begin().await?;
    let result = match queries::delete_game(&mut tx, game_id).await {
        Ok(0) => Err(GAME_NOT_FOUND),
        Ok(_) => Ok(()),
        Err(e) => Err(ApiError::from(e)),
    };

    match result {
        Ok(()) => {
            tx.commit().await?;
            tracing::info!("Deleted game {}", game_id);
            Ok(Json(json!({ "message": "Game deleted successfully" })))
        }
        Err(e) => {
            db::rollback(tx).await;
            tracing::warn!("Failed to delete game {}: {}", game_id, e);
            Err(e)
        }
    }
}

async fn insert_checked(conn: &mut SqliteConnection, new_game: &NewGame) -> ApiResult<Game> {
    ensure_references(conn, Some(new_game.publisher_id), Some(new_game.category_id)).await?;

    let game_id = queries::insert_game(conn, new_game).await?;
    reread(conn, game_id).await
}

/// Look up referenced rows before writing so a bad id gets a precise message
/// instead of a constraint failure.
async fn ensure_references(
    conn: &mut SqliteConnection,
    publisher_id: Option<i64>,
    category_id: Option<i64>,
) -> ApiResult<()> {
    if let Some(id) = publisher_id {
        if !queries::publisher_exists(conn, id).await? {
            return Err(ApiError::InvalidReference {
                resource: "Publisher",
            });
        }
    }
    if let Some(id) = category_id {
        if !queries::category_exists(conn, id).await? {
            return Err(ApiError::InvalidReference {
                resource: "Category",
            });
        }
    }
    Ok(())
}

async fn update_checked(
    conn: &mut SqliteConnection,
    game_id: i64,
    changes: GameChanges,
) -> ApiResult<Game> {
    let current = queries::get_game(conn, game_id)
        .await?
        .ok_or(GAME_NOT_FOUND)?;
    ensure_references(conn, changes.publisher_id, changes.category_id).await?;

    let merged = changes.apply(&current);
    queries::update_game(conn, game_id, &merged).await?;
    reread(conn, game_id).await
}

async fn reread(conn: &mut SqliteConnection, game_id: i64) -> ApiResult<Game> {
    queries::get_game(conn, game_id)
        .await?
        .ok_or_else(|| ApiError::Internal(format!("game {} vanished after write", game_id)))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::db::queries;
    use crate::routes::test_support::{send, test_app};

    /// Seed the publisher and category from the catalog example, returning their ids
    async fn seed(app: &axum::Router) -> (i64, i64) {
        let (status, publisher) = send(
            app,
            Method::POST,
            "/api/publishers",
            Some(json!({"name": "DevGames Inc"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, category) = send(
            app,
            Method::POST,
            "/api/categories",
            Some(json!({"name": "Action", "description": "Fast paced games"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        (
            publisher["id"].as_i64().unwrap(),
            category["id"].as_i64().unwrap(),
        )
    }

    fn game_body(title: &str, publisher_id: i64, category_id: i64) -> serde_json::Value {
        json!({
            "title": title,
            "description": "An adventure through space and time",
            "publisher_id": publisher_id,
            "category_id": category_id,
            "star_rating": 4.5
        })
    }

    #[tokio::test]
    async fn test_create_then_get_returns_identical_record() {
        let (app, _pool) = test_app().await;
        let (publisher_id, category_id) = seed(&app).await;

        let (status, created) = send(
            &app,
            Method::POST,
            "/api/games",
            Some(game_body("Space Raiders", publisher_id, category_id)),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["title"], "Space Raiders");
        assert_eq!(created["publisher"]["name"], "DevGames Inc");
        assert_eq!(created["category"]["name"], "Action");
        assert_eq!(created["starRating"], 4.5);

        let uri = format!("/api/games/{}", created["id"]);
        let (status, fetched) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_create_with_unknown_publisher_persists_nothing() {
        let (app, pool) = test_app().await;
        let (_, category_id) = seed(&app).await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/games",
            Some(game_body("Ghost Game", 999, category_id)),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Publisher not found");

        let mut conn = pool.acquire().await.unwrap();
        assert_eq!(queries::count_games(&mut conn).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_create_with_unknown_category_persists_nothing() {
        let (app, pool) = test_app().await;
        let (publisher_id, _) = seed(&app).await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/games",
            Some(game_body("Ghost Game", publisher_id, 999)),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Category not found");

        let mut conn = pool.acquire().await.unwrap();
        assert_eq!(queries::count_games(&mut conn).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_create_missing_field_is_400() {
        let (app, _pool) = test_app().await;
        let (publisher_id, _) = seed(&app).await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/games",
            Some(json!({
                "title": "Half a Game",
                "description": "Missing its category entirely",
                "publisher_id": publisher_id
            })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "category_id is required");
    }

    #[tokio::test]
    async fn test_create_short_description_is_400() {
        let (app, _pool) = test_app().await;
        let (publisher_id, category_id) = seed(&app).await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/games",
            Some(json!({
                "title": "Tiny",
                "description": "Too short",
                "publisher_id": publisher_id,
                "category_id": category_id
            })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Description must be at least 10 characters");
    }

    #[tokio::test]
    async fn test_create_wrong_type_is_400() {
        let (app, _pool) = test_app().await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/games",
            Some(json!({"title": 42, "description": "A number is not a title"})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_get_missing_game_is_404() {
        let (app, _pool) = test_app().await;

        let (status, body) = send(&app, Method::GET, "/api/games/12345", None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"error": "Game not found"}));
    }

    #[tokio::test]
    async fn test_partial_update_leaves_other_fields_unchanged() {
        let (app, _pool) = test_app().await;
        let (publisher_id, category_id) = seed(&app).await;
        let (_, created) = send(
            &app,
            Method::POST,
            "/api/games",
            Some(game_body("Space Raiders", publisher_id, category_id)),
        )
        .await;
        let uri = format!("/api/games/{}", created["id"]);

        let (status, updated) = send(
            &app,
            Method::PUT,
            &uri,
            Some(json!({"title": "Space Raiders II"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["title"], "Space Raiders II");
        assert_eq!(updated["description"], created["description"]);
        assert_eq!(updated["publisher"], created["publisher"]);
        assert_eq!(updated["category"], created["category"]);
        assert_eq!(updated["starRating"], created["starRating"]);
    }

    #[tokio::test]
    async fn test_update_can_clear_rating() {
        let (app, _pool) = test_app().await;
        let (publisher_id, category_id) = seed(&app).await;
        let (_, created) = send(
            &app,
            Method::POST,
            "/api/games",
            Some(game_body("Space Raiders", publisher_id, category_id)),
        )
        .await;
        let uri = format!("/api/games/{}", created["id"]);

        let (status, updated) =
            send(&app, Method::PUT, &uri, Some(json!({"star_rating": null}))).await;

        assert_eq!(status, StatusCode::OK);
        assert!(updated["starRating"].is_null());
        assert_eq!(updated["title"], "Space Raiders");
    }

    #[tokio::test]
    async fn test_update_with_unknown_category_rolls_back() {
        let (app, _pool) = test_app().await;
        let (publisher_id, category_id) = seed(&app).await;
        let (_, created) = send(
            &app,
            Method::POST,
            "/api/games",
            Some(game_body("Space Raiders", publisher_id, category_id)),
        )
        .await;
        let uri = format!("/api/games/{}", created["id"]);

        let (status, body) = send(
            &app,
            Method::PUT,
            &uri,
            Some(json!({"title": "Renamed", "category_id": 999})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Category not found");

        let (_, fetched) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_update_missing_game_is_404() {
        let (app, _pool) = test_app().await;

        let (status, body) = send(
            &app,
            Method::PUT,
            "/api/games/77",
            Some(json!({"title": "Nobody Home"})),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Game not found");
    }

    #[tokio::test]
    async fn test_update_invalid_title_is_400() {
        let (app, _pool) = test_app().await;
        let (publisher_id, category_id) = seed(&app).await;
        let (_, created) = send(
            &app,
            Method::POST,
            "/api/games",
            Some(game_body("Space Raiders", publisher_id, category_id)),
        )
        .await;
        let uri = format!("/api/games/{}", created["id"]);

        let (status, body) = send(&app, Method::PUT, &uri, Some(json!({"title": " "}))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Title must be at least 2 characters");
    }

    #[tokio::test]
    async fn test_delete_game() {
        let (app, pool) = test_app().await;
        let (publisher_id, category_id) = seed(&app).await;
        let (_, created) = send(
            &app,
            Method::POST,
            "/api/games",
            Some(game_body("Space Raiders", publisher_id, category_id)),
        )
        .await;
        let uri = format!("/api/games/{}", created["id"]);

        let (status, body) = send(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Game deleted successfully");

        let (status, _) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let mut conn = pool.acquire().await.unwrap();
        assert_eq!(queries::count_games(&mut conn).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_missing_game_keeps_count() {
        let (app, pool) = test_app().await;
        let (publisher_id, category_id) = seed(&app).await;
        send(
            &app,
            Method::POST,
            "/api/games",
            Some(game_body("Space Raiders", publisher_id, category_id)),
        )
        .await;

        let (status, body) = send(&app, Method::DELETE, "/api/games/999", None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Game not found");
        let mut conn = pool.acquire().await.unwrap();
        assert_eq!(queries::count_games(&mut conn).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list_filters_by_category_and_publisher() {
        let (app, _pool) = test_app().await;
        let (devgames, action) = seed(&app).await;
        let (_, scrum) = send(
            &app,
            Method::POST,
            "/api/publishers",
            Some(json!({"name": "Scrum Masters"})),
        )
        .await;
        let (_, puzzle) = send(
            &app,
            Method::POST,
            "/api/categories",
            Some(json!({"name": "Puzzle"})),
        )
        .await;
        let scrum = scrum["id"].as_i64().unwrap();
        let puzzle = puzzle["id"].as_i64().unwrap();

        for (title, publisher_id, category_id) in [
            ("Alpha", devgames, action),
            ("Bravo", scrum, action),
            ("Charlie", devgames, puzzle),
            ("Delta", scrum, puzzle),
        ] {
            let (status, _) = send(
                &app,
                Method::POST,
                "/api/games",
                Some(game_body(title, publisher_id, category_id)),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, all) = send(&app, Method::GET, "/api/games", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(all.as_array().unwrap().len(), 4);

        let uri = format!("/api/games?category_id={}", action);
        let (_, by_category) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(by_category.as_array().unwrap().len(), 2);

        let uri = format!("/api/games?category_id={}&publisher_id={}", puzzle, scrum);
        let (_, both) = send(&app, Method::GET, &uri, None).await;
        let both = both.as_array().unwrap();
        assert_eq!(both.len(), 1);
        assert_eq!(both[0]["title"], "Delta");
        assert_eq!(both[0]["category"]["id"], puzzle);
        assert_eq!(both[0]["publisher"]["id"], scrum);
    }

    #[tokio::test]
    async fn test_list_ignores_non_numeric_filter() {
        let (app, _pool) = test_app().await;
        let (publisher_id, category_id) = seed(&app).await;
        send(
            &app,
            Method::POST,
            "/api/games",
            Some(game_body("Space Raiders", publisher_id, category_id)),
        )
        .await;

        let (status, games) = send(&app, Method::GET, "/api/games?category_id=abc", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(games.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_repeated_filter_uses_first_value() {
        let (app, _pool) = test_app().await;
        let (publisher_id, category_id) = seed(&app).await;
        send(
            &app,
            Method::POST,
            "/api/games",
            Some(game_body("Space Raiders", publisher_id, category_id)),
        )
        .await;

        let uri = format!("/api/games?category_id={}&category_id=999", category_id);
        let (status, games) = send(&app, Method::GET, &uri, None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(games.as_array().unwrap().len(), 1);

        let uri = format!("/api/games?category_id=999&category_id={}", category_id);
        let (status, games) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(games.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_store_failure_is_generic_500() {
        let (app, pool) = test_app().await;
        sqlx::query("DROP TABLE games")
            .execute(&pool)
            .await
            .unwrap();

        let (status, body) = send(&app, Method::GET, "/api/games", None).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": "An unexpected error occurred"}));
    }

    #[tokio::test]
    async fn test_create_store_failure_is_500_and_rolls_back() {
        let (app, pool) = test_app().await;
        let (publisher_id, category_id) = seed(&app).await;
        sqlx::query(
            "CREATE TRIGGER games_frozen BEFORE INSERT ON games \
             BEGIN SELECT RAISE(ABORT, 'games are frozen'); END",
        )
        .execute(&pool)
        .await
        .unwrap();

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/games",
            Some(game_body("Space Raiders", publisher_id, category_id)),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": "An unexpected error occurred"}));
        let mut conn = pool.acquire().await.unwrap();
        assert_eq!(queries::count_games(&mut conn).await.unwrap(), 0);

        // The connection is back outside any transaction and accepts writes
        sqlx::query("DROP TRIGGER games_frozen")
            .execute(&mut *conn)
            .await
            .unwrap();
        drop(conn);
        let (status, _) = send(
            &app,
            Method::POST,
            "/api/games",
            Some(game_body("Space Raiders", publisher_id, category_id)),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_update_store_failure_is_500_and_keeps_row() {
        let (app, pool) = test_app().await;
        let (publisher_id, category_id) = seed(&app).await;
        let (_, created) = send(
            &app,
            Method::POST,
            "/api/games",
            Some(game_body("Space Raiders", publisher_id, category_id)),
        )
        .await;
        let uri = format!("/api/games/{}", created["id"]);
        sqlx::query(
            "CREATE TRIGGER games_frozen BEFORE UPDATE ON games \
             BEGIN SELECT RAISE(ABORT, 'games are frozen'); END",
        )
        .execute(&pool)
        .await
        .unwrap();

        let (status, body) = send(
            &app,
            Method::PUT,
            &uri,
            Some(json!({"title": "Space Raiders II"})),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "An unexpected error occurred");

        let (_, fetched) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(fetched, created);
    }
}
