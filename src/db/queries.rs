use sqlx::{QueryBuilder, Result, Sqlite, SqliteConnection};

use crate::models::{
    Category, Game, GameFilter, NewCategory, NewGame, NewPublisher, Publisher, PublisherSummary,
};

/// Every game read starts from this outer join so games with dangling
/// references are still returned.
const GAMES_BASE_QUERY: &str = r#"
    SELECT
        g.id, g.title, g.description, g.star_rating,
        g.category_id, g.publisher_id,
        p.id AS joined_publisher_id, p.name AS publisher_name,
        c.id AS joined_category_id, c.name AS category_name
    FROM games g
    LEFT OUTER JOIN publishers p ON g.publisher_id = p.id
    LEFT OUTER JOIN categories c ON g.category_id = c.id
"#;

const CATEGORIES_BASE_QUERY: &str = r#"
    SELECT
        c.id, c.name, c.description,
        (SELECT COUNT(*) FROM games g WHERE g.category_id = c.id) AS game_count
    FROM categories c
"#;

const PUBLISHERS_BASE_QUERY: &str = r#"
    SELECT
        p.id, p.name, p.description,
        (SELECT COUNT(*) FROM games g WHERE g.publisher_id = p.id) AS game_count
    FROM publishers p
"#;

// =============================================================================
// Game queries
// =============================================================================

/// Compose the joined game query with optional filters.
///
/// Filters are ANDed together; `game_id` narrows the result to one row.
pub fn games_query(filter: &GameFilter, game_id: Option<i64>) -> QueryBuilder<'static, Sqlite> {
    let mut builder = QueryBuilder::new(GAMES_BASE_QUERY);
    let mut clause = " WHERE ";

    if let Some(id) = game_id {
        builder.push(clause).push("g.id = ").push_bind(id);
        clause = " AND ";
    }
    if let Some(category_id) = filter.category_id {
        builder
            .push(clause)
            .push("g.category_id = ")
            .push_bind(category_id);
        clause = " AND ";
    }
    if let Some(publisher_id) = filter.publisher_id {
        builder
            .push(clause)
            .push("g.publisher_id = ")
            .push_bind(publisher_id);
    }

    builder.push(" ORDER BY g.id");
    builder
}

pub async fn list_games(conn: &mut SqliteConnection, filter: &GameFilter) -> Result<Vec<Game>> {
    let mut query = games_query(filter, None);
    query.build_query_as::<Game>().fetch_all(&mut *conn).await
}

pub async fn get_game(conn: &mut SqliteConnection, game_id: i64) -> Result<Option<Game>> {
    let mut query = games_query(&GameFilter::default(), Some(game_id));
    query
        .build_query_as::<Game>()
        .fetch_optional(&mut *conn)
        .await
}

/// Insert a game and return its generated id
pub async fn insert_game(conn: &mut SqliteConnection, game: &NewGame) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO games (title, description, star_rating, category_id, publisher_id)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&game.title)
    .bind(&game.description)
    .bind(game.star_rating)
    .bind(game.category_id)
    .bind(game.publisher_id)
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Overwrite every mutable column of a game; returns the number of rows touched
pub async fn update_game(conn: &mut SqliteConnection, game_id: i64, game: &NewGame) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE games
        SET title = ?,
            description = ?,
            star_rating = ?,
            category_id = ?,
            publisher_id = ?
        WHERE id = ?
        "#,
    )
    .bind(&game.title)
    .bind(&game.description)
    .bind(game.star_rating)
    .bind(game.category_id)
    .bind(game.publisher_id)
    .bind(game_id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

pub async fn delete_game(conn: &mut SqliteConnection, game_id: i64) -> Result<u64> {
    let result = sqlx::query("DELETE FROM games WHERE id = ?")
        .bind(game_id)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected())
}

pub async fn count_games(conn: &mut SqliteConnection) -> Result<i64> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM games")
        .fetch_one(&mut *conn)
        .await
}

// =============================================================================
// Category queries
// =============================================================================

pub async fn list_categories(conn: &mut SqliteConnection) -> Result<Vec<Category>> {
    sqlx::query_as::<_, Category>(&format!("{CATEGORIES_BASE_QUERY} ORDER BY c.id"))
        .fetch_all(&mut *conn)
        .await
}

pub async fn get_category(conn: &mut SqliteConnection, category_id: i64) -> Result<Option<Category>> {
    sqlx::query_as::<_, Category>(&format!("{CATEGORIES_BASE_QUERY} WHERE c.id = ?"))
        .bind(category_id)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn category_exists(conn: &mut SqliteConnection, category_id: i64) -> Result<bool> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM categories WHERE id = ?")
        .bind(category_id)
        .fetch_one(&mut *conn)
        .await?;

    Ok(count > 0)
}

pub async fn insert_category(conn: &mut SqliteConnection, category: &NewCategory) -> Result<i64> {
    let result = sqlx::query("INSERT INTO categories (name, description) VALUES (?, ?)")
        .bind(&category.name)
        .bind(category.description.as_deref())
        .execute(&mut *conn)
        .await?;

    Ok(result.last_insert_rowid())
}

// =============================================================================
// Publisher queries
// =============================================================================

pub async fn list_publishers(conn: &mut SqliteConnection) -> Result<Vec<PublisherSummary>> {
    sqlx::query_as::<_, PublisherSummary>("SELECT id, name FROM publishers ORDER BY id")
        .fetch_all(&mut *conn)
        .await
}

pub async fn get_publisher(
    conn: &mut SqliteConnection,
    publisher_id: i64,
) -> Result<Option<Publisher>> {
    sqlx::query_as::<_, Publisher>(&format!("{PUBLISHERS_BASE_QUERY} WHERE p.id = ?"))
        .bind(publisher_id)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn publisher_exists(conn: &mut SqliteConnection, publisher_id: i64) -> Result<bool> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM publishers WHERE id = ?")
        .bind(publisher_id)
        .fetch_one(&mut *conn)
        .await?;

    Ok(count > 0)
}

pub async fn insert_publisher(
    conn: &mut SqliteConnection,
    publisher: &NewPublisher,
) -> Result<i64> {
    let result = sqlx::query("INSERT INTO publishers (name, description) VALUES (?, ?)")
        .bind(&publisher.name)
        .bind(publisher.description.as_deref())
        .execute(&mut *conn)
        .await?;

    Ok(result.last_insert_rowid())
}
