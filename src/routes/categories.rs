use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    Json,
};
use sqlx::SqliteConnection;

use crate::{
    db::{self, queries},
    error::{ApiError, ApiResult},
    models::{Category, CreateCategoryRequest, NewCategory},
    AppState,
};

const CATEGORY_NOT_FOUND: ApiError = ApiError::NotFound {
    resource: "Category",
};

/// List every category with its game count
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<Category>>> {
    let mut conn = state.db.acquire().await?;
    let categories = queries::list_categories(&mut conn).await?;

    Ok(Json(categories))
}

pub async fn get_category(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Category>> {
    let Path(category_id) = id.map_err(|_| CATEGORY_NOT_FOUND)?;

    let mut conn = state.db.acquire().await?;
    let category = queries::get_category(&mut conn, category_id)
        .await?
        .ok_or(CATEGORY_NOT_FOUND)?;

    Ok(Json(category))
}

pub async fn create_category(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateCategoryRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Category>)> {
    let Json(payload) = payload?;
    let new_category = payload.into_new_category()?;

    let mut tx = state.db.begin().await?;
    match insert_and_fetch(&mut tx, &new_category).await {
        Ok(category) => {
            tx.commit().await?;
            tracing::info!("Created category {} ({})", category.name, category.id);
            Ok((StatusCode::CREATED, Json(category)))
        }
        Err(e) => {
            db::rollback(tx).await;
            tracing::warn!("Failed to create category '{}': {}", new_category.name, e);
            Err(e)
        }
    }
}

async fn insert_and_fetch(
    conn: &mut SqliteConnection,
    new_category: &NewCategory,
) -> ApiResult<Category> {
    let id = queries::insert_category(conn, new_category).await?;
    queries::get_category(conn, id)
        .await?
        .ok_or_else(|| ApiError::Internal(format!("category {} vanished after insert", id)))
}
