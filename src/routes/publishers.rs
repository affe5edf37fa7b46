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
    models::{CreatePublisherRequest, NewPublisher, Publisher, PublisherSummary},
    AppState,
};

const PUBLISHER_NOT_FOUND: ApiError = ApiError::NotFound {
    resource: "Publisher",
};

/// List every publisher as an id/name pair
pub async fn list_publishers(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<PublisherSummary>>> {
    let mut conn = state.db.acquire().await?;
    let publishers = queries::list_publishers(&mut conn).await?;

    tracing::debug!("Returning {} publishers", publishers.len());
    Ok(Json(publishers))
}

pub async fn get_publisher(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Publisher>> {
    let Path(publisher_id) = id.map_err(|_| PUBLISHER_NOT_FOUND)?;

    let mut conn = state.db.acquire().await?;
    let publisher = queries::get_publisher(&mut conn, publisher_id)
        .await?
        .ok_or(PUBLISHER_NOT_FOUND)?;

    Ok(Json(publisher))
}

/// Create a publisher; a duplicate name surfaces as an integrity error
pub async fn create_publisher(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreatePublisherRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Publisher>)> {
    let Json(payload) = payload?;
    let new_publisher = payload.into_new_publisher()?;

    let mut tx = state.db.begin().await?;
    match insert_and_fetch(&mut tx, &new_publisher).await {
        Ok(publisher) => {
            tx.commit().await?;
            tracing::info!("Created publisher {} ({})", publisher.name, publisher.id);
            Ok((StatusCode::CREATED, Json(publisher)))
        }
        Err(e) => {
            db::rollback(tx).await;
            tracing::warn!("Failed to create publisher '{}': {}", new_publisher.name, e);
            Err(e)
        }
    }
}

async fn insert_and_fetch(
    conn: &mut SqliteConnection,
    new_publisher: &NewPublisher,
) -> ApiResult<Publisher> {
    let id = queries::insert_publisher(conn, new_publisher).await?;
    queries::get_publisher(conn, id)
        .await?
        .ok_or_else(|| ApiError::Internal(format!("publisher {} vanished after insert", id)))
}
