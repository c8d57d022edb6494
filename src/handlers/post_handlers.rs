use crate::error::{AppError, Result};
use crate::services::ListPostsQuery;
use crate::AppState;
use axum::{
    extract::{Query, State},
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Deserialize)]
pub struct PostsQuery {
    pub user_id: Option<i64>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub date_filter: Option<String>,
    pub author: Option<String>,
}

pub async fn list_posts_handler(
    State(state): State<AppState>,
    Query(query): Query<PostsQuery>,
) -> Result<Json<Value>> {
    let user_id = query
        .user_id
        .ok_or_else(|| AppError::Validation("user_id is required".to_string()))?;

    let page = state
        .post_service
        .list_posts(ListPostsQuery {
            user_id,
            page: query.page,
            limit: query.limit,
            search: query.search,
            date_filter: query.date_filter,
            author: query.author,
        })
        .await?;

    Ok(Json(json!(page)))
}
