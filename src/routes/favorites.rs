use crate::error::MatchError;
use crate::models::{FavoriteRequest, ListQuery};
use crate::routes::AppState;
use actix_web::{web, HttpResponse};
use validator::Validate;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/favorites")
            .route(web::get().to(list_favorites))
            .route(web::post().to(add_favorite))
            .route(web::delete().to(remove_favorite)),
    );
}

/// GET /api/v1/favorites?userId=...&cursor=...&limit=...
async fn list_favorites(
    state: web::Data<AppState>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, MatchError> {
    query.validate()?;

    let response = state
        .engine
        .list_favorites(&query.user_id, query.cursor.as_deref(), query.limit.map(usize::from))
        .await?;

    Ok(HttpResponse::Ok().json(response))
}

/// POST /api/v1/favorites
///
/// ```json
/// { "userId": "string", "targetUserId": "string" }
/// ```
async fn add_favorite(
    state: web::Data<AppState>,
    req: web::Json<FavoriteRequest>,
) -> Result<HttpResponse, MatchError> {
    req.validate()?;

    let response = state.engine.add_favorite(&req.user_id, &req.target_user_id).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// DELETE /api/v1/favorites?userId=...&targetUserId=...
async fn remove_favorite(
    state: web::Data<AppState>,
    query: web::Query<FavoriteRequest>,
) -> Result<HttpResponse, MatchError> {
    query.validate()?;

    let response = state.engine.remove_favorite(&query.user_id, &query.target_user_id).await?;
    Ok(HttpResponse::Ok().json(response))
}
