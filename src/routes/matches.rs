use crate::error::MatchError;
use crate::models::{DiscoverRequest, HealthResponse, ListQuery, RecordInteractionRequest, UserQuery};
use crate::routes::AppState;
use crate::services::Clock;
use actix_web::{web, HttpResponse, Responder};
use validator::Validate;

/// Configure discovery, interaction and match routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/discover", web::post().to(discover))
        .route("/interactions", web::post().to(record_interaction))
        .route("/matches", web::get().to(list_matches))
        .route("/matches/{other_id}", web::delete().to(unmatch))
        .route("/quota", web::get().to(quota))
        .route("/stats", web::get().to(stats))
        .route("/cache/stats", web::get().to(cache_stats));
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let healthy = state.engine.health_check().await;
    let status = if healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: state.engine.clock().now(),
    })
}

/// Discovery feed
///
/// POST /api/v1/discover
///
/// Request body:
/// ```json
/// {
///   "userId": "string",
///   "filters": { "ageMin": 25, "ageMax": 35, "maxDistanceCells": 4, "goal": "dating" },
///   "cursor": "string",
///   "limit": 20
/// }
/// ```
async fn discover(
    state: web::Data<AppState>,
    req: web::Json<DiscoverRequest>,
) -> Result<HttpResponse, MatchError> {
    req.validate()?;

    let response = state
        .engine
        .discover(
            &req.user_id,
            &req.filters,
            req.cursor.as_deref(),
            req.limit.map(usize::from),
        )
        .await?;

    Ok(HttpResponse::Ok().json(response))
}

/// Record a like, pass or superlike
///
/// POST /api/v1/interactions
///
/// Request body:
/// ```json
/// { "userId": "string", "targetUserId": "string", "kind": "like" }
/// ```
async fn record_interaction(
    state: web::Data<AppState>,
    req: web::Json<RecordInteractionRequest>,
) -> Result<HttpResponse, MatchError> {
    req.validate()?;

    let response = state
        .engine
        .record_interaction(&req.user_id, &req.target_user_id, &req.kind)
        .await?;

    Ok(HttpResponse::Ok().json(response))
}

/// GET /api/v1/matches?userId=...&cursor=...&limit=...
async fn list_matches(
    state: web::Data<AppState>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, MatchError> {
    query.validate()?;

    let response = state
        .engine
        .list_matches(&query.user_id, query.cursor.as_deref(), query.limit.map(usize::from))
        .await?;

    Ok(HttpResponse::Ok().json(response))
}

/// DELETE /api/v1/matches/{other_id}?userId=...
async fn unmatch(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<UserQuery>,
) -> Result<HttpResponse, MatchError> {
    query.validate()?;

    let response = state.engine.unmatch(&query.user_id, &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// GET /api/v1/quota?userId=...
async fn quota(state: web::Data<AppState>, query: web::Query<UserQuery>) -> Result<HttpResponse, MatchError> {
    query.validate()?;
    Ok(HttpResponse::Ok().json(state.engine.quota(&query.user_id)?))
}

/// GET /api/v1/stats?userId=...
async fn stats(state: web::Data<AppState>, query: web::Query<UserQuery>) -> Result<HttpResponse, MatchError> {
    query.validate()?;

    let response = state.engine.interaction_stats(&query.user_id).await?;
    Ok(HttpResponse::Ok().json(response))
}

async fn cache_stats(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(state.engine.cache_stats().await)
}
