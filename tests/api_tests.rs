// HTTP surface tests for Kindred

use actix_web::http::StatusCode;
use actix_web::{test, App};
use chrono::{NaiveDate, TimeZone, Utc};
use kindred::config::{BucketSettings, Settings};
use kindred::models::{
    DatingGoal, DiscoverResponse, ErrorResponse, FavoritesResponse, Gender, Location, MatchesResponse, OkResponse,
    Profile, QuotaResponse, RecordInteractionResponse,
};
use kindred::routes::{configure_app, AppState};
use kindred::services::{ManualClock, MatchEngine, MemoryStore};
use serde_json::json;
use std::sync::Arc;

fn create_profile(id: &str, gender: Gender, interested_in: Gender) -> Profile {
    let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
    Profile {
        user_id: id.to_string(),
        name: format!("User {}", id),
        birth_date: NaiveDate::from_ymd_opt(1996, 3, 14).unwrap(),
        gender,
        interested_in: [interested_in].into_iter().collect(),
        goal: Some(DatingGoal::Relationship),
        bio: Some("hello".to_string()),
        interests: ["hiking".to_string()].into_iter().collect(),
        location: Some(Location { geohash: "dr5regw".to_string(), coordinates: None }),
        visible: true,
        complete: true,
        created_at: now,
        updated_at: now,
    }
}

fn create_state(settings: Settings) -> AppState {
    let store = Arc::new(MemoryStore::new());
    store.put_profile(create_profile("alice", Gender::Female, Gender::Male));
    store.put_profile(create_profile("bob", Gender::Male, Gender::Female));

    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()));
    let engine = MatchEngine::from_settings(&settings, store.clone(), store, clock);
    AppState::new(Arc::new(engine))
}

#[actix_web::test]
async fn test_health() {
    let app = test::init_service(App::new().configure(configure_app(create_state(Settings::default())))).await;

    let req = test::TestRequest::get().uri("/api/v1/health").to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["status"], "healthy");
}

#[actix_web::test]
async fn test_discover_and_match_flow() {
    let app = test::init_service(App::new().configure(configure_app(create_state(Settings::default())))).await;

    let req = test::TestRequest::post()
        .uri("/api/v1/discover")
        .set_json(json!({ "userId": "alice", "filters": { "ageMin": 18 }, "limit": 10 }))
        .to_request();
    let page: DiscoverResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(page.profiles.len(), 1);
    assert_eq!(page.profiles[0].profile.user_id, "bob");
    assert_eq!(page.profiles[0].profile.geohash.as_deref(), Some("dr5re"));

    for (from, to) in [("alice", "bob"), ("bob", "alice")] {
        let req = test::TestRequest::post()
            .uri("/api/v1/interactions")
            .set_json(json!({ "userId": from, "targetUserId": to, "kind": "like" }))
            .to_request();
        let resp: RecordInteractionResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp.match_created, from == "bob");
    }

    let req = test::TestRequest::get().uri("/api/v1/matches?userId=alice").to_request();
    let matches: MatchesResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(matches.matches.len(), 1);
    assert_eq!(matches.matches[0].other_user_id, "bob");

    let req = test::TestRequest::delete().uri("/api/v1/matches/bob?userId=alice").to_request();
    let ok: OkResponse = test::call_and_read_body_json(&app, req).await;
    assert!(ok.ok);

    let req = test::TestRequest::get().uri("/api/v1/matches?userId=alice").to_request();
    let matches: MatchesResponse = test::call_and_read_body_json(&app, req).await;
    assert!(matches.matches.is_empty());

    let req = test::TestRequest::get().uri("/api/v1/stats?userId=alice").to_request();
    let stats: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(stats["user_id"], "alice");
    assert_eq!(stats["likes"], 1);
    assert_eq!(stats["active_matches"], 0);
}

#[actix_web::test]
async fn test_invalid_kind_is_bad_request() {
    let app = test::init_service(App::new().configure(configure_app(create_state(Settings::default())))).await;

    let req = test::TestRequest::post()
        .uri("/api/v1/interactions")
        .set_json(json!({ "userId": "alice", "targetUserId": "bob", "kind": "wink" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: ErrorResponse = test::read_body_json(resp).await;
    assert_eq!(body.error, "validation_error");
    assert_eq!(body.status_code, 400);
}

#[actix_web::test]
async fn test_malformed_json_is_bad_request() {
    let app = test::init_service(App::new().configure(configure_app(create_state(Settings::default())))).await;

    let req = test::TestRequest::post()
        .uri("/api/v1/discover")
        .insert_header(("content-type", "application/json"))
        .set_payload("{ not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: ErrorResponse = test::read_body_json(resp).await;
    assert_eq!(body.error, "validation_error");
}

#[actix_web::test]
async fn test_unknown_user_is_not_found() {
    let app = test::init_service(App::new().configure(configure_app(create_state(Settings::default())))).await;

    let req = test::TestRequest::post()
        .uri("/api/v1/discover")
        .set_json(json!({ "userId": "nobody" }))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_rate_limited_discover_sets_retry_after() {
    let mut settings = Settings::default();
    settings.rate_limit.discover = BucketSettings { max: 1, window_secs: 60 };
    let app = test::init_service(App::new().configure(configure_app(create_state(settings)))).await;

    let discover = || {
        test::TestRequest::post()
            .uri("/api/v1/discover")
            .set_json(json!({ "userId": "alice" }))
            .to_request()
    };

    assert_eq!(test::call_service(&app, discover()).await.status(), StatusCode::OK);

    let resp = test::call_service(&app, discover()).await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(resp.headers().get("Retry-After").unwrap(), "60");

    let body: ErrorResponse = test::read_body_json(resp).await;
    assert_eq!(body.error, "rate_limit_exceeded");

    let req = test::TestRequest::get().uri("/api/v1/quota?userId=alice").to_request();
    let quota: QuotaResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(quota.discover, 0);
    assert_eq!(quota.swipe, 100);
}

#[actix_web::test]
async fn test_favorites_endpoints() {
    let app = test::init_service(App::new().configure(configure_app(create_state(Settings::default())))).await;

    let req = test::TestRequest::post()
        .uri("/api/v1/favorites")
        .set_json(json!({ "userId": "alice", "targetUserId": "bob" }))
        .to_request();
    let ok: OkResponse = test::call_and_read_body_json(&app, req).await;
    assert!(ok.ok);

    let req = test::TestRequest::get().uri("/api/v1/favorites?userId=alice&limit=5").to_request();
    let favorites: FavoritesResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(favorites.profiles.len(), 1);
    assert_eq!(favorites.profiles[0].user_id, "bob");
    assert!(favorites.next_cursor.is_none());

    let req = test::TestRequest::delete()
        .uri("/api/v1/favorites?userId=alice&targetUserId=bob")
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::get().uri("/api/v1/favorites?userId=alice").to_request();
    let favorites: FavoritesResponse = test::call_and_read_body_json(&app, req).await;
    assert!(favorites.profiles.is_empty());
}

#[actix_web::test]
async fn test_cache_stats_endpoint() {
    let app = test::init_service(App::new().configure(configure_app(create_state(Settings::default())))).await;

    let req = test::TestRequest::post()
        .uri("/api/v1/discover")
        .set_json(json!({ "userId": "bob" }))
        .to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::get().uri("/api/v1/cache/stats").to_request();
    let stats: serde_json::Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(stats["discovery"]["size"], 1);
    assert_eq!(stats["rate_limit_windows"], 1);
}
