// Integration tests for the Kindred matching engine

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use kindred::config::{BucketSettings, Settings};
use async_trait::async_trait;
use kindred::models::{CandidateQuery, Coordinates, DatingGoal, DiscoveryFilters, Gender, Location, Profile};
use kindred::services::{Bucket, ManualClock, MatchEngine, MemoryStore, ProfileStore, StoreResult};
use kindred::{ErrorKind, MatchError};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

struct Harness {
    engine: Arc<MatchEngine>,
    store: Arc<MemoryStore>,
    clock: Arc<ManualClock>,
}

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

fn create_harness_with(settings: Settings) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(start()));
    let engine = MatchEngine::from_settings(&settings, store.clone(), store.clone(), clock.clone());

    Harness {
        engine: Arc::new(engine),
        store,
        clock,
    }
}

fn create_harness() -> Harness {
    create_harness_with(Settings::default())
}

fn create_profile(
    id: &str,
    age: i32,
    gender: Gender,
    interested_in: &[Gender],
    goal: DatingGoal,
    interests: &[&str],
) -> Profile {
    Profile {
        user_id: id.to_string(),
        name: format!("User {}", id),
        birth_date: NaiveDate::from_ymd_opt(2025 - age, 1, 1).unwrap(),
        gender,
        interested_in: interested_in.iter().copied().collect(),
        goal: Some(goal),
        bio: None,
        interests: interests.iter().map(|s| s.to_string()).collect(),
        location: Some(Location {
            geohash: "u33dbfc".to_string(),
            coordinates: Some(Coordinates { latitude: 52.52, longitude: 13.40 }),
        }),
        visible: true,
        complete: true,
        created_at: start(),
        updated_at: start(),
    }
}

/// A: 28, dating, {music, travel}; B: 30, dating, {travel, sport}
fn seed_pair(store: &MemoryStore) {
    store.put_profile(create_profile("alice", 28, Gender::Female, &[Gender::Male], DatingGoal::Dating, &["music", "travel"]));
    store.put_profile(create_profile("bob", 30, Gender::Male, &[Gender::Female], DatingGoal::Dating, &["travel", "sport"]));
}

fn kind_of<T>(result: Result<T, MatchError>) -> ErrorKind {
    match result {
        Ok(_) => panic!("expected an error"),
        Err(e) => e.kind(),
    }
}

async fn discovered_ids(engine: &MatchEngine, user_id: &str) -> Vec<String> {
    engine
        .discover(user_id, &DiscoveryFilters::default(), None, None)
        .await
        .unwrap()
        .profiles
        .into_iter()
        .map(|c| c.profile.user_id)
        .collect()
}

#[tokio::test]
async fn test_mutual_like_creates_single_match() {
    let h = create_harness();
    seed_pair(&h.store);

    let first = h.engine.record_interaction("alice", "bob", "like").await.unwrap();
    assert!(!first.match_created);
    assert!(first.match_id.is_none());

    let second = h.engine.record_interaction("bob", "alice", "like").await.unwrap();
    assert!(second.match_created);
    let match_id = second.match_id.unwrap();

    let alice_matches = h.engine.list_matches("alice", None, None).await.unwrap();
    assert_eq!(alice_matches.matches.len(), 1);
    assert_eq!(alice_matches.matches[0].other_user_id, "bob");
    assert_eq!(alice_matches.matches[0].match_id, match_id);
    assert_eq!(alice_matches.matches[0].profile.as_ref().unwrap().age, 30);

    let bob_matches = h.engine.list_matches("bob", None, None).await.unwrap();
    assert_eq!(bob_matches.matches.len(), 1);
    assert_eq!(bob_matches.matches[0].other_user_id, "alice");
    assert_eq!(h.store.match_count(), 1);
}

#[tokio::test]
async fn test_repeat_like_reports_existing_match() {
    let h = create_harness();
    seed_pair(&h.store);

    h.engine.record_interaction("alice", "bob", "like").await.unwrap();
    let created = h.engine.record_interaction("bob", "alice", "superlike").await.unwrap();
    let again = h.engine.record_interaction("alice", "bob", "like").await.unwrap();

    assert!(created.match_created);
    assert!(!again.match_created);
    assert_eq!(again.match_id, created.match_id);
    assert_eq!(h.store.match_count(), 1);
    assert_eq!(h.store.interaction_count(), 2);
}

#[tokio::test]
async fn test_one_sided_like_never_matches() {
    let h = create_harness();
    seed_pair(&h.store);

    assert!(discovered_ids(&h.engine, "alice").await.contains(&"bob".to_string()));

    h.engine.record_interaction("alice", "bob", "like").await.unwrap();
    let pass = h.engine.record_interaction("bob", "alice", "pass").await.unwrap();

    assert!(!pass.match_created);
    assert!(pass.match_id.is_none());
    assert!(h.engine.list_matches("alice", None, None).await.unwrap().matches.is_empty());
    assert!(h.engine.list_matches("bob", None, None).await.unwrap().matches.is_empty());
    assert!(!discovered_ids(&h.engine, "alice").await.contains(&"bob".to_string()));
    assert!(!discovered_ids(&h.engine, "bob").await.contains(&"alice".to_string()));
}

#[tokio::test]
async fn test_interaction_upsert_keeps_one_row() {
    let h = create_harness();
    seed_pair(&h.store);

    h.engine.record_interaction("alice", "bob", "like").await.unwrap();
    h.engine.record_interaction("alice", "bob", "like").await.unwrap();
    assert_eq!(h.store.interaction_count(), 1);

    h.engine.record_interaction("alice", "bob", "pass").await.unwrap();
    let stats = h.engine.interaction_stats("alice").await.unwrap();
    assert_eq!(stats.counts.likes, 0);
    assert_eq!(stats.counts.passes, 1);
    assert_eq!(stats.counts.last_interaction_at, Some(start()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_mutual_likes_create_one_match() {
    let h = create_harness();

    for i in 0..25 {
        let a = format!("a{:02}", i);
        let b = format!("b{:02}", i);
        h.store.put_profile(create_profile(&a, 28, Gender::Female, &[], DatingGoal::Dating, &[]));
        h.store.put_profile(create_profile(&b, 29, Gender::Male, &[], DatingGoal::Dating, &[]));
    }

    let mut handles = Vec::new();
    for i in 0..25 {
        let a = format!("a{:02}", i);
        let b = format!("b{:02}", i);

        let engine = h.engine.clone();
        let (from, to) = (a.clone(), b.clone());
        handles.push(tokio::spawn(async move { engine.record_interaction(&from, &to, "like").await }));

        let engine = h.engine.clone();
        handles.push(tokio::spawn(async move { engine.record_interaction(&b, &a, "like").await }));
    }

    let mut created = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap().match_created {
            created += 1;
        }
    }

    assert_eq!(created, 25);
    assert_eq!(h.store.match_count(), 25);
}

#[tokio::test]
async fn test_favorite_is_independent_of_matching() {
    let h = create_harness();
    seed_pair(&h.store);

    h.engine.add_favorite("alice", "bob").await.unwrap();
    h.engine.add_favorite("alice", "bob").await.unwrap();

    let favorites = h.engine.list_favorites("alice", None, None).await.unwrap();
    assert_eq!(favorites.profiles.len(), 1);
    assert_eq!(favorites.profiles[0].user_id, "bob");

    assert!(discovered_ids(&h.engine, "alice").await.contains(&"bob".to_string()));

    h.engine.remove_favorite("alice", "bob").await.unwrap();
    h.engine.remove_favorite("alice", "bob").await.unwrap();
    assert!(h.engine.list_favorites("alice", None, None).await.unwrap().profiles.is_empty());
}

#[tokio::test]
async fn test_hidden_favorites_are_skipped() {
    let h = create_harness();
    seed_pair(&h.store);
    h.engine.add_favorite("alice", "bob").await.unwrap();

    let mut hidden = create_profile("bob", 30, Gender::Male, &[Gender::Female], DatingGoal::Dating, &[]);
    hidden.visible = false;
    h.store.put_profile(hidden);
    // Outlive the cached profile read
    h.clock.advance(Duration::from_secs(31));

    let favorites = h.engine.list_favorites("alice", None, None).await.unwrap();
    assert!(favorites.profiles.is_empty());
}

#[tokio::test]
async fn test_blocked_profiles_never_discovered() {
    let h = create_harness();
    seed_pair(&h.store);
    h.store.block("bob", "alice");

    assert!(discovered_ids(&h.engine, "alice").await.is_empty());
    assert!(discovered_ids(&h.engine, "bob").await.is_empty());
}

#[tokio::test]
async fn test_discovery_pages_cover_pool_once() {
    let h = create_harness();
    h.store.put_profile(create_profile("me", 30, Gender::Male, &[Gender::Female], DatingGoal::Dating, &["music"]));
    for i in 0..7 {
        let tags: &[&str] = if i % 2 == 0 { &["music"] } else { &["sport"] };
        h.store.put_profile(create_profile(&format!("c{}", i), 25 + i, Gender::Female, &[Gender::Male], DatingGoal::Dating, tags));
    }

    let mut seen = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = h
            .engine
            .discover("me", &DiscoveryFilters::default(), cursor.as_deref(), Some(3))
            .await
            .unwrap();
        assert!(page.profiles.len() <= 3);
        seen.extend(page.profiles.iter().map(|c| c.profile.user_id.clone()));

        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    let mut unique = seen.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(seen.len(), 7);
    assert_eq!(unique.len(), 7);
}

#[tokio::test]
async fn test_swiped_candidates_do_not_shift_next_page() {
    let h = create_harness();
    h.store.put_profile(create_profile("me", 30, Gender::Male, &[Gender::Female], DatingGoal::Dating, &[]));
    for i in 0..4 {
        h.store.put_profile(create_profile(&format!("c{}", i), 28, Gender::Female, &[Gender::Male], DatingGoal::Dating, &[]));
    }

    let first = h.engine.discover("me", &DiscoveryFilters::default(), None, Some(2)).await.unwrap();
    for candidate in &first.profiles {
        h.engine.record_interaction("me", &candidate.profile.user_id, "pass").await.unwrap();
    }

    let second = h
        .engine
        .discover("me", &DiscoveryFilters::default(), first.next_cursor.as_deref(), Some(2))
        .await
        .unwrap();

    assert_eq!(second.profiles.len(), 2);
    assert!(second.next_cursor.is_none());
}

#[tokio::test]
async fn test_limit_is_capped() {
    let mut settings = Settings::default();
    settings.discovery.max_limit = 2;
    let h = create_harness_with(settings);
    h.store.put_profile(create_profile("me", 30, Gender::Male, &[], DatingGoal::Dating, &[]));
    for i in 0..5 {
        h.store.put_profile(create_profile(&format!("c{}", i), 28, Gender::Female, &[], DatingGoal::Dating, &[]));
    }

    let page = h.engine.discover("me", &DiscoveryFilters::default(), None, Some(50)).await.unwrap();
    assert_eq!(page.profiles.len(), 2);
    assert!(page.next_cursor.is_some());
}

#[tokio::test]
async fn test_empty_filtered_result_suggests_relaxing() {
    let h = create_harness();
    seed_pair(&h.store);

    let strict = DiscoveryFilters { age_min: Some(60), ..Default::default() };
    let page = h.engine.discover("alice", &strict, None, None).await.unwrap();
    assert!(page.profiles.is_empty());
    assert!(page.next_cursor.is_none());
    assert!(page.suggest_relaxed_filters);

    h.engine.record_interaction("alice", "bob", "pass").await.unwrap();
    let page = h.engine.discover("alice", &DiscoveryFilters::default(), None, None).await.unwrap();
    assert!(page.profiles.is_empty());
    assert!(!page.suggest_relaxed_filters);
}

#[tokio::test]
async fn test_goal_and_distance_filters() {
    let h = create_harness();
    seed_pair(&h.store);
    let mut far = create_profile("carol", 29, Gender::Female, &[Gender::Male], DatingGoal::Casual, &[]);
    far.location = Some(Location { geohash: "gcpvj0d".to_string(), coordinates: None });
    h.store.put_profile(far);

    let all = discovered_ids(&h.engine, "bob").await;
    assert_eq!(all.len(), 2);

    let nearby = DiscoveryFilters { max_distance_cells: Some(4), ..Default::default() };
    let page = h.engine.discover("bob", &nearby, None, None).await.unwrap();
    assert_eq!(page.profiles.len(), 1);
    assert_eq!(page.profiles[0].profile.user_id, "alice");

    let casual = DiscoveryFilters { goal: Some(DatingGoal::Casual), ..Default::default() };
    let page = h.engine.discover("bob", &casual, None, None).await.unwrap();
    assert_eq!(page.profiles.len(), 1);
    assert_eq!(page.profiles[0].profile.user_id, "carol");
}

#[tokio::test]
async fn test_swipes_past_pool_size_keep_feed_filled() {
    let mut settings = Settings::default();
    settings.discovery.max_pool_size = 5;
    let h = create_harness_with(settings);
    h.store.put_profile(create_profile("me", 30, Gender::Male, &[Gender::Female], DatingGoal::Dating, &[]));
    for i in 0..10 {
        let mut candidate = create_profile(&format!("c{}", i), 28, Gender::Female, &[Gender::Male], DatingGoal::Dating, &[]);
        candidate.updated_at = start() + chrono::Duration::minutes(i64::from(i));
        h.store.put_profile(candidate);
    }

    // c5..c9 are the most recently updated and fill the first pool
    for i in 5..10 {
        h.engine.record_interaction("me", &format!("c{}", i), "pass").await.unwrap();
    }

    let mut ids = discovered_ids(&h.engine, "me").await;
    ids.sort();
    assert_eq!(ids, vec!["c0", "c1", "c2", "c3", "c4"]);
}

#[tokio::test]
async fn test_distance_filter_finer_than_stored_cells() {
    let h = create_harness();
    seed_pair(&h.store);

    for cells in [5, 6, 12] {
        let filters = DiscoveryFilters { max_distance_cells: Some(cells), ..Default::default() };
        let page = h.engine.discover("alice", &filters, None, None).await.unwrap();

        assert_eq!(page.profiles.len(), 1, "max_distance_cells = {}", cells);
        assert_eq!(page.profiles[0].profile.user_id, "bob");
        assert!(!page.suggest_relaxed_filters);
    }
}

/// Profile store that parks the first block lookup until released
struct PausingProfiles {
    inner: Arc<MemoryStore>,
    armed: AtomicBool,
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl ProfileStore for PausingProfiles {
    async fn get_profile(&self, user_id: &str) -> StoreResult<Option<Profile>> {
        self.inner.get_profile(user_id).await
    }

    async fn candidate_profiles(&self, query: &CandidateQuery) -> StoreResult<Vec<Profile>> {
        self.inner.candidate_profiles(query).await
    }

    async fn blocked_user_ids(&self, user_id: &str) -> StoreResult<HashSet<String>> {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.inner.blocked_user_ids(user_id).await
    }
}

#[tokio::test]
async fn test_swipe_during_pool_build_is_not_cached_away() {
    let store = Arc::new(MemoryStore::new());
    seed_pair(&store);
    let profiles = Arc::new(PausingProfiles {
        inner: store.clone(),
        armed: AtomicBool::new(true),
        entered: Notify::new(),
        release: Notify::new(),
    });
    let clock = Arc::new(ManualClock::new(start()));
    let engine = Arc::new(MatchEngine::from_settings(&Settings::default(), profiles.clone(), store.clone(), clock));

    let building = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.discover("alice", &DiscoveryFilters::default(), None, None).await })
    };

    profiles.entered.notified().await;
    engine.record_interaction("alice", "bob", "pass").await.unwrap();
    profiles.release.notify_one();
    building.await.unwrap().unwrap();

    assert!(discovered_ids(&engine, "alice").await.is_empty());
}

#[tokio::test]
async fn test_discovery_never_exposes_coordinates() {
    let h = create_harness();
    seed_pair(&h.store);

    let page = h.engine.discover("alice", &DiscoveryFilters::default(), None, None).await.unwrap();
    let candidate = &page.profiles[0];
    assert_eq!(candidate.profile.geohash.as_deref(), Some("u33db"));
    assert_eq!(candidate.shared_interests, vec!["travel".to_string()]);

    let json = serde_json::to_string(&page).unwrap();
    assert!(!json.contains("52.52"));
    assert!(!json.contains("latitude"));
    assert!(!json.contains("u33dbfc"));
}

#[tokio::test]
async fn test_discovery_pool_cached_until_ttl() {
    let h = create_harness();
    seed_pair(&h.store);
    assert_eq!(discovered_ids(&h.engine, "bob").await.len(), 1);

    h.store.put_profile(create_profile("carol", 29, Gender::Female, &[Gender::Male], DatingGoal::Dating, &[]));
    assert_eq!(discovered_ids(&h.engine, "bob").await.len(), 1);

    h.clock.advance(Duration::from_secs(61));
    assert_eq!(discovered_ids(&h.engine, "bob").await.len(), 2);

    let stats = h.engine.cache_stats().await;
    assert!(stats.discovery.hits >= 1);
    assert!(stats.discovery.misses >= 2);
}

#[tokio::test]
async fn test_discover_rate_limit_window() {
    let mut settings = Settings::default();
    settings.rate_limit.discover = BucketSettings { max: 3, window_secs: 60 };
    let h = create_harness_with(settings);
    seed_pair(&h.store);

    for _ in 0..3 {
        h.engine.discover("alice", &DiscoveryFilters::default(), None, None).await.unwrap();
    }

    let denied = h.engine.discover("alice", &DiscoveryFilters::default(), None, None).await.unwrap_err();
    match denied {
        MatchError::RateLimitExceeded { bucket, retry_after_secs } => {
            assert_eq!(bucket, Bucket::Discover);
            assert_eq!(retry_after_secs, 60);
        }
        other => panic!("expected rate limit, got {:?}", other),
    }
    assert_eq!(h.engine.quota("alice").unwrap().discover, 0);

    h.clock.advance(Duration::from_secs(60));
    assert!(h.engine.discover("alice", &DiscoveryFilters::default(), None, None).await.is_ok());
}

#[tokio::test]
async fn test_superlike_draws_from_own_bucket() {
    let mut settings = Settings::default();
    settings.rate_limit.superlike = BucketSettings { max: 1, window_secs: 86_400 };
    let h = create_harness_with(settings);
    seed_pair(&h.store);
    h.store.put_profile(create_profile("carol", 29, Gender::Female, &[Gender::Male], DatingGoal::Dating, &[]));

    h.engine.record_interaction("bob", "alice", "superlike").await.unwrap();
    let err = h.engine.record_interaction("bob", "carol", "superlike").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);

    h.engine.record_interaction("bob", "carol", "like").await.unwrap();

    let quota = h.engine.quota("bob").unwrap();
    assert_eq!(quota.superlike, 0);
    assert_eq!(quota.swipe, 99);
}

#[tokio::test]
async fn test_input_validation() {
    let h = create_harness();
    seed_pair(&h.store);

    assert_eq!(kind_of(h.engine.record_interaction("alice", "bob", "wink").await), ErrorKind::ValidationError);
    assert_eq!(kind_of(h.engine.record_interaction("alice", "alice", "like").await), ErrorKind::ValidationError);
    assert_eq!(kind_of(h.engine.record_interaction("alice", "nobody", "like").await), ErrorKind::NotFound);
    assert_eq!(kind_of(h.engine.record_interaction("", "bob", "like").await), ErrorKind::ValidationError);
    assert_eq!(kind_of(h.engine.add_favorite("alice", "alice").await), ErrorKind::ValidationError);

    let inverted = DiscoveryFilters { age_min: Some(40), age_max: Some(30), ..Default::default() };
    assert_eq!(kind_of(h.engine.discover("alice", &inverted, None, None).await), ErrorKind::ValidationError);
    assert_eq!(
        kind_of(h.engine.discover("alice", &DiscoveryFilters::default(), None, Some(0)).await),
        ErrorKind::ValidationError
    );
    assert_eq!(
        kind_of(h.engine.discover("alice", &DiscoveryFilters::default(), Some("garbage"), None).await),
        ErrorKind::ValidationError
    );
    assert_eq!(kind_of(h.engine.list_matches("alice", Some("-3"), None).await), ErrorKind::ValidationError);
    assert_eq!(
        kind_of(h.engine.discover("ghost", &DiscoveryFilters::default(), None, None).await),
        ErrorKind::NotFound
    );

    // Rejected requests do not consume quota
    assert_eq!(h.engine.quota("alice").unwrap().discover, 20);
}

#[tokio::test]
async fn test_invisible_target_is_not_found() {
    let h = create_harness();
    seed_pair(&h.store);
    let mut hidden = create_profile("dave", 31, Gender::Male, &[], DatingGoal::Dating, &[]);
    hidden.visible = false;
    h.store.put_profile(hidden);

    let err = h.engine.record_interaction("alice", "dave", "like").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_unmatch_is_final_for_the_pair() {
    let h = create_harness();
    seed_pair(&h.store);
    h.engine.record_interaction("alice", "bob", "like").await.unwrap();
    h.engine.record_interaction("bob", "alice", "like").await.unwrap();

    h.engine.unmatch("alice", "bob").await.unwrap();
    h.engine.unmatch("alice", "bob").await.unwrap();

    assert!(h.engine.list_matches("alice", None, None).await.unwrap().matches.is_empty());
    assert_eq!(h.engine.interaction_stats("bob").await.unwrap().counts.active_matches, 0);

    let again = h.engine.record_interaction("bob", "alice", "like").await.unwrap();
    assert!(!again.match_created);
    assert!(again.match_id.is_none());
}

#[tokio::test]
async fn test_match_listing_pages() {
    let h = create_harness();
    h.store.put_profile(create_profile("me", 30, Gender::Male, &[], DatingGoal::Dating, &[]));
    for i in 0..5 {
        let id = format!("m{}", i);
        h.store.put_profile(create_profile(&id, 28, Gender::Female, &[], DatingGoal::Dating, &[]));
        h.engine.record_interaction(&id, "me", "like").await.unwrap();
        h.engine.record_interaction("me", &id, "like").await.unwrap();
        h.clock.advance(Duration::from_secs(1));
    }

    let first = h.engine.list_matches("me", None, Some(3)).await.unwrap();
    assert_eq!(first.matches.len(), 3);
    assert_eq!(first.matches[0].other_user_id, "m4");
    assert_eq!(first.next_cursor.as_deref(), Some("3"));

    let second = h.engine.list_matches("me", first.next_cursor.as_deref(), Some(3)).await.unwrap();
    assert_eq!(second.matches.len(), 2);
    assert!(second.next_cursor.is_none());
}

#[tokio::test]
async fn test_sweep_drops_expired_state() {
    let h = create_harness();
    seed_pair(&h.store);
    h.engine.discover("alice", &DiscoveryFilters::default(), None, None).await.unwrap();

    h.clock.advance(Duration::from_secs(120));
    let report = h.engine.sweep().await;

    assert_eq!(report.expired_pools, 1);
    assert!(report.expired_profiles >= 1);
    assert_eq!(report.pruned_windows, 1);
    assert_eq!(h.engine.cache_stats().await.rate_limit_windows, 0);
}

#[test]
fn test_engine_from_blocking_context() {
    let h = create_harness();
    seed_pair(&h.store);

    let result = tokio_test::block_on(h.engine.add_favorite("bob", "alice"));
    assert!(result.unwrap().ok);

    let favorites = tokio_test::block_on(h.engine.list_favorites("bob", None, None)).unwrap();
    assert_eq!(favorites.profiles.len(), 1);
}
