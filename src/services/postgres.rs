use crate::config::DatabaseSettings;
use crate::core::interactions::{CanonicalPair, MatchInsert};
use crate::models::{
    CandidateQuery, DatingGoal, Favorite, Gender, Interaction, InteractionCounts, InteractionKind, Location,
    Match, MatchState, Profile,
};
use crate::services::store::{InteractionStore, ProfileStore, StoreError, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool, Row};
use std::collections::{BTreeSet, HashSet};
use std::time::Duration;
use uuid::Uuid;

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Duplicate(db.message().to_string()),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::WorkerCrashed => {
                StoreError::Unavailable(err.to_string())
            }
            _ => StoreError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StoreError::Internal(format!("migration failed: {}", err))
    }
}

/// Interaction kinds as stored in the database
#[derive(Debug, Clone, Copy, PartialEq, sqlx::Type)]
#[sqlx(type_name = "interaction_kind", rename_all = "lowercase")]
enum KindColumn {
    Like,
    Pass,
    Superlike,
}

impl From<InteractionKind> for KindColumn {
    fn from(value: InteractionKind) -> Self {
        match value {
            InteractionKind::Like => KindColumn::Like,
            InteractionKind::Pass => KindColumn::Pass,
            InteractionKind::Superlike => KindColumn::Superlike,
        }
    }
}

impl From<KindColumn> for InteractionKind {
    fn from(value: KindColumn) -> Self {
        match value {
            KindColumn::Like => InteractionKind::Like,
            KindColumn::Pass => InteractionKind::Pass,
            KindColumn::Superlike => InteractionKind::Superlike,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, sqlx::Type)]
#[sqlx(type_name = "match_state", rename_all = "lowercase")]
enum StateColumn {
    Active,
    Unmatched,
}

impl From<StateColumn> for MatchState {
    fn from(value: StateColumn) -> Self {
        match value {
            StateColumn::Active => MatchState::Active,
            StateColumn::Unmatched => MatchState::Unmatched,
        }
    }
}

impl From<MatchState> for StateColumn {
    fn from(value: MatchState) -> Self {
        match value {
            MatchState::Active => StateColumn::Active,
            MatchState::Unmatched => StateColumn::Unmatched,
        }
    }
}

#[derive(Debug, FromRow)]
struct ProfileRow {
    user_id: String,
    name: String,
    birth_date: NaiveDate,
    gender: String,
    interested_in: Vec<String>,
    goal: Option<String>,
    bio: Option<String>,
    interests: Vec<String>,
    geohash: Option<String>,
    is_visible: bool,
    is_complete: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProfileRow> for Profile {
    type Error = StoreError;

    fn try_from(row: ProfileRow) -> Result<Self, Self::Error> {
        let gender = row.gender.parse::<Gender>().map_err(StoreError::Internal)?;
        let interested_in: BTreeSet<Gender> = row
            .interested_in
            .iter()
            .map(|g| g.parse::<Gender>())
            .collect::<Result<_, _>>()
            .map_err(StoreError::Internal)?;
        let goal = row
            .goal
            .as_deref()
            .map(str::parse::<DatingGoal>)
            .transpose()
            .map_err(StoreError::Internal)?;

        Ok(Profile {
            user_id: row.user_id,
            name: row.name,
            birth_date: row.birth_date,
            gender,
            interested_in,
            goal,
            bio: row.bio,
            interests: row.interests.into_iter().collect(),
            location: row.geohash.map(|geohash| Location {
                geohash,
                coordinates: None,
            }),
            visible: row.is_visible,
            complete: row.is_complete,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct MatchRow {
    id: Uuid,
    user_low: String,
    user_high: String,
    state: StateColumn,
    created_at: DateTime<Utc>,
}

impl From<MatchRow> for Match {
    fn from(row: MatchRow) -> Self {
        Match {
            id: row.id,
            user_low: row.user_low,
            user_high: row.user_high,
            state: row.state.into(),
            created_at: row.created_at,
        }
    }
}

const PROFILE_COLUMNS: &str = r#"
    user_id, name, birth_date, gender, interested_in, goal, bio, interests,
    geohash, is_visible, is_complete, created_at, updated_at
"#;

/// PostgreSQL-backed profile and interaction store
///
/// Pair uniqueness is enforced by unique constraints on
/// `interactions (actor_id, target_id)`, `matches (user_low, user_high)` and
/// `favorites (owner_id, target_id)`. Raw coordinates are never selected.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect and run pending migrations
    pub async fn connect(settings: &DatabaseSettings) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .min_connections(settings.min_connections)
            .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
            .idle_timeout(Duration::from_secs(settings.idle_timeout_secs))
            .test_before_acquire(true)
            .connect(&settings.url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        tracing::info!(max_connections = settings.max_connections, "connected to PostgreSQL");

        Ok(Self { pool })
    }

    fn log_failure(op: &str, err: &StoreError) {
        match err {
            StoreError::Unavailable(_) => tracing::warn!(op, error = %err, "store unavailable"),
            _ => tracing::error!(op, error = %err, "store query failed"),
        }
    }
}

#[async_trait]
impl ProfileStore for PostgresStore {
    async fn get_profile(&self, user_id: &str) -> StoreResult<Option<Profile>> {
        let query = format!("SELECT {} FROM profiles WHERE user_id = $1", PROFILE_COLUMNS);

        let row: Option<ProfileRow> = sqlx::query_as(&query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                let err = StoreError::from(e);
                Self::log_failure("get_profile", &err);
                err
            })?;

        row.map(Profile::try_from).transpose()
    }

    async fn candidate_profiles(&self, query: &CandidateQuery) -> StoreResult<Vec<Profile>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM profiles
            WHERE user_id <> $1
              AND is_visible
              AND is_complete
              AND (cardinality($2::text[]) = 0 OR gender = ANY($2::text[]))
              AND ($3::text IS NULL OR lower(geohash) LIKE $3 || '%')
              AND NOT (user_id = ANY($5::text[]))
            ORDER BY updated_at DESC, user_id
            LIMIT $4
            "#,
            PROFILE_COLUMNS
        );

        let genders: Vec<String> = query.genders.iter().map(|g| g.as_str().to_string()).collect();
        let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);

        let rows: Vec<ProfileRow> = sqlx::query_as(&sql)
            .bind(&query.requester_id)
            .bind(&genders)
            .bind(query.geohash_prefix.as_deref())
            .bind(limit)
            .bind(&query.excluded_ids)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                let err = StoreError::from(e);
                Self::log_failure("candidate_profiles", &err);
                err
            })?;

        tracing::debug!(requester_id = %query.requester_id, pulled = rows.len(), "candidate pool loaded");

        rows.into_iter().map(Profile::try_from).collect()
    }

    async fn blocked_user_ids(&self, user_id: &str) -> StoreResult<HashSet<String>> {
        let query = r#"
            SELECT blocked_id AS other_id FROM blocks WHERE blocker_id = $1
            UNION
            SELECT blocker_id AS other_id FROM blocks WHERE blocked_id = $1
        "#;

        let rows = sqlx::query(query).bind(user_id).fetch_all(&self.pool).await?;

        let ids = rows
            .iter()
            .map(|row| row.try_get("other_id"))
            .collect::<Result<HashSet<String>, _>>()?;
        Ok(ids)
    }
}

#[async_trait]
impl InteractionStore for PostgresStore {
    async fn upsert_interaction(&self, interaction: &Interaction) -> StoreResult<()> {
        let query = r#"
            INSERT INTO interactions (actor_id, target_id, kind, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (actor_id, target_id)
            DO UPDATE SET
                kind = EXCLUDED.kind,
                created_at = EXCLUDED.created_at
        "#;

        sqlx::query(query)
            .bind(&interaction.actor_id)
            .bind(&interaction.target_id)
            .bind(KindColumn::from(interaction.kind))
            .bind(interaction.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                let err = StoreError::from(e);
                Self::log_failure("upsert_interaction", &err);
                err
            })?;

        Ok(())
    }

    async fn get_interaction(&self, actor_id: &str, target_id: &str) -> StoreResult<Option<Interaction>> {
        let query = r#"
            SELECT actor_id, target_id, kind, created_at
            FROM interactions
            WHERE actor_id = $1 AND target_id = $2
        "#;

        let row = sqlx::query(query)
            .bind(actor_id)
            .bind(target_id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(Interaction {
            actor_id: row.try_get("actor_id")?,
            target_id: row.try_get("target_id")?,
            kind: row.try_get::<KindColumn, _>("kind")?.into(),
            created_at: row.try_get("created_at")?,
        }))
    }

    async fn interacted_target_ids(&self, actor_id: &str) -> StoreResult<HashSet<String>> {
        let rows = sqlx::query("SELECT target_id FROM interactions WHERE actor_id = $1")
            .bind(actor_id)
            .fetch_all(&self.pool)
            .await?;

        let ids = rows
            .iter()
            .map(|row| row.try_get("target_id"))
            .collect::<Result<HashSet<String>, _>>()?;
        Ok(ids)
    }

    async fn create_match(&self, candidate: &Match) -> StoreResult<MatchInsert> {
        let insert = r#"
            INSERT INTO matches (id, user_low, user_high, state, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_low, user_high) DO NOTHING
            RETURNING id, user_low, user_high, state, created_at
        "#;

        let inserted: Option<MatchRow> = sqlx::query_as(insert)
            .bind(candidate.id)
            .bind(&candidate.user_low)
            .bind(&candidate.user_high)
            .bind(StateColumn::from(candidate.state))
            .bind(candidate.created_at)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(row) = inserted {
            return Ok(MatchInsert::Created(row.into()));
        }

        let pair = CanonicalPair::new(&candidate.user_low, &candidate.user_high);
        match self.find_match(&pair).await? {
            Some(existing) => Ok(MatchInsert::AlreadyExists(existing)),
            None => Err(StoreError::Internal(format!(
                "match for {}/{} conflicted but could not be read back",
                pair.low, pair.high
            ))),
        }
    }

    async fn find_match(&self, pair: &CanonicalPair) -> StoreResult<Option<Match>> {
        let query = r#"
            SELECT id, user_low, user_high, state, created_at
            FROM matches
            WHERE user_low = $1 AND user_high = $2
        "#;

        let row: Option<MatchRow> = sqlx::query_as(query)
            .bind(&pair.low)
            .bind(&pair.high)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Match::from))
    }

    async fn deactivate_match(&self, pair: &CanonicalPair) -> StoreResult<bool> {
        let query = r#"
            UPDATE matches
            SET state = 'unmatched'
            WHERE user_low = $1 AND user_high = $2 AND state = 'active'
        "#;

        let result = sqlx::query(query)
            .bind(&pair.low)
            .bind(&pair.high)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_matches(&self, user_id: &str, offset: usize, limit: usize) -> StoreResult<Vec<Match>> {
        let query = r#"
            SELECT id, user_low, user_high, state, created_at
            FROM matches
            WHERE state = 'active' AND (user_low = $1 OR user_high = $1)
            ORDER BY created_at DESC, id
            LIMIT $2 OFFSET $3
        "#;

        let rows: Vec<MatchRow> = sqlx::query_as(query)
            .bind(user_id)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .bind(i64::try_from(offset).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Match::from).collect())
    }

    async fn add_favorite(&self, favorite: &Favorite) -> StoreResult<bool> {
        let query = r#"
            INSERT INTO favorites (owner_id, target_id, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (owner_id, target_id) DO NOTHING
        "#;

        let result = sqlx::query(query)
            .bind(&favorite.owner_id)
            .bind(&favorite.target_id)
            .bind(favorite.created_at)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove_favorite(&self, owner_id: &str, target_id: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM favorites WHERE owner_id = $1 AND target_id = $2")
            .bind(owner_id)
            .bind(target_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_favorites(&self, owner_id: &str, offset: usize, limit: usize) -> StoreResult<Vec<Favorite>> {
        let query = r#"
            SELECT owner_id, target_id, created_at
            FROM favorites
            WHERE owner_id = $1
            ORDER BY created_at DESC, target_id
            LIMIT $2 OFFSET $3
        "#;

        let rows = sqlx::query(query)
            .bind(owner_id)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .bind(i64::try_from(offset).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

        let favorites = rows
            .iter()
            .map(|row| -> Result<Favorite, sqlx::Error> {
                Ok(Favorite {
                    owner_id: row.try_get("owner_id")?,
                    target_id: row.try_get("target_id")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(favorites)
    }

    async fn interaction_counts(&self, user_id: &str) -> StoreResult<InteractionCounts> {
        let query = r#"
            SELECT
                COUNT(*) FILTER (WHERE kind = 'like') AS likes,
                COUNT(*) FILTER (WHERE kind = 'pass') AS passes,
                COUNT(*) FILTER (WHERE kind = 'superlike') AS superlikes,
                MAX(created_at) AS last_interaction_at,
                (
                    SELECT COUNT(*)
                    FROM matches
                    WHERE state = 'active' AND (user_low = $1 OR user_high = $1)
                ) AS active_matches
            FROM interactions
            WHERE actor_id = $1
        "#;

        let row = sqlx::query(query).bind(user_id).fetch_one(&self.pool).await?;
        let count = |column: &str| -> Result<u64, sqlx::Error> {
            Ok(u64::try_from(row.try_get::<i64, _>(column)?).unwrap_or(0))
        };

        Ok(InteractionCounts {
            likes: count("likes")?,
            passes: count("passes")?,
            superlikes: count("superlikes")?,
            active_matches: count("active_matches")?,
            last_interaction_at: row.try_get("last_interaction_at")?,
        })
    }

    async fn health_check(&self) -> StoreResult<bool> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(true)
    }
}
