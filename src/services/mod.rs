// Service exports
pub mod cache;
pub mod clock;
pub mod engine;
pub mod maintenance;
pub mod memory;
pub mod postgres;
pub mod rate_limit;
pub mod store;

pub use cache::{CacheKey, CacheStats, TtlCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{EngineCacheStats, EngineCaches, EngineSettings, MatchEngine, SweepReport};
pub use maintenance::spawn_sweeper;
pub use memory::MemoryStore;
pub use postgres::PostgresStore;
pub use rate_limit::{Bucket, BucketLimit, RateLimiter, RateLimits};
pub use store::{InteractionStore, ProfileStore, StoreError, StoreResult};
