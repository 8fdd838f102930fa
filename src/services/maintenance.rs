use crate::services::engine::MatchEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Run [`MatchEngine::sweep`] every `every` on a background task
///
/// The first sweep happens one full interval after spawning. Abort the
/// returned handle to stop it.
pub fn spawn_sweeper(engine: Arc<MatchEngine>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(interval_secs = every.as_secs(), "cache sweeper started");

        loop {
            ticker.tick().await;
            let report = engine.sweep().await;

            if report.expired_pools + report.expired_profiles + report.pruned_windows > 0 {
                tracing::info!(
                    expired_pools = report.expired_pools,
                    expired_profiles = report.expired_profiles,
                    pruned_windows = report.pruned_windows,
                    "expired state swept"
                );
            }
        }
    })
}
