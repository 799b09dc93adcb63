use std::sync::Arc;
use std::time::Duration;

use boxoffice_order::{run_artifact_worker, ArtifactService, QueuedDispatcher, RetryPolicy};
use boxoffice_store::app_config::ArtifactConfig;
use tokio::task::JoinHandle;
use tracing::info;

/// Spawn the redemption code worker and return the dispatcher that feeds it.
pub fn start_artifact_worker(
    service: Arc<ArtifactService>,
    config: &ArtifactConfig,
) -> (QueuedDispatcher, JoinHandle<()>) {
    let (dispatcher, events) = QueuedDispatcher::channel(config.queue_capacity);
    let retry = RetryPolicy::new(config.max_attempts, Duration::from_millis(config.retry_backoff_ms));

    info!("Artifact queue capacity {}, {} attempts per ticket", config.queue_capacity, retry.max_attempts);
    let handle = tokio::spawn(run_artifact_worker(service, events, retry));

    (dispatcher, handle)
}
