pub mod artifacts;
pub mod orchestrator;
pub mod redemption;
pub mod retry;
pub mod tickets;

pub use artifacts::{
    run_artifact_worker, ArtifactDispatcher, ArtifactService, DispatchError, InlineDispatcher, QueuedDispatcher,
    RenderedCode,
};
pub use orchestrator::PurchaseOrchestrator;
pub use redemption::{RedemptionService, TicketRef};
pub use retry::RetryPolicy;
pub use tickets::TicketService;
