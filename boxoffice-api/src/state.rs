use std::sync::Arc;

use boxoffice_catalog::InventoryService;
use boxoffice_core::render::CodeRenderer;
use boxoffice_core::repository::{InventoryLedger, RedemptionCodeRepository, TicketRepository, UserDirectory};
use boxoffice_order::{
    ArtifactDispatcher, ArtifactService, PurchaseOrchestrator, RedemptionService, RetryPolicy, TicketService,
};

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserDirectory>,
    pub inventory: Arc<InventoryService>,
    pub purchases: Arc<PurchaseOrchestrator>,
    pub redemption: Arc<RedemptionService>,
    pub tickets: Arc<TicketService>,
    pub artifacts: Arc<ArtifactService>,
    pub auth: AuthConfig,
}

impl AppState {
    /// Wire every service over one store.
    pub fn new<S>(
        store: S,
        artifacts: Arc<ArtifactService>,
        dispatcher: Arc<dyn ArtifactDispatcher>,
        purchase_retry: RetryPolicy,
        auth: AuthConfig,
    ) -> Self
    where
        S: UserDirectory + InventoryLedger + TicketRepository + Clone + 'static,
    {
        let purchases = PurchaseOrchestrator::new(Arc::new(store.clone()), Arc::new(store.clone()), dispatcher)
            .with_retry(purchase_retry);

        Self {
            users: Arc::new(store.clone()),
            inventory: Arc::new(InventoryService::new(Arc::new(store.clone()))),
            purchases: Arc::new(purchases),
            redemption: Arc::new(RedemptionService::new(Arc::new(store.clone()))),
            tickets: Arc::new(TicketService::new(Arc::new(store))),
            artifacts,
            auth,
        }
    }
}

/// Code issuing and rendering over `store`.
pub fn artifact_service<S>(store: S, renderer: Arc<dyn CodeRenderer>) -> Arc<ArtifactService>
where
    S: TicketRepository + RedemptionCodeRepository + Clone + 'static,
{
    Arc::new(ArtifactService::new(Arc::new(store.clone()), Arc::new(store), renderer))
}
