use server_api::ApiContext;
use shared::protocol::CaseEvent;
use tokio::sync::broadcast;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) api: ApiContext,
    pub(crate) events: broadcast::Sender<CaseEvent>,
}

impl AppState {
    /// Fans a case change out to every connected dashboard.
    pub(crate) fn publish(&self, event: CaseEvent) {
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }
}
