use std::{collections::HashMap, sync::Arc};

use shared::domain::{SessionId, SurveyVariant};
use submission_gateway::SubmissionGateway;
use survey_core::SessionController;
use tokio::sync::RwLock;

/// In-memory session registry. Sessions live until submitted or the
/// process exits; at most `max_sessions` are open at once.
#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) variant: SurveyVariant,
    pub(crate) gateway: SubmissionGateway,
    max_sessions: usize,
    sessions: Arc<RwLock<HashMap<SessionId, Arc<SessionController>>>>,
}

impl AppState {
    pub(crate) fn new(variant: SurveyVariant, gateway: SubmissionGateway, max_sessions: usize) -> Self {
        Self {
            variant,
            gateway,
            max_sessions,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// `None` when the registry is full.
    pub(crate) async fn open_session(&self) -> Option<Arc<SessionController>> {
        let mut sessions = self.sessions.write().await;
        if sessions.len() >= self.max_sessions {
            return None;
        }
        let controller = Arc::new(SessionController::new(self.variant, self.gateway.clone()));
        sessions.insert(controller.id(), controller.clone());
        Some(controller)
    }

    pub(crate) fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    pub(crate) async fn session(&self, id: SessionId) -> Option<Arc<SessionController>> {
        self.sessions.read().await.get(&id).cloned()
    }

    pub(crate) async fn close_session(&self, id: SessionId) {
        self.sessions.write().await.remove(&id);
    }

    pub(crate) async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
