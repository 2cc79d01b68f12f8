use std::sync::Arc;

use chrono::Utc;
use shared::{
    domain::{SectionDraft, SectionId, SessionId, SurveyVariant},
    protocol::{
        Notice, SectionEdit, SectionEntry, SessionView, SubmissionPayload,
        SUBMIT_FAILURE_MESSAGE, SUBMIT_SUCCESS_MESSAGE,
    },
};
use submission_gateway::SubmissionGateway;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::{
    editors,
    session::{SessionError, SessionState},
};

#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub delivered: bool,
    pub view: SessionView,
}

/// Owns one session's state. Each operation holds the lock only long enough
/// to compute the next state; the gateway call runs unlocked, guarded by the
/// in-flight status instead. Delivery runs on its own task so a dropped
/// caller cannot leave the session in flight.
pub struct SessionController {
    id: SessionId,
    state: Arc<Mutex<SessionState>>,
    gateway: SubmissionGateway,
}

impl SessionController {
    pub fn new(variant: SurveyVariant, gateway: SubmissionGateway) -> Self {
        Self::with_id(SessionId::random(), variant, gateway)
    }

    pub fn with_id(id: SessionId, variant: SurveyVariant, gateway: SubmissionGateway) -> Self {
        Self {
            id,
            state: Arc::new(Mutex::new(SessionState::new(variant))),
            gateway,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub async fn snapshot(&self) -> SessionState {
        self.state.lock().await.clone()
    }

    pub async fn view(&self) -> SessionView {
        let state = self.state.lock().await;
        render(self.id, &state, None)
    }

    pub async fn advance(&self) -> Result<SessionView, SessionError> {
        self.transition("advance", SessionState::advance).await
    }

    pub async fn retreat(&self) -> Result<SessionView, SessionError> {
        self.transition("retreat", SessionState::retreat).await
    }

    pub async fn update_section(
        &self,
        section: SectionId,
        draft: SectionDraft,
    ) -> Result<SessionView, SessionError> {
        self.transition("update_section", |state| {
            state.update_section(section, draft)
        })
        .await
    }

    /// Routes a single field change through the section's editor and stores
    /// the draft it reports.
    pub async fn apply_edit(
        &self,
        section: SectionId,
        edit: SectionEdit,
    ) -> Result<SessionView, SessionError> {
        self.transition("apply_edit", |state| {
            let current = state
                .draft(section)
                .ok_or(SessionError::SectionNotInLayout(section))?;
            let updated = editors::apply_edit(current, edit)?;
            state.update_section(section, updated)
        })
        .await
    }

    pub async fn submit(&self) -> Result<SubmitOutcome, SessionError> {
        let payload = {
            let mut state = self.state.lock().await;
            let (next, payload) = state.begin_submission(Utc::now()).map_err(|err| {
                warn!(session_id = %self.id, step = state.current_step(), error = %err, "submit rejected");
                err
            })?;
            *state = next;
            payload
        };
        info!(
            session_id = %self.id,
            sink = self.gateway.sink_name(),
            timestamp = %payload.timestamp_iso(),
            "submitting survey"
        );

        let delivery = tokio::spawn(deliver(
            self.id,
            Arc::clone(&self.state),
            self.gateway.clone(),
            payload,
        ));
        match delivery.await {
            Ok(outcome) => outcome,
            Err(join_error) => {
                error!(session_id = %self.id, error = %join_error, "submission task panicked");
                let mut state = self.state.lock().await;
                *state = state.finish_submission(false)?;
                Ok(SubmitOutcome {
                    delivered: false,
                    view: render(self.id, &state, Some(Notice::error(SUBMIT_FAILURE_MESSAGE))),
                })
            }
        }
    }

    async fn transition(
        &self,
        action: &'static str,
        apply: impl FnOnce(&SessionState) -> Result<SessionState, SessionError>,
    ) -> Result<SessionView, SessionError> {
        let mut state = self.state.lock().await;
        match apply(&state) {
            Ok(next) => {
                *state = next;
                info!(session_id = %self.id, step = state.current_step(), action, "session updated");
                Ok(render(self.id, &state, None))
            }
            Err(err) => {
                warn!(session_id = %self.id, step = state.current_step(), action, error = %err, "transition rejected");
                Err(err)
            }
        }
    }
}

async fn deliver(
    id: SessionId,
    state: Arc<Mutex<SessionState>>,
    gateway: SubmissionGateway,
    payload: SubmissionPayload,
) -> Result<SubmitOutcome, SessionError> {
    let delivered = gateway.submit(&payload).await.is_ok();

    let mut state = state.lock().await;
    *state = state.finish_submission(delivered)?;
    let notice = if delivered {
        info!(session_id = %id, "survey submission completed");
        Notice::success(SUBMIT_SUCCESS_MESSAGE)
    } else {
        warn!(session_id = %id, "survey submission failed; session kept for retry");
        Notice::error(SUBMIT_FAILURE_MESSAGE)
    };
    Ok(SubmitOutcome {
        delivered,
        view: render(id, &state, Some(notice)),
    })
}

fn render(id: SessionId, state: &SessionState, notice: Option<Notice>) -> SessionView {
    SessionView {
        session_id: id,
        variant: state.variant(),
        current_step: state.current_step(),
        section_count: state.section_count(),
        active_section: state.active_section(),
        completed: state.is_completed(),
        submission_status: state.submission_status(),
        can_advance: state.can_advance(),
        can_retreat: state.can_retreat(),
        can_submit: state.can_submit(),
        sections: state
            .drafts()
            .iter()
            .map(|draft| SectionEntry {
                section: draft.section(),
                title: draft.section().title(),
                draft: draft.clone(),
            })
            .collect(),
        notice,
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
