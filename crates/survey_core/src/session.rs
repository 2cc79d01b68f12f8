//! Single source of truth for one respondent's walk through the survey.
//!
//! Every transition takes the current state by reference and returns the
//! next one, leaving the input untouched when the transition is rejected.

use chrono::{DateTime, Utc};
use shared::{
    domain::{SectionDraft, SectionId, SubmissionStatus, SurveyVariant},
    protocol::SubmissionPayload,
};
use thiserror::Error;

use crate::editors::EditError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("already on the last section")]
    AtLastSection,
    #[error("already on the first section")]
    AtFirstSection,
    #[error("survey already submitted")]
    Completed,
    #[error("a submission is already in flight")]
    SubmissionInFlight,
    #[error("no submission is in flight")]
    NoSubmissionInFlight,
    #[error("submit is only available on the last section (step {step} of {last})")]
    NotOnLastSection { step: usize, last: usize },
    #[error("section '{0}' is not part of this survey")]
    SectionNotInLayout(SectionId),
    #[error("draft for '{actual}' cannot replace section '{expected}'")]
    DraftMismatch {
        expected: SectionId,
        actual: SectionId,
    },
    #[error(transparent)]
    Edit(#[from] EditError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    variant: SurveyVariant,
    current_step: usize,
    section_data: Vec<SectionDraft>,
    submission_status: SubmissionStatus,
}

impl SessionState {
    pub fn new(variant: SurveyVariant) -> Self {
        Self {
            variant,
            current_step: 0,
            section_data: variant
                .sections()
                .iter()
                .copied()
                .map(SectionDraft::empty)
                .collect(),
            submission_status: SubmissionStatus::NotSubmitted,
        }
    }

    pub fn variant(&self) -> SurveyVariant {
        self.variant
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn section_count(&self) -> usize {
        self.section_data.len()
    }

    pub fn submission_status(&self) -> SubmissionStatus {
        self.submission_status
    }

    /// Terminal once a submission has been confirmed.
    pub fn is_completed(&self) -> bool {
        self.current_step >= self.section_count()
    }

    pub fn active_section(&self) -> Option<SectionId> {
        self.section_data
            .get(self.current_step)
            .map(SectionDraft::section)
    }

    pub fn drafts(&self) -> &[SectionDraft] {
        &self.section_data
    }

    pub fn draft(&self, section: SectionId) -> Option<&SectionDraft> {
        self.section_data
            .iter()
            .find(|draft| draft.section() == section)
    }

    fn in_flight(&self) -> bool {
        self.submission_status == SubmissionStatus::InFlight
    }

    fn last_step(&self) -> usize {
        self.section_count().saturating_sub(1)
    }

    pub fn can_advance(&self) -> bool {
        self.check_advance().is_ok()
    }

    pub fn can_retreat(&self) -> bool {
        self.check_retreat().is_ok()
    }

    pub fn can_submit(&self) -> bool {
        self.check_submit().is_ok()
    }

    fn check_advance(&self) -> Result<(), SessionError> {
        if self.is_completed() {
            return Err(SessionError::Completed);
        }
        if self.in_flight() {
            return Err(SessionError::SubmissionInFlight);
        }
        if self.current_step >= self.last_step() {
            return Err(SessionError::AtLastSection);
        }
        Ok(())
    }

    fn check_retreat(&self) -> Result<(), SessionError> {
        if self.is_completed() {
            return Err(SessionError::Completed);
        }
        if self.in_flight() {
            return Err(SessionError::SubmissionInFlight);
        }
        if self.current_step == 0 {
            return Err(SessionError::AtFirstSection);
        }
        Ok(())
    }

    fn check_submit(&self) -> Result<(), SessionError> {
        if self.is_completed() {
            return Err(SessionError::Completed);
        }
        if self.in_flight() {
            return Err(SessionError::SubmissionInFlight);
        }
        if self.current_step != self.last_step() {
            return Err(SessionError::NotOnLastSection {
                step: self.current_step,
                last: self.last_step(),
            });
        }
        Ok(())
    }

    pub fn advance(&self) -> Result<Self, SessionError> {
        self.check_advance()?;
        Ok(Self {
            current_step: self.current_step + 1,
            ..self.clone()
        })
    }

    pub fn retreat(&self) -> Result<Self, SessionError> {
        self.check_retreat()?;
        Ok(Self {
            current_step: self.current_step - 1,
            ..self.clone()
        })
    }

    /// Replaces the stored draft wholesale; fields are never merged.
    pub fn update_section(&self, section: SectionId, draft: SectionDraft) -> Result<Self, SessionError> {
        if self.is_completed() {
            return Err(SessionError::Completed);
        }
        let index = self
            .section_data
            .iter()
            .position(|existing| existing.section() == section)
            .ok_or(SessionError::SectionNotInLayout(section))?;
        if draft.section() != section {
            return Err(SessionError::DraftMismatch {
                expected: section,
                actual: draft.section(),
            });
        }
        let mut next = self.clone();
        next.section_data[index] = draft;
        Ok(next)
    }

    /// Marks the submission in flight and captures the payload to deliver.
    pub fn begin_submission(
        &self,
        now: DateTime<Utc>,
    ) -> Result<(Self, SubmissionPayload), SessionError> {
        self.check_submit()?;
        let payload = SubmissionPayload::new(
            self.variant,
            self.section_data.clone(),
            now,
        );
        let next = Self {
            submission_status: SubmissionStatus::InFlight,
            ..self.clone()
        };
        Ok((next, payload))
    }

    pub fn finish_submission(&self, delivered: bool) -> Result<Self, SessionError> {
        if !self.in_flight() {
            return Err(SessionError::NoSubmissionInFlight);
        }
        let next = if delivered {
            Self {
                current_step: self.section_count(),
                submission_status: SubmissionStatus::Succeeded,
                ..self.clone()
            }
        } else {
            Self {
                submission_status: SubmissionStatus::Failed,
                ..self.clone()
            }
        };
        Ok(next)
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
