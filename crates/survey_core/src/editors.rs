//! Per-section editors. Each one owns a copy of its section's draft and
//! reports the whole updated draft through its callback after every change.

use shared::{
    domain::{
        choices, Demographics, DepthGuideFeedback, GeneralFeedback, Likert, NasaTlx,
        RatingOutOfRange, SectionDraft, SectionId, SusResponses, TlxCondition,
        NASA_TLX_DIMENSION_COUNT, SUS_QUESTION_COUNT, WORKLOAD_MAX,
    },
    protocol::{DemographicsEdit, DepthGuideEdit, GeneralFeedbackEdit, NasaTlxEdit, SectionEdit, SusEdit},
};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error(transparent)]
    Rating(#[from] RatingOutOfRange),
    #[error("SUS question {0} is out of range (1..=10)")]
    QuestionOutOfRange(usize),
    #[error("NASA-TLX dimension {0} is out of range (0..6)")]
    DimensionOutOfRange(usize),
    #[error("edit for '{edit}' cannot apply to section '{section}'")]
    SectionMismatch { section: SectionId, edit: SectionId },
}

pub struct SectionEditor<D, F> {
    draft: D,
    on_change: F,
}

pub type DemographicsEditor<F> = SectionEditor<Demographics, F>;
pub type SusEditor<F> = SectionEditor<SusResponses, F>;
pub type NasaTlxEditor<F> = SectionEditor<NasaTlx, F>;
pub type DepthGuideEditor<F> = SectionEditor<DepthGuideFeedback, F>;
pub type GeneralFeedbackEditor<F> = SectionEditor<GeneralFeedback, F>;

impl<D: Clone, F: FnMut(D)> SectionEditor<D, F> {
    pub fn new(snapshot: &D, on_change: F) -> Self {
        Self {
            draft: snapshot.clone(),
            on_change,
        }
    }

    pub fn draft(&self) -> &D {
        &self.draft
    }

    fn mutate(&mut self, change: impl FnOnce(&mut D)) {
        change(&mut self.draft);
        (self.on_change)(self.draft.clone());
    }
}

impl<F: FnMut(Demographics)> SectionEditor<Demographics, F> {
    pub fn set_initials(&mut self, value: impl Into<String>) {
        let value = value.into();
        self.mutate(|d| d.initials = value);
    }

    pub fn set_specialty(&mut self, value: impl Into<String>) {
        let value = value.into();
        self.mutate(|d| {
            if value != choices::OTHER {
                d.other_specialty.clear();
            }
            d.specialty = value;
        });
    }

    /// Ignored unless the specialty is "Other".
    pub fn set_other_specialty(&mut self, value: impl Into<String>) {
        let value = value.into();
        self.mutate(|d| {
            if d.specialty == choices::OTHER {
                d.other_specialty = value;
            }
        });
    }

    pub fn set_training_status(&mut self, value: impl Into<String>) {
        let value = value.into();
        self.mutate(|d| {
            if value != choices::OTHER {
                d.other_training_status.clear();
            }
            d.training_status = value;
        });
    }

    /// Ignored unless the training status is "Other".
    pub fn set_other_training_status(&mut self, value: impl Into<String>) {
        let value = value.into();
        self.mutate(|d| {
            if d.training_status == choices::OTHER {
                d.other_training_status = value;
            }
        });
    }

    pub fn set_experience(&mut self, value: impl Into<String>) {
        let value = value.into();
        self.mutate(|d| d.experience = value);
    }

    pub fn set_used_3d_slicer(&mut self, value: impl Into<String>) {
        let value = value.into();
        self.mutate(|d| {
            if value != choices::YES {
                d.slicer_familiarity = None;
            }
            d.used_3d_slicer = value;
        });
    }

    /// Takes the slider's zero-based position. Ignored unless the respondent
    /// has used 3D Slicer.
    pub fn set_slicer_familiarity_position(&mut self, position: u8) -> Result<(), EditError> {
        let rating = Likert::from_slider_position(position)?;
        self.mutate(|d| {
            if d.used_3d_slicer == choices::YES {
                d.slicer_familiarity = Some(rating);
            }
        });
        Ok(())
    }

    pub fn apply(&mut self, edit: DemographicsEdit) -> Result<(), EditError> {
        match edit {
            DemographicsEdit::Initials(v) => self.set_initials(v),
            DemographicsEdit::Specialty(v) => self.set_specialty(v),
            DemographicsEdit::OtherSpecialty(v) => self.set_other_specialty(v),
            DemographicsEdit::TrainingStatus(v) => self.set_training_status(v),
            DemographicsEdit::OtherTrainingStatus(v) => self.set_other_training_status(v),
            DemographicsEdit::Experience(v) => self.set_experience(v),
            DemographicsEdit::Used3DSlicer(v) => self.set_used_3d_slicer(v),
            DemographicsEdit::SlicerFamiliarity(position) => {
                self.set_slicer_familiarity_position(position)?
            }
        }
        Ok(())
    }
}

impl<F: FnMut(SusResponses)> SectionEditor<SusResponses, F> {
    /// `question` is 1-based; `rating` is the radio value itself.
    pub fn set_answer(&mut self, question: usize, rating: u8) -> Result<(), EditError> {
        if !(1..=SUS_QUESTION_COUNT).contains(&question) {
            return Err(EditError::QuestionOutOfRange(question));
        }
        let rating = Likert::new(rating)?;
        self.mutate(|d| {
            d.set(question, rating);
        });
        Ok(())
    }

    pub fn apply(&mut self, edit: SusEdit) -> Result<(), EditError> {
        self.set_answer(edit.question, edit.rating)
    }
}

impl<F: FnMut(NasaTlx)> SectionEditor<NasaTlx, F> {
    /// `dimension` is 0-based. Scores above the scale maximum are clamped.
    pub fn set_score(
        &mut self,
        condition: TlxCondition,
        dimension: usize,
        value: u8,
    ) -> Result<(), EditError> {
        if dimension >= NASA_TLX_DIMENSION_COUNT {
            return Err(EditError::DimensionOutOfRange(dimension));
        }
        self.mutate(|d| d.scores_mut(condition)[dimension] = value.min(WORKLOAD_MAX));
        Ok(())
    }

    pub fn apply(&mut self, edit: NasaTlxEdit) -> Result<(), EditError> {
        self.set_score(edit.condition, edit.dimension, edit.value)
    }
}

impl<F: FnMut(DepthGuideFeedback)> SectionEditor<DepthGuideFeedback, F> {
    pub fn set_usefulness_position(&mut self, position: u8) -> Result<(), EditError> {
        let rating = Likert::from_slider_position(position)?;
        self.mutate(|d| d.usefulness = Some(rating));
        Ok(())
    }

    pub fn apply(&mut self, edit: DepthGuideEdit) -> Result<(), EditError> {
        match edit {
            DepthGuideEdit::Usefulness(position) => self.set_usefulness_position(position)?,
            DepthGuideEdit::HelpWithBLines(v) => self.mutate(|d| d.help_with_b_lines = v),
            DepthGuideEdit::MoreVariationWithout(v) => {
                self.mutate(|d| d.more_variation_without = v)
            }
            DepthGuideEdit::ShouldBeIncluded(v) => self.mutate(|d| d.should_be_included = v),
            DepthGuideEdit::AdditionalFeedback(v) => self.mutate(|d| d.additional_feedback = v),
        }
        Ok(())
    }
}

impl<F: FnMut(GeneralFeedback)> SectionEditor<GeneralFeedback, F> {
    pub fn apply(&mut self, edit: GeneralFeedbackEdit) -> Result<(), EditError> {
        match edit {
            GeneralFeedbackEdit::DepthGuideUsefulness(position) => {
                let rating = Likert::from_slider_position(position)?;
                self.mutate(|d| d.depth_guide_usefulness = Some(rating));
            }
            GeneralFeedbackEdit::IconsLayoutClarity(position) => {
                let rating = Likert::from_slider_position(position)?;
                self.mutate(|d| d.icons_layout_clarity = Some(rating));
            }
            GeneralFeedbackEdit::Responsiveness(position) => {
                let rating = Likert::from_slider_position(position)?;
                self.mutate(|d| d.responsiveness = Some(rating));
            }
            GeneralFeedbackEdit::ShortcutsHelp(v) => self.mutate(|d| d.shortcuts_help = v),
            GeneralFeedbackEdit::ShortcutsComments(v) => self.mutate(|d| d.shortcuts_comments = v),
            GeneralFeedbackEdit::OverallFeedback(v) => self.mutate(|d| d.overall_feedback = v),
        }
        Ok(())
    }
}

/// Runs one edit through the matching editor and returns the draft it
/// reported. The snapshot is left untouched.
pub fn apply_edit(snapshot: &SectionDraft, edit: SectionEdit) -> Result<SectionDraft, EditError> {
    let mut reported = None;
    match (snapshot, edit) {
        (SectionDraft::Demographics(draft), SectionEdit::Demographics(edit)) => {
            SectionEditor::new(draft, |d| reported = Some(SectionDraft::Demographics(d)))
                .apply(edit)?
        }
        (SectionDraft::Sus(draft), SectionEdit::Sus(edit)) => {
            SectionEditor::new(draft, |d| reported = Some(SectionDraft::Sus(d))).apply(edit)?
        }
        (SectionDraft::NasaTlx(draft), SectionEdit::NasaTlx(edit)) => {
            SectionEditor::new(draft, |d| reported = Some(SectionDraft::NasaTlx(d))).apply(edit)?
        }
        (SectionDraft::DepthGuide(draft), SectionEdit::DepthGuide(edit)) => {
            SectionEditor::new(draft, |d| reported = Some(SectionDraft::DepthGuide(d)))
                .apply(edit)?
        }
        (SectionDraft::GeneralFeedback(draft), SectionEdit::GeneralFeedback(edit)) => {
            SectionEditor::new(draft, |d| reported = Some(SectionDraft::GeneralFeedback(d)))
                .apply(edit)?
        }
        (draft, edit) => {
            return Err(EditError::SectionMismatch {
                section: draft.section(),
                edit: edit.section(),
            })
        }
    }
    Ok(reported.unwrap_or_else(|| snapshot.clone()))
}

#[cfg(test)]
#[path = "tests/editors_tests.rs"]
mod tests;
