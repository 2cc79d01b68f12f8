use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{json, Map, Value};

use crate::domain::{
    Demographics, DepthGuideFeedback, GeneralFeedback, IdentityField, Likert, NasaTlx,
    SectionDraft, SectionId, SessionId, SubmissionStatus, SurveyVariant, SusResponses,
    TlxCondition, NASA_TLX_DIMENSIONS, SUS_QUESTION_COUNT, SUS_STATEMENTS,
};

pub const SUBMIT_SUCCESS_MESSAGE: &str = "Survey submitted successfully!";
pub const SUBMIT_FAILURE_MESSAGE: &str = "Error submitting survey. Please try again.";

/// Everything handed to a sink: every section draft in layout order plus the
/// moment `submit()` built it.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionPayload {
    pub variant: SurveyVariant,
    pub sections: Vec<SectionDraft>,
    pub timestamp: DateTime<Utc>,
}

impl SubmissionPayload {
    pub fn new(variant: SurveyVariant, sections: Vec<SectionDraft>, timestamp: DateTime<Utc>) -> Self {
        Self {
            variant,
            sections,
            timestamp,
        }
    }

    pub fn identity(&self) -> IdentityField {
        self.variant.identity_field()
    }

    pub fn timestamp_iso(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn section(&self, section: SectionId) -> Option<&SectionDraft> {
        self.sections.iter().find(|draft| draft.section() == section)
    }

    /// Nested rendering posted by the webhook relay.
    pub fn to_json(&self) -> serde_json::Result<Value> {
        let mut root = Map::new();
        for draft in &self.sections {
            let mut value = serde_json::to_value(draft)?;
            if let (SectionDraft::Demographics(_), Value::Object(fields)) = (draft, &mut value) {
                if let Some(identity) = fields.remove("initials") {
                    fields.insert(self.identity().key().to_string(), identity);
                }
            }
            root.insert(draft.section().wire_name().to_string(), value);
        }
        root.insert("timestamp".to_string(), Value::String(self.timestamp_iso()));
        Ok(Value::Object(root))
    }

    /// Flattened rendering appended as one spreadsheet row.
    pub fn to_sheet_row(&self) -> SheetRow {
        let mut row = SheetRow::default();
        row.push("timestamp", self.timestamp_iso());
        for draft in &self.sections {
            let prefix = draft.section().wire_name();
            match draft {
                SectionDraft::Demographics(data) => flatten_demographics(&mut row, self.variant, data),
                SectionDraft::Sus(data) => flatten_sus(&mut row, data),
                SectionDraft::NasaTlx(data) => flatten_nasa_tlx(&mut row, data),
                SectionDraft::DepthGuide(data) => flatten_depth_guide(&mut row, prefix, data),
                SectionDraft::GeneralFeedback(data) => {
                    flatten_general_feedback(&mut row, prefix, data)
                }
            }
        }
        row
    }
}

impl Serialize for SubmissionPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

fn rating_cell(rating: Option<Likert>) -> Value {
    json!(rating.map(Likert::value).unwrap_or(0))
}

fn flatten_demographics(row: &mut SheetRow, variant: SurveyVariant, data: &Demographics) {
    row.push(variant.identity_field().key(), data.initials.as_str());
    row.push("specialty", data.specialty.as_str());
    row.push("otherSpecialty", data.other_specialty.as_str());
    row.push("trainingStatus", data.training_status.as_str());
    if variant.records_other_training_status() {
        row.push("otherTrainingStatus", data.other_training_status.as_str());
    }
    row.push("experience", data.experience.as_str());
    row.push("used3DSlicer", data.used_3d_slicer.as_str());
    row.push("slicerFamiliarity", rating_cell(data.slicer_familiarity));
}

fn flatten_sus(row: &mut SheetRow, data: &SusResponses) {
    for (question, answer) in data.iter() {
        let cell = answer
            .map(|rating| rating.value().to_string())
            .unwrap_or_default();
        row.push(format!("sus_q{question}"), cell);
    }
}

fn flatten_nasa_tlx(row: &mut SheetRow, data: &NasaTlx) {
    for (index, score) in data.without_depth_guide.iter().enumerate() {
        row.push(format!("nasaTlx_without_{}", index + 1), *score);
    }
    for (index, score) in data.with_depth_guide.iter().enumerate() {
        row.push(format!("nasaTlx_with_{}", index + 1), *score);
    }
}

fn flatten_depth_guide(row: &mut SheetRow, prefix: &str, data: &DepthGuideFeedback) {
    row.push(format!("{prefix}_usefulness"), rating_cell(data.usefulness));
    row.push(format!("{prefix}_helpWithBLines"), data.help_with_b_lines.as_str());
    row.push(
        format!("{prefix}_moreVariationWithout"),
        data.more_variation_without.as_str(),
    );
    row.push(format!("{prefix}_shouldBeIncluded"), data.should_be_included.as_str());
    row.push(
        format!("{prefix}_additionalFeedback"),
        data.additional_feedback.as_str(),
    );
}

fn flatten_general_feedback(row: &mut SheetRow, prefix: &str, data: &GeneralFeedback) {
    row.push(
        format!("{prefix}_depthGuideUsefulness"),
        rating_cell(data.depth_guide_usefulness),
    );
    row.push(format!("{prefix}_shortcutsHelp"), data.shortcuts_help.as_str());
    row.push(format!("{prefix}_shortcutsComments"), data.shortcuts_comments.as_str());
    row.push(
        format!("{prefix}_iconsLayoutClarity"),
        rating_cell(data.icons_layout_clarity),
    );
    row.push(format!("{prefix}_responsiveness"), rating_cell(data.responsiveness));
    row.push(format!("{prefix}_overallFeedback"), data.overall_feedback.as_str());
}

/// Ordered `(column, cell)` pairs, one per leaf field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetRow {
    cells: Vec<(String, Value)>,
}

impl SheetRow {
    pub fn push(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.cells.push((column.into(), value.into()));
    }

    pub fn header(&self) -> Vec<String> {
        self.cells.iter().map(|(column, _)| column.clone()).collect()
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Lays the cells out under an existing header. Header columns this row
    /// has no value for stay empty; returns the columns the header lacks.
    pub fn align_to(&self, header: &[String]) -> (Vec<Value>, Vec<String>) {
        let values = header
            .iter()
            .map(|column| {
                self.get(column)
                    .cloned()
                    .unwrap_or_else(|| Value::String(String::new()))
            })
            .collect();
        let missing = self
            .cells
            .iter()
            .filter(|(column, _)| !header.contains(column))
            .map(|(column, _)| column.clone())
            .collect();
        (values, missing)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Success,
    Error,
    Info,
}

/// Non-blocking user notification attached to a session response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionEntry {
    pub section: SectionId,
    pub title: &'static str,
    pub draft: SectionDraft,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session_id: SessionId,
    pub variant: SurveyVariant,
    pub current_step: usize,
    pub section_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_section: Option<SectionId>,
    pub completed: bool,
    pub submission_status: SubmissionStatus,
    pub can_advance: bool,
    pub can_retreat: bool,
    pub can_submit: bool,
    pub sections: Vec<SectionEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<Notice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionSummary {
    pub section: SectionId,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyLayoutView {
    pub variant: SurveyVariant,
    pub identity_field: IdentityField,
    pub sections: Vec<SectionSummary>,
    pub sus_statements: Vec<String>,
    pub nasa_tlx_dimensions: Vec<String>,
}

impl SurveyLayoutView {
    pub fn for_variant(variant: SurveyVariant) -> Self {
        Self {
            variant,
            identity_field: variant.identity_field(),
            sections: variant
                .sections()
                .iter()
                .map(|section| SectionSummary {
                    section: *section,
                    title: section.title().to_string(),
                })
                .collect(),
            sus_statements: SUS_STATEMENTS.iter().map(|s| s.to_string()).collect(),
            nasa_tlx_dimensions: NASA_TLX_DIMENSIONS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Single field change sent by a front-end widget. Slider fields carry the
/// widget's zero-based position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "camelCase")]
pub enum DemographicsEdit {
    Initials(String),
    Specialty(String),
    OtherSpecialty(String),
    TrainingStatus(String),
    OtherTrainingStatus(String),
    Experience(String),
    #[serde(rename = "used3DSlicer")]
    Used3DSlicer(String),
    SlicerFamiliarity(u8),
}

/// `question` is 1-based; `rating` is the radio value 1..5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SusEdit {
    pub question: usize,
    pub rating: u8,
}

impl SusEdit {
    pub fn question_in_range(&self) -> bool {
        (1..=SUS_QUESTION_COUNT).contains(&self.question)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NasaTlxEdit {
    pub condition: TlxCondition,
    pub dimension: usize,
    pub value: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "camelCase")]
pub enum DepthGuideEdit {
    Usefulness(u8),
    HelpWithBLines(String),
    MoreVariationWithout(String),
    ShouldBeIncluded(String),
    AdditionalFeedback(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "camelCase")]
pub enum GeneralFeedbackEdit {
    DepthGuideUsefulness(u8),
    ShortcutsHelp(String),
    ShortcutsComments(String),
    IconsLayoutClarity(u8),
    Responsiveness(u8),
    OverallFeedback(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SectionEdit {
    Demographics(DemographicsEdit),
    Sus(SusEdit),
    NasaTlx(NasaTlxEdit),
    DepthGuide(DepthGuideEdit),
    GeneralFeedback(GeneralFeedbackEdit),
}

impl SectionEdit {
    pub fn section(&self) -> SectionId {
        match self {
            Self::Demographics(_) => SectionId::Demographics,
            Self::Sus(_) => SectionId::Sus,
            Self::NasaTlx(_) => SectionId::NasaTlx,
            Self::DepthGuide(_) => SectionId::DepthGuide,
            Self::GeneralFeedback(_) => SectionId::GeneralFeedback,
        }
    }

    pub fn from_json(section: SectionId, value: Value) -> serde_json::Result<Self> {
        Ok(match section {
            SectionId::Demographics => Self::Demographics(serde_json::from_value(value)?),
            SectionId::Sus => Self::Sus(serde_json::from_value(value)?),
            SectionId::NasaTlx => Self::NasaTlx(serde_json::from_value(value)?),
            SectionId::DepthGuide => Self::DepthGuide(serde_json::from_value(value)?),
            SectionId::GeneralFeedback => Self::GeneralFeedback(serde_json::from_value(value)?),
        })
    }
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
