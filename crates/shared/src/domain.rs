use std::fmt;

use serde::{
    de::{self, MapAccess, Visitor},
    ser::SerializeMap,
    Deserialize, Deserializer, Serialize, Serializer,
};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SectionId {
    Demographics,
    Sus,
    NasaTlx,
    DepthGuide,
    GeneralFeedback,
}

impl SectionId {
    /// Key used for this section in submitted payloads and flattened column prefixes.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Demographics => "demographics",
            Self::Sus => "sus",
            Self::NasaTlx => "nasaTlx",
            Self::DepthGuide => "depthGuide",
            Self::GeneralFeedback => "generalFeedback",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Demographics => "Demographics",
            Self::Sus => "System Usability Scale",
            Self::NasaTlx => "NASA-TLX",
            Self::DepthGuide => "Depth Guide",
            Self::GeneralFeedback => "General Feedback",
        }
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Deployment-time schema choice: which feedback section closes the survey
/// and which key carries the respondent identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurveyVariant {
    DepthGuide,
    #[default]
    GeneralFeedback,
}

impl SurveyVariant {
    pub fn sections(self) -> &'static [SectionId] {
        match self {
            Self::DepthGuide => &[
                SectionId::Demographics,
                SectionId::Sus,
                SectionId::NasaTlx,
                SectionId::DepthGuide,
            ],
            Self::GeneralFeedback => &[
                SectionId::Demographics,
                SectionId::Sus,
                SectionId::NasaTlx,
                SectionId::GeneralFeedback,
            ],
        }
    }

    pub fn identity_field(self) -> IdentityField {
        match self {
            Self::DepthGuide => IdentityField::Name,
            Self::GeneralFeedback => IdentityField::Initials,
        }
    }

    /// The depth-guide sheet has no free-text training status column.
    pub fn records_other_training_status(self) -> bool {
        matches!(self, Self::GeneralFeedback)
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "depth_guide" | "depthguide" => Some(Self::DepthGuide),
            "general_feedback" | "generalfeedback" => Some(Self::GeneralFeedback),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityField {
    Name,
    Initials,
}

impl IdentityField {
    pub fn key(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Initials => "initials",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    #[default]
    NotSubmitted,
    InFlight,
    Succeeded,
    Failed,
}

pub const LIKERT_MIN: u8 = 1;
pub const LIKERT_MAX: u8 = 5;
pub const WORKLOAD_MAX: u8 = 20;
pub const SUS_QUESTION_COUNT: usize = 10;
pub const NASA_TLX_DIMENSION_COUNT: usize = 6;

pub const SUS_STATEMENTS: [&str; SUS_QUESTION_COUNT] = [
    "I think that I would like to use this system frequently.",
    "I found the system unnecessarily complex.",
    "I thought the system was easy to use.",
    "I think that I would need the support of a technical person to be able to use this system.",
    "I found the various functions in this system were well integrated.",
    "I thought there was too much inconsistency in this system.",
    "I would imagine that most people would learn to use this system very quickly.",
    "I found the system very cumbersome to use.",
    "I felt very confident using the system.",
    "I needed to learn a lot of things before I could get going with this system.",
];

pub const NASA_TLX_DIMENSIONS: [&str; NASA_TLX_DIMENSION_COUNT] = [
    "Mental demand",
    "Interaction demand",
    "Temporal demand",
    "Performance",
    "Effort",
    "Frustration",
];

pub mod choices {
    pub const OTHER: &str = "Other";
    pub const YES: &str = "yes";
    pub const NO: &str = "no";

    pub const SPECIALTIES: [&str; 4] = ["Radiology", "Cardiology", "Emergency Medicine", OTHER];
    pub const TRAINING_STATUSES: [&str; 5] =
        ["Medical Student", "Resident", "Fellow", "Attending", OTHER];
    pub const EXPERIENCE_LEVELS: [&str; 3] = ["not_familiar", "minimal", "familiar"];
    pub const SHORTCUT_EFFECTS: [&str; 4] = ["faster", "same_speed", "slower", "didnt_use"];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("rating {value} is outside {min}..={max}")]
pub struct RatingOutOfRange {
    pub value: u8,
    pub min: u8,
    pub max: u8,
}

/// A 1–5 agreement or quality rating. Always holds the externally meaningful
/// value; zero-based slider positions are converted at the editor boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Likert(u8);

impl Likert {
    pub fn new(value: u8) -> Result<Self, RatingOutOfRange> {
        if (LIKERT_MIN..=LIKERT_MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(RatingOutOfRange {
                value,
                min: LIKERT_MIN,
                max: LIKERT_MAX,
            })
        }
    }

    pub fn from_slider_position(position: u8) -> Result<Self, RatingOutOfRange> {
        Self::new(position.saturating_add(1))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn slider_position(self) -> u8 {
        self.0 - LIKERT_MIN
    }
}

impl TryFrom<u8> for Likert {
    type Error = RatingOutOfRange;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Likert> for u8 {
    fn from(value: Likert) -> Self {
        value.0
    }
}

/// Unanswered ratings travel as `0`, matching the sheet's numeric columns.
mod unset_as_zero {
    use super::Likert;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Likert>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8((*value).map(Likert::value).unwrap_or(0))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Likert>, D::Error> {
        match Option::<u8>::deserialize(deserializer)? {
            None | Some(0) => Ok(None),
            Some(raw) => Likert::new(raw).map(Some).map_err(de::Error::custom),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Demographics {
    #[serde(alias = "name")]
    pub initials: String,
    pub specialty: String,
    pub other_specialty: String,
    pub training_status: String,
    pub other_training_status: String,
    pub experience: String,
    #[serde(rename = "used3DSlicer")]
    pub used_3d_slicer: String,
    #[serde(with = "unset_as_zero")]
    pub slicer_familiarity: Option<Likert>,
}

/// SUS answers keyed `q1..q10`; unanswered statements are omitted on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SusResponses {
    answers: [Option<Likert>; SUS_QUESTION_COUNT],
}

impl SusResponses {
    /// `question` is 1-based, as in `q1..q10`.
    pub fn get(&self, question: usize) -> Option<Likert> {
        question
            .checked_sub(1)
            .and_then(|index| self.answers.get(index).copied().flatten())
    }

    pub fn set(&mut self, question: usize, rating: Likert) -> bool {
        match question
            .checked_sub(1)
            .and_then(|index| self.answers.get_mut(index))
        {
            Some(slot) => {
                *slot = Some(rating);
                true
            }
            None => false,
        }
    }

    pub fn answered(&self) -> usize {
        self.answers.iter().filter(|answer| answer.is_some()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, Option<Likert>)> + '_ {
        self.answers
            .iter()
            .enumerate()
            .map(|(index, answer)| (index + 1, *answer))
    }
}

impl Serialize for SusResponses {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.answered()))?;
        for (question, answer) in self.iter() {
            if let Some(rating) = answer {
                map.serialize_entry(&format!("q{question}"), &rating.value().to_string())?;
            }
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for SusResponses {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(SusVisitor)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SusAnswerRepr {
    Text(String),
    Number(u8),
}

struct SusVisitor;

impl<'de> Visitor<'de> for SusVisitor {
    type Value = SusResponses;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of q1..q10 to ratings 1..5")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut responses = SusResponses::default();
        while let Some(key) = access.next_key::<String>()? {
            let repr: SusAnswerRepr = access.next_value()?;
            let Some(question) = key.strip_prefix('q').and_then(|n| n.parse::<usize>().ok()) else {
                continue;
            };
            let raw = match repr {
                SusAnswerRepr::Number(value) => value,
                SusAnswerRepr::Text(text) if text.trim().is_empty() => continue,
                SusAnswerRepr::Text(text) => text
                    .trim()
                    .parse::<u8>()
                    .map_err(|_| de::Error::custom(format!("invalid SUS rating '{text}'")))?,
            };
            let rating = Likert::new(raw).map_err(de::Error::custom)?;
            if !responses.set(question, rating) {
                return Err(de::Error::custom(format!("unknown SUS question '{key}'")));
            }
        }
        Ok(responses)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TlxCondition {
    WithDepthGuide,
    WithoutDepthGuide,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NasaTlx {
    pub with_depth_guide: [u8; NASA_TLX_DIMENSION_COUNT],
    pub without_depth_guide: [u8; NASA_TLX_DIMENSION_COUNT],
}

impl NasaTlx {
    pub fn scores(&self, condition: TlxCondition) -> &[u8; NASA_TLX_DIMENSION_COUNT] {
        match condition {
            TlxCondition::WithDepthGuide => &self.with_depth_guide,
            TlxCondition::WithoutDepthGuide => &self.without_depth_guide,
        }
    }

    pub fn scores_mut(&mut self, condition: TlxCondition) -> &mut [u8; NASA_TLX_DIMENSION_COUNT] {
        match condition {
            TlxCondition::WithDepthGuide => &mut self.with_depth_guide,
            TlxCondition::WithoutDepthGuide => &mut self.without_depth_guide,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DepthGuideFeedback {
    #[serde(with = "unset_as_zero")]
    pub usefulness: Option<Likert>,
    pub help_with_b_lines: String,
    pub more_variation_without: String,
    pub should_be_included: String,
    pub additional_feedback: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneralFeedback {
    #[serde(with = "unset_as_zero")]
    pub depth_guide_usefulness: Option<Likert>,
    pub shortcuts_help: String,
    pub shortcuts_comments: String,
    #[serde(with = "unset_as_zero")]
    pub icons_layout_clarity: Option<Likert>,
    #[serde(with = "unset_as_zero")]
    pub responsiveness: Option<Likert>,
    pub overall_feedback: String,
}

/// One section's slice of the session. The variant always matches the
/// section it is stored under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SectionDraft {
    Demographics(Demographics),
    Sus(SusResponses),
    NasaTlx(NasaTlx),
    DepthGuide(DepthGuideFeedback),
    GeneralFeedback(GeneralFeedback),
}

impl SectionDraft {
    pub fn empty(section: SectionId) -> Self {
        match section {
            SectionId::Demographics => Self::Demographics(Demographics::default()),
            SectionId::Sus => Self::Sus(SusResponses::default()),
            SectionId::NasaTlx => Self::NasaTlx(NasaTlx::default()),
            SectionId::DepthGuide => Self::DepthGuide(DepthGuideFeedback::default()),
            SectionId::GeneralFeedback => Self::GeneralFeedback(GeneralFeedback::default()),
        }
    }

    pub fn section(&self) -> SectionId {
        match self {
            Self::Demographics(_) => SectionId::Demographics,
            Self::Sus(_) => SectionId::Sus,
            Self::NasaTlx(_) => SectionId::NasaTlx,
            Self::DepthGuide(_) => SectionId::DepthGuide,
            Self::GeneralFeedback(_) => SectionId::GeneralFeedback,
        }
    }

    /// Decodes a draft body whose shape is implied by the section it targets.
    pub fn from_json(section: SectionId, value: serde_json::Value) -> serde_json::Result<Self> {
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
#[path = "tests/domain_tests.rs"]
mod tests;
