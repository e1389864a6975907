use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use uuid::Uuid;

/// Belt labels in progression order.
pub const BELTS: [&str; 14] = [
    "Blanche",
    "Jaune",
    "Orange",
    "Mauve",
    "Verte",
    "Verte / Bleue",
    "Bleue",
    "Bleue / Brune",
    "Brune",
    "Brune / Noire",
    "Noire",
    "Noire 1 Dan",
    "Noire 2 Dan",
    "Noire 3 Dan",
];

/// Placeholder rank for an invitation whose target the rule table cannot name.
pub const UNKNOWN_RANK: &str = "???";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Rank(String);

impl Rank {
    pub fn new(label: impl Into<String>) -> Self {
        let label = label.into();
        Self(label.trim().to_string())
    }

    pub fn initial() -> Self {
        Self::new(BELTS[0])
    }

    pub fn unknown() -> Self {
        Self::new(UNKNOWN_RANK)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Position in the belt sequence, `None` for labels outside it.
    pub fn position(&self) -> Option<usize> {
        BELTS.iter().position(|belt| *belt == self.0)
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Rank {
    fn from(label: String) -> Self {
        Self::new(label)
    }
}

impl From<&str> for Rank {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

impl From<Rank> for String {
    fn from(rank: Rank) -> Self {
        rank.0
    }
}

/// Kind of training event. Labels this crate does not know are kept verbatim
/// in `Other` so they are written back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    #[default]
    GroupClass,
    PrivateLesson,
    SemiPrivateLesson,
    HomeTraining,
    Competition,
    RankTest,
    Seminar,
    Other(String),
}

impl EventKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::GroupClass => "groupe",
            Self::PrivateLesson => "privé",
            Self::SemiPrivateLesson => "semi",
            Self::HomeTraining => "maison",
            Self::Competition => "competition",
            Self::RankTest => "passage",
            Self::Seminar => "seminaire",
            Self::Other(label) => label,
        }
    }

    pub fn is_private(&self) -> bool {
        matches!(self, Self::PrivateLesson | Self::SemiPrivateLesson)
    }
}

impl From<String> for EventKind {
    fn from(value: String) -> Self {
        match value.trim() {
            "groupe" => Self::GroupClass,
            "privé" => Self::PrivateLesson,
            "semi" => Self::SemiPrivateLesson,
            "maison" => Self::HomeTraining,
            "competition" => Self::Competition,
            "passage" => Self::RankTest,
            "seminaire" => Self::Seminar,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<&str> for EventKind {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Other(label) => label,
            known => known.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CompletionStatus {
    #[default]
    Scheduled,
    Done,
    Missed,
}

impl CompletionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "planifié",
            Self::Done => "fait",
            Self::Missed => "non fait",
        }
    }

    /// Strict parse of a wire value, for request input.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "planifié" => Some(Self::Scheduled),
            "fait" => Some(Self::Done),
            "non fait" => Some(Self::Missed),
            _ => None,
        }
    }
}

// Stored records with an unknown or absent status read as scheduled.
impl From<String> for CompletionStatus {
    fn from(value: String) -> Self {
        Self::parse(&value).unwrap_or_default()
    }
}

impl From<CompletionStatus> for String {
    fn from(status: CompletionStatus) -> Self {
        status.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingEvent {
    #[serde(default = "Uuid::new_v4", deserialize_with = "id_or_fresh")]
    pub id: Uuid,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub time: String,
    #[serde(rename = "type", default)]
    pub kind: EventKind,
    #[serde(default)]
    pub status: CompletionStatus,
}

impl TrainingEvent {
    pub fn new(
        date: impl Into<String>,
        title: impl Into<String>,
        time: impl Into<String>,
        kind: EventKind,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            date: date.into(),
            title: title.into(),
            time: time.into(),
            kind,
            status: CompletionStatus::Scheduled,
        }
    }

    pub fn with_status(mut self, status: CompletionStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_done(&self) -> bool {
        self.status == CompletionStatus::Done
    }

    /// Identity used when merging generated calendar entries.
    pub fn dedup_key(&self) -> (&str, &str, &str, &EventKind) {
        (&self.date, &self.time, &self.title, &self.kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankChangeRecord {
    #[serde(default = "Uuid::new_v4", deserialize_with = "id_or_fresh")]
    pub id: Uuid,
    #[serde(alias = "couleur")]
    pub rank: Rank,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub date: Option<String>,
    #[serde(default, alias = "invite")]
    pub is_pending: bool,
    #[serde(
        default,
        alias = "feeling",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "blank_as_none"
    )]
    pub note: Option<String>,
}

impl RankChangeRecord {
    pub fn confirmed(rank: Rank, date: Option<String>, note: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            rank,
            date: non_blank(date),
            is_pending: false,
            note: non_blank(note),
        }
    }

    pub fn invitation(rank: Rank) -> Self {
        Self {
            id: Uuid::new_v4(),
            rank,
            date: None,
            is_pending: true,
            note: None,
        }
    }
}

pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(non_blank(value))
}

// Legacy records carried composite string ids or none at all.
fn id_or_fresh<'de, D>(deserializer: D) -> Result<Uuid, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value
        .and_then(|raw| Uuid::parse_str(&raw).ok())
        .unwrap_or_else(Uuid::new_v4))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrityWarning {
    /// Records exist but every one of them is a pending invitation.
    NoConfirmedRank,
    MultiplePending,
    PendingNotLatest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Score {
    pub group_points: u32,
    pub private_points: u32,
    pub total_points: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSnapshot {
    pub current_rank: Rank,
    pub since_date: Option<String>,
    pub group_points: u32,
    pub private_points: u32,
    pub total_points: u32,
    pub required_for_next: Option<u32>,
    pub remaining: u32,
    pub next_rank: Option<Rank>,
    pub pending: Option<RankChangeRecord>,
    pub warnings: Vec<IntegrityWarning>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Forecast {
    pub progress_percent: f64,
    pub weekly_rate: f64,
    pub weeks_remaining: u32,
    pub estimated_date: Option<String>,
    pub is_estimate: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthStats {
    pub month: String,
    pub group_count: u32,
    pub private_count: u32,
    pub combat_count: u32,
    pub competition_count: u32,
    pub total_points: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedClass {
    #[serde(alias = "nom", default)]
    pub name: String,
    #[serde(alias = "heure", default)]
    pub time: String,
    #[serde(rename = "type", default)]
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanningDay {
    #[serde(alias = "jour")]
    pub day: String,
    #[serde(alias = "cours", default)]
    pub classes: Vec<PlannedClass>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressResponse {
    pub profile: String,
    pub snapshot: ScoreSnapshot,
    pub forecast: Forecast,
}

#[derive(Debug, Deserialize)]
pub struct NewEventRequest {
    pub date: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub time: String,
    #[serde(rename = "type", default)]
    pub kind: EventKind,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct GenerateMonthRequest {
    pub year: i32,
    pub month: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChangedResponse {
    pub changed: usize,
}

#[derive(Debug, Deserialize)]
pub struct MonthQuery {
    pub month: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRankRequest {
    pub rank: String,
    pub date: String,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InvitationRequest {
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct InvitationDateRequest {
    #[serde(default)]
    pub date: Option<String>,
}
