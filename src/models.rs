use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuestionType {
    #[serde(rename = "yesNo")]
    YesNo,
    /// 5-point satisfaction scale.
    #[serde(rename = "likert")]
    Likert,
    /// 5-point quality scale.
    #[serde(rename = "likertQuality")]
    LikertQuality,
    #[serde(rename = "likert3")]
    Likert3,
    #[serde(rename = "likert3Puas")]
    Likert3Puas,
    #[serde(rename = "likert4")]
    Likert4,
    #[serde(rename = "likert4Puas")]
    Likert4Puas,
    #[serde(rename = "text")]
    Text,
    #[serde(rename = "multipleChoice")]
    MultipleChoice,
}

impl QuestionType {
    /// Stored type tags predate this service; anything unrecognized is
    /// treated as free text, which is never scored.
    pub fn parse(value: &str) -> QuestionType {
        match value {
            "yesNo" => QuestionType::YesNo,
            "likert" => QuestionType::Likert,
            "likertQuality" => QuestionType::LikertQuality,
            "likert3" => QuestionType::Likert3,
            "likert3Puas" => QuestionType::Likert3Puas,
            "likert4" => QuestionType::Likert4,
            "likert4Puas" => QuestionType::Likert4Puas,
            "multipleChoice" => QuestionType::MultipleChoice,
            _ => QuestionType::Text,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::YesNo => "yesNo",
            QuestionType::Likert => "likert",
            QuestionType::LikertQuality => "likertQuality",
            QuestionType::Likert3 => "likert3",
            QuestionType::Likert3Puas => "likert3Puas",
            QuestionType::Likert4 => "likert4",
            QuestionType::Likert4Puas => "likert4Puas",
            QuestionType::Text => "text",
            QuestionType::MultipleChoice => "multipleChoice",
        }
    }

    /// Number of points for scale types, None for everything else.
    pub fn scale_max(&self) -> Option<u32> {
        match self {
            QuestionType::Likert | QuestionType::LikertQuality => Some(5),
            QuestionType::Likert4 | QuestionType::Likert4Puas => Some(4),
            QuestionType::Likert3 | QuestionType::Likert3Puas => Some(3),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketStatus {
    Waiting,
    Processing,
    InProgress,
    Resolved,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Waiting => "waiting",
            TicketStatus::Processing => "processing",
            TicketStatus::InProgress => "inProgress",
            TicketStatus::Resolved => "resolved",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceCategory {
    pub id: String,
    pub name: String,
    pub guest_allowed: bool,
    pub survey_template_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyQuestion {
    pub id: String,
    pub template_id: String,
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub options: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyTemplate {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category_id: String,
    pub questions: Vec<SurveyQuestion>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyResponse {
    pub id: String,
    pub ticket_id: String,
    pub user_id: String,
    /// Empty for legacy responses submitted before templates existed.
    pub template_id: String,
    pub answers: Value,
    pub score: f64,
    pub created_at: DateTime<Utc>,
}

impl SurveyResponse {
    /// Decoded answer map, or None when the stored payload is not an object.
    pub fn answer_map(&self) -> Option<&Map<String, Value>> {
        self.answers.as_object()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortRow {
    pub label: String,
    pub users: usize,
    pub retention: Vec<i32>,
    pub avg_score: f64,
    pub response_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRow {
    pub label: String,
    pub tickets: i64,
    pub surveys: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceTrend {
    pub label: String,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_tickets: i64,
    pub open_tickets: i64,
    pub resolved_this_period: i64,
    pub avg_rating: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSatisfaction {
    pub category_id: String,
    pub label: String,
    pub avg_score: f64,
    pub responses: i64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionSatisfactionRow {
    pub question_id: String,
    pub question: String,
    #[serde(rename = "type")]
    pub question_type: String,
    pub avg_score: f64,
    pub responses: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveySatisfactionReport {
    pub template_id: String,
    pub template: String,
    pub category_id: String,
    pub category: String,
    pub period: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub rows: Vec<QuestionSatisfactionRow>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityServiceRow {
    pub entity: String,
    pub category_id: String,
    pub category: String,
    pub tickets: i64,
    pub surveys: i64,
}

/// A rendered export, ready for an attachment response or a file on disk.
#[derive(Debug, Clone)]
pub struct CsvExport {
    pub filename: String,
    pub content_type: &'static str,
    pub disposition: String,
    pub body: Vec<u8>,
}
