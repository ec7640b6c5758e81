use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::db::{CategoryCount, EntityCategoryCount, ReportStore, SatisfactionAggregate};
use crate::models::{
    QuestionType, ServiceCategory, SurveyQuestion, SurveyResponse, SurveyTemplate, TicketStatus,
};

#[derive(Debug, Clone)]
pub struct MemUser {
    pub id: String,
    pub entity: String,
    pub registered: bool,
}

#[derive(Debug, Clone)]
pub struct MemTicket {
    pub id: String,
    pub category_id: String,
    pub status: TicketStatus,
    pub reporter_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// In-memory `ReportStore` mirroring the Postgres queries row for row.
#[derive(Debug, Default)]
pub struct MemStore {
    pub users: Vec<MemUser>,
    pub tickets: Vec<MemTicket>,
    pub categories: Vec<ServiceCategory>,
    pub templates: Vec<SurveyTemplate>,
    pub responses: Vec<SurveyResponse>,
}

impl MemStore {
    fn ticket(&self, id: &str) -> Option<&MemTicket> {
        self.tickets.iter().find(|ticket| ticket.id == id)
    }

    fn user(&self, id: &str) -> Option<&MemUser> {
        self.users.iter().find(|user| user.id == id)
    }
}

fn in_range(at: DateTime<Utc>, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    at >= start && at < end
}

#[async_trait]
impl ReportStore for MemStore {
    async fn survey_responses_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SurveyResponse>, sqlx::Error> {
        Ok(self
            .responses
            .iter()
            .filter(|response| in_range(response.created_at, start, end))
            .cloned()
            .collect())
    }

    async fn survey_responses_filtered(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        category_id: Option<&str>,
        template_id: Option<&str>,
        oldest_first: bool,
    ) -> Result<Vec<SurveyResponse>, sqlx::Error> {
        let mut matched: Vec<SurveyResponse> = self
            .responses
            .iter()
            .filter(|response| in_range(response.created_at, start, end))
            .filter(|response| match category_id {
                Some(category) => self
                    .ticket(&response.ticket_id)
                    .is_some_and(|ticket| ticket.category_id == category),
                None => true,
            })
            .filter(|response| match template_id {
                Some(template) => response.template_id == template,
                None => true,
            })
            .cloned()
            .collect();
        matched.sort_by_key(|response| response.created_at);
        if !oldest_first {
            matched.reverse();
        }
        Ok(matched)
    }

    async fn active_user_ids(
        &self,
        user_ids: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<String>, sqlx::Error> {
        let candidates: BTreeSet<&String> = user_ids.iter().collect();
        let active: BTreeSet<String> = self
            .responses
            .iter()
            .filter(|response| in_range(response.created_at, start, end))
            .filter(|response| candidates.contains(&response.user_id))
            .map(|response| response.user_id.clone())
            .collect();
        Ok(active.into_iter().collect())
    }

    async fn ticket_totals_by_category(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CategoryCount>, sqlx::Error> {
        let mut totals: BTreeMap<String, i64> = BTreeMap::new();
        for ticket in &self.tickets {
            if in_range(ticket.created_at, start, end) {
                *totals.entry(ticket.category_id.clone()).or_default() += 1;
            }
        }
        let mut rows: Vec<CategoryCount> = totals
            .into_iter()
            .map(|(category_id, total)| CategoryCount { category_id, total })
            .collect();
        rows.sort_by(|a, b| b.total.cmp(&a.total));
        Ok(rows)
    }

    async fn count_tickets(&self) -> Result<i64, sqlx::Error> {
        Ok(self.tickets.len() as i64)
    }

    async fn count_open_tickets(&self) -> Result<i64, sqlx::Error> {
        Ok(self
            .tickets
            .iter()
            .filter(|ticket| ticket.status != TicketStatus::Resolved)
            .count() as i64)
    }

    async fn count_resolved_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        Ok(self
            .tickets
            .iter()
            .filter(|ticket| {
                ticket.status == TicketStatus::Resolved && in_range(ticket.updated_at, start, end)
            })
            .count() as i64)
    }

    async fn count_tickets_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        Ok(self
            .tickets
            .iter()
            .filter(|ticket| in_range(ticket.created_at, start, end))
            .count() as i64)
    }

    async fn count_surveys_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        Ok(self
            .responses
            .iter()
            .filter(|response| in_range(response.created_at, start, end))
            .count() as i64)
    }

    async fn average_positive_score(&self) -> Result<f64, sqlx::Error> {
        let positives: Vec<f64> = self
            .responses
            .iter()
            .filter(|response| response.score > 0.0)
            .map(|response| response.score)
            .collect();
        if positives.is_empty() {
            return Ok(0.0);
        }
        Ok(positives.iter().sum::<f64>() / positives.len() as f64)
    }

    async fn satisfaction_by_category(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SatisfactionAggregate>, sqlx::Error> {
        let mut sums: BTreeMap<String, (f64, i64)> = BTreeMap::new();
        for response in &self.responses {
            if !in_range(response.created_at, start, end) || response.score <= 0.0 {
                continue;
            }
            let Some(ticket) = self.ticket(&response.ticket_id) else {
                continue;
            };
            let entry = sums.entry(ticket.category_id.clone()).or_insert((0.0, 0));
            entry.0 += response.score;
            entry.1 += 1;
        }
        Ok(sums
            .into_iter()
            .map(|(category_id, (total, responses))| SatisfactionAggregate {
                category_id,
                avg_score: total / responses as f64,
                responses,
            })
            .collect())
    }

    async fn category_by_id(&self, id: &str) -> Result<Option<ServiceCategory>, sqlx::Error> {
        Ok(self
            .categories
            .iter()
            .find(|category| category.id == id)
            .cloned())
    }

    async fn categories(&self) -> Result<Vec<ServiceCategory>, sqlx::Error> {
        let mut categories = self.categories.clone();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn template_with_questions(
        &self,
        id: &str,
    ) -> Result<Option<SurveyTemplate>, sqlx::Error> {
        Ok(self
            .templates
            .iter()
            .find(|template| template.id == id)
            .cloned())
    }

    async fn templates_with_questions(
        &self,
        ids: &[String],
    ) -> Result<Vec<SurveyTemplate>, sqlx::Error> {
        Ok(self
            .templates
            .iter()
            .filter(|template| ids.contains(&template.id))
            .cloned()
            .collect())
    }

    async fn used_template_ids_by_category(
        &self,
        category_id: &str,
    ) -> Result<Vec<String>, sqlx::Error> {
        let used: BTreeSet<String> = self
            .responses
            .iter()
            .filter(|response| !response.template_id.is_empty())
            .filter(|response| {
                self.ticket(&response.ticket_id)
                    .is_some_and(|ticket| ticket.category_id == category_id)
            })
            .map(|response| response.template_id.clone())
            .collect();
        Ok(used.into_iter().collect())
    }

    async fn ticket_counts_by_entity_category(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<EntityCategoryCount>, sqlx::Error> {
        let mut totals: BTreeMap<(String, String), i64> = BTreeMap::new();
        for ticket in &self.tickets {
            if !in_range(ticket.created_at, start, end) {
                continue;
            }
            let Some(user) = self.user(&ticket.reporter_id) else {
                continue;
            };
            if !user.registered {
                continue;
            }
            *totals
                .entry((user.entity.clone(), ticket.category_id.clone()))
                .or_default() += 1;
        }
        Ok(totals
            .into_iter()
            .map(|((entity, category_id), total)| EntityCategoryCount {
                entity,
                category_id,
                total,
            })
            .collect())
    }

    async fn survey_counts_by_entity_category(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<EntityCategoryCount>, sqlx::Error> {
        let mut totals: BTreeMap<(String, String), i64> = BTreeMap::new();
        for response in &self.responses {
            if !in_range(response.created_at, start, end) {
                continue;
            }
            let Some(user) = self.user(&response.user_id) else {
                continue;
            };
            if !user.registered {
                continue;
            }
            let Some(ticket) = self.ticket(&response.ticket_id) else {
                continue;
            };
            *totals
                .entry((user.entity.clone(), ticket.category_id.clone()))
                .or_default() += 1;
        }
        Ok(totals
            .into_iter()
            .map(|((entity, category_id), total)| EntityCategoryCount {
                entity,
                category_id,
                total,
            })
            .collect())
    }

    async fn registered_entities(&self) -> Result<Vec<String>, sqlx::Error> {
        let entities: BTreeSet<String> = self
            .users
            .iter()
            .filter(|user| user.registered && !user.entity.is_empty())
            .map(|user| user.entity.clone())
            .collect();
        Ok(entities.into_iter().collect())
    }
}

pub fn utc(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0).unwrap()
}

pub fn user(id: &str, entity: &str, registered: bool) -> MemUser {
    MemUser {
        id: id.to_string(),
        entity: entity.to_string(),
        registered,
    }
}

pub fn ticket(
    id: &str,
    category_id: &str,
    status: TicketStatus,
    reporter_id: &str,
    created_at: DateTime<Utc>,
) -> MemTicket {
    MemTicket {
        id: id.to_string(),
        category_id: category_id.to_string(),
        status,
        reporter_id: reporter_id.to_string(),
        created_at,
        updated_at: created_at,
    }
}

pub fn category(id: &str, name: &str, template_id: Option<&str>) -> ServiceCategory {
    ServiceCategory {
        id: id.to_string(),
        name: name.to_string(),
        guest_allowed: id.starts_with("guest-"),
        survey_template_id: template_id.map(str::to_string),
    }
}

pub fn question(
    id: &str,
    template_id: &str,
    text: &str,
    question_type: QuestionType,
    order: i64,
) -> SurveyQuestion {
    SurveyQuestion {
        id: id.to_string(),
        template_id: template_id.to_string(),
        text: text.to_string(),
        question_type,
        options: Vec::new(),
        created_at: utc(2026, 5, 4, 2, 0) + Duration::minutes(order),
    }
}

pub fn template(
    id: &str,
    title: &str,
    category_id: &str,
    questions: Vec<SurveyQuestion>,
) -> SurveyTemplate {
    SurveyTemplate {
        id: id.to_string(),
        title: title.to_string(),
        description: String::new(),
        category_id: category_id.to_string(),
        questions,
        created_at: utc(2026, 5, 4, 2, 0),
        updated_at: utc(2026, 5, 4, 2, 0),
    }
}

pub fn response(
    id: &str,
    ticket_id: &str,
    user_id: &str,
    template_id: &str,
    answers: Value,
    score: f64,
    created_at: DateTime<Utc>,
) -> SurveyResponse {
    SurveyResponse {
        id: id.to_string(),
        ticket_id: ticket_id.to_string(),
        user_id: user_id.to_string(),
        template_id: template_id.to_string(),
        answers,
        score,
        created_at,
    }
}
