use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{
    QuestionType, ServiceCategory, SurveyQuestion, SurveyResponse, SurveyTemplate, TicketStatus,
};

#[derive(Debug, Clone)]
pub struct CategoryCount {
    pub category_id: String,
    pub total: i64,
}

#[derive(Debug, Clone)]
pub struct SatisfactionAggregate {
    pub category_id: String,
    pub avg_score: f64,
    pub responses: i64,
}

#[derive(Debug, Clone)]
pub struct EntityCategoryCount {
    pub entity: String,
    pub category_id: String,
    pub total: i64,
}

/// Read-only storage contract for the report engine. All windows are
/// half-open `[start, end)`.
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn survey_responses_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SurveyResponse>, sqlx::Error>;

    async fn survey_responses_filtered(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        category_id: Option<&str>,
        template_id: Option<&str>,
        oldest_first: bool,
    ) -> Result<Vec<SurveyResponse>, sqlx::Error>;

    /// Distinct users from `user_ids` with at least one response in the window.
    async fn active_user_ids(
        &self,
        user_ids: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<String>, sqlx::Error>;

    async fn ticket_totals_by_category(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CategoryCount>, sqlx::Error>;

    async fn count_tickets(&self) -> Result<i64, sqlx::Error>;

    async fn count_open_tickets(&self) -> Result<i64, sqlx::Error>;

    async fn count_resolved_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error>;

    async fn count_tickets_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error>;

    async fn count_surveys_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error>;

    async fn average_positive_score(&self) -> Result<f64, sqlx::Error>;

    /// Per-category average stored score and response count, positive
    /// scores only.
    async fn satisfaction_by_category(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SatisfactionAggregate>, sqlx::Error>;

    async fn category_by_id(&self, id: &str) -> Result<Option<ServiceCategory>, sqlx::Error>;

    async fn categories(&self) -> Result<Vec<ServiceCategory>, sqlx::Error>;

    /// Template with its questions in stored (creation) order.
    async fn template_with_questions(
        &self,
        id: &str,
    ) -> Result<Option<SurveyTemplate>, sqlx::Error>;

    async fn templates_with_questions(
        &self,
        ids: &[String],
    ) -> Result<Vec<SurveyTemplate>, sqlx::Error>;

    async fn used_template_ids_by_category(
        &self,
        category_id: &str,
    ) -> Result<Vec<String>, sqlx::Error>;

    async fn ticket_counts_by_entity_category(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<EntityCategoryCount>, sqlx::Error>;

    async fn survey_counts_by_entity_category(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<EntityCategoryCount>, sqlx::Error>;

    async fn registered_entities(&self) -> Result<Vec<String>, sqlx::Error>;
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn questions_for(
        &self,
        template_ids: &[String],
    ) -> Result<Vec<SurveyQuestion>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT id, template_id, text, type, options, created_at \
             FROM survey_questions WHERE template_id = ANY($1) \
             ORDER BY created_at ASC",
        )
        .bind(template_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(question_from_row).collect())
    }
}

fn response_from_row(row: &PgRow) -> SurveyResponse {
    SurveyResponse {
        id: row.get("id"),
        ticket_id: row.get("ticket_id"),
        user_id: row.get("user_id"),
        template_id: row.get("template_id"),
        answers: row.get("answers"),
        score: row.get("score"),
        created_at: row.get("created_at"),
    }
}

fn question_from_row(row: &PgRow) -> SurveyQuestion {
    let options: Value = row.get("options");
    SurveyQuestion {
        id: row.get("id"),
        template_id: row.get("template_id"),
        text: row.get("text"),
        question_type: QuestionType::parse(row.get::<String, _>("type").as_str()),
        options: serde_json::from_value(options).unwrap_or_default(),
        created_at: row.get("created_at"),
    }
}

fn category_from_row(row: &PgRow) -> ServiceCategory {
    ServiceCategory {
        id: row.get("id"),
        name: row.get("name"),
        guest_allowed: row.get("guest_allowed"),
        survey_template_id: row.get("survey_template_id"),
    }
}

#[async_trait]
impl ReportStore for PgStore {
    async fn survey_responses_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SurveyResponse>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT id, ticket_id, user_id, template_id, answers, score, created_at \
             FROM survey_responses WHERE created_at >= $1 AND created_at < $2",
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(response_from_row).collect())
    }

    async fn survey_responses_filtered(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        category_id: Option<&str>,
        template_id: Option<&str>,
        oldest_first: bool,
    ) -> Result<Vec<SurveyResponse>, sqlx::Error> {
        let mut sql = String::from(
            "SELECT sr.id, sr.ticket_id, sr.user_id, sr.template_id, sr.answers, \
             sr.score, sr.created_at \
             FROM survey_responses sr \
             JOIN tickets t ON t.id = sr.ticket_id \
             WHERE sr.created_at >= $1 AND sr.created_at < $2",
        );
        let mut next_bind = 2;
        if category_id.is_some() {
            next_bind += 1;
            sql.push_str(&format!(" AND t.category_id = ${next_bind}"));
        }
        if template_id.is_some() {
            next_bind += 1;
            sql.push_str(&format!(" AND sr.template_id = ${next_bind}"));
        }
        sql.push_str(if oldest_first {
            " ORDER BY sr.created_at ASC"
        } else {
            " ORDER BY sr.created_at DESC"
        });

        let mut query = sqlx::query(&sql).bind(start).bind(end);
        if let Some(value) = category_id {
            query = query.bind(value);
        }
        if let Some(value) = template_id {
            query = query.bind(value);
        }

        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(response_from_row).collect())
    }

    async fn active_user_ids(
        &self,
        user_ids: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<String>, sqlx::Error> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(
            "SELECT DISTINCT user_id FROM survey_responses \
             WHERE user_id = ANY($1) AND created_at >= $2 AND created_at < $3",
        )
        .bind(user_ids)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(|row| row.get("user_id")).collect())
    }

    async fn ticket_totals_by_category(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CategoryCount>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT category_id, COUNT(*) AS total FROM tickets \
             WHERE created_at >= $1 AND created_at < $2 \
             GROUP BY category_id ORDER BY total DESC",
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|row| CategoryCount {
                category_id: row.get("category_id"),
                total: row.get("total"),
            })
            .collect())
    }

    async fn count_tickets(&self) -> Result<i64, sqlx::Error> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM tickets")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("total"))
    }

    async fn count_open_tickets(&self) -> Result<i64, sqlx::Error> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM tickets WHERE status <> $1")
            .bind(TicketStatus::Resolved.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("total"))
    }

    async fn count_resolved_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS total FROM tickets \
             WHERE status = $1 AND updated_at >= $2 AND updated_at < $3",
        )
        .bind(TicketStatus::Resolved.as_str())
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get("total"))
    }

    async fn count_tickets_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS total FROM tickets \
             WHERE created_at >= $1 AND created_at < $2",
        )
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get("total"))
    }

    async fn count_surveys_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS total FROM survey_responses \
             WHERE created_at >= $1 AND created_at < $2",
        )
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get("total"))
    }

    async fn average_positive_score(&self) -> Result<f64, sqlx::Error> {
        let row = sqlx::query(
            "SELECT COALESCE(AVG(score), 0) AS avg_score \
             FROM survey_responses WHERE score > 0",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get("avg_score"))
    }

    async fn satisfaction_by_category(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SatisfactionAggregate>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT t.category_id AS category_id, \
                    COALESCE(AVG(sr.score), 0) AS avg_score, \
                    COUNT(*) AS responses \
             FROM survey_responses sr \
             JOIN tickets t ON t.id = sr.ticket_id \
             WHERE sr.created_at >= $1 AND sr.created_at < $2 \
               AND sr.score > 0 \
             GROUP BY t.category_id",
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|row| SatisfactionAggregate {
                category_id: row.get("category_id"),
                avg_score: row.get("avg_score"),
                responses: row.get("responses"),
            })
            .collect())
    }

    async fn category_by_id(&self, id: &str) -> Result<Option<ServiceCategory>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT id, name, guest_allowed, survey_template_id \
             FROM service_categories WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(category_from_row))
    }

    async fn categories(&self) -> Result<Vec<ServiceCategory>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT id, name, guest_allowed, survey_template_id \
             FROM service_categories ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(category_from_row).collect())
    }

    async fn template_with_questions(
        &self,
        id: &str,
    ) -> Result<Option<SurveyTemplate>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT id, title, description, category_id, created_at, updated_at \
             FROM survey_templates WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let questions = self.questions_for(&[id.to_string()]).await?;
        Ok(Some(SurveyTemplate {
            id: row.get("id"),
            title: row.get("title"),
            description: row.get("description"),
            category_id: row.get("category_id"),
            questions,
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }))
    }

    async fn templates_with_questions(
        &self,
        ids: &[String],
    ) -> Result<Vec<SurveyTemplate>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(
            "SELECT id, title, description, category_id, created_at, updated_at \
             FROM survey_templates WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        let mut by_template: HashMap<String, Vec<SurveyQuestion>> = HashMap::new();
        for question in self.questions_for(ids).await? {
            by_template
                .entry(question.template_id.clone())
                .or_default()
                .push(question);
        }

        let mut templates = Vec::with_capacity(rows.len());
        for row in &rows {
            let template_id: String = row.get("id");
            templates.push(SurveyTemplate {
                questions: by_template.remove(&template_id).unwrap_or_default(),
                id: template_id,
                title: row.get("title"),
                description: row.get("description"),
                category_id: row.get("category_id"),
                created_at: row.get("created_at"),
                updated_at: row.get("updated_at"),
            });
        }
        Ok(templates)
    }

    async fn used_template_ids_by_category(
        &self,
        category_id: &str,
    ) -> Result<Vec<String>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT DISTINCT sr.template_id FROM survey_responses sr \
             JOIN tickets t ON t.id = sr.ticket_id \
             WHERE t.category_id = $1 AND sr.template_id <> ''",
        )
        .bind(category_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(|row| row.get("template_id")).collect())
    }

    async fn ticket_counts_by_entity_category(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<EntityCategoryCount>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT u.entity AS entity, t.category_id AS category_id, COUNT(*) AS total \
             FROM tickets t \
             JOIN users u ON u.id = t.reporter_id \
             WHERE u.role = 'registered' \
               AND t.created_at >= $1 AND t.created_at < $2 \
             GROUP BY u.entity, t.category_id",
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|row| EntityCategoryCount {
                entity: row.get("entity"),
                category_id: row.get("category_id"),
                total: row.get("total"),
            })
            .collect())
    }

    async fn survey_counts_by_entity_category(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<EntityCategoryCount>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT u.entity AS entity, t.category_id AS category_id, COUNT(*) AS total \
             FROM survey_responses sr \
             JOIN users u ON u.id = sr.user_id \
             JOIN tickets t ON t.id = sr.ticket_id \
             WHERE u.role = 'registered' \
               AND sr.created_at >= $1 AND sr.created_at < $2 \
             GROUP BY u.entity, t.category_id",
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|row| EntityCategoryCount {
                entity: row.get("entity"),
                category_id: row.get("category_id"),
                total: row.get("total"),
            })
            .collect())
    }

    async fn registered_entities(&self) -> Result<Vec<String>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT DISTINCT entity FROM users \
             WHERE role = 'registered' AND entity <> '' \
             ORDER BY entity ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(|row| row.get("entity")).collect())
    }
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let categories = vec![
        ("internet", "Jaringan Internet", false, Some("tpl-internet")),
        ("siakad", "SIAKAD", false, None),
        ("website", "Website", false, None),
        ("sistem-informasi", "Sistem Informasi", false, None),
        ("lainnya", "Lainnya", false, None),
        ("guest-password", "Lupa Password SSO", true, None),
        ("guest-sso", "Registrasi SSO", true, None),
        ("guest-email", "Registrasi Email Kampus", true, None),
    ];
    for (id, name, guest_allowed, template_id) in categories {
        sqlx::query(
            r#"
            INSERT INTO service_categories (id, name, guest_allowed, survey_template_id)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name,
                guest_allowed = EXCLUDED.guest_allowed,
                survey_template_id = EXCLUDED.survey_template_id
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(guest_allowed)
        .bind(template_id)
        .execute(pool)
        .await?;
    }

    let users = vec![
        ("u-budi", "budi", "Budi Santoso", "registered", "Fakultas Teknik"),
        ("u-sari", "sari", "Sari Rahma", "registered", "Fakultas Ekonomi"),
        ("u-admin", "admin", "Admin Helpdesk", "admin", "UPT TIK"),
        ("u-guest", "guest-4821", "Tamu", "guest", ""),
    ];
    for (id, username, name, role, entity) in users {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, name, role, entity)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(username)
        .bind(name)
        .bind(role)
        .bind(entity)
        .execute(pool)
        .await?;
    }

    let template_created = ts(2026, 5, 4, 2)?;
    sqlx::query(
        r#"
        INSERT INTO survey_templates (id, title, description, category_id, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $5)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind("tpl-internet")
    .bind("Survei Kepuasan Layanan Jaringan")
    .bind("Dikirim setelah tiket jaringan ditutup")
    .bind("internet")
    .bind(template_created)
    .execute(pool)
    .await?;

    let questions = vec![
        ("q-int-1", "Seberapa puas Anda dengan kecepatan penanganan?", "likert", 0i64),
        ("q-int-2", "Apakah gangguan tertangani dengan baik?", "yesNo", 1),
        ("q-int-3", "Saran perbaikan layanan", "text", 2),
    ];
    for (id, text, question_type, minute) in questions {
        sqlx::query(
            r#"
            INSERT INTO survey_questions (id, template_id, text, type, options, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind("tpl-internet")
        .bind(text)
        .bind(question_type)
        .bind(json!([]))
        .bind(template_created + chrono::Duration::minutes(minute))
        .execute(pool)
        .await?;
    }

    let tickets = vec![
        ("tk-1001", "internet", TicketStatus::Resolved, "u-budi", ts(2026, 7, 6, 3)?, ts(2026, 7, 7, 8)?),
        ("tk-1002", "internet", TicketStatus::Resolved, "u-sari", ts(2026, 7, 14, 1)?, ts(2026, 7, 15, 4)?),
        ("tk-1003", "siakad", TicketStatus::InProgress, "u-budi", ts(2026, 7, 20, 6)?, ts(2026, 7, 21, 2)?),
        ("tk-1004", "website", TicketStatus::Waiting, "u-sari", ts(2026, 8, 3, 2)?, ts(2026, 8, 3, 2)?),
        ("tk-1005", "internet", TicketStatus::Resolved, "u-budi", ts(2026, 6, 10, 5)?, ts(2026, 6, 12, 7)?),
        ("tk-1006", "sistem-informasi", TicketStatus::Processing, "u-sari", ts(2026, 8, 5, 4)?, ts(2026, 8, 5, 4)?),
    ];
    for (id, category_id, status, reporter_id, created_at, updated_at) in tickets {
        sqlx::query(
            r#"
            INSERT INTO tickets (id, title, category_id, status, reporter_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(format!("Laporan {category_id}"))
        .bind(category_id)
        .bind(status.as_str())
        .bind(reporter_id)
        .bind(created_at)
        .bind(updated_at)
        .execute(pool)
        .await?;
    }

    let responses = vec![
        (
            Uuid::parse_str("6f0f2a4e-8b3d-4f26-9a51-3d9be4cbb1a0")?,
            "tk-1001",
            "u-budi",
            "tpl-internet",
            json!({"q-int-1": 5, "q-int-2": true, "q-int-3": "Sudah jauh membaik"}),
            100.0,
            ts(2026, 7, 7, 9)?,
        ),
        (
            Uuid::parse_str("c0b1a6d2-57e4-4f83-b2c9-91f2a35d6e44")?,
            "tk-1002",
            "u-sari",
            "tpl-internet",
            json!({"q-int-1": 3, "q-int-2": "tidak"}),
            30.0,
            ts(2026, 7, 15, 5)?,
        ),
        // Legacy row: no template, score still on the old 1-5 scale.
        (
            Uuid::parse_str("9a2d8c71-4b0e-4d6a-8f3b-57c1e9ab20dd")?,
            "tk-1005",
            "u-budi",
            "",
            json!({"q1": 4}),
            4.0,
            ts(2026, 6, 12, 8)?,
        ),
    ];
    for (id, ticket_id, user_id, template_id, answers, score, created_at) in responses {
        let id = id.to_string();
        sqlx::query(
            r#"
            INSERT INTO survey_responses (id, ticket_id, user_id, template_id, answers, score, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(ticket_id)
        .bind(user_id)
        .bind(template_id)
        .bind(answers)
        .bind(score)
        .bind(created_at)
        .execute(pool)
        .await?;
    }

    Ok(())
}

fn ts(year: i32, month: u32, day: u32, hour: u32) -> anyhow::Result<DateTime<Utc>> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0)
        .single()
        .context("invalid seed timestamp")
}
