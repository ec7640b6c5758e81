use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::db::ReportStore;
use crate::error::ReportError;
use crate::models::{
    DashboardSummary, EntityServiceRow, QuestionSatisfactionRow, ServiceSatisfaction,
    ServiceTrend, SurveySatisfactionReport, SurveyTemplate,
};
use crate::period::{add_periods, period_range, period_start, PeriodUnit};
use crate::score::{normalize_legacy_score, score_question_value};

/// Engine configuration. The excluded set holds deprecated and guest-intake
/// category identifiers that never appear in aggregate or matrix reports.
#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub excluded_categories: HashSet<String>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            excluded_categories: ["guest-password", "guest-sso", "guest-email"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// Volume-weighted satisfaction share per service category. A category's
/// percentage is its avg x responses share of the grand weighted total, so
/// busy categories weigh more than quiet ones with the same average.
pub async fn service_satisfaction_summary(
    store: &dyn ReportStore,
    config: &ReportConfig,
    unit: PeriodUnit,
    periods: usize,
    now: DateTime<Utc>,
) -> Result<Vec<ServiceSatisfaction>, ReportError> {
    let (start, end) = period_range(unit, periods, now);
    debug!(unit = unit.as_str(), periods, "computing satisfaction summary");

    let rows: Vec<_> = store
        .satisfaction_by_category(start, end)
        .await?
        .into_iter()
        .filter(|row| !config.excluded_categories.contains(&row.category_id))
        .collect();
    let names = category_names(store).await?;

    let total_weighted: f64 = rows
        .iter()
        .map(|row| normalize_legacy_score(row.avg_score) * row.responses as f64)
        .sum();

    let mut result = Vec::with_capacity(rows.len());
    for row in rows {
        let avg_score = normalize_legacy_score(row.avg_score);
        let percentage = if total_weighted > 0.0 {
            avg_score * row.responses as f64 / total_weighted * 100.0
        } else {
            0.0
        };
        result.push(ServiceSatisfaction {
            label: display_name(&names, &row.category_id),
            category_id: row.category_id,
            avg_score,
            responses: row.responses,
            percentage,
        });
    }
    Ok(result)
}

/// Per-question satisfaction for one template, resolved either directly or
/// through a category's assigned template. Responses whose answer payload
/// fails to decode are skipped rather than failing the report.
pub async fn survey_satisfaction(
    store: &dyn ReportStore,
    category_id: Option<&str>,
    template_id: Option<&str>,
    unit: PeriodUnit,
    periods: usize,
    now: DateTime<Utc>,
) -> Result<SurveySatisfactionReport, ReportError> {
    let category_id = clean_id(category_id);
    let template_id = clean_id(template_id);
    if category_id.is_none() && template_id.is_none() {
        return Err(ReportError::InvalidInput(
            "categoryId atau templateId wajib diisi".to_string(),
        ));
    }

    let template = resolve_template(store, category_id, template_id).await?;
    let (start, end) = period_range(unit, periods, now);

    let responses = store
        .survey_responses_filtered(start, end, category_id, Some(&template.id), false)
        .await?;

    let mut sums: HashMap<&str, f64> = HashMap::new();
    let mut score_counts: HashMap<&str, usize> = HashMap::new();
    let mut answer_counts: HashMap<&str, usize> = HashMap::new();
    for response in &responses {
        let Some(answers) = response.answer_map() else {
            continue;
        };
        for question in &template.questions {
            let Some(value) = answers.get(&question.id) else {
                continue;
            };
            *answer_counts.entry(question.id.as_str()).or_default() += 1;
            if let Some(score) = score_question_value(value, question.question_type) {
                *sums.entry(question.id.as_str()).or_default() += score;
                *score_counts.entry(question.id.as_str()).or_default() += 1;
            }
        }
    }

    let rows = template
        .questions
        .iter()
        .map(|question| {
            let scored = score_counts.get(question.id.as_str()).copied().unwrap_or(0);
            let avg_score = if scored > 0 {
                sums.get(question.id.as_str()).copied().unwrap_or(0.0) / scored as f64
            } else {
                0.0
            };
            QuestionSatisfactionRow {
                question_id: question.id.clone(),
                question: question.text.clone(),
                question_type: question.question_type.as_str().to_string(),
                avg_score,
                responses: answer_counts.get(question.id.as_str()).copied().unwrap_or(0),
            }
        })
        .collect();

    let category = match category_id {
        Some(id) => resolve_category_name(store, id).await?,
        None => "Semua Kategori".to_string(),
    };

    Ok(SurveySatisfactionReport {
        template_id: template.id.clone(),
        template: template.title.clone(),
        category_id: category_id.unwrap_or_default().to_string(),
        category,
        period: unit.as_str().to_string(),
        start,
        end,
        rows,
    })
}

/// Ticket and survey volumes for every (entity, category) pair, restricted
/// to registered users and non-excluded categories. Pairs with no activity
/// are emitted as explicit zero rows.
pub async fn entity_service_matrix(
    store: &dyn ReportStore,
    config: &ReportConfig,
    unit: PeriodUnit,
    periods: usize,
    now: DateTime<Utc>,
) -> Result<Vec<EntityServiceRow>, ReportError> {
    let (start, end) = period_range(unit, periods, now);

    let mut ticket_counts: HashMap<(String, String), i64> = HashMap::new();
    for row in store.ticket_counts_by_entity_category(start, end).await? {
        ticket_counts.insert((row.entity, row.category_id), row.total);
    }
    let mut survey_counts: HashMap<(String, String), i64> = HashMap::new();
    for row in store.survey_counts_by_entity_category(start, end).await? {
        survey_counts.insert((row.entity, row.category_id), row.total);
    }

    let categories: Vec<_> = store
        .categories()
        .await?
        .into_iter()
        .filter(|category| !config.excluded_categories.contains(&category.id))
        .collect();

    let mut entities: BTreeSet<String> = BTreeSet::new();
    entities.extend(ticket_counts.keys().map(|(entity, _)| entity.clone()));
    entities.extend(survey_counts.keys().map(|(entity, _)| entity.clone()));
    entities.extend(store.registered_entities().await?);

    let mut rows = Vec::with_capacity(entities.len() * categories.len());
    for entity in &entities {
        for category in &categories {
            let key = (entity.clone(), category.id.clone());
            rows.push(EntityServiceRow {
                entity: entity.clone(),
                category_id: category.id.clone(),
                category: category.name.clone(),
                tickets: ticket_counts.get(&key).copied().unwrap_or(0),
                surveys: survey_counts.get(&key).copied().unwrap_or(0),
            });
        }
    }
    Ok(rows)
}

/// Headline numbers for the dashboard: ticket totals, open backlog, tickets
/// resolved in the current WIB month, and the legacy-rescued average of all
/// positive survey scores.
pub async fn dashboard_summary(
    store: &dyn ReportStore,
    now: DateTime<Utc>,
) -> Result<DashboardSummary, ReportError> {
    let total_tickets = store.count_tickets().await?;
    let open_tickets = store.count_open_tickets().await?;

    let month_start = period_start(now, PeriodUnit::Monthly);
    let month_end = add_periods(month_start, PeriodUnit::Monthly, 1);
    let resolved_this_period = store.count_resolved_in_range(month_start, month_end).await?;

    let avg_rating = normalize_legacy_score(store.average_positive_score().await?);

    Ok(DashboardSummary {
        total_tickets,
        open_tickets,
        resolved_this_period,
        avg_rating,
    })
}

/// Share of ticket volume per category over an explicit window.
pub async fn service_trends(
    store: &dyn ReportStore,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<ServiceTrend>, ReportError> {
    let rows = store.ticket_totals_by_category(start, end).await?;
    let overall: i64 = rows.iter().map(|row| row.total).sum();
    if overall == 0 {
        return Ok(Vec::new());
    }

    let names = category_names(store).await?;
    Ok(rows
        .into_iter()
        .map(|row| ServiceTrend {
            label: display_name(&names, &row.category_id),
            percentage: row.total as f64 / overall as f64 * 100.0,
        })
        .collect())
}

/// The templates relevant to a category for report filtering: the currently
/// assigned one plus any historically used by its responses, assigned first,
/// then most recently updated.
pub async fn templates_by_category(
    store: &dyn ReportStore,
    category_id: &str,
) -> Result<Vec<SurveyTemplate>, ReportError> {
    let category_id = category_id.trim();
    if category_id.is_empty() {
        return Err(ReportError::InvalidInput(
            "categoryId wajib diisi".to_string(),
        ));
    }
    let category = store
        .category_by_id(category_id)
        .await?
        .ok_or_else(|| ReportError::NotFound(format!("category {category_id}")))?;

    let assigned = category.survey_template_id.unwrap_or_default();
    let mut ids: BTreeSet<String> = store
        .used_template_ids_by_category(category_id)
        .await?
        .into_iter()
        .filter(|id| !id.is_empty())
        .collect();
    if !assigned.is_empty() {
        ids.insert(assigned.clone());
    }
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<String> = ids.into_iter().collect();
    let mut templates = store.templates_with_questions(&ids).await?;
    templates.sort_by(|a, b| {
        if a.id == assigned {
            return Ordering::Less;
        }
        if b.id == assigned {
            return Ordering::Greater;
        }
        b.updated_at.cmp(&a.updated_at)
    });
    Ok(templates)
}

/// Resolve the target template: directly by id, or through the category's
/// assigned template when only a category is given.
pub(crate) async fn resolve_template(
    store: &dyn ReportStore,
    category_id: Option<&str>,
    template_id: Option<&str>,
) -> Result<SurveyTemplate, ReportError> {
    let selected = match template_id {
        Some(id) => id.to_string(),
        None => {
            let category_id = category_id.ok_or_else(|| {
                ReportError::InvalidInput("categoryId atau templateId wajib diisi".to_string())
            })?;
            let category = store
                .category_by_id(category_id)
                .await?
                .ok_or_else(|| ReportError::NotFound(format!("category {category_id}")))?;
            category
                .survey_template_id
                .filter(|id| !id.is_empty())
                .ok_or_else(|| {
                    ReportError::NotFound(format!("survey template for category {category_id}"))
                })?
        }
    };

    store
        .template_with_questions(&selected)
        .await?
        .ok_or_else(|| ReportError::NotFound(format!("survey template {selected}")))
}

/// Display name for a category, falling back to its raw identifier.
pub(crate) async fn resolve_category_name(
    store: &dyn ReportStore,
    category_id: &str,
) -> Result<String, ReportError> {
    Ok(store
        .category_by_id(category_id)
        .await?
        .map(|category| category.name)
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| category_id.to_string()))
}

pub(crate) fn clean_id(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|id| !id.is_empty())
}

async fn category_names(store: &dyn ReportStore) -> Result<BTreeMap<String, String>, ReportError> {
    Ok(store
        .categories()
        .await?
        .into_iter()
        .map(|category| (category.id, category.name))
        .collect())
}

fn display_name(names: &BTreeMap<String, String>, category_id: &str) -> String {
    names
        .get(category_id)
        .cloned()
        .unwrap_or_else(|| category_id.to_string())
}
