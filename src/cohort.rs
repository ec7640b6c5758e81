use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::db::ReportStore;
use crate::error::ReportError;
use crate::models::{CohortRow, SurveyResponse, UsageRow};
use crate::period::{add_periods, format_label, period_start, PeriodUnit};
use crate::score::{normalize_legacy_score, score_raw_answers};

/// Per-period cohorts of responding users with their forward retention
/// curve. Each bucket is computed independently; retention windows for
/// recent cohorts may reach past "now" and legitimately count nobody.
pub async fn cohort_report(
    store: &dyn ReportStore,
    unit: PeriodUnit,
    periods: usize,
    now: DateTime<Utc>,
) -> Result<Vec<CohortRow>, ReportError> {
    let periods = periods.max(1);
    let first = add_periods(period_start(now, unit), unit, -((periods - 1) as i32));
    debug!(unit = unit.as_str(), periods, "computing cohort report");

    let mut rows = Vec::with_capacity(periods);
    for index in 0..periods {
        let bucket_start = add_periods(first, unit, index as i32);
        let bucket_end = add_periods(bucket_start, unit, 1);

        let responses = store
            .survey_responses_in_range(bucket_start, bucket_end)
            .await?;

        let users: Vec<String> = responses
            .iter()
            .map(|response| response.user_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        if users.is_empty() {
            rows.push(CohortRow {
                label: format_label(bucket_start, unit),
                users: 0,
                retention: vec![0; periods],
                avg_score: 0.0,
                response_rate: 0.0,
            });
            continue;
        }

        let (avg_score, response_rate) = bucket_scores(&responses);

        let mut retention = Vec::with_capacity(periods);
        retention.push(100);
        for step in 1..periods {
            let window_start = add_periods(bucket_start, unit, step as i32);
            let window_end = add_periods(window_start, unit, 1);
            let active = store
                .active_user_ids(&users, window_start, window_end)
                .await?;
            retention.push((active.len() as f64 / users.len() as f64 * 100.0) as i32);
        }

        rows.push(CohortRow {
            label: format_label(bucket_start, unit),
            users: users.len(),
            retention,
            avg_score,
            response_rate,
        });
    }

    Ok(rows)
}

/// Raw ticket-created and survey-submitted volumes per period, no scoring.
pub async fn usage_cohort(
    store: &dyn ReportStore,
    unit: PeriodUnit,
    periods: usize,
    now: DateTime<Utc>,
) -> Result<Vec<UsageRow>, ReportError> {
    let periods = periods.max(1);
    let first = add_periods(period_start(now, unit), unit, -((periods - 1) as i32));

    let mut rows = Vec::with_capacity(periods);
    for index in 0..periods {
        let window_start = add_periods(first, unit, index as i32);
        let window_end = add_periods(window_start, unit, 1);

        let tickets = store.count_tickets_in_range(window_start, window_end).await?;
        let surveys = store.count_surveys_in_range(window_start, window_end).await?;

        rows.push(UsageRow {
            label: format_label(window_start, unit),
            tickets,
            surveys,
        });
    }

    Ok(rows)
}

/// Average score over a bucket's responses plus the share that produced a
/// positive score. Stored scores win; zero-score rows fall back to deriving
/// from raw answers, and everything is rescued from the legacy 1-5 scale.
fn bucket_scores(responses: &[SurveyResponse]) -> (f64, f64) {
    if responses.is_empty() {
        return (0.0, 0.0);
    }

    let mut total = 0.0;
    let mut scored = 0usize;
    for response in responses {
        let mut score = response.score;
        if score <= 0.0 {
            score = score_raw_answers(&response.answers);
        }
        let score = normalize_legacy_score(score);
        if score > 0.0 {
            total += score;
            scored += 1;
        }
    }

    let avg = if scored > 0 {
        total / scored as f64
    } else {
        0.0
    };
    let response_rate = scored as f64 / responses.len() as f64 * 100.0;
    (avg, response_rate)
}
