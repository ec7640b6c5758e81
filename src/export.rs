use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use crate::db::ReportStore;
use crate::error::ReportError;
use crate::models::{CsvExport, SurveyResponse, SurveyTemplate};
use crate::period::{period_range, report_offset, PeriodUnit};
use crate::report::{clean_id, resolve_category_name, resolve_template};

pub const EXPORT_CONTENT_TYPE: &str = "text/csv; charset=utf-8";

/// Flatten the window's responses for one category/template into a CSV
/// table: six fixed columns, then one column per template question in
/// stored order. Rows are oldest first.
pub async fn survey_satisfaction_export(
    store: &dyn ReportStore,
    category_id: Option<&str>,
    template_id: Option<&str>,
    unit: PeriodUnit,
    periods: usize,
    now: DateTime<Utc>,
) -> Result<CsvExport, ReportError> {
    let Some(category_id) = clean_id(category_id) else {
        return Err(ReportError::InvalidInput("categoryId wajib diisi".to_string()));
    };
    let template_id = clean_id(template_id);

    let template = resolve_template(store, Some(category_id), template_id).await?;
    let (start, end) = period_range(unit, periods, now);

    let responses = store
        .survey_responses_filtered(start, end, Some(category_id), Some(&template.id), true)
        .await?;
    let category_name = resolve_category_name(store, category_id).await?;
    debug!(
        category_id,
        template_id = template.id.as_str(),
        rows = responses.len(),
        "rendering survey export"
    );

    let body = render_csv(&category_name, &template, &responses)?;

    let timestamp = now.with_timezone(&report_offset()).format("%Y%m%d_%H%M%S");
    let filename = format!(
        "survey_export_{}_{}_{}.csv",
        sanitize_component(category_id),
        sanitize_component(&template.id),
        timestamp
    );
    Ok(CsvExport {
        disposition: format!("attachment; filename=\"{filename}\""),
        filename,
        content_type: EXPORT_CONTENT_TYPE,
        body,
    })
}

fn render_csv(
    category_name: &str,
    template: &SurveyTemplate,
    responses: &[SurveyResponse],
) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header = vec![
        "Kategori".to_string(),
        "Template".to_string(),
        "Ticket ID".to_string(),
        "User ID".to_string(),
        "Tanggal".to_string(),
        "Skor(0-100)".to_string(),
    ];
    for (index, question) in template.questions.iter().enumerate() {
        header.push(format!("Q{} - {}", index + 1, question.text));
    }
    writer.write_record(&header)?;

    for response in responses {
        let mut record = Vec::with_capacity(header.len());
        record.push(category_name.to_string());
        record.push(template.title.clone());
        record.push(response.ticket_id.clone());
        record.push(response.user_id.clone());
        record.push(
            response
                .created_at
                .with_timezone(&report_offset())
                .to_rfc3339(),
        );
        record.push(format!("{:.2}", response.score));

        let answers = response.answer_map();
        for question in &template.questions {
            let value = answers.and_then(|map| map.get(&question.id));
            record.push(format_answer_value(value));
        }
        writer.write_record(&record)?;
    }

    writer
        .into_inner()
        .map_err(|err| csv::Error::from(err.into_error()))
}

/// Localized cell rendering: booleans become Ya/Tidak, whole numbers lose
/// their fraction, everything else is its plain string form.
fn format_answer_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(Value::Bool(true)) => "Ya".to_string(),
        Some(Value::Bool(false)) => "Tidak".to_string(),
        Some(Value::Number(number)) => {
            if let Some(int) = number.as_i64() {
                int.to_string()
            } else {
                match number.as_f64() {
                    Some(float) if float.fract() == 0.0 => (float as i64).to_string(),
                    Some(float) => float.to_string(),
                    None => number.to_string(),
                }
            }
        }
        Some(other) => other.to_string(),
    }
}

fn sanitize_component(value: &str) -> String {
    if value.is_empty() {
        return "all".to_string();
    }
    value.replace([' ', '/', '\\'], "_")
}
