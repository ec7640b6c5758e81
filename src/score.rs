use serde_json::{Map, Value};

use crate::models::QuestionType;

/// Score a raw answer against its question type on the 0-100 scale.
/// Text and multiple-choice answers are never scorable; they only feed
/// response counts.
pub fn score_question_value(value: &Value, question_type: QuestionType) -> Option<f64> {
    match question_type {
        QuestionType::YesNo => score_yes_no(value),
        _ => {
            let max = question_type.scale_max()?;
            score_scale(value, max)
        }
    }
}

pub fn score_yes_no(value: &Value) -> Option<f64> {
    match value {
        Value::Bool(true) => Some(100.0),
        Value::Bool(false) => Some(0.0),
        Value::String(raw) => {
            let cleaned = raw.trim().to_lowercase();
            match cleaned.as_str() {
                "ya" | "yes" | "true" => Some(100.0),
                "tidak" | "no" | "false" => Some(0.0),
                _ => None,
            }
        }
        _ => None,
    }
}

pub fn score_scale(value: &Value, max: u32) -> Option<f64> {
    let numeric = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(raw) => raw.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if numeric < 1.0 || numeric > max as f64 {
        return None;
    }
    Some(normalize_to_hundred(numeric, max))
}

pub fn normalize_to_hundred(value: f64, max: u32) -> f64 {
    if max <= 1 {
        return 100.0;
    }
    // The lowest scale choice maps to a 1-star-of-5 equivalent (20), the
    // top choice to 100.
    let normalized = 20.0 + ((value - 1.0) * 80.0) / (max as f64 - 1.0);
    normalized.clamp(0.0, 100.0)
}

/// A stored score in (0, 5] is still on the old 1-5 raw scale; re-express it
/// on 0-100. Anything else is already rescaled and passes through.
pub fn normalize_legacy_score(score: f64) -> f64 {
    if score > 0.0 && score <= 5.0 {
        normalize_to_hundred(score, 5)
    } else {
        score
    }
}

/// Derive a score from a raw answer payload when no per-question type
/// context is available (legacy responses). Unparseable payloads score 0.
pub fn score_raw_answers(raw: &Value) -> f64 {
    match raw.as_object() {
        Some(answers) => score_legacy_answers(answers),
        None => 0.0,
    }
}

fn score_legacy_answers(answers: &Map<String, Value>) -> f64 {
    let mut total = 0.0;
    let mut count = 0;
    for value in answers.values() {
        if let Some(score) = score_legacy_value(value) {
            total += score;
            count += 1;
        }
    }
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}

fn score_legacy_value(value: &Value) -> Option<f64> {
    score_scale(value, 5).or_else(|| score_yes_no(value))
}
