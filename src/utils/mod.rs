use std::collections::BTreeMap;

use serde_json::Value;

pub fn parse_filter_pair(value: &str) -> Result<(String, String), String> {
    let (key, val) = value
        .split_once('=')
        .ok_or_else(|| "expected format KEY=VALUE".to_string())?;
    let key = key.trim();
    if key.is_empty() {
        return Err("filter name is empty".to_string());
    }
    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(format!("invalid filter name '{key}'"));
    }
    Ok((key.to_ascii_lowercase(), val.trim().to_string()))
}

/// Later occurrences of the same key win, matching a dropdown that was
/// changed twice.
pub fn parse_filter_list(values: &[String]) -> Result<BTreeMap<String, String>, String> {
    let mut out = BTreeMap::new();
    for raw in values {
        for part in raw.split(',') {
            if part.trim().is_empty() {
                continue;
            }
            let (key, value) = parse_filter_pair(part)?;
            out.insert(key, value);
        }
    }
    Ok(out)
}

pub fn parse_json_object(value: &str) -> Result<Value, String> {
    let parsed: Value =
        serde_json::from_str(value.trim()).map_err(|e| format!("invalid JSON: {e}"))?;
    if !parsed.is_object() {
        return Err("expected a JSON object".to_string());
    }
    Ok(parsed)
}

/// Text of a JSON value as it appears in a table cell.
pub fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "-".to_string(),
        Some(Value::String(s)) if s.trim().is_empty() => "-".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(true)) => "yes".to_string(),
        Some(Value::Bool(false)) => "no".to_string(),
        Some(other) => other.to_string(),
    }
}

pub fn truncate_cell(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    let mut out: String = value.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_filter_pair_trims_and_lowercases_key() {
        assert_eq!(
            parse_filter_pair(" Role = nurse ").unwrap(),
            ("role".to_string(), "nurse".to_string())
        );
        assert!(parse_filter_pair("role").is_err());
        assert!(parse_filter_pair("=nurse").is_err());
        assert!(parse_filter_pair("ro le=nurse").is_err());
    }

    #[test]
    fn parse_filter_list_accepts_csv_and_repeats() {
        let out = parse_filter_list(&[
            "citizenship=Canadian,occupation=teacher".to_string(),
            "occupation=nurse".to_string(),
        ])
        .unwrap();
        assert_eq!(out.get("citizenship").map(String::as_str), Some("Canadian"));
        assert_eq!(out.get("occupation").map(String::as_str), Some("nurse"));
    }

    #[test]
    fn parse_json_object_rejects_arrays() {
        assert!(parse_json_object(r#"{"name": "CHUM"}"#).is_ok());
        assert!(parse_json_object("[1]").is_err());
        assert!(parse_json_object("{").is_err());
    }

    #[test]
    fn cell_text_renders_scalars() {
        assert_eq!(cell_text(None), "-");
        assert_eq!(cell_text(Some(&json!(null))), "-");
        assert_eq!(cell_text(Some(&json!("CLSC"))), "CLSC");
        assert_eq!(cell_text(Some(&json!(12))), "12");
        assert_eq!(cell_text(Some(&json!(true))), "yes");
    }

    #[test]
    fn truncate_cell_marks_cut() {
        assert_eq!(truncate_cell("Hospital", 20), "Hospital");
        assert_eq!(truncate_cell("Montreal General Hospital", 8), "Montrea…");
    }
}
