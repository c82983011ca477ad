use crate::cli::args::{CliArgs, Command, QueryArgs};
use crate::entity::EntityKind;
use crate::output::OutputFormat;
use crate::query::MAX_PAGE_SIZE;

const MAX_DEBOUNCE_MS: u64 = 10_000;

pub fn validate(args: &CliArgs) -> Result<(), String> {
    if let Some(timeout) = args.timeout {
        if timeout == 0 {
            return Err("invalid --timeout, expected a positive number of seconds".to_string());
        }
    }
    match &args.command {
        Command::List(list) => {
            validate_query(list.entity, &list.query)?;
            if let Some(raw) = list.format.as_deref() {
                validate_format(raw)?;
            }
        }
        Command::Browse(browse) => {
            validate_query(browse.entity, &browse.query)?;
            if let Some(ms) = browse.debounce_ms {
                if ms > MAX_DEBOUNCE_MS {
                    return Err(format!(
                        "invalid --debounce {ms}, expected at most {MAX_DEBOUNCE_MS} ms"
                    ));
                }
            }
        }
        Command::Show(record) | Command::Delete(record) => {
            validate_id(&record.id)?;
            if let Some(raw) = record.format.as_deref() {
                validate_format(raw)?;
            }
        }
        Command::Create(create) => {
            crate::utils::parse_json_object(&create.data)
                .map_err(|e| format!("invalid --data: {e}"))?;
        }
        Command::Update(update) => {
            validate_id(&update.id)?;
            crate::utils::parse_json_object(&update.data)
                .map_err(|e| format!("invalid --data: {e}"))?;
        }
        Command::Login(login) => {
            if login.username.trim().is_empty() {
                return Err("username is required".to_string());
            }
        }
        Command::Stats(stats) => {
            if let Some(raw) = stats.format.as_deref() {
                validate_format(raw)?;
            }
        }
        Command::Logout => {}
    }
    Ok(())
}

fn validate_query(entity: EntityKind, query: &QueryArgs) -> Result<(), String> {
    if let Some(page) = query.page {
        if page == 0 {
            return Err("invalid --page, expected a positive integer".to_string());
        }
    }
    if let Some(size) = query.page_size {
        if size == 0 || size > MAX_PAGE_SIZE {
            return Err(format!(
                "invalid --page-size {size}, expected 1..={MAX_PAGE_SIZE}"
            ));
        }
    }
    let filters = crate::utils::parse_filter_list(&query.filter)
        .map_err(|e| format!("invalid --filter: {e}"))?;
    let descriptor = entity.descriptor();
    for (key, value) in filters.iter() {
        let def = descriptor.find_filter(key).ok_or_else(|| {
            format!(
                "invalid --filter: {} cannot be filtered by '{key}' (available: {})",
                descriptor.name,
                available(&descriptor.filter_keys())
            )
        })?;
        if !crate::query::is_unconstrained(value) && !def.accepts(value) {
            return Err(format!(
                "invalid --filter: '{value}' is not a valid {key} (expected one of: {})",
                def.values.join(", ")
            ));
        }
    }
    Ok(())
}

fn available(keys: &[&str]) -> String {
    if keys.is_empty() {
        "none".to_string()
    } else {
        keys.join(", ")
    }
}

fn validate_format(raw: &str) -> Result<(), String> {
    OutputFormat::parse(raw)
        .map(|_| ())
        .ok_or_else(|| format!("invalid --format '{raw}', expected text or json"))
}

fn validate_id(id: &str) -> Result<(), String> {
    let id = id.trim();
    if id.is_empty() || id.contains('/') || id.contains('?') || id.contains('#') {
        return Err(format!("invalid record id '{id}'"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn check(argv: &[&str]) -> Result<(), String> {
        let args = CliArgs::try_parse_from(argv).map_err(|e| e.to_string())?;
        validate(&args)
    }

    #[test]
    fn accepts_declared_filters() {
        assert!(check(&["hmslist", "list", "facilities", "--filter", "type=clsc"]).is_ok());
        assert!(check(&["hmslist", "list", "facilities", "--filter", "type=all"]).is_ok());
    }

    #[test]
    fn rejects_undeclared_filter_and_bad_value() {
        let err = check(&["hmslist", "list", "infections", "--filter", "role=nurse"]).unwrap_err();
        assert!(err.contains("available: none"));
        let err = check(&["hmslist", "list", "facilities", "--filter", "type=Castle"]).unwrap_err();
        assert!(err.contains("expected one of"));
    }

    #[test]
    fn rejects_zero_page_and_large_page_size() {
        assert!(check(&["hmslist", "list", "persons", "--page", "0"]).is_err());
        assert!(check(&["hmslist", "list", "persons", "--page-size", "101"]).is_err());
        assert!(check(&["hmslist", "list", "persons", "--page-size", "100"]).is_ok());
    }

    #[test]
    fn data_must_be_an_object() {
        assert!(check(&["hmslist", "create", "facilities", "--data", "[]"]).is_err());
        assert!(check(&["hmslist", "update", "facilities", "3", "--data", r#"{"name":"x"}"#]).is_ok());
    }

    #[test]
    fn record_ids_cannot_escape_the_endpoint() {
        assert!(check(&["hmslist", "show", "persons", "../x"]).is_err());
        assert!(check(&["hmslist", "delete", "persons", "123456789"]).is_ok());
    }

    #[test]
    fn format_is_checked() {
        assert!(check(&["hmslist", "list", "persons", "--format", "xml"]).is_err());
        assert!(check(&["hmslist", "stats", "--format", "csv"]).is_err());
        assert!(check(&["hmslist", "stats", "-o", "json"]).is_ok());
    }
}
