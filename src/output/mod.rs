use std::collections::BTreeMap;

use itertools::Itertools;
use serde::Serialize;
use serde_json::Value;

use crate::controller::ListState;
use crate::entity::EntityDescriptor;
use crate::stats::DashboardStats;
use crate::utils;

const MAX_CELL_WIDTH: usize = 28;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "text" | "txt" | "table" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FilterOption {
    pub value: String,
    pub count: usize,
}

/// Distinct values of `key` among the loaded records, with how many records
/// carry each one. Records without the field are skipped.
pub fn filter_options(items: &[Value], key: &str) -> Vec<FilterOption> {
    items
        .iter()
        .filter_map(|item| item.get(key))
        .filter(|v| !v.is_null())
        .map(|v| utils::cell_text(Some(v)))
        .filter(|v| v != "-")
        .counts()
        .into_iter()
        .map(|(value, count)| FilterOption { value, count })
        .sorted_by(|a, b| a.value.cmp(&b.value))
        .collect()
}

/// Records bucketed by the text of `field`, buckets in ascending order.
/// Within a bucket the server order is kept.
pub fn group_by_field<'a>(items: &'a [Value], field: &str) -> BTreeMap<String, Vec<&'a Value>> {
    let mut groups: BTreeMap<String, Vec<&'a Value>> = BTreeMap::new();
    for item in items {
        let key = utils::cell_text(item.get(field));
        groups.entry(key).or_default().push(item);
    }
    groups
}

pub fn results_header<T>(state: &ListState<T>) -> Option<String> {
    let filters = state.active_filter_count();
    let search = state.debounced_search_term.trim();
    if search.is_empty() && filters == 0 {
        return None;
    }
    let mut out = format!(
        "{} result{} found",
        state.total_count,
        if state.total_count == 1 { "" } else { "s" }
    );
    if !search.is_empty() {
        out.push_str(&format!(" for \"{search}\""));
    }
    if filters > 0 {
        out.push_str(&format!(
            " with {} filter{} applied",
            filters,
            if filters == 1 { "" } else { "s" }
        ));
    }
    Some(out)
}

fn column_widths(columns: &[String], rows: &[Vec<String>]) -> Vec<usize> {
    columns
        .iter()
        .enumerate()
        .map(|(i, c)| {
            rows.iter()
                .map(|r| r[i].chars().count())
                .chain(std::iter::once(c.chars().count()))
                .max()
                .unwrap_or(0)
                .min(MAX_CELL_WIDTH)
        })
        .collect()
}

fn render_table(columns: &[String], items: &[&Value]) -> String {
    let rows: Vec<Vec<String>> = items
        .iter()
        .map(|item| {
            columns
                .iter()
                .map(|c| utils::cell_text(item.get(c.as_str())))
                .collect()
        })
        .collect();
    let widths = column_widths(columns, &rows);
    let line = |cells: &[String]| {
        cells
            .iter()
            .zip(widths.iter())
            .map(|(cell, w)| format!("{:<w$}", utils::truncate_cell(cell, *w), w = *w))
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = String::new();
    out.push_str(&line(columns));
    out.push('\n');
    out.push_str(&widths.iter().map(|w| "-".repeat(*w)).join("  "));
    out.push('\n');
    for row in rows.iter() {
        out.push_str(&line(row));
        out.push('\n');
    }
    out
}

fn render_pagination<T>(state: &ListState<T>) -> String {
    let p = state.pagination();
    let mut out = String::new();
    if let Some((first, last)) = p.item_range(state.items.len()) {
        out.push_str(&format!(
            "Showing {first}-{last} of {} :: page {}/{}",
            p.total_count, p.current_page, p.total_pages
        ));
    }
    if !p.is_inert() {
        let strip = p
            .pages()
            .into_iter()
            .map(|page| match page {
                Some(n) if n == p.current_page => format!("[{n}]"),
                Some(n) => n.to_string(),
                None => "…".to_string(),
            })
            .join(" ");
        out.push_str("  ");
        if p.has_previous() {
            out.push_str("< prev  ");
        }
        out.push_str(&strip);
        if p.has_next() {
            out.push_str("  next >");
        }
    }
    out.push('\n');
    out
}

pub fn render_list_text(descriptor: &EntityDescriptor, state: &ListState<Value>) -> String {
    let mut out = String::new();
    if let Some(error) = state.error.as_deref() {
        out.push_str(error);
        out.push('\n');
        return out;
    }
    if state.loading && state.items.is_empty() {
        out.push_str(&format!("Loading {}...\n", descriptor.name));
        return out;
    }
    if let Some(header) = results_header(state) {
        out.push_str(&header);
        out.push('\n');
    }
    if state.items.is_empty() {
        out.push_str(&format!("No {} found\n", descriptor.name));
        if results_header(state).is_some() {
            out.push_str("Try adjusting your search or filters\n");
        }
        return out;
    }
    let items: Vec<&Value> = state.items.iter().collect();
    out.push_str(&render_table(&descriptor.columns, &items));
    out.push_str(&render_pagination(state));
    out
}

/// Same list, one table per distinct value of `field` (e.g. a schedule's
/// date).
pub fn render_grouped_text(
    descriptor: &EntityDescriptor,
    state: &ListState<Value>,
    field: &str,
) -> String {
    if state.error.is_some() || state.items.is_empty() {
        return render_list_text(descriptor, state);
    }
    let mut out = String::new();
    if let Some(header) = results_header(state) {
        out.push_str(&header);
        out.push('\n');
    }
    let columns: Vec<String> = descriptor
        .columns
        .iter()
        .filter(|c| c.as_str() != field)
        .cloned()
        .collect();
    for (key, items) in group_by_field(&state.items, field) {
        out.push_str(&format!("== {key} ({}) ==\n", items.len()));
        out.push_str(&render_table(&columns, &items));
        out.push('\n');
    }
    out.push_str(&render_pagination(state));
    out
}

pub fn render_filter_options(descriptor: &EntityDescriptor, items: &[Value]) -> String {
    let mut out = String::new();
    for def in descriptor.filters.iter() {
        out.push_str(&format!("{} ({}):\n", def.label, def.key));
        let options = filter_options(items, &def.key);
        if options.is_empty() && !def.values.is_empty() {
            for v in def.values.iter() {
                out.push_str(&format!("  {v}\n"));
            }
        }
        for o in options {
            out.push_str(&format!("  {} ({})\n", o.value, o.count));
        }
    }
    out
}

pub fn render_record(descriptor: &EntityDescriptor, record: &Value) -> String {
    let mut out = String::new();
    match record.as_object() {
        Some(map) => {
            let width = map.keys().map(|k| k.chars().count()).max().unwrap_or(0);
            let id = utils::cell_text(record.get(descriptor.id_field.as_str()));
            out.push_str(&format!(":: {} {} ::\n", descriptor.name, id));
            for (k, v) in map {
                out.push_str(&format!("{:<width$}  {}\n", k, utils::cell_text(Some(v))));
            }
        }
        None => {
            out.push_str(&utils::cell_text(Some(record)));
            out.push('\n');
        }
    }
    out
}

pub fn render_dashboard_text(stats: &DashboardStats) -> String {
    let o = &stats.overview;
    let mut out = String::from(":: dashboard ::\n");
    for (label, value) in [
        ("Persons", o.total_persons),
        ("Employees", o.total_employees),
        ("Facilities", o.total_facilities),
        ("Capacity", o.total_capacity),
    ] {
        out.push_str(&format!("{label:<12}{value}\n"));
    }
    let dob = &stats.birth_dates;
    out.push_str(&format!(
        "{:<12}{} known, {} missing\n",
        "Birth dates", dob.has_dob, dob.no_dob
    ));
    for (title, shares) in stats.distributions() {
        if shares.is_empty() {
            continue;
        }
        out.push_str(&format!("\n{title}:\n"));
        let width = shares
            .iter()
            .map(|s| s.label_text().chars().count())
            .max()
            .unwrap_or(0);
        for share in shares {
            out.push_str(&format!("  {:<width$}  {}\n", share.label_text(), share.count));
        }
    }
    out
}

pub fn render_json<S: Serialize>(value: &S) -> Vec<u8> {
    let mut out = serde_json::to_vec_pretty(value).unwrap_or_else(|_| b"null".to_vec());
    out.push(b'\n');
    out
}
