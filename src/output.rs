//! Plain-text rendering of policy results.

use std::fmt::Write;

use crate::cache::CacheSource;
use crate::policy::types::PolicyRecord;
use crate::sort::{SortField, SortState};

const NO_RESULTS: &str = "No policies found.";

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Extract host (and port) from the backend URL
pub fn extract_host(url: &str) -> &str {
  url
    .strip_prefix("https://")
    .or_else(|| url.strip_prefix("http://"))
    .unwrap_or(url)
    .split('/')
    .next()
    .unwrap_or(url)
}

fn source_note(source: CacheSource) -> Option<&'static str> {
  match source {
    CacheSource::Network | CacheSource::Cache => None,
    CacheSource::Offline => Some("backend unreachable, showing expired cached results"),
    CacheSource::Unavailable => Some("backend unreachable, no cached results"),
  }
}

/// Footer line such as "3 policies (cache, 12s old)"
pub fn summary(count: usize, source: CacheSource, age: Option<chrono::Duration>) -> String {
  let noun = if count == 1 { "policy" } else { "policies" };
  let mut line = format!("{} {} ({}", count, noun, source.label());
  if let Some(age) = age.filter(|_| source != CacheSource::Network) {
    line.push_str(&format!(", {}s old", age.num_seconds()));
  }
  line.push(')');
  if let Some(note) = source_note(source) {
    line.push_str(&format!("; {}", note));
  }
  line
}

struct Column {
  title: &'static str,
  field: SortField,
  max_width: usize,
  value: fn(&PolicyRecord) -> String,
}

fn opt<T: ToString>(value: &Option<T>) -> String {
  value.as_ref().map(ToString::to_string).unwrap_or_default()
}

const COLUMNS: &[Column] = &[
  Column {
    title: "ID",
    field: SortField::Id,
    max_width: 8,
    value: |r| r.id.to_string(),
  },
  Column {
    title: "POLICY #",
    field: SortField::PolicyNumber,
    max_width: 16,
    value: |r| r.policy_number.clone(),
  },
  Column {
    title: "OWNER",
    field: SortField::LastName,
    max_width: 24,
    value: |r| r.owner(),
  },
  Column {
    title: "VEHICLE",
    field: SortField::VehicleMake,
    max_width: 28,
    value: |r| r.vehicle(),
  },
  Column {
    title: "TYPE",
    field: SortField::PolicyType,
    max_width: 13,
    value: |r| opt(&r.policy_type),
  },
  Column {
    title: "STATUS",
    field: SortField::Status,
    max_width: 9,
    value: |r| opt(&r.status),
  },
  Column {
    title: "PREMIUM",
    field: SortField::PremiumAmount,
    max_width: 12,
    value: |r| r.premium_amount.map(|p| format!("{:.2}", p)).unwrap_or_default(),
  },
  Column {
    title: "START",
    field: SortField::StartDate,
    max_width: 10,
    value: |r| opt(&r.start_date),
  },
  Column {
    title: "END",
    field: SortField::EndDate,
    max_width: 10,
    value: |r| opt(&r.end_date),
  },
];

/// Render records as an aligned table. The sorted column's header carries an arrow.
pub fn render_table(records: &[PolicyRecord], sort: SortState) -> String {
  if records.is_empty() {
    return format!("{}\n", NO_RESULTS);
  }

  let headers: Vec<String> = COLUMNS
    .iter()
    .map(|c| match sort.field {
      Some(field) if field == c.field => format!("{} {}", c.title, sort.direction.arrow()),
      _ => c.title.to_string(),
    })
    .collect();

  let rows: Vec<Vec<String>> = records
    .iter()
    .map(|r| {
      COLUMNS
        .iter()
        .map(|c| truncate(&(c.value)(r), c.max_width))
        .collect()
    })
    .collect();

  let widths: Vec<usize> = headers
    .iter()
    .enumerate()
    .map(|(i, h)| {
      rows
        .iter()
        .map(|row| row[i].chars().count())
        .chain(std::iter::once(h.chars().count()))
        .max()
        .unwrap_or_default()
    })
    .collect();

  let mut out = String::new();
  for line in std::iter::once(&headers).chain(rows.iter()) {
    let cells: Vec<String> = line
      .iter()
      .zip(&widths)
      .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
      .collect();
    let _ = writeln!(out, "{}", cells.join("  ").trim_end());
  }
  out
}
