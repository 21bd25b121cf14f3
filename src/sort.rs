//! Column sorting for policy result sets.
//!
//! Each sortable field declares how it compares: numerically, by date, or as
//! case-insensitive text. Sorting is stable. Records with no value for the
//! sort field are never moved; only records that have a value are reordered
//! among the remaining positions.

use chrono::NaiveDate;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::policy::types::{PolicyRecord, PolicyStatus, PolicyType};

/// How a field's values compare
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
  Numeric,
  Date,
  Text,
}

impl FieldKind {
  pub fn label(&self) -> &'static str {
    match self {
      FieldKind::Numeric => "number",
      FieldKind::Date => "date",
      FieldKind::Text => "text",
    }
  }
}

/// Sortable policy columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
  Id,
  PolicyNumber,
  Status,
  PolicyType,
  VehicleMake,
  VehicleModel,
  VehicleYear,
  FirstName,
  LastName,
  StartDate,
  EndDate,
  PremiumAmount,
}

/// A comparable value pulled out of a record
#[derive(Debug, Clone, PartialEq)]
enum SortValue {
  Number(f64),
  Date(NaiveDate),
  Text(String),
}

impl SortValue {
  fn compare(&self, other: &SortValue) -> Ordering {
    match (self, other) {
      (SortValue::Number(a), SortValue::Number(b)) => a.total_cmp(b),
      (SortValue::Date(a), SortValue::Date(b)) => a.cmp(b),
      (SortValue::Text(a), SortValue::Text(b)) => a.cmp(b),
      // One field always yields one kind, so mixed pairs never meet
      _ => Ordering::Equal,
    }
  }
}

impl SortField {
  pub const ALL: &'static [SortField] = &[
    SortField::Id,
    SortField::PolicyNumber,
    SortField::Status,
    SortField::PolicyType,
    SortField::VehicleMake,
    SortField::VehicleModel,
    SortField::VehicleYear,
    SortField::FirstName,
    SortField::LastName,
    SortField::StartDate,
    SortField::EndDate,
    SortField::PremiumAmount,
  ];

  /// Wire name of the column
  pub fn name(&self) -> &'static str {
    match self {
      SortField::Id => "id",
      SortField::PolicyNumber => "policyNumber",
      SortField::Status => "status",
      SortField::PolicyType => "policyType",
      SortField::VehicleMake => "vehicleMake",
      SortField::VehicleModel => "vehicleModel",
      SortField::VehicleYear => "vehicleYear",
      SortField::FirstName => "firstName",
      SortField::LastName => "lastName",
      SortField::StartDate => "startDate",
      SortField::EndDate => "endDate",
      SortField::PremiumAmount => "premiumAmount",
    }
  }

  /// Declared comparison type; this alone decides how the column sorts.
  pub fn kind(&self) -> FieldKind {
    match self {
      SortField::Id | SortField::VehicleYear | SortField::PremiumAmount => FieldKind::Numeric,
      SortField::StartDate | SortField::EndDate => FieldKind::Date,
      _ => FieldKind::Text,
    }
  }

  fn extract(&self, record: &PolicyRecord) -> Option<SortValue> {
    match self.kind() {
      FieldKind::Numeric => self.number(record).map(SortValue::Number),
      FieldKind::Date => self.date(record).map(SortValue::Date),
      FieldKind::Text => self.text(record).map(|s| SortValue::Text(s.to_lowercase())),
    }
  }

  fn number(&self, record: &PolicyRecord) -> Option<f64> {
    match self {
      SortField::Id => Some(record.id as f64),
      SortField::VehicleYear => record.vehicle_year.map(f64::from),
      SortField::PremiumAmount => record.premium_amount,
      _ => None,
    }
  }

  fn date(&self, record: &PolicyRecord) -> Option<NaiveDate> {
    match self {
      SortField::StartDate => record.start_date,
      SortField::EndDate => record.end_date,
      _ => None,
    }
  }

  fn text<'a>(&self, record: &'a PolicyRecord) -> Option<&'a str> {
    match self {
      SortField::PolicyNumber => Some(&record.policy_number),
      SortField::Status => record.status.as_ref().map(PolicyStatus::as_str),
      SortField::PolicyType => record.policy_type.as_ref().map(PolicyType::as_str),
      SortField::VehicleMake => record.vehicle_make.as_deref(),
      SortField::VehicleModel => record.vehicle_model.as_deref(),
      SortField::FirstName => record.first_name.as_deref(),
      SortField::LastName => record.last_name.as_deref(),
      _ => None,
    }
  }
}

impl FromStr for SortField {
  type Err = ValidationError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let wanted: String = s
      .trim()
      .chars()
      .filter(|c| *c != '_' && *c != '-')
      .collect::<String>()
      .to_lowercase();
    SortField::ALL
      .iter()
      .copied()
      .find(|field| field.name().to_lowercase() == wanted)
      .ok_or_else(|| ValidationError::UnknownSortField(s.to_string()))
  }
}

impl fmt::Display for SortField {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
  #[default]
  Ascending,
  Descending,
}

impl SortDirection {
  pub fn flipped(self) -> Self {
    match self {
      SortDirection::Ascending => SortDirection::Descending,
      SortDirection::Descending => SortDirection::Ascending,
    }
  }

  pub fn arrow(&self) -> &'static str {
    match self {
      SortDirection::Ascending => "▲",
      SortDirection::Descending => "▼",
    }
  }
}

/// Current column sort of a result view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortState {
  pub field: Option<SortField>,
  pub direction: SortDirection,
}

impl SortState {
  /// Select a column: the same column flips direction, a new one starts ascending.
  pub fn toggle(&mut self, field: SortField) {
    if self.field == Some(field) {
      self.direction = self.direction.flipped();
    } else {
      self.field = Some(field);
      self.direction = SortDirection::Ascending;
    }
  }

  /// Sorted copy of `records`, or an unchanged copy when no column is selected.
  pub fn apply(&self, records: &[PolicyRecord]) -> Vec<PolicyRecord> {
    match self.field {
      Some(field) => sort(records, field, self.direction),
      None => records.to_vec(),
    }
  }
}

/// Stable sort by one column, returning a new sequence.
pub fn sort(records: &[PolicyRecord], field: SortField, direction: SortDirection) -> Vec<PolicyRecord> {
  let mut valued: Vec<(SortValue, &PolicyRecord)> = Vec::new();
  let mut slots: Vec<Option<&PolicyRecord>> = Vec::with_capacity(records.len());

  for record in records {
    match field.extract(record) {
      Some(value) => {
        valued.push((value, record));
        slots.push(None);
      }
      None => slots.push(Some(record)),
    }
  }

  valued.sort_by(|(a, _), (b, _)| match direction {
    SortDirection::Ascending => a.compare(b),
    SortDirection::Descending => b.compare(a),
  });

  let mut ordered = valued.into_iter().map(|(_, record)| record);
  slots
    .into_iter()
    .filter_map(|slot| slot.or_else(|| ordered.next()))
    .cloned()
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn policy(id: i64, number: &str) -> PolicyRecord {
    PolicyRecord {
      id,
      policy_number: number.to_string(),
      first_name: None,
      last_name: None,
      vehicle_make: None,
      vehicle_model: None,
      vehicle_year: None,
      policy_type: None,
      status: None,
      premium_amount: None,
      start_date: None,
      end_date: None,
    }
  }

  fn with_premium(id: i64, premium: f64) -> PolicyRecord {
    PolicyRecord {
      premium_amount: Some(premium),
      ..policy(id, &format!("AP-{}", id))
    }
  }

  fn with_last_name(id: i64, name: &str) -> PolicyRecord {
    PolicyRecord {
      last_name: Some(name.to_string()),
      ..policy(id, &format!("AP-{}", id))
    }
  }

  fn ids(records: &[PolicyRecord]) -> Vec<i64> {
    records.iter().map(|r| r.id).collect()
  }

  #[test]
  fn test_premium_sorts_numerically() {
    let records: Vec<PolicyRecord> =
      serde_json::from_str(r#"[{"id":1,"policyNumber":"A","premiumAmount":"100"},{"id":2,"policyNumber":"B","premiumAmount":"20"}]"#)
        .unwrap();
    let sorted = sort(&records, SortField::PremiumAmount, SortDirection::Ascending);
    assert_eq!(ids(&sorted), vec![2, 1]);
  }

  #[test]
  fn test_ids_sort_numerically_not_lexicographically() {
    let records = vec![policy(10, "X"), policy(9, "Y")];
    let sorted = sort(&records, SortField::Id, SortDirection::Ascending);
    assert_eq!(ids(&sorted), vec![9, 10]);
  }

  #[test]
  fn test_policy_numbers_sort_as_text() {
    let records = vec![policy(1, "AP-100"), policy(2, "AP-20"), policy(3, "ap-1")];
    let sorted = sort(&records, SortField::PolicyNumber, SortDirection::Ascending);
    assert_eq!(ids(&sorted), vec![3, 1, 2]);
  }

  #[test]
  fn test_text_is_case_insensitive() {
    let records = vec![with_last_name(1, "smith"), with_last_name(2, "Adams"), with_last_name(3, "baker")];
    let sorted = sort(&records, SortField::LastName, SortDirection::Ascending);
    assert_eq!(ids(&sorted), vec![2, 3, 1]);
  }

  #[test]
  fn test_ties_keep_prior_order() {
    let records = vec![
      with_premium(1, 50.0),
      with_premium(2, 10.0),
      with_premium(3, 50.0),
      with_premium(4, 10.0),
    ];
    let asc = sort(&records, SortField::PremiumAmount, SortDirection::Ascending);
    assert_eq!(ids(&asc), vec![2, 4, 1, 3]);

    let desc = sort(&records, SortField::PremiumAmount, SortDirection::Descending);
    assert_eq!(ids(&desc), vec![1, 3, 2, 4]);
  }

  #[test]
  fn test_missing_values_stay_in_place() {
    let records = vec![
      with_premium(1, 300.0),
      policy(2, "AP-2"),
      with_premium(3, 100.0),
      with_premium(4, 200.0),
    ];
    let sorted = sort(&records, SortField::PremiumAmount, SortDirection::Ascending);
    assert_eq!(ids(&sorted), vec![3, 2, 4, 1]);
  }

  #[test]
  fn test_all_missing_is_identity() {
    let records = vec![policy(3, "C"), policy(1, "A"), policy(2, "B")];
    let sorted = sort(&records, SortField::StartDate, SortDirection::Descending);
    assert_eq!(ids(&sorted), vec![3, 1, 2]);
  }

  #[test]
  fn test_dates_sort_chronologically() {
    let mut a = policy(1, "A");
    a.start_date = NaiveDate::from_ymd_opt(2024, 11, 1);
    let mut b = policy(2, "B");
    b.start_date = NaiveDate::from_ymd_opt(2024, 2, 15);
    let sorted = sort(&[a, b], SortField::StartDate, SortDirection::Ascending);
    assert_eq!(ids(&sorted), vec![2, 1]);
  }

  #[test]
  fn test_toggle_flips_same_field_and_resets_on_new_field() {
    let mut state = SortState::default();

    state.toggle(SortField::PremiumAmount);
    assert_eq!(state.direction, SortDirection::Ascending);

    state.toggle(SortField::PremiumAmount);
    assert_eq!(state.direction, SortDirection::Descending);

    state.toggle(SortField::LastName);
    assert_eq!(state.field, Some(SortField::LastName));
    assert_eq!(state.direction, SortDirection::Ascending);
  }

  #[test]
  fn test_sorting_twice_by_same_field_reverses() {
    let records = vec![with_premium(1, 5.0), with_premium(2, 1.0), with_premium(3, 3.0)];
    let mut state = SortState::default();

    state.toggle(SortField::PremiumAmount);
    assert_eq!(ids(&state.apply(&records)), vec![2, 3, 1]);

    state.toggle(SortField::PremiumAmount);
    assert_eq!(ids(&state.apply(&records)), vec![1, 3, 2]);
  }

  #[test]
  fn test_field_names_parse_in_any_case() {
    assert_eq!("premiumAmount".parse::<SortField>().unwrap(), SortField::PremiumAmount);
    assert_eq!("premium_amount".parse::<SortField>().unwrap(), SortField::PremiumAmount);
    assert_eq!("ID".parse::<SortField>().unwrap(), SortField::Id);
    assert!("colour".parse::<SortField>().is_err());
  }

  #[test]
  fn test_declared_kinds() {
    assert_eq!(SortField::PremiumAmount.kind(), FieldKind::Numeric);
    assert_eq!(SortField::PolicyNumber.kind(), FieldKind::Text);
    assert_eq!(SortField::EndDate.kind(), FieldKind::Date);
  }

  #[test]
  fn test_every_field_extracts_a_value_of_its_kind() {
    let record: PolicyRecord = serde_json::from_value(serde_json::json!({
      "id": 1,
      "policyNumber": "AP-1",
      "firstName": "Jane",
      "lastName": "Doe",
      "vehicleMake": "Toyota",
      "vehicleModel": "Corolla",
      "vehicleYear": 2019,
      "policyType": "COLLISION",
      "status": "PENDING",
      "premiumAmount": 10.5,
      "startDate": "2024-01-01",
      "endDate": "2025-01-01"
    }))
    .unwrap();

    for field in SortField::ALL {
      let value = field.extract(&record);
      let kind = match value {
        Some(SortValue::Number(_)) => FieldKind::Numeric,
        Some(SortValue::Date(_)) => FieldKind::Date,
        Some(SortValue::Text(_)) => FieldKind::Text,
        None => panic!("{} extracted nothing", field),
      };
      assert_eq!(kind, field.kind(), "{}", field);
    }
  }

  #[test]
  fn test_unknown_status_sorts_as_text() {
    let records: Vec<PolicyRecord> = serde_json::from_str(
      r#"[{"id":1,"policyNumber":"A","status":"PENDING"},{"id":2,"policyNumber":"B","status":"ACTIVE"}]"#,
    )
    .unwrap();
    let sorted = sort(&records, SortField::Status, SortDirection::Ascending);
    assert_eq!(ids(&sorted), vec![2, 1]);
  }
}
