use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Coverage type of a policy
///
/// Values the console does not know are kept verbatim in `Other`, so one
/// unexpected record never fails a whole listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyType {
  Liability,
  Collision,
  Comprehensive,
  Other(String),
}

impl PolicyType {
  pub fn as_str(&self) -> &str {
    match self {
      PolicyType::Liability => "LIABILITY",
      PolicyType::Collision => "COLLISION",
      PolicyType::Comprehensive => "COMPREHENSIVE",
      PolicyType::Other(raw) => raw,
    }
  }
}

/// Strict parse for user input; only known types are accepted.
impl FromStr for PolicyType {
  type Err = ValidationError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_uppercase().as_str() {
      "LIABILITY" | "LIAB" => Ok(PolicyType::Liability),
      "COLLISION" | "COLL" => Ok(PolicyType::Collision),
      "COMPREHENSIVE" | "COMP" => Ok(PolicyType::Comprehensive),
      _ => Err(ValidationError::InvalidValue {
        field: "policyType",
        value: s.to_string(),
      }),
    }
  }
}

impl fmt::Display for PolicyType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl Serialize for PolicyType {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(self.as_str())
  }
}

impl<'de> Deserialize<'de> for PolicyType {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let raw = String::deserialize(deserializer)?;
    Ok(raw.parse().unwrap_or(PolicyType::Other(raw)))
  }
}

/// Lifecycle status of a policy
///
/// Unknown statuses are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyStatus {
  Active,
  Expired,
  Cancelled,
  Other(String),
}

impl PolicyStatus {
  pub fn as_str(&self) -> &str {
    match self {
      PolicyStatus::Active => "ACTIVE",
      PolicyStatus::Expired => "EXPIRED",
      PolicyStatus::Cancelled => "CANCELLED",
      PolicyStatus::Other(raw) => raw,
    }
  }
}

/// Strict parse for user input; only known statuses are accepted.
impl FromStr for PolicyStatus {
  type Err = ValidationError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_uppercase().as_str() {
      "ACTIVE" | "ACT" => Ok(PolicyStatus::Active),
      "EXPIRED" | "EXP" => Ok(PolicyStatus::Expired),
      "CANCELLED" | "CAN" => Ok(PolicyStatus::Cancelled),
      _ => Err(ValidationError::InvalidValue {
        field: "status",
        value: s.to_string(),
      }),
    }
  }
}

impl fmt::Display for PolicyStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl Serialize for PolicyStatus {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(self.as_str())
  }
}

impl<'de> Deserialize<'de> for PolicyStatus {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let raw = String::deserialize(deserializer)?;
    Ok(raw.parse().unwrap_or(PolicyStatus::Other(raw)))
  }
}

/// A policy as returned by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRecord {
  pub id: i64,
  pub policy_number: String,
  #[serde(default)]
  pub first_name: Option<String>,
  #[serde(default)]
  pub last_name: Option<String>,
  #[serde(default)]
  pub vehicle_make: Option<String>,
  #[serde(default)]
  pub vehicle_model: Option<String>,
  #[serde(default)]
  pub vehicle_year: Option<i32>,
  #[serde(default)]
  pub policy_type: Option<PolicyType>,
  #[serde(default)]
  pub status: Option<PolicyStatus>,
  #[serde(default, deserialize_with = "deserialize_amount")]
  pub premium_amount: Option<f64>,
  #[serde(default)]
  pub start_date: Option<NaiveDate>,
  #[serde(default)]
  pub end_date: Option<NaiveDate>,
}

impl PolicyRecord {
  /// "First Last", skipping missing parts
  pub fn owner(&self) -> String {
    [self.first_name.as_deref(), self.last_name.as_deref()]
      .into_iter()
      .flatten()
      .collect::<Vec<_>>()
      .join(" ")
  }

  /// "Make Model (Year)", skipping missing parts
  pub fn vehicle(&self) -> String {
    let mut parts: Vec<String> = [self.vehicle_make.as_deref(), self.vehicle_model.as_deref()]
      .into_iter()
      .flatten()
      .map(String::from)
      .collect();
    if let Some(year) = self.vehicle_year {
      parts.push(format!("({})", year));
    }
    parts.join(" ")
  }
}

/// Accept premium amounts sent either as JSON numbers or numeric strings.
fn deserialize_amount<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
  D: Deserializer<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum Amount {
    Number(f64),
    Text(String),
  }

  match Option::<Amount>::deserialize(deserializer)? {
    None => Ok(None),
    Some(Amount::Number(n)) => Ok(Some(n)),
    Some(Amount::Text(s)) if s.trim().is_empty() => Ok(None),
    Some(Amount::Text(s)) => s
      .trim()
      .parse::<f64>()
      .map(Some)
      .map_err(serde::de::Error::custom),
  }
}

/// Body sent when creating or updating a policy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDraft {
  pub policy_number: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub first_name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub last_name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub vehicle_make: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub vehicle_model: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub vehicle_year: Option<i32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub policy_type: Option<PolicyType>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub status: Option<PolicyStatus>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub premium_amount: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub start_date: Option<NaiveDate>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub end_date: Option<NaiveDate>,
}

impl PolicyDraft {
  /// Check client-side invariants before anything is sent.
  pub fn validate(&self) -> Result<(), ValidationError> {
    if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
      if start >= end {
        return Err(ValidationError::EndBeforeStart { start, end });
      }
    }
    Ok(())
  }

  /// Overlay every field set in `changes` onto this draft.
  ///
  /// The policy number is a business key and is never changed by an overlay.
  pub fn apply(&mut self, changes: PolicyDraft) {
    let PolicyDraft {
      policy_number: _,
      first_name,
      last_name,
      vehicle_make,
      vehicle_model,
      vehicle_year,
      policy_type,
      status,
      premium_amount,
      start_date,
      end_date,
    } = changes;

    self.first_name = first_name.or(self.first_name.take());
    self.last_name = last_name.or(self.last_name.take());
    self.vehicle_make = vehicle_make.or(self.vehicle_make.take());
    self.vehicle_model = vehicle_model.or(self.vehicle_model.take());
    self.vehicle_year = vehicle_year.or(self.vehicle_year);
    self.policy_type = policy_type.or(self.policy_type.take());
    self.status = status.or(self.status.take());
    self.premium_amount = premium_amount.or(self.premium_amount);
    self.start_date = start_date.or(self.start_date);
    self.end_date = end_date.or(self.end_date);
  }
}

impl From<PolicyRecord> for PolicyDraft {
  fn from(record: PolicyRecord) -> Self {
    Self {
      policy_number: record.policy_number,
      first_name: record.first_name,
      last_name: record.last_name,
      vehicle_make: record.vehicle_make,
      vehicle_model: record.vehicle_model,
      vehicle_year: record.vehicle_year,
      policy_type: record.policy_type,
      status: record.status,
      premium_amount: record.premium_amount,
      start_date: record.start_date,
      end_date: record.end_date,
    }
  }
}
