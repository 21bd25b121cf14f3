//! Filter criteria and canonical query construction for policy searches.

use url::form_urlencoded;

use crate::error::ValidationError;

/// Sparse set of search filters.
///
/// Every field is free text as typed by the user. Empty or whitespace-only
/// values mean "unset" and never reach the backend. Note that "0" is a real
/// value (a valid premium bound).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
  pub start_date: Option<String>,
  pub end_date: Option<String>,
  pub status: Option<String>,
  pub policy_type: Option<String>,
  pub vehicle_make: Option<String>,
  pub min_premium: Option<String>,
  pub max_premium: Option<String>,
  pub first_name: Option<String>,
  pub last_name: Option<String>,
  pub policy_number: Option<String>,
}

impl FilterCriteria {
  /// Wire names of every filter, in canonical field order.
  pub const KEYS: [&'static str; 10] = [
    "startDate",
    "endDate",
    "status",
    "type",
    "vehicleMake",
    "minPremium",
    "maxPremium",
    "firstName",
    "lastName",
    "policyNumber",
  ];

  /// Build criteria from `key=value` style pairs in any order.
  ///
  /// Keys are the backend's camelCase names; snake_case spellings are also accepted.
  pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, ValidationError>
  where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<String>,
  {
    let mut criteria = Self::default();
    for (key, value) in pairs {
      criteria.set(key.as_ref(), value)?;
    }
    Ok(criteria)
  }

  /// Set a single field by its wire name.
  pub fn set(&mut self, key: &str, value: impl Into<String>) -> Result<(), ValidationError> {
    let slot = match normalize_key(key).as_str() {
      "startdate" => &mut self.start_date,
      "enddate" => &mut self.end_date,
      "status" => &mut self.status,
      "type" | "policytype" => &mut self.policy_type,
      "vehiclemake" => &mut self.vehicle_make,
      "minpremium" => &mut self.min_premium,
      "maxpremium" => &mut self.max_premium,
      "firstname" => &mut self.first_name,
      "lastname" => &mut self.last_name,
      "policynumber" => &mut self.policy_number,
      _ => return Err(ValidationError::UnknownFilter(key.to_string())),
    };
    *slot = Some(value.into());
    Ok(())
  }

  /// Field values paired with their wire names, in canonical field order.
  fn entries(&self) -> [(&'static str, Option<&str>); 10] {
    [
      ("startDate", self.start_date.as_deref()),
      ("endDate", self.end_date.as_deref()),
      ("status", self.status.as_deref()),
      ("type", self.policy_type.as_deref()),
      ("vehicleMake", self.vehicle_make.as_deref()),
      ("minPremium", self.min_premium.as_deref()),
      ("maxPremium", self.max_premium.as_deref()),
      ("firstName", self.first_name.as_deref()),
      ("lastName", self.last_name.as_deref()),
      ("policyNumber", self.policy_number.as_deref()),
    ]
  }

  /// Non-empty parameters, in canonical field order.
  pub fn params(&self) -> Vec<(&'static str, String)> {
    self
      .entries()
      .into_iter()
      .filter_map(|(name, value)| {
        let value = value?.trim();
        (!value.is_empty()).then(|| (name, value.to_string()))
      })
      .collect()
  }
}

fn normalize_key(key: &str) -> String {
  key
    .trim()
    .chars()
    .filter(|c| *c != '_' && *c != '-')
    .collect::<String>()
    .to_lowercase()
}

/// A filter query ready for the backend and the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltQuery {
  /// Non-empty params in canonical field order
  pub params: Vec<(&'static str, String)>,
  /// URL-encoded query string (no leading `?`)
  pub query_string: String,
  /// Params sorted by key, used for the cache key
  pub fingerprint: String,
}

/// Turn sparse criteria into a canonical query. Pure.
pub fn build(filters: &FilterCriteria) -> BuiltQuery {
  let params = filters.params();

  let query_string = form_urlencoded::Serializer::new(String::new())
    .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())))
    .finish();

  let mut sorted = params.clone();
  sorted.sort_by(|a, b| a.0.cmp(b.0));
  let fingerprint = form_urlencoded::Serializer::new(String::new())
    .extend_pairs(sorted.iter().map(|(k, v)| (*k, v.as_str())))
    .finish();

  BuiltQuery {
    params,
    query_string,
    fingerprint,
  }
}
