//! Cache keys for policy reads.

use crate::cache::QueryKey;

use super::filter::BuiltQuery;

/// Entity family shared by every policy read. Mutations evict the whole family.
pub const POLICY_FAMILY: &str = "policy";

/// Query key types for policy API calls.
#[derive(Clone, Debug)]
pub enum PolicyQueryKey {
  /// List every policy
  All,
  /// Single policy by server id
  ById { id: i64 },
  /// Single policy by business key
  ByNumber { policy_number: String },
  /// Filtered search; `params` is the canonical sorted fingerprint from the query builder
  Filter { params: String },
}

impl PolicyQueryKey {
  pub fn filter(query: &BuiltQuery) -> Self {
    Self::Filter {
      params: query.fingerprint.clone(),
    }
  }
}

impl QueryKey for PolicyQueryKey {
  fn fingerprint(&self) -> String {
    match self {
      Self::All => format!("{}:all", POLICY_FAMILY),
      Self::ById { id } => format!("{}:id:{}", POLICY_FAMILY, id),
      Self::ByNumber { policy_number } => {
        format!("{}:number:{}", POLICY_FAMILY, policy_number.trim())
      }
      Self::Filter { params } => format!("{}:filter:{}", POLICY_FAMILY, params),
    }
  }

  fn family(&self) -> &'static str {
    POLICY_FAMILY
  }

  fn description(&self) -> String {
    match self {
      Self::All => "all policies".to_string(),
      Self::ById { id } => format!("policy #{}", id),
      Self::ByNumber { policy_number } => format!("policy {}", policy_number),
      Self::Filter { params } if params.is_empty() => "policies (no filters)".to_string(),
      Self::Filter { params } => format!("policies matching {}", params),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::policy::filter::{build, FilterCriteria};

  #[test]
  fn test_fingerprints_are_distinct_per_operation() {
    let keys = [
      PolicyQueryKey::All.fingerprint(),
      PolicyQueryKey::ById { id: 7 }.fingerprint(),
      PolicyQueryKey::ByNumber {
        policy_number: "7".to_string(),
      }
      .fingerprint(),
      PolicyQueryKey::Filter {
        params: String::new(),
      }
      .fingerprint(),
    ];

    for (i, a) in keys.iter().enumerate() {
      assert!(a.starts_with("policy:"));
      for b in keys.iter().skip(i + 1) {
        assert_ne!(a, b);
      }
    }
  }

  #[test]
  fn test_filter_key_follows_query_builder() {
    let a = FilterCriteria::from_pairs([("status", "ACTIVE"), ("lastName", "Doe")]).unwrap();
    let b = FilterCriteria::from_pairs([("lastName", "Doe"), ("status", "ACTIVE")]).unwrap();

    assert_eq!(
      PolicyQueryKey::filter(&build(&a)).fingerprint(),
      PolicyQueryKey::filter(&build(&b)).fingerprint()
    );
    assert_eq!(
      PolicyQueryKey::filter(&build(&a)).fingerprint(),
      "policy:filter:lastName=Doe&status=ACTIVE"
    );
  }
}
