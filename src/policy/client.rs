use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::ApiConfig;
use crate::error::{Error, Result, ValidationError};

use super::filter::BuiltQuery;
use super::types::{PolicyDraft, PolicyRecord};

const USER_AGENT: &str = concat!("pdesk/", env!("CARGO_PKG_VERSION"));

/// Policy backend REST client
#[derive(Clone)]
pub struct PolicyClient {
  http: reqwest::Client,
  base: Url,
}

impl PolicyClient {
  pub fn new(config: &ApiConfig) -> Result<Self> {
    let base = Url::parse(config.url.trim_end_matches('/')).map_err(|_| {
      ValidationError::InvalidValue {
        field: "api.url",
        value: config.url.clone(),
      }
    })?;
    if base.cannot_be_a_base() {
      return Err(
        ValidationError::InvalidValue {
          field: "api.url",
          value: config.url.clone(),
        }
        .into(),
      );
    }

    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .user_agent(USER_AGENT)
      .build()?;

    Ok(Self { http, base })
  }

  pub fn base_url(&self) -> &str {
    self.base.as_str()
  }

  /// Base URL with extra path segments, each percent-encoded.
  fn endpoint(&self, segments: &[&str]) -> Url {
    let mut url = self.base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
      path.pop_if_empty().extend(segments);
    }
    url
  }

  /// Send a request, turning any non-2xx status into `Error::Http`.
  async fn send(&self, request: RequestBuilder) -> Result<Response> {
    let response = request.send().await?;
    let status = response.status();
    if status.is_success() {
      return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(Error::Http {
      status: status.as_u16(),
      body,
    })
  }

  async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
  }

  async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
    debug!(url = %url, "GET");
    let response = self.send(self.http.request(Method::GET, url)).await?;
    Self::read_json(response).await
  }

  /// Singular lookup: 404 means "no such policy", not a failure.
  async fn get_optional(&self, url: Url) -> Result<Option<PolicyRecord>> {
    match self.get_json(url).await {
      Ok(record) => Ok(Some(record)),
      Err(Error::Http { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => Ok(None),
      Err(e) => Err(e),
    }
  }

  /// List every policy
  pub async fn get_all(&self) -> Result<Vec<PolicyRecord>> {
    self.get_json(self.base.clone()).await
  }

  /// Get a single policy by server id
  pub async fn get_by_id(&self, id: i64) -> Result<Option<PolicyRecord>> {
    self.get_optional(self.endpoint(&[&id.to_string()])).await
  }

  /// Get a single policy by its policy number
  pub async fn get_by_policy_number(&self, policy_number: &str) -> Result<Option<PolicyRecord>> {
    let policy_number = policy_number.trim();
    if policy_number.is_empty() {
      return Ok(None);
    }
    self
      .get_optional(self.endpoint(&["policyNumber", policy_number]))
      .await
  }

  /// Search with the non-empty filters of a built query
  pub async fn get_filtered(&self, query: &BuiltQuery) -> Result<Vec<PolicyRecord>> {
    let mut url = self.endpoint(&["filter"]);
    if !query.query_string.is_empty() {
      url.set_query(Some(&query.query_string));
    }
    self.get_json(url).await
  }

  /// Create a policy, returning the stored record
  pub async fn create(&self, draft: &PolicyDraft) -> Result<PolicyRecord> {
    let url = self.base.clone();
    debug!(url = %url, policy_number = %draft.policy_number, "POST");
    let response = self
      .send(self.http.request(Method::POST, url).json(draft))
      .await?;
    Self::read_json(response).await
  }

  /// Replace a policy, returning the updated record
  pub async fn update(&self, id: i64, draft: &PolicyDraft) -> Result<PolicyRecord> {
    let url = self.endpoint(&[&id.to_string()]);
    debug!(url = %url, "PUT");
    let response = self
      .send(self.http.request(Method::PUT, url).json(draft))
      .await?;
    Self::read_json(response).await
  }

  /// Delete a policy. The response body is ignored.
  pub async fn delete(&self, id: i64) -> Result<()> {
    let url = self.endpoint(&[&id.to_string()]);
    debug!(url = %url, "DELETE");
    self.send(self.http.request(Method::DELETE, url)).await?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::policy::filter::{build, FilterCriteria};
  use serde_json::json;
  use wiremock::matchers::{body_json, method, path, query_param};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn client_for(server: &MockServer) -> PolicyClient {
    PolicyClient::new(&ApiConfig {
      url: format!("{}/api/v1/policies", server.uri()),
      timeout_secs: 5,
    })
    .expect("failed to create client")
  }

  fn record(id: i64, number: &str) -> serde_json::Value {
    json!({ "id": id, "policyNumber": number, "lastName": "Doe", "premiumAmount": 100.0 })
  }

  #[tokio::test]
  async fn test_get_all() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/v1/policies"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([record(1, "AP-1"), record(2, "AP-2")])))
      .mount(&server)
      .await;

    let policies = client_for(&server).get_all().await.unwrap();
    assert_eq!(policies.len(), 2);
    assert_eq!(policies[1].policy_number, "AP-2");
  }

  #[tokio::test]
  async fn test_get_by_id_not_found_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/v1/policies/99"))
      .respond_with(ResponseTemplate::new(404).set_body_string("no policy"))
      .mount(&server)
      .await;

    assert_eq!(client_for(&server).get_by_id(99).await.unwrap(), None);
  }

  #[tokio::test]
  async fn test_policy_number_is_path_encoded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/v1/policies/policyNumber/AP%2F100"))
      .respond_with(ResponseTemplate::new(200).set_body_json(record(5, "AP/100")))
      .mount(&server)
      .await;

    let found = client_for(&server)
      .get_by_policy_number("AP/100")
      .await
      .unwrap()
      .expect("expected a policy");
    assert_eq!(found.id, 5);
  }

  #[tokio::test]
  async fn test_blank_policy_number_skips_network() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .respond_with(ResponseTemplate::new(500))
      .expect(0)
      .mount(&server)
      .await;

    assert_eq!(client_for(&server).get_by_policy_number("  ").await.unwrap(), None);
  }

  #[tokio::test]
  async fn test_filter_sends_only_non_empty_params() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/v1/policies/filter"))
      .and(query_param("lastName", "Doe"))
      .and(query_param("minPremium", "0"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([record(1, "AP-1")])))
      .mount(&server)
      .await;

    let filters =
      FilterCriteria::from_pairs([("firstName", ""), ("lastName", "Doe"), ("minPremium", "0")]).unwrap();
    let policies = client_for(&server).get_filtered(&build(&filters)).await.unwrap();
    assert_eq!(policies.len(), 1);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests[0].url.query(), Some("minPremium=0&lastName=Doe"));
  }

  #[tokio::test]
  async fn test_non_success_carries_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/v1/policies"))
      .respond_with(ResponseTemplate::new(500).set_body_string("database offline"))
      .mount(&server)
      .await;

    match client_for(&server).get_all().await {
      Err(Error::Http { status, body }) => {
        assert_eq!(status, 500);
        assert_eq!(body, "database offline");
      }
      other => panic!("expected Http error, got {:?}", other.map(|v| v.len())),
    }
  }

  #[tokio::test]
  async fn test_malformed_body_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/v1/policies"))
      .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
      .mount(&server)
      .await;

    assert!(matches!(client_for(&server).get_all().await, Err(Error::Decode(_))));
  }

  #[tokio::test]
  async fn test_create_posts_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/api/v1/policies"))
      .and(body_json(json!({ "policyNumber": "AP-9", "lastName": "Doe" })))
      .respond_with(ResponseTemplate::new(201).set_body_json(record(9, "AP-9")))
      .mount(&server)
      .await;

    let draft = PolicyDraft {
      policy_number: "AP-9".to_string(),
      last_name: Some("Doe".to_string()),
      ..Default::default()
    };
    let created = client_for(&server).create(&draft).await.unwrap();
    assert_eq!(created.id, 9);
  }

  #[tokio::test]
  async fn test_update_and_delete_paths() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
      .and(path("/api/v1/policies/4"))
      .respond_with(ResponseTemplate::new(200).set_body_json(record(4, "AP-4")))
      .expect(1)
      .mount(&server)
      .await;
    Mock::given(method("DELETE"))
      .and(path("/api/v1/policies/4"))
      .respond_with(ResponseTemplate::new(204))
      .expect(1)
      .mount(&server)
      .await;

    let client = client_for(&server);
    let draft = PolicyDraft {
      policy_number: "AP-4".to_string(),
      ..Default::default()
    };
    assert_eq!(client.update(4, &draft).await.unwrap().id, 4);
    client.delete(4).await.unwrap();
  }

  #[tokio::test]
  async fn test_unreachable_backend_is_transport_error() {
    let client = PolicyClient::new(&ApiConfig {
      url: "http://127.0.0.1:9/api/v1/policies".to_string(),
      timeout_secs: 1,
    })
    .unwrap();
    assert!(matches!(client.get_all().await, Err(Error::Transport(_))));
  }

  #[test]
  fn test_invalid_base_url_is_rejected() {
    let result = PolicyClient::new(&ApiConfig {
      url: "not a url".to_string(),
      timeout_secs: 1,
    });
    assert!(matches!(result, Err(Error::Validation(_))));
  }
}
