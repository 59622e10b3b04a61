//! JSON REST gateway over `reqwest` (requires "http")
//!
//! Routes, relative to `{base_url}/{resource}`:
//!
//! | operation | request                                  |
//! |-----------|------------------------------------------|
//! | list      | `GET ?page=&size=&sort=field,dir&{filter}` |
//! | search    | `GET /search?search=&page=&size=`        |
//! | get       | `GET /{id}`                              |
//! | create    | `POST` with the input as body            |
//! | update    | `PUT /{id}` with the input as body       |
//! | remove    | `DELETE /{id}`                           |

use std::marker::PhantomData;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::api::EntityApi;
use crate::entity::Entity;
use crate::error::ApiError;
use crate::page::{ListQuery, Page, SearchQuery};

/// Error body returned by the backend on non-2xx responses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// [`EntityApi`] backed by a JSON REST resource.
pub struct RestApi<T> {
    client: Client,
    base_url: String,
    resource: String,
    token: Option<String>,
    _entity: PhantomData<fn() -> T>,
}

impl<T> std::fmt::Debug for RestApi<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestApi")
            .field("base_url", &self.base_url)
            .field("resource", &self.resource)
            .field("authenticated", &self.token.is_some())
            .finish()
    }
}

impl<T: Entity> RestApi<T> {
    /// Gateway for `{base_url}/{resource}`.
    pub fn new(base_url: impl Into<String>, resource: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url, resource)
    }

    /// Share a preconfigured client (timeouts, proxies, TLS).
    pub fn with_client(
        client: Client,
        base_url: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            resource: resource.into().trim_matches('/').to_string(),
            token: None,
            _entity: PhantomData,
        }
    }

    /// Send `Authorization: Bearer {token}` with every request.
    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn set_bearer(&mut self, token: Option<String>) {
        self.token = token;
    }

    fn url(&self, suffix: &str) -> String {
        if suffix.is_empty() {
            format!("{}/{}", self.base_url, self.resource)
        } else {
            format!("{}/{}/{}", self.base_url, self.resource, suffix)
        }
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| ApiError::transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let fallback = status.canonical_reason().unwrap_or_default();
        Err(ApiError::http(status.as_u16(), error_message(&body, fallback)))
    }

    async fn json<R: DeserializeOwned>(&self, request: RequestBuilder) -> Result<R, ApiError> {
        let response = self.send(request).await?;
        response
            .json()
            .await
            .map_err(|e| ApiError::transport(format!("invalid response body: {e}")))
    }
}

#[async_trait]
impl<T> EntityApi<T> for RestApi<T>
where
    T: Entity + DeserializeOwned,
    T::Input: Serialize,
{
    async fn list(&self, query: &ListQuery) -> Result<Page<T>, ApiError> {
        let request = self.client.get(self.url("")).query(&list_params(query));
        self.json(request).await
    }

    async fn search(&self, query: &SearchQuery) -> Result<Page<T>, ApiError> {
        let request = self.client.get(self.url("search")).query(&search_params(query));
        self.json(request).await
    }

    async fn get(&self, id: &str) -> Result<T, ApiError> {
        self.json(self.client.get(self.url(id))).await
    }

    async fn create(&self, input: &T::Input) -> Result<T, ApiError> {
        self.json(self.client.post(self.url("")).json(input)).await
    }

    async fn update(&self, id: &str, input: &T::Input) -> Result<T, ApiError> {
        self.json(self.client.put(self.url(id)).json(input)).await
    }

    async fn remove(&self, id: &str) -> Result<(), ApiError> {
        self.send(self.client.delete(self.url(id))).await?;
        Ok(())
    }
}

fn list_params(query: &ListQuery) -> Vec<(String, String)> {
    let mut params = vec![
        ("page".to_string(), query.page_index.to_string()),
        ("size".to_string(), query.page_size.to_string()),
    ];
    if let Some(sort) = &query.sort {
        let direction = query.direction.unwrap_or_default();
        params.push(("sort".to_string(), format!("{},{}", sort, direction.as_str())));
    }
    params.extend(
        query
            .filters
            .iter()
            .map(|(key, value)| (key.clone(), value.clone())),
    );
    params
}

fn search_params(query: &SearchQuery) -> Vec<(String, String)> {
    vec![
        ("search".to_string(), query.term.clone()),
        ("page".to_string(), query.page_index.to_string()),
        ("size".to_string(), query.page_size.to_string()),
    ]
}

/// `message` (or `error`) of a JSON error body, else the raw body, else
/// `fallback`.
fn error_message(body: &str, fallback: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(message) = parsed.message.or(parsed.error) {
            return message;
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() || trimmed.starts_with('{') {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::SortDirection;

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    struct Centre {
        id: String,
    }

    impl Entity for Centre {
        type Input = String;
        const NAME: &'static str = "centre";

        fn id(&self) -> &str {
            &self.id
        }
    }

    #[test]
    fn test_url() {
        let api = RestApi::<Centre>::new("http://localhost:8080/api/", "/centres/");
        assert_eq!(api.url(""), "http://localhost:8080/api/centres");
        assert_eq!(api.url("c1"), "http://localhost:8080/api/centres/c1");
        assert_eq!(api.url("search"), "http://localhost:8080/api/centres/search");
    }

    #[test]
    fn test_debug_hides_token() {
        let api = RestApi::<Centre>::new("http://h", "centres").with_bearer("secret");
        let debug = format!("{api:?}");
        assert!(debug.contains("authenticated: true"));
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn test_list_params() {
        let query = ListQuery::page(2, 20)
            .sorted("lastName", SortDirection::Desc)
            .filter("status", "ACTIVE");
        assert_eq!(
            list_params(&query),
            vec![
                ("page".to_string(), "2".to_string()),
                ("size".to_string(), "20".to_string()),
                ("sort".to_string(), "lastName,desc".to_string()),
                ("status".to_string(), "ACTIVE".to_string()),
            ]
        );
    }

    #[test]
    fn test_search_params() {
        let params = search_params(&SearchQuery::new("dia", 0, 10));
        assert_eq!(params[0], ("search".to_string(), "dia".to_string()));
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn test_error_message() {
        assert_eq!(
            error_message(r#"{"message":"Email already exists"}"#, "Conflict"),
            "Email already exists"
        );
        assert_eq!(error_message(r#"{"error":"denied"}"#, "Forbidden"), "denied");
        assert_eq!(
            error_message(r#"{"status":500}"#, "Internal Server Error"),
            "Internal Server Error"
        );
        assert_eq!(error_message("", "Not Found"), "Not Found");
        assert_eq!(error_message("gateway down", "Bad Gateway"), "gateway down");
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let api = RestApi::<Centre>::new("http://127.0.0.1:9", "centres");
        let err = api.get("c1").await.unwrap_err();
        assert_eq!(err.status, None);
    }
}
