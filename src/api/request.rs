//! api::request
//!
//! Request builder keyed by `METHOD:path` selectors.
//!
//! # Design
//!
//! Every endpoint is named by a selector such as
//! `GET:/shops/{shop_id}/files/{ids}`. An [`ApiRequest`] fills in the path
//! placeholders through fluent setters and performs the round trip with
//! [`ApiRequest::unwrap`], which decodes a 2xx JSON body or maps the failure
//! to an [`ApiError`].
//!
//! Errors from building (bad selector, missing placeholder) are deferred to
//! the terminal call so that the builder chain never needs `?`.
//!
//! # Example
//!
//! ```ignore
//! let task: ShardedTask = ApiRequest::new(&client, &base, token, endpoints::GET_SHARDED_TASK)
//!     .shop_id(&shop)
//!     .ids([task_id.as_str()])
//!     .expand_items(true)
//!     .unwrap()
//!     .await?;
//! ```

use reqwest::header::{HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, Method, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::traits::ApiError;
use crate::core::types::ShopId;

/// User-Agent header value for API requests.
const USER_AGENT_VALUE: &str = concat!("shopcli/", env!("CARGO_PKG_VERSION"));

/// Longest error body echoed back in an error message.
const MAX_ERROR_BODY: usize = 300;

/// Endpoint selectors used by the client.
pub mod endpoints {
    pub const GET_SHARDED_TASK: &str = "GET:/shops/{shop_id}/sharded_tasks/{ids}";
    pub const GET_FILE: &str = "GET:/shops/{shop_id}/files/{ids}";
    pub const GET_FILE_DOWNLOAD_URL: &str = "GET:/shops/{shop_id}/files/{ids}/download_url";
    pub const CREATE_UPLOAD: &str = "POST:/shops/{shop_id}/uploads";
    pub const UPLOAD_CHUNK: &str = "PUT:/shops/{shop_id}/uploads/{upload_id}/chunks/{index}";
    pub const COMPLETE_UPLOAD: &str = "POST:/shops/{shop_id}/uploads/{upload_id}/complete";
    pub const START_EXPORT: &str = "POST:/shops/{shop_id}/{entity}/export";
    pub const START_IMPORT: &str = "POST:/shops/{shop_id}/{entity}/import";
}

/// A parsed `METHOD:path` selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub method: Method,
    pub template: String,
}

impl Endpoint {
    /// Parse a selector.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidRequest` if the selector has no `:`, an
    /// unknown method, or a path that does not start with `/`.
    pub fn parse(selector: &str) -> Result<Self, ApiError> {
        let (method, template) = selector.split_once(':').ok_or_else(|| {
            ApiError::InvalidRequest(format!("selector '{}' is not METHOD:path", selector))
        })?;

        let method = match method {
            "GET" => Method::GET,
            "POST" => Method::POST,
            "PUT" => Method::PUT,
            "PATCH" => Method::PATCH,
            "DELETE" => Method::DELETE,
            other => {
                return Err(ApiError::InvalidRequest(format!(
                    "unsupported method '{}' in selector",
                    other
                )))
            }
        };

        if !template.starts_with('/') {
            return Err(ApiError::InvalidRequest(format!(
                "path '{}' must start with '/'",
                template
            )));
        }

        Ok(Self {
            method,
            template: template.to_string(),
        })
    }

    /// Resolve the path template against a base URL.
    ///
    /// Placeholder values are pushed as single, percent-encoded segments.
    pub fn url(&self, base: &Url, params: &[(String, String)]) -> Result<Url, ApiError> {
        let mut url = base.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                ApiError::InvalidRequest(format!("base URL '{}' cannot hold a path", base))
            })?;
            segments.pop_if_empty();

            for segment in self.template.split('/').filter(|s| !s.is_empty()) {
                match segment
                    .strip_prefix('{')
                    .and_then(|s| s.strip_suffix('}'))
                {
                    Some(name) => {
                        let value = params
                            .iter()
                            .find(|(key, _)| key == name)
                            .map(|(_, value)| value)
                            .ok_or_else(|| {
                                ApiError::InvalidRequest(format!(
                                    "missing path parameter '{}' for {}",
                                    name, self.template
                                ))
                            })?;
                        segments.push(value);
                    }
                    None => {
                        segments.push(segment);
                    }
                }
            }
        }
        Ok(url)
    }
}

enum Body {
    Json(serde_json::Value),
    Bytes(Vec<u8>),
}

/// A request under construction.
pub struct ApiRequest<'a> {
    client: &'a Client,
    base: &'a Url,
    token: Option<&'a str>,
    endpoint: Result<Endpoint, ApiError>,
    params: Vec<(String, String)>,
    query: Vec<(String, String)>,
    body: Option<Result<Body, ApiError>>,
}

impl<'a> ApiRequest<'a> {
    /// Start a request for the given selector.
    pub fn new(client: &'a Client, base: &'a Url, token: Option<&'a str>, selector: &str) -> Self {
        Self {
            client,
            base,
            token,
            endpoint: Endpoint::parse(selector),
            params: Vec::new(),
            query: Vec::new(),
            body: None,
        }
    }

    /// Fill the `{shop_id}` placeholder.
    pub fn shop_id(self, shop: &ShopId) -> Self {
        self.param("shop_id", shop.as_str())
    }

    /// Fill the `{ids}` placeholder with a comma-separated list.
    pub fn ids<I, S>(self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = ids
            .into_iter()
            .map(|id| id.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(",");
        self.param("ids", joined)
    }

    /// Fill a named path placeholder.
    pub fn param(mut self, name: &str, value: impl Into<String>) -> Self {
        self.params.retain(|(key, _)| key != name);
        self.params.push((name.to_string(), value.into()));
        self
    }

    /// Ask the server to hydrate nested objects.
    pub fn expand_items(self, expand: bool) -> Self {
        if expand {
            self.query("expand", "items")
        } else {
            self
        }
    }

    /// Append a query parameter.
    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    /// Send a JSON body.
    pub fn json<T: Serialize>(mut self, body: &T) -> Self {
        self.body = Some(
            serde_json::to_value(body)
                .map(Body::Json)
                .map_err(|e| ApiError::InvalidRequest(format!("cannot encode body: {}", e))),
        );
        self
    }

    /// Send a raw binary body.
    pub fn bytes(mut self, body: Vec<u8>) -> Self {
        self.body = Some(Ok(Body::Bytes(body)));
        self
    }

    /// Resolve the final URL including the query string.
    pub fn url(&self) -> Result<Url, ApiError> {
        let endpoint = self.endpoint.as_ref().map_err(Clone::clone)?;
        let mut url = endpoint.url(self.base, &self.params)?;
        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(self.query.iter());
        }
        Ok(url)
    }

    /// Perform the request and return the successful response.
    ///
    /// # Errors
    ///
    /// Any non-2xx status is mapped through [`error_for_status`].
    pub async fn send(self) -> Result<Response, ApiError> {
        let url = self.url()?;
        let endpoint = self.endpoint?;
        let token = self.token.ok_or(ApiError::AuthRequired)?;

        let auth = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| ApiError::AuthFailed("token contains invalid characters".into()))?;

        tracing::debug!(method = %endpoint.method, %url, "api request");

        let mut builder = self
            .client
            .request(endpoint.method, url)
            .header(AUTHORIZATION, auth)
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, USER_AGENT_VALUE);

        builder = match self.body.transpose()? {
            Some(Body::Json(value)) => builder.json(&value),
            Some(Body::Bytes(bytes)) => builder
                .header(CONTENT_TYPE, "application/octet-stream")
                .body(bytes),
            None => builder,
        };

        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(error_for_status(status, response).await)
        }
    }

    /// Perform the request and decode the JSON body.
    pub async fn unwrap<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        let response = self.send().await?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        serde_json::from_slice(&body).map_err(|e| {
            ApiError::Decode(format!("status {}: {}", status.as_u16(), e))
        })
    }
}

/// Error body shapes the API is known to return.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

/// Map a failed response to an [`ApiError`], reading the body for a message.
pub async fn error_for_status(status: StatusCode, response: Response) -> ApiError {
    let text = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorBody>(&text) {
        Ok(ErrorBody {
            message: Some(message),
            ..
        }) => message,
        Ok(ErrorBody {
            error: Some(error), ..
        }) => error,
        _ if text.trim().is_empty() => status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string(),
        _ => truncate(text.trim(), MAX_ERROR_BODY),
    };
    map_status(status, message)
}

/// Classify an error status.
pub fn map_status(status: StatusCode, message: String) -> ApiError {
    match status {
        StatusCode::UNAUTHORIZED => {
            ApiError::AuthFailed(format!("invalid or expired token: {}", message))
        }
        StatusCode::FORBIDDEN => ApiError::AuthFailed(format!("permission denied: {}", message)),
        StatusCode::NOT_FOUND => ApiError::NotFound(message),
        StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited,
        _ if status.is_server_error() => ApiError::Api {
            status: status.as_u16(),
            message: format!("server error: {}", message),
        },
        _ => ApiError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://api.example.test/v1").unwrap()
    }

    #[test]
    fn parse_selector() {
        let endpoint = Endpoint::parse(endpoints::GET_FILE).unwrap();
        assert_eq!(endpoint.method, Method::GET);
        assert_eq!(endpoint.template, "/shops/{shop_id}/files/{ids}");
    }

    #[test]
    fn parse_rejects_malformed_selectors() {
        assert!(Endpoint::parse("/no/method").is_err());
        assert!(Endpoint::parse("FETCH:/x").is_err());
        assert!(Endpoint::parse("GET:relative").is_err());
    }

    #[test]
    fn builds_url_with_params_and_query() {
        let client = Client::new();
        let base = base();
        let shop = ShopId::new("42").unwrap();

        let url = ApiRequest::new(&client, &base, None, endpoints::GET_SHARDED_TASK)
            .shop_id(&shop)
            .ids(["t1"])
            .expand_items(true)
            .url()
            .unwrap();

        assert_eq!(
            url.as_str(),
            "https://api.example.test/v1/shops/42/sharded_tasks/t1?expand=items"
        );
    }

    #[test]
    fn joins_multiple_ids() {
        let client = Client::new();
        let base = base();
        let url = ApiRequest::new(&client, &base, None, endpoints::GET_FILE)
            .param("shop_id", "1")
            .ids(["a", "b"])
            .url()
            .unwrap();
        assert_eq!(url.path(), "/v1/shops/1/files/a,b");
    }

    #[test]
    fn encodes_param_values_as_single_segments() {
        let client = Client::new();
        let base = base();
        let url = ApiRequest::new(&client, &base, None, endpoints::GET_FILE)
            .param("shop_id", "1")
            .ids(["a/b c"])
            .url()
            .unwrap();
        assert_eq!(url.path(), "/v1/shops/1/files/a%2Fb%20c");
    }

    #[test]
    fn base_with_trailing_slash() {
        let client = Client::new();
        let base = Url::parse("http://localhost:9000/").unwrap();
        let url = ApiRequest::new(&client, &base, None, endpoints::CREATE_UPLOAD)
            .param("shop_id", "9")
            .url()
            .unwrap();
        assert_eq!(url.as_str(), "http://localhost:9000/shops/9/uploads");
    }

    #[test]
    fn missing_param_is_reported() {
        let client = Client::new();
        let base = base();
        let err = ApiRequest::new(&client, &base, None, endpoints::GET_FILE)
            .ids(["a"])
            .url()
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(ref m) if m.contains("shop_id")));
    }

    #[test]
    fn later_param_replaces_earlier() {
        let client = Client::new();
        let base = base();
        let url = ApiRequest::new(&client, &base, None, endpoints::GET_FILE)
            .param("shop_id", "1")
            .param("shop_id", "2")
            .ids(["f"])
            .url()
            .unwrap();
        assert_eq!(url.path(), "/v1/shops/2/files/f");
    }

    #[test]
    fn map_status_classifies() {
        assert!(matches!(
            map_status(StatusCode::UNAUTHORIZED, "x".into()),
            ApiError::AuthFailed(_)
        ));
        assert!(matches!(
            map_status(StatusCode::FORBIDDEN, "x".into()),
            ApiError::AuthFailed(_)
        ));
        assert_eq!(
            map_status(StatusCode::NOT_FOUND, "gone".into()),
            ApiError::NotFound("gone".into())
        );
        assert_eq!(
            map_status(StatusCode::TOO_MANY_REQUESTS, "slow".into()),
            ApiError::RateLimited
        );
        assert_eq!(
            map_status(StatusCode::UNPROCESSABLE_ENTITY, "bad".into()),
            ApiError::Api {
                status: 422,
                message: "bad".into()
            }
        );
        assert!(matches!(
            map_status(StatusCode::BAD_GATEWAY, "down".into()),
            ApiError::Api { status: 502, ref message } if message.contains("server error")
        ));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ééé", 3), "é...");
    }
}
