//! # REST Gateway
//!
//! [`ResourceGateway`] over the control plane's JSON REST API.
//!
//! Records come back as JSON objects. The id field (`_id`, or `name` for
//! destinations) becomes [`ResourceRecord::id`], `state` becomes the
//! lifecycle label, and every other field is kept as an attribute.
//!
//! Every request carries the bearer API key and a fresh `x-request-id` so a
//! failing call can be matched against server-side logs. Path segments are
//! percent-encoded one by one, so ids never change the shape of a URL.

use super::paths::{self, WriteMethod};
use super::{ApiResponse, GatewayError, ResourceGateway};
use crate::config::{ApiKey, GatewayConfig};
use crate::observability::metrics;
use crate::resource::{Attributes, ParentKeys, ResourceKind, ResourceRecord};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, Method, Url};
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, debug_span, Instrument};

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Control plane client
#[derive(Clone)]
pub struct RestGateway {
    http_client: Client,
    base_url: Url,
    api_key: ApiKey,
}

impl std::fmt::Debug for RestGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestGateway")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl RestGateway {
    /// Build a client from explicit configuration
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed or the API
    /// URL cannot carry a path
    pub fn new(config: &GatewayConfig) -> anyhow::Result<Self> {
        let base_url = Url::parse(config.api_url.trim_end_matches('/'))
            .with_context(|| format!("Invalid API URL {}", config.api_url))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("API URL {} cannot carry a path", config.api_url);
        }

        let http_client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout)
            .build()
            .context("Failed to create HTTP client")?;

        debug!("Initialized control plane client for {}", config.api_url);

        Ok(Self {
            http_client,
            base_url,
            api_key: config.api_key.clone(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Append `segments` to the base URL, percent-encoding each one
    ///
    /// # Errors
    /// [`GatewayError::BaseUrl`] when the base URL cannot carry a path
    pub fn url_for(&self, segments: &[String]) -> Result<Url, GatewayError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url.path_segments_mut().map_err(|()| GatewayError::BaseUrl {
                url: self.base_url.to_string(),
                message: "cannot be a base".to_string(),
            })?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    /// Build HTTP request with authentication headers
    fn make_request(&self, method: Method, url: Url, body: Option<&Attributes>) -> reqwest::RequestBuilder {
        let mut request = self
            .http_client
            .request(method, url)
            .bearer_auth(self.api_key.expose())
            .header(REQUEST_ID_HEADER, uuid::Uuid::new_v4().to_string());

        if let Some(body) = body {
            request = request.json(body);
        }

        request
    }

    /// Send one request and return the status and body text
    async fn send(
        &self,
        method: Method,
        segments: &[String],
        body: Option<&Attributes>,
    ) -> Result<(u16, String), GatewayError> {
        let target = self.url_for(segments)?;
        let url = target.to_string();
        let method_name = method.as_str().to_string();
        let span = debug_span!("gateway.request", http.method = %method_name, http.url = %url);

        async {
            debug!("--> {} {}", method_name, url);
            let start = Instant::now();

            let response = match self.make_request(method, target, body).send().await {
                Ok(response) => response,
                Err(e) => {
                    metrics::observe_gateway_request(&method_name, None, start.elapsed().as_secs_f64());
                    debug!("<-- {} {} failed: {}", method_name, url, e);
                    return Err(GatewayError::Transport {
                        url: url.clone(),
                        message: e.to_string(),
                    });
                }
            };

            let status = response.status().as_u16();
            let text = response.text().await.map_err(|e| GatewayError::Transport {
                url: url.clone(),
                message: format!("failed to read response body: {e}"),
            })?;
            metrics::observe_gateway_request(&method_name, Some(status), start.elapsed().as_secs_f64());
            debug!("<-- {} {} [{}]", method_name, url, status);
            if !(200..300).contains(&status) {
                debug!("response body: {}", text);
            }

            Ok((status, text))
        }
        .instrument(span)
        .await
    }

    async fn fetch_record(
        &self,
        method: Method,
        kind: ResourceKind,
        segments: &[String],
        parents: &ParentKeys,
        body: Option<&Attributes>,
    ) -> Result<ApiResponse<ResourceRecord>, GatewayError> {
        let (status, raw) = self.send(method, segments, body).await?;
        if !(200..300).contains(&status) {
            return Ok(ApiResponse::new(status, None, raw));
        }
        let value: Value = parse_body(kind, status, &raw)?;
        let record = record_from_value(kind, parents, value).map_err(|message| {
            GatewayError::Decode {
                kind,
                status,
                message,
            }
        })?;
        Ok(ApiResponse::new(status, Some(record), raw))
    }

    /// Send a request whose response body is not a record
    async fn send_unit(
        &self,
        method: Method,
        segments: &[String],
        body: &Attributes,
    ) -> Result<ApiResponse<()>, GatewayError> {
        let (status, raw) = self.send(method, segments, Some(body)).await?;
        let body = (200..300).contains(&status).then_some(());
        Ok(ApiResponse::new(status, body, raw))
    }
}

fn method_for(write: WriteMethod) -> Method {
    match write {
        WriteMethod::Post => Method::POST,
        WriteMethod::Patch => Method::PATCH,
        WriteMethod::Put => Method::PUT,
    }
}

fn parse_body(kind: ResourceKind, status: u16, raw: &str) -> Result<Value, GatewayError> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(Attributes::new()));
    }
    serde_json::from_str(raw).map_err(|e| GatewayError::Decode {
        kind,
        status,
        message: e.to_string(),
    })
}

/// Turn one JSON object from the API into a record
///
/// # Errors
/// Returns a description of the problem when `value` is not an object
pub fn record_from_value(
    kind: ResourceKind,
    parents: &ParentKeys,
    value: Value,
) -> Result<ResourceRecord, String> {
    let Value::Object(mut attributes) = value else {
        return Err(format!("expected a JSON object, got {value}"));
    };

    let mut record = ResourceRecord::new(kind, parents.clone());
    let id_field = paths::id_field(kind);
    record.id = match attributes.get(id_field) {
        Some(Value::String(id)) => id.clone(),
        Some(Value::Number(id)) => id.to_string(),
        _ => String::new(),
    };
    if id_field == "_id" {
        attributes.remove("_id");
    }
    if let Some(Value::String(state)) = attributes.remove("state") {
        record.state = state;
    }
    record.attributes = attributes;
    Ok(record)
}

#[async_trait]
impl ResourceGateway for RestGateway {
    async fn create(
        &self,
        kind: ResourceKind,
        parents: &ParentKeys,
        attributes: &Attributes,
    ) -> Result<ApiResponse<ResourceRecord>, GatewayError> {
        let method = paths::create_method(kind);
        if method != WriteMethod::Put {
            let path = paths::collection_segments(kind, parents)?;
            return self
                .fetch_record(method_for(method), kind, &path, parents, Some(attributes))
                .await;
        }

        // Upsert kinds are addressed by a caller-chosen id
        let field = paths::id_field(kind);
        let id = attributes
            .get(field)
            .and_then(Value::as_str)
            .ok_or(GatewayError::MissingId { kind, field })?;
        let path = paths::item_segments(kind, id, parents)?;
        let mut response = self
            .fetch_record(method_for(method), kind, &path, parents, Some(attributes))
            .await?;
        if let Some(record) = response.body.as_mut() {
            if record.id.is_empty() {
                record.id = id.to_string();
            }
        }
        Ok(response)
    }

    async fn get(
        &self,
        kind: ResourceKind,
        id: &str,
        parents: &ParentKeys,
    ) -> Result<ApiResponse<ResourceRecord>, GatewayError> {
        if paths::reads_via_listing(kind) {
            let listing = self.list(kind, parents).await?;
            let Some(records) = listing.body else {
                return Ok(ApiResponse::new(listing.status, None, listing.raw));
            };
            return Ok(match records.into_iter().find(|r| r.id == id) {
                Some(record) => ApiResponse::new(listing.status, Some(record), listing.raw),
                None => ApiResponse::new(404, None, format!("{kind} {id} not found in listing")),
            });
        }

        let path = paths::item_segments(kind, id, parents)?;
        self.fetch_record(Method::GET, kind, &path, parents, None).await
    }

    async fn update(
        &self,
        kind: ResourceKind,
        id: &str,
        parents: &ParentKeys,
        attributes: &Attributes,
    ) -> Result<ApiResponse<ResourceRecord>, GatewayError> {
        let path = paths::item_segments(kind, id, parents)?;
        let method = method_for(paths::update_method(kind));
        self.fetch_record(method, kind, &path, parents, Some(attributes))
            .await
    }

    async fn delete(
        &self,
        kind: ResourceKind,
        id: &str,
        parents: &ParentKeys,
    ) -> Result<ApiResponse<()>, GatewayError> {
        let path = paths::item_segments(kind, id, parents)?;
        let (status, raw) = self.send(Method::DELETE, &path, None).await?;
        let body = (200..300).contains(&status).then_some(());
        Ok(ApiResponse::new(status, body, raw))
    }

    async fn list(
        &self,
        kind: ResourceKind,
        parents: &ParentKeys,
    ) -> Result<ApiResponse<Vec<ResourceRecord>>, GatewayError> {
        let path = paths::collection_segments(kind, parents)?;
        let (status, raw) = self.send(Method::GET, &path, None).await?;
        if !(200..300).contains(&status) {
            return Ok(ApiResponse::new(status, None, raw));
        }

        let items = match parse_body(kind, status, &raw)? {
            Value::Array(items) => items,
            other => {
                return Err(GatewayError::Decode {
                    kind,
                    status,
                    message: format!("expected a JSON array, got {other}"),
                })
            }
        };
        let records = items
            .into_iter()
            .map(|item| record_from_value(kind, parents, item))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|message| GatewayError::Decode {
                kind,
                status,
                message,
            })?;
        Ok(ApiResponse::new(status, Some(records), raw))
    }

    async fn reset(
        &self,
        kind: ResourceKind,
        id: &str,
        parents: &ParentKeys,
    ) -> Result<ApiResponse<()>, GatewayError> {
        let path = paths::reset_segments(kind, id, parents)?;
        self.send_unit(Method::PUT, &path, &Attributes::new()).await
    }

    async fn verify_membership(
        &self,
        consortium_id: &str,
        membership_id: &str,
    ) -> Result<ApiResponse<()>, GatewayError> {
        let path = paths::membership_verification_segments(consortium_id, membership_id);
        let mut body = Attributes::new();
        body.insert("test_certificate".to_string(), Value::Bool(true));
        self.send_unit(Method::POST, &path, &body).await
    }

    async fn register_identity(
        &self,
        idregistry_id: &str,
        membership_id: &str,
    ) -> Result<ApiResponse<()>, GatewayError> {
        let path = paths::registry_identity_segments(idregistry_id);
        let mut body = Attributes::new();
        body.insert(
            "membership_id".to_string(),
            Value::String(membership_id.to_string()),
        );
        self.send_unit(Method::POST, &path, &body).await
    }
}
