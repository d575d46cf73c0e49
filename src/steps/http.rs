//! HTTP Request Step
//!
//! Performs one outbound request per node. Supported configuration:
//!
//! - `url` (required): request URL, interpolated
//! - `method`: HTTP verb, default `GET`
//! - `headers`: object of string values, interpolated
//! - `body`: any JSON value; string leaves are interpolated and the result
//!   is sent as JSON
//!
//! Statuses of 400 and above fail the step. The response body is parsed as
//! JSON when possible, otherwise wrapped as `{"body": "<raw text>"}`.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method, Url};
use serde_json::{json, Value};

use super::interpolate::{interpolate, interpolate_value};
use super::{Step, StepContext, WorkingContext};
use crate::error::StepError;
use crate::graph::Node;

/// Performs an outbound HTTP call.
#[derive(Debug, Clone)]
pub struct HttpRequestStep {
    client: Client,
}

impl HttpRequestStep {
    /// Creates the step with a client bounded by `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, StepError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    fn build_headers(node: &Node, input: &WorkingContext) -> Result<HeaderMap, StepError> {
        let mut headers = HeaderMap::new();
        let Some(configured) = node.config_value("headers").and_then(Value::as_object) else {
            return Ok(headers);
        };

        for (key, value) in configured {
            // Non-string header values are ignored
            let Some(raw) = value.as_str() else {
                continue;
            };
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|_| StepError::InvalidConfig(format!("invalid header name '{}'", key)))?;
            let value = HeaderValue::from_str(&interpolate(raw, input))
                .map_err(|_| StepError::InvalidConfig(format!("invalid value for header '{}'", key)))?;
            headers.insert(name, value);
        }

        Ok(headers)
    }
}

#[async_trait]
impl Step for HttpRequestStep {
    async fn execute(
        &self,
        _ctx: &StepContext,
        node: &Node,
        input: &WorkingContext,
    ) -> Result<WorkingContext, StepError> {
        let url = node
            .config_str("url")
            .ok_or_else(|| StepError::MissingConfig("url is required".to_string()))?;
        let url = interpolate(url, input);
        let url = Url::parse(&url)
            .map_err(|e| StepError::InvalidConfig(format!("invalid url '{}': {}", url, e)))?;

        let method_name = node.config_str("method").unwrap_or("GET").to_uppercase();
        let method = Method::from_bytes(method_name.as_bytes())
            .map_err(|_| StepError::InvalidConfig(format!("invalid method '{}'", method_name)))?;

        let mut headers = Self::build_headers(node, input)?;
        let mut request = self.client.request(method.clone(), url.clone());

        match node.config_value("body") {
            None | Some(Value::Null) => {}
            Some(body) => {
                let body = serde_json::to_vec(&interpolate_value(body, input))
                    .map_err(|e| StepError::InvalidConfig(format!("unencodable body: {}", e)))?;
                if !headers.contains_key(CONTENT_TYPE) {
                    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                }
                request = request.body(body);
            }
        }

        debug!("Node '{}': {} {}", node.id, method, url);

        let response = request.headers(headers).send().await.map_err(|e| {
            if e.is_builder() {
                StepError::InvalidConfig(e.to_string())
            } else {
                StepError::Http(e)
            }
        })?;
        let status = response.status();
        let text = response.text().await?;

        if status.as_u16() >= 400 {
            return Err(StepError::HttpStatus {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed = serde_json::from_str::<Value>(&text).unwrap_or_else(|_| json!({ "body": text }));

        let mut output = WorkingContext::new();
        output.insert("http_response".to_string(), parsed);
        output.insert("status_code".to_string(), json!(status.as_u16()));
        Ok(output)
    }
}
