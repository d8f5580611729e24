use crate::error::PipelineError;
use crate::types::{InferenceResult, RawDetection};
use bytes::Bytes;
use log::debug;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use url::Url;

/// Client for a CodeProject.AI style `/v1/vision/alpr` endpoint.
pub struct AlprClient {
    server: Url,
    headers: HeaderMap,
    client: reqwest::Client,
}

impl AlprClient {
    pub fn new(server: Url, headers: &[(String, String)]) -> Result<AlprClient, failure::Error> {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            map.insert(
                HeaderName::from_bytes(name.as_bytes())?,
                HeaderValue::from_str(value)?,
            );
        }
        Ok(AlprClient {
            server,
            headers: map,
            client: reqwest::Client::new(),
        })
    }

    pub async fn recognize(&self, image: Bytes) -> Result<InferenceResult, PipelineError> {
        let form = Form::new().part("upload", Part::bytes(image.to_vec()).file_name("upload"));
        let response = self
            .client
            .post(self.server.clone())
            .headers(self.headers.clone())
            .multipart(form)
            .send()
            .await?;
        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            return Err(PipelineError::Remote(format!(
                "{}: {}",
                status,
                String::from_utf8_lossy(&body)
            )));
        }
        let json = serde_json::from_slice::<Value>(&body)?;
        debug!("ALPR response: {}", json);
        parse_response(&json)
    }
}

pub fn parse_response(json: &Value) -> Result<InferenceResult, PipelineError> {
    // Some server versions omit `predictions` entirely when nothing was found.
    let predictions = match json.get("predictions") {
        None | Some(Value::Null) => vec![],
        Some(Value::Array(results)) => results
            .iter()
            .map(RawDetection::from_json)
            .collect::<Result<Vec<_>, _>>()?,
        Some(other) => {
            return Err(PipelineError::Remote(format!(
                "Unexpected predictions value {}",
                other
            )))
        }
    };
    Ok(InferenceResult {
        predictions,
        inference_ms: json.get("inferenceMs").and_then(Value::as_f64),
    })
}
