use std::env;

use base64::{Engine as _, engine::general_purpose};
use log::debug;
use reqwest::blocking::{
    Client,
    multipart::{Form, Part},
};
use serde::Deserialize;

use crate::{
    config::ServiceSettings,
    error::{RestorationError, Result},
    service::{EditRequest, ImageEditService},
};

#[derive(Debug, Deserialize)]
struct EditResponse {
    #[serde(default)]
    data: Vec<EditedImage>,
}

#[derive(Debug, Deserialize)]
struct EditedImage {
    url: Option<String>,
    b64_json: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// OpenAI-compatible `images/edits` client.
pub struct OpenAiImageClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl OpenAiImageClient {
    pub fn new(settings: &ServiceSettings, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            api_key: api_key.into(),
        }
    }

    pub fn from_env(settings: &ServiceSettings) -> Result<Self> {
        let api_key = env::var(&settings.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| RestorationError::MissingCredentials(settings.api_key_env.clone()))?;

        Ok(Self::new(settings, api_key))
    }

    fn form(&self, request: &EditRequest) -> Result<Form> {
        let image = Part::bytes(request.image_png.clone())
            .file_name("image.png")
            .mime_str("image/png")?;

        let mut form = Form::new()
            .text("model", self.model.clone())
            .text("prompt", request.prompt.clone())
            .text("n", "1")
            .text("size", format!("{0}x{0}", request.size))
            .part("image", image);

        if let Some(mask) = &request.mask_png {
            let mask = Part::bytes(mask.clone())
                .file_name("mask.png")
                .mime_str("image/png")?;
            form = form.part("mask", mask);
        }

        Ok(form)
    }

    fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send()?;
        if !response.status().is_success() {
            return Err(RestorationError::Service(format!(
                "downloading result failed with status {}",
                response.status()
            )));
        }
        Ok(response.bytes()?.to_vec())
    }
}

impl ImageEditService for OpenAiImageClient {
    fn edit(&self, request: &EditRequest) -> Result<Vec<u8>> {
        let url = format!("{}/images/edits", self.base_url);
        debug!("POST {} ({} bytes)", url, request.image_png.len());

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(self.form(request)?)
            .send()?;

        let status = response.status();
        let body = response.text()?;

        if !status.is_success() {
            let detail = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(RestorationError::Service(format!("{status}: {detail}")));
        }

        let parsed = serde_json::from_str::<EditResponse>(&body)
            .map_err(|e| RestorationError::Service(format!("malformed response: {e}")))?;
        let first = parsed
            .data
            .into_iter()
            .next()
            .ok_or_else(|| RestorationError::Service("response contained no images".into()))?;

        match (first.b64_json, first.url) {
            (Some(encoded), _) => general_purpose::STANDARD
                .decode(encoded.as_bytes())
                .map_err(|e| RestorationError::Service(format!("invalid base64 image: {e}"))),
            (None, Some(url)) => self.download(&url),
            (None, None) => Err(RestorationError::Service(
                "response entry has neither url nor b64_json".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_is_reported_by_name() {
        let settings = ServiceSettings {
            api_key_env: "RESTORATION_LAB_TEST_UNSET_KEY".into(),
            ..ServiceSettings::default()
        };
        match OpenAiImageClient::from_env(&settings) {
            Err(RestorationError::MissingCredentials(name)) => {
                assert_eq!(name, "RESTORATION_LAB_TEST_UNSET_KEY")
            }
            _ => panic!("expected missing credentials"),
        }
    }

    #[test]
    fn test_response_shapes() {
        let parsed: EditResponse =
            serde_json::from_str(r#"{"created": 1, "data": [{"url": "https://x/y.png"}]}"#).unwrap();
        assert_eq!(parsed.data[0].url.as_deref(), Some("https://x/y.png"));

        let empty: EditResponse = serde_json::from_str(r#"{"created": 1}"#).unwrap();
        assert!(empty.data.is_empty());
    }
}
