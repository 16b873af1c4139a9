use std::future::Future;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::config::Config;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRequest {
    pub text: String,
    pub source: String,
    pub target: String,
}

#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("provider error ({status}): {details}")]
    Provider { status: u16, details: String },
}

/// Something that turns a (text, source, target) tuple into translated text.
pub trait Provider: Send + Sync + 'static {
    fn translate(
        &self,
        request: &TranslationRequest,
    ) -> impl Future<Output = Result<String, TranslateError>> + Send;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MyMemoryResponse {
    response_status: ResponseStatus,
    #[serde(default)]
    response_data: Option<ResponseData>,
    #[serde(default)]
    response_details: Option<String>,
}

// MyMemory reports errors with the status as a string, e.g. "403".
#[derive(Deserialize)]
#[serde(untagged)]
enum ResponseStatus {
    Code(i64),
    Text(String),
}

impl ResponseStatus {
    fn code(&self) -> Option<i64> {
        match self {
            Self::Code(c) => Some(*c),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseData {
    translated_text: String,
}

impl MyMemoryResponse {
    fn into_translation(self) -> Result<String, TranslateError> {
        let status = self.response_status.code();
        if status == Some(200) {
            if let Some(data) = self.response_data {
                return Ok(data.translated_text);
            }
        }
        let details = self
            .response_details
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| "Translation failed".to_string());
        Err(TranslateError::Provider {
            status: status.and_then(|s| u16::try_from(s).ok()).unwrap_or(0),
            details,
        })
    }
}

pub struct MyMemory {
    client: reqwest::Client,
    endpoint: String,
    machine_translation: bool,
    contact_email: Option<String>,
}

impl MyMemory {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("quick-translate/{}", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            endpoint: config.api_url.clone(),
            machine_translation: config.machine_translation,
            contact_email: config.contact_email.clone(),
        })
    }

    pub fn request_url(&self, request: &TranslationRequest) -> String {
        let mut url = format!(
            "{}?q={}&langpair={}|{}",
            self.endpoint,
            urlencoding::encode(&request.text),
            request.source,
            request.target
        );
        if self.machine_translation {
            url.push_str("&mt=1");
        }
        if let Some(email) = &self.contact_email {
            url.push_str("&de=");
            url.push_str(&urlencoding::encode(email));
        }
        url
    }
}

impl Provider for MyMemory {
    async fn translate(&self, request: &TranslationRequest) -> Result<String, TranslateError> {
        let resp = self.client.get(self.request_url(request)).send().await?;

        if !resp.status().is_success() {
            return Err(TranslateError::Status(resp.status()));
        }

        let body: MyMemoryResponse = resp.json().await?;
        body.into_translation()
    }
}
