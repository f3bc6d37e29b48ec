use std::fs;

use pulldown_cmark::{Event, Options, Parser, html};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::config::{HttpSettings, SummarySettings};
use crate::error::KiraError;
use crate::http::ApiClient;
use crate::usage::UsageLedger;

const SERVICE: &str = "Gemini";

pub const DEFAULT_GEMINI_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

pub const USAGE_LIMIT_MESSAGE: &str = "API usage limit reached. Please try again later.";

pub const PATHWAY_PROMPT: &str = "Summarize the list of pathways into a detailed paragraph based on categories. \
Briefly describe each category and the pathways involved. Keep this description brief, \
you don't need to mention every single pathway (just enough). This summary should not include \
other text as it will be directly included in a report that explains context.";

pub trait SummaryClient: Send + Sync {
    fn count_tokens(&self, prompt: &str) -> Result<u64, KiraError>;
    fn generate(&self, prompt: &str) -> Result<String, KiraError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathwaySummary {
    /// Markdown as returned by the model, or the usage-limit notice.
    pub text: String,
    pub limited: bool,
}

pub fn build_prompt(pathway_names: &str) -> String {
    format!("{PATHWAY_PROMPT}\n{pathway_names}")
}

/// Counts tokens, reserves one request plus those tokens in the ledger, then generates. A full
/// ledger is not an error: the notice text stands in for the summary.
pub fn summarize_pathways(
    client: &dyn SummaryClient,
    ledger: &UsageLedger,
    pathway_names: &str,
) -> Result<PathwaySummary, KiraError> {
    info!("starting pathway summary");
    let prompt = build_prompt(pathway_names);
    let tokens = client.count_tokens(&prompt)?;
    if !ledger.try_reserve(1, tokens)? {
        warn!(tokens, "summary skipped, usage limit reached");
        return Ok(PathwaySummary {
            text: USAGE_LIMIT_MESSAGE.to_string(),
            limited: true,
        });
    }
    let text = client.generate(&prompt)?;
    info!("retrieved pathway summary");
    Ok(PathwaySummary {
        text,
        limited: false,
    })
}

#[derive(Clone)]
pub struct GeminiClient {
    api: ApiClient,
    base_url: String,
    model: String,
    api_key: String,
}

#[derive(Deserialize)]
struct KeyFile {
    key: String,
}

impl GeminiClient {
    pub fn new(settings: &SummarySettings, http: &HttpSettings) -> Result<Self, KiraError> {
        Self::with_base_url(settings, http, DEFAULT_GEMINI_BASE)
    }

    pub fn with_base_url(
        settings: &SummarySettings,
        http: &HttpSettings,
        base_url: &str,
    ) -> Result<Self, KiraError> {
        Ok(Self {
            api: ApiClient::new(SERVICE, http)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            api_key: resolve_api_key(settings)?,
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, self.model, method)
    }
}

/// Environment variable first, then the optional `{ "key": ... }` file.
pub fn resolve_api_key(settings: &SummarySettings) -> Result<String, KiraError> {
    if let Ok(key) = std::env::var(&settings.api_key_env)
        && !key.trim().is_empty()
    {
        return Ok(key.trim().to_string());
    }
    if let Some(path) = &settings.api_key_file {
        let content =
            fs::read_to_string(path).map_err(|err| KiraError::Filesystem(format!("{path}: {err}")))?;
        let file: KeyFile = serde_json::from_str(&content)
            .map_err(|err| KiraError::ConfigParse(format!("{path}: {err}")))?;
        if !file.key.trim().is_empty() {
            return Ok(file.key.trim().to_string());
        }
    }
    Err(KiraError::MissingApiKey(settings.api_key_env.clone()))
}

fn prompt_body(prompt: &str) -> Value {
    json!({ "contents": [{ "parts": [{ "text": prompt }] }] })
}

impl SummaryClient for GeminiClient {
    fn count_tokens(&self, prompt: &str) -> Result<u64, KiraError> {
        let raw: Value = self.api.post_json(
            &self.endpoint("countTokens"),
            &[("key", self.api_key.as_str())],
            &prompt_body(prompt),
        )?;
        raw.get("totalTokens")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| KiraError::malformed(SERVICE, "countTokens without totalTokens"))
    }

    fn generate(&self, prompt: &str) -> Result<String, KiraError> {
        let raw: Value = self.api.post_json(
            &self.endpoint("generateContent"),
            &[("key", self.api_key.as_str())],
            &prompt_body(prompt),
        )?;
        let parts = raw
            .get("candidates")
            .and_then(|v| v.as_array())
            .and_then(|arr| arr.first())
            .and_then(|v| v.get("content"))
            .and_then(|v| v.get("parts"))
            .and_then(|v| v.as_array())
            .ok_or_else(|| KiraError::malformed(SERVICE, "generateContent without candidates"))?;
        Ok(parts
            .iter()
            .filter_map(|part| part.get("text").and_then(|v| v.as_str()))
            .collect::<Vec<_>>()
            .join(""))
    }
}

/// Renders model markdown as HTML. Raw HTML in the model output is escaped, not passed through.
pub fn markdown_html(text: &str) -> String {
    let parser = Parser::new_ext(text, Options::ENABLE_STRIKETHROUGH).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });
    let mut out = String::with_capacity(text.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}
