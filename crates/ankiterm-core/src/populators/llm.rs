//! Japanese sentence annotation through an OpenAI-compatible chat API.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, trace, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::time::sleep;

use super::{
    optional_str, optional_u64, required_str, FieldUpdates, NoteInput, Populator,
    PopulatorConfig,
};
use crate::error::{AnkiError, Result};

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";
const DEFAULT_CONCURRENCY: usize = 4;
const MAX_CONCURRENCY: usize = 8;

const SYSTEM_PROMPT: &str = r#"You help people learn Japanese from real sentences, typically anime subtitles.

Input: a JSON list of Japanese sentences.

Output: a JSON object with the key "analyses", an array with one element per input sentence:
- "translation": a literal English translation of the sentence.
- "words": an array of objects for each word or phrase that is not a particle, pronoun or name:
  - "jap": the Japanese word or phrase, followed by its romaji in brackets.
  - "eng": a short English explanation, noting informal, slang or cultural usage.
- "nuance": one sentence on cultural, contextual or linguistic nuance the literal translation misses.

Do not list particles, personal pronouns or names."#;

/// One word of a sentence breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordNote {
    pub jap: String,
    pub eng: String,
}

/// Structured annotation of one sentence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    pub translation: String,
    pub words: Vec<WordNote>,
    pub nuance: String,
}

impl Analysis {
    /// Breakdown as one `• word: meaning` line per word.
    pub fn breakdown(&self) -> String {
        self.words
            .iter()
            .map(|w| format!("• {}: {}", w.jap, w.eng))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Deserialize)]
struct Analyses {
    analyses: Vec<Analysis>,
}

/// A service that annotates Japanese sentences.
#[async_trait]
pub trait AnnotationService: Send + Sync {
    /// Annotate each sentence; the result has one analysis per input, in order.
    async fn analyze(&self, sentences: &[String]) -> Result<Vec<Analysis>>;
}

fn response_format() -> Value {
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": "japformat",
            "strict": true,
            "schema": {
                "type": "object",
                "properties": {
                    "analyses": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "required": ["translation", "words", "nuance"],
                            "properties": {
                                "translation": {"type": "string"},
                                "words": {
                                    "type": "array",
                                    "items": {
                                        "type": "object",
                                        "required": ["jap", "eng"],
                                        "properties": {
                                            "jap": {"type": "string"},
                                            "eng": {"type": "string"}
                                        },
                                        "additionalProperties": false
                                    }
                                },
                                "nuance": {"type": "string"}
                            },
                            "additionalProperties": false
                        }
                    }
                },
                "required": ["analyses"],
                "additionalProperties": false
            }
        }
    })
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Chat completions client.
pub struct OpenAiAnnotator {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    max_tries: u32,
}

impl OpenAiAnnotator {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_tries: 2,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn request(&self, sentences: &[String]) -> Result<Vec<Analysis>> {
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": serde_json::to_string(sentences)?},
            ],
            "response_format": response_format(),
            "temperature": 0.34,
            "max_tokens": 2048,
            "top_p": 1,
        });
        trace!("Chat completion request: {}", body);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AnkiError::ExternalService(format!("request failed: {}", e)))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AnkiError::ExternalService(format!(
                "annotation service returned {}: {}",
                status, text
            )));
        }
        let response: ChatResponse = response
            .json()
            .await
            .map_err(|e| AnkiError::ExternalService(format!("unreadable response: {}", e)))?;
        trace!("Chat completion response: {:?}", response);

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AnkiError::ExternalService("response has no content".to_string()))?;
        let parsed: Analyses = serde_json::from_str(&content).map_err(|e| {
            AnkiError::ExternalService(format!("response is not the requested shape: {}", e))
        })?;
        if parsed.analyses.len() != sentences.len() {
            return Err(AnkiError::ExternalService(format!(
                "expected {} analyses, got {}",
                sentences.len(),
                parsed.analyses.len()
            )));
        }
        Ok(parsed.analyses)
    }
}

#[async_trait]
impl AnnotationService for OpenAiAnnotator {
    async fn analyze(&self, sentences: &[String]) -> Result<Vec<Analysis>> {
        let mut tries = 0;
        loop {
            tries += 1;
            match self.request(sentences).await {
                Ok(analyses) => return Ok(analyses),
                Err(e) if tries >= self.max_tries => return Err(e),
                Err(e) => {
                    warn!("Annotation request failed, retrying: {}", e);
                    sleep(Duration::from_secs(2)).await;
                }
            }
        }
    }
}

/// Fills translation, breakdown and nuance fields from a Japanese source field.
pub struct JapLlm {
    source: String,
    translation_field: String,
    breakdown_field: String,
    nuance_field: String,
    service: Option<Arc<dyn AnnotationService>>,
    concurrency: usize,
    timeout: Option<Duration>,
}

impl Default for JapLlm {
    fn default() -> Self {
        Self {
            source: String::new(),
            translation_field: String::new(),
            breakdown_field: String::new(),
            nuance_field: String::new(),
            service: None,
            concurrency: DEFAULT_CONCURRENCY,
            timeout: None,
        }
    }
}

impl JapLlm {
    /// Use `service` instead of building an OpenAI client at configure time.
    pub fn with_service(service: Arc<dyn AnnotationService>) -> Self {
        Self {
            service: Some(service),
            ..Self::default()
        }
    }
}

#[async_trait]
impl Populator for JapLlm {
    fn name(&self) -> &'static str {
        "jap-llm"
    }

    fn configure(&mut self, config: &PopulatorConfig) -> Result<()> {
        self.source = required_str(config, "source_field")?;
        self.translation_field = required_str(config, "translation_field")?;
        self.breakdown_field = required_str(config, "breakdown_field")?;
        self.nuance_field = required_str(config, "nuance_field")?;
        if let Some(n) = optional_u64(config, "concurrency")? {
            self.concurrency = (n as usize).clamp(1, MAX_CONCURRENCY);
        }
        if let Some(secs) = optional_u64(config, "timeout_secs")? {
            self.timeout = Some(Duration::from_secs(secs.max(1)));
        }

        if self.service.is_none() {
            let key_env =
                optional_str(config, "api_key_env")?.unwrap_or_else(|| DEFAULT_API_KEY_ENV.to_string());
            let api_key = match optional_str(config, "api_key")? {
                Some(key) => key,
                None => env::var(&key_env).map_err(|_| {
                    AnkiError::Validation(format!(
                        "an API key is required: set 'api_key' or the {} environment variable",
                        key_env
                    ))
                })?,
            };
            let model = optional_str(config, "model")?.unwrap_or_else(|| DEFAULT_MODEL.to_string());
            let mut annotator = OpenAiAnnotator::new(api_key, model.clone());
            if let Some(base_url) = optional_str(config, "base_url")? {
                annotator = annotator.with_base_url(base_url);
            }
            debug!("Annotating with model {}", model);
            self.service = Some(Arc::new(annotator));
        }
        Ok(())
    }

    fn source_fields(&self) -> Vec<String> {
        vec![self.source.clone()]
    }

    fn target_fields(&self) -> Vec<String> {
        vec![
            self.translation_field.clone(),
            self.breakdown_field.clone(),
            self.nuance_field.clone(),
        ]
    }

    fn concurrency(&self) -> usize {
        self.concurrency
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    async fn populate(&self, note: &NoteInput) -> Result<FieldUpdates> {
        let text = note.field(&self.source)?.trim();
        if text.is_empty() {
            return Err(AnkiError::InvalidInput(format!(
                "note {} has an empty '{}' field",
                note.note_id, self.source
            )));
        }
        let service = self
            .service
            .as_ref()
            .ok_or_else(|| AnkiError::Validation("jap-llm used before configure".to_string()))?;

        let analysis = service
            .analyze(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AnkiError::ExternalService("no analysis returned".to_string()))?;

        let mut updates = FieldUpdates::new();
        updates.insert(self.translation_field.clone(), analysis.translation.clone());
        updates.insert(self.breakdown_field.clone(), analysis.breakdown());
        updates.insert(self.nuance_field.clone(), analysis.nuance);
        Ok(updates)
    }
}
