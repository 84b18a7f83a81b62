use super::{
    prompt,
    types::{ApiErrorBody, Content, GenerateRequest, GenerateResponse, ModelInfo, ModelList, Part},
    Structurer,
};
use crate::{
    config::{Config, Prompt},
    error::ModelCallError,
    renderer::PageImage,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::blocking::Client;
use tracing::{debug, warn};

const API_KEY_HEADER: &str = "x-goog-api-key";

pub struct GeminiClient {
    http: Client,
    endpoint: String,
    model: String,
    api_key: String,
    prompt: Prompt,
}

impl GeminiClient {
    /// The key is passed in by the caller; nothing is read from the environment here.
    pub fn new(cfg: &Config, api_key: impl Into<String>) -> Result<Self, ModelCallError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ModelCallError::MissingApiKey);
        }
        let http = Client::builder()
            .build()
            .map_err(|e| ModelCallError::Network(e.to_string()))?;
        Ok(Self {
            http,
            endpoint: cfg.model.endpoint.trim_end_matches('/').to_string(),
            model: cfg.model.model.clone(),
            api_key,
            prompt: cfg.prompt.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn generate(&self, req: &GenerateRequest) -> Result<String, ModelCallError> {
        let url = format!("{}/models/{}:generateContent", self.endpoint, self.model);
        debug!("gemini generateContent model={}", self.model);

        let resp = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(req)
            .send()
            .map_err(|e| ModelCallError::Network(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .map_err(|e| ModelCallError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(error_from_status(status.as_u16(), &body));
        }

        let parsed: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| ModelCallError::MalformedResponse(e.to_string()))?;

        match parsed.text() {
            Some(text) => Ok(text.trim().to_string()),
            None => {
                if let Some(reason) = parsed
                    .prompt_feedback
                    .as_ref()
                    .and_then(|f| f.block_reason.as_deref())
                {
                    warn!("gemini blocked the prompt: {reason}");
                }
                Err(ModelCallError::EmptyResponse)
            }
        }
    }
}

impl Structurer for GeminiClient {
    fn structure_text(&self, text: &str) -> Result<String, ModelCallError> {
        let req = GenerateRequest {
            system_instruction: Content::system(&self.prompt.system_instruction),
            contents: vec![Content::user(vec![Part::text(prompt::text_message(
                &self.prompt,
                text,
            ))])],
        };
        self.generate(&req)
    }

    fn structure_image(&self, image: &PageImage) -> Result<String, ModelCallError> {
        let req = GenerateRequest {
            system_instruction: Content::system(&self.prompt.system_instruction),
            contents: vec![Content::user(vec![
                Part::text(prompt::image_message(&self.prompt)),
                Part::inline(image.mime_type(), BASE64.encode(&image.png)),
            ])],
        };
        self.generate(&req)
    }

    fn list_models(&self) -> Result<Vec<ModelInfo>, ModelCallError> {
        let url = format!("{}/models", self.endpoint);
        let mut models = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query: Vec<(&str, String)> = vec![("pageSize", "1000".to_string())];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }

            let resp = self
                .http
                .get(&url)
                .header(API_KEY_HEADER, &self.api_key)
                .query(&query)
                .send()
                .map_err(|e| ModelCallError::Network(e.to_string()))?;

            let status = resp.status();
            let body = resp
                .text()
                .map_err(|e| ModelCallError::Network(e.to_string()))?;
            if !status.is_success() {
                return Err(error_from_status(status.as_u16(), &body));
            }

            let page: ModelList = serde_json::from_str(&body)
                .map_err(|e| ModelCallError::MalformedResponse(e.to_string()))?;
            models.extend(page.models);

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(models)
    }
}

/// Maps a non-2xx status and body onto the error taxonomy.
pub fn error_from_status(status: u16, body: &str) -> ModelCallError {
    let detail = serde_json::from_str::<ApiErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_default();
    let message = if detail.message.is_empty() {
        body.trim().to_string()
    } else {
        detail.message.clone()
    };

    let key_rejected = status == 400
        && (message.contains("API key") || body.contains("API_KEY_INVALID"));

    match status {
        401 | 403 => ModelCallError::Unauthorized { status, message },
        400 if key_rejected => ModelCallError::Unauthorized { status, message },
        429 => ModelCallError::RateLimited { message },
        _ => ModelCallError::Api { status, message },
    }
}
