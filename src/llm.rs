use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::RagConfig;
use crate::error::{RagError, Result};
use crate::vector_db::Retrieved;

/// Prompt used when the configuration does not override it.
pub const DEFAULT_PROMPT_TEMPLATE: &str = "\
Answer the question based only on the following context:

{context}

Question: {question}

Answer:";

const CONTEXT_PLACEHOLDER: &str = "{context}";
const QUESTION_PLACEHOLDER: &str = "{question}";

/// Checks that a template carries both substitution placeholders.
pub fn validate_template(template: &str) -> Result<()> {
    for placeholder in [CONTEXT_PLACEHOLDER, QUESTION_PLACEHOLDER] {
        if !template.contains(placeholder) {
            return Err(RagError::Validation(format!(
                "template is missing the {placeholder} placeholder"
            )));
        }
    }
    Ok(())
}

/// Capability for turning a filled prompt into generated text.
pub trait Generator {
    fn generate(&self, prompt: &str) -> Result<String>;
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Text generation against a local Ollama server (`POST /api/generate`).
pub struct OllamaGenerator {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    temperature: f32,
}

impl OllamaGenerator {
    pub fn new(base_url: &str, model: &str, temperature: f32) -> Self {
        OllamaGenerator {
            client: reqwest::blocking::Client::new(),
            endpoint: format!("{}/api/generate", base_url.trim_end_matches('/')),
            model: model.to_string(),
            temperature,
        }
    }

    pub fn from_config(config: &RagConfig) -> Self {
        Self::new(&config.ollama_url, &config.model_name, config.temperature)
    }
}

impl Generator for OllamaGenerator {
    fn generate(&self, prompt: &str) -> Result<String> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&GenerateRequest {
                model: &self.model,
                prompt,
                stream: false,
                options: GenerateOptions {
                    temperature: self.temperature,
                },
            })
            .send()
            .map_err(|e| RagError::provider("generation", e))?
            .error_for_status()
            .map_err(|e| RagError::provider("generation", e))?;

        let body: GenerateResponse = response
            .json()
            .map_err(|e| RagError::provider("generation", e))?;
        debug!(model = %self.model, chars = body.response.len(), "generated answer");
        Ok(body.response)
    }
}

/// Formats retrieved context into the prompt template and asks the model.
pub struct RagChain {
    generator: Box<dyn Generator>,
    template: String,
}

impl RagChain {
    /// Builds a chain over `generator`. The template is validated here as
    /// well as at config load, so a chain never holds a bad one.
    pub fn new(generator: Box<dyn Generator>, template: Option<String>) -> Result<Self> {
        let template = template.unwrap_or_else(|| DEFAULT_PROMPT_TEMPLATE.to_string());
        validate_template(&template)?;
        Ok(RagChain {
            generator,
            template,
        })
    }

    /// Chunk texts joined by a blank line, in the order supplied.
    fn format_context(results: &[Retrieved]) -> String {
        results
            .iter()
            .map(|r| r.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn fill_prompt(&self, question: &str, results: &[Retrieved]) -> String {
        self.template
            .replace(CONTEXT_PLACEHOLDER, &Self::format_context(results))
            .replace(QUESTION_PLACEHOLDER, question)
    }

    /// Returns the provider's answer verbatim, no post-processing.
    pub fn answer(&self, question: &str, results: &[Retrieved]) -> Result<String> {
        let prompt = self.fill_prompt(question, results);
        self.generator.generate(&prompt)
    }
}
