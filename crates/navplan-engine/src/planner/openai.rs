use super::prompt::{build_user_prompt, SYSTEM_PROMPT};
use super::{extract_json_object, Planner, PlannerError};
use crate::config::PlannerConfig;
use async_trait::async_trait;
use navplan_common::NavigationPlan;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Plans through an OpenAI-compatible chat completions endpoint.
pub struct OpenAiPlanner {
    client: Client,
    api_key: String,
    config: PlannerConfig,
}

impl OpenAiPlanner {
    pub fn new(api_key: impl Into<String>, config: PlannerConfig) -> Result<Self, PlannerError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(PlannerError::MissingApiKey);
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| PlannerError::Http(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_key,
            config,
        })
    }

    /// Reads the key from `OPENAI_API_KEY`.
    pub fn from_env(config: PlannerConfig) -> Result<Self, PlannerError> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| PlannerError::MissingApiKey)?;
        Self::new(api_key, config)
    }
}

#[async_trait]
impl Planner for OpenAiPlanner {
    async fn generate_plan(
        &self,
        task: &str,
        app_url_hint: Option<&str>,
    ) -> Result<NavigationPlan, PlannerError> {
        let url = format!(
            "{}/chat/completions",
            self.config.api_base.trim_end_matches('/')
        );
        let body = ChatCompletionRequest {
            model: self.config.model.clone(),
            temperature: self.config.temperature,
            response_format: ResponseFormat {
                r#type: "json_object".to_string(),
            },
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: build_user_prompt(task, app_url_hint),
                },
            ],
        };

        tracing::info!("Requesting plan from {} ({})", self.config.api_base, self.config.model);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| PlannerError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "<response unavailable>".to_string());
            return Err(PlannerError::Http(format!("{}: {}", status, text)));
        }

        let response: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| PlannerError::Http(format!("invalid response body: {}", e)))?;
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(PlannerError::MissingField("choices[0].message.content"))?;
        let json = extract_json_object(&content).ok_or(PlannerError::MissingField("JSON plan"))?;

        let plan = parse_plan_response(json)?;
        tracing::info!(
            "Planner returned {} steps for {}",
            plan.ui_navigation_plan.len(),
            plan.app_url
        );
        Ok(plan)
    }
}

/// Parse and validate the JSON object returned by the model.
pub fn parse_plan_response(json: &str) -> Result<NavigationPlan, PlannerError> {
    Ok(NavigationPlan::from_json(json)?)
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    temperature: f32,
    response_format: ResponseFormat,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    r#type: String,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionMessage {
    #[serde(default)]
    content: Option<String>,
}
