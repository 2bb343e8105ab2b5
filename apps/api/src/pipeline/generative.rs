use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::llm_client::prompts::system_prompt;
use crate::llm_client::{LlmClient, LlmError};
use crate::pipeline::error::PipelineError;
use crate::pipeline::ports::{GenerativeStepPort, Step};
use crate::pipeline::prompts;

/// `GenerativeStepPort` backed by the hosted model, one prompt template per step.
#[derive(Clone)]
pub struct LlmStepPort {
    llm: LlmClient,
}

impl LlmStepPort {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

/// Renders the user prompt for `step` with `input` embedded as JSON.
pub fn render_prompt(step: Step, input: &Value) -> String {
    let (_, template) = prompts::for_step(step);
    let input_json = serde_json::to_string_pretty(input).unwrap_or_else(|_| input.to_string());
    template.replace("{input}", &input_json)
}

/// Malformed model output is a schema problem; everything else is an upstream failure.
pub fn map_llm_error(step: Step, err: LlmError) -> PipelineError {
    match err {
        LlmError::Parse(e) => PipelineError::SchemaViolation(format!("{step} returned invalid JSON: {e}")),
        LlmError::EmptyContent => PipelineError::SchemaViolation(format!("{step} returned no content")),
        other => PipelineError::GenerationFailure(format!("{step}: {other}")),
    }
}

#[async_trait]
impl GenerativeStepPort for LlmStepPort {
    async fn invoke(&self, step: Step, input: Value) -> Result<Value, PipelineError> {
        let (role, _) = prompts::for_step(step);
        let prompt = render_prompt(step, &input);
        debug!("Invoking generative step {step} ({} prompt chars)", prompt.len());

        let output: Value = self
            .llm
            .complete_json(&system_prompt(role), &prompt)
            .await
            .map_err(|e| {
                warn!("Generative step {step} failed: {e}");
                map_llm_error(step, e)
            })?;

        if !output.is_object() {
            return Err(PipelineError::SchemaViolation(format!(
                "{step} returned a non-object JSON value"
            )));
        }
        Ok(output)
    }
}
