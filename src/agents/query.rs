//! Query Agent
//!
//! Answers natural-language questions about one bound dataset. With code
//! execution enabled the agent runs a short tool loop: the model may reply
//! with a single fenced code block, which runs in the [`AnalysisSandbox`] and
//! whose output is fed back as an observation. The first reply without code
//! is the answer.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::agents::memory::ConversationMemory;
use crate::agents::sandbox::{AnalysisSandbox, ExecutionOutput};
use crate::agents::AgentSettings;
use crate::llm::LLMAdapter;
use crate::models::CanonicalDataset;
use crate::profile::DatasetProfile;
use crate::types::{AppError, AppResult, LLMMessage, LLMRequest};
use crate::utils::with_retry;

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct QueryAnswer {
    pub text: String,
    pub artifacts: Vec<PathBuf>,
}

pub struct QueryAgent {
    dataset: CanonicalDataset,
    profile: DatasetProfile,
    memory: ConversationMemory,
    backend: Arc<dyn LLMAdapter>,
    settings: AgentSettings,
    sandbox: Option<AnalysisSandbox>,
    work_dir: PathBuf,
}

impl QueryAgent {
    pub fn new(
        dataset: CanonicalDataset,
        profile: DatasetProfile,
        backend: Arc<dyn LLMAdapter>,
        settings: AgentSettings,
        sandbox: Option<AnalysisSandbox>,
        work_dir: PathBuf,
    ) -> Self {
        Self {
            dataset,
            profile,
            memory: ConversationMemory::new(),
            backend,
            settings,
            sandbox,
            work_dir,
        }
    }

    pub fn dataset_name(&self) -> &str {
        &self.dataset.display_name
    }

    pub fn dataset_path(&self) -> &Path {
        &self.dataset.source_path
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    fn system_prompt(&self) -> String {
        let mut prompt = format!(
            "You are a data analyst answering questions about one tabular dataset. \
             Be concise and state numbers exactly.\n\n{}",
            self.profile.to_prompt()
        );
        match &self.sandbox {
            Some(_) => prompt.push_str(
                "\nWhen you need to compute something, reply with exactly one fenced code \
                 block (```python ... ```) and nothing else. The code runs with the CSV path \
                 in the DATASET_PATH environment variable; print every value you need. To \
                 draw a chart, save the image into the directory named by OUTPUT_DIR. You \
                 will then receive the printed output. When you can answer, reply in plain \
                 language without any code block. If asked for a visualization, describe the \
                 chart you produced.",
            ),
            None => prompt.push_str(
                "\nAnswer from the summary above. If the question needs analysis the \
                 summary cannot support, say which computation would be needed.",
            ),
        }
        prompt
    }

    async fn complete(&self, messages: &[LLMMessage]) -> AppResult<String> {
        let request = LLMRequest {
            model: self.settings.model.clone(),
            messages: messages.to_vec(),
            max_tokens: Some(self.settings.max_tokens),
            temperature: Some(self.settings.temperature),
            system_instruction: Some(self.system_prompt()),
        };
        let backend = &self.backend;
        let request = &request;
        let response = with_retry(
            move || backend.create_chat_completion(request),
            self.settings.max_attempts,
            self.settings.retry_delay,
            |e: &AppError| e.is_retryable(),
        )
        .await?;
        Ok(response.content)
    }

    /// Answer one question and record the exchange in memory.
    ///
    /// Backend failures are returned as errors and leave memory untouched.
    /// Analysis failures become an apologetic answer so the conversation
    /// continues.
    pub async fn answer(&mut self, question: &str) -> AppResult<QueryAnswer> {
        info!(
            dataset = %self.dataset.display_name,
            question_len = question.len(),
            history = self.memory.len(),
            "Answering query"
        );

        let mut messages = self.memory.to_messages();
        messages.push(LLMMessage::user(question));
        let mut artifacts = Vec::new();
        let mut steps = 0;

        let text = loop {
            let reply = self.complete(&messages).await?;

            let (sandbox, code) = match (&self.sandbox, extract_code_block(&reply)) {
                (Some(sandbox), Some(code)) => (sandbox, code),
                _ => break reply,
            };

            if steps >= sandbox.config().max_steps {
                warn!(steps, "Analysis step limit reached");
                break format!(
                    "I could not complete that analysis: it needed more than {} steps.",
                    sandbox.config().max_steps
                );
            }
            steps += 1;

            match sandbox
                .run(&code, &self.dataset.source_path, &self.work_dir)
                .await
            {
                Ok(output) => {
                    artifacts.extend(output.artifacts.iter().cloned());
                    messages.push(LLMMessage::assistant(reply));
                    messages.push(LLMMessage::user(observation(&output)));
                }
                Err(e) => {
                    warn!(error = %e, "Analysis code failed");
                    break format!("I could not complete that analysis. {}", e);
                }
            }
        };

        let text = with_artifacts(text, &artifacts, &self.work_dir);
        self.memory.push(question, text.clone());
        Ok(QueryAnswer { text, artifacts })
    }
}

fn observation(output: &ExecutionOutput) -> String {
    let mut text = format!("Execution output:\n{}", output.stdout.trim_end());
    if !output.stderr.trim().is_empty() {
        text.push_str(&format!("\nStandard error:\n{}", output.stderr.trim_end()));
    }
    if !output.artifacts.is_empty() {
        let names: Vec<String> = output
            .artifacts
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
            .collect();
        text.push_str(&format!("\nFiles written: {}", names.join(", ")));
    }
    text
}

/// Generated files are listed relative to the session workspace.
fn with_artifacts(text: String, artifacts: &[PathBuf], work_dir: &Path) -> String {
    if artifacts.is_empty() {
        return text;
    }
    let listed: Vec<String> = artifacts
        .iter()
        .map(|p| format!("- {}", p.strip_prefix(work_dir).unwrap_or(p).display()))
        .collect();
    format!("{}\n\nGenerated files:\n{}", text, listed.join("\n"))
}

/// Body of the first fenced code block, without the language tag.
pub fn extract_code_block(text: &str) -> Option<String> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    let body_start = after_fence.find('\n')? + 1;
    let body = &after_fence[body_start..];
    let end = body.find("```")?;
    let code = body[..end].trim_end();
    if code.trim().is_empty() {
        None
    } else {
        Some(code.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_code_block() {
        let reply = "Let me check.\n```python\nimport pandas as pd\nprint(1)\n```\nthanks";
        assert_eq!(
            extract_code_block(reply).as_deref(),
            Some("import pandas as pd\nprint(1)")
        );
        assert_eq!(extract_code_block("```\necho hi\n```").as_deref(), Some("echo hi"));
        assert_eq!(extract_code_block("No code here."), None);
        assert_eq!(extract_code_block("```python\n```"), None);
        assert_eq!(extract_code_block("```python\nprint(1)"), None);
    }

    #[test]
    fn test_with_artifacts() {
        let work_dir = Path::new("/srv/tabular-chat-1a2b");
        assert_eq!(with_artifacts("done".into(), &[], work_dir), "done");
        let text = with_artifacts(
            "Here is the chart.".into(),
            &[work_dir.join("runs/42/output/plot.png")],
            work_dir,
        );
        assert!(text.ends_with("Generated files:\n- runs/42/output/plot.png"));
        assert!(!text.contains("/srv/"));
    }
}
