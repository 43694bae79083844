//! Prompt lookup handlers: `prompts.get` and `prompts.list`.

use async_trait::async_trait;
use std::sync::Arc;
use triage_core::error::HandlerError;
use triage_core::handler::{CallContext, Handler};
use triage_core::prompt::{PromptSource, prompt_stem};

use crate::str_param;

pub struct PromptGetHandler {
    prompts: Arc<dyn PromptSource>,
}

impl PromptGetHandler {
    pub fn new(prompts: Arc<dyn PromptSource>) -> Self {
        Self { prompts }
    }
}

#[async_trait]
impl Handler for PromptGetHandler {
    fn name(&self) -> &str {
        "prompts.get"
    }

    fn description(&self) -> &str {
        "Fetch a prompt template by name (with or without the .txt extension)."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "name": { "type": "string", "description": "Template name, e.g. master_prompt" }
            },
            "required": ["name"]
        })
    }

    async fn call(
        &self,
        params: serde_json::Value,
        _ctx: &CallContext,
    ) -> Result<serde_json::Value, HandlerError> {
        let name = str_param(&params, "name").unwrap_or_default();
        match self.prompts.get(name) {
            Some(content) => Ok(serde_json::json!({
                "name": prompt_stem(name),
                "content": content,
            })),
            None => Ok(serde_json::json!({ "error": format!("Prompt not found: {name}") })),
        }
    }
}

pub struct PromptListHandler {
    prompts: Arc<dyn PromptSource>,
}

impl PromptListHandler {
    pub fn new(prompts: Arc<dyn PromptSource>) -> Self {
        Self { prompts }
    }
}

#[async_trait]
impl Handler for PromptListHandler {
    fn name(&self) -> &str {
        "prompts.list"
    }

    fn description(&self) -> &str {
        "List the available prompt templates."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn call(
        &self,
        _params: serde_json::Value,
        _ctx: &CallContext,
    ) -> Result<serde_json::Value, HandlerError> {
        Ok(serde_json::json!({ "files": self.prompts.list() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use triage_core::prompt::PromptLibrary;

    #[tokio::test]
    async fn get_accepts_extension() {
        let h = PromptGetHandler::new(Arc::new(PromptLibrary::builtin()));
        let out = h
            .call(serde_json::json!({"name": "master_prompt.txt"}), &CallContext::default())
            .await
            .unwrap();
        assert_eq!(out["name"], "master_prompt");
        assert!(!out["content"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn get_unknown_reports_error() {
        let h = PromptGetHandler::new(Arc::new(PromptLibrary::builtin()));
        let out = h
            .call(serde_json::json!({"name": "nope"}), &CallContext::default())
            .await
            .unwrap();
        assert_eq!(out["error"], "Prompt not found: nope");
    }

    #[tokio::test]
    async fn list_includes_directory_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("triage_notes.txt"), "notes").unwrap();
        std::fs::write(dir.path().join("readme.md"), "ignored").unwrap();
        let h = PromptListHandler::new(Arc::new(PromptLibrary::new(Some(dir.path().to_path_buf()))));
        let out = h.call(serde_json::json!({}), &CallContext::default()).await.unwrap();
        let files: Vec<&str> = out["files"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|f| f.as_str())
            .collect();
        assert!(files.contains(&"triage_notes.txt"));
        assert!(files.contains(&"master_prompt.txt"));
        assert!(!files.contains(&"readme.md"));
    }
}
