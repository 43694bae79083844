//! `triage prompts` — Inspect the prompt library.

use triage_config::AppConfig;
use triage_core::prompt::{PromptLibrary, PromptSource};

pub async fn run(name: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let library = PromptLibrary::new(config.prompts.dir.clone());

    match name {
        Some(name) => {
            let content = library
                .get(name)
                .ok_or_else(|| format!("Prompt not found: {name}"))?;
            println!("{content}");
        }
        None => {
            for file in library.list() {
                println!("{file}");
            }
        }
    }

    Ok(())
}
