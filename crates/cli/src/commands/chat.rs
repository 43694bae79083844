//! `triage chat` — Route one message through the orchestrator.

use triage_agent::{RouteError, RouteRequest};
use triage_config::AppConfig;

pub async fn run(message: &str, user: &str, include_rag: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if !config.has_api_key() {
        eprintln!("  warning: no API key configured, hosted providers will reject requests");
    }

    let state = triage_gateway::build_state(&config);
    let request = RouteRequest::new(user, message).with_rag(include_rag);

    match state.orchestrator.route(request).await {
        Ok(response) => {
            println!("{}", response.text);
            println!();
            println!("   Classification: {}", response.classification);
            if let Some(handler) = &response.handler {
                println!("   Handler:        {handler}");
            }
            if let Some(model) = &response.model {
                println!("   Model:          {model}");
            }
            if let Some(remaining) = response.available_requests {
                println!("   Remaining:      {remaining}");
            }
            Ok(())
        }
        Err(RouteError::QuotaExceeded { owner_id }) => {
            Err(format!("Monthly request limit exceeded for {owner_id}").into())
        }
    }
}
