//! `triage classify` — Print the classifier's verdict without routing.

use triage_agent::resolve_handler;
use triage_config::AppConfig;

pub async fn run(message: &str, user: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let state = triage_gateway::build_state(&config);

    let result = state
        .orchestrator
        .classifier()
        .classify(message, user, None, None)
        .await;

    println!("{}", serde_json::to_string_pretty(&result)?);
    if result.has_routing_signal() {
        let handler = resolve_handler(result.route_to.as_deref(), &result.classification, message);
        println!();
        println!("   Would route to: {handler}");
    }

    Ok(())
}
