//! `triage serve` — Start the HTTP gateway.

use triage_config::AppConfig;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("Triage Gateway");
    println!("   Listening:     {}:{}", config.gateway.host, config.gateway.port);
    println!("   Provider:      {}", config.default_provider);
    println!("   Classifier:    {}", config.classifier_provider());
    println!("   Monthly limit: {}", config.quota.monthly_limit);

    triage_gateway::start(config).await?;

    Ok(())
}
