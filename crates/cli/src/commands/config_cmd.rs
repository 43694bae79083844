//! `triage config` — Configuration management commands.

use triage_config::AppConfig;

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   Config parsed successfully");

            let mut warnings = Vec::new();

            if !config.has_api_key() {
                warnings.push("No API key set (set TRIAGE_API_KEY or OPENAI_API_KEY)");
            }

            if config.gateway.host == "0.0.0.0" {
                warnings.push("Gateway bound to 0.0.0.0; every interface is exposed");
            }

            if config.classifier.template.trim().is_empty() {
                warnings.push("classifier.template is empty; classification will use no template");
            }

            if warnings.is_empty() {
                println!("   All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   warning: {w}");
                }
            }

            println!();
            println!("   Provider:      {}", config.default_provider);
            println!("   Model:         {}", config.default_model);
            println!("   Classifier:    {}", config.classifier_provider());
            println!("   Gateway:       {}:{}", config.gateway.host, config.gateway.port);
            println!("   Monthly limit: {}", config.quota.monthly_limit);
            println!("   Retrieval:     {}", if config.retrieval.enabled { "on" } else { "off" });
        }
        Err(e) => {
            println!("   Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}

pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    print!("{}", AppConfig::default_toml());
    Ok(())
}
