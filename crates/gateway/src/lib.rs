//! HTTP gateway for Triage.
//!
//! Exposes the handler registry over JSON-RPC, the unified chat endpoint,
//! usage lookup, and a health check.
//!
//! Built on Axum for high performance async HTTP.

pub mod chat_api;
pub mod mcp;

use axum::extract::DefaultBodyLimit;
use axum::{Router, response::Json, routing::{get, post}};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use triage_agent::{ClassifierAdapter, Orchestrator, extended_registry};
use triage_config::AppConfig;
use triage_core::handler::HandlerRegistry;
use triage_core::memory::ConversationStore;
use triage_core::prompt::{PromptLibrary, PromptSource};
use triage_core::quota::QuotaService;
use triage_memory::{ContextBuilder, InMemoryConversationStore, spawn_sweeper};
use triage_providers::{GenerationService, Metering, ProviderRouter};
use triage_usage::QuotaLedger;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub config: AppConfig,

    /// Every handler, the orchestrator included
    pub registry: HandlerRegistry,

    pub orchestrator: Arc<Orchestrator>,
    pub quota: Arc<dyn QuotaService>,
}

pub type SharedState = Arc<GatewayState>;

/// Wire every subsystem from configuration.
pub fn build_state(config: &AppConfig) -> SharedState {
    let router = triage_providers::build_from_config(config);
    build_state_with_router(config, Arc::new(router))
}

/// Wire every subsystem around an already built provider router.
///
/// Three generation services share the router and the quota ledger:
/// direct handler calls are fully metered, routed calls only check the
/// quota (the orchestrator records the deduction), and classification is
/// free.
pub fn build_state_with_router(config: &AppConfig, router: Arc<ProviderRouter>) -> SharedState {
    let quota: Arc<dyn QuotaService> = Arc::new(QuotaLedger::new(config.quota.monthly_limit));
    let memory: Arc<dyn ConversationStore> = Arc::new(InMemoryConversationStore::new(
        config.memory.max_turns,
        config.memory.max_inactive_minutes,
    ));
    let prompts: Arc<dyn PromptSource> = Arc::new(PromptLibrary::new(config.prompts.dir.clone()));
    let builder = ContextBuilder::new(config.retrieval.top_k, config.retrieval.recency_half_life_minutes);

    let generation = |metering: Metering| {
        Arc::new(
            GenerationService::new(router.clone(), quota.clone())
                .with_metering(metering)
                .with_temperature(config.default_temperature)
                .with_max_tokens(config.default_max_tokens),
        )
    };

    let leaves = triage_tools::default_registry(generation(Metering::Full), prompts.clone(), builder.clone());
    let routed = triage_tools::default_registry(
        generation(Metering::CheckOnly),
        prompts.clone(),
        builder.clone(),
    );
    let classifier = ClassifierAdapter::new(generation(Metering::Off), prompts)
        .with_provider(config.classifier_provider())
        .with_templates(
            config.classifier.template.clone(),
            config.classifier.master_template.clone(),
        );

    let orchestrator = Arc::new(
        Orchestrator::new(routed, classifier, memory, quota.clone())
            .with_context_builder(builder)
            .with_retrieval(config.retrieval.enabled),
    );
    let registry = extended_registry(&leaves, orchestrator.clone());

    Arc::new(GatewayState {
        config: config.clone(),
        registry,
        orchestrator,
        quota,
    })
}

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    let body_limit = state.config.gateway.body_limit_bytes;

    Router::new()
        .route("/health", get(health_handler))
        .route("/mcp/jsonrpc", post(mcp::jsonrpc_handler))
        .route("/mcp/tools", get(mcp::list_tools_handler))
        .route("/api/ai/chat", post(chat_api::chat_handler))
        .route("/api/usage/{owner}", get(chat_api::usage_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    if !config.has_api_key() {
        warn!("No API key configured; requests to hosted providers will fail");
    }

    let state = build_state(&config);
    let sweep_every = std::time::Duration::from_secs(config.memory.sweep_interval_minutes * 60);
    let _sweeper = spawn_sweeper(state.orchestrator.memory().clone(), sweep_every);

    let app = build_router(state.clone());

    info!(addr = %addr, handlers = state.registry.len(), "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}


#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use test_support::{medical_query, state_with};
    use tower::ServiceExt;

    #[tokio::test]
    async fn health_endpoint() {
        let app = build_router(state_with("{}", Ok("ok"), 10));

        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn wiring_registers_every_handler() {
        let state = state_with(&medical_query("MedicalQueryService", true), Ok("ok"), 10);
        assert_eq!(
            state.registry.names(),
            vec![
                "ai.chat",
                "ai.route_with_master_prompt",
                "ai.tool.diagnosis_support",
                "ai.tool.drug_info",
                "prompts.get",
                "prompts.list",
                "rag.build_context_from_history",
            ]
        );
        assert!(!state.orchestrator.handlers().contains("ai.route_with_master_prompt"));
    }
}
