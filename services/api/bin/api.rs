//! Main Entrypoint for the Tutor API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing the database connection pool.
//! 3. Initializing shared services (the Completion Service, Message Analyzer and Exam Pipeline).
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use async_openai::config::OpenAIConfig;
use sqlx::PgPool;
use std::{collections::HashMap, fs, net::SocketAddr, path::Path, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};
use tutor_api::{
    config::{Config, Provider},
    db::Db,
    router::create_router,
    sessions::{ConversationRegistry, ExamRegistry},
    state::AppState,
};
use tutor_core::{
    analyzer::MessageAnalyzer,
    completion::{CompletionService, OpenAICompletionService, StubCompletionService},
    exam::ExamPipeline,
    prompts::PromptTemplates,
};

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to install Ctrl+C handler");
        return;
    }
    info!("Received shutdown signal. Shutting down gracefully...");
}

/// A helper function to load prompt overrides from a directory.
fn load_prompts(prompts_path: &Path) -> anyhow::Result<HashMap<String, String>> {
    let mut prompts = HashMap::new();
    if !prompts_path.is_dir() {
        warn!(path = %prompts_path.display(), "Prompts directory not found, using built-in prompts");
        return Ok(prompts);
    }
    for entry in fs::read_dir(prompts_path)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
            let prompt_key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Could not get file stem")?
                .to_string();
            let content = fs::read_to_string(&path)?;
            prompts.insert(prompt_key, content);
        }
    }
    Ok(prompts)
}

fn completion_service(config: &Config) -> anyhow::Result<Arc<dyn CompletionService>> {
    let (api_key, api_base) = match &config.provider {
        Provider::OpenAI => {
            info!("Using OpenAI provider.");
            (
                config.openai_api_key.as_ref().context("OPENAI_API_KEY is not set")?,
                "https://api.openai.com/v1/",
            )
        }
        Provider::Gemini => {
            info!("Using Gemini provider.");
            (
                config.gemini_api_key.as_ref().context("GEMINI_API_KEY is not set")?,
                "https://generativelanguage.googleapis.com/v1beta/openai",
            )
        }
        Provider::Stub => {
            warn!("Using stub provider. Analysis and exams will use fallbacks only.");
            return Ok(Arc::new(StubCompletionService));
        }
    };

    let openai_config = OpenAIConfig::new()
        .with_api_key(api_key)
        .with_api_base(api_base);
    Ok(Arc::new(OpenAICompletionService::new(
        openai_config,
        config.chat_model.clone(),
    )))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Initialize Database ---
    let pool = PgPool::connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    let db = Arc::new(Db::new(pool));
    info!("Database connection established.");

    // --- 4. Initialize Shared Services ---
    let prompts = load_prompts(&config.prompts_path)?;
    let templates = PromptTemplates::from_map(&prompts);
    let completion = completion_service(&config)?;

    let app_state = Arc::new(AppState {
        learning: db,
        analyzer: Arc::new(MessageAnalyzer::new(
            completion.clone(),
            &templates,
            config.completion_timeout,
        )),
        exam_pipeline: Arc::new(ExamPipeline::new(
            completion,
            &templates,
            config.completion_timeout,
        )),
        conversations: ConversationRegistry::default(),
        exams: ExamRegistry::default(),
    });

    // --- 5. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 6. Start Server ---
    info!(
        provider = ?config.provider,
        model = %config.chat_model,
        bind_address = %config.bind_address,
        timeout_secs = config.completion_timeout.as_secs(),
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
