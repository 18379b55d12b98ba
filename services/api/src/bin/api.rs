//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{GcsStorageAdapter, VertexAiAdapter},
    config::Config,
    error::ApiError,
    web::{rest::ApiDoc, router, state::AppState},
};
use axum::http::{header::CONTENT_TYPE, HeaderValue, Method};
use axum::Router;
use feedback_core::{
    FeedbackFlow, ModelTargets, ResponseGenerator, SubmissionMetadata, SubmissionWriter,
    RECORD_VERSION,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");
    info!(
        project = %config.project_id,
        location = %config.location,
        tuned_model = %config.tuned_model_name,
        raw = %config.raw_location(),
        "Deployment targets"
    );

    // --- 2. Initialize Service Adapters ---
    let http_client = reqwest::Client::builder().build()?;

    let inference = Arc::new(VertexAiAdapter::new(
        http_client.clone(),
        config.project_id.clone(),
        config.location.clone(),
        config.access_token.clone(),
    ));
    let storage = Arc::new(GcsStorageAdapter::new(
        http_client,
        config.storage_base_url.clone(),
        config.raw_bucket_name.clone(),
        config.access_token.clone(),
    ));

    // --- 3. Build the Generator, Writer and Flow ---
    let generator = ResponseGenerator::new(
        inference,
        ModelTargets {
            tuned: config.tuned_model_name.clone(),
            fallback: config.fallback_model.clone(),
        },
        config.chain_order,
        config.generation.clone(),
    );
    let writer = SubmissionWriter::new(storage, &config.raw_prefix, config.key_suffix);
    let flow = FeedbackFlow::new(
        generator,
        writer,
        SubmissionMetadata {
            provenance: config.provenance.clone(),
            version: RECORD_VERSION.to_string(),
        },
    );

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        config: config.clone(),
        flow,
    });

    let origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid CORS_ORIGIN '{}': {}", config.cors_origin, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE]);

    // --- 5. Create the Web Router ---
    let app = Router::new()
        .merge(router(app_state).layer(cors))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
