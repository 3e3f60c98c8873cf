//! Application state, routing and server lifecycle.

use crate::config::{AllowedOrigins, PantryConfig};
use crate::handlers;
use crate::middleware::{auth_middleware, metrics_middleware};
use crate::services::metrics::init_metrics;
use crate::services::recipes::RecipeSettings;
use crate::services::{
    build_identity_resolver, build_store, ChatModel, IdentityResolver, OpenRouterChatModel,
    PantryStore, RecipeService,
};
use axum::{
    http::{header, HeaderValue, Method, Request},
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, patch, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    security_headers::security_headers_middleware, tracing::request_id_middleware,
};
use service_core::observability::extract_request_id;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: PantryConfig,
    pub store: Arc<dyn PantryStore>,
    pub identity: Arc<dyn IdentityResolver>,
    pub recipes: RecipeService,
}

impl AppState {
    pub fn new(
        config: PantryConfig,
        store: Arc<dyn PantryStore>,
        identity: Arc<dyn IdentityResolver>,
        model: Arc<dyn ChatModel>,
    ) -> Self {
        let recipes = RecipeService::new(
            store.clone(),
            model,
            RecipeSettings::from(&config.model),
        );

        Self {
            config,
            store,
            identity,
            recipes,
        }
    }
}

fn cors_layer(origins: &AllowedOrigins) -> CorsLayer {
    let allow_origin = match origins {
        AllowedOrigins::Any => AllowOrigin::any(),
        AllowedOrigins::List(list) => AllowOrigin::list(
            // Origins are validated when the configuration is loaded.
            list.iter()
                .filter_map(|o| o.parse::<HeaderValue>().ok())
                .collect::<Vec<_>>(),
        ),
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/pantry/list", get(handlers::pantry::list_items))
        .route("/pantry/add", post(handlers::pantry::add_item))
        .route("/pantry/update/:item_id", patch(handlers::pantry::update_item))
        .route("/pantry/remove/:item_id", delete(handlers::pantry::remove_item))
        .route(
            "/api/recipes",
            get(handlers::recipes::suggest_recipes).post(handlers::recipes::prompt_recipes),
        )
        .route("/recipes/suggest", get(handlers::recipes::suggest_recipes))
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    let cors = cors_layer(&state.config.cors.allowed_origins);

    Router::new()
        .route("/", get(handlers::app::root))
        .route("/health", get(handlers::app::health_check))
        .route("/ready", get(handlers::app::readiness_check))
        .route("/metrics", get(handlers::metrics::metrics))
        .merge(protected)
        .with_state(state)
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                let request_id =
                    extract_request_id(request.headers()).unwrap_or_else(|| "-".to_string());

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Wire the store, identity resolver and chat model from `config` and
    /// bind the listener. Port 0 binds a random port.
    pub async fn build(config: PantryConfig) -> Result<Self, AppError> {
        let store = build_store(&config)?;
        let identity = build_identity_resolver(&config)?;

        let model: Arc<dyn ChatModel> = Arc::new(
            OpenRouterChatModel::new(&config.model)
                .map_err(|e| AppError::Config(anyhow::anyhow!(e)))?,
        );
        tracing::info!(
            model = %config.model.model,
            base_url = %config.model.base_url,
            "Initialized recipe chat model"
        );

        Self::with_state(AppState::new(config, store, identity, model)).await
    }

    /// Bind a listener for an already assembled state.
    pub async fn with_state(state: AppState) -> Result<Self, AppError> {
        init_metrics()?;

        let address = state.config.common.address();
        let listener = TcpListener::bind(&address).await.map_err(|e| {
            tracing::error!("Failed to bind listener to {}: {}", address, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(
            service = %state.config.service_name,
            "Pantry service listening on port {}",
            port
        );

        Ok(Self {
            port,
            listener,
            router: build_router(state),
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Serve until Ctrl+C or SIGTERM.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
