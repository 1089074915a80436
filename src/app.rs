use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::any::Any;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};

use crate::admission::AdmissionController;
use crate::assets::{AssetReplacer, FsAssetStorage};
use crate::auth::Authenticator;
use crate::config::AppConfig;
use crate::database::{Address, GuardedStore, Profile, Stores};
use crate::error::ApiError;
use crate::handlers::{protected, public};
use crate::middleware::{authenticate_middleware, metrics_middleware, rate_limit_middleware, telemetry};

/// Shared components handed to every request.
#[derive(Clone)]
pub struct AppState {
    pub admission: Arc<AdmissionController>,
    pub authenticator: Arc<Authenticator>,
    pub profiles: GuardedStore<Profile>,
    pub addresses: GuardedStore<Address>,
    pub pictures: AssetReplacer<Profile>,
    pub metrics: PrometheusHandle,
    pub max_upload_bytes: usize,
    pub cors_origins: Vec<String>,
}

impl AppState {
    pub fn new(config: &AppConfig, stores: Stores) -> Self {
        let storage = Arc::new(FsAssetStorage::new(config.server.uploads_dir.clone()));

        Self {
            admission: Arc::new(AdmissionController::new(config.rate_limit.clone())),
            authenticator: Arc::new(Authenticator::new(&config.security.jwt_secret)),
            pictures: AssetReplacer::new(storage, stores.profiles.clone()),
            profiles: stores.profiles,
            addresses: stores.addresses,
            metrics: telemetry::recorder(),
            max_upload_bytes: config.server.max_upload_bytes,
            cors_origins: config.security.cors_origins.clone(),
        }
    }
}

/// Builds the full application router.
///
/// Every request is counted, and a panicking handler becomes a 500 envelope.
/// Requests pass through admission first, then authentication, before any
/// handler runs. Unmatched paths and methods answer with JSON errors.
pub fn router(state: AppState) -> Router {
    let layers = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(metrics_middleware))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(cors_layer(&state.cors_origins))
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), authenticate_middleware));

    Router::new()
        .merge(public_routes())
        .merge(profile_routes())
        .merge(address_routes())
        .fallback(public::not_found)
        .method_not_allowed_fallback(public::method_not_allowed)
        .layer(layers)
        .with_state(state)
}

fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(public::health))
        .route("/profiles/pictures/:file", get(public::picture_get))
        .route("/debug/vars", get(public::debug_vars))
}

fn profile_routes() -> Router<AppState> {
    use protected::profiles;

    Router::new()
        .route("/profiles", post(profiles::create))
        .route("/profiles/me", get(profiles::me))
        .route("/profiles/:id", patch(profiles::update))
}

fn address_routes() -> Router<AppState> {
    use protected::addresses;

    Router::new()
        .route("/addresses", post(addresses::create))
        .route("/addresses/me", get(addresses::me))
        .route("/addresses/:id", patch(addresses::update))
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!("Request handler panicked: {}", detail);

    ApiError::internal_server_error("the server encountered a problem").into_response()
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", o);
                None
            }
        })
        .collect();

    CorsLayer::permissive().allow_origin(allowed)
}
