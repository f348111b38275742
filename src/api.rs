//! REST API for the load planning service.
//!
//! Exposes the engine over HTTP with Axum. Planning runs on the blocking
//! thread pool; the streaming endpoint forwards loader progress as
//! Server-Sent Events.

use std::sync::{Arc, OnceLock};

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{
    Router,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};
use utoipa::{OpenApi, ToSchema};

use crate::cache::CacheStats;
use crate::config::ApiConfig;
use crate::engine::PackingEngine;
use crate::model::{
    Container, Demand, Dimensions, Extent, OptimizationResult, Pallet, PalletArrangement,
    PalletSlot, Position, Product, ProductPlacement, Rotation,
};
use crate::optimizer::LoadEvent;
use crate::units::LengthUnit;

#[derive(Clone)]
struct ApiState {
    engine: Arc<PackingEngine>,
}

static OPENAPI_DOC: OnceLock<utoipa::openapi::OpenApi> = OnceLock::new();

const SWAGGER_UI_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
    <head>
        <meta charset="utf-8" />
        <title>stack-it-now API Docs</title>
        <link
            rel="stylesheet"
            href="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui.css"
            integrity="sha384-wxLW6kwyHktdDGr6Pv1zgm/VGJh99lfUbzSn6HNHBENZlCN7W602k9VkGdxuFvPn"
            crossorigin="anonymous"
        />
    </head>
    <body>
        <div id="swagger-ui"></div>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-bundle.js"
            integrity="sha384-wmyclcVGX/WhUkdkATwhaK1X1JtiNrr2EoYJ+diV3vj4v6OC5yCeSu+yW13SYJep"
            crossorigin="anonymous"
        ></script>
        <script>
            window.onload = function () {
                window.ui = SwaggerUIBundle({
                    url: "/docs/openapi.json",
                    dom_id: "#swagger-ui",
                });
            };
        </script>
    </body>
    </html>"##;

fn openapi_doc() -> &'static utoipa::openapi::OpenApi {
    OPENAPI_DOC.get_or_init(ApiDoc::openapi)
}

/// Request body for both optimization endpoints.
///
/// The standard 120 × 100 cm pallet is used when `pallet` is omitted.
#[derive(Deserialize, Serialize, Clone, Debug, ToSchema)]
#[schema(
    example = json!({
        "demands": [
            {
                "product": {
                    "id": "box-s",
                    "name": "Small box",
                    "weight": 5.0,
                    "dimensions": {"length": 50.0, "width": 40.0, "height": 30.0, "unit": "cm"}
                },
                "quantity": 4
            }
        ],
        "container": {
            "dimensions": {"length": 1200.0, "width": 240.0, "height": 240.0, "unit": "cm"},
            "max_weight": 26000.0
        }
    })
)]
pub struct OptimizeRequest {
    pub demands: Vec<Demand>,
    pub container: Container,
    #[serde(default)]
    #[schema(nullable = true)]
    pub pallet: Option<Pallet>,
}

#[derive(Serialize, ToSchema)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    cache: CacheStats,
}

#[derive(Serialize, ToSchema)]
struct ErrorResponse {
    error: String,
    details: String,
}

impl ErrorResponse {
    fn new(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: details.into(),
        }
    }
}

fn error_response(
    status: StatusCode,
    error: impl Into<String>,
    details: impl Into<String>,
) -> Response {
    (status, Json(ErrorResponse::new(error, details))).into_response()
}

fn parse_request(
    payload: Result<Json<OptimizeRequest>, JsonRejection>,
) -> Result<OptimizeRequest, Response> {
    match payload {
        Ok(Json(request)) => Ok(request),
        Err(err) => {
            warn!(error = %err, "rejected malformed request");
            Err(error_response(
                StatusCode::UNPROCESSABLE_ENTITY,
                "Invalid JSON data",
                err.to_string(),
            ))
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(handle_optimize, handle_optimize_stream, handle_health),
    components(
        schemas(
            OptimizeRequest,
            OptimizationResult,
            PalletArrangement,
            ProductPlacement,
            PalletSlot,
            Demand,
            Product,
            Dimensions,
            LengthUnit,
            Pallet,
            Container,
            Position,
            Extent,
            Rotation,
            LoadEvent,
            HealthResponse,
            CacheStats,
            ErrorResponse
        )
    ),
    tags((name = "planning", description = "Endpoints for pallet and container load planning"))
)]
struct ApiDoc;

/// Builds the application router around `engine`.
pub fn router(engine: Arc<PackingEngine>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        .route("/optimize", post(handle_optimize))
        .route("/optimize_stream", post(handle_optimize_stream))
        .route("/health", get(handle_health))
        .route("/docs/openapi.json", get(serve_openapi_json))
        .route("/docs", get(serve_openapi_ui))
        .layer(cors)
        .with_state(ApiState { engine })
}

/// Binds the configured address and serves until the server stops.
pub async fn start_api_server(
    config: ApiConfig,
    engine: Arc<PackingEngine>,
) -> std::io::Result<()> {
    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(
        "server running on http://{}:{}",
        config.display_host(),
        config.port()
    );
    if config.binds_to_all_interfaces() {
        info!("local access: http://localhost:{}", config.port());
    }
    info!("endpoints: POST /optimize, POST /optimize_stream, GET /health, GET /docs");

    axum::serve(listener, router(engine)).await
}

/// Handler for POST /optimize.
///
/// Engine-level failures (invalid products, oversize, empty demand) are
/// reported with status 200 and `success: false`.
#[utoipa::path(
    post,
    path = "/optimize",
    request_body = OptimizeRequest,
    responses(
        (status = 200, description = "Planning result", body = OptimizationResult),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Malformed request body",
            body = ErrorResponse
        )
    ),
    tag = "planning"
)]
async fn handle_optimize(
    State(state): State<ApiState>,
    payload: Result<Json<OptimizeRequest>, JsonRejection>,
) -> Response {
    let request = match parse_request(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };

    info!(demands = request.demands.len(), "new optimization request");
    let engine = Arc::clone(&state.engine);
    let outcome = tokio::task::spawn_blocking(move || {
        engine.optimize(&request.demands, &request.container, request.pallet.as_ref())
    })
    .await;

    match outcome {
        Ok(result) => {
            info!(
                success = result.success,
                pallets = result.pallet_count(),
                utilization = result.utilization,
                "optimization answered"
            );
            (StatusCode::OK, Json(result)).into_response()
        }
        Err(err) => {
            error!(error = %err, "optimization task failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Optimization failed",
                err.to_string(),
            )
        }
    }
}

/// Handler for POST /optimize_stream (SSE).
///
/// Every `LoadEvent` is sent as a data message; the complete
/// `OptimizationResult` follows as an event named `result`.
#[utoipa::path(
    post,
    path = "/optimize_stream",
    request_body = OptimizeRequest,
    responses(
        (
            status = 200,
            description = "Streams load events in real-time",
            content_type = "text/event-stream",
            body = String
        ),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Malformed request body",
            body = ErrorResponse
        )
    ),
    tag = "planning"
)]
async fn handle_optimize_stream(
    State(state): State<ApiState>,
    payload: Result<Json<OptimizeRequest>, JsonRejection>,
) -> Response {
    let request = match parse_request(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let (tx, rx) = mpsc::channel::<Event>(32);
    let engine = Arc::clone(&state.engine);

    tokio::task::spawn_blocking(move || {
        let progress = tx.clone();
        let result = engine.optimize_with_progress(
            &request.demands,
            &request.container,
            request.pallet.as_ref(),
            |evt| {
                if let Ok(json) = serde_json::to_string(evt) {
                    // A closed receiver only means nobody is listening anymore.
                    let _ = progress.blocking_send(Event::default().data(json));
                }
            },
        );
        match serde_json::to_string(&result) {
            Ok(json) => {
                let _ = tx.blocking_send(Event::default().event("result").data(json));
            }
            Err(err) => error!(error = %err, "could not serialize streamed result"),
        }
    });

    let stream = ReceiverStream::new(rx).map(Ok::<_, std::convert::Infallible>);
    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(std::time::Duration::from_secs(10))
                .text("keep-alive"),
        )
        .into_response()
}

/// Handler for GET /health.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse)),
    tag = "planning"
)]
async fn handle_health(State(state): State<ApiState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        cache: state.engine.cache_stats(),
    })
}

async fn serve_openapi_json() -> impl IntoResponse {
    Json(openapi_doc())
}

async fn serve_openapi_ui() -> impl IntoResponse {
    Html(SWAGGER_UI_HTML)
}
