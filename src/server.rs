use std::net::SocketAddr;

use anyhow::{anyhow, Context};
use axum::{
    extract::{Request, State},
    http::{header, Method, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    analytics,
    conf,
    docs::ApiDoc,
    mail::Mailer,
    otp::Otp,
    types::{
        AnalyticsData, AnalyticsResponse, SendEmailRequest,
        SendEmailResponse,
    },
};

#[derive(Debug)]
pub struct ApiError(StatusCode, Json<ErrorBody>);

#[derive(Debug, serde::Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
}

impl ApiError {
    fn bad_request(message: &str) -> Self {
        Self(
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                success: false,
                error: message.to_string(),
                hint: None,
            }),
        )
    }

    fn internal(error: &anyhow::Error, hint: Option<&str>) -> Self {
        Self(
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody {
                success: false,
                error: format!("{error:#}"),
                hint: hint.map(str::to_string),
            }),
        )
    }
}

impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let ApiError(status, body) = self;
        (status, body).into_response()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub analytics: analytics::Client,
    pub mailer: Mailer,
}

#[tracing::instrument(name = "server", skip_all)]
pub async fn run() -> anyhow::Result<()> {
    let conf = conf::global();
    tracing::info!(?conf, "Starting.");
    let addr = SocketAddr::from((conf.addr, conf.port));

    let state = AppState {
        analytics: analytics::Client::new(conf.analytics.clone()),
        mailer: Mailer::new(&conf.smtp)?,
    };
    let routes = router(state);
    let service = routes.into_make_service();

    match &conf.tls {
        None => {
            let listener = tokio::net::TcpListener::bind(addr).await?;
            tracing::warn!(?addr, "Listening unencrypted.");
            axum::serve(listener, service).await?;
        }
        Some(conf::Tls {
            cert_file,
            key_file,
        }) => {
            // XXX One MUST do this manual init of rustls provider when using
            //     more than a single dep which itself depends on rustls.
            //     Here we using 2:
            //     - axum_server
            //     - reqwest
            rustls::crypto::aws_lc_rs::default_provider()
                .install_default()
                .map_err(|crypto_provider| {
                    anyhow!(
                        "Failed to install default crypto provider: \
                        {crypto_provider:?}"
                    )
                })?;

            let config =
                axum_server::tls_rustls::RustlsConfig::from_pem_file(
                    cert_file, key_file,
                )
                .await
                .context(format!(
                    "Failed to construct RustlsConfig. \
                    cert_file={cert_file:?}, key_file={key_file:?}"
                ))?;

            tracing::info!(
                ?addr,
                ?cert_file,
                ?key_file,
                "Listening with TLS."
            );
            axum_server::bind_rustls(addr, config)
                .serve(service)
                .await?;
        }
    }

    Ok(())
}

/// The dashboard is served from a different origin, so the API stays
/// wide open: any origin, simple methods, preflight answered by the
/// CORS layer.
fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let api = Router::new()
        .route("/api/analytics", get(analytics_handler))
        .route("/api/send-email", post(send_email_handler))
        .layer(cors)
        .route_layer(middleware::from_fn({
            |req: Request, next: Next| {
                REQ_ID.scope(ReqId::new(), next.run(req))
            }
        }))
        .with_state(state);

    Router::new()
        .route("/health", get(health_check))
        .merge(
            SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", ApiDoc::openapi()),
        )
        .merge(api)
}

const MAX_BODY_SIZE: usize = 1024 * 64; // 64KB limit

const ANALYTICS_HINT: &str = "Check that the GA4 property ID is the \
    numeric ID (not the G-XXXX measurement ID) and that the service \
    account credential in conf.toml is valid.";

#[tracing::instrument(skip_all, fields(req_id = REQ_ID.get().req_id))]
#[utoipa::path(
    get,
    path = "/api/analytics",
    responses(
        (status = 200, description = "Dashboard metrics snapshot", body = AnalyticsResponse),
        (status = 500, description = "Token exchange or report fetch failed"),
    )
)]
pub async fn analytics_handler(
    State(state): State<AppState>,
) -> Result<Json<AnalyticsResponse>, ApiError> {
    let snapshot = state.analytics.snapshot().await.map_err(|error| {
        tracing::error!(?error, "Failed to fetch analytics snapshot.");
        ApiError::internal(&error, Some(ANALYTICS_HINT))
    })?;
    tracing::info!(
        active_users = snapshot.active_users,
        "Analytics snapshot fetched."
    );
    Ok(Json(AnalyticsResponse {
        success: true,
        data: AnalyticsData {
            active_users: snapshot.active_users,
            total_views: snapshot.total_views,
            total_users: snapshot.total_users,
        },
    }))
}

#[tracing::instrument(skip_all, fields(req_id = REQ_ID.get().req_id))]
#[utoipa::path(
    post,
    path = "/api/send-email",
    request_body = SendEmailRequest,
    responses(
        (status = 200, description = "OTP generated and emailed", body = SendEmailResponse),
        (status = 400, description = "Missing email or username"),
        (status = 500, description = "SMTP delivery failed"),
    )
)]
pub async fn send_email_handler(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<SendEmailResponse>, ApiError> {
    let bytes = axum::body::to_bytes(request.into_body(), MAX_BODY_SIZE)
        .await
        .map_err(|error| {
            tracing::warn!(?error, "Failed to read request body.");
            ApiError::bad_request("Invalid request body")
        })?;
    let request: SendEmailRequest = serde_json::from_slice(&bytes)
        .map_err(|error| {
            tracing::warn!(?error, "Failed to parse request body.");
            ApiError::bad_request("Request body is not valid JSON")
        })?;

    if request.email.is_empty() || request.username.is_empty() {
        tracing::warn!("Rejecting OTP request with missing fields.");
        return Err(ApiError::bad_request("Email and username are required"));
    }

    let otp = Otp::generate();
    state
        .mailer
        .send_otp(&request.email, &request.username, &otp)
        .await
        .map_err(|error| {
            tracing::error!(?error, "Failed to send OTP email.");
            ApiError::internal(&error, None)
        })?;

    tracing::info!(to = %request.email, "OTP email sent.");
    Ok(Json(SendEmailResponse {
        success: true,
        otp: otp.to_string(),
    }))
}

async fn health_check() -> &'static str {
    "OK"
}

#[derive(Debug, Clone)]
struct ReqId {
    pub req_id: String,
}

impl ReqId {
    fn new() -> Self {
        let req_id = cuid2::create_id();
        Self { req_id }
    }
}

tokio::task_local! {
    pub static REQ_ID: ReqId;
}

#[cfg(test)]
mod tests;
