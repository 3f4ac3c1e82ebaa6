use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    routing::get,
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::{
    auth, contact, projects,
    config::AppConfig,
    security::{with_security_headers, IpRateLimiter, RateLimitLayer},
    service_catalog,
    state::AppState,
    users,
};

fn cors(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-requested-with"),
            HeaderName::from_static("x-auth-token"),
        ])
        .allow_credentials(true)
        .max_age(Duration::from_secs(86_400))
}

pub fn build_app(state: AppState) -> Router {
    let limiter = Arc::new(IpRateLimiter::new(&state.config.rate_limit));
    let cors = cors(&state.config);

    let api = Router::new()
        .merge(auth::router(&state))
        .merge(users::router(&state))
        .merge(projects::router(&state))
        .merge(service_catalog::router(&state))
        .merge(contact::router())
        .route("/health", get(|| async { "ok" }));

    let app = Router::new().nest("/api/v1", api).with_state(state);

    // headers wrap the limiter so 429s carry them too
    let limited = app
        .layer(CompressionLayer::new())
        .layer(RateLimitLayer::new(limiter));
    with_security_headers(limited)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router, addr: SocketAddr) -> anyhow::Result<()> {
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    // peer address feeds the rate limiter
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
