use crate::config::Config;
use crate::services::attachment_service::AttachmentService;
use crate::services::conversation_service::ConversationService;
use crate::services::health_service::HealthService;
use crate::services::message_service::MessageService;
use crate::services::poll_service::PollCoordinator;
use crate::services::presence_service::PresenceTracker;
use crate::services::typing_service::TypingTracker;
use axum::body::Body;
use axum::extract::DefaultBodyLimit;
use axum::http::Request;
use axum::{
    Router,
    routing::{get, post, put},
};
use std::sync::Arc;
use tower_governor::GovernorLayer;
use tower_governor::governor::GovernorConfigBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

pub mod conversations;
pub mod health;
pub mod messages;
pub mod middleware;
pub mod presence;
pub mod rate_limit;
pub mod schemas;
pub mod typing;

#[derive(Clone, Debug)]
pub struct AppState {
    pub config: Config,
    pub conversation_service: ConversationService,
    pub message_service: MessageService,
    pub attachment_service: AttachmentService,
    pub poll_coordinator: PollCoordinator,
    pub presence: PresenceTracker,
    pub typing: TypingTracker,
}

#[derive(Clone, Debug)]
pub struct MgmtState {
    pub health_service: HealthService,
}

#[derive(Debug)]
pub struct ServiceContainer {
    pub conversation_service: ConversationService,
    pub message_service: MessageService,
    pub attachment_service: AttachmentService,
    pub poll_coordinator: PollCoordinator,
    pub presence: PresenceTracker,
    pub typing: TypingTracker,
    pub ip_extractor: rate_limit::IpKeyExtractor,
}

/// Configures and returns the primary application router.
///
/// # Panics
/// Panics if the rate limiter configuration cannot be constructed.
pub fn app_router(config: Config, services: ServiceContainer) -> Router {
    let interval_ns = 1_000_000_000 / config.rate_limit.per_second.max(1);
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_nanosecond(u64::from(interval_ns))
            .burst_size(config.rate_limit.burst)
            .key_extractor(services.ip_extractor.clone())
            .finish()
            .expect("Failed to build rate limiter config"),
    );

    // Multipart bodies carry the file plus field framing overhead.
    let upload_limit = config.storage.attachment_max_size_bytes.saturating_add(64 * 1024);

    let state = AppState {
        config,
        conversation_service: services.conversation_service,
        message_service: services.message_service,
        attachment_service: services.attachment_service,
        poll_coordinator: services.poll_coordinator,
        presence: services.presence,
        typing: services.typing,
    };

    let api_routes = Router::new()
        .route("/messages/poll", get(messages::poll))
        .route("/messages", get(messages::history).post(messages::send))
        .route(
            "/messages/attachment",
            post(messages::send_attachment).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/messages/typing", get(typing::get_typers).post(typing::set_typing))
        .route(
            "/messages/online-status",
            get(presence::get_status).post(presence::set_status).put(presence::heartbeat),
        )
        .route("/conversations", get(conversations::list).post(conversations::create))
        .layer(GovernorLayer::new(governor_conf));

    Router::new()
        .merge(api_routes)
        .layer(PropagateRequestIdLayer::new(axum::http::HeaderName::from_static("x-request-id")))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(move |request: &Request<Body>| {
                    let request_id = request
                        .extensions()
                        .get::<tower_http::request_id::RequestId>()
                        .map(|id| id.header_value().to_str().unwrap_or_default())
                        .unwrap_or_default()
                        .to_string();

                    tracing::info_span!(
                        "request",
                        "request_id" = %request_id,
                        "http.request.method" = %request.method(),
                        "url.path" = %request.uri().path(),
                        "http.response.status_code" = tracing::field::Empty,
                        "otel.kind" = "server",
                        "user_id" = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>, latency: std::time::Duration, _span: &tracing::Span| {
                        let status = response.status();
                        tracing::Span::current().record("http.response.status_code", status.as_u16());

                        tracing::info!(
                            latency_ms = %latency.as_millis(),
                            status = %status.as_u16(),
                            "request completed"
                        );
                    },
                )
                .on_failure(|error, _latency, _span: &tracing::Span| {
                    tracing::error!(error = %error, "request failed");
                }),
        )
        .layer(SetRequestIdLayer::new(
            axum::http::HeaderName::from_static("x-request-id"),
            middleware::MakeRequestUuidOrHeader,
        ))
        .with_state(state)
}

pub fn mgmt_router(state: MgmtState) -> Router {
    Router::new().route("/livez", get(health::livez)).route("/readyz", get(health::readyz)).with_state(state)
}
