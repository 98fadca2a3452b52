#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

use encore_messaging::api::rate_limit::IpKeyExtractor;
use encore_messaging::api::{MgmtState, ServiceContainer};
use encore_messaging::config::Config;
use encore_messaging::services::attachment_service::AttachmentService;
use encore_messaging::services::conversation_service::ConversationService;
use encore_messaging::services::health_service::HealthService;
use encore_messaging::services::message_service::MessageService;
use encore_messaging::services::notification_service::NotificationDispatcher;
use encore_messaging::services::poll_gate::PollGate;
use encore_messaging::services::poll_service::PollCoordinator;
use encore_messaging::services::presence_service::PresenceTracker;
use encore_messaging::services::typing_service::TypingTracker;
use encore_messaging::storage::conversation_repo::ConversationRepository;
use encore_messaging::storage::message_repo::MessageRepository;
use encore_messaging::storage::notification_repo::NotificationRepository;
use encore_messaging::storage::object_store::S3ObjectStore;
use encore_messaging::{storage, telemetry};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::Instrument;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load();
    telemetry::init_telemetry(&config.telemetry)?;

    encore_messaging::setup_panic_hook();

    let boot_span = tracing::info_span!("boot_server");
    let (api_listener, mgmt_listener, app_router, mgmt_app, shutdown_tx, shutdown_rx, gate) = async {
        // Phase 1: Infrastructure Setup (Resources)
        let pool = storage::init_pool(&config.database_url).await?;
        encore_messaging::run_migrations(&pool).await?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        encore_messaging::spawn_signal_handler(shutdown_tx.clone());

        let s3_client = storage::object_store::init_s3_client(&config.storage).await;

        // Phase 2: Component Wiring (Pure logic, no side effects)
        let conversations = ConversationRepository::new(pool.clone());
        let messages = MessageRepository::new(pool.clone());
        let sink = Arc::new(NotificationRepository::new(pool.clone()));
        let dispatcher = NotificationDispatcher::new(sink);

        let message_service = MessageService::new(
            conversations.clone(),
            messages.clone(),
            dispatcher,
            config.poll.default_page_size,
            config.poll.max_page_size,
        );
        let conversation_service =
            ConversationService::new(conversations.clone(), messages.clone(), message_service.clone());

        let gate = PollGate::new(
            Duration::from_millis(config.poll.min_interval_ms),
            Duration::from_millis(config.poll.gate_idle_ms),
        );
        let poll_coordinator = PollCoordinator::new(
            conversations,
            messages,
            gate.clone(),
            config.poll.default_lookback_secs,
            config.poll.max_lookback_secs,
        );

        let store = Arc::new(S3ObjectStore::new(
            s3_client.clone(),
            config.storage.bucket.clone(),
            config.storage.public_base_url.clone(),
        ));
        let attachment_service = AttachmentService::new(store, config.storage.attachment_max_size_bytes);

        let presence = PresenceTracker::new(config.presence.online_cutoff_ms);
        let typing = TypingTracker::new(config.typing.timeout_ms);

        let health_service =
            HealthService::new(pool, s3_client, config.storage.bucket.clone(), config.health.clone());

        let services = ServiceContainer {
            conversation_service,
            message_service,
            attachment_service,
            poll_coordinator,
            presence,
            typing,
            ip_extractor: IpKeyExtractor::new(config.server.trusted_proxies.clone()),
        };

        // Phase 3: Runtime Setup (Listeners and Routers)
        let app_router = encore_messaging::api::app_router(config.clone(), services);
        let mgmt_app = encore_messaging::api::mgmt_router(MgmtState { health_service });

        let api_addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
        let mgmt_addr: SocketAddr = format!("{}:{}", config.server.host, config.server.mgmt_port).parse()?;

        tracing::info!(address = %api_addr, "listening");
        tracing::info!(address = %mgmt_addr, "management server listening");

        let api_listener = tokio::net::TcpListener::bind(api_addr).await?;
        let mgmt_listener = tokio::net::TcpListener::bind(mgmt_addr).await?;

        Ok::<
            (
                tokio::net::TcpListener,
                tokio::net::TcpListener,
                axum::Router,
                axum::Router,
                watch::Sender<bool>,
                watch::Receiver<bool>,
                PollGate,
            ),
            anyhow::Error,
        >((api_listener, mgmt_listener, app_router, mgmt_app, shutdown_tx, shutdown_rx, gate))
    }
    .instrument(boot_span)
    .await?;

    // Phase 4: Start Runtime (Explicit Spawning and Listening)
    let sweeper = gate.spawn_sweeper(
        Duration::from_secs(config.poll.gate_sweep_interval_secs),
        shutdown_rx.clone(),
    );

    let mut api_rx = shutdown_rx.clone();
    let api_server = axum::serve(api_listener, app_router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move {
            let _ = api_rx.wait_for(|&s| s).await;
        });

    let mut mgmt_rx = shutdown_rx.clone();
    let mgmt_server = axum::serve(mgmt_listener, mgmt_app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move {
            let _ = mgmt_rx.wait_for(|&s| s).await;
        });

    if let Err(e) = tokio::try_join!(api_server, mgmt_server) {
        tracing::error!(error = %e, "Server error");
    }

    // Phase 5: Graceful Shutdown Orchestration
    let _ = shutdown_tx.send(true);
    tokio::select! {
        _ = sweeper => {
            tracing::info!("Background tasks finished.");
        }
        () = tokio::time::sleep(Duration::from_secs(config.server.shutdown_timeout_secs)) => {
            tracing::warn!("Timeout waiting for background tasks to finish.");
        }
    }

    Ok(())
}
