use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tokio::{net::TcpListener, sync::mpsc::UnboundedReceiver};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::{
    attributes::NameResolver,
    config::{Config, ConfigHandle},
    dispatch::{Dispatcher, GatewayContext},
    error::{GatewayError, Result},
    logging, wire,
    world::{EventBroker, LoopbackWorld, WorldEvent, WorldService},
};

/// An assembled gateway: shared context, dispatcher, and a running event
/// pump feeding the broker and the notification bus.
pub struct Gateway {
    pub ctx: Arc<GatewayContext>,
    pub dispatcher: Arc<Dispatcher>,
}

impl Gateway {
    /// Wires the dispatcher to a world implementation and starts the
    /// event pump. Must run inside a tokio runtime.
    pub fn assemble(
        config: ConfigHandle,
        world: Arc<dyn WorldService>,
        resolver: Arc<dyn NameResolver>,
        events: UnboundedReceiver<WorldEvent>,
    ) -> Self {
        let broker = EventBroker::new();
        let ctx = Arc::new(GatewayContext::new(config, world, broker, resolver));
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&ctx)));
        tokio::spawn(pump_events(
            events,
            Arc::clone(&ctx),
            Arc::clone(&dispatcher),
        ));
        Self { ctx, dispatcher }
    }
}

/// Fans every world event into the command waiters, the notification
/// bus, chat logs, and the instant-message command path.
async fn pump_events(
    mut events: UnboundedReceiver<WorldEvent>,
    ctx: Arc<GatewayContext>,
    dispatcher: Arc<Dispatcher>,
) {
    while let Some(event) = events.recv().await {
        ctx.broker.publish(&event);
        ctx.notifications.dispatch(&event);

        match &event {
            WorldEvent::GroupChat {
                group,
                name,
                message,
                ..
            } => {
                log_group_chat(&ctx, *group, name, message).await;
            }
            WorldEvent::InstantMessage { message, .. } => {
                // Instant messages that carry a command enter the normal
                // dispatch path; the reply only travels via callback.
                if wire::get_value("command", message).is_some() {
                    let dispatcher = Arc::clone(&dispatcher);
                    let message = message.clone();
                    tokio::spawn(async move {
                        let _ = dispatcher.dispatch(&message).await;
                    });
                }
            }
            _ => {}
        }
    }
}

async fn log_group_chat(ctx: &GatewayContext, group: uuid::Uuid, name: &str, message: &str) {
    let snapshot = ctx.config.snapshot();
    for entry in snapshot.groups.iter().filter(|g| g.uuid == group) {
        let Some(path) = entry.chatlog.clone() else {
            continue;
        };
        let speaker = name.to_string();
        let message = message.to_string();
        let outcome =
            tokio::task::spawn_blocking(move || logging::append_chat_line(&path, &speaker, &message))
                .await;
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!("failed to write chat log for {}: {}", entry.name, err),
            Err(err) => warn!("chat log task for {} failed: {}", entry.name, err),
        }
    }
}

#[derive(Clone)]
struct AppState {
    dispatcher: Arc<Dispatcher>,
}

/// Runs the gateway against the loopback world until shutdown.
pub async fn run(config: Config) -> Result<()> {
    let bind_addr = config.bind_addr.clone();
    let port = config.port;
    let handle = ConfigHandle::new(config);

    let (world, events) = LoopbackWorld::create();
    let resolver: Arc<dyn NameResolver> = world.clone();
    let service: Arc<dyn WorldService> = world;
    let gateway = Gateway::assemble(handle, service, resolver, events);

    let state = AppState {
        dispatcher: Arc::clone(&gateway.dispatcher),
    };
    let app = Router::new()
        .route("/", post(submit_command))
        .route("/health", get(health))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{bind_addr}:{port}")
        .parse()
        .map_err(|err| GatewayError::Config(format!("invalid bind address: {err}")))?;
    info!("Starting gridgate on {addr}");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| {
            error!("server failed: {err}");
            GatewayError::Storage(err.to_string())
        })?;
    info!("gridgate stopped");
    Ok(())
}

async fn submit_command(State(state): State<AppState>, body: String) -> String {
    state.dispatcher.dispatch(&body).await
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

#[derive(Serialize)]
struct HealthResponse<'a> {
    status: &'a str,
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
