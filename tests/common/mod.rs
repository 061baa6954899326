#![allow(dead_code)]

use std::sync::Arc;

use axum::{body::Bytes, extract::State, http::StatusCode, routing::post, Router};
use tokio::{net::TcpListener, sync::mpsc};
use uuid::Uuid;

use gridgate::{
    auth::Capability,
    config::{Config, ConfigHandle, GroupConfig},
    server::Gateway,
    world::{EventKind, LoopbackWorld},
};

pub fn group(name: &str, password: &str, workers: u32) -> GroupConfig {
    GroupConfig {
        name: name.to_string(),
        password: password.to_string(),
        uuid: Uuid::new_v4(),
        capabilities: Capability::all(),
        notifications: EventKind::all(),
        workers,
        chatlog: None,
        database: None,
    }
}

pub fn config_with(groups: Vec<GroupConfig>) -> Config {
    Config {
        groups,
        ..Config::default()
    }
}

pub fn loopback_gateway(config: Config) -> (Arc<LoopbackWorld>, Gateway) {
    let (world, events) = LoopbackWorld::create();
    let resolver = world.clone();
    let gateway = Gateway::assemble(ConfigHandle::new(config), world.clone(), resolver, events);
    (world, gateway)
}

/// Binds a local listener that forwards every POSTed body over a channel,
/// and returns its URL.
pub async fn hook_server() -> (String, mpsc::Receiver<Vec<u8>>) {
    let (tx, rx) = mpsc::channel::<Vec<u8>>(8);
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind hook listener");
    let addr = listener.local_addr().expect("failed to read hook address");
    let app = Router::new()
        .route(
            "/hook",
            post(
                |State(tx): State<mpsc::Sender<Vec<u8>>>, body: Bytes| async move {
                    if tx.send(body.to_vec()).await.is_err() {
                        return StatusCode::INTERNAL_SERVER_ERROR;
                    }
                    StatusCode::OK
                },
            ),
        )
        .with_state(tx);
    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            eprintln!("hook server error: {err}");
        }
    });
    (format!("http://{addr}/hook"), rx)
}
