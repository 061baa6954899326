//! Command dispatcher: decodes the wire request, authenticates, admits,
//! runs the handler on its own task, merges afterburn data, delivers the
//! callback, and encodes the reply. Handler failures of every flavor are
//! rendered into the result map; nothing escapes to the transport.

use std::{
    collections::{BTreeMap, HashMap},
    future::Future,
    pin::Pin,
    sync::Arc,
};

use reqwest::header::CONTENT_TYPE;
use tracing::{info, warn};

use crate::{
    admission::AdmissionController,
    attributes::NameResolver,
    auth,
    config::{Config, ConfigHandle, GroupConfig},
    database::Database,
    error::{GatewayError, Result},
    handlers,
    notify::NotificationBus,
    wire,
    world::{EventBroker, WorldService},
};

pub const KEY_COMMAND: &str = "command";
pub const KEY_GROUP: &str = "group";
pub const KEY_PASSWORD: &str = "password";
pub const KEY_CALLBACK: &str = "callback";
pub const KEY_SUCCESS: &str = "success";
pub const KEY_ERROR: &str = "error";
pub const KEY_CALLBACK_ERROR: &str = "callbackerror";

/// Keys consumed by the protocol itself; everything else in a request is
/// afterburn data, echoed into the result.
pub const RESERVED_KEYS: [&str; 4] = [KEY_COMMAND, KEY_GROUP, KEY_PASSWORD, KEY_CALLBACK];

/// A decoded inbound request. Values are kept in transport form and
/// unescaped on access; empty values read as absent.
#[derive(Debug, Clone)]
pub struct CommandRequest {
    fields: BTreeMap<String, String>,
}

impl CommandRequest {
    pub fn parse(text: &str) -> Self {
        Self {
            fields: wire::decode(text),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.fields
            .get(key)
            .map(|value| wire::unescape(value))
            .filter(|value| !value.is_empty())
    }

    pub fn command(&self) -> Option<String> {
        self.get(KEY_COMMAND)
    }

    pub fn group(&self) -> Option<String> {
        self.get(KEY_GROUP)
    }

    pub fn password(&self) -> Option<String> {
        self.get(KEY_PASSWORD)
    }

    pub fn callback(&self) -> Option<String> {
        self.get(KEY_CALLBACK)
    }

    pub fn raw_fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }
}

/// Everything a command handler can reach: the shared gateway services,
/// the configuration snapshot the request is being served under, the
/// authenticated group, and the request itself.
pub struct CommandContext {
    pub gateway: Arc<GatewayContext>,
    pub snapshot: Arc<Config>,
    pub group: GroupConfig,
    pub request: CommandRequest,
}

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Vec<(String, String)>>> + Send>>;
pub type Handler = fn(CommandContext) -> HandlerFuture;

/// Shared services behind the dispatcher and the handlers.
pub struct GatewayContext {
    pub config: ConfigHandle,
    pub world: Arc<dyn WorldService>,
    pub broker: EventBroker,
    pub resolver: Arc<dyn NameResolver>,
    pub admission: AdmissionController,
    pub database: Database,
    pub notifications: NotificationBus,
    http: reqwest::Client,
}

impl GatewayContext {
    pub fn new(
        config: ConfigHandle,
        world: Arc<dyn WorldService>,
        broker: EventBroker,
        resolver: Arc<dyn NameResolver>,
    ) -> Self {
        let callback_timeout = config.snapshot().callback_timeout();
        let http = reqwest::Client::builder()
            .timeout(callback_timeout)
            .build()
            .expect("failed to build http client");
        let notifications = NotificationBus::new(config.clone());
        Self {
            config,
            world,
            broker,
            resolver,
            admission: AdmissionController::new(),
            database: Database::new(),
            notifications,
            http,
        }
    }
}

pub struct Dispatcher {
    ctx: Arc<GatewayContext>,
    handlers: HashMap<&'static str, Handler>,
}

impl Dispatcher {
    pub fn new(ctx: Arc<GatewayContext>) -> Self {
        Self {
            ctx,
            handlers: handlers::registry(),
        }
    }

    pub fn context(&self) -> Arc<GatewayContext> {
        Arc::clone(&self.ctx)
    }

    /// Runs one request end to end and returns the encoded reply.
    pub async fn dispatch(&self, text: &str) -> String {
        let request = CommandRequest::parse(text);
        let snapshot = self.ctx.config.snapshot();
        let command = request.command().unwrap_or_default();
        let group = request.group().unwrap_or_default();

        let outcome = self.execute(&request, &snapshot).await;
        let mut result: BTreeMap<String, String> = BTreeMap::new();
        match outcome {
            Ok(payload) => {
                info!("command {} for group {} completed", command, group);
                result.insert(KEY_SUCCESS.to_string(), "true".to_string());
                for (key, value) in payload {
                    if !value.is_empty() {
                        result.insert(key, value);
                    }
                }
            }
            Err(err) => {
                warn!("command {} for group {} failed: {}", command, group, err);
                result.insert(KEY_SUCCESS.to_string(), "false".to_string());
                result.insert(KEY_ERROR.to_string(), err.to_string());
            }
        }

        // Afterburn: echo caller data the protocol did not consume.
        for (key, value) in request.raw_fields() {
            if RESERVED_KEYS.contains(&key.as_str()) {
                continue;
            }
            let value = wire::unescape(value);
            if value.is_empty() {
                continue;
            }
            result.entry(key.clone()).or_insert(value);
        }

        if let Some(url) = request.callback() {
            let body = wire::encode(&wire::escape_map(&result));
            if let Err(err) = self.deliver_callback(&url, body).await {
                warn!("callback delivery to {} failed: {}", url, err);
                result.insert(KEY_CALLBACK_ERROR.to_string(), err.to_string());
                result.insert(KEY_CALLBACK.to_string(), url);
            }
        }

        wire::encode(&wire::escape_map(&result))
    }

    async fn execute(
        &self,
        request: &CommandRequest,
        snapshot: &Arc<Config>,
    ) -> Result<Vec<(String, String)>> {
        let command = request
            .command()
            .ok_or_else(|| GatewayError::UnknownCommand("(none)".to_string()))?;
        let group_name = request.group().ok_or(GatewayError::Authentication)?;
        let password = request.password().ok_or(GatewayError::Authentication)?;
        if !auth::authenticate(snapshot, &group_name, &password) {
            return Err(GatewayError::Authentication);
        }
        let group = snapshot
            .group(&group_name)
            .cloned()
            .ok_or(GatewayError::Authentication)?;

        let handler = self
            .handlers
            .get(command.as_str())
            .copied()
            .ok_or(GatewayError::UnknownCommand(command))?;

        let permit = self
            .ctx
            .admission
            .try_admit(&group)
            .ok_or(GatewayError::AdmissionRejected)?;

        let cx = CommandContext {
            gateway: Arc::clone(&self.ctx),
            snapshot: Arc::clone(snapshot),
            group,
            request: request.clone(),
        };

        // The permit rides inside the task so the slot is released exactly
        // once, even if the handler panics.
        let handle = tokio::spawn(async move {
            let _permit = permit;
            handler(cx).await
        });
        match handle.await {
            Ok(outcome) => outcome,
            Err(err) if err.is_panic() => Err(GatewayError::domain("command handler crashed")),
            Err(_) => Err(GatewayError::domain("command handler aborted")),
        }
    }

    /// Best-effort POST of the encoded result. Only transport-level
    /// failure counts; the response body is not interpreted.
    async fn deliver_callback(&self, url: &str, body: String) -> reqwest::Result<()> {
        self.ctx
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_values_unescape_on_access() {
        let request = CommandRequest::parse("command=tell&message=hello%20world&blank=");
        assert_eq!(request.command().as_deref(), Some("tell"));
        assert_eq!(request.get("message").as_deref(), Some("hello world"));
        assert_eq!(request.get("blank"), None);
        assert_eq!(request.get("absent"), None);
    }
}
