use crate::{
    auth::Capability,
    dispatch::{CommandContext, HandlerFuture},
    error::GatewayError,
    handlers::require,
    world::EventKind,
};

/// Registers or clears the group's notification endpoint. Registration
/// replaces any previous entry for the group; the requested kinds must
/// all be covered by the group's notification mask.
pub(super) fn notify(cx: CommandContext) -> HandlerFuture {
    Box::pin(async move {
        require(&cx.group, Capability::NOTIFICATIONS)?;
        let action = cx
            .request
            .get("action")
            .ok_or_else(|| GatewayError::domain("no action provided"))?;
        match action.as_str() {
            "set" => {
                let url = cx
                    .request
                    .get("url")
                    .ok_or_else(|| GatewayError::domain("no url provided"))?;
                let kinds = cx
                    .request
                    .get("notifications")
                    .ok_or_else(|| GatewayError::domain("no notifications provided"))?;
                let mask = EventKind::from_names(kinds.split(','))
                    .map_err(|name| GatewayError::Domain(format!("unknown notification {name}")))?;
                if mask.is_empty() {
                    return Err(GatewayError::domain("no notifications provided"));
                }
                if !cx.group.notifications.contains(mask) {
                    return Err(GatewayError::Authorization("notification"));
                }
                cx.gateway
                    .notifications
                    .register(&cx.group.name, url, mask);
                Ok(Vec::new())
            }
            "clear" => {
                cx.gateway.notifications.unregister(&cx.group.name);
                Ok(Vec::new())
            }
            other => Err(GatewayError::Domain(format!("unknown action {other}"))),
        }
    })
}
