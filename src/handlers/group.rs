use crate::{
    attributes,
    auth::Capability,
    call,
    dispatch::{CommandContext, HandlerFuture},
    error::GatewayError,
    handlers::require,
    world::{ChatScope, EventKind, WorldEvent, WorldRequest},
};

/// Joins the group the request was authenticated against.
pub(super) fn join(cx: CommandContext) -> HandlerFuture {
    Box::pin(async move {
        require(&cx.group, Capability::GROUP)?;
        let gateway = &cx.gateway;
        let target = cx.group.uuid;
        let event = call::await_event(
            &gateway.broker,
            EventKind::MEMBERSHIP,
            cx.snapshot.world_timeout(),
            async { gateway.world.submit(WorldRequest::JoinGroup { group: target }).await },
        )
        .await?
        .ok_or(GatewayError::Timeout)?;
        match event {
            WorldEvent::GroupJoined { success: true, .. } => Ok(Vec::new()),
            WorldEvent::GroupJoined { .. } => Err(GatewayError::domain("unable to join group")),
            _ => Err(GatewayError::domain("unexpected world reply")),
        }
    })
}

/// Speaks into group chat, local chat, or an instant message. Chat is
/// fire-and-forget; the world sends no per-message acknowledgement.
pub(super) fn tell(cx: CommandContext) -> HandlerFuture {
    Box::pin(async move {
        require(&cx.group, Capability::TALK)?;
        let message = cx
            .request
            .get("message")
            .ok_or_else(|| GatewayError::domain("no message provided"))?;
        let scope = match cx.request.get("entity").as_deref() {
            Some("group") | None => ChatScope::Group(cx.group.uuid),
            Some("local") => ChatScope::Local,
            Some("avatar") => {
                let agent = cx
                    .request
                    .get("agent")
                    .ok_or_else(|| GatewayError::domain("no agent provided"))?;
                ChatScope::Avatar(attributes::resolve_identifier(
                    &agent,
                    cx.gateway.resolver.as_ref(),
                )?)
            }
            Some(other) => {
                return Err(GatewayError::Domain(format!("unknown entity {other}")));
            }
        };
        cx.gateway
            .world
            .submit(WorldRequest::Chat { scope, message })
            .await?;
        Ok(Vec::new())
    })
}
