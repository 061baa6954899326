use crate::{
    attributes,
    auth::Capability,
    call,
    dispatch::{CommandContext, HandlerFuture},
    error::GatewayError,
    handlers::require,
    world::{EventKind, WorldEvent, WorldRequest},
};

/// Rezzes an inventory item, named either by UUID or by its catalog name.
pub(super) fn rez(cx: CommandContext) -> HandlerFuture {
    Box::pin(async move {
        require(&cx.group, Capability::INVENTORY)?;
        let item_text = cx
            .request
            .get("item")
            .ok_or_else(|| GatewayError::domain("no item specified"))?;
        let item = attributes::resolve_identifier(&item_text, cx.gateway.resolver.as_ref())?;

        let gateway = &cx.gateway;
        let event = call::await_event(
            &gateway.broker,
            EventKind::OBJECT,
            cx.snapshot.world_timeout(),
            async { gateway.world.submit(WorldRequest::RezObject { item }).await },
        )
        .await?
        .ok_or(GatewayError::Timeout)?;
        match event {
            WorldEvent::ObjectRezzed { object, .. } => {
                Ok(vec![("object".to_string(), object.to_string())])
            }
            _ => Err(GatewayError::domain("unexpected world reply")),
        }
    })
}
