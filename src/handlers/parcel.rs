use crate::{
    attributes,
    auth::Capability,
    call,
    dispatch::{CommandContext, HandlerFuture},
    error::GatewayError,
    handlers::require,
    world::{EventKind, WorldEvent, WorldRequest},
};

/// Queries the current parcel and serializes the requested fields. The
/// `data` value lists attribute names, comma-separated; names the parcel
/// has no value for are left out of the reply.
pub(super) fn getparcelinfo(cx: CommandContext) -> HandlerFuture {
    Box::pin(async move {
        require(&cx.group, Capability::LAND)?;
        let data = cx.request.get("data").unwrap_or_default();
        let names: Vec<&str> = data
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .collect();

        let gateway = &cx.gateway;
        let event = call::await_event(
            &gateway.broker,
            EventKind::PARCEL,
            cx.snapshot.world_timeout(),
            async { gateway.world.submit(WorldRequest::RequestParcelInfo).await },
        )
        .await?
        .ok_or(GatewayError::Timeout)?;
        let WorldEvent::ParcelInfo(parcel) = event else {
            return Err(GatewayError::domain("unexpected world reply"));
        };
        Ok(attributes::to_row(&parcel, &names))
    })
}
