use crate::{
    attributes,
    auth::Capability,
    call,
    dispatch::{CommandContext, HandlerFuture},
    error::GatewayError,
    handlers::require,
    world::{EventKind, WorldEvent, WorldRequest},
};

/// Transfers currency to an agent. Amounts must be strictly positive;
/// validation happens before any world traffic.
pub(super) fn pay(cx: CommandContext) -> HandlerFuture {
    Box::pin(async move {
        require(&cx.group, Capability::ECONOMY)?;
        let amount: i64 = cx
            .request
            .get("amount")
            .and_then(|value| value.parse().ok())
            .ok_or_else(|| GatewayError::domain("invalid amount"))?;
        if amount <= 0 {
            return Err(GatewayError::domain("invalid amount"));
        }
        let agent = cx
            .request
            .get("agent")
            .ok_or_else(|| GatewayError::domain("no agent provided"))?;
        let target = attributes::resolve_identifier(&agent, cx.gateway.resolver.as_ref())?;

        let gateway = &cx.gateway;
        let event = call::await_event(
            &gateway.broker,
            EventKind::BALANCE,
            cx.snapshot.world_timeout(),
            async {
                gateway
                    .world
                    .submit(WorldRequest::GiveMoney { target, amount })
                    .await
            },
        )
        .await?
        .ok_or(GatewayError::Timeout)?;
        match event {
            WorldEvent::MoneyTransferred { success: true, .. } => Ok(Vec::new()),
            WorldEvent::MoneyTransferred { .. } => {
                Err(GatewayError::domain("insufficient funds"))
            }
            _ => Err(GatewayError::domain("unexpected world reply")),
        }
    })
}
