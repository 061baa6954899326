use crate::{
    auth::Capability,
    dispatch::{CommandContext, HandlerFuture},
    error::GatewayError,
    handlers::require,
};

/// Reads, writes, or deletes one record in the group's key-value store.
pub(super) fn database(cx: CommandContext) -> HandlerFuture {
    Box::pin(async move {
        require(&cx.group, Capability::DATABASE)?;
        let action = cx
            .request
            .get("action")
            .ok_or_else(|| GatewayError::domain("no action provided"))?;
        let key = cx
            .request
            .get("key")
            .ok_or_else(|| GatewayError::domain("no key provided"))?;
        match action.as_str() {
            "get" => {
                let value = cx
                    .gateway
                    .database
                    .get(&cx.group, &key)
                    .await?
                    .ok_or_else(|| GatewayError::domain("no record found"))?;
                Ok(vec![("value".to_string(), value)])
            }
            "set" => {
                let value = cx
                    .request
                    .get("value")
                    .ok_or_else(|| GatewayError::domain("no value provided"))?;
                cx.gateway.database.set(&cx.group, &key, &value).await?;
                Ok(Vec::new())
            }
            "delete" => {
                cx.gateway.database.delete(&cx.group, &key).await?;
                Ok(Vec::new())
            }
            other => Err(GatewayError::Domain(format!("unknown action {other}"))),
        }
    })
}
