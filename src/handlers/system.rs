use crate::dispatch::{CommandContext, HandlerFuture};

pub(super) fn version(_cx: CommandContext) -> HandlerFuture {
    Box::pin(async move {
        Ok(vec![(
            "version".to_string(),
            env!("CARGO_PKG_VERSION").to_string(),
        )])
    })
}
