//! Command handler registry. Each handler performs its own capability
//! check and raises domain errors; the dispatcher owns authentication,
//! admission, and error rendering.

use std::collections::HashMap;

use crate::{
    auth::{self, Capability},
    config::GroupConfig,
    dispatch::Handler,
    error::{GatewayError, Result},
};

mod database;
mod economy;
mod group;
mod inventory;
mod notify;
mod parcel;
mod system;

pub(crate) fn registry() -> HashMap<&'static str, Handler> {
    HashMap::from([
        ("version", system::version as Handler),
        ("join", group::join as Handler),
        ("tell", group::tell as Handler),
        ("pay", economy::pay as Handler),
        ("rez", inventory::rez as Handler),
        ("getparcelinfo", parcel::getparcelinfo as Handler),
        ("database", database::database as Handler),
        ("notify", notify::notify as Handler),
    ])
}

fn require(group: &GroupConfig, capability: Capability) -> Result<()> {
    if auth::has_capability(group, capability) {
        Ok(())
    } else {
        Err(GatewayError::Authorization(capability.label()))
    }
}
