//! Heater handlers

use super::HandlerContext;
use crate::method::{HandlerResult, MethodArgs};
use tracing::info;

/// Handle `turn_on`: start heating, optionally for a limited time
pub fn handle_heater_turn_on(ctx: &HandlerContext, args: &MethodArgs) -> HandlerResult {
    let duration_in_min = args.number("duration_in_min")?;

    info!(
        device = %ctx.device_id,
        zone = %ctx.zone,
        action = "turn_on",
        duration_in_min,
        "heater switched on"
    );
    Ok(None)
}

/// Handle `turn_off`
pub fn handle_heater_turn_off(ctx: &HandlerContext, _args: &MethodArgs) -> HandlerResult {
    info!(device = %ctx.device_id, zone = %ctx.zone, action = "turn_off", "heater switched off");
    Ok(None)
}
