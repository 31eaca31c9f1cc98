//! Irrigation valve handlers

use super::HandlerContext;
use crate::method::{HandlerResult, MethodArgs};
use tracing::info;

/// Handle `turn_on`: open the valve for the device's zone
///
/// `duration_in_min` of 0 means "until turned off".
pub fn handle_irrigation_turn_on(ctx: &HandlerContext, args: &MethodArgs) -> HandlerResult {
    let duration_in_min = args.number("duration_in_min")?;

    info!(
        device = %ctx.device_id,
        zone = %ctx.zone,
        action = "turn_on",
        duration_in_min,
        "irrigation started"
    );
    Ok(None)
}

/// Handle `turn_off`: close the valve
pub fn handle_irrigation_turn_off(ctx: &HandlerContext, _args: &MethodArgs) -> HandlerResult {
    info!(
        device = %ctx.device_id,
        zone = %ctx.zone,
        action = "turn_off",
        "irrigation stopped"
    );
    Ok(None)
}
