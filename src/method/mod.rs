//! Direct method infrastructure for simulated devices
//!
//! This module handles:
//! - Declaring the methods a device kind accepts
//! - Binding request payloads to handler parameters
//! - Dispatching to the registered handler
//! - Building the response returned to the hub

mod args;
mod dispatch;
pub mod handlers;

pub use args::{MethodArgs, ParamKind, ParamSpec};
pub use dispatch::{DispatchTable, HandlerResult};
pub use handlers::HandlerContext;
