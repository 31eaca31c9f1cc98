//! Greenhouse console library
//!
//! Signs hub access tokens and invokes direct methods on devices over HTTP.

pub mod invoker;
pub mod token;

pub use invoker::{device_method_url, CommandInvoker, InvokerError, MethodCall};
pub use token::{AccessToken, TokenManager};
