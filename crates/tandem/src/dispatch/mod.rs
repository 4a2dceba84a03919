//! Routing of inbound requests to registered handlers.

mod handler;
mod params;
mod table;

pub use handler::{FallbackHandler, HandlerOutput, NotificationFn, NotificationOutput, RequestFn};
pub use params::ParamShape;
pub use table::{DispatchOutcome, DispatchTable};
