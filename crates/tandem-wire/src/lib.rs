//! Wire model for the tandem JSON-RPC engine.
//!
//! Frames are single-line JSON objects terminated by `\r\n`. A frame carrying
//! a `method` is a [`Request`] (a notification when it has no `id`); a frame
//! carrying `result` or `error` is a [`Response`]. Anything else fails to
//! decode with a [`DecodeError`] that records the matching [`ErrorCode`] and,
//! when one could be recovered, the id of the request it belongs to.
//!
//! Parameters are strictly positional. Ids are strings on the wire and are
//! produced per connection by [`IdGenerator`].

mod decode;
mod error;
mod id;
mod message;

pub use decode::{DecodeError, decode};
pub use error::{ErrorCode, RpcError, is_retryable_code};
pub use id::{IdGenerator, RequestId};
pub use message::{FRAME_DELIMITER, JSONRPC_VERSION, Message, Request, Response};
