//! Typed handler adapters.
//!
//! Ordinary closures with up to eight positional parameters are adapted into
//! type-erased entries. An entry records its closure's [`ParamShape`], checks
//! the arity of each inbound parameter list against it, and decodes every
//! position into the declared type before the closure runs. Panics inside a
//! handler are caught and turned into internal errors.

use std::any::{Any, type_name};
use std::panic::{self, AssertUnwindSafe};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tandem_wire::{Request, Response, RpcError};

use super::params::{ParamCursor, ParamShape};

/// Return types accepted from request handlers.
pub trait HandlerOutput {
    /// Converts the value into the result or error sent to the caller.
    ///
    /// # Errors
    ///
    /// Returns the handler's own failure, or an internal error when the
    /// result cannot be serialised.
    fn into_outcome(self) -> Result<Value, RpcError>;
}

impl<T, E> HandlerOutput for Result<T, E>
where
    T: Serialize,
    E: Into<RpcError>,
{
    fn into_outcome(self) -> Result<Value, RpcError> {
        let value = self.map_err(Into::into)?;
        serde_json::to_value(value).map_err(|error| {
            RpcError::internal(format!("failed to encode handler result: {error}"))
        })
    }
}

/// Return types accepted from notification handlers.
pub trait NotificationOutput {
    /// Converts the value into a local success or failure.
    ///
    /// # Errors
    ///
    /// Returns the handler's own failure.
    fn into_result(self) -> Result<(), RpcError>;
}

impl NotificationOutput for () {
    fn into_result(self) -> Result<(), RpcError> {
        Ok(())
    }
}

impl<E> NotificationOutput for Result<(), E>
where
    E: Into<RpcError>,
{
    fn into_result(self) -> Result<(), RpcError> {
        self.map_err(Into::into)
    }
}

/// A function that answers calls.
///
/// Implemented for every `Fn(A0, .., An) -> R` with up to eight parameters,
/// where each parameter is [`DeserializeOwned`] and `R` is a
/// [`HandlerOutput`].
pub trait RequestFn<Args>: Send + Sync + 'static {
    /// Parameter types in position order.
    fn shape() -> ParamShape;

    /// Decodes `params` and runs the handler.
    ///
    /// # Errors
    ///
    /// Returns invalid params when a position fails to decode, otherwise the
    /// handler's own failure.
    fn invoke(&self, params: Vec<Value>) -> Result<Value, RpcError>;
}

/// A function that consumes notifications.
///
/// Implemented for every `Fn(A0, .., An) -> R` with up to eight parameters,
/// where `R` is `()` or `Result<(), E>`.
pub trait NotificationFn<Args>: Send + Sync + 'static {
    /// Parameter types in position order.
    fn shape() -> ParamShape;

    /// Decodes `params` and runs the handler.
    ///
    /// # Errors
    ///
    /// Returns invalid params when a position fails to decode, otherwise the
    /// handler's own failure.
    fn invoke(&self, params: Vec<Value>) -> Result<(), RpcError>;
}

macro_rules! impl_handler_fns {
    ($($arg:ident $var:ident),*) => {
        impl<F, R, $($arg,)*> RequestFn<($($arg,)*)> for F
        where
            F: Fn($($arg),*) -> R + Send + Sync + 'static,
            R: HandlerOutput,
            $($arg: DeserializeOwned,)*
        {
            fn shape() -> ParamShape {
                ParamShape::new(vec![$(type_name::<$arg>()),*])
            }

            fn invoke(&self, params: Vec<Value>) -> Result<Value, RpcError> {
                let cursor = &mut ParamCursor::new(params);
                $(let $var = cursor.take::<$arg>()?;)*
                cursor.finish()?;
                HandlerOutput::into_outcome(self($($var),*))
            }
        }

        impl<F, R, $($arg,)*> NotificationFn<($($arg,)*)> for F
        where
            F: Fn($($arg),*) -> R + Send + Sync + 'static,
            R: NotificationOutput,
            $($arg: DeserializeOwned,)*
        {
            fn shape() -> ParamShape {
                ParamShape::new(vec![$(type_name::<$arg>()),*])
            }

            fn invoke(&self, params: Vec<Value>) -> Result<(), RpcError> {
                let cursor = &mut ParamCursor::new(params);
                $(let $var = cursor.take::<$arg>()?;)*
                cursor.finish()?;
                NotificationOutput::into_result(self($($var),*))
            }
        }
    };
}

impl_handler_fns!();
impl_handler_fns!(A0 a0);
impl_handler_fns!(A0 a0, A1 a1);
impl_handler_fns!(A0 a0, A1 a1, A2 a2);
impl_handler_fns!(A0 a0, A1 a1, A2 a2, A3 a3);
impl_handler_fns!(A0 a0, A1 a1, A2 a2, A3 a3, A4 a4);
impl_handler_fns!(A0 a0, A1 a1, A2 a2, A3 a3, A4 a4, A5 a5);
impl_handler_fns!(A0 a0, A1 a1, A2 a2, A3 a3, A4 a4, A5 a5, A6 a6);
impl_handler_fns!(A0 a0, A1 a1, A2 a2, A3 a3, A4 a4, A5 a5, A6 a6, A7 a7);

/// Catch-all for methods without a registered handler.
///
/// The fallback owns the request outright. Its response is written only when
/// the request was a call.
pub trait FallbackHandler: Send + Sync + 'static {
    /// Handles an unrouted request.
    fn handle(&self, request: Request) -> Option<Response>;
}

impl<F> FallbackHandler for F
where
    F: Fn(Request) -> Option<Response> + Send + Sync + 'static,
{
    fn handle(&self, request: Request) -> Option<Response> {
        self(request)
    }
}

type InvokeRequest = Box<dyn Fn(Vec<Value>) -> Result<Value, RpcError> + Send + Sync>;
type InvokeNotification = Box<dyn Fn(Vec<Value>) -> Result<(), RpcError> + Send + Sync>;

pub(crate) struct RequestEntry {
    shape: ParamShape,
    invoke: InvokeRequest,
}

impl RequestEntry {
    pub(crate) fn new<Args, H>(handler: H) -> Self
    where
        Args: 'static,
        H: RequestFn<Args>,
    {
        Self {
            shape: H::shape(),
            invoke: Box::new(move |params| handler.invoke(params)),
        }
    }

    pub(crate) const fn shape(&self) -> &ParamShape {
        &self.shape
    }

    pub(crate) fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        self.shape.check_arity(&params)?;
        contain(method, || (self.invoke)(params))
    }
}

pub(crate) struct NotificationEntry {
    shape: ParamShape,
    invoke: InvokeNotification,
}

impl NotificationEntry {
    pub(crate) fn new<Args, H>(handler: H) -> Self
    where
        Args: 'static,
        H: NotificationFn<Args>,
    {
        Self {
            shape: H::shape(),
            invoke: Box::new(move |params| handler.invoke(params)),
        }
    }

    pub(crate) const fn shape(&self) -> &ParamShape {
        &self.shape
    }

    pub(crate) fn call(&self, method: &str, params: Vec<Value>) -> Result<(), RpcError> {
        self.shape.check_arity(&params)?;
        contain(method, || (self.invoke)(params))
    }
}

/// Runs `work`, converting a panic into an internal error.
pub(crate) fn contain<T>(
    method: &str,
    work: impl FnOnce() -> Result<T, RpcError>,
) -> Result<T, RpcError> {
    panic::catch_unwind(AssertUnwindSafe(work)).unwrap_or_else(|payload| {
        Err(RpcError::internal(format!(
            "handler for {method} panicked: {}",
            panic_message(payload.as_ref())
        )))
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return message;
    }
    payload
        .downcast_ref::<String>()
        .map_or("non-string panic payload", String::as_str)
}
