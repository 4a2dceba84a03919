//! Method routing for inbound requests and notifications.

use std::collections::HashMap;

use tandem_wire::{Request, RequestId, Response, RpcError};

use super::handler::{
    FallbackHandler, NotificationEntry, NotificationFn, RequestEntry, RequestFn, contain,
};
use super::params::ParamShape;

/// What the engine must do after dispatching one inbound request.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Write this response.
    Reply(Response),
    /// Handled; nothing to write.
    Done,
    /// A notification could not be delivered or its handler failed.
    Rejected {
        /// Method named by the notification.
        method: String,
        /// Why it was not handled.
        error: RpcError,
    },
    /// The fallback answered a notification; the answer has nowhere to go.
    ReplyDropped {
        /// Method named by the notification.
        method: String,
    },
}

/// Registered handlers, keyed by method name.
///
/// Calls and notifications are routed through separate maps, so one name can
/// mean different things depending on whether a reply is expected.
#[derive(Default)]
pub struct DispatchTable {
    requests: HashMap<String, RequestEntry>,
    notifications: HashMap<String, NotificationEntry>,
    fallback: Option<Box<dyn FallbackHandler>>,
}

impl DispatchTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the handler answering calls to `method`, replacing any
    /// earlier one.
    pub fn register_request<Args, H>(&mut self, method: impl Into<String>, handler: H)
    where
        Args: 'static,
        H: RequestFn<Args>,
    {
        self.requests
            .insert(method.into(), RequestEntry::new(handler));
    }

    /// Registers the handler consuming notifications of `method`, replacing
    /// any earlier one.
    pub fn register_notification<Args, H>(&mut self, method: impl Into<String>, handler: H)
    where
        Args: 'static,
        H: NotificationFn<Args>,
    {
        self.notifications
            .insert(method.into(), NotificationEntry::new(handler));
    }

    /// Installs the catch-all for unregistered methods.
    pub fn set_fallback(&mut self, handler: impl FallbackHandler) {
        self.fallback = Some(Box::new(handler));
    }

    /// Parameter shape of the request handler for `method`.
    #[must_use]
    pub fn request_shape(&self, method: &str) -> Option<&ParamShape> {
        self.requests.get(method).map(RequestEntry::shape)
    }

    /// Parameter shape of the notification handler for `method`.
    #[must_use]
    pub fn notification_shape(&self, method: &str) -> Option<&ParamShape> {
        self.notifications.get(method).map(NotificationEntry::shape)
    }

    /// Routes one inbound request to its handler.
    #[must_use]
    pub fn dispatch(&self, request: Request) -> DispatchOutcome {
        match request.id.clone() {
            Some(id) => self.dispatch_call(id, request),
            None => self.dispatch_notification(request),
        }
    }

    fn dispatch_call(&self, id: RequestId, request: Request) -> DispatchOutcome {
        if let Some(entry) = self.requests.get(&request.method) {
            let outcome = entry.call(&request.method, request.params);
            return DispatchOutcome::Reply(Response { id, outcome });
        }
        match &self.fallback {
            Some(fallback) => delegate(fallback.as_ref(), request),
            None => DispatchOutcome::Reply(Response::failure(
                id,
                RpcError::method_not_found(&request.method),
            )),
        }
    }

    fn dispatch_notification(&self, request: Request) -> DispatchOutcome {
        if let Some(entry) = self.notifications.get(&request.method) {
            return match entry.call(&request.method, request.params) {
                Ok(()) => DispatchOutcome::Done,
                Err(error) => DispatchOutcome::Rejected {
                    method: request.method,
                    error,
                },
            };
        }
        match &self.fallback {
            Some(fallback) => delegate(fallback.as_ref(), request),
            None => DispatchOutcome::Rejected {
                error: RpcError::method_not_found(&request.method),
                method: request.method,
            },
        }
    }
}

fn delegate(fallback: &dyn FallbackHandler, request: Request) -> DispatchOutcome {
    let method = request.method.clone();
    let id = request.id.clone();
    match (contain(&method, || Ok(fallback.handle(request))), id) {
        (Ok(None), _) => DispatchOutcome::Done,
        (Ok(Some(response)), Some(_)) => DispatchOutcome::Reply(response),
        (Ok(Some(_)), None) => DispatchOutcome::ReplyDropped { method },
        (Err(error), Some(id)) => DispatchOutcome::Reply(Response::failure(id, error)),
        (Err(error), None) => DispatchOutcome::Rejected { method, error },
    }
}
