//! Hooks for peer notifications and the sampling handler seam

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

use turul_peer_json_rpc::JsonRpcErrorObject;
use turul_peer_protocol::{
    CancelledParams, CreateMessageParams, CreateMessageResult, LoggingMessageParams, ProgressParams,
    ResourceUpdatedParams, ServerNotification,
};

/// Produces the payload for a peer-initiated `sampling/createMessage` call.
///
/// Only consulted when the client declared `sampling.sample = true`. An `Err` is sent
/// back to the peer as the error response.
#[async_trait]
pub trait SamplingHandler: Send + Sync {
    async fn create_message(
        &self,
        params: CreateMessageParams,
    ) -> Result<CreateMessageResult, JsonRpcErrorObject>;
}

type Hook = Arc<dyn Fn() + Send + Sync>;
type PayloadHook<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Callbacks for the notifications a peer may emit
#[derive(Default)]
struct EventCallbacks {
    resource_list_changed: Option<Hook>,
    resource_updated: Option<PayloadHook<ResourceUpdatedParams>>,
    tool_list_changed: Option<Hook>,
    prompt_list_changed: Option<Hook>,
    log_message: Option<PayloadHook<LoggingMessageParams>>,
    progress: Option<PayloadHook<ProgressParams>>,
    cancelled: Option<PayloadHook<CancelledParams>>,
    connection_lost: Option<Hook>,
}

impl std::fmt::Debug for EventCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let set = |present: bool| if present { Some("function") } else { None };
        f.debug_struct("EventCallbacks")
            .field("resource_list_changed", &set(self.resource_list_changed.is_some()))
            .field("resource_updated", &set(self.resource_updated.is_some()))
            .field("tool_list_changed", &set(self.tool_list_changed.is_some()))
            .field("prompt_list_changed", &set(self.prompt_list_changed.is_some()))
            .field("log_message", &set(self.log_message.is_some()))
            .field("progress", &set(self.progress.is_some()))
            .field("cancelled", &set(self.cancelled.is_some()))
            .field("connection_lost", &set(self.connection_lost.is_some()))
            .finish()
    }
}

/// Routes typed peer notifications to registered hooks.
///
/// Registering a hook replaces the previous one for that event. Unregistered hooks are
/// no-ops. Hooks run on the client's dispatch task and should return quickly.
#[derive(Debug, Default, Clone)]
pub struct EventDispatcher {
    callbacks: Arc<Mutex<EventCallbacks>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_resource_list_changed<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.callbacks.lock().resource_list_changed = Some(Arc::new(callback));
    }

    pub fn on_resource_updated<F>(&self, callback: F)
    where
        F: Fn(ResourceUpdatedParams) + Send + Sync + 'static,
    {
        self.callbacks.lock().resource_updated = Some(Arc::new(callback));
    }

    pub fn on_tool_list_changed<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.callbacks.lock().tool_list_changed = Some(Arc::new(callback));
    }

    pub fn on_prompt_list_changed<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.callbacks.lock().prompt_list_changed = Some(Arc::new(callback));
    }

    /// `notifications/message`
    pub fn on_log_message<F>(&self, callback: F)
    where
        F: Fn(LoggingMessageParams) + Send + Sync + 'static,
    {
        self.callbacks.lock().log_message = Some(Arc::new(callback));
    }

    pub fn on_progress<F>(&self, callback: F)
    where
        F: Fn(ProgressParams) + Send + Sync + 'static,
    {
        self.callbacks.lock().progress = Some(Arc::new(callback));
    }

    /// The peer cancelled one of its own requests
    pub fn on_cancelled<F>(&self, callback: F)
    where
        F: Fn(CancelledParams) + Send + Sync + 'static,
    {
        self.callbacks.lock().cancelled = Some(Arc::new(callback));
    }

    /// Fired when the connection drops without a local `disconnect()`
    pub fn on_connection_lost<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.callbacks.lock().connection_lost = Some(Arc::new(callback));
    }

    /// Invoke the hook registered for `notification`, if any
    pub fn dispatch(&self, notification: ServerNotification) {
        // Hooks are cloned out so a callback may register hooks without deadlocking
        let callbacks = self.callbacks.lock();
        match notification {
            ServerNotification::ResourceListChanged => fire(callbacks.resource_list_changed.clone(), callbacks),
            ServerNotification::ToolListChanged => fire(callbacks.tool_list_changed.clone(), callbacks),
            ServerNotification::PromptListChanged => fire(callbacks.prompt_list_changed.clone(), callbacks),
            ServerNotification::ResourceUpdated(params) => {
                fire_with(callbacks.resource_updated.clone(), callbacks, params)
            }
            ServerNotification::LoggingMessage(params) => {
                fire_with(callbacks.log_message.clone(), callbacks, params)
            }
            ServerNotification::Progress(params) => fire_with(callbacks.progress.clone(), callbacks, params),
            ServerNotification::Cancelled(params) => fire_with(callbacks.cancelled.clone(), callbacks, params),
        }
    }

    pub fn connection_lost(&self) {
        let callbacks = self.callbacks.lock();
        fire(callbacks.connection_lost.clone(), callbacks);
    }
}

fn fire(hook: Option<Hook>, guard: parking_lot::MutexGuard<'_, EventCallbacks>) {
    drop(guard);
    match hook {
        Some(hook) => hook(),
        None => debug!("No hook registered for event"),
    }
}

fn fire_with<T>(hook: Option<PayloadHook<T>>, guard: parking_lot::MutexGuard<'_, EventCallbacks>, payload: T) {
    drop(guard);
    match hook {
        Some(hook) => hook(payload),
        None => debug!("No hook registered for event"),
    }
}
