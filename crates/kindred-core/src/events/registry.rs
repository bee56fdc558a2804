//! Hook registry and the dispatcher loop feeding it.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::broadcaster::EventReceiver;
use super::hooks::{DocumentHook, HookError};
use super::types::DocumentEvent;

const DEFAULT_HOOK_TIMEOUT: Duration = Duration::from_secs(60);

// ============================================================================
// Hook Registry
// ============================================================================

/// Registered hooks plus the wall-clock budget each invocation gets.
pub struct HookRegistry {
    hooks: RwLock<Vec<Arc<dyn DocumentHook>>>,
    timeout: Duration,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_HOOK_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            hooks: RwLock::new(Vec::new()),
            timeout,
        }
    }

    pub async fn register(&self, hook: Arc<dyn DocumentHook>) {
        let name = hook.name().to_string();
        self.hooks.write().await.push(hook);
        debug!(hook = %name, "Registered document hook");
    }

    pub async fn hook_count(&self) -> usize {
        self.hooks.read().await.len()
    }

    pub async fn get_matching_hooks(&self, event: &DocumentEvent) -> Vec<Arc<dyn DocumentHook>> {
        let hooks = self.hooks.read().await;
        hooks.iter().filter(|h| h.matches(event)).cloned().collect()
    }

    /// Hands `event` to every matching hook, each in its own task.
    ///
    /// Errors, panics and timeouts inside a hook are logged and contained.
    /// The returned handles complete when the respective hook is done; callers
    /// that do not care may drop them.
    pub async fn dispatch(&self, event: &DocumentEvent) -> Vec<JoinHandle<()>> {
        let hooks = self.get_matching_hooks(event).await;

        if hooks.is_empty() {
            debug!(path = %event.source_path(), "No hooks matched event");
            return Vec::new();
        }

        let timeout = self.timeout;

        hooks
            .into_iter()
            .map(|hook| {
                let event = event.clone();
                tokio::spawn(async move {
                    let hook_name = hook.name().to_string();
                    let path = event.source_path();

                    let result = tokio::time::timeout(timeout, async {
                        AssertUnwindSafe(hook.handle(&event)).catch_unwind().await
                    })
                    .await;

                    match result {
                        Ok(Ok(Ok(()))) => {
                            debug!(hook = %hook_name, path = %path, "Hook completed");
                        }
                        Ok(Ok(Err(e))) => {
                            warn!(hook = %hook_name, path = %path, error = %e, "Hook failed");
                        }
                        Ok(Err(panic)) => {
                            let panic_msg = if let Some(s) = panic.downcast_ref::<&str>() {
                                s.to_string()
                            } else if let Some(s) = panic.downcast_ref::<String>() {
                                s.clone()
                            } else {
                                "Unknown panic".to_string()
                            };
                            error!(hook = %hook_name, path = %path, panic = %panic_msg, "Hook panicked");
                        }
                        Err(_) => {
                            error!(
                                hook = %hook_name,
                                path = %path,
                                timeout_secs = timeout.as_secs(),
                                "Hook timed out"
                            );
                        }
                    }
                })
            })
            .collect()
    }

    pub async fn on_start(&self) -> Result<(), HookError> {
        let hooks = self.hooks.read().await;
        for hook in hooks.iter() {
            if let Err(e) = hook.on_start().await {
                warn!(hook = %hook.name(), error = %e, "Hook on_start failed");
            }
        }
        Ok(())
    }

    pub async fn on_shutdown(&self) -> Result<(), HookError> {
        let hooks = self.hooks.read().await;
        for hook in hooks.iter() {
            if let Err(e) = hook.on_shutdown().await {
                warn!(hook = %hook.name(), error = %e, "Hook on_shutdown failed");
            }
        }
        Ok(())
    }
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Hook Dispatcher
// ============================================================================

/// Background loop draining the event channel into the registry.
///
/// Dispatch only spawns hook tasks, so the loop keeps the queue moving even
/// while hooks are slow; publishers wait only when it is genuinely behind.
pub struct HookDispatcher {
    registry: Arc<HookRegistry>,
}

impl HookDispatcher {
    pub fn new(registry: Arc<HookRegistry>) -> Self {
        Self { registry }
    }

    /// Runs until every sender of the channel is dropped, then calls
    /// `on_shutdown` on the hooks.
    pub async fn run(self, mut receiver: EventReceiver) {
        info!("Starting hook dispatcher");

        while let Some(event) = receiver.recv().await {
            self.registry.dispatch(&event).await;
        }
        info!("Event channel closed, stopping hook dispatcher");

        if let Err(e) = self.registry.on_shutdown().await {
            warn!(error = %e, "Error during hook shutdown");
        }
    }

    pub fn registry(&self) -> &Arc<HookRegistry> {
        &self.registry
    }
}

// ============================================================================
// Builder
// ============================================================================

pub struct HookSystemBuilder {
    registry: HookRegistry,
}

impl HookSystemBuilder {
    pub fn new() -> Self {
        Self {
            registry: HookRegistry::new(),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            registry: HookRegistry::with_timeout(timeout),
        }
    }

    pub async fn register(self, hook: Arc<dyn DocumentHook>) -> Self {
        self.registry.register(hook).await;
        self
    }

    pub fn build(self) -> Arc<HookRegistry> {
        Arc::new(self.registry)
    }

    /// Builds the registry and spawns its dispatcher on `receiver`.
    pub fn start(self, receiver: EventReceiver) -> Arc<HookRegistry> {
        let registry = Arc::new(self.registry);
        let dispatcher = HookDispatcher::new(registry.clone());
        tokio::spawn(dispatcher.run(receiver));
        registry
    }
}

impl Default for HookSystemBuilder {
    fn default() -> Self {
        Self::new()
    }
}
