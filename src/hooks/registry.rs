//! Hook registration and invocation.
//!
//! # Responsibilities
//! - Seal the legal hook names at construction
//! - Register handlers per name, in order, under a `pre`/`post` phase
//! - Invoke a chain sequentially, waiting on each handler, aborting on the
//!   first error
//!
//! # Design Decisions
//! - Allow-list entries are phase-qualified (`pre:static`) or bare
//!   (`updates`, which admits both phases)
//! - Registration is a startup-phase activity; registering while requests
//!   are in flight is unsupported (the lock keeps it memory-safe, nothing
//!   about ordering relative to concurrent invocations is promised)
//! - Handlers own the context and hand it back, so chains never fight the
//!   borrow checker across await points

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, RwLock};

use futures_util::future::BoxFuture;

use crate::error::{BoxError, HookError};
use crate::hooks::context::HookContext;

/// Hook names every application instance declares.
pub const DEFAULT_HOOKS: &[&str] = &[
    "pre:static",
    "pre:bodyparser",
    "pre:session",
    "pre:routes",
    "pre:render",
    "pre:logger",
    "pre:error",
    "updates",
    "signin",
    "signout",
];

/// Phase a handler is registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Pre,
    Post,
}

impl Phase {
    fn prefix(self) -> &'static str {
        match self {
            Phase::Pre => "pre",
            Phase::Post => "post",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// A registered handler: takes the chain context, returns it on success.
pub type HookHandler =
    Arc<dyn Fn(HookContext) -> BoxFuture<'static, Result<HookContext, BoxError>> + Send + Sync>;

/// Ordered, sealed registry of named extension points.
pub struct HookRegistry {
    allowed: HashSet<String>,
    handlers: RwLock<HashMap<String, Vec<HookHandler>>>,
}

impl HookRegistry {
    /// Create a registry whose allow-list is sealed to `names`.
    ///
    /// Names may be phase-qualified (`pre:static`) or bare (`updates`); a
    /// bare name admits both `pre` and `post` registrations.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: names.into_iter().map(Into::into).collect(),
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Registry sealed to the standard CMS hook names.
    pub fn with_default_hooks() -> Self {
        Self::new(DEFAULT_HOOKS.iter().copied())
    }

    /// Re-declare hook names after construction.
    ///
    /// Accepted only for names already in the allow-list; any new name is a
    /// sealed-allow-list violation and fails before anything is changed.
    pub fn declare<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Result<(), HookError> {
        for name in names {
            if !self.allowed.contains(name) {
                return Err(HookError::Sealed(name.to_string()));
            }
        }
        Ok(())
    }

    /// Register a `pre`-phase handler for `name`.
    pub fn pre<F, Fut>(&self, name: &str, handler: F) -> Result<(), HookError>
    where
        F: Fn(HookContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HookContext, BoxError>> + Send + 'static,
    {
        self.register(Phase::Pre, name, handler)
    }

    /// Register a `post`-phase handler for `name`.
    pub fn post<F, Fut>(&self, name: &str, handler: F) -> Result<(), HookError>
    where
        F: Fn(HookContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HookContext, BoxError>> + Send + 'static,
    {
        self.register(Phase::Post, name, handler)
    }

    /// Register a handler for `name` under `phase`.
    ///
    /// Registrations accumulate in call order and are never removed.
    pub fn register<F, Fut>(&self, phase: Phase, name: &str, handler: F) -> Result<(), HookError>
    where
        F: Fn(HookContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HookContext, BoxError>> + Send + 'static,
    {
        let qualified = self.qualify(phase, name)?;
        let handler: HookHandler = Arc::new(move |ctx| Box::pin(handler(ctx)));
        self.handlers
            .write()
            .expect("hook registry lock poisoned")
            .entry(qualified)
            .or_default()
            .push(handler);
        Ok(())
    }

    /// Number of handlers registered for `name` under `phase`.
    pub fn handler_count(&self, phase: Phase, name: &str) -> usize {
        let Ok(qualified) = self.qualify(phase, name) else {
            return 0;
        };
        self.handlers
            .read()
            .expect("hook registry lock poisoned")
            .get(&qualified)
            .map_or(0, Vec::len)
    }

    /// Run the chain for `name` under `phase`, strictly in registration
    /// order.
    ///
    /// Each handler completes before the next starts. The first handler
    /// error aborts the chain and surfaces as [`HookError::Handler`]; with
    /// no handlers registered this is an immediate no-op success. An
    /// undeclared name fails before any handler runs.
    pub async fn invoke(
        &self,
        phase: Phase,
        name: &str,
        mut ctx: HookContext,
    ) -> Result<HookContext, HookError> {
        let qualified = self.qualify(phase, name)?;
        let chain: Vec<HookHandler> = self
            .handlers
            .read()
            .expect("hook registry lock poisoned")
            .get(&qualified)
            .cloned()
            .unwrap_or_default();

        if chain.is_empty() {
            return Ok(ctx);
        }

        tracing::trace!(hook = %qualified, handlers = chain.len(), "Invoking hook chain");
        for handler in chain {
            ctx = handler(ctx).await.map_err(|source| {
                tracing::debug!(hook = %qualified, error = %source, "Hook chain aborted");
                HookError::Handler {
                    hook: qualified.clone(),
                    source,
                }
            })?;
        }
        Ok(ctx)
    }

    /// Phase-qualified key for `name`, or an undeclared-name error.
    fn qualify(&self, phase: Phase, name: &str) -> Result<String, HookError> {
        let qualified = format!("{}:{}", phase.prefix(), name);
        if self.allowed.contains(&qualified) || self.allowed.contains(name) {
            Ok(qualified)
        } else {
            Err(HookError::Undeclared(qualified))
        }
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registered = self
            .handlers
            .read()
            .map(|h| h.values().map(Vec::len).sum::<usize>())
            .unwrap_or(0);
        f.debug_struct("HookRegistry")
            .field("allowed", &self.allowed.len())
            .field("registered", &registered)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn recorder(log: &Arc<Mutex<Vec<u32>>>, id: u32) -> impl Fn(HookContext) -> futures_util::future::Ready<Result<HookContext, BoxError>> {
        let log = log.clone();
        move |ctx| {
            log.lock().unwrap().push(id);
            futures_util::future::ready(Ok(ctx))
        }
    }

    #[tokio::test]
    async fn handlers_run_in_registration_order() {
        let registry = HookRegistry::with_default_hooks();
        let log = Arc::new(Mutex::new(Vec::new()));
        registry.pre("routes", recorder(&log, 1)).unwrap();
        registry.pre("routes", recorder(&log, 2)).unwrap();
        registry.pre("routes", recorder(&log, 3)).unwrap();
        assert_eq!(registry.handler_count(Phase::Pre, "routes"), 3);
        assert_eq!(registry.handler_count(Phase::Post, "routes"), 0);

        registry
            .invoke(Phase::Pre, "routes", HookContext::new())
            .await
            .unwrap();
        assert_eq!(*log.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn first_error_aborts_the_chain() {
        let registry = HookRegistry::with_default_hooks();
        let log = Arc::new(Mutex::new(Vec::new()));
        registry.pre("bodyparser", recorder(&log, 1)).unwrap();
        registry
            .pre("bodyparser", |_ctx| async {
                Err::<HookContext, BoxError>("parser refused".into())
            })
            .unwrap();
        registry.pre("bodyparser", recorder(&log, 3)).unwrap();

        let err = registry
            .invoke(Phase::Pre, "bodyparser", HookContext::new())
            .await
            .unwrap_err();
        match err {
            HookError::Handler { hook, source } => {
                assert_eq!(hook, "pre:bodyparser");
                assert_eq!(source.to_string(), "parser refused");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // The third handler never ran.
        assert_eq!(*log.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn zero_handlers_is_a_no_op_success() {
        let registry = HookRegistry::with_default_hooks();
        let ctx = registry
            .invoke(Phase::Pre, "static", HookContext::new())
            .await
            .unwrap();
        assert!(ctx.method.is_none());
    }

    #[tokio::test]
    async fn undeclared_name_fails_before_any_handler() {
        let registry = HookRegistry::with_default_hooks();
        let err = registry
            .invoke(Phase::Pre, "teleport", HookContext::new())
            .await
            .unwrap_err();
        assert!(matches!(err, HookError::Undeclared(name) if name == "pre:teleport"));

        let err = registry
            .pre("teleport", |ctx| async { Ok(ctx) })
            .unwrap_err();
        assert!(matches!(err, HookError::Undeclared(_)));
    }

    #[tokio::test]
    async fn bare_names_admit_both_phases() {
        let registry = HookRegistry::with_default_hooks();
        let hits = Arc::new(AtomicUsize::new(0));
        let pre_hits = hits.clone();
        registry
            .pre("updates", move |ctx| {
                pre_hits.fetch_add(1, Ordering::SeqCst);
                async { Ok(ctx) }
            })
            .unwrap();
        let post_hits = hits.clone();
        registry
            .post("updates", move |ctx| {
                post_hits.fetch_add(1, Ordering::SeqCst);
                async { Ok(ctx) }
            })
            .unwrap();

        registry
            .invoke(Phase::Pre, "updates", HookContext::new())
            .await
            .unwrap();
        registry
            .invoke(Phase::Post, "updates", HookContext::new())
            .await
            .unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        // Qualified declarations admit only their own phase.
        assert!(registry.post("static", |ctx| async { Ok(ctx) }).is_err());
    }

    #[tokio::test]
    async fn declare_is_sealed_after_construction() {
        let registry = HookRegistry::with_default_hooks();
        registry.declare(["pre:static", "updates"]).unwrap();
        let err = registry.declare(["pre:static", "plugins"]).unwrap_err();
        assert!(matches!(err, HookError::Sealed(name) if name == "plugins"));
    }

    #[tokio::test]
    async fn context_threads_through_the_chain() {
        #[derive(Clone, Debug, PartialEq)]
        struct Marker(u32);

        let registry = HookRegistry::with_default_hooks();
        registry
            .pre("routes", |mut ctx| async {
                ctx.extensions.insert(Marker(7));
                Ok(ctx)
            })
            .unwrap();
        registry
            .pre("routes", |mut ctx| async {
                let marker = ctx.extensions.get_mut::<Marker>().expect("marker set");
                marker.0 += 1;
                Ok(ctx)
            })
            .unwrap();

        let ctx = registry
            .invoke(Phase::Pre, "routes", HookContext::new())
            .await
            .unwrap();
        assert_eq!(ctx.extensions.get::<Marker>(), Some(&Marker(8)));
    }

    #[tokio::test]
    async fn async_handlers_are_awaited_in_sequence() {
        let registry = HookRegistry::with_default_hooks();
        let log = Arc::new(Mutex::new(Vec::new()));
        let slow_log = log.clone();
        registry
            .pre("logger", move |ctx| {
                let log = slow_log.clone();
                async move {
                    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                    log.lock().unwrap().push("slow");
                    Ok(ctx)
                }
            })
            .unwrap();
        let fast_log = log.clone();
        registry
            .pre("logger", move |ctx| {
                let log = fast_log.clone();
                async move {
                    log.lock().unwrap().push("fast");
                    Ok(ctx)
                }
            })
            .unwrap();

        registry
            .invoke(Phase::Pre, "logger", HookContext::new())
            .await
            .unwrap();
        // The fast handler still waits for the slow one's continuation.
        assert_eq!(*log.lock().unwrap(), vec!["slow", "fast"]);
    }
}
