//! Command dispatcher (spec.md §4.7).
//!
//! Routes inbound [`CommandRecord`]s to registered handlers by uppercase
//! verb, running context augmentation, validation, permission checks and
//! priority-ordered hooks around the handler itself. The reflection-based
//! handler discovery the source framework used is explicitly out of scope
//! (spec.md §1/§9 Design Notes alternative (a)) — callers register
//! handlers through the plain traits below.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::command::record::CommandRecord;
use crate::error::DispatchError;

/// Mutable, per-dispatch sender identity and permission context.
///
/// Built by the caller from whatever the session currently knows about the
/// message's source (nick, account, channel membership), then mutated by
/// registered [`ContextAugmenter`]s before being frozen for the rest of
/// the pipeline (spec.md §4.7 step 2-3).
#[derive(Clone, Debug, Default)]
pub struct SenderContext {
    /// The sender's current nickname.
    pub nick: String,
    /// The sender's resolved account name, if known.
    pub account: Option<String>,
    /// Permission strings already known to be held by this sender
    /// (augmenters typically add to this from the dispatcher's
    /// configured permission table).
    pub permissions: std::collections::HashSet<String>,
    /// Free-form metadata augmenters can stash and handlers can read
    /// (e.g. resolved channel membership, WHOIS flags).
    pub extra: HashMap<String, String>,
}

impl SenderContext {
    #[must_use]
    pub fn new(nick: impl Into<String>) -> Self {
        Self {
            nick: nick.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }
}

/// Mutates a [`SenderContext`] before it is frozen (spec.md §4.7 step 2):
/// account resolution, permission aggregation, and similar lookups against
/// already-available (lock-free) state.
pub trait ContextAugmenter: Send + Sync {
    fn augment(&self, ctx: &mut SenderContext);
}

/// Outcome of a [`PermissionManager`] check for one privilege string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PermissionOutcome {
    /// This manager recognizes the privilege and grants it.
    Granted,
    /// This manager recognizes the privilege and denies it, with a
    /// manager-specific reason.
    Denied(String),
    /// This manager doesn't recognize this privilege string at all; the
    /// dispatcher falls through to the next registered manager
    /// (spec.md §4.7 step 3: "using the first that doesn't signal
    /// 'unsupported combination'").
    Unsupported,
}

/// Consulted, in registration order, when a handler declares a required
/// privilege (spec.md §4.7 step 3).
pub trait PermissionManager: Send + Sync {
    fn check(&self, ctx: &SenderContext, privilege: &str) -> PermissionOutcome;
}

/// A permission manager backed by a static account -> permissions table
/// (spec.md §6 `permissions` configuration).
pub struct TablePermissionManager {
    table: crate::config::PermissionTable,
}

impl TablePermissionManager {
    #[must_use]
    pub fn new(table: crate::config::PermissionTable) -> Self {
        Self { table }
    }
}

impl PermissionManager for TablePermissionManager {
    fn check(&self, ctx: &SenderContext, privilege: &str) -> PermissionOutcome {
        let Some(account) = &ctx.account else {
            return PermissionOutcome::Unsupported;
        };
        match self.table.get(account) {
            Some(grants) if grants.iter().any(|g| g == privilege) => PermissionOutcome::Granted,
            Some(_) => PermissionOutcome::Denied(format!(
                "account {account} lacks privilege {privilege}"
            )),
            None => PermissionOutcome::Unsupported,
        }
    }
}

/// The priority a [`DispatchHook`] runs at relative to other hooks on the
/// same command (spec.md §4.7: "Highest, High, Normal, Low, Lowest";
/// within a priority, registration order").
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HookPriority {
    Highest,
    High,
    Normal,
    Low,
    Lowest,
}

/// The suppression flags a [`DispatchHook`] may return (spec.md §4.7
/// step 4: "a flag set over {Continue, SuppressDefault, SuppressPlugins,
/// SuppressAll}").
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HookFlags {
    /// Substitute a no-op handler for the registered default handler.
    pub suppress_default: bool,
    /// Stop running any further hooks after this one.
    pub suppress_plugins: bool,
}

impl HookFlags {
    /// `Continue`: run everything else as normal.
    pub const CONTINUE: Self = Self {
        suppress_default: false,
        suppress_plugins: false,
    };
    /// `SuppressDefault`: skip the registered handler, still run later hooks.
    pub const SUPPRESS_DEFAULT: Self = Self {
        suppress_default: true,
        suppress_plugins: false,
    };
    /// `SuppressPlugins`: stop further hook execution, still run the handler.
    pub const SUPPRESS_PLUGINS: Self = Self {
        suppress_default: false,
        suppress_plugins: true,
    };
    /// `SuppressAll`: neither the handler nor any later hook runs.
    pub const SUPPRESS_ALL: Self = Self {
        suppress_default: true,
        suppress_plugins: true,
    };
}

/// The primary handler registered for one command verb.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Execute this handler against an inbound command.
    async fn handle(
        &self,
        ctx: &SenderContext,
        cmd: &CommandRecord,
        cancel: &CancellationToken,
    ) -> Result<(), DispatchError>;

    /// The privilege string this handler requires, if any
    /// (spec.md §4.7 step 3).
    fn required_privilege(&self) -> Option<&str> {
        None
    }

    /// Validate the inbound command before permission checks run. The
    /// default accepts everything.
    fn validate(&self, _ctx: &SenderContext, _cmd: &CommandRecord) -> Result<(), DispatchError> {
        Ok(())
    }
}

/// A hook attached alongside (not instead of) a command's default handler
/// (spec.md §4.7 step 4).
#[async_trait]
pub trait DispatchHook: Send + Sync {
    async fn handle(
        &self,
        ctx: &SenderContext,
        cmd: &CommandRecord,
        cancel: &CancellationToken,
    ) -> HookFlags;
}

/// Verb used to register a hook that runs for every dispatched command,
/// regardless of its own verb.
pub const ANY_VERB: &str = "*";

struct RegisteredHook {
    priority: HookPriority,
    order: usize,
    hook: Arc<dyn DispatchHook>,
}

/// The command dispatcher: registry of handlers, hooks, context
/// augmenters and permission managers, plus the `dispatch` entry point
/// (spec.md §4.7).
#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
    hooks: HashMap<String, Vec<RegisteredHook>>,
    augmenters: Vec<Arc<dyn ContextAugmenter>>,
    permission_managers: Vec<Arc<dyn PermissionManager>>,
    next_hook_order: usize,
}

impl Dispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the default handler for `verb` (uppercased on storage).
    /// Replaces any handler previously registered for the same verb.
    pub fn register_handler(&mut self, verb: &str, handler: Arc<dyn CommandHandler>) {
        self.handlers.insert(verb.to_ascii_uppercase(), handler);
    }

    /// Attach a hook to `verb` (or [`ANY_VERB`] for every command) at the
    /// given priority. Hooks accumulate; within one priority they run in
    /// registration order.
    pub fn register_hook(&mut self, verb: &str, priority: HookPriority, hook: Arc<dyn DispatchHook>) {
        let order = self.next_hook_order;
        self.next_hook_order += 1;
        self.hooks
            .entry(verb.to_ascii_uppercase())
            .or_default()
            .push(RegisteredHook {
                priority,
                order,
                hook,
            });
    }

    pub fn register_augmenter(&mut self, augmenter: Arc<dyn ContextAugmenter>) {
        self.augmenters.push(augmenter);
    }

    pub fn register_permission_manager(&mut self, manager: Arc<dyn PermissionManager>) {
        self.permission_managers.push(manager);
    }

    fn ordered_hooks(&self, verb: &str) -> Vec<&Arc<dyn DispatchHook>> {
        let mut combined: Vec<&RegisteredHook> = Vec::new();
        if let Some(v) = self.hooks.get(verb) {
            combined.extend(v.iter());
        }
        if let Some(v) = self.hooks.get(ANY_VERB) {
            combined.extend(v.iter());
        }
        combined.sort_by_key(|h| (h.priority, h.order));
        combined.into_iter().map(|h| &h.hook).collect()
    }

    /// Dispatch one inbound command (spec.md §4.7).
    pub async fn dispatch(
        &self,
        cmd: &CommandRecord,
        mut ctx: SenderContext,
        cancel: &CancellationToken,
    ) -> Result<(), DispatchError> {
        let verb = cmd.verb().to_ascii_uppercase();
        let handler = self.handlers.get(&verb);
        let hooks = self.ordered_hooks(&verb);

        if handler.is_none() && hooks.is_empty() {
            tracing::debug!(verb = %verb, "no handler or hook registered; dropping");
            return Ok(());
        }

        for augmenter in &self.augmenters {
            augmenter.augment(&mut ctx);
        }
        let ctx = ctx;

        if let Some(handler) = handler {
            handler.validate(&ctx, cmd)?;
            if let Some(privilege) = handler.required_privilege() {
                self.check_permission(&ctx, privilege)?;
            }
        }

        let mut suppress_default = false;
        for hook in hooks {
            let flags = hook.handle(&ctx, cmd, cancel).await;
            suppress_default |= flags.suppress_default;
            if flags.suppress_plugins {
                break;
            }
        }

        if suppress_default {
            return Ok(());
        }

        match handler {
            Some(handler) => handler.handle(&ctx, cmd, cancel).await,
            None => Ok(()),
        }
    }

    fn check_permission(&self, ctx: &SenderContext, privilege: &str) -> Result<(), DispatchError> {
        for manager in &self.permission_managers {
            match manager.check(ctx, privilege) {
                PermissionOutcome::Granted => return Ok(()),
                PermissionOutcome::Denied(reason) => {
                    return Err(DispatchError::PermissionDenied(reason))
                }
                PermissionOutcome::Unsupported => continue,
            }
        }
        Err(DispatchError::PermissionDenied(format!(
            "no permission manager recognized privilege {privilege}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::record::{CommandFactory, FactoryOptions};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn cmd(verb: &str) -> CommandRecord {
        CommandFactory::prepare_client_command(verb, vec![], Vec::new(), &FactoryOptions::default())
            .unwrap()
    }

    struct CountingHandler(Arc<AtomicUsize>);

    #[async_trait]
    impl CommandHandler for CountingHandler {
        async fn handle(
            &self,
            _ctx: &SenderContext,
            _cmd: &CommandRecord,
            _cancel: &CancellationToken,
        ) -> Result<(), DispatchError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct PrivilegedHandler;

    #[async_trait]
    impl CommandHandler for PrivilegedHandler {
        async fn handle(
            &self,
            _ctx: &SenderContext,
            _cmd: &CommandRecord,
            _cancel: &CancellationToken,
        ) -> Result<(), DispatchError> {
            Ok(())
        }

        fn required_privilege(&self) -> Option<&str> {
            Some("admin")
        }
    }

    struct SuppressingHook;

    #[async_trait]
    impl DispatchHook for SuppressingHook {
        async fn handle(
            &self,
            _ctx: &SenderContext,
            _cmd: &CommandRecord,
            _cancel: &CancellationToken,
        ) -> HookFlags {
            HookFlags::SUPPRESS_DEFAULT
        }
    }

    #[tokio::test]
    async fn absent_handler_and_hooks_is_a_no_op() {
        let dispatcher = Dispatcher::new();
        let cancel = CancellationToken::new();
        dispatcher
            .dispatch(&cmd("PRIVMSG"), SenderContext::new("nick"), &cancel)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn registered_handler_runs() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut dispatcher = Dispatcher::new();
        dispatcher.register_handler("PING", Arc::new(CountingHandler(count.clone())));
        let cancel = CancellationToken::new();
        dispatcher
            .dispatch(&cmd("PING"), SenderContext::new("nick"), &cancel)
            .await
            .unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn suppress_default_hook_skips_handler() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut dispatcher = Dispatcher::new();
        dispatcher.register_handler("PING", Arc::new(CountingHandler(count.clone())));
        dispatcher.register_hook("PING", HookPriority::Highest, Arc::new(SuppressingHook));
        let cancel = CancellationToken::new();
        dispatcher
            .dispatch(&cmd("PING"), SenderContext::new("nick"), &cancel)
            .await
            .unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_permission_is_denied() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register_handler("OPER", Arc::new(PrivilegedHandler));
        let mut table = crate::config::PermissionTable::new();
        table.insert("shelly".to_owned(), vec!["admin".to_owned()]);
        dispatcher.register_permission_manager(Arc::new(TablePermissionManager::new(table)));
        let cancel = CancellationToken::new();

        let mut ctx = SenderContext::new("nick");
        ctx.account = Some("other".to_owned());
        let err = dispatcher
            .dispatch(&cmd("OPER"), ctx, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn granted_permission_runs_handler() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register_handler("OPER", Arc::new(PrivilegedHandler));
        let mut table = crate::config::PermissionTable::new();
        table.insert("shelly".to_owned(), vec!["admin".to_owned()]);
        dispatcher.register_permission_manager(Arc::new(TablePermissionManager::new(table)));
        let cancel = CancellationToken::new();

        let mut ctx = SenderContext::new("nick");
        ctx.account = Some("shelly".to_owned());
        dispatcher
            .dispatch(&cmd("OPER"), ctx, &cancel)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn hooks_run_in_priority_then_registration_order() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        struct OrderHook(Arc<std::sync::Mutex<Vec<&'static str>>>, &'static str);
        #[async_trait]
        impl DispatchHook for OrderHook {
            async fn handle(
                &self,
                _ctx: &SenderContext,
                _cmd: &CommandRecord,
                _cancel: &CancellationToken,
            ) -> HookFlags {
                self.0.lock().unwrap().push(self.1);
                HookFlags::CONTINUE
            }
        }

        let mut dispatcher = Dispatcher::new();
        dispatcher.register_hook("PING", HookPriority::Low, Arc::new(OrderHook(order.clone(), "low")));
        dispatcher.register_hook(
            "PING",
            HookPriority::Highest,
            Arc::new(OrderHook(order.clone(), "highest")),
        );
        dispatcher.register_hook("PING", HookPriority::Normal, Arc::new(OrderHook(order.clone(), "normal-a")));
        dispatcher.register_hook(
            "PING",
            HookPriority::Normal,
            Arc::new(OrderHook(order.clone(), "normal-b")),
        );

        let cancel = CancellationToken::new();
        dispatcher
            .dispatch(&cmd("PING"), SenderContext::new("nick"), &cancel)
            .await
            .unwrap();

        assert_eq!(
            *order.lock().unwrap(),
            vec!["highest", "normal-a", "normal-b", "low"]
        );
    }
}
