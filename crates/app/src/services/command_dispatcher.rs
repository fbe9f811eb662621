//! Command dispatcher: authorizes, validates and routes command requests.
//!
//! The dispatcher owns every live [`CommandInstance`]. Handlers never get
//! the instance itself, only a [`CommandHandle`] that looks it up by id for
//! each transition, so a discarded instance is reported instead of touched.
//!
//! An instance lives until it is explicitly discarded, or until its last
//! handle is dropped after it reached a terminal state.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};

use serde_json::Value as Json;

use devlink_domain::command::{CommandError, CommandInstance, CommandState};
use devlink_domain::error::{DevlinkError, DispatchError, LifecycleError};
use devlink_domain::event::{Event, EventType};
use devlink_domain::id::CommandId;
use devlink_domain::role::Role;
use devlink_domain::value::{Value, ValueMap};

use crate::command_registry::CommandRegistry;
use crate::ports::SharedPublisher;

/// Receives each dispatched command instance.
///
/// Called synchronously from [`CommandDispatcher::dispatch`]; long-running
/// work is expected to be posted to a scheduler.
pub trait CommandHandler: Send + Sync {
    fn handle(&self, command: CommandHandle);
}

impl<F> CommandHandler for F
where
    F: Fn(CommandHandle) + Send + Sync,
{
    fn handle(&self, command: CommandHandle) {
        self(command);
    }
}

type SharedHandler = Arc<dyn CommandHandler>;

#[derive(Default)]
struct HandlerTable {
    by_name: BTreeMap<String, SharedHandler>,
    fallback: Option<SharedHandler>,
}

impl HandlerTable {
    fn find(&self, name: &str) -> Option<SharedHandler> {
        self.by_name
            .get(name)
            .or(self.fallback.as_ref())
            .cloned()
    }
}

struct Entry {
    instance: CommandInstance,
    /// Shared by every handle of this instance; dangling once all of them
    /// are dropped.
    lease: Weak<Lease>,
}

#[derive(Default)]
struct Queue {
    instances: BTreeMap<CommandId, Entry>,
    /// Queued instances no handler has received yet.
    undelivered: BTreeSet<CommandId>,
}

struct Shared {
    queue: Mutex<Queue>,
    publisher: SharedPublisher,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply a lifecycle transition, then publish the resulting snapshot
    /// with the queue unlocked.
    fn transition(
        &self,
        id: CommandId,
        event_type: EventType,
        apply: impl FnOnce(&mut CommandInstance) -> Result<(), DevlinkError>,
    ) -> Result<(), DevlinkError> {
        let snapshot = {
            let mut queue = self.lock();
            let instance = queue
                .instances
                .get_mut(&id)
                .map(|entry| &mut entry.instance)
                .ok_or(LifecycleError::Discarded(id))?;
            apply(instance)?;
            instance.to_json()
        };
        self.notify(event_type, id, snapshot);
        Ok(())
    }

    /// Drop a terminal instance nobody holds a handle to anymore.
    fn release(&self, id: CommandId) {
        let mut queue = self.lock();
        let unreachable = queue.instances.get(&id).is_some_and(|entry| {
            entry.instance.state().is_terminal() && entry.lease.strong_count() == 0
        });
        if unreachable {
            queue.instances.remove(&id);
            queue.undelivered.remove(&id);
            tracing::debug!(%id, "released finished command");
        }
    }

    fn snapshot(&self, id: CommandId) -> Option<Json> {
        self.lock()
            .instances
            .get(&id)
            .map(|entry| entry.instance.to_json())
    }

    fn notify(&self, event_type: EventType, id: CommandId, snapshot: Json) {
        if let Err(err) = self
            .publisher
            .publish(Event::new(event_type, Some(id), snapshot))
        {
            tracing::warn!(%id, %event_type, error = %err, "failed to publish command event");
        }
    }
}

/// Keeps an instance reachable; the last drop releases it if it is done.
struct Lease {
    id: CommandId,
    shared: Arc<Shared>,
}

impl Lease {
    /// Lease of `entry`, reusing the live one when handles are still out.
    fn acquire(shared: &Arc<Shared>, entry: &mut Entry) -> Arc<Self> {
        entry.lease.upgrade().unwrap_or_else(|| {
            let lease = Arc::new(Self {
                id: entry.instance.id(),
                shared: Arc::clone(shared),
            });
            entry.lease = Arc::downgrade(&lease);
            lease
        })
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.shared.release(self.id);
    }
}

/// Handler-side view of one dispatched command instance.
///
/// Cheap to clone; every clone drives the same instance. Dropping the last
/// clone of a terminal instance releases it.
#[derive(Clone)]
pub struct CommandHandle {
    lease: Arc<Lease>,
    name: String,
    parameters: Arc<ValueMap>,
}

impl CommandHandle {
    fn new(lease: Arc<Lease>, instance: &CommandInstance) -> Self {
        Self {
            lease,
            name: instance.name(),
            parameters: Arc::new(instance.parameters().clone()),
        }
    }

    #[must_use]
    pub fn id(&self) -> CommandId {
        self.lease.id
    }

    fn shared(&self) -> &Shared {
        &self.lease.shared
    }

    /// `package.command`
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Validated parameters, defaults filled in.
    #[must_use]
    pub fn parameters(&self) -> &ValueMap {
        &self.parameters
    }

    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name)
    }

    /// Current state, or `None` once the instance has been discarded.
    #[must_use]
    pub fn state(&self) -> Option<CommandState> {
        self.shared()
            .lock()
            .instances
            .get(&self.id())
            .map(|entry| entry.instance.state())
    }

    #[must_use]
    pub fn to_json(&self) -> Option<Json> {
        self.shared().snapshot(self.id())
    }

    /// # Errors
    ///
    /// See [`CommandInstance::set_progress`]; also fails with
    /// [`LifecycleError::Discarded`] once the instance is gone.
    pub fn set_progress(&self, progress: &Json) -> Result<(), DevlinkError> {
        self.shared()
            .transition(self.id(), EventType::CommandProgress, |instance| {
                instance.set_progress(progress)
            })
    }

    /// # Errors
    ///
    /// See [`CommandInstance::complete`]; also fails with
    /// [`LifecycleError::Discarded`] once the instance is gone.
    pub fn complete(&self, results: &Json) -> Result<(), DevlinkError> {
        self.shared()
            .transition(self.id(), EventType::CommandCompleted, |instance| {
                instance.complete(results)
            })
    }

    /// # Errors
    ///
    /// See [`CommandInstance::abort`]; also fails with
    /// [`LifecycleError::Discarded`] once the instance is gone.
    pub fn abort(&self, error: CommandError) -> Result<(), DevlinkError> {
        self.shared()
            .transition(self.id(), EventType::CommandAborted, |instance| {
                instance.abort(error)
            })
    }
}

impl std::fmt::Debug for CommandHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandHandle")
            .field("id", &self.id())
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Routes command requests to registered handlers.
pub struct CommandDispatcher {
    registry: Arc<RwLock<CommandRegistry>>,
    handlers: Mutex<HandlerTable>,
    shared: Arc<Shared>,
}

impl CommandDispatcher {
    /// Create a dispatcher resolving commands in `registry`.
    pub fn new(registry: Arc<RwLock<CommandRegistry>>, publisher: SharedPublisher) -> Self {
        Self {
            registry,
            handlers: Mutex::new(HandlerTable::default()),
            shared: Arc::new(Shared {
                queue: Mutex::new(Queue::default()),
                publisher,
            }),
        }
    }

    /// Create a command instance and hand it to its handler.
    ///
    /// The actor's role is checked before the parameters are looked at, so
    /// an unauthorized actor learns nothing about the parameter schema.
    /// Without a matching handler the instance stays queued until one is
    /// registered.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::UnknownCommand`] when no definition exists
    /// - [`DispatchError::PermissionDenied`] when `role` is below the
    ///   definition's minimal role
    /// - [`DevlinkError::Validation`] when the parameters do not conform
    ///
    /// No instance exists after any of these.
    #[tracing::instrument(skip(self, parameters))]
    pub fn dispatch(
        &self,
        package: &str,
        command: &str,
        parameters: &Json,
        role: Role,
    ) -> Result<CommandHandle, DevlinkError> {
        let full_name = format!("{package}.{command}");
        let definition = self
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .find_shared(&full_name)
            .ok_or_else(|| DispatchError::UnknownCommand(full_name.clone()))?;

        if !role.satisfies(definition.minimal_role) {
            return Err(DispatchError::PermissionDenied {
                command: full_name,
                required: definition.minimal_role,
                actual: role,
            }
            .into());
        }

        let instance = CommandInstance::new(definition, parameters)?;
        let id = instance.id();
        let lease = Arc::new(Lease {
            id,
            shared: Arc::clone(&self.shared),
        });
        let handle = CommandHandle::new(lease, &instance);
        let snapshot = instance.to_json();
        let entry = Entry {
            instance,
            lease: Arc::downgrade(&handle.lease),
        };
        self.shared.lock().instances.insert(id, entry);
        self.shared.notify(EventType::CommandQueued, id, snapshot);

        let handler = self.lock_handlers().find(&handle.name);
        match handler {
            Some(handler) => handler.handle(handle.clone()),
            None => {
                tracing::debug!(%id, "no handler yet, keeping command queued");
                self.shared.lock().undelivered.insert(id);
            }
        }
        Ok(handle)
    }

    /// Register the handler for `package.command`, replacing any previous
    /// one. Queued instances of that command nobody received yet are
    /// delivered to it right away.
    pub fn add_handler(&self, name: &str, handler: impl CommandHandler + 'static) {
        let handler: SharedHandler = Arc::new(handler);
        self.lock_handlers()
            .by_name
            .insert(name.to_string(), Arc::clone(&handler));
        self.deliver_pending(&handler, |candidate| candidate == name);
    }

    /// Register the handler receiving every command without a specific
    /// handler. Queued instances nobody received yet are delivered to it
    /// right away.
    pub fn set_fallback_handler(&self, handler: impl CommandHandler + 'static) {
        let handler: SharedHandler = Arc::new(handler);
        self.lock_handlers().fallback = Some(Arc::clone(&handler));
        self.deliver_pending(&handler, |_| true);
    }

    fn deliver_pending(&self, handler: &SharedHandler, matches: impl Fn(&str) -> bool) {
        // Handles are only built, never dropped, while the queue is locked:
        // dropping one may need the lock to release its instance.
        let handles: Vec<CommandHandle> = {
            let mut queue = self.shared.lock();
            let Queue {
                instances,
                undelivered,
            } = &mut *queue;
            let mut handles = Vec::new();
            for id in undelivered.iter() {
                let Some(entry) = instances.get_mut(id) else {
                    continue;
                };
                let name = entry.instance.name();
                if entry.instance.state().is_terminal() || !matches(name.as_str()) {
                    continue;
                }
                let lease = Lease::acquire(&self.shared, entry);
                handles.push(CommandHandle::new(lease, &entry.instance));
            }
            for handle in &handles {
                undelivered.remove(&handle.id());
            }
            handles
        };
        for handle in handles {
            tracing::debug!(id = %handle.id(), name = %handle.name, "delivering queued command");
            handler.handle(handle);
        }
    }

    /// Snapshot of an instance in wire form.
    #[must_use]
    pub fn get(&self, id: CommandId) -> Option<Json> {
        self.shared.snapshot(id)
    }

    /// Ids of all instances that have not reached a terminal state.
    #[must_use]
    pub fn pending(&self) -> Vec<CommandId> {
        self.shared
            .lock()
            .instances
            .values()
            .filter(|entry| !entry.instance.state().is_terminal())
            .map(|entry| entry.instance.id())
            .collect()
    }

    /// Release a finished instance, even while handles to it are still out.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidState`] while the instance is still
    /// live, and [`LifecycleError::Discarded`] if it is unknown.
    pub fn discard(&self, id: CommandId) -> Result<(), DevlinkError> {
        let mut queue = self.shared.lock();
        let state = queue
            .instances
            .get(&id)
            .map(|entry| entry.instance.state())
            .ok_or(LifecycleError::Discarded(id))?;
        if !state.is_terminal() {
            return Err(LifecycleError::InvalidState {
                state,
                operation: "discard",
            }
            .into());
        }
        queue.instances.remove(&id);
        queue.undelivered.remove(&id);
        Ok(())
    }

    fn lock_handlers(&self) -> MutexGuard<'_, HandlerTable> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
