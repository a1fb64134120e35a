//! Lifecycle hooks.
//!
//! Hooks are an explicit ordered list of registrations resolved once at
//! collection construction - there is no runtime discovery. An empty
//! [`Hooks`] is the valid no-op dispatcher.

use crate::record::Record;

/// A lifecycle transition a hook can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Before the first write of a record.
    Creating,
    /// After the first write of a record.
    Created,
    /// Before an update write.
    Updating,
    /// After an update write.
    Updated,
    /// Before any save (insert or update).
    Saving,
    /// After any save (insert or update).
    Saved,
    /// Before a delete.
    Deleting,
    /// After a delete.
    Deleted,
    /// After a record is hydrated from the store.
    Retrieved,
}

type HookFn = dyn Fn(&Record) + Send + Sync;

/// An ordered set of lifecycle-hook registrations.
///
/// Registrations fire in insertion order. Hooks observe the record; they
/// cannot veto or mutate the transition.
#[derive(Default)]
pub struct Hooks {
    entries: Vec<(Lifecycle, Box<HookFn>)>,
}

impl Hooks {
    /// Creates an empty hook set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a hook for one lifecycle transition.
    #[must_use]
    pub fn on(mut self, event: Lifecycle, hook: impl Fn(&Record) + Send + Sync + 'static) -> Self {
        self.entries.push((event, Box::new(hook)));
        self
    }

    /// Returns the number of registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when no hooks are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fires all hooks registered for `event`, in registration order.
    pub(crate) fn fire(&self, event: Lifecycle, record: &Record) {
        for (registered, hook) in &self.entries {
            if *registered == event {
                hook(record);
            }
        }
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("registrations", &self.entries.len())
            .finish()
    }
}
