//! RAII guard for the channel-switch flag.

use crate::registry::Registry;

/// Holds the registry's switching flag for one switch attempt.
///
/// The flag is cleared when the guard drops, which covers early returns,
/// errors, task cancellation and panics alike.
#[derive(Debug)]
pub(crate) struct SwitchGuard<'a> {
    registry: &'a Registry,
}

impl<'a> SwitchGuard<'a> {
    /// Sets the flag, or returns `None` if another switch holds it.
    pub(crate) fn acquire(registry: &'a Registry) -> Option<Self> {
        registry.begin_switch().then_some(Self { registry })
    }
}

impl Drop for SwitchGuard<'_> {
    fn drop(&mut self) {
        self.registry.end_switch();
    }
}
