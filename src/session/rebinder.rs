//! Global Accessor Rebinder
//!
//! Swaps the ambient slots of an [`AmbientGlobals`] for routers that pick the
//! driver per call from the active session, and puts the previous bindings
//! back on uninstall. In single-remote mode the routers delegate straight to
//! whatever the slot held before, so nothing observable changes.

use super::globals::{AmbientGlobals, Binding, GlobalSlot};
use super::registry::SessionRegistry;
use super::tracker;
use crate::browser::SessionDriver;
use crate::error::{Result, SessionError};
use std::fmt;
use std::sync::Arc;

/// Resolves the driver for the calling flow at call time
pub struct RoutedDriver {
    registry: Arc<SessionRegistry>,
    original: Option<Binding>,
}

impl RoutedDriver {
    pub fn new(registry: Arc<SessionRegistry>, original: Option<Binding>) -> Self {
        Self { registry, original }
    }

    pub fn resolve(&self) -> Result<Arc<dyn SessionDriver>> {
        if !self.registry.is_multiremote() {
            return match (&self.original, self.registry.native()) {
                (Some(original), _) => original.resolve(),
                (None, Some(native)) => Ok(Arc::clone(native)),
                (None, None) => Err(SessionError::Other(
                    "single-remote registry has no native handle".to_string(),
                )),
            };
        }

        let name = tracker::current()?;
        Ok(Arc::clone(self.registry.get(name.as_str())?.driver()))
    }
}

/// A handle slot that could not be redefined during install
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebinderWarning {
    pub slot: GlobalSlot,
    pub message: String,
}

impl fmt::Display for RebinderWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "could not rebind {}: {}", self.slot, self.message)
    }
}

#[derive(Debug, Clone)]
pub struct RebinderOptions {
    /// Fail the install instead of warning when a handle slot is sealed
    pub strict: bool,
    /// Also bind `driver.<name>` for every registered session
    pub sub_handles: bool,
}

impl Default for RebinderOptions {
    fn default() -> Self {
        Self {
            strict: false,
            sub_handles: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Rebinder {
    options: RebinderOptions,
}

struct SlotRecord {
    slot: GlobalSlot,
    previous: Option<Binding>,
    installed: Binding,
}

impl Rebinder {
    pub fn new(options: RebinderOptions) -> Self {
        Self { options }
    }

    pub fn strict() -> Self {
        Self::new(RebinderOptions {
            strict: true,
            ..RebinderOptions::default()
        })
    }

    /// Replace the ambient slots of `globals` with session-routed bindings.
    ///
    /// Query slots must be replaceable; a sealed handle slot is skipped with a
    /// warning unless the rebinder is strict. On failure every slot already
    /// replaced is put back before returning.
    pub fn install<'g>(
        &self,
        globals: &'g AmbientGlobals,
        registry: Arc<SessionRegistry>,
    ) -> Result<Installation<'g>> {
        let mut installation = Installation {
            globals,
            records: Vec::new(),
            warnings: Vec::new(),
            active: true,
        };

        let mut slots = vec![GlobalSlot::Element, GlobalSlot::Elements, GlobalSlot::Driver];
        if self.options.sub_handles && registry.is_multiremote() {
            slots.extend(registry.names().cloned().map(GlobalSlot::SubHandle));
        }

        for slot in slots {
            let previous = globals.get(&slot);
            let binding = match &slot {
                GlobalSlot::SubHandle(name) => {
                    Binding::Native(Arc::clone(registry.get(name.as_str())?.driver()))
                }
                _ => Binding::Routed(Arc::new(RoutedDriver::new(
                    Arc::clone(&registry),
                    previous.clone(),
                ))),
            };

            match globals.define(slot.clone(), binding.clone()) {
                Ok(()) => installation.records.push(SlotRecord {
                    slot,
                    previous,
                    installed: binding,
                }),
                Err(e) if slot.is_query() || self.options.strict => {
                    installation.rollback();
                    return Err(SessionError::RebinderInstall(format!("{}: {}", slot, e)));
                }
                Err(e) => {
                    let warning = RebinderWarning {
                        slot,
                        message: e.to_string(),
                    };
                    log::warn!("rebinder install continuing: {}", warning);
                    installation.warnings.push(warning);
                }
            }
        }

        log::debug!(
            "rebinder installed on {} slot(s) ({:?} mode, {} warning(s))",
            installation.records.len(),
            registry.mode(),
            installation.warnings.len()
        );
        Ok(installation)
    }
}

/// Record of one rebinder install. Uninstalling (or dropping) it restores
/// every touched slot to its exact prior state.
#[must_use = "dropping an Installation immediately restores the previous bindings"]
pub struct Installation<'g> {
    globals: &'g AmbientGlobals,
    records: Vec<SlotRecord>,
    warnings: Vec<RebinderWarning>,
    active: bool,
}

impl<'g> Installation<'g> {
    /// Slots that were replaced, in install order
    pub fn slots(&self) -> Vec<GlobalSlot> {
        self.records.iter().map(|r| r.slot.clone()).collect()
    }

    pub fn warnings(&self) -> &[RebinderWarning] {
        &self.warnings
    }

    /// Binding installed into `slot`, if this install replaced it
    pub fn installed(&self, slot: &GlobalSlot) -> Option<&Binding> {
        self.records
            .iter()
            .find(|r| &r.slot == slot)
            .map(|r| &r.installed)
    }

    /// Restore every replaced slot: the previous binding if there was one,
    /// otherwise remove the slot entirely
    pub fn uninstall(mut self) {
        self.rollback();
        log::debug!("rebinder uninstalled");
    }

    fn rollback(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        for record in self.records.drain(..).rev() {
            self.globals.restore(&record.slot, record.previous);
        }
    }
}

impl Drop for Installation<'_> {
    fn drop(&mut self) {
        if self.active {
            log::warn!("rebinder installation dropped without uninstall, restoring bindings");
            self.rollback();
        }
    }
}

impl fmt::Debug for Installation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Installation")
            .field("slots", &self.slots())
            .field("warnings", &self.warnings)
            .field("active", &self.active)
            .finish()
    }
}
