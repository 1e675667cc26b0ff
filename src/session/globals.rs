//! Ambient bindings
//!
//! `AmbientGlobals` is the table test code resolves "the current driver"
//! through. `AmbientGlobals::process()` backs the free accessors in
//! `session::ambient`; fixtures that want isolation create their own
//! instance with `AmbientGlobals::new()` and pass it around.

use super::rebinder::RoutedDriver;
use super::registry::SessionName;
use crate::browser::{ElementHandle, SessionDriver};
use crate::error::{Result, SessionError};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

static PROCESS_GLOBALS: OnceLock<AmbientGlobals> = OnceLock::new();

/// A named ambient binding
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GlobalSlot {
    /// Single-element query (`$`)
    Element,
    /// Multi-element query (`$$`)
    Elements,
    /// Bare driver handle (`driver`)
    Driver,
    /// Named child accessor of the driver handle (`driver.driverA`)
    SubHandle(SessionName),
}

impl GlobalSlot {
    /// Query slots are replaced by plain assignment, handle slots by redefinition
    pub fn is_query(&self) -> bool {
        matches!(self, GlobalSlot::Element | GlobalSlot::Elements)
    }
}

impl fmt::Display for GlobalSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GlobalSlot::Element => f.write_str("$"),
            GlobalSlot::Elements => f.write_str("$$"),
            GlobalSlot::Driver => f.write_str("driver"),
            GlobalSlot::SubHandle(name) => write!(f, "driver.{}", name),
        }
    }
}

/// What a slot currently points at
#[derive(Clone)]
pub enum Binding {
    /// A concrete session driver
    Native(Arc<dyn SessionDriver>),
    /// A router that picks the driver per call
    Routed(Arc<RoutedDriver>),
}

impl Binding {
    pub fn native(driver: Arc<dyn SessionDriver>) -> Self {
        Binding::Native(driver)
    }

    /// Driver this binding points at for the calling flow
    pub fn resolve(&self) -> Result<Arc<dyn SessionDriver>> {
        match self {
            Binding::Native(driver) => Ok(Arc::clone(driver)),
            Binding::Routed(router) => router.resolve(),
        }
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &Binding) -> bool {
        match (self, other) {
            (Binding::Native(a), Binding::Native(b)) => {
                std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            (Binding::Routed(a), Binding::Routed(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn is_routed(&self) -> bool {
        matches!(self, Binding::Routed(_))
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Native(driver) => f.debug_tuple("Native").field(driver.session()).finish(),
            Binding::Routed(_) => f.write_str("Routed"),
        }
    }
}

#[derive(Default)]
pub struct AmbientGlobals {
    slots: RwLock<HashMap<GlobalSlot, Binding>>,
    sealed: RwLock<HashSet<GlobalSlot>>,
}

impl AmbientGlobals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Globals with `$`, `$$` and `driver` bound to a single native handle,
    /// the state a test runner leaves behind before any rebinding
    pub fn with_native(driver: Arc<dyn SessionDriver>) -> Self {
        let globals = Self::new();
        globals.bind_native(driver);
        globals
    }

    /// The process-wide instance used by `session::ambient`
    pub fn process() -> &'static AmbientGlobals {
        PROCESS_GLOBALS.get_or_init(AmbientGlobals::new)
    }

    /// Bind the three top-level slots to `driver`, overwriting sealed slots too
    pub fn bind_native(&self, driver: Arc<dyn SessionDriver>) {
        let mut slots = write(&self.slots);
        for slot in [GlobalSlot::Element, GlobalSlot::Elements, GlobalSlot::Driver] {
            slots.insert(slot, Binding::Native(Arc::clone(&driver)));
        }
    }

    pub fn get(&self, slot: &GlobalSlot) -> Option<Binding> {
        read(&self.slots).get(slot).cloned()
    }

    pub fn binding(&self, slot: &GlobalSlot) -> Result<Binding> {
        self.get(slot)
            .ok_or_else(|| SessionError::SlotUndefined(slot.to_string()))
    }

    pub fn is_defined(&self, slot: &GlobalSlot) -> bool {
        read(&self.slots).contains_key(slot)
    }

    /// Define or replace `slot`. Fails on sealed slots.
    pub fn define(&self, slot: GlobalSlot, binding: Binding) -> Result<()> {
        if self.is_sealed(&slot) {
            return Err(SessionError::SlotSealed(slot.to_string()));
        }
        write(&self.slots).insert(slot, binding);
        Ok(())
    }

    /// Remove `slot`, returning what it held. Fails on sealed slots.
    pub fn remove(&self, slot: &GlobalSlot) -> Result<Option<Binding>> {
        if self.is_sealed(slot) {
            return Err(SessionError::SlotSealed(slot.to_string()));
        }
        Ok(write(&self.slots).remove(slot))
    }

    /// Put `slot` back to exactly `previous`, ignoring seals
    pub(crate) fn restore(&self, slot: &GlobalSlot, previous: Option<Binding>) {
        let mut slots = write(&self.slots);
        match previous {
            Some(binding) => {
                slots.insert(slot.clone(), binding);
            }
            None => {
                slots.remove(slot);
            }
        }
    }

    /// Forbid redefining `slot`
    pub fn seal(&self, slot: GlobalSlot) {
        write(&self.sealed).insert(slot);
    }

    pub fn unseal(&self, slot: &GlobalSlot) {
        write(&self.sealed).remove(slot);
    }

    pub fn is_sealed(&self, slot: &GlobalSlot) -> bool {
        read(&self.sealed).contains(slot)
    }

    /// Every slot currently defined
    pub fn defined_slots(&self) -> Vec<GlobalSlot> {
        read(&self.slots).keys().cloned().collect()
    }

    // ===== AMBIENT ACCESSORS =====

    /// `$(selector)`
    pub async fn element(&self, selector: &str) -> Result<Box<dyn ElementHandle>> {
        let driver = self.binding(&GlobalSlot::Element)?.resolve()?;
        driver.find_element(selector).await
    }

    /// `$$(selector)`
    pub async fn elements(&self, selector: &str) -> Result<Vec<Box<dyn ElementHandle>>> {
        let driver = self.binding(&GlobalSlot::Elements)?.resolve()?;
        driver.find_elements(selector).await
    }

    /// `driver`
    pub fn driver(&self) -> Result<Arc<dyn SessionDriver>> {
        self.binding(&GlobalSlot::Driver)?.resolve()
    }

    /// `driver.<name>`
    pub fn sub_handle(&self, name: &str) -> Result<Arc<dyn SessionDriver>> {
        self.binding(&GlobalSlot::SubHandle(SessionName::from(name)))?
            .resolve()
    }
}

impl fmt::Debug for AmbientGlobals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AmbientGlobals")
            .field("slots", &*read(&self.slots))
            .field("sealed", &*read(&self.sealed))
            .finish()
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::SimulatedSession;

    #[tokio::test]
    async fn test_native_bindings() {
        let native: Arc<dyn SessionDriver> =
            Arc::new(SimulatedSession::new("driverA").with_element("#title", "Mezon"));
        let globals = AmbientGlobals::with_native(Arc::clone(&native));

        let element = globals.element("#title").await.unwrap();
        assert_eq!(element.text().await.unwrap(), "Mezon");
        assert_eq!(globals.elements("#title").await.unwrap().len(), 1);
        assert!(Binding::Native(native).ptr_eq(&globals.get(&GlobalSlot::Driver).unwrap()));
    }

    #[tokio::test]
    async fn test_undefined_slot() {
        let globals = AmbientGlobals::new();
        assert!(matches!(
            globals.element("#x").await,
            Err(SessionError::SlotUndefined(slot)) if slot == "$"
        ));
        assert!(globals.driver().is_err());
    }

    #[test]
    fn test_sealed_slot() {
        let globals = AmbientGlobals::new();
        let driver: Arc<dyn SessionDriver> = Arc::new(SimulatedSession::new("driverA"));
        globals.seal(GlobalSlot::Driver);

        let err = globals
            .define(GlobalSlot::Driver, Binding::native(Arc::clone(&driver)))
            .unwrap_err();
        assert!(matches!(err, SessionError::SlotSealed(slot) if slot == "driver"));
        assert!(!globals.is_defined(&GlobalSlot::Driver));

        globals.unseal(&GlobalSlot::Driver);
        globals
            .define(GlobalSlot::Driver, Binding::native(driver))
            .unwrap();
        assert!(globals.is_defined(&GlobalSlot::Driver));
        assert!(globals.remove(&GlobalSlot::Driver).unwrap().is_some());
    }

    #[test]
    fn test_slot_display() {
        assert_eq!(GlobalSlot::Elements.to_string(), "$$");
        assert_eq!(
            GlobalSlot::SubHandle(SessionName::from("driverB")).to_string(),
            "driver.driverB"
        );
        assert!(GlobalSlot::Element.is_query());
        assert!(!GlobalSlot::Driver.is_query());
    }
}
