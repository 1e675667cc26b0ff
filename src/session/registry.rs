//! Session Registry
//!
//! Fixed mapping of session name to driver for one multiremote test
//! context. Populated once during setup, then shared read-only behind an `Arc`.

use crate::browser::SessionDriver;
use crate::error::{Result, SessionError};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub const DRIVER_A: &str = "driverA";
pub const DRIVER_B: &str = "driverB";
pub const DRIVER_C: &str = "driverC";
pub const DRIVER_D: &str = "driverD";

/// Conventional session names, in order
pub const DRIVER_NAMES: [&str; 4] = [DRIVER_A, DRIVER_B, DRIVER_C, DRIVER_D];

/// Name a session is registered under (e.g. "driverA")
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionName(String);

impl SessionName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for SessionName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for SessionName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl From<&SessionName> for SessionName {
    fn from(name: &SessionName) -> Self {
        name.clone()
    }
}

impl PartialEq<str> for SessionName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for SessionName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Whether the native handle aggregates several sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteMode {
    Single,
    Multiremote,
}

/// A registered session: name plus the driver it owns
#[derive(Clone)]
pub struct SessionDescriptor {
    name: SessionName,
    driver: Arc<dyn SessionDriver>,
}

impl SessionDescriptor {
    pub fn name(&self) -> &SessionName {
        &self.name
    }

    pub fn driver(&self) -> &Arc<dyn SessionDriver> {
        &self.driver
    }
}

impl fmt::Debug for SessionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionDescriptor")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

pub struct SessionRegistry {
    mode: RemoteMode,
    sessions: BTreeMap<SessionName, SessionDescriptor>,
}

impl SessionRegistry {
    /// Registry wrapping a single native handle; ambient accessors bypass the tracker
    pub fn single(driver: Arc<dyn SessionDriver>) -> Self {
        let name = driver.session().clone();
        let mut sessions = BTreeMap::new();
        sessions.insert(name.clone(), SessionDescriptor { name, driver });
        Self {
            mode: RemoteMode::Single,
            sessions,
        }
    }

    /// Empty multiremote registry, to be filled with `register`
    pub fn multiremote() -> Self {
        Self {
            mode: RemoteMode::Multiremote,
            sessions: BTreeMap::new(),
        }
    }

    /// Register `driver` under `name`
    pub fn register(
        &mut self,
        name: impl Into<SessionName>,
        driver: Arc<dyn SessionDriver>,
    ) -> Result<()> {
        let name = name.into();
        if self.sessions.contains_key(&name) {
            return Err(SessionError::DuplicateSession(name.to_string()));
        }
        log::debug!("registered session {}", name);
        self.sessions
            .insert(name.clone(), SessionDescriptor { name, driver });
        Ok(())
    }

    /// Builder-style `register`
    pub fn with_session(
        mut self,
        name: impl Into<SessionName>,
        driver: Arc<dyn SessionDriver>,
    ) -> Result<Self> {
        self.register(name, driver)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Result<&SessionDescriptor> {
        self.sessions
            .get(name)
            .ok_or_else(|| SessionError::UnknownSession(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sessions.contains_key(name)
    }

    pub fn all(&self) -> &BTreeMap<SessionName, SessionDescriptor> {
        &self.sessions
    }

    pub fn names(&self) -> impl Iterator<Item = &SessionName> {
        self.sessions.keys()
    }

    pub fn drivers(&self) -> impl Iterator<Item = &Arc<dyn SessionDriver>> {
        self.sessions.values().map(|descriptor| &descriptor.driver)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn mode(&self) -> RemoteMode {
        self.mode
    }

    pub fn is_multiremote(&self) -> bool {
        self.mode == RemoteMode::Multiremote
    }

    /// The sole handle of a single-remote registry
    pub fn native(&self) -> Option<&Arc<dyn SessionDriver>> {
        match self.mode {
            RemoteMode::Single => self.drivers().next(),
            RemoteMode::Multiremote => None,
        }
    }
}

impl fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("mode", &self.mode)
            .field("sessions", &self.sessions.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::SimulatedSession;

    fn driver(name: &str) -> Arc<dyn SessionDriver> {
        Arc::new(SimulatedSession::new(name))
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = SessionRegistry::multiremote();
        registry.register(DRIVER_A, driver(DRIVER_A)).unwrap();
        registry.register(DRIVER_B, driver(DRIVER_B)).unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.is_multiremote());
        let descriptor = registry.get(DRIVER_B).unwrap();
        assert_eq!(descriptor.name(), &DRIVER_B);
        assert_eq!(descriptor.driver().session(), &DRIVER_B);
        assert_eq!(
            registry.names().map(|n| n.as_str()).collect::<Vec<_>>(),
            vec![DRIVER_A, DRIVER_B]
        );
        assert!(registry.native().is_none());
    }

    #[test]
    fn test_all_is_ordered_by_name() {
        let registry = SessionRegistry::multiremote()
            .with_session(DRIVER_C, driver(DRIVER_C))
            .unwrap()
            .with_session(DRIVER_A, driver(DRIVER_A))
            .unwrap()
            .with_session(DRIVER_B, driver(DRIVER_B))
            .unwrap();

        let all = registry.all();
        assert_eq!(
            all.keys().map(SessionName::as_str).collect::<Vec<_>>(),
            vec![DRIVER_A, DRIVER_B, DRIVER_C]
        );
        for (name, descriptor) in all {
            assert_eq!(descriptor.name(), name);
            assert_eq!(descriptor.driver().session(), name);
        }
    }

    #[test]
    fn test_duplicate_session_rejected() {
        let mut registry = SessionRegistry::multiremote();
        registry.register(DRIVER_A, driver(DRIVER_A)).unwrap();
        let err = registry.register(DRIVER_A, driver(DRIVER_A)).unwrap_err();
        assert!(matches!(err, SessionError::DuplicateSession(name) if name == DRIVER_A));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unknown_session() {
        let registry = SessionRegistry::multiremote();
        let err = registry.get("driverZ").unwrap_err();
        assert!(matches!(err, SessionError::UnknownSession(name) if name == "driverZ"));
        assert!(!registry.contains("driverZ"));
    }

    #[test]
    fn test_single_registry() {
        let registry = SessionRegistry::single(driver(DRIVER_A));
        assert_eq!(registry.mode(), RemoteMode::Single);
        assert!(!registry.is_multiremote());
        assert_eq!(registry.native().unwrap().session(), &DRIVER_A);
    }
}
