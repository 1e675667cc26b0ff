//! Suite-level setup and teardown
//!
//! `MultiremoteContext` owns the registry for one test context, keeps the
//! rebinder installed for its lifetime, and closes every session on teardown.

use super::globals::AmbientGlobals;
use super::parallel::{parallel, parallel_report};
use super::rebinder::{Installation, Rebinder, RebinderWarning};
use super::registry::{SessionName, SessionRegistry};
use super::report::ParallelReport;
use super::tracker;
use crate::error::{Result, SessionError};
use futures::future::join_all;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;

pub struct MultiremoteContext<'g> {
    registry: Arc<SessionRegistry>,
    globals: &'g AmbientGlobals,
    installation: Option<Installation<'g>>,
}

impl<'g> MultiremoteContext<'g> {
    /// Install the default rebinder on `globals` for `registry`
    pub fn setup(globals: &'g AmbientGlobals, registry: SessionRegistry) -> Result<Self> {
        Self::setup_with(globals, registry, &Rebinder::default())
    }

    pub fn setup_with(
        globals: &'g AmbientGlobals,
        registry: SessionRegistry,
        rebinder: &Rebinder,
    ) -> Result<Self> {
        if registry.is_empty() {
            return Err(SessionError::Config("no sessions registered".to_string()));
        }
        let registry = Arc::new(registry);
        let installation = rebinder.install(globals, Arc::clone(&registry))?;
        log::info!(
            "multiremote context ready: {:?} mode, sessions [{}]",
            registry.mode(),
            registry
                .names()
                .map(SessionName::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(Self {
            registry,
            globals,
            installation: Some(installation),
        })
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn globals(&self) -> &'g AmbientGlobals {
        self.globals
    }

    /// Warnings raised while installing the rebinder
    pub fn warnings(&self) -> &[RebinderWarning] {
        self.installation
            .as_ref()
            .map(|installation| installation.warnings())
            .unwrap_or_default()
    }

    pub async fn run_as<F, T, E>(&self, name: &str, body: F) -> std::result::Result<T, E>
    where
        F: Future<Output = std::result::Result<T, E>>,
        E: From<SessionError>,
    {
        tracker::run_as(&self.registry, name, body).await
    }

    pub async fn parallel<I, S, F, T, E>(&self, flows: I) -> std::result::Result<Vec<T>, E>
    where
        I: IntoIterator<Item = (S, F)>,
        S: Into<SessionName>,
        F: Future<Output = std::result::Result<T, E>>,
        E: From<SessionError>,
    {
        parallel(&self.registry, flows).await
    }

    pub async fn parallel_report<I, S, F, T, E>(&self, flows: I) -> ParallelReport
    where
        I: IntoIterator<Item = (S, F)>,
        S: Into<SessionName>,
        F: Future<Output = std::result::Result<T, E>>,
        T: Serialize,
        E: From<SessionError> + std::fmt::Display,
    {
        parallel_report(&self.registry, flows).await
    }

    /// Uninstall the rebinder, then close every session.
    ///
    /// All sessions are closed even if some fail; the first failure is returned.
    pub async fn teardown(mut self) -> Result<()> {
        if let Some(installation) = self.installation.take() {
            installation.uninstall();
        }

        let closes = self.registry.drivers().map(|driver| async move {
            let result = driver.close().await;
            if let Err(e) = &result {
                log::warn!("[{}] close failed: {}", driver.session(), e);
            }
            result
        });

        join_all(closes).await.into_iter().collect::<Result<Vec<()>>>()?;
        log::info!("multiremote context torn down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{SessionDriver, SimulatedSession};
    use crate::session::{GlobalSlot, DRIVER_A, DRIVER_B};

    #[tokio::test]
    async fn test_setup_parallel_teardown() {
        let a = Arc::new(SimulatedSession::new(DRIVER_A).with_element("#status", "online"));
        let b = Arc::new(SimulatedSession::new(DRIVER_B).with_element("#status", "away"));
        let mut registry = SessionRegistry::multiremote();
        registry.register(DRIVER_A, a.clone()).unwrap();
        registry.register(DRIVER_B, b.clone()).unwrap();

        let globals = AmbientGlobals::new();
        let context = MultiremoteContext::setup(&globals, registry).unwrap();
        assert!(context.warnings().is_empty());

        async fn status(globals: &AmbientGlobals) -> Result<String> {
            globals.element("#status").await?.text().await
        }

        let statuses = context
            .parallel([(DRIVER_A, status(&globals)), (DRIVER_B, status(&globals))])
            .await
            .unwrap();
        assert_eq!(statuses, vec!["online", "away"]);

        context.teardown().await.unwrap();
        assert!(a.is_closed());
        assert!(b.is_closed());
        assert!(!globals.is_defined(&GlobalSlot::Element));
    }

    #[test]
    fn test_empty_registry_rejected() {
        let globals = AmbientGlobals::new();
        let result = MultiremoteContext::setup(&globals, SessionRegistry::multiremote());
        assert!(matches!(result, Err(SessionError::Config(_))));
    }

    #[tokio::test]
    async fn test_teardown_reports_close_failure() {
        let a = Arc::new(SimulatedSession::new(DRIVER_A));
        a.close().await.unwrap();
        let b = Arc::new(SimulatedSession::new(DRIVER_B));

        let registry = SessionRegistry::multiremote()
            .with_session(DRIVER_A, a)
            .unwrap()
            .with_session(DRIVER_B, b.clone())
            .unwrap();

        let globals = AmbientGlobals::new();
        let context = MultiremoteContext::setup(&globals, registry).unwrap();
        let result = context.teardown().await;

        assert!(matches!(result, Err(SessionError::SessionClosed(name)) if name == DRIVER_A));
        assert!(b.is_closed());
    }
}
