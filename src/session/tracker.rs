//! Active-Session Tracker
//!
//! The active session is stored in a tokio task-local, not in a shared global.
//! `run_as` attaches the binding to the body future itself, so it is swapped
//! in and out around every poll. Flows that interleave on one task (see
//! `parallel`) each observe only their own binding, and nesting restores the
//! outer binding when the inner scope finishes, errors, or unwinds.
//!
//! The binding belongs to the future, not to the runtime: a future handed to
//! `tokio::spawn` from inside a flow starts unbound and sees `NoSessionBound`.
//! Wrap it with [`inherit`] to carry the caller's session across the spawn.

use super::registry::{SessionName, SessionRegistry};
use crate::error::{Result, SessionError};
use std::future::Future;

tokio::task_local! {
    static ACTIVE_SESSION: SessionName;
}

/// Session bound to the calling flow
pub fn current() -> Result<SessionName> {
    ACTIVE_SESSION
        .try_with(SessionName::clone)
        .map_err(|_| SessionError::NoSessionBound)
}

/// Like `current`, but `None` outside of any scope
pub fn try_current() -> Option<SessionName> {
    ACTIVE_SESSION.try_with(SessionName::clone).ok()
}

/// Run `body` with `name` as the active session.
///
/// Fails with `UnknownSession` before polling `body` if `name` is not
/// registered. Otherwise returns whatever `body` returns.
pub async fn run_as<F, T, E>(
    registry: &SessionRegistry,
    name: &str,
    body: F,
) -> std::result::Result<T, E>
where
    F: Future<Output = std::result::Result<T, E>>,
    E: From<SessionError>,
{
    let descriptor = registry.get(name)?;
    scoped(descriptor.name().clone(), body).await
}

/// Synchronous counterpart of `run_as`
pub fn run_as_sync<F, R>(registry: &SessionRegistry, name: &str, body: F) -> Result<R>
where
    F: FnOnce() -> R,
{
    let descriptor = registry.get(name)?;
    let name = descriptor.name().clone();
    log::trace!("enter session scope {}", name);
    let result = ACTIVE_SESSION.sync_scope(name.clone(), body);
    log::trace!("exit session scope {}", name);
    Ok(result)
}

/// Capture the calling flow's session (if any) and bind it for `body`.
///
/// ```ignore
/// tokio::spawn(tracker::inherit(async move { ambient::element("#typing").await }));
/// ```
pub fn inherit<F>(body: F) -> impl Future<Output = F::Output>
where
    F: Future,
{
    let name = try_current();
    async move {
        match name {
            Some(name) => scoped(name, body).await,
            None => body.await,
        }
    }
}

/// Bind `name` for `body` without checking the registry
pub(crate) async fn scoped<F>(name: SessionName, body: F) -> F::Output
where
    F: Future,
{
    log::trace!("enter session scope {}", name);
    let label = name.clone();
    let output = ACTIVE_SESSION.scope(name, body).await;
    log::trace!("exit session scope {}", label);
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::SimulatedSession;
    use futures::FutureExt;
    use std::panic::AssertUnwindSafe;
    use std::sync::Arc;

    fn registry() -> SessionRegistry {
        let mut registry = SessionRegistry::multiremote();
        for name in ["A", "B"] {
            registry
                .register(name, Arc::new(SimulatedSession::new(name)))
                .unwrap();
        }
        registry
    }

    #[tokio::test]
    async fn test_unbound_outside_scope() {
        assert!(matches!(current(), Err(SessionError::NoSessionBound)));
        assert!(try_current().is_none());
    }

    #[tokio::test]
    async fn test_run_as_binds_and_restores() {
        let registry = registry();
        let seen = run_as(&registry, "A", async { current() }).await.unwrap();
        assert_eq!(seen, "A");
        assert!(try_current().is_none());
    }

    #[tokio::test]
    async fn test_nested_scopes_restore_outer() {
        let registry = registry();
        let (inner, outer) = run_as(&registry, "A", async {
            let inner = run_as(&registry, "B", async { current() }).await?;
            Ok::<_, SessionError>((inner, current()?))
        })
        .await
        .unwrap();

        assert_eq!(inner, "B");
        assert_eq!(outer, "A");
        assert!(try_current().is_none());
    }

    #[tokio::test]
    async fn test_unknown_session_skips_body() {
        let registry = registry();
        let mut ran = false;
        let result: Result<()> = run_as(&registry, "Z", async {
            ran = true;
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(SessionError::UnknownSession(name)) if name == "Z"));
        assert!(!ran);
    }

    #[tokio::test]
    async fn test_error_propagates_unchanged_and_restores() {
        let registry = registry();
        let result = run_as(&registry, "A", async {
            let inner: anyhow::Result<()> =
                run_as(&registry, "B", async { anyhow::bail!("composer missing") }).await;
            assert_eq!(current()?, "A");
            inner
        })
        .await;

        assert_eq!(result.unwrap_err().to_string(), "composer missing");
    }

    #[tokio::test]
    async fn test_panic_in_body_restores_outer() {
        let registry = registry();
        run_as(&registry, "A", async {
            let caught = AssertUnwindSafe(run_as(&registry, "B", async {
                if current()? == "B" {
                    panic!("flow blew up");
                }
                Ok::<(), SessionError>(())
            }))
            .catch_unwind()
            .await;
            assert!(caught.is_err());
            assert_eq!(current()?, "A");
            Ok::<(), SessionError>(())
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_spawned_future_needs_inherit() {
        let registry = registry();
        let (plain, inherited) = run_as(&registry, "B", async {
            let plain = tokio::spawn(async { current() }).await.unwrap();
            let inherited = tokio::spawn(inherit(async { current() })).await.unwrap();
            Ok::<_, SessionError>((plain, inherited))
        })
        .await
        .unwrap();

        assert!(matches!(plain, Err(SessionError::NoSessionBound)));
        assert_eq!(inherited.unwrap(), "B");

        // Outside any scope inherit is a no-op
        assert!(inherit(async { try_current() }).await.is_none());
    }

    #[test]
    fn test_run_as_sync() {
        let registry = registry();
        let seen = run_as_sync(&registry, "B", || current().unwrap()).unwrap();
        assert_eq!(seen, "B");
        assert!(try_current().is_none());
        assert!(matches!(
            run_as_sync(&registry, "Z", || ()),
            Err(SessionError::UnknownSession(_))
        ));
    }
}
