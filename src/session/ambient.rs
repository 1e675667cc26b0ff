//! Ambient accessors over the process-wide globals
//!
//! Test code calls these without naming a session. Inside `run_as` or
//! `parallel` they resolve to the flow's session once a rebinder is
//! installed on `AmbientGlobals::process()`.

use super::globals::AmbientGlobals;
use crate::browser::{ElementHandle, SessionDriver};
use crate::error::Result;
use std::sync::Arc;

/// `$(selector)`
pub async fn element(selector: &str) -> Result<Box<dyn ElementHandle>> {
    AmbientGlobals::process().element(selector).await
}

/// `$$(selector)`
pub async fn elements(selector: &str) -> Result<Vec<Box<dyn ElementHandle>>> {
    AmbientGlobals::process().elements(selector).await
}

/// `driver`
pub fn driver() -> Result<Arc<dyn SessionDriver>> {
    AmbientGlobals::process().driver()
}

/// `driver.<name>`
pub fn sub_handle(name: &str) -> Result<Arc<dyn SessionDriver>> {
    AmbientGlobals::process().sub_handle(name)
}
