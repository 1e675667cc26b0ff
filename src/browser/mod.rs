//! Driver boundary
//!
//! The orchestration layer only talks to browsers through [`SessionDriver`]
//! and [`ElementHandle`]. `ChromeSession` drives a real Chrome over CDP,
//! `SimulatedSession` is an in-memory stand-in used for dry runs and tests.

pub mod chrome;
pub mod simulated;

use crate::error::Result;
use crate::session::SessionName;
use async_trait::async_trait;

pub use chrome::{ChromeSession, ConnectionMode};
pub use simulated::{SimulatedCommand, SimulatedSession};

/// A located element, owned by the session that found it
#[async_trait]
pub trait ElementHandle: Send + Sync {
    /// Session the element belongs to
    fn session(&self) -> &SessionName;

    /// Selector the element was located with
    fn selector(&self) -> &str;

    /// Visible text of the element
    async fn text(&self) -> Result<String>;

    async fn click(&self) -> Result<()>;

    async fn type_text(&self, text: &str) -> Result<()>;
}

/// One authenticated browser (or device) session
#[async_trait]
pub trait SessionDriver: Send + Sync {
    /// Name this driver is registered under
    fn session(&self) -> &SessionName;

    /// Find the first element matching `selector`
    async fn find_element(&self, selector: &str) -> Result<Box<dyn ElementHandle>>;

    /// Find every element matching `selector` (possibly none)
    async fn find_elements(&self, selector: &str) -> Result<Vec<Box<dyn ElementHandle>>>;

    async fn navigate(&self, url: &str) -> Result<()>;

    async fn current_url(&self) -> Result<String>;

    async fn title(&self) -> Result<String>;

    /// Close the underlying browser. Further calls fail with `SessionClosed`.
    async fn close(&self) -> Result<()>;
}

/// Normalize a URL, adding https:// if no scheme is given
pub fn normalize_url(url: &str) -> String {
    if !url.starts_with("http://")
        && !url.starts_with("https://")
        && !url.starts_with("file://")
        && !url.starts_with("about:")
        && !url.starts_with("data:")
    {
        format!("https://{}", url)
    } else {
        url.to_string()
    }
}
