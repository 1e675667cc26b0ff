//! Suite configuration
//!
//! A suite file lists one capability profile per session:
//!
//! ```json
//! {
//!   "sessions": [
//!     { "name": "driverA", "headless": true, "start_url": "https://mezon.ai" },
//!     { "name": "driverB", "debug_port": 9222 }
//!   ]
//! }
//! ```

use crate::browser::chrome::is_ci;
use crate::browser::{ChromeSession, ConnectionMode, SessionDriver};
use crate::error::{Result, SessionError};
use crate::session::{SessionName, SessionRegistry, DRIVER_NAMES};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

/// How to start one session's browser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityProfile {
    pub name: SessionName,

    #[serde(default)]
    pub headless: bool,

    #[serde(default)]
    pub no_sandbox: bool,

    /// Explicit Chrome executable; auto-downloaded when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chrome_path: Option<String>,

    /// Attach to an already running Chrome instead of launching one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_port: Option<u16>,

    /// Page to open right after launch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_url: Option<String>,
}

impl CapabilityProfile {
    pub fn new(name: impl Into<SessionName>) -> Self {
        Self {
            name: name.into(),
            headless: false,
            no_sandbox: false,
            chrome_path: None,
            debug_port: None,
            start_url: None,
        }
    }

    pub fn connection_mode(&self) -> ConnectionMode {
        match self.debug_port {
            Some(port) => ConnectionMode::DebugPort(port),
            None => ConnectionMode::Sandboxed {
                chrome_path: self.chrome_path.clone(),
                no_sandbox: self.no_sandbox,
                headless: self.headless,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteConfig {
    pub sessions: Vec<CapabilityProfile>,
}

impl SuiteConfig {
    /// `count` profiles named driverA.. with CI auto-detection
    /// (headless and no-sandbox under CI)
    pub fn auto(count: usize) -> Result<Self> {
        if count == 0 || count > DRIVER_NAMES.len() {
            return Err(SessionError::Config(format!(
                "session count must be between 1 and {}, got {}",
                DRIVER_NAMES.len(),
                count
            )));
        }
        let ci = is_ci();
        let sessions = DRIVER_NAMES[..count]
            .iter()
            .map(|name| CapabilityProfile {
                headless: ci,
                no_sandbox: ci,
                ..CapabilityProfile::new(*name)
            })
            .collect();
        Ok(Self { sessions })
    }

    /// Load a suite config from a JSON file
    pub async fn from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            SessionError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: SuiteConfig = serde_json::from_str(json)
            .map_err(|e| SessionError::Config(format!("Invalid suite config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sessions.is_empty() {
            return Err(SessionError::Config(
                "Suite must declare at least one session".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for (i, profile) in self.sessions.iter().enumerate() {
            if profile.name.as_str().is_empty() {
                return Err(SessionError::Config(format!(
                    "Session {} has an empty name",
                    i + 1
                )));
            }
            if !seen.insert(profile.name.as_str()) {
                return Err(SessionError::Config(format!(
                    "Session {} is declared more than once",
                    profile.name
                )));
            }
        }

        Ok(())
    }

    pub fn is_multiremote(&self) -> bool {
        self.sessions.len() > 1
    }
}

/// Launch one Chrome per profile and register them.
///
/// A single profile yields a single-remote registry. If any launch fails the
/// browsers that did start are closed before the error is returned.
pub async fn launch_registry(config: &SuiteConfig) -> Result<SessionRegistry> {
    config.validate()?;

    let launches = config.sessions.iter().map(|profile| async move {
        let session = ChromeSession::new(profile.name.clone(), profile.connection_mode()).await?;
        if let Some(url) = &profile.start_url {
            session.navigate(url).await?;
        }
        Ok::<_, SessionError>(Arc::new(session) as Arc<dyn SessionDriver>)
    });

    let mut drivers = Vec::with_capacity(config.sessions.len());
    let mut first_error = None;
    for launched in join_all(launches).await {
        match launched {
            Ok(driver) => drivers.push(driver),
            Err(e) => {
                log::error!("session launch failed: {}", e);
                first_error.get_or_insert(e);
            }
        }
    }

    if let Some(e) = first_error {
        for driver in &drivers {
            let _ = driver.close().await;
        }
        return Err(e);
    }

    build_registry(config.is_multiremote(), drivers)
}

/// Register already-built drivers under their own session names
pub fn build_registry(
    multiremote: bool,
    drivers: Vec<Arc<dyn SessionDriver>>,
) -> Result<SessionRegistry> {
    if !multiremote {
        let mut drivers = drivers.into_iter();
        return match (drivers.next(), drivers.next()) {
            (Some(driver), None) => Ok(SessionRegistry::single(driver)),
            _ => Err(SessionError::Config(
                "single-remote mode needs exactly one session".to_string(),
            )),
        };
    }

    let mut registry = SessionRegistry::multiremote();
    for driver in drivers {
        let name = driver.session().clone();
        registry.register(name, driver)?;
    }
    Ok(registry)
}
