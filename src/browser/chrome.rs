// spider_chrome re-exports chromiumoxide API
use super::{normalize_url, ElementHandle, SessionDriver};
use crate::error::{Result, SessionError};
use crate::session::SessionName;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide_fetcher::{BrowserFetcher, BrowserFetcherOptions};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

const LAUNCH_HINT: &str = "Chrome not found. You can:\n\
     - Install Chrome: https://www.google.com/chrome/\n\
     - Ubuntu/Debian: sudo apt install chromium-browser\n\
     - macOS: brew install --cask google-chrome\n\
     - Or set chrome_path in the suite config\n\
     - Linux sandbox issue? Set no_sandbox: true";

/// A Chrome browser bound to one named session
pub struct ChromeSession {
    name: SessionName,
    browser: Browser,
    temp_dir: Option<PathBuf>,
    closed: AtomicBool,
}

/// Connection mode for Chrome browser
#[derive(Debug, Clone)]
pub enum ConnectionMode {
    /// Sandboxed mode - launches Chrome using system installation
    Sandboxed {
        chrome_path: Option<String>,
        no_sandbox: bool,
        headless: bool,
    },
    /// Advanced mode - connects to existing Chrome on debug port
    DebugPort(u16),
}

/// Returns true when running under a known CI provider
pub fn is_ci() -> bool {
    std::env::var("CI").is_ok()
        || std::env::var("GITHUB_ACTIONS").is_ok()
        || std::env::var("GITLAB_CI").is_ok()
        || std::env::var("JENKINS_HOME").is_ok()
        || std::env::var("CIRCLECI").is_ok()
}

impl ChromeSession {
    /// Create a new session with the specified connection mode
    pub async fn new(name: impl Into<SessionName>, mode: ConnectionMode) -> Result<Self> {
        let name = name.into();
        let (browser, temp_dir) = match mode {
            ConnectionMode::Sandboxed {
                chrome_path,
                no_sandbox,
                headless,
            } => {
                // Every session gets its own profile so logins never leak between users
                let unique_id = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_nanos();
                let temp_dir = std::env::temp_dir()
                    .join(format!("mezon-multiremote-{}-{}", name, unique_id));
                std::fs::create_dir_all(&temp_dir).map_err(|e| {
                    SessionError::LaunchFailed(format!("Failed to create temp directory: {}", e))
                })?;

                let mut config = if headless {
                    BrowserConfig::builder()
                } else {
                    BrowserConfig::builder().with_head()
                };

                config = config.user_data_dir(&temp_dir);

                if no_sandbox {
                    config = config.arg("--no-sandbox");
                }

                if let Some(path) = chrome_path {
                    config = config.chrome_executable(path);
                } else {
                    match Self::ensure_chrome_installed().await {
                        Ok(path) => {
                            config = config.chrome_executable(path);
                        }
                        Err(e) => {
                            log::warn!("Auto-download failed ({}), trying system Chrome", e);
                        }
                    }
                }

                let config = config
                    .build()
                    .map_err(|e| SessionError::LaunchFailed(format!("{}.\n\n{}", e, LAUNCH_HINT)))?;

                let (browser, mut handler) = Browser::launch(config)
                    .await
                    .map_err(|e| SessionError::LaunchFailed(format!("{}.\n\n{}", e, LAUNCH_HINT)))?;

                tokio::spawn(async move { while handler.next().await.is_some() {} });

                log::info!("[{}] Chrome launched (headless: {})", name, headless);
                (browser, Some(temp_dir))
            }
            ConnectionMode::DebugPort(port) => {
                let url = format!("http://localhost:{}", port);
                let (browser, mut handler) = Browser::connect(&url).await.map_err(|e| {
                    SessionError::ConnectionFailed(format!(
                        "Failed to connect to Chrome on port {}. \
                             Make sure Chrome is running with --remote-debugging-port={}: {}",
                        port, port, e
                    ))
                })?;

                tokio::spawn(async move { while handler.next().await.is_some() {} });

                log::info!("[{}] attached to Chrome on port {}", name, port);
                (browser, None)
            }
        };

        Ok(Self {
            name,
            browser,
            temp_dir,
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SessionError::SessionClosed(self.name.to_string()));
        }
        Ok(())
    }

    /// Helper method to get the current active page, excluding Chrome's new-tab-page
    async fn get_active_page(&self) -> Result<chromiumoxide::page::Page> {
        self.ensure_open()?;
        let pages = self.browser.pages().await?;

        for page in pages.iter() {
            if let Ok(Some(url)) = page.url().await {
                if !url.starts_with("chrome://") {
                    return Ok(page.clone());
                }
            }
        }

        if let Some(page) = pages.last() {
            return Ok(page.clone());
        }

        self.browser
            .new_page("about:blank")
            .await
            .map_err(|e| SessionError::Other(format!("Failed to create page: {}", e)))
    }

    /// Ensure Chrome is installed, downloading if necessary
    async fn ensure_chrome_installed() -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| SessionError::Other("Cannot determine cache directory".to_string()))?
            .join("mezon-multiremote")
            .join("chrome");

        tokio::fs::create_dir_all(&cache_dir)
            .await
            .map_err(|e| SessionError::Other(format!("Failed to create cache dir: {}", e)))?;

        let marker = cache_dir.join(".downloaded");
        if marker.exists() {
            if let Some(executable) = Self::find_chrome_in_cache(&cache_dir) {
                return Ok(executable);
            }
        }

        log::info!("Downloading Chrome for Testing (first time only, ~150MB)...");
        let fetcher = BrowserFetcher::new(
            BrowserFetcherOptions::builder()
                .with_path(&cache_dir)
                .build()
                .map_err(|e| SessionError::Other(format!("Fetcher config failed: {}", e)))?,
        );

        let info = fetcher
            .fetch()
            .await
            .map_err(|e| SessionError::Other(format!("Chrome download failed: {}", e)))?;

        tokio::fs::write(&marker, "downloaded")
            .await
            .map_err(|e| SessionError::Other(format!("Failed to write marker: {}", e)))?;

        Ok(info.executable_path)
    }

    fn find_chrome_in_cache(cache_dir: &Path) -> Option<PathBuf> {
        [
            "chrome",
            "chrome.exe",
            "Google Chrome.app/Contents/MacOS/Google Chrome",
            "chrome-linux/chrome",
            "chrome-mac/Chromium.app/Contents/MacOS/Chromium",
            "chrome-win/chrome.exe",
        ]
        .iter()
        .map(|p| cache_dir.join(p))
        .find(|p| p.exists())
    }
}

#[async_trait]
impl SessionDriver for ChromeSession {
    fn session(&self) -> &SessionName {
        &self.name
    }

    async fn find_element(&self, selector: &str) -> Result<Box<dyn ElementHandle>> {
        let page = self.get_active_page().await?;
        let element = page
            .find_element(selector)
            .await
            .map_err(|_e| SessionError::ElementNotFound(selector.to_string()))?;

        Ok(Box::new(ChromeElement {
            session: self.name.clone(),
            selector: selector.to_string(),
            element,
        }))
    }

    async fn find_elements(&self, selector: &str) -> Result<Vec<Box<dyn ElementHandle>>> {
        let page = self.get_active_page().await?;
        let elements = page
            .find_elements(selector)
            .await
            .map_err(|_e| SessionError::ElementNotFound(selector.to_string()))?;

        Ok(elements
            .into_iter()
            .map(|element| {
                Box::new(ChromeElement {
                    session: self.name.clone(),
                    selector: selector.to_string(),
                    element,
                }) as Box<dyn ElementHandle>
            })
            .collect())
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        use chromiumoxide::cdp::browser_protocol::page::{EventLoadEventFired, NavigateParams};

        let url = normalize_url(url);
        let page = self.get_active_page().await?;
        log::debug!("[{}] navigating to {}", self.name, url);

        // Subscribe before navigating so a fast load event is not missed
        let mut load_events = page.event_listener::<EventLoadEventFired>().await?;

        let params = NavigateParams::builder()
            .url(&url)
            .build()
            .map_err(|e| SessionError::NavigationFailed(format!("Invalid URL {}: {}", url, e)))?;

        let response = page.execute(params).await.map_err(|e| {
            if e.to_string().contains("oneshot canceled") {
                SessionError::NavigationFailed(
                    "Browser connection lost. The browser may have been closed or crashed."
                        .to_string(),
                )
            } else {
                SessionError::NavigationFailed(format!("Failed to navigate to {}: {}", url, e))
            }
        })?;

        if let Some(error_text) = response.result.error_text.clone() {
            return Err(SessionError::NavigationFailed(format!(
                "Navigation error: {}",
                error_text
            )));
        }

        match tokio::time::timeout(tokio::time::Duration::from_secs(30), load_events.next()).await
        {
            Ok(_) => {
                log::debug!("[{}] load event fired", self.name);
                Ok(())
            }
            Err(_) => Err(SessionError::NavigationFailed(format!(
                "Timed out after 30s waiting for {} to load",
                url
            ))),
        }
    }

    async fn current_url(&self) -> Result<String> {
        let page = self.get_active_page().await?;
        page.url()
            .await
            .map_err(|e| SessionError::Other(e.to_string()))?
            .ok_or(SessionError::NoPage)
    }

    async fn title(&self) -> Result<String> {
        let page = self.get_active_page().await?;
        page.get_title()
            .await
            .map_err(|e| SessionError::Other(e.to_string()))?
            .ok_or(SessionError::NoPage)
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(SessionError::SessionClosed(self.name.to_string()));
        }
        self.browser
            .close()
            .await
            .map_err(|e| SessionError::Other(e.to_string()))?;
        log::info!("[{}] Chrome closed", self.name);
        Ok(())
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        if let Some(temp_dir) = &self.temp_dir {
            if temp_dir.exists() {
                let _ = std::fs::remove_dir_all(temp_dir);
            }
        }
    }
}

struct ChromeElement {
    session: SessionName,
    selector: String,
    element: Element,
}

#[async_trait]
impl ElementHandle for ChromeElement {
    fn session(&self) -> &SessionName {
        &self.session
    }

    fn selector(&self) -> &str {
        &self.selector
    }

    async fn text(&self) -> Result<String> {
        self.element
            .inner_text()
            .await
            .map_err(|_e| SessionError::ElementNotFound(self.selector.clone()))?
            .ok_or_else(|| SessionError::ElementNotFound(self.selector.clone()))
    }

    async fn click(&self) -> Result<()> {
        self.element.click().await?;
        Ok(())
    }

    async fn type_text(&self, text: &str) -> Result<()> {
        self.element.click().await?;
        self.element.type_str(text).await?;
        Ok(())
    }
}
