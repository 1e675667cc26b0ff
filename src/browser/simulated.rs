//! In-memory session driver
//!
//! Holds a static "DOM" of selector -> texts and records every command it
//! receives, so orchestration code can be exercised without a browser.

use super::{normalize_url, ElementHandle, SessionDriver};
use crate::error::{Result, SessionError};
use crate::session::SessionName;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// A command received by a simulated session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulatedCommand {
    pub session: String,
    pub command: String,
    pub argument: String,
}

#[derive(Debug, Default)]
struct SimulatedState {
    url: Option<String>,
    history: Vec<String>,
    commands: Vec<SimulatedCommand>,
    typed: HashMap<String, String>,
    closed: bool,
}

pub struct SimulatedSession {
    name: SessionName,
    elements: HashMap<String, Vec<String>>,
    titles: HashMap<String, String>,
    latency: Option<Duration>,
    state: Arc<Mutex<SimulatedState>>,
}

impl SimulatedSession {
    pub fn new(name: impl Into<SessionName>) -> Self {
        Self {
            name: name.into(),
            elements: HashMap::new(),
            titles: HashMap::new(),
            latency: None,
            state: Arc::new(Mutex::new(SimulatedState::default())),
        }
    }

    /// Add an element matching `selector`. Repeated calls add more matches.
    pub fn with_element(mut self, selector: &str, text: &str) -> Self {
        self.elements
            .entry(selector.to_string())
            .or_default()
            .push(text.to_string());
        self
    }

    /// Title reported after navigating to `url`
    pub fn with_page(mut self, url: &str, title: &str) -> Self {
        self.titles.insert(normalize_url(url), title.to_string());
        self
    }

    /// Sleep this long in every command, giving the scheduler a suspension point
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Every command received so far, in order
    pub fn commands(&self) -> Vec<SimulatedCommand> {
        lock(&self.state).commands.clone()
    }

    /// URLs navigated to, in order
    pub fn history(&self) -> Vec<String> {
        lock(&self.state).history.clone()
    }

    /// Text typed into `selector`, concatenated
    pub fn typed_text(&self, selector: &str) -> Option<String> {
        lock(&self.state).typed.get(selector).cloned()
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }

    async fn record(&self, command: &str, argument: &str) -> Result<()> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        record(&self.state, &self.name, command, argument)
    }
}

fn lock(state: &Mutex<SimulatedState>) -> MutexGuard<'_, SimulatedState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn record(
    state: &Mutex<SimulatedState>,
    session: &SessionName,
    command: &str,
    argument: &str,
) -> Result<()> {
    let mut state = lock(state);
    if state.closed {
        return Err(SessionError::SessionClosed(session.to_string()));
    }
    state.commands.push(SimulatedCommand {
        session: session.to_string(),
        command: command.to_string(),
        argument: argument.to_string(),
    });
    Ok(())
}

#[async_trait]
impl SessionDriver for SimulatedSession {
    fn session(&self) -> &SessionName {
        &self.name
    }

    async fn find_element(&self, selector: &str) -> Result<Box<dyn ElementHandle>> {
        self.record("find_element", selector).await?;
        let text = self
            .elements
            .get(selector)
            .and_then(|texts| texts.first())
            .ok_or_else(|| SessionError::ElementNotFound(selector.to_string()))?;

        Ok(Box::new(SimulatedElement {
            session: self.name.clone(),
            selector: selector.to_string(),
            text: text.clone(),
            state: Arc::clone(&self.state),
        }))
    }

    async fn find_elements(&self, selector: &str) -> Result<Vec<Box<dyn ElementHandle>>> {
        self.record("find_elements", selector).await?;
        let texts = self.elements.get(selector).cloned().unwrap_or_default();

        Ok(texts
            .into_iter()
            .map(|text| {
                Box::new(SimulatedElement {
                    session: self.name.clone(),
                    selector: selector.to_string(),
                    text,
                    state: Arc::clone(&self.state),
                }) as Box<dyn ElementHandle>
            })
            .collect())
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        let url = normalize_url(url);
        self.record("navigate", &url).await?;
        let mut state = lock(&self.state);
        state.history.push(url.clone());
        state.url = Some(url);
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        self.record("current_url", "").await?;
        lock(&self.state).url.clone().ok_or(SessionError::NoPage)
    }

    async fn title(&self) -> Result<String> {
        self.record("title", "").await?;
        let url = lock(&self.state).url.clone().ok_or(SessionError::NoPage)?;
        Ok(self.titles.get(&url).cloned().unwrap_or(url))
    }

    async fn close(&self) -> Result<()> {
        self.record("close", "").await?;
        lock(&self.state).closed = true;
        Ok(())
    }
}

struct SimulatedElement {
    session: SessionName,
    selector: String,
    text: String,
    state: Arc<Mutex<SimulatedState>>,
}

#[async_trait]
impl ElementHandle for SimulatedElement {
    fn session(&self) -> &SessionName {
        &self.session
    }

    fn selector(&self) -> &str {
        &self.selector
    }

    async fn text(&self) -> Result<String> {
        Ok(self.text.clone())
    }

    async fn click(&self) -> Result<()> {
        record(&self.state, &self.session, "click", &self.selector)
    }

    async fn type_text(&self, text: &str) -> Result<()> {
        record(&self.state, &self.session, "type_text", &self.selector)?;
        lock(&self.state)
            .typed
            .entry(self.selector.clone())
            .or_default()
            .push_str(text);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_find_element_and_record() {
        let session = SimulatedSession::new("driverA").with_element("#inbox", "Inbox");

        let element = session.find_element("#inbox").await.unwrap();
        assert_eq!(element.text().await.unwrap(), "Inbox");
        assert_eq!(element.session().as_str(), "driverA");
        element.click().await.unwrap();

        let commands = session.commands();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0].command, "find_element");
        assert_eq!(commands[1].command, "click");
    }

    #[tokio::test]
    async fn test_missing_element() {
        let session = SimulatedSession::new("driverA");
        let result = session.find_element("#missing").await;
        assert!(matches!(result, Err(SessionError::ElementNotFound(_))));

        let all = session.find_elements("#missing").await.unwrap();
        assert!(all.is_empty());
    }

    #[tokio::test]
    async fn test_navigation_and_title() {
        let session = SimulatedSession::new("driverB").with_page("mezon.ai/chat", "Mezon Chat");

        assert!(matches!(session.title().await, Err(SessionError::NoPage)));

        session.navigate("mezon.ai/chat").await.unwrap();
        assert_eq!(session.current_url().await.unwrap(), "https://mezon.ai/chat");
        assert_eq!(session.title().await.unwrap(), "Mezon Chat");
        assert_eq!(session.history(), vec!["https://mezon.ai/chat".to_string()]);
    }

    #[tokio::test]
    async fn test_type_text_and_close() {
        let session = SimulatedSession::new("driverA").with_element("#composer", "");
        let composer = session.find_element("#composer").await.unwrap();
        composer.type_text("hello ").await.unwrap();
        composer.type_text("world").await.unwrap();
        assert_eq!(session.typed_text("#composer").as_deref(), Some("hello world"));

        session.close().await.unwrap();
        assert!(session.is_closed());
        assert!(matches!(
            session.navigate("about:blank").await,
            Err(SessionError::SessionClosed(_))
        ));
    }
}
