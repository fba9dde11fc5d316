//! Retrieval through a script-executing browser.
//!
//! The crawler only needs `render(url, wait, timeout) -> body`. Whatever the
//! browser does to honor the wait is the [`Renderer`]'s business, the fetcher
//! re-checks the condition on the returned body and reports a page that is
//! still not ready as [`FetchStatus::Timeout`].

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use tokio::process::Command;

use crate::fetch::{Fetch, FetchResult, FetchStatus, TransportKind};
use crate::planner::QuerySpec;

/// Recognizes a page whose items are present
#[derive(Clone)]
pub struct WaitCondition {
    description: String,
    check: Arc<dyn Fn(&str) -> bool + Send + Sync>,
}

impl WaitCondition {
    pub fn new<F>(description: impl Into<String>, check: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self {
            description: description.into(),
            check: Arc::new(check),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_met(&self, page: &str) -> bool {
        (self.check)(page)
    }
}

impl fmt::Debug for WaitCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaitCondition")
            .field("description", &self.description)
            .finish()
    }
}

#[async_trait]
pub trait Renderer: Send + Sync {
    /// Makes sure the backend can render at all
    async fn launch(&self) -> anyhow::Result<()>;

    /// `wait` is a hint, a renderer may ignore it and spend its whole `timeout`
    /// instead. The returned body is checked against `wait` again by
    /// [`RenderedFetcher`], so an ignored hint only costs time.
    async fn render(&self, url: &str, wait: &WaitCondition, timeout: Duration)
        -> anyhow::Result<String>;
}

#[derive(Debug)]
pub struct RenderedFetcher<R> {
    renderer: R,
    wait: WaitCondition,
    timeout: Duration,
    wait_budget: Duration,
}

impl<R: Renderer> RenderedFetcher<R> {
    pub fn new(renderer: R, wait: WaitCondition, timeout: Duration, wait_budget: Duration) -> Self {
        Self {
            renderer,
            wait,
            timeout,
            wait_budget,
        }
    }

    async fn retrieve(&self, url: &str) -> Result<String, FetchStatus> {
        let rendering = self.renderer.render(url, &self.wait, self.wait_budget);
        let page = match tokio::time::timeout(self.timeout + self.wait_budget, rendering).await {
            Err(_) => return Err(FetchStatus::Timeout),
            Ok(Err(e)) => {
                log::debug!("Couldn't render {url} got: {e:#}");
                return Err(FetchStatus::TransportError(TransportKind::Render));
            }
            Ok(Ok(page)) => page,
        };

        if self.wait.is_met(&page) {
            Ok(page)
        } else {
            log::warn!(
                "Page not ready after {:?}, no match for {}",
                self.wait_budget,
                self.wait.description()
            );
            Err(FetchStatus::Timeout)
        }
    }
}

#[async_trait]
impl<R: Renderer> Fetch for RenderedFetcher<R> {
    async fn setup(&self) -> anyhow::Result<()> {
        self.renderer
            .launch()
            .await
            .context("Rendering backend could not be initialized")
    }

    async fn fetch(&self, query: &QuerySpec, url: &str) -> FetchResult {
        let started = Instant::now();
        match self.retrieve(url).await {
            Ok(page) => FetchResult::ok(query.clone(), page, started.elapsed()),
            Err(status) => FetchResult::failed(query.clone(), status, started.elapsed()),
        }
    }
}

/// Runs a headless Chromium once per page and keeps the dumped DOM
#[derive(Debug, Clone)]
pub struct ChromeRenderer {
    binary: PathBuf,
    user_agent: String,
}

impl ChromeRenderer {
    pub fn new(binary: impl Into<PathBuf>, user_agent: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            user_agent: user_agent.into(),
        }
    }
}

#[async_trait]
impl Renderer for ChromeRenderer {
    async fn launch(&self) -> anyhow::Result<()> {
        let out = Command::new(&self.binary)
            .arg("--version")
            .output()
            .await
            .with_context(|| format!("Couldn't run {}", self.binary.display()))?;
        if !out.status.success() {
            anyhow::bail!("{} exited with {}", self.binary.display(), out.status);
        }
        log::info!("Rendering with {}", String::from_utf8_lossy(&out.stdout).trim());
        Ok(())
    }

    async fn render(
        &self,
        url: &str,
        _wait: &WaitCondition,
        timeout: Duration,
    ) -> anyhow::Result<String> {
        let out = Command::new(&self.binary)
            .args([
                "--headless=new",
                "--no-sandbox",
                "--disable-gpu",
                "--disable-dev-shm-usage",
                "--disable-blink-features=AutomationControlled",
                "--window-size=1920,1080",
            ])
            .arg(format!("--user-agent={}", self.user_agent))
            .arg(format!("--virtual-time-budget={}", timeout.as_millis()))
            .arg("--dump-dom")
            .arg(url)
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Couldn't run {}", self.binary.display()))?;
        if !out.status.success() {
            anyhow::bail!(
                "{} exited with {} for {url}",
                self.binary.display(),
                out.status
            );
        }
        Ok(String::from_utf8_lossy(&out.stdout).into_owned())
    }
}
