use std::ffi::OsStr;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use headless_chrome::protocol::cdp::Emulation;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde::Deserialize;
use tracing::{debug, info, info_span, instrument};

/// Choose an option in a `<select>` control before reading the page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectFilter {
    /// CSS selector of the `<select>` element.
    pub selector: String,
    /// Option value or visible label to choose.
    pub option: String,
}

/// What to render and when the rendered page counts as ready.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderRequest {
    pub url: String,
    pub ready_selector: String,
    pub filter: Option<SelectFilter>,
}

/// Renders a page and hands back its HTML once it is ready to be read.
pub trait PageSource {
    fn render(&self, request: &RenderRequest) -> Result<String>;
}

/// Per-wait deadlines. Exceeding any of them fails the run.
#[derive(Clone, Copy, Debug)]
pub struct Deadlines {
    pub page_load: Duration,
    pub network_idle: Duration,
    pub element: Duration,
}

impl Default for Deadlines {
    fn default() -> Self {
        Self {
            page_load: Duration::from_secs(10),
            network_idle: Duration::from_secs(60),
            element: Duration::from_secs(30),
        }
    }
}

// The page counts as idle once nothing is in flight and no new resource entries appear for this long.
const QUIET_WINDOW: Duration = Duration::from_millis(500);
const POLL_INTERVAL: Duration = Duration::from_millis(100);

// Counts fetch and XHR requests the page starts from now on. Safe to install twice.
const REQUEST_HOOK: &str = "(() => { \
    if (window.__fixtureSyncPending !== undefined) return; \
    window.__fixtureSyncPending = 0; \
    performance.setResourceTimingBufferSize(100000); \
    const done = () => { window.__fixtureSyncPending -= 1; }; \
    const fetch0 = window.fetch; \
    if (fetch0) { \
        window.fetch = function (...args) { \
            window.__fixtureSyncPending += 1; \
            return fetch0.apply(this, args).finally(done); \
        }; \
    } \
    const send0 = XMLHttpRequest.prototype.send; \
    XMLHttpRequest.prototype.send = function (...args) { \
        window.__fixtureSyncPending += 1; \
        this.addEventListener('loadend', done, { once: true }); \
        return send0.apply(this, args); \
    }; \
})()";

const NETWORK_PROBE: &str = "JSON.stringify({ \
    ready: document.readyState === 'complete', \
    pending: window.__fixtureSyncPending || 0, \
    resources: performance.getEntriesByType('resource').length \
})";

/// One reading of the page's network activity.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct NetworkProbe {
    pub ready: bool,
    /// Requests started but not yet finished.
    pub pending: u32,
    /// Resource timing entries recorded so far.
    pub resources: u64,
}

/// Decides when a sequence of [`NetworkProbe`] readings counts as idle.
///
/// Idle means the document has loaded, no request is in flight, and the resource
/// count has not changed for the whole quiet window.
#[derive(Clone, Debug)]
pub struct IdleTracker {
    quiet_window: Duration,
    last_resources: Option<u64>,
    quiet_since: Option<Instant>,
}

impl IdleTracker {
    pub fn new(quiet_window: Duration) -> Self {
        Self { quiet_window, last_resources: None, quiet_since: None }
    }

    pub fn observe(&mut self, probe: &NetworkProbe, now: Instant) -> bool {
        if !probe.ready || probe.pending > 0 || self.last_resources != Some(probe.resources) {
            self.last_resources = Some(probe.resources);
            self.quiet_since = (probe.ready && probe.pending == 0).then_some(now);
            return false;
        }
        match self.quiet_since {
            Some(since) => now.duration_since(since) >= self.quiet_window,
            None => {
                self.quiet_since = Some(now);
                false
            }
        }
    }
}

/// Headless Chromium page source. A fresh browser is launched for each render.
#[derive(Clone, Debug)]
pub struct ChromePageSource {
    locale: String,
    timezone: String,
    deadlines: Deadlines,
}

impl ChromePageSource {
    pub fn new(locale: &str, timezone: &str, deadlines: Deadlines) -> Self {
        Self { locale: locale.to_string(), timezone: timezone.to_string(), deadlines }
    }

    fn launch(&self) -> Result<Browser> {
        let lang_arg = format!("--lang={}", self.locale);
        let options = LaunchOptions::default_builder()
            .headless(true)
            .args(vec![OsStr::new(&lang_arg)])
            .build()
            .map_err(|e| anyhow!("Invalid browser launch options: {}", e))?;
        Browser::new(options).context("Failed to launch headless browser")
    }

    fn prepare_tab(&self, tab: &Tab) -> Result<()> {
        tab.set_default_timeout(self.deadlines.page_load);
        tab.call_method(Emulation::SetTimezoneOverride { timezone_id: self.timezone.clone() })
            .context("Failed to set browser timezone")?;
        tab.call_method(Emulation::SetLocaleOverride { locale: Some(self.locale.clone()) })
            .context("Failed to set browser locale")?;
        Ok(())
    }
}

impl PageSource for ChromePageSource {
    #[instrument(level = "info", skip(self, request), fields(url = %request.url))]
    fn render(&self, request: &RenderRequest) -> Result<String> {
        let browser = self.launch()?;
        let tab = browser.new_tab().context("Failed to open browser tab")?;
        self.prepare_tab(&tab)?;

        info!("Opening fixtures page");
        {
            let _span = info_span!("navigate").entered();
            tab.navigate_to(&request.url)
                .and_then(|t| t.wait_until_navigated())
                .with_context(|| format!("Failed to load {}", request.url))?;
        }

        info!("Waiting for network to be idle");
        wait_for_network_settle(&tab, self.deadlines.network_idle)?;
        info!("Network idle, waiting for fixtures container");
        tab.wait_for_element_with_custom_timeout(&request.ready_selector, self.deadlines.element)
            .with_context(|| format!("Fixtures container {:?} never appeared", request.ready_selector))?;

        if let Some(filter) = &request.filter {
            info!(option = %filter.option, "Applying fixtures filter");
            apply_select_filter(&tab, filter)?;
            // The filter reloads the table asynchronously.
            wait_for_network_settle(&tab, self.deadlines.network_idle)?;
        }

        let html = tab.get_content().context("Failed to read rendered page")?;
        info!(bytes = html.len(), "Page rendered");
        Ok(html)
    }
}

fn wait_for_network_settle(tab: &Tab, timeout: Duration) -> Result<()> {
    tab.evaluate(REQUEST_HOOK, false).context("Failed to install request counter")?;
    let deadline = Instant::now() + timeout;
    let mut tracker = IdleTracker::new(QUIET_WINDOW);

    loop {
        let probe = read_network_probe(tab)?;
        let now = Instant::now();
        if tracker.observe(&probe, now) {
            debug!(resources = probe.resources, "Network settled");
            return Ok(());
        }
        if now >= deadline {
            bail!("Network did not go idle within {:?} ({} requests in flight)", timeout, probe.pending);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn read_network_probe(tab: &Tab) -> Result<NetworkProbe> {
    let raw = tab
        .evaluate(NETWORK_PROBE, false)
        .context("Failed to probe page network state")?
        .value
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();
    // A page that is still navigating may not answer; treat it as not ready.
    Ok(serde_json::from_str(&raw).unwrap_or_default())
}

/// Build the script that picks `filter.option` (by value or label) and fires a change event.
pub fn select_filter_script(filter: &SelectFilter) -> Result<String> {
    let selector = serde_json::to_string(&filter.selector)?;
    let option = serde_json::to_string(&filter.option)?;
    Ok(format!(
        "(() => {{ \
            const s = document.querySelector({selector}); \
            if (!s) return false; \
            const o = Array.from(s.options).find(o => o.value === {option} || o.label.trim() === {option} || o.text.trim() === {option}); \
            if (!o) return false; \
            s.value = o.value; \
            s.dispatchEvent(new Event('input', {{ bubbles: true }})); \
            s.dispatchEvent(new Event('change', {{ bubbles: true }})); \
            return true; \
        }})()"
    ))
}

fn apply_select_filter(tab: &Tab, filter: &SelectFilter) -> Result<()> {
    let script = select_filter_script(filter)?;
    let selected = tab
        .evaluate(&script, false)
        .context("Failed to apply fixtures filter")?
        .value
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    if !selected {
        bail!("No option {:?} in {:?}", filter.option, filter.selector);
    }
    Ok(())
}
