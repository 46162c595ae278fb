use crate::error::{Result, ScoutError, SessionError, SessionResult};
use crate::scrapers::traits::{DriverProvider, Locator, PageElement, Session};
use crate::settings::BrowserConfig;
use headless_chrome::{Browser, Element, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Launches a local Chrome for each run.
pub struct ChromeProvider {
    config: BrowserConfig,
}

impl ChromeProvider {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }
}

impl DriverProvider for ChromeProvider {
    type Session = ChromeSession;

    fn acquire(&self, headless: bool) -> Result<ChromeSession> {
        info!("Launching Chrome (headless: {})...", headless);

        let mut args: Vec<&OsStr> = self.config.args.iter().map(OsStr::new).collect();
        if self.config.stealth {
            args.push(OsStr::new("--disable-blink-features=AutomationControlled"));
        }

        let options = LaunchOptions::default_builder()
            .headless(headless)
            .path(self.config.chrome_path.clone())
            .args(args)
            .idle_browser_timeout(Duration::from_secs(self.config.idle_timeout_secs))
            .build()
            .map_err(|e| ScoutError::DriverInit(format!("invalid launch options: {}", e)))?;

        let browser = Browser::new(options)
            .map_err(|e| ScoutError::DriverInit(format!("failed to launch Chrome: {}", e)))?;

        if let Some(expected) = self.config.expected_major_version {
            let version = browser
                .get_version()
                .map_err(|e| ScoutError::DriverInit(format!("failed to query version: {}", e)))?;
            match major_version(&version.product) {
                Some(found) if found == expected => {
                    debug!("Browser version {} matches pin", version.product)
                }
                _ => {
                    return Err(ScoutError::DriverInit(format!(
                        "expected Chrome major version {}, found {}",
                        expected, version.product
                    )))
                }
            }
        }

        let tab = browser
            .new_tab()
            .map_err(|e| ScoutError::DriverInit(format!("failed to open tab: {}", e)))?;

        if self.config.stealth {
            tab.enable_stealth_mode()
                .map_err(|e| ScoutError::DriverInit(format!("stealth mode failed: {}", e)))?;
        }

        Ok(ChromeSession {
            browser,
            tab,
            closed: false,
        })
    }
}

/// Parse the major version out of a product string like `Chrome/144.0.7559.96`.
fn major_version(product: &str) -> Option<u32> {
    product
        .split('/')
        .nth(1)?
        .split('.')
        .next()?
        .parse()
        .ok()
}

pub struct ChromeSession {
    // Dropping the browser kills the Chrome process.
    #[allow(dead_code)]
    browser: Browser,
    tab: Arc<Tab>,
    closed: bool,
}

fn browser_err(e: impl std::fmt::Display) -> SessionError {
    SessionError::Browser(e.to_string())
}

const OWN_TEXT_JS: &str = "function() { \
    return Array.from(this.childNodes) \
        .filter(n => n.nodeType === Node.TEXT_NODE) \
        .map(n => n.textContent) \
        .join(''); }";

const IS_ENABLED_JS: &str =
    "function() { return !this.disabled && this.getAttribute('aria-disabled') !== 'true'; }";

/// Text of the element's direct text nodes, ignoring descendants.
fn own_text(element: &Element<'_>) -> SessionResult<String> {
    let result = element.call_js_fn(OWN_TEXT_JS, vec![], false).map_err(browser_err)?;
    Ok(result
        .value
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default())
}

/// First candidate whose own text contains `needle`. Candidates that cannot
/// be read are skipped.
fn first_with_own_text<T>(
    candidates: Vec<T>,
    needle: &str,
    read: impl Fn(&T) -> SessionResult<String>,
) -> Option<T> {
    candidates.into_iter().find(|candidate| match read(candidate) {
        Ok(text) => text.contains(needle),
        Err(e) => {
            debug!("Skipping unreadable candidate: {}", e);
            false
        }
    })
}

impl Session for ChromeSession {
    type Element<'a> = Element<'a>;

    fn navigate(&self, url: &str) -> SessionResult<()> {
        self.tab.navigate_to(url).map_err(browser_err)?;
        self.tab.wait_until_navigated().map_err(browser_err)?;
        Ok(())
    }

    fn find_all(&self, selector: &str) -> SessionResult<Vec<Element<'_>>> {
        self.tab
            .find_elements(selector)
            .map_err(|_| SessionError::NotFound(selector.to_string()))
    }

    fn find_one(&self, locator: &Locator) -> SessionResult<Element<'_>> {
        match locator {
            Locator::Css(selector) => self
                .tab
                .find_element(selector)
                .map_err(|_| SessionError::NotFound(selector.clone())),
            Locator::TextContains { tag, needle } => {
                let candidates = self.tab.find_elements(tag).unwrap_or_default();
                first_with_own_text(candidates, needle, own_text)
                    .ok_or_else(|| SessionError::NotFound(locator.to_string()))
            }
        }
    }

    fn title(&self) -> SessionResult<String> {
        self.tab.get_title().map_err(browser_err)
    }

    fn body_text(&self) -> SessionResult<String> {
        self.tab
            .find_element("body")
            .map_err(|_| SessionError::NotFound("body".into()))?
            .get_inner_text()
            .map_err(browser_err)
    }

    fn send_key(&self, key: &str) -> SessionResult<()> {
        self.tab.press_key(key).map_err(browser_err)?;
        Ok(())
    }

    fn page_source(&self) -> SessionResult<String> {
        self.tab.get_content().map_err(browser_err)
    }

    fn close(mut self) -> SessionResult<()> {
        self.closed = true;
        self.tab.close(false).map_err(browser_err)?;
        Ok(())
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.tab.close(false) {
                warn!("Failed to close tab on drop: {}", e);
            }
        }
    }
}

impl<'a> PageElement for Element<'a> {
    fn find_one(&self, locator: &Locator) -> SessionResult<Self> {
        match locator {
            Locator::Css(selector) => self
                .find_element(selector)
                .map_err(|_| SessionError::NotFound(selector.clone())),
            // Scoped to descendants of this node.
            Locator::TextContains { tag, needle } => {
                let candidates = self.find_elements(tag).unwrap_or_default();
                first_with_own_text(candidates, needle, own_text)
                    .ok_or_else(|| SessionError::NotFound(locator.to_string()))
            }
        }
    }

    fn text(&self) -> SessionResult<String> {
        self.get_inner_text()
            .map(|t| t.trim().to_string())
            .map_err(browser_err)
    }

    fn attribute(&self, name: &str) -> SessionResult<Option<String>> {
        self.get_attribute_value(name).map_err(browser_err)
    }

    fn is_enabled(&self) -> SessionResult<bool> {
        let result = self.call_js_fn(IS_ENABLED_JS, vec![], false).map_err(browser_err)?;
        Ok(result.value.and_then(|v| v.as_bool()).unwrap_or(true))
    }

    fn click(&self) -> SessionResult<()> {
        Element::click(self).map_err(browser_err)?;
        Ok(())
    }
}
