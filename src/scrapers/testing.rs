//! Fixtures shared by the loop and controller tests.
use crate::control::StopHandle;
use crate::error::{Result, SessionResult};
use crate::export::ResultSink;
use crate::models::ListingRecord;
use crate::scrapers::snapshot::{SnapshotElement, SnapshotSession};
use crate::scrapers::traits::{DriverProvider, Locator, PageElement, Session};
use crate::settings::{DelayConfig, ScoutConfig};
use std::cell::Cell;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub enum Next {
    Enabled,
    Disabled,
    Missing,
}

pub fn card(price: &str, address: &str, link: &str) -> String {
    format!(
        r#"<article><div data-test="property-card-price">{}</div><address>{}</address><a data-test="property-card-link" href="{}">Details</a></article>"#,
        price, address, link
    )
}

pub fn page(cards: &[String], next: Next) -> String {
    let next = match next {
        Next::Enabled => r#"<button title="Next page">Next</button>"#,
        Next::Disabled => r#"<button title="Next page" disabled>Next</button>"#,
        Next::Missing => "",
    };
    format!(
        "<html><head><title>Homes for sale</title></head><body><main>{}</main><nav>{}</nav></body></html>",
        cards.concat(),
        next
    )
}

pub fn quiet_config() -> ScoutConfig {
    ScoutConfig {
        base_url: "https://listings.test".to_string(),
        delays: DelayConfig::instant(),
        ..ScoutConfig::default()
    }
}

/// Keeps every write in memory.
#[derive(Clone, Default)]
pub struct MemorySink {
    pub writes: Arc<Mutex<Vec<(Vec<ListingRecord>, String)>>>,
}

impl MemorySink {
    pub fn written(&self) -> Vec<(Vec<ListingRecord>, String)> {
        self.writes.lock().unwrap().clone()
    }
}

impl ResultSink for MemorySink {
    fn write(&self, records: &[ListingRecord], destination_hint: &str) -> Result<Option<PathBuf>> {
        self.writes
            .lock()
            .unwrap()
            .push((records.to_vec(), destination_hint.to_string()));
        if records.is_empty() {
            return Ok(None);
        }
        Ok(Some(PathBuf::from(format!("memory/Leads_{}.xlsx", destination_hint))))
    }
}

/// Snapshot pages plus scripted interference: a challenge title for the
/// first N title reads, and tripwires that raise the stop flag.
#[derive(Default)]
pub struct ScriptedProvider {
    pub pages: Vec<String>,
    pub challenge_reads: usize,
    pub stop_after_title_reads: Option<(usize, StopHandle)>,
    pub stop_after_links: Option<(usize, StopHandle)>,
    pub closed: Arc<AtomicBool>,
}

impl ScriptedProvider {
    pub fn new(pages: Vec<String>) -> Self {
        Self {
            pages,
            ..Self::default()
        }
    }
}

impl DriverProvider for ScriptedProvider {
    type Session = ScriptedSession;

    fn acquire(&self, _headless: bool) -> Result<ScriptedSession> {
        Ok(ScriptedSession {
            inner: SnapshotSession::from_pages(self.pages.clone()),
            challenge_left: Cell::new(self.challenge_reads),
            title_reads: Cell::new(0),
            link_reads: Cell::new(0),
            stop_after_title_reads: self.stop_after_title_reads.clone(),
            stop_after_links: self.stop_after_links.clone(),
            closed: Arc::clone(&self.closed),
        })
    }
}

pub struct ScriptedSession {
    inner: SnapshotSession,
    challenge_left: Cell<usize>,
    title_reads: Cell<usize>,
    link_reads: Cell<usize>,
    stop_after_title_reads: Option<(usize, StopHandle)>,
    stop_after_links: Option<(usize, StopHandle)>,
    closed: Arc<AtomicBool>,
}

fn trip(counter: &Cell<usize>, wire: &Option<(usize, StopHandle)>) {
    counter.set(counter.get() + 1);
    if let Some((after, stop)) = wire {
        if counter.get() >= *after {
            stop.request_stop();
        }
    }
}

impl Session for ScriptedSession {
    type Element<'a> = ScriptedElement<'a>;

    fn navigate(&self, url: &str) -> SessionResult<()> {
        self.inner.navigate(url)
    }

    fn find_all(&self, selector: &str) -> SessionResult<Vec<ScriptedElement<'_>>> {
        Ok(self
            .inner
            .find_all(selector)?
            .into_iter()
            .map(|inner| ScriptedElement { inner, session: self })
            .collect())
    }

    fn find_one(&self, locator: &Locator) -> SessionResult<ScriptedElement<'_>> {
        let inner = self.inner.find_one(locator)?;
        Ok(ScriptedElement { inner, session: self })
    }

    fn title(&self) -> SessionResult<String> {
        trip(&self.title_reads, &self.stop_after_title_reads);
        if self.challenge_left.get() > 0 {
            self.challenge_left.set(self.challenge_left.get() - 1);
            return Ok("Security Check".to_string());
        }
        self.inner.title()
    }

    fn body_text(&self) -> SessionResult<String> {
        self.inner.body_text()
    }

    fn send_key(&self, key: &str) -> SessionResult<()> {
        self.inner.send_key(key)
    }

    fn page_source(&self) -> SessionResult<String> {
        self.inner.page_source()
    }

    fn close(self) -> SessionResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        self.inner.close()
    }
}

pub struct ScriptedElement<'a> {
    inner: SnapshotElement<'a>,
    session: &'a ScriptedSession,
}

impl<'a> PageElement for ScriptedElement<'a> {
    fn find_one(&self, locator: &Locator) -> SessionResult<Self> {
        Ok(ScriptedElement {
            inner: self.inner.find_one(locator)?,
            session: self.session,
        })
    }

    fn text(&self) -> SessionResult<String> {
        self.inner.text()
    }

    fn attribute(&self, name: &str) -> SessionResult<Option<String>> {
        let value = self.inner.attribute(name)?;
        if name == "href" {
            trip(&self.session.link_reads, &self.session.stop_after_links);
        }
        Ok(value)
    }

    fn is_enabled(&self) -> SessionResult<bool> {
        self.inner.is_enabled()
    }

    fn click(&self) -> SessionResult<()> {
        self.inner.click()
    }
}
