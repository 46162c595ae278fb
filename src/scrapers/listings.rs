use crate::control::{Reporter, RunSummary, StopHandle, StopReason};
use crate::error::{ScoutError, SessionError, SessionResult};
use crate::export::ResultSink;
use crate::models::ListingRecord;
use crate::pacing;
use crate::scrapers::challenge;
use crate::scrapers::traits::{DriverProvider, Locator, PageElement, Session};
use crate::scrapers::types::ScrapeRequest;
use crate::settings::ScoutConfig;
use std::fs;
use std::thread;
use tracing::{debug, info, warn};
use url::Url;

/// Drives one search through its result pages and hands the records to a
/// sink.
pub struct Harvester<P: DriverProvider> {
    provider: P,
    sink: Box<dyn ResultSink>,
    config: ScoutConfig,
}

impl<P: DriverProvider> Harvester<P> {
    pub fn new(provider: P, sink: Box<dyn ResultSink>, config: ScoutConfig) -> Self {
        Self {
            provider,
            sink,
            config,
        }
    }

    /// Run one extraction to completion.
    ///
    /// Every exit path persists what was collected and releases the
    /// session. The caller announces the returned summary as the finished
    /// event.
    pub fn run(
        &self,
        request: &ScrapeRequest,
        reporter: &Reporter,
        stop: &StopHandle,
    ) -> RunSummary {
        reporter.log("Initializing browser...");

        let session = match self.provider.acquire(self.config.browser.headless) {
            Ok(session) => session,
            Err(e) => {
                warn!("Driver unavailable: {}", e);
                reporter.log(format!("Browser initialization failed: {}", e));
                return RunSummary {
                    collected: 0,
                    saved_to: None,
                    reason: StopReason::DriverUnavailable,
                };
            }
        };

        let mut records = Vec::new();
        let reason = self.harvest(&session, request, reporter, stop, &mut records);

        let saved_to = if reason == StopReason::NavigationFailed {
            None
        } else {
            self.persist(&records, request, reporter)
        };

        if let Err(e) = session.close() {
            warn!("Failed to close browser session: {}", e);
        }

        RunSummary {
            collected: records.len(),
            saved_to,
            reason,
        }
    }

    fn harvest<S: Session>(
        &self,
        session: &S,
        request: &ScrapeRequest,
        reporter: &Reporter,
        stop: &StopHandle,
        records: &mut Vec<ListingRecord>,
    ) -> StopReason {
        let delays = &self.config.delays;
        let url = request.search_url(&self.config.base_url);
        reporter.log(format!("Navigating to: {}", url));

        if let Err(source) = session.navigate(&url) {
            warn!("{}", ScoutError::Navigation { url, source });
            reporter.log("Connection error. Stopping.");
            return StopReason::NavigationFailed;
        }
        pacing::pause(delays.after_navigation, "after navigation");

        reporter.log("Starting data extraction...");
        let limit = request.max_records();
        let mut page = 1;

        loop {
            if stop.is_stop_requested() {
                return StopReason::Cancelled;
            }
            if records.len() >= limit {
                return StopReason::LimitReached;
            }

            // Human in the loop: wait as long as it takes.
            while challenge::is_blocked(session, &self.config.challenge) {
                if stop.is_stop_requested() {
                    return StopReason::Cancelled;
                }
                if !self.config.challenge.wait_for_solve {
                    reporter.log("Security check detected and cannot be solved here. Stopping.");
                    return StopReason::ChallengeBlocked;
                }
                reporter.log("Security check detected. Please solve manually to continue...");
                thread::sleep(delays.challenge_poll());
            }

            if let Err(e) = session.send_key(&self.config.selectors.lazy_load_key) {
                debug!("Lazy-load key press failed: {}", e);
            }
            pacing::pause(delays.after_scroll, "lazy load");
            self.capture(session, page);

            let cards = session.find_all(&self.config.selectors.card).unwrap_or_else(|e| {
                debug!("No cards on page {}: {}", page, e);
                Vec::new()
            });
            debug!("Page {}: {} cards", page, cards.len());

            for card in &cards {
                if records.len() >= limit || stop.is_stop_requested() {
                    break;
                }
                match self.extract_card(card) {
                    Ok(record) => {
                        let price = record.price.clone();
                        records.push(record);
                        reporter.progress(records.len());
                        reporter.log(format!("Extracted {}: {}", records.len(), price));
                    }
                    // Ads and placeholders lack fields; not worth a log line.
                    Err(e) => debug!("Skipping card: {}", e),
                }
            }

            if stop.is_stop_requested() {
                return StopReason::Cancelled;
            }
            if records.len() >= limit {
                return StopReason::LimitReached;
            }

            match session.find_one(&Locator::css(&self.config.selectors.next_page)) {
                Ok(next) => {
                    if !next.is_enabled().unwrap_or(false) {
                        reporter.log("No more pages available.");
                        return StopReason::PaginationExhausted;
                    }
                    reporter.log("Navigating to next page...");
                    if let Err(e) = next.click() {
                        debug!("Next page click failed: {}", e);
                        reporter.log("Pagination ended.");
                        return StopReason::PaginationExhausted;
                    }
                    page += 1;
                    pacing::pause(delays.after_page_turn, "after page turn");
                }
                Err(e) => {
                    debug!("Next page control missing: {}", e);
                    reporter.log("Pagination ended.");
                    return StopReason::PaginationExhausted;
                }
            }
        }
    }

    /// Read price, address and link from one card. Any missing piece
    /// rejects the whole card.
    fn extract_card<E: PageElement>(&self, card: &E) -> SessionResult<ListingRecord> {
        let selectors = &self.config.selectors;

        let price_el = card.find_one(&Locator::css(&selectors.price))?;
        let mut price = price_el.text()?;
        if price.trim().is_empty() {
            price = price_el
                .find_one(&Locator::text_contains(
                    &selectors.price_fallback_tag,
                    &selectors.price_fallback_text,
                ))?
                .text()?;
        }
        let price = require(price, "price")?;

        let address = card.find_one(&Locator::css(&selectors.address))?.text()?;
        let address = require(address, "address")?;

        let link = card
            .find_one(&Locator::css(&selectors.link))?
            .attribute(&selectors.link_attribute)?
            .ok_or_else(|| SessionError::NotFound(selectors.link_attribute.clone()))?;
        let link = absolute_link(&self.config.base_url, &require(link, "link")?);

        Ok(ListingRecord::new(price, address, link))
    }

    fn capture<S: Session>(&self, session: &S, page: usize) {
        let Some(dir) = self.config.output.capture_dir.as_deref() else {
            return;
        };
        let path = dir.join(format!("page_{:03}.html", page));
        let saved = session
            .page_source()
            .map_err(|e| e.to_string())
            .and_then(|html| {
                fs::create_dir_all(dir)
                    .and_then(|_| fs::write(&path, html))
                    .map_err(|e| e.to_string())
            });
        match saved {
            Ok(()) => debug!("Captured page {} to {}", page, path.display()),
            Err(e) => warn!("Failed to capture page {}: {}", page, e),
        }
    }

    fn persist(
        &self,
        records: &[ListingRecord],
        request: &ScrapeRequest,
        reporter: &Reporter,
    ) -> Option<std::path::PathBuf> {
        reporter.log(format!("Scraping complete. Saving {} records...", records.len()));
        match self.sink.write(records, request.area_code()) {
            Ok(Some(path)) => {
                info!("Saved {} records", records.len());
                reporter.log(format!("File saved: {}", path.display()));
                Some(path)
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Saving results failed: {}", e);
                reporter.log(format!("Error saving file: {}", e));
                None
            }
        }
    }
}

/// Resolve a possibly relative `href` against the site root, the way a
/// browser reports the link target.
fn absolute_link(base_url: &str, href: &str) -> String {
    Url::parse(base_url)
        .and_then(|base| base.join(href))
        .map(String::from)
        .unwrap_or_else(|_| href.to_string())
}

fn require(value: String, field: &str) -> SessionResult<String> {
    let value = value.trim().to_string();
    if value.is_empty() {
        Err(SessionError::NotFound(format!("empty {}", field)))
    } else {
        Ok(value)
    }
}
