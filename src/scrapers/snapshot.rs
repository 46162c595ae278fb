//! Offline session over previously captured result pages.
//!
//! Pages are parsed with `scraper` and served in order: navigating loads the
//! first one, clicking any element (the loop only ever clicks the next-page
//! control) advances to the following one. Text reads skip subtrees that a
//! browser would not render: `hidden`, inline `display:none` or
//! `visibility:hidden`, scripts and styles.
use crate::error::{Result, SessionError, SessionResult};
use crate::scrapers::traits::{DriverProvider, Locator, PageElement, Session};
use scraper::{ElementRef, Html, Selector};
use std::cell::Cell;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Serves captured pages instead of launching a browser.
pub struct SnapshotProvider {
    pages: Vec<String>,
}

impl SnapshotProvider {
    /// Load every `*.html` file in `dir`, ordered by file name.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "html") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut pages = Vec::with_capacity(paths.len());
        for path in &paths {
            pages.push(fs::read_to_string(path)?);
        }
        info!("Loaded {} captured pages from {}", pages.len(), dir.display());

        Ok(Self { pages })
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

impl DriverProvider for SnapshotProvider {
    type Session = SnapshotSession;

    fn acquire(&self, _headless: bool) -> Result<SnapshotSession> {
        Ok(SnapshotSession::from_pages(self.pages.clone()))
    }
}

pub struct SnapshotSession {
    pages: Vec<Html>,
    current: Cell<Option<usize>>,
}

impl SnapshotSession {
    pub fn from_pages(pages: Vec<String>) -> Self {
        Self {
            pages: pages.iter().map(|p| Html::parse_document(p)).collect(),
            current: Cell::new(None),
        }
    }

    fn page(&self) -> SessionResult<&Html> {
        self.current
            .get()
            .and_then(|idx| self.pages.get(idx))
            .ok_or_else(|| SessionError::Browser("no page loaded".into()))
    }

    fn advance(&self) -> SessionResult<()> {
        let next = self.current.get().map_or(0, |idx| idx + 1);
        if next >= self.pages.len() {
            return Err(SessionError::Browser("no further captured page".into()));
        }
        debug!("Snapshot advanced to page {}", next + 1);
        self.current.set(Some(next));
        Ok(())
    }
}

impl Session for SnapshotSession {
    type Element<'a> = SnapshotElement<'a>;

    fn navigate(&self, url: &str) -> SessionResult<()> {
        if self.pages.is_empty() {
            return Err(SessionError::Browser(format!("no captured pages to serve for {}", url)));
        }
        self.current.set(Some(0));
        Ok(())
    }

    fn find_all(&self, selector: &str) -> SessionResult<Vec<SnapshotElement<'_>>> {
        let sel = parse_selector(selector)?;
        Ok(self
            .page()?
            .select(&sel)
            .map(|node| SnapshotElement { session: self, node })
            .collect())
    }

    fn find_one(&self, locator: &Locator) -> SessionResult<SnapshotElement<'_>> {
        let root = self.page()?.root_element();
        let node = select_first(root, locator)?;
        Ok(SnapshotElement { session: self, node })
    }

    fn title(&self) -> SessionResult<String> {
        let sel = parse_selector("title")?;
        Ok(self
            .page()?
            .select(&sel)
            .next()
            .map(|t| t.text().collect::<String>().trim().to_string())
            .unwrap_or_default())
    }

    fn body_text(&self) -> SessionResult<String> {
        let sel = parse_selector("body")?;
        let page = self.page()?;
        Ok(page.select(&sel).next().map(visible_text).unwrap_or_default())
    }

    fn send_key(&self, _key: &str) -> SessionResult<()> {
        self.page().map(|_| ())
    }

    fn page_source(&self) -> SessionResult<String> {
        Ok(self.page()?.html())
    }

    fn close(self) -> SessionResult<()> {
        Ok(())
    }
}

pub struct SnapshotElement<'a> {
    session: &'a SnapshotSession,
    node: ElementRef<'a>,
}

impl<'a> PageElement for SnapshotElement<'a> {
    fn find_one(&self, locator: &Locator) -> SessionResult<Self> {
        let node = select_first(self.node, locator)?;
        Ok(SnapshotElement {
            session: self.session,
            node,
        })
    }

    fn text(&self) -> SessionResult<String> {
        Ok(visible_text(self.node))
    }

    fn attribute(&self, name: &str) -> SessionResult<Option<String>> {
        Ok(self.node.value().attr(name).map(str::to_string))
    }

    fn is_enabled(&self) -> SessionResult<bool> {
        let el = self.node.value();
        Ok(el.attr("disabled").is_none() && el.attr("aria-disabled") != Some("true"))
    }

    fn click(&self) -> SessionResult<()> {
        self.session.advance()
    }
}

fn parse_selector(selector: &str) -> SessionResult<Selector> {
    Selector::parse(selector).map_err(|_| SessionError::InvalidSelector(selector.to_string()))
}

fn select_first<'a>(scope: ElementRef<'a>, locator: &Locator) -> SessionResult<ElementRef<'a>> {
    match locator {
        Locator::Css(selector) => {
            let sel = parse_selector(selector)?;
            scope
                .select(&sel)
                .next()
                .ok_or_else(|| SessionError::NotFound(selector.clone()))
        }
        Locator::TextContains { tag, needle } => {
            let sel = parse_selector(tag)?;
            scope
                .select(&sel)
                .find(|el| own_text_contains(*el, needle))
                .ok_or_else(|| SessionError::NotFound(locator.to_string()))
        }
    }
}

fn own_text_contains(el: ElementRef<'_>, needle: &str) -> bool {
    el.children()
        .filter_map(|child| child.value().as_text())
        .any(|text| text.contains(needle))
}

/// Text content with whitespace collapsed, skipping unrendered descendants.
fn visible_text(el: ElementRef<'_>) -> String {
    let mut raw = String::new();
    collect_visible(el, &mut raw);
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn collect_visible(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child_el) = ElementRef::wrap(child) {
            if is_rendered(child_el) {
                out.push(' ');
                collect_visible(child_el, out);
            }
        }
    }
}

fn is_rendered(el: ElementRef<'_>) -> bool {
    let value = el.value();
    if value.attr("hidden").is_some() || matches!(value.name(), "script" | "style") {
        return false;
    }
    let style: String = value
        .attr("style")
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();
    !style.split(';').any(|decl| {
        decl.starts_with("display:none") || decl.starts_with("visibility:hidden")
    })
}
