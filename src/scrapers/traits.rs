use crate::error::{Result, SessionResult};
use std::fmt;

/// How an element is looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// CSS selector, matched against descendants
    Css(String),
    /// First descendant `tag` whose own text contains `needle`
    TextContains { tag: String, needle: String },
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(selector.into())
    }

    pub fn text_contains(tag: impl Into<String>, needle: impl Into<String>) -> Self {
        Locator::TextContains {
            tag: tag.into(),
            needle: needle.into(),
        }
    }

}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(selector) => f.write_str(selector),
            Locator::TextContains { tag, needle } => write!(f, "{} containing '{}'", tag, needle),
        }
    }
}

/// Yields a browser session ready to be driven.
///
/// Implementations are shared with the worker thread, the sessions they
/// produce are not.
pub trait DriverProvider: Send + Sync {
    type Session: Session;

    fn acquire(&self, headless: bool) -> Result<Self::Session>;
}

/// A live page. All calls block until the browser answers.
pub trait Session {
    type Element<'a>: PageElement
    where
        Self: 'a;

    fn navigate(&self, url: &str) -> SessionResult<()>;

    /// All elements matching a CSS selector, in document order.
    fn find_all(&self, selector: &str) -> SessionResult<Vec<Self::Element<'_>>>;

    fn find_one(&self, locator: &Locator) -> SessionResult<Self::Element<'_>>;

    fn title(&self) -> SessionResult<String>;

    fn body_text(&self) -> SessionResult<String>;

    fn send_key(&self, key: &str) -> SessionResult<()>;

    /// Serialized DOM of the current page.
    fn page_source(&self) -> SessionResult<String>;

    fn close(self) -> SessionResult<()>
    where
        Self: Sized;
}

pub trait PageElement: Sized {
    fn find_one(&self, locator: &Locator) -> SessionResult<Self>;

    fn text(&self) -> SessionResult<String>;

    fn attribute(&self, name: &str) -> SessionResult<Option<String>>;

    fn is_enabled(&self) -> SessionResult<bool>;

    fn click(&self) -> SessionResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locators_describe_themselves() {
        assert_eq!(Locator::css("address").to_string(), "address");
        assert_eq!(Locator::text_contains("span", "$").to_string(), "span containing '$'");
    }
}
