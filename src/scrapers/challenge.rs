use crate::error::SessionResult;
use crate::scrapers::traits::Session;
use crate::settings::ChallengeConfig;
use tracing::debug;

/// Does the current page look like a human-verification wall?
///
/// Read failures surface as `Err`; see [`is_blocked`] for the policy.
pub fn detect<S: Session>(session: &S, phrases: &ChallengeConfig) -> SessionResult<bool> {
    let title = session.title()?.to_lowercase();
    if contains_any(&title, &phrases.title_phrases) {
        return Ok(true);
    }

    let body = session.body_text()?.to_lowercase();
    Ok(contains_any(&body, &phrases.body_phrases))
}

/// Fail-open wrapper around [`detect`]: a page that cannot be read (mid
/// navigation, detached) counts as not blocked.
pub fn is_blocked<S: Session>(session: &S, phrases: &ChallengeConfig) -> bool {
    detect(session, phrases).unwrap_or_else(|e| {
        debug!("Challenge check could not read page, assuming clear: {}", e);
        false
    })
}

fn contains_any(haystack: &str, phrases: &[String]) -> bool {
    phrases
        .iter()
        .any(|p| !p.is_empty() && haystack.contains(&p.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::snapshot::SnapshotSession;

    fn session(html: &str) -> SnapshotSession {
        let session = SnapshotSession::from_pages(vec![html.to_string()]);
        session.navigate("snapshot://results").unwrap();
        session
    }

    #[test]
    fn title_phrase_blocks() {
        let s = session("<html><head><title>Security Check</title></head><body>hi</body></html>");
        assert!(is_blocked(&s, &ChallengeConfig::default()));
    }

    #[test]
    fn body_phrases_block() {
        let s = session("<html><head><title>Homes</title></head><body><p>Please PRESS AND HOLD the button</p></body></html>");
        assert!(is_blocked(&s, &ChallengeConfig::default()));

        let s = session("<html><body><div>Verify you are human</div></body></html>");
        assert!(is_blocked(&s, &ChallengeConfig::default()));
    }

    #[test]
    fn ordinary_results_page_is_clear() {
        let s = session("<html><head><title>90210 Real Estate</title></head><body><article>$1</article></body></html>");
        assert!(!is_blocked(&s, &ChallengeConfig::default()));
    }

    #[test]
    fn unreadable_page_fails_open() {
        // Never navigated: every read fails.
        let s = SnapshotSession::from_pages(Vec::new());
        assert!(detect(&s, &ChallengeConfig::default()).is_err());
        assert!(!is_blocked(&s, &ChallengeConfig::default()));
    }
}
