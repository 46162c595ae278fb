use crate::settings::DelayRange;
use rand::Rng;
use std::thread;
use std::time::Duration;
use tracing::debug;

/// Draw a duration uniformly from `range`. A reversed range collapses to its
/// minimum.
pub fn pick(range: DelayRange) -> Duration {
    let ms = if range.max_ms > range.min_ms {
        rand::thread_rng().gen_range(range.min_ms..=range.max_ms)
    } else {
        range.min_ms
    };
    Duration::from_millis(ms)
}

/// Blocking pause of a random length within `range`.
pub fn pause(range: DelayRange, reason: &str) {
    let delay = pick(range);
    if delay.is_zero() {
        return;
    }
    debug!("Waiting {:?} ({})", delay, reason);
    thread::sleep(delay);
}
