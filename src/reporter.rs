//! # Error reporter
//!
//! Bounded LIFO of recent controller errors, a one-shot critical flag, and
//! a rate limiter on external notifications (spec §4.6). The reporter is
//! the sole writer; interested parties observe state changes through an
//! owned `tokio::sync::watch` channel handed out at construction — the
//! "single writer, external reader" pattern used throughout this crate
//! (spec §5).

use std::time::{Duration, Instant};
use tokio::sync::watch;

/// N: the bounded history depth. Older entries are evicted, not treated
/// as a fault.
pub const HISTORY_CAPACITY: usize = 10;
const ABBREVIATE_TO: usize = 245;
const ABBREVIATE_HALF: usize = 120;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportedError {
    pub message: String,
    pub critical: bool,
}

/// Snapshot published over the watch channel: most-recent error first.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReporterState {
    pub history: Vec<ReportedError>,
    pub critical: bool,
}

impl ReporterState {
    pub fn top(&self) -> Option<&ReportedError> {
        self.history.first()
    }
}

/// `{first K calls immediate, then one per Δt}`.
#[derive(Debug)]
struct RateLimiter {
    immediate_budget: u32,
    interval: Duration,
    last_emitted: Option<Instant>,
}

impl RateLimiter {
    fn new(immediate: u32, interval: Duration) -> Self {
        RateLimiter {
            immediate_budget: immediate,
            interval,
            last_emitted: None,
        }
    }

    fn allow(&mut self, now: Instant) -> bool {
        if self.immediate_budget > 0 {
            self.immediate_budget -= 1;
            self.last_emitted = Some(now);
            return true;
        }
        match self.last_emitted {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last_emitted = Some(now);
                true
            }
        }
    }
}

/// Single-writer error reporter. Not `Clone` — a controller owns exactly
/// one, and hands the receiver half of its watch channel to whatever
/// external notifier wants to observe health (spec §5).
pub struct Reporter {
    state: ReporterState,
    limiter: RateLimiter,
    sender: watch::Sender<ReporterState>,
}

impl Reporter {
    /// Spec defaults: K=3 immediate, Δt=2s, N=10 history depth.
    pub fn new() -> (Reporter, watch::Receiver<ReporterState>) {
        Reporter::with_limits(3, Duration::from_secs(2))
    }

    pub fn with_limits(
        immediate: u32,
        interval: Duration,
    ) -> (Reporter, watch::Receiver<ReporterState>) {
        let initial = ReporterState::default();
        let (sender, receiver) = watch::channel(initial.clone());
        (
            Reporter {
                state: initial,
                limiter: RateLimiter::new(immediate, interval),
                sender,
            },
            receiver,
        )
    }

    pub fn state(&self) -> &ReporterState {
        &self.state
    }

    pub fn report(&mut self, message: impl Into<String>) {
        self.push(message.into(), false);
    }

    /// Record a critical error. `critical` is one-shot: once set it never
    /// clears for the lifetime of this reporter.
    pub fn report_critical(&mut self, message: impl Into<String>) {
        self.push(message.into(), true);
    }

    fn push(&mut self, message: String, critical: bool) {
        let abbreviated = abbreviate(&message);
        self.state.history.insert(
            0,
            ReportedError {
                message: abbreviated,
                critical,
            },
        );
        self.state.history.truncate(HISTORY_CAPACITY);
        if critical {
            self.state.critical = true;
        }
        if self.limiter.allow(Instant::now()) {
            // No listener attached is not an error; the reporter doesn't
            // care whether anyone is watching.
            let _ = self.sender.send(self.state.clone());
        }
    }
}

/// Middle-ellipsis abbreviation to 245 characters: 120 prefix + `[...]` +
/// 120 suffix. Operates on chars rather than bytes so multi-byte UTF-8
/// text is never split mid-codepoint.
fn abbreviate(message: &str) -> String {
    let chars: Vec<char> = message.chars().collect();
    if chars.len() <= ABBREVIATE_TO {
        return message.to_string();
    }
    let prefix: String = chars[..ABBREVIATE_HALF].iter().collect();
    let suffix: String = chars[chars.len() - ABBREVIATE_HALF..].iter().collect();
    format!("{prefix}[...]{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_is_bounded_and_most_recent_first() {
        let (mut reporter, _rx) = Reporter::new();
        for i in 0..15 {
            reporter.report(format!("error {i}"));
        }
        assert_eq!(reporter.state().history.len(), HISTORY_CAPACITY);
        assert_eq!(reporter.state().top().unwrap().message, "error 14");
    }

    #[test]
    fn critical_flag_is_sticky() {
        let (mut reporter, _rx) = Reporter::new();
        reporter.report_critical("boom");
        reporter.report("fine, mostly");
        assert!(reporter.state().critical);
    }

    #[test]
    fn abbreviates_long_messages_with_middle_ellipsis() {
        let message = "x".repeat(300);
        let abbreviated = abbreviate(&message);
        assert_eq!(abbreviated.len(), 120 + 5 + 120);
        assert!(abbreviated.contains("[...]"));
    }

    #[test]
    fn short_messages_pass_through_unchanged() {
        assert_eq!(abbreviate("short"), "short");
    }

    #[test]
    fn rate_limiter_bounds_external_notifications() {
        let (mut reporter, mut rx) = Reporter::with_limits(1, Duration::from_millis(30));

        reporter.report("e1");
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();

        reporter.report("e2");
        assert!(!rx.has_changed().unwrap());

        std::thread::sleep(Duration::from_millis(40));
        reporter.report("e3");
        assert!(rx.has_changed().unwrap());
    }
}
