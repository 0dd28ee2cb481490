//! Notification dispatch state: per-category escalation tracking and the
//! global rolling rate window shared by every category.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use tapegauge_common::messages::{NotifyKind, NotifyMessage};

/// Maximum transmitted message length, including the ellipsis
pub const MAX_MESSAGE_LENGTH: usize = 180;

#[derive(Debug, Default)]
struct CategoryState {
    count: u32,
    active: bool,
}

/// Decides which notification requests become outbound sends.
///
/// Error requests send on the first occurrence of a category and again when
/// the occurrence count reaches the request's escalation point; everything in
/// between is suppressed. Recovery requests send once per active episode.
/// All sends share one rolling rate window; overflow is dropped, not queued.
pub struct DispatchState {
    max_per_period: usize,
    period: Duration,
    sent_times: VecDeque<Instant>,
    categories: HashMap<String, CategoryState>,
}

impl DispatchState {
    pub fn new(max_per_period: usize, period: Duration) -> Self {
        Self {
            max_per_period,
            period,
            sent_times: VecDeque::new(),
            categories: HashMap::new(),
        }
    }

    /// Apply category logic to a request, returning the text to transmit or
    /// None when the request is suppressed. Mutates category state either way.
    pub fn prepare(&mut self, request: &NotifyMessage) -> Option<String> {
        let message = truncate(&request.message);
        if message.is_empty() {
            return None;
        }

        match request.kind {
            NotifyKind::Info => Some(message),
            NotifyKind::Error => {
                let state = self.categories.entry(request.category.clone()).or_default();
                state.count += 1;
                state.active = true;

                if state.count == 1 {
                    Some(message)
                } else if request.escalate_after > 0 && state.count == request.escalate_after {
                    Some(format!(
                        "{message} (seen {} times in a row, please investigate)",
                        state.count
                    ))
                } else {
                    None
                }
            }
            NotifyKind::Recovery => {
                let state = self.categories.get_mut(&request.category)?;
                if !state.active {
                    return None;
                }
                state.count = 0;
                state.active = false;
                Some(message)
            }
        }
    }

    /// Check the rolling window, pruning expired entries. Does not record;
    /// call `record_sent` once the transport has actually delivered.
    pub fn allow_send(&mut self, now: Instant) -> bool {
        while let Some(first) = self.sent_times.front() {
            if now.duration_since(*first) > self.period {
                self.sent_times.pop_front();
            } else {
                break;
            }
        }
        self.sent_times.len() < self.max_per_period
    }

    pub fn record_sent(&mut self, now: Instant) {
        self.sent_times.push_back(now);
    }
}

fn truncate(message: &str) -> String {
    let message = message.trim();
    if message.chars().count() <= MAX_MESSAGE_LENGTH {
        return message.to_string();
    }
    let mut truncated: String = message.chars().take(MAX_MESSAGE_LENGTH - 3).collect();
    truncated.push_str("...");
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;
    use tapegauge_common::messages::NotifyChannel;

    fn error(category: &str, message: &str, escalate_after: u32) -> NotifyMessage {
        NotifyMessage {
            kind: NotifyKind::Error,
            category: category.to_string(),
            channel: NotifyChannel::Operations,
            message: message.to_string(),
            escalate_after,
        }
    }

    fn recovery(category: &str, message: &str) -> NotifyMessage {
        NotifyMessage {
            kind: NotifyKind::Recovery,
            category: category.to_string(),
            channel: NotifyChannel::Operations,
            message: message.to_string(),
            escalate_after: 0,
        }
    }

    fn info(message: &str) -> NotifyMessage {
        NotifyMessage {
            kind: NotifyKind::Info,
            category: "general".to_string(),
            channel: NotifyChannel::Operations,
            message: message.to_string(),
            escalate_after: 0,
        }
    }

    #[test]
    fn error_sends_first_and_escalation_point_only() {
        let mut state = DispatchState::new(20, Duration::from_secs(60));

        let mut sent = 0;
        for _ in 0..8 {
            if state.prepare(&error("width-low", "width low: 9.80mm", 3)).is_some() {
                sent += 1;
            }
        }
        // First occurrence plus the third, nothing else
        assert_eq!(sent, 2);
    }

    #[test]
    fn escalated_wording_carries_the_count() {
        let mut state = DispatchState::new(20, Duration::from_secs(60));

        assert_eq!(
            state.prepare(&error("width-low", "width low", 3)),
            Some("width low".to_string())
        );
        assert_eq!(state.prepare(&error("width-low", "width low", 3)), None);
        let escalated = state.prepare(&error("width-low", "width low", 3)).unwrap();
        assert!(escalated.contains("3 times in a row"));
    }

    #[test]
    fn zero_escalation_point_sends_only_once() {
        let mut state = DispatchState::new(20, Duration::from_secs(60));

        assert!(state.prepare(&error("cam", "fetch failed", 0)).is_some());
        for _ in 0..5 {
            assert_eq!(state.prepare(&error("cam", "fetch failed", 0)), None);
        }
    }

    #[test]
    fn recovery_is_idempotent() {
        let mut state = DispatchState::new(20, Duration::from_secs(60));

        // Never active: no-op
        assert_eq!(state.prepare(&recovery("width-low", "recovered")), None);

        state.prepare(&error("width-low", "width low", 3));
        assert!(state.prepare(&recovery("width-low", "recovered")).is_some());
        // Second recovery in a row is a no-op
        assert_eq!(state.prepare(&recovery("width-low", "recovered")), None);
    }

    #[test]
    fn recovery_resets_the_escalation_cycle() {
        let mut state = DispatchState::new(20, Duration::from_secs(60));

        state.prepare(&error("width-low", "width low", 3));
        state.prepare(&error("width-low", "width low", 3));
        state.prepare(&recovery("width-low", "recovered"));

        // Counting starts over: the next error is a fresh first occurrence
        assert_eq!(
            state.prepare(&error("width-low", "width low", 3)),
            Some("width low".to_string())
        );
    }

    #[test]
    fn rate_window_caps_sends_and_prunes_old_entries() {
        let mut state = DispatchState::new(20, Duration::from_secs(60));
        let start = Instant::now();

        for i in 0..25 {
            let now = start + Duration::from_millis(i);
            if state.allow_send(now) {
                state.record_sent(now);
            }
        }
        assert_eq!(state.sent_times.len(), 20);
        assert!(!state.allow_send(start + Duration::from_secs(1)));

        // Once the window has rolled past, capacity frees up again
        assert!(state.allow_send(start + Duration::from_secs(61)));
        assert!(state.sent_times.is_empty());
    }

    #[test]
    fn burst_of_info_messages_is_capped_at_the_window_size() {
        let mut state = DispatchState::new(20, Duration::from_secs(60));
        let start = Instant::now();

        let mut transmitted = 0;
        for i in 0..25 {
            let now = start + Duration::from_millis(i);
            if state.prepare(&info("ping")).is_some() && state.allow_send(now) {
                state.record_sent(now);
                transmitted += 1;
            }
        }
        assert_eq!(transmitted, 20);
    }

    #[test]
    fn failed_delivery_does_not_consume_window_capacity() {
        let mut state = DispatchState::new(2, Duration::from_secs(60));
        let now = Instant::now();

        // Two attempts pass the check but never get recorded (delivery failed)
        assert!(state.allow_send(now));
        assert!(state.allow_send(now));
        assert!(state.sent_times.is_empty());

        state.record_sent(now);
        state.record_sent(now);
        assert!(!state.allow_send(now));
    }

    #[test]
    fn long_messages_are_truncated_with_ellipsis() {
        let long = "x".repeat(300);
        let truncated = truncate(&long);
        assert_eq!(truncated.chars().count(), MAX_MESSAGE_LENGTH);
        assert!(truncated.ends_with("..."));

        assert_eq!(truncate("  short  "), "short");
    }
}
