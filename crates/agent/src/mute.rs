//! Per-chat self-mute windows.
//!
//! While a window is active every outbound send to that chat is dropped.
//! Windows are only created by an explicit mute and only end by an explicit
//! unmute or by lapsing; a lapsed window is cleared the next time a send to
//! the chat is attempted.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tracing::debug;

/// Upper bound for a requested mute, one week.
pub const MAX_MUTE_MINUTES: i64 = 7 * 24 * 60;

/// Minutes a mute request resolves to: the request when positive (capped at
/// [`MAX_MUTE_MINUTES`]), otherwise the default.
pub fn effective_minutes(requested: Option<i64>, default_minutes: u32) -> i64 {
    requested
        .filter(|m| *m > 0)
        .unwrap_or(i64::from(default_minutes))
        .min(MAX_MUTE_MINUTES)
}

/// Mute state of one conversation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MuteWindow {
    active_until: Option<DateTime<Utc>>,
}

impl MuteWindow {
    pub fn active_until(&self) -> Option<DateTime<Utc>> {
        self.active_until
    }

    pub fn is_muted(&self, now: DateTime<Utc>) -> bool {
        self.active_until.is_some_and(|until| now < until)
    }

    /// Start a window. While one is running this is a no-op and the running
    /// window's end is returned.
    pub fn mute(
        &mut self,
        now: DateTime<Utc>,
        requested_minutes: Option<i64>,
        default_minutes: u32,
    ) -> DateTime<Utc> {
        if let Some(until) = self.active_until.filter(|until| now < *until) {
            return until;
        }
        let until = now + Duration::minutes(effective_minutes(requested_minutes, default_minutes));
        self.active_until = Some(until);
        until
    }

    /// Clear the window. Returns whether the bot was muted.
    pub fn unmute(&mut self, now: DateTime<Utc>) -> bool {
        let was_muted = self.is_muted(now);
        self.active_until = None;
        was_muted
    }

    /// Drop a lapsed window. Returns whether the chat is still muted.
    pub fn check_and_clear_expired(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_muted(now) {
            return true;
        }
        self.active_until = None;
        false
    }
}

/// Mute windows for every chat the bot has been silenced in.
#[derive(Debug, Default)]
pub struct MuteRegistry {
    windows: HashMap<String, MuteWindow>,
}

impl MuteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_muted(&self, chat_id: &str, now: DateTime<Utc>) -> bool {
        self.windows
            .get(chat_id)
            .is_some_and(|window| window.is_muted(now))
    }

    pub fn mute(
        &mut self,
        chat_id: &str,
        now: DateTime<Utc>,
        requested_minutes: Option<i64>,
        default_minutes: u32,
    ) -> DateTime<Utc> {
        let until = self
            .windows
            .entry(chat_id.to_string())
            .or_default()
            .mute(now, requested_minutes, default_minutes);
        debug!(chat_id, %until, "Muted");
        until
    }

    pub fn unmute(&mut self, chat_id: &str, now: DateTime<Utc>) -> bool {
        self.windows
            .remove(chat_id)
            .is_some_and(|mut window| window.unmute(now))
    }

    /// Run before every send. Returns whether the chat is still muted.
    pub fn check_and_clear_expired(&mut self, chat_id: &str, now: DateTime<Utc>) -> bool {
        let Some(window) = self.windows.get_mut(chat_id) else {
            return false;
        };
        if window.check_and_clear_expired(now) {
            return true;
        }
        self.windows.remove(chat_id);
        debug!(chat_id, "Mute window lapsed");
        false
    }

    /// Window for a chat, if one is stored.
    pub fn window(&self, chat_id: &str) -> Option<&MuteWindow> {
        self.windows.get(chat_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn fresh_window_is_not_muted() {
        let window = MuteWindow::default();
        assert!(!window.is_muted(t0()));
        assert!(window.active_until().is_none());
    }

    #[test]
    fn mute_uses_request_or_default() {
        let mut window = MuteWindow::default();
        assert_eq!(window.mute(t0(), Some(5), 10), t0() + Duration::minutes(5));

        let mut window = MuteWindow::default();
        assert_eq!(window.mute(t0(), None, 10), t0() + Duration::minutes(10));

        let mut window = MuteWindow::default();
        assert_eq!(window.mute(t0(), Some(0), 10), t0() + Duration::minutes(10));

        let mut window = MuteWindow::default();
        assert_eq!(window.mute(t0(), Some(-3), 10), t0() + Duration::minutes(10));
    }

    #[test]
    fn huge_request_is_capped() {
        assert_eq!(effective_minutes(Some(i64::MAX), 10), MAX_MUTE_MINUTES);
        assert_eq!(effective_minutes(None, u32::MAX), MAX_MUTE_MINUTES);
        assert_eq!(effective_minutes(Some(MAX_MUTE_MINUTES), 10), MAX_MUTE_MINUTES);
    }

    #[test]
    fn first_mute_wins() {
        let mut window = MuteWindow::default();
        let until = window.mute(t0(), Some(5), 10);
        let again = window.mute(t0() + Duration::minutes(1), Some(60), 10);
        assert_eq!(again, until);
        assert_eq!(window.active_until(), Some(until));
    }

    #[test]
    fn window_lapses() {
        let mut window = MuteWindow::default();
        window.mute(t0(), Some(5), 10);
        assert!(window.is_muted(t0() + Duration::minutes(4)));
        // The end instant itself is no longer muted.
        assert!(!window.is_muted(t0() + Duration::minutes(5)));

        assert!(!window.check_and_clear_expired(t0() + Duration::minutes(5)));
        assert!(window.active_until().is_none());
    }

    #[test]
    fn mute_after_lapse_starts_new_window() {
        let mut window = MuteWindow::default();
        window.mute(t0(), Some(5), 10);
        let later = t0() + Duration::minutes(6);
        assert_eq!(window.mute(later, Some(2), 10), later + Duration::minutes(2));
    }

    #[test]
    fn unmute_reports_previous_state() {
        let mut window = MuteWindow::default();
        assert!(!window.unmute(t0()));
        window.mute(t0(), None, 10);
        assert!(window.unmute(t0()));
        assert!(!window.is_muted(t0()));
    }

    #[test]
    fn registry_keeps_chats_apart() {
        let mut registry = MuteRegistry::new();
        registry.mute("a", t0(), Some(5), 10);
        assert!(registry.is_muted("a", t0()));
        assert!(!registry.is_muted("b", t0()));
        assert!(!registry.check_and_clear_expired("b", t0()));
    }

    #[test]
    fn registry_clears_lapsed_window_on_check() {
        let mut registry = MuteRegistry::new();
        registry.mute("a", t0(), Some(5), 10);
        assert!(registry.check_and_clear_expired("a", t0() + Duration::minutes(1)));
        assert!(registry.window("a").is_some());

        assert!(!registry.check_and_clear_expired("a", t0() + Duration::minutes(5)));
        assert!(registry.window("a").is_none());
    }

    #[test]
    fn registry_unmute() {
        let mut registry = MuteRegistry::new();
        assert!(!registry.unmute("a", t0()));
        registry.mute("a", t0(), None, 10);
        assert!(registry.unmute("a", t0()));
        assert!(!registry.is_muted("a", t0()));
    }
}
