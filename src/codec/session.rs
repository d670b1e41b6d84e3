/// Whether the request ID carries a running session counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionHandling {
    /// Session IDs run 0x0001..=0xFFFF and wrap back to 0x0001.
    #[default]
    Enabled,
    /// Session IDs are always zero.
    Disabled,
}

impl From<bool> for SessionHandling {
    fn from(enabled: bool) -> Self {
        if enabled { SessionHandling::Enabled } else { SessionHandling::Disabled }
    }
}

/// Returns the session ID that follows `prev`.
pub fn increment_session_id(prev: u16, handling: SessionHandling) -> u16 {
    match handling {
        SessionHandling::Disabled => 0,
        SessionHandling::Enabled if prev == 0xFFFF => 0x0001,
        SessionHandling::Enabled => prev + 1,
    }
}

/// Session counter of one sender channel (e.g. SD multicast or SD unicast).
#[derive(Debug, Clone)]
pub struct SessionCounter {
    current: u16,
    handling: SessionHandling,
    wrapped: bool,
}

impl SessionCounter {
    /// Starts at zero, so the first [`next`](Self::next) yields 1.
    pub fn new(handling: SessionHandling) -> Self {
        SessionCounter {
            current: 0,
            handling,
            wrapped: false,
        }
    }

    pub fn next(&mut self) -> u16 {
        let next = increment_session_id(self.current, self.handling);
        if self.current == 0xFFFF && next == 0x0001 {
            self.wrapped = true;
        }
        self.current = next;
        next
    }

    pub fn current(&self) -> u16 {
        self.current
    }

    /// True once the counter has gone through a full 0xFFFF -> 0x0001 cycle.
    pub fn has_wrapped(&self) -> bool {
        self.wrapped
    }
}

impl Default for SessionCounter {
    fn default() -> Self {
        Self::new(SessionHandling::Enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_increment() {
        let mut counter = SessionCounter::new(SessionHandling::Enabled);

        assert_eq!(counter.next(), 1);
        assert_eq!(counter.next(), 2);
        assert_eq!(counter.next(), 3);
        assert!(!counter.has_wrapped());
    }

    #[test]
    fn test_session_id_wrap_skips_zero() {
        assert_eq!(increment_session_id(0xFFFE, SessionHandling::Enabled), 0xFFFF);
        assert_eq!(increment_session_id(0xFFFF, SessionHandling::Enabled), 0x0001);

        let mut counter = SessionCounter::new(SessionHandling::Enabled);
        counter.current = 0xFFFF;
        assert_eq!(counter.next(), 1);
        assert!(counter.has_wrapped());
    }

    #[test]
    fn test_disabled_session_handling_is_pinned_to_zero() {
        let mut counter = SessionCounter::new(SessionHandling::Disabled);
        assert_eq!(counter.next(), 0);
        assert_eq!(counter.next(), 0);
        assert_eq!(increment_session_id(0x1234, SessionHandling::Disabled), 0);
        assert!(!counter.has_wrapped());
    }
}
