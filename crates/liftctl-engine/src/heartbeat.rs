use tokio::time::Instant;

/// Supervisor phase, derived from [`HeartbeatState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatPhase {
    Idle,
    ProbeSent,
    PanelLocked,
}

/// Liveness bookkeeping, owned by the engine task.
///
/// ```text
/// Idle -> ProbeSent -> Acked -> Idle
///                   -> Abandoned -> PanelLocked -> (next ack) -> Idle
/// ```
#[derive(Debug, Default, Clone)]
pub struct HeartbeatState {
    last_probe: Option<Instant>,
    awaiting: bool,
    panel_locked: bool,
}

impl HeartbeatState {
    /// A new probe is only sent once the previous one resolved.
    pub fn should_probe(&self) -> bool {
        !self.awaiting
    }

    pub fn probe_sent(&mut self, now: Instant) {
        self.last_probe = Some(now);
        self.awaiting = true;
    }

    /// A heartbeat reply arrived. Returns `true` if this released the panel.
    pub fn acknowledged(&mut self) -> bool {
        self.awaiting = false;
        std::mem::replace(&mut self.panel_locked, false)
    }

    /// A heartbeat reply arrived with no probe on the wire. The device is
    /// alive so the panel is released, but an outstanding probe stays
    /// outstanding. Returns `true` if this released the panel.
    pub fn unsolicited_reply(&mut self) -> bool {
        std::mem::replace(&mut self.panel_locked, false)
    }

    /// The transport gave up on a heartbeat. Returns `true` if this locked
    /// the panel.
    pub fn abandoned(&mut self) -> bool {
        if !self.awaiting {
            return false;
        }
        self.awaiting = false;
        !std::mem::replace(&mut self.panel_locked, true)
    }

    /// Forget an outstanding probe, e.g. after the link was replaced.
    pub fn reset_probe(&mut self) {
        self.awaiting = false;
    }

    pub fn awaiting(&self) -> bool {
        self.awaiting
    }

    pub fn panel_locked(&self) -> bool {
        self.panel_locked
    }

    pub fn last_probe(&self) -> Option<Instant> {
        self.last_probe
    }

    pub fn phase(&self) -> HeartbeatPhase {
        if self.panel_locked && !self.awaiting {
            HeartbeatPhase::PanelLocked
        } else if self.awaiting {
            HeartbeatPhase::ProbeSent
        } else {
            HeartbeatPhase::Idle
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_then_ack_returns_to_idle() {
        let mut hb = HeartbeatState::default();
        assert!(hb.should_probe());
        hb.probe_sent(Instant::now());
        assert_eq!(hb.phase(), HeartbeatPhase::ProbeSent);
        assert!(!hb.should_probe());

        assert!(!hb.acknowledged());
        assert_eq!(hb.phase(), HeartbeatPhase::Idle);
        assert!(hb.last_probe().is_some());
    }

    #[test]
    fn abandonment_locks_until_next_ack() {
        let mut hb = HeartbeatState::default();
        hb.probe_sent(Instant::now());
        assert!(hb.abandoned());
        assert_eq!(hb.phase(), HeartbeatPhase::PanelLocked);

        // A second failed probe does not lock again.
        hb.probe_sent(Instant::now());
        assert!(!hb.abandoned());
        assert!(hb.panel_locked());

        hb.probe_sent(Instant::now());
        assert!(hb.acknowledged());
        assert!(!hb.panel_locked());
    }

    #[test]
    fn stray_reply_keeps_queued_probe_outstanding() {
        let mut hb = HeartbeatState::default();
        hb.probe_sent(Instant::now());
        assert!(!hb.unsolicited_reply());
        assert!(hb.awaiting());
        assert!(hb.abandoned());
        assert!(hb.panel_locked());

        assert!(hb.unsolicited_reply());
        assert!(!hb.panel_locked());
    }

    #[test]
    fn abandonment_without_probe_is_ignored() {
        let mut hb = HeartbeatState::default();
        assert!(!hb.abandoned());
        assert!(!hb.panel_locked());
    }
}
