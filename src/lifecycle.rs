//! Shared vocabulary for the start/stop lifecycles.
//!
//! Both the visualization and the recording lifecycle are two-state machines
//! (`Idle` and running). Every transition request reports what actually
//! happened so callers can tell a real transition from a guarded no-op.

use std::fmt;

/// Outcome of a start or stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The lifecycle left `Idle`
    Started,
    /// The lifecycle returned to `Idle`
    Stopped,
    /// The request was not valid from the current state and changed nothing
    Ignored,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started => write!(f, "started"),
            Self::Stopped => write!(f, "stopped"),
            Self::Ignored => write!(f, "ignored"),
        }
    }
}

/// Enablement of a start/stop control pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToggleControls {
    pub start_enabled: bool,
    pub stop_enabled: bool,
}

impl ToggleControls {
    /// Controls for a lifecycle that is (or is not) currently running.
    pub fn for_running(running: bool) -> Self {
        Self {
            start_enabled: !running,
            stop_enabled: running,
        }
    }
}

/// Enablement of every affordance on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Controls {
    pub visualization: ToggleControls,
    pub recording: ToggleControls,
    /// Download and play become available once a recording has finalized
    pub download_enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_controls_flip_with_state() {
        let idle = ToggleControls::for_running(false);
        assert!(idle.start_enabled);
        assert!(!idle.stop_enabled);

        let running = ToggleControls::for_running(true);
        assert!(!running.start_enabled);
        assert!(running.stop_enabled);
    }
}
