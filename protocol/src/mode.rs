use serde::Deserialize;
use serde::Serialize;

/// Global execution posture. Shapes permission decisions in the Mode &
/// Permission Manager (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Default,
    Plan,
    AcceptEdits,
    BypassPermissions,
}

impl Mode {
    /// Entering this mode clears session-scoped grants in addition to the
    /// one-time grants every transition clears.
    pub fn purges_session_grants(self) -> bool {
        matches!(self, Mode::Plan)
    }
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Default
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_plan_purges_session_grants() {
        assert!(Mode::Plan.purges_session_grants());
        assert!(!Mode::Default.purges_session_grants());
        assert!(!Mode::AcceptEdits.purges_session_grants());
        assert!(!Mode::BypassPermissions.purges_session_grants());
    }
}
