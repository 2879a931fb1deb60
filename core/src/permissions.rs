//! Mode & Permission Manager (spec §4.3).

use std::collections::HashMap;
use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;
use std::sync::RwLock;

use writeflow_protocol::GrantType;
use writeflow_protocol::Mode;
use writeflow_protocol::PermissionDecision;
use writeflow_protocol::PermissionLevel;
use writeflow_protocol::PermissionPolicy;

/// Per-policy usage counters (spec §4.3: `sessionUsage`, `deniedCount`).
#[derive(Debug, Default, Clone, Copy)]
pub struct PolicyUsage {
    pub session_usage: u32,
    pub denied_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionDenial {
    ModeNotAllowed,
    AlwaysDeny,
    MaxPerSessionExceeded,
    NoOneTimeGrant,
}

struct State {
    mode: Mode,
    session_grants: HashSet<String>,
    one_time_grants: HashSet<String>,
    usage: HashMap<String, PolicyUsage>,
}

/// Tracks the current mode and the three grant sets (`alwaysAllow` is
/// static, carried on each `PermissionPolicy`), gating tool calls per
/// spec §4.3's six-step `checkToolPermission` algorithm.
pub struct PermissionManager {
    policies: HashMap<String, PermissionPolicy>,
    working_dir: PathBuf,
    state: RwLock<State>,
}

pub struct CheckContext<'a> {
    pub input_path: Option<&'a Path>,
    pub auto_approve: bool,
}

impl Default for CheckContext<'_> {
    fn default() -> Self {
        Self {
            input_path: None,
            auto_approve: false,
        }
    }
}

impl PermissionManager {
    pub fn new(policies: Vec<PermissionPolicy>, working_dir: PathBuf) -> Self {
        Self {
            policies: policies.into_iter().map(|p| (p.tool_name.clone(), p)).collect(),
            working_dir,
            state: RwLock::new(State {
                mode: Mode::Default,
                session_grants: HashSet::new(),
                one_time_grants: HashSet::new(),
                usage: HashMap::new(),
            }),
        }
    }

    pub fn mode(&self) -> Mode {
        self.state.read().expect("permission state lock poisoned").mode
    }

    /// Levels reachable in each mode. `BypassPermissions` widens the set
    /// to include `Dangerous` (spec §4.3).
    fn allowed_levels(mode: Mode) -> &'static [PermissionLevel] {
        use PermissionLevel::*;
        match mode {
            Mode::Plan => &[ReadOnly],
            Mode::Default => &[ReadOnly, SafeWrite, NetworkAccess],
            Mode::AcceptEdits => &[ReadOnly, SafeWrite, SystemModify, NetworkAccess],
            Mode::BypassPermissions => &[ReadOnly, SafeWrite, SystemModify, NetworkAccess, Dangerous],
        }
    }

    /// Entering any mode clears one-time grants; entering `Plan`
    /// additionally clears session grants (spec §4.3, invariant P7).
    pub fn transition_mode(&self, mode: Mode) {
        let mut state = self.state.write().expect("permission state lock poisoned");
        state.mode = mode;
        state.one_time_grants.clear();
        if mode.purges_session_grants() {
            state.session_grants.clear();
        }
    }

    pub fn grant_one_time(&self, tool_name: &str) {
        self.state
            .write()
            .expect("permission state lock poisoned")
            .one_time_grants
            .insert(tool_name.to_string());
    }

    pub fn grant_session(&self, tool_name: &str) {
        self.state
            .write()
            .expect("permission state lock poisoned")
            .session_grants
            .insert(tool_name.to_string());
    }

    pub fn one_time_grants_empty(&self) -> bool {
        self.state.read().expect("permission state lock poisoned").one_time_grants.is_empty()
    }

    pub fn session_grants_empty(&self) -> bool {
        self.state.read().expect("permission state lock poisoned").session_grants.is_empty()
    }

    fn is_write_tool_within_working_dir(&self, policy: &PermissionPolicy, ctx: &CheckContext) -> bool {
        if policy.level != PermissionLevel::SafeWrite {
            return false;
        }
        let Some(path) = ctx.input_path else {
            return false;
        };
        let Ok(canonical_root) = std::fs::canonicalize(&self.working_dir) else {
            return false;
        };
        let joined = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.working_dir.join(path)
        };
        // Canonicalize only the parent so untouched paths still resolve.
        let parent = joined.parent().unwrap_or(&joined);
        std::fs::canonicalize(parent)
            .map(|canonical_parent| canonical_parent.starts_with(&canonical_root))
            .unwrap_or(false)
    }

    /// Six-step `checkToolPermission` (spec §4.3).
    pub fn check(&self, tool_name: &str, ctx: &CheckContext) -> Result<PermissionDecision, PermissionDenial> {
        let mode = self.mode();
        let policy = match self.policies.get(tool_name) {
            Some(p) => p,
            // No explicit policy: default to ReadOnly-equivalent allowance
            // gated purely by mode.
            None => {
                return if Self::allowed_levels(mode).contains(&PermissionLevel::ReadOnly) {
                    Ok(PermissionDecision::Allowed)
                } else {
                    Err(PermissionDenial::ModeNotAllowed)
                };
            }
        };

        // 1. Mode must permit this policy's level.
        if !Self::allowed_levels(mode).contains(&policy.level) {
            self.record_denied(tool_name);
            return Err(PermissionDenial::ModeNotAllowed);
        }

        // 2. AlwaysDeny.
        if policy.grant_type == GrantType::AlwaysDeny {
            self.record_denied(tool_name);
            return Err(PermissionDenial::AlwaysDeny);
        }

        // 3. maxPerSession applies regardless of grant type, including
        // AlwaysAllow: a cap is meaningless if AlwaysAllow bypasses it.
        if let Some(max) = policy.max_per_session {
            let used = self
                .state
                .read()
                .expect("permission state lock poisoned")
                .usage
                .get(tool_name)
                .map(|u| u.session_usage)
                .unwrap_or(0);
            if used >= max {
                self.record_denied(tool_name);
                return Err(PermissionDenial::MaxPerSessionExceeded);
            }
        }

        // 4. AlwaysAllow.
        if policy.grant_type == GrantType::AlwaysAllow {
            self.record_allowed(tool_name);
            return Ok(PermissionDecision::Allowed);
        }

        match policy.grant_type {
            GrantType::OneTimeGrant => {
                let consumed = {
                    let mut state = self.state.write().expect("permission state lock poisoned");
                    state.one_time_grants.remove(tool_name)
                };
                if consumed {
                    self.record_allowed(tool_name);
                    Ok(PermissionDecision::Allowed)
                } else if ctx.auto_approve {
                    self.record_allowed(tool_name);
                    Ok(PermissionDecision::Allowed)
                } else {
                    Ok(PermissionDecision::Ask)
                }
            }
            GrantType::SessionGrant => {
                let granted = self
                    .state
                    .read()
                    .expect("permission state lock poisoned")
                    .session_grants
                    .contains(tool_name);
                if granted || self.is_write_tool_within_working_dir(policy, ctx) {
                    if !granted {
                        self.grant_session(tool_name);
                    }
                    self.record_allowed(tool_name);
                    Ok(PermissionDecision::Allowed)
                } else {
                    self.record_denied(tool_name);
                    Err(PermissionDenial::NoOneTimeGrant)
                }
            }
            _ => {
                self.record_allowed(tool_name);
                Ok(PermissionDecision::Allowed)
            }
        }
    }

    fn record_allowed(&self, tool_name: &str) {
        let mut state = self.state.write().expect("permission state lock poisoned");
        state.usage.entry(tool_name.to_string()).or_default().session_usage += 1;
    }

    fn record_denied(&self, tool_name: &str) {
        let mut state = self.state.write().expect("permission state lock poisoned");
        state.usage.entry(tool_name.to_string()).or_default().denied_count += 1;
    }

    pub fn usage_of(&self, tool_name: &str) -> PolicyUsage {
        self.state
            .read()
            .expect("permission state lock poisoned")
            .usage
            .get(tool_name)
            .copied()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use writeflow_protocol::PermissionPolicy;

    fn manager_with(policies: Vec<PermissionPolicy>) -> PermissionManager {
        PermissionManager::new(policies, std::env::temp_dir())
    }

    #[test]
    fn plan_mode_denies_system_modify() {
        let mgr = manager_with(vec![PermissionPolicy::always_allow(
            "publish_article",
            PermissionLevel::SystemModify,
        )]);
        mgr.transition_mode(Mode::Plan);
        let result = mgr.check("publish_article", &CheckContext::default());
        assert_eq!(result, Err(PermissionDenial::ModeNotAllowed));
    }

    #[test]
    fn plan_mode_purges_both_grant_sets() {
        let mgr = manager_with(vec![]);
        mgr.grant_one_time("t");
        mgr.grant_session("t");
        mgr.transition_mode(Mode::Plan);
        assert!(mgr.one_time_grants_empty());
        assert!(mgr.session_grants_empty());
    }

    #[test]
    fn always_deny_wins_even_in_bypass() {
        let mgr = manager_with(vec![PermissionPolicy {
            tool_name: "run_shell".into(),
            level: PermissionLevel::Dangerous,
            grant_type: GrantType::AlwaysDeny,
            max_per_session: None,
            require_confirmation: false,
        }]);
        mgr.transition_mode(Mode::BypassPermissions);
        assert_eq!(
            mgr.check("run_shell", &CheckContext::default()),
            Err(PermissionDenial::AlwaysDeny)
        );
    }

    #[test]
    fn one_time_grant_is_consumed() {
        let mgr = manager_with(vec![PermissionPolicy {
            tool_name: "fetch_url".into(),
            level: PermissionLevel::NetworkAccess,
            grant_type: GrantType::OneTimeGrant,
            max_per_session: None,
            require_confirmation: false,
        }]);
        assert_eq!(
            mgr.check("fetch_url", &CheckContext::default()),
            Ok(PermissionDecision::Ask)
        );
        mgr.grant_one_time("fetch_url");
        assert_eq!(
            mgr.check("fetch_url", &CheckContext::default()),
            Ok(PermissionDecision::Allowed)
        );
        // Consumed: asking again without a fresh grant goes back to Ask.
        assert_eq!(
            mgr.check("fetch_url", &CheckContext::default()),
            Ok(PermissionDecision::Ask)
        );
    }

    #[test]
    fn max_per_session_enforced() {
        let mgr = manager_with(vec![PermissionPolicy {
            tool_name: "fetch_url".into(),
            level: PermissionLevel::NetworkAccess,
            grant_type: GrantType::AlwaysAllow,
            max_per_session: Some(1),
            require_confirmation: false,
        }]);
        assert_eq!(
            mgr.check("fetch_url", &CheckContext::default()),
            Ok(PermissionDecision::Allowed)
        );
        assert_eq!(
            mgr.check("fetch_url", &CheckContext::default()),
            Err(PermissionDenial::MaxPerSessionExceeded)
        );
    }

    #[test]
    fn working_directory_trust_grants_session_implicitly() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = PermissionManager::new(
            vec![PermissionPolicy {
                tool_name: "write_draft".into(),
                level: PermissionLevel::SafeWrite,
                grant_type: GrantType::SessionGrant,
                max_per_session: None,
                require_confirmation: false,
            }],
            dir.path().to_path_buf(),
        );
        let ctx = CheckContext {
            input_path: Some(std::path::Path::new("draft.md")),
            auto_approve: false,
        };
        assert_eq!(mgr.check("write_draft", &ctx), Ok(PermissionDecision::Allowed));
        assert!(!mgr.session_grants_empty());
    }
}
