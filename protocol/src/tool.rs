use serde::Deserialize;
use serde::Serialize;

/// Classification of a tool's side-effect class (spec §3, Tool; GLOSSARY).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionLevel {
    ReadOnly,
    SafeWrite,
    SystemModify,
    NetworkAccess,
    Dangerous,
}

/// Authorization kind attached to a tool/policy (spec §3, PermissionPolicy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    AlwaysAllow,
    SessionGrant,
    OneTimeGrant,
    AlwaysDeny,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionPolicy {
    pub tool_name: String,
    pub level: PermissionLevel,
    pub grant_type: GrantType,
    pub max_per_session: Option<u32>,
    pub require_confirmation: bool,
}

impl PermissionPolicy {
    pub fn always_allow(tool_name: impl Into<String>, level: PermissionLevel) -> Self {
        Self {
            tool_name: tool_name.into(),
            level,
            grant_type: GrantType::AlwaysAllow,
            max_per_session: None,
            require_confirmation: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionDecision {
    Allowed,
    Denied,
    Ask,
}
