//! Tenant identity.
//!
//! Every node and edge carries a `tenant_id` property; all scoped queries filter
//! on it. The key is built from whichever of `{user, agent, session}` the caller
//! supplies, first match wins:
//!
//! | supplied            | key                        | type       |
//! |---------------------|----------------------------|------------|
//! | session (any mix)   | `session:{session}`        | `Session`  |
//! | user + agent        | `user:{user}:agent:{agent}`| `Combined` |
//! | agent               | `agent:{agent}`            | `Agent`    |
//! | user                | `user:{user}`              | `User`     |
//!
//! Empty strings count as absent.

use crate::error::TenantError;
use crate::model::Metadata;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Caller-supplied identifiers. Any non-empty subset is valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantSelector {
    /// End user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Agent (shared across users when used alone)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    /// Conversation session (temporary scope)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl TenantSelector {
    /// Selector scoped to one user.
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }

    /// Selector scoped to one agent.
    pub fn agent(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: Some(agent_id.into()),
            ..Self::default()
        }
    }

    /// Selector scoped to one session.
    pub fn session(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            ..Self::default()
        }
    }

    /// Add a user id.
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Add an agent id.
    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    /// Add a session id.
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    fn user_ref(&self) -> Option<&str> {
        present(&self.user_id)
    }

    fn agent_ref(&self) -> Option<&str> {
        present(&self.agent_id)
    }

    fn session_ref(&self) -> Option<&str> {
        present(&self.session_id)
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// How a tenant key was scoped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantType {
    /// `user:{id}`, persistent per user
    User,
    /// `agent:{id}`, shared by everyone talking to the agent
    Agent,
    /// `session:{id}`, temporary
    Session,
    /// `user:{u}:agent:{a}`
    Combined,
}

impl TenantType {
    /// Lowercase name used in metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Agent => "agent",
            Self::Session => "session",
            Self::Combined => "combined",
        }
    }
}

impl fmt::Display for TenantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved scoping key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TenantId {
    key: String,
    tenant_type: TenantType,
}

impl TenantId {
    /// Resolve selectors into a key. Pure; fails only when nothing was supplied.
    pub fn resolve(selector: &TenantSelector) -> Result<Self, TenantError> {
        let (key, tenant_type) = match (
            selector.user_ref(),
            selector.agent_ref(),
            selector.session_ref(),
        ) {
            (_, _, Some(session)) => (format!("session:{session}"), TenantType::Session),
            (Some(user), Some(agent), None) => {
                (format!("user:{user}:agent:{agent}"), TenantType::Combined)
            }
            (None, Some(agent), None) => (format!("agent:{agent}"), TenantType::Agent),
            (Some(user), None, None) => (format!("user:{user}"), TenantType::User),
            (None, None, None) => return Err(TenantError::NoIdentifier),
        };
        Ok(Self { key, tenant_type })
    }

    /// The opaque key stored on every node and edge.
    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// Scope classification.
    pub fn tenant_type(&self) -> TenantType {
        self.tenant_type
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.key
    }
}

/// Description of a resolved tenant, echoed back in results and merged into
/// episode metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantInfo {
    /// Resolved key
    pub tenant_id: String,
    /// Scope classification
    pub tenant_type: TenantType,
    /// User id as supplied
    pub user_id: Option<String>,
    /// Agent id as supplied
    pub agent_id: Option<String>,
    /// Session id as supplied
    pub session_id: Option<String>,
}

impl TenantInfo {
    /// Resolve and describe in one step.
    pub fn resolve(selector: &TenantSelector) -> Result<(TenantId, Self), TenantError> {
        let tenant = TenantId::resolve(selector)?;
        let info = Self {
            tenant_id: tenant.as_str().to_string(),
            tenant_type: tenant.tenant_type(),
            user_id: selector.user_ref().map(str::to_string),
            agent_id: selector.agent_ref().map(str::to_string),
            session_id: selector.session_ref().map(str::to_string),
        };
        Ok((tenant, info))
    }

    /// Flatten into a metadata map. Absent ids become JSON null.
    pub fn to_metadata(&self) -> Metadata {
        let mut map = Metadata::new();
        map.insert("tenant_id".into(), Value::String(self.tenant_id.clone()));
        map.insert(
            "tenant_type".into(),
            Value::String(self.tenant_type.as_str().to_string()),
        );
        map.insert("user_id".into(), opt_value(&self.user_id));
        map.insert("agent_id".into(), opt_value(&self.agent_id));
        map.insert("session_id".into(), opt_value(&self.session_id));
        map
    }
}

fn opt_value(value: &Option<String>) -> Value {
    value.clone().map(Value::String).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn sel(user: Option<&str>, agent: Option<&str>, session: Option<&str>) -> TenantSelector {
        TenantSelector {
            user_id: user.map(String::from),
            agent_id: agent.map(String::from),
            session_id: session.map(String::from),
        }
    }

    #[test_case(Some("a"), Some("b"), Some("c"), "session:c", TenantType::Session ; "session wins over all")]
    #[test_case(None, None, Some("c"), "session:c", TenantType::Session ; "session only")]
    #[test_case(Some("a"), None, Some("c"), "session:c", TenantType::Session ; "session wins over user")]
    #[test_case(Some("a"), Some("b"), None, "user:a:agent:b", TenantType::Combined ; "user and agent")]
    #[test_case(None, Some("b"), None, "agent:b", TenantType::Agent ; "agent only")]
    #[test_case(Some("a"), None, None, "user:a", TenantType::User ; "user only")]
    #[test_case(Some("a"), Some(""), Some(""), "user:a", TenantType::User ; "empty strings are absent")]
    fn test_resolution_priority(
        user: Option<&str>,
        agent: Option<&str>,
        session: Option<&str>,
        key: &str,
        tenant_type: TenantType,
    ) {
        let tenant = TenantId::resolve(&sel(user, agent, session)).unwrap();
        assert_eq!(tenant.as_str(), key);
        assert_eq!(tenant.tenant_type(), tenant_type);
    }

    #[test]
    fn test_no_identifier_fails() {
        assert_eq!(
            TenantId::resolve(&TenantSelector::default()),
            Err(TenantError::NoIdentifier)
        );
        assert_eq!(
            TenantId::resolve(&sel(Some(""), None, Some(""))),
            Err(TenantError::NoIdentifier)
        );
    }

    #[test]
    fn test_info_metadata() {
        let (tenant, info) =
            TenantInfo::resolve(&TenantSelector::user("alice").with_agent("helper")).unwrap();
        assert_eq!(tenant.as_str(), "user:alice:agent:helper");

        let meta = info.to_metadata();
        assert_eq!(meta["tenant_id"], "user:alice:agent:helper");
        assert_eq!(meta["tenant_type"], "combined");
        assert_eq!(meta["user_id"], "alice");
        assert_eq!(meta["agent_id"], "helper");
        assert!(meta["session_id"].is_null());
    }

    #[test]
    fn test_tenant_type_serializes_lowercase() {
        let json = serde_json::to_string(&TenantType::Combined).unwrap();
        assert_eq!(json, "\"combined\"");
    }
}
