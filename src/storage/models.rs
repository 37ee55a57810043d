use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user's access credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Opaque secret handed to the user's VPN client (usually UUID-shaped)
    pub credential: String,
    /// Unique, non-empty user identity
    pub identity: String,
}

impl CredentialRecord {
    pub fn new(identity: impl Into<String>, credential: impl Into<String>) -> Self {
        Self {
            credential: credential.into(),
            identity: identity.into(),
        }
    }
}

/// A registered VPN node and the endpoint clients connect to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub host: String,
    /// Unique key within the topology
    pub name: String,
    pub port: u16,
    /// Always serialized, as `null` when absent
    #[serde(default)]
    pub region: Option<String>,
}

/// Whole-state copy of credentials and topology, composed by the master
/// on every pull and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub nodes: Vec<NodeRecord>,
    /// When the master composed this snapshot
    pub timestamp: DateTime<Utc>,
    /// identity -> credential
    pub users: BTreeMap<String, String>,
}

impl Snapshot {
    pub fn compose(
        credentials: Vec<CredentialRecord>,
        nodes: Vec<NodeRecord>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let users = credentials
            .into_iter()
            .map(|record| (record.identity, record.credential))
            .collect();

        Self {
            nodes,
            timestamp,
            users,
        }
    }

    /// Look up the credential for a user identity
    pub fn credential(&self, identity: &str) -> Option<&str> {
        self.users.get(identity).map(String::as_str)
    }
}
