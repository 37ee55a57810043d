use redb::TableDefinition;

/// Credentials in insertion order: slot -> CredentialRecord (bincode)
pub const CREDENTIALS: TableDefinition<u64, &[u8]> = TableDefinition::new("credentials");

/// Secondary index: identity -> slot in CREDENTIALS
pub const CREDENTIAL_INDEX: TableDefinition<&str, u64> = TableDefinition::new("credential_index");

/// Nodes in insertion order: slot -> NodeRecord (bincode)
pub const NODES: TableDefinition<u64, &[u8]> = TableDefinition::new("nodes");

/// Secondary index: node name -> slot in NODES
pub const NODE_INDEX: TableDefinition<&str, u64> = TableDefinition::new("node_index");
