// -
// Database namespaces

/// Sled database tree namespaces
pub(crate) const METADATA_TREE: &str = "_metadata";
pub(crate) const SEQUENCE_TREE: &str = "_sequences";
pub(crate) const TOPIC_TREE_PREFIX: &str = "topic_";

/// Sled entry key namespaces
pub(crate) const METADATA_KEY_GENERATION_ID: &str = "_generation_id";
