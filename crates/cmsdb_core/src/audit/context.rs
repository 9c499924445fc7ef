//! Request metadata attached to every audited mutation.

use serde::{Deserialize, Serialize};

/// Identity and request metadata for one mutation.
///
/// Built by the transport layer from an authenticated session and carried by
/// value into every `ChangeEvent`. Fields are read-only after construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuditContext {
    actor_id: String,
    node_id: String,
    request_id: String,
    client_addr: String,
}

impl AuditContext {
    pub fn new(
        actor_id: impl Into<String>,
        node_id: impl Into<String>,
        request_id: impl Into<String>,
        client_addr: impl Into<String>,
    ) -> Self {
        Self {
            actor_id: actor_id.into(),
            node_id: node_id.into(),
            request_id: request_id.into(),
            client_addr: client_addr.into(),
        }
    }

    /// Acting user identifier.
    pub fn actor_id(&self) -> &str {
        &self.actor_id
    }

    /// Identifier of the node that accepted the request.
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Request correlation identifier.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Client network address as reported upstream.
    pub fn client_addr(&self) -> &str {
        &self.client_addr
    }
}

#[cfg(test)]
mod tests {
    use super::AuditContext;

    #[test]
    fn equality_covers_every_field() {
        let base = AuditContext::new("user-1", "node-a", "req-1", "10.0.0.1");
        assert_eq!(base, base.clone());
        assert_ne!(
            base,
            AuditContext::new("user-1", "node-a", "req-2", "10.0.0.1")
        );
        assert_ne!(
            base,
            AuditContext::new("user-1", "node-b", "req-1", "10.0.0.1")
        );
    }

    #[test]
    fn serializes_with_field_names() {
        let ctx = AuditContext::new("user-1", "node-a", "req-1", "10.0.0.1");
        let value = serde_json::to_value(&ctx).expect("context should serialize");
        assert_eq!(value["actor_id"], "user-1");
        assert_eq!(value["client_addr"], "10.0.0.1");
    }
}
