//! Resource identity.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a call through a protected resource.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrafficType {
    /// The resource receives the call (e.g. an inbound RPC handler).
    Inbound,
    /// The resource issues the call (e.g. an outbound RPC/DB client).
    Outbound,
}

impl Default for TrafficType {
    fn default() -> Self {
        TrafficType::Outbound
    }
}

impl fmt::Display for TrafficType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Whether a resource is addressed by a free-form string or a method
/// descriptor. Methods are identified by their fully qualified descriptor,
/// so two `Method` kinds compare equal iff their descriptors match; the
/// name carried alongside is purely informational.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Str,
    Method { descriptor: String },
}

impl Default for ResourceKind {
    fn default() -> Self {
        ResourceKind::Str
    }
}

/// An immutable resource identifier; this is the registry key. For
/// `ResourceKind::Str`, equality and hashing are over `name` +
/// `traffic_type`. For `ResourceKind::Method`, `name` is purely
/// informational (a display label) and is excluded: two method resources
/// with the same descriptor are the same resource no matter what name
/// each call site happens to pass alongside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceId {
    pub name: String,
    pub traffic_type: TrafficType,
    pub kind: ResourceKind,
}

impl PartialEq for ResourceId {
    fn eq(&self, other: &Self) -> bool {
        if self.traffic_type != other.traffic_type {
            return false;
        }
        match (&self.kind, &other.kind) {
            (ResourceKind::Method { descriptor: a }, ResourceKind::Method { descriptor: b }) => {
                a == b
            }
            (ResourceKind::Str, ResourceKind::Str) => self.name == other.name,
            _ => false,
        }
    }
}

impl Eq for ResourceId {}

impl std::hash::Hash for ResourceId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.traffic_type.hash(state);
        match &self.kind {
            ResourceKind::Method { descriptor } => descriptor.hash(state),
            ResourceKind::Str => self.name.hash(state),
        }
    }
}

impl ResourceId {
    pub fn new(name: impl Into<String>, traffic_type: TrafficType) -> Self {
        ResourceId {
            name: name.into(),
            traffic_type,
            kind: ResourceKind::Str,
        }
    }

    pub fn new_method(
        name: impl Into<String>,
        traffic_type: TrafficType,
        descriptor: impl Into<String>,
    ) -> Self {
        ResourceId {
            name: name.into(),
            traffic_type,
            kind: ResourceKind::Method {
                descriptor: descriptor.into(),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn traffic_type(&self) -> TrafficType {
        self.traffic_type
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?})", self.name, self.traffic_type)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn equality_is_by_all_fields() {
        let a = ResourceId::new("foo", TrafficType::Inbound);
        let b = ResourceId::new("foo", TrafficType::Inbound);
        let c = ResourceId::new("foo", TrafficType::Outbound);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn method_kind_compares_by_descriptor() {
        let a = ResourceId::new_method("Svc.Call", TrafficType::Inbound, "com.pkg.Svc#call()");
        let b = ResourceId::new_method("Svc.Call", TrafficType::Inbound, "com.pkg.Svc#call()");
        let c = ResourceId::new_method("Svc.Call", TrafficType::Inbound, "com.pkg.Svc#other()");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn method_kind_ignores_name_in_equality_and_hash() {
        let a = ResourceId::new_method("FriendlyName", TrafficType::Inbound, "com.pkg.Svc#call()");
        let b = ResourceId::new_method("OtherName", TrafficType::Inbound, "com.pkg.Svc#call()");
        assert_eq!(a, b);

        let mut set = std::collections::HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }
}
