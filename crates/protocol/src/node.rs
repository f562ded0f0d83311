use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Class of process in the topology.
///
/// Ordered by numeric value. Everything at or below [`NodeType::GATEWAY`] is
/// never a relay target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeType(pub u32);

impl NodeType {
    /// Pseudo type used as the source of relayed client traffic.
    pub const CLIENT: Self = Self(0);
    pub const GATEWAY: Self = Self(1);
    pub const LOBBY: Self = Self(2);
    pub const MATCH: Self = Self(3);
    pub const ROOM: Self = Self(4);
    pub const LOGIN: Self = Self(5);

    const NAMED: &[(Self, &'static str)] = &[
        (Self::CLIENT, "client"),
        (Self::GATEWAY, "gateway"),
        (Self::LOBBY, "lobby"),
        (Self::MATCH, "match"),
        (Self::ROOM, "room"),
        (Self::LOGIN, "login"),
    ];

    pub fn name(self) -> Option<&'static str> {
        Self::NAMED
            .iter()
            .find(|(t, _)| *t == self)
            .map(|(_, n)| *n)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::NAMED
            .iter()
            .find(|(_, n)| n.eq_ignore_ascii_case(name))
            .map(|(t, _)| *t)
    }

    /// Parse either a known name or a bare number.
    pub fn parse(s: &str) -> Option<Self> {
        Self::from_name(s).or_else(|| s.parse().ok().map(Self))
    }

    /// Whether a client command may be relayed to a node of this type.
    pub fn is_relay_target(self) -> bool {
        self > Self::GATEWAY
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "type-{}", self.0),
        }
    }
}

// Config files spell node types by name; frames carry them as numbers. Both
// spellings deserialize.
impl Serialize for NodeType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.name() {
            Some(name) if serializer.is_human_readable() => serializer.serialize_str(name),
            _ => serializer.serialize_u32(self.0),
        }
    }
}

impl<'de> Deserialize<'de> for NodeType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Num(u32),
            Name(String),
        }

        if !deserializer.is_human_readable() {
            return u32::deserialize(deserializer).map(Self);
        }
        match Repr::deserialize(deserializer)? {
            Repr::Num(n) => Ok(Self(n)),
            Repr::Name(name) => Self::parse(&name)
                .ok_or_else(|| serde::de::Error::custom(format!("unknown node type: {name}"))),
        }
    }
}

/// Identifier of one running backend process.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerId(pub String);

impl ServerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_and_below_are_not_relay_targets() {
        assert!(!NodeType::CLIENT.is_relay_target());
        assert!(!NodeType::GATEWAY.is_relay_target());
        assert!(NodeType::LOBBY.is_relay_target());
        assert!(NodeType(42).is_relay_target());
    }

    #[test]
    fn parse_names_and_numbers() {
        assert_eq!(NodeType::parse("lobby"), Some(NodeType::LOBBY));
        assert_eq!(NodeType::parse("Room"), Some(NodeType::ROOM));
        assert_eq!(NodeType::parse("17"), Some(NodeType(17)));
        assert_eq!(NodeType::parse("nope"), None);
        assert_eq!(NodeType(17).to_string(), "type-17");
    }

    #[test]
    fn json_accepts_name_or_number() {
        let types: Vec<NodeType> = serde_json::from_str(r#"["client", 3, "login"]"#).unwrap();
        assert_eq!(types, vec![NodeType::CLIENT, NodeType::MATCH, NodeType::LOGIN]);
        assert_eq!(serde_json::to_string(&NodeType::LOBBY).unwrap(), r#""lobby""#);
        assert_eq!(serde_json::to_string(&NodeType(9)).unwrap(), "9");
    }
}
