use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies an active inter-zone transfer.
    pub struct TransferId;
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// Identifies an orbital zone (`earth`, `asteroid_belt`, `dyson_sphere`).
    ZoneId
);
string_id!(
    /// Identifies a building definition (`power_station`, `refinery`).
    BuildingId
);
string_id!(
    /// Identifies a research tree. Trees are named after the skill they raise.
    TreeId
);
string_id!(
    /// Identifies a tier inside a research tree.
    TierId
);
string_id!(
    /// Identifies a probe variant. The base game only ships `probe`.
    ProbeType
);

impl ProbeType {
    pub const DEFAULT: &'static str = "probe";

    pub fn default_type() -> Self {
        Self::new(Self::DEFAULT)
    }
}

// ---------------------------------------------------------------------------
// Construction keys
// ---------------------------------------------------------------------------

/// A `"zone::building"` pair naming one construction slot.
///
/// Serialized as the joined string so it can key JSON maps.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ConstructionKey {
    pub zone: ZoneId,
    pub building: BuildingId,
}

impl ConstructionKey {
    pub const SEPARATOR: &'static str = "::";

    pub fn new(zone: ZoneId, building: BuildingId) -> Self {
        Self { zone, building }
    }
}

impl fmt::Display for ConstructionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.zone, Self::SEPARATOR, self.building)
    }
}

/// Returned when a construction key string has no `::` separator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed construction key '{0}', expected 'zone::building'")]
pub struct MalformedConstructionKey(pub String);

impl FromStr for ConstructionKey {
    type Err = MalformedConstructionKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(Self::SEPARATOR) {
            Some((zone, building)) if !zone.is_empty() && !building.is_empty() => {
                Ok(Self::new(ZoneId::from(zone), BuildingId::from(building)))
            }
            _ => Err(MalformedConstructionKey(s.to_string())),
        }
    }
}

impl From<ConstructionKey> for String {
    fn from(key: ConstructionKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for ConstructionKey {
    type Error = MalformedConstructionKey;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zone_ids_order_lexically() {
        let mut ids = vec![ZoneId::from("mars"), ZoneId::from("earth")];
        ids.sort();
        assert_eq!(ids[0].as_str(), "earth");
    }

    #[test]
    fn construction_key_formats_with_separator() {
        let key = ConstructionKey::new("earth".into(), "power_station".into());
        assert_eq!(key.to_string(), "earth::power_station");
    }

    #[test]
    fn construction_key_parses_back() {
        let key: ConstructionKey = "mars::refinery".parse().unwrap();
        assert_eq!(key.zone, ZoneId::from("mars"));
        assert_eq!(key.building, BuildingId::from("refinery"));
    }

    #[test]
    fn construction_key_rejects_missing_parts() {
        assert!("earth".parse::<ConstructionKey>().is_err());
        assert!("::refinery".parse::<ConstructionKey>().is_err());
        assert!("earth::".parse::<ConstructionKey>().is_err());
    }

    #[test]
    fn ids_are_hashable() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(BuildingId::from("power_station"), 1);
        assert_eq!(map[&BuildingId::from("power_station")], 1);
    }
}
