//! Item identity: the key fungible units are aggregated under.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Composite key of a fungible item class: canonical type name + variant.
///
/// Two slots holding equal identities are interchangeable for allocation.
/// Kept as a structured pair rather than a joined string so `"a:b" + 1`
/// can never collide with `"a:b1"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemIdentity {
    pub name: String,
    #[serde(default)]
    pub damage: u32,
}

impl ItemIdentity {
    pub fn new(name: impl Into<String>, damage: u32) -> Self {
        Self {
            name: name.into(),
            damage,
        }
    }

    /// Parse `name` or `name@damage` (the form the line driver accepts).
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        let s = s.trim();
        let (name, damage) = match s.rsplit_once('@') {
            Some((name, damage)) => {
                let damage = damage
                    .parse::<u32>()
                    .map_err(|e| DomainError::validation(format!("item damage `{damage}`: {e}")))?;
                (name, damage)
            }
            None => (s, 0),
        };
        if name.is_empty() {
            return Err(DomainError::validation("item name cannot be empty"));
        }
        Ok(Self::new(name, damage))
    }
}

impl core::fmt::Display for ItemIdentity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.damage == 0 {
            f.write_str(&self.name)
        } else {
            write!(f, "{}@{}", self.name, self.damage)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_key_does_not_collide_like_string_join() {
        let a = ItemIdentity::new("mod:plate1", 1);
        let b = ItemIdentity::new("mod:plate", 11);
        assert_ne!(a, b);
    }

    #[test]
    fn parse_accepts_optional_damage() {
        assert_eq!(
            ItemIdentity::parse("minecraft:wool@14").unwrap(),
            ItemIdentity::new("minecraft:wool", 14)
        );
        assert_eq!(
            ItemIdentity::parse(" minecraft:stone ").unwrap(),
            ItemIdentity::new("minecraft:stone", 0)
        );
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(ItemIdentity::parse("").is_err());
        assert!(ItemIdentity::parse("@3").is_err());
        assert!(ItemIdentity::parse("minecraft:wool@red").is_err());
    }

    #[test]
    fn display_omits_zero_damage() {
        assert_eq!(ItemIdentity::new("minecraft:dirt", 0).to_string(), "minecraft:dirt");
        assert_eq!(ItemIdentity::new("minecraft:dye", 4).to_string(), "minecraft:dye@4");
    }
}
