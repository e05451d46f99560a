use std::fmt;
use std::str::FromStr;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an entity in the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The component that registered a scheduled task.
///
/// Opaque to the schedulers: it is carried for attribution and diagnostics and
/// compared by id only, so two owners with the same display name stay distinct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Owner {
    id: Uuid,
    name: String,
}

impl Owner {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for Owner {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Owner {}

impl std::hash::Hash for Owner {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A point in a named world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub world: String,
    pub position: Vec3,
}

impl Location {
    pub fn new(world: impl Into<String>, position: Vec3) -> Self {
        Self {
            world: world.into(),
            position,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{},{},{}",
            self.world, self.position.x, self.position.y, self.position.z
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseLocationError {
    #[error("expected `world:x,y,z`, got `{0}`")]
    Format(String),
    #[error("invalid coordinate `{0}`")]
    Coordinate(String),
}

impl FromStr for Location {
    type Err = ParseLocationError;

    /// Parses `world:x,y,z`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (world, coords) = s
            .split_once(':')
            .filter(|(world, _)| !world.is_empty())
            .ok_or_else(|| ParseLocationError::Format(s.to_string()))?;

        let parts: Vec<&str> = coords.split(',').map(str::trim).collect();
        if parts.len() != 3 {
            return Err(ParseLocationError::Format(s.to_string()));
        }

        let mut xyz = [0.0f32; 3];
        for (slot, part) in xyz.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|_| ParseLocationError::Coordinate(part.to_string()))?;
        }

        Ok(Self::new(world, Vec3::from_array(xyz)))
    }
}

/// Scheduling delay or period, measured in host ticks.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Ticks(pub u64);

impl Ticks {
    pub const ZERO: Ticks = Ticks(0);

    pub fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for Ticks {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for Ticks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}t", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_id_uniqueness() {
        let a = EntityId::new();
        let b = EntityId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn owners_compare_by_id() {
        let a = Owner::new("metrics");
        let b = Owner::new("metrics");
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert_eq!(a.to_string(), "metrics");
    }

    #[test]
    fn location_parses() {
        let loc: Location = "overworld:1.5, 64, -20".parse().unwrap();
        assert_eq!(loc.world, "overworld");
        assert_eq!(loc.position, Vec3::new(1.5, 64.0, -20.0));
    }

    #[test]
    fn location_rejects_bad_input() {
        assert!(matches!(
            "overworld".parse::<Location>(),
            Err(ParseLocationError::Format(_))
        ));
        assert!(matches!(
            ":1,2,3".parse::<Location>(),
            Err(ParseLocationError::Format(_))
        ));
        assert!(matches!(
            "nether:1,two,3".parse::<Location>(),
            Err(ParseLocationError::Coordinate(c)) if c == "two"
        ));
    }

    #[test]
    fn ticks_display() {
        assert_eq!(Ticks(20).to_string(), "20t");
        assert_eq!(Ticks::from(5).get(), 5);
    }
}
