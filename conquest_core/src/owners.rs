use std::fmt;

use conquest_proto::OwnerType;
use serde::{Deserialize, Serialize};

/// Identifier for a faction contesting control points.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FactionId(pub i64);

impl fmt::Display for FactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for a connected player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub i64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for a world entity (grids in particular).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub i64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Host lookup from a player to the faction they belong to.
pub trait FactionDirectory {
    fn faction_of(&self, player: PlayerId) -> Option<FactionId>;
}

/// Owner of a fleet: a whole faction, or a player running solo.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FleetOwner {
    Faction(FactionId),
    Player(PlayerId),
}

impl FleetOwner {
    /// Players in a faction share the faction's fleet; everyone else owns their own.
    pub fn resolve<D: FactionDirectory + ?Sized>(player: PlayerId, directory: &D) -> Self {
        match directory.faction_of(player) {
            Some(faction) => FleetOwner::Faction(faction),
            None => FleetOwner::Player(player),
        }
    }

    pub fn owner_type(&self) -> OwnerType {
        match self {
            FleetOwner::Faction(_) => OwnerType::Faction,
            FleetOwner::Player(_) => OwnerType::Player,
        }
    }
}

impl fmt::Display for FleetOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FleetOwner::Faction(id) => write!(f, "faction:{}", id),
            FleetOwner::Player(id) => write!(f, "player:{}", id),
        }
    }
}
