use std::fmt;

use serde::{Deserialize, Serialize};

use crate::codec::{CodecError, WireReader, WireWriter};

/// Hull class a classifier marker assigns to a grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipClass {
    Unclassified,
    Unlicensed,
    Worker,
    Foundry,
    Scout,
    Fighter,
    Gunship,
    Corvette,
    Frigate,
    Destroyer,
    Cruiser,
    Battleship,
    Carrier,
}

impl ShipClass {
    pub const ALL: [ShipClass; 13] = [
        ShipClass::Unclassified,
        ShipClass::Unlicensed,
        ShipClass::Worker,
        ShipClass::Foundry,
        ShipClass::Scout,
        ShipClass::Fighter,
        ShipClass::Gunship,
        ShipClass::Corvette,
        ShipClass::Frigate,
        ShipClass::Destroyer,
        ShipClass::Cruiser,
        ShipClass::Battleship,
        ShipClass::Carrier,
    ];

    pub fn as_u16(self) -> u16 {
        self as u16
    }

    pub fn from_u16(value: u16) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            ShipClass::Unclassified => "Unclassified",
            ShipClass::Unlicensed => "Unlicensed",
            ShipClass::Worker => "Worker",
            ShipClass::Foundry => "Foundry",
            ShipClass::Scout => "Scout",
            ShipClass::Fighter => "Fighter",
            ShipClass::Gunship => "Gunship",
            ShipClass::Corvette => "Corvette",
            ShipClass::Frigate => "Frigate",
            ShipClass::Destroyer => "Destroyer",
            ShipClass::Cruiser => "Cruiser",
            ShipClass::Battleship => "Battleship",
            ShipClass::Carrier => "Carrier",
        }
    }

    fn decode(reader: &mut WireReader<'_>) -> Result<Self, CodecError> {
        let value = reader.get_u16("ship_class")?;
        Self::from_u16(value).ok_or(CodecError::InvalidEnum {
            field: "ship_class",
            value,
        })
    }
}

impl fmt::Display for ShipClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Kind of entity a fleet belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerType {
    Unowned,
    Player,
    Faction,
}

impl OwnerType {
    pub fn as_u16(self) -> u16 {
        match self {
            OwnerType::Unowned => 0,
            OwnerType::Player => 1,
            OwnerType::Faction => 2,
        }
    }

    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(OwnerType::Unowned),
            1 => Some(OwnerType::Player),
            2 => Some(OwnerType::Faction),
            _ => None,
        }
    }

    pub(crate) fn decode(reader: &mut WireReader<'_>) -> Result<Self, CodecError> {
        let value = reader.get_u16("owner_type")?;
        Self::from_u16(value).ok_or(CodecError::InvalidEnum {
            field: "owner_type",
            value,
        })
    }
}

/// Display colour of an on-screen notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Font {
    #[default]
    White,
    Red,
    Green,
    Blue,
}

impl Font {
    pub fn as_u16(self) -> u16 {
        match self {
            Font::White => 0,
            Font::Red => 1,
            Font::Green => 2,
            Font::Blue => 3,
        }
    }

    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(Font::White),
            1 => Some(Font::Red),
            2 => Some(Font::Green),
            3 => Some(Font::Blue),
            _ => None,
        }
    }

    pub(crate) fn decode(reader: &mut WireReader<'_>) -> Result<Self, CodecError> {
        let value = reader.get_u16("font")?;
        Self::from_u16(value).ok_or(CodecError::InvalidEnum {
            field: "font",
            value,
        })
    }
}

/// One grid entry of a fleet response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FleetGridData {
    pub owner_type: OwnerType,
    pub ship_class: ShipClass,
    pub supported: bool,
    pub block_count: u32,
    pub display_name: String,
}

impl FleetGridData {
    pub(crate) fn encode(&self, writer: &mut WireWriter) -> Result<(), CodecError> {
        writer.put_u16(self.owner_type.as_u16());
        writer.put_u16(self.ship_class.as_u16());
        writer.put_bool(self.supported);
        writer.put_u32(self.block_count);
        writer.put_str("display_name", &self.display_name)
    }

    pub(crate) fn decode(reader: &mut WireReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            owner_type: OwnerType::decode(reader)?,
            ship_class: ShipClass::decode(reader)?,
            supported: reader.get_bool("supported")?,
            block_count: reader.get_u32("block_count")?,
            display_name: reader.get_str("display_name")?,
        })
    }
}

/// Control point as announced to clients.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlPointRecord {
    pub name: String,
    pub position: [f64; 3],
    /// Rounded for display; eligibility is scored server-side on the exact radius.
    pub radius: u32,
    pub tokens_per_period: u32,
}

/// Fleet quota of one ship class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HullRuleRecord {
    pub ship_class: ShipClass,
    pub max_per_faction: u16,
    pub max_per_solo_player: u16,
}

/// Server settings a client needs to render control points and fleet quotas.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SettingsPayload {
    pub period_secs: u32,
    pub control_points: Vec<ControlPointRecord>,
    pub hull_rules: Vec<HullRuleRecord>,
}

impl SettingsPayload {
    pub fn hull_rule(&self, class: ShipClass) -> Option<&HullRuleRecord> {
        self.hull_rules.iter().find(|rule| rule.ship_class == class)
    }

    pub(crate) fn encode(&self, writer: &mut WireWriter) -> Result<(), CodecError> {
        writer.put_u32(self.period_secs);
        writer.put_len("control_points", self.control_points.len())?;
        for cp in &self.control_points {
            writer.put_str("control_point.name", &cp.name)?;
            for axis in cp.position {
                writer.put_f64(axis);
            }
            writer.put_u32(cp.radius);
            writer.put_u32(cp.tokens_per_period);
        }
        writer.put_len("hull_rules", self.hull_rules.len())?;
        for rule in &self.hull_rules {
            writer.put_u16(rule.ship_class.as_u16());
            writer.put_u16(rule.max_per_faction);
            writer.put_u16(rule.max_per_solo_player);
        }
        Ok(())
    }

    pub(crate) fn decode(reader: &mut WireReader<'_>) -> Result<Self, CodecError> {
        let period_secs = reader.get_u32("period_secs")?;
        let cp_count = reader.get_len("control_points")?;
        let mut control_points = Vec::new();
        for _ in 0..cp_count {
            let name = reader.get_str("control_point.name")?;
            let position = [
                reader.get_f64("control_point.x")?,
                reader.get_f64("control_point.y")?,
                reader.get_f64("control_point.z")?,
            ];
            control_points.push(ControlPointRecord {
                name,
                position,
                radius: reader.get_u32("control_point.radius")?,
                tokens_per_period: reader.get_u32("control_point.tokens")?,
            });
        }
        let rule_count = reader.get_len("hull_rules")?;
        let mut hull_rules = Vec::new();
        for _ in 0..rule_count {
            hull_rules.push(HullRuleRecord {
                ship_class: ShipClass::decode(reader)?,
                max_per_faction: reader.get_u16("max_per_faction")?,
                max_per_solo_player: reader.get_u16("max_per_solo_player")?,
            });
        }
        Ok(Self {
            period_secs,
            control_points,
            hull_rules,
        })
    }
}
