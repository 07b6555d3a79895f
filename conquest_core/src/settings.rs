//! Server settings: round cadence, control points, reward item and fleet quotas.
//!
//! Loaded from `conquest_settings.json` with support for an environment variable
//! override. A broken or missing file falls back to the builtin document.

use std::{
    env, fs, io,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use conquest_proto::{ControlPointRecord, HullRuleRecord, OwnerType, SettingsPayload, ShipClass};
use glam::DVec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::world::ItemDefinition;

pub const BUILTIN_CONQUEST_SETTINGS: &str = include_str!("data/conquest_settings.json");

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConquestSettings {
    period_secs: u32,
    save_interval_secs: u32,
    derelict_countdown_secs: u32,
    reward_item: ItemDefinition,
    classifier_subtype: String,
    control_points: Vec<ControlPoint>,
    hull_rules: Vec<HullRule>,
    fault_policy: FaultPolicy,
    state_path: PathBuf,
    bind: SocketAddr,
}

impl Default for ConquestSettings {
    fn default() -> Self {
        Self {
            period_secs: 3600,
            save_interval_secs: 600,
            derelict_countdown_secs: 3600,
            reward_item: ItemDefinition::default(),
            classifier_subtype: "HullClassifier".to_string(),
            control_points: Vec::new(),
            hull_rules: Vec::new(),
            fault_policy: FaultPolicy::default(),
            state_path: PathBuf::from("conquest_state.bin"),
            bind: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 42000),
        }
    }
}

/// Fixed location contested by factions each round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlPoint {
    pub name: String,
    pub position: DVec3,
    pub radius: f64,
    pub tokens_per_period: u32,
}

/// What to do with the rest of a round when one control point fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultPolicy {
    /// Stop the pass; later control points wait for the next round.
    #[default]
    AbortPass,
    /// Log the failure and carry on with the next control point.
    IsolateControlPoint,
}

/// Fleet quota for one ship class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HullRule {
    pub ship_class: ShipClass,
    #[serde(default)]
    pub max_per_faction: u16,
    #[serde(default)]
    pub max_per_solo_player: u16,
}

impl ConquestSettings {
    pub fn builtin() -> Arc<Self> {
        Arc::new(
            serde_json::from_str(BUILTIN_CONQUEST_SETTINGS)
                .expect("builtin conquest settings should parse"),
        )
    }

    pub fn from_json_str(json: &str) -> Result<Self, SettingsError> {
        let settings: ConquestSettings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let contents = fs::read_to_string(path).map_err(|source| SettingsError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        ConquestSettings::from_json_str(&contents)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.period_secs == 0 {
            return Err(SettingsError::Invalid("period_secs must be positive".into()));
        }
        if self.save_interval_secs == 0 {
            return Err(SettingsError::Invalid(
                "save_interval_secs must be positive".into(),
            ));
        }
        for cp in &self.control_points {
            if !(cp.radius.is_finite() && cp.radius >= 0.0) {
                return Err(SettingsError::Invalid(format!(
                    "control point {} has invalid radius {}",
                    cp.name, cp.radius
                )));
            }
        }
        Ok(())
    }

    pub fn with_control_points(mut self, control_points: Vec<ControlPoint>) -> Self {
        self.control_points = control_points;
        self
    }

    pub fn with_hull_rules(mut self, hull_rules: Vec<HullRule>) -> Self {
        self.hull_rules = hull_rules;
        self
    }

    pub fn with_fault_policy(mut self, policy: FaultPolicy) -> Self {
        self.fault_policy = policy;
        self
    }

    pub fn with_state_path(mut self, path: PathBuf) -> Self {
        self.state_path = path;
        self
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs(u64::from(self.period_secs))
    }

    pub fn save_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.save_interval_secs))
    }

    pub fn derelict_countdown_secs(&self) -> u32 {
        self.derelict_countdown_secs
    }

    pub fn reward_item(&self) -> &ItemDefinition {
        &self.reward_item
    }

    pub fn classifier_subtype(&self) -> &str {
        &self.classifier_subtype
    }

    pub fn control_points(&self) -> &[ControlPoint] {
        &self.control_points
    }

    pub fn hull_rules(&self) -> &[HullRule] {
        &self.hull_rules
    }

    pub fn fault_policy(&self) -> FaultPolicy {
        self.fault_policy
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    pub fn bind(&self) -> SocketAddr {
        self.bind
    }

    /// Number of grids of `class` an owner may field; classes without a rule allow none.
    pub fn quota_for(&self, class: ShipClass, owner_type: OwnerType) -> u16 {
        let Some(rule) = self.hull_rules.iter().find(|rule| rule.ship_class == class) else {
            return 0;
        };
        match owner_type {
            OwnerType::Faction => rule.max_per_faction,
            OwnerType::Player => rule.max_per_solo_player,
            OwnerType::Unowned => 0,
        }
    }

    /// Client-facing view of these settings.
    pub fn to_payload(&self) -> SettingsPayload {
        SettingsPayload {
            period_secs: self.period_secs,
            control_points: self
                .control_points
                .iter()
                .map(|cp| ControlPointRecord {
                    name: cp.name.clone(),
                    position: cp.position.to_array(),
                    radius: cp.radius.round().clamp(0.0, u32::MAX as f64) as u32,
                    tokens_per_period: cp.tokens_per_period,
                })
                .collect(),
            hull_rules: self
                .hull_rules
                .iter()
                .map(|rule| HullRuleRecord {
                    ship_class: rule.ship_class,
                    max_per_faction: rule.max_per_faction,
                    max_per_solo_player: rule.max_per_solo_player,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to parse conquest settings: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read conquest settings from {path:?}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid conquest settings: {0}")]
    Invalid(String),
}

/// Where the active settings came from; `None` means the builtin document.
#[derive(Debug, Clone)]
pub struct SettingsMetadata {
    path: Option<PathBuf>,
}

impl SettingsMetadata {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }
}

pub fn load_settings_from_env() -> (Arc<ConquestSettings>, SettingsMetadata) {
    let override_path = env::var("CONQUEST_CONFIG_PATH").ok().map(PathBuf::from);
    let default_path =
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("src/data/conquest_settings.json");
    let path = override_path.unwrap_or(default_path);

    match ConquestSettings::from_file(&path) {
        Ok(settings) => {
            tracing::info!(
                target: "conquest::config",
                path = %path.display(),
                control_points = settings.control_points.len(),
                "settings.loaded=file"
            );
            return (Arc::new(settings), SettingsMetadata::new(Some(path)));
        }
        Err(err) => {
            tracing::warn!(
                target: "conquest::config",
                path = %path.display(),
                error = %err,
                "settings.load_failed"
            );
        }
    }

    let settings = ConquestSettings::builtin();
    tracing::info!(target: "conquest::config", "settings.loaded=builtin");
    (settings, SettingsMetadata::new(None))
}
