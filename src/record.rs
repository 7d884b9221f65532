use serde::{Deserialize, Serialize};

use crate::classifier::ErrorType;
use crate::degrade::DegradationTier;
use crate::extractor::ExtractedAttributes;
use crate::partial::ViabilityTier;

/// Fixed number of stages in every numeric progression track.
/// Tracks are always exactly this long or exactly empty.
pub const STAGE_COUNT: usize = 7;

/// Opaque identifier for one catalog entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        EntityId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Character,
    Weapon,
    Disc,
}

impl EntityKind {
    /// Path segment used by the content API for this kind.
    pub fn api_path(&self) -> &'static str {
        match self {
            EntityKind::Character => "characters",
            EntityKind::Weapon => "weapons",
            EntityKind::Disc => "discs",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Character => "character",
            EntityKind::Weapon => "weapon",
            EntityKind::Disc => "disc",
        }
    }

    /// Parse a roster label, tolerating plural forms.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "character" | "characters" => Some(EntityKind::Character),
            "weapon" | "weapons" => Some(EntityKind::Weapon),
            "disc" | "discs" => Some(EntityKind::Disc),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Damage element of an entity.
///
/// `Unknown` is the documented degradation sentinel: the mapper never
/// produces it, only the last fallback tier does, and a record carrying it
/// is always flagged degraded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Element {
    Fire,
    Ice,
    Electric,
    Physical,
    Ether,
    Unknown,
}

impl Element {
    pub fn as_str(&self) -> &'static str {
        match self {
            Element::Fire => "fire",
            Element::Ice => "ice",
            Element::Electric => "electric",
            Element::Physical => "physical",
            Element::Ether => "ether",
            Element::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Combat role of a character or the role a weapon is tuned for.
/// `Unknown` is the degradation sentinel, same contract as [`Element`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Specialty {
    Attack,
    Stun,
    Anomaly,
    Support,
    Defense,
    Unknown,
}

impl Specialty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Specialty::Attack => "attack",
            Specialty::Stun => "stun",
            Specialty::Anomaly => "anomaly",
            Specialty::Support => "support",
            Specialty::Defense => "defense",
            Specialty::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Specialty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Rarity grade. `Unknown` is the degradation sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rarity {
    S,
    A,
    B,
    Unknown,
}

impl Rarity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rarity::S => "S",
            Rarity::A => "A",
            Rarity::B => "B",
            Rarity::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Rarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stat identifiers shared by the base-stat and advanced-stat tables.
/// Advanced stats arrive from the API with an `Adv_` prefix and go through
/// the same table via [`crate::mapper::map_with_prefix_strip`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatKind {
    Atk,
    Hp,
    Def,
    Impact,
    CritRate,
    CritDmg,
    Pen,
    AnomalyProficiency,
    EnergyRegen,
}

impl StatKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatKind::Atk => "ATK",
            StatKind::Hp => "HP",
            StatKind::Def => "DEF",
            StatKind::Impact => "Impact",
            StatKind::CritRate => "CritRate",
            StatKind::CritDmg => "CritDmg",
            StatKind::Pen => "PEN",
            StatKind::AnomalyProficiency => "AnomalyProficiency",
            StatKind::EnergyRegen => "EnergyRegen",
        }
    }
}

impl std::fmt::Display for StatKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One named numeric progression curve (per-stage stat values).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressionTrack {
    pub name: String,
    pub values: Vec<f64>,
}

impl ProgressionTrack {
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        ProgressionTrack {
            name: name.into(),
            values,
        }
    }

    /// Tracks must be full-length or empty; anything else is malformed.
    pub fn is_well_formed(&self) -> bool {
        self.values.is_empty() || self.values.len() == STAGE_COUNT
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationStatus {
    pub is_valid: bool,
    pub issues: Vec<String>,
}

impl ValidationStatus {
    pub fn valid() -> Self {
        ValidationStatus {
            is_valid: true,
            issues: Vec::new(),
        }
    }

    pub fn invalid(issues: Vec<String>) -> Self {
        ValidationStatus {
            is_valid: false,
            issues,
        }
    }
}

/// Finished typed entity emitted by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub id: EntityId,
    pub kind: EntityKind,
    pub name: String,
    pub rarity: Option<Rarity>,
    pub element: Option<Element>,
    pub specialty: Option<Specialty>,
    pub main_stat: Option<StatKind>,
    pub sub_stat: Option<StatKind>,
    pub attributes: ExtractedAttributes,
    pub progressions: Vec<ProgressionTrack>,
    /// Field keys whose values were substituted with declared defaults.
    pub substituted_fields: Vec<String>,
    /// True when any value came from a degradation tier or sentinel.
    pub degraded: bool,
    /// Deepest degradation tier that contributed a value, if any.
    pub recovery_tier: Option<DegradationTier>,
    /// Completeness classification when built from a partial payload.
    pub viability: Option<ViabilityTier>,
    pub validation: ValidationStatus,
}

impl Record {
    pub fn new(id: EntityId, kind: EntityKind, name: impl Into<String>) -> Self {
        Record {
            id,
            kind,
            name: name.into(),
            rarity: None,
            element: None,
            specialty: None,
            main_stat: None,
            sub_stat: None,
            attributes: ExtractedAttributes::empty(),
            progressions: Vec::new(),
            substituted_fields: Vec::new(),
            degraded: false,
            recovery_tier: None,
            viability: None,
            validation: ValidationStatus::valid(),
        }
    }

    pub fn track(&self, name: &str) -> Option<&ProgressionTrack> {
        self.progressions.iter().find(|t| t.name == name)
    }

    /// Record the deepest tier seen across all recovered fields.
    pub fn note_recovery_tier(&mut self, tier: DegradationTier) {
        match self.recovery_tier {
            Some(current) if current >= tier => {}
            _ => self.recovery_tier = Some(tier),
        }
    }
}

/// Failure tuple appended to the batch's failed collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedEntity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub error: String,
    pub error_type: ErrorType,
    /// Whatever fragments could still be salvaged from the payload.
    pub partial_data: Option<serde_json::Value>,
}
