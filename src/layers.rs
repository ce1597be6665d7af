// Static reference layers for the map: conflict zones, hotspots, bases and so on.
// Loaded once from TOML at startup and never mutated afterwards.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{MonitorError, Result};

const BUILTIN_LAYERS: &str = include_str!("../data/layers.toml");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictZone {
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    /// Metres.
    pub radius: u32,
    pub color: String,
    pub status: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hotspot {
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    /// high, medium or low.
    pub level: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilitaryBase {
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    pub operator: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NuclearFacility {
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    pub country: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waterway {
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    pub traffic: String,
    pub controlled_by: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnderseaCable {
    pub name: String,
    /// Polyline of `[lat, lng]` pairs.
    pub points: Vec<[f64; 2]>,
    pub capacity: String,
    pub route: String,
}

/// Layer selector used in `/api/layers/{name}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    ConflictZones,
    Hotspots,
    MilitaryBases,
    Nuclear,
    Waterways,
    Cables,
}

impl LayerKind {
    pub const ALL: [LayerKind; 6] = [
        LayerKind::ConflictZones,
        LayerKind::Hotspots,
        LayerKind::MilitaryBases,
        LayerKind::Nuclear,
        LayerKind::Waterways,
        LayerKind::Cables,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            LayerKind::ConflictZones => "conflict-zones",
            LayerKind::Hotspots => "hotspots",
            LayerKind::MilitaryBases => "military-bases",
            LayerKind::Nuclear => "nuclear",
            LayerKind::Waterways => "waterways",
            LayerKind::Cables => "cables",
        }
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LayerKind {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self> {
        LayerKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| MonitorError::Config(format!("unknown layer: {s}")))
    }
}

/// All reference layers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaticLayers {
    #[serde(default)]
    pub conflict_zones: Vec<ConflictZone>,
    #[serde(default)]
    pub hotspots: Vec<Hotspot>,
    #[serde(default)]
    pub military_bases: Vec<MilitaryBase>,
    #[serde(default)]
    pub nuclear_facilities: Vec<NuclearFacility>,
    #[serde(default)]
    pub waterways: Vec<Waterway>,
    #[serde(default)]
    pub undersea_cables: Vec<UnderseaCable>,
}

impl StaticLayers {
    /// Layers compiled into the binary.
    pub fn builtin() -> Result<Self> {
        Self::from_toml(BUILTIN_LAYERS)
    }

    pub fn from_toml(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| MonitorError::Config(format!("invalid layer data: {e}")))
    }

    /// Built-in layers, replaced wholesale by `path` when given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Self::builtin();
        };
        let source = std::fs::read_to_string(path).map_err(|e| {
            MonitorError::Config(format!("cannot read layers file {}: {e}", path.display()))
        })?;
        let layers = Self::from_toml(&source)?;
        info!(path = %path.display(), "loaded layer data");
        Ok(layers)
    }

    /// One layer as a JSON array.
    pub fn to_json(&self, kind: LayerKind) -> serde_json::Value {
        let value = match kind {
            LayerKind::ConflictZones => serde_json::to_value(&self.conflict_zones),
            LayerKind::Hotspots => serde_json::to_value(&self.hotspots),
            LayerKind::MilitaryBases => serde_json::to_value(&self.military_bases),
            LayerKind::Nuclear => serde_json::to_value(&self.nuclear_facilities),
            LayerKind::Waterways => serde_json::to_value(&self.waterways),
            LayerKind::Cables => serde_json::to_value(&self.undersea_cables),
        };
        // Plain structs of strings and numbers always serialize.
        value.unwrap_or_else(|_| serde_json::Value::Array(Vec::new()))
    }

    pub fn len(&self, kind: LayerKind) -> usize {
        match kind {
            LayerKind::ConflictZones => self.conflict_zones.len(),
            LayerKind::Hotspots => self.hotspots.len(),
            LayerKind::MilitaryBases => self.military_bases.len(),
            LayerKind::Nuclear => self.nuclear_facilities.len(),
            LayerKind::Waterways => self.waterways.len(),
            LayerKind::Cables => self.undersea_cables.len(),
        }
    }
}
