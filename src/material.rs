use serde::Deserialize;

// ── Material classes ──────────────────────────────────────────────────────

/// Coarse semantic label driving derivation presets.
///
/// Parsed from free-form config labels by case-insensitive prefix match
/// ("ston", "stonework" → `Stone`); anything unrecognized falls back to
/// `Generic`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaterialClass {
    Stone,
    Brick,
    Wood,
    Metal,
    Fabric,
    Concrete,
    Generic,
}

impl MaterialClass {
    pub const ALL: [MaterialClass; 7] = [
        MaterialClass::Stone,
        MaterialClass::Brick,
        MaterialClass::Wood,
        MaterialClass::Metal,
        MaterialClass::Fabric,
        MaterialClass::Concrete,
        MaterialClass::Generic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MaterialClass::Stone => "stone",
            MaterialClass::Brick => "brick",
            MaterialClass::Wood => "wood",
            MaterialClass::Metal => "metal",
            MaterialClass::Fabric => "fabric",
            MaterialClass::Concrete => "concrete",
            MaterialClass::Generic => "generic",
        }
    }

    /// Case-insensitive prefix match against the canonical names.
    /// "brickwork" matches `Brick`; "met" matches `Metal`; unknown labels
    /// map to `Generic`.
    pub fn from_label(label: &str) -> MaterialClass {
        let needle = label.trim().to_ascii_lowercase();
        if needle.is_empty() {
            return MaterialClass::Generic;
        }
        for class in MaterialClass::ALL {
            let name = class.as_str();
            if needle.starts_with(name) || name.starts_with(needle.as_str()) {
                return class;
            }
        }
        MaterialClass::Generic
    }
}

impl std::fmt::Display for MaterialClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Preset tables ─────────────────────────────────────────────────────────

/// Roughness remap defaults per material.
#[derive(Debug, Clone, Copy)]
pub struct RoughnessPreset {
    pub base_value: f32,
    pub contrast: f32,
    pub invert: bool,
}

/// AO tuning defaults per material.
#[derive(Debug, Clone, Copy)]
pub struct AoPreset {
    pub cavity_scale: f32,
    pub global_scale: f32,
    pub min_ao: f32,
    pub intensity: f32,
}

impl MaterialClass {
    pub fn roughness_preset(self) -> RoughnessPreset {
        let (base_value, contrast, invert) = match self {
            MaterialClass::Stone => (0.80, 0.30, false),
            MaterialClass::Brick => (0.85, 0.25, false),
            MaterialClass::Wood => (0.70, 0.40, false),
            MaterialClass::Metal => (0.30, 0.50, true),
            MaterialClass::Fabric => (0.90, 0.20, false),
            MaterialClass::Concrete => (0.75, 0.35, false),
            MaterialClass::Generic => (0.75, 0.30, false),
        };
        RoughnessPreset {
            base_value,
            contrast,
            invert,
        }
    }

    /// Uniform metallic level: fully metallic for metal, dielectric
    /// otherwise.
    pub fn metallic_base(self) -> f32 {
        match self {
            MaterialClass::Metal => 1.0,
            _ => 0.0,
        }
    }

    /// Default normal-map strength. Hard materials with sharp relief get
    /// more; soft fabrics get the least.
    pub fn normal_strength(self) -> f32 {
        match self {
            MaterialClass::Stone => 1.5,
            MaterialClass::Brick => 1.4,
            MaterialClass::Wood => 1.0,
            MaterialClass::Metal => 0.8,
            MaterialClass::Fabric => 0.6,
            MaterialClass::Concrete => 1.3,
            MaterialClass::Generic => 1.0,
        }
    }

    pub fn ao_preset(self) -> AoPreset {
        let (cavity_scale, global_scale, min_ao, intensity) = match self {
            MaterialClass::Stone => (2.0, 4.0, 0.20, 1.2),
            MaterialClass::Brick => (2.0, 4.0, 0.20, 1.2),
            MaterialClass::Wood => (1.5, 4.0, 0.30, 1.0),
            MaterialClass::Metal => (1.0, 3.0, 0.50, 0.8),
            MaterialClass::Fabric => (1.5, 3.0, 0.35, 0.9),
            MaterialClass::Concrete => (2.0, 4.0, 0.25, 1.1),
            MaterialClass::Generic => (2.0, 4.0, 0.30, 1.0),
        };
        AoPreset {
            cavity_scale,
            global_scale,
            min_ao,
            intensity,
        }
    }

    /// Default height-curve steepness.
    pub fn height_depth_scale(self) -> f32 {
        match self {
            MaterialClass::Stone => 1.2,
            MaterialClass::Brick => 1.3,
            MaterialClass::Wood => 0.9,
            MaterialClass::Metal => 0.5,
            MaterialClass::Fabric => 0.6,
            MaterialClass::Concrete => 1.1,
            MaterialClass::Generic => 1.0,
        }
    }
}
