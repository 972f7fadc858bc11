use crate::diag::Diagnostics;
use crate::error::{Result, TextureError};
use crate::maps::{HeightBitDepth, MapKind};
use crate::material::MaterialClass;
use crate::pipeline::{PipelineRequest, Resolution};
use crate::tessellation::TessAlgorithm;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

// ── Schema ────────────────────────────────────────────────────────────────

/// On-disk configuration. Every section has working defaults, so an empty
/// file (or no file at all) yields a usable config. Unrecognized keys are
/// preserved and reported once by `warn_unknown_keys`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub textures: TexturesSection,
    pub material: MaterialSection,
    pub tessellation: TessellationSection,
    pub generation: GenerationSection,
    pub output: OutputSection,
    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TexturesSection {
    pub resolution: ResolutionSection,
    /// Requested map kinds; absent means the full set.
    pub types: Option<Vec<MapKind>>,
    pub seamless: bool,
    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

impl Default for TexturesSection {
    fn default() -> Self {
        TexturesSection {
            resolution: ResolutionSection::default(),
            types: None,
            seamless: true,
            extra: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResolutionSection {
    pub width: u32,
    pub height: u32,
}

impl Default for ResolutionSection {
    fn default() -> Self {
        ResolutionSection {
            width: 1024,
            height: 1024,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MaterialSection {
    /// Free-form label, prefix-matched onto `MaterialClass`.
    pub base_material: String,
    pub properties: PropertiesSection,
    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

/// Per-map derivation overrides. Unset fields keep the material preset.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PropertiesSection {
    /// `[min, max]`: remap midpoint becomes the base, span the contrast.
    pub roughness_range: Option<[f32; 2]>,
    pub roughness_variation: Option<f32>,
    pub invert_roughness: Option<bool>,
    pub directional_roughness: Option<bool>,
    pub direction_angle_deg: Option<f32>,
    pub metallic_value: Option<f32>,
    pub metallic_threshold: Option<f32>,
    pub normal_strength: Option<f32>,
    pub normal_blur_radius: Option<u32>,
    pub invert_height: Option<bool>,
    pub ao_intensity: Option<f32>,
    pub ao_min: Option<f32>,
    pub ao_cavity_scale: Option<f32>,
    pub ao_global_scale: Option<f32>,
    pub height_depth: Option<f32>,
    pub height_blur_radius: Option<u32>,
    pub height_bit_depth: Option<u32>,
    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TessellationSection {
    pub method: Option<TessAlgorithm>,
    pub blend_width: Option<u32>,
    pub corner_blend: Option<bool>,
    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenerationSection {
    pub model: String,
    /// Environment variable holding the API key; the key itself never
    /// lives in config files.
    pub api_key_ref: String,
    pub timeout_secs: u64,
    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

impl Default for GenerationSection {
    fn default() -> Self {
        GenerationSection {
            model: "dall-e-3".into(),
            api_key_ref: "OPENAI_API_KEY".into(),
            timeout_secs: 120,
            extra: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputSection {
    pub directory: PathBuf,
    pub prefix: String,
    pub create_preview: bool,
    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

impl Default for OutputSection {
    fn default() -> Self {
        OutputSection {
            directory: PathBuf::from("output"),
            prefix: String::from("texture"),
            create_preview: false,
            extra: HashMap::new(),
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────────────

/// Read and parse a JSON config file.
pub fn load_config(path: &std::path::Path) -> Result<Config> {
    let text = fs::read_to_string(path).map_err(|e| {
        TextureError::InvalidRequest(format!("cannot read {}: {e}", path.display()))
    })?;
    serde_json::from_str(&text).map_err(|e| {
        TextureError::InvalidRequest(format!("parse error in {}: {e}", path.display()))
    })
}

impl Config {
    /// Report every unrecognized key, once, section by section.
    pub fn warn_unknown_keys(&self, diag: &mut Diagnostics) {
        let sections: [(&str, &HashMap<String, Value>); 6] = [
            ("", &self.extra),
            ("textures.", &self.textures.extra),
            ("material.", &self.material.extra),
            ("material.properties.", &self.material.properties.extra),
            ("tessellation.", &self.tessellation.extra),
            ("output.", &self.output.extra),
        ];
        for (prefix, extra) in sections {
            let mut keys: Vec<_> = extra.keys().collect();
            keys.sort();
            for key in keys {
                diag.warn(format!("unrecognized config key '{prefix}{key}' ignored"));
            }
        }
        // generation.* stays open: provider-opaque options pass through.
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.generation.timeout_secs)
    }

    /// Assemble the core request: presets from the material class, then
    /// config overrides field by field.
    pub fn to_request(&self, prompt: &str, diag: &mut Diagnostics) -> Result<PipelineRequest> {
        let material = MaterialClass::from_label(&self.material.base_material);
        let resolution = Resolution::new(
            self.textures.resolution.width,
            self.textures.resolution.height,
        );
        let mut request = PipelineRequest::new(prompt, resolution, material);
        request.seamless = self.textures.seamless;

        if let Some(types) = &self.textures.types {
            request.kinds = types.iter().copied().collect::<BTreeSet<_>>();
        }

        if let Some(method) = self.tessellation.method {
            request.tessellation.algorithm = method;
        }
        if let Some(bw) = self.tessellation.blend_width {
            request.tessellation.blend_width = bw;
        }
        if let Some(cb) = self.tessellation.corner_blend {
            request.tessellation.corner_blend = cb;
        }

        self.apply_property_overrides(&mut request, diag)?;
        Ok(request)
    }

    fn apply_property_overrides(
        &self,
        request: &mut PipelineRequest,
        diag: &mut Diagnostics,
    ) -> Result<()> {
        let props = &self.material.properties;
        let d = &mut request.derivation;

        if let Some([lo, hi]) = props.roughness_range {
            if lo > hi {
                return Err(TextureError::InvalidRequest(format!(
                    "roughness_range [{lo}, {hi}] is inverted"
                )));
            }
            d.roughness.base_value = (lo + hi) / 2.0;
            d.roughness.contrast = hi - lo;
        }
        if let Some(v) = props.roughness_variation {
            d.roughness.variation = v;
        }
        if let Some(v) = props.invert_roughness {
            d.roughness.invert = v;
        }
        if let Some(v) = props.directional_roughness {
            d.roughness.directional = v;
        }
        if let Some(v) = props.direction_angle_deg {
            d.roughness.direction_angle_deg = v;
        }

        if let Some(v) = props.metallic_value {
            d.metallic.base_value = v;
        }
        if let Some(v) = props.metallic_threshold {
            d.metallic.threshold = v;
        }

        if let Some(v) = props.normal_strength {
            d.normal.strength = v;
        }
        if let Some(v) = props.normal_blur_radius {
            d.normal.blur_radius = v;
        }
        if let Some(v) = props.invert_height {
            d.normal.invert_height = v;
        }

        if let Some(v) = props.ao_intensity {
            d.ao.intensity = v;
        }
        if let Some(v) = props.ao_min {
            d.ao.min_ao = v;
        }
        if let Some(v) = props.ao_cavity_scale {
            d.ao.cavity_scale = v;
        }
        if let Some(v) = props.ao_global_scale {
            d.ao.global_scale = v;
        }

        if let Some(v) = props.height_depth {
            d.height.depth_scale = v;
        }
        if let Some(v) = props.height_blur_radius {
            d.height.blur_radius = v;
        }
        if let Some(bits) = props.height_bit_depth {
            match HeightBitDepth::from_bits(bits) {
                Some(depth) => d.height.bit_depth = depth,
                None => diag.warn(format!("height_bit_depth {bits} unsupported, keeping 8")),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_has_working_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        let mut diag = Diagnostics::new();
        let request = config.to_request("mossy stone", &mut diag).unwrap();
        assert_eq!(request.resolution, Resolution::new(1024, 1024));
        assert!(request.seamless);
        assert_eq!(request.kinds.len(), 6);
        assert!(diag.warnings().is_empty());
    }

    #[test]
    fn full_config_round_trip() {
        let text = r#"{
            "textures": {
                "resolution": {"width": 512, "height": 512},
                "types": ["diffuse", "normal", "roughness"],
                "seamless": false
            },
            "material": {
                "base_material": "metallic steel",
                "properties": {
                    "roughness_range": [0.2, 0.6],
                    "metallic_value": 1.0,
                    "directional_roughness": true,
                    "direction_angle_deg": 90.0
                }
            },
            "tessellation": {"method": "frequency", "blend_width": 24},
            "generation": {"model": "dall-e-3", "timeout_secs": 30},
            "output": {"directory": "out", "prefix": "steel", "create_preview": true}
        }"#;
        let config: Config = serde_json::from_str(text).unwrap();
        let mut diag = Diagnostics::new();
        let request = config.to_request("steel plate", &mut diag).unwrap();

        assert_eq!(request.material, MaterialClass::Metal);
        assert_eq!(request.kinds.len(), 3);
        assert!(!request.seamless);
        assert_eq!(request.tessellation.algorithm, TessAlgorithm::Frequency);
        assert_eq!(request.tessellation.blend_width, 24);
        assert!((request.derivation.roughness.base_value - 0.4).abs() < 1e-6);
        assert!((request.derivation.roughness.contrast - 0.4).abs() < 1e-6);
        assert!(request.derivation.roughness.directional);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.output.prefix, "steel");
    }

    #[test]
    fn unknown_keys_warn_but_do_not_fail() {
        let text = r#"{
            "textures": {"seamless": true, "dpi": 300},
            "unknown_top": 1
        }"#;
        let config: Config = serde_json::from_str(text).unwrap();
        let mut diag = Diagnostics::new();
        config.warn_unknown_keys(&mut diag);
        assert_eq!(diag.warnings().len(), 2);
        assert!(diag.warnings().iter().any(|w| w.contains("textures.dpi")));
    }

    #[test]
    fn inverted_roughness_range_is_rejected() {
        let text = r#"{"material": {"properties": {"roughness_range": [0.8, 0.2]}}}"#;
        let config: Config = serde_json::from_str(text).unwrap();
        let mut diag = Diagnostics::new();
        assert!(config.to_request("x", &mut diag).is_err());
    }

    #[test]
    fn unsupported_bit_depth_warns_and_keeps_default() {
        let text = r#"{"material": {"properties": {"height_bit_depth": 12}}}"#;
        let config: Config = serde_json::from_str(text).unwrap();
        let mut diag = Diagnostics::new();
        let request = config.to_request("x", &mut diag).unwrap();
        assert_eq!(request.derivation.height.bit_depth, HeightBitDepth::Eight);
        assert_eq!(diag.warnings().len(), 1);
    }
}
