pub mod ao;
pub mod height;
pub mod metallic;
pub mod normal;
pub mod roughness;

use crate::buffer::{Gray16Image, Plane};
use crate::diag::Diagnostics;
use crate::error::Result;
use crate::filters::Boundary;
use crate::material::MaterialClass;
use crate::pipeline::CancelFlag;
use image::{GrayImage, RgbImage};
use serde::Deserialize;

pub use ao::AoParams;
pub use height::{HeightBitDepth, HeightParams};
pub use metallic::MetallicParams;
pub use normal::NormalParams;
pub use roughness::RoughnessParams;

// ── Map kinds ─────────────────────────────────────────────────────────────

/// The six maps of a PBR texture set. Diffuse and Normal are RGB; the
/// rest are single-channel grayscale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MapKind {
    Diffuse,
    Normal,
    Roughness,
    Metallic,
    Ao,
    Height,
}

impl MapKind {
    pub const ALL: [MapKind; 6] = [
        MapKind::Diffuse,
        MapKind::Normal,
        MapKind::Roughness,
        MapKind::Metallic,
        MapKind::Ao,
        MapKind::Height,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MapKind::Diffuse => "diffuse",
            MapKind::Normal => "normal",
            MapKind::Roughness => "roughness",
            MapKind::Metallic => "metallic",
            MapKind::Ao => "ao",
            MapKind::Height => "height",
        }
    }

    /// Exact lowercase name lookup (CLI `--types` values).
    pub fn from_name(name: &str) -> Option<MapKind> {
        MapKind::ALL
            .into_iter()
            .find(|k| k.as_str() == name.trim().to_ascii_lowercase())
    }
}

impl std::fmt::Display for MapKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Derived map payload ───────────────────────────────────────────────────

/// Pixel payload of one output map.
#[derive(Debug, Clone, PartialEq)]
pub enum TextureData {
    Rgb8(RgbImage),
    Gray8(GrayImage),
    Gray16(Gray16Image),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextureMap {
    pub kind: MapKind,
    pub data: TextureData,
}

impl TextureMap {
    pub fn dimensions(&self) -> (u32, u32) {
        match &self.data {
            TextureData::Rgb8(img) => img.dimensions(),
            TextureData::Gray8(img) => img.dimensions(),
            TextureData::Gray16(img) => img.dimensions(),
        }
    }
}

// ── Derivation parameters ─────────────────────────────────────────────────

/// Per-map parameter bundle. `for_material` fills every field from the
/// material preset tables; the config layer overrides individual fields
/// on top.
#[derive(Debug, Clone)]
pub struct DerivationParams {
    pub normal: NormalParams,
    pub roughness: RoughnessParams,
    pub metallic: MetallicParams,
    pub ao: AoParams,
    pub height: HeightParams,
}

impl DerivationParams {
    pub fn for_material(material: MaterialClass) -> Self {
        DerivationParams {
            normal: NormalParams::for_material(material),
            roughness: RoughnessParams::for_material(material),
            metallic: MetallicParams::for_material(material),
            ao: AoParams::for_material(material),
            height: HeightParams::for_material(material),
        }
    }
}

// ── Derivation capability ─────────────────────────────────────────────────

/// Read-only inputs shared by every derivation task. The diffuse master
/// and height cache are frozen before fanout; tasks never mutate them.
pub struct DeriveContext<'a> {
    pub diffuse: &'a RgbImage,
    /// Shared luminance height plane; `None` only when the upstream
    /// computation failed, in which case derivers that need it degrade.
    pub height: Option<&'a Plane>,
    pub material: MaterialClass,
    /// True when the pipeline tessellated the diffuse. Gaussian blurs
    /// then use periodic boundaries so derived maps inherit the seamless
    /// edges; Sobel always runs edge-replicated.
    pub seamless: bool,
    pub cancel: &'a CancelFlag,
}

impl DeriveContext<'_> {
    /// Blur boundary policy matching the pipeline's seamless state.
    /// Applies to the separable Gaussian passes only — `sobel_xy` has a
    /// fixed edge-replication policy.
    pub fn boundary(&self) -> Boundary {
        if self.seamless {
            Boundary::Periodic
        } else {
            Boundary::Replicate
        }
    }
}

/// Every derived-map backend implements this: one object per map kind,
/// dispatched from a heterogeneous collection by the orchestrator.
pub trait MapDeriver: Send + Sync {
    fn kind(&self) -> MapKind;

    /// Whether a seamless input stays seamless through this derivation.
    /// When false the orchestrator re-runs the tessellation engine on the
    /// derived map.
    fn preserves_seamlessness(&self) -> bool {
        true
    }

    fn derive(&self, ctx: &DeriveContext<'_>, diag: &mut Diagnostics) -> Result<TextureMap>;
}

/// Instantiate derivers for the requested kinds (diffuse is produced by
/// the intake/tessellation stages, not a deriver).
pub fn build_derivers(
    kinds: impl IntoIterator<Item = MapKind>,
    params: &DerivationParams,
) -> Vec<Box<dyn MapDeriver>> {
    let mut derivers: Vec<Box<dyn MapDeriver>> = Vec::new();
    for kind in kinds {
        match kind {
            MapKind::Diffuse => {}
            MapKind::Normal => derivers.push(Box::new(normal::NormalDeriver {
                params: params.normal.clone(),
            })),
            MapKind::Roughness => derivers.push(Box::new(roughness::RoughnessDeriver {
                params: params.roughness.clone(),
            })),
            MapKind::Metallic => derivers.push(Box::new(metallic::MetallicDeriver {
                params: params.metallic.clone(),
            })),
            MapKind::Ao => derivers.push(Box::new(ao::AoDeriver {
                params: params.ao.clone(),
            })),
            MapKind::Height => derivers.push(Box::new(height::HeightDeriver {
                params: params.height.clone(),
            })),
        }
    }
    derivers
}
