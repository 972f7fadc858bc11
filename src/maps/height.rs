use super::{DeriveContext, MapDeriver, MapKind, TextureData, TextureMap};
use crate::buffer::luminance;
use crate::diag::Diagnostics;
use crate::error::{Result, TextureError};
use crate::filters::gaussian_blur;
use crate::material::MaterialClass;

/// Output quantization for the height map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeightBitDepth {
    Eight,
    Sixteen,
}

impl HeightBitDepth {
    /// Map a config integer to a depth; only 8 and 16 are recognized.
    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            8 => Some(HeightBitDepth::Eight),
            16 => Some(HeightBitDepth::Sixteen),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HeightParams {
    /// Contrast-curve steepness around mid-gray; 1.0 is the identity.
    pub depth_scale: f32,
    /// Post-curve smoothing radius in pixels; 0 disables. The Gaussian
    /// sigma is `radius/3` so the kernel support equals the requested
    /// radius.
    pub blur_radius: u32,
    pub bit_depth: HeightBitDepth,
}

impl HeightParams {
    pub fn for_material(material: MaterialClass) -> Self {
        HeightParams {
            depth_scale: material.height_depth_scale(),
            blur_radius: 0,
            bit_depth: HeightBitDepth::Eight,
        }
    }
}

/// Luminance → displacement height.
///
/// The S-curve `H' = 0.5 + depth_scale·(H − 0.5)` keeps output luminance
/// monotonically non-decreasing in input luminance whenever smoothing is
/// disabled.
pub struct HeightDeriver {
    pub params: HeightParams,
}

impl MapDeriver for HeightDeriver {
    fn kind(&self) -> MapKind {
        MapKind::Height
    }

    fn derive(&self, ctx: &DeriveContext<'_>, _diag: &mut Diagnostics) -> Result<TextureMap> {
        if ctx.cancel.is_cancelled() {
            return Err(TextureError::Cancelled);
        }
        let p = &self.params;

        let mut height = match ctx.height {
            Some(h) => h.clone(),
            None => luminance(ctx.diffuse)?,
        };
        let depth = p.depth_scale;
        height.map_in_place(|h| (0.5 + depth * (h - 0.5)).clamp(0.0, 1.0));

        if p.blur_radius > 0 {
            height = gaussian_blur(&height, p.blur_radius as f32 / 3.0, ctx.boundary())?;
        }

        let data = match p.bit_depth {
            HeightBitDepth::Eight => TextureData::Gray8(height.to_gray8()),
            HeightBitDepth::Sixteen => TextureData::Gray16(height.to_gray16()),
        };
        Ok(TextureMap {
            kind: MapKind::Height,
            data,
        })
    }
}
