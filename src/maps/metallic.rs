use super::{DeriveContext, MapDeriver, MapKind, TextureData, TextureMap};
use crate::buffer::{luminance, Plane};
use crate::diag::Diagnostics;
use crate::error::{Result, TextureError};
use crate::material::MaterialClass;
use image::GrayImage;
use imageproc::{distance_transform::Norm, morphology::open as morph_open};
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Fixed noise seed (see roughness): byte-identical output per request.
const NOISE_SEED: u64 = 0x6d6574616c6c6963;

#[derive(Debug, Clone)]
pub struct MetallicParams {
    /// Uniform metallic level when no threshold detection runs.
    pub base_value: f32,
    /// Uniform noise amplitude for the uniform path.
    pub variation: f32,
    /// Luminance cutoff for mask detection; 0 disables detection entirely
    /// and emits the uniform plane.
    pub threshold: f32,
}

impl MetallicParams {
    pub fn for_material(material: MaterialClass) -> Self {
        MetallicParams {
            base_value: material.metallic_base(),
            variation: 0.0,
            threshold: 0.0,
        }
    }
}

/// Uniform or luminance-masked metallic map.
pub struct MetallicDeriver {
    pub params: MetallicParams,
}

impl MapDeriver for MetallicDeriver {
    fn kind(&self) -> MapKind {
        MapKind::Metallic
    }

    fn derive(&self, ctx: &DeriveContext<'_>, diag: &mut Diagnostics) -> Result<TextureMap> {
        if ctx.cancel.is_cancelled() {
            return Err(TextureError::Cancelled);
        }
        let p = &self.params;
        let (w, h) = ctx.diffuse.dimensions();

        let gray = if p.threshold > 0.0 {
            threshold_mask(ctx, p.threshold)?
        } else {
            uniform_plane(w, h, p, diag)?.to_gray8()
        };

        Ok(TextureMap {
            kind: MapKind::Metallic,
            data: TextureData::Gray8(gray),
        })
    }
}

fn uniform_plane(w: u32, h: u32, p: &MetallicParams, diag: &mut Diagnostics) -> Result<Plane> {
    let base = if (0.0..=1.0).contains(&p.base_value) {
        p.base_value
    } else {
        let clamped = p.base_value.clamp(0.0, 1.0);
        diag.warn(format!(
            "metallic base_value {} outside [0, 1], clamped to {clamped}",
            p.base_value
        ));
        clamped
    };
    let mut plane = Plane::filled(w, h, base)?;
    if p.variation > 0.0 {
        let mut rng = StdRng::seed_from_u64(NOISE_SEED);
        for v in plane.data_mut() {
            *v = (*v + rng.random_range(-p.variation..=p.variation)).clamp(0.0, 1.0);
        }
    }
    Ok(plane)
}

/// Binary mask of luminance above the threshold, cleaned with a 1-pixel
/// morphological open to drop isolated speckle.
fn threshold_mask(ctx: &DeriveContext<'_>, threshold: f32) -> Result<GrayImage> {
    let lum = match ctx.height {
        Some(plane) => plane.clone(),
        None => luminance(ctx.diffuse)?,
    };
    let mask = GrayImage::from_fn(lum.width(), lum.height(), |x, y| {
        image::Luma([if lum.get(x, y) > threshold { 255u8 } else { 0 }])
    });
    Ok(morph_open(&mask, Norm::LInf, 1))
}
