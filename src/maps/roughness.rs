use super::{DeriveContext, MapDeriver, MapKind, TextureData, TextureMap};
use crate::buffer::{luminance, rotate, Plane};
use crate::diag::Diagnostics;
use crate::error::{Result, TextureError};
use crate::filters::{blur_axis, Axis, Boundary};
use crate::material::MaterialClass;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Fixed noise seed: identical requests must produce byte-identical maps.
const NOISE_SEED: u64 = 0x726f7567686e6573;

/// Grain-axis softening sigma for wood (pixels).
const WOOD_GRAIN_SIGMA: f32 = 2.0;

/// Metals never drop to a perfect mirror; micro-scratches keep a floor.
const METAL_ROUGHNESS_FLOOR: f32 = 0.15;

/// Roughness remap parameters. Preset defaults come from the material
/// table; the config layer overrides individual fields.
#[derive(Debug, Clone)]
pub struct RoughnessParams {
    pub base_value: f32,
    pub contrast: f32,
    pub invert: bool,
    /// Uniform noise amplitude applied last.
    pub variation: f32,
    /// Overlay a directional streak pattern (brushed metal).
    pub directional: bool,
    /// Streak direction in degrees, counter-clockwise from horizontal.
    pub direction_angle_deg: f32,
}

impl RoughnessParams {
    pub fn for_material(material: MaterialClass) -> Self {
        let preset = material.roughness_preset();
        RoughnessParams {
            base_value: preset.base_value,
            contrast: preset.contrast,
            invert: preset.invert,
            variation: 0.02,
            directional: false,
            direction_angle_deg: 0.0,
        }
    }
}

/// Luminance → roughness with material-aware post-processing.
pub struct RoughnessDeriver {
    pub params: RoughnessParams,
}

impl MapDeriver for RoughnessDeriver {
    fn kind(&self) -> MapKind {
        MapKind::Roughness
    }

    /// Directional streaks rotate the plane with edge replication, which
    /// breaks edge continuity; the orchestrator re-tessellates then.
    fn preserves_seamlessness(&self) -> bool {
        !self.params.directional
    }

    fn derive(&self, ctx: &DeriveContext<'_>, diag: &mut Diagnostics) -> Result<TextureMap> {
        if ctx.cancel.is_cancelled() {
            return Err(TextureError::Cancelled);
        }
        let p = &self.params;

        let lum = match ctx.height {
            Some(h) => h.clone(),
            None => luminance(ctx.diffuse)?,
        };
        let base = clamp01_param("roughness base_value", p.base_value, diag);

        // Step 1 — contrast remap around mid-gray
        let sign = if p.invert { -1.0 } else { 1.0 };
        let mut rough = lum;
        rough.map_in_place(|l| (base + p.contrast * (l - 0.5) * sign).clamp(0.0, 1.0));

        // Step 2 — material shaping
        match ctx.material {
            MaterialClass::Wood => {
                // Soften cross-grain noise: 70/30 blend with a grain-axis blur.
                let grain =
                    blur_axis(&rough, WOOD_GRAIN_SIGMA, Axis::Horizontal, ctx.boundary())?;
                blend_in_place(&mut rough, &grain, 0.3);
            }
            MaterialClass::Metal => {
                rough.map_in_place(|v| v.max(METAL_ROUGHNESS_FLOOR));
                if p.directional {
                    if ctx.cancel.is_cancelled() {
                        return Err(TextureError::Cancelled);
                    }
                    let streaked = directional_streaks(&rough, p.direction_angle_deg)?;
                    blend_in_place(&mut rough, &streaked, 0.5);
                }
            }
            _ => {}
        }

        // Step 3 — uniform noise, fixed seed for byte determinism
        if p.variation > 0.0 {
            let mut rng = StdRng::seed_from_u64(NOISE_SEED);
            for v in rough.data_mut() {
                *v = (*v + rng.random_range(-p.variation..=p.variation)).clamp(0.0, 1.0);
            }
        }

        Ok(TextureMap {
            kind: MapKind::Roughness,
            data: TextureData::Gray8(rough.to_gray8()),
        })
    }
}

/// Anisotropic streaks: rotate so the streak axis is horizontal, blur
/// along it, rotate back. Sigma scales with resolution so the streak
/// length stays proportional at any size.
fn directional_streaks(rough: &Plane, angle_deg: f32) -> Result<Plane> {
    let sigma = (rough.width().min(rough.height()) as f32 / 256.0).max(1.0);
    let rotated = rotate(rough, angle_deg)?;
    let streaked = blur_axis(&rotated, sigma, Axis::Horizontal, Boundary::Replicate)?;
    rotate(&streaked, -angle_deg)
}

/// `dst ← (1−t)·dst + t·src`, shapes already verified equal.
fn blend_in_place(dst: &mut Plane, src: &Plane, t: f32) {
    for (d, s) in dst.data_mut().iter_mut().zip(src.data().iter()) {
        *d = (1.0 - t) * *d + t * *s;
    }
}

fn clamp01_param(name: &str, value: f32, diag: &mut Diagnostics) -> f32 {
    if (0.0..=1.0).contains(&value) {
        value
    } else {
        let clamped = value.clamp(0.0, 1.0);
        diag.warn(format!("{name} {value} outside [0, 1], clamped to {clamped}"));
        clamped
    }
}
