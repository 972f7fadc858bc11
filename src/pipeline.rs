use crate::buffer::{luminance, Plane};
use crate::diag::Diagnostics;
use crate::error::{Result, TextureError};
use crate::intake::TextureProvider;
use crate::maps::{
    build_derivers, DerivationParams, DeriveContext, MapKind, TextureData, TextureMap,
};
use crate::material::MaterialClass;
use crate::tessellation::{
    make_seamless_plane, make_seamless_rgb, validate_tiling_rgb, TessellationParams,
};
use image::RgbImage;
use rayon::prelude::*;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Smallest processable request; anything below is `InvalidRequest`.
const MIN_RESOLUTION: u32 = 16;

// ── Cancellation ──────────────────────────────────────────────────────────

/// Shared cooperative cancellation flag.
///
/// Stages poll it between pipeline steps; derivation kernels poll between
/// their internal passes. Cancellation never discards completed work.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

// ── Request / result types ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Resolution { width, height }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Everything the orchestrator needs for one run. Built by the config
/// layer / CLI; the core never reads configuration itself.
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub prompt: String,
    pub resolution: Resolution,
    pub material: MaterialClass,
    pub kinds: BTreeSet<MapKind>,
    pub tessellation: TessellationParams,
    pub derivation: DerivationParams,
    pub seamless: bool,
}

impl PipelineRequest {
    /// Request with preset-derived parameters for every map kind.
    pub fn new(prompt: impl Into<String>, resolution: Resolution, material: MaterialClass) -> Self {
        PipelineRequest {
            prompt: prompt.into(),
            resolution,
            material,
            kinds: MapKind::ALL.into_iter().collect(),
            tessellation: TessellationParams::default(),
            derivation: DerivationParams::for_material(material),
            seamless: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStatus {
    Complete,
    /// Cancellation was observed; the result carries whatever finished.
    Cancelled,
}

/// Output of a pipeline run. The diffuse master is always present;
/// derived maps are present when requested and successfully derived.
#[derive(Debug)]
pub struct PipelineResult {
    pub diffuse: RgbImage,
    pub normal: Option<TextureMap>,
    pub roughness: Option<TextureMap>,
    pub metallic: Option<TextureMap>,
    pub ao: Option<TextureMap>,
    pub height: Option<TextureMap>,
    pub warnings: Vec<String>,
    pub status: PipelineStatus,
}

impl PipelineResult {
    pub fn map(&self, kind: MapKind) -> Option<&TextureMap> {
        match kind {
            MapKind::Diffuse => None,
            MapKind::Normal => self.normal.as_ref(),
            MapKind::Roughness => self.roughness.as_ref(),
            MapKind::Metallic => self.metallic.as_ref(),
            MapKind::Ao => self.ao.as_ref(),
            MapKind::Height => self.height.as_ref(),
        }
    }

    /// All present derived maps, in `MapKind` order.
    pub fn derived_maps(&self) -> impl Iterator<Item = &TextureMap> {
        MapKind::ALL.into_iter().filter_map(|k| self.map(k))
    }
}

// ── Orchestrator ──────────────────────────────────────────────────────────

/// Run the full pipeline: intake → normalize → tessellate → shared height
/// → parallel fanout → seal.
///
/// The first four stages are strictly sequential and single-threaded; the
/// fanout runs one rayon task per requested map (the pool caps effective
/// parallelism at the core count). `diffuse` and the height cache are
/// frozen before fanout, so every task observes identical bytes and the
/// result set is deterministic for identical inputs.
pub fn run(
    request: &PipelineRequest,
    provider: &dyn TextureProvider,
    cancel: &CancelFlag,
) -> Result<PipelineResult> {
    validate_request(request)?;
    let mut diag = Diagnostics::new();

    // ── Intake ── fail-fast on upstream trouble, no retry here
    if cancel.is_cancelled() {
        return Err(TextureError::Cancelled);
    }
    log::info!(
        "requesting {} diffuse from provider '{}'",
        request.resolution,
        provider.name()
    );
    let raw = provider.generate(
        &request.prompt,
        request.resolution.width,
        request.resolution.height,
    )?;

    // ── Normalize ── providers may return other dimensions
    if cancel.is_cancelled() {
        return Err(TextureError::Cancelled);
    }
    let (rw, rh) = raw.dimensions();
    if (rw, rh) != (request.resolution.width, request.resolution.height) {
        log::info!("resizing provider output {rw}x{rh} to {}", request.resolution);
    }
    let mut diffuse = crate::buffer::resize_rgb(
        &raw,
        request.resolution.width,
        request.resolution.height,
    )?;

    // ── Tessellate ──
    if cancel.is_cancelled() {
        return Ok(seal_cancelled(diffuse, diag));
    }
    if request.seamless {
        diffuse = make_seamless_rgb(&diffuse, &request.tessellation, &mut diag)?;
        let report = validate_tiling_rgb(&diffuse)?;
        log::info!(
            "tessellation residual: max edge delta {:.6}",
            report.max_edge_delta
        );
    }

    // ── SharedHeight ── one luminance plane feeds normal, height and AO
    if cancel.is_cancelled() {
        return Ok(seal_cancelled(diffuse, diag));
    }
    let height_cache = match luminance(&diffuse) {
        Ok(plane) => Some(plane),
        Err(e) => {
            diag.warn(format!("height cache unavailable: {e}"));
            None
        }
    };

    // ── Fanout ──
    let derivers = build_derivers(request.kinds.iter().copied(), &request.derivation);
    let ctx = DeriveContext {
        diffuse: &diffuse,
        height: height_cache.as_ref(),
        material: request.material,
        seamless: request.seamless,
        cancel,
    };
    let outcomes: Vec<_> = derivers
        .par_iter()
        .map(|deriver| {
            let mut task_diag = Diagnostics::new();
            if cancel.is_cancelled() {
                return (deriver.kind(), Err(TextureError::Cancelled), task_diag, true);
            }
            let result = deriver.derive(&ctx, &mut task_diag);
            (
                deriver.kind(),
                result,
                task_diag,
                deriver.preserves_seamlessness(),
            )
        })
        .collect();

    // ── Seal ── drain task diagnostics in deriver order, re-tessellate
    // maps whose kernels broke edge continuity, degrade failures to
    // warnings.
    let mut result = PipelineResult {
        diffuse,
        normal: None,
        roughness: None,
        metallic: None,
        ao: None,
        height: None,
        warnings: Vec::new(),
        status: PipelineStatus::Complete,
    };
    for (kind, outcome, task_diag, preserves) in outcomes {
        diag.absorb(task_diag);
        let outcome = outcome.and_then(|map| {
            if request.seamless && !preserves {
                retessellate(map, &request.tessellation, &mut diag)
            } else {
                Ok(map)
            }
        });
        match outcome {
            Ok(map) => store_map(&mut result, kind, map),
            Err(e) if e.is_cancelled() => {
                // Dropped quietly; status reflects the cancellation below.
            }
            Err(e) => {
                let wrapped = TextureError::derivation(kind, e);
                diag.warn(format!("{wrapped}; map omitted"));
            }
        }
    }

    if cancel.is_cancelled() {
        result.status = PipelineStatus::Cancelled;
    }
    result.warnings = diag.into_warnings();
    Ok(result)
}

fn validate_request(request: &PipelineRequest) -> Result<()> {
    let res = request.resolution;
    if res.width < MIN_RESOLUTION || res.height < MIN_RESOLUTION {
        return Err(TextureError::InvalidRequest(format!(
            "resolution {res} below minimum {MIN_RESOLUTION}x{MIN_RESOLUTION}"
        )));
    }
    if request.kinds.is_empty() {
        return Err(TextureError::InvalidRequest("no map kinds requested".into()));
    }
    if request.prompt.trim().is_empty() {
        return Err(TextureError::InvalidRequest("empty prompt".into()));
    }
    Ok(())
}

fn seal_cancelled(diffuse: RgbImage, diag: Diagnostics) -> PipelineResult {
    PipelineResult {
        diffuse,
        normal: None,
        roughness: None,
        metallic: None,
        ao: None,
        height: None,
        warnings: diag.into_warnings(),
        status: PipelineStatus::Cancelled,
    }
}

fn store_map(result: &mut PipelineResult, kind: MapKind, map: TextureMap) {
    match kind {
        MapKind::Diffuse => {}
        MapKind::Normal => result.normal = Some(map),
        MapKind::Roughness => result.roughness = Some(map),
        MapKind::Metallic => result.metallic = Some(map),
        MapKind::Ao => result.ao = Some(map),
        MapKind::Height => result.height = Some(map),
    }
}

/// Re-run the tessellation engine on a derived map whose kernel is not
/// seamless-preserving (directional roughness is the one such case).
fn retessellate(
    map: TextureMap,
    params: &TessellationParams,
    diag: &mut Diagnostics,
) -> Result<TextureMap> {
    let kind = map.kind;
    let data = match map.data {
        TextureData::Rgb8(img) => TextureData::Rgb8(make_seamless_rgb(&img, params, diag)?),
        TextureData::Gray8(img) => {
            let plane = Plane::from_gray8(&img)?;
            TextureData::Gray8(make_seamless_plane(&plane, params, diag)?.to_gray8())
        }
        TextureData::Gray16(img) => {
            let plane = Plane::from_fn(img.width(), img.height(), |x, y| {
                img.get_pixel(x, y)[0] as f32 / 65535.0
            })?;
            TextureData::Gray16(make_seamless_plane(&plane, params, diag)?.to_gray16())
        }
    };
    Ok(TextureMap { kind, data })
}
