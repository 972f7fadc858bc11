use crate::config::OutputSection;
use crate::maps::{MapKind, TextureData};
use crate::pipeline::PipelineResult;
use anyhow::Context;
use image::RgbImage;
use std::fs;
use std::path::PathBuf;

/// Write every map of a pipeline result as PNG files.
///
/// Layout: `<directory>/<prefix>_<kind>_<W>x<H>.png`, 8-bit except
/// 16-bit height maps, plus an optional `<prefix>_preview.png` holding a
/// 2×2 tiled diffuse so seams show at a glance. Returns the written
/// paths in map order.
pub fn write_result(result: &PipelineResult, opts: &OutputSection) -> anyhow::Result<Vec<PathBuf>> {
    fs::create_dir_all(&opts.directory)
        .with_context(|| format!("cannot create {}", opts.directory.display()))?;

    let (w, h) = result.diffuse.dimensions();
    let mut written = Vec::new();

    let diffuse_path = opts.directory.join(format!(
        "{}_{}_{w}x{h}.png",
        opts.prefix,
        MapKind::Diffuse.as_str()
    ));
    result
        .diffuse
        .save(&diffuse_path)
        .with_context(|| format!("writing {}", diffuse_path.display()))?;
    written.push(diffuse_path);

    for map in result.derived_maps() {
        let (mw, mh) = map.dimensions();
        let path = opts
            .directory
            .join(format!("{}_{}_{mw}x{mh}.png", opts.prefix, map.kind.as_str()));
        match &map.data {
            TextureData::Rgb8(img) => img.save(&path),
            TextureData::Gray8(img) => img.save(&path),
            TextureData::Gray16(img) => img.save(&path),
        }
        .with_context(|| format!("writing {}", path.display()))?;
        written.push(path);
    }

    if opts.create_preview {
        let preview_path = opts.directory.join(format!("{}_preview.png", opts.prefix));
        tile_2x2(&result.diffuse)
            .save(&preview_path)
            .with_context(|| format!("writing {}", preview_path.display()))?;
        written.push(preview_path);
    }

    Ok(written)
}

/// 2×2 toroidal tiling of the diffuse for visual seam inspection.
fn tile_2x2(diffuse: &RgbImage) -> RgbImage {
    let (w, h) = diffuse.dimensions();
    RgbImage::from_fn(w * 2, h * 2, |x, y| *diffuse.get_pixel(x % w, y % h))
}
