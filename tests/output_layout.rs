//! On-disk layout produced by the output writer.

use pbrforge::config::OutputSection;
use pbrforge::intake::FlatProvider;
use pbrforge::maps::HeightBitDepth;
use pbrforge::output::write_result;
use pbrforge::pipeline::{run, CancelFlag, PipelineRequest, Resolution};
use pbrforge::MaterialClass;

#[test]
fn writes_the_documented_file_layout() {
    let mut request = PipelineRequest::new(
        "flat test plate",
        Resolution::new(32, 32),
        MaterialClass::Stone,
    );
    request.derivation.height.bit_depth = HeightBitDepth::Sixteen;
    let result = run(&request, &FlatProvider::mid_gray(), &CancelFlag::default()).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let mut opts = OutputSection::default();
    opts.directory = dir.path().to_path_buf();
    opts.prefix = "plate".into();
    opts.create_preview = true;
    let written = write_result(&result, &opts).unwrap();

    for name in [
        "plate_diffuse_32x32.png",
        "plate_normal_32x32.png",
        "plate_roughness_32x32.png",
        "plate_metallic_32x32.png",
        "plate_ao_32x32.png",
        "plate_height_32x32.png",
        "plate_preview.png",
    ] {
        assert!(dir.path().join(name).is_file(), "{name} missing");
    }
    assert_eq!(written.len(), 7);

    // The preview doubles the diffuse in both directions.
    let preview = image::open(dir.path().join("plate_preview.png"))
        .unwrap()
        .to_rgb8();
    assert_eq!(preview.dimensions(), (64, 64));

    // The height map round-trips as true 16-bit grayscale.
    let height = image::open(dir.path().join("plate_height_32x32.png")).unwrap();
    assert!(matches!(height, image::DynamicImage::ImageLuma16(_)));
}
