use mannequin_ngin::{
    data_structures::texture::EnvironmentMapping,
    resources::{AssetLoader, load_or_warn, texture::decode_environment},
};

use crate::common::test_utils::{asset_dir, hdr_bytes};

mod common;

#[test]
fn hdr_decodes_to_linear_rgb() {
    let environment = decode_environment(
        &hdr_bytes(4, 2),
        "gradient.hdr",
        EnvironmentMapping::EquirectangularReflection,
    )
    .unwrap();
    assert_eq!((environment.width(), environment.height()), (4, 2));
    assert_eq!(environment.name, "gradient.hdr");

    // RGBE keeps about two significant digits
    let pixel = environment.image.get_pixel(3, 0);
    assert!((pixel[0] - 1.5).abs() < 0.05);
    assert!((pixel[1] - 1.0).abs() < 0.05);
    assert!((pixel[2] - 2.0).abs() < 0.05);
}

#[test]
fn gpu_layout_has_an_opaque_alpha() {
    let environment = decode_environment(
        &hdr_bytes(2, 2),
        "small.hdr",
        EnvironmentMapping::EquirectangularRefraction,
    )
    .unwrap();
    let texels = environment.to_rgba_f16();
    assert_eq!(texels.len(), 2 * 2 * 4);
    assert!(texels.chunks(4).all(|texel| texel[3].to_f32() == 1.0));
}

#[test]
fn corrupt_hdr_is_an_error() {
    let result = decode_environment(
        b"#?RADIANCE\nnot really",
        "broken.hdr",
        EnvironmentMapping::EquirectangularReflection,
    );
    assert!(result.is_err());
}

#[tokio::test]
async fn environment_loads_from_the_asset_root() {
    let dir = asset_dir("environment");
    std::fs::write(dir.join("hdr.hdr"), hdr_bytes(8, 4)).unwrap();
    let loader = AssetLoader::new(dir.to_string_lossy());

    let environment = loader
        .load_environment("hdr.hdr", EnvironmentMapping::EquirectangularReflection)
        .await
        .unwrap();
    assert_eq!(environment.width(), 8);

    let missing = load_or_warn(
        "nothing.hdr",
        loader.load_environment("nothing.hdr", EnvironmentMapping::EquirectangularReflection),
    )
    .await;
    assert!(missing.is_none());
}
