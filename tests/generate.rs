use std::error::Error;
use std::path::Path;
use std::sync::Arc;

use image::{Rgba, RgbaImage};
use zarrs::array::Array;
use zarrs::storage::ReadableStorageTraits;
use zarrs_fixtures::n5::storage::N5Store;
use zarrs_fixtures::storage::FsStore;
use zarrs_fixtures::{
    CheckOutcome, Compressor, FillValuePolicy, GeneratorConfig, OutputFormat, generate_all,
    verify_all,
};

// Not a multiple of the chunk size, so edge chunks are partial.
const HEIGHT: u32 = 250;
const WIDTH: u32 = 230;

fn pixel(x: u32, y: u32) -> Rgba<u8> {
    Rgba([
        (x % 256) as u8,
        (y % 256) as u8,
        ((x * 7 + y * 3) % 256) as u8,
        (255 - (x + y) % 256) as u8,
    ])
}

/// Expected samples after alpha is dropped, C order.
fn expected_rgb() -> Vec<u8> {
    let mut out = Vec::with_capacity((HEIGHT * WIDTH * 3) as usize);
    for y in 0..HEIGHT {
        for x in 0..WIDTH {
            out.extend_from_slice(&pixel(x, y).0[..3]);
        }
    }
    out
}

fn setup(formats: &[OutputFormat]) -> (tempfile::TempDir, GeneratorConfig) {
    env_logger::try_init().ok();
    let dir = tempfile::TempDir::new().expect("create temp dir");
    RgbaImage::from_fn(WIDTH, HEIGHT, pixel)
        .save(dir.path().join("reference_image.png"))
        .expect("write reference image");
    let mut config = GeneratorConfig::with_data_dir(dir.path());
    config.formats = formats.to_vec();
    (dir, config)
}

fn read_back<S: ReadableStorageTraits + 'static>(store: Arc<S>, name: &str) -> (Vec<u64>, Vec<u8>) {
    let array = Array::open(store, &format!("/{name}")).expect("open array");
    let shape = array.shape().to_vec();
    let data: Vec<u8> = array
        .retrieve_array_subset(&array.subset_all())
        .expect("retrieve all data");
    (shape, data)
}

fn check_read(root: &Path, name: &str) {
    let (shape, data) = read_back(Arc::new(FsStore::new(root).expect("open store")), name);
    assert_eq!(shape, [HEIGHT as u64, WIDTH as u64, 3]);
    assert_eq!(data, expected_rgb(), "{name} differs");
}

fn read_json(path: impl AsRef<Path>) -> serde_json::Value {
    let bytes = std::fs::read(path).expect("read json");
    serde_json::from_slice(&bytes).expect("parse json")
}

#[test]
fn test_default_datasets() -> Result<(), Box<dyn Error>> {
    let (dir, config) = setup(&[OutputFormat::ZarrV2]);
    let summaries = generate_all(&config)?;
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].datasets, ["gzip", "blosc/lz4", "zlib", "raw"]);
    assert!(summaries[0].skipped.is_empty());

    let root = dir.path().join("zarrs.zr");
    assert_eq!(summaries[0].root, root);
    for name in ["gzip", "blosc/lz4", "zlib", "raw"] {
        check_read(&root, name);
    }
    Ok(())
}

#[test]
fn test_zgroup() -> Result<(), Box<dyn Error>> {
    let (dir, config) = setup(&[OutputFormat::ZarrV2]);
    generate_all(&config)?;
    let root = dir.path().join("zarrs.zr");
    assert_eq!(
        read_json(root.join(".zgroup")),
        serde_json::json!({"zarr_format": 2})
    );
    assert!(root.join("blosc/.zgroup").is_file());
    Ok(())
}

#[test]
fn test_zarray() -> Result<(), Box<dyn Error>> {
    let (dir, config) = setup(&[OutputFormat::ZarrV2]);
    generate_all(&config)?;
    let zarray = read_json(dir.path().join("zarrs.zr/blosc/lz4/.zarray"));
    assert_eq!(zarray["zarr_format"], 2);
    assert_eq!(zarray["shape"], serde_json::json!([HEIGHT, WIDTH, 3]));
    assert_eq!(zarray["chunks"], serde_json::json!([100, 100, 1]));
    assert_eq!(zarray["dtype"], "|u1");
    assert_eq!(zarray["fill_value"], 0);
    assert_eq!(zarray["compressor"]["id"], "blosc");
    assert_eq!(zarray["compressor"]["cname"], "lz4");

    let zarray = read_json(dir.path().join("zarrs.zr/raw/.zarray"));
    assert!(zarray["compressor"].is_null());
    Ok(())
}

#[test]
fn test_implicit_fill_value() -> Result<(), Box<dyn Error>> {
    let (dir, mut config) = setup(&[OutputFormat::ZarrV2]);
    config.fill_value = FillValuePolicy::Implicit;
    generate_all(&config)?;
    let zarray = read_json(dir.path().join("zarrs.zr/gzip/.zarray"));
    assert!(zarray["fill_value"].is_null());
    check_read(&dir.path().join("zarrs.zr"), "gzip");
    Ok(())
}

#[test]
fn test_rerun_replaces_container() -> Result<(), Box<dyn Error>> {
    let (dir, config) = setup(&[OutputFormat::ZarrV2]);
    let root = dir.path().join("zarrs.zr");
    std::fs::create_dir_all(root.join("stale"))?;
    std::fs::write(root.join("stale/0.0.0"), b"old")?;

    generate_all(&config)?;
    assert!(!root.join("stale").exists());
    let first = std::fs::read(root.join("gzip/0.0.0"))?;

    std::fs::write(root.join("extra"), b"left over")?;
    generate_all(&config)?;
    assert!(!root.join("extra").exists());
    assert_eq!(std::fs::read(root.join("gzip/0.0.0"))?, first);
    check_read(&root, "zlib");
    Ok(())
}

#[test]
fn test_nested() -> Result<(), Box<dyn Error>> {
    let (dir, config) = setup(&[OutputFormat::ZarrV2Nested]);
    generate_all(&config)?;
    let root = dir.path().join("zarrs_nested.zr");
    assert!(root.join("gzip/0/0/0").is_file());
    assert!(!root.join("gzip/0.0.0").exists());
    assert_eq!(read_json(root.join("gzip/.zarray"))["dimension_separator"], "/");
    for name in ["gzip", "blosc/lz4", "zlib", "raw"] {
        check_read(&root, name);
    }
    Ok(())
}

#[test]
fn test_zarr_v3() -> Result<(), Box<dyn Error>> {
    let (dir, config) = setup(&[OutputFormat::ZarrV3]);
    generate_all(&config)?;
    let root = dir.path().join("zarrs.zr3");
    assert_eq!(read_json(root.join("zarr.json"))["node_type"], "group");
    assert_eq!(read_json(root.join("blosc/zarr.json"))["node_type"], "group");
    let meta = read_json(root.join("zlib/zarr.json"));
    assert_eq!(meta["node_type"], "array");
    assert_eq!(meta["fill_value"], 0);
    for name in ["gzip", "blosc/lz4", "zlib", "raw"] {
        check_read(&root, name);
    }
    Ok(())
}

#[test]
fn test_n5() -> Result<(), Box<dyn Error>> {
    let (dir, config) = setup(&[OutputFormat::N5]);
    let summaries = generate_all(&config)?;
    assert_eq!(summaries[0].datasets, ["gzip", "raw"]);
    assert_eq!(summaries[0].skipped, ["blosc/lz4", "zlib"]);

    let root = dir.path().join("zarrs.n5");
    assert_eq!(
        read_json(root.join("attributes.json")),
        serde_json::json!({"n5": "2.0.0"})
    );
    let attrs = read_json(root.join("gzip/attributes.json"));
    assert_eq!(attrs["dimensions"], serde_json::json!([3, WIDTH, HEIGHT]));
    assert_eq!(attrs["blockSize"], serde_json::json!([1, 100, 100]));
    assert!(!root.join("gzip/zarr.json").exists());
    // N5 keys are reversed: channel/column/row
    assert!(root.join("raw/2/2/2").is_file());

    let store = Arc::new(N5Store::new(FsStore::new(&root)?));
    for name in ["gzip", "raw"] {
        let (shape, data) = read_back(store.clone(), name);
        assert_eq!(shape, [HEIGHT as u64, WIDTH as u64, 3]);
        assert_eq!(data, expected_rgb(), "{name} differs");
    }
    Ok(())
}

#[test]
fn test_verify() -> Result<(), Box<dyn Error>> {
    let (_dir, config) = setup(&[
        OutputFormat::ZarrV2,
        OutputFormat::ZarrV2Nested,
        OutputFormat::ZarrV3,
        OutputFormat::N5,
    ]);
    generate_all(&config)?;
    let checks = verify_all(&config)?;
    assert_eq!(checks.len(), 4 + 4 + 4 + 2);
    for check in &checks {
        assert!(check.is_match(), "{check}");
    }
    Ok(())
}

#[test]
fn test_verify_detects_corruption() -> Result<(), Box<dyn Error>> {
    let (dir, config) = setup(&[OutputFormat::ZarrV2]);
    generate_all(&config)?;

    // swap in another chunk's (uncompressed) contents
    let raw = dir.path().join("zarrs.zr/raw");
    std::fs::copy(raw.join("1.1.1"), raw.join("0.0.0"))?;
    std::fs::write(dir.path().join("zarrs.zr/gzip/0.0.0"), b"not gzip")?;

    let checks = verify_all(&config)?;
    let outcome = |name: &str| {
        checks
            .iter()
            .find(|c| c.dataset == name)
            .map(|c| c.outcome.clone())
            .expect("dataset checked")
    };
    assert_eq!(outcome("raw"), CheckOutcome::DataMismatch { first_index: 0 });
    assert!(matches!(outcome("gzip"), CheckOutcome::Failed(_)));
    assert_eq!(outcome("zlib"), CheckOutcome::Match);
    Ok(())
}

#[test]
fn test_verify_missing_container() {
    let (_dir, config) = setup(&[OutputFormat::ZarrV3]);
    assert!(verify_all(&config).is_err());
}

#[test]
fn test_missing_image() {
    let (dir, mut config) = setup(&[OutputFormat::ZarrV2]);
    config.image = dir.path().join("absent.png");
    assert!(generate_all(&config).is_err());
    // containers are prepared before the image is read
    assert!(dir.path().join("zarrs.zr/.zgroup").is_file());
}

#[test]
fn test_n5_gzip_level_out_of_range() {
    let (dir, mut config) = setup(&[OutputFormat::N5]);
    config.compressors = vec![Some(Compressor::Gzip { level: 200 })];
    let err = generate_all(&config).unwrap_err();
    assert!(err.to_string().contains("gzip level 200"), "unexpected error {err}");
    assert!(!dir.path().join("zarrs.n5/gzip").exists());
}
