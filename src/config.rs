use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::compressor::{Compressor, dataset_name, default_compressors};

/// Container formats the generator can write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// Zarr V2 with `.`-separated chunk keys.
    ZarrV2,
    /// Zarr V2 with `/`-separated chunk keys.
    ZarrV2Nested,
    ZarrV3,
    N5,
}

impl OutputFormat {
    /// Directory name of this format's container for writer `name`.
    pub fn container_name(&self, name: &str) -> String {
        match self {
            OutputFormat::ZarrV2 => format!("{name}.zr"),
            OutputFormat::ZarrV2Nested => format!("{name}_nested.zr"),
            OutputFormat::ZarrV3 => format!("{name}.zr3"),
            OutputFormat::N5 => format!("{name}.n5"),
        }
    }

    /// Whether datasets with this compressor can be written in this format.
    pub fn supports(&self, compressor: Option<&Compressor>) -> bool {
        match (self, compressor) {
            (OutputFormat::N5, Some(c)) => c.has_n5_equivalent(),
            _ => true,
        }
    }
}

/// How the fill value is recorded in Zarr V2 array metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FillValuePolicy {
    /// `"fill_value": 0`
    #[default]
    Explicit,
    /// `"fill_value": null`
    Implicit,
}

/// Everything a generation or verification run needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorConfig {
    /// Directory the containers are written into.
    pub data_dir: PathBuf,
    /// Source PNG.
    pub image: PathBuf,
    /// Writer name, used as the container stem.
    pub name: String,
    /// Compressors to write, in order. `null` is uncompressed.
    pub compressors: Vec<Option<Compressor>>,
    pub formats: Vec<OutputFormat>,
    pub chunk_shape: Vec<u64>,
    pub fill_value: FillValuePolicy,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        let data_dir = PathBuf::from("../../data");
        Self {
            image: data_dir.join("reference_image.png"),
            data_dir,
            name: "zarrs".into(),
            compressors: default_compressors(),
            formats: vec![OutputFormat::ZarrV2],
            chunk_shape: vec![100, 100, 1],
            fill_value: FillValuePolicy::default(),
        }
    }
}

impl GeneratorConfig {
    /// Defaults, with the data directory and image path under `data_dir`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            image: data_dir.join("reference_image.png"),
            data_dir,
            ..Default::default()
        }
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> crate::Result<Self> {
        let f = std::fs::File::open(path)?;
        let config = serde_json::from_reader(std::io::BufReader::new(f))?;
        Ok(config)
    }

    pub fn container_root(&self, format: OutputFormat) -> PathBuf {
        self.data_dir.join(format.container_name(&self.name))
    }

    /// Dataset names this configuration writes in `format`, with their compressors.
    pub fn datasets(
        &self,
        format: OutputFormat,
    ) -> impl Iterator<Item = (String, Option<&Compressor>)> {
        self.compressors
            .iter()
            .map(Option::as_ref)
            .filter(move |c| format.supports(*c))
            .map(|c| (dataset_name(c), c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = GeneratorConfig::default();
        assert_eq!(c.container_root(OutputFormat::ZarrV2), Path::new("../../data/zarrs.zr"));
        assert_eq!(c.image, Path::new("../../data/reference_image.png"));
        assert_eq!(c.chunk_shape, [100, 100, 1]);
        assert_eq!(c.fill_value, FillValuePolicy::Explicit);
        let names: Vec<_> = c.datasets(OutputFormat::ZarrV2).map(|(n, _)| n).collect();
        assert_eq!(names, ["gzip", "blosc/lz4", "zlib", "raw"]);
    }

    #[test]
    fn n5_datasets() {
        let c = GeneratorConfig::default();
        let names: Vec<_> = c.datasets(OutputFormat::N5).map(|(n, _)| n).collect();
        assert_eq!(names, ["gzip", "raw"]);
        assert!(OutputFormat::N5.supports(Some(&Compressor::Gzip { level: 200 })));
    }

    #[test]
    fn container_names() {
        assert_eq!(OutputFormat::ZarrV2Nested.container_name("js"), "js_nested.zr");
        assert_eq!(OutputFormat::ZarrV3.container_name("js"), "js.zr3");
        assert_eq!(OutputFormat::N5.container_name("js"), "js.n5");
    }

    #[test]
    fn partial_json() {
        let c: GeneratorConfig = serde_json::from_str(
            r#"{
                "name": "custom",
                "formats": ["zarr-v3", "n5"],
                "compressors": [{"id": "gzip", "level": 9}, null],
                "fill_value": "implicit"
            }"#,
        )
        .unwrap();
        assert_eq!(c.name, "custom");
        assert_eq!(c.formats, [OutputFormat::ZarrV3, OutputFormat::N5]);
        assert_eq!(c.compressors, [Some(Compressor::Gzip { level: 9 }), None]);
        assert_eq!(c.fill_value, FillValuePolicy::Implicit);
        assert_eq!(c.chunk_shape, [100, 100, 1]);
    }

    #[test]
    fn unknown_field_rejected() {
        assert!(serde_json::from_str::<GeneratorConfig>(r#"{"colour": "blue"}"#).is_err());
    }
}
