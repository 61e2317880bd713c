//! Writing the reference image into fresh containers.

use std::num::NonZeroU64;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};
use zarrs::array::{
    Array, ArrayMetadata, ArrayMetadataOptions, ArrayMetadataV2, ArrayMetadataV3,
    ChunkKeySeparator, FillValueMetadata,
    chunk_grid::{RegularChunkGrid, RegularChunkGridConfiguration},
};
use zarrs::group::GroupMetadataV3;
use zarrs::metadata::v3::MetadataV3;
use zarrs::plugin::ExtensionAliasesV3;
use zarrs::storage::ListableStorageTraits;

use crate::compressor::{Compressor, dataset_name};
use crate::config::{FillValuePolicy, GeneratorConfig, OutputFormat};
use crate::n5::metadata::{N5ArrayMetadata, N5Compression, N5GroupMetadata, data_type_metadata};
use crate::reference_image::{ReferenceImage, load_png};
use crate::storage::FsStore;

const ZARR_V2_GROUP_KEY: &str = ".zgroup";
const ZARR_V3_METADATA_KEY: &str = "zarr.json";
const N5_METADATA_KEY: &str = "attributes.json";

/// What one container ended up holding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSummary {
    pub format: OutputFormat,
    pub root: PathBuf,
    /// Datasets written, in configuration order.
    pub datasets: Vec<String>,
    /// Datasets the format cannot express.
    pub skipped: Vec<String>,
    /// Number of keys in the store after writing.
    pub keys: usize,
}

/// Recreate every configured container and write the reference image into each.
///
/// Existing containers are removed first.
/// All containers are prepared before the image is decoded.
/// Any failure aborts the run and may leave a partially written container behind.
pub fn generate_all(config: &GeneratorConfig) -> crate::Result<Vec<ContainerSummary>> {
    let mut containers = Vec::with_capacity(config.formats.len());
    for &format in &config.formats {
        let root = config.container_root(format);
        remove_container(&root)?;
        let store = Arc::new(FsStore::new(&root)?);
        write_root_metadata(&store, format)?;
        containers.push((format, store));
    }

    let image = load_png(&config.image)?;
    let chunk_shape = chunk_shape(config, &image)?;
    info!(
        "loaded {} with shape {:?}",
        config.image.display(),
        image.shape()
    );

    let mut summaries = Vec::with_capacity(containers.len());
    for (format, store) in containers {
        let writer = DatasetWriter {
            store: &store,
            format,
            image: &image,
            chunk_shape: &chunk_shape,
            fill_value: config.fill_value,
        };
        let mut datasets = vec![];
        let mut skipped = vec![];
        for compressor in &config.compressors {
            let compressor = compressor.as_ref();
            let name = dataset_name(compressor);
            if !format.supports(compressor) {
                warn!("{format:?} cannot store {name}, skipping");
                skipped.push(name);
                continue;
            }
            writer.write(&name, compressor)?;
            datasets.push(name);
        }
        let keys = store.list()?.len();
        info!(
            "wrote {} ({} datasets, {keys} keys)",
            store.root().display(),
            datasets.len()
        );
        summaries.push(ContainerSummary {
            format,
            root: store.root().to_path_buf(),
            datasets,
            skipped,
            keys,
        });
    }
    Ok(summaries)
}

fn remove_container(root: &Path) -> crate::Result<()> {
    match std::fs::remove_dir_all(root) {
        Ok(()) => {
            debug!("removed {}", root.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn write_group_metadata(store: &FsStore, format: OutputFormat, prefix: &str) -> crate::Result<()> {
    let key = |name: &str| {
        if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{prefix}/{name}")
        }
    };
    match format {
        OutputFormat::ZarrV2 | OutputFormat::ZarrV2Nested => store.write_json(
            &key(ZARR_V2_GROUP_KEY),
            &serde_json::json!({ "zarr_format": 2 }),
        ),
        OutputFormat::ZarrV3 => {
            store.write_json(&key(ZARR_V3_METADATA_KEY), &GroupMetadataV3::default())
        }
        OutputFormat::N5 => {
            let meta = if prefix.is_empty() {
                N5GroupMetadata::root()
            } else {
                N5GroupMetadata::default()
            };
            store.write_json(&key(N5_METADATA_KEY), &meta)
        }
    }
}

fn write_root_metadata(store: &FsStore, format: OutputFormat) -> crate::Result<()> {
    write_group_metadata(store, format, "")
}

/// Group metadata for every ancestor of `name` below the root, e.g. `blosc` for `blosc/lz4`.
fn write_parent_groups(store: &FsStore, format: OutputFormat, name: &str) -> crate::Result<()> {
    let parts: Vec<_> = name.split('/').collect();
    for depth in 1..parts.len() {
        let prefix = parts[..depth].join("/");
        write_group_metadata(store, format, &prefix)?;
    }
    Ok(())
}

fn chunk_shape(config: &GeneratorConfig, image: &ReferenceImage) -> crate::Result<Vec<NonZeroU64>> {
    if config.chunk_shape.len() != image.shape().len() {
        return Err(crate::Error::general(format!(
            "chunk shape {:?} does not match image dimensionality {}",
            config.chunk_shape,
            image.shape().len()
        )));
    }
    config
        .chunk_shape
        .iter()
        .map(|&n| NonZeroU64::new(n).ok_or_else(|| crate::Error::general("zero chunk size")))
        .collect()
}

struct DatasetWriter<'a> {
    store: &'a Arc<FsStore>,
    format: OutputFormat,
    image: &'a ReferenceImage,
    chunk_shape: &'a [NonZeroU64],
    fill_value: FillValuePolicy,
}

impl DatasetWriter<'_> {
    fn write(&self, name: &str, compressor: Option<&Compressor>) -> crate::Result<()> {
        write_parent_groups(self.store, self.format, name)?;
        let path = format!("/{name}");
        let array = match self.format {
            OutputFormat::ZarrV2 => {
                self.zarr_v2_array(&path, compressor, ChunkKeySeparator::Dot)?
            }
            OutputFormat::ZarrV2Nested => {
                self.zarr_v2_array(&path, compressor, ChunkKeySeparator::Slash)?
            }
            OutputFormat::ZarrV3 => self.zarr_v3_array(&path, compressor)?,
            OutputFormat::N5 => self.n5_array(name, &path, compressor)?,
        };
        debug!("writing {name} to {}", self.store.root().display());
        array.store_array_subset(&array.subset_all(), self.image.to_vec())?;
        Ok(())
    }

    fn store_metadata(array: &Array<FsStore>) -> crate::Result<()> {
        array.store_metadata_opt(
            &ArrayMetadataOptions::default().with_include_zarrs_metadata(false),
        )?;
        Ok(())
    }

    fn zarr_v2_array(
        &self,
        path: &str,
        compressor: Option<&Compressor>,
        separator: ChunkKeySeparator,
    ) -> crate::Result<Array<FsStore>> {
        let fill_value = match self.fill_value {
            FillValuePolicy::Explicit => serde_json::json!(0),
            FillValuePolicy::Implicit => serde_json::Value::Null,
        };
        let compressor = compressor
            .map(|c| serde_json::to_value(c).and_then(serde_json::from_value))
            .transpose()?;
        let metadata = ArrayMetadataV2::new(
            self.image.shape(),
            self.chunk_shape.to_vec().into(),
            serde_json::from_value(serde_json::json!("|u1"))?,
            serde_json::from_value(fill_value)?,
            compressor,
            None,
        )
        .with_dimension_separator(separator);
        let array =
            Array::new_with_metadata(self.store.clone(), path, ArrayMetadata::V2(metadata))?;
        Self::store_metadata(&array)?;
        Ok(array)
    }

    fn zarr_v3_array(
        &self,
        path: &str,
        compressor: Option<&Compressor>,
    ) -> crate::Result<Array<FsStore>> {
        let chunk_grid = MetadataV3::new_with_serializable_configuration(
            RegularChunkGrid::aliases_v3().default_name.clone().to_string(),
            &RegularChunkGridConfiguration {
                chunk_shape: self.chunk_shape.to_vec(),
            },
        )?;
        let mut codecs = vec![MetadataV3::new("bytes".to_string())];
        if let Some(c) = compressor {
            codecs.push(c.to_codec_metadata_v3()?);
        }
        // always explicit: V3 has no "no fill value"
        let fill_value = FillValueMetadata::Number(serde_json::Number::from(0));
        let metadata = ArrayMetadataV3::new(
            self.image.shape(),
            chunk_grid,
            data_type_metadata("uint8")?,
            fill_value,
            codecs,
        );
        let array =
            Array::new_with_metadata(self.store.clone(), path, ArrayMetadata::V3(metadata))?;
        Self::store_metadata(&array)?;
        Ok(array)
    }

    fn n5_array(
        &self,
        name: &str,
        path: &str,
        compressor: Option<&Compressor>,
    ) -> crate::Result<Array<FsStore>> {
        let compression = match compressor {
            None => N5Compression::Raw,
            Some(c) => c.to_n5_compression()?.ok_or_else(|| {
                crate::Error::general(format!("no N5 equivalent for {}", c.id()))
            })?,
        };
        let chunk_shape: Vec<u64> = self.chunk_shape.iter().map(|n| n.get()).collect();
        let n5 = N5ArrayMetadata::new(&self.image.shape(), &chunk_shape, "uint8", compression);
        self.store
            .write_json(&format!("{name}/{N5_METADATA_KEY}"), &n5)?;
        // zarr.json is never written; N5 readers only see attributes.json
        let metadata = ArrayMetadataV3::try_from(n5)?;
        let array =
            Array::new_with_metadata(self.store.clone(), path, ArrayMetadata::V3(metadata))?;
        Ok(array)
    }
}
