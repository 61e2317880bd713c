//! Reading generated datasets back and comparing them with the reference image.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use log::{info, warn};
use zarrs::array::Array;
use zarrs::storage::ReadableStorageTraits;

use crate::config::{GeneratorConfig, OutputFormat};
use crate::n5::storage::N5Store;
use crate::reference_image::{ReferenceImage, load_png};
use crate::storage::FsStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Match,
    ShapeMismatch { expected: Vec<u64>, found: Vec<u64> },
    /// Index into the flattened (C order) samples.
    DataMismatch { first_index: usize },
    /// The dataset could not be opened or decoded.
    Failed(String),
}

/// Result of reading back one dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetCheck {
    pub format: OutputFormat,
    pub root: PathBuf,
    pub dataset: String,
    pub outcome: CheckOutcome,
}

impl DatasetCheck {
    pub fn is_match(&self) -> bool {
        self.outcome == CheckOutcome::Match
    }
}

impl fmt::Display for DatasetCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}: ", self.root.display(), self.dataset)?;
        match &self.outcome {
            CheckOutcome::Match => write!(f, "ok"),
            CheckOutcome::ShapeMismatch { expected, found } => {
                write!(f, "shape {found:?}, expected {expected:?}")
            }
            CheckOutcome::DataMismatch { first_index } => {
                write!(f, "data differs from sample {first_index}")
            }
            CheckOutcome::Failed(msg) => write!(f, "failed: {msg}"),
        }
    }
}

/// Read every configured dataset back and compare it with the reference image.
///
/// Problems with individual datasets are reported as outcomes;
/// a missing container or an unreadable image is an error.
pub fn verify_all(config: &GeneratorConfig) -> crate::Result<Vec<DatasetCheck>> {
    let image = load_png(&config.image)?;
    let mut checks = vec![];
    for &format in &config.formats {
        let root = config.container_root(format);
        if !root.is_dir() {
            return Err(crate::Error::general(format!(
                "container {} does not exist",
                root.display()
            )));
        }
        let store = FsStore::new(&root)?;
        for (dataset, _) in config.datasets(format) {
            let path = format!("/{dataset}");
            let outcome = match format {
                OutputFormat::N5 => {
                    check_array(Arc::new(N5Store::new(store.clone())), &path, &image)
                }
                _ => check_array(Arc::new(store.clone()), &path, &image),
            };
            let check = DatasetCheck {
                format,
                root: root.clone(),
                dataset,
                outcome,
            };
            if check.is_match() {
                info!("{check}");
            } else {
                warn!("{check}");
            }
            checks.push(check);
        }
    }
    Ok(checks)
}

fn check_array<S: ReadableStorageTraits + 'static>(
    store: Arc<S>,
    path: &str,
    image: &ReferenceImage,
) -> CheckOutcome {
    let array = match Array::open(store, path) {
        Ok(a) => a,
        Err(e) => return CheckOutcome::Failed(e.to_string()),
    };
    let expected = image.shape();
    if array.shape() != expected.as_slice() {
        return CheckOutcome::ShapeMismatch {
            expected,
            found: array.shape().to_vec(),
        };
    }
    let data: Vec<u8> = match array.retrieve_array_subset(&array.subset_all()) {
        Ok(d) => d,
        Err(e) => return CheckOutcome::Failed(e.to_string()),
    };
    match data.iter().zip(image.pixels().iter()).position(|(a, b)| a != b) {
        Some(first_index) => CheckOutcome::DataMismatch { first_index },
        None => CheckOutcome::Match,
    }
}
