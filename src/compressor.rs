//! Named chunk compressors and their translations into each container format.
//!
//! A [`Compressor`] serializes as numcodecs-style JSON, which is exactly the
//! `compressor` field of a Zarr V2 `.zarray`.
//! `None` where an `Option<Compressor>` is expected means uncompressed ("raw").

use serde::{Deserialize, Serialize};
use zarrs::metadata::v3::MetadataV3;

use crate::n5::metadata::N5Compression;

/// Blosc shuffle modes, numcodecs numbering.
pub const BLOSC_NOSHUFFLE: u8 = 0;
pub const BLOSC_SHUFFLE: u8 = 1;
pub const BLOSC_BITSHUFFLE: u8 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "id", rename_all = "lowercase")]
pub enum Compressor {
    Gzip {
        level: u32,
    },
    Blosc {
        cname: String,
        clevel: u8,
        shuffle: u8,
        blocksize: u64,
    },
    Zlib {
        level: u32,
    },
}

impl Compressor {
    pub fn gzip() -> Self {
        Self::Gzip { level: 1 }
    }

    pub fn blosc_lz4() -> Self {
        Self::Blosc {
            cname: "lz4".into(),
            clevel: 5,
            shuffle: BLOSC_SHUFFLE,
            blocksize: 0,
        }
    }

    pub fn zlib() -> Self {
        Self::Zlib { level: 1 }
    }

    /// Look up one of the default compressors by name.
    ///
    /// `Ok(None)` is the uncompressed configuration (`"raw"` or `"none"`).
    pub fn from_name(name: &str) -> crate::Result<Option<Self>> {
        match name {
            "gzip" => Ok(Some(Self::gzip())),
            "blosc" => Ok(Some(Self::blosc_lz4())),
            "zlib" => Ok(Some(Self::zlib())),
            "raw" | "none" => Ok(None),
            n => Err(crate::Error::general(format!("unknown compressor: {n}"))),
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            Self::Gzip { .. } => "gzip",
            Self::Blosc { .. } => "blosc",
            Self::Zlib { .. } => "zlib",
        }
    }

    /// The inner algorithm for meta-compressors.
    pub fn sub_algorithm(&self) -> Option<&str> {
        match self {
            Self::Blosc { cname, .. } => Some(cname.as_str()),
            _ => None,
        }
    }

    /// Zarr V3 bytes-to-bytes codec metadata.
    pub fn to_codec_metadata_v3(&self) -> crate::Result<MetadataV3> {
        let (name, config) = match self {
            Self::Gzip { level } => ("gzip", serde_json::json!({ "level": level })),
            Self::Zlib { level } => ("numcodecs.zlib", serde_json::json!({ "level": level })),
            Self::Blosc {
                cname,
                clevel,
                shuffle,
                blocksize,
            } => {
                let shuffle = match *shuffle {
                    BLOSC_NOSHUFFLE => "noshuffle",
                    BLOSC_SHUFFLE => "shuffle",
                    BLOSC_BITSHUFFLE => "bitshuffle",
                    n => {
                        return Err(crate::Error::general(format!(
                            "invalid blosc shuffle mode {n}"
                        )));
                    }
                };
                (
                    "blosc",
                    serde_json::json!({
                        "cname": cname,
                        "clevel": clevel,
                        "shuffle": shuffle,
                        "typesize": 1,
                        "blocksize": blocksize,
                    }),
                )
            }
        };
        let serde_json::Value::Object(map) = config else {
            return Err(crate::Error::general("codec configuration is not an object"));
        };
        Ok(MetadataV3::new_with_configuration(name.to_string(), map))
    }

    /// Whether N5 has a compression of the same kind.
    pub fn has_n5_equivalent(&self) -> bool {
        matches!(self, Self::Gzip { .. })
    }

    /// N5 compression, if N5 has an equivalent.
    ///
    /// Fails if the equivalent cannot represent this compressor's settings.
    pub fn to_n5_compression(&self) -> crate::Result<Option<N5Compression>> {
        match self {
            Self::Gzip { level } => i8::try_from(*level)
                .map(|level| Some(N5Compression::Gzip { level }))
                .map_err(|_| {
                    crate::Error::general(format!("invalid gzip level {level} for N5"))
                }),
            _ => Ok(None),
        }
    }
}

/// Name of the dataset holding data written with `compressor`.
///
/// `raw` when uncompressed, `<id>/<cname>` for meta-compressors, otherwise `<id>`.
pub fn dataset_name(compressor: Option<&Compressor>) -> String {
    match compressor {
        None => "raw".to_string(),
        Some(c) => match c.sub_algorithm() {
            Some(sub) => format!("{}/{sub}", c.id()),
            None => c.id().to_string(),
        },
    }
}

/// The default sequence: gzip, blosc/lz4, zlib, raw.
pub fn default_compressors() -> Vec<Option<Compressor>> {
    vec![
        Some(Compressor::gzip()),
        Some(Compressor::blosc_lz4()),
        Some(Compressor::zlib()),
        None,
    ]
}
