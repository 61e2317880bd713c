use zarrs::{
    array::{
        ChunkKeyEncoding, ChunkKeyEncodingTraits,
        chunk_key_encoding::{self as cke, api::ChunkKeyEncodingPlugin},
    },
    plugin::PluginConfigurationInvalidError,
};

/// N5 chunk keys: grid indices in reverse order, `/`-separated.
#[derive(Debug, Clone, Copy)]
pub struct N5ChunkKeyEncoding;

zarrs::plugin::impl_extension_aliases!(N5ChunkKeyEncoding, v3: "zarrs.n5", ["zarrs.n5", "n5"]);
inventory::submit! {
    ChunkKeyEncodingPlugin::new::<N5ChunkKeyEncoding>()
}

impl N5ChunkKeyEncoding {
    pub fn key_string(chunk_grid_indices: &[u64]) -> String {
        chunk_grid_indices
            .iter()
            .rev()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl ChunkKeyEncodingTraits for N5ChunkKeyEncoding {
    fn create(
        metadata: &zarrs::metadata::v3::MetadataV3,
    ) -> Result<cke::api::ChunkKeyEncoding, zarrs::plugin::PluginCreateError>
    where
        Self: Sized,
    {
        let cke = match metadata.name() {
            "zarrs.n5" | "n5" => ChunkKeyEncoding::new(Self),
            _ => {
                return Err(zarrs::plugin::PluginCreateError::NameInvalid {
                    name: metadata.name().into(),
                });
            }
        };
        if !metadata.configuration_is_none_or_empty() {
            return Err(zarrs::plugin::PluginCreateError::ConfigurationInvalid(
                PluginConfigurationInvalidError::new(
                    "N5 chunk key encoding does not support configuration".into(),
                ),
            ));
        }
        Ok(cke)
    }

    fn configuration(&self) -> zarrs::metadata::Configuration {
        Default::default()
    }

    fn encode(&self, chunk_grid_indices: &[u64]) -> zarrs::storage::StoreKey {
        // digits and slashes only
        zarrs::storage::StoreKey::new(Self::key_string(chunk_grid_indices))
            .expect("chunk key should be valid")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reversed_indices() {
        assert_eq!(N5ChunkKeyEncoding::key_string(&[3, 1, 0]), "0/1/3");
        assert_eq!(N5ChunkKeyEncoding.encode(&[2, 0]).as_str(), "0/2");
    }
}
