use std::borrow::Cow;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use zarrs::array::CodecChain;
use zarrs::array::codec::BytesCodec;
use zarrs::metadata::v3::MetadataV3;
use zarrs::plugin::PluginCreateError;
use zarrs_codec::{
    ArrayCodecTraits, ArrayToBytesCodecTraits, Codec, CodecError, CodecPluginV3, CodecTraits,
    CodecTraitsV3,
};

use super::chunk::{N5ChunkHeader, N5ChunkMode};
use super::metadata::N5Compression;

zarrs::plugin::impl_extension_aliases!(N5Codec, v3: "zarrs.n5", ["zarrs.n5", "n5"]);
inventory::submit! {
    CodecPluginV3::new::<N5Codec>()
}

/// Array-to-bytes codec for N5 default-mode chunks:
/// a big-endian header followed by the (optionally compressed) big-endian samples.
#[derive(Debug, Clone)]
pub struct N5Codec {
    /// The original representation of the compression.
    n5_compression: N5Compression,
    /// Always contains a big-endian bytes codec.
    /// May contain a single bytes-to-bytes codec representing the N5 compression.
    codecs: CodecChain,
}

impl N5Codec {
    pub fn new(compression: N5Compression) -> crate::Result<Self> {
        let compressor = compression.to_bytes_to_bytes_codec()?;
        let codecs = CodecChain::new(
            vec![],
            Arc::new(BytesCodec::big()),
            compressor.into_iter().collect(),
        );
        Ok(Self {
            codecs,
            n5_compression: compression,
        })
    }

    pub fn new_with_configuration(
        configuration: &N5CodecConfiguration,
    ) -> Result<Self, PluginCreateError> {
        Self::new(configuration.compression).map_err(|e| PluginCreateError::Other(e.to_string()))
    }

    pub fn compression(&self) -> N5Compression {
        self.n5_compression
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Copy)]
pub struct N5CodecConfiguration {
    compression: N5Compression,
}

fn header_for(shape: &[std::num::NonZeroU64]) -> Result<N5ChunkHeader, CodecError> {
    let shape: Vec<u64> = shape.iter().map(|n| n.get()).collect();
    N5ChunkHeader::new_default(&shape).map_err(|e| CodecError::Other(e.to_string()))
}

impl CodecTraitsV3 for N5Codec {
    fn create(metadata: &MetadataV3) -> Result<zarrs_codec::Codec, zarrs::plugin::PluginCreateError>
    where
        Self: Sized,
    {
        let configuration = metadata.to_typed_configuration()?;
        let codec = Arc::new(N5Codec::new_with_configuration(&configuration)?);
        Ok(Codec::ArrayToBytes(codec))
    }
}

impl CodecTraits for N5Codec {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn configuration(
        &self,
        _version: zarrs::plugin::ZarrVersion,
        _options: &zarrs_codec::CodecMetadataOptions,
    ) -> Option<zarrs::metadata::Configuration> {
        let config = N5CodecConfiguration {
            compression: self.n5_compression,
        };
        match serde_json::to_value(config) {
            Ok(serde_json::Value::Object(map)) => Some(map.into()),
            _ => None,
        }
    }

    fn partial_decoder_capability(&self) -> zarrs_codec::PartialDecoderCapability {
        zarrs_codec::PartialDecoderCapability {
            partial_read: false,
            partial_decode: false,
        }
    }

    fn partial_encoder_capability(&self) -> zarrs_codec::PartialEncoderCapability {
        zarrs_codec::PartialEncoderCapability {
            partial_encode: false,
        }
    }
}

impl ArrayCodecTraits for N5Codec {
    fn recommended_concurrency(
        &self,
        _shape: &[std::num::NonZeroU64],
        _data_type: &zarrs::array::DataType,
    ) -> Result<zarrs_codec::RecommendedConcurrency, zarrs_codec::CodecError> {
        Ok(zarrs_codec::RecommendedConcurrency::new_maximum(1))
    }
}

impl ArrayToBytesCodecTraits for N5Codec {
    fn into_dyn(self: Arc<Self>) -> Arc<dyn ArrayToBytesCodecTraits> {
        self
    }

    fn encoded_representation(
        &self,
        shape: &[std::num::NonZeroU64],
        data_type: &zarrs::array::DataType,
        _fill_value: &zarrs::array::FillValue,
    ) -> Result<zarrs_codec::BytesRepresentation, zarrs_codec::CodecError> {
        let ret = match (self.n5_compression, data_type.fixed_size()) {
            (N5Compression::Raw, Some(fs)) => {
                let numel: u64 = shape.iter().map(|n| n.get()).product();
                let header_len = header_for(shape)?.data_offset() as u64;
                zarrs_codec::BytesRepresentation::BoundedSize(header_len + numel * fs as u64)
            }
            _ => zarrs_codec::BytesRepresentation::UnboundedSize,
        };
        Ok(ret)
    }

    fn encode<'a>(
        &self,
        bytes: zarrs_codec::ArrayBytes<'a>,
        shape: &[std::num::NonZeroU64],
        data_type: &zarrs::array::DataType,
        fill_value: &zarrs::array::FillValue,
        options: &zarrs_codec::CodecOptions,
    ) -> Result<zarrs_codec::ArrayBytesRaw<'a>, zarrs_codec::CodecError> {
        let header = header_for(shape)?;
        let payload = self
            .codecs
            .encode(bytes, shape, data_type, fill_value, options)?;

        let mut out = header
            .to_bytes()
            .map_err(|e| CodecError::Other(e.to_string()))?;
        out.extend_from_slice(&payload);
        Ok(Cow::Owned(out))
    }

    fn decode<'a>(
        &self,
        bytes: zarrs_codec::ArrayBytesRaw<'a>,
        shape: &[std::num::NonZeroU64],
        data_type: &zarrs::array::DataType,
        fill_value: &zarrs::array::FillValue,
        options: &zarrs_codec::CodecOptions,
    ) -> Result<zarrs_codec::ArrayBytes<'a>, zarrs_codec::CodecError> {
        let header = N5ChunkHeader::from_bytes(&bytes)
            .map_err(|e| CodecError::Other(format!("N5 chunk header could not be parsed: {e}")))?;

        if !matches!(header.mode, N5ChunkMode::Default) {
            return Err(zarrs_codec::CodecError::Other(format!(
                "unsupported N5 chunk mode: {:?}",
                header.mode
            )));
        }

        // edge chunks are already truncated by the regular bounded chunk grid
        let expected = header_for(shape)?;
        if header.shape != expected.shape {
            return Err(zarrs_codec::CodecError::Other(format!(
                "N5 chunk header has shape {:?}, expected {:?}",
                header.shape, expected.shape,
            )));
        }

        let payload = &bytes[header.data_offset()..];

        self.codecs.decode(
            Cow::Owned(payload.to_vec()),
            shape,
            data_type,
            fill_value,
            options,
        )
    }
}
