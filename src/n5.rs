//! N5 containers through `zarrs`.
//!
//! N5 array metadata converts to Zarr V3 metadata using the `zarrs.n5` codec
//! and chunk key encoding registered here, so a [`zarrs::array::Array`] can
//! write N5 chunks directly and read them back through [`storage::N5Store`].

pub mod chunk;
pub mod chunk_key_encoding;
pub mod codec;
pub mod metadata;
pub mod storage;
