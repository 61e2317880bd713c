pub mod compressor;
pub mod config;
mod error;
pub mod generate;
pub mod n5;
pub mod reference_image;
pub mod storage;
pub mod verify;

pub use zarrs;

pub use compressor::Compressor;
pub use config::{FillValuePolicy, GeneratorConfig, OutputFormat};
pub use error::{Error, Result};
pub use generate::{ContainerSummary, generate_all};
pub use verify::{CheckOutcome, DatasetCheck, verify_all};
