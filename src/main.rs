use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use zarrs_fixtures::{
    Compressor, FillValuePolicy, GeneratorConfig, OutputFormat, generate_all, verify_all,
};

/// Generate reference Zarr/N5 fixtures from a PNG image.
///
/// With no arguments, writes `../../data/zarrs.zr` from `../../data/reference_image.png`.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// JSON configuration file; command line options override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory the containers are written to.
    /// The image defaults to `reference_image.png` inside it.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[arg(long, global = true)]
    image: Option<PathBuf>,

    /// Writer name used as the container stem.
    #[arg(long, global = true)]
    name: Option<String>,

    /// Compressors to write, in order.
    #[arg(long = "codec", global = true, value_delimiter = ',')]
    codecs: Vec<CodecArg>,

    #[arg(long = "format", global = true, value_delimiter = ',')]
    formats: Vec<FormatArg>,

    #[arg(long, global = true)]
    fill_value: Option<FillValueArg>,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Remove and rewrite the containers (default).
    Generate,
    /// Read the containers back and compare them with the image.
    Verify,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum CodecArg {
    Gzip,
    Blosc,
    Zlib,
    Raw,
}

impl CodecArg {
    fn compressor(self) -> Option<Compressor> {
        match self {
            CodecArg::Gzip => Some(Compressor::gzip()),
            CodecArg::Blosc => Some(Compressor::blosc_lz4()),
            CodecArg::Zlib => Some(Compressor::zlib()),
            CodecArg::Raw => None,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum FormatArg {
    ZarrV2,
    ZarrV2Nested,
    ZarrV3,
    N5,
}

impl From<FormatArg> for OutputFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::ZarrV2 => OutputFormat::ZarrV2,
            FormatArg::ZarrV2Nested => OutputFormat::ZarrV2Nested,
            FormatArg::ZarrV3 => OutputFormat::ZarrV3,
            FormatArg::N5 => OutputFormat::N5,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum FillValueArg {
    Explicit,
    Implicit,
}

impl Cli {
    fn into_config(self) -> zarrs_fixtures::Result<GeneratorConfig> {
        let mut config = match &self.config {
            Some(p) => GeneratorConfig::from_json_file(p)?,
            None => GeneratorConfig::default(),
        };
        if let Some(d) = self.data_dir {
            config.image = d.join("reference_image.png");
            config.data_dir = d;
        }
        if let Some(i) = self.image {
            config.image = i;
        }
        if let Some(n) = self.name {
            config.name = n;
        }
        if !self.codecs.is_empty() {
            config.compressors = self.codecs.into_iter().map(CodecArg::compressor).collect();
        }
        if !self.formats.is_empty() {
            config.formats = self.formats.into_iter().map(Into::into).collect();
        }
        if let Some(f) = self.fill_value {
            config.fill_value = match f {
                FillValueArg::Explicit => FillValuePolicy::Explicit,
                FillValueArg::Implicit => FillValuePolicy::Implicit,
            };
        }
        Ok(config)
    }
}

fn run(command: Command, config: &GeneratorConfig) -> zarrs_fixtures::Result<bool> {
    match command {
        Command::Generate => {
            for summary in generate_all(config)? {
                println!(
                    "{}: {}",
                    summary.root.display(),
                    summary.datasets.join(", ")
                );
            }
            Ok(true)
        }
        Command::Verify => {
            let checks = verify_all(config)?;
            for check in &checks {
                println!("{check}");
            }
            Ok(checks.iter().all(|c| c.is_match()))
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Generate);
    let config = match cli.into_config() {
        Ok(c) => c,
        Err(e) => {
            log::error!("invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    log::debug!("{config:?}");

    match run(command, &config) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
