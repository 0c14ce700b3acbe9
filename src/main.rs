extern crate log;
use anyhow::{anyhow, Context};
use clap::Parser;
use feature_decoder::decoder::decoder::{DecoderConfig, FeatureDecoder};
use feature_decoder::geofile::geojson::{features_to_geojson_string, write_features_to_geojson};
use feature_decoder::model::json_model::load_rows_from_file;
use serde::Deserialize;
use std::path::PathBuf;
use std::{fs::read_to_string, path::Path};

/// Decode rows exported as JSON into GeoJSON features.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the input config file.
    #[arg(short, long)]
    config_filepath: String,
}

#[derive(Deserialize, Debug)]
struct Config {
    rows_filepath: PathBuf,
    /// GeoJSON is printed to stdout when no output file is given.
    output_filepath: Option<PathBuf>,
    #[serde(default)]
    decoder: DecoderConfig,
}

fn try_main() -> anyhow::Result<()> {
    let args = Args::try_parse()?;
    if !Path::new(&args.config_filepath).exists() {
        return Err(anyhow!("Config file {} not found", &args.config_filepath));
    }
    let config_contents = read_to_string(&args.config_filepath)?;
    let config: Config = serde_yaml::from_str(&config_contents)
        .with_context(|| format!("Parsing config file {}", &args.config_filepath))?;

    log::info!("Reading rows from {:?}", &config.rows_filepath);
    let rows = load_rows_from_file(&config.rows_filepath)?;
    log::info!("Read {} rows", rows.len());

    let decoder = FeatureDecoder::new(config.decoder);
    let features = decoder.decode(&rows).context("Decoding rows")?;

    match &config.output_filepath {
        Some(output_filepath) => write_features_to_geojson(&features, output_filepath)?,
        None => println!("{}", features_to_geojson_string(&features)?),
    }
    Ok(())
}

fn main() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    env_logger::init();
    if let Err(e) = try_main() {
        eprintln!("Error: {:?}", e);
        std::process::exit(1)
    }
}
