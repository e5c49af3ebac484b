// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

use clap::{Parser, Subcommand};
use log::info;
use std::path::{Path, PathBuf};
use strawset::{
    CameraIntrinsics, CheckConfig, DatasetCheck, EncodingVersion, Error,
    annotations::{AnnotationReadOptions, AnnotationReader, DatasetIndex},
    check_dataset, check_sample,
    layout::{DatasetLayout, sample_file_name},
    load_depth_metadata, load_depth_png, load_mask, overview, reconcile, reconstruct,
    visualize::{load_rgb, render_comparison, save_png},
    write_master,
};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Strawset Command
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, PartialEq, Clone, Debug)]
enum Command {
    /// Cross-validate masks against annotations.json.  Checks every sample
    /// with a mask unless --sample is given.
    Check {
        /// Dataset root directory
        dataset: PathBuf,

        /// Sample index, e.g. 3 for masks/00003.png
        #[clap(long, short)]
        sample: Option<u32>,

        /// Mask encoding version (v1 or v2), overrides strawset.toml
        #[clap(long, env = "STRAWSET_ENCODING", value_parser = parse_encoding)]
        encoding: Option<EncodingVersion>,

        /// Minimum annotated pixel area, overrides strawset.toml
        #[clap(long)]
        min_area: Option<u32>,

        /// Exit with an error when any check fails
        #[clap(long)]
        strict: bool,
    },
    /// Compare metadata_temp shards with depth_metadata.json and
    /// annotations.json.
    Reconcile {
        /// Dataset root directory
        dataset: PathBuf,

        /// Exit with an error when any inconsistency is found
        #[clap(long)]
        strict: bool,
    },
    /// Rebuild depth_metadata.json from the metadata_temp shards.
    Reconstruct {
        /// Dataset root directory
        dataset: PathBuf,

        /// Output file, defaults to <dataset>/depth_metadata.json
        #[clap(long, short)]
        output: Option<PathBuf>,
    },
    /// Print file counts and annotation statistics.
    Overview {
        /// Dataset root directory
        dataset: PathBuf,
    },
    /// Render stored and mask-derived bboxes over a sample image.
    Visualize {
        /// Dataset root directory
        dataset: PathBuf,

        /// Sample index
        #[clap(long, short, default_value_t = 0)]
        sample: u32,

        /// Output PNG, defaults to <sample>_comparison.png
        #[clap(long, short)]
        output: Option<PathBuf>,

        /// Mask encoding version (v1 or v2), overrides strawset.toml
        #[clap(long, env = "STRAWSET_ENCODING", value_parser = parse_encoding)]
        encoding: Option<EncodingVersion>,
    },
    /// Decode a depth map and print its range and camera model.
    Depth {
        /// Dataset root directory
        dataset: PathBuf,

        /// Sample index
        #[clap(long, short, default_value_t = 0)]
        sample: u32,
    },
}

fn parse_encoding(s: &str) -> Result<EncodingVersion, String> {
    s.parse().map_err(|e: Error| e.to_string())
}

fn load_config(
    dataset: &Path,
    encoding: Option<EncodingVersion>,
    min_area: Option<u32>,
) -> Result<CheckConfig, Error> {
    let mut config = CheckConfig::load(dataset)?;
    if let Some(encoding) = encoding {
        config.encoding = encoding;
    }
    if let Some(min_area) = min_area {
        config.min_area = min_area;
    }
    config.validate()?;
    Ok(config)
}

fn handle_check(
    dataset: &Path,
    sample: Option<u32>,
    config: &CheckConfig,
    strict: bool,
) -> Result<(), Error> {
    let result = match sample {
        Some(sample) => DatasetCheck {
            samples: vec![check_sample(dataset, sample, config)?],
            ..Default::default()
        },
        None => check_dataset(dataset, config)?,
    };

    for check in &result.samples {
        println!("{}", check.file_name);
        println!("{}", check.report);
    }
    for unreadable in &result.unreadable {
        println!("{}", unreadable.file_name);
        println!("✗ unreadable: {}", unreadable.error);
    }

    let failed = result.failed();
    println!(
        "Checked {} samples ({} encoding): {} passed, {} failed",
        result.total(),
        config.encoding,
        result.total() - failed.len(),
        failed.len()
    );

    if strict && !failed.is_empty() {
        return Err(Error::VerificationFailed(format!(
            "{} samples failed: {}",
            failed.len(),
            failed.join(", ")
        )));
    }
    Ok(())
}

fn handle_reconcile(dataset: &Path, config: &CheckConfig, strict: bool) -> Result<(), Error> {
    let report = reconcile(dataset, config)?;
    print!("{}", report);

    if strict && !report.is_valid() {
        return Err(Error::VerificationFailed(format!(
            "{} metadata inconsistencies",
            report.errors.len()
        )));
    }
    Ok(())
}

fn handle_reconstruct(dataset: &Path, output: Option<PathBuf>) -> Result<(), Error> {
    let layout = DatasetLayout::open(dataset)?;
    let output = output.unwrap_or_else(|| layout.master_metadata_path());
    let master = reconstruct(layout.shard_dir())?;
    write_master(&output, &master)?;
    println!("Wrote {} entries to {}", master.len(), output.display());
    Ok(())
}

fn handle_overview(dataset: &Path) -> Result<(), Error> {
    let overview = overview::gather(dataset)?;
    print!("{}", overview);
    Ok(())
}

fn handle_visualize(
    dataset: &Path,
    sample: u32,
    output: Option<PathBuf>,
    config: &CheckConfig,
) -> Result<(), Error> {
    let layout = DatasetLayout::open(dataset)?;
    let file_name = sample_file_name(sample);
    let reader = AnnotationReader::with_options(AnnotationReadOptions {
        file_names: vec![file_name.clone()],
        ..Default::default()
    });
    let dataset = reader.read_json(layout.annotations_path())?;
    let index = DatasetIndex::from_dataset(&dataset);
    let annotations = index
        .image_by_name(&file_name)
        .map(|img| index.annotations_for_image(img.id))
        .unwrap_or(&[]);

    let image = load_rgb(layout.image_path(sample))?;
    let mask = load_mask(layout.mask_path(sample))?;
    let rendered = render_comparison(&image, &mask, config.encoding, annotations)?;

    let output = output.unwrap_or_else(|| PathBuf::from(format!("{:05}_comparison.png", sample)));
    save_png(&rendered, &output)?;
    info!("Saved visualization to {}", output.display());
    println!("{}", output.display());
    Ok(())
}

fn handle_depth(dataset: &Path, sample: u32) -> Result<(), Error> {
    let layout = DatasetLayout::open(dataset)?;
    let depth = load_depth_png(layout.depth_path(sample))?;
    let metadata = load_depth_metadata(dataset);
    let file_name = sample_file_name(sample);
    let entry = metadata.get(&file_name);
    let intrinsics = CameraIntrinsics::resolve(entry.and_then(|m| m.camera_intrinsics.as_ref()));

    println!("Depth map: {}x{}", depth.width, depth.height);
    match depth.valid_range() {
        Some((min, max)) => println!("Valid range: {:.3} m - {:.3} m", min, max),
        None => println!("Valid range: (no valid depth)"),
    }
    if let Some(entry) = entry {
        println!(
            "Recorded range: {:.3} m - {:.3} m",
            entry.depth_range.min_meters, entry.depth_range.max_meters
        );
    }
    println!("Intrinsics:");
    for row in intrinsics.matrix() {
        println!("    [{:9.2} {:9.2} {:9.2}]", row[0], row[1], row[2]);
    }

    let (u, v) = (depth.width / 2, depth.height / 2);
    if let Some(d) = depth.get(u, v).filter(|d| *d > 0.0) {
        let [x, y, z] = intrinsics.pixel_to_3d(f64::from(u), f64::from(v), f64::from(d));
        println!("Centre pixel ({}, {}) → ({:.3}, {:.3}, {:.3}) m", u, v, x, y, z);
    }
    Ok(())
}

fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    match args.cmd {
        Command::Check {
            dataset,
            sample,
            encoding,
            min_area,
            strict,
        } => {
            let config = load_config(&dataset, encoding, min_area)?;
            handle_check(&dataset, sample, &config, strict)
        }
        Command::Reconcile { dataset, strict } => {
            let config = load_config(&dataset, None, None)?;
            handle_reconcile(&dataset, &config, strict)
        }
        Command::Reconstruct { dataset, output } => handle_reconstruct(&dataset, output),
        Command::Overview { dataset } => handle_overview(&dataset),
        Command::Visualize {
            dataset,
            sample,
            output,
            encoding,
        } => {
            let config = load_config(&dataset, encoding, None)?;
            handle_visualize(&dataset, sample, output, &config)
        }
        Command::Depth { dataset, sample } => handle_depth(&dataset, sample),
    }
}
