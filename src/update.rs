//! End-to-end orchestration of the `update` command.

use crate::cli::UpdateArgs;
use crate::config::Config;
use crate::ec2::Ec2ImageDirectory;
use crate::errors::{Error, Result};
use crate::processor::{self, FileProcessor};
use crate::resolver::Resolver;
use log::{debug, info, warn};
use std::fs;
use std::path::Path;

/// The main entry point for the `update` command.
///
/// Loads and merges configuration, resolves the latest images across every
/// configured account and region, and rewrites the target file or tree.
/// A run that finds nothing to replace is a success, reported explicitly.
pub fn run_update(args: UpdateArgs) -> Result<()> {
    let mut config = Config::load()?;
    config.apply_overrides(&args);

    init_logger(config.verbose);

    config.validate()?;
    log_config(&config);

    let target = config.file.clone().ok_or(Error::NoFilePath)?;
    let metadata = fs::metadata(&target)
        .map_err(|err| Error::Config(format!("target path {} does not exist: {err}", target.display())))?;

    // A single target file tells us exactly which ids it references; a
    // directory sweep falls back to the configured name patterns.
    let patterns = if metadata.is_dir() {
        config.patterns.clone()
    } else {
        processor::find_images_in_file(&target)?
    };

    let directory = Ec2ImageDirectory::new(&config.profile, config.role_arn.clone())?;

    let regions = if config.regions.is_empty() {
        match directory.default_region() {
            Ok(region) => vec![region],
            Err(err) => {
                warn!("failed to determine region from AWS profile: {err}");
                Vec::new()
            }
        }
    } else {
        config.regions.clone()
    };

    let resolver = Resolver::new(directory);
    let plan = resolver.resolve_all(&config.accounts, &regions, &patterns);

    if plan.is_empty() {
        info!("no image replacements found");
        return Ok(());
    }

    apply_plan(&target, metadata.is_dir(), plan)?;

    info!("successfully processed {}", target.display());

    Ok(())
}

fn apply_plan(target: &Path, is_dir: bool, plan: crate::plan::ReplacementPlan) -> Result<()> {
    let file_processor = FileProcessor::new(plan);

    if is_dir {
        file_processor.process_directory(target)?;
    } else {
        let result = file_processor.process_file(target)?;
        if result.substitutions == 0 {
            info!("no image replacements needed in {}", target.display());
        }
    }

    Ok(())
}

fn log_config(config: &Config) {
    if let Some(file) = &config.file {
        debug!("updating image references in: {}", file.display());
    }
    debug!("account IDs: {}", config.accounts.join(", "));
    if config.regions.is_empty() {
        debug!("regions: will use region from AWS profile");
    } else {
        debug!("regions: {}", config.regions.join(", "));
    }
    debug!("AWS profile: {}", config.profile);
    if let Some(role_arn) = &config.role_arn {
        debug!("role ARN: {role_arn}");
    }
}

/// Installs the log backend: `debug` when verbose, `info` otherwise.
/// `RUST_LOG` still overrides either.
pub fn init_logger(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}
