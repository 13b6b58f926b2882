//! # wdcap
//!
//! Command-line front end for captioning images with WD tagger models.
//!
//! `wdcap tag` prints the caption of one image; `wdcap batch` writes a `.txt`
//! caption next to every unlabeled image of a directory.

mod args;
mod batch;

use anyhow::{Context, Result};
use args::{Args, Commands, TagOptions};
use batch::ProgressUpdate;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use wdcap::{
    config::TaggerSettings,
    dataset,
    file::{ArtifactStore, HubStore, LocalStore},
    pipeline::Tagger,
    tagger::{self, Device, OnnxLoader},
};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    tagger::init(Device::cpu())?;

    match args.command {
        Commands::Tag {
            image,
            save,
            options,
        } => {
            let (mut tagger, settings) = build_tagger(&options)?;
            let caption = tagger
                .tag_image(&settings.request(&image))
                .with_context(|| format!("Failed to caption {}", image.display()))?;
            if save {
                dataset::write_caption(&image, &caption)?;
            }
            println!("{}", caption);
        }
        Commands::Batch {
            dir,
            overwrite,
            options,
        } => {
            let (mut tagger, settings) = build_tagger(&options)?;
            let summary =
                batch::caption_directory(&mut tagger, &settings, &dir, overwrite, |update| {
                    match update {
                        ProgressUpdate::Message(msg) => eprintln!("{}", msg),
                        ProgressUpdate::Progress(p) => eprintln!("Progress: {:.2}%", p * 100.0),
                        ProgressUpdate::Complete => eprintln!("Processing complete!"),
                    }
                })?;
            tracing::info!(
                "Captioned {}, skipped {}, failed {}",
                summary.captioned,
                summary.skipped,
                summary.failed
            );
        }
    }

    Ok(())
}

/// Loads settings, applies the command-line overrides and picks the artifact store.
fn build_tagger(options: &TagOptions) -> Result<(Tagger, TaggerSettings)> {
    let settings = match &options.config {
        Some(path) => TaggerSettings::load(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => TaggerSettings::default(),
    };
    let settings = options.apply(settings);
    settings.validate()?;

    let store: Box<dyn ArtifactStore> = match (&options.models_dir, &settings.cache_dir) {
        (Some(dir), _) => Box::new(LocalStore::new(dir)),
        (None, Some(cache)) => Box::new(HubStore::with_cache_dir(cache)?),
        (None, None) => Box::new(HubStore::new()?),
    };

    Ok((
        Tagger::new(store, Box::new(OnnxLoader::default())),
        settings,
    ))
}
