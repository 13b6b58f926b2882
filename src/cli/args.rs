use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

use wdcap::config::TaggerSettings;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Caption a single image and print the caption
    Tag {
        /// The image to caption
        image: PathBuf,

        /// Also write the caption to the image's .txt file
        #[arg(long)]
        save: bool,

        #[command(flatten)]
        options: TagOptions,
    },
    /// Caption every image in a directory, writing .txt files next to them
    Batch {
        /// The directory containing the images
        dir: PathBuf,

        /// Recaption images that already have a caption
        #[arg(long)]
        overwrite: bool,

        #[command(flatten)]
        options: TagOptions,
    },
}

#[derive(ClapArgs, Debug, Default, Clone)]
pub struct TagOptions {
    /// JSON settings file with default tagging options
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Model name (swinv3, vitv3, vitv3-large, convnextv3)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Confidence threshold for general tags
    #[arg(long)]
    pub general_threshold: Option<f32>,

    /// Confidence threshold for character tags
    #[arg(long)]
    pub character_threshold: Option<f32>,

    /// Pick the general threshold adaptively (MCut)
    #[arg(long)]
    pub general_mcut: bool,

    /// Pick the character threshold adaptively (MCut)
    #[arg(long)]
    pub character_mcut: bool,

    #[arg(long)]
    pub no_general: bool,

    #[arg(long)]
    pub no_rating: bool,

    #[arg(long)]
    pub no_character: bool,

    /// Read models from <DIR>/<repo_id>/ instead of the Hugging Face Hub
    #[arg(long)]
    pub models_dir: Option<PathBuf>,

    /// Hugging Face Hub cache directory
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,
}

impl TagOptions {
    /// Applies command-line overrides on top of `settings`.
    pub fn apply(&self, mut settings: TaggerSettings) -> TaggerSettings {
        if let Some(model) = &self.model {
            settings.model = model.clone();
        }
        if let Some(threshold) = self.general_threshold {
            settings.general_threshold = threshold;
        }
        if let Some(threshold) = self.character_threshold {
            settings.character_threshold = threshold;
        }
        settings.general_mcut |= self.general_mcut;
        settings.character_mcut |= self.character_mcut;
        settings.general &= !self.no_general;
        settings.rating &= !self.no_rating;
        settings.character &= !self.no_character;
        if self.cache_dir.is_some() {
            settings.cache_dir = self.cache_dir.clone();
        }
        settings
    }
}
