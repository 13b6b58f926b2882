use anyhow::Result;
use std::path::Path;

use wdcap::{config::TaggerSettings, dataset, pipeline::Tagger};

/// Progress events emitted while captioning a directory.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressUpdate {
    Message(String),
    Progress(f64),
    Complete,
}

/// Counts of what a batch run did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub captioned: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Captions every image in `dir`, skipping labeled ones unless `overwrite` is set.
///
/// A failing image is logged and counted; the run continues with the next one.
pub fn caption_directory(
    tagger: &mut Tagger,
    settings: &TaggerSettings,
    dir: &Path,
    overwrite: bool,
    mut on_progress: impl FnMut(ProgressUpdate),
) -> Result<BatchSummary> {
    let images = dataset::list_images(dir)?;
    let total = images.len();
    let mut summary = BatchSummary::default();

    on_progress(ProgressUpdate::Message(format!(
        "Processing {} image files...",
        total
    )));

    for (i, image) in images.iter().enumerate() {
        if !overwrite && dataset::is_labeled(image) {
            tracing::debug!("Skipping labeled {}", image.display());
            summary.skipped += 1;
        } else {
            let captioned = tagger
                .tag_image(&settings.request(image))
                .and_then(|caption| dataset::write_caption(image, &caption));
            match captioned {
                Ok(()) => summary.captioned += 1,
                Err(e) => {
                    tracing::warn!("Failed to caption {}: {}", image.display(), e);
                    summary.failed += 1;
                }
            }
        }
        on_progress(ProgressUpdate::Progress((i + 1) as f64 / total as f64));
    }

    on_progress(ProgressUpdate::Complete);
    Ok(summary)
}
