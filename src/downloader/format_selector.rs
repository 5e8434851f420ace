// FormatSelector - turns the resolver's stream list into quality options
//
// - One option per "{height}p ({ext})" label, largest file size wins
// - Every option is paired with the single largest audio-only stream
// - Sorted by height, highest first; equal heights keep first-seen order

use std::collections::HashMap;

use super::models::{QualityOption, StreamDescriptor};

/// Extension assumed when the resolver does not report one
const DEFAULT_EXTENSION: &str = "mp4";

pub struct FormatSelector;

impl FormatSelector {
    /// Build quality options from raw formats. Never fails; sparse input
    /// just yields fewer options.
    pub fn build_quality_options(formats: &[StreamDescriptor]) -> Vec<QualityOption> {
        let audio_format_id = Self::find_best_audio(formats).map(|a| a.format_id.clone());

        let mut options: Vec<QualityOption> = Vec::new();
        let mut by_label: HashMap<String, usize> = HashMap::new();

        for f in formats {
            let height = match f.height {
                Some(h) if h > 0 => h,
                _ => continue,
            };
            if !f.has_video() {
                continue;
            }

            let extension = f.extension.as_deref().unwrap_or(DEFAULT_EXTENSION);
            let label = QualityOption::make_label(height, extension);
            let file_size = f.size_or_zero();

            let candidate = QualityOption {
                label: label.clone(),
                height,
                extension: extension.to_string(),
                format_id: f.format_id.clone(),
                audio_format_id: audio_format_id.clone(),
                file_size,
            };

            match by_label.get(&label) {
                // Replace in place so the label keeps its first-seen position
                Some(&idx) if file_size > options[idx].file_size => options[idx] = candidate,
                Some(_) => {}
                None => {
                    by_label.insert(label, options.len());
                    options.push(candidate);
                }
            }
        }

        // Stable sort: equal heights stay in first-seen order
        options.sort_by(|a, b| b.height.cmp(&a.height));
        options
    }

    /// Largest audio-only stream; ties go to the first one seen
    pub fn find_best_audio(formats: &[StreamDescriptor]) -> Option<&StreamDescriptor> {
        let mut best: Option<&StreamDescriptor> = None;
        for f in formats.iter().filter(|f| f.is_audio_only()) {
            match best {
                Some(b) if f.size_or_zero() <= b.size_or_zero() => {}
                _ => best = Some(f),
            }
        }
        best
    }

    /// Find an option by its exact label (e.g. "720p (mp4)")
    pub fn find_by_label<'a>(options: &'a [QualityOption], label: &str) -> Option<&'a QualityOption> {
        options.iter().find(|o| o.label == label)
    }

    /// First option with the given height, preferring mp4 containers
    pub fn find_by_height(options: &[QualityOption], height: u32) -> Option<&QualityOption> {
        options
            .iter()
            .filter(|o| o.height == height)
            .find(|o| o.extension == DEFAULT_EXTENSION)
            .or_else(|| options.iter().find(|o| o.height == height))
    }
}
