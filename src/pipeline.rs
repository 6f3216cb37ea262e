//! Pipeline orchestration: drive every input image through
//! convert → caption → refine → save → embed → retire.
//!
//! ## Per-item state machine
//!
//! ```text
//! Start → (png? convert) → caption request → refine → save → embed → retire
//!            │                  │                       │        │
//!            │ failure          │ error / no caption    │ fail   │ failure logged,
//!            ▼                  ▼                       ▼        ▼ still processed
//!       skip item          skip item              skip item   EmbedFailed
//! ```
//!
//! Every failure terminates only its own item; the run always walks the
//! full input enumeration. Skipped items keep their source file in the
//! input directory, so a later run (or a human) can pick them up.
//!
//! The captioning collaborator and the metadata writer are parameters, not
//! globals — [`run`] wires up the production IPTC writer, and
//! [`run_with_writer`] lets tests substitute both seams.

use crate::caption::Captioner;
use crate::iptc::{IptcWriter, MetadataWriter};
use crate::{convert, files, naming, refine};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// What happened to one input image.
///
/// `Success` and `EmbedFailed` both count as processed — the renamed output
/// exists and the source was retired; the latter merely lacks embedded
/// metadata. The `Skipped*` variants left the source in the input folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Success(PathBuf),
    EmbedFailed(PathBuf),
    SkippedConversionFailure,
    SkippedNoCaption,
    SkippedSaveFailure,
}

impl ItemOutcome {
    /// Whether the item produced an output and had its source retired.
    pub fn is_processed(&self) -> bool {
        matches!(self, Self::Success(_) | Self::EmbedFailed(_))
    }
}

impl fmt::Display for ItemOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success(path) => write!(f, "ok → {}", path.display()),
            Self::EmbedFailed(path) => write!(f, "ok, metadata missing → {}", path.display()),
            Self::SkippedConversionFailure => write!(f, "skipped: conversion failed"),
            Self::SkippedNoCaption => write!(f, "skipped: no caption"),
            Self::SkippedSaveFailure => write!(f, "skipped: save failed"),
        }
    }
}

/// Per-run results, in processing order. In-memory only — the pipeline
/// persists nothing about a run besides its output files.
#[derive(Debug, Default)]
pub struct RunReport {
    pub items: Vec<(PathBuf, ItemOutcome)>,
    pub backups_purged: usize,
}

impl RunReport {
    pub fn processed(&self) -> usize {
        self.items.iter().filter(|(_, o)| o.is_processed()).count()
    }

    pub fn skipped(&self) -> usize {
        self.items.len() - self.processed()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} processed, {} skipped ({} inputs)",
            self.processed(),
            self.skipped(),
            self.items.len()
        )?;
        for (input, outcome) in &self.items {
            let name = input
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| input.display().to_string());
            writeln!(f, "    {name}: {outcome}")?;
        }
        Ok(())
    }
}

/// Run the pipeline with the production IPTC metadata writer.
pub fn run(
    captioner: &dyn Captioner,
    input_dir: &Path,
    output_dir: &Path,
) -> Result<RunReport, PipelineError> {
    run_with_writer(captioner, &IptcWriter, input_dir, output_dir)
}

/// Run the pipeline with a specific metadata writer (allows testing with
/// a failing or recording writer).
pub fn run_with_writer(
    captioner: &dyn Captioner,
    writer: &dyn MetadataWriter,
    input_dir: &Path,
    output_dir: &Path,
) -> Result<RunReport, PipelineError> {
    std::fs::create_dir_all(output_dir)?;

    let mut report = RunReport {
        backups_purged: files::purge_backups(output_dir),
        ..RunReport::default()
    };

    let inputs = files::list_inputs(input_dir)?;
    info!(
        "Processing {} images from {} into {}",
        inputs.len(),
        input_dir.display(),
        output_dir.display()
    );

    for input in inputs {
        let outcome = process_item(captioner, writer, &input, output_dir);
        info!("{}: {outcome}", input.display());
        report.items.push((input, outcome));
    }

    Ok(report)
}

/// Process one input image to a terminal outcome. Never propagates —
/// whatever goes wrong is folded into the outcome and logged.
fn process_item(
    captioner: &dyn Captioner,
    writer: &dyn MetadataWriter,
    input: &Path,
    output_dir: &Path,
) -> ItemOutcome {
    // Normalize PNGs to a JPEG sibling; jpg/jpeg pass straight through.
    let work_path = if needs_conversion(input) {
        match convert::to_jpeg(input) {
            Ok(converted) => {
                info!("Image converted to JPEG: {}", converted.display());
                converted
            }
            Err(e) => {
                warn!("Error converting {} to JPEG: {e}", input.display());
                return ItemOutcome::SkippedConversionFailure;
            }
        }
    } else {
        input.to_path_buf()
    };

    let raw = match captioner.generate_caption(&work_path) {
        Ok(Some(caption)) => caption,
        Ok(None) => {
            warn!("No caption for {}", work_path.display());
            return ItemOutcome::SkippedNoCaption;
        }
        Err(e) => {
            error!("Error captioning {}: {e}", work_path.display());
            return ItemOutcome::SkippedNoCaption;
        }
    };

    let refined = refine::refine(refine::fallback_if_generic(&raw));
    info!("Caption improved: {refined}");

    let filename = naming::output_filename(&refined);
    let output_path = match files::prepare_output_path(output_dir, &filename) {
        Ok(path) => path,
        Err(e) => {
            error!("Cannot prepare output path for {filename}: {e}");
            return ItemOutcome::SkippedSaveFailure;
        }
    };

    if let Err(e) = convert::save_rgb_jpeg(&work_path, &output_path) {
        error!("Error saving {}: {e}", output_path.display());
        return ItemOutcome::SkippedSaveFailure;
    }
    info!("Saved image to: {}", output_path.display());

    // Metadata failure is logged but never undoes the saved output; the
    // item still counts as processed and its source is still retired.
    let embedded = match writer.embed(&output_path, &refined, &refined) {
        Ok(()) => {
            info!("IPTC metadata embedded into {}", output_path.display());
            true
        }
        Err(e) => {
            error!(
                "Error embedding IPTC metadata into {}: {e}",
                output_path.display()
            );
            false
        }
    };

    files::retire_source(&work_path);

    if embedded {
        ItemOutcome::Success(output_path)
    } else {
        ItemOutcome::EmbedFailed(output_path)
    }
}

fn needs_conversion(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caption::CaptionError;
    use crate::caption::tests::MockCaptioner;
    use crate::iptc::{self, EmbedError};
    use image::{ImageFormat, ImageReader, Rgb, RgbImage, Rgba, RgbaImage};
    use std::fs;
    use tempfile::TempDir;

    struct FailingWriter;

    impl MetadataWriter for FailingWriter {
        fn embed(&self, path: &Path, _title: &str, _desc: &str) -> Result<(), EmbedError> {
            Err(EmbedError::NotJpeg(path.to_path_buf()))
        }
    }

    fn write_jpg(path: &Path, color: [u8; 3]) {
        RgbImage::from_pixel(4, 4, Rgb(color))
            .save_with_format(path, ImageFormat::Jpeg)
            .unwrap();
    }

    fn write_png(path: &Path) {
        RgbaImage::from_pixel(4, 4, Rgba([60, 180, 60, 255]))
            .save_with_format(path, ImageFormat::Png)
            .unwrap();
    }

    fn setup_dirs() -> (TempDir, PathBuf, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("input");
        let output = tmp.path().join("output");
        fs::create_dir_all(&input).unwrap();
        (tmp, input, output)
    }

    #[test]
    fn processes_jpeg_end_to_end() {
        let (_tmp, input, output) = setup_dirs();
        write_jpg(&input.join("source.jpg"), [200, 40, 40]);
        let captioner = MockCaptioner::always("a red car on road");

        let report = run(&captioner, &input, &output).unwrap();

        assert_eq!(report.processed(), 1);
        let expected = output.join("A_Red_Car_On_Road.jpg");
        assert!(expected.exists());
        assert_eq!(
            report.items[0].1,
            ItemOutcome::Success(expected.clone())
        );

        // Caption embedded as title == description == single keyword
        let meta = iptc::read(&expected);
        assert_eq!(meta.object_name.as_deref(), Some("A Red Car On Road"));
        assert_eq!(meta.caption.as_deref(), Some("A Red Car On Road"));
        assert_eq!(meta.keywords, vec!["A Red Car On Road"]);

        // Source retired from the input folder
        assert!(!input.join("source.jpg").exists());
    }

    #[test]
    fn png_is_converted_and_the_converted_sibling_is_retired() {
        let (_tmp, input, output) = setup_dirs();
        write_png(&input.join("shot.png"));
        let captioner = MockCaptioner::always("green field");

        let report = run(&captioner, &input, &output).unwrap();

        assert_eq!(report.processed(), 1);
        assert!(output.join("Green_Field.jpg").exists());
        // Retirement targets the last-operated path: the converted sibling
        // is gone, the pre-conversion original stays behind.
        assert!(!input.join("shot.jpg").exists());
        assert!(input.join("shot.png").exists());

        // The captioner saw the converted path, not the PNG
        let requested = captioner.requested_paths();
        assert_eq!(requested, vec![input.join("shot.jpg")]);
    }

    #[test]
    fn conversion_failure_isolates_the_item() {
        let (_tmp, input, output) = setup_dirs();
        write_jpg(&input.join("a.jpg"), [10, 10, 200]);
        fs::write(input.join("b.png"), b"definitely not a png").unwrap();
        write_jpg(&input.join("c.jpg"), [10, 200, 10]);
        // Replies pop from the back: a.jpg then c.jpg (b never gets captioned)
        let captioner = MockCaptioner::with_replies(vec![
            Ok(Some("third image".into())),
            Ok(Some("first image".into())),
        ]);

        let report = run(&captioner, &input, &output).unwrap();

        assert_eq!(report.processed(), 2);
        assert_eq!(report.items[1].1, ItemOutcome::SkippedConversionFailure);
        assert!(output.join("First_Image.jpg").exists());
        assert!(output.join("Third_Image.jpg").exists());
        // The failing item's source survives for a future run
        assert!(input.join("b.png").exists());
        assert!(!input.join("a.jpg").exists());
        assert!(!input.join("c.jpg").exists());
    }

    #[test]
    fn captioner_error_skips_and_retains_source() {
        let (_tmp, input, output) = setup_dirs();
        write_jpg(&input.join("photo.jpg"), [1, 2, 3]);
        let captioner = MockCaptioner::with_replies(vec![Err(CaptionError::Failed {
            status: "exit status: 1".into(),
            stderr: "model exploded".into(),
        })]);

        let report = run(&captioner, &input, &output).unwrap();

        assert_eq!(report.items[0].1, ItemOutcome::SkippedNoCaption);
        assert!(input.join("photo.jpg").exists());
        assert_eq!(fs::read_dir(&output).unwrap().count(), 0);
    }

    #[test]
    fn missing_caption_skips_and_retains_source() {
        let (_tmp, input, output) = setup_dirs();
        write_jpg(&input.join("photo.jpg"), [1, 2, 3]);
        let captioner = MockCaptioner::with_replies(vec![Ok(None)]);

        let report = run(&captioner, &input, &output).unwrap();

        assert_eq!(report.items[0].1, ItemOutcome::SkippedNoCaption);
        assert!(input.join("photo.jpg").exists());
    }

    #[test]
    fn generic_caption_gets_the_fallback_title() {
        let (_tmp, input, output) = setup_dirs();
        write_jpg(&input.join("photo.jpg"), [1, 2, 3]);
        let captioner = MockCaptioner::always("a photo");

        let report = run(&captioner, &input, &output).unwrap();

        assert_eq!(report.processed(), 1);
        let expected = output.join("No_Description_Available.jpg");
        assert!(expected.exists());
        assert_eq!(
            iptc::read(&expected).object_name.as_deref(),
            Some("No Description Available")
        );
    }

    #[test]
    fn same_caption_collides_to_one_file_last_write_wins() {
        let (_tmp, input, output) = setup_dirs();
        write_jpg(&input.join("1-first.jpg"), [250, 0, 0]);
        write_jpg(&input.join("2-second.jpg"), [0, 0, 250]);
        let captioner = MockCaptioner::always("calm sea");

        let report = run(&captioner, &input, &output).unwrap();

        // Both items succeed; the collision itself is never an error
        assert_eq!(report.processed(), 2);
        let outputs: Vec<_> = fs::read_dir(&output).unwrap().collect();
        assert_eq!(outputs.len(), 1);

        // The surviving file reflects the second (blue) item
        let decoded = ImageReader::open(output.join("Calm_Sea.jpg"))
            .unwrap()
            .decode()
            .unwrap()
            .to_rgb8();
        let px = decoded.get_pixel(0, 0);
        assert!(px[2] > px[0], "expected blue-dominant pixel, got {px:?}");
    }

    #[test]
    fn embed_failure_keeps_output_and_retires_source() {
        let (_tmp, input, output) = setup_dirs();
        write_jpg(&input.join("photo.jpg"), [90, 90, 90]);
        let captioner = MockCaptioner::always("grey wall");

        let report = run_with_writer(&captioner, &FailingWriter, &input, &output).unwrap();

        let expected = output.join("Grey_Wall.jpg");
        assert_eq!(report.items[0].1, ItemOutcome::EmbedFailed(expected.clone()));
        assert!(report.items[0].1.is_processed());

        // Output intact and decodable, source still retired
        let decoded = ImageReader::open(&expected).unwrap().decode().unwrap();
        assert_eq!((decoded.width(), decoded.height()), (4, 4));
        assert!(!input.join("photo.jpg").exists());
    }

    #[test]
    fn save_failure_skips_and_retains_source() {
        let (_tmp, input, output) = setup_dirs();
        write_jpg(&input.join("photo.jpg"), [1, 2, 3]);
        // A separator in the caption derives an output path whose parent
        // directory does not exist, so the save step fails.
        let captioner = MockCaptioner::always("nested/name");

        let report = run(&captioner, &input, &output).unwrap();

        assert_eq!(report.items[0].1, ItemOutcome::SkippedSaveFailure);
        assert_eq!(report.processed(), 0);
        // Same contract as a missing caption: no output, source retained
        assert!(input.join("photo.jpg").exists());
    }

    #[test]
    fn purges_backup_files_before_processing() {
        let (_tmp, input, output) = setup_dirs();
        fs::create_dir_all(&output).unwrap();
        fs::write(output.join("stale.jpg~"), b"leftover").unwrap();
        let captioner = MockCaptioner::always("anything");

        let report = run(&captioner, &input, &output).unwrap();

        assert_eq!(report.backups_purged, 1);
        assert!(!output.join("stale.jpg~").exists());
    }

    #[test]
    fn empty_input_directory_is_an_empty_report() {
        let (_tmp, input, output) = setup_dirs();
        let captioner = MockCaptioner::always("unused");

        let report = run(&captioner, &input, &output).unwrap();

        assert!(report.items.is_empty());
        assert_eq!(report.processed(), 0);
    }

    #[test]
    fn missing_input_directory_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let captioner = MockCaptioner::always("unused");
        let result = run(
            &captioner,
            &tmp.path().join("no-such-input"),
            &tmp.path().join("output"),
        );
        assert!(matches!(result, Err(PipelineError::Io(_))));
    }

    #[test]
    fn report_display_summarizes_outcomes() {
        let report = RunReport {
            items: vec![
                (PathBuf::from("a.jpg"), ItemOutcome::Success("out/A.jpg".into())),
                (PathBuf::from("b.png"), ItemOutcome::SkippedConversionFailure),
            ],
            backups_purged: 0,
        };
        let text = report.to_string();
        assert!(text.contains("1 processed, 1 skipped (2 inputs)"), "got: {text}");
        assert!(text.contains("b.png: skipped: conversion failed"), "got: {text}");
    }
}
