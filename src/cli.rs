//! Headless command line: list images, refine a painted mask, manage label
//! documents. Runs synchronously on the calling thread.
//!
//! ```text
//! labelmask list shots/
//! labelmask refine shots/street.png --preview street_preview.png
//! labelmask labels export labels.json
//! labelmask labels check labels.json
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, Subcommand};
use thiserror::Error;

use labelmask::codec::{MaskPaths, list_images};
use labelmask::config::{AppConfig, ConfigError, LabelDocument};
use labelmask::model::LabelPalette;
use labelmask::refine::{RefineError, RefineOptions, SegmentationRefiner, composite};
use labelmask::session::{Session, SessionError};

/// Label mask tool.
#[derive(Parser, Debug)]
#[command(
    name = "labelmask",
    version,
    about = "Per-pixel label masks for segmentation annotation"
)]
pub struct CliArgs {
    /// Configuration file. Defaults to the platform config directory.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log at debug level regardless of the configured level.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List annotatable images in a directory and whether they have a mask.
    List {
        dir: PathBuf,
    },

    /// Grow the painted mask of an image into a dense segmentation and write
    /// the watershed and color overlays next to it.
    Refine {
        image: PathBuf,

        /// Keep the boundary lines between regions.
        #[arg(long)]
        keep_border: bool,

        /// Label document to use instead of the configured labels.
        #[arg(long, value_name = "DOC.json")]
        labels: Option<PathBuf>,

        /// Also write the overlay blended over the image.
        #[arg(long, value_name = "FILE")]
        preview: Option<PathBuf>,
    },

    /// Export or validate label documents.
    Labels {
        #[command(subcommand)]
        action: LabelsCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum LabelsCommand {
    /// Write the active labels as a label document.
    Export { path: PathBuf },
    /// Check that a label document parses and forms a valid label set.
    Check { path: PathBuf },
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Refine(#[from] RefineError),

    #[error("Cannot read directory {path:?}: {source}")]
    ListDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{0:?} has no painted mask to refine")]
    NothingToRefine(PathBuf),

    #[error("Cannot write preview {path:?}: {source}")]
    Preview {
        path: PathBuf,
        source: image::ImageError,
    },
}

/// Configuration from `--config`, or the default location, or defaults.
pub fn load_config(args: &CliArgs) -> Result<AppConfig, ConfigError> {
    match &args.config {
        Some(path) => AppConfig::load_from(path),
        None => Ok(AppConfig::load_from_default_path().unwrap_or_default()),
    }
}

/// Run a command and map the outcome to an exit code.
pub fn run(args: &CliArgs, config: &AppConfig) -> ExitCode {
    let result = match &args.command {
        Command::List { dir } => list(dir, config),
        Command::Refine {
            image,
            keep_border,
            labels,
            preview,
        } => refine(
            image,
            *keep_border,
            labels.as_deref(),
            preview.as_deref(),
            config,
        ),
        Command::Labels { action } => match action {
            LabelsCommand::Export { path } => export_labels(path, config),
            LabelsCommand::Check { path } => check_labels(path),
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn list(dir: &Path, config: &AppConfig) -> Result<(), CliError> {
    for line in list_lines(dir, config)? {
        println!("{}", line);
    }
    Ok(())
}

/// One line per image: `<name>` followed by `[mask]` when a mask exists.
fn list_lines(dir: &Path, config: &AppConfig) -> Result<Vec<String>, CliError> {
    let images = list_images(dir).map_err(|source| CliError::ListDir {
        path: dir.to_path_buf(),
        source,
    })?;

    Ok(images
        .iter()
        .map(|image| {
            let name = image
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let paths = MaskPaths::for_image(image, &config.preferences.mask_extension);
            if paths.mask.exists() {
                format!("{}\t[mask]", name)
            } else {
                name
            }
        })
        .collect())
}

fn palette_for(labels: Option<&Path>, config: &AppConfig) -> Result<LabelPalette, ConfigError> {
    match labels {
        Some(path) => LabelDocument::read_from(path)?.to_palette(),
        None => config.palette(),
    }
}

fn refine(
    image: &Path,
    keep_border: bool,
    labels: Option<&Path>,
    preview: Option<&Path>,
    config: &AppConfig,
) -> Result<(), CliError> {
    let start = Instant::now();
    let prefs = &config.preferences;
    let palette = palette_for(labels, config)?;

    let mut session = Session::open(image, &palette, prefs)?;
    if session.mask().is_blank() {
        return Err(CliError::NothingToRefine(image.to_path_buf()));
    }

    let options = RefineOptions {
        remove_border: prefs.remove_border && !keep_border,
    };
    session.refine(&SegmentationRefiner::default(), &palette, options)?;
    session.save()?;

    if let (Some(path), Some(watershed)) = (preview, session.watershed()) {
        let blended = composite(session.image(), watershed.color(), prefs.alpha)?;
        blended.save(path).map_err(|source| CliError::Preview {
            path: path.to_path_buf(),
            source,
        })?;
    }

    println!(
        "{} -> {} ({:.0}ms)",
        image.display(),
        session.paths().watershed.display(),
        start.elapsed().as_secs_f64() * 1000.0
    );
    Ok(())
}

fn export_labels(path: &Path, config: &AppConfig) -> Result<(), CliError> {
    let palette = config.palette()?;
    LabelDocument::from_palette(&palette).write_to(path)?;
    println!("Wrote {} labels to {}", palette.len(), path.display());
    Ok(())
}

fn check_labels(path: &Path) -> Result<(), CliError> {
    let palette = LabelDocument::read_from(path)?.to_palette()?;
    println!("{}: {} labels OK", path.display(), palette.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use labelmask::codec::save_mask;
    use labelmask::mask::LabelMask;
    use labelmask::model::LabelColor;

    #[test]
    fn test_parse_refine() {
        let args = CliArgs::try_parse_from([
            "labelmask",
            "refine",
            "street.png",
            "--keep-border",
            "--labels",
            "labels.json",
        ])
        .unwrap();
        match args.command {
            Command::Refine {
                image,
                keep_border,
                labels,
                preview,
            } => {
                assert_eq!(image, PathBuf::from("street.png"));
                assert!(keep_border);
                assert_eq!(labels, Some(PathBuf::from("labels.json")));
                assert!(preview.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_global_flags() {
        let args =
            CliArgs::try_parse_from(["labelmask", "labels", "check", "a.json", "--verbose"])
                .unwrap();
        assert!(args.verbose);
        assert!(matches!(
            args.command,
            Command::Labels {
                action: LabelsCommand::Check { .. }
            }
        ));
        assert!(CliArgs::try_parse_from(["labelmask"]).is_err());
    }

    #[test]
    fn test_list_lines_marks_masks() {
        let dir = tempfile::tempdir().unwrap();
        let image = RgbImage::new(4, 4);
        image.save(dir.path().join("b.png")).unwrap();
        image.save(dir.path().join("a.png")).unwrap();

        let mut mask = LabelMask::new(4, 4);
        mask.set_pixel(1, 1, LabelColor::new(7, [0, 0, 0]));
        save_mask(&mask, &dir.path().join("a_mask.png")).unwrap();

        let lines = list_lines(dir.path(), &AppConfig::default()).unwrap();
        assert_eq!(lines, vec!["a.png\t[mask]".to_string(), "b.png".to_string()]);
    }

    #[test]
    fn test_refine_writes_overlays() {
        let dir = tempfile::tempdir().unwrap();
        let image_path = dir.path().join("scene.png");
        RgbImage::from_fn(12, 8, |x, _| {
            if x < 6 {
                Rgb([200, 30, 30])
            } else {
                Rgb([30, 200, 30])
            }
        })
        .save(&image_path)
        .unwrap();

        let mut mask = LabelMask::new(12, 8);
        mask.set_pixel(1, 4, LabelColor::new(7, [0, 0, 0]));
        mask.set_pixel(10, 4, LabelColor::new(26, [0, 0, 0]));
        save_mask(&mask, &dir.path().join("scene_mask.png")).unwrap();

        let preview = dir.path().join("preview.png");
        refine(&image_path, false, None, Some(&preview), &AppConfig::default()).unwrap();

        assert!(dir.path().join("scene_watershed_mask.png").exists());
        assert!(dir.path().join("scene_color_mask.png").exists());
        assert!(preview.exists());
    }

    #[test]
    fn test_refine_blank_mask_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let image_path = dir.path().join("empty.png");
        RgbImage::new(4, 4).save(&image_path).unwrap();

        assert!(matches!(
            refine(&image_path, false, None, None, &AppConfig::default()),
            Err(CliError::NothingToRefine(_))
        ));
    }

    #[test]
    fn test_export_then_check_labels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.json");
        export_labels(&path, &AppConfig::default()).unwrap();
        check_labels(&path).unwrap();

        std::fs::write(&path, "{\"labels\": [{}]}").unwrap();
        assert!(matches!(check_labels(&path), Err(CliError::Config(_))));
    }
}
