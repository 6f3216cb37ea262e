use clap::{Parser, Subcommand};
use photo_captioner::caption::CommandCaptioner;
use photo_captioner::{iptc, pipeline};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "photo-captioner")]
#[command(about = "Caption images, rename them for SEO, and embed IPTC metadata")]
#[command(long_about = "\
Caption images, rename them for SEO, and embed IPTC metadata

Each image in the input folder is captioned by an external command, the
caption is cleaned up into a short title, and the image is re-saved as an
RGB JPEG under a caption-derived filename:

  input/IMG_4512.png  →  output/Red_Car_On_Road.jpg
                         (IPTC title/description/keywords = \"Red Car On Road\")

Processed sources are removed from the input folder; images that fail a
step are skipped and left in place for a future run.

The captioning command receives the image path as its last argument and
prints the caption to stdout, e.g.:

  photo-captioner run --caption-cmd 'python3 blip_caption.py'

Logging is controlled with RUST_LOG (default: info).")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process every image in the input folder
    Run {
        /// Folder of images to process (.png, .jpg, .jpeg)
        #[arg(long, default_value = "input")]
        input: PathBuf,

        /// Folder for renamed, caption-tagged output
        #[arg(long, default_value = "output")]
        output: PathBuf,

        /// Captioning command; the image path is appended as the last argument
        #[arg(long)]
        caption_cmd: String,
    },
    /// Print the IPTC metadata embedded in a JPEG
    Inspect {
        /// JPEG file to inspect
        file: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            input,
            output,
            caption_cmd,
        } => {
            let captioner = CommandCaptioner::from_command_line(&caption_cmd)
                .ok_or("caption command must not be empty")?;
            let report = pipeline::run(&captioner, &input, &output)?;
            print!("{report}");
        }
        Command::Inspect { file } => {
            let meta = iptc::read(&file);
            println!("Title:       {}", meta.object_name.as_deref().unwrap_or("(none)"));
            println!("Description: {}", meta.caption.as_deref().unwrap_or("(none)"));
            let keywords = if meta.keywords.is_empty() {
                "(none)".to_string()
            } else {
                meta.keywords.join(", ")
            };
            println!("Keywords:    {keywords}");
        }
    }

    Ok(())
}
