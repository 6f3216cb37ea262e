//! The captioning collaborator seam.
//!
//! The captioning model is external to this process and consumed as an
//! opaque function: image path in, text (or nothing) out. [`Captioner`] is
//! the seam; the orchestrator takes it as a parameter — never a module
//! global — so tests substitute deterministic stubs and operators swap
//! models without touching pipeline code.
//!
//! [`CommandCaptioner`] is the production implementation: it runs a
//! configured command (typically a small script wrapping a vision model)
//! with the image path appended as the final argument and takes trimmed
//! stdout as the caption.

use std::path::Path;
use std::process::Command;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptionError {
    #[error("Failed to run captioner '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Captioner exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
}

/// A source of image captions.
///
/// `Ok(None)` means the collaborator had nothing to say about the image;
/// `Err` means it failed outright. The orchestrator treats both as "no
/// caption" and skips the item, leaving its source in the input folder.
pub trait Captioner {
    fn generate_caption(&self, path: &Path) -> Result<Option<String>, CaptionError>;
}

/// Captioner that shells out to an external command.
///
/// The image path is appended as the last argument; one line (or more) of
/// stdout is the caption. A non-zero exit is an error, an empty stdout is
/// "no caption".
pub struct CommandCaptioner {
    program: String,
    args: Vec<String>,
}

impl CommandCaptioner {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build from a single whitespace-separated command line,
    /// e.g. `"python3 blip_caption.py --beam 3"`.
    pub fn from_command_line(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace().map(String::from);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }
}

impl Captioner for CommandCaptioner {
    fn generate_caption(&self, path: &Path) -> Result<Option<String>, CaptionError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .output()
            .map_err(|e| CaptionError::Spawn {
                program: self.program.clone(),
                source: e,
            })?;

        if !output.status.success() {
            return Err(CaptionError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let caption = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(if caption.is_empty() { None } else { Some(caption) })
    }
}
