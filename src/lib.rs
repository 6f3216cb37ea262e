//! # Photo Captioner
//!
//! A batch pipeline that turns a folder of raw images into renamed,
//! caption-tagged JPEG assets ready for web/SEO publishing. For every input
//! image the pipeline:
//!
//! ```text
//! 1. Convert   *.png → RGB JPEG sibling (jpg/jpeg pass through)
//! 2. Caption   ask the external captioning collaborator for a description
//! 3. Refine    strip boilerplate, dedup words, truncate, title-case
//! 4. Save      re-encode as RGB JPEG under the caption-derived filename
//! 5. Embed     write the caption as IPTC title/description/keywords
//! 6. Retire    delete the processed source from the input folder
//! ```
//!
//! Processing is fully sequential and best-effort: every per-item failure
//! is logged and the run moves on to the next input. Sources of skipped
//! items stay in the input folder, so leftover files after a run are the
//! diagnostic surface for what went wrong.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`refine`] | Caption refinement: boilerplate stripping, duplicate-word removal, truncation, title-casing |
//! | [`naming`] | Output filename derivation from the refined caption |
//! | [`convert`] | Format normalization: decode any accepted raster image, re-encode as RGB JPEG |
//! | [`iptc`] | IPTC-IIM metadata embedding (APP13, atomic replace) and readback |
//! | [`caption`] | The captioning collaborator seam: trait + external-command implementation |
//! | [`files`] | File lifecycle: backup purge, input enumeration, collision overwrite, source retirement |
//! | [`pipeline`] | Orchestration: per-item state machine, batch loop, run report |
//!
//! # Design Decisions
//!
//! ## The captioner is a collaborator, not a dependency
//!
//! The captioning model is consumed as an opaque function behind the
//! [`caption::Captioner`] trait — image path in, text (or nothing) out.
//! Production wires up [`caption::CommandCaptioner`], which shells out to
//! whatever command the operator configures (typically a small script
//! wrapping a vision model); tests inject deterministic stubs. The model
//! never lives in this process.
//!
//! ## Last-writer-wins output names
//!
//! Output filenames are derived deterministically from refined captions.
//! Two inputs that refine to the same caption collapse to one output file —
//! the existing file is deleted and rewritten, never disambiguated. With a
//! strictly sequential loop this is the only mutation semantics needed.
//!
//! ## Metadata embedding never corrupts
//!
//! The IPTC writer rebuilds the JPEG byte stream into a temporary sibling
//! file and renames it over the target only after the write fully succeeds.
//! A failed embed leaves the saved image untouched (and is logged, not
//! propagated — the item still counts as processed).

pub mod caption;
pub mod convert;
pub mod files;
pub mod iptc;
pub mod naming;
pub mod pipeline;
pub mod refine;
