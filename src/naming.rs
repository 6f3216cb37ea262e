//! Output filename derivation from refined captions.
//!
//! Every processed image is written under a name derived from its refined
//! caption: spaces become underscores, the stem is cut to 50 characters,
//! and the canonical `.jpg` extension is appended. The derivation is
//! deterministic — the same caption always yields the same name — and
//! uniqueness is handled upstream by overwrite-on-collision, never by
//! disambiguating suffixes.

/// Cap on the derived filename stem, in characters (extension excluded).
pub const MAX_STEM_CHARS: usize = 50;

/// Canonical extension for all pipeline output.
pub const OUTPUT_EXTENSION: &str = "jpg";

/// Derive the output filename for a refined caption.
///
/// `"Red Car On Road"` → `"Red_Car_On_Road.jpg"`. Consecutive spaces left
/// by caption refinement become consecutive underscores — the quirk is
/// carried through rather than collapsed. An empty caption derives the
/// (degenerate, but accepted) name `".jpg"`.
pub fn output_filename(refined: &str) -> String {
    let stem: String = refined
        .replace(' ', "_")
        .chars()
        .take(MAX_STEM_CHARS)
        .collect();
    format!("{stem}.{OUTPUT_EXTENSION}")
}
