//! Caption refinement: raw collaborator output → short human-readable phrase.
//!
//! Captioning models produce text that is noisy in predictable ways: stock
//! framing phrases ("A photo of …"), stuttered repeated words, and unbounded
//! length. [`refine`] applies four passes, each operating on the output of
//! the previous:
//!
//! 1. **Boilerplate stripping** — remove the fixed framing phrases at word
//!    boundaries, case-insensitively, leaving surrounding whitespace intact.
//! 2. **Duplicate-word removal** — keep only the *last* occurrence of each
//!    repeated word token (case-sensitive). Only the token text is deleted,
//!    never the separators around it, so irregular double spaces can appear.
//!    That spacing is preserved downstream on purpose; see the note on
//!    [`dedup_words`].
//! 3. **Trim + truncate** — strip surrounding whitespace, cut to the first
//!    100 characters (not word-boundary aware).
//! 4. **Title-case** — uppercase the first letter of each
//!    whitespace-delimited word; every other character keeps its case.
//!
//! Refinement is total (never fails) and idempotent on already-refined
//! input. Callers substitute [`fallback_if_generic`] *before* refining, so
//! an empty or placeholder caption still yields a usable phrase.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Cap on refined caption length, in characters. Keeps titles inside the
/// range search engines display without truncating themselves.
pub const MAX_CAPTION_CHARS: usize = 100;

/// Substituted for captions that are empty or match a generic placeholder.
pub const FALLBACK_CAPTION: &str = "No description available";

/// Placeholder captions some models emit when they have nothing to say.
const GENERIC_CAPTIONS: &[&str] = &["a photo", "an image", "a picture", "a snapshot"];

/// Stock framing phrases stripped from the start (or middle) of captions.
static BOILERPLATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:A picture of|An image of|A photo of|A snapshot of)\b")
        .expect("boilerplate pattern is valid")
});

/// Substitute the fallback text for captions not worth refining.
///
/// A caption is "too generic" when it is empty or case-insensitively equals
/// one of the fixed placeholders (`"a photo"`, `"an image"`, …). Anything
/// else passes through unchanged. The orchestrator applies this before
/// calling [`refine`].
pub fn fallback_if_generic(raw: &str) -> &str {
    let generic = raw.is_empty()
        || GENERIC_CAPTIONS
            .iter()
            .any(|g| raw.eq_ignore_ascii_case(g));
    if generic { FALLBACK_CAPTION } else { raw }
}

/// Refine a raw caption into a cleaned, bounded, title-cased phrase.
///
/// Output is always a `String` — possibly empty if stripping removed
/// everything — with no leading/trailing whitespace and at most
/// [`MAX_CAPTION_CHARS`] characters.
pub fn refine(raw: &str) -> String {
    let stripped = BOILERPLATE.replace_all(raw, "");
    let deduped = dedup_words(&stripped);
    let bounded = truncate_chars(deduped.trim(), MAX_CAPTION_CHARS);
    title_case(bounded)
}

/// Remove every word token that occurs again later in the string, keeping
/// only the last occurrence of each repeated token.
///
/// Two passes: the first records the final occurrence index of every token
/// (case-sensitive), the second re-emits the string and drops each token
/// whose index is not its final one. Separators are copied verbatim — a
/// dropped token leaves its surrounding whitespace behind, so `"big big sky"`
/// becomes `" big sky"`. Nothing downstream re-collapses the spacing; treat
/// that as a known quirk, not a guarantee worth depending on.
fn dedup_words(s: &str) -> String {
    let tokens = word_spans(s);

    let mut last_index: HashMap<&str, usize> = HashMap::new();
    for (i, &(start, end)) in tokens.iter().enumerate() {
        last_index.insert(&s[start..end], i);
    }

    let mut out = String::with_capacity(s.len());
    let mut pos = 0;
    for (i, &(start, end)) in tokens.iter().enumerate() {
        out.push_str(&s[pos..start]);
        let word = &s[start..end];
        if last_index[word] == i {
            out.push_str(word);
        }
        pos = end;
    }
    out.push_str(&s[pos..]);
    out
}

/// Byte spans of word tokens: maximal runs of alphanumerics/underscores.
fn word_spans(s: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start: Option<usize> = None;
    for (i, c) in s.char_indices() {
        if c.is_alphanumeric() || c == '_' {
            start.get_or_insert(i);
        } else if let Some(begin) = start.take() {
            spans.push((begin, i));
        }
    }
    if let Some(begin) = start {
        spans.push((begin, s.len()));
    }
    spans
}

/// Truncate to at most `max` characters (chars, not bytes — may cut mid-word).
fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

/// Uppercase the first letter of each whitespace-delimited word.
///
/// Characters after a word's first keep their case, so internal capitals
/// from the source text survive. One char in, one char out — casing never
/// changes the refined length.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if c.is_whitespace() {
            at_word_start = true;
            out.push(c);
        } else {
            if at_word_start {
                out.push(c.to_uppercase().next().unwrap_or(c));
            } else {
                out.push(c);
            }
            at_word_start = false;
        }
    }
    out
}
