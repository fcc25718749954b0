//! Content Normalization
//!
//! Deterministic clean-up applied to extracted text before it is returned to a
//! caller. `normalize` is idempotent: applying it to its own output changes
//! nothing.
//!
//! Rules run in this order, and the whole sequence repeats until the text stops
//! changing (bold rewriting introduces `>` characters that removal patterns key
//! on):
//! 1. removal of leaked artifact phrases and, in text-only contexts, of image
//!    references, repeated until nothing more matches (a removal can splice
//!    together a new match),
//! 2. bullet unification, which must precede bold rewriting since bold spans
//!    may appear inside bulleted lines,
//! 3. markdown bold to `<strong>`,
//! 4. collapsing runs of three or more newlines.

use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;

/// Host that serves images generated by the agent adapter.
pub const ASSET_HOST: &str = "aixplain-modelserving-data";

static ARTIFACTS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"Processing request.*?\.\.\.").unwrap(),
        Regex::new(r"This is a dummy response.*?\.").unwrap(),
    ]
});

static IMAGE_REFERENCES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"\[IMAGE_URL:.*?\]").unwrap(),
        Regex::new(r"<img[^<>]*>").unwrap(),
        Regex::new(&format!(
            r#"<a href="https://{}.*?</a>"#,
            regex::escape(ASSET_HOST)
        ))
        .unwrap(),
        Regex::new(r"!\[.*?\]\(.*?\)").unwrap(),
        Regex::new(r"https?://\S+?\.(?:jpg|jpeg|png|gif|webp)\b").unwrap(),
    ]
});

// `-` and `*` need trailing whitespace so that `**bold**` and `-5` are left alone.
static BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(?:[-*][ \t]+|•[ \t]*)").unwrap());
static BOLD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*").unwrap());
static BLANK_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// Where the normalized text is headed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NormalizeContext {
    /// Regular chat responses.
    #[default]
    General,
    /// Responses that must not carry images, such as summaries.
    TextOnly,
}

/// Applies every clean-up rule for `context`.
pub fn normalize(text: &str, context: NormalizeContext) -> String {
    // Each pass either consumes markup or shortens the text, so this settles.
    let mut current = normalize_once(text, context);
    loop {
        let next = normalize_once(&current, context);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn normalize_once(text: &str, context: NormalizeContext) -> String {
    let cleaned = strip_removals(text, context);
    let bulleted = BULLET.replace_all(&cleaned, "• ");
    let bolded = BOLD.replace_all(&bulleted, "<strong>$1</strong>");
    BLANK_RUN.replace_all(&bolded, "\n\n").into_owned()
}

/// Removes artifact phrases and, for [`NormalizeContext::TextOnly`], image
/// references.
pub fn strip_removals(text: &str, context: NormalizeContext) -> String {
    let patterns: Vec<&Regex> = match context {
        NormalizeContext::General => ARTIFACTS.iter().collect(),
        NormalizeContext::TextOnly => ARTIFACTS
            .iter()
            .chain(IMAGE_REFERENCES.iter())
            .collect(),
    };

    // Every pass strictly shortens the text, so this terminates.
    let mut current = text.to_string();
    loop {
        let mut changed = false;
        for pattern in &patterns {
            if let Cow::Owned(next) = pattern.replace_all(&current, "") {
                current = next;
                changed = true;
            }
        }
        if !changed {
            return current;
        }
    }
}
