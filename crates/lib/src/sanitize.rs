//! Terraria chat-tag stripping for command output sent to VK.
//!
//! `[c/ff0000:text]` keeps only `text`; item, achievement, glyph and name tags such as `[i:29]`,
//! `[i/s10:29]` or `[a:TIMBER]` are dropped.

use regex::{Captures, Regex};
use std::sync::OnceLock;

fn chat_tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\[c/[^:\[\]]+:([^\[\]]+)\]|\[[iagn](?:/[^:\[\]]*)?:[^\[\]]*\]")
            .expect("chat tag pattern is valid")
    })
}

/// Replace every chat tag with its displayed text (or nothing).
///
/// Tags never span brackets, so the innermost tag is replaced first; repeating until nothing
/// matches unwraps nested tags like `[c/ff0000:[i:5]x]` and keeps `sanitize(sanitize(s)) == sanitize(s)`.
pub fn sanitize(text: &str) -> String {
    let pattern = chat_tag_pattern();
    let mut current = text.to_string();
    while pattern.is_match(&current) {
        current = pattern
            .replace_all(&current, |caps: &Captures| {
                caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default()
            })
            .into_owned();
    }
    current
}
