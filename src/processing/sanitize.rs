//! Helpers for normalizing caller-supplied strings.

/// Characters of chunk text kept in a source preview.
pub const PREVIEW_CHARS: usize = 200;

/// Sanitize arbitrary string input by trimming whitespace and dropping empties.
pub(crate) fn sanitize_string(value: Option<String>) -> Option<String> {
    value.and_then(|input| {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// Reduce an uploaded filename to a safe final path component.
///
/// Directory parts (either separator) are dropped and characters outside
/// `[A-Za-z0-9._ -]` become `_`. Returns `None` when nothing usable remains.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    let cleaned: String = base
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-' | ' ') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').trim().to_string();
    if cleaned.is_empty() { None } else { Some(cleaned) }
}

/// First [`PREVIEW_CHARS`] chars of `text` followed by `...`.
pub fn preview(text: &str) -> String {
    let mut shown: String = text.chars().take(PREVIEW_CHARS).collect();
    shown.push_str("...");
    shown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_string_trims_and_drops_empty() {
        assert_eq!(sanitize_string(Some("  q  ".into())), Some("q".into()));
        assert_eq!(sanitize_string(Some("   ".into())), None);
        assert_eq!(sanitize_string(None), None);
    }

    #[test]
    fn filename_loses_directories_and_odd_characters() {
        assert_eq!(
            sanitize_filename("../../etc/passwd.txt").as_deref(),
            Some("passwd.txt")
        );
        assert_eq!(
            sanitize_filename(r"C:\Users\me\Visitor Guide (v2).pdf").as_deref(),
            Some("Visitor Guide _v2_.pdf")
        );
        assert_eq!(sanitize_filename(".hidden.docx").as_deref(), Some("hidden.docx"));
        assert_eq!(sanitize_filename("dir/"), None);
        assert_eq!(sanitize_filename(".."), None);
    }

    #[test]
    fn preview_truncates_on_char_boundaries() {
        let long = "é".repeat(250);
        let shown = preview(&long);
        assert_eq!(shown.chars().count(), PREVIEW_CHARS + 3);
        assert!(shown.ends_with("..."));

        assert_eq!(preview("short"), "short...");
    }
}
