/// Maximum number of characters of clipboard text that ends up in log lines.
pub const PREVIEW_CHARS: usize = 40;

/// Returns true when the text has nothing worth syncing.
pub fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

/// Byte index of the end of the `n`th character, or `s.len()` if shorter.
pub fn char_boundary_after(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map(|(i, _)| i).unwrap_or(s.len())
}

/// Single-line, length-bounded rendering of clipboard text for logs and listings.
pub fn preview(s: &str, max_chars: usize) -> String {
    let flat: String = s
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    let end = char_boundary_after(&flat, max_chars);
    if end < flat.len() {
        format!("{}...", &flat[..end])
    } else {
        flat
    }
}
