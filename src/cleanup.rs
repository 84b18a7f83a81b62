use unicode_normalization::UnicodeNormalization;

/// Joins per-page text the way the extractor hands it to the model.
pub fn join_pages(pages: &[String], separator: &str) -> String {
    pages.join(separator)
}

/// Newline + NFKC normalization, control-char scrub, trailing-space trim.
pub fn normalize_text(s: &str) -> String {
    let s = s.replace("\r\n", "\n");
    let s: String = s.nfkc().collect();
    let s = sanitize_control_chars(&s);

    s.lines()
        .map(|l| l.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

fn sanitize_control_chars(s: &str) -> String {
    s.chars()
        .filter(|&ch| ch == '\n' || ch == '\t' || !ch.is_control())
        .collect()
}

/// Length used for the text/scan decision: chars of the trimmed text.
pub fn significant_len(s: &str) -> usize {
    s.trim().chars().count()
}
