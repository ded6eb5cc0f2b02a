//! Filename sanitization for download templates and `Content-Disposition`.

/// Maximum length of a sanitized filename.
pub const MAX_FILENAME_LEN: usize = 200;

/// Returned when sanitization strips everything.
pub const FALLBACK_FILENAME: &str = "download";

const FULL_WIDTH: [(char, char); 13] = [
    ('？', '?'),
    ('｜', '|'),
    ('＃', '#'),
    ('：', ':'),
    ('；', ';'),
    ('，', ','),
    ('。', '.'),
    ('（', '('),
    ('）', ')'),
    ('【', '['),
    ('】', ']'),
    ('「', '"'),
    ('」', '"'),
];

const ILLEGAL: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Produce a filesystem- and header-safe ASCII filename.
///
/// Full-width punctuation is folded to ASCII first, then illegal characters,
/// control characters and non-ASCII characters become `_`, runs of `_`
/// collapse, leading and trailing `_` are trimmed and the result is cut to
/// [`MAX_FILENAME_LEN`]. Empty results become [`FALLBACK_FILENAME`].
#[must_use]
pub fn sanitize_filename(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        let folded = FULL_WIDTH
            .iter()
            .find_map(|(wide, ascii)| (*wide == ch).then_some(*ascii))
            .unwrap_or(ch);
        let safe = if ILLEGAL.contains(&folded) || !folded.is_ascii() || folded.is_ascii_control()
        {
            '_'
        } else {
            folded
        };
        if safe == '_' && out.ends_with('_') {
            continue;
        }
        out.push(safe);
    }

    let trimmed = out.trim_matches('_');
    // Everything left is ASCII, so byte and char boundaries coincide.
    let truncated = &trimmed[..trimmed.len().min(MAX_FILENAME_LEN)];
    let truncated = truncated.trim_end_matches('_');
    if truncated.is_empty() {
        FALLBACK_FILENAME.to_string()
    } else {
        truncated.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_well_formed(output: &str) {
        assert!(output.is_ascii(), "non-ascii output: {output:?}");
        assert!(!output.contains("__"), "unmerged underscores: {output:?}");
        assert!(!output.starts_with('_') && !output.ends_with('_'));
        assert!(output.len() <= MAX_FILENAME_LEN);
        assert!(!output.is_empty());
    }

    #[test]
    fn full_width_punctuation_folds_before_illegal_pass() {
        assert_eq!(sanitize_filename("a，b。c"), "a,b.c");
        assert_eq!(sanitize_filename("（x）【y】"), "(x)[y]");
        assert_eq!(sanitize_filename("what？"), "what");
        assert_eq!(sanitize_filename("a｜b"), "a_b");
        assert_eq!(sanitize_filename("「quote」"), "quote");
        assert_eq!(sanitize_filename("＃tag；x"), "#tag;x");
        assert_eq!(sanitize_filename("time：now"), "time_now");
    }

    #[test]
    fn illegal_and_non_ascii_characters_are_replaced() {
        assert_eq!(sanitize_filename("a<b>c"), "a_b_c");
        assert_eq!(sanitize_filename("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(sanitize_filename("héllo wörld"), "h_llo w_rld");
        assert_eq!(sanitize_filename("日本語のタイトル.mp4"), ".mp4");
        assert_eq!(sanitize_filename("line\r\nbreak"), "line_break");
    }

    #[test]
    fn empty_results_fall_back() {
        assert_eq!(sanitize_filename(""), FALLBACK_FILENAME);
        assert_eq!(sanitize_filename("???"), FALLBACK_FILENAME);
        assert_eq!(sanitize_filename("日本"), FALLBACK_FILENAME);
    }

    #[test]
    fn truncation_keeps_output_trimmed() {
        let long = format!("{}_{}", "a".repeat(199), "b".repeat(50));
        let output = sanitize_filename(&long);
        assert_eq!(output, "a".repeat(199));
        assert_well_formed(&output);
    }

    #[test]
    fn sanitize_is_idempotent_and_well_formed() {
        let samples = [
            "",
            "Normal Title.mp4",
            "__leading and trailing__",
            "【公式】Music Video｜Live 2024？",
            "a\u{7f}b\u{0}c",
            "<<<>>>",
            "x".repeat(500).as_str(),
            "abc123_movie.mp4",
            "ünïcödé ünd spaces",
        ]
        .map(str::to_string);
        for sample in &samples {
            let once = sanitize_filename(sample);
            assert_well_formed(&once);
            assert_eq!(sanitize_filename(&once), once, "not idempotent for {sample:?}");
        }
    }
}
