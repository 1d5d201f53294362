//! Plain-text normalization of raw model output.
//!
//! Models return an unpredictable mix of markdown and HTML; downstream
//! clients render plain text. The normalizer strips markup, drops junk
//! lines, re-segments into sentence-like units and renders either plain
//! prose (under 3 segments) or numbered lines. The result is deterministic
//! for a given input regardless of the markup flavor the model chose.

/// Normalize raw model text to stable plain text.
pub fn normalize(raw: &str) -> String {
    let without_html = strip_html_tags(raw);

    // Clean line by line; a line that cleans to nothing acts as a
    // paragraph boundary, like an originally blank line.
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    for line in without_html.lines() {
        let cleaned = clean_line(line);
        if cleaned.is_empty() {
            if !current.is_empty() {
                paragraphs.push(std::mem::take(&mut current));
            }
        } else {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(&cleaned);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }

    let mut segments: Vec<String> = Vec::new();
    for paragraph in &paragraphs {
        for sentence in split_sentences(paragraph) {
            let segment = strip_list_prefix(sentence.trim());
            if segment.chars().any(|c| c.is_alphanumeric()) {
                segments.push(segment.to_string());
            }
        }
    }

    if segments.len() < 3 {
        segments.join(" ")
    } else {
        segments
            .iter()
            .enumerate()
            .map(|(i, s)| format!("{}. {}", i + 1, s))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Remove `<...>` tag spans. Only spans opening with a letter, '/' or '!'
/// are treated as tags, so a bare '<' in prose survives.
fn strip_html_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '<' {
            match chars.peek() {
                Some(&next) if next.is_ascii_alphabetic() || next == '/' || next == '!' => {
                    for inner in chars.by_ref() {
                        if inner == '>' {
                            break;
                        }
                    }
                }
                _ => out.push(c),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Strip markdown markers from one line and collapse whitespace runs.
/// Returns an empty string for lines with no alphanumeric content.
fn clean_line(line: &str) -> String {
    let stripped = strip_list_prefix(strip_heading_prefix(line.trim()));

    // Emphasis and code markers carry no content in plain text
    let without_emphasis: String = stripped.chars().filter(|c| *c != '*' && *c != '`').collect();

    let collapsed = without_emphasis
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    if collapsed.chars().any(|c| c.is_alphanumeric()) {
        collapsed
    } else {
        String::new()
    }
}

/// Strip leading `#` heading and `>` quote markers.
fn strip_heading_prefix(line: &str) -> &str {
    line.trim_start_matches(['#', '>']).trim_start()
}

/// Strip one leading bullet or number marker (`- `, `* `, `+ `, `• `,
/// `1. `, `2) `), as emitted by either markdown lists or the model's own
/// numbering.
fn strip_list_prefix(line: &str) -> &str {
    let trimmed = line.trim_start();

    if let Some(rest) = trimmed
        .strip_prefix("- ")
        .or_else(|| trimmed.strip_prefix("* "))
        .or_else(|| trimmed.strip_prefix("+ "))
        .or_else(|| trimmed.strip_prefix("• "))
    {
        return rest.trim_start();
    }

    let digits = trimmed.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let after = &trimmed[digits..];
        if let Some(rest) = after.strip_prefix('.').or_else(|| after.strip_prefix(')')) {
            if rest.starts_with(' ') {
                return rest.trim_start();
            }
        }
    }

    trimmed
}

/// Split on `[.?!]` followed by whitespace and an uppercase letter or digit.
/// The punctuation stays with the preceding segment.
fn split_sentences(paragraph: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let bytes: Vec<(usize, char)> = paragraph.char_indices().collect();
    let mut start = 0;

    let mut i = 0;
    while i < bytes.len() {
        let (idx, c) = bytes[i];
        if matches!(c, '.' | '?' | '!') {
            // Look ahead: at least one whitespace, then uppercase or digit
            let mut j = i + 1;
            let mut saw_space = false;
            while j < bytes.len() && bytes[j].1.is_whitespace() {
                saw_space = true;
                j += 1;
            }
            if saw_space && j < bytes.len() && (bytes[j].1.is_uppercase() || bytes[j].1.is_ascii_digit()) {
                let end = idx + c.len_utf8();
                segments.push(&paragraph[start..end]);
                start = bytes[j].0;
                i = j;
                continue;
            }
        }
        i += 1;
    }

    if start < paragraph.len() {
        segments.push(&paragraph[start..]);
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixed_markup_becomes_numbered_plain_text() {
        let input = "**Hello** world.\n\n<b>This</b> is great! Also, nice.";
        let output = normalize(input);

        assert!(!output.contains('*'));
        assert!(!output.contains('<'));
        assert!(!output.contains('>'));
        assert_eq!(output, "1. Hello world.\n2. This is great!\n3. Also, nice.");
    }

    #[test]
    fn test_single_short_sentence_unmodified() {
        assert_eq!(normalize("Hi there."), "Hi there.");
    }

    #[test]
    fn test_two_segments_joined_as_prose() {
        let output = normalize("First sentence. Second one.");
        assert_eq!(output, "First sentence. Second one.");
    }

    #[test]
    fn test_model_numbering_stripped_before_renumbering() {
        let input = "1. Alpha point.\n2. Beta point.\n3. Gamma point.";
        let output = normalize(input);
        assert_eq!(output, "1. Alpha point.\n2. Beta point.\n3. Gamma point.");
    }

    #[test]
    fn test_bullet_list_renumbered() {
        let input = "- First item.\n- Second item.\n- Third item.";
        let output = normalize(input);
        assert_eq!(output, "1. First item.\n2. Second item.\n3. Third item.");
    }

    #[test]
    fn test_headings_and_quotes_stripped() {
        let input = "## Heading One.\n\n> Quoted wisdom here.\n\nPlain closing line.";
        let output = normalize(input);
        assert_eq!(
            output,
            "1. Heading One.\n2. Quoted wisdom here.\n3. Plain closing line."
        );
    }

    #[test]
    fn test_junk_lines_dropped() {
        let input = "Real content here.\n***\n---\n• \nMore content follows. And a third thing.";
        let output = normalize(input);
        assert_eq!(
            output,
            "1. Real content here.\n2. More content follows.\n3. And a third thing."
        );
    }

    #[test]
    fn test_whitespace_collapsed() {
        assert_eq!(normalize("Hello    there\tfriend."), "Hello there friend.");
    }

    #[test]
    fn test_abbreviation_like_lowercase_not_split() {
        // '.' followed by a lowercase letter is not a boundary
        assert_eq!(normalize("See e.g. the docs."), "See e.g. the docs.");
    }

    #[test]
    fn test_decimal_numbers_not_split() {
        // No whitespace after '.' means no boundary
        assert_eq!(normalize("Pi is 3.14 roughly."), "Pi is 3.14 roughly.");
    }

    #[test]
    fn test_question_and_exclamation_boundaries() {
        let output = normalize("Really? Yes! Absolutely certain.");
        assert_eq!(output, "1. Really?\n2. Yes!\n3. Absolutely certain.");
    }

    #[test]
    fn test_inline_code_markers_removed() {
        assert_eq!(normalize("Use `cargo build` to compile."), "Use cargo build to compile.");
    }

    #[test]
    fn test_empty_and_markup_only_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("****\n<br/>\n---"), "");
    }

    #[test]
    fn test_blank_line_is_a_boundary_without_punctuation() {
        let input = "first thought\n\nsecond thought\n\nthird thought";
        let output = normalize(input);
        assert_eq!(output, "1. first thought\n2. second thought\n3. third thought");
    }

    #[test]
    fn test_deterministic() {
        let input = "**Bold** start. Then <i>italic</i> middle! Finally the end.";
        assert_eq!(normalize(input), normalize(input));
    }
}
