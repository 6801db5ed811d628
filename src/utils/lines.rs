//! Line filtering over separator-delimited text.

/// Drop every segment of `text` (split on `separator`) that contains any of
/// `exclusions`, then rejoin with the same separator.
pub fn exclude(text: &str, separator: &str, exclusions: &[String]) -> String {
    let kept: Vec<&str> = split(text, separator)
        .filter(|line| !exclusions.iter().any(|ex| line.contains(ex.as_str())))
        .collect();
    kept.join(separator)
}

fn split<'a>(text: &'a str, separator: &'a str) -> Box<dyn Iterator<Item = &'a str> + 'a> {
    if separator.is_empty() {
        // Each character is its own segment.
        Box::new(text.char_indices().map(move |(i, c)| &text[i..i + c.len_utf8()]))
    } else {
        Box::new(text.split(separator))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ex(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn removes_matching_lines_and_keeps_trailing_separator() {
        let out = exclude("hi\nthere and here\nyou\n", "\n", &ex(&["hi", "there"]));
        assert_eq!(out, "you\n");
    }

    #[test]
    fn single_matching_line_becomes_empty() {
        assert_eq!(exclude("hello everyone", "\n", &ex(&["every"])), "");
    }

    #[test]
    fn no_exclusions_keeps_text() {
        assert_eq!(exclude("a,b,c", ",", &[]), "a,b,c");
    }

    #[test]
    fn empty_separator_filters_characters() {
        assert_eq!(exclude("abcab", "", &ex(&["b"])), "aca");
    }
}
