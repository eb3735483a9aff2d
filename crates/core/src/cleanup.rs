use std::sync::LazyLock;

use regex::Regex;

static INTER_TAG_WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">\s+<").expect("inter-tag whitespace pattern"));

/// Local stand-in for the remote repair call: collapses each whitespace run
/// sitting between a tag close and the next tag open into a single space.
///
/// Structure is left exactly as found. Text runs are untouched.
pub fn collapse_inter_tag_whitespace(html: &str) -> String {
    INTER_TAG_WHITESPACE.replace_all(html, "> <").into_owned()
}

#[cfg(test)]
mod tests {
    use super::collapse_inter_tag_whitespace;

    #[test]
    fn collapses_between_tags_only() {
        let html = "<p>Uno   due</p>\n\n   <p>tre</p>";
        assert_eq!(collapse_inter_tag_whitespace(html), "<p>Uno   due</p> <p>tre</p>");
    }

    #[test]
    fn leaves_broken_markup_alone() {
        let html = "<div><p>aperto";
        assert_eq!(collapse_inter_tag_whitespace(html), html);
    }
}
