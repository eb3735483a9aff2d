use scraper::{Html, Node};

/// Elements whose text is never rendered as prose.
const HIDDEN_TEXT: [&str; 2] = ["script", "style"];

/// Number of whitespace-delimited words in the visible text of an HTML
/// fragment. Tag boundaries always separate words; `<script>` and `<style>`
/// contents are ignored.
pub fn word_count(html: &str) -> usize {
    if html.trim().is_empty() {
        return 0;
    }
    let fragment = Html::parse_fragment(html);
    fragment
        .tree
        .root()
        .descendants()
        .filter_map(|node| match node.value() {
            Node::Text(text) => Some((node, text)),
            _ => None,
        })
        .filter(|(node, _)| {
            !node.ancestors().any(|parent| {
                parent
                    .value()
                    .as_element()
                    .is_some_and(|el| HIDDEN_TEXT.contains(&el.name()))
            })
        })
        .map(|(_, text)| text.split_whitespace().count())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::word_count;

    #[test]
    fn markup_is_not_counted() {
        let html = r#"<h2 class="titolo">Personal training</h2><p>Allenati con <a href="/contatti">noi</a> oggi.</p>"#;
        assert_eq!(word_count(html), 6);
    }

    #[test]
    fn plain_text_and_empty_input() {
        assert_eq!(word_count("uno  due\ttre\n quattro"), 4);
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("<p>   </p><br>"), 0);
    }

    #[test]
    fn adjacent_blocks_do_not_merge_words() {
        assert_eq!(word_count("<p>fine</p><p>inizio</p>"), 2);
    }

    #[test]
    fn script_and_style_are_not_prose() {
        assert_eq!(word_count("<p>a</p><script>var x = 1;</script>"), 1);
        assert_eq!(
            word_count("<style>.cta-box { color: red; }</style><div><p>due parole</p></div>"),
            2
        );
    }
}
