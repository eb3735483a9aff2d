//! Collapses repeated links and call-to-action blocks in post bodies.
//!
//! Works on the parsed fragment rather than on raw text, so nested markup
//! with similar shape cannot be mismatched. Only element siblings separated by
//! nothing but whitespace are ever considered duplicates.

use scraper::node::Element;
use scraper::{ElementRef, Html, Node};

/// Class that marks a call-to-action container.
pub const DEFAULT_CTA_CLASS: &str = "cta-box";

/// Removes every `<a>` (and every element carrying `cta_class`) that repeats
/// its previous element sibling verbatim, along with the whitespace between
/// them. Repeats until nothing changes.
///
/// Input without duplicates is returned byte for byte, which makes the
/// transform idempotent.
pub fn dedupe(html: &str, cta_class: &str) -> String {
    let mut fragment = Html::parse_fragment(html);
    let mut removed = 0;
    loop {
        let pass = collapse_pass(&mut fragment, cta_class);
        if pass == 0 {
            break;
        }
        removed += pass;
    }

    if removed == 0 {
        return html.to_owned();
    }
    fragment.root_element().inner_html()
}

fn collapse_pass(fragment: &mut Html, cta_class: &str) -> usize {
    let mut doomed = Vec::new();

    for parent in fragment.tree.root().descendants() {
        let mut previous: Option<String> = None;
        let mut gap = Vec::new();

        for child in parent.children() {
            match child.value() {
                Node::Text(text) if text.trim().is_empty() => {
                    gap.push(child.id());
                    continue;
                }
                Node::Element(element) if is_collapsible(element, cta_class) => {
                    let markup = ElementRef::wrap(child)
                        .map(|el| el.html())
                        .unwrap_or_default();
                    if previous.as_deref() == Some(markup.as_str()) {
                        doomed.append(&mut gap);
                        doomed.push(child.id());
                        continue;
                    }
                    previous = Some(markup);
                }
                _ => previous = None,
            }
            gap.clear();
        }
    }

    let removed = doomed.len();
    for id in doomed {
        if let Some(mut node) = fragment.tree.get_mut(id) {
            node.detach();
        }
    }
    removed
}

fn is_collapsible(element: &Element, cta_class: &str) -> bool {
    element.name() == "a" || element.classes().any(|class| class == cta_class)
}
