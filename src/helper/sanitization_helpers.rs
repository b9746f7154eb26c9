use ammonia::Builder;
use std::collections::HashSet;

/// Cleans rich-text article HTML down to a safe subset of tags and attributes.
/// Scripts, event handlers and `javascript:` links are removed.
pub fn sanitize_article_html(html: &str) -> String {
    let tags: HashSet<&str> = [
        "h1", "h2", "h3", "h4", "h5", "h6", "b", "strong", "i", "em", "u", "p", "br", "span", "a", "ul",
        "ol", "li", "blockquote", "code", "pre", "hr", "img", "figure", "figcaption", "table", "thead",
        "tbody", "tr", "th", "td", "s", "del", "div",
    ]
    .into_iter()
    .collect();
    let attributes: HashSet<&str> = ["src", "href", "alt", "title", "class", "width", "height"]
        .into_iter()
        .collect();

    Builder::new()
        .tags(tags)
        .generic_attributes(attributes)
        .link_rel(Some("nofollow ugc noopener"))
        .clean(html)
        .to_string()
}

/// Strips all markup, leaving only the text. Used for comment bodies, which
/// are stored as plain text, so the entities ammonia emits are decoded again.
pub fn strip_all_html(input: &str) -> String {
    let cleaned = Builder::new().tags(HashSet::new()).clean(input).to_string();
    html_escape::decode_html_entities(&cleaned).into_owned()
}
