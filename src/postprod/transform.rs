//! Content transformation: exported document HTML → page markup.
//!
//! Pure and lenient. Every pass is a bottom-up rewrite of the markup tree;
//! anything unexpected is kept as-is and reported as a warning instead of
//! failing the run.

use std::collections::HashMap;

use reqwest::Url;

use super::markup::{self, AttrValue, Element, Node};

/// Inline style fragments mapped to the wrapper element they become.
/// Applied in order, so earlier wrappers end up outermost.
const STYLE_WRAPPERS: &[(&str, &[&str])] = &[
    ("i", &["font-style:italic"]),
    ("b", &["font-weight:700"]),
    ("u", &["text-decoration:underline"]),
    (
        "Monospace",
        &[
            r#"font-family:"Consolas""#,
            r#"font-family:"Roboto Mono""#,
            r#"font-family:"Courier New""#,
        ],
    ),
];

/// Document chrome that never belongs in page content.
const CHROME_ELEMENTS: &[&str] = &["head", "link", "meta", "script", "style", "title"];

/// Attributes carrying source-document styling.
const STRIPPED_ATTRIBUTES: &[&str] = &["id", "class", "style", "start"];

/// Elements dissolved into their children.
const UNWRAPPED_ELEMENTS: &[&str] = &["span", "body", "html"];

/// Elements that may legitimately stay empty.
const ALLOWED_EMPTY: &[&str] = &["img", "br", "hr", "td", "th"];

/// Table structure: style wrappers go inside these rather than around them.
const TABLE_STRUCTURE: &[&str] = &["table", "thead", "tbody", "tfoot", "tr", "td", "th", "ul", "ol"];

/// Element renames from plain HTML to page components.
const COMPONENT_TAGS: &[(&str, &str)] = &[("table", "Table"), ("img", "SheetableImage")];

/// Attribute renames from HTML to JSX.
const COMPONENT_ATTRIBUTES: &[(&str, &str)] = &[("colspan", "colSpan"), ("rowspan", "rowSpan")];

/// Output of [`transform`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transformed {
    /// The page-markup fragment.
    pub markup: String,
    /// Repairs and skipped rewrites, for logging.
    pub warnings: Vec<String>,
}

/// Transform exported document HTML into a page-markup fragment.
///
/// `image_vars` maps each image source URL to the variable its processed
/// asset is imported as.
pub fn transform(html: &str, image_vars: &HashMap<String, String>) -> Transformed {
    let parsed = markup::parse(html);
    let mut warnings = parsed.warnings;

    let nodes = rewrite(parsed.nodes, &mut strip_chrome);
    let nodes = rewrite(nodes, &mut |node| match node {
        Node::Element(el) => apply_inline_styles(el),
        other => vec![other],
    });
    let nodes = rewrite(nodes, &mut |node| match node {
        Node::Element(el) => vec![Node::Element(strip_attributes(el))],
        other => vec![other],
    });
    let nodes = rewrite(nodes, &mut |node| match node {
        Node::Element(el) if UNWRAPPED_ELEMENTS.contains(&el.name.as_str()) => el.children,
        other => vec![other],
    });
    let nodes = rewrite(nodes, &mut |node| match node {
        Node::Element(el) if el.name == "a" => vec![Node::Element(clean_link(el))],
        other => vec![other],
    });
    let nodes = rewrite(nodes, &mut |node| match node {
        Node::Element(el) if el.name == "table" => vec![Node::Element(restructure_table(el))],
        Node::Element(el) if matches!(el.name.as_str(), "td" | "th") => {
            vec![Node::Element(unwrap_cell_paragraphs(el))]
        }
        other => vec![other],
    });
    let nodes = rewrite(nodes, &mut prune_empty);
    let nodes = trim_trailing_breaks(nodes);
    let nodes = rewrite(nodes, &mut |node| match node {
        Node::Element(el) => vec![Node::Element(to_component(el, image_vars, &mut warnings))],
        other => vec![other],
    });

    Transformed {
        markup: markup::serialize(&nodes),
        warnings,
    }
}

/// Rewrite a forest bottom-up: each element's children are rewritten before
/// the element itself is passed to `f`, which returns its replacement nodes.
fn rewrite(nodes: Vec<Node>, f: &mut dyn FnMut(Node) -> Vec<Node>) -> Vec<Node> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        let node = match node {
            Node::Element(mut el) => {
                el.children = rewrite(std::mem::take(&mut el.children), f);
                Node::Element(el)
            }
            other => other,
        };
        out.extend(f(node));
    }
    out
}

fn strip_chrome(node: Node) -> Vec<Node> {
    match node {
        Node::Comment(_) => vec![],
        Node::Element(el) if CHROME_ELEMENTS.contains(&el.name.as_str()) => vec![],
        other => vec![other],
    }
}

fn has_style(el: &Element, fragments: &[&str]) -> bool {
    el.attr("style")
        .is_some_and(|style| fragments.iter().any(|fragment| style.contains(fragment)))
}

/// Turn styling conventions into wrapper elements.
///
/// An underlined element directly wrapping a link is dissolved instead: the
/// document service underlines every link. Styles listed after the underline
/// are then dropped along with the element.
fn apply_inline_styles(el: Element) -> Vec<Node> {
    let wrappers: Vec<&str> = STYLE_WRAPPERS
        .iter()
        .filter(|(_, fragments)| has_style(&el, fragments))
        .map(|(name, _)| *name)
        .collect();
    if wrappers.is_empty() {
        return vec![Node::Element(el)];
    }

    let dissolve =
        wrappers.contains(&"u") && el.children.iter().any(|child| child.is_element("a"));
    let wrappers: Vec<&str> = if dissolve {
        wrappers.into_iter().take_while(|name| *name != "u").collect()
    } else {
        wrappers
    };

    if TABLE_STRUCTURE.contains(&el.name.as_str()) {
        let mut el = el;
        el.children = wrap(std::mem::take(&mut el.children), &wrappers);
        return vec![Node::Element(el)];
    }

    let content = if dissolve {
        el.children
    } else {
        vec![Node::Element(el)]
    };
    wrap(content, &wrappers)
}

/// Wrap `content` so the first wrapper ends up outermost.
fn wrap(content: Vec<Node>, wrappers: &[&str]) -> Vec<Node> {
    wrappers.iter().rev().fold(content, |content, wrapper| {
        vec![Node::Element(Element::with_children(*wrapper, content))]
    })
}

fn strip_attributes(mut el: Element) -> Element {
    el.attrs
        .retain(|attr| !STRIPPED_ATTRIBUTES.contains(&attr.name.as_str()));
    for name in ["colspan", "rowspan"] {
        if el.attr(name) == Some("1") {
            el.remove_attr(name);
        }
    }
    el
}

/// Replace redirect-wrapped links with their target.
fn clean_link(mut el: Element) -> Element {
    if let Some(href) = el.attr("href")
        && let Some(target) = unwrap_redirect(href)
    {
        el.set_attr("href", AttrValue::Text(target));
    }
    el
}

/// `https://www.google.com/url?q=<target>&sa=...` → `<target>`.
pub fn unwrap_redirect(href: &str) -> Option<String> {
    if !href.starts_with("https://www.google.com/url?") {
        return None;
    }
    let url = Url::parse(href).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "q")
        .map(|(_, target)| target.into_owned())
}

/// Give a table an explicit header and body.
///
/// The first row becomes the header when it contains bold text; header
/// cells become `<th>` and lose the bold, which `<th>` implies.
fn restructure_table(mut table: Element) -> Element {
    let mut rows = Vec::new();
    let mut other = Vec::new();
    for child in std::mem::take(&mut table.children) {
        match child {
            Node::Element(section)
                if matches!(section.name.as_str(), "thead" | "tbody" | "tfoot") =>
            {
                for node in section.children {
                    match node {
                        Node::Element(row) if row.name == "tr" => rows.push(row),
                        node if node.is_blank_text() => {}
                        node => other.push(node),
                    }
                }
            }
            Node::Element(row) if row.name == "tr" => rows.push(row),
            node if node.is_blank_text() => {}
            node => other.push(node),
        }
    }

    let mut children = other;
    let has_header = rows.first().is_some_and(|row| row.contains("b"));
    let mut rows = rows.into_iter();
    if has_header && let Some(mut header) = rows.next() {
        header.children = rewrite(std::mem::take(&mut header.children), &mut |node| match node {
            Node::Element(el) if el.name == "b" => el.children,
            Node::Element(mut el) if el.name == "td" => {
                el.name = "th".to_string();
                vec![Node::Element(el)]
            }
            other => vec![other],
        });
        children.push(Node::Element(Element::with_children(
            "thead",
            vec![Node::Element(header)],
        )));
    }

    let body: Vec<Node> = rows.map(Node::Element).collect();
    if !body.is_empty() {
        children.push(Node::Element(Element::with_children("tbody", body)));
    }

    table.children = children;
    table
}

fn unwrap_cell_paragraphs(mut cell: Element) -> Element {
    cell.children = std::mem::take(&mut cell.children)
        .into_iter()
        .flat_map(|node| match node {
            Node::Element(p) if p.name == "p" => p.children,
            other => vec![other],
        })
        .collect();
    cell
}

fn prune_empty(node: Node) -> Vec<Node> {
    match node {
        Node::Element(el)
            if el.children.is_empty() && !ALLOWED_EMPTY.contains(&el.name.as_str()) =>
        {
            vec![]
        }
        other => vec![other],
    }
}

fn trim_trailing_breaks(mut nodes: Vec<Node>) -> Vec<Node> {
    while nodes.last().is_some_and(|node| node.is_element("br")) {
        nodes.pop();
    }
    nodes
}

fn to_component(
    mut el: Element,
    image_vars: &HashMap<String, String>,
    warnings: &mut Vec<String>,
) -> Element {
    if el.name == "img" {
        match el.attr("src").map(|src| (src.to_string(), image_vars.get(src))) {
            Some((_, Some(var))) => el.set_attr("src", AttrValue::Expr(var.clone())),
            Some((src, None)) => warnings.push(format!("image {src} has no processed asset")),
            None => warnings.push("image without a src attribute".to_string()),
        }
    }

    for (from, to) in COMPONENT_ATTRIBUTES {
        if let Some(value) = el.remove_attr(from) {
            let value = match value {
                AttrValue::Text(n) if !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()) => {
                    AttrValue::Expr(n)
                }
                other => other,
            };
            el.set_attr(*to, value);
        }
    }

    if let Some((_, component)) = COMPONENT_TAGS.iter().find(|(tag, _)| *tag == el.name) {
        el.name = component.to_string();
    }
    el
}
