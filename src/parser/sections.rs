use std::sync::LazyLock;

use scraper::{ElementRef, Html, Node, Selector};

use super::entries::collapse_ws;

static CONTENT_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.field__item").unwrap());
static HEADING_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h3, h4").unwrap());
static FLOW_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h3, h4, p").unwrap());
static ANCHOR_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    IndividualsAdded,
    EntitiesAdded,
    /// `entities` is set when the heading names entities explicitly.
    Deletions { entities: bool },
}

/// A recognized heading and the raw entries listed under it.
#[derive(Debug, Clone)]
pub struct Section {
    pub kind: SectionKind,
    pub heading: String,
    pub entries: Vec<String>,
}

pub fn classify_heading(text: &str) -> Option<SectionKind> {
    let t = text.to_lowercase();
    if t.contains("individual") && t.contains("added") {
        Some(SectionKind::IndividualsAdded)
    } else if t.contains("entit") && t.contains("added") {
        Some(SectionKind::EntitiesAdded)
    } else if t.contains("deletion") {
        Some(SectionKind::Deletions {
            entities: t.contains("entit"),
        })
    } else {
        None
    }
}

/// Split an update page into recognized sections, in document order.
/// Paragraphs belong to the closest preceding heading; unrecognized
/// headings close the current section.
pub fn split_sections(html: &str) -> Vec<Section> {
    let doc = Html::parse_document(html);
    let scope = doc
        .select(&CONTENT_SEL)
        .find(|el| el.select(&HEADING_SEL).next().is_some())
        .unwrap_or_else(|| doc.root_element());

    let mut sections: Vec<Section> = Vec::new();
    let mut open = false;

    for el in scope.select(&FLOW_SEL) {
        match el.value().name() {
            "h3" | "h4" => {
                let heading = collapse_ws(&el.text().collect::<String>());
                open = match classify_heading(&heading) {
                    Some(kind) => {
                        sections.push(Section {
                            kind,
                            heading,
                            entries: Vec::new(),
                        });
                        true
                    }
                    None => false,
                };
            }
            _ if open => {
                if let Some(section) = sections.last_mut() {
                    section.entries.extend(paragraph_entries(el));
                }
            }
            _ => {}
        }
    }

    sections
}

/// Entries in one paragraph: each link's text, or each `<br>`-separated
/// line when the paragraph has no links.
fn paragraph_entries(p: ElementRef) -> Vec<String> {
    let linked: Vec<String> = p
        .select(&ANCHOR_SEL)
        .map(|a| collapse_ws(&a.text().collect::<String>()))
        .filter(|t| !t.is_empty())
        .collect();
    if !linked.is_empty() {
        return linked;
    }

    let mut lines = vec![String::new()];
    for node in p.descendants() {
        match node.value() {
            Node::Text(text) => {
                if let Some(line) = lines.last_mut() {
                    line.push_str(text);
                }
            }
            Node::Element(e) if e.name() == "br" => lines.push(String::new()),
            _ => {}
        }
    }
    lines
        .iter()
        .map(|l| collapse_ws(l))
        .filter(|l| !l.is_empty())
        .collect()
}

// ── Tests ──
