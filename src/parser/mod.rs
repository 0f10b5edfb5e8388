pub mod entries;
pub mod sections;

use std::fmt;

use tracing::warn;

use entries::{entity_name, individual_name};
use sections::{Section, SectionKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Individual,
    Entity,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Individual => f.write_str("individual"),
            Category::Entity => f.write_str("entity"),
        }
    }
}

/// A list change announced on an update page. Dates come from the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Addition { name: String, category: Category },
    Deletion { name: String },
}

/// Two-pass pipeline: html → sections → events, in document order.
pub fn extract_events(html: &str) -> Vec<Event> {
    sections::split_sections(html)
        .iter()
        .flat_map(section_events)
        .collect()
}

fn section_events(section: &Section) -> Vec<Event> {
    let mut events = Vec::with_capacity(section.entries.len());
    for entry in &section.entries {
        let event = match section.kind {
            SectionKind::IndividualsAdded => individual_name(entry).map(|name| Event::Addition {
                name,
                category: Category::Individual,
            }),
            SectionKind::EntitiesAdded => entity_name(entry).map(|name| Event::Addition {
                name,
                category: Category::Entity,
            }),
            SectionKind::Deletions { entities: true } => {
                entity_name(entry).map(|name| Event::Deletion { name })
            }
            SectionKind::Deletions { entities: false } => individual_name(entry)
                .or_else(|| entity_name(entry))
                .map(|name| Event::Deletion { name }),
        };
        match event {
            Some(e) => events.push(e),
            None => warn!("Skipping malformed entry under \"{}\": {}", section.heading, entry),
        }
    }
    events
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::fixture;

    fn addition(name: &str, category: Category) -> Event {
        Event::Addition {
            name: name.to_string(),
            category,
        }
    }

    #[test]
    fn linked_page_events_in_document_order() {
        let events = extract_events(&fixture("recent_action_20241203.html"));
        assert_eq!(
            events,
            vec![
                addition("MUNOZ UCROS, Monica", Category::Individual),
                addition("RESTREPO, Carlos Andres", Category::Individual),
                addition("FUNNULL TECHNOLOGY INC", Category::Entity),
                Event::Deletion {
                    name: "SOBOLEV, Nikita Aleksandrovich".to_string()
                },
            ]
        );
    }

    #[test]
    fn unlinked_page_skips_malformed_entries() {
        let events = extract_events(&fixture("recent_action_plain.html"));
        assert_eq!(
            events,
            vec![
                addition("PEREZ, Ana", Category::Individual),
                addition("GARANTEX EUROPE OU", Category::Entity),
                Event::Deletion {
                    name: "IVANOV, Petr".to_string()
                },
                Event::Deletion {
                    name: "CRYPTEX".to_string()
                },
            ]
        );
    }

    #[test]
    fn page_without_sections_is_a_no_op() {
        assert!(extract_events("<html><body><h1>Publication of guidance</h1></body></html>").is_empty());
        assert!(extract_events("").is_empty());
    }
}
