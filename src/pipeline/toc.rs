//! Outline walking: attach leveled titles to the pages they point at.

use crate::document::{Destination, DocumentSource, OutlineNode};
use crate::page::{Page, TocEntry};
use tracing::{debug, trace};

/// Flatten the outline depth-first into resolved entries, in walk order.
///
/// The level of an entry is the number of groups enclosing it. Entries whose
/// destination cannot be resolved, or resolves outside the document, are
/// skipped.
pub fn extract_toc(source: &dyn DocumentSource) -> Vec<TocEntry> {
    let mut entries = Vec::new();
    walk(source, &source.outline(), 0, &mut entries);
    debug!("Outline: {} resolved entries", entries.len());
    entries
}

fn walk(source: &dyn DocumentSource, nodes: &[OutlineNode], level: usize, out: &mut Vec<TocEntry>) {
    for node in nodes {
        match node {
            OutlineNode::Group(children) => walk(source, children, level + 1, out),
            OutlineNode::Entry { title, destination } => {
                match resolve(source, destination) {
                    Some(page) => out.push(TocEntry {
                        title: title.clone(),
                        level,
                        page,
                    }),
                    None => trace!("Outline entry {:?} has no resolvable page", title),
                }
            }
        }
    }
}

fn resolve(source: &dyn DocumentSource, destination: &Destination) -> Option<usize> {
    let page = match destination {
        Destination::Page(p) => Some(*p),
        Destination::Named(name) => source.resolve_named(name),
        Destination::Unresolved => None,
    }?;
    (page < source.page_count()).then_some(page)
}

/// Append each entry to the page it resolves to.
pub fn attach_toc(pages: &mut [Page], entries: Vec<TocEntry>) {
    for entry in entries {
        if let Some(page) = pages.iter_mut().find(|p| p.number == entry.page) {
            page.toc.push(entry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::InMemoryDocument;

    fn entry(title: &str, destination: Destination) -> OutlineNode {
        OutlineNode::Entry {
            title: title.into(),
            destination,
        }
    }

    #[test]
    fn nested_entry_gets_depth_as_level() {
        let doc = InMemoryDocument::blank_pages(5, 10, 10).outline(vec![
            entry("Chapter", Destination::Page(0)),
            OutlineNode::Group(vec![
                entry("Section", Destination::Page(1)),
                OutlineNode::Group(vec![entry("Subsection", Destination::Page(3))]),
            ]),
        ]);
        let toc = extract_toc(&doc);
        assert_eq!(toc.len(), 3);
        assert_eq!(
            toc[2],
            TocEntry {
                title: "Subsection".into(),
                level: 2,
                page: 3
            }
        );
        assert_eq!(toc[0].level, 0);
        assert_eq!(toc[1].level, 1);
    }

    #[test]
    fn named_destinations_resolve_through_source() {
        let doc = InMemoryDocument::blank_pages(3, 10, 10)
            .named_destination("appendix", 2)
            .outline(vec![
                entry("Appendix", Destination::Named("appendix".into())),
                entry("Missing", Destination::Named("nowhere".into())),
            ]);
        let toc = extract_toc(&doc);
        assert_eq!(toc.len(), 1);
        assert_eq!(toc[0].page, 2);
    }

    #[test]
    fn unresolvable_and_out_of_range_entries_are_skipped() {
        let doc = InMemoryDocument::blank_pages(2, 10, 10).outline(vec![
            entry("External", Destination::Unresolved),
            entry("Beyond", Destination::Page(7)),
            entry("Ok", Destination::Page(1)),
        ]);
        let toc = extract_toc(&doc);
        assert_eq!(toc.len(), 1);
        assert_eq!(toc[0].title, "Ok");
    }

    #[test]
    fn missing_outline_is_a_no_op() {
        let doc = InMemoryDocument::blank_pages(2, 10, 10);
        assert!(extract_toc(&doc).is_empty());
    }

    #[test]
    fn entries_attach_in_walk_order_without_dedup() {
        let mut pages = vec![Page::new(0, Vec::new()), Page::new(1, Vec::new())];
        let entries = vec![
            TocEntry { title: "A".into(), level: 0, page: 1 },
            TocEntry { title: "A".into(), level: 0, page: 1 },
            TocEntry { title: "B".into(), level: 1, page: 1 },
        ];
        attach_toc(&mut pages, entries);
        assert!(pages[0].toc.is_empty());
        let titles: Vec<_> = pages[1].toc.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, ["A", "A", "B"]);
    }
}
