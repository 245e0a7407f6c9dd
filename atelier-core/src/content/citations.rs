//! Numbered source citations and the `[k]` markers that reference them.
//!
//! Numbers are positions, not identities: removing a source renumbers every
//! later entry, and markers already typed into text are NOT rewritten. Use
//! [`stale_markers`] to find markers that point past the end of the list.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::block::SourceCitation;

static MARKER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[(\d+)\]").expect("marker regex"));

/// Class attribute carried by every rendered citation anchor
pub const CITATION_CLASS: &str = "citation-link";

/// Dense, always-renumbered list of citations
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceList {
    items: Vec<SourceCitation>,
}

impl SourceList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap decoded sources, restoring `num == index + 1`
    pub fn from_decoded(sources: Vec<SourceCitation>) -> Self {
        let mut list = Self { items: sources };
        list.renumber();
        list
    }

    /// Append a source and return its number, ready to use in a marker
    pub fn add(&mut self, text: impl Into<String>) -> u32 {
        let num = self.items.len() as u32 + 1;
        self.items.push(SourceCitation::new(num, text));
        num
    }

    /// Remove the entry at `index` and renumber the rest.
    ///
    /// Returns `None` when `index` is out of range.
    pub fn remove(&mut self, index: usize) -> Option<SourceCitation> {
        if index >= self.items.len() {
            return None;
        }
        let removed = self.items.remove(index);
        self.renumber();
        Some(removed)
    }

    /// Replace the text of the entry at `index`
    pub fn update(&mut self, index: usize, text: impl Into<String>) -> bool {
        match self.items.get_mut(index) {
            Some(source) => {
                source.text = text.into();
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains_num(&self, num: u32) -> bool {
        num >= 1 && (num as usize) <= self.items.len()
    }

    pub fn as_slice(&self) -> &[SourceCitation] {
        &self.items
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceCitation> {
        self.items.iter()
    }

    fn renumber(&mut self) {
        for (idx, source) in self.items.iter_mut().enumerate() {
            source.num = idx as u32 + 1;
        }
    }
}

/// Inline marker text for citation `num`
pub fn marker(num: u32) -> String {
    format!("[{num}]")
}

/// Every marker number referenced in `text`, in order of appearance
pub fn extract_marker_numbers(text: &str) -> Vec<u32> {
    MARKER_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1)?.as_str().parse().ok())
        .collect()
}

/// Marker numbers in `texts` that no longer resolve to a source
/// (zero, or greater than `source_count`). Sorted, deduplicated.
pub fn stale_markers<'a>(texts: impl IntoIterator<Item = &'a str>, source_count: usize) -> Vec<u32> {
    let stale: BTreeSet<u32> = texts
        .into_iter()
        .flat_map(extract_marker_numbers)
        .filter(|num| *num == 0 || *num as usize > source_count)
        .collect();
    stale.into_iter().collect()
}

/// True when `html` already contains rendered citation anchors
pub fn has_citation_links(html: &str) -> bool {
    html.contains(CITATION_CLASS)
}

/// Anchor markup for citation `num`
pub fn citation_anchor(num: u32) -> String {
    format!(r##"<a href="#source-{num}" class="{CITATION_CLASS}">[{num}]</a>"##)
}

/// Turn `[k]` markers into anchors for `1 <= k <= source_count`.
///
/// Text that already carries citation anchors is returned unchanged, so the
/// function can be applied to its own output.
pub fn link_citations(html: &str, source_count: usize) -> String {
    if source_count == 0 {
        return html.to_owned();
    }
    link_citations_where(html, |num| num as usize <= source_count)
}

/// Like [`link_citations`], for source numbers that need not be dense
pub fn link_citations_where(html: &str, known: impl Fn(u32) -> bool) -> String {
    if has_citation_links(html) {
        return html.to_owned();
    }

    MARKER_RE
        .replace_all(html, |caps: &Captures<'_>| {
            match caps[1].parse::<u32>() {
                Ok(num) if num >= 1 && known(num) => citation_anchor(num),
                _ => caps[0].to_owned(),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list_of(texts: &[&str]) -> SourceList {
        let mut list = SourceList::new();
        for text in texts {
            list.add(*text);
        }
        list
    }

    #[test]
    fn add_returns_next_number() {
        let mut list = SourceList::new();
        assert_eq!(list.add("Vasari"), 1);
        assert_eq!(list.add("Panofsky"), 2);
        assert_eq!(list.len(), 2);
        assert!(list.contains_num(2));
        assert!(!list.contains_num(3));
        assert!(!list.contains_num(0));
    }

    #[test]
    fn remove_renumbers_following_entries() {
        let mut list = list_of(&["a", "b", "c"]);
        let removed = list.remove(1).unwrap();
        assert_eq!(removed, SourceCitation::new(2, "b"));
        assert_eq!(
            list.as_slice(),
            &[SourceCitation::new(1, "a"), SourceCitation::new(2, "c")]
        );
    }

    #[test]
    fn remove_out_of_range_is_none() {
        let mut list = list_of(&["a"]);
        assert!(list.remove(5).is_none());
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn from_decoded_restores_dense_numbering() {
        let list = SourceList::from_decoded(vec![
            SourceCitation::new(4, "x"),
            SourceCitation::new(9, "y"),
        ]);
        let nums: Vec<u32> = list.iter().map(|s| s.num).collect();
        assert_eq!(nums, vec![1, 2]);
    }

    #[test]
    fn update_text_in_place() {
        let mut list = list_of(&["draft"]);
        assert!(list.update(0, "final"));
        assert!(!list.update(3, "nope"));
        assert_eq!(list.as_slice()[0].text, "final");
    }

    #[test]
    fn stale_markers_after_removal() {
        let texts = ["see [1] and [3]", "also [2] [3] [0]"];
        assert_eq!(stale_markers(texts, 3), vec![0]);
        assert_eq!(stale_markers(texts, 2), vec![0, 3]);
    }

    #[test]
    fn links_only_known_sources() {
        let linked = link_citations("a [1] b [2] c [7]", 2);
        assert!(linked.contains(&citation_anchor(1)));
        assert!(linked.contains(&citation_anchor(2)));
        assert!(linked.contains("[7]"));
        assert!(!linked.contains("#source-7"));
    }

    #[test]
    fn linking_is_idempotent() {
        let once = link_citations("text [1]", 1);
        let twice = link_citations(&once, 1);
        assert_eq!(once, twice);
        assert_eq!(twice.matches(CITATION_CLASS).count(), 1);
    }

    #[test]
    fn links_sparse_source_numbers() {
        let linked = link_citations_where("[1] [2] [5]", |num| num == 2 || num == 5);
        assert_eq!(
            linked,
            format!("[1] {} {}", citation_anchor(2), citation_anchor(5))
        );
    }

    #[test]
    fn no_sources_means_no_links() {
        assert_eq!(link_citations("[1]", 0), "[1]");
    }
}
