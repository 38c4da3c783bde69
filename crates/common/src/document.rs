//! Stored configuration document
//!
//! The backend persists the intercom configuration as flat text: one
//! `name=value` line per entry, with consecutive device blocks delimited by
//! a line of 18 underscores. [`parse`] turns that text into a [`Document`]
//! and [`serialize`] turns a document back into text.
//!
//! ```text
//! IP_CAMERA=192.168.0.77:85
//! LOGIN=admin
//! __________________
//! IP_CAMERA=192.168.0.74:85
//! LOGIN=admin
//! ```

use serde::{Deserialize, Serialize};

/// Line that separates two groups in the stored text.
pub const SEPARATOR: &str = "__________________";

/// A single configuration entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pair {
    pub name: String,
    pub value: String,
}

impl Pair {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Serialized `name=value` line, or `None` when the trimmed name is empty.
    pub fn to_line(&self) -> Option<String> {
        let name = self.name.trim();
        if name.is_empty() {
            return None;
        }
        Some(format!("{}={}", name, self.value.trim()))
    }
}

/// One device block: the pairs between two separators.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Group {
    pairs: Vec<Pair>,
}

impl Group {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pairs(&self) -> &[Pair] {
        &self.pairs
    }

    pub fn pair(&self, index: usize) -> Option<&Pair> {
        self.pairs.get(index)
    }

    pub fn pair_mut(&mut self, index: usize) -> Option<&mut Pair> {
        self.pairs.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Appends a pair and returns its index.
    pub fn push(&mut self, pair: Pair) -> usize {
        self.pairs.push(pair);
        self.pairs.len() - 1
    }

    pub fn remove(&mut self, index: usize) -> Option<Pair> {
        if index < self.pairs.len() {
            Some(self.pairs.remove(index))
        } else {
            None
        }
    }
}

impl FromIterator<Pair> for Group {
    fn from_iter<I: IntoIterator<Item = Pair>>(iter: I) -> Self {
        Self {
            pairs: iter.into_iter().collect(),
        }
    }
}

/// The full configuration: an ordered sequence of groups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    groups: Vec<Group>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn group(&self, index: usize) -> Option<&Group> {
        self.groups.get(index)
    }

    pub fn group_mut(&mut self, index: usize) -> Option<&mut Group> {
        self.groups.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Appends a group and returns its index.
    pub fn push(&mut self, group: Group) -> usize {
        self.groups.push(group);
        self.groups.len() - 1
    }

    pub fn remove(&mut self, index: usize) -> Option<Group> {
        if index < self.groups.len() {
            Some(self.groups.remove(index))
        } else {
            None
        }
    }

    /// The last group, creating an empty one when there is none.
    pub fn last_or_insert(&mut self) -> &mut Group {
        if self.groups.is_empty() {
            self.groups.push(Group::new());
        }
        let last = self.groups.len() - 1;
        &mut self.groups[last]
    }

    /// Total number of pairs across all groups.
    pub fn pair_count(&self) -> usize {
        self.groups.iter().map(Group::len).sum()
    }
}

impl FromIterator<Group> for Document {
    fn from_iter<I: IntoIterator<Item = Group>>(iter: I) -> Self {
        Self {
            groups: iter.into_iter().collect(),
        }
    }
}

/// Parse stored configuration text.
///
/// Never fails: blank lines and lines without `=` are dropped. The result
/// always holds at least one group.
pub fn parse(text: &str) -> Document {
    let mut doc = Document::new();
    doc.push(Group::new());

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if line == SEPARATOR {
            doc.push(Group::new());
            continue;
        }
        let Some((name, value)) = line.split_once('=') else {
            continue;
        };
        doc.last_or_insert().push(Pair::new(name.trim(), value.trim()));
    }

    doc
}

/// Serialize a document back into stored configuration text.
///
/// Pairs whose trimmed name is empty are omitted. The separator appears only
/// between groups, and no trailing line break is emitted.
pub fn serialize(doc: &Document) -> String {
    let mut lines: Vec<String> = Vec::with_capacity(doc.pair_count() + doc.len());

    for (index, group) in doc.groups().iter().enumerate() {
        if index > 0 {
            lines.push(SEPARATOR.to_string());
        }
        lines.extend(group.pairs().iter().filter_map(Pair::to_line));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(groups: &[&[(&str, &str)]]) -> Document {
        groups
            .iter()
            .map(|pairs| pairs.iter().map(|(n, v)| Pair::new(*n, *v)).collect())
            .collect()
    }

    #[test]
    fn test_parse_empty_input() {
        let parsed = parse("");
        assert_eq!(parsed.len(), 1);
        assert!(parsed.groups()[0].is_empty());
    }

    #[test]
    fn test_parse_skips_blank_lines() {
        let parsed = parse("a=1\n\nb=2");
        assert_eq!(parsed, doc(&[&[("a", "1"), ("b", "2")]]));
    }

    #[test]
    fn test_parse_drops_malformed_line() {
        let parsed = parse("novalue\nx=y");
        assert_eq!(parsed, doc(&[&[("x", "y")]]));
    }

    #[test]
    fn test_parse_splits_groups() {
        let parsed = parse("a=1\n__________________\nb=2");
        assert_eq!(parsed, doc(&[&[("a", "1")], &[("b", "2")]]));
    }

    #[test]
    fn test_parse_crlf_and_trimming() {
        let parsed = parse("  IP_CAMERA = 10.0.0.1:85 \r\nLOGIN=admin\r\n  __________________  \r\nx=\r\n");
        assert_eq!(
            parsed,
            doc(&[&[("IP_CAMERA", "10.0.0.1:85"), ("LOGIN", "admin")], &[("x", "")]])
        );
    }

    #[test]
    fn test_parse_splits_at_first_equals() {
        let parsed = parse("url=http://host/?a=b");
        assert_eq!(parsed, doc(&[&[("url", "http://host/?a=b")]]));
    }

    #[test]
    fn test_parse_separator_only_input() {
        let parsed = parse("__________________\n\n__________________");
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed.pair_count(), 0);
    }

    #[test]
    fn test_parse_keeps_duplicate_names() {
        let parsed = parse("k=1\nk=2");
        assert_eq!(parsed, doc(&[&[("k", "1"), ("k", "2")]]));
    }

    #[test]
    fn test_serialize_separator_placement() {
        let d = doc(&[&[("a", "1")], &[], &[("b", "2"), ("c", "")]]);
        let text = serialize(&d);
        assert_eq!(text, "a=1\n__________________\n__________________\nb=2\nc=");
        assert_eq!(text.lines().filter(|l| *l == SEPARATOR).count(), 2);
        assert!(!text.starts_with(SEPARATOR));
        assert!(!text.ends_with(SEPARATOR));
        assert!(!text.ends_with('\n'));
    }

    #[test]
    fn test_serialize_omits_cleared_names() {
        let d = doc(&[&[("k", ""), ("  ", "orphan"), ("keep", "")]]);
        assert_eq!(serialize(&d), "keep=");

        let mut d = doc(&[&[("k", "")]]);
        d.group_mut(0).unwrap().pair_mut(0).unwrap().name.clear();
        assert_eq!(serialize(&d), "");
    }

    #[test]
    fn test_serialize_trims_current_values() {
        let d = doc(&[&[(" name ", "  value ")]]);
        assert_eq!(serialize(&d), "name=value");
    }

    #[test]
    fn test_serialize_zero_groups() {
        assert_eq!(serialize(&Document::new()), "");
    }

    #[test]
    fn test_round_trip() {
        let d = doc(&[
            &[("IP_CAMERA", "192.168.0.77:85"), ("LOGIN", "admin"), ("PASSWORD", "")],
            &[],
            &[("IP_CAMERA", "192.168.0.74:85"), ("IP_CAMERA", "dup")],
        ]);
        assert_eq!(parse(&serialize(&d)), d);
    }

    #[test]
    fn test_reserialize_is_idempotent() {
        let d = doc(&[
            &[(" a ", " 1 "), ("", "dropped"), ("b=c", "d")],
            &[("x", "")],
        ]);
        let once = serialize(&d);
        assert_eq!(serialize(&parse(&once)), once);
    }
}
