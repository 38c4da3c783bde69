//! Editor session model
//!
//! An [`Editor`] owns the live [`Document`] for one editing session. All
//! mutations are append-only or removals; nothing is ever reordered. Groups
//! and pairs are addressed by their current position.

use serde::Serialize;
use tracing::debug;

use crate::document::{self, Document, Group, Pair};
use crate::error::{Error, Result};

/// Prefix of the ordinal label shown above each group.
pub const GROUP_LABEL_PREFIX: &str = "Intercom ";

/// Presentation state of one group header, derived from its live position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupHeader {
    pub index: usize,
    pub label: String,
    pub deletable: bool,
}

impl GroupHeader {
    fn at(index: usize) -> Self {
        Self {
            index,
            label: format!("{}{}", GROUP_LABEL_PREFIX, index),
            deletable: index != 0,
        }
    }
}

/// Mutable configuration editor.
#[derive(Debug, Clone)]
pub struct Editor {
    doc: Document,
}

impl Editor {
    /// Open an editor over stored configuration text.
    pub fn open(text: &str) -> Self {
        Self::from_document(document::parse(text))
    }

    /// Wrap a document. An empty document gets one empty group so there is
    /// always a place to add pairs.
    pub fn from_document(mut doc: Document) -> Self {
        if doc.is_empty() {
            doc.push(Group::new());
        }
        Self { doc }
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn group(&self, index: usize) -> Option<&Group> {
        self.doc.group(index)
    }

    /// The group new pairs go to by default. Always derived from the live
    /// document, never remembered across mutations.
    pub fn last_group_mut(&mut self) -> &mut Group {
        self.doc.last_or_insert()
    }

    /// Append a group, copying every pair of `template` when given.
    pub fn add_group(&mut self, template: Option<&Group>) -> usize {
        let group = template.cloned().unwrap_or_default();
        let index = self.doc.push(group);
        debug!(index, pairs = self.doc.groups()[index].len(), "added group");
        index
    }

    /// Append a copy of the group at `index`.
    pub fn duplicate_group(&mut self, index: usize) -> Result<usize> {
        let template = self
            .doc
            .group(index)
            .cloned()
            .ok_or_else(|| Error::not_found("group", index))?;
        Ok(self.add_group(Some(&template)))
    }

    /// Append a copy of the last group.
    pub fn duplicate_last_group(&mut self) -> usize {
        let template = self.last_group_mut().clone();
        self.add_group(Some(&template))
    }

    /// Remove a group with all its pairs.
    ///
    /// The first group is locked here as well as in the rendered form: its
    /// delete control is disabled, and the model refuses the same removal
    /// with [`Error::GroupLocked`] so that an editor never runs out of groups.
    pub fn remove_group(&mut self, index: usize) -> Result<Group> {
        if index >= self.doc.len() {
            return Err(Error::not_found("group", index));
        }
        if !GroupHeader::at(index).deletable {
            return Err(Error::GroupLocked(index));
        }
        let removed = self
            .doc
            .remove(index)
            .ok_or_else(|| Error::not_found("group", index))?;
        debug!(index, remaining = self.doc.len(), "removed group");
        Ok(removed)
    }

    /// Append a pair to the end of a group and return its index.
    pub fn add_pair(
        &mut self,
        group: usize,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<usize> {
        let target = self.group_mut(group)?;
        Ok(target.push(Pair::new(name, value)))
    }

    pub fn remove_pair(&mut self, group: usize, pair: usize) -> Result<Pair> {
        self.group_mut(group)?
            .remove(pair)
            .ok_or_else(|| Error::not_found("pair", format!("{}/{}", group, pair)))
    }

    /// Replace a pair's name. Clearing it removes the pair from the
    /// submitted text without removing the row.
    pub fn set_name(&mut self, group: usize, pair: usize, name: impl Into<String>) -> Result<()> {
        self.pair_mut(group, pair)?.name = name.into();
        Ok(())
    }

    pub fn set_value(&mut self, group: usize, pair: usize, value: impl Into<String>) -> Result<()> {
        self.pair_mut(group, pair)?.value = value.into();
        Ok(())
    }

    /// Header labels and delete-control state for every group.
    pub fn headers(&self) -> Vec<GroupHeader> {
        (0..self.doc.len()).map(GroupHeader::at).collect()
    }

    /// Serialized text of the current state without ending the session.
    pub fn preview(&self) -> String {
        document::serialize(&self.doc)
    }

    /// End the session and produce the text handed to the backend.
    pub fn submit(self) -> String {
        document::serialize(&self.doc)
    }

    fn group_mut(&mut self, index: usize) -> Result<&mut Group> {
        self.doc
            .group_mut(index)
            .ok_or_else(|| Error::not_found("group", index))
    }

    fn pair_mut(&mut self, group: usize, pair: usize) -> Result<&mut Pair> {
        self.group_mut(group)?
            .pair_mut(pair)
            .ok_or_else(|| Error::not_found("pair", format!("{}/{}", group, pair)))
    }
}

impl Default for Editor {
    fn default() -> Self {
        Self::from_document(Document::new())
    }
}
