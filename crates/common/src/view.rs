//! Editor projection
//!
//! The rendered editor is a pure function of the [`Editor`] state. A
//! [`EditorView`] captures what is displayed; [`render`] walks it through any
//! [`TreeBuilder`] so the same form can be produced as HTML, as a test tree,
//! or as nodes of another UI library.

use serde::Serialize;

use crate::editor::{Editor, GroupHeader};

/// One editable row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowView {
    pub index: usize,
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupView {
    pub header: GroupHeader,
    pub rows: Vec<RowView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditorView {
    pub groups: Vec<GroupView>,
}

impl EditorView {
    /// Snapshot the editor for display.
    pub fn project(editor: &Editor) -> Self {
        let groups = editor
            .headers()
            .into_iter()
            .zip(editor.document().groups())
            .map(|(header, group)| GroupView {
                header,
                rows: group
                    .pairs()
                    .iter()
                    .enumerate()
                    .map(|(index, pair)| RowView {
                        index,
                        name: pair.name.clone(),
                        value: pair.value.clone(),
                    })
                    .collect(),
            })
            .collect();

        Self { groups }
    }
}

/// Node construction capability of a UI toolkit.
pub trait TreeBuilder {
    type Node;

    fn element(&mut self, tag: &str, attrs: &[(&str, String)], children: Vec<Self::Node>) -> Self::Node;

    fn text(&mut self, content: &str) -> Self::Node;
}

/// Build the editor form.
///
/// Controls carry `data-action`, `data-group` and `data-pair` attributes that
/// the page script maps back to editor operations.
pub fn render<B: TreeBuilder>(view: &EditorView, builder: &mut B) -> B::Node {
    let mut children: Vec<B::Node> = view
        .groups
        .iter()
        .map(|group| render_group(group, builder))
        .collect();

    let add_group = button(builder, "add-group", None, None, "Add intercom", false);
    let duplicate = button(builder, "duplicate-group", None, None, "Copy last intercom", false);
    children.push(builder.element("div", &[("class", "editor-actions".to_string())], vec![add_group, duplicate]));

    builder.element("div", &[("class", "config-editor".to_string())], children)
}

fn render_group<B: TreeBuilder>(group: &GroupView, builder: &mut B) -> B::Node {
    let index = group.header.index;

    let label = builder.text(&group.header.label);
    let title = builder.element("h3", &[("class", "group-label".to_string())], vec![label]);
    let remove = button(
        builder,
        "remove-group",
        Some(index),
        None,
        "Delete intercom",
        !group.header.deletable,
    );
    let header = builder.element("div", &[("class", "group-header".to_string())], vec![title, remove]);

    let mut children = vec![header];
    for row in &group.rows {
        children.push(render_row(index, row, builder));
    }
    children.push(button(builder, "add-pair", Some(index), None, "Add parameter", false));

    builder.element(
        "fieldset",
        &[
            ("class", "config-group".to_string()),
            ("data-group", index.to_string()),
        ],
        children,
    )
}

fn render_row<B: TreeBuilder>(group: usize, row: &RowView, builder: &mut B) -> B::Node {
    let name = field(builder, "name", group, row.index, &row.name);
    let value = field(builder, "value", group, row.index, &row.value);
    let remove = button(builder, "remove-pair", Some(group), Some(row.index), "Remove", false);

    builder.element(
        "div",
        &[
            ("class", "config-row".to_string()),
            ("data-group", group.to_string()),
            ("data-pair", row.index.to_string()),
        ],
        vec![name, value, remove],
    )
}

fn field<B: TreeBuilder>(builder: &mut B, kind: &str, group: usize, pair: usize, value: &str) -> B::Node {
    builder.element(
        "input",
        &[
            ("type", "text".to_string()),
            ("class", format!("pair-{}", kind)),
            ("data-field", kind.to_string()),
            ("data-group", group.to_string()),
            ("data-pair", pair.to_string()),
            ("value", value.to_string()),
        ],
        Vec::new(),
    )
}

fn button<B: TreeBuilder>(
    builder: &mut B,
    action: &str,
    group: Option<usize>,
    pair: Option<usize>,
    label: &str,
    disabled: bool,
) -> B::Node {
    let mut attrs = vec![
        ("type", "button".to_string()),
        ("data-action", action.to_string()),
    ];
    if let Some(group) = group {
        attrs.push(("data-group", group.to_string()));
    }
    if let Some(pair) = pair {
        attrs.push(("data-pair", pair.to_string()));
    }
    if disabled {
        attrs.push(("disabled", "disabled".to_string()));
        attrs.push(("hidden", "hidden".to_string()));
    }

    let text = builder.text(label);
    builder.element("button", &attrs, vec![text])
}
