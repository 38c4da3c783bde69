//! Server-side HTML rendering

use autotest_common::view::{self, EditorView, TreeBuilder};

/// Elements rendered without a closing tag.
const VOID_ELEMENTS: &[&str] = &["br", "hr", "img", "input", "link", "meta"];

/// [`TreeBuilder`] producing HTML strings.
#[derive(Debug, Default)]
pub struct HtmlBuilder;

impl TreeBuilder for HtmlBuilder {
    type Node = String;

    fn element(&mut self, tag: &str, attrs: &[(&str, String)], children: Vec<String>) -> String {
        let mut out = String::with_capacity(64 + children.iter().map(String::len).sum::<usize>());
        out.push('<');
        out.push_str(tag);
        for (name, value) in attrs {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            out.push_str(&escape(value));
            out.push('"');
        }
        out.push('>');

        if VOID_ELEMENTS.contains(&tag) {
            return out;
        }

        for child in children {
            out.push_str(&child);
        }
        out.push_str("</");
        out.push_str(tag);
        out.push('>');
        out
    }

    fn text(&mut self, content: &str) -> String {
        escape(content)
    }
}

/// Escape text for use in element content and quoted attributes.
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Editor form markup for a view.
pub fn editor_fragment(view: &EditorView) -> String {
    view::render(view, &mut HtmlBuilder)
}

/// Full configuration page around an editor session. `stored` prefills the
/// plain form field so a save without scripting keeps the text unchanged.
pub fn config_page(session_id: &str, view: &EditorView, stored: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>AutoTest - Configuration</title>
<link rel="stylesheet" href="/static/style.css">
</head>
<body>
<nav><a href="/">Runs</a> | <a href="/config">Configuration</a> | <a href="/logs">Logs</a> | <a href="/firmware">Firmware</a></nav>
<h1>Intercom configuration</h1>
<div id="editor" data-session="{session}">{editor}</div>
<form id="config-form" method="post" action="/config">
<input type="hidden" name="config" id="config-field" value="{stored}">
<button type="submit" id="save-btn">Save</button>
</form>
<p id="editor-status"></p>
<script src="/static/config.js"></script>
</body>
</html>
"#,
        session = escape(session_id),
        editor = editor_fragment(view),
        stored = escape(stored),
    )
}
