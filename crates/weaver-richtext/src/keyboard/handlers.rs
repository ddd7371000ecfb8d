//! Built-in bindings.
//!
//! [`defaults`] are the named bindings a configuration may disable, in
//! priority order. [`always_on`] are registered after them and cover plain
//! Enter, Backspace and Delete.

use std::sync::Arc;

use serde_json::{Value, json};
use weaver_delta::attributes::{self, is_set};
use weaver_delta::{AttributeMap, Delta};

use super::binding::{Binding, BindingDescriptor, FormatPredicate, Handler, HandlerResult};
use super::context::DispatchContext;
use super::key::ModifierExpect::{Any, Pressed, Released};
use crate::config::Platform;
use crate::document::{Document, LineKind, SelectionRange, Source, TableContext};
use crate::error::DocumentError;
use crate::format::Scope;

/// Code block indentation unit.
pub const CODE_TAB: &str = "  ";

const LIST_MARKER: &str =
    r"^\s*?(\d+(\.|。)|-|\*|－|×|(\[|【) ?(\]|】)|(\[|【)x(\]|】))$";

/// Inline formats Enter does not carry onto the new line.
const NON_PERSISTENT: &[&str] = &["code", "link", "tag", "bookmark-link", "remark-link", "bookmark", "file"];

type Outcome = Result<HandlerResult, DocumentError>;

/// Wrap a handler body: document errors are logged and the key still
/// counts as handled.
fn guarded<F>(
    body: F,
) -> impl Fn(&mut dyn Document, SelectionRange, &DispatchContext, &Binding) -> HandlerResult + Send + Sync + 'static
where
    F: Fn(&mut dyn Document, SelectionRange, &DispatchContext) -> Outcome + Send + Sync + 'static,
{
    move |doc, range, cx, binding| match body(doc, range, cx) {
        Ok(result) => result,
        Err(error) => {
            tracing::warn!(target: "weaver::keyboard", binding = ?binding.name, %error, "binding failed");
            HandlerResult::Handled
        }
    }
}

fn handler<F>(body: F) -> Handler
where
    F: Fn(&mut dyn Document, SelectionRange, &DispatchContext) -> Outcome + Send + Sync + 'static,
{
    Arc::new(guarded(body))
}

fn map(value: Value) -> AttributeMap {
    match value {
        Value::Object(fields) => fields.into_iter().collect(),
        _ => AttributeMap::new(),
    }
}

fn indent_of(formats: &AttributeMap) -> Option<i64> {
    formats.get("indent").and_then(Value::as_i64)
}

fn active(formats: &AttributeMap, name: &str) -> bool {
    formats.get(name).is_some_and(|v| !v.is_null())
}

/// The named defaults, highest priority first.
pub fn defaults() -> Vec<(BindingDescriptor, Handler)> {
    let indented = || FormatPredicate::any_of(&["indent", "list"]);
    let mut bindings = vec![
        format_shortcut("bold"),
        format_shortcut("italic"),
        format_shortcut("underline"),
        (
            BindingDescriptor::key("Tab").named("indent").format(indented()),
            handler(|doc, _, cx| {
                if indent_of(&cx.format) == Some(8) {
                    return Ok(HandlerResult::Handled);
                }
                doc.format("indent", json!("+1"), Source::User)?;
                Ok(HandlerResult::Handled)
            }),
        ),
        (
            BindingDescriptor::key("Tab").named("indent2"),
            handler(|doc, _, cx| {
                if cx.collapsed {
                    return Ok(HandlerResult::Continue);
                }
                if indent_of(&cx.format) == Some(8) {
                    return Ok(HandlerResult::Handled);
                }
                doc.format("indent", json!("+1"), Source::User)?;
                Ok(HandlerResult::Handled)
            }),
        ),
        (
            BindingDescriptor::key("Tab").named("outdent").shift(Pressed).format(indented()),
            handler(|doc, _, _| {
                doc.format("indent", json!("-1"), Source::User)?;
                Ok(HandlerResult::Handled)
            }),
        ),
        (
            BindingDescriptor::key("Backspace")
                .named("outdent backspace")
                .any_modifiers()
                .collapsed(true)
                .offset(0)
                .format(indented()),
            handler(|doc, _, cx| {
                if active(&cx.format, "indent") {
                    if active(&cx.format, "header") {
                        doc.format("header", Value::Null, Source::User)?;
                    }
                    doc.format("indent", json!("-1"), Source::User)?;
                } else if active(&cx.format, "list") {
                    doc.format("list", Value::Bool(false), Source::User)?;
                }
                Ok(HandlerResult::Handled)
            }),
        ),
        code_block_tab(true),
        code_block_tab(false),
        (
            BindingDescriptor::key("Tab")
                .named("remove tab")
                .shift(Pressed)
                .collapsed(true)
                .prefix(r"\t$"),
            handler(|doc, range, _| {
                doc.delete_text(range.index.saturating_sub(1), 1, Source::User)?;
                Ok(HandlerResult::Handled)
            }),
        ),
        (
            BindingDescriptor::key("Tab").named("tab"),
            handler(|doc, range, cx| {
                if active(&cx.format, "table") {
                    return Ok(HandlerResult::Continue);
                }
                doc.history_cutoff();
                let change = Delta::new()
                    .retain(range.index, AttributeMap::new())
                    .delete(range.length)
                    .insert("\t", AttributeMap::new());
                doc.update_contents(&change, Source::User)?;
                doc.history_cutoff();
                doc.set_selection(SelectionRange::caret(range.index + 1), Source::Silent);
                Ok(HandlerResult::Handled)
            }),
        ),
        (
            BindingDescriptor::key("Enter")
                .named("blockquote empty enter")
                .collapsed(true)
                .empty(true)
                .format(FormatPredicate::any_of(&["blockquote"])),
            handler(|doc, _, _| {
                doc.format("blockquote", Value::Bool(false), Source::User)?;
                Ok(HandlerResult::Handled)
            }),
        ),
        (
            BindingDescriptor::key("Enter")
                .named("list empty enter")
                .collapsed(true)
                .empty(true)
                .format(FormatPredicate::any_of(&["list"])),
            handler(|doc, range, cx| {
                let mut formats = AttributeMap::from([("list".to_string(), Value::Null)]);
                if is_set(&cx.format, "indent") {
                    formats.insert("indent".to_string(), Value::Bool(false));
                }
                doc.format_line(range.index, range.length, &formats, Source::User)?;
                Ok(HandlerResult::Handled)
            }),
        ),
        (
            BindingDescriptor::key("Enter")
                .named("checklist enter")
                .collapsed(true)
                .format(FormatPredicate::any_of(&["list"])),
            handler(checklist_enter),
        ),
        (
            BindingDescriptor::key("Enter")
                .named("header enter")
                .collapsed(true)
                .suffix("^$")
                .format(FormatPredicate::any_of(&["header"])),
            handler(header_enter),
        ),
        (
            BindingDescriptor::key("Backspace")
                .named("table backspace")
                .collapsed(true)
                .offset(0)
                .format(FormatPredicate::any_of(&["table"])),
            handler(|_, _, _| Ok(HandlerResult::Handled)),
        ),
        (
            BindingDescriptor::key("Delete")
                .named("table delete")
                .collapsed(true)
                .suffix("^$")
                .format(FormatPredicate::any_of(&["table"])),
            handler(|_, _, _| Ok(HandlerResult::Handled)),
        ),
        (
            BindingDescriptor::key("Enter")
                .named("table enter")
                .shift(Any)
                .format(FormatPredicate::any_of(&["table"])),
            handler(table_enter),
        ),
        (
            BindingDescriptor::key("Tab")
                .named("table tab")
                .shift(Any)
                .format(FormatPredicate::any_of(&["table"])),
            handler(|doc, _, cx| {
                let cell = &cx.line;
                let target = if cx.event.shift {
                    cell.index.saturating_sub(1)
                } else {
                    cell.end()
                };
                doc.set_selection(SelectionRange::caret(target), Source::User);
                Ok(HandlerResult::Handled)
            }),
        ),
        (
            BindingDescriptor::key(" ")
                .named("list autofill")
                .shift(Any)
                .collapsed(true)
                .prefix(LIST_MARKER)
                .format(FormatPredicate::Exact(map(json!({
                    "list": false,
                    "code-block": false,
                    "blockquote": false,
                    "header": false,
                    "table": false,
                })))),
            handler(list_autofill),
        ),
        (
            BindingDescriptor::key("Enter")
                .named("code exit")
                .collapsed(true)
                .prefix("^$")
                .suffix(r"^\s*$")
                .format(FormatPredicate::any_of(&["code-block"])),
            handler(code_exit),
        ),
    ];
    for (key, shift) in [("ArrowLeft", false), ("ArrowLeft", true), ("ArrowRight", false), ("ArrowRight", true)] {
        bindings.push(embed_arrow(key, shift));
    }
    bindings.push(table_arrow(false));
    bindings.push(table_arrow(true));
    bindings
}

/// Bindings registered after the defaults, whatever the configuration.
pub fn always_on(platform: Platform) -> Vec<(BindingDescriptor, Handler)> {
    let mut backspace = BindingDescriptor::key("Backspace").named("backspace").collapsed(true);
    let mut delete = BindingDescriptor::key("Delete").named("delete").collapsed(true);
    if !platform.firefox {
        backspace = backspace.prefix("^.?$");
        delete = delete.suffix("^.?$");
    }
    vec![
        (
            BindingDescriptor::key("Enter").named("enter").shift(Any),
            handler(enter),
        ),
        (
            BindingDescriptor::key("Enter")
                .named("enter with modifiers")
                .meta(Any)
                .ctrl(Any)
                .alt(Any),
            handler(|_, _, _| Ok(HandlerResult::Handled)),
        ),
        (backspace, handler(backspace_at)),
        (delete, handler(delete_at)),
        (
            BindingDescriptor::key("Backspace").named("backspace range").collapsed(false),
            handler(delete_range),
        ),
        (
            BindingDescriptor::key("Delete").named("delete range").collapsed(false),
            handler(delete_range),
        ),
        (
            BindingDescriptor::key("Backspace")
                .named("backspace line start")
                .any_modifiers()
                .collapsed(true)
                .offset(0),
            handler(backspace_at),
        ),
    ]
}

fn format_shortcut(format: &'static str) -> (BindingDescriptor, Handler) {
    let key = &format[..1];
    (
        BindingDescriptor::key(key).named(format).short_key(),
        handler(move |doc, _, cx| {
            let value = !active(&cx.format, format);
            doc.format(format, Value::Bool(value), Source::User)?;
            Ok(HandlerResult::Handled)
        }),
    )
}

fn code_block_tab(indent: bool) -> (BindingDescriptor, Handler) {
    let (name, shift) = if indent {
        ("indent code-block", Released)
    } else {
        ("outdent code-block", Pressed)
    };
    let descriptor = BindingDescriptor::key("Tab")
        .named(name)
        .shift(shift)
        .format(FormatPredicate::Exact(map(json!({ "code-block": true }))));
    let body = move |doc: &mut dyn Document, range: SelectionRange, _: &DispatchContext| -> Outcome {
        let lines = doc.lines(range.index, range.length.max(1));
        let tab = CODE_TAB.chars().count();
        let (mut index, mut length) = (range.index, range.length);
        let mut change = Delta::new();
        let mut cursor = 0;
        for (i, line) in lines.iter().filter(|line| line.kind == LineKind::Text).enumerate() {
            if indent {
                change = change
                    .retain(line.index - cursor, AttributeMap::new())
                    .insert(CODE_TAB, AttributeMap::new());
                cursor = line.index;
                if i == 0 {
                    index += tab;
                } else {
                    length += tab;
                }
            } else if line.text().starts_with(CODE_TAB) {
                change = change.retain(line.index - cursor, AttributeMap::new()).delete(tab);
                cursor = line.index + tab;
                if i == 0 {
                    index = index.saturating_sub(tab);
                } else {
                    length = length.saturating_sub(tab);
                }
            }
        }
        if !change.is_empty() {
            doc.update_contents(&change, Source::User)?;
        }
        doc.set_selection(SelectionRange::new(index, length), Source::Silent);
        Ok(HandlerResult::Handled)
    };
    (descriptor, handler(body))
}

fn checklist_enter(doc: &mut dyn Document, range: SelectionRange, _: &DispatchContext) -> Outcome {
    let Some((line, offset)) = doc.line(range.index) else {
        return Ok(HandlerResult::Continue);
    };
    let checked = line
        .formats
        .get("list")
        .and_then(|list| list.get("value"))
        .and_then(Value::as_str)
        == Some("checked");
    if !checked {
        return Ok(HandlerResult::Continue);
    }
    let change = Delta::new()
        .retain(range.index, AttributeMap::new())
        .insert("\n", line.formats.clone())
        .retain(line.length - offset - 1, AttributeMap::new())
        .retain(1, map(json!({ "list": { "value": "unchecked" } })));
    doc.update_contents(&change, Source::User)?;
    doc.set_selection(SelectionRange::caret(range.index + 1), Source::Silent);
    doc.scroll_into_view();
    Ok(HandlerResult::Handled)
}

fn header_enter(doc: &mut dyn Document, range: SelectionRange, _: &DispatchContext) -> Outcome {
    let Some((line, offset)) = doc.line(range.index) else {
        return Ok(HandlerResult::Handled);
    };
    if line.fold("header") == Some("fold") {
        if let Some(last) = doc.fold_descendants(range.index).pop() {
            let mut formats = line.formats.clone();
            let level = line.header_level().map_or(Value::Null, Value::from);
            formats.insert("header".into(), json!({ "fold": "unfold", "value": level }));
            let change = Delta::new()
                .retain(last.end(), AttributeMap::new())
                .insert("\n", formats);
            doc.update_contents(&change, Source::User)?;
            doc.set_selection(SelectionRange::caret(last.end()), Source::Silent);
            doc.scroll_into_view();
            return Ok(HandlerResult::Handled);
        }
    }
    let mut rest = line.formats.clone();
    rest.insert("header".into(), Value::Null);
    let change = Delta::new()
        .retain(range.index, AttributeMap::new())
        .insert("\n", line.formats.clone())
        .retain(line.length - offset - 1, AttributeMap::new())
        .retain(1, rest);
    doc.update_contents(&change, Source::User)?;
    doc.set_selection(SelectionRange::caret(range.index + 1), Source::Silent);
    doc.scroll_into_view();
    Ok(HandlerResult::Handled)
}

/// Which side of a table Enter should open a line on: before (-1), after
/// (1), or neither.
fn table_side(table: &TableContext) -> Option<i8> {
    let position = &table.position;
    let first_row = position.row == 0;
    let last_row = position.row + 1 == position.rows.len();
    let row = position.row_range();
    let first_cell = position.cell == row.start;
    let last_cell = position.cell + 1 == row.end;
    if first_row && last_row {
        if first_cell && last_cell {
            return Some(if table.offset == 0 { -1 } else { 1 });
        }
        return Some(if first_cell { -1 } else { 1 });
    }
    if first_row {
        return Some(-1);
    }
    if last_row {
        return Some(1);
    }
    None
}

fn table_enter(doc: &mut dyn Document, range: SelectionRange, _: &DispatchContext) -> Outcome {
    let Some(table) = doc.table_at(range.index) else {
        return Ok(HandlerResult::Handled);
    };
    match table_side(&table) {
        Some(side) if side < 0 => {
            let change = Delta::new()
                .retain(table.table_index(), AttributeMap::new())
                .insert("\n", AttributeMap::new());
            doc.update_contents(&change, Source::User)?;
            doc.set_selection(SelectionRange::new(range.index + 1, range.length), Source::Silent);
        }
        Some(_) => {
            let index = table.table_end();
            let change = Delta::new()
                .retain(index, AttributeMap::new())
                .insert("\n", AttributeMap::new());
            doc.update_contents(&change, Source::User)?;
            doc.set_selection(SelectionRange::caret(index), Source::User);
        }
        None => {}
    }
    Ok(HandlerResult::Handled)
}

fn list_value(marker: &str) -> &'static str {
    match marker {
        "[]" | "[ ]" | "【】" | "【 】" => "unchecked",
        "[x]" | "【x】" => "checked",
        "-" | "*" | "×" | "－" => "bullet",
        _ => "ordered",
    }
}

fn list_autofill(doc: &mut dyn Document, range: SelectionRange, cx: &DispatchContext) -> Outcome {
    if doc.registry().query_name("list", None).is_none() {
        return Ok(HandlerResult::Continue);
    }
    let length = cx.prefix.chars().count();
    let Some((line, offset)) = doc.line(range.index) else {
        return Ok(HandlerResult::Continue);
    };
    if line.has_format("table-cell-line") || offset > length {
        return Ok(HandlerResult::Continue);
    }
    let value = list_value(cx.prefix.trim());
    doc.insert_text(range.index, " ", AttributeMap::new(), Source::User)?;
    doc.history_cutoff();
    let change = Delta::new()
        .retain(range.index - offset, AttributeMap::new())
        .delete(length + 1)
        .retain(line.length.saturating_sub(1 + offset), AttributeMap::new())
        .retain(1, map(json!({ "list": { "value": value } })));
    doc.update_contents(&change, Source::User)?;
    doc.history_cutoff();
    doc.set_selection(SelectionRange::caret(range.index - length), Source::Silent);
    Ok(HandlerResult::Handled)
}

fn code_exit(doc: &mut dyn Document, range: SelectionRange, cx: &DispatchContext) -> Outcome {
    let line = &cx.line;
    if !(line.is_empty() && line.has_format("code-block")) {
        return Ok(HandlerResult::Continue);
    }
    let change = Delta::new()
        .retain(range.index + line.length - cx.offset - 1, AttributeMap::new())
        .retain(1, map(json!({ "code-block": null })));
    doc.update_contents(&change, Source::User)?;
    doc.set_selection(SelectionRange::caret(range.index), Source::Silent);
    Ok(HandlerResult::Handled)
}

fn embed_arrow(key: &'static str, shift: bool) -> (BindingDescriptor, Handler) {
    let left = key == "ArrowLeft";
    let name = match (left, shift) {
        (true, false) => "embed left",
        (true, true) => "embed left shift",
        (false, false) => "embed right",
        (false, true) => "embed right shift",
    };
    let mut descriptor = BindingDescriptor::key(key)
        .named(name)
        .shift(if shift { Pressed } else { Released })
        .alt(Any);
    descriptor = if left { descriptor.prefix("^$") } else { descriptor.suffix("^$") };

    let body = move |doc: &mut dyn Document, range: SelectionRange, _: &DispatchContext| -> Outcome {
        let probe = if left { range.index } else { range.index + range.length + 1 };
        let next_to_embed = doc.leaf(probe).is_some_and(|(leaf, _)| leaf.is_embed());
        if !next_to_embed {
            return Ok(HandlerResult::Continue);
        }
        let selection = match (left, shift) {
            (true, true) => SelectionRange::new(range.index.saturating_sub(1), range.length + 1),
            (true, false) => SelectionRange::caret(range.index.saturating_sub(1)),
            (false, true) => SelectionRange::new(range.index, range.length + 1),
            (false, false) => SelectionRange::caret(range.end() + 1),
        };
        doc.set_selection(selection, Source::User);
        Ok(HandlerResult::Handled)
    };
    (descriptor, handler(body))
}

fn table_arrow(up: bool) -> (BindingDescriptor, Handler) {
    let descriptor = BindingDescriptor::key(if up { "ArrowUp" } else { "ArrowDown" })
        .named(if up { "table up" } else { "table down" })
        .collapsed(true)
        .format(FormatPredicate::any_of(&["table"]));
    let body = move |doc: &mut dyn Document, range: SelectionRange, _: &DispatchContext| -> Outcome {
        let Some(table) = doc.table_at(range.index) else {
            return Ok(HandlerResult::Handled);
        };
        let position = &table.position;
        let target_row = if up {
            position.row.checked_sub(1)
        } else {
            Some(position.row + 1).filter(|row| *row < position.rows.len())
        };
        let target = match target_row {
            Some(row) => {
                let cells = position.rows[row].clone();
                let cell = (cells.start + position.column()).min(cells.end - 1);
                let line = &table.lines[cell];
                Some(line.index + table.offset.min(line.length.saturating_sub(1)))
            }
            None if up => table.line_before().map(|line| line.terminator()),
            None => table.line_after().map(|line| line.index),
        };
        if let Some(index) = target {
            doc.set_selection(SelectionRange::caret(index), Source::User);
        }
        Ok(HandlerResult::Handled)
    };
    (descriptor, handler(body))
}

/// Split the line, carrying its block formats onto the new line and the
/// active inline formats onto the caret.
fn enter(doc: &mut dyn Document, range: SelectionRange, cx: &DispatchContext) -> Outcome {
    let registry = doc.registry();
    let mut line_formats: AttributeMap = cx
        .format
        .iter()
        .filter(|(name, value)| {
            name.as_str() != "file"
                && !value.is_array()
                && registry.query_name(name, Some(Scope::Block)).is_some()
        })
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    if let Some(Value::Object(list)) = line_formats.get_mut("list") {
        list.remove("id");
        list.insert("fold".into(), json!("unfold"));
    }

    let mut change = Delta::new()
        .retain(range.index, AttributeMap::new())
        .delete(range.length)
        .insert("\n", line_formats.clone());
    let mut caret = range.index + 1;
    if line_formats.contains_key("list") {
        let folded = doc
            .line(range.index)
            .is_some_and(|(line, _)| line.fold("list") == Some("fold"));
        if folded {
            let Some(last) = doc.fold_descendants(range.index).pop() else {
                return Ok(HandlerResult::Handled);
            };
            change = Delta::new()
                .retain(last.end(), AttributeMap::new())
                .insert("\n", line_formats.clone());
            caret = last.end();
        }
    }

    doc.update_contents(&change, Source::User)?;
    doc.set_selection(SelectionRange::caret(caret), Source::Silent);
    if line_formats.contains_key("header") {
        doc.format("header", Value::Null, Source::Api)?;
    }
    doc.focus();

    for (name, value) in &cx.format {
        if line_formats.contains_key(name) || value.is_array() || NON_PERSISTENT.contains(&name.as_str()) {
            continue;
        }
        doc.format(name, value.clone(), Source::User)?;
    }
    Ok(HandlerResult::Handled)
}

fn backspace_at(doc: &mut dyn Document, range: SelectionRange, cx: &DispatchContext) -> Outcome {
    if range.index == 0 || doc.length() <= 1 {
        return Ok(HandlerResult::Handled);
    }
    let line = &cx.line;
    let mut change = Delta::new()
        .retain(range.index - 1, AttributeMap::new())
        .delete(1);
    if cx.offset == 0 {
        if let Some((prev, _)) = doc.line(range.index - 1) {
            let prev_is_blank = prev.is_plain() && prev.length <= 1;
            if !prev_is_blank {
                let prev_formats = doc.format_at(range.index - 1, 1);
                let formats = attributes::diff(&line.formats, &prev_formats);
                if !formats.is_empty() {
                    // The merged line keeps this line's terminator.
                    let patch = Delta::new()
                        .retain(range.index + line.length - 2, AttributeMap::new())
                        .retain(1, formats);
                    change = change.compose(&patch);
                }
            }
        }
    }
    doc.update_contents(&change, Source::User)?;
    doc.focus();
    Ok(HandlerResult::Handled)
}

fn delete_at(doc: &mut dyn Document, range: SelectionRange, cx: &DispatchContext) -> Outcome {
    if range.index + 1 >= doc.length() {
        return Ok(HandlerResult::Handled);
    }
    let line = &cx.line;
    let mut formats = AttributeMap::new();
    let mut next_length = 0;
    if cx.offset + 1 >= line.length {
        if let Some((next, _)) = doc.line(range.index + 1) {
            if is_set(&next.formats, "table") {
                doc.set_selection(SelectionRange::caret(range.index + 1), Source::User);
                return Ok(HandlerResult::Handled);
            }
            // The next line's terminator survives the merge and keeps its
            // formats; only what the deleted terminator carried beyond this
            // line's formats is patched back.
            formats = attributes::diff(&line.formats, &doc.format_at(range.index, 1));
            next_length = next.length;
        }
    }
    doc.delete_text(range.index, 1, Source::User)?;
    if !formats.is_empty() {
        doc.format_line(range.index + next_length - 1, 1, &formats, Source::User)?;
    }
    Ok(HandlerResult::Handled)
}

/// Delete a range; the surviving line takes the first line's formats.
fn delete_range(doc: &mut dyn Document, range: SelectionRange, _: &DispatchContext) -> Outcome {
    let lines = doc.lines(range.index, range.length);
    let formats = match (lines.first(), lines.last()) {
        (Some(first), Some(last)) if lines.len() > 1 => attributes::diff(&last.formats, &first.formats),
        _ => AttributeMap::new(),
    };
    doc.delete_text(range.index, range.length, Source::User)?;
    if is_set(&formats, "table-col") || is_set(&formats, "table-cell-line") {
        return Ok(HandlerResult::Handled);
    }
    if !formats.is_empty() {
        doc.format_line(range.index, 1, &formats, Source::User)?;
    }
    doc.set_selection(SelectionRange::caret(range.index), Source::Silent);
    doc.focus();
    Ok(HandlerResult::Handled)
}
