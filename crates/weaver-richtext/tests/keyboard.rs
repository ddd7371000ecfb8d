use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use weaver_richtext::keyboard::IME_PROCESS_CODE;
use weaver_richtext::{
    AttributeMap, Delta, DeltaDocument, Document, KeyEvent, Keyboard, KeyboardConfig, Platform, Schema, SelectionRange,
};

fn document(ops: Value, selection: SelectionRange) -> DeltaDocument {
    let contents: Delta = serde_json::from_value(json!({ "ops": ops })).unwrap();
    DeltaDocument::new(contents, Arc::new(Schema::standard())).with_selection(selection)
}

/// One op per line, as JSON.
fn render(doc: &DeltaDocument) -> String {
    doc.contents()
        .ops
        .iter()
        .map(|op| serde_json::to_string(op).unwrap())
        .collect::<Vec<_>>()
        .join("\n")
}

fn press(keyboard: &Keyboard, doc: &mut DeltaDocument, mut event: KeyEvent) -> Option<String> {
    let outcome = keyboard.dispatch(doc, &mut event);
    assert_eq!(outcome.prevented, event.default_prevented());
    outcome.handled_by.map(|name| name.to_string())
}

#[test]
fn checked_item_enter_starts_unchecked_item() {
    let keyboard = Keyboard::default();
    let mut doc = document(
        json!([
            { "insert": "task" },
            { "insert": "\n", "attributes": { "list": { "value": "checked" } } },
        ]),
        SelectionRange::caret(4),
    );
    assert_eq!(press(&keyboard, &mut doc, KeyEvent::new("Enter")).as_deref(), Some("checklist enter"));
    insta::assert_snapshot!(render(&doc), @r#"
    {"insert":"task"}
    {"insert":"\n","attributes":{"list":{"value":"checked"}}}
    {"insert":"\n","attributes":{"list":{"value":"unchecked"}}}
    "#);
    assert_eq!(doc.selection(), Some(SelectionRange::caret(5)));
}

#[test]
fn enter_splits_and_ignores_shift() {
    let keyboard = Keyboard::default();
    let mut doc = document(json!([{ "insert": "ab\n" }]), SelectionRange::caret(1));
    assert_eq!(press(&keyboard, &mut doc, KeyEvent::new("Enter").shift()).as_deref(), Some("enter"));
    assert_eq!(doc.contents().to_text(), "a\nb\n");
    assert_eq!(doc.selection(), Some(SelectionRange::caret(2)));
}

#[test]
fn enter_carries_inline_formats_to_the_caret() {
    let keyboard = Keyboard::default();
    let mut doc = document(
        json!([
            { "insert": "ab", "attributes": { "bold": true, "link": "https://x.test" } },
            { "insert": "\n" },
        ]),
        SelectionRange::caret(2),
    );
    press(&keyboard, &mut doc, KeyEvent::new("Enter"));
    assert_eq!(doc.contents().to_text(), "ab\n\n");
    assert_eq!(doc.cursor_formats(), AttributeMap::from([("bold".to_string(), json!(true))]));
}

#[test]
fn header_enter_opens_a_plain_line() {
    let keyboard = Keyboard::default();
    let mut doc = document(
        json!([
            { "insert": "Title" },
            { "insert": "\n", "attributes": { "header": 1 } },
        ]),
        SelectionRange::caret(5),
    );
    assert_eq!(press(&keyboard, &mut doc, KeyEvent::new("Enter")).as_deref(), Some("header enter"));
    insta::assert_snapshot!(render(&doc), @r#"
    {"insert":"Title"}
    {"insert":"\n","attributes":{"header":1}}
    {"insert":"\n"}
    "#);
}

#[test]
fn enter_on_empty_list_item_leaves_the_list() {
    let keyboard = Keyboard::default();
    let mut doc = document(
        json!([
            { "insert": "a" },
            { "insert": "\n", "attributes": { "list": { "value": "bullet" } } },
            { "insert": "\n", "attributes": { "list": { "value": "bullet" } } },
        ]),
        SelectionRange::caret(2),
    );
    assert_eq!(press(&keyboard, &mut doc, KeyEvent::new("Enter")).as_deref(), Some("list empty enter"));
    insta::assert_snapshot!(render(&doc), @r#"
    {"insert":"a"}
    {"insert":"\n","attributes":{"list":{"value":"bullet"}}}
    {"insert":"\n"}
    "#);
}

#[test]
fn backspace_at_line_start_merges_into_previous_line() {
    let keyboard = Keyboard::default();
    let mut doc = document(
        json!([
            { "insert": "a" },
            { "insert": "\n", "attributes": { "header": 1 } },
            { "insert": "b" },
            { "insert": "\n", "attributes": { "blockquote": true } },
        ]),
        SelectionRange::caret(2),
    );
    assert_eq!(press(&keyboard, &mut doc, KeyEvent::new("Backspace")).as_deref(), Some("backspace"));
    insta::assert_snapshot!(render(&doc), @r#"
    {"insert":"ab"}
    {"insert":"\n","attributes":{"header":1}}
    "#);
    assert_eq!(doc.selection(), Some(SelectionRange::caret(1)));
}

#[test]
fn delete_at_line_end_keeps_the_next_lines_formats() {
    let keyboard = Keyboard::default();
    let mut doc = document(
        json!([
            { "insert": "a" },
            { "insert": "\n", "attributes": { "header": 1 } },
            { "insert": "b" },
            { "insert": "\n", "attributes": { "blockquote": true } },
        ]),
        SelectionRange::caret(1),
    );
    assert_eq!(press(&keyboard, &mut doc, KeyEvent::new("Delete")).as_deref(), Some("delete"));
    insta::assert_snapshot!(render(&doc), @r#"
    {"insert":"ab"}
    {"insert":"\n","attributes":{"blockquote":true}}
    "#);
    assert_eq!(doc.selection(), Some(SelectionRange::caret(1)));
}

#[test]
fn delete_on_an_empty_line_only_removes_it() {
    let keyboard = Keyboard::default();
    let mut doc = document(
        json!([
            { "insert": "\nTitle" },
            { "insert": "\n", "attributes": { "header": 1 } },
        ]),
        SelectionRange::caret(0),
    );
    assert_eq!(press(&keyboard, &mut doc, KeyEvent::new("Delete")).as_deref(), Some("delete"));
    insta::assert_snapshot!(render(&doc), @r#"
    {"insert":"Title"}
    {"insert":"\n","attributes":{"header":1}}
    "#);
}

#[test]
fn delete_before_a_table_steps_into_it() {
    let keyboard = Keyboard::default();
    let mut doc = document(
        json!([
            { "insert": "x\na" },
            { "insert": "\n", "attributes": { "table": "r1" } },
            { "insert": "b" },
            { "insert": "\n", "attributes": { "table": "r1" } },
        ]),
        SelectionRange::caret(1),
    );
    assert_eq!(press(&keyboard, &mut doc, KeyEvent::new("Delete")).as_deref(), Some("delete"));
    insta::assert_snapshot!(render(&doc), @r#"
    {"insert":"x\na"}
    {"insert":"\n","attributes":{"table":"r1"}}
    {"insert":"b"}
    {"insert":"\n","attributes":{"table":"r1"}}
    "#);
    assert_eq!(doc.selection(), Some(SelectionRange::caret(2)));
}

#[test]
fn deleting_a_range_keeps_the_first_lines_formats() {
    let keyboard = Keyboard::default();
    let mut doc = document(
        json!([
            { "insert": "ab" },
            { "insert": "\n", "attributes": { "header": 1 } },
            { "insert": "cd" },
            { "insert": "\n", "attributes": { "blockquote": true } },
        ]),
        SelectionRange::new(1, 3),
    );
    assert_eq!(press(&keyboard, &mut doc, KeyEvent::new("Backspace")).as_deref(), Some("backspace range"));
    insta::assert_snapshot!(render(&doc), @r#"
    {"insert":"ad"}
    {"insert":"\n","attributes":{"header":1}}
    "#);
    assert_eq!(doc.selection(), Some(SelectionRange::caret(1)));
}

#[test]
fn ime_keys_are_ignored() {
    let keyboard = Keyboard::default();
    let mut doc = document(json!([{ "insert": "ab\n" }]), SelectionRange::caret(1));
    assert_eq!(press(&keyboard, &mut doc, KeyEvent::new("Enter").with_which(IME_PROCESS_CODE)), None);
    assert_eq!(press(&keyboard, &mut doc, KeyEvent::new("Backspace").composing()), None);
    assert_eq!(doc.contents().to_text(), "ab\n");
}

#[test]
fn short_key_is_platform_dependent() {
    let mac = Keyboard::new(KeyboardConfig {
        platform: Platform { mac: true, firefox: false },
        ..KeyboardConfig::default()
    });
    let mut doc = document(json!([{ "insert": "ab\n" }]), SelectionRange::new(0, 2));
    assert_eq!(press(&mac, &mut doc, KeyEvent::new("i").ctrl()), None);
    assert_eq!(press(&mac, &mut doc, KeyEvent::new("i").meta()).as_deref(), Some("italic"));
    insta::assert_snapshot!(render(&doc), @r#"
    {"insert":"ab","attributes":{"italic":true}}
    {"insert":"\n"}
    "#);
}

#[test]
fn list_autofill_from_markers() {
    let keyboard = Keyboard::default();
    let cases = [
        ("1.", "ordered"),
        ("-", "bullet"),
        ("[]", "unchecked"),
        ("[x]", "checked"),
    ];
    for (marker, value) in cases {
        let len = marker.chars().count();
        let mut doc = document(json!([{ "insert": format!("{marker}abc\n") }]), SelectionRange::caret(len));
        assert_eq!(press(&keyboard, &mut doc, KeyEvent::new(" ")).as_deref(), Some("list autofill"), "{marker}");
        let lines = doc.all_lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text(), "abc");
        assert_eq!(lines[0].formats.get("list"), Some(&json!({ "value": value })), "{marker}");
        assert_eq!(doc.selection(), Some(SelectionRange::caret(0)));
        assert_eq!(doc.cutoffs(), 2);
    }

    let mut plain = document(json!([{ "insert": "a-\n" }]), SelectionRange::caret(2));
    assert_eq!(press(&keyboard, &mut plain, KeyEvent::new(" ")), None);
}

#[test]
fn autofill_skips_existing_lists() {
    let keyboard = Keyboard::default();
    let mut doc = document(
        json!([
            { "insert": "1." },
            { "insert": "\n", "attributes": { "list": { "value": "bullet" } } },
        ]),
        SelectionRange::caret(2),
    );
    assert_eq!(press(&keyboard, &mut doc, KeyEvent::new(" ")), None);
}

#[test]
fn tab_indents_lists_and_shift_tab_outdents() {
    let keyboard = Keyboard::default();
    let mut doc = document(
        json!([
            { "insert": "a" },
            { "insert": "\n", "attributes": { "list": { "value": "bullet" } } },
        ]),
        SelectionRange::caret(1),
    );
    assert_eq!(press(&keyboard, &mut doc, KeyEvent::new("Tab")).as_deref(), Some("indent"));
    insta::assert_snapshot!(render(&doc), @r#"
    {"insert":"a"}
    {"insert":"\n","attributes":{"indent":1,"list":{"value":"bullet"}}}
    "#);
    assert_eq!(press(&keyboard, &mut doc, KeyEvent::new("Tab").shift()).as_deref(), Some("outdent"));
    insta::assert_snapshot!(render(&doc), @r#"
    {"insert":"a"}
    {"insert":"\n","attributes":{"list":{"value":"bullet"}}}
    "#);
}

#[test]
fn tab_in_plain_text_inserts_a_tab() {
    let keyboard = Keyboard::default();
    let mut doc = document(json!([{ "insert": "ab\n" }]), SelectionRange::caret(1));
    assert_eq!(press(&keyboard, &mut doc, KeyEvent::new("Tab")).as_deref(), Some("tab"));
    assert_eq!(doc.contents().to_text(), "a\tb\n");
    assert_eq!(doc.selection(), Some(SelectionRange::caret(2)));

    assert_eq!(press(&keyboard, &mut doc, KeyEvent::new("Tab").shift()).as_deref(), Some("remove tab"));
    assert_eq!(doc.contents().to_text(), "ab\n");
}

#[test]
fn code_block_tab_indents_with_spaces() {
    let keyboard = Keyboard::default();
    let mut doc = document(
        json!([
            { "insert": "ab" },
            { "insert": "\n", "attributes": { "code-block": true } },
        ]),
        SelectionRange::caret(1),
    );
    assert_eq!(press(&keyboard, &mut doc, KeyEvent::new("Tab")).as_deref(), Some("indent code-block"));
    assert_eq!(doc.contents().to_text(), "  ab\n");
    assert_eq!(doc.selection(), Some(SelectionRange::caret(3)));

    assert_eq!(press(&keyboard, &mut doc, KeyEvent::new("Tab").shift()).as_deref(), Some("outdent code-block"));
    assert_eq!(doc.contents().to_text(), "ab\n");
    assert_eq!(doc.selection(), Some(SelectionRange::caret(1)));
}

#[test]
fn enter_on_empty_code_line_exits_the_block() {
    let keyboard = Keyboard::default();
    let mut doc = document(
        json!([
            { "insert": "x" },
            { "insert": "\n\n", "attributes": { "code-block": true } },
        ]),
        SelectionRange::caret(2),
    );
    assert_eq!(press(&keyboard, &mut doc, KeyEvent::new("Enter")).as_deref(), Some("code exit"));
    insta::assert_snapshot!(render(&doc), @r#"
    {"insert":"x"}
    {"insert":"\n","attributes":{"code-block":true}}
    {"insert":"\n"}
    "#);
    assert_eq!(doc.selection(), Some(SelectionRange::caret(2)));
}

#[test]
fn arrows_step_over_embeds() {
    let keyboard = Keyboard::default();
    let ops = json!([
        { "insert": "a" },
        { "insert": { "image": "x.png" } },
        { "insert": "b\n" },
    ]);

    let mut doc = document(ops.clone(), SelectionRange::caret(2));
    assert_eq!(press(&keyboard, &mut doc, KeyEvent::new("ArrowLeft")).as_deref(), Some("embed left"));
    assert_eq!(doc.selection(), Some(SelectionRange::caret(1)));

    let mut doc = document(ops.clone(), SelectionRange::caret(1));
    assert_eq!(press(&keyboard, &mut doc, KeyEvent::new("ArrowRight")).as_deref(), Some("embed right"));
    assert_eq!(doc.selection(), Some(SelectionRange::caret(2)));

    let mut doc = document(ops.clone(), SelectionRange::caret(1));
    assert_eq!(
        press(&keyboard, &mut doc, KeyEvent::new("ArrowRight").shift()).as_deref(),
        Some("embed right shift")
    );
    assert_eq!(doc.selection(), Some(SelectionRange::new(1, 1)));

    let mut doc = document(ops, SelectionRange::caret(0));
    assert_eq!(press(&keyboard, &mut doc, KeyEvent::new("ArrowRight")), None);
}

fn table() -> Value {
    json!([
        { "insert": "a" },
        { "insert": "\n", "attributes": { "table": "r1" } },
        { "insert": "b" },
        { "insert": "\n", "attributes": { "table": "r1" } },
        { "insert": "c" },
        { "insert": "\n", "attributes": { "table": "r2" } },
        { "insert": "d" },
        { "insert": "\n", "attributes": { "table": "r2" } },
        { "insert": "z\n" },
    ])
}

#[test]
fn arrows_move_between_table_rows() {
    let keyboard = Keyboard::default();
    let mut doc = document(table(), SelectionRange::caret(2));
    assert_eq!(press(&keyboard, &mut doc, KeyEvent::new("ArrowDown")).as_deref(), Some("table down"));
    assert_eq!(doc.selection(), Some(SelectionRange::caret(6)));

    press(&keyboard, &mut doc, KeyEvent::new("ArrowDown"));
    assert_eq!(doc.selection(), Some(SelectionRange::caret(8)));

    let mut doc = document(table(), SelectionRange::caret(7));
    assert_eq!(press(&keyboard, &mut doc, KeyEvent::new("ArrowUp")).as_deref(), Some("table up"));
    assert_eq!(doc.selection(), Some(SelectionRange::caret(3)));

    let mut doc = document(table(), SelectionRange::caret(0));
    assert_eq!(press(&keyboard, &mut doc, KeyEvent::new("ArrowUp")).as_deref(), Some("table up"));
    assert_eq!(doc.selection(), Some(SelectionRange::caret(0)));
}

#[test]
fn tab_walks_table_cells() {
    let keyboard = Keyboard::default();
    let mut doc = document(table(), SelectionRange::caret(0));
    assert_eq!(press(&keyboard, &mut doc, KeyEvent::new("Tab")).as_deref(), Some("table tab"));
    assert_eq!(doc.selection(), Some(SelectionRange::caret(2)));
    press(&keyboard, &mut doc, KeyEvent::new("Tab").shift());
    assert_eq!(doc.selection(), Some(SelectionRange::caret(1)));
}

#[test]
fn enter_in_first_row_opens_a_line_before_the_table() {
    let keyboard = Keyboard::default();
    let mut doc = document(table(), SelectionRange::caret(0));
    assert_eq!(press(&keyboard, &mut doc, KeyEvent::new("Enter")).as_deref(), Some("table enter"));
    assert_eq!(doc.contents().to_text(), "\na\nb\nc\nd\nz\n");
    assert_eq!(doc.all_lines()[0].formats.get("table"), None);
    assert_eq!(doc.selection(), Some(SelectionRange::caret(1)));

    let mut doc = document(table(), SelectionRange::caret(5));
    press(&keyboard, &mut doc, KeyEvent::new("Enter"));
    assert_eq!(doc.contents().to_text(), "a\nb\nc\nd\n\nz\n");
    assert_eq!(doc.selection(), Some(SelectionRange::caret(8)));
}

#[test]
fn table_cells_swallow_merging_keys() {
    let keyboard = Keyboard::default();
    let mut doc = document(table(), SelectionRange::caret(2));
    assert_eq!(press(&keyboard, &mut doc, KeyEvent::new("Backspace")).as_deref(), Some("table backspace"));
    let mut doc = document(table(), SelectionRange::caret(1));
    assert_eq!(press(&keyboard, &mut doc, KeyEvent::new("Delete")).as_deref(), Some("table delete"));
    assert_eq!(doc.contents().to_text(), "a\nb\nc\nd\nz\n");
}
