use inai_markup::{
    apply_mutation, inspect, mutate, parse_fragment, try_apply_mutation, try_mutate,
    ElementMutation, ElementPath, MarkupError, Preset, MAX_NESTING_DEPTH,
};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::PathBuf;

fn fixture(filename: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("fixtures");
    path.push(filename);
    fs::read_to_string(&path).unwrap()
}

fn path(p: &[usize]) -> ElementPath {
    ElementPath::from(p)
}

#[test]
fn test_round_trip_landing_document() {
    let src = fixture("landing.html");
    assert_eq!(parse_fragment(&src).unwrap().to_html(), src);
}

#[test]
fn test_round_trip_truncated_output() {
    let src = fixture("truncated.html");
    assert_eq!(parse_fragment(&src).unwrap().to_html(), src);
}

#[test]
fn test_text_edit_of_nested_heading() {
    let out = apply_mutation(
        "<div><h1>Hi</h1><p>Lo</p></div>",
        &path(&[0, 0]),
        &ElementMutation::Text {
            value: "Hello".into(),
        },
    );
    assert_eq!(out, "<div><h1>Hello</h1><p>Lo</p></div>");
}

#[test]
fn test_invalid_paths_leave_markup_unchanged() {
    let src = "<div><h1>Hi</h1><p>Lo</p></div>";
    for p in [&[1][..], &[0, 2], &[0, 0, 0], &[9, 9, 9], &[]] {
        let out = mutate(src, &path(p), |el| el.set_text("changed"));
        assert_eq!(out, src, "path {:?}", p);
    }
}

#[test]
fn test_paths_start_at_body() {
    let src = fixture("landing.html");
    let snap = inspect(&src, &path(&[1, 2])).unwrap();
    assert_eq!(snap.tag_name, "BUTTON");
    assert_eq!(snap.text_content, "Order now");
    assert_eq!(snap.class_names, "btn primary");

    assert_eq!(inspect(&src, &path(&[0])).unwrap().tag_name, "NAV");
}

#[test]
fn test_text_edit_touches_only_target() {
    let src = fixture("landing.html");
    let out = apply_mutation(
        &src,
        &path(&[1, 2]),
        &ElementMutation::Text {
            value: "Buy".into(),
        },
    );
    assert_eq!(out, src.replace(">Order now<", ">Buy<"));
}

#[test]
fn test_style_edit_rewrites_only_the_start_tag() {
    let src = fixture("landing.html");
    let out = apply_mutation(
        &src,
        &path(&[1]),
        &ElementMutation::Style {
            property: "opacity".into(),
            value: "50".into(),
        },
    );
    let expected = src.replace(
        "<section id=\"hero\" class='hero  min-h-screen' data-animate>",
        "<section id=\"hero\" class=\"hero  min-h-screen\" data-animate style=\"opacity: 0.5\">",
    );
    assert_eq!(out, expected);
}

#[test]
fn test_implied_list_items_are_addressable() {
    let src = fixture("landing.html");
    let snap = inspect(&src, &path(&[0, 1, 1])).unwrap();
    assert_eq!(snap.tag_name, "LI");
    assert_eq!(snap.text_content.trim(), "Contact");
}

#[test]
fn test_edit_inside_truncated_output() {
    let src = fixture("truncated.html");
    let out = apply_mutation(
        &src,
        &path(&[0, 0]),
        &ElementMutation::Text {
            value: "Plans".into(),
        },
    );
    assert_eq!(out, src.replace("Pricing", "Plans"));
}

#[test]
fn test_preset_then_inspect() {
    let src = "<main><div class=\"card\">x</div></main>";
    let out = apply_mutation(
        src,
        &path(&[0, 0]),
        &ElementMutation::Preset {
            value: Preset::HoverScale,
        },
    );
    assert_eq!(
        out,
        "<main><div class=\"card inai-hover-scale\" style=\"transition: transform 0.2s ease\">x</div></main>"
    );
    assert_eq!(
        inspect(&out, &path(&[0, 0])).unwrap().class_names,
        "card inai-hover-scale"
    );
}

#[test]
fn test_json_mutation_sequence() {
    let mutations: Vec<ElementMutation> = serde_json::from_str(
        r##"[
            {"type":"classes","value":"title inai-selected"},
            {"type":"style","property":"color","value":"#0f172a"},
            {"type":"align","value":"center"},
            {"type":"preset","value":"shadow"}
        ]"##,
    )
    .unwrap();
    let mut html = "<header><h1>Bloom</h1></header>".to_string();
    for m in &mutations {
        html = try_apply_mutation(&html, &path(&[0, 0]), m).unwrap();
    }
    let frag = parse_fragment(&html).unwrap();
    let h1 = path(&[0, 0]).resolve(&frag).unwrap();
    assert_eq!(h1.class_list(), vec!["title"]);
    let style = h1.style();
    assert_eq!(style.get("color"), Some("#0f172a"));
    assert_eq!(style.get("text-align"), Some("center"));
    assert!(style.contains("box-shadow"));
}

#[test]
fn test_failure_reasons_are_reported() {
    let src = "<div><p>x</p></div>";
    let err = try_mutate(src, &path(&[0, 4]), |_| Ok(())).unwrap_err();
    assert!(matches!(err, MarkupError::PathNotFound { index: 4, .. }));

    let deep = "<div>".repeat(MAX_NESTING_DEPTH + 10);
    let err = try_mutate(&deep, &path(&[0]), |_| Ok(())).unwrap_err();
    assert_eq!(
        err,
        MarkupError::MaxNestingDepthExceeded {
            max_depth: MAX_NESTING_DEPTH
        }
    );
    assert_eq!(mutate(&deep, &path(&[0]), |el| el.set_text("x")), deep);
}

#[test]
fn test_bodyless_document_edits_land_where_the_browser_points() {
    // The browser implies <body> around <main>, so the first content element is [0].
    let src = "<!DOCTYPE html><html><head><title>T</title></head><main><h1>Hi</h1></main></html>";
    assert_eq!(inspect(src, &path(&[0])).unwrap().tag_name, "MAIN");

    let out = apply_mutation(src, &path(&[0, 0]), &ElementMutation::Text { value: "X".into() });
    assert_eq!(out, src.replace(">Hi<", ">X<"));

    let out = apply_mutation(src, &path(&[0]), &ElementMutation::Text { value: "X".into() });
    assert_eq!(
        out,
        "<!DOCTYPE html><html><head><title>T</title></head><main>X</main></html>"
    );
}

#[test]
fn test_table_rows_use_browser_paths() {
    let src = "<table><tr><td>A</td><td>B</td></tr></table>";
    assert_eq!(inspect(src, &path(&[0, 0, 0])).unwrap().tag_name, "TR");

    let out = apply_mutation(src, &path(&[0, 0, 0, 0]), &ElementMutation::Text { value: "Z".into() });
    assert_eq!(out, "<table><tr><td>Z</td><td>B</td></tr></table>");

    // The inserted <tbody> has no markup, so editing it leaves the table alone.
    let err = try_apply_mutation(src, &path(&[0, 0]), &ElementMutation::Text { value: "Z".into() })
        .unwrap_err();
    assert!(matches!(err, MarkupError::ImpliedElement { .. }));
}
