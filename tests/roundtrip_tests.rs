//! Round-trip stability: translate → render → translate reproduces the tree

use formatscript::{render, translate, Node};
use pretty_assertions::assert_eq;

fn assert_stable(formula: &str) -> String {
    let first = translate(formula)
        .into_result()
        .unwrap_or_else(|e| panic!("{} failed to translate: {}", formula, e));
    let rendered = render(&first);
    let second = translate(&rendered)
        .into_result()
        .unwrap_or_else(|e| panic!("{} re-rendered as {} failed: {}", formula, rendered, e));
    assert_eq!(first, second, "{} → {}", formula, rendered);
    rendered
}

#[test]
fn test_roundtrip_corpus() {
    let formulas = [
        "1",
        "-3.25",
        "\"text with \\\"quotes\\\"\"",
        "@currentField",
        "@currentField.lookupValue",
        "@window.innerHeight - 100",
        "@now",
        "1 + 2 + 3",
        "1 - (2 - 3)",
        "(1 - 2) - 3",
        "1 / (2 / 3)",
        "(1 + 2) * (3 + 4)",
        "1 + 2 * 3",
        "@currentField >= 10 == true",
        "AND(@currentField > 1, @currentField < 5, true)",
        "OR(false, AND(true, true))",
        "CONCATENATE(\"Hi \", @me, \"!\")",
        "\"a\" & \"b\" & \"c\"",
        "IF(@currentField > 10, \"big\")",
        "IF(@currentField > 10, \"big\", \"small\")",
        "IF(true, 1, false, 2, 3)",
        "IF(true, 1, false, 2)",
        "SWITCH(@currentField, \"1\", \"a\", \"2\", \"b\", \"c\")",
        "SWITCH(@me, 1, \"one\")",
        "SWITCH(@me, 1, \"one\", SWITCH(@now, 2, \"two\"))",
        "@currentField == 1 ? \"x\" : \"y\"",
        "toLocaleDateString(Date(@currentField))",
        "toString(Number(\"3\") + 1)",
        "cos(0) * sin(1)",
        "\"__CURRENTFIELD__\"",
        "\"__ME__\" + @me",
        "\"@now\"",
        "\"line\\nbreak\"",
    ];

    for formula in formulas {
        assert_stable(formula);
    }
}

#[test]
fn test_roundtrip_text_is_normalized() {
    assert_eq!(assert_stable("(1+2)*3"), "(1 + 2) * 3");
    assert_eq!(assert_stable("1+2+3"), "1 + 2 + 3");
    assert_eq!(assert_stable("if(true,1,2)"), "IF(true, 1, 2)");
    assert_eq!(assert_stable("concat(\"a\", \"b\")"), "\"a\" + \"b\"");
}

#[test]
fn test_placeholder_string_renders_as_written() {
    let rendered = assert_stable("\"__CURRENTFIELD__\"");
    assert_eq!(rendered, "\"__CURRENTFIELD__\"");

    let tree = translate("\"__NOW__\"").into_result().unwrap();
    assert_eq!(tree, Node::text("__NOW__"));
}

#[test]
fn test_if_with_equality_renders_as_switch_and_stays_stable() {
    let rendered = assert_stable("IF(@me == \"x\", 1, 2)");
    assert_eq!(rendered, "SWITCH(@me, \"x\", 1, 2)");
}

#[test]
fn test_deep_if_chain_renders_flat_and_stays_stable() {
    let mut formula = String::new();
    for i in 0..40 {
        formula.push_str(&format!("IF(@currentField == {}, \"v{}\", ", i, i));
    }
    formula.push_str("\"other\"");
    formula.push_str(&")".repeat(40));

    let rendered = assert_stable(&formula);
    assert!(rendered.starts_with("SWITCH(@currentField, 0, \"v0\", 1, \"v1\""));
    assert!(rendered.ends_with("39, \"v39\", \"other\")"));
}

#[test]
fn test_deep_and_tree_from_json_parses_back() {
    let mut json = String::from("true");
    for _ in 0..40 {
        json = format!(r#"{{"operator":"&&","operands":[{},true]}}"#, json);
    }
    let tree = Node::from_json(&json).unwrap();

    let rendered = render(&tree);
    assert_eq!(rendered.matches("AND(").count(), 40);

    let back = translate(&rendered)
        .into_result()
        .unwrap_or_else(|e| panic!("{} failed to translate: {}", rendered, e));
    assert_eq!(back, tree);
}

#[test]
fn test_roundtrip_from_json() {
    let json = r#"{"operator":"?","operands":[{"operator":"==","operands":["@currentField.title","Done"]},"green",{"operator":"?","operands":[{"operator":"==","operands":["@currentField.title","Late"]},"red",""]}]}"#;
    let tree = Node::from_json(json).unwrap();
    let rendered = render(&tree);
    assert_eq!(
        rendered,
        r#"SWITCH(@currentField.title, "Done", "green", "Late", "red")"#
    );
    let back = translate(&rendered).into_result().unwrap();
    assert_eq!(back, tree);
    assert_eq!(back.to_json().unwrap(), json);
}
