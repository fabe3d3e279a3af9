use bl_llm::parse::{extract_balanced_array, strip_code_fence, strip_trailing_commas};
use bl_llm::{parse_label_payload, parse_opinion_list};

#[test]
fn structured_object_with_primary_key() {
    let content = r#"{"extractedOpinionList": ["意見A", "意見B"]}"#;
    assert_eq!(parse_opinion_list(content), vec!["意見A", "意見B"]);
}

#[test]
fn structured_object_with_fallback_key() {
    let content = r#"{"opinions": ["one", "two", "three"]}"#;
    assert_eq!(parse_opinion_list(content), vec!["one", "two", "three"]);
}

#[test]
fn raw_json_array() {
    assert_eq!(parse_opinion_list(r#"["a", "b"]"#), vec!["a", "b"]);
}

#[test]
fn raw_json_string_is_reparsed_once() {
    // A JSON string whose content is itself a JSON array.
    let content = r#""[\"inner one\", \"inner two\"]""#;
    assert_eq!(parse_opinion_list(content), vec!["inner one", "inner two"]);
}

#[test]
fn raw_json_string_without_nested_json_is_one_opinion() {
    assert_eq!(parse_opinion_list(r#""たった一つの意見""#), vec!["たった一つの意見"]);
}

#[test]
fn fenced_code_block_is_stripped() {
    let content = "Here you go:\n```json\n{\"extractedOpinionList\": [\"fenced\"]}\n```\nthanks";
    assert_eq!(parse_opinion_list(content), vec!["fenced"]);
}

#[test]
fn balanced_array_extracted_from_prose() {
    let content = r#"The opinions are ["p", "q [not a bracket]",] as requested."#;
    assert_eq!(parse_opinion_list(content), vec!["p", "q [not a bracket]"]);
}

#[test]
fn line_split_is_the_last_resort() {
    let content = "- first opinion\n- second opinion\n\n* third";
    assert_eq!(
        parse_opinion_list(content),
        vec!["first opinion", "second opinion", "third"]
    );
}

#[test]
fn empty_and_non_string_items_are_dropped() {
    let content = r#"{"extractedOpinionList": ["keep", "", 42, "  also keep  "]}"#;
    assert_eq!(parse_opinion_list(content), vec!["keep", "also keep"]);
}

#[test]
fn balanced_extractor_respects_string_state() {
    let text = r#"noise "fake ] bracket" then ["x", "y]z"] tail"#;
    let array = extract_balanced_array(text).expect("array found");
    assert_eq!(array, r#"["x", "y]z"]"#);
}

#[test]
fn balanced_extractor_respects_escapes() {
    let text = r#"["quote \" then ] inside", "b"] rest"#;
    let array = extract_balanced_array(text).expect("array found");
    assert_eq!(array, r#"["quote \" then ] inside", "b"]"#);
}

#[test]
fn balanced_extractor_returns_none_without_array() {
    assert!(extract_balanced_array("no brackets here").is_none());
    assert!(extract_balanced_array("unclosed [ here").is_none());
}

#[test]
fn trailing_commas_removed_outside_strings_only() {
    assert_eq!(strip_trailing_commas(r#"["a", "b",]"#), r#"["a", "b"]"#);
    assert_eq!(strip_trailing_commas(r#"["a",  ]"#), r#"["a"  ]"#);
    assert_eq!(strip_trailing_commas(r#"["a,]", "b"]"#), r#"["a,]", "b"]"#);
}

#[test]
fn code_fence_tolerates_language_tags() {
    let body = strip_code_fence("```json\n[1]\n```").expect("fence");
    assert_eq!(body.trim(), "[1]");
    let body = strip_code_fence("```\ntext\n```").expect("fence");
    assert_eq!(body.trim(), "text");
    assert!(strip_code_fence("no fence").is_none());
}

#[test]
fn label_payload_happy_path() {
    let content = r#"{"label": "交通", "description": "道路整備に関する意見"}"#;
    assert_eq!(
        parse_label_payload(content),
        Some(("交通".to_string(), "道路整備に関する意見".to_string()))
    );
}

#[test]
fn label_payload_fenced_and_partial() {
    let content = "```json\n{\"label\": \"env\"}\n```";
    assert_eq!(parse_label_payload(content), Some(("env".to_string(), String::new())));
}

#[test]
fn label_payload_rejects_garbage() {
    assert_eq!(parse_label_payload("not json"), None);
    assert_eq!(parse_label_payload(r#"{"description": "no label"}"#), None);
    assert_eq!(parse_label_payload(r#"{"label": "  "}"#), None);
}
