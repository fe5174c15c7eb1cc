use maud::{html, Markup, PreEscaped, DOCTYPE};
use serde_json::{Map, Value};

const DANGER_KEYS: [&str; 3] = ["error", "parse_error", "error_message"];
const WARNING_KEYS: [&str; 3] = ["error_messages", "suggestions", "errors"];
const STYLE: &str = "table{border-collapse:collapse;margin:4px 0}th,td{border:1px solid #ccc;padding:3px 6px;text-align:left;vertical-align:top}\
tr.warning>*{background:#fcf8e3}tr.danger>*{background:#f2dede}pre{margin:0;white-space:pre-wrap}";

/// Row highlight for a field: errors are `danger`, error lists and bad flags `warning`.
fn row_class(key: &str, value: &Value) -> Option<&'static str> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        _ if DANGER_KEYS.contains(&key) => Some("danger"),
        Value::Array(a) if WARNING_KEYS.contains(&key) && !a.is_empty() => Some("warning"),
        Value::Number(n) if WARNING_KEYS.contains(&key) && n.as_u64().unwrap_or(0) > 0 => Some("warning"),
        Value::Bool(false) if key == "success" || key == "xml_valid" => Some("danger"),
        Value::Bool(true) if matches!(key, "is_empty" | "mostly_whitespace" | "looks_like_error_page") => Some("warning"),
        _ => None,
    }
}

fn object_table(map: &Map<String, Value>) -> Markup {
    html! {
        table {
            @for (key, value) in map {
                tr class=[row_class(key, value)] {
                    th { (key) }
                    td { (render_value(value)) }
                }
            }
        }
    }
}

/// Arrays of objects become one table with a column per key.
fn records_table(rows: &[Value]) -> Markup {
    let mut columns: Vec<&str> = Vec::new();
    for row in rows {
        if let Value::Object(m) = row {
            for k in m.keys() {
                if !columns.contains(&k.as_str()) { columns.push(k); }
            }
        }
    }
    html! {
        table {
            tr { @for c in &columns { th { (c) } } }
            @for row in rows {
                @let danger = columns.iter().any(|c| row.get(*c).and_then(|v| row_class(c, v)) == Some("danger"));
                tr class=[danger.then_some("danger")] {
                    @for c in &columns {
                        td { (cell(row, c)) }
                    }
                }
            }
        }
    }
}

fn cell(row: &Value, column: &str) -> Markup {
    match row.get(column) {
        Some(v) => render_value(v),
        None => html! {},
    }
}

pub fn render_value(value: &Value) -> Markup {
    match value {
        Value::Null => html! {},
        Value::Bool(b) => html! { (if *b { "Yes" } else { "No" }) },
        Value::Number(n) => html! { (n.to_string()) },
        Value::String(s) if s.contains('\n') => html! { pre { (s) } },
        Value::String(s) => html! { (s) },
        Value::Array(items) if items.is_empty() => html! { em { "none" } },
        Value::Array(items) if items.iter().all(Value::is_object) => records_table(items),
        Value::Array(items) => html! { ul { @for i in items { li { (render_value(i)) } } } },
        Value::Object(map) => object_table(map),
    }
}

/// Complete HTML document for one operation's plan or result.
pub fn render_page(title: &str, value: &Value) -> String {
    html! {
        (DOCTYPE)
        html {
            head {
                meta charset="utf-8";
                title { (title) }
                style { (PreEscaped(STYLE)) }
            }
            body {
                h2 { (title) }
                (render_value(value))
            }
        }
    }
    .into_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn escapes_feed_content() {
        let out = render_value(&json!({"raw_content": "<ORDER id=\"1\">&</ORDER>"})).into_string();
        assert!(out.contains("&lt;ORDER id=&quot;1&quot;&gt;&amp;&lt;/ORDER&gt;"));
        assert!(!out.contains("<ORDER"));
    }

    #[test]
    fn error_fields_are_highlighted() {
        let out = render_value(&json!({
            "success": false,
            "error": "Connection failed: timeout",
            "error_messages": ["Failed to process order 7"],
            "imported": 0,
        }))
        .into_string();
        assert!(out.contains(r#"<tr class="danger"><th>error</th>"#));
        assert!(out.contains(r#"<tr class="warning"><th>error_messages</th>"#));
        assert!(out.contains(r#"<tr class="danger"><th>success</th><td>No</td></tr>"#));
        assert!(out.contains("<tr><th>imported</th><td>0</td></tr>"));
    }

    #[test]
    fn empty_errors_stay_plain() {
        let out = render_value(&json!({"error_message": "", "errors": 0, "suggestions": []})).into_string();
        assert!(!out.contains("class="));
        assert!(out.contains("<em>none</em>"));
    }

    #[test]
    fn attempt_lists_render_as_one_table() {
        let out = render_value(&json!([
            {"attempt": 1, "element_count": 0, "error": "XML parsing failed"},
            {"attempt": 2, "element_count": 3, "import_triggered": true},
        ]))
        .into_string();
        assert!(out.contains("<th>attempt</th><th>element_count</th><th>error</th><th>import_triggered</th>"));
        assert_eq!(out.matches(r#"<tr class="danger">"#).count(), 1);
        assert!(out.contains("<td>Yes</td>"));
    }

    #[test]
    fn page_has_title_and_multiline_pre() {
        let page = render_page("debug_xml_feed", &json!({"pretty_content": "<a>\n  <b/>\n</a>"}));
        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.contains("<title>debug_xml_feed</title>"));
        assert!(page.contains("<pre>&lt;a&gt;\n  &lt;b/&gt;\n&lt;/a&gt;</pre>"));
    }
}
