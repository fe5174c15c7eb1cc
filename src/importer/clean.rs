use std::sync::OnceLock;

use regex::Regex;
use scraper::Html;

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid regex"))
}

fn cdata_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<!\[CDATA\[(.*?)\]\]>").expect("valid regex"))
}

fn collapse_ws(s: &str) -> String {
    whitespace_re().replace_all(s, " ").trim().to_string()
}

fn strip_tags(s: &str) -> String {
    if !s.contains('<') { return s.to_string(); }
    let frag = Html::parse_fragment(s);
    frag.root_element().text().collect::<Vec<_>>().join(" ")
}

/// Record names: no markup, none of `< > & " '`, single spaces.
pub fn clean_name(name: &str) -> String {
    if name.is_empty() { return String::new(); }
    let stripped = strip_tags(name);
    let filtered: String = stripped.chars().filter(|c| !matches!(c, '<' | '>' | '&' | '"' | '\'')).collect();
    collapse_ws(&filtered)
}

/// Description text: CDATA unwrapped, markup removed, whitespace collapsed.
pub fn clean_html_content(content: &str) -> String {
    if content.is_empty() { return String::new(); }
    let unwrapped = cdata_re().replace_all(content, "$1");
    collapse_ws(&strip_tags(&unwrapped))
}

/// Decimal with either `.` or `,` as separator; anything unparsable is 0.
pub fn parse_decimal(value: &str) -> f64 {
    let v = value.trim();
    if v.is_empty() { return 0.0; }
    v.replace(',', ".").replace(' ', "").parse::<f64>().unwrap_or(0.0)
}

/// Integer flags such as `VISIBLE` / `PAID`; "1", "1.0", "true" count as set.
pub fn parse_flag(value: &str) -> bool {
    let v = value.trim();
    v.eq_ignore_ascii_case("true") || parse_decimal(v) as i64 != 0
}

/// Maps feed unit codes onto the stock units the catalogue uses.
pub fn map_uom(unit: &str) -> String {
    let unit = unit.trim();
    if unit.is_empty() { return "Nos".to_string(); }
    let mapped = match unit.to_lowercase().as_str() {
        "ks" | "pc" | "pcs" => "Nos",
        "kg" => "Kg",
        "g" => "Gram",
        "l" => "Litre",
        "ml" => "Millilitre",
        "m" => "Meter",
        "cm" => "Centimeter",
        "mm" => "Millimeter",
        "box" => "Box",
        "pack" => "Pack",
        "bottle" => "Bottle",
        _ => return unit.to_string(),
    };
    mapped.to_string()
}

/// Category path to item group name; the separator is rewritten before `>` is stripped.
pub fn category_to_group(category: &str) -> String {
    clean_name(&category.replace(" > ", " - "))
}

pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
