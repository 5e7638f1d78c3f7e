//! `{{placeholder}}` substitution for contract and email templates.
//!
//! Substitution is a single left-to-right pass: every `{{key}}` whose key
//! has a value is replaced by that value, and every other token is copied
//! through verbatim. Inserted values are never rescanned, so a value that
//! itself contains `{{...}}` stays literal.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();

fn placeholder_pattern() -> &'static Regex {
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\{\{([^{}]+)\}\}").expect("placeholder pattern is a valid regex")
    })
}

/// Key/value record substituted into a template.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateValues {
    values: BTreeMap<String, String>,
}

impl TemplateValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        self.values.insert(key.to_string(), value.into());
        self
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Copy with every value HTML-escaped.
    pub fn escaped(&self) -> Self {
        Self {
            values: self
                .values
                .iter()
                .map(|(k, v)| (k.clone(), escape_html(v)))
                .collect(),
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TemplateValues {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Replace every `{{key}}` that has a value; leave the rest untouched.
pub fn substitute(template: &str, values: &TemplateValues) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let candidate = &rest[start..];
        let replaced = candidate[OPEN.len()..].find(CLOSE).and_then(|end| {
            let key = &candidate[OPEN.len()..OPEN.len() + end];
            values
                .get(key)
                .map(|value| (value, OPEN.len() + end + CLOSE.len()))
        });
        match replaced {
            Some((value, consumed)) => {
                out.push_str(value);
                rest = &candidate[consumed..];
            }
            None => {
                // Not a known token here; emit one brace and rescan from the next char
                out.push('{');
                rest = &candidate[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Distinct placeholder keys in order of first appearance.
pub fn placeholders(template: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for cap in placeholder_pattern().captures_iter(template) {
        let key = cap[1].to_string();
        if !seen.contains(&key) {
            seen.push(key);
        }
    }
    seen
}

/// Placeholder keys in `template` that `values` does not cover.
pub fn unresolved(template: &str, values: &TemplateValues) -> Vec<String> {
    placeholders(template)
        .into_iter()
        .filter(|k| values.get(k).is_none())
        .collect()
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, &str)]) -> TemplateValues {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_replaces_every_occurrence() {
        let t = "<p>{{student_name}}</p><p>Dear {{parent_name}}, {{student_name}} is enrolled.</p>";
        let out = substitute(
            t,
            &values(&[("student_name", "Clara Wieck"), ("parent_name", "Friedrich Wieck")]),
        );
        assert_eq!(
            out,
            "<p>Clara Wieck</p><p>Dear Friedrich Wieck, Clara Wieck is enrolled.</p>"
        );
    }

    #[test]
    fn test_unknown_tokens_left_verbatim() {
        let t = "Tuition {{monthly_tuition}} due {{due_day}} {{ spaced }}";
        let out = substitute(t, &values(&[("monthly_tuition", "$450.00")]));
        assert_eq!(out, "Tuition $450.00 due {{due_day}} {{ spaced }}");
    }

    #[test]
    fn test_values_not_rescanned() {
        let t = "{{a}} {{b}}";
        let out = substitute(t, &values(&[("a", "{{b}}"), ("b", "B")]));
        assert_eq!(out, "{{b}} B");
    }

    #[test]
    fn test_extra_braces_and_unclosed() {
        assert_eq!(substitute("{{{x}}}", &values(&[("x", "1")])), "{1}");
        assert_eq!(substitute("{{{{x}}", &values(&[("x", "1")])), "{{1");
        assert_eq!(substitute("open {{x", &values(&[("x", "1")])), "open {{x");
        assert_eq!(substitute("", &values(&[("x", "1")])), "");
    }

    #[test]
    fn test_no_escaping_by_default() {
        let v = values(&[("parent_name", "<b>Bob & Co</b>")]);
        assert_eq!(substitute("{{parent_name}}", &v), "<b>Bob & Co</b>");
        assert_eq!(
            substitute("{{parent_name}}", &v.escaped()),
            "&lt;b&gt;Bob &amp; Co&lt;/b&gt;"
        );
    }

    #[test]
    fn test_placeholders_and_unresolved() {
        let t = "{{a}} {{b}} {{a}} {{c}}";
        assert_eq!(placeholders(t), vec!["a", "b", "c"]);
        assert_eq!(unresolved(t, &values(&[("a", "1")])), vec!["b", "c"]);
    }

    #[test]
    fn test_multibyte_text_preserved() {
        let out = substitute("Élève: {{name}} — ☆", &values(&[("name", "Zoë")]));
        assert_eq!(out, "Élève: Zoë — ☆");
    }

    #[test]
    fn test_substitution_property_over_generated_cases() {
        // Every known token disappears and its value count matches; unknown tokens survive.
        let keys = ["student_name", "season", "x"];
        let bodies = [
            "{{student_name}}{{student_name}}",
            "a{{season}}b{{unknown}}c{{x}}",
            "{{x}}{{{x}}}{{y}}",
            "no tokens at all",
        ];
        for body in bodies {
            let v: TemplateValues = keys.iter().map(|k| (*k, format!("<{}>", k.len()))).collect();
            let out = substitute(body, &v);
            for k in keys {
                assert!(!out.contains(&format!("{{{{{}}}}}", k)), "{body} still has {k}");
            }
            for k in placeholders(body).into_iter().filter(|k| !keys.contains(&k.as_str())) {
                assert!(out.contains(&format!("{{{{{}}}}}", k)), "{body} lost {k}");
            }
        }
    }
}
