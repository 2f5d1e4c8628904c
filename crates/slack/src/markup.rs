//! HTML subset to Slack `mrkdwn`.
//!
//! Rules run in a fixed order, each once across the whole string. Links are
//! emitted with escaped angle brackets so the final tag strip leaves them
//! alone; entity decoding afterwards turns them into `<url|label>`.
//!
//! Styled spans mark their closing marker with `SPAN_END`. Adjacency
//! correction only looks at those marks, so markers already present in the
//! input text (`snake_case`, URLs) are never split.

use regex::Regex;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MarkupError {
    #[error("markup rule `{rule}` failed to compile: {source}")]
    Pattern {
        rule: &'static str,
        #[source]
        source: regex::Error,
    },
}

const MARKERS: &str = "*_~`";

/// Private-use mark placed after every closing marker a styled span emits.
/// Removed again by the final strip.
const SPAN_END: char = '\u{e000}';

const STYLED_SPANS: &[(&str, &str, &str)] = &[
    ("bold", "strong|b", "*"),
    ("italic", "em|i|u", "_"),
    ("strike", "s", "~"),
    ("code", "code", "`"),
    ("preformatted", "pre", "```"),
];

struct Rule {
    name: &'static str,
    pattern: Regex,
    template: String,
}

impl Rule {
    fn compile(
        name: &'static str,
        pattern: &str,
        template: impl Into<String>,
    ) -> Result<Self, MarkupError> {
        let pattern =
            Regex::new(pattern).map_err(|source| MarkupError::Pattern { rule: name, source })?;
        Ok(Self { name, pattern, template: template.into() })
    }

    fn apply(&self, input: &str) -> String {
        self.pattern.replace_all(input, self.template.as_str()).into_owned()
    }
}

pub struct MarkupConverter {
    rules: Vec<Rule>,
    strip: Regex,
}

impl MarkupConverter {
    pub fn new() -> Result<Self, MarkupError> {
        let mut rules = vec![Rule::compile("nbsp", "\u{a0}", " ")?];

        for &(name, tags, marker) in STYLED_SPANS {
            rules.push(Rule::compile(
                name,
                &format!(r"(?si)<(?:{tags})\b[^>]*>\s*(.*?)\s*</(?:{tags})\s*>"),
                format!("{marker}${{1}}{marker}{SPAN_END}"),
            )?);
        }

        rules.push(Rule::compile(
            "link",
            r#"(?si)<a\b[^>]*?\bhref\s*=\s*"([^"]*)"[^>]*>\s*(.*?)\s*</a\s*>"#,
            "&#x3C;${1}|${2}&#x3E;",
        )?);
        rules.push(Rule::compile("list_item", r"(?i)[ \t]*<li\b[^>]*>", "\u{2022} ")?);
        rules.push(Rule::compile("line_break", r"(?i)<br\b[^>]*>", "\n")?);

        let markers = regex::escape(MARKERS);
        rules.push(Rule::compile(
            "adjacency",
            &format!(r"{SPAN_END}([^\s{markers}{SPAN_END}])"),
            " ${1}",
        )?);

        let strip = Regex::new(&format!(r"(?s)<!--.*?-->|</?[A-Za-z][^>]*>|{SPAN_END}"))
            .map_err(|source| MarkupError::Pattern { rule: "strip", source })?;

        Ok(Self { rules, strip })
    }

    pub fn convert_text(&self, input: &str) -> String {
        let mut output = input.to_owned();
        for rule in &self.rules {
            output = rule.apply(&output);
        }

        let stripped = self.strip.replace_all(&output, "");
        html_escape::decode_html_entities(stripped.as_ref()).into_owned()
    }

    /// Rewrites every string leaf; keys, order and non-string scalars are
    /// untouched.
    pub fn convert(&self, value: Value) -> Value {
        match value {
            Value::String(text) => Value::String(self.convert_text(&text)),
            Value::Array(items) => {
                Value::Array(items.into_iter().map(|item| self.convert(item)).collect())
            }
            Value::Object(entries) => Value::Object(
                entries.into_iter().map(|(key, item)| (key, self.convert(item))).collect(),
            ),
            scalar => scalar,
        }
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|rule| rule.name).collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::MarkupConverter;

    fn convert(input: &str) -> String {
        MarkupConverter::new().expect("rules compile").convert_text(input)
    }

    #[test]
    fn bold_and_italic_spans() {
        assert_eq!(convert("<b>Hi</b> <i>there</i>"), "*Hi* _there_");
        assert_eq!(convert("<STRONG>loud</STRONG>"), "*loud*");
        assert_eq!(convert("<em>a</em> and <u>b</u>"), "_a_ and _b_");
    }

    #[test]
    fn strike_code_and_preformatted_spans() {
        assert_eq!(convert("<s>old</s>"), "~old~");
        assert_eq!(convert("run <code>make</code> now"), "run `make` now");
        assert_eq!(convert("<pre>line one\nline two</pre>"), "```line one\nline two```");
    }

    #[test]
    fn whitespace_inside_spans_is_dropped() {
        assert_eq!(convert("<b> Hi </b>"), "*Hi*");
    }

    #[test]
    fn tag_names_need_a_boundary() {
        assert_eq!(convert("<span>plain</span>"), "plain");
        assert_eq!(convert("<blockquote>quoted</blockquote>"), "quoted");
        assert_eq!(convert("a<br>b"), "a\nb");
    }

    #[test]
    fn misnested_spans_get_separated_from_following_text() {
        assert_eq!(convert("<em><strong>foo </em></strong>bar"), "_*foo_* bar");
    }

    #[test]
    fn closing_marker_followed_by_word_gets_a_space() {
        assert_eq!(convert("<b>bold</b>text"), "*bold* text");
        assert_eq!(convert("<i>x</i>y <b>z</b> w"), "_x_ y *z* w");
    }

    #[test]
    fn spans_opened_mid_word_are_still_separated() {
        assert_eq!(convert("foo<b>bar</b>baz"), "foo*bar* baz");
        assert_eq!(convert("x<i>y</i>z w"), "x_y_ z w");
        assert_eq!(convert("a<code>b</code>c<s>d</s>e"), "a`b` c~d~ e");
    }

    #[test]
    fn marker_after_closing_marker_is_not_separated() {
        assert_eq!(convert("<b>x</b>_y"), "*x*_y");
        assert_eq!(convert("<pre>p</pre>"), "```p```");
    }

    #[test]
    fn identifiers_and_urls_are_not_split() {
        assert_eq!(convert("<b>see</b> snake_case_words"), "*see* snake_case_words");
        assert_eq!(convert("use snake_case_words here"), "use snake_case_words here");
        assert_eq!(
            convert(r#"<a href="https://example.com/a_b_c">docs</a>"#),
            "<https://example.com/a_b_c|docs>"
        );
    }

    #[test]
    fn links_become_angle_bracket_pairs() {
        assert_eq!(
            convert(r#"See <a class="x" href="https://example.com/?a=1&amp;b=2"> the docs </a>."#),
            "See <https://example.com/?a=1&b=2|the docs>."
        );
    }

    #[test]
    fn list_items_and_line_breaks() {
        assert_eq!(
            convert("<ul>\n\t<li>one</li>\n  <li>two</li>\n</ul>"),
            "\n\u{2022} one\n\u{2022} two\n"
        );
        assert_eq!(convert("a<br/>b<BR class=\"x\">c"), "a\nb\nc");
    }

    #[test]
    fn non_breaking_spaces_become_spaces() {
        assert_eq!(convert("a\u{a0}b&nbsp;c"), "a b\u{a0}c");
    }

    #[test]
    fn strips_tags_and_comments_then_decodes_entities() {
        assert_eq!(convert("<p>Tom &amp; Jerry</p><!-- hidden <b>x</b> -->"), "Tom & Jerry");
        assert_eq!(convert("5 < 6 &lt;tag&gt;"), "5 < 6 <tag>");
    }

    #[test]
    fn convert_walks_nested_values_preserving_shape() {
        let converter = MarkupConverter::new().expect("rules compile");
        let value = json!({
            "text": "<b>Hi</b>",
            "attachments": [
                {"title": "<i>t</i>", "count": 3, "flag": true, "none": null},
            ],
            "z": "last",
        });

        let converted = converter.convert(value);

        assert_eq!(
            converted,
            json!({
                "text": "*Hi*",
                "attachments": [{"title": "_t_", "count": 3, "flag": true, "none": null}],
                "z": "last",
            })
        );
        let keys: Vec<&String> = converted.as_object().expect("object").keys().collect();
        assert_eq!(keys, vec!["text", "attachments", "z"]);
    }

    #[test]
    fn rule_table_order_is_fixed() {
        let converter = MarkupConverter::new().expect("rules compile");
        let names = converter.rule_names();

        assert_eq!(names.first(), Some(&"nbsp"));
        assert_eq!(names.last(), Some(&"adjacency"));
        let link = names.iter().position(|name| *name == "link").expect("link rule");
        let bold = names.iter().position(|name| *name == "bold").expect("bold rule");
        assert!(bold < link);
    }
}
