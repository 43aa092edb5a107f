//! Ordered sanitation rules for generated section markup.
//!
//! Each rule is a `(pattern, replacement)` pair applied in sequence. Order
//! matters: fences and format tokens go first so the opener rules see the
//! real first paragraph, and paragraph cleanup runs last to sweep up the
//! empty `<p>` elements earlier rules leave behind.

use std::sync::LazyLock;

use regex::Regex;

/// One named rewrite over raw markup.
pub struct SanitizeRule {
    pub name: &'static str,
    pattern: Regex,
    replacement: &'static str,
}

impl SanitizeRule {
    fn new(name: &'static str, pattern: &str, replacement: &'static str) -> Self {
        Self {
            name,
            pattern: Regex::new(pattern).expect("valid regex"),
            replacement,
        }
    }

    pub fn apply(&self, input: &str) -> String {
        self.pattern.replace_all(input, self.replacement).into_owned()
    }
}

// Paragraph or document start. Openers are only stripped in this position.
const START: &str = r"(?im)(^|<p[^>]*>)\s*";

/// The rule list, in application order.
pub static RULES: LazyLock<Vec<SanitizeRule>> = LazyLock::new(|| {
    vec![
        // Fenced-code markers some models wrap their whole answer in.
        SanitizeRule::new("code_fences", r"(?m)^\s*```[a-zA-Z]*\s*$\n?", ""),
        // A lone format-name token on its own line ("html", "markdown").
        SanitizeRule::new("format_tokens", r"(?im)^\s*(?:html|markdown|md)\s*$\n?", ""),
        // Leaked document scaffolding.
        SanitizeRule::new(
            "document_tags",
            r"(?i)</?(?:html|head|body)[^>]*>|<!doctype[^>]*>",
            "",
        ),
        // Markdown emphasis that slipped through instead of markup.
        SanitizeRule::new("markdown_bold", r"\*\*([^*\n]+)\*\*", "<strong>$1</strong>"),
        SanitizeRule::new(
            "greetings",
            &format!(
                r"{START}(?:hello|hi|hey|greetings|dear)(?:\s+(?:there|everyone|all|folks|friends|readers|subscribers))?\s*[,!.:]\s*"
            ),
            "$1",
        ),
        SanitizeRule::new(
            "welcome",
            &format!(r"{START}welcome\s+(?:back\s+)?to\s+(?:this|our|the|today's)\s+(?:(?:week's|month's|latest|new|special)\s+)?(?:edition|issue|newsletter|digest|roundup|update)\b[^.!<\n]*[.!]\s*"),
            "$1",
        ),
        SanitizeRule::new(
            "dive_in",
            &format!(r"{START}(?:so,?\s+)?let(?:'|’)?s\s+(?:dive|jump|get)\s+(?:right\s+)?(?:in|into\s+it|started)\s*[.!:]\s*"),
            "$1",
        ),
        SanitizeRule::new(
            "section_preamble",
            &format!(r"{START}in\s+this\s+(?:section|article|issue|newsletter),?\s+we(?:'ll|’ll|\s+will)\s+(?:explore|discuss|look\s+at|cover|dive\s+into)[^.!<\n]*[.!]\s*"),
            "$1",
        ),
        SanitizeRule::new(
            "fast_paced_world",
            &format!(r"{START}in\s+today's\s+(?:fast-paced|rapidly\s+(?:evolving|changing)|ever-changing|digital)\s+(?:world|landscape|age),?\s*"),
            "$1",
        ),
        SanitizeRule::new("empty_paragraphs", r"(?i)<p[^>]*>\s*(?:&nbsp;|<br\s*/?>|\s)*\s*</p>", ""),
        SanitizeRule::new("duplicate_open_p", r"(?i)(?:<p>\s*){2,}", "<p>"),
        SanitizeRule::new("duplicate_close_p", r"(?i)(?:</p>\s*){2,}", "</p>"),
        SanitizeRule::new("paragraph_spacing", r"(?i)</p>\s*<p", "</p>\n<p"),
        SanitizeRule::new("blank_lines", r"\n{3,}", "\n\n"),
    ]
});

/// Look up a rule by name.
pub fn rule(name: &str) -> Option<&'static SanitizeRule> {
    RULES.iter().find(|r| r.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(name: &str, input: &str) -> String {
        rule(name).expect("rule exists").apply(input)
    }

    #[test]
    fn code_fences_are_removed() {
        let input = "```html\n<p>Body</p>\n```";
        assert_eq!(apply("code_fences", input), "<p>Body</p>\n");
    }

    #[test]
    fn format_tokens_on_own_line_are_removed() {
        assert_eq!(apply("format_tokens", "html\n<p>Body</p>"), "<p>Body</p>");
        // Inside prose the word survives.
        assert_eq!(
            apply("format_tokens", "<p>Write html by hand</p>"),
            "<p>Write html by hand</p>"
        );
    }

    #[test]
    fn greetings_removed_at_paragraph_start() {
        assert_eq!(
            apply("greetings", "<p>Hello everyone! AI is changing care.</p>"),
            "<p>AI is changing care.</p>"
        );
        assert_eq!(apply("greetings", "Hi there, the news is in."), "the news is in.");
        assert_eq!(
            apply("greetings", "<p>First.</p><p>Hey folks, second.</p>"),
            "<p>First.</p><p>second.</p>"
        );
    }

    #[test]
    fn greetings_mid_sentence_untouched() {
        let input = "<p>They said hello, then left.</p>";
        assert_eq!(apply("greetings", input), input);
    }

    #[test]
    fn dive_in_openers_removed() {
        assert_eq!(
            apply("dive_in", "<p>Let's dive in! Hospitals are adopting triage models.</p>"),
            "<p>Hospitals are adopting triage models.</p>"
        );
        assert_eq!(apply("dive_in", "<p>So, let's get started.</p>"), "<p></p>");
    }

    #[test]
    fn openers_with_content_are_kept() {
        for input in [
            "<p>Let's get started with the new FDA rules.</p>",
            "<p>So, let's dive right into the numbers.</p>",
        ] {
            assert_eq!(apply("dive_in", input), input);
        }
        let input = "<p>Welcome to the era of ambient AI scribes.</p>";
        assert_eq!(apply("welcome", input), input);
    }

    #[test]
    fn newsletter_welcome_removed() {
        assert_eq!(
            apply("welcome", "<p>Welcome to this week's newsletter. Clinics report shorter waits.</p>"),
            "<p>Clinics report shorter waits.</p>"
        );
        assert_eq!(
            apply("welcome", "<p>Welcome back to our newsletter! Clinics report shorter waits.</p>"),
            "<p>Clinics report shorter waits.</p>"
        );
    }

    #[test]
    fn empty_and_duplicate_paragraphs_collapse() {
        assert_eq!(apply("empty_paragraphs", "<p>A</p><p> </p><p>&nbsp;</p>"), "<p>A</p>");
        assert_eq!(apply("duplicate_open_p", "<p><p>A</p>"), "<p>A</p>");
        assert_eq!(apply("duplicate_close_p", "<p>A</p></p>"), "<p>A</p>");
        assert_eq!(apply("paragraph_spacing", "<p>A</p>   <p>B</p>"), "<p>A</p>\n<p>B</p>");
    }

    #[test]
    fn markdown_bold_becomes_strong() {
        assert_eq!(
            apply("markdown_bold", "<p>**Key point** here</p>"),
            "<p><strong>Key point</strong> here</p>"
        );
    }

    #[test]
    fn rule_names_are_unique() {
        let mut names: Vec<_> = RULES.iter().map(|r| r.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), RULES.len());
    }
}
