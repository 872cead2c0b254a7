//! Client-side emphasis of pattern matches inside server text segments.
//!
//! The pattern is applied as a regular expression to the (already lowercased)
//! text. Emphasis works on the *set of distinct matched substrings*, in order
//! of first discovery: each distinct value has every literal occurrence
//! wrapped. When two values overlap or contain one another the later
//! replacement also rewrites text inside earlier markers; that ordering quirk
//! is kept as-is.

use regex::Regex;
use tracing::debug;

/// Markers used for emphasis and for the space substitution that keeps
/// rows aligned in monospace output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Markup {
    pub open: &'static str,
    pub close: &'static str,
    pub space: &'static str,
}

impl Markup {
    /// `<mark>` tags and `&nbsp;`.
    pub const HTML: Markup = Markup {
        open: "<mark>",
        close: "</mark>",
        space: "&nbsp;",
    };

    /// Control-character markers and U+00A0, split back into styled spans
    /// with [`split_emphasis`].
    pub const TERMINAL: Markup = Markup {
        open: "\u{1}",
        close: "\u{2}",
        space: "\u{a0}",
    };

    /// Square brackets and plain spaces, for line-oriented output.
    pub const PLAIN: Markup = Markup {
        open: "[",
        close: "]",
        space: " ",
    };
}

impl Default for Markup {
    fn default() -> Self {
        Markup::HTML
    }
}

/// Compiled pattern plus markup, reusable across every row of a page.
#[derive(Debug, Clone)]
pub struct PatternHighlighter {
    regex: Option<Regex>,
    markup: Markup,
}

impl PatternHighlighter {
    /// Compile `pattern`. A pattern that is not a valid regular expression is
    /// matched literally. The caller lowercases the pattern.
    pub fn new(pattern: &str, markup: Markup) -> Self {
        let regex = if pattern.is_empty() {
            None
        } else {
            match Regex::new(pattern) {
                Ok(re) => Some(re),
                Err(e) => {
                    debug!(pattern, error = %e, "pattern is not a regex, matching literally");
                    Regex::new(&regex::escape(pattern)).ok()
                }
            }
        };
        Self { regex, markup }
    }

    pub fn markup(&self) -> Markup {
        self.markup
    }

    /// Distinct non-empty matched substrings, in order of first discovery.
    pub fn distinct_matches<'t>(&self, text: &'t str) -> Vec<&'t str> {
        let Some(re) = &self.regex else {
            return Vec::new();
        };
        let mut seen: Vec<&str> = Vec::new();
        for m in re.find_iter(text) {
            let s = m.as_str();
            if !s.is_empty() && !seen.contains(&s) {
                seen.push(s);
            }
        }
        seen
    }

    /// Wrap every distinct match, then substitute spaces.
    ///
    /// Returns `text` unchanged when nothing matches.
    pub fn highlight(&self, text: &str) -> String {
        let distinct = self.distinct_matches(text);
        if distinct.is_empty() {
            return text.to_string();
        }

        let mut marked = text.to_string();
        for value in distinct {
            let wrapped = format!("{}{}{}", self.markup.open, value, self.markup.close);
            marked = marked.replace(value, &wrapped);
        }
        // Must run after emphasis so patterns containing spaces still match.
        marked.replace(' ', self.markup.space)
    }
}

/// One-shot HTML highlighting of `text` against `pattern`.
pub fn highlight(text: &str, pattern: &str) -> String {
    PatternHighlighter::new(pattern, Markup::HTML).highlight(text)
}

/// A run of marked text that is uniformly emphasized or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub text: String,
    pub emphasized: bool,
}

/// Split marked text back into fragments. Nested markers (from overlapping
/// matches) count as emphasized while any marker is open.
pub fn split_emphasis(marked: &str, markup: &Markup) -> Vec<Fragment> {
    let mut fragments: Vec<Fragment> = Vec::new();
    let mut depth: usize = 0;
    let mut current = String::new();
    let mut rest = marked;

    let flush = |current: &mut String, emphasized: bool, fragments: &mut Vec<Fragment>| {
        if current.is_empty() {
            return;
        }
        match fragments.last_mut() {
            Some(last) if last.emphasized == emphasized => last.text.push_str(current),
            _ => fragments.push(Fragment {
                text: current.clone(),
                emphasized,
            }),
        }
        current.clear();
    };

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix(markup.open) {
            flush(&mut current, depth > 0, &mut fragments);
            depth += 1;
            rest = after;
        } else if let Some(after) = rest.strip_prefix(markup.close) {
            flush(&mut current, depth > 0, &mut fragments);
            depth = depth.saturating_sub(1);
            rest = after;
        } else {
            let mut chars = rest.chars();
            if let Some(c) = chars.next() {
                current.push(c);
            }
            rest = chars.as_str();
        }
    }
    flush(&mut current, depth > 0, &mut fragments);
    fragments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_match_returns_text_unchanged() {
        assert_eq!(highlight("hello world", "xyz"), "hello world");
        assert_eq!(highlight("hello world", ""), "hello world");
    }

    #[test]
    fn every_occurrence_is_wrapped_and_spaces_substituted() {
        assert_eq!(
            highlight("the cat and the cat", "cat"),
            "the&nbsp;<mark>cat</mark>&nbsp;and&nbsp;the&nbsp;<mark>cat</mark>"
        );
    }

    #[test]
    fn pattern_with_space_matches_before_substitution() {
        assert_eq!(
            highlight("a big cat", "big cat"),
            "a&nbsp;<mark>big&nbsp;cat</mark>"
        );
    }

    #[test]
    fn regex_alternatives_are_collected_in_discovery_order() {
        let h = PatternHighlighter::new("dog|cat", Markup::HTML);
        assert_eq!(h.distinct_matches("cat dog cat"), vec!["cat", "dog"]);
        assert_eq!(
            h.highlight("cat dog cat"),
            "<mark>cat</mark>&nbsp;<mark>dog</mark>&nbsp;<mark>cat</mark>"
        );
    }

    #[test]
    fn overlapping_values_nest_in_discovery_order() {
        // "cats" is found first, then "cat" also rewrites inside it.
        let h = PatternHighlighter::new("cats|cat", Markup::HTML);
        assert_eq!(
            h.highlight("cats cat"),
            "<mark><mark>cat</mark>s</mark>&nbsp;<mark>cat</mark>"
        );
    }

    #[test]
    fn invalid_regex_is_matched_literally() {
        assert_eq!(highlight("a (b c", "(b"), "a&nbsp;<mark>(b</mark>&nbsp;c");
    }

    #[test]
    fn highlighting_unmatched_text_is_idempotent() {
        let once = highlight("plain text", "zzz");
        assert_eq!(highlight(&once, "zzz"), once);
    }

    #[test]
    fn terminal_markup_splits_into_fragments() {
        let h = PatternHighlighter::new("cat", Markup::TERMINAL);
        let marked = h.highlight("a cat!");
        let fragments = split_emphasis(&marked, &Markup::TERMINAL);
        assert_eq!(
            fragments,
            vec![
                Fragment {
                    text: "a\u{a0}".into(),
                    emphasized: false
                },
                Fragment {
                    text: "cat".into(),
                    emphasized: true
                },
                Fragment {
                    text: "!".into(),
                    emphasized: false
                },
            ]
        );
    }

    #[test]
    fn plain_markup_brackets_matches() {
        let h = PatternHighlighter::new("cat", Markup::PLAIN);
        assert_eq!(h.highlight("the cat sat"), "the [cat] sat");
    }

    #[test]
    fn nested_markers_stay_emphasized() {
        let fragments = split_emphasis("<mark><mark>cat</mark>s</mark>!", &Markup::HTML);
        assert_eq!(
            fragments,
            vec![
                Fragment {
                    text: "cats".into(),
                    emphasized: true
                },
                Fragment {
                    text: "!".into(),
                    emphasized: false
                },
            ]
        );
    }
}
