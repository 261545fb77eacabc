//! Minimal, deterministic text normalization helpers.
//!
//! Two flavours:
//! - [`normalize`]: lossy canonical form used for comparing short strings (similarity, segment keys).
//! - [`MappedText`]: the same kind of rewrites applied to a large document while remembering, for
//!   every output char, which source bytes it came from. Matches found in a view can therefore be
//!   reported as ranges of the original text.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::ops::Range;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

// Opening `*` must not follow a word char so star alleles like `CYP2C19*2*3` survive.
static DUPLICATED_EMPHASIS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(^|[^\w*])\*(\w+)\*(\w+)").expect("duplicated emphasis regex"));

static EMPHASIS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(^|[^\w*])(\*{1,3})([^*\s](?:[^*]*[^*\s])?)\*{1,3}").expect("emphasis regex")
});

static P_VALUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bp\s*([<>=≤≥])\s*0?\.(\d+)").expect("p-value regex")
});

const MAX_PASSES: usize = 32;

/// Quotation and clause punctuation that renderers and extractors disagree on.
pub fn is_strippable_punct(ch: char) -> bool {
    matches!(
        ch,
        ',' | ';' | ':' | '"' | '\'' | '“' | '”' | '‘' | '’'
    )
}

/// True if `s` contains p-value notation such as `p<0.05` or `P = .001`.
pub fn has_p_value(s: &str) -> bool {
    P_VALUE.is_match(s)
}

/// Canonical form for comparisons.
///
/// Whitespace collapsed, quote/clause punctuation removed, markdown emphasis unwrapped
/// (`*P*P` collapses to `P`), p-values rewritten to `p < .05` form, lowercased.
/// The pipeline is iterated to a fixed point, so `normalize(normalize(s)) == normalize(s)`.
pub fn normalize(s: &str) -> String {
    let mut cur = normalize_once(s);
    for _ in 0..MAX_PASSES {
        let next = normalize_once(&cur);
        if next == cur {
            break;
        }
        cur = next;
    }
    cur
}

fn normalize_once(s: &str) -> String {
    let s = WHITESPACE.replace_all(s, " ");
    let s: String = s.chars().filter(|c| !is_strippable_punct(*c)).collect();
    let s = strip_markdown_emphasis(&s);
    let s = canonicalize_p_values(&s);
    s.to_lowercase().trim().to_string()
}

/// Remove markdown emphasis markers while keeping the wrapped text.
///
/// Also folds the `*P*P` artifact (marker duplicated around the same content) to `P`.
pub fn strip_markdown_emphasis(s: &str) -> String {
    let s = DUPLICATED_EMPHASIS.replace_all(s, |c: &Captures| {
        if c[3].starts_with(&c[2]) {
            format!("{}{}", &c[1], &c[3])
        } else {
            c[0].to_string()
        }
    });

    let mut out = String::with_capacity(s.len());
    let mut last = 0usize;
    for caps in EMPHASIS.captures_iter(&s) {
        let (Some(whole), Some(open), Some(inner)) = (caps.get(0), caps.get(2), caps.get(3)) else {
            continue;
        };
        let glued = s[whole.end()..]
            .chars()
            .next()
            .map(|c| c.is_alphanumeric())
            .unwrap_or(false);
        if glued {
            continue;
        }
        out.push_str(&s[last..open.start()]);
        out.push_str(inner.as_str());
        last = whole.end();
    }
    out.push_str(&s[last..]);
    out
}

/// Rewrite `p<0.05`, `P < .05`, `p = 0.001` ... to `p < .05` style (lowercase `p`, spaced operator,
/// no leading zero).
pub fn canonicalize_p_values(s: &str) -> String {
    P_VALUE
        .replace_all(s, |c: &Captures| format!("p {} .{}", &c[1], &c[2]))
        .into_owned()
}

/// A rewritten view of some source text with a per-char map back to source byte ranges.
#[derive(Debug, Clone)]
pub struct MappedText {
    text: String,
    spans: Vec<(usize, usize)>,
}

impl MappedText {
    pub fn new(source: &str) -> Self {
        Self {
            text: source.to_string(),
            spans: source
                .char_indices()
                .map(|(i, c)| (i, i + c.len_utf8()))
                .collect(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    fn chars_with_spans(&self) -> impl Iterator<Item = (char, (usize, usize))> + '_ {
        self.text.chars().zip(self.spans.iter().copied())
    }

    pub fn lowercase(&self) -> Self {
        let mut text = String::with_capacity(self.text.len());
        let mut spans = Vec::with_capacity(self.spans.len());
        for (ch, span) in self.chars_with_spans() {
            for lc in ch.to_lowercase() {
                text.push(lc);
                spans.push(span);
            }
        }
        Self { text, spans }
    }

    /// Collapse each whitespace run to one space covering the whole run.
    pub fn collapse_whitespace(&self) -> Self {
        let mut text = String::with_capacity(self.text.len());
        let mut spans: Vec<(usize, usize)> = Vec::with_capacity(self.spans.len());
        let mut in_ws = false;
        for (ch, span) in self.chars_with_spans() {
            if ch.is_whitespace() {
                if in_ws {
                    if let Some(last) = spans.last_mut() {
                        last.1 = span.1;
                    }
                } else {
                    text.push(' ');
                    spans.push(span);
                    in_ws = true;
                }
            } else {
                text.push(ch);
                spans.push(span);
                in_ws = false;
            }
        }
        Self { text, spans }
    }

    pub fn strip_chars(&self, drop: impl Fn(char) -> bool) -> Self {
        let mut text = String::with_capacity(self.text.len());
        let mut spans = Vec::with_capacity(self.spans.len());
        for (ch, span) in self.chars_with_spans() {
            if !drop(ch) {
                text.push(ch);
                spans.push(span);
            }
        }
        Self { text, spans }
    }

    pub fn canonicalize_p_values(&self) -> Self {
        self.replace_all(&P_VALUE, |c| format!("p {} .{}", &c[1], &c[2]))
    }

    /// Regex rewrite; every replacement char maps to the full source range of its match.
    fn replace_all(&self, re: &Regex, rep: impl Fn(&Captures) -> String) -> Self {
        let mut text = String::with_capacity(self.text.len());
        let mut spans = Vec::with_capacity(self.spans.len());
        let mut last_byte = 0usize;
        let mut last_char = 0usize;
        for caps in re.captures_iter(&self.text) {
            let Some(m) = caps.get(0) else {
                continue;
            };
            if m.start() == m.end() {
                continue;
            }
            let before = &self.text[last_byte..m.start()];
            let before_chars = before.chars().count();
            text.push_str(before);
            spans.extend_from_slice(&self.spans[last_char..last_char + before_chars]);

            let match_chars = m.as_str().chars().count();
            let first = last_char + before_chars;
            let covered = (self.spans[first].0, self.spans[first + match_chars - 1].1);
            for ch in rep(&caps).chars() {
                text.push(ch);
                spans.push(covered);
            }
            last_byte = m.end();
            last_char = first + match_chars;
        }
        text.push_str(&self.text[last_byte..]);
        spans.extend_from_slice(&self.spans[last_char..]);
        Self { text, spans }
    }

    /// First occurrence of `needle`, as a byte range of the source text.
    pub fn find(&self, needle: &str) -> Option<Range<usize>> {
        if needle.is_empty() {
            return None;
        }
        let at = self.text.find(needle)?;
        self.source_range(at, needle)
    }

    /// First occurrence of `needle` not glued to alphanumerics on either side.
    pub fn find_word(&self, needle: &str) -> Option<Range<usize>> {
        if needle.is_empty() {
            return None;
        }
        for (at, m) in self.text.match_indices(needle) {
            let before = self.text[..at].chars().next_back();
            let after = self.text[at + m.len()..].chars().next();
            let glued = |c: Option<char>| c.map(|c| c.is_alphanumeric()).unwrap_or(false);
            if !glued(before) && !glued(after) {
                return self.source_range(at, needle);
            }
        }
        None
    }

    fn source_range(&self, at: usize, needle: &str) -> Option<Range<usize>> {
        let first = self.text[..at].chars().count();
        let n = needle.chars().count();
        let start = self.spans.get(first)?.0;
        let end = self.spans.get(first + n - 1)?.1;
        Some(start..end)
    }
}
