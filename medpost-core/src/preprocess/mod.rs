//! reStructuredText normalization.
//!
//! Source lines are passed through an ordered [`LinePipeline`] of
//! independent [`LineRule`]s before the text is handed to the document
//! compiler. The rules adapt constructs the S5 writer renders badly:
//!
//! 1. [`TodoAdmonition`] - `.. todo::` becomes a `.. note::` prefixed `TODO: `
//! 2. [`CodeBlockLanguage`] - `.. code-block:: lang` loses its language argument
//! 3. [`OrderedListMarker`] - `1. item` / `#. item` becomes literal-indented text
//!
//! Line terminators are preserved; rules only ever see the line content.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

pub mod compiler;

/// Prepended to every normalized document so raw-HTML `:index:` markers
/// in the source are accepted.
pub const PREAMBLE: &str = ".. role:: index(raw)\n   :format: html\n\n";

/// A single line transformation.
pub trait LineRule: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Rewrite one line, without its terminator.
    fn apply<'a>(&self, line: &'a str) -> Cow<'a, str>;
}

/// Replaces the `todo` admonition with a `note` that keeps the marker visible.
#[derive(Debug, Default, Clone, Copy)]
pub struct TodoAdmonition;

impl TodoAdmonition {
    const FROM: &'static str = ".. todo:: ";
    const TO: &'static str = ".. note:: TODO: ";
}

impl LineRule for TodoAdmonition {
    fn name(&self) -> &'static str {
        "todo-admonition"
    }

    fn apply<'a>(&self, line: &'a str) -> Cow<'a, str> {
        if line.contains(Self::FROM) {
            Cow::Owned(line.replace(Self::FROM, Self::TO))
        } else {
            Cow::Borrowed(line)
        }
    }
}

/// Truncates a `code-block` directive to the bare directive.
#[derive(Debug, Default, Clone, Copy)]
pub struct CodeBlockLanguage;

impl CodeBlockLanguage {
    const DIRECTIVE: &'static str = ".. code-block::";
}

impl LineRule for CodeBlockLanguage {
    fn name(&self) -> &'static str {
        "code-block-language"
    }

    fn apply<'a>(&self, line: &'a str) -> Cow<'a, str> {
        match line.find(Self::DIRECTIVE) {
            Some(i) if line.len() > i + Self::DIRECTIVE.len() => {
                Cow::Owned(format!("{}{}", &line[..i], Self::DIRECTIVE))
            }
            _ => Cow::Borrowed(line),
        }
    }
}

static ORDERED_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\s*)(?:#|\d+)\.\s(\S.*)$").expect("ordered list pattern is valid")
});

/// Replaces an enumerated list marker with three spaces of literal indent.
#[derive(Debug, Default, Clone, Copy)]
pub struct OrderedListMarker;

impl LineRule for OrderedListMarker {
    fn name(&self) -> &'static str {
        "ordered-list-marker"
    }

    fn apply<'a>(&self, line: &'a str) -> Cow<'a, str> {
        match ORDERED_ITEM.captures(line) {
            Some(caps) => Cow::Owned(format!("{}   {}", &caps[1], &caps[2])),
            None => Cow::Borrowed(line),
        }
    }
}

/// Ordered sequence of line rules.
pub struct LinePipeline {
    rules: Vec<Box<dyn LineRule>>,
}

impl LinePipeline {
    /// Empty pipeline.
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// The three rules used for every document, in order.
    pub fn standard() -> Self {
        Self::new()
            .with_rule(TodoAdmonition)
            .with_rule(CodeBlockLanguage)
            .with_rule(OrderedListMarker)
    }

    /// Append a rule.
    pub fn with_rule(mut self, rule: impl LineRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    /// Names of the configured rules, in application order.
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Apply every rule to one line (without terminator).
    pub fn rewrite_line(&self, line: &str) -> String {
        let mut current = line.to_string();
        for rule in &self.rules {
            let next = rule.apply(&current).into_owned();
            current = next;
        }
        current
    }

    /// Apply the rules to every line of `source`, keeping line terminators.
    pub fn rewrite(&self, source: &str) -> String {
        let mut out = String::with_capacity(source.len());
        for raw in source.split_inclusive('\n') {
            let (line, terminator) = split_terminator(raw);
            let rewritten = self.rewrite_line(line);
            if rewritten != line {
                tracing::trace!("rewrote {:?} -> {:?}", line, rewritten);
            }
            out.push_str(&rewritten);
            out.push_str(terminator);
        }
        out
    }

    /// Rewrite `source` and prepend the [`PREAMBLE`].
    pub fn normalize(&self, source: &str) -> String {
        let mut out = String::from(PREAMBLE);
        out.push_str(&self.rewrite(source));
        out
    }
}

impl Default for LinePipeline {
    fn default() -> Self {
        Self::standard()
    }
}

fn split_terminator(raw: &str) -> (&str, &str) {
    if let Some(line) = raw.strip_suffix("\r\n") {
        (line, "\r\n")
    } else if let Some(line) = raw.strip_suffix('\n') {
        (line, "\n")
    } else {
        (raw, "")
    }
}
