//! Splits DOCX preview text into runs for highlighting.
//!
//! `{{field}}` marks a placeholder. Sample-filled previews mark substituted
//! values as `«value»`; those are only looked for on lines without placeholders.
//! Unbalanced delimiters are left as plain text.

use once_cell::sync::Lazy;
use regex::Regex;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{([^}]+)\}\}").expect("static regex"));
static SAMPLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"«([^»]+)»").expect("static regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Run {
    Text(String),
    Placeholder(String),
    Sample(String),
}

impl Run {
    pub fn content(&self) -> &str {
        match self {
            Run::Text(s) | Run::Placeholder(s) | Run::Sample(s) => s,
        }
    }
}

pub fn segment_line(line: &str) -> Vec<Run> {
    let mut runs = split_with(line, &PLACEHOLDER, Run::Placeholder);
    if runs.len() == 1 && matches!(runs[0], Run::Text(_)) {
        runs = split_with(line, &SAMPLE, Run::Sample);
    }
    runs
}

pub fn segment(text: &str) -> Vec<Vec<Run>> {
    text.split('\n').map(segment_line).collect()
}

/// Distinct placeholder names in document order.
pub fn placeholders(text: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for cap in PLACEHOLDER.captures_iter(text) {
        let name = cap[1].to_string();
        if !seen.contains(&name) {
            seen.push(name);
        }
    }
    seen
}

fn split_with(line: &str, re: &Regex, marked: fn(String) -> Run) -> Vec<Run> {
    let mut runs = Vec::new();
    let mut last = 0;
    for cap in re.captures_iter(line) {
        let Some(whole) = cap.get(0) else { continue };
        if whole.start() > last {
            runs.push(Run::Text(line[last..whole.start()].to_string()));
        }
        runs.push(marked(cap[1].to_string()));
        last = whole.end();
    }
    if last < line.len() || runs.is_empty() {
        runs.push(Run::Text(line[last..].to_string()));
    }
    runs
}
