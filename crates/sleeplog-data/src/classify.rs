//! Line classification for weekly sleep logs.
//!
//! A log is indentation-structured:
//!
//! ```text
//! Sleep log
//!     Thu6/19-Wed25
//!         1b. What time start winding down? 2:20am 2:50am . 2:10am 2:20am 3:20am 3:40am
//!             was up late reading
//!         ...
//! ```
//!
//! Depth 1 holds week headers, depth 2 holds numbered questions followed by
//! their seven day values, and anything deeper is a free-text note. Depth is
//! computed from leading whitespace alone ([`indent_depth`]) and content
//! shape is classified separately ([`classify`]).

use std::sync::OnceLock;

use regex::Regex;
use sleeplog_core::models::WeekLabel;

/// Columns one tab stands for.
const TAB_WIDTH: usize = 4;

/// A physical input line with its indentation depth and trimmed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine {
    /// 1-based line number in the source.
    pub number: usize,
    pub depth: usize,
    pub text: String,
}

impl RawLine {
    pub fn new(number: usize, raw: &str) -> Self {
        Self {
            number,
            depth: indent_depth(raw),
            text: raw.trim().to_string(),
        }
    }
}

/// Split text into numbered [`RawLine`]s.
///
/// Handles `\n`, `\r\n` and a leading byte-order mark.
pub fn split_lines(text: &str) -> Vec<RawLine> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    text.lines()
        .enumerate()
        .map(|(i, line)| RawLine::new(i + 1, line))
        .collect()
}

/// Indentation depth of `line`, in levels of one tab or four spaces.
///
/// Partial indentation rounds to the nearest level, so three or five spaces
/// are depth 1 and six spaces are depth 2.
pub fn indent_depth(line: &str) -> usize {
    let width: usize = line
        .chars()
        .take_while(|c| c.is_whitespace() && *c != '\n' && *c != '\r')
        .map(|c| if c == '\t' { TAB_WIDTH } else { 1 })
        .sum();
    (width + TAB_WIDTH / 2) / TAB_WIDTH
}

/// A numbered question line split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionLine {
    /// Leading label without its period, e.g. `1.2b`.
    pub label: String,
    /// Question wording, e.g. `What time start winding down?`.
    pub question: String,
    /// Whitespace-separated value tokens after the wording.
    pub tokens: Vec<String>,
}

/// Shape of one classified line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    WeekHeader(WeekLabel),
    Question(QuestionLine),
    /// Free text, or anything that fits no other shape.
    Note,
    /// A run of dots such as `...`.
    Divider,
    Blank,
}

/// A line together with its classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedLine {
    pub line: RawLine,
    pub kind: LineKind,
}

fn header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?:[A-Za-z]+\.?\s*)?(\d{1,2})/(\d{1,2})\s*[-–]\s*(?:[A-Za-z]+\.?\s*)?(?:(\d{1,2})/)?(\d{1,2})(?:\s.*)?$",
        )
        .expect("regex is valid")
    })
}

fn question_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d+[A-Za-z]*(?:\.\d+[A-Za-z]*)*)\.(?:\s+(.*))?$").expect("regex is valid")
    })
}

/// Classify one line by depth and content shape.
pub fn classify(line: &RawLine) -> LineKind {
    let text = line.text.as_str();
    if text.is_empty() {
        return LineKind::Blank;
    }
    if text.chars().all(|c| c == '.') {
        return LineKind::Divider;
    }
    match line.depth {
        1 => parse_week_header(text).map_or(LineKind::Note, LineKind::WeekHeader),
        2 => parse_question_line(text).map_or(LineKind::Note, LineKind::Question),
        _ => LineKind::Note,
    }
}

/// Classify every line in order.
pub fn classify_lines(lines: &[RawLine]) -> Vec<ClassifiedLine> {
    lines
        .iter()
        .map(|line| ClassifiedLine {
            kind: classify(line),
            line: line.clone(),
        })
        .collect()
}

/// Parse a date-range header such as `Thu6/19-Wed25`, `6/19-6/25` or
/// `Fri4/25-Wed4/30`.
///
/// Weekday prefixes are ignored. An end day without its own month inherits
/// the start month as written (`6/28-4` labels as `6/28-6/4`); day-slot
/// dates never depend on the end pair.
pub fn parse_week_header(text: &str) -> Option<WeekLabel> {
    let caps = header_re().captures(text.trim())?;
    let start_month: u32 = caps[1].parse().ok()?;
    let start_day: u32 = caps[2].parse().ok()?;
    let end_day: u32 = caps[4].parse().ok()?;
    let end_month: u32 = match caps.get(3) {
        Some(m) => m.as_str().parse().ok()?,
        None => start_month,
    };
    Some(WeekLabel {
        start_month,
        start_day,
        end_month,
        end_day,
    })
}

/// Parse a numbered question line such as
/// `14. If alcohol, how many standard drinks? 0 1.3 0 2 3 0 0`.
///
/// Wording ends at the first `?`. Without one, the trailing run of
/// value-looking tokens is taken as the values.
pub fn parse_question_line(text: &str) -> Option<QuestionLine> {
    let caps = question_re().captures(text.trim())?;
    let label = caps[1].to_string();
    let rest = caps.get(2).map_or("", |m| m.as_str()).trim();

    let (question, tokens) = match rest.split_once('?') {
        Some((wording, values)) => (
            format!("{}?", wording.trim()),
            values.split_whitespace().map(str::to_string).collect(),
        ),
        None => split_trailing_values(rest),
    };

    Some(QuestionLine {
        label,
        question,
        tokens,
    })
}

fn looks_like_value(token: &str) -> bool {
    token == "."
        || token.contains('|')
        || token.starts_with(|c: char| c.is_ascii_digit())
        || (token.starts_with('.') && token[1..].starts_with(|c: char| c.is_ascii_digit()))
}

fn split_trailing_values(rest: &str) -> (String, Vec<String>) {
    let words: Vec<&str> = rest.split_whitespace().collect();
    let first_value = words
        .iter()
        .rposition(|w| !looks_like_value(w))
        .map_or(0, |i| i + 1);
    let question = words[..first_value].join(" ");
    let tokens = words[first_value..].iter().map(|w| w.to_string()).collect();
    (question, tokens)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
