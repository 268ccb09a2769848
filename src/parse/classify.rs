// src/parse/classify.rs

//! Per-line recognizers for robocopy's console output.
//!
//! The format is not documented, so every recognizer is a tolerant pattern
//! match. A line that matches nothing yields no events; nothing here returns
//! an error or panics on odd input.

use std::sync::LazyLock;

use regex::Regex;

/// What a file marker says happened to the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileClass {
    New,
    Newer,
    Changed,
    Modified,
    Tweaked,
    Older,
    Same,
    Lonely,
    Extra,
}

/// Coarse grouping of [`FileClass`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileDisposition {
    Copied,
    Skipped,
    Extra,
}

impl FileClass {
    fn from_marker(marker: &str) -> Option<Self> {
        let class = match marker.to_ascii_lowercase().as_str() {
            "new file" => FileClass::New,
            "newer" => FileClass::Newer,
            "changed" => FileClass::Changed,
            "modified" => FileClass::Modified,
            "tweaked" => FileClass::Tweaked,
            "older" => FileClass::Older,
            "same" => FileClass::Same,
            "lonely" => FileClass::Lonely,
            "*extra file" => FileClass::Extra,
            _ => return None,
        };
        Some(class)
    }

    pub fn disposition(self) -> FileDisposition {
        match self {
            FileClass::New
            | FileClass::Newer
            | FileClass::Changed
            | FileClass::Modified
            | FileClass::Tweaked
            | FileClass::Older => FileDisposition::Copied,
            FileClass::Same | FileClass::Lonely => FileDisposition::Skipped,
            FileClass::Extra => FileDisposition::Extra,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirClass {
    New,
    Extra,
    Existing,
}

/// Row label of the terminal summary table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryRowKind {
    Dirs,
    Files,
    Bytes,
    Times,
}

/// A value cell of a summary row with the byte offset where it ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryCell {
    pub end: usize,
    pub text: String,
}

/// Structured event extracted from one line.
#[derive(Debug, Clone, PartialEq)]
pub enum LineEvent {
    Dir {
        class: DirClass,
        path: String,
    },
    File {
        class: FileClass,
        size: Option<u64>,
        path: String,
    },
    Percent(f64),
    Error {
        code: u32,
        message: String,
    },
    SummaryHeader {
        column_ends: Vec<usize>,
    },
    SummaryRow {
        kind: SummaryRowKind,
        cells: Vec<SummaryCell>,
    },
    /// Low-priority guess that the line names the item being worked on.
    PathHint(String),
}

static FILE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?P<class>(?i:\*EXTRA File|New File|Newer|Older|Changed|Same|Tweaked|Modified|Lonely))\s+(?P<size>\d+(?:\.\d+)?(?: ?[kmgtKMGT]\b)?)\s+(?P<path>\S.*?)\s*$",
    )
    .expect("file marker regex")
});

static DIR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?P<class>(?i:\*EXTRA Dir|New Dir))\s+(?:-?\d+\t\s*)?(?P<path>\S.*?)\s*$",
    )
    .expect("dir marker regex")
});

static EXISTING_DIR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*-?\d+\t\s*(?P<path>\S.*[\\/])\s*$").expect("existing dir regex")
});

static ERROR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bERROR\s+(?P<code>\d+)\s+\(0x[0-9A-Fa-f]+\)\s*(?P<msg>.*?)\s*$")
        .expect("error line regex")
});

static SUMMARY_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*Total\s+Copied\s+Skipped\s+Mismatch\s+FAILED\s+Extras\s*$")
        .expect("summary header regex")
});

static SUMMARY_ROW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?P<label>Dirs|Files|Bytes|Times)\s*:").expect("summary row regex")
});

static WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\S+").expect("word regex"));
static COUNT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("count regex"));
static BYTES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d+(?:\.\d+)?(?: ?[kmgtKMGT]\b)?").expect("bytes regex")
});
static TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+:\d{2}:\d{2}").expect("time regex"));
static PERCENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(?:\.\d+)?%$").expect("percent regex"));

/// Classify one line into zero or more events.
///
/// Recognizers run in priority order: summary table, error line, directory
/// marker, file marker (which may also carry a trailing percentage), bare
/// percentage, then the generic path hint.
pub fn classify(line: &str) -> Vec<LineEvent> {
    if let Some(ev) = summary_header(line).or_else(|| summary_row(line)) {
        return vec![ev];
    }

    if let Some(ev) = error_line(line) {
        return vec![ev];
    }

    if let Some(ev) = dir_marker(line) {
        return vec![ev];
    }

    if let Some(events) = file_marker(line) {
        return events;
    }

    if let Some(p) = last_percent(line) {
        return vec![LineEvent::Percent(p)];
    }

    path_hint(line).into_iter().collect()
}

fn summary_header(line: &str) -> Option<LineEvent> {
    if !SUMMARY_HEADER_RE.is_match(line) {
        return None;
    }
    let column_ends = WORD_RE.find_iter(line).map(|m| m.end()).collect();
    Some(LineEvent::SummaryHeader { column_ends })
}

fn summary_row(line: &str) -> Option<LineEvent> {
    let caps = SUMMARY_ROW_RE.captures(line)?;
    let kind = match &caps["label"] {
        "Dirs" => SummaryRowKind::Dirs,
        "Files" => SummaryRowKind::Files,
        "Bytes" => SummaryRowKind::Bytes,
        _ => SummaryRowKind::Times,
    };

    let offset = caps.get(0).map(|m| m.end()).unwrap_or(0);
    let rest = &line[offset..];
    let re: &Regex = match kind {
        SummaryRowKind::Dirs | SummaryRowKind::Files => &*COUNT_RE,
        SummaryRowKind::Bytes => &*BYTES_RE,
        SummaryRowKind::Times => &*TIME_RE,
    };

    let cells: Vec<SummaryCell> = re
        .find_iter(rest)
        .map(|m| SummaryCell {
            end: offset + m.end(),
            text: m.as_str().to_string(),
        })
        .collect();

    if cells.is_empty() {
        return None;
    }
    Some(LineEvent::SummaryRow { kind, cells })
}

fn error_line(line: &str) -> Option<LineEvent> {
    let caps = ERROR_RE.captures(line)?;
    let code = caps["code"].parse().ok()?;
    Some(LineEvent::Error {
        code,
        message: caps["msg"].to_string(),
    })
}

fn dir_marker(line: &str) -> Option<LineEvent> {
    if let Some(caps) = DIR_RE.captures(line) {
        let class = if caps["class"].starts_with('*') {
            DirClass::Extra
        } else {
            DirClass::New
        };
        return Some(LineEvent::Dir {
            class,
            path: caps["path"].to_string(),
        });
    }

    let caps = EXISTING_DIR_RE.captures(line)?;
    Some(LineEvent::Dir {
        class: DirClass::Existing,
        path: caps["path"].to_string(),
    })
}

fn file_marker(line: &str) -> Option<Vec<LineEvent>> {
    let caps = FILE_RE.captures(line)?;
    let class = FileClass::from_marker(&caps["class"])?;
    let size = parse_size(&caps["size"]);

    // Robocopy may print the per-file percentage right after the path.
    let mut path = caps["path"].trim_end();
    let mut percent = None;
    while let Some((head, tail)) = path.rsplit_once(|c: char| c.is_whitespace()) {
        match parse_percent_token(tail) {
            Some(p) => {
                percent.get_or_insert(p);
                path = head.trim_end();
            }
            None => break,
        }
    }

    let mut events = vec![LineEvent::File {
        class,
        size,
        path: path.to_string(),
    }];
    events.extend(percent.map(LineEvent::Percent));
    Some(events)
}

/// Last standalone `<number>%` token of the line, if it is within 0..=100.
pub fn last_percent(line: &str) -> Option<f64> {
    line.split(|c: char| c.is_whitespace())
        .filter(|t| !t.is_empty())
        .filter(|t| PERCENT_RE.is_match(t))
        .last()
        .and_then(parse_percent_token)
}

fn parse_percent_token(token: &str) -> Option<f64> {
    if !PERCENT_RE.is_match(token) {
        return None;
    }
    let value: f64 = token.trim_end_matches('%').parse().ok()?;
    (0.0..=100.0).contains(&value).then_some(value)
}

fn path_hint(line: &str) -> Option<LineEvent> {
    let mut fields = line.split('\t').map(str::trim).filter(|f| !f.is_empty());
    let field = fields.next()?;
    if fields.next().is_some() {
        return None;
    }

    let looks_like_path = (field.contains('\\') || field.contains('/'))
        && !field.ends_with(['\\', '/'])
        && !field.contains(" : ")
        && is_item_candidate(field);

    looks_like_path.then(|| LineEvent::PathHint(field.to_string()))
}

/// Whether `text` may become the current item: separator runs and bare
/// digit sequences are excluded.
pub fn is_item_candidate(text: &str) -> bool {
    let text = text.trim();
    if text.is_empty() {
        return false;
    }
    let separators_only = text
        .chars()
        .all(|c| matches!(c, '-' | '=' | '_' | '*') || c.is_whitespace());
    let digits_only = text.chars().all(|c| c.is_ascii_digit());
    !separators_only && !digits_only
}

/// Parse a robocopy size token such as `12345`, `1.2 m` or `3g` into bytes.
pub fn parse_size(token: &str) -> Option<u64> {
    let token = token.trim();
    let (number, unit) = match token.char_indices().find(|(_, c)| c.is_ascii_alphabetic()) {
        Some((i, _)) => (token[..i].trim(), token[i..].trim()),
        None => (token, ""),
    };

    let value: f64 = number.parse().ok()?;
    let multiplier: f64 = match unit.to_ascii_lowercase().as_str() {
        "" => 1.0,
        "k" => 1024.0,
        "m" => 1024.0 * 1024.0,
        "g" => 1024.0 * 1024.0 * 1024.0,
        "t" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        _ => return None,
    };

    let bytes = (value * multiplier).round();
    (bytes.is_finite() && bytes >= 0.0).then_some(bytes as u64)
}
