//! Structural segmentation of a multi-card vCard document.
//!
//! # Responsibility
//! - Unfold folded content lines.
//! - Cut the document into `BEGIN:VCARD` ... `END:VCARD` blocks, lazily and
//!   in document order.
//!
//! # Invariants
//! - Input text is never mutated.
//! - Segmentation never fails; content validation happens downstream.
//! - Blank lines and text outside any block are ignored.
//! - A leading UTF-8 byte-order mark is skipped.
//! - A vCard 2.1 `AGENT` card embedded after an empty `AGENT:` line stays
//!   inside its outer block: its lines are dropped and the outer card
//!   continues after the nested `END:VCARD`.

use log::{debug, warn};
use std::iter::Peekable;
use std::str::Lines;

const BYTE_ORDER_MARK: char = '\u{feff}';

/// Raw, unfolded content lines of one vCard, delimiters excluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StanzaBlock {
    /// Zero-based position of this block in the document.
    pub index: usize,
    /// Unfolded content lines with trailing whitespace removed.
    pub lines: Vec<String>,
    /// `false` when the block was closed implicitly (next `BEGIN` or EOF).
    pub terminated: bool,
}

/// Returns a lazy iterator over the stanza blocks of `document`.
pub fn split_stanzas(document: &str) -> StanzaSplitter<'_> {
    let document = document.strip_prefix(BYTE_ORDER_MARK).unwrap_or(document);
    StanzaSplitter {
        lines: LogicalLines {
            raw: document.lines().peekable(),
        },
        current: None,
        next_index: 0,
    }
}

/// Iterator returned by [`split_stanzas`].
pub struct StanzaSplitter<'a> {
    lines: LogicalLines<'a>,
    current: Option<OpenBlock>,
    next_index: usize,
}

/// Block being collected; `nested_depth` counts open embedded `AGENT` cards.
#[derive(Default)]
struct OpenBlock {
    lines: Vec<String>,
    nested_depth: usize,
}

impl OpenBlock {
    fn opens_nested_card(&self) -> bool {
        self.nested_depth > 0 || self.lines.last().is_some_and(|line| is_empty_agent(line))
    }
}

impl StanzaSplitter<'_> {
    fn finish(&mut self, open: OpenBlock, terminated: bool) -> StanzaBlock {
        let OpenBlock {
            lines,
            nested_depth,
        } = open;
        let index = self.next_index;
        self.next_index += 1;
        if !terminated {
            warn!(
                "event=vcard_split module=vcard status=unterminated stanza_index={} lines={} open_nested={}",
                index,
                lines.len(),
                nested_depth
            );
        }
        StanzaBlock {
            index,
            lines,
            terminated,
        }
    }
}

impl Iterator for StanzaSplitter<'_> {
    type Item = StanzaBlock;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let Some(line) = self.lines.next() else {
                return self.current.take().map(|open| self.finish(open, false));
            };

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            if is_delimiter(trimmed, "BEGIN") {
                if let Some(open) = self.current.as_mut() {
                    if open.opens_nested_card() {
                        open.nested_depth += 1;
                        debug!(
                            "event=vcard_split module=vcard status=nested_agent stanza_index={} depth={}",
                            self.next_index, open.nested_depth
                        );
                        continue;
                    }
                }
                if let Some(open) = self.current.replace(OpenBlock::default()) {
                    return Some(self.finish(open, false));
                }
                continue;
            }

            if is_delimiter(trimmed, "END") {
                match self.current.take() {
                    Some(mut open) if open.nested_depth > 0 => {
                        open.nested_depth -= 1;
                        self.current = Some(open);
                        continue;
                    }
                    Some(open) => return Some(self.finish(open, true)),
                    None => {
                        debug!("event=vcard_split module=vcard status=stray_end");
                        continue;
                    }
                }
            }

            if let Some(open) = self.current.as_mut() {
                if open.nested_depth == 0 {
                    open.lines.push(line);
                }
            }
        }
    }
}

/// Physical lines joined across folds (RFC 6350 section 3.2).
struct LogicalLines<'a> {
    raw: Peekable<Lines<'a>>,
}

impl Iterator for LogicalLines<'_> {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        let first = self.raw.next()?;
        let mut line = first.trim_end_matches('\r').to_string();
        while let Some(next) = self.raw.peek() {
            match next.strip_prefix(|c: char| c == ' ' || c == '\t') {
                Some(rest) => {
                    line.push_str(rest.trim_end_matches('\r'));
                    self.raw.next();
                }
                None => break,
            }
        }
        line.truncate(line.trim_end().len());
        Some(line)
    }
}

fn is_delimiter(line: &str, keyword: &str) -> bool {
    match line.split_once(':') {
        Some((name, value)) => {
            name.trim().eq_ignore_ascii_case(keyword) && value.trim().eq_ignore_ascii_case("VCARD")
        }
        None => false,
    }
}

/// `[group.]AGENT[;params]:` with no inline value announces an embedded card.
fn is_empty_agent(line: &str) -> bool {
    let Some((head, value)) = line.split_once(':') else {
        return false;
    };
    let name = head.split(';').next().unwrap_or_default();
    let name = name.rsplit('.').next().unwrap_or_default();
    name.trim().eq_ignore_ascii_case("AGENT") && value.trim().is_empty()
}
