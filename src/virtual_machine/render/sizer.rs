//! Sink pagination.
//!
//! [`split`] decides page boundaries over a list of lines given the capacity
//! left after the static parts of a page and the byte reservations for the
//! browse controls. [`Sizer`] applies it to a sink value and keeps the result
//! as one flattened string: pages are joined by `\n`, lines within a page by
//! `\0`, with a byte cursor at the start of every page.

use crate::virtual_machine::render::RenderError;
use std::ops::Range;

/// Bytes held back on a page for browse controls.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Reserve {
    /// First page of several: only "next" shows.
    pub next: usize,
    /// Last page of several: only "previous" shows.
    pub previous: usize,
    /// Middle page: both show.
    pub both: usize,
}

impl Reserve {
    /// Builds a reservation from [`Menu::sizes`](super::Menu::sizes).
    pub fn from_sizes(sizes: [usize; 4]) -> Self {
        Self {
            next: sizes[1],
            previous: sizes[2],
            both: sizes[3],
        }
    }
}

/// Joined length of `lines` with one separator between each.
fn span(lines: &[&str]) -> usize {
    let bytes: usize = lines.iter().map(|l| l.len()).sum();
    bytes + lines.len().saturating_sub(1)
}

/// Splits `lines` into page ranges, each fitting `remaining` bytes minus the
/// reservation for its position.
pub fn split(
    lines: &[&str],
    remaining: usize,
    reserve: Reserve,
) -> Result<Vec<Range<usize>>, RenderError> {
    let mut pages = Vec::new();
    let mut start = 0;
    loop {
        let first = pages.is_empty();
        let last_cap = if first {
            remaining
        } else {
            remaining.saturating_sub(reserve.previous)
        };
        if span(&lines[start..]) <= last_cap {
            pages.push(start..lines.len());
            return Ok(pages);
        }

        let cap = if first {
            remaining.saturating_sub(reserve.next)
        } else {
            remaining.saturating_sub(reserve.both)
        };
        let mut end = start;
        let mut used = 0;
        while end < lines.len() {
            let add = lines[end].len() + usize::from(end > start);
            if used + add > cap {
                break;
            }
            used += add;
            end += 1;
        }
        if end == start {
            return Err(RenderError::LineTooLong {
                len: lines[start].len(),
                capacity: cap,
            });
        }
        pages.push(start..end);
        start = end;
    }
}

/// Per-render pagination state for one sink value.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Sizer {
    budget: usize,
    sink: Option<String>,
    flat: String,
    cursors: Vec<usize>,
}

impl Sizer {
    pub fn new(budget: usize) -> Self {
        Self {
            budget,
            ..Self::default()
        }
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Symbol whose value was paginated.
    pub fn sink(&self) -> Option<&str> {
        self.sink.as_deref()
    }

    /// Splits `value` into pages and returns the page count.
    pub fn paginate(
        &mut self,
        sink: &str,
        value: &str,
        remaining: usize,
        reserve: Reserve,
    ) -> Result<usize, RenderError> {
        let lines: Vec<&str> = value.split('\n').collect();
        let ranges = split(&lines, remaining, reserve)?;

        self.sink = Some(sink.to_string());
        self.flat.clear();
        self.cursors.clear();
        for (i, range) in ranges.iter().enumerate() {
            if i > 0 {
                self.flat.push('\n');
            }
            self.cursors.push(self.flat.len());
            self.flat.push_str(&lines[range.clone()].join("\0"));
        }
        Ok(self.cursors.len())
    }

    pub fn pages(&self) -> usize {
        self.cursors.len()
    }

    /// Byte offsets of each page in the flattened sink.
    pub fn cursors(&self) -> &[usize] {
        &self.cursors
    }

    /// Content of page `index` with its line breaks restored.
    pub fn page(&self, index: usize) -> Option<String> {
        let start = *self.cursors.get(index)?;
        let end = match self.cursors.get(index + 1) {
            Some(next) => next - 1,
            None => self.flat.len(),
        };
        Some(self.flat[start..end].replace('\0', "\n"))
    }
}
