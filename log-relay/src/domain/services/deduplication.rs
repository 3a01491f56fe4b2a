/// Position into one key's remote log: the count of entries already
/// delivered. Holds no message bodies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogCursor(usize);

/// Outcome of moving a cursor over one fetched log
#[derive(Debug, PartialEq, Eq)]
pub enum CursorAdvance<'a, T> {
    /// Entries not seen before, in remote order
    Fresh {
        entries: &'a [T],
        /// Unseen entries held back by the batch cap
        withheld: usize,
    },
    /// The remote log is shorter than what was already delivered.
    /// Nothing is returned and the cursor is left untouched.
    Shrunk { remote_len: usize, cursor: usize },
}

impl LogCursor {
    pub fn new() -> Self {
        LogCursor(0)
    }

    pub fn position(&self) -> usize {
        self.0
    }

    /// Return `raw[cursor..]` (at most `max_batch` entries) and move past it.
    pub fn advance<'a, T>(&mut self, raw: &'a [T], max_batch: usize) -> CursorAdvance<'a, T> {
        let remote_len = raw.len();
        if remote_len < self.0 {
            return CursorAdvance::Shrunk {
                remote_len,
                cursor: self.0,
            };
        }

        let end = remote_len.min(self.0.saturating_add(max_batch));
        let entries = &raw[self.0..end];
        self.0 = end;

        CursorAdvance::Fresh {
            entries,
            withheld: remote_len - end,
        }
    }
}
