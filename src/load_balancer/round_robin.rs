//! Round-robin rotation cursor.

/// Cursor over the registry's rotation order.
///
/// Lives inside the registry lock, so it needs no atomics. When the
/// rotation order shrinks under it the cursor wraps to the start.
#[derive(Debug, Default)]
pub struct RoundRobin {
    cursor: usize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index to use for a sequence of length `len`, then advance.
    pub fn next_index(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        if self.cursor >= len {
            self.cursor = 0;
        }
        let index = self.cursor;
        self.cursor += 1;
        Some(index)
    }
}
