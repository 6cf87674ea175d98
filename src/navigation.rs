/// Capability for bringing the post at an index into view. Best effort: it
/// reports nothing back and must not fail navigation.
pub trait ViewportScroller {
    fn bring_into_view(&self, index: usize);
}

/// Scroller for headless use (`--list`).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopScroller;

impl ViewportScroller for NoopScroller {
    fn bring_into_view(&self, _index: usize) {}
}

/// Index of the current post. Pending until the feed has posts or a deep
/// link sets it. A positional deep link may leave it past the end of the
/// feed; readers treat that as "still loading".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    index: Option<usize>,
}

impl Cursor {
    pub fn pending() -> Self {
        Self { index: None }
    }

    pub fn get(&self) -> Option<usize> {
        self.index
    }

    pub fn is_pending(&self) -> bool {
        self.index.is_none()
    }

    pub fn set(&mut self, index: usize) {
        self.index = Some(index);
    }

    /// Points the cursor at the first post once the feed is no longer empty.
    pub fn start_if_pending(&mut self, len: usize) -> bool {
        if self.index.is_none() && len > 0 {
            self.index = Some(0);
            true
        } else {
            false
        }
    }

    /// Returns whether the cursor moved.
    pub fn advance(&mut self, len: usize) -> bool {
        match self.index {
            Some(index) if index + 1 < len => {
                self.index = Some(index + 1);
                true
            }
            _ => false,
        }
    }

    pub fn retreat(&mut self) -> bool {
        match self.index {
            Some(index) if index > 0 => {
                self.index = Some(index - 1);
                true
            }
            _ => false,
        }
    }

    /// True when the cursor is within `threshold` posts of the end of the
    /// feed. A pending cursor counts as near the end.
    pub fn near_end(&self, len: usize, threshold: usize) -> bool {
        match self.index {
            Some(index) => index >= len.saturating_sub(threshold),
            None => true,
        }
    }

    /// The index if it points at an existing post.
    pub fn valid(&self, len: usize) -> Option<usize> {
        self.index.filter(|index| *index < len)
    }
}
