//! The reveal cursor: how many entities of the concatenated
//! tiles-then-objects sequence are currently exposed.

/// Monotonic-range position over `[0, len]`. Fractional values come from
/// rate-based animation; the integer part is the revealed count.
#[derive(Clone, Copy, Debug)]
pub struct Cursor {
    position: f32,
    limit: usize,
}

impl Cursor {
    pub fn new(limit: usize) -> Cursor {
        Cursor { position: 0.0, limit }
    }

    pub fn position(&self) -> f32 {
        self.position
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// How many entities are revealed.
    pub fn revealed(&self) -> usize {
        self.position as usize
    }

    pub fn at_end(&self) -> bool {
        self.revealed() >= self.limit
    }

    /// Re-clamps after a cache rebuild. Never reports an edge: switching
    /// rooms must not fire checks by itself.
    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit;
        self.position = self.position.min(limit as f32);
    }

    /// Direct scrub to an absolute position.
    pub fn jump(&mut self, position: f32) -> Option<usize> {
        self.move_to(position)
    }

    /// Rate-based advance (may be negative).
    pub fn advance(&mut self, delta: f32) -> Option<usize> {
        self.move_to(self.position + delta)
    }

    /// Clamps into range and reports the index of the last revealed entity
    /// when the integer part changed. A step that crosses several integers
    /// still reports only the final edge: entities skipped over are never
    /// retroactively inspected.
    fn move_to(&mut self, position: f32) -> Option<usize> {
        let before = self.revealed();
        self.position = position.max(0.0).min(self.limit as f32);
        let after = self.revealed();
        if after != before && after > 0 { Some(after - 1) } else { None }
    }
}
