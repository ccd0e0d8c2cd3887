/// A change in a dependency's health.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Up,
    Down,
}

/// Remembers the last observed health of one dependency and reports only changes.
#[derive(Debug, Clone, Default)]
pub struct EdgeLatch {
    last: Option<bool>,
}

impl EdgeLatch {
    /// Nothing observed yet: the first observation is always an edge.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(value: bool) -> Self {
        Self { last: Some(value) }
    }

    pub fn current(&self) -> Option<bool> {
        self.last
    }

    pub fn observe(&mut self, ok: bool) -> Option<Edge> {
        if self.last == Some(ok) {
            return None;
        }
        self.last = Some(ok);
        Some(if ok { Edge::Up } else { Edge::Down })
    }
}
