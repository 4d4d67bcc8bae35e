use std::fmt;
use std::hash::{Hash, Hasher};

/// Kind of state block carried by a trajectory knot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StateKind {
    Pose,
    Velocity,
}

/// Addresses one 6-dimensional state block: the pose or the velocity of a knot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct StateKey {
    pub knot: usize,
    pub kind: StateKind,
}

impl StateKey {
    pub const DIM: usize = 6;

    pub fn pose(knot: usize) -> Self {
        StateKey {
            knot,
            kind: StateKind::Pose,
        }
    }
    pub fn velocity(knot: usize) -> Self {
        StateKey {
            knot,
            kind: StateKind::Velocity,
        }
    }
    /// Dense index: poses on even slots, velocities on odd ones.
    pub fn index(&self) -> usize {
        match self.kind {
            StateKind::Pose => 2 * self.knot,
            StateKind::Velocity => 2 * self.knot + 1,
        }
    }
    pub fn dim(&self) -> usize {
        Self::DIM
    }
}

// single write so that the key can be used with `BuildNoHashHasher`
impl Hash for StateKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.index())
    }
}
impl nohash_hasher::IsEnabled for StateKey {}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            StateKind::Pose => write!(f, "pose[{}]", self.knot),
            StateKind::Velocity => write!(f, "velocity[{}]", self.knot),
        }
    }
}
