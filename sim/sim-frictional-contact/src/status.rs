//! Structural-change status of an assembly pass.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Outcome tag of a residual pass.
///
/// `StructuralChange` means the set or meaning of the assembled equations
/// differs from the previous pass: a point switched between stick and slip,
/// became active or inactive, or the number of contact unknowns changed.
/// The caller must discard its most recent Jacobian and assemble a new one
/// before continuing Newton iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[must_use]
pub enum AssemblyStatus {
    /// Equations keep their previous structure.
    #[default]
    Unchanged,
    /// Equations changed; the Jacobian must be recomputed.
    StructuralChange,
}

impl AssemblyStatus {
    /// Status from a "did anything change" flag.
    pub fn from_changed(changed: bool) -> Self {
        if changed {
            Self::StructuralChange
        } else {
            Self::Unchanged
        }
    }

    /// Combine two statuses; any structural change wins.
    pub fn merge(self, other: Self) -> Self {
        Self::from_changed(self.is_structural_change() || other.is_structural_change())
    }

    /// Whether the caller must recompute its Jacobian.
    #[must_use]
    pub fn is_structural_change(self) -> bool {
        matches!(self, Self::StructuralChange)
    }
}

impl std::ops::BitOr for AssemblyStatus {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.merge(rhs)
    }
}

impl std::ops::BitOrAssign for AssemblyStatus {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.merge(rhs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_keeps_structural_change() {
        use AssemblyStatus::{StructuralChange, Unchanged};
        assert_eq!(Unchanged.merge(Unchanged), Unchanged);
        assert_eq!(Unchanged.merge(StructuralChange), StructuralChange);
        assert_eq!(StructuralChange | Unchanged, StructuralChange);

        let mut status = Unchanged;
        status |= StructuralChange;
        status |= Unchanged;
        assert!(status.is_structural_change());
    }
}
