//! Priority lanes.
//!
//! A lane is a single bit; a set of pending lanes is the union of those bits.
//! Lower bits are higher priority, so the highest-priority lane of a set is
//! its lowest set bit.

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Lanes: u32 {
        const SYNC = 1 << 0;
        const INPUT_CONTINUOUS = 1 << 1;
        const DEFAULT = 1 << 2;
        const TRANSITION = 1 << 3;
        const IDLE = 1 << 29;
    }
}

/// A single lane. Always has at most one bit set.
pub type Lane = Lanes;

pub const NO_LANE: Lane = Lanes::empty();
pub const NO_LANES: Lanes = Lanes::empty();

impl Lanes {
    /// Returns the lowest set bit, i.e. the most urgent lane of the set.
    pub fn highest_priority(self) -> Lane {
        let bits = self.bits();
        Lanes::from_bits_retain(bits & bits.wrapping_neg())
    }

    pub fn merge(self, other: Lanes) -> Lanes {
        self | other
    }

    /// Whether every lane in `subset` is part of `self`.
    pub fn includes(self, subset: Lanes) -> bool {
        !subset.is_empty() && self.contains(subset)
    }

    pub fn without(self, lanes: Lanes) -> Lanes {
        self - lanes
    }
}

/// Lane assigned to updates that do not ask for a specific priority.
pub fn request_update_lane() -> Lane {
    Lanes::SYNC
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn highest_priority_picks_lowest_bit() {
        let pending = Lanes::DEFAULT | Lanes::TRANSITION | Lanes::INPUT_CONTINUOUS;
        assert_eq!(pending.highest_priority(), Lanes::INPUT_CONTINUOUS);
        assert_eq!(NO_LANES.highest_priority(), NO_LANE);
        assert_eq!(Lanes::IDLE.highest_priority(), Lanes::IDLE);
    }

    #[test]
    fn includes_requires_non_empty_subset() {
        let pending = Lanes::SYNC | Lanes::DEFAULT;
        assert!(pending.includes(Lanes::SYNC));
        assert!(!pending.includes(Lanes::TRANSITION));
        assert!(!pending.includes(NO_LANE));
        assert_eq!(pending.without(Lanes::SYNC), Lanes::DEFAULT);
    }
}
