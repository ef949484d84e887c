bitflags::bitflags! {
    /// Side effects recorded on a fiber during render and consumed by commit.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Flags: u32 {
        const PLACEMENT = 1 << 0;
        const UPDATE = 1 << 1;
        const CHILD_DELETION = 1 << 2;
        /// The fiber has passive effects to run after commit.
        const PASSIVE_EFFECT = 1 << 3;

        const MUTATION_MASK = Self::PLACEMENT.bits()
            | Self::UPDATE.bits()
            | Self::CHILD_DELETION.bits();

        /// Deletions may unmount effects, so they count as passive work too.
        const PASSIVE_MASK = Self::PASSIVE_EFFECT.bits() | Self::CHILD_DELETION.bits();
    }
}

pub const NO_FLAGS: Flags = Flags::empty();

bitflags::bitflags! {
    /// Tags carried by individual effect records.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct HookFlags: u8 {
        /// The effect must fire during the next passive flush.
        const HAS_EFFECT = 1 << 0;
        const PASSIVE = 1 << 1;
    }
}
