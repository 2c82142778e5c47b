//! Bit layout of the feature words exchanged between the shape table, the
//! evaluator and the score table.
//!
//! A score key is a `u32`: the low 13 bits are the simples word, the honors
//! word sits at [`HONORS_SHIFT`].

/// The tiles decompose into melds plus at most one eye.
pub const WIN: u32 = 1 << 0;
pub const EYE: u32 = 1 << 1;
/// Nothing but (at most) the eye is left in hand.
pub const ONLY_EYE: u32 = 1 << 2;
pub const SINGLE_WAIT: u32 = 1 << 3;
pub const CONCEALED: u32 = 1 << 4;
pub const ALL_CHOW: u32 = 1 << 5;
pub const MIXED_SUIT: u32 = 1 << 6;
pub const PURE_SUIT: u32 = 1 << 7;
pub const ALL_PUNG: u32 = 1 << 8;
pub const PUNG_COUNT_SHIFT: u32 = 9;
pub const PUNG_COUNT: u32 = 0b111 << PUNG_COUNT_SHIFT;
pub const SELF_DRAW: u32 = 1 << 12;
pub const SIMPLES_BITS: u32 = 13;
pub const SIMPLES_MASK: u32 = (1 << SIMPLES_BITS) - 1;

pub const HONORS_SHIFT: u32 = 16;
pub const SEAT_WIND: u32 = 1 << 0;
pub const ROUND_WIND: u32 = 1 << 1;
pub const RED: u32 = 1 << 2;
pub const GREEN: u32 = 1 << 3;
pub const WHITE: u32 = 1 << 4;
pub const LITTLE_FOUR_WINDS: u32 = 1 << 5;
pub const BIG_FOUR_WINDS: u32 = 1 << 6;
pub const LITTLE_THREE_DRAGONS: u32 = 1 << 7;
pub const BIG_THREE_DRAGONS: u32 = 1 << 8;
pub const HONORS_BITS: u32 = 9;

/// Honor shape bits stored in [`Shape::honors`](super::shape::Shape).
/// Bit `i` for `i < 7` marks a triplet of honor value `i`.
pub mod shape {
    pub const PUNG_MASK: u16 = 0b111_1111;
    pub const WIND_PUNGS: u16 = 0b1111;
    pub const DRAGON_PUNGS: u16 = 0b111_0000;
    pub const LITTLE_FOUR_WINDS: u16 = 1 << 7;
    pub const BIG_FOUR_WINDS: u16 = 1 << 8;
    pub const LITTLE_THREE_DRAGONS: u16 = 1 << 9;
    pub const BIG_THREE_DRAGONS: u16 = 1 << 10;
}

#[inline]
#[must_use]
pub const fn pung_count(features: u32) -> u32 {
    (features & PUNG_COUNT) >> PUNG_COUNT_SHIFT
}

#[inline]
#[must_use]
pub const fn with_pung_count(features: u32, count: u32) -> u32 {
    let count = if count > 7 { 7 } else { count };
    (features & !PUNG_COUNT) | (count << PUNG_COUNT_SHIFT)
}

#[inline]
#[must_use]
pub const fn score_key(simples: u32, honors: u32) -> u32 {
    (simples & SIMPLES_MASK) | (honors << HONORS_SHIFT)
}
