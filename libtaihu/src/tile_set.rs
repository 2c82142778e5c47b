use crate::tile::{Suit, Tile};
use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use rand::Rng;
use serde_with::{DeserializeFromStr, SerializeDisplay};

/// Width in bits of one packed suit inside [`TileSet::translate`].
pub const SUIT_BITS: u32 = 27;
pub const SUIT_MASK: u32 = (1 << SUIT_BITS) - 1;

/// Per-suit tile counters, three bits per value.
///
/// A field never exceeds 4. `add` on a full field and `sub` on an empty one
/// are no-ops, so callers check `have`/`get` first when it matters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, SerializeDisplay, DeserializeFromStr)]
pub struct TileSet([u32; 5]);

#[inline]
const fn field(bits: u32, value: u8) -> u8 {
    ((bits >> (value as u32 * 3)) & 0b111) as u8
}

impl TileSet {
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self([0; 5])
    }

    /// A fresh wall. Number suits are always present.
    #[must_use]
    pub fn full_deck(honors: bool, flowers: bool) -> Self {
        let mut set = Self::new();
        for suit in Suit::ALL {
            let included = match suit {
                Suit::Honors => honors,
                Suit::Flowers => flowers,
                _ => true,
            };
            if !included {
                continue;
            }
            for value in 0..suit.len() {
                let tile = Tile::new_unchecked(suit, value);
                for _ in 0..suit.copies() {
                    set.add(tile);
                }
            }
        }
        set
    }

    #[inline]
    #[must_use]
    pub const fn get(&self, tile: Tile) -> u8 {
        field(self.0[tile.suit().as_usize()], tile.value())
    }

    #[inline]
    #[must_use]
    pub const fn have(&self, tile: Tile) -> bool {
        self.get(tile) > 0
    }

    #[inline]
    pub fn add(&mut self, tile: Tile) {
        if self.get(tile) < 4 {
            self.0[tile.suit().as_usize()] += 1 << (tile.value() as u32 * 3);
        }
    }

    #[inline]
    pub fn sub(&mut self, tile: Tile) {
        if self.get(tile) > 0 {
            self.0[tile.suit().as_usize()] -= 1 << (tile.value() as u32 * 3);
        }
    }

    pub fn add_n(&mut self, tile: Tile, n: u8) {
        (0..n).for_each(|_| self.add(tile));
    }

    pub fn sub_n(&mut self, tile: Tile, n: u8) {
        (0..n).for_each(|_| self.sub(tile));
    }

    /// Raw packed counters of one suit.
    #[inline]
    #[must_use]
    pub const fn suit(&self, suit: Suit) -> u32 {
        self.0[suit as usize]
    }

    #[must_use]
    pub fn suit_count(&self, suit: Suit) -> u32 {
        (0..suit.len()).map(|v| field(self.suit(suit), v) as u32).sum()
    }

    #[must_use]
    pub fn count(&self) -> u32 {
        Suit::ALL.iter().map(|&s| self.suit_count(s)).sum()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|&s| s == 0)
    }

    /// Tile at dense position `idx`, counting every copy, in suit then
    /// value order.
    #[must_use]
    pub fn at(&self, mut idx: u32) -> Option<Tile> {
        for suit in Suit::ALL {
            let bits = self.suit(suit);
            if bits == 0 {
                continue;
            }
            for value in 0..suit.len() {
                let n = field(bits, value) as u32;
                if idx < n {
                    return Some(Tile::new_unchecked(suit, value));
                }
                idx -= n;
            }
        }
        None
    }

    /// Removes and returns a tile chosen uniformly over the remaining copies.
    pub fn draw<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<Tile> {
        let count = self.count();
        if count == 0 {
            return None;
        }
        let tile = self.at(rng.random_range(0..count))?;
        self.sub(tile);
        Some(tile)
    }

    /// Packs the number suits and honors into one key, 27 bits per suit at
    /// offset `27 * suit`. The `excluded` suit is left zeroed; flowers are
    /// never included.
    #[must_use]
    pub fn translate(&self, excluded: Option<Suit>) -> u128 {
        [Suit::Characters, Suit::Dots, Suit::Bamboo, Suit::Honors]
            .into_iter()
            .filter(|&s| Some(s) != excluded)
            .fold(0, |acc, s| {
                acc | (self.suit(s) as u128) << (SUIT_BITS * s as u32)
            })
    }

    /// One suit's chunk out of a [`translate`](Self::translate)d key.
    #[inline]
    #[must_use]
    pub const fn chunk(packed: u128, suit: Suit) -> u32 {
        (packed >> (SUIT_BITS * suit as u32)) as u32 & SUIT_MASK
    }

    /// The suit's counters with every four-of-a-kind read as three.
    #[must_use]
    pub fn kongs_as_pungs(&self, suit: Suit) -> u32 {
        let bits = self.suit(suit);
        (0..suit.len())
            .filter(|&v| field(bits, v) == 4)
            .fold(bits, |acc, v| acc - (1 << (v as u32 * 3)))
    }

    /// Fieldwise sum, saturating each field at 4.
    #[must_use]
    pub fn merged(&self, other: &Self) -> Self {
        let mut out = *self;
        for tile in other.iter() {
            out.add(tile);
        }
        out
    }

    /// Every copy, in suit then value order.
    pub fn iter(&self) -> impl Iterator<Item = Tile> + '_ {
        Suit::ALL.into_iter().flat_map(move |suit| {
            (0..suit.len()).flat_map(move |value| {
                let tile = Tile::new_unchecked(suit, value);
                std::iter::repeat_n(tile, self.get(tile) as usize)
            })
        })
    }

    /// Distinct tiles held, each once.
    pub fn distinct(&self) -> impl Iterator<Item = Tile> + '_ {
        Suit::ALL.into_iter().flat_map(move |suit| {
            (0..suit.len())
                .map(move |value| Tile::new_unchecked(suit, value))
                .filter(|&t| self.have(t))
        })
    }

    #[must_use]
    pub fn to_tile_list(&self) -> Vec<Tile> {
        self.iter().collect()
    }

    #[must_use]
    pub fn has_suit(&self, suit: Suit) -> bool {
        self.suit(suit) != 0
    }
}

impl FromIterator<Tile> for TileSet {
    fn from_iter<I: IntoIterator<Item = Tile>>(iter: I) -> Self {
        let mut set = Self::new();
        iter.into_iter().for_each(|t| set.add(t));
        set
    }
}

/// Groups of one suit letter followed by 1-based digits, e.g. `"c123 d55 o111"`.
impl FromStr for TileSet {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut set = Self::new();
        for group in s.split_whitespace() {
            let mut chars = group.chars();
            let letter = chars.next().context("empty group")?;
            let suit =
                Suit::from_letter(letter).with_context(|| format!("unknown suit in {group:?}"))?;
            for c in chars {
                let Some(n) = c.to_digit(10).filter(|&n| n >= 1) else {
                    bail!("invalid digit {c:?} in {group:?}");
                };
                let tile = Tile::new(suit, n as u8 - 1)
                    .with_context(|| format!("value out of range in {group:?}"))?;
                if set.get(tile) == 4 {
                    bail!("more than four {tile} in {s:?}");
                }
                set.add(tile);
            }
        }
        Ok(set)
    }
}

impl fmt::Display for TileSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for suit in Suit::ALL {
            if !self.has_suit(suit) {
                continue;
            }
            if !first {
                write!(f, " ")?;
            }
            first = false;
            write!(f, "{}", suit.letter())?;
            for tile in self.iter().filter(|t| t.suit() == suit) {
                write!(f, "{}", tile.value() + 1)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
pub mod test {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn tile_strategy() -> impl Strategy<Value = Tile> {
        (0usize..5, 0u8..9).prop_filter_map("value out of range", |(s, v)| {
            Suit::from_index(s).and_then(|suit| Tile::new(suit, v))
        })
    }

    proptest! {
        #[test]
        fn add_then_sub_restores(
            tiles in prop::collection::vec(tile_strategy(), 0..40),
            t in tile_strategy(),
        ) {
            let s: TileSet = tiles.into_iter().collect();
            prop_assume!(s.get(t) < 4);
            let mut changed = s;
            changed.add(t);
            prop_assert_eq!(changed.get(t), s.get(t) + 1);
            changed.sub(t);
            prop_assert_eq!(changed, s);
        }
    }

    #[test]
    pub fn saturating_fields() {
        let t: Tile = "d9".parse().unwrap();
        let mut s = TileSet::new();
        s.sub(t);
        assert!(s.is_empty());
        s.add_n(t, 6);
        assert_eq!(s.get(t), 4);
        assert_eq!(s.count(), 4);
        assert_eq!(s.suit_count(Suit::Dots), 4);
        assert_eq!(s.kongs_as_pungs(Suit::Dots), 3 << 24);
    }

    #[test]
    pub fn text_form() {
        let s: TileSet = "c1123 d55 o111 f3".parse().unwrap();
        assert_eq!(s.count(), 10);
        assert_eq!(s.to_string(), "c1123 d55 o111 f3");
        assert_eq!(s.at(0).unwrap().to_string(), "c1");
        assert_eq!(s.at(4).unwrap().to_string(), "d5");
        assert_eq!(s.at(9).unwrap().to_string(), "f3");
        assert_eq!(s.at(10), None);
        assert!("c11111".parse::<TileSet>().is_err());
        assert!("o8".parse::<TileSet>().is_err());
        assert!("x1".parse::<TileSet>().is_err());
    }

    #[test]
    pub fn deck_composition() {
        assert_eq!(TileSet::full_deck(true, true).count(), 144);
        assert_eq!(TileSet::full_deck(true, false).count(), 136);
        assert_eq!(TileSet::full_deck(false, false).count(), 108);
        let deck = TileSet::full_deck(true, true);
        assert_eq!(deck.get("f1".parse().unwrap()), 1);
        assert_eq!(deck.get("o5".parse().unwrap()), 4);
    }

    #[test]
    pub fn draw_empties_the_wall() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut deck = TileSet::full_deck(true, true);
        let mut drawn = TileSet::new();
        while let Some(t) = deck.draw(&mut rng) {
            assert!(drawn.get(t) < t.suit().copies());
            drawn.add(t);
        }
        assert!(deck.is_empty());
        assert_eq!(drawn, TileSet::full_deck(true, true));
    }

    #[test]
    pub fn translate_skips_excluded_suit() {
        let s: TileSet = "c123 d456 b789 o11 f1".parse().unwrap();
        let all = s.translate(None);
        assert_eq!(TileSet::chunk(all, Suit::Characters), s.suit(Suit::Characters));
        assert_eq!(TileSet::chunk(all, Suit::Honors), s.suit(Suit::Honors));
        let without_dots = s.translate(Some(Suit::Dots));
        assert_eq!(TileSet::chunk(without_dots, Suit::Dots), 0);
        assert_eq!(TileSet::chunk(without_dots, Suit::Bamboo), s.suit(Suit::Bamboo));
    }
}
