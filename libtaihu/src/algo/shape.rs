//! Precomputed decompositions of a single suit.
//!
//! A suit is keyed by its packed counters (three bits per value, as stored in
//! [`TileSet`](crate::tile_set::TileSet)). Every key that splits into at most
//! five melds plus an optional eye is present; anything else is absent, which
//! is how "cannot win" is expressed. Melds never span suits, so a whole hand is
//! judged by looking up each suit on its own and joining the results.
use super::feature::{self, shape as hs};
use crate::tile::Suit;
use std::sync::LazyLock;

use ahash::AHashMap;
use boomphf::hashmap::BoomHashMap;
use log::info;
use rayon::prelude::*;

const MAX_MELDS: u32 = 5;

pub static SHAPE_TABLE: LazyLock<ShapeTable> = LazyLock::new(ShapeTable::build);

/// What a suit key can do, plus per-value facts about the tile that completed
/// it (bit `v` refers to value `v` being the winning tile).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Shape {
    /// `WIN`, `EYE`, `ONLY_EYE`, `ALL_CHOW`, `ALL_PUNG` and the concealed pung
    /// count.
    pub features: u32,
    /// Honor triplets and sweeps, see [`feature::shape`]. Zero for number
    /// suits.
    pub honors: u16,
    /// Winning on this value leaves exactly one completing tile.
    pub single_wait: u16,
    /// Winning on this value can complete a triplet, which is then not
    /// concealed unless self-drawn.
    pub pung_wait: u16,
    /// Winning on this value can complete the eye.
    pub eye_wait: u16,
}

impl Shape {
    #[inline]
    #[must_use]
    pub const fn has(&self, bits: u32) -> bool {
        self.features & bits == bits
    }

    #[inline]
    #[must_use]
    pub const fn pung_count(&self) -> u32 {
        feature::pung_count(self.features)
    }

    #[inline]
    #[must_use]
    pub const fn single_wait_on(&self, value: u8) -> bool {
        self.single_wait >> value & 1 == 1
    }

    #[inline]
    #[must_use]
    pub const fn pung_wait_on(&self, value: u8) -> bool {
        self.pung_wait >> value & 1 == 1
    }

    #[inline]
    #[must_use]
    pub const fn eye_wait_on(&self, value: u8) -> bool {
        self.eye_wait >> value & 1 == 1
    }
}

pub struct ShapeTable {
    numbers: BoomHashMap<u32, Shape>,
    honors: BoomHashMap<u32, Shape>,
}

impl ShapeTable {
    #[must_use]
    pub fn build() -> Self {
        let numbers = build_suit(9, true);
        let honors = build_suit(7, false);
        info!(
            "shape table initialized: {} number keys, {} honor keys",
            numbers.len(),
            honors.len(),
        );
        Self { numbers, honors }
    }

    /// `None` means the suit cannot be part of a winning hand. Flowers never
    /// have a shape.
    #[inline]
    #[must_use]
    pub fn get(&self, suit: Suit, key: u32) -> Option<&Shape> {
        match suit {
            Suit::Characters | Suit::Dots | Suit::Bamboo => self.numbers.get(&key),
            Suit::Honors => self.honors.get(&key),
            Suit::Flowers => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn can_win(&self, suit: Suit, key: u32) -> bool {
        self.get(suit, key).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.numbers.len() + self.honors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[inline]
const fn field(key: u32, v: u8) -> u32 {
    (key >> (v as u32 * 3)) & 0b111
}

#[inline]
const fn unit(v: u8) -> u32 {
    1 << (v as u32 * 3)
}

fn fits(key: u32, values: u8) -> bool {
    (0..values).all(|v| field(key, v) <= 4)
}

struct Search<'a> {
    melds: &'a [(u32, bool)],
    values: u8,
    out: AHashMap<u32, u32>,
}

impl Search<'_> {
    /// Melds are taken in non-decreasing index order so each multiset is
    /// visited once. `chow`/`pung` record which meld kinds were used on this
    /// path.
    fn walk(&mut self, start: usize, left: u32, cur: u32, chow: bool, pung: bool) {
        let mut kinds = 0;
        if !pung {
            kinds |= feature::ALL_CHOW;
        }
        if !chow {
            kinds |= feature::ALL_PUNG;
        }
        *self.out.entry(cur).or_default() |= feature::WIN | kinds;
        for v in 0..self.values {
            let with_eye = cur + 2 * unit(v);
            if fits(with_eye, self.values) {
                *self.out.entry(with_eye).or_default() |= feature::WIN | feature::EYE | kinds;
            }
        }
        if left == 0 {
            return;
        }
        for i in start..self.melds.len() {
            let (bits, is_chow) = self.melds[i];
            let next = cur + bits;
            if fits(next, self.values) {
                self.walk(i, left - 1, next, chow || is_chow, pung || !is_chow);
            }
        }
    }
}

fn build_suit(values: u8, chows: bool) -> BoomHashMap<u32, Shape> {
    let mut melds: Vec<(u32, bool)> = (0..values).map(|v| (3 * unit(v), false)).collect();
    if chows {
        melds.extend((0..values - 2).map(|v| (0b001_001_001 * unit(v), true)));
    }
    let mut search = Search {
        melds: &melds,
        values,
        out: AHashMap::new(),
    };
    search.walk(0, MAX_MELDS, 0, false, false);
    let base = search.out;

    let mut keys: Vec<u32> = base.keys().copied().collect();
    keys.sort_unstable();
    let shapes: Vec<Shape> = keys
        .par_iter()
        .map(|&key| derive(key, base[&key], values, chows, &base))
        .collect();

    if cfg!(test) {
        let mut k = keys.clone();
        k.dedup();
        assert_eq!(k.len(), keys.len());
        assert!(base.contains_key(&0));
    }
    BoomHashMap::new(keys, shapes)
}

fn derive(key: u32, base: u32, values: u8, chows: bool, table: &AHashMap<u32, u32>) -> Shape {
    let contains = |k: u32| table.contains_key(&k);
    let mut features = base;

    if key == 0 || (0..values).any(|v| key == 2 * unit(v)) {
        features |= feature::ONLY_EYE;
    }

    let pungs = (0..values)
        .filter(|&v| field(key, v) >= 3 && contains(key - 3 * unit(v)))
        .count() as u32;
    features = feature::with_pung_count(features, pungs);

    let mut shape = Shape {
        features,
        ..Default::default()
    };
    for v in (0..values).filter(|&v| field(key, v) > 0) {
        let ready = key - unit(v);
        let mut waits = (0..values)
            .filter(|&k| field(ready, k) < 4 && contains(ready + unit(k)))
            .count();
        if field(key, v) >= 3 && contains(key - 3 * unit(v)) {
            shape.pung_wait |= 1 << v;
            waits += 1;
        }
        if waits == 1 {
            shape.single_wait |= 1 << v;
        }
        if base & feature::EYE != 0 && field(key, v) >= 2 && contains(key - 2 * unit(v)) {
            shape.eye_wait |= 1 << v;
        }
    }

    if !chows {
        shape.honors = honor_bits(key);
    }
    shape
}

/// Triplet and sweep flags of an honor key. A sweep clears the plain
/// wind or dragon triplet bits it covers.
fn honor_bits(key: u32) -> u16 {
    let mut bits = (0..7)
        .filter(|&v| field(key, v) >= 3)
        .fold(0u16, |acc, v| acc | 1 << v);

    let count = |range: std::ops::Range<u8>, n: u32| range.filter(|&v| field(key, v) == n).count();
    let (wind_pungs, wind_pairs) = (count(0..4, 3), count(0..4, 2));
    if wind_pungs == 4 {
        bits = (bits | hs::BIG_FOUR_WINDS) & !hs::WIND_PUNGS;
    } else if wind_pungs == 3 && wind_pairs == 1 {
        bits = (bits | hs::LITTLE_FOUR_WINDS) & !hs::WIND_PUNGS;
    }
    let (dragon_pungs, dragon_pairs) = (count(4..7, 3), count(4..7, 2));
    if dragon_pungs == 3 {
        bits = (bits | hs::BIG_THREE_DRAGONS) & !hs::DRAGON_PUNGS;
    } else if dragon_pungs == 2 && dragon_pairs == 1 {
        bits = (bits | hs::LITTLE_THREE_DRAGONS) & !hs::DRAGON_PUNGS;
    }
    bits
}

#[cfg(test)]
pub mod test {
    use super::*;
    use crate::tile_set::TileSet;

    fn suit_of(s: &str, suit: Suit) -> u32 {
        s.parse::<TileSet>().unwrap().suit(suit)
    }

    fn number(s: &str) -> Option<Shape> {
        SHAPE_TABLE.get(Suit::Characters, suit_of(s, Suit::Characters)).copied()
    }

    fn honor(s: &str) -> Option<Shape> {
        SHAPE_TABLE.get(Suit::Honors, suit_of(s, Suit::Honors)).copied()
    }

    #[test]
    pub fn canonical_hands() {
        // four melds and an eye, all in one suit
        let s = number("c11123455678999").unwrap();
        assert!(s.has(feature::WIN | feature::EYE));

        let test_one = |hand: &str, expected: bool| {
            assert_eq!(number(hand).is_some(), expected, "failed for {hand}");
        };
        test_one("c11122233344455", true);
        test_one("c123456789", true);
        test_one("c", true);
        test_one("c55", true);
        // no eye fits
        test_one("c12345678912345", false);
        test_one("c11114444777799", false);
        // the lone 8 never joins a meld
        test_one("c11122233345568", false);
        test_one("c1", false);
        test_one("c12", false);
        test_one("c1111", false);
    }

    #[test]
    pub fn meld_kinds() {
        let chows = number("c12345678955").unwrap();
        assert!(chows.has(feature::ALL_CHOW));
        assert!(!chows.has(feature::ALL_PUNG));

        let pungs = number("c11122255").unwrap();
        assert!(pungs.has(feature::ALL_PUNG));
        assert_eq!(pungs.pung_count(), 2);

        // 111222333 reads as three pungs or three chows
        let both = number("c111222333").unwrap();
        assert!(both.has(feature::ALL_PUNG | feature::ALL_CHOW));
        assert_eq!(both.pung_count(), 3);

        assert!(number("c55").unwrap().has(feature::ONLY_EYE));
        assert!(!number("c55123").unwrap().has(feature::ONLY_EYE));
    }

    #[test]
    pub fn waits() {
        // 12 + 3: edge wait, single
        let edge = number("c12355").unwrap();
        assert!(edge.single_wait_on(2));
        // 23 + 4 could also have been 1: two-sided
        let open = number("c23455").unwrap();
        assert!(!open.single_wait_on(3));
        assert!(!open.single_wait_on(1));
        // winning on the eye of 123 + 5
        let eye = number("c12355").unwrap();
        assert!(eye.single_wait_on(4));
        assert!(eye.eye_wait_on(4));
        // completing 555 when the hand also waited elsewhere
        let pung = number("c555123").unwrap();
        assert!(pung.pung_wait_on(4));
        assert!(!pung.single_wait_on(4));
    }

    #[test]
    pub fn honor_sweeps() {
        let big = honor("o111222333444").unwrap();
        assert_ne!(big.honors & hs::BIG_FOUR_WINDS, 0);
        assert_eq!(big.honors & hs::WIND_PUNGS, 0);

        let little = honor("o11122233344").unwrap();
        assert_ne!(little.honors & hs::LITTLE_FOUR_WINDS, 0);

        let dragons = honor("o55566677").unwrap();
        assert_ne!(dragons.honors & hs::LITTLE_THREE_DRAGONS, 0);
        assert_eq!(dragons.honors & hs::DRAGON_PUNGS, 0);

        let plain = honor("o11155").unwrap();
        assert_eq!(plain.honors, 1 << 0);
        assert!(honor("o123").is_none());
        assert!(SHAPE_TABLE.get(Suit::Flowers, 0).is_none());
    }
}
