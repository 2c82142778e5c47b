use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result, bail, ensure};
use serde_with::{DeserializeFromStr, SerializeDisplay};

/// The five tile families. Number suits come first so that their discriminant
/// doubles as the index into [`TileSet`](crate::tile_set::TileSet).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Suit {
    Characters = 0,
    Dots = 1,
    Bamboo = 2,
    Honors = 3,
    Flowers = 4,
}

impl Suit {
    pub const ALL: [Self; 5] = [
        Self::Characters,
        Self::Dots,
        Self::Bamboo,
        Self::Honors,
        Self::Flowers,
    ];
    pub const NUMBERS: [Self; 3] = [Self::Characters, Self::Dots, Self::Bamboo];

    #[inline]
    #[must_use]
    pub const fn from_index(idx: usize) -> Option<Self> {
        match idx {
            0 => Some(Self::Characters),
            1 => Some(Self::Dots),
            2 => Some(Self::Bamboo),
            3 => Some(Self::Honors),
            4 => Some(Self::Flowers),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self as usize
    }

    /// Number of distinct values in the suit.
    #[inline]
    #[must_use]
    pub const fn len(self) -> u8 {
        match self {
            Self::Characters | Self::Dots | Self::Bamboo => 9,
            Self::Honors => 7,
            Self::Flowers => 8,
        }
    }

    /// Copies of each value in a full deck.
    #[inline]
    #[must_use]
    pub const fn copies(self) -> u8 {
        match self {
            Self::Flowers => 1,
            _ => 4,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_number(self) -> bool {
        matches!(self, Self::Characters | Self::Dots | Self::Bamboo)
    }

    #[inline]
    #[must_use]
    pub const fn letter(self) -> char {
        match self {
            Self::Characters => 'c',
            Self::Dots => 'd',
            Self::Bamboo => 'b',
            Self::Honors => 'o',
            Self::Flowers => 'f',
        }
    }

    #[must_use]
    pub const fn from_letter(c: char) -> Option<Self> {
        match c {
            'c' => Some(Self::Characters),
            'd' => Some(Self::Dots),
            'b' => Some(Self::Bamboo),
            'o' => Some(Self::Honors),
            'f' => Some(Self::Flowers),
            _ => None,
        }
    }
}

/// Honor values, 0-based. Winds first, in seating order.
pub mod honor {
    pub const EAST: u8 = 0;
    pub const SOUTH: u8 = 1;
    pub const WEST: u8 = 2;
    pub const NORTH: u8 = 3;
    pub const RED: u8 = 4;
    pub const GREEN: u8 = 5;
    pub const WHITE: u8 = 6;
}

/// A single tile. `value` is 0-based while the text form is 1-based, so the
/// character-suit five is `Tile { suit: Characters, value: 4 }` and `"c5"`.
///
/// Flowers `f1`..`f4` are the seasons and `f5`..`f8` the plants; a flower
/// whose value modulo 4 equals a seat wind belongs to that seat.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, SerializeDisplay, DeserializeFromStr,
)]
pub struct Tile {
    suit: Suit,
    value: u8,
}

impl Tile {
    #[must_use]
    pub const fn new(suit: Suit, value: u8) -> Option<Self> {
        if value < suit.len() {
            Some(Self { suit, value })
        } else {
            None
        }
    }

    /// The caller guarantees `value < suit.len()`.
    #[inline]
    #[must_use]
    pub(crate) const fn new_unchecked(suit: Suit, value: u8) -> Self {
        Self { suit, value }
    }

    #[inline]
    #[must_use]
    pub const fn suit(self) -> Suit {
        self.suit
    }

    #[inline]
    #[must_use]
    pub const fn value(self) -> u8 {
        self.value
    }

    #[inline]
    #[must_use]
    pub const fn is_flower(self) -> bool {
        matches!(self.suit, Suit::Flowers)
    }

    /// Same-suit neighbour at `value + delta`, only for number suits.
    #[must_use]
    pub fn offset(self, delta: i8) -> Option<Self> {
        if !self.suit.is_number() {
            return None;
        }
        let v = self.value as i8 + delta;
        if v < 0 {
            return None;
        }
        Self::new(self.suit, v as u8)
    }

    /// Lenient decoding used at the wire boundary, `None` for anything that
    /// is not a valid tile.
    #[must_use]
    pub fn decode(s: &str) -> Option<Self> {
        s.trim().parse().ok()
    }
}

impl FromStr for Tile {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut chars = s.chars();
        let (Some(letter), Some(digit), None) = (chars.next(), chars.next(), chars.next()) else {
            bail!("tile text must be exactly two characters, got {s:?}");
        };
        let suit = Suit::from_letter(letter).with_context(|| format!("unknown suit in {s:?}"))?;
        let n = digit
            .to_digit(10)
            .with_context(|| format!("invalid digit in {s:?}"))?;
        ensure!(
            (1..=suit.len() as u32).contains(&n),
            "value out of range in {s:?}",
        );
        Ok(Self::new_unchecked(suit, n as u8 - 1))
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.suit.letter(), self.value + 1)
    }
}

#[cfg(test)]
pub mod test {
    use super::*;

    #[test]
    pub fn parse_and_display() {
        let t: Tile = "c5".parse().unwrap();
        assert_eq!(t.suit(), Suit::Characters);
        assert_eq!(t.value(), 4);
        assert_eq!(t.to_string(), "c5");
        assert_eq!("o7".parse::<Tile>().unwrap().value(), honor::WHITE);
        assert!("f8".parse::<Tile>().unwrap().is_flower());
    }

    #[test]
    pub fn invalid_text_never_panics() {
        for s in ["", "c", "c0", "o8", "f9", "x1", "c55", "5c", "cc"] {
            assert!(s.parse::<Tile>().is_err(), "{s:?} should be rejected");
            assert!(Tile::decode(s).is_none());
        }
        assert_eq!(Tile::decode(" b9 "), Tile::new(Suit::Bamboo, 8));
    }

    #[test]
    pub fn neighbours() {
        let t: Tile = "d1".parse().unwrap();
        assert_eq!(t.offset(-1), None);
        assert_eq!(t.offset(2).unwrap().to_string(), "d3");
        assert_eq!("o1".parse::<Tile>().unwrap().offset(1), None);
    }

    #[test]
    pub fn json_uses_text_form() {
        let t: Tile = "b3".parse().unwrap();
        assert_eq!(serde_json::to_string(&t).unwrap(), r#""b3""#);
        let back: Tile = serde_json::from_str(r#""b3""#).unwrap();
        assert_eq!(back, t);
        assert!(serde_json::from_str::<Tile>(r#""z3""#).is_err());
    }
}
