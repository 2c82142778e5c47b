//! Reactions a seat can declare, and the validation of what comes back over
//! the wire.
use crate::tile::{Suit, Tile};
use crate::tile_set::TileSet;
use std::fmt;

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{self as json, Value};

/// Wire values are single bits so several can be offered in one mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Command {
    None = 0,
    Pung = 1,
    Kong = 2,
    ConcealedKong = 4,
    UpgradeKong = 8,
    Win = 16,
    SelfDraw = 32,
    Chow = 64,
}

impl Command {
    const ALL: [Self; 7] = [
        Self::Pung,
        Self::Kong,
        Self::ConcealedKong,
        Self::UpgradeKong,
        Self::Win,
        Self::SelfDraw,
        Self::Chow,
    ];

    #[inline]
    #[must_use]
    pub const fn bit(self) -> u8 {
        self as u8
    }

    /// Exactly one known bit, or zero for `None`.
    #[must_use]
    pub fn from_bits(bits: u8) -> Option<Self> {
        if bits == 0 {
            return Some(Self::None);
        }
        Self::ALL.into_iter().find(|c| c.bit() == bits)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CommandSet(u8);

impl CommandSet {
    #[inline]
    pub fn insert(&mut self, command: Command) {
        self.0 |= command.bit();
    }

    #[inline]
    #[must_use]
    pub const fn contains(self, command: Command) -> bool {
        self.0 & command.bit() != 0
    }

    #[inline]
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// A declared reaction. `Chow` carries the two hand tiles that join the
/// discard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Action {
    #[default]
    Pass,
    Pung(Tile),
    Kong(Tile),
    ConcealedKong(Tile),
    UpgradeKong(Tile),
    Win(Tile),
    SelfDraw(Tile),
    Chow(Tile, Tile),
}

impl Action {
    #[must_use]
    pub const fn command(self) -> Command {
        match self {
            Self::Pass => Command::None,
            Self::Pung(_) => Command::Pung,
            Self::Kong(_) => Command::Kong,
            Self::ConcealedKong(_) => Command::ConcealedKong,
            Self::UpgradeKong(_) => Command::UpgradeKong,
            Self::Win(_) => Command::Win,
            Self::SelfDraw(_) => Command::SelfDraw,
            Self::Chow(..) => Command::Chow,
        }
    }

    /// Rank among claims on someone else's discard.
    #[must_use]
    pub const fn priority(self) -> u8 {
        match self {
            Self::Pass => 0,
            Self::Chow(..) => 1,
            Self::Pung(_) => 2,
            Self::Kong(_) | Self::ConcealedKong(_) | Self::UpgradeKong(_) => 3,
            Self::Win(_) | Self::SelfDraw(_) => 4,
        }
    }

    #[must_use]
    pub const fn tile(self) -> Option<Tile> {
        match self {
            Self::Pass => None,
            Self::Pung(t)
            | Self::Kong(t)
            | Self::ConcealedKong(t)
            | Self::UpgradeKong(t)
            | Self::Win(t)
            | Self::SelfDraw(t)
            | Self::Chow(t, _) => Some(t),
        }
    }

    #[must_use]
    pub fn to_payload(self, score: i32) -> ActionPayload {
        let tile = match self {
            Self::Pass => String::new(),
            Self::Chow(a, b) => format!("{a},{b}"),
            other => other.tile().map(|t| t.to_string()).unwrap_or_default(),
        };
        ActionPayload {
            command: self.command().bit(),
            tile,
            score,
        }
    }

    /// Structural validation only; whether the action was on offer is
    /// checked by [`from_reply`](Self::from_reply).
    #[must_use]
    pub fn from_payload(payload: &ActionPayload) -> Option<Self> {
        let tile = || Tile::decode(&payload.tile);
        match Command::from_bits(payload.command)? {
            Command::None => Some(Self::Pass),
            Command::Pung => tile().map(Self::Pung),
            Command::Kong => tile().map(Self::Kong),
            Command::ConcealedKong => tile().map(Self::ConcealedKong),
            Command::UpgradeKong => tile().map(Self::UpgradeKong),
            Command::Win => tile().map(Self::Win),
            Command::SelfDraw => tile().map(Self::SelfDraw),
            Command::Chow => {
                let (a, b) = payload.tile.split_once(',')?;
                Some(Self::Chow(Tile::decode(a)?, Tile::decode(b)?))
            }
        }
    }

    /// Turns a participant's reply into one of the `offers`, or `Pass`.
    /// The reply may be the payload object or a string holding its JSON.
    #[must_use]
    pub fn from_reply(reply: &Value, offers: &[Self]) -> Self {
        let payload = match reply {
            Value::String(s) => json::from_str::<ActionPayload>(s).ok(),
            other => ActionPayload::deserialize(other).ok(),
        };
        match payload.as_ref().and_then(Self::from_payload) {
            Some(Self::Pass) => Self::Pass,
            Some(action) if offers.contains(&action) => action,
            _ => {
                warn!("rejected command reply {reply}, treating as pass");
                Self::Pass
            }
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => write!(f, "pass"),
            Self::Chow(a, b) => write!(f, "chow {a},{b}"),
            other => match other.tile() {
                Some(t) => write!(f, "{:?} {t}", other.command()),
                None => write!(f, "{:?}", other.command()),
            },
        }
    }
}

/// The action as it travels: a command bit, tile text (comma-joined pair for
/// a chow) and the tai it would score.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPayload {
    pub command: u8,
    #[serde(default)]
    pub tile: String,
    #[serde(default)]
    pub score: i32,
}

/// Everything one seat may do in reaction to one event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionSet {
    pub commands: CommandSet,
    pub actions: Vec<Action>,
    /// Tai of the win on offer, if any.
    pub score: i32,
}

impl ActionSet {
    pub fn push(&mut self, action: Action) {
        self.commands.insert(action.command());
        self.actions.push(action);
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// The strongest action on offer, nearest-first within a rank.
    #[must_use]
    pub fn best(&self) -> Action {
        self.actions
            .iter()
            .copied()
            .rev()
            .max_by_key(|a| a.priority())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn to_payloads(&self) -> Vec<ActionPayload> {
        self.actions
            .iter()
            .map(|a| {
                let score = if matches!(a, Action::Win(_) | Action::SelfDraw(_)) {
                    self.score
                } else {
                    0
                };
                a.to_payload(score)
            })
            .collect()
    }
}

/// Discard reply: the tile text, which must be in hand.
#[must_use]
pub fn parse_discard(reply: &Value, hand: &TileSet, default: Tile) -> Tile {
    match reply.as_str().and_then(Tile::decode) {
        Some(tile) if hand.have(tile) => tile,
        _ => {
            warn!("rejected discard reply {reply}, discarding {default}");
            default
        }
    }
}

/// Change-tiles reply: three tile texts of one number suit, all in `hand`.
#[must_use]
pub fn parse_change_tiles(reply: &Value, hand: &TileSet, default: [Tile; 3]) -> [Tile; 3] {
    let tiles = reply.as_array().and_then(|items| {
        let [a, b, c] = items.as_slice() else {
            return None;
        };
        let tile = |v: &Value| v.as_str().and_then(Tile::decode);
        Some([tile(a)?, tile(b)?, tile(c)?])
    });
    let valid = tiles.filter(|tiles| {
        let suit = tiles[0].suit();
        let picked: TileSet = tiles.iter().copied().collect();
        suit.is_number()
            && tiles.iter().all(|t| t.suit() == suit)
            && picked.distinct().all(|t| hand.get(t) >= picked.get(t))
    });
    valid.unwrap_or_else(|| {
        warn!("rejected change tiles reply {reply}, passing {default:?}");
        default
    })
}

/// Short suit reply: a number suit index 0..=2, anything else is 0.
#[must_use]
pub fn parse_short_suit(reply: &Value) -> Suit {
    let idx = match reply {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    match idx {
        Some(i @ 0..=2) => Suit::NUMBERS[i as usize],
        _ => {
            warn!("rejected short suit reply {reply}, using characters");
            Suit::Characters
        }
    }
}

#[cfg(test)]
pub mod test {
    use super::*;
    use serde_json::json;

    fn t(s: &str) -> Tile {
        s.parse().unwrap()
    }

    #[test]
    pub fn command_bits() {
        assert_eq!(Command::from_bits(16), Some(Command::Win));
        assert_eq!(Command::from_bits(0), Some(Command::None));
        assert_eq!(Command::from_bits(3), None);
        assert_eq!(Command::from_bits(128), None);
        let mut set = CommandSet::default();
        set.insert(Command::Pung);
        set.insert(Command::Win);
        assert_eq!(set.bits(), 17);
        assert!(set.contains(Command::Win));
        assert!(!set.contains(Command::Kong));
    }

    #[test]
    pub fn replies_are_validated() {
        let offers = [Action::Win(t("c5")), Action::Pung(t("c5")), Action::Chow(t("c3"), t("c4"))];
        let test_one = |reply: Value, expected: Action| {
            assert_eq!(Action::from_reply(&reply, &offers), expected, "failed for {reply}");
        };
        test_one(json!({"command": 16, "tile": "c5", "score": 3}), Action::Win(t("c5")));
        test_one(json!({"command": 1, "tile": "c5"}), Action::Pung(t("c5")));
        test_one(json!({"command": 64, "tile": "c3,c4"}), Action::Chow(t("c3"), t("c4")));
        test_one(json!(r#"{"command":1,"tile":"c5","score":0}"#), Action::Pung(t("c5")));
        test_one(json!({"command": 0}), Action::Pass);
        // not on offer
        test_one(json!({"command": 2, "tile": "c5"}), Action::Pass);
        test_one(json!({"command": 16, "tile": "c6"}), Action::Pass);
        // malformed
        test_one(json!({"command": 17, "tile": "c5"}), Action::Pass);
        test_one(json!({"command": 16, "tile": "z9"}), Action::Pass);
        test_one(json!("garbage"), Action::Pass);
        test_one(json!(42), Action::Pass);
        test_one(Value::Null, Action::Pass);
    }

    #[test]
    pub fn payload_text() {
        let p = Action::Chow(t("b2"), t("b4")).to_payload(0);
        assert_eq!(p.command, 64);
        assert_eq!(p.tile, "b2,b4");
        assert_eq!(
            json::to_value(Action::Win(t("o7")).to_payload(5)).unwrap(),
            json!({"command": 16, "tile": "o7", "score": 5}),
        );
    }

    #[test]
    pub fn best_offer() {
        let mut set = ActionSet::default();
        assert_eq!(set.best(), Action::Pass);
        set.push(Action::Chow(t("c3"), t("c4")));
        set.push(Action::Pung(t("c5")));
        assert_eq!(set.best(), Action::Pung(t("c5")));
        set.push(Action::Win(t("c5")));
        assert_eq!(set.best(), Action::Win(t("c5")));
        assert_eq!(set.commands.bits(), 64 | 1 | 16);
    }

    #[test]
    pub fn discard_and_short_suit_defaults() {
        let hand: TileSet = "c19 d5".parse().unwrap();
        let default = t("c1");
        assert_eq!(parse_discard(&json!("d5"), &hand, default), t("d5"));
        assert_eq!(parse_discard(&json!("d6"), &hand, default), default);
        assert_eq!(parse_discard(&json!(5), &hand, default), default);

        let hand: TileSet = "c1 d223 b456 o1".parse().unwrap();
        let default = [t("b4"), t("b5"), t("b6")];
        let test_one = |reply: Value, expected: [Tile; 3]| {
            assert_eq!(parse_change_tiles(&reply, &hand, default), expected, "failed for {reply}");
        };
        test_one(json!(["d2", "d3", "d2"]), [t("d2"), t("d3"), t("d2")]);
        // mixed suits, honors, missing copies and wrong shapes
        test_one(json!(["d2", "d3", "b4"]), default);
        test_one(json!(["o1", "o1", "o1"]), default);
        test_one(json!(["d3", "d3", "d2"]), default);
        test_one(json!(["d2", "d3"]), default);
        test_one(json!("d2,d2,d3"), default);

        assert_eq!(parse_short_suit(&json!(2)), Suit::Bamboo);
        assert_eq!(parse_short_suit(&json!("1")), Suit::Dots);
        assert_eq!(parse_short_suit(&json!(3)), Suit::Characters);
        assert_eq!(parse_short_suit(&json!(-1)), Suit::Characters);
        assert_eq!(parse_short_suit(&json!(null)), Suit::Characters);
    }
}
