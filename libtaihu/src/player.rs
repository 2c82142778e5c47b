use crate::tile::{Suit, Tile};
use crate::tile_set::TileSet;

use derivative::Derivative;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Win,
    SelfDraw,
    RobKong,
    Kong,
    ConcealedKong,
    UpgradeKong,
    EightFlowers,
    SevenRobOne,
    ShortSuitPenalty,
    NotReadyPenalty,
    KongRefund,
}

/// One line of a seat's ledger. `score` is signed from this seat's point of
/// view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreRecord {
    pub kind: RecordKind,
    pub counterpart: Option<u8>,
    pub tile: Option<Tile>,
    pub score: i32,
}

/// Per-seat state of one hand. Melds are kept apart since they differ in
/// visibility and in how they score.
#[derive(Debug, Clone, Derivative)]
#[derivative(Default)]
pub struct Player {
    pub seat: u8,
    /// Seat wind relative to the banker, 0 is east.
    pub seat_wind: u8,
    pub round_wind: u8,
    pub is_banker: bool,

    pub hand: TileSet,
    /// Three tiles per chow.
    pub chows: TileSet,
    /// Three tiles per pung.
    pub pungs: TileSet,
    /// Exposed kongs, claimed or upgraded, four tiles each.
    pub kongs: TileSet,
    pub concealed_kongs: TileSet,
    pub flowers: TileSet,
    pub discards: TileSet,
    pub won_tiles: TileSet,
    pub short_suit: Option<Suit>,

    pub credit: i32,
    /// Kong payments received from each seat during this hand.
    pub kong_ledger: [i32; 4],
    pub score_log: Vec<ScoreRecord>,
    /// Best tai this seat has won with, or waits on once the hand is over.
    pub max_tai: i32,

    pub has_won: bool,
    pub is_ready: bool,
    pub just_kong: bool,
    /// Set until the seat's first discard or any claim at the table.
    #[derivative(Default(value = "true"))]
    pub first_draw: bool,
    pub last_draw: Option<Tile>,
    /// The tile of the first win, kept for kong checks after winning.
    pub winning_tile: Option<Tile>,
}

impl Player {
    #[must_use]
    pub fn new(seat: u8, banker: u8, round_wind: u8) -> Self {
        Self {
            seat,
            seat_wind: (seat + 4 - banker) % 4,
            round_wind,
            is_banker: seat == banker,
            ..Default::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn is_concealed(&self) -> bool {
        self.chows.is_empty() && self.pungs.is_empty() && self.kongs.is_empty()
    }

    /// Whether the seat may still hold `tile` for a claim.
    #[inline]
    #[must_use]
    pub fn is_short_suit(&self, tile: Tile) -> bool {
        self.short_suit == Some(tile.suit())
    }

    #[inline]
    #[must_use]
    pub fn holds_short_suit(&self) -> bool {
        self.short_suit
            .is_some_and(|suit| self.hand.has_suit(suit))
    }

    /// First tile in suit/value order, the fallback discard.
    #[inline]
    #[must_use]
    pub fn default_discard(&self) -> Option<Tile> {
        self.hand.at(0)
    }

    /// The first three tiles of the first number suit holding at least
    /// three, the fallback when passing tiles.
    #[must_use]
    pub fn default_change_tiles(&self) -> Option<[Tile; 3]> {
        let suit = Suit::NUMBERS
            .into_iter()
            .find(|&s| self.hand.suit_count(s) >= 3)?;
        let mut tiles = self.hand.iter().filter(|t| t.suit() == suit);
        Some([tiles.next()?, tiles.next()?, tiles.next()?])
    }

    pub fn draw(&mut self, tile: Tile) {
        self.hand.add(tile);
        self.last_draw = Some(tile);
    }

    pub fn discard(&mut self, tile: Tile) {
        self.hand.sub(tile);
        self.discards.add(tile);
        self.last_draw = None;
        self.first_draw = false;
        self.just_kong = false;
    }

    pub fn pung(&mut self, tile: Tile) {
        self.hand.sub_n(tile, 2);
        self.pungs.add_n(tile, 3);
    }

    /// `pair` are the two hand tiles joining the discard.
    pub fn chow(&mut self, tile: Tile, pair: [Tile; 2]) {
        for t in pair {
            self.hand.sub(t);
            self.chows.add(t);
        }
        self.chows.add(tile);
    }

    pub fn kong(&mut self, tile: Tile) {
        self.hand.sub_n(tile, 3);
        self.kongs.add_n(tile, 4);
        self.just_kong = true;
    }

    pub fn concealed_kong(&mut self, tile: Tile) {
        self.hand.sub_n(tile, 4);
        self.concealed_kongs.add_n(tile, 4);
        self.just_kong = true;
    }

    pub fn upgrade_kong(&mut self, tile: Tile) {
        self.hand.sub(tile);
        self.pungs.sub_n(tile, 3);
        self.kongs.add_n(tile, 4);
        self.just_kong = true;
    }

    /// The upgrade was robbed: the pung stays exposed and the fourth tile is
    /// gone to the robber.
    pub fn revert_upgrade_kong(&mut self, tile: Tile) {
        self.kongs.sub_n(tile, 4);
        self.pungs.add_n(tile, 3);
        self.just_kong = false;
    }

    /// Marks a win on `tile`. A self-drawn tile leaves the hand.
    pub fn win(&mut self, tile: Tile, tai: i32, self_draw: bool) {
        if self_draw {
            self.hand.sub(tile);
        }
        self.won_tiles.add(tile);
        self.winning_tile.get_or_insert(tile);
        self.has_won = true;
        self.max_tai = self.max_tai.max(tai);
        self.last_draw = None;
    }

    pub fn record(&mut self, kind: RecordKind, counterpart: Option<u8>, tile: Option<Tile>, score: i32) {
        self.credit += score;
        self.score_log.push(ScoreRecord {
            kind,
            counterpart,
            tile,
            score,
        });
    }
}

#[cfg(test)]
pub mod test {
    use super::*;

    fn t(s: &str) -> Tile {
        s.parse().unwrap()
    }

    #[test]
    pub fn seat_winds_follow_banker() {
        assert_eq!(Player::new(2, 2, 0).seat_wind, 0);
        assert_eq!(Player::new(1, 2, 0).seat_wind, 3);
        assert!(Player::new(1, 1, 0).is_banker);
        assert!(Player::new(0, 1, 0).first_draw);
    }

    #[test]
    pub fn meld_bookkeeping() {
        let mut p = Player::new(0, 0, 0);
        p.hand = "c1123 d555 o77".parse().unwrap();
        p.pung(t("o7"));
        assert_eq!(p.pungs.get(t("o7")), 3);
        assert!(!p.hand.have(t("o7")));
        assert!(!p.is_concealed());

        p.chow(t("c4"), [t("c2"), t("c3")]);
        assert_eq!(p.chows.to_string(), "c234");
        assert_eq!(p.hand.to_string(), "c11 d555");

        p.draw(t("d5"));
        p.concealed_kong(t("d5"));
        assert_eq!(p.concealed_kongs.get(t("d5")), 4);
        assert!(p.just_kong);
        p.discard(t("c1"));
        assert!(!p.just_kong);
        assert!(!p.first_draw);
    }

    #[test]
    pub fn change_tiles_default() {
        let mut p = Player::new(0, 0, 0);
        p.hand = "c19 d2257 b1 o111".parse().unwrap();
        assert_eq!(p.default_change_tiles(), Some([t("d2"), t("d2"), t("d5")]));
        p.hand = "c19 d22 o1111".parse().unwrap();
        assert_eq!(p.default_change_tiles(), None);
    }

    #[test]
    pub fn robbed_upgrade_keeps_the_pung() {
        let mut p = Player::new(0, 0, 0);
        p.hand = "b25".parse().unwrap();
        p.pungs = "b555".parse().unwrap();
        p.upgrade_kong(t("b5"));
        assert_eq!(p.kongs.get(t("b5")), 4);
        p.revert_upgrade_kong(t("b5"));
        assert_eq!(p.kongs.get(t("b5")), 0);
        assert_eq!(p.pungs.get(t("b5")), 3);
        assert_eq!(p.hand.to_string(), "b2");
    }
}
