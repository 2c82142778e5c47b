use super::feature::{self, score_key, shape as hs};
use super::score::{SCORE_TABLE, TaiData};
use super::shape::{SHAPE_TABLE, Shape};
use crate::player::Player;
use crate::tile::{Suit, Tile};
use crate::tile_set::TileSet;

/// Facts about how the tile arrived that the shape alone cannot tell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WinContext {
    pub self_draw: bool,
    /// The winning tile is the last one before the dead wall.
    pub last_tile: bool,
    pub robbing_kong: bool,
    /// The discarder had just formed a kong.
    pub kong_discard: bool,
}

impl WinContext {
    #[inline]
    #[must_use]
    pub const fn self_draw() -> Self {
        Self {
            self_draw: true,
            last_tile: false,
            robbing_kong: false,
            kong_discard: false,
        }
    }
}

/// The tiles that make up a hand, copied out of a [`Player`] so lookups can
/// move tiles around without touching the player.
#[derive(Debug, Clone, Copy)]
struct Holding {
    hand: TileSet,
    chows: TileSet,
    pungs: TileSet,
    kongs: TileSet,
    concealed_kongs: TileSet,
}

impl Holding {
    fn of(player: &Player) -> Self {
        Self {
            hand: player.hand,
            chows: player.chows,
            pungs: player.pungs,
            kongs: player.kongs,
            concealed_kongs: player.concealed_kongs,
        }
    }

    fn has_suit(&self, suit: Suit) -> bool {
        [
            self.hand,
            self.chows,
            self.pungs,
            self.kongs,
            self.concealed_kongs,
        ]
        .iter()
        .any(|s| s.has_suit(suit))
    }

    /// Copies of `tile` in hand and on the door.
    fn held(&self, tile: Tile) -> u8 {
        [
            self.hand,
            self.chows,
            self.pungs,
            self.kongs,
            self.concealed_kongs,
        ]
        .iter()
        .map(|s| s.get(tile))
        .sum()
    }

    /// Honor melds on the door, kongs read as pungs.
    fn door_honors(&self) -> u32 {
        self.pungs.suit(Suit::Honors)
            + self.kongs.kongs_as_pungs(Suit::Honors)
            + self.concealed_kongs.kongs_as_pungs(Suit::Honors)
    }
}

/// Win and kong verdicts for one seat. Every query works on a copy of the
/// player's tiles plus a delta, so evaluators of different seats can run in
/// any order.
#[derive(Debug, Clone, Copy)]
pub struct HandEvaluator<'a> {
    player: &'a Player,
    min_tai: i32,
}

impl<'a> HandEvaluator<'a> {
    #[must_use]
    pub const fn new(player: &'a Player, min_tai: i32) -> Self {
        Self { player, min_tai }
    }

    /// `candidate` is a tile from outside the hand (a discard or a robbed
    /// kong tile). Without one, the seat's last draw, already in hand, is the
    /// winning tile.
    #[must_use]
    pub fn check_win(&self, candidate: Option<Tile>, ctx: WinContext) -> Option<TaiData> {
        let mut holding = Holding::of(self.player);
        let tile = match candidate {
            Some(t) => {
                if t.is_flower() || holding.hand.get(t) == 4 {
                    return None;
                }
                holding.hand.add(t);
                t
            }
            None => self.player.last_draw?,
        };
        let mut data = self.structural(&holding, tile, ctx.self_draw)?;
        self.contextual(&mut data, ctx);
        (data.tai >= self.min_tai).then_some(data)
    }

    /// Tai of a speculative win, [`TaiData::NONE`] if it is not one.
    #[must_use]
    pub fn tai_for(&self, candidate: Option<Tile>, ctx: WinContext) -> i32 {
        self.check_win(candidate, ctx).map_or(TaiData::NONE, |d| d.tai)
    }

    /// Whether a kong of `tile` is allowed. A seat that already won may only
    /// kong if its winning tile still wins afterwards and the tai moves by
    /// at most one.
    #[must_use]
    pub fn check_kong(&self, tile: Tile) -> bool {
        let p = self.player;
        if p.is_short_suit(tile) || tile.is_flower() {
            return false;
        }
        if !p.has_won {
            return true;
        }
        let Some(won) = p.winning_tile else {
            return true;
        };

        let mut before = Holding::of(p);
        if before.hand.count() % 3 == 2
            && let Some(drawn) = p.last_draw
        {
            before.hand.sub(drawn);
        }
        let mut after = before;
        let in_hand = after.hand.get(tile);
        after.hand.sub_n(tile, in_hand);
        if after.pungs.get(tile) == 3 {
            after.pungs.sub_n(tile, 3);
            after.kongs.add_n(tile, 4);
        } else if p.hand.get(tile) == 4 {
            after.concealed_kongs.add_n(tile, 4);
        } else {
            after.kongs.add_n(tile, 4);
        }
        before.hand.add(won);
        after.hand.add(won);

        match (
            self.structural(&before, won, false),
            self.structural(&after, won, false),
        ) {
            (Some(old), Some(new)) => (old.tai - new.tai).abs() <= 1,
            _ => false,
        }
    }

    /// Best tai over every tile that would complete the hand on a discard,
    /// 0 if the hand is not ready. Copies the seat already holds in hand or
    /// on the door are not waited on.
    #[must_use]
    pub fn readiness(&self) -> i32 {
        let p = self.player;
        let holding = Holding::of(p);
        let suits = [Suit::Characters, Suit::Dots, Suit::Bamboo, Suit::Honors];
        suits
            .into_iter()
            .filter(|&s| p.short_suit != Some(s))
            .flat_map(|s| (0..s.len()).map(move |v| Tile::new_unchecked(s, v)))
            .filter(|&t| holding.held(t) < 4)
            .filter_map(|t| {
                let mut h = holding;
                h.hand.add(t);
                let mut data = self.structural(&h, t, false)?;
                self.contextual(&mut data, WinContext::default());
                Some(data)
            })
            .map(|d| d.tai)
            .filter(|&tai| tai >= self.min_tai)
            .max()
            .unwrap_or(0)
    }

    /// Table-driven part of the score. `holding.hand` already contains
    /// `tile`.
    fn structural(&self, holding: &Holding, tile: Tile, self_draw: bool) -> Option<TaiData> {
        let p = self.player;
        if p.short_suit.is_some_and(|s| holding.hand.has_suit(s)) {
            return None;
        }
        if holding.hand.has_suit(Suit::Flowers) {
            return None;
        }

        let packed = holding.hand.translate(p.short_suit);
        let mut shapes = [Shape::default(); 4];
        for suit in [Suit::Characters, Suit::Dots, Suit::Bamboo, Suit::Honors] {
            shapes[suit.as_usize()] = *SHAPE_TABLE.get(suit, TileSet::chunk(packed, suit))?;
        }
        let door_honors = holding.door_honors();
        let honors_key = TileSet::chunk(packed, Suit::Honors) + door_honors;
        let combined = *SHAPE_TABLE.get(Suit::Honors, honors_key)?;

        if shapes.iter().filter(|s| s.has(feature::EYE)).count() != 1 {
            return None;
        }
        let winning = shapes[tile.suit().as_usize()];
        let value = tile.value();

        let mut f = feature::WIN | feature::EYE;
        let concealed = holding.chows.is_empty() && holding.pungs.is_empty() && holding.kongs.is_empty();
        // concealed kongs alone do not make the hand all exposed
        if !concealed && shapes.iter().all(|s| s.has(feature::ONLY_EYE)) {
            f |= feature::ONLY_EYE;
        }
        if winning.single_wait_on(value) {
            f |= feature::SINGLE_WAIT;
        }
        if concealed {
            f |= feature::CONCEALED;
        }
        if self_draw {
            f |= feature::SELF_DRAW;
        }

        let mut pungs: u32 = shapes.iter().map(Shape::pung_count).sum::<u32>()
            + holding.concealed_kongs.count() / 4;
        if !self_draw && winning.pung_wait_on(value) {
            pungs = pungs.saturating_sub(1);
        }
        f = feature::with_pung_count(f, pungs);

        let numbers = &shapes[..3];
        let no_honors = !holding.hand.has_suit(Suit::Honors) && door_honors == 0;
        if no_honors
            && holding.pungs.is_empty()
            && holding.kongs.is_empty()
            && holding.concealed_kongs.is_empty()
            && p.flowers.is_empty()
            && numbers.iter().all(|s| s.has(feature::ALL_CHOW))
            && !winning.eye_wait_on(value)
        {
            f |= feature::ALL_CHOW;
        }
        if holding.chows.is_empty() && numbers.iter().all(|s| s.has(feature::ALL_PUNG)) {
            f |= feature::ALL_PUNG;
        }

        let number_suits = Suit::NUMBERS
            .iter()
            .filter(|&&s| holding.has_suit(s))
            .count();
        let honors = holding.has_suit(Suit::Honors);
        if number_suits == 1 && honors {
            f |= feature::MIXED_SUIT;
        } else if number_suits + honors as usize == 1 {
            f |= feature::PURE_SUIT;
        }

        SCORE_TABLE.get(score_key(f, honor_features(combined.honors, p)))
    }

    fn contextual(&self, data: &mut TaiData, ctx: WinContext) {
        let p = self.player;
        if p.first_draw && ctx.self_draw {
            if p.is_banker {
                data.push(24, "Heavenly Win");
            } else {
                data.push(16, "Earthly Win");
            }
        }
        if ctx.last_tile {
            data.push(1, if ctx.self_draw { "Last Tile Self Draw" } else { "Last Discard" });
        }
        if ctx.robbing_kong {
            data.push(1, "Robbing the Kong");
        }
        if ctx.self_draw && p.just_kong {
            data.push(1, "Win After Kong");
        }
        if ctx.kong_discard {
            data.push(1, "Kong Discard");
        }
        for (first, name) in [(0, "Four Seasons"), (4, "Four Plants")] {
            let mut group = (first..first + 4).map(|v| Tile::new_unchecked(Suit::Flowers, v));
            if group.all(|t| p.flowers.have(t)) {
                data.push(2, name);
            } else if p.flowers.have(Tile::new_unchecked(Suit::Flowers, first + p.seat_wind)) {
                data.push(1, "Seat Flower");
            }
        }
    }
}

/// Maps honor shape bits to score bits, keeping only the winds that belong
/// to this seat or round.
fn honor_features(shape: u16, p: &Player) -> u32 {
    let mut bits = 0;
    if shape >> p.seat_wind & 1 == 1 {
        bits |= feature::SEAT_WIND;
    }
    if shape >> p.round_wind & 1 == 1 {
        bits |= feature::ROUND_WIND;
    }
    const DRAGONS: [(u8, u32); 3] = [(4, feature::RED), (5, feature::GREEN), (6, feature::WHITE)];
    for (v, bit) in DRAGONS {
        if shape >> v & 1 == 1 {
            bits |= bit;
        }
    }
    const SWEEPS: [(u16, u32); 4] = [
        (hs::LITTLE_FOUR_WINDS, feature::LITTLE_FOUR_WINDS),
        (hs::BIG_FOUR_WINDS, feature::BIG_FOUR_WINDS),
        (hs::LITTLE_THREE_DRAGONS, feature::LITTLE_THREE_DRAGONS),
        (hs::BIG_THREE_DRAGONS, feature::BIG_THREE_DRAGONS),
    ];
    for (shape_bit, bit) in SWEEPS {
        if shape & shape_bit != 0 {
            bits |= bit;
        }
    }
    bits
}

#[cfg(test)]
pub mod test {
    use super::*;

    fn t(s: &str) -> Tile {
        s.parse().unwrap()
    }

    fn player(hand: &str) -> Player {
        let mut p = Player::new(1, 0, 0);
        p.hand = hand.parse().unwrap();
        p.first_draw = false;
        p
    }

    fn tai(p: &Player, candidate: &str, ctx: WinContext) -> i32 {
        HandEvaluator::new(p, 1).tai_for(Some(t(candidate)), ctx)
    }

    #[test]
    pub fn discard_wins() {
        // two-sided wait on b6 or b9
        let p = player("c123456 d234567 b7899");
        let d = HandEvaluator::new(&p, 1)
            .check_win(Some(t("b6")), WinContext::default())
            .unwrap();
        assert_eq!(d.yaku, ["Concealed Hand", "All Chows"]);
        assert_eq!(d.tai, 3);

        assert_eq!(tai(&p, "b1", WinContext::default()), TaiData::NONE);
        assert_eq!(tai(&p, "f1", WinContext::default()), TaiData::NONE);
    }

    #[test]
    pub fn short_suit_blocks_win() {
        let mut p = player("c123456 d234567 b7899");
        p.short_suit = Some(Suit::Dots);
        assert_eq!(tai(&p, "b6", WinContext::default()), TaiData::NONE);
        p.short_suit = Some(Suit::Characters);
        assert_eq!(tai(&p, "b6", WinContext::default()), TaiData::NONE);

        // characters emptied, the other two suits carry the hand
        let mut p = player("d123456789 b2345678");
        p.short_suit = Some(Suit::Characters);
        assert!(tai(&p, "b8", WinContext::default()) > 0);
    }

    #[test]
    pub fn pure_suit_and_pungs() {
        let p = player("c1112223334445");
        let d = HandEvaluator::new(&p, 1)
            .check_win(Some(t("c5")), WinContext::default())
            .unwrap();
        assert!(d.yaku.contains(&"Pure One Suit"));
        assert!(d.yaku.contains(&"All Pungs"));
        assert!(d.yaku.contains(&"Four Concealed Pungs"));
        assert!(!d.yaku.contains(&"All Chows"));
    }

    #[test]
    pub fn pung_from_discard_is_not_concealed() {
        // waiting on c3 or c6 with three concealed pungs already in hand
        let p = player("c11145 b222 d555 o55");
        let ron = HandEvaluator::new(&p, 1)
            .check_win(Some(t("c6")), WinContext::default())
            .unwrap();
        assert!(ron.yaku.contains(&"Three Concealed Pungs"));

        // waiting on d5 or o1, a discarded d5 exposes that triplet
        let p = player("c111456 b222 d55 o11");
        let ron = HandEvaluator::new(&p, 1)
            .check_win(Some(t("d5")), WinContext::default())
            .unwrap();
        assert_eq!(ron.yaku, ["Concealed Hand"]);

        let mut p = p;
        p.draw(t("d5"));
        let tsumo = HandEvaluator::new(&p, 1)
            .check_win(None, WinContext::self_draw())
            .unwrap();
        assert_eq!(
            tsumo.yaku,
            ["Self Draw", "Concealed Hand", "Concealed Self Draw", "Three Concealed Pungs"],
        );
        assert_eq!(tsumo.tai, 5);
    }

    #[test]
    pub fn honors_need_the_right_wind() {
        // seat 1 with banker 0 sits south, the round wind is east
        let mut p = player("c123456 b123 o5");
        p.pungs = "o222".parse().unwrap();
        let d = HandEvaluator::new(&p, 1)
            .check_win(Some(t("o5")), WinContext::default())
            .unwrap();
        assert!(d.yaku.contains(&"Seat Wind"));
        assert!(!d.yaku.contains(&"Round Wind"));

        p.pungs = "o333".parse().unwrap();
        assert_eq!(tai(&p, "o5", WinContext::default()), 1, "only the single wait");
    }

    #[test]
    pub fn contextual_bonuses_stack() {
        let mut p = player("c123456 d234567 b5579");
        p.flowers = "f25".parse().unwrap();
        let ctx = WinContext {
            last_tile: true,
            robbing_kong: true,
            ..Default::default()
        };
        let d = HandEvaluator::new(&p, 1).check_win(Some(t("b8")), ctx).unwrap();
        // seat wind is south, so f2 matches and f5 does not
        assert_eq!(
            d.yaku,
            ["Concealed Hand", "Single Wait", "Last Discard", "Robbing the Kong", "Seat Flower"],
        );

        p.flowers = "f5678".parse().unwrap();
        p.first_draw = true;
        p.draw(t("b8"));
        let d = HandEvaluator::new(&p, 1)
            .check_win(None, WinContext::self_draw())
            .unwrap();
        assert!(d.yaku.contains(&"Earthly Win"));
        assert!(d.yaku.contains(&"Four Plants"));
        assert!(!d.yaku.contains(&"Seat Flower"));
    }

    #[test]
    pub fn readiness_takes_the_best_wait() {
        // b6 scores the all-chow bonus, b9 does not
        let p = player("c123456 d234567 b7899");
        assert_eq!(HandEvaluator::new(&p, 1).readiness(), 3);
        let p = player("c1357 d2468 b13579");
        assert_eq!(HandEvaluator::new(&p, 1).readiness(), 0);
    }

    #[test]
    pub fn flowers_alone_make_a_hand_ready() {
        let mut p = player("c456 d234567 b78 o55");
        p.chows = "c123".parse().unwrap();
        p.flowers = "f2".parse().unwrap();
        let d = HandEvaluator::new(&p, 1)
            .check_win(Some(t("b6")), WinContext::default())
            .unwrap();
        assert_eq!(d.yaku, ["Seat Flower"]);
        assert_eq!(HandEvaluator::new(&p, 1).readiness(), 1);

        p.flowers = TileSet::new();
        assert_eq!(HandEvaluator::new(&p, 1).readiness(), 0);
    }

    #[test]
    pub fn door_copies_are_not_waited_on() {
        // the only completing tile is the fourth c5, already in the pung
        let mut p = player("c5 d123456 b123456");
        p.pungs = "c555".parse().unwrap();
        assert_eq!(HandEvaluator::new(&p, 1).readiness(), 0);

        p.pungs = "c444".parse().unwrap();
        assert_eq!(HandEvaluator::new(&p, 1).readiness(), 1);
    }

    #[test]
    pub fn five_concealed_kongs_win() {
        let mut p = player("c5");
        p.concealed_kongs = "c1111 c2222 d3333 d4444 b9999".parse().unwrap();
        let ron = HandEvaluator::new(&p, 1)
            .check_win(Some(t("c5")), WinContext::default())
            .unwrap();
        assert_eq!(
            ron.yaku,
            ["Concealed Hand", "Single Wait", "All Pungs", "Five Concealed Pungs"],
        );
        assert_eq!(ron.tai, 14);

        p.draw(t("c5"));
        let tsumo = HandEvaluator::new(&p, 1)
            .check_win(None, WinContext::self_draw())
            .unwrap();
        assert_eq!(tsumo.tai, 16);
    }

    #[test]
    pub fn kong_after_win() {
        let mut p = player("c123 d456 b789 o555 c9");
        p.has_won = true;
        p.winning_tile = Some(t("c9"));
        // loses the concealed bonus only
        assert!(HandEvaluator::new(&p, 1).check_kong(t("o5")));

        // exposing d5 costs the concealed hand and the three concealed pungs
        let mut q = player("c11145 b222 d555 o55");
        q.has_won = true;
        q.winning_tile = Some(t("c6"));
        assert!(!HandEvaluator::new(&q, 1).check_kong(t("d5")));
        assert!(HandEvaluator::new(&Player::new(0, 0, 0), 1).check_kong(t("d5")));
        q.short_suit = Some(Suit::Dots);
        assert!(!HandEvaluator::new(&q, 1).check_kong(t("d5")));
    }
}
