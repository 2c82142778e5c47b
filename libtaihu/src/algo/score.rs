use super::feature::{self as f, HONORS_BITS, HONORS_SHIFT, SIMPLES_BITS, SIMPLES_MASK};
use std::sync::LazyLock;

use log::info;
use serde::Serialize;

pub static SCORE_TABLE: LazyLock<ScoreRuleTable> = LazyLock::new(ScoreRuleTable::build);

/// Scoring units of a win and the names of the rules that produced them, in
/// the order they were applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaiData {
    pub tai: i32,
    pub yaku: Vec<&'static str>,
}

impl TaiData {
    /// Sentinel for "not a win" where a lookup has to return a value.
    pub const NONE: i32 = -1;

    #[inline]
    pub fn push(&mut self, tai: i32, name: &'static str) {
        self.tai += tai;
        self.yaku.push(name);
    }

    pub fn extend(&mut self, other: &Self) {
        self.tai += other.tai;
        self.yaku.extend_from_slice(&other.yaku);
    }
}

/// Maps a score key (see [`feature`](super::feature)) to its tai. The simples
/// half decides whether the key is a win at all; the honors half only adds.
#[derive(Debug, PartialEq, Eq)]
pub struct ScoreRuleTable {
    simples: Vec<Option<TaiData>>,
    honors: Vec<TaiData>,
}

impl ScoreRuleTable {
    #[must_use]
    pub fn build() -> Self {
        let simples: Vec<_> = (0..1 << SIMPLES_BITS).map(simples_rule).collect();
        let honors: Vec<_> = (0..1 << HONORS_BITS).map(honors_rule).collect();
        info!(
            "score table initialized: {} winning simples keys",
            simples.iter().flatten().count(),
        );
        Self { simples, honors }
    }

    #[must_use]
    pub fn get(&self, key: u32) -> Option<TaiData> {
        let mut data = self.simples[(key & SIMPLES_MASK) as usize].clone()?;
        let honors = (key >> HONORS_SHIFT) as usize & ((1 << HONORS_BITS) - 1);
        data.extend(&self.honors[honors]);
        Some(data)
    }
}

fn simples_rule(key: u32) -> Option<TaiData> {
    let has = |bits: u32| key & bits != 0;
    if !has(f::WIN) || !has(f::EYE) {
        return None;
    }
    if has(f::ONLY_EYE) && has(f::CONCEALED) || has(f::MIXED_SUIT) && has(f::PURE_SUIT) {
        return None;
    }

    let mut d = TaiData::default();
    let self_draw = has(f::SELF_DRAW);
    if self_draw {
        d.push(1, "Self Draw");
    }
    let all_exposed = has(f::ONLY_EYE) && !self_draw;
    if all_exposed {
        d.push(2, "All Exposed");
    } else if has(f::CONCEALED) {
        d.push(1, "Concealed Hand");
        if self_draw {
            d.push(1, "Concealed Self Draw");
        }
    }
    if has(f::SINGLE_WAIT) && !all_exposed {
        d.push(1, "Single Wait");
    }

    if has(f::MIXED_SUIT) {
        d.push(4, "Mixed One Suit");
    } else if has(f::PURE_SUIT) {
        d.push(8, "Pure One Suit");
    }
    if has(f::ALL_PUNG) {
        d.push(4, "All Pungs");
    }

    if !has(f::ONLY_EYE) {
        // five concealed pungs only count on a concealed all-pungs hand,
        // which in turn gets nothing for three
        let strict = has(f::CONCEALED) && has(f::ALL_PUNG);
        match (f::pung_count(key), strict) {
            (5, true) => d.push(8, "Five Concealed Pungs"),
            (4, _) => d.push(5, "Four Concealed Pungs"),
            (3, false) => d.push(2, "Three Concealed Pungs"),
            _ => {}
        }
    }

    if has(f::ALL_CHOW) && !self_draw && !has(f::SINGLE_WAIT) {
        d.push(2, "All Chows");
    }
    Some(d)
}

fn honors_rule(key: u32) -> TaiData {
    const RULES: [(u32, i32, &str); 9] = [
        (f::BIG_FOUR_WINDS, 16, "Big Four Winds"),
        (f::LITTLE_FOUR_WINDS, 8, "Little Four Winds"),
        (f::BIG_THREE_DRAGONS, 8, "Big Three Dragons"),
        (f::LITTLE_THREE_DRAGONS, 4, "Little Three Dragons"),
        (f::SEAT_WIND, 1, "Seat Wind"),
        (f::ROUND_WIND, 1, "Round Wind"),
        (f::RED, 1, "Red Dragon"),
        (f::GREEN, 1, "Green Dragon"),
        (f::WHITE, 1, "White Dragon"),
    ];
    let mut d = TaiData::default();
    for (bit, tai, name) in RULES {
        if key & bit != 0 {
            d.push(tai, name);
        }
    }
    d
}

#[cfg(test)]
pub mod test {
    use super::*;
    use crate::algo::feature::score_key;

    #[test]
    pub fn rebuild_is_deterministic() {
        let a = ScoreRuleTable::build();
        let b = ScoreRuleTable::build();
        assert_eq!(a, b);
        for key in (0..1 << (HONORS_SHIFT + HONORS_BITS)).step_by(97) {
            assert_eq!(a.get(key), b.get(key));
        }
    }

    #[test]
    pub fn simples_rules() {
        let test_one = |simples: u32, expected: i32| {
            let tai = SCORE_TABLE.get(score_key(simples, 0)).map_or(TaiData::NONE, |d| d.tai);
            assert_eq!(tai, expected, "failed for {simples:#b}");
        };
        let base = f::WIN | f::EYE;
        test_one(f::WIN, TaiData::NONE);
        test_one(base, 0);
        test_one(base | f::SELF_DRAW, 1);
        test_one(base | f::CONCEALED | f::SELF_DRAW, 3);
        test_one(base | f::ONLY_EYE, 2);
        test_one(base | f::ONLY_EYE | f::SELF_DRAW, 1);
        test_one(base | f::ONLY_EYE | f::CONCEALED, TaiData::NONE);
        test_one(base | f::ONLY_EYE | f::SINGLE_WAIT, 2);
        test_one(base | f::MIXED_SUIT | f::PURE_SUIT, TaiData::NONE);
        test_one(base | f::PURE_SUIT | f::ALL_PUNG, 12);
        test_one(f::with_pung_count(base | f::CONCEALED, 4), 6);
        test_one(f::with_pung_count(base, 3), 2);
        test_one(f::with_pung_count(base, 5), 0);
        let concealed_pungs = base | f::CONCEALED | f::ALL_PUNG;
        test_one(f::with_pung_count(concealed_pungs, 3), 5);
        test_one(f::with_pung_count(concealed_pungs, 4), 10);
        test_one(f::with_pung_count(concealed_pungs, 5), 13);
        test_one(base | f::ALL_CHOW, 2);
        test_one(base | f::ALL_CHOW | f::SINGLE_WAIT, 1);
        test_one(base | f::ALL_CHOW | f::SELF_DRAW, 1);
    }

    #[test]
    pub fn honors_rules() {
        let key = |honors| score_key(f::WIN | f::EYE, honors);
        let seat_and_round = SCORE_TABLE.get(key(f::SEAT_WIND | f::ROUND_WIND)).unwrap();
        assert_eq!(seat_and_round.tai, 2);
        assert_eq!(seat_and_round.yaku, ["Seat Wind", "Round Wind"]);
        assert_eq!(SCORE_TABLE.get(key(f::BIG_FOUR_WINDS)).unwrap().tai, 16);
        assert_eq!(SCORE_TABLE.get(key(f::LITTLE_THREE_DRAGONS | f::RED)).unwrap().tai, 5);
        // honors alone never make a win
        assert_eq!(SCORE_TABLE.get(score_key(0, f::BIG_FOUR_WINDS)), None);
    }
}
