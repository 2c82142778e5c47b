//! Money moving between seats, during the hand and at its end.
use crate::algo::evaluator::HandEvaluator;
use crate::config::RuleConfig;
use crate::player::{Player, RecordKind};
use crate::tile::Tile;

use log::debug;

/// Payments are capped at this many tai.
pub const MAX_PAYING_TAI: i32 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transfer {
    pub from: u8,
    pub to: u8,
    pub amount: i32,
    pub kind: RecordKind,
    pub tile: Option<Tile>,
}

/// Points paid for a hand worth `tai`: 2^(tai-1), at least one point.
#[inline]
#[must_use]
pub const fn score_for(tai: i32) -> i32 {
    let tai = if tai < 1 {
        1
    } else if tai > MAX_PAYING_TAI {
        MAX_PAYING_TAI
    } else {
        tai
    };
    1 << (tai - 1)
}

/// Books `t` on both ledgers. Kong payments are also remembered by the
/// receiver so they can be refunded.
pub fn apply(players: &mut [Player; 4], t: &Transfer) {
    debug!("{:?}: seat {} pays {} to seat {}", t.kind, t.from, t.amount, t.to);
    players[t.from as usize].record(t.kind, Some(t.to), t.tile, -t.amount);
    let to = &mut players[t.to as usize];
    to.record(t.kind, Some(t.from), t.tile, t.amount);
    if matches!(t.kind, RecordKind::Kong | RecordKind::ConcealedKong | RecordKind::UpgradeKong) {
        to.kong_ledger[t.from as usize] += t.amount;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settlement {
    /// Best tai each seat is waiting on, 0 when not ready or already won.
    pub readiness: [i32; 4],
    pub transfers: Vec<Transfer>,
}

/// End-of-hand payments after the wall ran out.
///
/// A seat still holding its short suit pays the penalty to every seat that
/// does not. A seat that neither won nor is ready pays each ready seat for
/// that seat's best wait, and hands back every kong payment it collected.
#[must_use]
pub fn settle(players: &[Player; 4], config: &RuleConfig) -> Settlement {
    let readiness = players.each_ref().map(|p| {
        if p.has_won || p.holds_short_suit() {
            0
        } else {
            HandEvaluator::new(p, config.min_tai).readiness()
        }
    });
    let mut transfers = vec![];

    if config.short_suit {
        for from in players.iter().filter(|p| p.holds_short_suit()) {
            for to in players.iter().filter(|p| !p.holds_short_suit()) {
                transfers.push(Transfer {
                    from: from.seat,
                    to: to.seat,
                    amount: config.short_suit_penalty,
                    kind: RecordKind::ShortSuitPenalty,
                    tile: None,
                });
            }
        }
    }

    let stuck = |p: &Player| !p.has_won && readiness[p.seat as usize] == 0;
    for from in players.iter().filter(|p| stuck(p)) {
        for to in players.iter().filter(|p| !p.has_won && readiness[p.seat as usize] > 0) {
            transfers.push(Transfer {
                from: from.seat,
                to: to.seat,
                amount: score_for(readiness[to.seat as usize]),
                kind: RecordKind::NotReadyPenalty,
                tile: None,
            });
        }
        for (seat, &received) in from.kong_ledger.iter().enumerate() {
            if received > 0 {
                transfers.push(Transfer {
                    from: from.seat,
                    to: seat as u8,
                    amount: received,
                    kind: RecordKind::KongRefund,
                    tile: None,
                });
            }
        }
    }

    Settlement { readiness, transfers }
}
