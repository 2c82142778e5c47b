//! Resolves contested tiles: a discard, or the fourth tile of an upgraded
//! kong that the other seats may rob.
use super::event::{GameEvent, Request};
use super::participant::{Participant, request_concurrently};
use crate::action::{Action, ActionSet};
use crate::algo::evaluator::{HandEvaluator, WinContext};
use crate::algo::score::TaiData;
use crate::config::RuleConfig;
use crate::player::Player;
use crate::tile::Tile;
use std::time::Duration;

use log::{debug, info};
use serde_json::{Value, json};
use tinyvec::ArrayVec;

/// Up to three seats can win on one tile.
pub type Winners = ArrayVec<[(u8, TaiData); 3]>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Every seat that claimed the win, in seating order after the discarder.
    Wins(Winners),
    Claim { seat: u8, action: Action },
    Pass,
}

/// What the engine knows about a discard beyond the tile itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscardContext {
    /// The wall is down to the dead wall, this was the last discard.
    pub last_tile: bool,
    /// The discarder had just formed a kong.
    pub kong_discard: bool,
}

/// One seat's options on a contested tile.
#[derive(Debug, Clone, Default)]
struct Eligibility {
    offers: ActionSet,
    win: Option<TaiData>,
}

pub struct ActionArbiter<'a> {
    config: &'a RuleConfig,
    participants: &'a [Box<dyn Participant>],
}

impl<'a> ActionArbiter<'a> {
    #[must_use]
    pub const fn new(config: &'a RuleConfig, participants: &'a [Box<dyn Participant>]) -> Self {
        Self { config, participants }
    }

    /// Seats that still take part in claims, from the actor's right.
    fn others(&self, players: &[Player; 4], actor: u8) -> impl Iterator<Item = (u8, u8)> {
        let play_on = self.config.play_until_last;
        let won: [bool; 4] = players.each_ref().map(|p| p.has_won);
        (1..4u8)
            .map(move |offset| ((actor + offset) % 4, offset))
            .filter(move |&(seat, _)| play_on || !won[seat as usize])
    }

    fn eligibility(&self, p: &Player, offset: u8, tile: Tile, ctx: DiscardContext) -> Eligibility {
        let eval = HandEvaluator::new(p, self.config.min_tai);
        let mut ret = Eligibility::default();
        let win_ctx = WinContext {
            self_draw: false,
            last_tile: ctx.last_tile,
            robbing_kong: false,
            kong_discard: ctx.kong_discard,
        };
        if let Some(data) = eval.check_win(Some(tile), win_ctx) {
            ret.offers.push(Action::Win(tile));
            ret.offers.score = data.tai;
            ret.win = Some(data);
        }
        if p.is_short_suit(tile) || tile.is_flower() {
            return ret;
        }

        let held = p.hand.get(tile);
        // a kong needs a replacement draw
        if held == 3 && !ctx.last_tile && eval.check_kong(tile) {
            ret.offers.push(Action::Kong(tile));
        }
        if p.has_won {
            return ret;
        }
        if held >= 2 {
            ret.offers.push(Action::Pung(tile));
        }
        if offset == 1 && tile.suit().is_number() {
            for (a, b) in [(-2, -1), (-1, 1), (1, 2)] {
                if let (Some(x), Some(y)) = (tile.offset(a), tile.offset(b)) {
                    if p.hand.have(x) && p.hand.have(y) {
                        ret.offers.push(Action::Chow(x, y));
                    }
                }
            }
        }
        ret
    }

    /// Offers `tile` discarded by `discarder` to the other seats and decides
    /// who gets it. Only notifications are sent; the caller applies the
    /// result.
    pub fn resolve_discard(
        &self,
        players: &[Player; 4],
        discarder: u8,
        tile: Tile,
        ctx: DiscardContext,
    ) -> Resolution {
        let mut decided = vec![];
        let mut pending = vec![];
        let mut wins: [Option<TaiData>; 4] = Default::default();

        for (seat, offset) in self.others(players, discarder) {
            let p = &players[seat as usize];
            let elig = self.eligibility(p, offset, tile, ctx);
            if elig.offers.is_empty() {
                continue;
            }
            wins[seat as usize] = elig.win;
            if p.has_won {
                // winners play on automatically
                decided.push((offset, seat, elig.offers.best()));
            } else {
                pending.push((offset, seat, elig.offers));
            }
        }

        let timeout = self.config.command_timeout();
        decided.extend(self.collect(pending, timeout, |offers| Request::Command {
            commands: offers.commands.bits(),
            offers: offers.to_payloads(),
        }));
        decided.sort_unstable_by_key(|&(offset, ..)| offset);

        let winners: Winners = decided
            .iter()
            .filter(|(.., a)| matches!(a, Action::Win(_)))
            .filter_map(|&(_, seat, _)| wins[seat as usize].take().map(|d| (seat, d)))
            .collect();
        if !winners.is_empty() {
            for &(_, seat, action) in &decided {
                match action {
                    Action::Win(_) => self.tell(seat, GameEvent::Success { seat, command: action.command().bit() }),
                    Action::Pass => {}
                    _ => self.tell(seat, GameEvent::Fail { seat, command: action.command().bit() }),
                }
            }
            info!("{tile} from seat {discarder} wins for {:?}", winners.iter().map(|(s, _)| s).collect::<Vec<_>>());
            return Resolution::Wins(winners);
        }

        // nearest seat first within the same rank
        let best = decided
            .iter()
            .rev()
            .filter(|(.., a)| *a != Action::Pass)
            .max_by_key(|(.., a)| a.priority())
            .map(|&(_, seat, action)| (seat, action));
        for &(_, seat, action) in &decided {
            if action == Action::Pass {
                continue;
            }
            let command = action.command().bit();
            if best == Some((seat, action)) {
                self.tell(seat, GameEvent::Success { seat, command });
            } else {
                self.tell(seat, GameEvent::Fail { seat, command });
            }
        }

        match best {
            Some((seat, action)) => Resolution::Claim { seat, action },
            None => Resolution::Pass,
        }
    }

    /// Asks the other seats whether they rob the fourth `tile` of `actor`'s
    /// upgraded kong. Returns every robber in seating order.
    pub fn resolve_rob_kong(&self, players: &[Player; 4], actor: u8, tile: Tile, last_tile: bool) -> Winners {
        let ctx = WinContext {
            self_draw: false,
            last_tile,
            robbing_kong: true,
            kong_discard: false,
        };
        let mut decided = vec![];
        let mut pending = vec![];
        let mut wins: [Option<TaiData>; 4] = Default::default();

        for (seat, offset) in self.others(players, actor) {
            let p = &players[seat as usize];
            let Some(data) = HandEvaluator::new(p, self.config.min_tai).check_win(Some(tile), ctx) else {
                continue;
            };
            let mut offers = ActionSet::default();
            offers.push(Action::Win(tile));
            offers.score = data.tai;
            wins[seat as usize] = Some(data);
            if p.has_won {
                decided.push((offset, seat, Action::Win(tile)));
            } else {
                pending.push((offset, seat, offers));
            }
        }

        decided.extend(self.collect(pending, self.config.rob_kong_timeout(), |offers| Request::RobKong {
            from: actor,
            tile,
            offers: offers.to_payloads(),
        }));
        decided.sort_unstable_by_key(|&(offset, ..)| offset);

        decided
            .into_iter()
            .filter(|&(.., a)| a == Action::Win(tile))
            .filter_map(|(_, seat, _)| {
                let data = wins[seat as usize].take()?;
                self.tell(seat, GameEvent::Success { seat, command: Action::Win(tile).command().bit() });
                Some((seat, data))
            })
            .collect()
    }

    /// Requests every pending seat at once and validates the replies against
    /// what each was offered.
    fn collect(
        &self,
        pending: Vec<(u8, u8, ActionSet)>,
        timeout: Duration,
        make_request: impl Fn(&ActionSet) -> Request,
    ) -> Vec<(u8, u8, Action)> {
        let pass = json!({"command": 0, "tile": "", "score": 0});
        let requests = pending
            .iter()
            .map(|(_, seat, offers)| (*seat, make_request(offers), pass.clone()))
            .collect();
        let mut replies: [Value; 4] = Default::default();
        for (seat, reply) in request_concurrently(self.participants, requests, timeout) {
            replies[seat as usize] = reply;
        }

        pending
            .into_iter()
            .map(|(offset, seat, offers)| {
                let action = Action::from_reply(&replies[seat as usize], &offers.actions);
                debug!("seat {seat} answers {action}");
                (offset, seat, action)
            })
            .collect()
    }

    fn tell(&self, seat: u8, event: GameEvent) {
        self.participants[seat as usize].notify(&event);
    }
}
