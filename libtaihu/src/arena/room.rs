//! The table: deals, runs turns until a win or the dead wall, settles, and
//! keeps the banker seat and prevailing wind across hands.
use super::arbiter::{ActionArbiter, DiscardContext, Resolution};
use super::event::{GameEvent, Request, SeatResult};
use super::participant::{Participant, request_concurrently};
use super::settle::{self, Transfer, score_for};
use crate::action::{Action, ActionSet, parse_change_tiles, parse_discard, parse_short_suit};
use crate::algo::evaluator::{HandEvaluator, WinContext};
use crate::algo::score::TaiData;
use crate::config::RuleConfig;
use crate::player::{Player, RecordKind};
use crate::tile::{Suit, Tile};
use crate::tile_set::TileSet;

use anyhow::{Result, ensure};
use log::{debug, info, warn};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde_json::json;

const FLOWER_TAI: i32 = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandResult {
    pub round: u32,
    pub banker: u8,
    /// Seats in the order they first won.
    pub winners: Vec<u8>,
    pub exhausted: bool,
    pub results: Vec<SeatResult>,
}

/// How a seat's turn went before its discard.
enum TurnStep {
    Discard,
    /// A kong was formed, draw a replacement.
    Kong,
    /// Play continues after this seat.
    Won(u8),
}

pub struct Room {
    config: RuleConfig,
    participants: Vec<Box<dyn Participant>>,
    rng: ChaCha8Rng,

    banker: u8,
    streak: u32,
    round: u32,
    round_wind: u8,
    banker_moves: u32,
    totals: [i64; 4],

    players: [Player; 4],
    deck: TileSet,
    winners: Vec<u8>,
    exhausted: bool,
}

impl Room {
    pub fn new(config: RuleConfig, participants: Vec<Box<dyn Participant>>, seed: u64) -> Result<Self> {
        config.validate()?;
        ensure!(
            participants.len() == 4,
            "a table seats exactly 4 participants, got {}",
            participants.len(),
        );
        Ok(Self {
            config,
            participants,
            rng: ChaCha8Rng::seed_from_u64(seed),
            banker: 0,
            streak: 0,
            round: 0,
            round_wind: 0,
            banker_moves: 0,
            totals: [0; 4],
            players: [0, 1, 2, 3].map(|seat| Player::new(seat, 0, 0)),
            deck: TileSet::new(),
            winners: vec![],
            exhausted: false,
        })
    }

    #[inline]
    #[must_use]
    pub const fn banker(&self) -> u8 {
        self.banker
    }

    #[inline]
    #[must_use]
    pub const fn streak(&self) -> u32 {
        self.streak
    }

    #[inline]
    #[must_use]
    pub const fn round_wind(&self) -> u8 {
        self.round_wind
    }

    /// Credit summed over every hand played so far.
    #[inline]
    #[must_use]
    pub const fn totals(&self) -> [i64; 4] {
        self.totals
    }

    /// Seats of the current or last hand.
    #[inline]
    #[must_use]
    pub const fn players(&self) -> &[Player; 4] {
        &self.players
    }

    pub fn play(&mut self, hands: u32) -> Vec<HandResult> {
        (0..hands).map(|_| self.play_hand()).collect()
    }

    /// Plays one hand through settlement and moves the banker seat on.
    pub fn play_hand(&mut self) -> HandResult {
        self.start_hand();
        self.deal();
        if !self.is_over() {
            if self.config.change_tiles {
                self.change_tiles();
            }
            if self.config.short_suit {
                self.choose_short_suits();
            }
            self.run_turns();
        }
        self.finish()
    }

    fn start_hand(&mut self) {
        let (banker, wind) = (self.banker, self.round_wind);
        self.players = [0, 1, 2, 3].map(|seat| Player::new(seat, banker, wind));
        self.deck = TileSet::full_deck(self.config.honors, self.config.flowers);
        self.winners.clear();
        self.exhausted = false;

        let open_idx: u8 = (0..3).map(|_| self.rng.random_range(1..=6u8)).sum();
        info!(
            "hand {} starts: banker {banker} (streak {}), wind {wind}, open at {open_idx}",
            self.round, self.streak,
        );
        self.broadcast(&GameEvent::StartHand {
            banker,
            round_wind: wind,
            round: self.round,
            streak: self.streak,
            open_idx,
        });
    }

    fn deal(&mut self) {
        for _ in 0..self.config.hand_size {
            for offset in 0..4 {
                let seat = (self.banker + offset) % 4;
                if let Some(tile) = self.deck.draw(&mut self.rng) {
                    self.players[seat as usize].hand.add(tile);
                }
            }
        }
        for p in &self.players {
            self.tell(p.seat, &GameEvent::Deal {
                seat: p.seat,
                hand: p.hand,
            });
        }
        for offset in 0..4 {
            if self.is_over() {
                return;
            }
            self.replace_dealt_flowers((self.banker + offset) % 4);
        }
    }

    fn replace_dealt_flowers(&mut self, seat: u8) {
        loop {
            let Some(flower) = self.players[seat as usize].hand.iter().find(|t| t.is_flower()) else {
                return;
            };
            self.players[seat as usize].hand.sub(flower);
            self.reveal_flower(seat, flower);
            if self.is_over() {
                return;
            }
            let Some(tile) = self.deck.draw(&mut self.rng) else {
                self.exhausted = true;
                return;
            };
            self.players[seat as usize].hand.add(tile);
        }
    }

    /// Every seat gives up three tiles of one number suit at once; they all
    /// move `offset` seats on, the same offset for the whole table.
    fn change_tiles(&mut self) {
        let Some(defaults) = self
            .players
            .each_ref()
            .map(Player::default_change_tiles)
            .into_iter()
            .collect::<Option<Vec<_>>>()
        else {
            warn!("a seat holds no three tiles of one number suit, skipping the change");
            return;
        };
        let requests = self
            .players
            .iter()
            .zip(&defaults)
            .map(|(p, default)| {
                let default = json!(default.map(|t| t.to_string()));
                (p.seat, Request::ChangeTiles { hand: p.hand }, default)
            })
            .collect();
        let replies = request_concurrently(&self.participants, requests, self.config.change_tiles_timeout());

        let mut given = defaults.clone();
        for (seat, reply) in replies {
            let p = &mut self.players[seat as usize];
            let tiles = parse_change_tiles(&reply, &p.hand, defaults[seat as usize]);
            tiles.iter().for_each(|&t| p.hand.sub(t));
            given[seat as usize] = tiles;
        }

        let offset: u8 = self.rng.random_range(1..=3);
        for (from, &tiles) in (0..4u8).zip(&given) {
            let to = (from + offset) % 4;
            tiles.iter().for_each(|&t| self.players[to as usize].hand.add(t));
            self.tell(to, &GameEvent::TilesChanged { seat: to, tiles, offset });
        }
        debug!("tiles passed {offset} seats on");
    }

    fn choose_short_suits(&mut self) {
        let requests = self
            .players
            .iter()
            .map(|p| (p.seat, Request::ShortSuit { hand: p.hand }, json!(0)))
            .collect();
        let replies = request_concurrently(&self.participants, requests, self.config.short_suit_timeout());
        let mut suits = [0; 4];
        for (seat, reply) in replies {
            let suit = parse_short_suit(&reply);
            self.players[seat as usize].short_suit = Some(suit);
            suits[seat as usize] = suit.as_usize() as u8;
        }
        debug!("short suits {suits:?}");
        self.broadcast(&GameEvent::ShortSuits { suits });
    }

    fn run_turns(&mut self) {
        let mut seat = self.banker;
        let mut draw = true;
        while !self.is_over() {
            if draw {
                if self.draw_for(seat).is_none() {
                    break;
                }
                match self.self_turn(seat) {
                    TurnStep::Discard => {}
                    TurnStep::Kong => continue,
                    TurnStep::Won(last) => {
                        seat = (last + 1) % 4;
                        continue;
                    }
                }
            }

            let Some((tile, kong_discard)) = self.take_discard(seat) else {
                warn!("seat {seat} has nothing to discard, ending the hand");
                self.exhausted = true;
                break;
            };
            let ctx = DiscardContext {
                last_tile: self.wall_exhausted(),
                kong_discard,
            };
            let resolution =
                ActionArbiter::new(&self.config, &self.participants).resolve_discard(&self.players, seat, tile, ctx);
            match resolution {
                Resolution::Wins(winners) => {
                    self.players[seat as usize].discards.sub(tile);
                    let mut last = seat;
                    for (winner, data) in winners {
                        self.record_win(winner, seat, tile, data, RecordKind::Win);
                        last = winner;
                    }
                    self.clear_first_draw();
                    seat = (last + 1) % 4;
                    draw = true;
                }
                Resolution::Claim { seat: claimant, action } => {
                    self.players[seat as usize].discards.sub(tile);
                    let p = &mut self.players[claimant as usize];
                    match action {
                        Action::Kong(t) => {
                            p.kong(t);
                            self.transfer(Transfer {
                                from: seat,
                                to: claimant,
                                amount: self.config.kong_payment,
                                kind: RecordKind::Kong,
                                tile: Some(t),
                            });
                        }
                        Action::Pung(t) => p.pung(t),
                        Action::Chow(a, b) => p.chow(tile, [a, b]),
                        _ => {}
                    }
                    self.announce(seat, claimant, action, 0);
                    self.clear_first_draw();
                    draw = matches!(action, Action::Kong(_));
                    seat = claimant;
                }
                Resolution::Pass => {
                    seat = (seat + 1) % 4;
                    draw = true;
                }
            }
        }
    }

    /// Draws for `seat`, revealing flowers until a plain tile comes. `None`
    /// once the wall is down to the dead wall or a flower win ended the hand.
    fn draw_for(&mut self, seat: u8) -> Option<Tile> {
        loop {
            if self.wall_exhausted() {
                self.exhausted = true;
                return None;
            }
            let Some(tile) = self.deck.draw(&mut self.rng) else {
                self.exhausted = true;
                return None;
            };
            if tile.is_flower() {
                self.reveal_flower(seat, tile);
                if self.is_over() {
                    return None;
                }
                continue;
            }

            self.players[seat as usize].draw(tile);
            for to in 0..4 {
                let tile = (to == seat).then_some(tile);
                self.tell(to, &GameEvent::Draw { seat, tile });
            }
            self.broadcast(&GameEvent::RemainCount {
                count: self.deck.count(),
            });
            return Some(tile);
        }
    }

    /// Self-draw win or kongs on the seat's own draw.
    fn self_turn(&mut self, seat: u8) -> TurnStep {
        let p = &self.players[seat as usize];
        let Some(drawn) = p.last_draw else {
            return TurnStep::Discard;
        };
        let last_tile = self.wall_exhausted();
        let eval = HandEvaluator::new(p, self.config.min_tai);
        let ctx = WinContext {
            last_tile,
            ..WinContext::self_draw()
        };
        let win = eval.check_win(None, ctx);

        let mut offers = ActionSet::default();
        if let Some(data) = &win {
            offers.push(Action::SelfDraw(drawn));
            offers.score = data.tai;
        }
        if !last_tile {
            for t in p.hand.distinct() {
                if p.hand.get(t) == 4 && eval.check_kong(t) {
                    offers.push(Action::ConcealedKong(t));
                }
            }
            for t in p.pungs.distinct() {
                if p.hand.have(t) && eval.check_kong(t) {
                    offers.push(Action::UpgradeKong(t));
                }
            }
        }

        let action = if offers.is_empty() {
            Action::Pass
        } else if p.has_won {
            // winners keep drawing: win again, or kong the drawn tile
            offers
                .actions
                .iter()
                .copied()
                .find(|a| matches!(a, Action::SelfDraw(_)))
                .or_else(|| offers.actions.iter().copied().find(|a| a.tile() == Some(drawn)))
                .unwrap_or_default()
        } else {
            let req = Request::Command {
                commands: offers.commands.bits(),
                offers: offers.to_payloads(),
            };
            let reply = self.participants[seat as usize].request(
                &req,
                json!({"command": 0, "tile": "", "score": 0}),
                self.config.command_timeout(),
            );
            Action::from_reply(&reply, &offers.actions)
        };

        match (action, win) {
            (Action::SelfDraw(tile), Some(data)) => {
                self.players[seat as usize].win(tile, data.tai, true);
                self.mark_winner(seat);
                let payers: Vec<_> = (0..4).filter(|&s| s != seat).collect();
                self.pay_win(seat, &payers, data.tai, RecordKind::SelfDraw, Some(tile));
                info!("seat {seat} self-draws {tile} for {} tai {:?}", data.tai, data.yaku);
                self.announce(seat, seat, action, data.tai);
                TurnStep::Won(seat)
            }
            (Action::ConcealedKong(tile), _) => {
                self.players[seat as usize].concealed_kong(tile);
                self.collect_from_others(seat, self.config.kong_payment, RecordKind::ConcealedKong, tile);
                self.announce(seat, seat, action, 0);
                TurnStep::Kong
            }
            (Action::UpgradeKong(tile), _) => self.upgrade_kong(seat, tile),
            _ => TurnStep::Discard,
        }
    }

    fn upgrade_kong(&mut self, seat: u8, tile: Tile) -> TurnStep {
        self.players[seat as usize].upgrade_kong(tile);
        self.broadcast(&GameEvent::RobKong { seat, tile });
        let robbers = ActionArbiter::new(&self.config, &self.participants).resolve_rob_kong(
            &self.players,
            seat,
            tile,
            self.wall_exhausted(),
        );
        if robbers.is_empty() {
            self.collect_from_others(seat, self.config.upgrade_kong_payment, RecordKind::UpgradeKong, tile);
            self.announce(seat, seat, Action::UpgradeKong(tile), 0);
            return TurnStep::Kong;
        }

        self.players[seat as usize].revert_upgrade_kong(tile);
        let mut last = seat;
        for (robber, data) in robbers {
            self.record_win(robber, seat, tile, data, RecordKind::RobKong);
            last = robber;
        }
        self.clear_first_draw();
        TurnStep::Won(last)
    }

    /// The discard of `seat` and whether it followed a kong. A seat that
    /// already won throws its drawn tile.
    fn take_discard(&mut self, seat: u8) -> Option<(Tile, bool)> {
        let p = &self.players[seat as usize];
        let tile = if p.has_won {
            p.last_draw.or_else(|| p.default_discard())?
        } else {
            let default = p.default_discard()?;
            let reply = self.participants[seat as usize].request(
                &Request::Discard { hand: p.hand },
                json!(default.to_string()),
                self.config.discard_timeout(),
            );
            parse_discard(&reply, &p.hand, default)
        };
        let kong_discard = p.just_kong;
        self.players[seat as usize].discard(tile);
        self.broadcast(&GameEvent::Discard { seat, tile });
        Some((tile, kong_discard))
    }

    fn reveal_flower(&mut self, seat: u8, flower: Tile) {
        self.players[seat as usize].flowers.add(flower);
        self.broadcast(&GameEvent::Flower { seat, tile: flower });

        let count = |p: &Player| p.flowers.suit_count(Suit::Flowers);
        if count(&self.players[seat as usize]) == 8 {
            let payers: Vec<_> = (0..4).filter(|&s| s != seat).collect();
            self.flower_win(seat, &payers, flower, RecordKind::EightFlowers, "Eight Flowers");
            return;
        }
        let holder = self.players.iter().find(|&p| p.seat != seat && !p.has_won && count(p) == 7).map(|p| p.seat);
        if let Some(holder) = holder {
            self.flower_win(holder, &[seat], flower, RecordKind::SevenRobOne, "Seven Rob One");
        }
    }

    fn flower_win(&mut self, winner: u8, payers: &[u8], flower: Tile, kind: RecordKind, name: &'static str) {
        let p = &mut self.players[winner as usize];
        p.has_won = true;
        p.max_tai = p.max_tai.max(FLOWER_TAI);
        self.mark_winner(winner);
        self.pay_win(winner, payers, FLOWER_TAI, kind, Some(flower));
        info!("seat {winner} wins by {name}");
        let from = if let [payer] = payers { *payer } else { winner };
        self.announce(from, winner, Action::Win(flower), FLOWER_TAI);
    }

    /// `winner` takes `tile` given up by `from`, who pays for it.
    fn record_win(&mut self, winner: u8, from: u8, tile: Tile, data: TaiData, kind: RecordKind) {
        self.players[winner as usize].win(tile, data.tai, false);
        self.mark_winner(winner);
        self.pay_win(winner, &[from], data.tai, kind, Some(tile));
        info!("seat {winner} wins on {tile} from seat {from} for {} tai {:?}", data.tai, data.yaku);
        self.announce(from, winner, Action::Win(tile), data.tai);
    }

    fn pay_win(&mut self, winner: u8, payers: &[u8], tai: i32, kind: RecordKind, tile: Option<Tile>) {
        for &from in payers {
            let mut tai = tai;
            if self.config.banker_bonus && (from == self.banker || winner == self.banker) {
                tai += 1 + 2 * self.streak as i32;
            }
            self.transfer(Transfer {
                from,
                to: winner,
                amount: score_for(tai),
                kind,
                tile,
            });
        }
    }

    fn collect_from_others(&mut self, seat: u8, amount: i32, kind: RecordKind, tile: Tile) {
        for from in (0..4).filter(|&s| s != seat) {
            self.transfer(Transfer {
                from,
                to: seat,
                amount,
                kind,
                tile: Some(tile),
            });
        }
    }

    #[inline]
    fn transfer(&mut self, t: Transfer) {
        settle::apply(&mut self.players, &t);
    }

    fn finish(&mut self) -> HandResult {
        if self.exhausted {
            let settlement = settle::settle(&self.players, &self.config);
            for (p, &tai) in self.players.iter_mut().zip(&settlement.readiness) {
                if tai > 0 {
                    p.is_ready = true;
                    p.max_tai = p.max_tai.max(tai);
                }
            }
            for t in &settlement.transfers {
                self.transfer(*t);
            }
        }

        let results: Vec<_> = self.players.iter().map(SeatResult::from).collect();
        for (total, p) in self.totals.iter_mut().zip(&self.players) {
            *total += i64::from(p.credit);
        }
        info!(
            "hand {} ends, winners {:?}, credit {:?}",
            self.round,
            self.winners,
            self.players.each_ref().map(|p| p.credit),
        );
        self.broadcast(&GameEvent::EndHand {
            exhausted: self.exhausted,
            results: results.clone(),
        });

        let ret = HandResult {
            round: self.round,
            banker: self.banker,
            winners: self.winners.clone(),
            exhausted: self.exhausted,
            results,
        };
        self.advance();
        ret
    }

    /// Banker stays on a banker win or a hand nobody won.
    fn advance(&mut self) {
        if self.winners.is_empty() || self.players[self.banker as usize].has_won {
            self.streak += 1;
        } else {
            self.banker = (self.banker + 1) % 4;
            self.streak = 0;
            self.banker_moves += 1;
            if self.banker_moves % 4 == 0 {
                self.round_wind = (self.round_wind + 1) % 4;
            }
        }
        self.round += 1;
    }

    fn is_over(&self) -> bool {
        let needed = if self.config.play_until_last { 3 } else { 1 };
        self.exhausted || self.winners.len() >= needed
    }

    #[inline]
    fn wall_exhausted(&self) -> bool {
        self.deck.count() <= self.config.dead_wall
    }

    fn mark_winner(&mut self, seat: u8) {
        if !self.winners.contains(&seat) {
            self.winners.push(seat);
        }
    }

    fn clear_first_draw(&mut self) {
        for p in &mut self.players {
            p.first_draw = false;
        }
    }

    fn announce(&self, from: u8, to: u8, action: Action, score: i32) {
        let payload = action.to_payload(score);
        debug!("seat {to}: {action} from seat {from}");
        self.broadcast(&GameEvent::Command {
            from,
            to,
            command: payload.command,
            tile: payload.tile,
            score,
        });
    }

    fn tell(&self, seat: u8, event: &GameEvent) {
        self.participants[seat as usize].notify(event);
    }

    fn broadcast(&self, event: &GameEvent) {
        for p in &self.participants {
            p.notify(event);
        }
    }
}
