use crate::action::ActionPayload;
use crate::player::{Player, ScoreRecord};
use crate::tile::Tile;
use crate::tile_set::TileSet;

use serde::Serialize;

/// A decision asked of one participant. The reply is raw JSON and is
/// validated by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Reply with the text of a tile in `hand`.
    Discard { hand: TileSet },
    /// Reply with one of `offers` (or a pass) as an action payload.
    Command {
        commands: u8,
        offers: Vec<ActionPayload>,
    },
    RobKong {
        from: u8,
        tile: Tile,
        offers: Vec<ActionPayload>,
    },
    /// Reply with three tiles of one number suit from `hand`.
    ChangeTiles { hand: TileSet },
    /// Reply with 0, 1 or 2.
    ShortSuit { hand: TileSet },
}

impl Request {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Discard { .. } => "discard",
            Self::Command { .. } => "command",
            Self::RobKong { .. } => "rob_kong",
            Self::ChangeTiles { .. } => "change_tiles",
            Self::ShortSuit { .. } => "short_suit",
        }
    }
}

/// Facts broadcast to participants. `Deal`, `Draw` with a tile, `Success`
/// and `Fail` are only sent to the seat they concern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    StartHand {
        banker: u8,
        round_wind: u8,
        round: u32,
        streak: u32,
        open_idx: u8,
    },
    Deal {
        seat: u8,
        hand: TileSet,
    },
    Flower {
        seat: u8,
        tile: Tile,
    },
    /// Tiles passed to `seat` from the seat `offset` places before it.
    TilesChanged {
        seat: u8,
        tiles: [Tile; 3],
        offset: u8,
    },
    ShortSuits {
        suits: [u8; 4],
    },
    RemainCount {
        count: u32,
    },
    Draw {
        seat: u8,
        #[serde(skip_serializing_if = "Option::is_none")]
        tile: Option<Tile>,
    },
    Discard {
        seat: u8,
        tile: Tile,
    },
    /// A resolved action, `from` is the seat that gave up the tile.
    Command {
        from: u8,
        to: u8,
        command: u8,
        tile: String,
        score: i32,
    },
    Success {
        seat: u8,
        command: u8,
    },
    Fail {
        seat: u8,
        command: u8,
    },
    RobKong {
        seat: u8,
        tile: Tile,
    },
    EndHand {
        exhausted: bool,
        results: Vec<SeatResult>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeatResult {
    pub seat: u8,
    pub hand: TileSet,
    pub chows: TileSet,
    pub pungs: TileSet,
    pub kongs: TileSet,
    pub concealed_kongs: TileSet,
    pub flowers: TileSet,
    pub won_tiles: TileSet,
    pub has_won: bool,
    pub is_ready: bool,
    pub max_tai: i32,
    pub credit: i32,
    pub score_log: Vec<ScoreRecord>,
}

impl From<&Player> for SeatResult {
    fn from(p: &Player) -> Self {
        Self {
            seat: p.seat,
            hand: p.hand,
            chows: p.chows,
            pungs: p.pungs,
            kongs: p.kongs,
            concealed_kongs: p.concealed_kongs,
            flowers: p.flowers,
            won_tiles: p.won_tiles,
            has_won: p.has_won,
            is_ready: p.is_ready,
            max_tai: p.max_tai,
            credit: p.credit,
            score_log: p.score_log.clone(),
        }
    }
}
