//! Rules, scoring and table engine for Taiwanese sixteen-tile mahjong.
pub mod action;
pub mod algo;
pub mod arena;
pub mod config;
pub mod player;
pub mod tile;
pub mod tile_set;

use algo::evaluator::{HandEvaluator, WinContext};
use algo::{SCORE_TABLE, SHAPE_TABLE};
use player::Player;
use std::sync::LazyLock;

use anyhow::{Context, Result, ensure};
use log::info;

/// Builds the shape and score tables and checks them against a known hand.
/// Call once at startup; every evaluation afterwards is a lookup.
pub fn init() -> Result<()> {
    LazyLock::force(&SHAPE_TABLE);
    LazyLock::force(&SCORE_TABLE);
    ensure!(!SHAPE_TABLE.is_empty(), "shape table is empty");

    let mut sample = Player::new(1, 0, 0);
    sample.hand = "c123456 d234567 b7899".parse()?;
    let tile = "b6".parse()?;
    let data = HandEvaluator::new(&sample, 1)
        .check_win(Some(tile), WinContext::default())
        .context("tables reject a plain all-chows hand")?;
    ensure!(data.tai == 3, "all-chows hand scored {} tai, expected 3", data.tai);

    info!("tables ready: {} shapes", SHAPE_TABLE.len());
    Ok(())
}
