//! 戰棋對戰核心：棋盤、移動與攻擊範圍、路徑、戰鬥結算、回合切換與 AI。
//!
//! 不負責畫面、動畫與輸入；表現層透過 [`BattleEvent`] 取得要播放的內容，
//! 播放完畢後呼叫 [`Battle::finish_move`]、[`Battle::finish_battle`] 回報。
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

mod ai;
mod battle;
mod combat;
mod config;
mod error;
mod grid;
mod loader;
mod range;
mod route;
mod turn;
mod unit;

pub use ai::*;
pub use battle::*;
pub use combat::*;
pub use config::*;
pub use error::*;
pub use grid::*;
pub use loader::*;
pub use range::*;
pub use route::*;
pub use turn::*;
pub use unit::*;

pub type Coord = usize;
pub type UnitID = u64;
pub type TeamID = u32;
pub type MovementCost = i32;
pub type AIScore = i32;

pub const PLAYER_TEAM: TeamID = 0;
pub const ENEMY_TEAM: TeamID = 1;
/// 無法通過的移動成本
pub const IMPASSABLE_COST: MovementCost = 999;

/// 棋盤座標
///
/// 排序為列優先（先比 y 再比 x），與棋盤生成、列舉的順序一致，
/// 所以 `BTreeMap<Pos, _>` 的走訪順序就是棋盤列舉順序。
#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Pos {
    pub x: Coord,
    pub y: Coord,
}

impl Pos {
    pub fn new(x: Coord, y: Coord) -> Self {
        Self { x, y }
    }

    /// 曼哈頓距離 |dx| + |dy|
    pub fn distance(self, other: Pos) -> usize {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}

impl Ord for Pos {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.y, self.x).cmp(&(other.y, other.x))
    }
}

impl PartialOrd for Pos {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
