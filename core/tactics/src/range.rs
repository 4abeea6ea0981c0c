//! range.rs：
//! - 移動範圍（剩餘移動力）、攻擊範圍（距離帶）、到所有格子的累積成本。
//! - 移動與攻擊共用「依剩餘值由高到低展開」的洪水填充；攻擊每步固定扣 1，不看地形。
//! - 只做範圍計算，不考慮單位佔據；佔據的過濾由呼叫端負責。
use crate::*;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

/// 座標 + 數值（剩餘移動力、剩餘射程或累積成本，依計算方式而定）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeEntry {
    pub pos: Pos,
    pub value: MovementCost,
}

/// 範圍計算結果，走訪順序為棋盤列舉順序
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeField {
    start: Pos,
    entries: BTreeMap<Pos, MovementCost>,
}

impl RangeField {
    pub fn start(&self) -> Pos {
        self.start
    }

    pub fn get(&self, pos: Pos) -> Option<MovementCost> {
        self.entries.get(&pos).copied()
    }

    pub fn contains(&self, pos: Pos) -> bool {
        self.entries.contains_key(&pos)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn positions(&self) -> impl Iterator<Item = Pos> + '_ {
        self.entries.keys().copied()
    }

    pub fn entries(&self) -> impl Iterator<Item = RangeEntry> + '_ {
        self.entries
            .iter()
            .map(|(&pos, &value)| RangeEntry { pos, value })
    }
}

/// 計算移動範圍：座標 → 抵達後的剩餘移動力
///
/// 進入一格要付該格成本（起點不付），剩餘值 < 0 的格子不收錄。
/// 由剩餘值最高的層開始往下展開，第一次寫入即為最佳值。
/// 不可通行的格子（成本 >= `IMPASSABLE_COST`）永遠不會進入。
pub fn movement_range(grid: &Grid, start: Pos, budget: MovementCost) -> RangeField {
    let field = budget_descending_fill(grid, start, budget, |cell| {
        if cell.is_impassable() {
            None
        } else {
            Some(cell.cost)
        }
    });
    tracing::debug!(?start, budget, reachable = field.len(), "movement range");
    field
}

/// 攻擊範圍：與起點曼哈頓距離落在 [range_min, range_max] 的座標
///
/// 用同一套洪水填充，以 range_max 為初始值、每步扣 1（不看地形），
/// 再保留「已消耗距離」在 [0, range_max - range_min] 的格子。
/// 結果與 `Grid::cells_within_band` 相同。
pub fn attack_band(grid: &Grid, start: Pos, range_min: usize, range_max: usize) -> BTreeSet<Pos> {
    if range_min > range_max {
        return BTreeSet::new();
    }
    let Ok(budget) = MovementCost::try_from(range_max) else {
        return grid.cells_within_band(start, range_min, range_max).into_iter().collect();
    };
    let band = (range_max - range_min) as MovementCost;
    budget_descending_fill(grid, start, budget, |_| Some(1))
        .entries()
        .filter(|e| 0 <= e.value && e.value <= band)
        .map(|e| e.pos)
        .collect()
}

/// 從起點到所有可到達格子的累積移動成本（起點為 0，往外遞增）
///
/// 不可通行的格子不收錄、也不會經過；累積成本達到 `IMPASSABLE_COST` 的格子同樣視為到不了。
pub fn cost_to_all_cells(grid: &Grid, start: Pos) -> RangeField {
    let mut entries: BTreeMap<Pos, MovementCost> = BTreeMap::new();
    if !grid.contains(start) {
        return RangeField { start, entries };
    }
    let mut queue: BinaryHeap<Reverse<(MovementCost, Pos)>> = BinaryHeap::new();

    entries.insert(start, 0);
    queue.push(Reverse((0, start)));

    while let Some(Reverse((cost, pos))) = queue.pop() {
        // 跳過過時的隊列項（已有更優路徑）
        if cost > entries.get(&pos).copied().unwrap_or(MovementCost::MAX) {
            continue;
        }
        for next in grid.neighbors(pos) {
            let Some(cell) = grid.get_cell(next) else {
                continue;
            };
            if cell.is_impassable() {
                continue;
            }
            let new_cost = cost + cell.cost;
            if new_cost >= IMPASSABLE_COST {
                continue;
            }
            let best = entries.get(&next).copied().unwrap_or(MovementCost::MAX);
            if new_cost < best {
                entries.insert(next, new_cost);
                queue.push(Reverse((new_cost, next)));
            }
        }
    }

    RangeField { start, entries }
}

use inner::*;
mod inner {
    use super::*;

    /// 依剩餘值由高到低逐層展開
    ///
    /// `step_cost` 回傳 None 表示不可進入。
    pub fn budget_descending_fill(
        grid: &Grid,
        start: Pos,
        budget: MovementCost,
        step_cost: impl Fn(&Cell) -> Option<MovementCost>,
    ) -> RangeField {
        let mut entries: BTreeMap<Pos, MovementCost> = BTreeMap::new();
        if budget < 0 || !grid.contains(start) {
            return RangeField { start, entries };
        }

        // 只保留實際出現過的剩餘值，預算再大也不會配置整條層級陣列
        let mut levels: BTreeMap<MovementCost, Vec<Pos>> = BTreeMap::new();
        entries.insert(start, budget);
        levels.insert(budget, vec![start]);

        while let Some((level, mut queue)) = levels.pop_last() {
            let mut i = 0;
            while i < queue.len() {
                let pos = queue[i];
                i += 1;
                for next in grid.neighbors(pos) {
                    if entries.contains_key(&next) {
                        continue;
                    }
                    let Some(cost) = grid.get_cell(next).and_then(&step_cost) else {
                        continue;
                    };
                    let remaining = level - cost;
                    if remaining < 0 || remaining > level {
                        continue;
                    }
                    entries.insert(next, remaining);
                    if remaining == level {
                        queue.push(next);
                    } else {
                        levels.entry(remaining).or_default().push(next);
                    }
                }
            }
        }

        RangeField { start, entries }
    }
}
