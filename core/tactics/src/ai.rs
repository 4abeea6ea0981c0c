//! ai.rs：
//! - 電腦隊伍的逐單位決策：選目標格、沿路徑前進、挑攻擊對象。
//! - 以 `AiTurn` 保存一個回合的進度，每次 `next_step` 產生一個需要等待表現層完成的行動。
//! - 每次從待處理名單取出一個單位就立刻移除，無法行動的單位只會被處理一次，回合一定會結束。
use crate::*;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AiConfig {
    /// 我方與敵方最近距離超過此值時整回合不行動
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detection_distance: Option<usize>,
    /// 隨機選擇攻擊目標的機率（0–100）
    pub randomize_attack_target: u32,
    /// 停留格地形減傷率的加權
    pub cell_reduce_rate_importance: f32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            detection_distance: None,
            randomize_attack_target: 0,
            cell_reduce_rate_importance: 2.0,
        }
    }
}

/// AI 要求執行的下一個行動
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiStep {
    Move { unit: UnitID, dest: Pos },
    Attack(BattleContext),
    /// 所有單位處理完畢，結束回合
    Done,
}

/// 一個 AI 回合的進度
#[derive(Debug, Clone)]
pub struct AiTurn {
    team: TeamID,
    config: AiConfig,
    pending: Vec<UnitID>,
    /// 已移動（或決定原地不動），等待決定攻擊的單位
    awaiting_attack: Option<UnitID>,
    processed: usize,
    issued: usize,
    finished: bool,
}

impl AiTurn {
    pub fn begin(team: TeamID, config: AiConfig, units: &UnitRegistry) -> Self {
        let pending = if within_detection(units, team, config.detection_distance) {
            units
                .iter()
                .filter(|u| u.team == team && !u.has_acted)
                .map(|u| u.id)
                .collect()
        } else {
            tracing::debug!(team, "no enemy detected, skip turn");
            Vec::new()
        };
        Self {
            team,
            config,
            pending,
            awaiting_attack: None,
            processed: 0,
            issued: 0,
            finished: false,
        }
    }

    pub fn team(&self) -> TeamID {
        self.team
    }

    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    /// 已從待處理名單取出的單位數
    pub fn processed(&self) -> usize {
        self.processed
    }

    /// 已發出的移動與攻擊數
    pub fn issued(&self) -> usize {
        self.issued
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// 放棄目前單位（行動被拒絕時），標記為已行動
    pub fn abandon(&mut self, units: &mut UnitRegistry, unit_id: UnitID) {
        if self.awaiting_attack == Some(unit_id) {
            self.awaiting_attack = None;
        }
        mark_acted(units, unit_id);
    }

    /// 決定下一個行動；查詢失敗只會讓該單位結束行動，不會中斷回合
    pub fn next_step<R: Rng>(
        &mut self,
        grid: &Grid,
        units: &mut UnitRegistry,
        rng: &mut R,
    ) -> AiStep {
        loop {
            if let Some(unit_id) = self.awaiting_attack.take() {
                match choose_attack_target(grid, units, unit_id, &self.config, rng) {
                    Ok(Some(defender)) => {
                        self.issued += 1;
                        return AiStep::Attack(BattleContext {
                            attacker: unit_id,
                            defender,
                        });
                    }
                    Ok(None) => {}
                    Err(err) => tracing::warn!(unit_id, %err, "ai attack decision failed"),
                }
                mark_acted(units, unit_id);
                continue;
            }

            let Some(unit_id) = self.pick_next(units) else {
                self.finished = true;
                return AiStep::Done;
            };
            self.processed += 1;

            match plan_move(grid, units, unit_id, &self.config) {
                Ok(Some(dest)) => {
                    self.awaiting_attack = Some(unit_id);
                    if units.unit_to_pos(unit_id) != Some(dest) {
                        self.issued += 1;
                        return AiStep::Move { unit: unit_id, dest };
                    }
                }
                Ok(None) => {
                    tracing::debug!(unit_id, "no attack base, end action");
                    mark_acted(units, unit_id);
                }
                Err(err) => {
                    tracing::warn!(unit_id, %err, "ai move decision failed");
                    mark_acted(units, unit_id);
                }
            }
        }
    }

    /// 從待處理名單取出目前生命值最高的單位（同分取 ID 小者）
    fn pick_next(&mut self, units: &UnitRegistry) -> Option<UnitID> {
        self.pending.retain(|id| {
            units
                .get(*id)
                .is_ok_and(|u| u.is_alive() && !u.has_acted)
        });
        let mut best: Option<(usize, i32)> = None;
        for (index, id) in self.pending.iter().enumerate() {
            let life = units.get(*id).map_or(0, |u| u.life);
            if best.is_none_or(|(_, best_life)| life > best_life) {
                best = Some((index, life));
            }
        }
        best.map(|(index, _)| self.pending.remove(index))
    }
}

/// 敵方單位射程帶內、可通行的格子（以此單位的射程計算）
pub fn attack_base_cells(grid: &Grid, units: &UnitRegistry, unit: &Unit) -> BTreeSet<Pos> {
    units
        .iter()
        .filter(|enemy| enemy.team != unit.team)
        .filter_map(|enemy| units.unit_to_pos(enemy.id))
        .flat_map(|enemy_pos| {
            attack_band(grid, enemy_pos, unit.attack_range_min, unit.attack_range_max)
        })
        .filter(|p| grid.get_cell(*p).is_some_and(|c| !c.is_impassable()))
        .collect()
}

/// 決定移動目的地；None 表示沒有任何可攻擊據點
///
/// 1. 取移動成本最低的攻擊據點為目標（同分取列舉順序較前者）
/// 2. 算出往目標的路徑，與本回合可移動的格子取交集（原地不動也算）
/// 3. 以「路徑進度 + 減傷率 × 權重」評分，取最高分（同分取較靠近目標者）
pub fn plan_move(
    grid: &Grid,
    units: &UnitRegistry,
    unit_id: UnitID,
    config: &AiConfig,
) -> Result<Option<Pos>> {
    let unit = units.get(unit_id)?;
    let from = units.position(unit_id)?;

    let costs = cost_to_all_cells(grid, from);
    let target = attack_base_cells(grid, units, unit)
        .into_iter()
        .filter_map(|p| costs.get(p).map(|cost| (p, cost)))
        .min_by_key(|(_, cost)| *cost);
    let Some((target, total_cost)) = target else {
        return Ok(None);
    };

    let toward = movement_range(grid, from, total_cost);
    let route = find_route_with_progress(grid, &toward, target)?;
    let movable = movable_cells_of(grid, units, unit_id)?;

    let mut best: Option<(Pos, f32)> = None;
    for entry in route {
        if entry.pos != from && !movable.contains(&entry.pos) {
            continue;
        }
        let reduce_rate = grid.cell_at(entry.pos)?.reduce_rate;
        let score = entry.value as f32 + reduce_rate * config.cell_reduce_rate_importance;
        if best.is_none_or(|(_, best_score)| score >= best_score) {
            best = Some((entry.pos, score));
        }
    }
    tracing::debug!(unit_id, ?from, ?target, dest = ?best.map(|b| b.0), "ai move plan");
    Ok(best.map(|(pos, _)| pos))
}

/// 決定攻擊對象；None 表示射程內沒有敵人
///
/// 依設定機率隨機挑選，否則取「傷害 ×（致命則 10 倍）− 反擊傷害」最高者
pub fn choose_attack_target<R: Rng>(
    grid: &Grid,
    units: &UnitRegistry,
    unit_id: UnitID,
    config: &AiConfig,
    rng: &mut R,
) -> Result<Option<UnitID>> {
    let targets: Vec<UnitID> = attackable_cells_of(grid, units, unit_id)?
        .into_iter()
        .filter_map(|p| units.pos_to_unit(p))
        .collect();
    if targets.is_empty() {
        return Ok(None);
    }

    if config.randomize_attack_target > 0 && rng.random_range(0..100) < config.randomize_attack_target
    {
        let pick = targets[rng.random_range(0..targets.len())];
        tracing::debug!(unit_id, target = pick, "ai random target");
        return Ok(Some(pick));
    }

    let mut best: Option<(UnitID, AIScore)> = None;
    for defender in targets {
        let preview = preview_battle(
            grid,
            units,
            BattleContext {
                attacker: unit_id,
                defender,
            },
        )?;
        let multiplier = if preview.lethal { 10 } else { 1 };
        let score = preview.damage_dealt * multiplier - preview.counter_damage;
        if best.is_none_or(|(_, best_score)| score > best_score) {
            best = Some((defender, score));
        }
    }
    tracing::debug!(unit_id, target = ?best, "ai scored target");
    Ok(best.map(|(id, _)| id))
}

use inner::*;
mod inner {
    use super::*;

    pub fn mark_acted(units: &mut UnitRegistry, unit_id: UnitID) {
        if let Ok(unit) = units.get_mut(unit_id) {
            unit.has_acted = true;
        }
    }

    /// 我方與敵方最近的曼哈頓距離是否在偵測距離內
    pub fn within_detection(units: &UnitRegistry, team: TeamID, limit: Option<usize>) -> bool {
        let Some(limit) = limit else {
            return true;
        };
        let positions = |ids: Vec<UnitID>| -> Vec<Pos> {
            ids.into_iter()
                .filter_map(|id| units.unit_to_pos(id))
                .collect()
        };
        let own = positions(units.team_units(team));
        let enemies = positions(units.enemy_units(team));
        own.iter()
            .flat_map(|a| enemies.iter().map(move |b| a.distance(*b)))
            .min()
            .is_some_and(|d| d <= limit)
    }
}
