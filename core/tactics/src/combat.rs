//! combat.rs：
//! - 負責攻擊力分階、兵種相剋、地形減傷與傷害結算，以及一次交戰（攻擊 + 反擊）的流程。
//! - 地形減傷取「出手方所在格」的減傷率，攻擊與反擊皆同。
//! - 交戰的雙方以 `BattleContext` 明確傳遞，不使用全域狀態。
use crate::*;
use std::collections::HashMap;
use std::sync::LazyLock;
use strum::IntoEnumIterator;

pub const NEUTRAL_BONUS: f64 = 1.0;
pub const ADVANTAGE_BONUS: f64 = 2.0;
pub const DISADVANTAGE_BONUS: f64 = 0.5;

/// 兵種相剋表，由循環剋制關係產生一次
static TYPE_CHART: LazyLock<HashMap<(UnitType, UnitType), f64>> = LazyLock::new(|| {
    let mut chart = HashMap::new();
    for attacker in UnitType::iter() {
        for defender in UnitType::iter() {
            let bonus = if attacker.beats() == defender {
                ADVANTAGE_BONUS
            } else if defender.beats() == attacker {
                DISADVANTAGE_BONUS
            } else {
                NEUTRAL_BONUS
            };
            chart.insert((attacker, defender), bonus);
        }
    }
    chart
});

pub fn type_bonus(attacker: UnitType, defender: UnitType) -> f64 {
    TYPE_CHART
        .get(&(attacker, defender))
        .copied()
        .unwrap_or(NEUTRAL_BONUS)
}

/// 攻擊力隨生命值分 10 階下降：round(base × ceil(life / life_max × 10) / 10)
pub fn attack_power(unit: &Unit) -> i32 {
    round(f64::from(unit.attack_power_base) * f64::from(unit.life_tier()) / 10.0)
}

/// 傷害 = round(攻擊力 × 相剋倍率 × (1 − 出手方所在格減傷率))
pub fn damage(attacker: &Unit, defender: &Unit, attacker_cell: &Cell) -> i32 {
    let reduce = 1.0 - f64::from(attacker_cell.reduce_rate);
    round(
        f64::from(attack_power(attacker)) * type_bonus(attacker.unit_type, defender.unit_type) * reduce,
    )
}

/// 扣除傷害，生命值不低於 0；回傳實際造成的傷害
pub fn apply_damage(defender: &mut Unit, attacker: &Unit, attacker_cell: &Cell) -> i32 {
    let amount = damage(attacker, defender, attacker_cell).max(0);
    let before = defender.life;
    defender.life = (defender.life - amount).clamp(0, defender.life_max);
    before - defender.life
}

impl Unit {
    pub fn attack_power(&self) -> i32 {
        attack_power(self)
    }
}

/// 一次交戰的雙方
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BattleContext {
    pub attacker: UnitID,
    pub defender: UnitID,
}

/// 交戰結果，交給表現層播放
#[derive(Debug, Clone, PartialEq)]
pub struct BattleReport {
    pub context: BattleContext,
    pub attacker_pos: Pos,
    pub defender_pos: Pos,
    pub damage_dealt: i32,
    /// 有反擊時的反擊傷害
    pub counter_damage: Option<i32>,
    pub attacker_life: i32,
    pub defender_life: i32,
    /// 生命值歸零、待動畫結束後移除的單位
    pub destroyed: Vec<UnitID>,
}

/// 交戰預估（不改動狀態），AI 評分用
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BattlePreview {
    pub damage_dealt: i32,
    pub lethal: bool,
    pub counter_damage: i32,
}

/// 結算一次交戰：攻擊方出手；防守方存活且距離在其射程內時反擊
pub fn resolve_battle(
    grid: &Grid,
    units: &mut UnitRegistry,
    context: BattleContext,
) -> Result<BattleReport> {
    let attacker_pos = units.position(context.attacker)?;
    let defender_pos = units.position(context.defender)?;
    let mut attacker = units.get(context.attacker)?.clone();
    let mut defender = units.get(context.defender)?.clone();

    let outcome = exchange(grid, &mut attacker, attacker_pos, &mut defender, defender_pos)?;

    let mut destroyed = Vec::new();
    for unit in [&attacker, &defender] {
        if !unit.is_alive() {
            destroyed.push(unit.id);
        }
    }
    let report = BattleReport {
        context,
        attacker_pos,
        defender_pos,
        damage_dealt: outcome.damage_dealt,
        counter_damage: outcome.counter_damage,
        attacker_life: attacker.life,
        defender_life: defender.life,
        destroyed,
    };
    *units.get_mut(context.attacker)? = attacker;
    *units.get_mut(context.defender)? = defender;

    tracing::info!(
        attacker = context.attacker,
        defender = context.defender,
        damage = report.damage_dealt,
        counter = ?report.counter_damage,
        destroyed = ?report.destroyed,
        "battle resolved"
    );
    Ok(report)
}

/// 預估交戰結果，不改動登錄表
pub fn preview_battle(
    grid: &Grid,
    units: &UnitRegistry,
    context: BattleContext,
) -> Result<BattlePreview> {
    let attacker_pos = units.position(context.attacker)?;
    let defender_pos = units.position(context.defender)?;
    let mut attacker = units.get(context.attacker)?.clone();
    let mut defender = units.get(context.defender)?.clone();

    let outcome = exchange(grid, &mut attacker, attacker_pos, &mut defender, defender_pos)?;
    Ok(BattlePreview {
        damage_dealt: outcome.damage_dealt,
        lethal: !defender.is_alive(),
        counter_damage: outcome.counter_damage.unwrap_or(0),
    })
}

use inner::*;
mod inner {
    use super::*;

    pub struct ExchangeOutcome {
        pub damage_dealt: i32,
        pub counter_damage: Option<i32>,
    }

    pub fn exchange(
        grid: &Grid,
        attacker: &mut Unit,
        attacker_pos: Pos,
        defender: &mut Unit,
        defender_pos: Pos,
    ) -> Result<ExchangeOutcome> {
        let attacker_cell = grid.cell_at(attacker_pos)?;
        let defender_cell = grid.cell_at(defender_pos)?;

        let damage_dealt = apply_damage(defender, attacker, attacker_cell);

        let distance = attacker_pos.distance(defender_pos);
        let counter_damage = if defender.is_alive() && defender.in_attack_range(distance) {
            Some(apply_damage(attacker, defender, defender_cell))
        } else {
            None
        };
        Ok(ExchangeOutcome {
            damage_dealt,
            counter_damage,
        })
    }

    /// 四捨六入五成雙
    pub fn round(value: f64) -> i32 {
        value.round_ties_even() as i32
    }
}
