//! unit.rs：
//! - 定義單位（Unit）、單位模板（UnitTemplate）與單位登錄表（UnitRegistry）。
//! - 登錄表持有所有單位，維護位置 ↔ 單位的雙向索引，保證一格最多一個單位。
//! - 不負責戰鬥判定與回合流程。
use crate::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use strum_macros::{Display, EnumIter};

/// 三種兵種，彼此循環相剋
#[derive(
    Debug,
    Deserialize,
    Serialize,
    Clone,
    Copy,
    Default,
    Display,
    EnumIter,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
)]
pub enum UnitType {
    #[default]
    Sword,
    Lance,
    Axe,
}

impl UnitType {
    /// 此兵種剋制的兵種：劍剋斧、斧剋槍、槍剋劍
    pub fn beats(self) -> UnitType {
        match self {
            UnitType::Sword => UnitType::Axe,
            UnitType::Lance => UnitType::Sword,
            UnitType::Axe => UnitType::Lance,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct UnitTemplate {
    pub name: String,
    pub unit_type: UnitType,
    pub life_max: i32,
    pub attack_power_base: i32,
    pub move_amount: MovementCost,
    pub attack_range_min: usize,
    pub attack_range_max: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Unit {
    pub id: UnitID,
    pub template: String,
    pub team: TeamID,
    pub unit_type: UnitType,
    pub life: i32,
    pub life_max: i32,
    pub attack_power_base: i32,
    pub move_amount: MovementCost,
    pub attack_range_min: usize,
    pub attack_range_max: usize,
    pub has_acted: bool,
    /// 本回合已移動（移動後只能攻擊或結束行動）
    pub has_moved: bool,
}

impl Unit {
    pub fn from_template(id: UnitID, template: &UnitTemplate, team: TeamID) -> Self {
        Self {
            id,
            template: template.name.clone(),
            team,
            unit_type: template.unit_type,
            life: template.life_max,
            life_max: template.life_max,
            attack_power_base: template.attack_power_base,
            move_amount: template.move_amount,
            attack_range_min: template.attack_range_min,
            attack_range_max: template.attack_range_max,
            has_acted: false,
            has_moved: false,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.life > 0
    }

    /// 生命值分成 10 階：ceil(life / life_max * 10)
    pub fn life_tier(&self) -> i32 {
        if self.life_max <= 0 || self.life <= 0 {
            return 0;
        }
        (self.life * 10 + self.life_max - 1) / self.life_max
    }

    /// 距離是否在自己的射程內
    pub fn in_attack_range(&self, distance: usize) -> bool {
        self.attack_range_min <= distance && distance <= self.attack_range_max
    }
}

/// 位置 ↔ 單位 雙向索引
#[derive(Debug, Default)]
pub struct UnitMap {
    pos_to_unit: HashMap<Pos, UnitID>,
    unit_to_pos: HashMap<UnitID, Pos>,
}

impl UnitMap {
    pub fn insert(&mut self, unit_id: UnitID, pos: Pos) -> Result<()> {
        if let Some(occupant) = self.pos_to_unit.get(&pos).copied() {
            return Err(BoardError::PosOccupied { pos, occupant }.into());
        }
        self.pos_to_unit.insert(pos, unit_id);
        self.unit_to_pos.insert(unit_id, pos);
        Ok(())
    }

    pub fn move_unit(&mut self, unit_id: UnitID, from: Pos, to: Pos) -> Result<()> {
        if self.unit_to_pos.get(&unit_id) != Some(&from) {
            return Err(BoardError::UnitNotAtPos { unit_id, pos: from }.into());
        }
        if from == to {
            return Ok(());
        }
        if let Some(occupant) = self.pos_to_unit.get(&to).copied() {
            return Err(BoardError::PosOccupied { pos: to, occupant }.into());
        }
        self.pos_to_unit.remove(&from);
        self.pos_to_unit.insert(to, unit_id);
        self.unit_to_pos.insert(unit_id, to);
        Ok(())
    }

    pub fn remove(&mut self, unit_id: UnitID) -> Option<Pos> {
        let pos = self.unit_to_pos.remove(&unit_id)?;
        self.pos_to_unit.remove(&pos);
        Some(pos)
    }

    pub fn get_unit(&self, pos: Pos) -> Option<UnitID> {
        self.pos_to_unit.get(&pos).copied()
    }

    pub fn get_pos(&self, unit_id: UnitID) -> Option<Pos> {
        self.unit_to_pos.get(&unit_id).copied()
    }

    pub fn clear(&mut self) {
        self.pos_to_unit.clear();
        self.unit_to_pos.clear();
    }
}

/// 單位登錄表
#[derive(Debug)]
pub struct UnitRegistry {
    units: BTreeMap<UnitID, Unit>,
    unit_map: UnitMap,
    next_id: UnitID,
}

impl Default for UnitRegistry {
    fn default() -> Self {
        Self {
            units: BTreeMap::new(),
            unit_map: UnitMap::default(),
            next_id: 1,
        }
    }
}

impl UnitRegistry {
    /// 在指定座標放置單位
    pub fn spawn(
        &mut self,
        grid: &Grid,
        template: &UnitTemplate,
        team: TeamID,
        pos: Pos,
    ) -> Result<UnitID> {
        grid.cell_at(pos)?;
        let unit_id = self.next_id;
        self.unit_map.insert(unit_id, pos)?;
        self.next_id += 1;
        self.units
            .insert(unit_id, Unit::from_template(unit_id, template, team));
        tracing::debug!(unit_id, team, ?pos, template = %template.name, "spawn unit");
        Ok(unit_id)
    }

    pub fn remove(&mut self, unit_id: UnitID) -> Option<Unit> {
        self.unit_map.remove(unit_id);
        self.units.remove(&unit_id)
    }

    /// 清空所有單位（棋盤重新生成時使用）
    pub fn clear(&mut self) {
        self.units.clear();
        self.unit_map.clear();
    }

    pub fn get(&self, unit_id: UnitID) -> Result<&Unit> {
        self.units
            .get(&unit_id)
            .ok_or_else(|| BoardError::UnitNotFound { unit_id }.into())
    }

    pub fn get_mut(&mut self, unit_id: UnitID) -> Result<&mut Unit> {
        self.units
            .get_mut(&unit_id)
            .ok_or_else(|| BoardError::UnitNotFound { unit_id }.into())
    }

    pub fn pos_to_unit(&self, pos: Pos) -> Option<UnitID> {
        self.unit_map.get_unit(pos)
    }

    pub fn unit_to_pos(&self, unit_id: UnitID) -> Option<Pos> {
        self.unit_map.get_pos(unit_id)
    }

    pub fn position(&self, unit_id: UnitID) -> Result<Pos> {
        self.unit_to_pos(unit_id)
            .ok_or_else(|| BoardError::UnitNotFound { unit_id }.into())
    }

    pub fn unit_at(&self, pos: Pos) -> Option<&Unit> {
        self.pos_to_unit(pos).and_then(|id| self.units.get(&id))
    }

    pub fn is_occupied(&self, pos: Pos) -> bool {
        self.unit_map.get_unit(pos).is_some()
    }

    /// 把單位移到新位置（目標格必須是空的）
    pub fn relocate(&mut self, unit_id: UnitID, to: Pos) -> Result<()> {
        let from = self.position(unit_id)?;
        self.unit_map.move_unit(unit_id, from, to)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// 依 ID 順序走訪所有單位
    pub fn iter(&self) -> impl Iterator<Item = &Unit> + '_ {
        self.units.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Unit> + '_ {
        self.units.values_mut()
    }

    pub fn team_units(&self, team: TeamID) -> Vec<UnitID> {
        self.iter().filter(|u| u.team == team).map(|u| u.id).collect()
    }

    /// 其他隊伍的單位（對 team 而言的敵人）
    pub fn enemy_units(&self, team: TeamID) -> Vec<UnitID> {
        self.iter().filter(|u| u.team != team).map(|u| u.id).collect()
    }

    pub fn teams(&self) -> BTreeSet<TeamID> {
        self.iter().map(|u| u.team).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(name: &str) -> UnitTemplate {
        UnitTemplate {
            name: name.to_string(),
            unit_type: UnitType::Lance,
            life_max: 100,
            attack_power_base: 30,
            move_amount: 4,
            attack_range_min: 1,
            attack_range_max: 1,
        }
    }

    fn grid() -> Grid {
        load_from_ascii(
            r#"
            . . .
            . . .
            "#,
            &TerrainTable::default(),
        )
        .unwrap()
        .0
    }

    #[test]
    fn test_type_cycle() {
        use strum::IntoEnumIterator;
        for t in UnitType::iter() {
            assert_ne!(t.beats(), t);
            // 剋制關係繞一圈回到自己
            assert_eq!(t.beats().beats().beats(), t);
        }
    }

    #[test]
    fn test_spawn_and_lookup() {
        let grid = grid();
        let mut units = UnitRegistry::default();
        let a = units
            .spawn(&grid, &template("knight"), PLAYER_TEAM, Pos::new(0, 0))
            .unwrap();
        let b = units
            .spawn(&grid, &template("knight"), ENEMY_TEAM, Pos::new(2, 1))
            .unwrap();
        assert_ne!(a, b);
        assert_eq!(units.len(), 2);
        assert_eq!(units.pos_to_unit(Pos::new(2, 1)), Some(b));
        assert_eq!(units.unit_to_pos(a), Some(Pos::new(0, 0)));
        let unit = units.get(a).unwrap();
        assert_eq!(unit.life, unit.life_max);
        assert!(!unit.has_acted);
        assert_eq!(units.team_units(PLAYER_TEAM), vec![a]);
        assert_eq!(units.enemy_units(PLAYER_TEAM), vec![b]);
        assert_eq!(units.teams(), BTreeSet::from([PLAYER_TEAM, ENEMY_TEAM]));
    }

    #[test]
    fn test_spawn_errors() {
        let grid = grid();
        let mut units = UnitRegistry::default();
        units
            .spawn(&grid, &template("knight"), PLAYER_TEAM, Pos::new(1, 1))
            .unwrap();
        let err = units
            .spawn(&grid, &template("knight"), ENEMY_TEAM, Pos::new(1, 1))
            .unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::Board(BoardError::PosOccupied { .. })
        ));
        let err = units
            .spawn(&grid, &template("knight"), ENEMY_TEAM, Pos::new(5, 5))
            .unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::Board(BoardError::CellNotFound { .. })
        ));
        assert_eq!(units.len(), 1, "失敗的放置不應留下單位");
    }

    #[test]
    fn test_relocate_and_remove() {
        let grid = grid();
        let mut units = UnitRegistry::default();
        let a = units
            .spawn(&grid, &template("knight"), PLAYER_TEAM, Pos::new(0, 0))
            .unwrap();
        let b = units
            .spawn(&grid, &template("knight"), PLAYER_TEAM, Pos::new(1, 0))
            .unwrap();

        assert!(units.relocate(a, Pos::new(1, 0)).is_err(), "目標格已有單位");
        units.relocate(a, Pos::new(2, 1)).unwrap();
        assert_eq!(units.pos_to_unit(Pos::new(0, 0)), None);
        assert_eq!(units.pos_to_unit(Pos::new(2, 1)), Some(a));

        let removed = units.remove(b).unwrap();
        assert_eq!(removed.id, b);
        assert!(!units.is_occupied(Pos::new(1, 0)));
        assert!(units.get(b).is_err());
        assert!(units.remove(b).is_none());
    }

    #[test]
    fn test_life_tier() {
        let mut unit = Unit::from_template(1, &template("knight"), PLAYER_TEAM);
        let test_data = [(100, 10), (91, 10), (90, 9), (41, 5), (40, 4), (1, 1), (0, 0)];
        for (life, tier) in test_data {
            unit.life = life;
            assert_eq!(unit.life_tier(), tier, "life {life}");
        }
    }
}
