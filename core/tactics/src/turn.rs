//! turn.rs：
//! - 回合狀態機：依固定順序輪流啟動隊伍，啟動時重設「已行動」旗標。
//! - 記錄哪些隊伍由 AI 控制；選取中的單位由 `Selection` 單獨持有。
//! - 不負責 AI 決策本身與戰鬥判定。
use crate::*;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct TurnController {
    order: Vec<TeamID>,
    index: usize,
    ai: BTreeMap<TeamID, AiConfig>,
}

impl TurnController {
    /// 建立回合控制器，隊伍順序至少兩隊且不可重複
    pub fn new(order: Vec<TeamID>) -> Result<Self> {
        if order.len() < 2 {
            return Err(LoadError::InvalidConfig("至少需要兩個隊伍".to_string()).into());
        }
        let mut seen = order.clone();
        seen.sort_unstable();
        seen.dedup();
        if seen.len() != order.len() {
            return Err(LoadError::InvalidConfig(format!("隊伍重複: {order:?}")).into());
        }
        Ok(Self {
            order,
            index: 0,
            ai: BTreeMap::new(),
        })
    }

    pub fn order(&self) -> &[TeamID] {
        &self.order
    }

    pub fn active_team(&self) -> TeamID {
        self.order[self.index]
    }

    pub fn register_ai(&mut self, team: TeamID, config: AiConfig) {
        self.ai.insert(team, config);
    }

    pub fn unregister_ai(&mut self, team: TeamID) -> Option<AiConfig> {
        self.ai.remove(&team)
    }

    pub fn ai_for(&self, team: TeamID) -> Option<&AiConfig> {
        self.ai.get(&team)
    }

    pub fn is_ai_team(&self, team: TeamID) -> bool {
        self.ai.contains_key(&team)
    }

    /// 由指定隊伍開始（新戰鬥）
    pub fn start(&mut self, team: TeamID, units: &mut UnitRegistry) -> Result<()> {
        let Some(index) = self.order.iter().position(|t| *t == team) else {
            return Err(LoadError::InvalidConfig(format!("隊伍 {team} 不在回合順序中")).into());
        };
        self.index = index;
        self.activate(units);
        Ok(())
    }

    /// 結束目前隊伍的回合，輪到下一隊；回傳新的行動隊伍
    pub fn end_turn(&mut self, units: &mut UnitRegistry) -> TeamID {
        self.index = (self.index + 1) % self.order.len();
        self.activate(units);
        self.active_team()
    }

    /// 行動隊伍的單位重設為未行動，其他隊伍一律視為已行動
    fn activate(&self, units: &mut UnitRegistry) {
        let team = self.active_team();
        for unit in units.iter_mut() {
            unit.has_acted = unit.team != team;
            unit.has_moved = false;
        }
        tracing::info!(team, ai = self.is_ai_team(team), "turn started");
    }
}

/// 目前選取的單位
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Selection {
    selected: Option<UnitID>,
}

impl Selection {
    pub fn selected(&self) -> Option<UnitID> {
        self.selected
    }

    pub fn select(&mut self, unit_id: UnitID) {
        self.selected = Some(unit_id);
    }

    pub fn deselect(&mut self) -> Option<UnitID> {
        self.selected.take()
    }
}
