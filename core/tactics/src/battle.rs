//! battle.rs：
//! - 對外的戰鬥介面：持有棋盤、單位、回合與 AI 狀態。
//! - 移動與戰鬥會先進入「等待中」，表現層播放完畢後以 `finish_move` / `finish_battle` 回報，
//!   等待期間所有會改變狀態的呼叫都會被拒絕。
//! - AI 回合在核心內推進：每次回報後繼續執行到下一個行動或回合結束，不使用遞迴。
use crate::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::BTreeSet;

/// 交給表現層的事件
#[derive(Debug, Clone, PartialEq)]
pub enum BattleEvent {
    TurnStarted { team: TeamID, input_blocked: bool },
    TurnEnded { team: TeamID },
    /// 播放移動動畫，完成後呼叫 `finish_move`
    UnitMoving { unit: UnitID, route: Vec<Pos> },
    /// 播放戰鬥畫面，完成後呼叫 `finish_battle`
    BattleStarted { report: BattleReport },
    UnitDestroyed { unit: UnitID, pos: Pos },
}

/// 等待表現層回報的行動
#[derive(Debug, Clone, PartialEq)]
pub enum PendingAction {
    Move { unit: UnitID, dest: Pos },
    Battle { report: BattleReport },
}

#[derive(Debug)]
pub struct Battle {
    grid: Grid,
    terrain: TerrainTable,
    units: UnitRegistry,
    turn: TurnController,
    selection: Selection,
    pending: Option<PendingAction>,
    ai_turn: Option<AiTurn>,
    /// 連續沒有發出任何行動的 AI 回合數
    idle_ai_turns: usize,
    events: Vec<BattleEvent>,
    rng: StdRng,
    turn_number: u32,
}

impl Battle {
    pub fn new(grid: Grid, turn_order: Vec<TeamID>, seed: u64) -> Result<Self> {
        Ok(Self {
            grid,
            terrain: TerrainTable::default(),
            units: UnitRegistry::default(),
            turn: TurnController::new(turn_order)?,
            selection: Selection::default(),
            pending: None,
            ai_turn: None,
            idle_ai_turns: 0,
            events: Vec::new(),
            rng: StdRng::seed_from_u64(seed),
            turn_number: 0,
        })
    }

    /// 隨機生成棋盤
    pub fn generate(
        width: Coord,
        height: Coord,
        terrain: TerrainTable,
        turn_order: Vec<TeamID>,
        seed: u64,
    ) -> Result<Self> {
        let mut battle = Self::new(Grid::default(), turn_order, seed)?;
        battle.terrain = terrain;
        battle.grid = Grid::generate(width, height, &battle.terrain, &mut battle.rng);
        Ok(battle)
    }

    /// 依設定生成棋盤、佈陣並登記 AI；尚未開始，需再呼叫 `start`
    pub fn from_config(config: &BattleConfig, seed: u64) -> Result<Self> {
        config.validate()?;
        let mut battle = Self::generate(
            config.grid.width,
            config.grid.height,
            config.terrain_table(),
            config.teams.clone(),
            seed,
        )?;
        for deployment in &config.deployments {
            let template = config.template(&deployment.template)?;
            battle
                .put_unit(template, deployment.team, deployment.pos())
                .context(format!("佈陣 {}", deployment.template))?;
        }
        for assignment in &config.ai {
            battle.register_ai(assignment.team, assignment.config.clone());
        }
        Ok(battle)
    }

    /// 以新的隨機地形重建棋盤，清除所有單位
    pub fn regenerate(&mut self, width: Coord, height: Coord) -> Result<()> {
        self.ensure_no_pending()?;
        self.grid = Grid::generate(width, height, &self.terrain, &mut self.rng);
        self.units.clear();
        self.selection.deselect();
        self.ai_turn = None;
        self.idle_ai_turns = 0;
        tracing::info!(width, height, "grid regenerated");
        Ok(())
    }

    /// 放置單位；非行動中隊伍的單位視為已行動
    pub fn put_unit(&mut self, template: &UnitTemplate, team: TeamID, pos: Pos) -> Result<UnitID> {
        self.ensure_no_pending()?;
        let unit_id = self.units.spawn(&self.grid, template, team, pos)?;
        let active = self.turn.active_team();
        self.units.get_mut(unit_id)?.has_acted = team != active;
        Ok(unit_id)
    }

    pub fn register_ai(&mut self, team: TeamID, config: AiConfig) {
        self.turn.register_ai(team, config);
    }

    pub fn unregister_ai(&mut self, team: TeamID) -> Option<AiConfig> {
        self.turn.unregister_ai(team)
    }

    /// 由指定隊伍開始戰鬥；若為 AI 隊伍會立刻開始行動
    pub fn start(&mut self, team: TeamID) -> Result<()> {
        self.ensure_no_pending()?;
        self.selection.deselect();
        self.ai_turn = None;
        self.idle_ai_turns = 0;
        self.turn.start(team, &mut self.units)?;
        self.turn_number = 1;
        self.begin_turn();
        self.drive_ai();
        Ok(())
    }

    pub fn select_unit(&mut self, pos: Pos) -> Result<UnitID> {
        self.ensure_input()?;
        let unit_id = self
            .units
            .pos_to_unit(pos)
            .ok_or(BoardError::NoUnitAtPos { pos })?;
        self.ensure_can_act(unit_id)?;
        if self.selection.selected() != Some(unit_id) {
            self.release_selection();
            self.selection.select(unit_id);
        }
        tracing::debug!(unit_id, ?pos, "unit selected");
        Ok(unit_id)
    }

    /// 取消選取；已移動的單位因此結束行動
    pub fn deselect_unit(&mut self) -> Result<Option<UnitID>> {
        self.ensure_input()?;
        Ok(self.release_selection())
    }

    /// 選取中單位可移動的格子（不含已有單位的格子）
    pub fn movable_cells(&self) -> Result<BTreeSet<Pos>> {
        let unit_id = self.selected()?;
        movable_cells_of(&self.grid, &self.units, unit_id)
    }

    /// 選取中單位可攻擊的格子（只含敵方單位所在格）
    pub fn attackable_cells(&self) -> Result<BTreeSet<Pos>> {
        let unit_id = self.selected()?;
        attackable_cells_of(&self.grid, &self.units, unit_id)
    }

    /// 要求移動，回傳播放用的路徑；單位要等 `finish_move` 後才真正到達
    pub fn move_unit(&mut self, unit_id: UnitID, dest: Pos) -> Result<Vec<Pos>> {
        self.ensure_input()?;
        let route = self.issue_move(unit_id, dest).inspect_err(|err| {
            tracing::warn!(unit_id, ?dest, %err, "move rejected");
        })?;
        // 改動另一個單位時，先前移動過的單位就此結束行動
        if self.selection.selected() != Some(unit_id) {
            self.release_selection();
            self.selection.select(unit_id);
        }
        Ok(route)
    }

    /// 要求攻擊，立即結算並回傳結果；被擊倒的單位在 `finish_battle` 後移除
    pub fn attack(&mut self, attacker: UnitID, defender: UnitID) -> Result<BattleReport> {
        self.ensure_input()?;
        self.issue_attack(attacker, defender).inspect_err(|err| {
            tracing::warn!(attacker, defender, %err, "attack rejected");
        })
    }

    /// 結束行動中隊伍的回合；回傳下一個可由玩家操作的隊伍
    pub fn end_turn(&mut self) -> Result<TeamID> {
        self.ensure_input()?;
        self.release_selection();
        self.idle_ai_turns = 0;
        self.advance_turn();
        self.drive_ai();
        Ok(self.turn.active_team())
    }

    /// 移動動畫播放完畢
    pub fn finish_move(&mut self, unit_id: UnitID) -> Result<()> {
        let dest = match self.pending.take() {
            Some(PendingAction::Move { unit, dest }) if unit == unit_id => dest,
            Some(PendingAction::Move { unit, dest }) => {
                self.pending = Some(PendingAction::Move { unit, dest });
                return Err(ActionError::SignalMismatch {
                    detail: format!("等待單位 {unit} 的移動，收到單位 {unit_id}"),
                }
                .into());
            }
            other => {
                self.pending = other;
                return Err(ActionError::NoPendingAction { expected: "移動" }.into());
            }
        };

        self.units.relocate(unit_id, dest)?;
        self.units.get_mut(unit_id)?.has_moved = true;
        tracing::debug!(unit_id, ?dest, "move finished");

        if self.ai_turn.is_some() {
            self.drive_ai();
            return Ok(());
        }
        self.selection.select(unit_id);
        if attackable_cells_of(&self.grid, &self.units, unit_id)?.is_empty() {
            self.release_selection();
        }
        Ok(())
    }

    /// 戰鬥畫面播放完畢，移除被擊倒的單位
    pub fn finish_battle(&mut self) -> Result<()> {
        let report = match self.pending.take() {
            Some(PendingAction::Battle { report }) => report,
            other => {
                self.pending = other;
                return Err(ActionError::NoPendingAction { expected: "戰鬥" }.into());
            }
        };

        for unit_id in &report.destroyed {
            let pos = if *unit_id == report.context.attacker {
                report.attacker_pos
            } else {
                report.defender_pos
            };
            if self.units.remove(*unit_id).is_some() {
                tracing::info!(unit_id, ?pos, "unit destroyed");
                self.events.push(BattleEvent::UnitDestroyed {
                    unit: *unit_id,
                    pos,
                });
            }
        }

        if self.ai_turn.is_some() {
            self.drive_ai();
        }
        Ok(())
    }

    /// 繼續因連續閒置而暫停的 AI 回合
    pub fn resume_ai(&mut self) -> Result<()> {
        self.ensure_no_pending()?;
        self.idle_ai_turns = 0;
        self.drive_ai();
        Ok(())
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn units(&self) -> &UnitRegistry {
        &self.units
    }

    pub fn unit(&self, unit_id: UnitID) -> Result<&Unit> {
        self.units.get(unit_id)
    }

    pub fn unit_position(&self, unit_id: UnitID) -> Result<Pos> {
        self.units.position(unit_id)
    }

    pub fn active_team(&self) -> TeamID {
        self.turn.active_team()
    }

    pub fn turn_order(&self) -> &[TeamID] {
        self.turn.order()
    }

    /// 已開始的回合數（第一個回合為 1）
    pub fn turn_number(&self) -> u32 {
        self.turn_number
    }

    pub fn selected_unit(&self) -> Option<UnitID> {
        self.selection.selected()
    }

    pub fn pending(&self) -> Option<&PendingAction> {
        self.pending.as_ref()
    }

    /// AI 回合中或有等待中的行動時，玩家輸入會被拒絕
    pub fn input_blocked(&self) -> bool {
        self.ai_turn.is_some() || self.pending.is_some()
    }

    pub fn is_ai_turn(&self) -> bool {
        self.ai_turn.is_some()
    }

    /// 行動中隊伍的單位
    pub fn own_units(&self) -> Vec<&Unit> {
        let team = self.turn.active_team();
        self.units.iter().filter(|u| u.team == team).collect()
    }

    /// 其他隊伍的單位
    pub fn enemy_units(&self) -> Vec<&Unit> {
        let team = self.turn.active_team();
        self.units.iter().filter(|u| u.team != team).collect()
    }

    /// 還有單位的隊伍，勝負由呼叫端判斷
    pub fn surviving_teams(&self) -> BTreeSet<TeamID> {
        self.units.teams()
    }

    pub fn drain_events(&mut self) -> Vec<BattleEvent> {
        std::mem::take(&mut self.events)
    }

    fn selected(&self) -> Result<UnitID> {
        self.selection
            .selected()
            .ok_or_else(|| ActionError::NoUnitSelected.into())
    }

    fn ensure_no_pending(&self) -> Result<()> {
        if self.pending.is_some() {
            return Err(ActionError::ActionPending.into());
        }
        Ok(())
    }

    fn ensure_input(&self) -> Result<()> {
        self.ensure_no_pending()?;
        if self.ai_turn.is_some() {
            return Err(ActionError::InputBlocked.into());
        }
        Ok(())
    }

    fn ensure_can_act(&self, unit_id: UnitID) -> Result<()> {
        let unit = self.units.get(unit_id)?;
        let active_team = self.turn.active_team();
        if unit.team != active_team {
            return Err(ActionError::NotActiveTeam {
                unit_id,
                active_team,
            }
            .into());
        }
        if unit.has_acted {
            return Err(ActionError::UnitAlreadyActed { unit_id }.into());
        }
        Ok(())
    }

    fn release_selection(&mut self) -> Option<UnitID> {
        let unit_id = self.selection.deselect()?;
        if let Ok(unit) = self.units.get_mut(unit_id) {
            if unit.has_moved {
                unit.has_acted = true;
            }
        }
        Some(unit_id)
    }

    fn issue_move(&mut self, unit_id: UnitID, dest: Pos) -> Result<Vec<Pos>> {
        self.ensure_no_pending()?;
        self.ensure_can_act(unit_id)?;
        if !movable_cells_of(&self.grid, &self.units, unit_id)?.contains(&dest) {
            return Err(ActionError::InvalidMove { unit_id, pos: dest }.into());
        }
        let from = self.units.position(unit_id)?;
        let field = movement_range(&self.grid, from, self.units.get(unit_id)?.move_amount);
        let route = find_route(&self.grid, &field, dest)?;

        self.pending = Some(PendingAction::Move { unit: unit_id, dest });
        self.events.push(BattleEvent::UnitMoving {
            unit: unit_id,
            route: route.clone(),
        });
        tracing::debug!(unit_id, ?from, ?dest, "move issued");
        Ok(route)
    }

    fn issue_attack(&mut self, attacker: UnitID, defender: UnitID) -> Result<BattleReport> {
        self.ensure_no_pending()?;
        self.ensure_can_act(attacker)?;
        let defender_pos = self.units.position(defender)?;
        if !attackable_cells_of(&self.grid, &self.units, attacker)?.contains(&defender_pos) {
            return Err(ActionError::InvalidTarget { attacker, defender }.into());
        }
        let report = resolve_battle(
            &self.grid,
            &mut self.units,
            BattleContext { attacker, defender },
        )?;
        if let Ok(unit) = self.units.get_mut(attacker) {
            unit.has_acted = true;
        }
        if self.selection.selected() == Some(attacker) {
            self.selection.deselect();
        }

        self.pending = Some(PendingAction::Battle {
            report: report.clone(),
        });
        self.events.push(BattleEvent::BattleStarted {
            report: report.clone(),
        });
        Ok(report)
    }

    fn begin_turn(&mut self) {
        let team = self.turn.active_team();
        let ai = self.turn.ai_for(team).cloned();
        self.events.push(BattleEvent::TurnStarted {
            team,
            input_blocked: ai.is_some(),
        });
        self.ai_turn = ai.map(|config| AiTurn::begin(team, config, &self.units));
    }

    fn advance_turn(&mut self) {
        let team = self.turn.active_team();
        self.selection.deselect();
        self.ai_turn = None;
        self.events.push(BattleEvent::TurnEnded { team });
        self.turn.end_turn(&mut self.units);
        self.turn_number += 1;
        self.begin_turn();
    }

    /// 推進 AI 直到需要等待表現層、輪到玩家，或所有隊伍連續一輪都沒有行動
    fn drive_ai(&mut self) {
        while self.pending.is_none() {
            let Some(ai) = self.ai_turn.as_mut() else {
                return;
            };
            match ai.next_step(&self.grid, &mut self.units, &mut self.rng) {
                AiStep::Move { unit, dest } => {
                    if let Err(err) = self.issue_move(unit, dest) {
                        tracing::warn!(unit, ?dest, %err, "ai move rejected");
                        self.abandon_ai_unit(unit);
                    }
                }
                AiStep::Attack(ctx) => {
                    if let Err(err) = self.issue_attack(ctx.attacker, ctx.defender) {
                        tracing::warn!(attacker = ctx.attacker, %err, "ai attack rejected");
                        self.abandon_ai_unit(ctx.attacker);
                    }
                }
                AiStep::Done => {
                    let idle = ai.issued() == 0;
                    self.idle_ai_turns = if idle { self.idle_ai_turns + 1 } else { 0 };
                    self.advance_turn();
                    if self.idle_ai_turns >= self.turn.order().len() && self.ai_turn.is_some() {
                        tracing::info!(
                            idle_turns = self.idle_ai_turns,
                            "ai idle for a full round, paused"
                        );
                        return;
                    }
                }
            }
        }
    }

    fn abandon_ai_unit(&mut self, unit_id: UnitID) {
        if let Some(ai) = self.ai_turn.as_mut() {
            ai.abandon(&mut self.units, unit_id);
        }
    }
}

/// 單位本回合可移動到的空格；已移動或已行動時為空
pub fn movable_cells_of(grid: &Grid, units: &UnitRegistry, unit_id: UnitID) -> Result<BTreeSet<Pos>> {
    let unit = units.get(unit_id)?;
    if unit.has_acted || unit.has_moved {
        return Ok(BTreeSet::new());
    }
    let from = units.position(unit_id)?;
    Ok(movement_range(grid, from, unit.move_amount)
        .positions()
        .filter(|p| !units.is_occupied(*p))
        .collect())
}

/// 單位目前位置射程內、有其他隊伍單位的格子
pub fn attackable_cells_of(
    grid: &Grid,
    units: &UnitRegistry,
    unit_id: UnitID,
) -> Result<BTreeSet<Pos>> {
    let unit = units.get(unit_id)?;
    if unit.has_acted {
        return Ok(BTreeSet::new());
    }
    let from = units.position(unit_id)?;
    Ok(
        attack_band(grid, from, unit.attack_range_min, unit.attack_range_max)
            .into_iter()
            .filter(|p| units.unit_at(*p).is_some_and(|other| other.team != unit.team))
            .collect(),
    )
}
