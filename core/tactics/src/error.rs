//! 錯誤處理系統
//!
//! 強類型錯誤 + context 鏈；可恢復的操作錯誤（非法移動、非法目標等）
//! 發生時不會改動任何狀態，呼叫端重新查詢合法範圍即可。

use crate::{Pos, TeamID, UnitID};
use thiserror::Error as ThisError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// 頂層錯誤，包含原始錯誤和 context 鏈
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    contexts: Vec<String>,
}

/// 錯誤種類
#[derive(Debug, ThisError)]
pub enum ErrorKind {
    #[error(transparent)]
    Board(#[from] BoardError),
    #[error(transparent)]
    Action(#[from] ActionError),
    #[error(transparent)]
    Load(#[from] LoadError),
}

/// 棋盤與單位查詢錯誤
#[derive(Debug, ThisError)]
pub enum BoardError {
    #[error("位置 {pos:?} 不存在")]
    CellNotFound { pos: Pos },
    #[error("單位 {unit_id} 不存在")]
    UnitNotFound { unit_id: UnitID },
    #[error("位置 {pos:?} 無單位")]
    NoUnitAtPos { pos: Pos },
    #[error("位置 {pos:?} 已被單位 {occupant} 佔據")]
    PosOccupied { pos: Pos, occupant: UnitID },
    #[error("單位 {unit_id} 不在 {pos:?}")]
    UnitNotAtPos { unit_id: UnitID, pos: Pos },
}

/// 操作錯誤（外部輸入或 AI 要求了不合法的行動）
#[derive(Debug, ThisError)]
pub enum ActionError {
    #[error("目標 {pos:?} 不在可達範圍內")]
    UnreachableTarget { pos: Pos },
    #[error("單位 {unit_id} 無法移動到 {pos:?}")]
    InvalidMove { unit_id: UnitID, pos: Pos },
    #[error("單位 {attacker} 無法攻擊單位 {defender}")]
    InvalidTarget { attacker: UnitID, defender: UnitID },
    #[error("單位 {unit_id} 不屬於行動中的隊伍 {active_team}")]
    NotActiveTeam { unit_id: UnitID, active_team: TeamID },
    #[error("單位 {unit_id} 本回合已行動")]
    UnitAlreadyActed { unit_id: UnitID },
    #[error("輸入已鎖定（AI 行動中）")]
    InputBlocked,
    #[error("未選擇單位")]
    NoUnitSelected,
    #[error("尚有未完成的移動或戰鬥")]
    ActionPending,
    #[error("沒有等待中的 {expected}")]
    NoPendingAction { expected: &'static str },
    #[error("完成訊號不符: {detail}")]
    SignalMismatch { detail: String },
}

/// 設定載入錯誤
#[derive(Debug, ThisError)]
pub enum LoadError {
    #[error("解析失敗: {0}")]
    ParseError(String),
    #[error("{format} 反序列化失敗: {reason}")]
    DeserializeError { format: String, reason: String },
    #[error("設定錯誤: {0}")]
    InvalidConfig(String),
}

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// 添加錯誤上下文，自動記錄呼叫位置
    #[track_caller]
    pub fn context<C: Into<String>>(mut self, context: C) -> Self {
        let loc = std::panic::Location::caller();
        let msg = format!("{} [{}:{}]", context.into(), loc.file(), loc.line());
        self.contexts.push(msg);
        self
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)?;
        for ctx in &self.contexts {
            write!(f, "\n  {}", ctx)?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

impl<E: Into<ErrorKind>> From<E> for Error {
    fn from(error: E) -> Self {
        Self {
            kind: error.into(),
            contexts: Vec::new(),
        }
    }
}

/// Result 擴展 trait，用於添加錯誤上下文
pub trait Context<T> {
    fn context<C: Into<String>>(self, context: C) -> Result<T>;
}

impl<T> Context<T> for Result<T> {
    #[track_caller]
    fn context<C: Into<String>>(self, context: C) -> Result<T> {
        match self {
            Ok(value) => Ok(value),
            Err(err) => Err(err.context(context)),
        }
    }
}
