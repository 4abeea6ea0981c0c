//! 無畫面對戰
//!
//! 表現層事件一律立即回報完成，跑到剩下一隊或達到回合上限，最後輸出 JSON 結果。
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use tactics::{AiConfig, Battle, BattleConfig, BattleEvent, Result, TeamID, UnitID};

#[derive(Parser, Debug)]
#[command(name = "skirmish")]
#[command(about = "Run a headless tactical battle and print the result as JSON")]
struct Args {
    /// 對戰設定檔（TOML），省略時使用內建的 9x9 對戰
    #[arg(long)]
    config: Option<PathBuf>,

    /// 隨機種子
    #[arg(long)]
    seed: Option<u64>,

    /// 回合上限
    #[arg(long, default_value_t = 200)]
    max_turns: u32,

    /// 所有隊伍都交給 AI；否則沒有 AI 的隊伍每回合直接結束
    #[arg(long)]
    all_ai: bool,
}

#[derive(Serialize)]
struct SkirmishSummary {
    seed: u64,
    winner: Option<TeamID>,
    turns: u32,
    survivors: Vec<SurvivorSummary>,
}

#[derive(Serialize)]
struct SurvivorSummary {
    id: UnitID,
    template: String,
    team: TeamID,
    life: i32,
    x: usize,
    y: usize,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tactics=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let seed = args.seed.unwrap_or_else(rand::random);
    let config = match &args.config {
        Some(path) => BattleConfig::load(path)?,
        None => BattleConfig::default_skirmish()?,
    };

    let mut battle = Battle::from_config(&config, seed)?;
    if args.all_ai {
        for team in &config.teams {
            if !config.ai.iter().any(|a| a.team == *team) {
                battle.register_ai(*team, AiConfig::default());
            }
        }
    }

    tracing::info!(seed, teams = ?config.teams, "skirmish started");
    battle.start(config.teams[0])?;
    run(&mut battle, args.max_turns)?;

    let survivors = battle.surviving_teams();
    let winner = if survivors.len() == 1 {
        survivors.first().copied()
    } else {
        None
    };
    let summary = SkirmishSummary {
        seed,
        winner,
        turns: battle.turn_number(),
        survivors: battle
            .units()
            .iter()
            .filter_map(|unit| {
                let pos = battle.units().unit_to_pos(unit.id)?;
                Some(SurvivorSummary {
                    id: unit.id,
                    template: unit.template.clone(),
                    team: unit.team,
                    life: unit.life,
                    x: pos.x,
                    y: pos.y,
                })
            })
            .collect(),
    };
    tracing::info!(?winner, turns = summary.turns, "skirmish finished");

    match serde_json::to_string_pretty(&summary) {
        Ok(json) => println!("{json}"),
        Err(err) => tracing::error!(%err, "failed to serialize summary"),
    }
    Ok(())
}

/// 回報所有事件並推進回合，直到分出勝負或達到回合上限
fn run(battle: &mut Battle, max_turns: u32) -> Result<()> {
    loop {
        let events = battle.drain_events();
        if !events.is_empty() {
            for event in events {
                match event {
                    BattleEvent::UnitMoving { unit, .. } => battle.finish_move(unit)?,
                    BattleEvent::BattleStarted { .. } => battle.finish_battle()?,
                    _ => {}
                }
            }
            continue;
        }

        if battle.surviving_teams().len() <= 1 || battle.turn_number() >= max_turns {
            return Ok(());
        }
        if battle.is_ai_turn() {
            battle.resume_ai()?;
        } else {
            battle.end_turn()?;
        }
    }
}
