//! 完整對戰：所有事件立即回報，AI 對 AI 跑到分出勝負或回合上限

use std::collections::BTreeSet;
use tactics::*;

fn acknowledge_all(battle: &mut Battle, log: &mut Vec<BattleEvent>) -> bool {
    let events = battle.drain_events();
    if events.is_empty() {
        return false;
    }
    for event in events {
        match &event {
            BattleEvent::UnitMoving { unit, route } => {
                assert!(route.len() >= 2, "移動路徑至少包含起點與終點");
                battle.finish_move(*unit).unwrap();
            }
            BattleEvent::BattleStarted { .. } => battle.finish_battle().unwrap(),
            _ => {}
        }
        log.push(event);
    }
    true
}

fn run(seed: u64, max_turns: u32) -> (Battle, Vec<BattleEvent>) {
    let config = BattleConfig::default_skirmish().unwrap();
    let mut battle = Battle::from_config(&config, seed).unwrap();
    battle.register_ai(PLAYER_TEAM, AiConfig::default());
    battle.start(PLAYER_TEAM).unwrap();

    let mut log = Vec::new();
    let mut guard = 0;
    loop {
        guard += 1;
        assert!(guard < 100_000, "對戰沒有前進");
        if acknowledge_all(&mut battle, &mut log) {
            continue;
        }
        if battle.surviving_teams().len() <= 1 || battle.turn_number() >= max_turns {
            break;
        }
        assert!(battle.is_ai_turn());
        battle.resume_ai().unwrap();
    }
    (battle, log)
}

#[test]
fn ai_versus_ai_terminates() {
    for seed in [1, 2, 3, 17, 99] {
        let (battle, log) = run(seed, 120);
        let registry = battle.units();
        for unit in registry.iter() {
            assert!(unit.is_alive(), "seed {seed}: 存活單位生命值需大於 0");
            assert!(unit.life <= unit.life_max);
        }
        // 一格最多一個單位
        let positions: BTreeSet<Pos> = registry
            .iter()
            .map(|u| registry.unit_to_pos(u.id).unwrap())
            .collect();
        assert_eq!(positions.len(), registry.len(), "seed {seed}");

        let destroyed = log
            .iter()
            .filter(|e| matches!(e, BattleEvent::UnitDestroyed { .. }))
            .count();
        assert_eq!(registry.len() + destroyed, 8, "seed {seed}");
        assert!(battle.pending().is_none());
    }
}

#[test]
fn same_seed_same_battle() {
    let (_, first) = run(5, 40);
    let (_, second) = run(5, 40);
    assert_eq!(first, second);
}

#[test]
fn turns_alternate_between_teams() {
    let (_, log) = run(11, 30);
    let started: Vec<TeamID> = log
        .iter()
        .filter_map(|e| match e {
            BattleEvent::TurnStarted { team, input_blocked } => {
                assert!(*input_blocked, "雙方都是 AI");
                Some(*team)
            }
            _ => None,
        })
        .collect();
    assert!(!started.is_empty());
    for (i, team) in started.iter().enumerate() {
        let expected = if i % 2 == 0 { PLAYER_TEAM } else { ENEMY_TEAM };
        assert_eq!(*team, expected, "第 {i} 個回合");
    }
}
