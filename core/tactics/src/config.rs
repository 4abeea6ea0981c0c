//! config.rs：
//! - 對戰設定（棋盤大小、地形參數、單位模板、隊伍順序、AI 與佈陣）的 TOML 結構。
//! - 反序列化後一律經過 `validate`，載入成功的設定可以直接建立 `Battle`。
use crate::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

const DEFAULT_SKIRMISH: &str = include_str!("../assets/skirmish.toml");

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct GridConfig {
    pub width: Coord,
    pub height: Coord,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct AiAssignment {
    pub team: TeamID,
    #[serde(flatten)]
    pub config: AiConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Deployment {
    pub template: String,
    pub team: TeamID,
    pub x: Coord,
    pub y: Coord,
}

impl Deployment {
    pub fn pos(&self) -> Pos {
        Pos::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct BattleConfig {
    pub grid: GridConfig,
    #[serde(default)]
    pub terrain: Vec<TerrainSpec>,
    pub templates: Vec<UnitTemplate>,
    /// 回合順序
    pub teams: Vec<TeamID>,
    #[serde(default)]
    pub ai: Vec<AiAssignment>,
    #[serde(default)]
    pub deployments: Vec<Deployment>,
}

impl BattleConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: BattleConfig =
            toml::from_str(content).map_err(|e| LoadError::DeserializeError {
                format: "battle.toml".to_string(),
                reason: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| LoadError::ParseError(format!("讀取 {} 失敗: {e}", path.display())))?;
        Self::from_toml_str(&content).context(format!("載入 {}", path.display()))
    }

    /// 內建的 9x9 對戰：雙方各四個單位，敵方由 AI 控制，玩家先攻
    pub fn default_skirmish() -> Result<Self> {
        Self::from_toml_str(DEFAULT_SKIRMISH)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| {
            LoadError::DeserializeError {
                format: "battle.toml".to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    pub fn terrain_table(&self) -> TerrainTable {
        TerrainTable::new(&self.terrain)
    }

    pub fn template(&self, name: &str) -> Result<&UnitTemplate> {
        self.templates
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| LoadError::InvalidConfig(format!("找不到單位模板 {name}")).into())
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| -> Result<()> { Err(LoadError::InvalidConfig(msg).into()) };

        if self.grid.width == 0 || self.grid.height == 0 {
            return invalid(format!(
                "棋盤大小必須大於 0: {}x{}",
                self.grid.width, self.grid.height
            ));
        }

        if self.teams.len() < 2 {
            return invalid("至少需要兩個隊伍".to_string());
        }
        let teams: HashSet<TeamID> = self.teams.iter().copied().collect();
        if teams.len() != self.teams.len() {
            return invalid(format!("隊伍重複: {:?}", self.teams));
        }

        let table = self.terrain_table();
        if table.specs().iter().map(|s| s.weight).sum::<u32>() == 0 {
            return invalid("地形權重總和為 0".to_string());
        }
        for spec in table.specs() {
            if spec.cost <= 0 {
                return invalid(format!("{} 的移動成本必須大於 0", spec.terrain));
            }
            if !(0.0..1.0).contains(&spec.reduce_rate) {
                return invalid(format!(
                    "{} 的減傷率 {} 不在 [0, 1) 內",
                    spec.terrain, spec.reduce_rate
                ));
            }
        }

        let mut names = HashSet::new();
        for t in &self.templates {
            if !names.insert(t.name.as_str()) {
                return invalid(format!("單位模板 {} 重複", t.name));
            }
            if t.life_max <= 0 || t.attack_power_base <= 0 {
                return invalid(format!("單位模板 {} 的生命值與攻擊力必須大於 0", t.name));
            }
            if t.move_amount < 0 {
                return invalid(format!("單位模板 {} 的移動力為負", t.name));
            }
            // 累積成本達 IMPASSABLE_COST 即不可達
            if t.move_amount >= IMPASSABLE_COST {
                return invalid(format!(
                    "單位模板 {} 的移動力 {} 必須小於 {IMPASSABLE_COST}",
                    t.name, t.move_amount
                ));
            }
            if t.attack_range_max > self.grid.width + self.grid.height {
                return invalid(format!(
                    "單位模板 {} 的射程上限 {} 超過棋盤 {}x{}",
                    t.name, t.attack_range_max, self.grid.width, self.grid.height
                ));
            }
            if t.attack_range_min > t.attack_range_max {
                return invalid(format!(
                    "單位模板 {} 的射程 {}..{} 不合法",
                    t.name, t.attack_range_min, t.attack_range_max
                ));
            }
        }

        for assignment in &self.ai {
            if !teams.contains(&assignment.team) {
                return invalid(format!("AI 設定的隊伍 {} 不存在", assignment.team));
            }
            if assignment.config.randomize_attack_target > 100 {
                return invalid(format!(
                    "隊伍 {} 的隨機攻擊機率 {} 超過 100",
                    assignment.team, assignment.config.randomize_attack_target
                ));
            }
        }

        let mut occupied = HashSet::new();
        for d in &self.deployments {
            if !names.contains(d.template.as_str()) {
                return invalid(format!("佈陣使用了不存在的單位模板 {}", d.template));
            }
            if !teams.contains(&d.team) {
                return invalid(format!("佈陣使用了不存在的隊伍 {}", d.team));
            }
            if d.x >= self.grid.width || d.y >= self.grid.height {
                return invalid(format!("佈陣位置 {:?} 超出棋盤", d.pos()));
            }
            if !occupied.insert(d.pos()) {
                return invalid(format!("佈陣位置 {:?} 重複", d.pos()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_skirmish() {
        let config = BattleConfig::default_skirmish().unwrap();
        assert_eq!((config.grid.width, config.grid.height), (9, 9));
        assert_eq!(config.teams, vec![PLAYER_TEAM, ENEMY_TEAM]);
        assert_eq!(config.ai.len(), 1);
        assert_eq!(config.ai[0].team, ENEMY_TEAM);

        let player: Vec<Pos> = config
            .deployments
            .iter()
            .filter(|d| d.team == PLAYER_TEAM)
            .map(|d| d.pos())
            .collect();
        assert_eq!(
            player,
            vec![Pos::new(7, 7), Pos::new(6, 7), Pos::new(7, 6), Pos::new(6, 6)]
        );
        let enemy: Vec<Pos> = config
            .deployments
            .iter()
            .filter(|d| d.team == ENEMY_TEAM)
            .map(|d| d.pos())
            .collect();
        assert_eq!(
            enemy,
            vec![Pos::new(1, 1), Pos::new(2, 1), Pos::new(1, 2), Pos::new(2, 2)]
        );

        let archer = config.template("archer").unwrap();
        assert_eq!((archer.attack_range_min, archer.attack_range_max), (2, 3));
        assert!(config.template("dragon").is_err());

        let table = config.terrain_table();
        assert_eq!(table.spec(Terrain::Rock).cost, IMPASSABLE_COST);
    }

    #[test]
    fn test_toml_round_trip() {
        let config = BattleConfig::default_skirmish().unwrap();
        let text = config.to_toml_string().unwrap();
        assert_eq!(BattleConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_minimal_config_defaults() {
        let config = BattleConfig::from_toml_str(
            r#"
            teams = [0, 1]

            [grid]
            width = 3
            height = 2

            [[templates]]
            name = "knight"
            unit_type = "Axe"
            life_max = 50
            attack_power_base = 20
            move_amount = 3
            attack_range_min = 1
            attack_range_max = 1

            [[ai]]
            team = 1
            detection_distance = 4
            "#,
        )
        .unwrap();
        assert!(config.terrain.is_empty());
        assert!(config.deployments.is_empty());
        assert_eq!(config.terrain_table(), TerrainTable::default());
        assert_eq!(
            config.ai[0].config,
            AiConfig {
                detection_distance: Some(4),
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_validate_rejects() {
        let base = BattleConfig::default_skirmish().unwrap();
        let cases: Vec<(&str, fn(&mut BattleConfig))> = vec![
            ("單一隊伍", |c: &mut BattleConfig| c.teams = vec![0]),
            ("隊伍重複", |c: &mut BattleConfig| c.teams = vec![0, 1, 0]),
            ("權重總和為 0", |c: &mut BattleConfig| {
                c.terrain = [Terrain::Field, Terrain::Forest, Terrain::Rock]
                    .into_iter()
                    .map(|t| TerrainSpec {
                        weight: 0,
                        ..TerrainTable::default().spec(t)
                    })
                    .collect()
            }),
            ("減傷率 1.0", |c: &mut BattleConfig| {
                c.terrain = vec![TerrainSpec {
                    terrain: Terrain::Forest,
                    cost: 2,
                    reduce_rate: 1.0,
                    weight: 20,
                }]
            }),
            ("成本 0", |c: &mut BattleConfig| {
                c.terrain = vec![TerrainSpec {
                    terrain: Terrain::Field,
                    cost: 0,
                    reduce_rate: 0.0,
                    weight: 70,
                }]
            }),
            ("射程顛倒", |c: &mut BattleConfig| {
                c.templates[0].attack_range_min = 3;
                c.templates[0].attack_range_max = 1;
            }),
            ("生命值 0", |c: &mut BattleConfig| c.templates[0].life_max = 0),
            ("移動力過大", |c: &mut BattleConfig| {
                c.templates[0].move_amount = 2_000_000_000
            }),
            ("移動力達不可通行成本", |c: &mut BattleConfig| {
                c.templates[0].move_amount = IMPASSABLE_COST
            }),
            ("射程上限超過棋盤", |c: &mut BattleConfig| {
                c.templates[0].attack_range_max = 1_000_000
            }),
            ("隨機機率超過 100", |c: &mut BattleConfig| {
                c.ai[0].config.randomize_attack_target = 101
            }),
            ("未知模板", |c: &mut BattleConfig| {
                c.deployments[0].template = "dragon".to_string()
            }),
            ("未知隊伍", |c: &mut BattleConfig| c.deployments[0].team = 7),
            ("超出棋盤", |c: &mut BattleConfig| c.deployments[0].x = 9),
            ("位置重複", |c: &mut BattleConfig| {
                let first = c.deployments[0].clone();
                c.deployments[1].x = first.x;
                c.deployments[1].y = first.y;
            }),
        ];
        for (name, mutate) in cases {
            let mut config = base.clone();
            mutate(&mut config);
            let err = config.validate().unwrap_err();
            assert!(
                matches!(err.kind(), ErrorKind::Load(LoadError::InvalidConfig(_))),
                "{name}: {err}"
            );
        }
    }

    #[test]
    fn test_parse_error() {
        let err = BattleConfig::from_toml_str("teams = [").unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::Load(LoadError::DeserializeError { .. })
        ));
        let err = BattleConfig::load("/nonexistent/battle.toml").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Load(LoadError::ParseError(_))));
    }
}
