//! grid.rs：
//! - 棋盤（Grid）與格子（Cell）：每格有移動成本與地形減傷率。
//! - 格子在生成後不再改變；選取、高亮等狀態屬於表現層，不放在這裡。
//! - 只處理棋盤本身，不負責單位、範圍計算與戰鬥。
use crate::*;
use rand::Rng;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

#[derive(
    Debug, Deserialize, Serialize, Clone, Copy, Default, Display, EnumIter, PartialEq, Eq, Hash,
)]
pub enum Terrain {
    #[default]
    Field,
    Forest,
    Rock,
}

/// 地形參數（成本、減傷率、生成權重）
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct TerrainSpec {
    pub terrain: Terrain,
    pub cost: MovementCost,
    pub reduce_rate: f32,
    /// 生成時的抽選權重（百分比）
    pub weight: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TerrainTable {
    specs: Vec<TerrainSpec>,
}

impl Default for TerrainTable {
    fn default() -> Self {
        Self {
            specs: vec![
                TerrainSpec {
                    terrain: Terrain::Field,
                    cost: 1,
                    reduce_rate: 0.0,
                    weight: 70,
                },
                TerrainSpec {
                    terrain: Terrain::Forest,
                    cost: 2,
                    reduce_rate: 0.3,
                    weight: 20,
                },
                TerrainSpec {
                    terrain: Terrain::Rock,
                    cost: IMPASSABLE_COST,
                    reduce_rate: 0.5,
                    weight: 10,
                },
            ],
        }
    }
}

impl TerrainTable {
    /// 以設定覆蓋預設值；未出現的地形沿用預設參數
    pub fn new(overrides: &[TerrainSpec]) -> Self {
        let mut table = Self::default();
        for spec in overrides {
            match table.specs.iter_mut().find(|s| s.terrain == spec.terrain) {
                Some(slot) => *slot = *spec,
                None => table.specs.push(*spec),
            }
        }
        table
    }

    pub fn specs(&self) -> &[TerrainSpec] {
        &self.specs
    }

    pub fn spec(&self, terrain: Terrain) -> TerrainSpec {
        self.specs
            .iter()
            .find(|s| s.terrain == terrain)
            .copied()
            .unwrap_or(TerrainSpec {
                terrain,
                cost: IMPASSABLE_COST,
                reduce_rate: 0.0,
                weight: 0,
            })
    }

    /// 依權重抽一種地形：只骰一次 [0, 權重總和) 的整數，再落到累積權重區間
    pub fn draw<R: Rng>(&self, rng: &mut R) -> Terrain {
        let total: u32 = self.specs.iter().map(|s| s.weight).sum();
        if total == 0 {
            return Terrain::default();
        }
        let mut roll = rng.random_range(0..total);
        for spec in &self.specs {
            if roll < spec.weight {
                return spec.terrain;
            }
            roll -= spec.weight;
        }
        Terrain::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    pub pos: Pos,
    pub terrain: Terrain,
    pub cost: MovementCost,
    pub reduce_rate: f32,
}

impl Cell {
    pub fn new(pos: Pos, spec: TerrainSpec) -> Self {
        Self {
            pos,
            terrain: spec.terrain,
            cost: spec.cost,
            reduce_rate: spec.reduce_rate,
        }
    }

    pub fn is_impassable(&self) -> bool {
        self.cost >= IMPASSABLE_COST
    }
}

#[derive(Debug, Clone, Default)]
pub struct Grid {
    cells: Vec<Vec<Cell>>,
}

impl Grid {
    /// 由每列的地形建立棋盤，`rows[y][x]`
    pub fn from_terrains(rows: &[Vec<Terrain>], table: &TerrainTable) -> Result<Self> {
        let width = rows.first().map_or(0, |row| row.len());
        if let Some((y, _)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(LoadError::ParseError(format!("第 {y} 列寬度與第一列不同")).into());
        }
        let cells = rows
            .iter()
            .enumerate()
            .map(|(y, row)| {
                row.iter()
                    .enumerate()
                    .map(|(x, terrain)| Cell::new(Pos { x, y }, table.spec(*terrain)))
                    .collect()
            })
            .collect();
        Ok(Self { cells })
    }

    /// 隨機生成棋盤（逐列、逐格抽選地形）
    pub fn generate<R: Rng>(
        width: Coord,
        height: Coord,
        table: &TerrainTable,
        rng: &mut R,
    ) -> Self {
        let cells = (0..height)
            .map(|y| {
                (0..width)
                    .map(|x| Cell::new(Pos { x, y }, table.spec(table.draw(rng))))
                    .collect()
            })
            .collect();
        Self { cells }
    }

    pub fn width(&self) -> Coord {
        self.cells.first().map_or(0, |row| row.len())
    }

    pub fn height(&self) -> Coord {
        self.cells.len()
    }

    pub fn contains(&self, pos: Pos) -> bool {
        pos.x < self.width() && pos.y < self.height()
    }

    pub fn get_cell(&self, pos: Pos) -> Option<&Cell> {
        let Pos { x, y } = pos;
        self.cells.get(y)?.get(x)
    }

    pub fn cell_at(&self, pos: Pos) -> Result<&Cell> {
        self.get_cell(pos)
            .ok_or_else(|| BoardError::CellNotFound { pos }.into())
    }

    /// 所有格子，依列優先順序
    pub fn cells(&self) -> impl Iterator<Item = &Cell> + '_ {
        self.cells.iter().flatten()
    }

    pub fn positions(&self) -> impl Iterator<Item = Pos> + '_ {
        self.cells().map(|c| c.pos)
    }

    /// 上下左右的相鄰座標（只回傳棋盤內的）
    ///
    /// 順序固定為 左、右、上、下，路徑回溯的平手判定依賴這個順序
    pub fn neighbors(&self, pos: Pos) -> Vec<Pos> {
        let dirs: [(isize, isize); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];
        dirs.into_iter()
            .filter_map(|(dx, dy)| {
                let x = pos.x.checked_add_signed(dx)?;
                let y = pos.y.checked_add_signed(dy)?;
                Some(Pos { x, y })
            })
            .filter(|p| self.contains(*p))
            .collect()
    }

    /// 與 origin 曼哈頓距離落在 [dist_min, dist_max] 的格子，依列優先順序
    pub fn cells_within_band(&self, origin: Pos, dist_min: usize, dist_max: usize) -> Vec<Pos> {
        self.positions()
            .filter(|p| {
                let d = origin.distance(*p);
                dist_min <= d && d <= dist_max
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashMap;

    fn plain_grid(width: usize, height: usize) -> Grid {
        let rows = vec![vec![Terrain::Field; width]; height];
        Grid::from_terrains(&rows, &TerrainTable::default()).unwrap()
    }

    #[test]
    fn test_cell_at() {
        let grid = plain_grid(3, 2);
        assert_eq!(grid.width(), 3);
        assert_eq!(grid.height(), 2);
        let cell = grid.cell_at(Pos::new(2, 1)).unwrap();
        assert_eq!(cell.pos, Pos::new(2, 1));
        assert_eq!(cell.cost, 1);

        let err = grid.cell_at(Pos::new(3, 0)).unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::Board(BoardError::CellNotFound { .. })
        ));
    }

    #[test]
    fn test_from_terrains_rejects_ragged_rows() {
        let rows = vec![vec![Terrain::Field; 3], vec![Terrain::Field; 2]];
        assert!(Grid::from_terrains(&rows, &TerrainTable::default()).is_err());
    }

    #[test]
    fn test_neighbors_order_and_bounds() {
        let grid = plain_grid(3, 3);
        let test_data = [
            (
                Pos::new(1, 1),
                vec![Pos::new(0, 1), Pos::new(2, 1), Pos::new(1, 0), Pos::new(1, 2)],
            ),
            (Pos::new(0, 0), vec![Pos::new(1, 0), Pos::new(0, 1)]),
            (Pos::new(2, 2), vec![Pos::new(1, 2), Pos::new(2, 1)]),
        ];
        for (pos, expected) in test_data {
            assert_eq!(grid.neighbors(pos), expected, "{pos:?} 的鄰居");
        }
    }

    #[test]
    fn test_cells_within_band() {
        let grid = plain_grid(5, 5);
        let band = grid.cells_within_band(Pos::new(2, 2), 1, 1);
        assert_eq!(
            band,
            vec![Pos::new(2, 1), Pos::new(1, 2), Pos::new(3, 2), Pos::new(2, 3)]
        );

        let band = grid.cells_within_band(Pos::new(0, 0), 2, 3);
        assert!(band.iter().all(|p| (2..=3).contains(&p.distance(Pos::new(0, 0)))));
        assert_eq!(band.len(), 7);

        // 下限為 0 時包含自己
        let band = grid.cells_within_band(Pos::new(4, 4), 0, 0);
        assert_eq!(band, vec![Pos::new(4, 4)]);
    }

    #[test]
    fn test_generate_respects_weights() {
        let mut rng = StdRng::seed_from_u64(7);
        let table = TerrainTable::default();
        let grid = Grid::generate(40, 50, &table, &mut rng);
        assert_eq!(grid.width(), 40);
        assert_eq!(grid.height(), 50);

        let mut counts: HashMap<Terrain, usize> = HashMap::new();
        for cell in grid.cells() {
            *counts.entry(cell.terrain).or_default() += 1;
            assert_eq!(cell.cost, table.spec(cell.terrain).cost);
        }
        let total = 2000.0;
        let ratio = |t| *counts.get(&t).unwrap_or(&0) as f64 / total;
        // 70% / 20% / 10%，容許誤差
        assert!((ratio(Terrain::Field) - 0.7).abs() < 0.05);
        assert!((ratio(Terrain::Forest) - 0.2).abs() < 0.05);
        assert!((ratio(Terrain::Rock) - 0.1).abs() < 0.05);
    }

    #[test]
    fn test_terrain_table_overrides() {
        let table = TerrainTable::new(&[TerrainSpec {
            terrain: Terrain::Forest,
            cost: 3,
            reduce_rate: 0.2,
            weight: 5,
        }]);
        assert_eq!(table.spec(Terrain::Forest).cost, 3);
        assert_eq!(table.spec(Terrain::Field).cost, 1);
        assert_eq!(table.specs().len(), 3);
    }

    #[test]
    fn test_rock_is_impassable() {
        let table = TerrainTable::default();
        let rock = Cell::new(Pos::new(0, 0), table.spec(Terrain::Rock));
        let forest = Cell::new(Pos::new(0, 0), table.spec(Terrain::Forest));
        assert!(rock.is_impassable());
        assert!(!forest.is_impassable());
    }
}
