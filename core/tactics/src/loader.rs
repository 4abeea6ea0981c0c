//! 棋盤載入器

use crate::*;
use std::collections::HashMap;

/// 從 ASCII 格式載入棋盤
///
/// ASCII 格式：每行用空格分隔的符號
/// - `.` = 平地
/// - `F` = 森林
/// - `R` = 岩石
/// - 其他字串（`S`、`E`、`P1` 等）= 標記位置（地形為平地）
/// - 相同的標記會全部收集成 Vec
///
/// 返回：(棋盤, 標記映射)
///
/// 例如：
/// ```text
/// S . F
/// . R E
/// . . .
/// ```
pub fn load_from_ascii(
    ascii: &str,
    table: &TerrainTable,
) -> Result<(Grid, HashMap<String, Vec<Pos>>)> {
    let lines: Vec<&str> = ascii
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect();

    if lines.is_empty() {
        return Err(LoadError::ParseError("棋盤為空".to_string()).into());
    }

    let mut rows = Vec::with_capacity(lines.len());
    let mut markers: HashMap<String, Vec<Pos>> = HashMap::new();

    for (y, line) in lines.iter().enumerate() {
        let mut row = Vec::new();
        for (x, symbol) in line.split_whitespace().enumerate() {
            let terrain = match symbol {
                "." => Terrain::Field,
                "F" => Terrain::Forest,
                "R" => Terrain::Rock,
                _ => {
                    markers
                        .entry(symbol.to_string())
                        .or_default()
                        .push(Pos { x, y });
                    Terrain::Field
                }
            };
            row.push(terrain);
        }
        rows.push(row);
    }

    let grid = Grid::from_terrains(&rows, table)?;
    Ok((grid, markers))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_from_ascii() {
        let (grid, markers) = load_from_ascii(
            r#"
            S . F
            . R E
            E . .
            "#,
            &TerrainTable::default(),
        )
        .unwrap();
        assert_eq!(grid.width(), 3);
        assert_eq!(grid.height(), 3);
        assert_eq!(grid.cell_at(Pos::new(2, 0)).unwrap().terrain, Terrain::Forest);
        assert_eq!(grid.cell_at(Pos::new(1, 1)).unwrap().terrain, Terrain::Rock);
        assert_eq!(grid.cell_at(Pos::new(0, 0)).unwrap().terrain, Terrain::Field);
        assert_eq!(markers["S"], vec![Pos::new(0, 0)]);
        assert_eq!(markers["E"], vec![Pos::new(2, 1), Pos::new(0, 2)]);
    }

    #[test]
    fn test_load_from_ascii_errors() {
        let table = TerrainTable::default();
        assert!(load_from_ascii("   \n  ", &table).is_err(), "空棋盤");
        assert!(load_from_ascii(". .\n.", &table).is_err(), "列寬不一致");
    }
}
