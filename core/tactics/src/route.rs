//! route.rs：
//! - 從移動範圍（剩餘移動力）回溯出起點到目標的路徑。
//! - 前一格的剩餘值 = 目前格的剩餘值 + 目前格的成本。
//! - 多個前一格都符合時，依 `Grid::neighbors` 的固定順序（左、右、上、下）取第一個。
use crate::*;

/// 起點到目標（含兩端）的路徑
pub fn find_route(grid: &Grid, field: &RangeField, target: Pos) -> Result<Vec<Pos>> {
    Ok(find_route_with_progress(grid, field, target)?
        .into_iter()
        .map(|e| e.pos)
        .collect())
}

/// 起點到目標的路徑，每一格附上「已消耗的移動力」（起點為 0）
pub fn find_route_with_progress(
    grid: &Grid,
    field: &RangeField,
    target: Pos,
) -> Result<Vec<RangeEntry>> {
    let Some(target_value) = field.get(target) else {
        return Err(ActionError::UnreachableTarget { pos: target }.into());
    };
    let budget = field.get(field.start()).unwrap_or(target_value);

    let mut route = vec![RangeEntry {
        pos: target,
        value: target_value,
    }];
    let mut current = route[0];
    // 每步剩餘值嚴格遞增，步數不會超過範圍大小
    while route.len() <= field.len() {
        let cost = grid.cell_at(current.pos)?.cost;
        let previous_value = current.value + cost;
        let previous = grid
            .neighbors(current.pos)
            .into_iter()
            .find(|p| field.get(*p) == Some(previous_value));
        let Some(pos) = previous else {
            break;
        };
        current = RangeEntry {
            pos,
            value: previous_value,
        };
        route.push(current);
    }
    route.reverse();

    for entry in &mut route {
        entry.value = budget - entry.value;
    }
    tracing::debug!(from = ?field.start(), to = ?target, steps = route.len(), "route");
    Ok(route)
}
