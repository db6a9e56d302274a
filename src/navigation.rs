use crate::grid::ROW_WIDTH;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

/// Result of resolving a directional key against the grid
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavTarget {
    Focus(usize),
    /// Nothing below: ask the grid to grow instead of moving
    RequestGrowth,
    Stay,
}

/// Resolve a move from `current` in a row-major grid of `len` cells.
///
/// Horizontal moves wrap: past the end of a row focus goes to the next row,
/// except on the last row where it wraps to that row's first column (and the
/// mirror image for Left on the first row). A partially filled last row wraps
/// within its existing cells.
pub fn navigate(current: usize, direction: Direction, len: usize, row_width: usize) -> NavTarget {
    if len == 0 || row_width == 0 || current >= len {
        return NavTarget::Stay;
    }

    let row_start = (current / row_width) * row_width;
    let row_end = (row_start + row_width - 1).min(len - 1);
    let is_first_row = row_start == 0;
    let is_last_row = row_start + row_width >= len;

    let target = match direction {
        Direction::Right => {
            if current == row_end && !is_last_row {
                row_start + row_width
            } else if current < row_end {
                current + 1
            } else {
                row_start
            }
        }
        Direction::Left => {
            if current == row_start && !is_first_row {
                row_start - 1
            } else if current > row_start {
                current - 1
            } else {
                row_end
            }
        }
        Direction::Down => {
            let below = current + row_width;
            if below < len {
                below
            } else {
                return NavTarget::RequestGrowth;
            }
        }
        Direction::Up => match current.checked_sub(row_width) {
            Some(above) => above,
            None => return NavTarget::Stay,
        },
    };

    if target == current {
        NavTarget::Stay
    } else {
        NavTarget::Focus(target)
    }
}

/// [`navigate`] with the standard five-column layout
pub fn navigate_grid(current: usize, direction: Direction, len: usize) -> NavTarget {
    navigate(current, direction, len, ROW_WIDTH)
}
