//! Text grid maps.
//!
//! One character per cell, one line per row (row index is the grid `y`, which
//! maps to world `z`):
//!
//! - `#` blocked
//! - `.` or space: open floor at elevation 0
//! - `0`-`9` open floor at that elevation
//! - `a`-`z` open floor with the material of that letter

use std::path::Path;

use ai_nav::NavGrid;
use anyhow::{bail, Context, Result};

pub fn load(path: &Path, cell_size: f32) -> Result<NavGrid> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read map from {}", path.display()))?;
    parse(&text, cell_size).with_context(|| format!("Failed to parse map {}", path.display()))
}

pub fn parse(text: &str, cell_size: f32) -> Result<NavGrid> {
    if !(cell_size.is_finite() && cell_size > 0.0) {
        bail!("cell size must be positive, got {cell_size}");
    }
    let rows: Vec<&str> = text
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .collect();
    let width = rows.iter().map(|row| row.chars().count()).max().unwrap_or(0);
    if width == 0 {
        bail!("map is empty");
    }

    let mut grid = NavGrid::new(width as u32, rows.len() as u32, cell_size);
    for (y, row) in rows.iter().enumerate() {
        // Short rows are padded with open floor.
        for (x, ch) in row.chars().enumerate() {
            let (x, y) = (x as i32, y as i32);
            match ch {
                '#' => grid.set_blocked(x, y, true),
                '.' | ' ' => {}
                '0'..='9' => {
                    let level = ch.to_digit(10).unwrap_or(0) as f32;
                    grid.set_elevation(x, y, level);
                }
                'a'..='z' => grid.set_material(x, y, ch.encode_utf8(&mut [0; 4])),
                other => bail!("unexpected map character {other:?} at ({x}, {y})"),
            }
        }
    }
    Ok(grid)
}
