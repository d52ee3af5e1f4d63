use std::{collections::HashMap, fmt};

use chrono::{Datelike, NaiveDate};
use serde_with::SerializeDisplay;

#[derive(Debug, Clone, Copy, PartialEq, Eq, SerializeDisplay)]
pub struct Color(pub u32);

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06x}", self.0)
    }
}

pub const PALETTE: [Color; 12] = [
    Color(0xa6cee3),
    Color(0x1f78b4),
    Color(0xb2df8a),
    Color(0x33a02c),
    Color(0xfb9a99),
    Color(0xe31a1c),
    Color(0xfdbf6f),
    Color(0xff7f00),
    Color(0xcab2d6),
    Color(0x6a3d9a),
    Color(0xffff99),
    Color(0xb15928),
];

/// Hands out palette colors to years in the order the years are first seen,
/// wrapping around once all twelve are taken.
#[derive(Debug, Default)]
pub struct ColorAssigner {
    years: HashMap<i32, Color>,
    cursor: usize,
}

impl ColorAssigner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn color_for(&mut self, when: NaiveDate) -> Color {
        let cursor = &mut self.cursor;
        *self.years.entry(when.year()).or_insert_with(|| {
            let color = PALETTE[*cursor % PALETTE.len()];
            *cursor += 1;
            color
        })
    }
}
