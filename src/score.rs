use anyhow::{ensure, Result};
use std::fmt;

/// The nine scorecard sections, in top-to-bottom sheet order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Foam,
    Color,
    Clarity,
    Aroma,
    Flavor,
    Bitterness,
    Body,
    Carbonation,
    Overall,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::Foam,
        Category::Color,
        Category::Clarity,
        Category::Aroma,
        Category::Flavor,
        Category::Bitterness,
        Category::Body,
        Category::Carbonation,
        Category::Overall,
    ];

    /// Ordered score table for this category: row index -> score value.
    /// Table length doubles as the category's checkbox row count.
    pub fn score_table(self) -> &'static [i32] {
        match self {
            Category::Foam => &[3, 2, 1],
            Category::Color => &[3, 2, 1, 0],
            Category::Clarity => &[3, 2, 1],
            Category::Aroma => &[4, 3, 2, 1, 0],
            Category::Flavor => &[4, 3, 2, 1, 0],
            Category::Bitterness => &[5, 4, 3, 2, 1],
            Category::Body => &[3, 2, 1],
            Category::Carbonation => &[3, 2, 1],
            Category::Overall => &[8, 6, 4, 2, 0],
        }
    }

    /// Number of selectable checkbox rows in this category's block.
    pub fn rows(self) -> usize {
        self.score_table().len()
    }

    /// Vertical offset of this category's block from the grid origin,
    /// in cell rows. These encode the printed sheet layout.
    pub fn block_offset(self) -> i64 {
        match self {
            Category::Foam => 0,
            Category::Color => 3,
            Category::Clarity => 7,
            Category::Aroma => 11,
            Category::Flavor => 17,
            Category::Bitterness => 22,
            Category::Body => 28,
            Category::Carbonation => 31,
            Category::Overall => 35,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::Foam => "foam",
            Category::Color => "color",
            Category::Clarity => "clarity",
            Category::Aroma => "aroma",
            Category::Flavor => "flavor",
            Category::Bitterness => "bitterness",
            Category::Body => "body",
            Category::Carbonation => "carbonation",
            Category::Overall => "overall",
        }
    }

    fn index(self) -> usize {
        Category::ALL.iter().position(|&c| c == self).unwrap_or(0)
    }
}

/// Resolve a checkbox row index to its score value, rejecting indices
/// outside the table. The mark detector only produces in-range rows, so a
/// failure here means the grid geometry and the tables disagree.
pub fn score_for(category: Category, row: usize) -> Result<i32> {
    let table = category.score_table();
    ensure!(
        row < table.len(),
        "{} row index {} out of range (table has {} entries)",
        category.label(),
        row,
        table.len()
    );
    Ok(table[row])
}

/// One scored column of the sheet: the resolved value per category for a
/// single beer entry.
#[derive(Debug, Clone)]
pub struct ItemScore {
    pub beer_number: usize,
    values: [i32; 9],
}

impl ItemScore {
    pub fn new(beer_number: usize) -> Self {
        Self {
            beer_number,
            values: [0; 9],
        }
    }

    /// Look up the score for the selected row and record it.
    pub fn set_from_row(&mut self, category: Category, row: usize) -> Result<()> {
        self.values[category.index()] = score_for(category, row)?;
        Ok(())
    }

    pub fn value(&self, category: Category) -> i32 {
        self.values[category.index()]
    }

    pub fn total(&self) -> i32 {
        self.values.iter().sum()
    }
}

impl fmt::Display for ItemScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Beer number {}, Total: {} (foam: {}, color: {}, clarity: {}, aroma: {}, \
             flavor: {}, bitterness: {}, body: {}, carbonation {}, overall {})",
            self.beer_number,
            self.total(),
            self.value(Category::Foam),
            self.value(Category::Color),
            self.value(Category::Clarity),
            self.value(Category::Aroma),
            self.value(Category::Flavor),
            self.value(Category::Bitterness),
            self.value(Category::Body),
            self.value(Category::Carbonation),
            self.value(Category::Overall),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_match_block_row_counts() {
        let rows: Vec<usize> = Category::ALL.iter().map(|c| c.rows()).collect();
        assert_eq!(rows, vec![3, 4, 3, 5, 5, 5, 3, 3, 5]);
    }

    #[test]
    fn test_score_lookup_round_trip() {
        for i in 0..Category::Foam.rows() {
            assert_eq!(
                score_for(Category::Foam, i).unwrap(),
                Category::Foam.score_table()[i]
            );
        }
    }

    #[test]
    fn test_score_lookup_out_of_range() {
        assert!(score_for(Category::Foam, 3).is_err());
        assert!(score_for(Category::Overall, 5).is_err());
    }

    #[test]
    fn test_known_rows_sum_to_known_total() {
        let rows = [0, 1, 0, 2, 2, 2, 1, 0, 1];
        let mut item = ItemScore::new(1);
        for (category, row) in Category::ALL.iter().zip(rows) {
            item.set_from_row(*category, row).unwrap();
        }
        // 3 + 2 + 3 + 2 + 2 + 3 + 2 + 3 + 6
        assert_eq!(item.total(), 26);
    }

    #[test]
    fn test_report_line_format() {
        let mut item = ItemScore::new(4);
        item.set_from_row(Category::Foam, 0).unwrap();
        assert_eq!(
            item.to_string(),
            "Beer number 4, Total: 3 (foam: 3, color: 0, clarity: 0, aroma: 0, \
             flavor: 0, bitterness: 0, body: 0, carbonation 0, overall 0)"
        );
    }
}
