//! Grid layout: grouping sections into rows and ordering them.
//!
//! Layout is computed once from the configuration and depends only on each
//! section's [`GridPosition`](crate::config::GridPosition). It never looks at
//! data and never changes because resolutions complete in a different order.

use crate::config::SectionConfig;
use std::collections::BTreeMap;

/// Sections sharing a grid row, left to right.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowGroup {
    /// The shared `row_number`
    pub row_number: u32,
    /// Indices into the section list, ordered by `col_start`
    pub sections: Vec<usize>,
}

/// Two sections in the same row whose column spans intersect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overlap {
    /// Row containing both sections
    pub row_number: u32,
    /// Left-most of the pair
    pub first: String,
    /// The other section
    pub second: String,
}

impl std::fmt::Display for Overlap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "sections '{}' and '{}' overlap in row {}",
            self.first, self.second, self.row_number
        )
    }
}

/// Groups sections by row number and orders them.
///
/// Row groups come out in ascending `row_number`; row numbers need not be
/// contiguous. Within a group sections are ordered by `col_start` with a
/// stable sort, so ties keep config order.
///
/// # Example
/// ```rust
/// use reportgen_core::config::{GridPosition, SectionConfig, TableConfig};
/// use reportgen_core::layout::layout;
///
/// let sections = vec![
///     SectionConfig::table("right", GridPosition::new(5, 6, 12), TableConfig::default()),
///     SectionConfig::table("top", GridPosition::new(0, 0, 12), TableConfig::default()),
///     SectionConfig::table("left", GridPosition::new(5, 0, 6), TableConfig::default()),
/// ];
///
/// let rows = layout(&sections);
/// assert_eq!(rows.len(), 2);
/// assert_eq!(rows[0].sections, vec![1]);
/// assert_eq!(rows[1].sections, vec![2, 0]);
/// ```
pub fn layout(sections: &[SectionConfig]) -> Vec<RowGroup> {
    let mut rows: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for (index, section) in sections.iter().enumerate() {
        rows.entry(section.grid.row_number).or_default().push(index);
    }

    rows.into_iter()
        .map(|(row_number, mut members)| {
            members.sort_by_key(|&index| sections[index].grid.col_start);
            RowGroup {
                row_number,
                sections: members,
            }
        })
        .collect()
}

/// Reports every pair of same-row sections whose spans intersect.
///
/// Overlaps are not errors; callers decide whether to warn.
pub fn overlaps(sections: &[SectionConfig]) -> Vec<Overlap> {
    let mut found = Vec::new();
    for row in layout(sections) {
        for (position, &left) in row.sections.iter().enumerate() {
            for &right in &row.sections[position + 1..] {
                let (a, b) = (&sections[left], &sections[right]);
                if a.grid.overlaps(&b.grid) {
                    found.push(Overlap {
                        row_number: row.row_number,
                        first: a.section_id.clone(),
                        second: b.section_id.clone(),
                    });
                }
            }
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GridPosition, TableConfig};

    fn section(id: &str, row: u32, start: u8, end: u8) -> SectionConfig {
        SectionConfig::table(id, GridPosition::new(row, start, end), TableConfig::default())
    }

    fn ids<'a>(sections: &'a [SectionConfig], row: &RowGroup) -> Vec<&'a str> {
        row.sections
            .iter()
            .map(|&i| sections[i].section_id.as_str())
            .collect()
    }

    #[test]
    fn test_rows_sorted_by_number() {
        let sections = vec![
            section("c", 20, 0, 12),
            section("a", 0, 0, 12),
            section("b", 7, 0, 12),
        ];
        let rows = layout(&sections);
        let numbers: Vec<u32> = rows.iter().map(|r| r.row_number).collect();
        assert_eq!(numbers, vec![0, 7, 20]);
    }

    #[test]
    fn test_columns_sorted_within_row() {
        let sections = vec![
            section("right", 1, 8, 12),
            section("left", 1, 0, 4),
            section("middle", 1, 4, 8),
        ];
        let rows = layout(&sections);
        assert_eq!(rows.len(), 1);
        assert_eq!(ids(&sections, &rows[0]), vec!["left", "middle", "right"]);
    }

    #[test]
    fn test_ties_keep_config_order() {
        let sections = vec![
            section("first", 0, 0, 6),
            section("second", 0, 0, 6),
            section("third", 0, 0, 6),
        ];
        let rows = layout(&sections);
        assert_eq!(ids(&sections, &rows[0]), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_group_count_matches_distinct_rows() {
        let sections = vec![
            section("a", 3, 0, 6),
            section("b", 3, 6, 12),
            section("c", 1, 0, 12),
            section("d", 9, 0, 12),
        ];
        assert_eq!(layout(&sections).len(), 3);
        assert!(layout(&[]).is_empty());
    }

    #[test]
    fn test_overlaps_are_reported() {
        let sections = vec![
            section("a", 0, 0, 8),
            section("b", 0, 6, 12),
            section("c", 1, 0, 8),
            section("d", 1, 8, 12),
        ];
        let found = overlaps(&sections);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].first, "a");
        assert_eq!(found[0].second, "b");
        assert!(found[0].to_string().contains("row 0"));
    }
}
