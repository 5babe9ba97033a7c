//! Cylindrical column wraparound.
//!
//! A bordered tile at the west or east edge of a global grid needs columns
//! from the opposite edge. [`column_spans`] splits a requested global column
//! range into contiguous reads inside `[0, num_cols)`.

use smallvec::SmallVec;

/// One contiguous run of grid columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpan {
    pub first_col: usize,
    pub num_cols: usize,
}

/// The reads covering one requested column range, west to east.
pub type ColumnSpans = SmallVec<[ColumnSpan; 3]>;

/// Split the inclusive column range `first_col..=last_col` into reads that
/// stay inside a grid of `num_cols` columns.
///
/// Requested columns west of zero or at/after `num_cols` wrap around to the
/// opposite edge. The concatenated spans cover exactly
/// `last_col - first_col + 1` columns, in request order. Ranges wider than the
/// grid repeat it.
///
/// # Panics
///
/// Panics if `num_cols` is zero.
///
/// # Example
///
/// ```
/// use relief_pyramid::{column_spans, ColumnSpan};
///
/// // One border column on each side of the last two columns of a 360-column grid
/// let spans = column_spans(357, 360, 360);
/// assert_eq!(spans.as_slice(), &[
///     ColumnSpan { first_col: 357, num_cols: 3 },
///     ColumnSpan { first_col: 0, num_cols: 1 },
/// ]);
/// ```
pub fn column_spans(first_col: i64, last_col: i64, num_cols: usize) -> ColumnSpans {
    assert!(num_cols > 0, "grid must have at least one column");
    let mut spans = ColumnSpans::new();
    if last_col < first_col {
        return spans;
    }

    let width = num_cols as i64;
    let mut col = first_col;
    while col <= last_col {
        let start = col.rem_euclid(width);
        let run = (width - start).min(last_col - col + 1);
        spans.push(ColumnSpan {
            first_col: start as usize,
            num_cols: run as usize,
        });
        col += run;
    }
    spans
}
