//! Dense local blocks with their global indices.
//!
//! Each contact pair assembles into a small dense block and tags every local
//! row and column with its global index. The outer solver scatters the block
//! into its own storage; indices of body rows repeat across pairs that share
//! a body, so scattering always adds.
//!
//! Blocks also carry their slot in the contact set's stacked work storage:
//! a vector of [`Footprint::rows`] entries and a block-diagonal matrix of
//! [`Footprint::rows`] x [`Footprint::cols`], with one slot per pair in
//! layout order. Solvers that preallocate triplet storage copy the blocks
//! there with `stack_into` instead of scattering.

use nalgebra::{DMatrix, DVector, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::gradient::Gradient3;
use crate::ContactError;

/// Global footprint of the contact set's algebraic unknowns and equations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Footprint {
    /// Number of algebraic unknowns (two per contact point).
    pub unknowns: usize,
    /// Rows of all local blocks together.
    pub rows: usize,
    /// Columns of all local blocks together.
    pub cols: usize,
}

impl Footprint {
    /// Footprint of one pair with `points` contact points.
    #[must_use]
    pub fn of_pair(points: usize) -> Self {
        if points == 0 {
            return Self::default();
        }
        let size = 12 + 2 * points;
        Self {
            unknowns: 2 * points,
            rows: size,
            cols: size,
        }
    }
}

impl std::ops::Add for Footprint {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            unknowns: self.unknowns + rhs.unknowns,
            rows: self.rows + rhs.rows,
            cols: self.cols + rhs.cols,
        }
    }
}

impl std::iter::Sum for Footprint {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), |acc, f| acc + f)
    }
}

/// Next free position in the unknowns and in the stacked work storage.
///
/// Layout assignment hands the cursor from pair to pair; each pair records
/// where it starts and advances all three positions by its [`Footprint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LayoutCursor {
    /// Global index of the next algebraic unknown.
    pub unknown: usize,
    /// Next row of the stacked work storage.
    pub row: usize,
    /// Next column of the stacked work storage.
    pub col: usize,
}

impl LayoutCursor {
    /// Cursor at the start of the stacked storage, with unknowns from
    /// `first_unknown`.
    #[must_use]
    pub fn new(first_unknown: usize) -> Self {
        Self {
            unknown: first_unknown,
            row: 0,
            col: 0,
        }
    }

    /// Move past a footprint.
    pub fn advance(&mut self, footprint: Footprint) {
        self.unknown += footprint.unknowns;
        self.row += footprint.rows;
        self.col += footprint.cols;
    }
}

fn check_index(index: usize, len: usize) -> Result<(), ContactError> {
    if index < len {
        Ok(())
    } else {
        Err(ContactError::StateTooShort { index, len })
    }
}

/// Residual segment of one pair.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkVector {
    indices: Vec<usize>,
    values: DVector<f64>,
    offset: usize,
}

impl WorkVector {
    /// Zero segment over the given global rows.
    #[must_use]
    pub fn zeros(indices: Vec<usize>) -> Self {
        let values = DVector::zeros(indices.len());
        Self {
            indices,
            values,
            offset: 0,
        }
    }

    /// Place the segment at `offset` in the stacked storage.
    #[must_use]
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// First row of this segment in the stacked storage.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Number of local rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Check if the segment has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Global row of every local row.
    #[must_use]
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Local values.
    #[must_use]
    pub fn values(&self) -> &DVector<f64> {
        &self.values
    }

    /// Add a 3-vector at local row `row`.
    pub fn add_vector(&mut self, row: usize, value: &Vector3<f64>) {
        let mut segment = self.values.fixed_rows_mut::<3>(row);
        segment += value;
    }

    /// Set a single local entry.
    pub fn set(&mut self, row: usize, value: f64) {
        self.values[row] = value;
    }

    /// Add this segment into a global residual.
    pub fn scatter_add(&self, global: &mut DVector<f64>) -> Result<(), ContactError> {
        for (local, &index) in self.indices.iter().enumerate() {
            check_index(index, global.len())?;
            global[index] += self.values[local];
        }
        Ok(())
    }

    /// Copy this segment into its slot of the stacked storage.
    pub fn stack_into(&self, storage: &mut DVector<f64>) -> Result<(), ContactError> {
        if self.is_empty() {
            return Ok(());
        }
        check_index(self.offset + self.len() - 1, storage.len())?;
        storage.rows_mut(self.offset, self.len()).copy_from(&self.values);
        Ok(())
    }
}

/// Jacobian block of one pair.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkMatrix {
    row_indices: Vec<usize>,
    col_indices: Vec<usize>,
    values: DMatrix<f64>,
    row_offset: usize,
    col_offset: usize,
}

impl WorkMatrix {
    /// Zero block over the given global rows and columns.
    #[must_use]
    pub fn zeros(row_indices: Vec<usize>, col_indices: Vec<usize>) -> Self {
        let values = DMatrix::zeros(row_indices.len(), col_indices.len());
        Self {
            row_indices,
            col_indices,
            values,
            row_offset: 0,
            col_offset: 0,
        }
    }

    /// Place the block at `(row, col)` in the stacked storage.
    #[must_use]
    pub fn with_offsets(mut self, row: usize, col: usize) -> Self {
        self.row_offset = row;
        self.col_offset = col;
        self
    }

    /// First row and column of this block in the stacked storage.
    #[must_use]
    pub fn offsets(&self) -> (usize, usize) {
        (self.row_offset, self.col_offset)
    }

    /// Global row of every local row.
    #[must_use]
    pub fn row_indices(&self) -> &[usize] {
        &self.row_indices
    }

    /// Global column of every local column.
    #[must_use]
    pub fn col_indices(&self) -> &[usize] {
        &self.col_indices
    }

    /// Local values.
    #[must_use]
    pub fn values(&self) -> &DMatrix<f64> {
        &self.values
    }

    /// Local entry.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[(row, col)]
    }

    /// Add `sign·g` into local rows `row..row+3`, body columns `0..12`.
    pub fn add_gradient(&mut self, row: usize, g: &Gradient3, sign: f64) {
        let mut view = self.values.fixed_view_mut::<3, 12>(row, 0);
        view += g * sign;
    }

    /// Add a 3-vector into local column `col`, rows `row..row+3`.
    pub fn add_column(&mut self, row: usize, col: usize, value: &Vector3<f64>) {
        let mut view = self.values.fixed_view_mut::<3, 1>(row, col);
        view += value;
    }

    /// Add a 1x12 row into local row `row`, body columns `0..12`.
    pub fn add_row(&mut self, row: usize, value: &crate::gradient::Gradient1) {
        let mut view = self.values.fixed_view_mut::<1, 12>(row, 0);
        view += value;
    }

    /// Set a single local entry.
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.values[(row, col)] = value;
    }

    /// Add this block into a global Jacobian.
    pub fn scatter_add(&self, global: &mut DMatrix<f64>) -> Result<(), ContactError> {
        for (i, &row) in self.row_indices.iter().enumerate() {
            check_index(row, global.nrows())?;
            for (j, &col) in self.col_indices.iter().enumerate() {
                check_index(col, global.ncols())?;
                global[(row, col)] += self.values[(i, j)];
            }
        }
        Ok(())
    }

    /// Copy this block into its slot of the stacked storage.
    pub fn stack_into(&self, storage: &mut DMatrix<f64>) -> Result<(), ContactError> {
        let (rows, cols) = self.values.shape();
        if rows == 0 || cols == 0 {
            return Ok(());
        }
        check_index(self.row_offset + rows - 1, storage.nrows())?;
        check_index(self.col_offset + cols - 1, storage.ncols())?;
        storage
            .view_mut((self.row_offset, self.col_offset), (rows, cols))
            .copy_from(&self.values);
        Ok(())
    }
}
