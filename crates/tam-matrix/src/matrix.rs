//! The traffic assignment matrix as a sparse 0/1 operator.
//!
//! # Storage
//!
//! Compressed sparse columns: the rows (edges) of OD column `c` are
//!
//! ```text
//! rows[ col_start[c] .. col_start[c+1] ]
//! ```
//!
//! sorted ascending.  Every stored entry has value `1.0`; a path touches
//! O(path length) of the E edges, so dense storage (E × Z² floats) would be
//! almost entirely zeros.  [`to_dense`](TrafficAssignmentMatrix::to_dense)
//! materialises the float32 tensor when a consumer needs it.

use ndarray::{Array2, Array3, ArrayView2};

use tam_core::{EdgeId, OdPair};

use crate::{MatrixError, MatrixResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrafficAssignmentMatrix {
    edge_count:   usize,
    num_clusters: usize,
    col_start:    Vec<u32>,
    rows:         Vec<EdgeId>,
}

impl TrafficAssignmentMatrix {
    /// Build from one edge list per OD column (`Z²` lists, origin-major).
    ///
    /// Lists are sorted and de-duplicated.  Fails if the column count is not
    /// `Z²`, an edge is out of range, or a diagonal column is non-empty.
    pub fn from_columns(
        edge_count:   usize,
        num_clusters: usize,
        columns:      Vec<Vec<EdgeId>>,
    ) -> MatrixResult<Self> {
        if num_clusters == 0 {
            return Err(MatrixError::NoClusters);
        }
        let width = num_clusters * num_clusters;
        if columns.len() != width {
            return Err(MatrixError::ShapeMismatch { what: "OD columns", expected: width, got: columns.len() });
        }

        let mut col_start = Vec::with_capacity(width + 1);
        let mut rows = Vec::new();
        col_start.push(0);
        for (c, mut edges) in columns.into_iter().enumerate() {
            if OdPair::from_column(c, num_clusters).is_diagonal() && !edges.is_empty() {
                return Err(MatrixError::DiagonalNotEmpty(c));
            }
            edges.sort_unstable();
            edges.dedup();
            if let Some(e) = edges.iter().find(|e| e.index() >= edge_count) {
                return Err(MatrixError::EdgeOutOfRange { edge: e.index(), edge_count });
            }
            rows.extend_from_slice(&edges);
            col_start.push(rows.len() as u32);
        }

        Ok(Self { edge_count, num_clusters, col_start, rows })
    }

    /// Rebuild from raw CSC arrays (cache loading).  Validates the layout.
    pub(crate) fn from_raw(
        edge_count:   usize,
        num_clusters: usize,
        col_start:    Vec<u32>,
        rows:         Vec<u32>,
    ) -> MatrixResult<Self> {
        let width = num_clusters * num_clusters;
        if col_start.len() != width + 1 {
            return Err(MatrixError::ShapeMismatch { what: "column pointer", expected: width + 1, got: col_start.len() });
        }
        if col_start.first() != Some(&0)
            || col_start[width] as usize != rows.len()
            || col_start.windows(2).any(|w| w[0] > w[1])
        {
            return Err(MatrixError::StaleCache("malformed column pointer".into()));
        }
        let columns = (0..width)
            .map(|c| {
                rows[col_start[c] as usize..col_start[c + 1] as usize]
                    .iter()
                    .map(|&e| EdgeId(e))
                    .collect()
            })
            .collect();
        Self::from_columns(edge_count, num_clusters, columns)
    }

    pub(crate) fn raw_col_start(&self) -> &[u32] {
        &self.col_start
    }

    pub(crate) fn raw_rows(&self) -> Vec<u32> {
        self.rows.iter().map(|e| e.0).collect()
    }

    // ── Dimensions ────────────────────────────────────────────────────────

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn num_clusters(&self) -> usize {
        self.num_clusters
    }

    /// `Z²`.
    pub fn num_columns(&self) -> usize {
        self.num_clusters * self.num_clusters
    }

    /// Logical shape `(E, Z²)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.edge_count, self.num_columns())
    }

    /// Number of 1-entries.
    pub fn nnz(&self) -> usize {
        self.rows.len()
    }

    // ── Access ────────────────────────────────────────────────────────────

    /// Edges marked in flattened column `column`, ascending.
    #[inline]
    pub fn column(&self, column: usize) -> &[EdgeId] {
        let start = self.col_start[column] as usize;
        let end   = self.col_start[column + 1] as usize;
        &self.rows[start..end]
    }

    /// Edges on the centroid path of `pair`, ascending.
    #[inline]
    pub fn pair_edges(&self, pair: OdPair) -> &[EdgeId] {
        self.column(pair.column(self.num_clusters))
    }

    /// Entry `TAM[edge, pair]`: `1.0` or `0.0`.
    pub fn get(&self, edge: EdgeId, pair: OdPair) -> f32 {
        if self.pair_edges(pair).binary_search(&edge).is_ok() { 1.0 } else { 0.0 }
    }

    /// `(column, edges)` for every OD column in order.
    pub fn columns(&self) -> impl Iterator<Item = (usize, &[EdgeId])> + '_ {
        (0..self.num_columns()).map(move |c| (c, self.column(c)))
    }

    // ── Dense export ──────────────────────────────────────────────────────

    /// Dense float32 tensor of shape `(E, Z²)`.
    pub fn to_dense(&self) -> Array2<f32> {
        let mut dense = Array2::zeros(self.shape());
        for (c, edges) in self.columns() {
            for e in edges {
                dense[[e.index(), c]] = 1.0;
            }
        }
        dense
    }

    /// Dense float32 tensor of shape `(E, Z, Z)`.
    pub fn to_dense_3d(&self) -> Array3<f32> {
        let z = self.num_clusters;
        let mut dense = Array3::zeros((self.edge_count, z, z));
        for (c, edges) in self.columns() {
            for e in edges {
                dense[[e.index(), c / z, c % z]] = 1.0;
            }
        }
        dense
    }

    // ── Linear operator ───────────────────────────────────────────────────

    /// `TAM @ w` where `w` has shape `(Z², H)`; result `(E, H)`.
    pub fn apply(&self, w: ArrayView2<'_, f32>) -> MatrixResult<Array2<f32>> {
        if w.nrows() != self.num_columns() {
            return Err(MatrixError::ShapeMismatch { what: "flow matrix rows", expected: self.num_columns(), got: w.nrows() });
        }
        let mut out = Array2::zeros((self.edge_count, w.ncols()));
        for (c, edges) in self.columns() {
            let src = w.row(c);
            for e in edges {
                out.row_mut(e.index()).scaled_add(1.0, &src);
            }
        }
        Ok(out)
    }

    /// `TAMᵀ @ g` where `g` has shape `(E, H)`; result `(Z², H)`.
    pub fn apply_transpose(&self, g: ArrayView2<'_, f32>) -> MatrixResult<Array2<f32>> {
        if g.nrows() != self.edge_count {
            return Err(MatrixError::ShapeMismatch { what: "edge matrix rows", expected: self.edge_count, got: g.nrows() });
        }
        let mut out = Array2::zeros((self.num_columns(), g.ncols()));
        for (c, edges) in self.columns() {
            let mut dst = out.row_mut(c);
            for e in edges {
                dst.scaled_add(1.0, &g.row(e.index()));
            }
        }
        Ok(out)
    }
}
