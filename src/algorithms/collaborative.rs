use super::interaction::InteractionMatrix;
use super::{EmptyReason, ModelError, ScoredProduct, StageOutcome};
use crate::utils::top_k;
use nalgebra::{DMatrix, DVector};
use std::cmp::Ordering;
use tracing::{debug, info};
use uuid::Uuid;

pub const DEFAULT_MAX_RANK: usize = 50;

/// Target rank for an m x n matrix: `min(max_rank, min(m, n) - 1)`.
/// Zero means there is not enough data to factorize.
pub fn target_rank(shape: (usize, usize), max_rank: usize) -> usize {
    let smaller = shape.0.min(shape.1);
    max_rank.min(smaller.saturating_sub(1))
}

/// Rank-k latent factor model of the retailer x product rating matrix.
///
/// Keeps the top-k right singular vectors as a `k x n` component matrix. A
/// retailer row `x` is projected with `components * x` and reconstructed with
/// `components^T * factors`, which is the truncated SVD approximation of that
/// row without centering.
#[derive(Debug, Clone)]
pub struct CollaborativeModel {
    matrix: InteractionMatrix,
    components: DMatrix<f64>,
    singular_values: Vec<f64>,
}

impl CollaborativeModel {
    /// Returns `Ok(None)` when the target rank is zero.
    pub fn fit(
        matrix: InteractionMatrix,
        max_rank: usize,
        max_iterations: usize,
    ) -> Result<Option<Self>, ModelError> {
        let rank = target_rank(matrix.shape(), max_rank);
        if rank == 0 {
            debug!(
                "Skipping collaborative model: matrix shape {:?} leaves no rank",
                matrix.shape()
            );
            return Ok(None);
        }

        let dense = matrix.to_dense();
        let n = dense.ncols();
        let svd = dense
            .try_svd(false, true, f64::EPSILON, max_iterations)
            .ok_or(ModelError::DecompositionFailed)?;
        let v_t = svd.v_t.ok_or(ModelError::DecompositionFailed)?;

        if svd.singular_values.iter().any(|s| !s.is_finite())
            || v_t.iter().any(|v| !v.is_finite())
        {
            return Err(ModelError::NonFinite);
        }

        let mut order: Vec<usize> = (0..svd.singular_values.len()).collect();
        order.sort_by(|&a, &b| {
            svd.singular_values[b]
                .partial_cmp(&svd.singular_values[a])
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.cmp(&b))
        });
        order.truncate(rank);

        let components = DMatrix::from_fn(order.len(), n, |i, j| v_t[(order[i], j)]);
        let singular_values = order.iter().map(|&i| svd.singular_values[i]).collect();

        info!(
            "Collaborative model trained with {} components over {:?} matrix",
            order.len(),
            matrix.shape()
        );

        Ok(Some(Self {
            matrix,
            components,
            singular_values,
        }))
    }

    pub fn rank(&self) -> usize {
        self.components.nrows()
    }

    pub fn singular_values(&self) -> &[f64] {
        &self.singular_values
    }

    pub fn matrix(&self) -> &InteractionMatrix {
        &self.matrix
    }

    /// Predicted affinities for every product column of a retailer's row.
    pub fn reconstruct(&self, retailer_id: Uuid) -> Result<Option<DVector<f64>>, ModelError> {
        let Some(row) = self.matrix.retailer_row(retailer_id) else {
            return Ok(None);
        };
        let Some(dense_row) = self.matrix.dense_row(row) else {
            return Ok(None);
        };
        if dense_row.len() != self.components.ncols() {
            return Err(ModelError::ShapeMismatch {
                expected: self.components.ncols(),
                actual: dense_row.len(),
            });
        }

        let factors = &self.components * dense_row;
        let reconstructed = self.components.transpose() * factors;
        if reconstructed.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::NonFinite);
        }
        Ok(Some(reconstructed))
    }

    /// Top `limit` positive predictions for products the retailer has no rating for.
    pub fn recommend(
        &self,
        retailer_id: Uuid,
        limit: usize,
    ) -> Result<Vec<ScoredProduct>, ModelError> {
        let Some(row) = self.matrix.retailer_row(retailer_id) else {
            return Ok(Vec::new());
        };
        let Some(reconstructed) = self.reconstruct(retailer_id)? else {
            return Ok(Vec::new());
        };
        let rated = self.matrix.row_entries(row);

        let predictions: Vec<ScoredProduct> = self
            .matrix
            .product_ids()
            .iter()
            .enumerate()
            .filter(|(column, _)| !rated.is_some_and(|entries| entries.contains_key(column)))
            .map(|(column, product_id)| (*product_id, reconstructed[column]))
            .filter(|(_, score)| *score > 0.0)
            .collect();

        Ok(top_k(predictions, limit))
    }

    pub fn score(&self, retailer_id: Uuid, limit: usize) -> StageOutcome {
        if self.matrix.retailer_row(retailer_id).is_none() {
            return StageOutcome::Empty(EmptyReason::UnknownRetailer);
        }
        match self.recommend(retailer_id, limit) {
            Ok(scores) => StageOutcome::from_scores(scores),
            Err(e) => StageOutcome::Failed(e.to_string()),
        }
    }
}
