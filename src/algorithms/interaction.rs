use crate::models::Interaction;
use crate::utils::validation::validate_interaction;
use nalgebra::{DMatrix, DVector};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::debug;
use uuid::Uuid;

pub const MIN_RATING: f64 = 1.0;
pub const MAX_RATING: f64 = 5.0;

/// `clamp(ln(1 + quantity) + ln(1 + amount) / 10, 1, 5)`. Negative amounts count as zero.
pub fn implicit_rating(quantity: u64, total_amount: f64) -> f64 {
    let amount = if total_amount.is_finite() { total_amount.max(0.0) } else { 0.0 };
    let raw = (quantity as f64).ln_1p() + amount.ln_1p() / 10.0;
    raw.clamp(MIN_RATING, MAX_RATING)
}

/// Sparse retailer x product matrix of implicit ratings.
///
/// Rows and columns only exist for retailers and products that have at least one
/// interaction; both are ordered by id. An absent entry means "no interaction"
/// and is never confused with a stored rating.
#[derive(Debug, Clone, Default)]
pub struct InteractionMatrix {
    retailers: Vec<Uuid>,
    products: Vec<Uuid>,
    retailer_index: HashMap<Uuid, usize>,
    product_index: HashMap<Uuid, usize>,
    rows: Vec<BTreeMap<usize, f64>>,
}

impl InteractionMatrix {
    /// Aggregates purchase rows into ratings. Rows for products outside
    /// `active_products` and rows failing validation are dropped; repeated
    /// (retailer, product) rows are summed on quantity and amount first.
    pub fn from_interactions(
        interactions: &[Interaction],
        active_products: &HashSet<Uuid>,
    ) -> Self {
        let mut totals: BTreeMap<(Uuid, Uuid), (u64, f64)> = BTreeMap::new();
        let mut skipped = 0usize;

        for interaction in interactions {
            if !active_products.contains(&interaction.product_id) {
                skipped += 1;
                continue;
            }
            if let Err(e) = validate_interaction(interaction) {
                debug!("Skipping interaction for retailer {}: {}", interaction.retailer_id, e);
                skipped += 1;
                continue;
            }

            let entry = totals
                .entry((interaction.retailer_id, interaction.product_id))
                .or_insert((0, 0.0));
            entry.0 += u64::from(interaction.quantity);
            entry.1 += interaction.total_amount.max(0.0);
        }

        if skipped > 0 {
            debug!("Dropped {} of {} interactions during aggregation", skipped, interactions.len());
        }

        Self::from_ratings(
            totals
                .into_iter()
                .map(|((retailer, product), (quantity, amount))| {
                    (retailer, product, implicit_rating(quantity, amount))
                }),
        )
    }

    /// Builds the matrix from precomputed ratings. A repeated pair keeps the last rating.
    pub fn from_ratings(ratings: impl IntoIterator<Item = (Uuid, Uuid, f64)>) -> Self {
        let entries: Vec<(Uuid, Uuid, f64)> = ratings.into_iter().collect();

        let retailers: Vec<Uuid> = entries
            .iter()
            .map(|(r, _, _)| *r)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let products: Vec<Uuid> = entries
            .iter()
            .map(|(_, p, _)| *p)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let retailer_index: HashMap<Uuid, usize> =
            retailers.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        let product_index: HashMap<Uuid, usize> =
            products.iter().enumerate().map(|(i, id)| (*id, i)).collect();

        let mut rows = vec![BTreeMap::new(); retailers.len()];
        for (retailer, product, rating) in entries {
            rows[retailer_index[&retailer]].insert(product_index[&product], rating);
        }

        Self {
            retailers,
            products,
            retailer_index,
            product_index,
            rows,
        }
    }

    /// (retailers, products)
    pub fn shape(&self) -> (usize, usize) {
        (self.retailers.len(), self.products.len())
    }

    pub fn is_empty(&self) -> bool {
        self.retailers.is_empty() || self.products.is_empty()
    }

    pub fn nnz(&self) -> usize {
        self.rows.iter().map(BTreeMap::len).sum()
    }

    pub fn product_ids(&self) -> &[Uuid] {
        &self.products
    }

    pub fn retailer_row(&self, retailer_id: Uuid) -> Option<usize> {
        self.retailer_index.get(&retailer_id).copied()
    }

    pub fn product_column(&self, product_id: Uuid) -> Option<usize> {
        self.product_index.get(&product_id).copied()
    }

    pub fn rating(&self, retailer_id: Uuid, product_id: Uuid) -> Option<f64> {
        let row = self.retailer_row(retailer_id)?;
        let column = self.product_column(product_id)?;
        self.rows[row].get(&column).copied()
    }

    /// Stored ratings of one row keyed by column.
    pub fn row_entries(&self, row: usize) -> Option<&BTreeMap<usize, f64>> {
        self.rows.get(row)
    }

    /// Dense row with zeros where no rating exists.
    pub fn dense_row(&self, row: usize) -> Option<DVector<f64>> {
        let entries = self.rows.get(row)?;
        let mut dense = DVector::zeros(self.products.len());
        for (&column, &rating) in entries {
            dense[column] = rating;
        }
        Some(dense)
    }

    pub fn to_dense(&self) -> DMatrix<f64> {
        let (m, n) = self.shape();
        let mut dense = DMatrix::zeros(m, n);
        for (row, entries) in self.rows.iter().enumerate() {
            for (&column, &rating) in entries {
                dense[(row, column)] = rating;
            }
        }
        dense
    }
}
