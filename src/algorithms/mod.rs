pub mod collaborative;
pub mod content;
pub mod fallback;
pub mod hybrid;
pub mod interaction;
pub mod rules;

pub use collaborative::CollaborativeModel;
pub use content::ContentModel;
pub use fallback::FallbackGenerator;
pub use hybrid::{HybridCombiner, HybridWeights};
pub use interaction::{implicit_rating, InteractionMatrix};
pub use rules::{BusinessRules, RecencyFilter};

use std::fmt;
use uuid::Uuid;

/// A product id paired with a non-negative stage score.
pub type ScoredProduct = (Uuid, f64);

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("singular value decomposition did not converge")]
    DecompositionFailed,
    #[error("model produced non-finite values")]
    NonFinite,
    #[error("shape mismatch: expected {expected} columns, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },
}

/// Why a scoring stage contributed nothing. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyReason {
    NoModel,
    UnknownRetailer,
    NoCandidates,
}

/// Result of one scoring stage for one retailer.
#[derive(Debug, Clone)]
pub enum StageOutcome {
    Scored(Vec<ScoredProduct>),
    Empty(EmptyReason),
    Failed(String),
}

impl StageOutcome {
    pub fn from_scores(scores: Vec<ScoredProduct>) -> Self {
        if scores.is_empty() {
            StageOutcome::Empty(EmptyReason::NoCandidates)
        } else {
            StageOutcome::Scored(scores)
        }
    }

    /// Scores this stage contributes to blending; empty for `Empty` and `Failed`.
    pub fn into_scores(self) -> Vec<ScoredProduct> {
        match self {
            StageOutcome::Scored(scores) => scores,
            StageOutcome::Empty(_) | StageOutcome::Failed(_) => Vec::new(),
        }
    }
}

impl fmt::Display for EmptyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmptyReason::NoModel => f.write_str("no trained model"),
            EmptyReason::UnknownRetailer => f.write_str("retailer absent from model"),
            EmptyReason::NoCandidates => f.write_str("no candidates"),
        }
    }
}
