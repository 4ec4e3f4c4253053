pub mod scheduler;

pub use scheduler::{ModelState, RetrainScheduler};

use crate::algorithms::{CollaborativeModel, ContentModel, InteractionMatrix, ModelError};
use crate::config::TrainingConfig;
use crate::models::{Interaction, ProductFeature};
use crate::services::repository::{ProductRepository, PurchaseRepository};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// A collaborative and content model trained together from one data pull.
/// Published and replaced as a unit; never mutated after construction.
#[derive(Debug)]
pub struct ModelSnapshot {
    pub collaborative: Option<CollaborativeModel>,
    pub content: Option<ContentModel>,
    pub trained_at: DateTime<Utc>,
    pub version: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TrainOutcome {
    Trained {
        version: u64,
        retailers: usize,
        products: usize,
        rank: usize,
        duration_ms: u64,
    },
    /// Not enough data; any previous snapshot stays published.
    Skipped { reason: String },
    /// Training raised; any previous snapshot stays published.
    Failed { message: String },
    /// Another pass was in flight; this call waited for it instead of training.
    Coalesced,
}

impl TrainOutcome {
    pub fn is_trained(&self) -> bool {
        matches!(self, TrainOutcome::Trained { .. })
    }

    pub fn is_soft_failure(&self) -> bool {
        matches!(self, TrainOutcome::Skipped { .. } | TrainOutcome::Failed { .. })
    }
}

struct FittedModels {
    collaborative: Option<CollaborativeModel>,
    content: Option<ContentModel>,
}

fn fit_models(
    interactions: &[Interaction],
    products: &[ProductFeature],
    config: &TrainingConfig,
) -> Result<FittedModels, ModelError> {
    let active: HashSet<_> = products
        .iter()
        .filter(|p| p.is_active)
        .map(|p| p.product_id)
        .collect();
    let matrix = InteractionMatrix::from_interactions(interactions, &active);

    let collaborative = if matrix.is_empty() {
        debug!("Interaction matrix is empty; no collaborative model this cycle");
        None
    } else {
        CollaborativeModel::fit(matrix, config.max_rank, config.svd_max_iterations)?
    };
    let content = ContentModel::fit(products, config.vocabulary_size)?;

    Ok(FittedModels { collaborative, content })
}

/// Owns the published snapshot and the single-flight training guard.
pub struct TrainingService {
    purchases: Arc<dyn PurchaseRepository>,
    products: Arc<dyn ProductRepository>,
    config: TrainingConfig,
    scheduler: RetrainScheduler,
    snapshot: RwLock<Option<Arc<ModelSnapshot>>>,
    in_flight: Mutex<()>,
    pool: Option<Arc<rayon::ThreadPool>>,
    versions: AtomicU64,
    /// Finished passes, whatever their outcome.
    attempts: AtomicU64,
}

impl TrainingService {
    pub fn new(
        purchases: Arc<dyn PurchaseRepository>,
        products: Arc<dyn ProductRepository>,
        config: TrainingConfig,
    ) -> Self {
        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(config.worker_threads.max(1))
            .thread_name(|i| format!("retailrec-train-{i}"))
            .build()
        {
            Ok(pool) => Some(Arc::new(pool)),
            Err(e) => {
                warn!("Failed to build training pool, using the global rayon pool: {}", e);
                None
            }
        };

        Self {
            purchases,
            products,
            scheduler: RetrainScheduler::from_config(&config),
            config,
            snapshot: RwLock::new(None),
            in_flight: Mutex::new(()),
            pool,
            versions: AtomicU64::new(0),
            attempts: AtomicU64::new(0),
        }
    }

    /// Currently published snapshot. Readers keep the `Arc` for the whole
    /// request, so a concurrent swap never changes models mid-request.
    pub fn snapshot(&self) -> Option<Arc<ModelSnapshot>> {
        self.snapshot.read().clone()
    }

    pub fn last_trained_at(&self) -> Option<DateTime<Utc>> {
        self.snapshot.read().as_ref().map(|s| s.trained_at)
    }

    pub fn state(&self) -> ModelState {
        self.scheduler.state_at(self.last_trained_at(), Utc::now())
    }

    pub fn scheduler(&self) -> &RetrainScheduler {
        &self.scheduler
    }

    /// Runs a training pass unless one is already running, in which case this
    /// waits for it to finish and returns `Coalesced`.
    pub async fn train(&self) -> TrainOutcome {
        let _guard = match self.in_flight.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                debug!("Training already in progress; waiting for it");
                let _wait = self.in_flight.lock().await;
                return TrainOutcome::Coalesced;
            }
        };
        self.run_training().await
    }

    /// Number of training passes that have finished, successful or not.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Retrains when the snapshot is stale. Returns `None` when no pass ran,
    /// including when another pass finished while this caller waited for the
    /// guard; the caller then scores with whatever snapshot exists.
    pub async fn ensure_fresh(&self) -> Option<TrainOutcome> {
        if self.state() == ModelState::Fresh {
            return None;
        }
        let seen = self.attempts();
        let _guard = self.in_flight.lock().await;
        if self.attempts() != seen {
            debug!("A training pass finished while waiting; not retraining");
            return None;
        }
        if self.state() == ModelState::Fresh {
            return None;
        }
        info!("Model snapshot is stale; retraining before scoring");
        Some(self.run_training().await)
    }

    /// Must be called with `in_flight` held.
    async fn run_training(&self) -> TrainOutcome {
        let outcome = self.train_once().await;
        self.attempts.fetch_add(1, Ordering::SeqCst);
        outcome
    }

    async fn train_once(&self) -> TrainOutcome {
        let started = Instant::now();
        let since = Utc::now() - self.config.interaction_window();
        info!("Starting model training with interactions since {}", since);

        let (interactions, products) = futures::join!(
            self.purchases.list_interactions(since),
            self.products.list_active_products()
        );
        let interactions = match interactions {
            Ok(interactions) => interactions,
            Err(e) => {
                error!("Failed to load interactions for training: {}", e);
                return TrainOutcome::Failed { message: e.to_string() };
            }
        };
        let products = match products {
            Ok(products) => products,
            Err(e) => {
                error!("Failed to load products for training: {}", e);
                return TrainOutcome::Failed { message: e.to_string() };
            }
        };

        if interactions.is_empty() || products.is_empty() {
            warn!(
                "Insufficient data for model training: {} interactions, {} products",
                interactions.len(),
                products.len()
            );
            return TrainOutcome::Skipped {
                reason: "insufficient data for model training".to_string(),
            };
        }

        let config = self.config.clone();
        let pool = self.pool.clone();
        let fitted = tokio::task::spawn_blocking(move || {
            let fit = || fit_models(&interactions, &products, &config);
            match pool {
                Some(pool) => pool.install(fit),
                None => fit(),
            }
        })
        .await;

        let models = match fitted {
            Ok(Ok(models)) => models,
            Ok(Err(e)) => {
                error!("Error during model training: {}", e);
                return TrainOutcome::Failed { message: e.to_string() };
            }
            Err(e) => {
                error!("Training task aborted: {}", e);
                return TrainOutcome::Failed {
                    message: format!("training task aborted: {e}"),
                };
            }
        };

        if models.collaborative.is_none() && models.content.is_none() {
            warn!("Neither model could be fitted; keeping the previous snapshot");
            return TrainOutcome::Skipped {
                reason: "no model could be fitted".to_string(),
            };
        }

        let (retailers, rank) = models
            .collaborative
            .as_ref()
            .map(|m| (m.matrix().shape().0, m.rank()))
            .unwrap_or((0, 0));
        let product_count = models.content.as_ref().map(|m| m.product_count()).unwrap_or(0);
        let version = self.versions.fetch_add(1, Ordering::SeqCst) + 1;

        let snapshot = Arc::new(ModelSnapshot {
            collaborative: models.collaborative,
            content: models.content,
            trained_at: Utc::now(),
            version,
        });
        *self.snapshot.write() = Some(snapshot);

        let duration_ms = started.elapsed().as_millis() as u64;
        info!(
            "Model training completed: version {}, {} retailers, {} products, rank {}, {}ms",
            version, retailers, product_count, rank, duration_ms
        );

        TrainOutcome::Trained {
            version,
            retailers,
            products: product_count,
            rank,
            duration_ms,
        }
    }
}
