pub mod algorithms;
pub mod config;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use models::*;

use services::recommendation::RecommendationService;
use services::repository::Repositories;
use services::serving::ServingService;
use services::training::TrainingService;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub repositories: Repositories,
    pub recommendation_service: Arc<RecommendationService>,
    pub serving_service: Arc<ServingService>,
}

impl AppState {
    pub fn new(config: Config, repositories: Repositories) -> anyhow::Result<Self> {
        config.validate()?;
        let config = Arc::new(config);

        let recommendation_service = Arc::new(RecommendationService::new(
            repositories.clone(),
            config.clone(),
        ));
        let serving_service = Arc::new(ServingService::new(
            recommendation_service.clone(),
            repositories.recommendations.clone(),
        ));

        Ok(Self {
            config,
            repositories,
            recommendation_service,
            serving_service,
        })
    }

    pub fn training_service(&self) -> &Arc<TrainingService> {
        self.recommendation_service.training()
    }
}

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}
