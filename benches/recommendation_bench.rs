use criterion::{black_box, criterion_group, criterion_main, Criterion};
use retailrec::algorithms::{CollaborativeModel, ContentModel, InteractionMatrix};
use retailrec::services::recommendation::RecommendationService;
use retailrec::services::repository::{InMemoryStore, Repositories};
use retailrec::utils::dataset::Dataset;
use retailrec::*;
use std::collections::HashSet;
use std::sync::Arc;

fn benchmark_model_fitting(c: &mut Criterion) {
    let dataset = Dataset::synthetic(200, 500, 42);
    let active: HashSet<_> = dataset.products.iter().map(|p| p.product_id).collect();

    c.bench_function("interaction_matrix_build", |b| {
        b.iter(|| black_box(InteractionMatrix::from_interactions(&dataset.interactions, &active)));
    });

    c.bench_function("collaborative_fit", |b| {
        b.iter(|| {
            let matrix = InteractionMatrix::from_interactions(&dataset.interactions, &active);
            black_box(CollaborativeModel::fit(matrix, 50, 1000).unwrap());
        });
    });

    c.bench_function("content_fit", |b| {
        b.iter(|| black_box(ContentModel::fit(&dataset.products, 1000).unwrap()));
    });
}

fn benchmark_generate(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let dataset = Dataset::synthetic(200, 500, 42);
    let retailers: Vec<_> = dataset.retailers.iter().map(|r| r.retailer_id).collect();

    let store = Arc::new(InMemoryStore::new());
    dataset.load_into(&store);
    let service =
        RecommendationService::new(Repositories::in_memory(store), Arc::new(Config::default()));
    rt.block_on(service.train());

    c.bench_function("generate_hybrid", |b| {
        let mut next = 0;
        b.to_async(&rt).iter(|| {
            let retailer = retailers[next % retailers.len()];
            next += 1;
            let service = &service;
            async move { black_box(service.generate(retailer, 10).await) }
        });
    });
}

criterion_group!(benches, benchmark_model_fitting, benchmark_generate);
criterion_main!(benches);
