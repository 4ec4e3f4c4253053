use super::{EmptyReason, ModelError, ScoredProduct, StageOutcome};
use crate::models::ProductFeature;
use crate::utils::validation::sanitize_popularity;
use crate::utils::{l2_normalize, top_k};
use ndarray::Array2;
use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::info;
use uuid::Uuid;

pub const DEFAULT_VOCABULARY_SIZE: usize = 1000;

const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
    "but", "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few",
    "for", "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers",
    "herself", "him", "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its",
    "itself", "just", "me", "more", "most", "my", "myself", "no", "nor", "not", "now", "of",
    "off", "on", "once", "only", "or", "other", "our", "ours", "ourselves", "out", "over", "own",
    "same", "she", "should", "so", "some", "such", "than", "that", "the", "their", "theirs",
    "them", "themselves", "then", "there", "these", "they", "this", "those", "through", "to",
    "too", "under", "until", "up", "very", "was", "we", "were", "what", "when", "where", "which",
    "while", "who", "whom", "why", "will", "with", "would", "you", "your", "yours", "yourself",
    "yourselves",
];

/// Lowercased alphanumeric tokens of two or more characters, stop-words removed.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.chars().count() >= 2)
        .map(str::to_lowercase)
        .filter(|token| !STOP_WORDS.contains(&token.as_str()))
        .collect()
}

/// TF-IDF content vectors over active products and their pairwise cosine similarity.
///
/// Products are indexed in ascending id order. The vocabulary keeps the
/// `vocabulary_size` most frequent terms across the corpus (ties broken
/// alphabetically), so identical inputs always yield the same matrix.
#[derive(Debug, Clone)]
pub struct ContentModel {
    product_ids: Vec<Uuid>,
    product_index: HashMap<Uuid, usize>,
    popularity: Vec<f64>,
    vocabulary: Vec<String>,
    similarity: Array2<f64>,
}

impl ContentModel {
    /// Returns `Ok(None)` when there are no active products.
    pub fn fit(
        products: &[ProductFeature],
        vocabulary_size: usize,
    ) -> Result<Option<Self>, ModelError> {
        let mut active: Vec<&ProductFeature> = products.iter().filter(|p| p.is_active).collect();
        active.sort_by_key(|p| p.product_id);
        active.dedup_by_key(|p| p.product_id);
        if active.is_empty() {
            return Ok(None);
        }

        let documents: Vec<Vec<String>> = active
            .par_iter()
            .map(|product| tokenize(&product.content_text()))
            .collect();

        let vocabulary = select_vocabulary(&documents, vocabulary_size);
        let term_index: HashMap<&str, usize> = vocabulary
            .iter()
            .enumerate()
            .map(|(i, term)| (term.as_str(), i))
            .collect();

        let n = documents.len();
        let mut document_frequency = vec![0usize; vocabulary.len()];
        for document in &documents {
            let unique: BTreeSet<usize> = document
                .iter()
                .filter_map(|term| term_index.get(term.as_str()).copied())
                .collect();
            for column in unique {
                document_frequency[column] += 1;
            }
        }
        let idf: Vec<f64> = document_frequency
            .iter()
            .map(|&df| ((1 + n) as f64 / (1 + df) as f64).ln() + 1.0)
            .collect();

        let rows: Vec<Vec<f64>> = documents
            .par_iter()
            .map(|document| {
                let mut row = vec![0.0; vocabulary.len()];
                for term in document {
                    if let Some(&column) = term_index.get(term.as_str()) {
                        row[column] += 1.0;
                    }
                }
                for (value, weight) in row.iter_mut().zip(&idf) {
                    *value *= weight;
                }
                l2_normalize(&mut row);
                row
            })
            .collect();

        let similarity = if vocabulary.is_empty() {
            Array2::zeros((n, n))
        } else {
            let flat: Vec<f64> = rows.into_iter().flatten().collect();
            let weights = Array2::from_shape_vec((n, vocabulary.len()), flat).map_err(|_| {
                ModelError::ShapeMismatch {
                    expected: vocabulary.len(),
                    actual: 0,
                }
            })?;
            weights.dot(&weights.t())
        };

        if similarity.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::NonFinite);
        }

        let product_ids: Vec<Uuid> = active.iter().map(|p| p.product_id).collect();
        let product_index = product_ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        let popularity = active.iter().map(|p| sanitize_popularity(p.popularity_score)).collect();

        info!(
            "Content model trained over {} products with {} vocabulary terms",
            n,
            vocabulary.len()
        );

        Ok(Some(Self {
            product_ids,
            product_index,
            popularity,
            vocabulary,
            similarity,
        }))
    }

    pub fn product_count(&self) -> usize {
        self.product_ids.len()
    }

    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    pub fn similarity(&self, a: Uuid, b: Uuid) -> Option<f64> {
        let i = *self.product_index.get(&a)?;
        let j = *self.product_index.get(&b)?;
        Some(self.similarity[[i, j]])
    }

    /// Sums, over every purchased product, the similarity of each other
    /// product to it. Purchased products are excluded and only positive
    /// totals are returned.
    pub fn recommend(&self, purchased: &HashSet<Uuid>, limit: usize) -> Vec<ScoredProduct> {
        let mut seeds: Vec<usize> = purchased
            .iter()
            .filter_map(|id| self.product_index.get(id).copied())
            .collect();
        seeds.sort_unstable();

        let mut totals = vec![0.0f64; self.product_ids.len()];
        for seed in seeds {
            for (column, similarity) in self.similarity.row(seed).iter().enumerate() {
                totals[column] += similarity;
            }
        }

        let scores: Vec<ScoredProduct> = self
            .product_ids
            .iter()
            .zip(totals)
            .filter(|(id, total)| !purchased.contains(*id) && *total > 0.0)
            .map(|(id, total)| (*id, total))
            .collect();

        top_k(scores, limit)
    }

    /// Active products by popularity; the cold-start stand-in for similarity.
    pub fn popular(&self, limit: usize) -> Vec<ScoredProduct> {
        let scores = self
            .product_ids
            .iter()
            .copied()
            .zip(self.popularity.iter().copied())
            .collect();
        top_k(scores, limit)
    }

    pub fn score(&self, purchased: &HashSet<Uuid>, limit: usize) -> StageOutcome {
        if purchased.is_empty() {
            return StageOutcome::from_scores(self.popular(limit));
        }
        let scores = self.recommend(purchased, limit);
        if scores.is_empty() {
            StageOutcome::Empty(EmptyReason::NoCandidates)
        } else {
            StageOutcome::Scored(scores)
        }
    }
}

fn select_vocabulary(documents: &[Vec<String>], vocabulary_size: usize) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for document in documents {
        for term in document {
            *counts.entry(term.as_str()).or_insert(0) += 1;
        }
    }

    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| match b.1.cmp(&a.1) {
        Ordering::Equal => a.0.cmp(b.0),
        other => other,
    });
    ranked.truncate(vocabulary_size);

    let mut vocabulary: Vec<String> =
        ranked.into_iter().map(|(term, _)| term.to_string()).collect();
    vocabulary.sort();
    vocabulary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    fn catalog() -> Vec<ProductFeature> {
        vec![
            ProductFeature::new(id(1), "Organic Green Tea", "Food & Beverages")
                .with_subcategory("Tea")
                .with_description("Loose leaf green tea from Japan")
                .with_popularity(3.0),
            ProductFeature::new(id(2), "Jasmine Green Tea", "Food & Beverages")
                .with_subcategory("Tea")
                .with_brand("Twinings")
                .with_popularity(4.0),
            ProductFeature::new(id(3), "Wireless Earbuds", "Electronics")
                .with_subcategory("Audio")
                .with_description("Bluetooth earbuds with charging case")
                .with_popularity(4.5),
            ProductFeature::new(id(4), "Bluetooth Speaker", "Electronics")
                .with_subcategory("Audio")
                .with_popularity(2.0),
            ProductFeature::new(id(5), "Retired Kettle", "Home & Garden").inactive(),
        ]
    }

    #[test]
    fn test_tokenize_drops_stop_words_and_short_tokens() {
        assert_eq!(
            tokenize("The Best tea for a Cold day, x 2-in-1!"),
            vec!["best", "tea", "cold", "day"]
        );
    }

    #[test]
    fn test_inactive_products_are_excluded() {
        let model = ContentModel::fit(&catalog(), DEFAULT_VOCABULARY_SIZE).unwrap().unwrap();
        assert_eq!(model.product_count(), 4);
        assert!(model.similarity(id(5), id(1)).is_none());
    }

    #[test]
    fn test_similarity_is_cosine() {
        let model = ContentModel::fit(&catalog(), DEFAULT_VOCABULARY_SIZE).unwrap().unwrap();
        let self_similarity = model.similarity(id(1), id(1)).unwrap();
        assert!((self_similarity - 1.0).abs() < 1e-9);

        let tea = model.similarity(id(1), id(2)).unwrap();
        let cross = model.similarity(id(1), id(3)).unwrap();
        assert!(tea > cross);
        assert!(cross >= 0.0);
    }

    #[test]
    fn test_vocabulary_cap() {
        let model = ContentModel::fit(&catalog(), 3).unwrap().unwrap();
        assert_eq!(model.vocabulary().len(), 3);
        assert!(model.vocabulary().windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_recommend_sums_and_excludes_purchased() {
        let model = ContentModel::fit(&catalog(), DEFAULT_VOCABULARY_SIZE).unwrap().unwrap();
        let purchased: HashSet<Uuid> = [id(1), id(3)].into_iter().collect();
        let recs = model.recommend(&purchased, 10);

        assert!(recs.iter().all(|(p, _)| !purchased.contains(p)));
        let expected_tea =
            model.similarity(id(2), id(1)).unwrap() + model.similarity(id(2), id(3)).unwrap();
        let tea = recs.iter().find(|(p, _)| *p == id(2)).unwrap();
        assert!((tea.1 - expected_tea).abs() < 1e-12);
    }

    #[test]
    fn test_cold_start_uses_popularity() {
        let model = ContentModel::fit(&catalog(), DEFAULT_VOCABULARY_SIZE).unwrap().unwrap();
        match model.score(&HashSet::new(), 2) {
            StageOutcome::Scored(scores) => assert_eq!(scores, vec![(id(3), 4.5), (id(2), 4.0)]),
            other => panic!("expected popularity scores, got {:?}", other),
        }
    }

    #[test]
    fn test_fit_is_reproducible() {
        let a = ContentModel::fit(&catalog(), DEFAULT_VOCABULARY_SIZE).unwrap().unwrap();
        let b = ContentModel::fit(&catalog(), DEFAULT_VOCABULARY_SIZE).unwrap().unwrap();
        let purchased: HashSet<Uuid> = [id(4)].into_iter().collect();
        assert_eq!(a.recommend(&purchased, 10), b.recommend(&purchased, 10));
    }

    #[test]
    fn test_empty_catalog() {
        assert!(ContentModel::fit(&[], DEFAULT_VOCABULARY_SIZE).unwrap().is_none());
    }
}
