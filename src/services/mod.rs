pub mod recommendation;
pub mod repository;
pub mod serving;
pub mod training;
