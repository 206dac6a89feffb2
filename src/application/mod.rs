// Application layer - Use cases and the store seam
pub mod condition_service;
pub mod condition_store;
pub mod error;
pub mod graph_service;
pub mod isu_service;
pub mod trend_service;
