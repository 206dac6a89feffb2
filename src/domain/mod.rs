// Domain layer - Pure models and computations
pub mod condition;
pub mod graph;
pub mod isu;
