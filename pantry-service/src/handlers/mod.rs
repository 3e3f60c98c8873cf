pub mod app;
pub mod extract;
pub mod metrics;
pub mod pantry;
pub mod recipes;
