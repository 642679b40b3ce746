pub mod analysis;
pub mod ask;
pub mod library;
pub mod paper;
pub mod visualize;
