pub mod data_models;
pub mod quality;
pub mod report;

pub use data_models::*;
pub use quality::*;
pub use report::*;
