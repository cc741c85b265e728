pub mod contract;
pub mod financial_model;
pub mod generation;
