pub mod catalog;
pub mod config;
pub mod disambiguate;
pub mod extract;
pub mod fetch;
pub mod model;
pub mod normalize;
pub mod parser;
pub mod pipeline;
pub mod resolve;
pub mod sheet;
pub mod similarity;
pub mod store;
