pub mod alliance;
pub mod alphafold;
pub mod app;
pub mod atlas;
pub mod browser;
pub mod charts;
pub mod config;
pub mod domain;
pub mod error;
pub mod http;
pub mod ncbi;
pub mod output;
pub mod reactome;
pub mod report;
pub mod resolver;
pub mod sequence;
pub mod summary;
pub mod uniprot;
pub mod usage;
