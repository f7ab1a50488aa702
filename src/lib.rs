// Cognata: similarity and statistics for parallel texts in three varieties
//
// This is the library root. Data flows one way: corpus -> similarity ->
// table -> stats, with analysis orchestrating and output presenting.

pub mod analysis;
pub mod config;
pub mod corpus;
pub mod download;
pub mod output;
pub mod similarity;
pub mod stats;
pub mod status;
pub mod table;
