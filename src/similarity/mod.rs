// Similarity metrics: semantic, n-gram, word-vector and phonological.

pub mod embeddings;
pub mod ngram;
pub mod phonology;
pub mod semantic;
pub mod text;
pub mod traits;
pub mod wordvec;
