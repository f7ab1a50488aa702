// Dataset loading and the aligned sentence triples it produces.

pub mod loader;
pub mod triples;
