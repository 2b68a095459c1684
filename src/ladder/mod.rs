pub mod tiers;

pub use tiers::{higher_of, ordinal, touching, Tier};
