pub mod enrollment;
pub mod matcher;
mod store;
mod types;

pub use enrollment::{EnrollmentAccumulator, SampleOutcome};
pub use matcher::{best_match, classify, euclidean_distance, mean_distance, round_distance};
pub use store::IdentityStore;
pub use types::{
    Classification, Embedding, Identity, IdentitySummary, Match, RepresentativeImage,
};
