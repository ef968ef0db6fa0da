// Two tiers: public (token endpoint, service info) and protected (the
// OneRoster gradebook collections)
pub mod error;
pub mod protected;
pub mod public;

pub use error::ApiError;
