//! Larder Ingredients - Vocabulary Deduplication
//!
//! Keeps the master ingredient vocabulary free of duplicates. Raw names from
//! user-submitted recipes are normalized, resolved against the store by
//! exact identifier and then by edit-distance similarity, and either reuse
//! an existing entry (bumping its usage count atomically) or create one.
//!
//! # Failure policy
//!
//! Read-path failures (lookup, similarity scan) degrade to "not found" and
//! increment failures are swallowed; both are logged. Only a failed create
//! is returned to the caller, since it would otherwise report a new id that
//! does not exist.

pub mod normalizer;
pub mod records;
pub mod telemetry;

pub use normalizer::IngredientNormalizer;
pub use telemetry::{init_tracing, LogFormat, TelemetryConfig};

pub use larder_core::{
    IngredientCategory, LarderConfig, LarderError, LarderResult, MasterIngredient, SaveOutcome,
    SimilarIngredient,
};
