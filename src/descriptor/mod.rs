//! Descriptor module - Multi-strategy element descriptors
//!
//! Builds, classifies and deduplicates the records that identify an element
//! across page changes.

pub mod builder;
pub mod category;
pub mod confidence;
pub mod dedup;
pub mod identifier;
pub mod model;
pub mod roles;
pub mod selector;

pub use builder::{BuilderOptions, DescriptorBuilder};
pub use category::{categorize, infer_purpose, interaction_score, is_interactive, supported_actions};
pub use confidence::{rank, StrategySignals};
pub use dedup::dedup;
pub use identifier::RandomIdPredicate;
pub use model::{
    ConfidenceTier, ElementCategory, ElementDescriptor, IdentityAttributes, StructuralLocators,
};
pub use roles::{effective_role, implicit_role};
