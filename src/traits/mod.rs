//! Trait abstractions for pluggable components.

pub mod cache;
