//! Error surface for resolution and evaluation.

use thiserror::Error;

use crate::id::Id;

/// Everything that can go wrong while building a [`crate::config::Configuration`] or while
/// evaluating a slot inside one.
#[derive(Debug, Error)]
pub enum ExtError {
    /// A dynamic provider (`computedFacet`/`provide`) targeted a facet declared static.
    #[error("facet {facet:?} is declared static and only accepts static providers")]
    StaticFacetViolation { facet: Id },

    /// A value presented as a Facet has no associated FacetData. Structurally unreachable
    /// through the nominal `Facet<I, O>` handle this crate exposes — a `Facet` always
    /// carries its `FacetData` by construction — but kept in the error surface for parity
    /// with the resolver's error contract.
    #[error("facet {facet:?} has no associated facet data")]
    MissingFacetData { facet: Id },

    /// Evaluating a slot re-entered a slot that is already being computed.
    #[error("cyclic dependency detected while evaluating slot at address {addr}")]
    CyclicDependency { addr: usize },

    /// A provider or field declared a dependency on an id that has no address in this
    /// configuration (not a known Facet or StateField).
    #[error("invalid dependency: {0}")]
    InvalidDependency(String),
}
