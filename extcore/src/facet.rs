//! Facets: many-input, one-output aggregation points.
//!
//! A `Facet<I, O>` is a nominal handle (an [`crate::id::Id`] plus the behavior that turns a
//! list of `I` contributions into one `O`). Handles are cheap to clone (an `Rc` to shared
//! immutable facet data, mirroring how `kyute-compose`'s cache handles are cheap `Rc`
//! clones around shared slot state) and are the type callers hold onto; the resolver only
//! ever sees the type-erased [`ErasedFacet`] view.

use std::rc::Rc;

use extcore_common::Data;

use crate::ext::{Extension, LeafKind, LeafNode, ProviderKind, ProviderNode};
use crate::id::{next_id, Id};
use crate::state::EditorState;
use crate::value::ErasedValue;
use crate::ExtError;

/// A dependency a dynamic provider can declare.
#[derive(Clone, Copy, Debug)]
pub enum Dep {
    Facet(Id),
    Field(Id),
    Doc,
    Selection,
}

/// The type-erased operations a resolved configuration needs from a facet, independent of
/// its concrete `I`/`O` types.
pub(crate) trait ErasedFacet {
    fn id(&self) -> Id;
    fn is_static(&self) -> bool;
    fn combine_erased(&self, inputs: &[Box<dyn ErasedValue>]) -> Box<dyn ErasedValue>;
    fn default_erased(&self) -> Box<dyn ErasedValue>;
    fn compare_output_erased(&self, a: &dyn ErasedValue, b: &dyn ErasedValue) -> bool;
    /// Compares two `Single`-provider contributions.
    fn compare_single(&self, a: &dyn ErasedValue, b: &dyn ErasedValue) -> bool;
    /// Compares two `Multi`-provider contributions (element-wise over the produced lists).
    fn compare_multi(&self, a: &dyn ErasedValue, b: &dyn ErasedValue) -> bool;
    /// Clones a `Single` provider's value `I` onto the aggregate's input list.
    fn push_single(&self, value: &dyn ErasedValue, out: &mut Vec<Box<dyn ErasedValue>>);
    /// Clones a `Multi` provider's list `Vec<I>` element-wise onto the aggregate's input list.
    fn push_multi(&self, value: &dyn ErasedValue, out: &mut Vec<Box<dyn ErasedValue>>);
}

pub(crate) struct FacetInner<I, O> {
    pub(crate) id: Id,
    combine: Box<dyn Fn(&[I]) -> O>,
    compare_input: Box<dyn Fn(&I, &I) -> bool>,
    compare_output: Box<dyn Fn(&O, &O) -> bool>,
    is_static: bool,
    default: O,
}

impl<I: Clone + 'static, O: Clone + 'static> ErasedFacet for FacetInner<I, O> {
    fn id(&self) -> Id {
        self.id
    }

    fn is_static(&self) -> bool {
        self.is_static
    }

    fn combine_erased(&self, inputs: &[Box<dyn ErasedValue>]) -> Box<dyn ErasedValue> {
        let typed: Vec<I> = inputs.iter().map(|b| b.downcast_ref::<I>().clone()).collect();
        Box::new((self.combine)(&typed))
    }

    fn default_erased(&self) -> Box<dyn ErasedValue> {
        Box::new(self.default.clone())
    }

    fn compare_output_erased(&self, a: &dyn ErasedValue, b: &dyn ErasedValue) -> bool {
        (self.compare_output)(a.downcast_ref::<O>(), b.downcast_ref::<O>())
    }

    fn compare_single(&self, a: &dyn ErasedValue, b: &dyn ErasedValue) -> bool {
        (self.compare_input)(a.downcast_ref::<I>(), b.downcast_ref::<I>())
    }

    fn compare_multi(&self, a: &dyn ErasedValue, b: &dyn ErasedValue) -> bool {
        let va = a.downcast_ref::<Vec<I>>();
        let vb = b.downcast_ref::<Vec<I>>();
        va.len() == vb.len() && va.iter().zip(vb.iter()).all(|(x, y)| (self.compare_input)(x, y))
    }

    fn push_single(&self, value: &dyn ErasedValue, out: &mut Vec<Box<dyn ErasedValue>>) {
        out.push(Box::new(value.downcast_ref::<I>().clone()));
    }

    fn push_multi(&self, value: &dyn ErasedValue, out: &mut Vec<Box<dyn ErasedValue>>) {
        out.extend(value.downcast_ref::<Vec<I>>().iter().cloned().map(|v| Box::new(v) as Box<dyn ErasedValue>));
    }
}

/// A handle to a facet. Cheap to clone; two clones of the same handle refer to the same
/// facet identity.
pub struct Facet<I, O> {
    pub(crate) inner: Rc<FacetInner<I, O>>,
}

impl<I, O> Clone for Facet<I, O> {
    fn clone(&self) -> Self {
        Facet { inner: self.inner.clone() }
    }
}

impl<I: Clone + 'static, O: Clone + 'static> Facet<I, O> {
    pub fn id(&self) -> Id {
        self.inner.id
    }

    pub fn default(&self) -> O {
        self.inner.default.clone()
    }

    pub(crate) fn erased(&self) -> Rc<dyn ErasedFacet> {
        self.inner.clone() as Rc<dyn ErasedFacet>
    }

    /// Provides a single static value for this facet.
    pub fn of(&self, value: I) -> Extension {
        let node = ProviderNode {
            id: next_id(),
            facet_id: self.inner.id,
            facet: self.erased(),
            kind: ProviderKind::Static(Box::new(value)),
        };
        Extension::Leaf(Rc::new(LeafNode { id: node.id, kind: LeafKind::Provider(Rc::new(node)) }))
    }
}

/// Builder for a facet's combine/compare behavior, supplied to [`define_facet_with`].
pub struct FacetSpec<I, O> {
    combine: Box<dyn Fn(&[I]) -> O>,
    compare_input: Option<Box<dyn Fn(&I, &I) -> bool>>,
    compare_output: Option<Box<dyn Fn(&O, &O) -> bool>>,
    is_static: bool,
}

impl<I: Data, O: Data> FacetSpec<I, O> {
    pub fn new(combine: impl Fn(&[I]) -> O + 'static) -> Self {
        FacetSpec { combine: Box::new(combine), compare_input: None, compare_output: None, is_static: false }
    }

    pub fn compare_input(mut self, f: impl Fn(&I, &I) -> bool + 'static) -> Self {
        self.compare_input = Some(Box::new(f));
        self
    }

    pub fn compare_output(mut self, f: impl Fn(&O, &O) -> bool + 'static) -> Self {
        self.compare_output = Some(Box::new(f));
        self
    }

    pub fn make_static(mut self) -> Self {
        self.is_static = true;
        self
    }
}

/// Defines a new facet from an explicit spec (custom compare functions and/or `is_static`).
pub fn define_facet_with<I: Data, O: Data>(spec: FacetSpec<I, O>) -> Facet<I, O> {
    let default = (spec.combine)(&[]);
    let compare_input = spec.compare_input.unwrap_or_else(|| Box::new(|a: &I, b: &I| a.same(b)));
    let compare_output = spec.compare_output.unwrap_or_else(|| Box::new(|a: &O, b: &O| a.same(b)));
    Facet {
        inner: Rc::new(FacetInner {
            id: next_id(),
            combine: spec.combine,
            compare_input,
            compare_output,
            is_static: spec.is_static,
            default,
        }),
    }
}

/// Defines a new dynamic facet with default (value-identity) comparisons.
pub fn define_facet<I: Data, O: Data>(combine: impl Fn(&[I]) -> O + 'static) -> Facet<I, O> {
    define_facet_with(FacetSpec::new(combine))
}

/// Defines a new static facet: only `Facet::of` (and `computed_facet` errors out otherwise)
/// may contribute to it.
pub fn define_static_facet<I: Data, O: Data>(combine: impl Fn(&[I]) -> O + 'static) -> Facet<I, O> {
    define_facet_with(FacetSpec::new(combine).make_static())
}

/// Defines a facet with no explicit combine: its output is simply the list of inputs, in
/// provider precedence order.
pub fn define_list_facet<I: Data>() -> Facet<I, Vec<I>> {
    define_facet(|inputs: &[I]| inputs.to_vec())
}

/// Attaches a dynamic (state-dependent) contribution to `facet`.
///
/// Fails with [`ExtError::StaticFacetViolation`] if `facet` was defined static. `get` itself
/// returns a `Result` so it can propagate errors raised by nested `state.field`/`state.facet`
/// reads (most importantly [`ExtError::CyclicDependency`]).
pub fn computed_facet<I: Clone + 'static, O: Clone + 'static>(
    facet: &Facet<I, O>,
    deps: &[Dep],
    get: impl Fn(&EditorState) -> Result<I, ExtError> + 'static,
) -> Result<Extension, ExtError> {
    if facet.inner.is_static {
        return Err(ExtError::StaticFacetViolation { facet: facet.inner.id });
    }
    let get: Rc<dyn Fn(&EditorState) -> Result<Box<dyn ErasedValue>, ExtError>> =
        Rc::new(move |state| Ok(Box::new(get(state)?)));
    let node = ProviderNode {
        id: next_id(),
        facet_id: facet.inner.id,
        facet: facet.erased(),
        kind: ProviderKind::Single { deps: deps.iter().copied().collect(), get },
    };
    Ok(Extension::Leaf(Rc::new(LeafNode { id: node.id, kind: LeafKind::Provider(Rc::new(node)) })))
}

/// Like [`computed_facet`] but contributes zero or more inputs per evaluation.
pub fn computed_facet_n<I: Clone + 'static, O: Clone + 'static>(
    facet: &Facet<I, O>,
    deps: &[Dep],
    get: impl Fn(&EditorState) -> Result<Vec<I>, ExtError> + 'static,
) -> Result<Extension, ExtError> {
    if facet.inner.is_static {
        return Err(ExtError::StaticFacetViolation { facet: facet.inner.id });
    }
    let get: Rc<dyn Fn(&EditorState) -> Result<Box<dyn ErasedValue>, ExtError>> =
        Rc::new(move |state| Ok(Box::new(get(state)?)));
    let node = ProviderNode {
        id: next_id(),
        facet_id: facet.inner.id,
        facet: facet.erased(),
        kind: ProviderKind::Multi { deps: deps.iter().copied().collect(), get },
    };
    Ok(Extension::Leaf(Rc::new(LeafNode { id: node.id, kind: LeafKind::Provider(Rc::new(node)) })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_combine_of_empty_input() {
        let tab_size = define_facet::<u32, u32>(|inputs| inputs.first().copied().unwrap_or(4));
        assert_eq!(tab_size.default(), 4);
    }

    #[test]
    fn list_facet_defaults_to_empty_vec() {
        let themes = define_list_facet::<String>();
        assert!(themes.default().is_empty());
    }

    #[test]
    fn computed_facet_rejects_static_facets() {
        let f = define_static_facet::<u32, u32>(|inputs| inputs.first().copied().unwrap_or(0));
        let err = computed_facet(&f, &[], |_state| Ok(1u32)).unwrap_err();
        assert!(matches!(err, ExtError::StaticFacetViolation { .. }));
    }
}
