//! Dynamic slots: the per-address evaluators a resolved [`crate::config::Configuration`]
//! runs on demand.
//!
//! Each [`Slot`] variant is tagged by kind (`Field`/`Provider`/`Aggregate`) so the
//! evaluator can log and reason about what's being recomputed; the actual per-slot
//! behavior still has to go through type-erased closures/vtables, since a single
//! `Vec<Slot>` holds slots for facets and fields of every concrete type in the tree side
//! by side.

use std::rc::Rc;

use crate::address::Address;
use crate::ext::ProviderKind;
use crate::facet::ErasedFacet;
use crate::field::ErasedField;
use crate::id::Id;
use crate::state::{EditorState, TrFlags};
use crate::value::ErasedValue;
use crate::ExtError;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum ProviderArity {
    Single,
    Multi,
}

pub(crate) enum ResolvedDep {
    Addr(Address),
    Doc,
    Selection,
}

pub(crate) struct ProviderSlot {
    pub id: Id,
    pub facet: Rc<dyn ErasedFacet>,
    pub arity: ProviderArity,
    pub deps: Vec<ResolvedDep>,
    pub get: Rc<dyn Fn(&EditorState) -> Result<Box<dyn ErasedValue>, ExtError>>,
}

pub(crate) struct AggregateSlot {
    pub facet_id: Id,
    pub facet: Rc<dyn ErasedFacet>,
    /// Addresses of this facet's providers, in precedence/insertion order, tagged by arity
    /// so values can be unpacked (`Single` pushes one input, `Multi` extends by its list).
    pub providers: Vec<(Address, ProviderArity)>,
}

pub(crate) enum Slot {
    Field(Rc<dyn ErasedField>),
    Provider(ProviderSlot),
    Aggregate(AggregateSlot),
}

impl Slot {
    pub(crate) fn label(&self) -> &'static str {
        match self {
            Slot::Field(_) => "field",
            Slot::Provider(_) => "provider",
            Slot::Aggregate(_) => "aggregate",
        }
    }

    /// Evaluates this slot, writing its value into `state.values[idx]` and returning
    /// whether it changed relative to the prior state (or `true` if there was none).
    pub(crate) fn evaluate(&self, state: &EditorState, idx: usize) -> Result<bool, ExtError> {
        match self {
            Slot::Field(field) => evaluate_field(field.as_ref(), state, idx),
            Slot::Provider(slot) => evaluate_provider(slot, state, idx),
            Slot::Aggregate(slot) => evaluate_aggregate(slot, state, idx),
        }
    }
}

fn evaluate_field(field: &dyn ErasedField, state: &EditorState, idx: usize) -> Result<bool, ExtError> {
    let field_id = field.id();
    let prior_addr = state.prev().and_then(|p| p.config().address_of(field_id));
    let (value, changed) = match prior_addr {
        None => {
            tracing::trace!(field = ?field_id, "creating field");
            (field.create(state)?, true)
        }
        Some(prior_addr) => {
            let prev = state.prev().expect("prior address implies a prior state");
            let old = prev.value_at(prior_addr);
            let tr = state.tr().expect("field update requires an applying transaction");
            let new = field.update(old.as_ref(), tr, state)?;
            let changed = !field.compare(old.as_ref(), new.as_ref());
            (new, changed)
        }
    };
    state.store(idx, value);
    Ok(changed)
}

/// Looks up `id`'s value in the prior state by re-resolving its address in the prior
/// state's own configuration, rather than assuming this slot's index in the new
/// configuration still lines up with the same slot in the old one (reconfiguration can
/// shift indices whenever a field or provider is added/removed ahead of this one).
fn old_value_by_id(state: &EditorState, id: Id) -> Option<Box<dyn ErasedValue>> {
    let prev = state.prev()?;
    let addr = prev.config().address_of(id)?;
    Some(prev.value_at(addr))
}

fn dep_changed(dep: &ResolvedDep, state: &EditorState, tr: TrFlags) -> Result<bool, ExtError> {
    match dep {
        ResolvedDep::Doc => Ok(tr.doc_changed),
        ResolvedDep::Selection => Ok(tr.doc_changed || tr.selection_set),
        ResolvedDep::Addr(addr) => {
            if addr.is_static() {
                return Ok(false);
            }
            let status = state.ensure_addr(*addr)?;
            Ok(status.changed())
        }
    }
}

fn evaluate_provider(slot: &ProviderSlot, state: &EditorState, idx: usize) -> Result<bool, ExtError> {
    let fresh = match state.tr() {
        None => true,
        Some(tr) => tr.reconfigured,
    };
    if fresh {
        tracing::trace!("evaluating provider (fresh state or reconfiguration)");
        let value = (slot.get)(state)?;
        state.store(idx, value);
        return Ok(true);
    }
    let tr = state.tr().expect("non-fresh evaluation implies a transaction");
    let mut changed = false;
    for dep in &slot.deps {
        if dep_changed(dep, state, tr)? {
            changed = true;
        }
    }
    if !changed {
        tracing::debug!(addr = idx, "provider recompute skipped, no observed dependency changed");
        let carried = old_value_by_id(state, slot.id).expect("non-fresh state has a predecessor with this provider");
        state.store(idx, carried);
        return Ok(false);
    }
    let new = (slot.get)(state)?;
    let old = old_value_by_id(state, slot.id);
    let same = match (&old, slot.arity) {
        (Some(old), ProviderArity::Single) => slot.facet.compare_single(old.as_ref(), new.as_ref()),
        (Some(old), ProviderArity::Multi) => slot.facet.compare_multi(old.as_ref(), new.as_ref()),
        (None, _) => false,
    };
    state.store(idx, new);
    Ok(!same)
}

fn evaluate_aggregate(slot: &AggregateSlot, state: &EditorState, idx: usize) -> Result<bool, ExtError> {
    let fresh = match state.tr() {
        None => true,
        Some(tr) => tr.reconfigured,
    };
    if !fresh {
        let mut any_changed = false;
        for (addr, _) in &slot.providers {
            if addr.is_dynamic() {
                let status = state.ensure_addr(*addr)?;
                if status.changed() {
                    any_changed = true;
                }
            }
        }
        if !any_changed {
            tracing::debug!(addr = idx, "aggregate recompute skipped, no provider changed");
            let carried =
                old_value_by_id(state, slot.facet_id).expect("non-fresh state has a predecessor with this facet");
            state.store(idx, carried);
            return Ok(false);
        }
    }
    let mut inputs: Vec<Box<dyn ErasedValue>> = Vec::with_capacity(slot.providers.len());
    for (addr, arity) in &slot.providers {
        state.ensure_addr(*addr)?;
        let value = state.value_at(*addr);
        match arity {
            ProviderArity::Single => slot.facet.push_single(value.as_ref(), &mut inputs),
            ProviderArity::Multi => slot.facet.push_multi(value.as_ref(), &mut inputs),
        }
    }
    let new = slot.facet.combine_erased(&inputs);
    let old = old_value_by_id(state, slot.facet_id);
    let same = match &old {
        Some(old) => slot.facet.compare_output_erased(old.as_ref(), new.as_ref()),
        None => false,
    };
    state.store(idx, new);
    Ok(!same)
}

pub(crate) fn arity_of(kind: &ProviderKind) -> ProviderArity {
    match kind {
        ProviderKind::Static(_) | ProviderKind::Single { .. } => ProviderArity::Single,
        ProviderKind::Multi { .. } => ProviderArity::Multi,
    }
}
