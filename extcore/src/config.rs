//! Resolving an extension tree into a flat, addressable [`Configuration`].

use std::collections::HashMap;
use std::rc::Rc;

use crate::address::Address;
use crate::ext::{flatten, Extension, FlatEntry, ProviderKind};
use crate::facet::Dep;
use crate::id::Id;
use crate::slot::{arity_of, AggregateSlot, ProviderArity, ProviderSlot, ResolvedDep, Slot};
use crate::state::EditorState;
use crate::value::ErasedValue;
use crate::ExtError;

/// A resolved, addressable extension tree: every field and facet that appears in it has
/// been assigned exactly one [`Address`], static contributions have been combined once and
/// for all, and dynamic contributions have been compiled into [`Slot`]s ready for demand
/// driven evaluation.
pub struct Configuration {
    pub(crate) address: HashMap<Id, Address>,
    pub(crate) static_values: Vec<Box<dyn ErasedValue>>,
    pub(crate) dynamic_slots: Vec<Rc<Slot>>,
}

impl Configuration {
    pub fn address_of(&self, id: Id) -> Option<Address> {
        self.address.get(&id).copied()
    }

    pub(crate) fn dynamic_slot_count(&self) -> usize {
        self.dynamic_slots.len()
    }

    pub(crate) fn slot(&self, idx: usize) -> &Rc<Slot> {
        &self.dynamic_slots[idx]
    }
}

fn resolve_dep(dep: Dep, address: &HashMap<Id, Address>) -> Result<ResolvedDep, ExtError> {
    match dep {
        Dep::Doc => Ok(ResolvedDep::Doc),
        Dep::Selection => Ok(ResolvedDep::Selection),
        Dep::Facet(id) | Dep::Field(id) => match address.get(&id) {
            Some(addr) => Ok(ResolvedDep::Addr(*addr)),
            None => Err(ExtError::InvalidDependency(format!(
                "dependency {id:?} has no address in this configuration"
            ))),
        },
    }
}

/// Flattens and resolves `roots` into a [`Configuration`].
///
/// `old` is the state being reconfigured from, if any: static facets whose combined value
/// compares equal to the prior resolve keep the prior value object (preserving downstream
/// reference-identity comparisons), per the Design Notes' resolution of the open question
/// on reuse.
pub fn resolve(roots: &[Extension], old: Option<&EditorState>) -> Result<Configuration, ExtError> {
    let flat = flatten(roots);

    let mut address = HashMap::new();
    let mut static_values: Vec<Box<dyn ErasedValue>> = Vec::new();
    let mut dynamic_slots: Vec<Rc<Slot>> = Vec::new();

    // Step 1: fields get addresses first, in flattened order.
    let mut fields = Vec::new();
    for entry in &flat {
        if let FlatEntry::Field(f) = entry {
            let addr = Address::dynamic(dynamic_slots.len());
            address.insert(f.id(), addr);
            dynamic_slots.push(Rc::new(Slot::Field(f.clone())));
            fields.push(f.clone());
        }
    }

    // Step 2: group providers by facet, preserving first-seen facet order and each
    // facet's provider insertion order.
    struct FacetGroup {
        facet_id: Id,
        facet: Rc<dyn crate::facet::ErasedFacet>,
        providers: Vec<Rc<crate::ext::ProviderNode>>,
    }
    let mut facet_order: Vec<Id> = Vec::new();
    let mut groups: HashMap<Id, FacetGroup> = HashMap::new();
    for entry in &flat {
        if let FlatEntry::Provider(p) = entry {
            let group = groups.entry(p.facet_id).or_insert_with(|| {
                facet_order.push(p.facet_id);
                FacetGroup { facet_id: p.facet_id, facet: p.facet.clone(), providers: Vec::new() }
            });
            group.providers.push(p.clone());
        }
    }

    // Step 3: assign addresses to each facet's providers, then the facet's own aggregate.
    for facet_id in facet_order {
        let group = groups.remove(&facet_id).expect("facet present in facet_order");
        let all_static = group.providers.iter().all(|p| matches!(p.kind, ProviderKind::Static(_)));

        if all_static {
            let inputs: Vec<Box<dyn ErasedValue>> =
                group.providers.iter().map(|p| match &p.kind {
                    ProviderKind::Static(v) => v.clone_value(),
                    _ => unreachable!("all_static checked above"),
                }).collect();
            let combined = group.facet.combine_erased(&inputs);
            let reused = old.and_then(|old_state| {
                let old_addr = old_state.config().address_of(facet_id)?;
                if !old_addr.is_static() {
                    return None;
                }
                let old_val = old_state.config().static_values.get(old_addr.index())?;
                if group.facet.compare_output_erased(old_val.as_ref(), combined.as_ref()) {
                    Some(old_val.clone_value())
                } else {
                    None
                }
            });
            let value = reused.unwrap_or(combined);
            let addr = Address::static_(static_values.len());
            static_values.push(value);
            address.insert(facet_id, addr);
            continue;
        }

        let mut provider_addrs = Vec::with_capacity(group.providers.len());
        for p in &group.providers {
            let arity = arity_of(&p.kind);
            let addr = match &p.kind {
                ProviderKind::Static(v) => {
                    let a = Address::static_(static_values.len());
                    static_values.push(v.clone_value());
                    a
                }
                ProviderKind::Single { deps, get } => {
                    let resolved: Result<Vec<_>, _> = deps.iter().map(|d| resolve_dep(*d, &address)).collect();
                    let a = Address::dynamic(dynamic_slots.len());
                    dynamic_slots.push(Rc::new(Slot::Provider(ProviderSlot {
                        id: p.id,
                        facet: group.facet.clone(),
                        arity: ProviderArity::Single,
                        deps: resolved?,
                        get: get.clone(),
                    })));
                    a
                }
                ProviderKind::Multi { deps, get } => {
                    let resolved: Result<Vec<_>, _> = deps.iter().map(|d| resolve_dep(*d, &address)).collect();
                    let a = Address::dynamic(dynamic_slots.len());
                    dynamic_slots.push(Rc::new(Slot::Provider(ProviderSlot {
                        id: p.id,
                        facet: group.facet.clone(),
                        arity: ProviderArity::Multi,
                        deps: resolved?,
                        get: get.clone(),
                    })));
                    a
                }
            };
            address.insert(p.id, addr);
            provider_addrs.push((addr, arity));
        }

        let facet_addr = Address::dynamic(dynamic_slots.len());
        dynamic_slots.push(Rc::new(Slot::Aggregate(AggregateSlot {
            facet_id,
            facet: group.facet.clone(),
            providers: provider_addrs,
        })));
        address.insert(facet_id, facet_addr);
    }

    Ok(Configuration { address, static_values, dynamic_slots })
}
