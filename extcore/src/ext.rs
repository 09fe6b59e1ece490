//! Extension trees: the composable value every facet/field contribution is wrapped in
//! before being handed to [`crate::config::Configuration::resolve`].

use std::collections::HashSet;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::facet::{Dep, ErasedFacet};
use crate::field::ErasedField;
use crate::id::Id;
use crate::prec::Prec;
use crate::value::ErasedValue;

type GetErased =
    Rc<dyn Fn(&crate::state::EditorState) -> Result<Box<dyn ErasedValue>, crate::ExtError>>;

pub(crate) enum ProviderKind {
    Static(Box<dyn ErasedValue>),
    Single { deps: SmallVec<[Dep; 4]>, get: GetErased },
    Multi { deps: SmallVec<[Dep; 4]>, get: GetErased },
}

pub(crate) struct ProviderNode {
    pub id: Id,
    pub facet_id: Id,
    pub facet: Rc<dyn ErasedFacet>,
    pub kind: ProviderKind,
}

pub(crate) enum LeafKind {
    Field(Rc<dyn ErasedField>),
    Provider(Rc<ProviderNode>),
}

pub(crate) struct LeafNode {
    pub id: Id,
    pub kind: LeafKind,
}

/// A node in the tree of extensions built by `Facet::of`, `computed_facet`, `StateField`
/// leaves, arrays, and `Prec` wrappers.
///
/// Every variant is `Rc`-backed internally, so cloning an `Extension` (to share a subtree,
/// or to re-append the same field into several configurations) is cheap pointer cloning,
/// mirroring how the facet/field handles themselves are cheap `Rc` clones.
#[derive(Clone)]
pub enum Extension {
    Leaf(Rc<LeafNode>),
    List(Vec<Extension>),
    Prec(Box<Extension>, Prec),
}

impl Extension {
    pub fn none() -> Extension {
        Extension::List(Vec::new())
    }
}

impl From<Vec<Extension>> for Extension {
    fn from(list: Vec<Extension>) -> Extension {
        Extension::List(list)
    }
}

#[derive(Clone)]
pub(crate) enum FlatEntry {
    Field(Rc<dyn ErasedField>),
    Provider(Rc<ProviderNode>),
}

/// Flattens an extension tree into provider/field leaves in precedence order: all
/// `Override` leaves first, then `Extend`, `Default`, and finally `Fallback`, each bucket
/// preserving the tree's left-to-right (depth-first) order. An extension value (tracked by
/// its leaf id) encountered a second time anywhere in the tree is skipped entirely,
/// including its attached sub-extensions, so the first occurrence wins.
pub(crate) fn flatten(roots: &[Extension]) -> Vec<FlatEntry> {
    let mut seen = HashSet::new();
    let mut buckets: [Vec<FlatEntry>; Prec::COUNT] = Default::default();
    for root in roots {
        walk(root, Prec::Default, &mut seen, &mut buckets);
    }
    buckets.into_iter().flatten().collect()
}

fn walk(ext: &Extension, prec: Prec, seen: &mut HashSet<Id>, buckets: &mut [Vec<FlatEntry>; Prec::COUNT]) {
    match ext {
        Extension::List(list) => {
            for child in list {
                walk(child, prec, seen, buckets);
            }
        }
        Extension::Prec(inner, p) => walk(inner, *p, seen, buckets),
        Extension::Leaf(leaf) => {
            if !seen.insert(leaf.id) {
                return;
            }
            match &leaf.kind {
                LeafKind::Field(field) => {
                    buckets[prec as usize].push(FlatEntry::Field(field.clone()));
                    for attached in field.attached() {
                        walk(attached, prec, seen, buckets);
                    }
                }
                LeafKind::Provider(provider) => {
                    buckets[prec as usize].push(FlatEntry::Provider(provider.clone()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facet::{computed_facet, define_facet};
    use crate::field::{FieldSpec, StateField};

    fn leaf_ids(entries: &[FlatEntry]) -> Vec<Id> {
        entries
            .iter()
            .map(|e| match e {
                FlatEntry::Field(f) => f.id(),
                FlatEntry::Provider(p) => p.id,
            })
            .collect()
    }

    #[test]
    fn precedence_orders_before_tree_order() {
        let facet = define_facet::<u32, u32>(|inputs| inputs.first().copied().unwrap_or(0));
        let a = facet.of(1);
        let b = Prec::Override.set(facet.of(2));
        let c = facet.of(3);
        let flat = flatten(&[a, b, c]);
        // b (Override) must come first even though it's second in tree order.
        assert_eq!(flat.len(), 3);
        match &flat[0] {
            FlatEntry::Provider(p) => assert!(matches!(&p.kind, ProviderKind::Static(_))),
            _ => panic!("expected provider"),
        }
    }

    #[test]
    fn duplicate_leaf_is_skipped_second_time() {
        let field: StateField<u32> = StateField::define(FieldSpec::new(|_s| Ok(0u32), |v, _tr, _s| Ok(*v)));
        let ext1: Extension = field.clone().into();
        let ext2: Extension = field.clone().into();
        let flat = flatten(&[ext1, ext2]);
        assert_eq!(flat.len(), 1);
    }

    #[test]
    fn field_attachments_are_flattened_too() {
        let facet = define_facet::<u32, u32>(|inputs| inputs.first().copied().unwrap_or(0));
        let field: StateField<u32> = StateField::define(FieldSpec::new(|_s| Ok(7u32), |v, _tr, _s| Ok(*v)));
        let field = field.provide(&facet, |v| *v, None).unwrap();
        let flat = flatten(&[field.into()]);
        assert_eq!(flat.len(), 2);
        assert!(matches!(flat[0], FlatEntry::Field(_)));
        assert!(matches!(flat[1], FlatEntry::Provider(_)));
    }

    #[test]
    fn computed_facet_keeps_insertion_order_within_bucket() {
        let facet = define_facet::<u32, Vec<u32>>(|inputs| inputs.to_vec());
        let a = computed_facet(&facet, &[], |_s| Ok(1u32)).unwrap();
        let b = computed_facet(&facet, &[], |_s| Ok(2u32)).unwrap();
        let flat = flatten(&[a, b]);
        let ids = leaf_ids(&flat);
        assert_eq!(ids.len(), 2);
    }
}
