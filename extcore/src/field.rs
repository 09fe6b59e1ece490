//! State fields: per-document values threaded through transactions via `create`/`update`.

use std::rc::Rc;

use crate::ext::{Extension, LeafKind, LeafNode};
use crate::facet::{computed_facet, computed_facet_n, Dep, Facet};
use crate::id::{next_id, Id};
use crate::prec::Prec;
use crate::state::{EditorState, TrFlags};
use crate::value::ErasedValue;
use crate::ExtError;

/// The type-erased operations a resolved configuration needs from a field.
pub(crate) trait ErasedField {
    fn id(&self) -> Id;
    fn attached(&self) -> &[Extension];
    fn create(&self, state: &EditorState) -> Result<Box<dyn ErasedValue>, ExtError>;
    fn update(&self, old: &dyn ErasedValue, tr: TrFlags, state: &EditorState) -> Result<Box<dyn ErasedValue>, ExtError>;
    fn compare(&self, a: &dyn ErasedValue, b: &dyn ErasedValue) -> bool;
}

/// The behavior shared by every handle derived from the same `StateField::define` call.
/// Kept behind `Rc` so that `.provide()`/`.provide_n()` can produce a new handle (same
/// identity, extended `attached` list) without re-boxing the user's closures.
struct FieldBehavior<V> {
    create: Box<dyn Fn(&EditorState) -> Result<V, ExtError>>,
    update: Box<dyn Fn(&V, TrFlags, &EditorState) -> Result<V, ExtError>>,
    compare: Box<dyn Fn(&V, &V) -> bool>,
}

pub(crate) struct FieldInner<V> {
    pub(crate) id: Id,
    behavior: Rc<FieldBehavior<V>>,
    attached: Vec<Extension>,
}

impl<V: Clone + 'static> ErasedField for FieldInner<V> {
    fn id(&self) -> Id {
        self.id
    }

    fn attached(&self) -> &[Extension] {
        &self.attached
    }

    fn create(&self, state: &EditorState) -> Result<Box<dyn ErasedValue>, ExtError> {
        Ok(Box::new((self.behavior.create)(state)?))
    }

    fn update(&self, old: &dyn ErasedValue, tr: TrFlags, state: &EditorState) -> Result<Box<dyn ErasedValue>, ExtError> {
        Ok(Box::new((self.behavior.update)(old.downcast_ref::<V>(), tr, state)?))
    }

    fn compare(&self, a: &dyn ErasedValue, b: &dyn ErasedValue) -> bool {
        (self.behavior.compare)(a.downcast_ref::<V>(), b.downcast_ref::<V>())
    }
}

/// A handle to a state field. `.provide(...)` returns a new handle sharing the same
/// identity but with one more attached facet contribution; the original handle is
/// untouched, matching the builder style the rest of the extension tree uses.
pub struct StateField<V> {
    pub(crate) inner: Rc<FieldInner<V>>,
}

impl<V> Clone for StateField<V> {
    fn clone(&self) -> Self {
        StateField { inner: self.inner.clone() }
    }
}

/// Spec for a new field, supplied to [`StateField::define`]. `create`/`update` return a
/// `Result` so they can propagate errors raised by nested `state.field`/`state.facet` reads.
pub struct FieldSpec<V> {
    create: Box<dyn Fn(&EditorState) -> Result<V, ExtError>>,
    update: Box<dyn Fn(&V, TrFlags, &EditorState) -> Result<V, ExtError>>,
    compare: Option<Box<dyn Fn(&V, &V) -> bool>>,
}

impl<V: 'static> FieldSpec<V> {
    pub fn new(
        create: impl Fn(&EditorState) -> Result<V, ExtError> + 'static,
        update: impl Fn(&V, TrFlags, &EditorState) -> Result<V, ExtError> + 'static,
    ) -> Self {
        FieldSpec { create: Box::new(create), update: Box::new(update), compare: None }
    }

    pub fn compare(mut self, f: impl Fn(&V, &V) -> bool + 'static) -> Self {
        self.compare = Some(Box::new(f));
        self
    }
}

impl<V: Clone + 'static> StateField<V> {
    pub fn id(&self) -> Id {
        self.inner.id
    }

    pub(crate) fn erased(&self) -> Rc<dyn ErasedField> {
        self.inner.clone() as Rc<dyn ErasedField>
    }

    /// Defines a new field. With no explicit `compare`, every update is treated as a
    /// change (downstream facets always recompute); supply `FieldSpec::compare` to skip
    /// recompute when the field settles back to an equal value.
    pub fn define(spec: FieldSpec<V>) -> StateField<V> {
        let compare = spec.compare.unwrap_or_else(|| Box::new(|_, _| false));
        StateField {
            inner: Rc::new(FieldInner {
                id: next_id(),
                behavior: Rc::new(FieldBehavior { create: spec.create, update: spec.update, compare }),
                attached: Vec::new(),
            }),
        }
    }

    /// Returns a new field handle (same identity) with one more provider of `facet`
    /// attached, computed from this field's current value. `prec`, if given, wraps just
    /// this provider at that precedence; otherwise it inherits whatever precedence the
    /// field itself is flattened under.
    pub fn provide<I: Clone + 'static, O: Clone + 'static>(
        &self,
        facet: &Facet<I, O>,
        get: impl Fn(&V) -> I + 'static,
        prec: Option<Prec>,
    ) -> Result<StateField<V>, ExtError> {
        let field = self.clone();
        let ext = computed_facet(facet, &[Dep::Field(self.inner.id)], move |state| {
            let v = state.field(&field)?;
            Ok(get(&v))
        })?;
        Ok(self.with_attached(if let Some(p) = prec { p.set(ext) } else { ext }))
    }

    /// Like [`StateField::provide`] but contributes zero or more inputs per evaluation.
    pub fn provide_n<I: Clone + 'static, O: Clone + 'static>(
        &self,
        facet: &Facet<I, O>,
        get: impl Fn(&V) -> Vec<I> + 'static,
        prec: Option<Prec>,
    ) -> Result<StateField<V>, ExtError> {
        let field = self.clone();
        let ext = computed_facet_n(facet, &[Dep::Field(self.inner.id)], move |state| {
            let v = state.field(&field)?;
            Ok(get(&v))
        })?;
        Ok(self.with_attached(if let Some(p) = prec { p.set(ext) } else { ext }))
    }

    fn with_attached(&self, ext: Extension) -> StateField<V> {
        let mut attached = self.inner.attached.clone();
        attached.push(ext);
        StateField { inner: Rc::new(FieldInner { id: self.inner.id, behavior: self.inner.behavior.clone(), attached }) }
    }
}

impl<V: Clone + 'static> From<StateField<V>> for Extension {
    fn from(field: StateField<V>) -> Extension {
        let id = field.inner.id;
        Extension::Leaf(Rc::new(LeafNode { id, kind: LeafKind::Field(field.erased()) }))
    }
}
