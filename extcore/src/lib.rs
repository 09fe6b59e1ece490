//! Extension composition core: facets, state fields, extension trees, and the
//! demand-driven evaluator that resolves them into a usable editor state.
//!
//! The pieces compose roughly like this:
//!
//! - [`Facet`] and [`StateField`] are the two kinds of extension point a consumer defines.
//! - Consumers build an [`Extension`] tree out of facet/field contributions, arrays, and
//!   [`Prec`] precedence wrappers.
//! - [`resolve`] flattens a tree into a [`Configuration`]: every facet/field gets one
//!   [`Address`], static contributions are combined up front, dynamic ones become slots.
//! - [`EditorState`] evaluates a `Configuration` on demand, caching each slot's value for
//!   the lifetime of that state and reusing unchanged values across [`EditorState::apply`].

mod address;
mod config;
mod error;
mod ext;
mod facet;
mod field;
mod id;
mod prec;
mod slot;
mod state;
mod value;

pub use address::Address;
pub use config::{resolve, Configuration};
pub use error::ExtError;
pub use ext::Extension;
pub use facet::{
    computed_facet, computed_facet_n, define_facet, define_facet_with, define_list_facet,
    define_static_facet, Dep, Facet, FacetSpec,
};
pub use field::{FieldSpec, StateField};
pub use id::{next_id, Id, IdAllocator};
pub use prec::Prec;
pub use state::{EditorState, Transaction};

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use crate::{
        computed_facet, define_facet, define_facet_with, define_list_facet, resolve, Dep,
        EditorState, ExtError, FacetSpec, FieldSpec, Prec, StateField, Transaction,
    };

    /// S1 — Override precedence wins over a Default-level provider.
    #[test]
    fn tab_size_precedence() {
        let tab_size = define_facet::<u32, u32>(|inputs| inputs.first().copied().unwrap_or(4));
        let roots = [tab_size.of(2), Prec::Override.set(tab_size.of(8))];
        let config = Rc::new(resolve(&roots, None).unwrap());
        let state = EditorState::create(config).unwrap();
        assert_eq!(state.facet(&tab_size).unwrap(), 8);
    }

    /// S2 — a list facet with no explicit combine yields inputs in provider order.
    #[test]
    fn static_all_inputs_list() {
        let themes = define_list_facet::<String>();
        let roots = [themes.of("a".to_string()), themes.of("b".to_string())];
        let config = Rc::new(resolve(&roots, None).unwrap());
        let state = EditorState::create(config).unwrap();
        assert_eq!(state.facet(&themes).unwrap(), vec!["a".to_string(), "b".to_string()]);
    }

    /// S3 — a field-derived facet does not recompute when the field's own update is a no-op.
    #[test]
    fn field_derived_facet_skips_recompute_when_unchanged() {
        let size_facet = define_facet::<u32, u32>(|inputs| inputs.first().copied().unwrap_or(0));
        let counter: StateField<u32> = StateField::define(FieldSpec::new(
            |_state| Ok(0u32),
            |v, tr, _state| Ok(v + if tr.doc_changed { 1 } else { 0 }),
        ).compare(|a, b| a == b));
        let counter = counter.provide(&size_facet, |v| *v, None).unwrap();
        let roots = [counter.clone().into()];
        let config = Rc::new(resolve(&roots, None).unwrap());
        let state = EditorState::create(config).unwrap();
        assert_eq!(state.field(&counter).unwrap(), 0);
        assert_eq!(state.facet(&size_facet).unwrap(), 0);

        let next = state.apply(Transaction { doc_changed: false, ..Default::default() }, None).unwrap();
        assert_eq!(next.field(&counter).unwrap(), 0);
        assert_eq!(next.facet(&size_facet).unwrap(), 0);
    }

    /// S4 — mixed static and dynamic providers combine into one list, recomputed when the
    /// dynamic provider's dependency changes.
    #[test]
    fn mixed_static_and_dynamic_providers() {
        let list_facet = define_list_facet::<u32>();
        let counter: StateField<u32> = StateField::define(FieldSpec::new(
            |_state| Ok(0u32),
            |v, tr, _state| Ok(v + if tr.doc_changed { 1 } else { 0 }),
        ).compare(|a, b| a == b));
        let counter_for_provider = counter.clone();
        let dynamic = computed_facet(&list_facet, &[Dep::Field(counter.id())], move |state| {
            state.field(&counter_for_provider)
        })
        .unwrap();
        let roots = [list_facet.of(1), dynamic, counter.clone().into()];
        let config = Rc::new(resolve(&roots, None).unwrap());
        let state = EditorState::create(config).unwrap();
        assert_eq!(state.facet(&list_facet).unwrap(), vec![1, 0]);

        let next = state.apply(Transaction { doc_changed: true, ..Default::default() }, None).unwrap();
        assert_eq!(next.field(&counter).unwrap(), 1);
        assert_eq!(next.facet(&list_facet).unwrap(), vec![1, 1]);
    }

    /// S5 — two fields whose `create` functions each read the other's current value form a
    /// cycle, caught the first time evaluation re-enters a slot already being computed.
    #[test]
    fn cycle_detection() {
        use std::cell::RefCell;

        // `b`'s id isn't known until it's defined, but `a`'s create closure needs to name
        // it; thread it through a cell populated right after `b` is defined.
        let b_cell: Rc<RefCell<Option<StateField<u32>>>> = Rc::new(RefCell::new(None));
        let b_cell_for_a = b_cell.clone();
        let a: StateField<u32> = StateField::define(FieldSpec::new(
            move |state| {
                let b = b_cell_for_a.borrow().clone().expect("b defined before a is evaluated");
                state.field(&b)
            },
            |v, _tr, _state| Ok(*v),
        ));
        let a_for_b = a.clone();
        let b: StateField<u32> = StateField::define(FieldSpec::new(
            move |state| state.field(&a_for_b),
            |v, _tr, _state| Ok(*v),
        ));
        *b_cell.borrow_mut() = Some(b.clone());

        let roots = [a.into(), b.into()];
        let config = Rc::new(resolve(&roots, None).unwrap());
        let err = EditorState::create(config).unwrap_err();
        assert!(matches!(err, ExtError::CyclicDependency { .. }));
    }

    /// S6 — reconfiguring with the same static providers reuses the prior value instance
    /// (demonstrated via `Rc` pointer identity, since the combined output is `Rc`-wrapped;
    /// `compare_output` compares contents, since two separate `combine` calls never produce
    /// the same `Rc` allocation on their own).
    #[test]
    fn reuse_across_reconfigure() {
        let themes = define_facet_with(
            FacetSpec::<String, Rc<Vec<String>>>::new(|inputs| Rc::new(inputs.to_vec()))
                .compare_output(|a, b| a.as_ref() == b.as_ref()),
        );
        let roots = [themes.of("a".to_string())];
        let config = Rc::new(resolve(&roots, None).unwrap());
        let state = EditorState::create(config).unwrap();
        let first = state.facet(&themes).unwrap();

        let next = state.apply(Transaction { reconfigured: true, ..Default::default() }, Some(&roots)).unwrap();
        let second = next.facet(&themes).unwrap();
        assert!(Rc::ptr_eq(&first, &second));
    }
}
