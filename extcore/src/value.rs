//! Type-erased, clonable slot values.
//!
//! Facet inputs/outputs and field values are statically typed at the call site (`Facet<I,
//! O>`, `StateField<V>`) but the resolved [`crate::config::Configuration`] stores them in a
//! single flat table alongside values from every other facet and field. `ErasedValue` is the
//! vtable that lets the evaluator clone and downcast a slot's value without knowing its
//! concrete type ahead of time.

use std::any::Any;

pub(crate) trait ErasedValue {
    fn clone_value(&self) -> Box<dyn ErasedValue>;
    fn as_any(&self) -> &dyn Any;
}

impl<T: Clone + 'static> ErasedValue for T {
    fn clone_value(&self) -> Box<dyn ErasedValue> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl dyn ErasedValue {
    pub(crate) fn downcast_ref<T: 'static>(&self) -> &T {
        self.as_any()
            .downcast_ref::<T>()
            .expect("slot value type mismatch: facet/field used with an inconsistent type")
    }
}
