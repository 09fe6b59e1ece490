//! The minimal `EditorState`/`Transaction` collaborators: just enough document/selection
//! plumbing to drive and test the resolver and evaluator standalone.

use std::cell::RefCell;
use std::rc::Rc;

use crate::address::Address;
use crate::config::Configuration;
use crate::ext::Extension;
use crate::facet::Facet;
use crate::field::StateField;
use crate::value::ErasedValue;
use crate::ExtError;

#[derive(Clone, Copy, Default, Eq, PartialEq)]
pub(crate) struct SlotStatus(u8);

const COMPUTING: u8 = 0b001;
const COMPUTED: u8 = 0b010;
const CHANGED: u8 = 0b100;

impl SlotStatus {
    fn computing() -> SlotStatus {
        SlotStatus(COMPUTING)
    }

    fn computed(changed: bool) -> SlotStatus {
        SlotStatus(COMPUTED | if changed { CHANGED } else { 0 })
    }

    fn is_computed(self) -> bool {
        self.0 & COMPUTED != 0
    }

    fn is_computing(self) -> bool {
        self.0 & COMPUTING != 0
    }

    pub(crate) fn changed(self) -> bool {
        self.0 & CHANGED != 0
    }
}

/// The three change flags a transaction carries: `doc_changed`, `selection_set`,
/// `reconfigured`. The prior state a transaction is built against is not stored on
/// `Transaction` itself; it is the receiver of [`EditorState::apply`], which is exactly
/// where a transaction's start state would be consulted from, so threading it separately
/// avoids a self-referential `EditorState`/`Transaction` pair while preserving identical
/// observable behavior.
#[derive(Clone, Copy, Debug, Default)]
pub struct Transaction {
    pub doc_changed: bool,
    pub selection_set: bool,
    pub reconfigured: bool,
}

pub(crate) type TrFlags = Transaction;

/// A resolved, evaluated state: an address/static-value/slot table ([`Configuration`])
/// paired with a per-state value/status table and a link to the state it was built from.
pub struct EditorState {
    config: Rc<Configuration>,
    values: RefCell<Vec<Option<Box<dyn ErasedValue>>>>,
    status: RefCell<Vec<SlotStatus>>,
    prev: Option<Rc<EditorState>>,
    tr: Option<TrFlags>,
}

impl EditorState {
    /// Builds the initial state for `config`: every dynamic slot evaluator sees `tr =
    /// None`, meaning "initial population".
    pub fn create(config: Rc<Configuration>) -> Result<Rc<EditorState>, ExtError> {
        let n = config.dynamic_slot_count();
        let state = Rc::new(EditorState {
            config,
            values: RefCell::new((0..n).map(|_| None).collect()),
            status: RefCell::new(vec![SlotStatus::default(); n]),
            prev: None,
            tr: None,
        });
        state.ensure_all()?;
        Ok(state)
    }

    /// Produces the next state: allocates fresh `values`/`status` vectors and ensures every
    /// dynamic slot while `applying` conceptually points at `tr`. Passing `new_roots`
    /// reconfigures: a new [`Configuration`] is resolved (consulting `self` for static-value
    /// reuse and fields' prior addresses) and `tr.reconfigured` should be `true`.
    pub fn apply(
        self: &Rc<EditorState>,
        tr: Transaction,
        new_roots: Option<&[Extension]>,
    ) -> Result<Rc<EditorState>, ExtError> {
        let config = match new_roots {
            Some(roots) => Rc::new(crate::config::resolve(roots, Some(self.as_ref()))?),
            None => self.config.clone(),
        };
        let n = config.dynamic_slot_count();
        let state = Rc::new(EditorState {
            config,
            values: RefCell::new((0..n).map(|_| None).collect()),
            status: RefCell::new(vec![SlotStatus::default(); n]),
            prev: Some(self.clone()),
            tr: Some(tr),
        });
        state.ensure_all()?;
        Ok(state)
    }

    fn ensure_all(&self) -> Result<(), ExtError> {
        for idx in 0..self.config.dynamic_slot_count() {
            self.ensure_addr(Address::dynamic(idx))?;
        }
        Ok(())
    }

    pub(crate) fn prev(&self) -> Option<&Rc<EditorState>> {
        self.prev.as_ref()
    }

    pub(crate) fn tr(&self) -> Option<TrFlags> {
        self.tr
    }

    pub(crate) fn config(&self) -> &Configuration {
        &self.config
    }

    pub(crate) fn store(&self, idx: usize, value: Box<dyn ErasedValue>) {
        self.values.borrow_mut()[idx] = Some(value);
    }

    pub(crate) fn value_at_index(&self, idx: usize) -> Box<dyn ErasedValue> {
        self.values.borrow()[idx]
            .as_ref()
            .expect("dynamic slot read before it was evaluated")
            .clone_value()
    }

    pub(crate) fn value_at(&self, addr: Address) -> Box<dyn ErasedValue> {
        if addr.is_static() {
            self.config.static_values[addr.index()].clone_value()
        } else {
            self.value_at_index(addr.index())
        }
    }

    /// Forces the dynamic slot at `addr` to be computed if it has not been already,
    /// returning its status. Static addresses are always considered computed. Detects
    /// reentrant evaluation (a slot depending, directly or transitively, on itself) as
    /// [`ExtError::CyclicDependency`].
    pub(crate) fn ensure_addr(&self, addr: Address) -> Result<SlotStatus, ExtError> {
        if addr.is_static() {
            return Ok(SlotStatus::computed(false));
        }
        let idx = addr.index();
        {
            let status = self.status.borrow()[idx];
            if status.is_computed() {
                return Ok(status);
            }
            if status.is_computing() {
                tracing::warn!(addr = idx, "cyclic dependency detected");
                return Err(ExtError::CyclicDependency { addr: idx });
            }
        }
        self.status.borrow_mut()[idx] = SlotStatus::computing();
        let slot = self.config.slot(idx).clone();
        tracing::trace!(addr = idx, kind = slot.label(), "evaluating slot");
        let changed = slot.evaluate(self, idx)?;
        let status = SlotStatus::computed(changed);
        self.status.borrow_mut()[idx] = status;
        Ok(status)
    }

    /// Reads a field's current value, computing it (and anything it transitively depends
    /// on) on demand if needed.
    pub fn field<V: Clone + 'static>(&self, field: &StateField<V>) -> Result<V, ExtError> {
        let addr = self
            .config
            .address_of(field.id())
            .expect("field is not part of this configuration");
        self.ensure_addr(addr)?;
        Ok(self.value_at(addr).downcast_ref::<V>().clone())
    }

    /// Reads a facet's combined output, or its default if nothing in this configuration
    /// provides it.
    pub fn facet<I: Clone + 'static, O: Clone + 'static>(&self, facet: &Facet<I, O>) -> Result<O, ExtError> {
        match self.config.address_of(facet.id()) {
            None => Ok(facet.default()),
            Some(addr) => {
                self.ensure_addr(addr)?;
                Ok(self.value_at(addr).downcast_ref::<O>().clone())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::resolve;
    use crate::facet::define_facet;

    #[test]
    fn facet_with_no_address_returns_default() {
        let facet = define_facet::<u32, u32>(|inputs| inputs.first().copied().unwrap_or(4));
        let config = Rc::new(resolve(&[], None).unwrap());
        let state = EditorState::create(config).unwrap();
        assert_eq!(state.facet(&facet).unwrap(), 4);
    }
}
