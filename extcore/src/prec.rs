//! Precedence levels used to order facet providers and field attachments.

use crate::ext::Extension;

/// The four precedence levels an extension can be wrapped in. Lower variants win: all
/// `Override` contributions precede all `Extend` contributions, and so on.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(u8)]
pub enum Prec {
    Override = 0,
    Extend = 1,
    Default = 2,
    Fallback = 3,
}

impl Prec {
    pub(crate) const COUNT: usize = 4;

    /// Wraps `ext` so the flattener places it in this precedence's bucket.
    pub fn set(self, ext: impl Into<Extension>) -> Extension {
        Extension::Prec(Box::new(ext.into()), self)
    }
}

impl Default for Prec {
    fn default() -> Self {
        Prec::Default
    }
}
