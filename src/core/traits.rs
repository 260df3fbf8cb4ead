//! Core evaluation traits for minim.

use bitflags::bitflags;

use crate::core::element::Element;
use crate::error::Result;

bitflags! {
    /// Which evaluation functions a potential provides.
    ///
    /// Exactly one evaluation mode is active per potential: whole-vector
    /// (`ENERGY | GRADIENT` or `ENERGY_GRADIENT`) or per-element (`ELEMENT`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u8 {
        const ENERGY = 1;
        const GRADIENT = 1 << 1;
        const ENERGY_GRADIENT = 1 << 2;
        const ELEMENT = 1 << 3;
        const SERIAL = Self::ENERGY.bits() | Self::GRADIENT.bits() | Self::ENERGY_GRADIENT.bits();
    }
}

/// Per-element energy and gradient.
pub trait ElementEnergyGradient: Send + Sync {
    /// Accumulate the contribution of `el` into `e` and `g`.
    ///
    /// Both outputs are optional and additive: implementations add to what is
    /// already there and never touch an output that was not requested.
    /// `el.idof` holds positions into `coords`; implementations must not assume
    /// anything about their numeric values beyond equality.
    fn element_energy_gradient(
        &self,
        coords: &[f64],
        el: &Element,
        e: Option<&mut f64>,
        g: Option<&mut [f64]>,
    ) -> Result<()>;

    /// Reject an element this evaluator cannot handle, without evaluating it.
    ///
    /// Called on every rank over the full element list before a state is
    /// built, so that a malformed element fails everywhere instead of only on
    /// the rank that owns it.
    fn check(&self, _el: &Element) -> Result<()> {
        Ok(())
    }
}

impl<F> ElementEnergyGradient for F
where
    F: Fn(&[f64], &Element, Option<&mut f64>, Option<&mut [f64]>) -> Result<()> + Send + Sync,
{
    fn element_energy_gradient(
        &self,
        coords: &[f64],
        el: &Element,
        e: Option<&mut f64>,
        g: Option<&mut [f64]>,
    ) -> Result<()> {
        self(coords, el, e, g)
    }
}
