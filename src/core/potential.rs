//! Potentials: whole-vector or per-element energy evaluation.
//!
//! A [`Potential`] carries exactly one active evaluation mode, fixed at
//! construction:
//!
//! - whole-vector: separate `energy`/`gradient` functions, or one combined
//!   `energy_gradient` function, applied to the fully assembled coordinate
//!   vector. Used for potentials with non-local coupling.
//! - element: an [`ElementEnergyGradient`] evaluator plus the element list it
//!   is applied to. The [`State`] distributes the elements across ranks.
//!
//! Calling an accessor of the inactive mode fails with
//! [`MinimError::NotDefined`].

use std::fmt;
use std::sync::Arc;

use crate::core::element::{elements_from_parts, Element};
use crate::core::state::State;
use crate::core::traits::{Capabilities, ElementEnergyGradient};
use crate::error::{MinimError, Result};
use crate::parallel::UniverseComm;

pub type EnergyFn = Box<dyn Fn(&[f64]) -> f64 + Send + Sync>;
pub type GradientFn = Box<dyn Fn(&[f64]) -> Vec<f64> + Send + Sync>;
/// Writes (not accumulates) the requested outputs.
pub type EnergyGradientFn = Box<dyn Fn(&[f64], Option<&mut f64>, Option<&mut [f64]>) + Send + Sync>;

enum Evaluator {
    Split { energy: EnergyFn, gradient: GradientFn },
    Combined(EnergyGradientFn),
    Element(Box<dyn ElementEnergyGradient>),
}

pub struct Potential {
    evaluator: Evaluator,
    elements: Vec<Element>,
}

impl fmt::Debug for Potential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Potential")
            .field("capabilities", &self.capabilities())
            .field("elements", &self.elements.len())
            .finish()
    }
}

impl Potential {
    /// Whole-vector potential from separate energy and gradient functions.
    pub fn new<E, G>(energy: E, gradient: G) -> Self
    where
        E: Fn(&[f64]) -> f64 + Send + Sync + 'static,
        G: Fn(&[f64]) -> Vec<f64> + Send + Sync + 'static,
    {
        Potential {
            evaluator: Evaluator::Split { energy: Box::new(energy), gradient: Box::new(gradient) },
            elements: Vec::new(),
        }
    }

    /// Whole-vector potential from a combined energy+gradient function.
    pub fn with_energy_gradient<F>(energy_gradient: F) -> Self
    where
        F: Fn(&[f64], Option<&mut f64>, Option<&mut [f64]>) + Send + Sync + 'static,
    {
        Potential { evaluator: Evaluator::Combined(Box::new(energy_gradient)), elements: Vec::new() }
    }

    /// Element-mode potential.
    pub fn with_elements<M>(model: M, elements: Vec<Element>) -> Self
    where
        M: ElementEnergyGradient + 'static,
    {
        let mut potential = Potential { evaluator: Evaluator::Element(Box::new(model)), elements: Vec::new() };
        potential.set_elements(elements);
        potential
    }

    /// Element-mode potential from a closure.
    pub fn with_element_fn<F>(f: F, elements: Vec<Element>) -> Self
    where
        F: Fn(&[f64], &Element, Option<&mut f64>, Option<&mut [f64]>) -> Result<()> + Send + Sync + 'static,
    {
        Self::with_elements(f, elements)
    }

    pub fn capabilities(&self) -> Capabilities {
        match self.evaluator {
            Evaluator::Split { .. } => Capabilities::ENERGY | Capabilities::GRADIENT,
            Evaluator::Combined(_) => Capabilities::ENERGY_GRADIENT,
            Evaluator::Element(_) => Capabilities::ELEMENT,
        }
    }

    pub fn serial_def(&self) -> bool {
        self.capabilities().intersects(Capabilities::SERIAL)
    }

    pub fn parallel_def(&self) -> bool {
        self.capabilities().contains(Capabilities::ELEMENT)
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Replace the element list, renumbering ids in order.
    pub fn set_elements(&mut self, elements: Vec<Element>) -> &mut Self {
        self.elements = elements;
        for (id, el) in self.elements.iter_mut().enumerate() {
            el.id = id;
        }
        self
    }

    /// One type-0 element without parameters per DOF list.
    pub fn set_elements_from_idofs(&mut self, idofs: Vec<Vec<usize>>) -> &mut Self {
        let elements = idofs.into_iter().map(|idof| Element::new(0, idof, Vec::new())).collect();
        self.set_elements(elements)
    }

    pub fn set_elements_from_parts(
        &mut self,
        idofs: Vec<Vec<usize>>,
        kinds: Vec<usize>,
        parameters: Vec<Vec<f64>>,
    ) -> Result<&mut Self> {
        let elements = elements_from_parts(idofs, kinds, parameters)?;
        Ok(self.set_elements(elements))
    }

    pub fn energy(&self, coords: &[f64]) -> Result<f64> {
        match &self.evaluator {
            Evaluator::Split { energy, .. } => Ok(energy(coords)),
            Evaluator::Combined(energy_gradient) => {
                let mut e = 0.0;
                energy_gradient(coords, Some(&mut e), None);
                Ok(e)
            }
            Evaluator::Element(_) => Err(MinimError::NotDefined("energy")),
        }
    }

    pub fn gradient(&self, coords: &[f64]) -> Result<Vec<f64>> {
        match &self.evaluator {
            Evaluator::Split { gradient, .. } => {
                let g = gradient(coords);
                if g.len() != coords.len() {
                    return Err(MinimError::SizeMismatch {
                        what: "gradient",
                        expected: coords.len(),
                        got: g.len(),
                    });
                }
                Ok(g)
            }
            Evaluator::Combined(energy_gradient) => {
                let mut g = vec![0.0; coords.len()];
                energy_gradient(coords, None, Some(&mut g));
                Ok(g)
            }
            Evaluator::Element(_) => Err(MinimError::NotDefined("gradient")),
        }
    }

    pub fn energy_gradient(&self, coords: &[f64], e: Option<&mut f64>, g: Option<&mut [f64]>) -> Result<()> {
        match &self.evaluator {
            Evaluator::Combined(energy_gradient) => {
                energy_gradient(coords, e, g);
                Ok(())
            }
            Evaluator::Split { energy, .. } => {
                if let Some(e) = e {
                    *e = energy(coords);
                }
                if let Some(g) = g {
                    let full = self.gradient(coords)?;
                    if g.len() != full.len() {
                        return Err(MinimError::SizeMismatch {
                            what: "gradient buffer",
                            expected: full.len(),
                            got: g.len(),
                        });
                    }
                    g.copy_from_slice(&full);
                }
                Ok(())
            }
            Evaluator::Element(_) => Err(MinimError::NotDefined("energy+gradient")),
        }
    }

    pub fn element_energy_gradient(
        &self,
        coords: &[f64],
        el: &Element,
        e: Option<&mut f64>,
        g: Option<&mut [f64]>,
    ) -> Result<()> {
        match &self.evaluator {
            Evaluator::Element(model) => model.element_energy_gradient(coords, el, e, g),
            _ => Err(MinimError::NotDefined("element energy+gradient")),
        }
    }

    /// Validate every element against the evaluator. A no-op for
    /// whole-vector potentials.
    pub fn check_elements(&self) -> Result<()> {
        match &self.evaluator {
            Evaluator::Element(model) => self.elements.iter().try_for_each(|el| model.check(el)),
            _ => Ok(()),
        }
    }

    /// Ready-to-minimise state over every rank of `comm`.
    pub fn new_state(self: &Arc<Self>, coords: &[f64], comm: UniverseComm) -> Result<State> {
        State::new(Arc::clone(self), coords, comm, None)
    }

    /// Same as [`Potential::new_state`] starting from zero coordinates.
    pub fn new_state_zeroed(self: &Arc<Self>, ndof: usize, comm: UniverseComm) -> Result<State> {
        self.new_state(&vec![0.0; ndof], comm)
    }

    /// State whose DOFs are owned only by `ranks`, in that order. The other
    /// ranks hold empty blocks but still take part in every collective.
    pub fn new_state_on_ranks(self: &Arc<Self>, coords: &[f64], comm: UniverseComm, ranks: &[usize]) -> Result<State> {
        State::new(Arc::clone(self), coords, comm, Some(ranks))
    }
}
