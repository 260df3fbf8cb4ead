//! 12-6 Lennard-Jones between particles in three dimensions.

use crate::core::{Element, ElementEnergyGradient, Potential};
use crate::error::{MinimError, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lj3d {
    pub sigma: f64,
    pub epsilon: f64,
}

impl Default for Lj3d {
    fn default() -> Self {
        Lj3d { sigma: 1.0, epsilon: 1.0 }
    }
}

impl Lj3d {
    pub fn new(sigma: f64, epsilon: f64) -> Self {
        Lj3d { sigma, epsilon }
    }

    /// One element per particle pair for `ndof / 3` particles stored as
    /// consecutive `x, y, z` triples.
    pub fn elements(ndof: usize) -> Result<Vec<Element>> {
        if ndof % 3 != 0 {
            return Err(MinimError::Config(format!("{ndof} coordinates is not a multiple of 3")));
        }
        let n = ndof / 3;
        let mut elements = Vec::with_capacity(n * n.saturating_sub(1) / 2);
        for i in 0..n {
            for j in i + 1..n {
                elements.push(Element::new(0, vec![3 * i, 3 * i + 1, 3 * i + 2, 3 * j, 3 * j + 1, 3 * j + 2], vec![]));
            }
        }
        Ok(elements)
    }

    /// Element-mode potential over all pairs of `ndof / 3` particles.
    pub fn potential(self, ndof: usize) -> Result<Potential> {
        Ok(Potential::with_elements(self, Self::elements(ndof)?))
    }
}

impl ElementEnergyGradient for Lj3d {
    fn element_energy_gradient(
        &self,
        coords: &[f64],
        el: &Element,
        e: Option<&mut f64>,
        g: Option<&mut [f64]>,
    ) -> Result<()> {
        self.check(el)?;
        let d = [
            coords[el.idof[0]] - coords[el.idof[3]],
            coords[el.idof[1]] - coords[el.idof[4]],
            coords[el.idof[2]] - coords[el.idof[5]],
        ];
        let r2 = d[0] * d[0] + d[1] * d[1] + d[2] * d[2];
        let lj6 = (self.sigma * self.sigma / r2).powi(3);

        if let Some(e) = e {
            *e += 4.0 * self.epsilon * (lj6 * lj6 - lj6);
        }
        if let Some(g) = g {
            let r = r2.sqrt();
            let dedr = -24.0 * self.epsilon * (2.0 * lj6 * lj6 - lj6) / r;
            for k in 0..3 {
                g[el.idof[k]] += d[k] / r * dedr;
                g[el.idof[k + 3]] -= d[k] / r * dedr;
            }
        }
        Ok(())
    }

    fn check(&self, el: &Element) -> Result<()> {
        if el.kind != 0 {
            return Err(MinimError::UnknownElementType(el.kind));
        }
        el.expect_dofs(6)
    }
}
