//! Bar-and-hinge model of thin elastic sheets.
//!
//! Element kinds:
//! - `0` bar: two particles (6 DOFs), parameters `[k, l0]`,
//!   `E = k (l - l0)^2`.
//! - `1` hinge: four particles (12 DOFs) forming two triangles that share
//!   the edge 2-3, parameters `[k, theta0]`, `E = k (1 + cos(theta + theta0))`
//!   where `theta` is the signed dihedral angle.

use crate::core::{Element, ElementEnergyGradient, Potential};
use crate::error::{MinimError, Result};
use crate::utils::vec::{cross3, dot3, norm3, point, sub3};

pub const BAR: usize = 0;
pub const HINGE: usize = 1;

#[derive(Debug, Clone, Copy, Default)]
pub struct BarAndHinge;

impl BarAndHinge {
    /// Bar between particles `i` and `j`.
    pub fn bar(i: usize, j: usize, k: f64, l0: f64) -> Element {
        Element::new(BAR, [i, j].iter().flat_map(|&p| particle(p)).collect(), vec![k, l0])
    }

    /// Hinge over particles `[p1, p2, p3, p4]`, hinge axis `p2 -> p3`.
    pub fn hinge(particles: [usize; 4], k: f64, theta0: f64) -> Element {
        Element::new(HINGE, particles.iter().flat_map(|&p| particle(p)).collect(), vec![k, theta0])
    }

    pub fn potential(elements: Vec<Element>) -> Potential {
        Potential::with_elements(BarAndHinge, elements)
    }

    fn stretching(coords: &[f64], el: &Element, e: Option<&mut f64>, g: Option<&mut [f64]>) -> Result<()> {
        el.expect_dofs(6)?;
        el.expect_parameters(2)?;
        let (k, l0) = (el.parameters[0], el.parameters[1]);
        let dx = sub3(point(coords, &el.idof, 0), point(coords, &el.idof, 3));
        let l = norm3(dx);
        let dl = l - l0;

        if let Some(e) = e {
            *e += k * dl * dl;
        }
        if let Some(g) = g {
            let factor = 2.0 * k * dl / l;
            for c in 0..3 {
                g[el.idof[c]] += factor * dx[c];
                g[el.idof[c + 3]] -= factor * dx[c];
            }
        }
        Ok(())
    }

    fn bending(coords: &[f64], el: &Element, e: Option<&mut f64>, g: Option<&mut [f64]>) -> Result<()> {
        el.expect_dofs(12)?;
        el.expect_parameters(2)?;
        let (k, theta0) = (el.parameters[0], el.parameters[1]);
        let x1 = point(coords, &el.idof, 0);
        let x2 = point(coords, &el.idof, 3);
        let x3 = point(coords, &el.idof, 6);
        let x4 = point(coords, &el.idof, 9);

        let b1 = sub3(x2, x1);
        let b2 = sub3(x3, x2);
        let b3 = sub3(x4, x3);
        let b2m = norm3(b2);

        let n1 = cross3(b1, b2);
        let n2 = cross3(b2, b3);
        let n1sq = dot3(n1, n1);
        let n2sq = dot3(n2, n2);
        let n12m = (n1sq * n2sq).sqrt();

        let c = dot3(n1, n2) / n12m;
        let s = b2m / n12m * dot3(n1, b3);
        let (s0, c0) = theta0.sin_cos();

        if let Some(e) = e {
            // cos(theta + theta0) by the sum formula
            *e += k * (1.0 + c * c0 - s * s0);
        }
        if let Some(g) = g {
            let factor = -k * (s * c0 + c * s0);
            // normals scaled to 1 / triangle height
            let n1h = n1.map(|v| v * b2m / n1sq);
            let n2h = n2.map(|v| v * b2m / n2sq);
            // where each outer particle projects onto the hinge, 0.5 at its midpoint
            let skew1 = -dot3(b1, b2) / (b2m * b2m);
            let skew2 = -dot3(b3, b2) / (b2m * b2m);
            for d in 0..3 {
                g[el.idof[d]] -= factor * n1h[d];
                g[el.idof[3 + d]] += factor * ((1.0 - skew1) * n1h[d] - skew2 * n2h[d]);
                g[el.idof[6 + d]] -= factor * ((1.0 - skew2) * n2h[d] - skew1 * n1h[d]);
                g[el.idof[9 + d]] += factor * n2h[d];
            }
        }
        Ok(())
    }
}

fn particle(p: usize) -> [usize; 3] {
    [3 * p, 3 * p + 1, 3 * p + 2]
}

impl ElementEnergyGradient for BarAndHinge {
    fn element_energy_gradient(
        &self,
        coords: &[f64],
        el: &Element,
        e: Option<&mut f64>,
        g: Option<&mut [f64]>,
    ) -> Result<()> {
        match el.kind {
            BAR => Self::stretching(coords, el, e, g),
            HINGE => Self::bending(coords, el, e, g),
            kind => Err(MinimError::UnknownElementType(kind)),
        }
    }

    fn check(&self, el: &Element) -> Result<()> {
        let (ndof, nparam) = match el.kind {
            BAR => (6, 2),
            HINGE => (12, 2),
            kind => return Err(MinimError::UnknownElementType(kind)),
        };
        el.expect_dofs(ndof)?;
        el.expect_parameters(nparam)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::potentials::testing::assert_gradient_matches;

    #[test]
    fn bar_at_rest_length_is_free() {
        let el = BarAndHinge::bar(0, 1, 3.0, 2.0);
        let coords = [0.0, 0.0, 0.0, 0.0, 2.0, 0.0];
        let mut e = 0.0;
        BarAndHinge.element_energy_gradient(&coords, &el, Some(&mut e), None).unwrap();
        assert_abs_diff_eq!(e, 0.0);
    }

    #[test]
    fn bar_gradient_matches_finite_differences() {
        let coords = [0.1, 0.2, -0.3, 1.4, -0.5, 0.6];
        assert_gradient_matches(&BarAndHinge, &coords, &[BarAndHinge::bar(0, 1, 2.5, 1.0)], 1e-6);
    }

    #[test]
    fn flat_trans_hinge_has_no_energy() {
        // trans configuration: theta = pi, so E = k (1 + cos(pi)) = 0
        let coords = [-1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 1.0];
        let el = BarAndHinge::hinge([0, 1, 2, 3], 1.5, 0.0);
        let mut e = 0.0;
        BarAndHinge.element_energy_gradient(&coords, &el, Some(&mut e), None).unwrap();
        assert_abs_diff_eq!(e, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn hinge_gradient_matches_finite_differences() {
        let coords = [-1.0, 0.2, 0.1, 0.05, -0.1, 0.0, 0.1, 0.05, 1.1, 0.8, 0.6, 1.2];
        let elements = [BarAndHinge::hinge([0, 1, 2, 3], 2.0, 0.3)];
        assert_gradient_matches(&BarAndHinge, &coords, &elements, 1e-5);
    }

    #[test]
    fn unknown_kind() {
        let el = Element::new(7, vec![0], vec![]);
        assert!(matches!(
            BarAndHinge.element_energy_gradient(&[0.0], &el, None, None),
            Err(MinimError::UnknownElementType(7))
        ));
    }
    #[test]
    fn check_rejects_without_evaluating() {
        assert!(matches!(BarAndHinge.check(&Element::new(7, vec![0], vec![])), Err(MinimError::UnknownElementType(7))));
        let short_bar = Element::new(BAR, vec![0, 1, 2, 3, 4, 5], vec![1.0]);
        assert!(BarAndHinge.check(&short_bar).is_err());
        assert!(BarAndHinge.check(&BarAndHinge::hinge([0, 1, 2, 3], 2.0, 0.3)).is_ok());
    }
}
