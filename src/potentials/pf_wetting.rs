//! Phase-field model of two fluids on a periodic grid with solid walls.
//!
//! Each fluid node carries an order parameter `phi` (`+1` in one fluid, `-1`
//! in the other). Solid nodes carry a DOF that no element touches. Nodes next
//! to a wall get fractional volume and a surface area from the pattern of
//! their 26 neighbours.
//!
//! Element kinds, all centred on node `i`:
//! - `0` bulk: DOFs `[i, x-, y-, z-, z+, y+, x+]`, parameters `[volume]`.
//!   A solid face neighbour is stored as `i` itself; the evaluator reads an
//!   entry equal to the first one as "no neighbour".
//! - `1` wetting: DOFs `[i]`, parameters `[area, sqrt(2) cos(theta)]`.
//! - `2` body force: DOFs `[i]`, parameters
//!   `[volume, |f1|, |f2|, f1 direction (3), f2 direction (3), x, y, z]`.

use crate::core::{Element, ElementEnergyGradient, Potential};
use crate::error::{MinimError, Result};
use crate::utils::vec::{dot3, norm3};

pub const BULK: usize = 0;
pub const WETTING: usize = 1;
pub const FORCE: usize = 2;

/// Offsets of the 26 neighbours: 6 faces, 12 edges, 8 corners.
const OFFSETS: [[i64; 3]; 26] = [
    [-1, 0, 0],
    [0, -1, 0],
    [0, 0, -1],
    [0, 0, 1],
    [0, 1, 0],
    [1, 0, 0],
    [-1, -1, 0],
    [-1, 0, -1],
    [-1, 0, 1],
    [-1, 1, 0],
    [0, -1, -1],
    [0, -1, 1],
    [0, 1, -1],
    [0, 1, 1],
    [1, -1, 0],
    [1, 0, -1],
    [1, 0, 1],
    [1, 1, 0],
    [-1, -1, -1],
    [-1, -1, 1],
    [-1, 1, -1],
    [-1, 1, 1],
    [1, -1, -1],
    [1, -1, 1],
    [1, 1, -1],
    [1, 1, 1],
];

#[derive(Debug, Clone)]
pub struct PfWetting {
    grid_size: [usize; 3],
    /// Interface width.
    pub epsilon: f64,
    solid: Vec<bool>,
    /// Contact angle per node in radians; empty for neutral walls.
    contact_angle: Vec<f64>,
    force1: [f64; 3],
    force2: [f64; 3],
}

impl PfWetting {
    pub fn new(grid_size: [usize; 3]) -> Self {
        let n = grid_size.iter().product();
        PfWetting {
            grid_size,
            epsilon: 1.0,
            solid: vec![false; n],
            contact_angle: Vec::new(),
            force1: [0.0; 3],
            force2: [0.0; 3],
        }
    }

    pub fn grid_size(&self) -> [usize; 3] {
        self.grid_size
    }

    pub fn n_grid(&self) -> usize {
        self.solid.len()
    }

    pub fn set_epsilon(&mut self, epsilon: f64) -> &mut Self {
        self.epsilon = epsilon;
        self
    }

    pub fn set_solid(&mut self, solid: Vec<bool>) -> Result<&mut Self> {
        self.check_len("solid", solid.len())?;
        self.solid = solid;
        Ok(self)
    }

    pub fn set_solid_fn<F: Fn(usize, usize, usize) -> bool>(&mut self, f: F) -> &mut Self {
        self.solid = (0..self.n_grid())
            .map(|i| {
                let [x, y, z] = self.coord(i);
                f(x, y, z)
            })
            .collect();
        self
    }

    pub fn set_contact_angle(&mut self, contact_angle: Vec<f64>) -> Result<&mut Self> {
        self.check_len("contact angle", contact_angle.len())?;
        self.contact_angle = contact_angle;
        Ok(self)
    }

    pub fn set_contact_angle_fn<F: Fn(usize, usize, usize) -> f64>(&mut self, f: F) -> &mut Self {
        self.contact_angle = (0..self.n_grid())
            .map(|i| {
                let [x, y, z] = self.coord(i);
                f(x, y, z)
            })
            .collect();
        self
    }

    /// Body forces per unit volume acting on fluid 1 (`phi = 1`) and fluid 2.
    pub fn set_force(&mut self, force1: [f64; 3], force2: [f64; 3]) -> &mut Self {
        self.force1 = force1;
        self.force2 = force2;
        self
    }

    fn check_len(&self, what: &'static str, got: usize) -> Result<()> {
        if got != self.n_grid() {
            return Err(MinimError::SizeMismatch { what, expected: self.n_grid(), got });
        }
        Ok(())
    }

    pub fn coord(&self, i: usize) -> [usize; 3] {
        let [_, ny, nz] = self.grid_size;
        [i / (ny * nz), (i / nz) % ny, i % nz]
    }

    pub fn index(&self, [x, y, z]: [usize; 3]) -> usize {
        let [_, ny, nz] = self.grid_size;
        (x * ny + y) * nz + z
    }

    /// Indices of the 26 neighbours of node `i`, wrapping periodically.
    pub fn neighbours(&self, i: usize) -> [usize; 26] {
        let c = self.coord(i);
        OFFSETS.map(|d| {
            let mut n = [0; 3];
            for a in 0..3 {
                n[a] = (c[a] as i64 + d[a]).rem_euclid(self.grid_size[a] as i64) as usize;
            }
            self.index(n)
        })
    }

    /// Wall classification of node `i`: `None` for solid, `Some(0)` for bulk
    /// fluid and `Some(1..=7)` for fluid next to a wall. Type `t` has fluid
    /// volume `t / 8`.
    pub fn node_type(&self, i: usize) -> Result<Option<u8>> {
        if self.solid[i] {
            return Ok(None);
        }
        let nei = self.neighbours(i).map(|j| self.solid[j]);
        let count = |range: std::ops::Range<usize>| nei[range].iter().filter(|&&s| s).count();
        let (faces, edges, corners) = (count(0..6), count(6..18), count(18..26));

        if faces + edges + corners == 0 {
            return Ok(Some(0));
        }
        let t = match faces {
            0 if edges == 0 && corners == 1 => Some(1),
            0 if edges == 1 && corners <= 2 => Some(2),
            0 if edges == 2 && corners <= 3 => Some(3),
            0 => None,
            1 => {
                let any = |idx: &[usize]| idx.iter().any(|&k| nei[k]);
                let one_side = ((nei[0] || nei[5]) && !any(&[10, 11, 12, 13]))
                    || ((nei[1] || nei[4]) && !any(&[7, 8, 15, 16]))
                    || ((nei[2] || nei[3]) && !any(&[6, 9, 14, 17]));
                Some(if one_side { 4 } else { 5 })
            }
            2 => Some(6),
            3 => Some(7),
            _ => None,
        };
        t.map(Some).ok_or_else(|| {
            MinimError::Config(format!("node {:?} has an undefined wall configuration", self.coord(i)))
        })
    }

    /// Fluid volume and wetted area of a node of the given type.
    fn weights(node_type: u8) -> (f64, f64) {
        match node_type {
            0 => (1.0, 0.0),
            t => {
                let area = match t {
                    2 | 4 | 6 => 1.0,
                    1 | 7 => 0.75,
                    _ => 1.25,
                };
                (f64::from(t) / 8.0, area)
            }
        }
    }

    /// Elements for every fluid node, in node order.
    pub fn elements(&self) -> Result<Vec<Element>> {
        let (f1, f2) = (norm3(self.force1), norm3(self.force2));
        let unit = |f: [f64; 3], mag: f64| if mag > 0.0 { f.map(|v| v / mag) } else { [0.0; 3] };
        let (n1, n2) = (unit(self.force1, f1), unit(self.force2, f2));

        let mut elements = Vec::new();
        for i in 0..self.n_grid() {
            let Some(node_type) = self.node_type(i)? else { continue };
            let (volume, area) = Self::weights(node_type);

            let nei = self.neighbours(i);
            let mut idof = vec![i];
            idof.extend(nei[..6].iter().map(|&j| if self.solid[j] { i } else { j }));
            elements.push(Element::new(BULK, idof, vec![volume]));

            if node_type > 0 && !self.contact_angle.is_empty() {
                let w = 2f64.sqrt() * self.contact_angle[i].cos();
                if w != 0.0 {
                    elements.push(Element::new(WETTING, vec![i], vec![area, w]));
                }
            }

            if f1 > 0.0 || f2 > 0.0 {
                let [x, y, z] = self.coord(i);
                let mut params = vec![volume, f1, f2];
                params.extend(n1);
                params.extend(n2);
                params.extend([x as f64, y as f64, z as f64]);
                elements.push(Element::new(FORCE, vec![i], params));
            }
        }
        Ok(elements)
    }

    /// Element-mode potential over the whole grid; its DOF vector has one
    /// entry per node, solid nodes included.
    pub fn potential(self) -> Result<Potential> {
        let elements = self.elements()?;
        Ok(Potential::with_elements(self, elements))
    }

    fn bulk(&self, coords: &[f64], el: &Element, e: Option<&mut f64>, g: Option<&mut [f64]>) -> Result<()> {
        el.expect_dofs(7)?;
        el.expect_parameters(1)?;
        let vol = el.parameters[0];
        let eps = self.epsilon;
        let centre = el.idof[0];
        let phi = coords[centre];
        let present = |k: usize| el.idof[k] != centre;
        let diff = |k: usize| if present(k) { phi - coords[el.idof[k]] } else { 0.0 };

        let mut energy = 0.25 / eps * (phi.powi(4) - 2.0 * phi.powi(2) + 1.0) * vol;
        let mut g = g;
        if let Some(g) = g.as_deref_mut() {
            g[centre] += 1.0 / eps * (phi.powi(3) - phi) * vol;
        }
        for (m, p) in [(1, 6), (2, 5), (3, 4)] {
            let nf = usize::from(present(m)) + usize::from(present(p));
            if nf == 0 {
                continue;
            }
            let w = 0.5 * eps * vol / nf as f64;
            let (dm, dp) = (diff(m), diff(p));
            energy += w * (dm * dm + dp * dp);
            if let Some(g) = g.as_deref_mut() {
                g[centre] += 2.0 * w * (dm + dp);
                if present(m) {
                    g[el.idof[m]] -= 2.0 * w * dm;
                }
                if present(p) {
                    g[el.idof[p]] -= 2.0 * w * dp;
                }
            }
        }
        if let Some(e) = e {
            *e += energy;
        }
        Ok(())
    }
}

impl ElementEnergyGradient for PfWetting {
    fn element_energy_gradient(
        &self,
        coords: &[f64],
        el: &Element,
        e: Option<&mut f64>,
        g: Option<&mut [f64]>,
    ) -> Result<()> {
        match el.kind {
            BULK => self.bulk(coords, el, e, g),
            WETTING => {
                el.expect_dofs(1)?;
                el.expect_parameters(2)?;
                let (area, w) = (el.parameters[0], el.parameters[1]);
                let phi = coords[el.idof[0]];
                if let Some(e) = e {
                    *e += w / 6.0 * (phi.powi(3) - 3.0 * phi - 2.0) * area;
                }
                if let Some(g) = g {
                    g[el.idof[0]] += w * 0.5 * (phi * phi - 1.0) * area;
                }
                Ok(())
            }
            FORCE => {
                el.expect_dofs(1)?;
                el.expect_parameters(12)?;
                let p = &el.parameters;
                let (vol, f1, f2) = (p[0], p[1], p[2]);
                let pos = [p[9], p[10], p[11]];
                let h1 = -dot3(pos, [p[3], p[4], p[5]]);
                let h2 = -dot3(pos, [p[6], p[7], p[8]]);
                let phi = coords[el.idof[0]];
                if let Some(e) = e {
                    *e += 0.5 * ((1.0 + phi) * f1 * h1 + (1.0 - phi) * f2 * h2) * vol;
                }
                if let Some(g) = g {
                    g[el.idof[0]] += 0.5 * (f1 * h1 - f2 * h2) * vol;
                }
                Ok(())
            }
            kind => Err(MinimError::UnknownElementType(kind)),
        }
    }

    fn check(&self, el: &Element) -> Result<()> {
        let (ndof, nparam) = match el.kind {
            BULK => (7, 1),
            WETTING => (1, 2),
            FORCE => (1, 12),
            kind => return Err(MinimError::UnknownElementType(kind)),
        };
        el.expect_dofs(ndof)?;
        el.expect_parameters(nparam)
    }
}
