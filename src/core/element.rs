//! Energy elements and the per-rank element sets.

use crate::error::{MinimError, Result};

/// A local energy contribution over a small fixed set of degrees of freedom.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Position of the element in its potential's element list.
    pub id: usize,
    /// Type tag interpreted by the evaluator.
    pub kind: usize,
    pub idof: Vec<usize>,
    pub parameters: Vec<f64>,
}

impl Element {
    pub fn new(kind: usize, idof: Vec<usize>, parameters: Vec<f64>) -> Self {
        Element { id: 0, kind, idof, parameters }
    }

    /// Fail with `ElementShape` unless the element touches exactly `n` DOFs.
    pub fn expect_dofs(&self, n: usize) -> Result<()> {
        if self.idof.len() != n {
            return Err(MinimError::ElementShape {
                kind: self.kind,
                expected: n,
                got: self.idof.len(),
            });
        }
        Ok(())
    }

    /// Fail with `Config` unless the element carries at least `n` parameters.
    pub fn expect_parameters(&self, n: usize) -> Result<()> {
        if self.parameters.len() < n {
            return Err(MinimError::Config(format!(
                "element {} of type {} needs {} parameters, has {}",
                self.id,
                self.kind,
                n,
                self.parameters.len()
            )));
        }
        Ok(())
    }
}

/// Build element lists from parallel arrays, numbering them in order.
pub fn elements_from_parts(
    idofs: Vec<Vec<usize>>,
    kinds: Vec<usize>,
    parameters: Vec<Vec<f64>>,
) -> Result<Vec<Element>> {
    if kinds.len() != idofs.len() {
        return Err(MinimError::SizeMismatch {
            what: "element types",
            expected: idofs.len(),
            got: kinds.len(),
        });
    }
    if parameters.len() != idofs.len() {
        return Err(MinimError::SizeMismatch {
            what: "element parameters",
            expected: idofs.len(),
            got: parameters.len(),
        });
    }
    Ok(idofs
        .into_iter()
        .zip(kinds)
        .zip(parameters)
        .enumerate()
        .map(|(id, ((idof, kind), parameters))| Element { id, kind, idof, parameters })
        .collect())
}

/// The elements one rank evaluates.
///
/// Produced by the [`Communicator`](crate::communicator::Communicator): `idof`
/// entries are rewritten into the rank-local layout (owned block first, then
/// halo values) so every index lies in `[0, nlocal)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    /// Size of the global coordinate vector.
    pub ndof: usize,
    /// Length of the rank-local coordinate vector.
    pub nlocal: usize,
    /// Elements owned by this rank; they contribute energy and gradient.
    pub elements: Vec<Element>,
    /// Read-only copies of elements owned elsewhere that touch this rank's
    /// block; they contribute gradient only.
    pub elements_halo: Vec<Element>,
}
