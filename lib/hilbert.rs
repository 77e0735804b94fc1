//! Capabilities a concrete basis must provide to the operator engine.
//!
//! The engine itself never computes matrix elements or decides how operator
//! symbols combine; it only drives a pipeline over whatever a basis type
//! declares through [`OperatorBasis`]. Apart from matrix element generation,
//! every capability is optional and exposed as an `Option` of a trait object,
//! so that a missing capability can be detected before any check runs.

use indexmap::IndexMap;
use num_complex::Complex64 as C64;
use crate::{
    apply::CooElements,
    error::OpResult,
    terms::OpString,
};

/* Capabilities ***************************************************************/

/// Canonical ordering of operator strings.
pub trait CanonicalOrder {
    /// Reorder the symbols of `op` into a normal form such that physically
    /// equal terms compare equal.
    fn sort_opstr(&self, op: OpString) -> OpString;
}

/// Identity ordering, used only when a basis declares no canonical order and
/// nothing needs one.
#[derive(Copy, Clone, Debug, Default)]
pub struct Unordered;

impl CanonicalOrder for Unordered {
    fn sort_opstr(&self, op: OpString) -> OpString { op }
}

/// Hermitian conjugation of single terms.
pub trait HermitianConjugate {
    /// Return the term whose action is the conjugate-transpose of `op`'s.
    ///
    /// The result need not be canonically ordered.
    fn hc_opstr(&self, op: OpString) -> OpString;
}

/// Decomposition of composite symbols into elementary ladder and diagonal
/// symbols.
pub trait Decompose {
    /// Rewrite `op` as a weighted sum of terms built only from elementary
    /// symbols.
    fn expand_opstr(&self, op: &OpString) -> Vec<OpString>;

    /// Return `false` if `op` is guaranteed to vanish.
    fn non_zero(&self, op: &OpString) -> bool;

    /// Net particle number added by a single elementary symbol.
    ///
    /// Defaults to `+1` for `'+'`, `-1` for `'-'`, and zero otherwise.
    fn ladder_charge(&self, symbol: char) -> i32 {
        match symbol {
            '+' => 1,
            '-' => -1,
            _ => 0,
        }
    }
}

/// Result of testing a term list against one declared symmetry.
#[derive(Clone, Debug, PartialEq)]
pub enum SymmetryViolation {
    /// Terms that transform incorrectly, along with terms that would be needed
    /// to restore the symmetry.
    Pair {
        odd: Vec<OpString>,
        missing: Vec<OpString>,
    },
    /// Terms that would be needed to restore the symmetry.
    Missing(Vec<OpString>),
}

impl SymmetryViolation {
    /// Return `true` if no terms are reported.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Pair { odd, missing } => odd.is_empty() && missing.is_empty(),
            Self::Missing(missing) => missing.is_empty(),
        }
    }
}

/// Per-symmetry results for static and dynamic terms, keyed by a
/// human-readable symmetry label.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SymmetryReport {
    pub static_blocks: IndexMap<String, SymmetryViolation>,
    pub dynamic_blocks: IndexMap<String, SymmetryViolation>,
}

/// Test for declared symmetries.
pub trait SymmetryTest {
    /// Compare canonical, consolidated static and dynamic terms against every
    /// symmetry declared by the basis.
    fn check_symm(&self, static_ops: &[OpString], dynamic_ops: &[OpString])
        -> OpResult<SymmetryReport>;
}

/// Whether a particle conservation test is meaningful for a basis.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum PconSupport {
    /// The basis has no notion of particle conservation.
    #[default]
    Unsupported,
    /// Conservation is meaningful, but the basis does not enforce it.
    Off,
    /// The basis is restricted to a fixed particle number.
    On,
}

/* Bases **********************************************************************/

/// Basic requirements for any basis the engine can act on.
pub trait OperatorBasis {
    /// Dimension of the Hilbert space.
    fn ns(&self) -> usize;

    /// Return `true` if coordinate data from [`Self::op_elements`] never
    /// repeats a row index.
    fn unique_matrix_elements(&self) -> bool { true }

    /// Compute the action of a single term on every basis state as coordinate
    /// data, with no full matrix constructed.
    fn op_elements(&self, op: &OpString) -> OpResult<CooElements<C64>>;

    /// Fail if `op` names an unknown symbol or a site outside the basis.
    ///
    /// Defaults to computing (and discarding) the term's matrix elements.
    fn validate_opstr(&self, op: &OpString) -> OpResult<()> {
        self.op_elements(op).map(|_| ())
    }

    fn canonical_order(&self) -> Option<&dyn CanonicalOrder> { None }

    fn conjugation(&self) -> Option<&dyn HermitianConjugate> { None }

    fn decomposition(&self) -> Option<&dyn Decompose> { None }

    fn symmetry_test(&self) -> Option<&dyn SymmetryTest> { None }

    fn pcon_support(&self) -> PconSupport { PconSupport::Unsupported }
}
