//! Reference basis: a chain of spin-1/2 sites with no symmetry reduction.
//!
//! States are labeled by `N`-bit integers, where bit `i` gives the state of
//! site `i` (`1` = up, `0` = down). Operator strings are built from the
//! following single-site symbols:
//! - `I`: identity
//! - `z`, `x`, `y`: Pauli matrices
//! - `+`, `-`: raising and lowering operators, with `x = + + -`
//! - `n`: projector onto the up state, `n = (I + z) / 2`
//!
//! Symbols act right to left, i.e. the last symbol of a string is applied
//! first.

use std::fmt;
use itertools::Itertools;
use ndarray as nd;
use num_complex::Complex64 as C64;
use num_traits::{ One, Zero };
use once_cell::sync::Lazy;
use regex::Regex;
use crate::{
    algebra::{ consolidate, expand },
    apply::CooElements,
    error::{ OpError, OpResult },
    hilbert::{
        CanonicalOrder,
        Decompose,
        HermitianConjugate,
        OperatorBasis,
        PconSupport,
        SymmetryReport,
        SymmetryTest,
        SymmetryViolation,
    },
    terms::{ OpString, StaticTerm, TermKey },
};

static OPSTR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[I+\-xyzn]*$").unwrap());

/// A symmetry that can be declared for a [`SpinBasis`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SpinSymmetry {
    /// Periodic translation by one site, `i -> i + 1 mod N`.
    Translation,
    /// Global spin flip, exchanging up and down on every site.
    SpinInversion,
}

impl fmt::Display for SpinSymmetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Translation => write!(f, "translation symmetry"),
            Self::SpinInversion => write!(f, "spin inversion symmetry"),
        }
    }
}

/// Unreduced spin-1/2 chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpinBasis {
    n_sites: usize,
    symmetries: Vec<SpinSymmetry>,
    pcon: PconSupport,
}

impl SpinBasis {
    /// Largest supported number of sites, so that every state label fits in a
    /// `usize`.
    pub const MAX_SITES: usize = usize::BITS as usize - 1;

    /// Create a new `SpinBasis` of `n_sites` sites with no declared symmetries
    /// and magnetization left free.
    ///
    /// Fails if `n_sites` exceeds [`Self::MAX_SITES`].
    pub fn new(n_sites: usize) -> OpResult<Self> {
        if n_sites > Self::MAX_SITES {
            return Err(OpError::TooManySites { n_sites, max: Self::MAX_SITES });
        }
        Ok(Self { n_sites, symmetries: Vec::new(), pcon: PconSupport::Off })
    }

    /// Declare a symmetry that every operator must obey.
    pub fn with_symmetry(mut self, symmetry: SpinSymmetry) -> Self {
        if !self.symmetries.contains(&symmetry) {
            self.symmetries.push(symmetry);
        }
        self
    }

    /// Require that every operator conserve total magnetization, i.e. the
    /// number of up spins.
    pub fn conserving_magnetization(mut self) -> Self {
        self.pcon = PconSupport::On;
        self
    }

    pub fn n_sites(&self) -> usize { self.n_sites }

    pub fn symmetries(&self) -> &[SpinSymmetry] { &self.symmetries }

    fn validate(&self, op: &OpString) -> OpResult<()> {
        if !OPSTR.is_match(&op.opstr) {
            return Err(OpError::UnknownSymbol(op.opstr.clone()));
        }
        let n_symbols = op.opstr.chars().count();
        if n_symbols != op.indices.len() {
            return Err(OpError::OpstrLength {
                opstr: op.opstr.clone(),
                n_symbols,
                n_sites: op.indices.len(),
            });
        }
        if let Some(&site) = op.indices.iter().find(|s| **s >= self.n_sites) {
            return Err(OpError::SiteOutOfRange { site, n_sites: self.n_sites });
        }
        Ok(())
    }
}

/// Action of a single symbol on a single site in state `up`, returning the
/// amplitude and new state, or `None` if the state is annihilated.
fn act(symbol: char, up: bool) -> Option<(C64, bool)> {
    match symbol {
        'I' => Some((C64::one(), up)),
        'z' => Some((if up { C64::one() } else { -C64::one() }, up)),
        'n' => up.then_some((C64::one(), up)),
        '+' => (!up).then_some((C64::one(), true)),
        '-' => up.then_some((C64::one(), false)),
        'x' => Some((C64::one(), !up)),
        'y' => Some((if up { C64::i() } else { -C64::i() }, !up)),
        _ => None,
    }
}

/// Elementary decomposition of a single symbol.
fn elementary(symbol: char) -> Vec<(char, C64)> {
    match symbol {
        'x' => vec![('+', C64::one()), ('-', C64::one())],
        'y' => vec![('+', -C64::i()), ('-', C64::i())],
        'n' => vec![('I', C64::from(0.5)), ('z', C64::from(0.5))],
        c => vec![(c, C64::one())],
    }
}

impl OperatorBasis for SpinBasis {
    fn ns(&self) -> usize { 1 << self.n_sites }

    fn op_elements(&self, op: &OpString) -> OpResult<CooElements<C64>> {
        self.validate(op)?;
        let symbols: Vec<(char, usize)> = op.symbols().collect();
        let mut values: Vec<C64> = Vec::new();
        let mut rows: Vec<usize> = Vec::new();
        let mut cols: Vec<usize> = Vec::new();
        'states: for col in 0..self.ns() {
            let mut state = col;
            let mut amp = op.coupling;
            for &(symbol, site) in symbols.iter().rev() {
                let up = (state >> site) & 1 == 1;
                let Some((a, new_up)) = act(symbol, up) else { continue 'states; };
                amp *= a;
                if new_up != up { state ^= 1 << site; }
            }
            if amp.is_zero() { continue; }
            values.push(amp);
            rows.push(state);
            cols.push(col);
        }
        CooElements::new(
            nd::Array1::from(values), nd::Array1::from(rows), nd::Array1::from(cols))
    }

    fn validate_opstr(&self, op: &OpString) -> OpResult<()> { self.validate(op) }

    fn canonical_order(&self) -> Option<&dyn CanonicalOrder> { Some(self) }

    fn conjugation(&self) -> Option<&dyn HermitianConjugate> { Some(self) }

    fn decomposition(&self) -> Option<&dyn Decompose> { Some(self) }

    fn symmetry_test(&self) -> Option<&dyn SymmetryTest> { Some(self) }

    fn pcon_support(&self) -> PconSupport { self.pcon }
}

impl CanonicalOrder for SpinBasis {
    // operators on different sites commute; those on the same site keep their
    // relative order
    fn sort_opstr(&self, op: OpString) -> OpString {
        let OpString { opstr, indices, coupling } = op;
        let (opstr, indices): (String, Vec<usize>)
            = opstr.chars().zip(indices)
            .sorted_by_key(|(_, site)| *site)
            .unzip();
        OpString { opstr, indices, coupling }
    }
}

impl HermitianConjugate for SpinBasis {
    fn hc_opstr(&self, op: OpString) -> OpString {
        let OpString { opstr, indices, coupling } = op;
        let pairs: Vec<(char, usize)> = opstr.chars().zip(indices).collect();
        let (opstr, indices): (String, Vec<usize>)
            = pairs.into_iter()
            .rev()
            .map(|(symbol, site)| {
                match symbol {
                    '+' => ('-', site),
                    '-' => ('+', site),
                    s => (s, site),
                }
            })
            .unzip();
        OpString { opstr, indices, coupling: coupling.conj() }
    }
}

impl Decompose for SpinBasis {
    fn expand_opstr(&self, op: &OpString) -> Vec<OpString> {
        if op.opstr.is_empty() { return vec![op.clone()]; }
        op.opstr.chars()
            .map(elementary)
            .multi_cartesian_product()
            .map(|factors| {
                let (opstr, coupling): (String, C64)
                    = factors.into_iter()
                    .fold(
                        (String::new(), op.coupling),
                        |(mut opstr, coupling), (symbol, weight)| {
                            opstr.push(symbol);
                            (opstr, coupling * weight)
                        },
                    );
                OpString { opstr, indices: op.indices.clone(), coupling }
            })
            .collect()
    }

    fn non_zero(&self, op: &OpString) -> bool {
        if op.coupling.is_zero() { return false; }
        op.symbols()
            .into_group_map_by(|(_, site)| *site)
            .into_values()
            .all(|on_site| {
                [false, true].into_iter()
                    .any(|up| {
                        on_site.iter().rev()
                            .try_fold(up, |state, (symbol, _)| {
                                act(*symbol, state).map(|(_, new)| new)
                            })
                            .is_some()
                    })
            })
    }
}

/* Symmetries *****************************************************************/

impl SpinBasis {
    fn elementary_terms(&self, ops: &[OpString]) -> OpResult<Vec<OpString>> {
        let terms: Vec<StaticTerm>
            = ops.iter().cloned().map(StaticTerm::from_op).collect();
        Ok(
            consolidate(expand(self, self, &terms))?
                .into_iter()
                .map(|term| term.op)
                .collect()
        )
    }

    fn transform(&self, symmetry: SpinSymmetry, ops: &[OpString])
        -> OpResult<Vec<OpString>>
    {
        let transformed: Vec<StaticTerm>
            = ops.iter()
            .map(|op| {
                let op = match symmetry {
                    SpinSymmetry::Translation => OpString {
                        opstr: op.opstr.clone(),
                        indices: op.indices.iter()
                            .map(|i| (i + 1) % self.n_sites)
                            .collect(),
                        coupling: op.coupling,
                    },
                    SpinSymmetry::SpinInversion => invert(op),
                };
                StaticTerm::from_op(self.sort_opstr(op))
            })
            .collect();
        Ok(consolidate(transformed)?.into_iter().map(|term| term.op).collect())
    }

    fn test_symmetry(&self, symmetry: SpinSymmetry, ops: &[OpString])
        -> OpResult<SymmetryViolation>
    {
        let forward = self.elementary_terms(ops)?;
        let backward = self.transform(symmetry, &forward)?;
        let missing = unmatched(&backward, &forward);
        match symmetry {
            SpinSymmetry::Translation => Ok(SymmetryViolation::Missing(missing)),
            SpinSymmetry::SpinInversion => {
                let odd = unmatched(&forward, &backward);
                Ok(SymmetryViolation::Pair { odd, missing })
            },
        }
    }
}

fn invert(op: &OpString) -> OpString {
    let mut coupling = op.coupling;
    let opstr: String
        = op.opstr.chars()
        .map(|symbol| {
            match symbol {
                '+' => '-',
                '-' => '+',
                'z' => { coupling = -coupling; 'z' },
                s => s,
            }
        })
        .collect();
    OpString { opstr, indices: op.indices.clone(), coupling }
}

/// Terms of `a` without an identical counterpart in `b`.
fn unmatched(a: &[OpString], b: &[OpString]) -> Vec<OpString> {
    a.iter()
        .filter(|op| {
            let key: TermKey = op.key();
            !b.iter().any(|other| other.key() == key && other.coupling == op.coupling)
        })
        .cloned()
        .collect()
}

impl SymmetryTest for SpinBasis {
    fn check_symm(&self, static_ops: &[OpString], dynamic_ops: &[OpString])
        -> OpResult<SymmetryReport>
    {
        static_ops.iter().chain(dynamic_ops)
            .try_for_each(|op| self.validate(op))?;
        let mut report = SymmetryReport::default();
        for &symmetry in self.symmetries.iter() {
            report.static_blocks.insert(
                symmetry.to_string(), self.test_symmetry(symmetry, static_ops)?);
            report.dynamic_blocks.insert(
                symmetry.to_string(), self.test_symmetry(symmetry, dynamic_ops)?);
        }
        Ok(report)
    }
}
