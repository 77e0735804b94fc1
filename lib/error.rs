//! Error type shared by every stage of the operator pipeline.

use std::fmt;
use num_complex::Complex64 as C64;
use thiserror::Error;

/// One of the three consistency checks run on a term list.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CheckKind {
    Hermiticity,
    Symmetry,
    ParticleConservation,
}

impl CheckKind {
    /// Name of the configuration flag that turns the check off.
    pub fn flag(&self) -> &'static str {
        match *self {
            Self::Hermiticity => "check_herm",
            Self::Symmetry => "check_symm",
            Self::ParticleConservation => "check_pcon",
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Hermiticity => write!(f, "hermiticity check"),
            Self::Symmetry => write!(f, "symmetry check"),
            Self::ParticleConservation => write!(f, "particle conservation check"),
        }
    }
}

/// Names the operation that needed a missing basis capability.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Requirement {
    Check(CheckKind),
    ExpandedForm,
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Check(kind)
                => write!(f, "the {}; turn this check off by setting `{} = false`",
                    kind, kind.flag()),
            Self::ExpandedForm => write!(f, "expanded_form"),
        }
    }
}

/// Distinguishes time-independent from time-dependent terms in reports.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TermPart {
    Static,
    Dynamic,
}

impl fmt::Display for TermPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Static => write!(f, "static"),
            Self::Dynamic => write!(f, "dynamic"),
        }
    }
}

#[derive(Debug, Error)]
pub enum OpError {
    /// Returned when a basis lacks a capability needed by an enabled check or
    /// by [`expanded_form`][crate::algebra::expanded_form].
    #[error("basis is missing the `{hook}` capability required by {required_by}")]
    MissingCapability {
        hook: &'static str,
        required_by: Requirement,
    },

    /// Returned when a bond lists a different number of sites than its
    /// operator string has symbols.
    #[error(
        "error in term normalization: operator string {opstr:?} has {n_symbols} \
        symbols but {n_sites} site indices were given"
    )]
    OpstrLength {
        opstr: String,
        n_symbols: usize,
        n_sites: usize,
    },

    /// Returned when two dynamic terms share a canonical key but carry
    /// different time dependence.
    #[error(
        "error in term consolidation: terms {opstr:?} on sites {indices:?} \
        share a canonical key but carry different time dependence"
    )]
    ConflictingTimeDep {
        opstr: String,
        indices: Vec<usize>,
    },

    #[error(
        "operator not hermitian: {part} operator strings {opstrs:?} contain \
        non-hermitian couplings; to turn this check off set `check_herm = false`"
    )]
    NotHermitian {
        part: TermPart,
        opstrs: Vec<String>,
    },

    #[error(
        "operator does not obey {symmetry}: {part} operator strings {opstrs:?}; \
        to turn this check off set `check_symm = false`"
    )]
    SymmetryViolated {
        symmetry: String,
        part: TermPart,
        opstrs: Vec<String>,
    },

    #[error(
        "operator does not conserve particle number: {part} operator strings \
        {opstrs:?}; to turn this check off set `check_pcon = false`"
    )]
    ParticleNonConserving {
        part: TermPart,
        opstrs: Vec<String>,
    },

    /// Returned when the leading dimension of an input array is not the
    /// dimension of the Hilbert space.
    #[error(
        "error in operator application: leading dimension {found} does not \
        match basis dimension {expected}"
    )]
    DimensionMismatch {
        expected: usize,
        found: usize,
    },

    /// Returned when an output array does not have the shape of the input.
    #[error(
        "error in operator application: output shape {output:?} does not \
        match input shape {input:?}"
    )]
    ShapeMismatch {
        input: Vec<usize>,
        output: Vec<usize>,
    },

    /// Returned when a basis produces coordinate data pointing outside the
    /// Hilbert space.
    #[error(
        "error in operator application: matrix element at ({row}, {col}) lies \
        outside a basis of dimension {ns}"
    )]
    ElementOutOfRange {
        row: usize,
        col: usize,
        ns: usize,
    },

    /// Returned when value, row, and column arrays have different lengths.
    #[error("error in matrix element generation: mismatched coordinate array lengths")]
    CooLength,

    /// Returned when a complex matrix element is requested in a real numeric
    /// type.
    #[error(
        "error in matrix element generation: complex element {0} cannot be \
        stored in a real numeric type"
    )]
    ComplexToReal(C64),

    #[error("error in matrix element generation: unknown operator symbol(s) in {0:?}")]
    UnknownSymbol(String),

    #[error(
        "error in matrix element generation: site index {site} out of range \
        for {n_sites} sites"
    )]
    SiteOutOfRange {
        site: usize,
        n_sites: usize,
    },

    /// Returned when a basis would have more states than fit in a `usize`.
    #[error(
        "error in basis construction: {n_sites} sites exceed the maximum of \
        {max}"
    )]
    TooManySites {
        n_sites: usize,
        max: usize,
    },

    #[error("error reading check configuration: {0}")]
    Config(#[from] toml::de::Error),
}
pub type OpResult<T> = Result<T, OpError>;
