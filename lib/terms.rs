//! Definitions to describe operator terms, both as supplied by the user and in
//! the canonical form used internally.
//!
//! User input is a list of [`OpSpec`]s, each pairing an operator string with a
//! list of [`Bond`]s. Internally, every bond becomes its own [`Term`], which
//! carries the `(opstr, indices, coupling)` triple as an [`OpString`], the set
//! of input entries it came from, and an attachment `D`: `()` for static terms
//! and [`TimeDep`] for dynamic ones.

use std::{
    collections::BTreeSet,
    fmt,
    rc::Rc,
};
use num_complex::Complex64 as C64;

/* Triples ********************************************************************/

/// A single `(opstr, indices, coupling)` triple.
///
/// Each character of `opstr` names a single-site operator acting on the site
/// at the same position in `indices`.
#[derive(Clone, Debug, PartialEq)]
pub struct OpString {
    pub opstr: String,
    pub indices: Vec<usize>,
    pub coupling: C64,
}

impl OpString {
    /// Create a new `OpString`.
    pub fn new<S, I, J>(opstr: S, indices: I, coupling: J) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = usize>,
        J: Into<C64>,
    {
        Self {
            opstr: opstr.into(),
            indices: indices.into_iter().collect(),
            coupling: coupling.into(),
        }
    }

    /// Return the identity of `self` used for consolidation and comparison.
    pub fn key(&self) -> TermKey {
        TermKey { opstr: self.opstr.clone(), indices: self.indices.clone() }
    }

    /// Return an iterator over `(symbol, site)` pairs.
    pub fn symbols(&self) -> impl Iterator<Item = (char, usize)> + '_ {
        self.opstr.chars().zip(self.indices.iter().copied())
    }

    /// Return a copy of `self` with a different coupling.
    pub fn with_coupling(&self, coupling: C64) -> Self {
        Self { coupling, ..self.clone() }
    }
}

impl fmt::Display for OpString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:?}, {:?}, {})", self.opstr, self.indices, self.coupling)
    }
}

/// The `(opstr, indices)` part of a term after canonical reordering.
///
/// Two terms with equal keys describe the same operator up to their couplings.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TermKey {
    pub opstr: String,
    pub indices: Vec<usize>,
}

/* Time dependence ************************************************************/

/// Heap-allocated [`Fn`] trait object computing a time-dependent coupling
/// factor `f(t, args)`.
pub type TimeFn<'a> = Rc<dyn Fn(f64, &[f64]) -> C64 + 'a>;

/// Plain function pointer form of a time-dependent coupling factor.
pub type TimeFnPtr = fn(f64, &[f64]) -> C64;

/// Time dependence attached to a dynamic term, giving its coupling as
/// `coupling * func(t, args)`.
///
/// Two `TimeDep`s are the same if they have equal arguments and either were
/// built from the same function pointer ([`TimeDep::from_fn`]) or share the
/// same handle ([`TimeDep::from_rc`] or a clone).
#[derive(Clone)]
pub struct TimeDep<'a> {
    pub func: TimeFn<'a>,
    pub args: Vec<f64>,
    key: *const (),
}

impl<'a> fmt::Debug for TimeDep<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TimeDep {{ func: {:p}, args: {:?} }}", self.key, self.args)
    }
}

impl<'a> TimeDep<'a> {
    /// Create a new `TimeDep` from an arbitrary closure.
    ///
    /// The closure gets a fresh handle, so it only compares equal to clones of
    /// the returned value.
    pub fn new<F, A>(func: F, args: A) -> Self
    where
        F: Fn(f64, &[f64]) -> C64 + 'a,
        A: IntoIterator<Item = f64>,
    {
        Self::from_rc(Rc::new(func), args)
    }

    /// Create a new `TimeDep` from a function pointer, keyed on its address.
    pub fn from_fn<A>(func: TimeFnPtr, args: A) -> Self
    where A: IntoIterator<Item = f64>
    {
        Self {
            func: Rc::new(func),
            args: args.into_iter().collect(),
            key: func as *const (),
        }
    }

    /// Create a new `TimeDep` sharing an existing function handle.
    pub fn from_rc<A>(func: TimeFn<'a>, args: A) -> Self
    where A: IntoIterator<Item = f64>
    {
        let key = Rc::as_ptr(&func).cast::<()>();
        Self { func, args: args.into_iter().collect(), key }
    }

    /// Evaluate the time-dependent factor at time `t`.
    pub fn eval(&self, t: f64) -> C64 { (self.func)(t, &self.args) }

    /// Return `true` if `self` and `other` refer to the same function and have
    /// equal arguments.
    ///
    /// Distinct closures are never considered equal, even if they compute the
    /// same values.
    pub fn same_as(&self, other: &Self) -> bool {
        self.key == other.key && self.args == other.args
    }
}

/// Extra data carried by a [`Term`] through the pipeline.
pub trait Attachment: Clone {
    /// Return `true` if two terms with the same key may be merged.
    fn compatible(&self, other: &Self) -> bool;
}

impl Attachment for () {
    fn compatible(&self, _other: &Self) -> bool { true }
}

impl<'a> Attachment for TimeDep<'a> {
    fn compatible(&self, other: &Self) -> bool { self.same_as(other) }
}

/* Terms **********************************************************************/

/// A single canonical operator term.
///
/// `provenance` holds the positions, in the flattened list of input bonds, of
/// every entry that contributed to the term.
#[derive(Clone, Debug)]
pub struct Term<D> {
    pub op: OpString,
    pub provenance: BTreeSet<usize>,
    pub dep: D,
}

/// A time-independent term.
pub type StaticTerm = Term<()>;

/// A time-dependent term.
pub type DynamicTerm<'a> = Term<TimeDep<'a>>;

impl<D> Term<D> {
    /// Return the canonical key of the term.
    pub fn key(&self) -> TermKey { self.op.key() }

    /// Replace the triple, keeping provenance and attachment.
    pub fn map_op<F>(self, f: F) -> Self
    where F: FnOnce(OpString) -> OpString
    {
        let Self { op, provenance, dep } = self;
        Self { op: f(op), provenance, dep }
    }
}

impl StaticTerm {
    /// Create a new static term originating from nowhere in particular.
    pub fn from_op(op: OpString) -> Self {
        Self { op, provenance: BTreeSet::new(), dep: () }
    }
}

impl<'a> DynamicTerm<'a> {
    /// Return the static term whose coupling is the value of `self`'s coupling
    /// at time `t`.
    pub fn eval_at(&self, t: f64) -> StaticTerm {
        let coupling = self.op.coupling * self.dep.eval(t);
        Term {
            op: self.op.with_coupling(coupling),
            provenance: self.provenance.clone(),
            dep: (),
        }
    }
}

/* User input *****************************************************************/

/// A single coupling list entry `[coupling, site_0, site_1, ...]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Bond {
    pub coupling: C64,
    pub sites: Vec<usize>,
}

impl Bond {
    /// Create a new `Bond`.
    pub fn new<J, I>(coupling: J, sites: I) -> Self
    where
        J: Into<C64>,
        I: IntoIterator<Item = usize>,
    {
        Self { coupling: coupling.into(), sites: sites.into_iter().collect() }
    }
}

impl<const N: usize> From<(f64, [usize; N])> for Bond {
    fn from(js: (f64, [usize; N])) -> Self {
        let (j, s) = js;
        Self::new(j, s)
    }
}

impl<const N: usize> From<(C64, [usize; N])> for Bond {
    fn from(js: (C64, [usize; N])) -> Self {
        let (j, s) = js;
        Self::new(j, s)
    }
}

/// An operator string paired with its coupling list and attachment.
#[derive(Clone, Debug)]
pub struct OpSpec<D> {
    pub opstr: String,
    pub bonds: Vec<Bond>,
    pub dep: D,
}

/// Static input entry `[opstr, bonds]`.
pub type StaticSpec = OpSpec<()>;

/// Dynamic input entry `[opstr, bonds, time_function, time_function_args]`.
pub type DynamicSpec<'a> = OpSpec<TimeDep<'a>>;

impl StaticSpec {
    /// Create a new static input entry.
    pub fn new_static<S, I, B>(opstr: S, bonds: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = B>,
        B: Into<Bond>,
    {
        Self {
            opstr: opstr.into(),
            bonds: bonds.into_iter().map(Into::into).collect(),
            dep: (),
        }
    }
}

impl<'a> DynamicSpec<'a> {
    /// Create a new dynamic input entry from a time function and its extra
    /// arguments.
    ///
    /// Entries passing the same function with equal arguments share their time
    /// dependence. Use [`Self::with_time_dep`] for capturing closures.
    pub fn new_dynamic<S, I, B, A>(opstr: S, bonds: I, func: TimeFnPtr, args: A)
        -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = B>,
        B: Into<Bond>,
        A: IntoIterator<Item = f64>,
    {
        Self::with_time_dep(opstr, bonds, TimeDep::from_fn(func, args))
    }

    /// Create a new dynamic input entry from a pre-built [`TimeDep`].
    pub fn with_time_dep<S, I, B>(opstr: S, bonds: I, dep: TimeDep<'a>) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = B>,
        B: Into<Bond>,
    {
        Self {
            opstr: opstr.into(),
            bonds: bonds.into_iter().map(Into::into).collect(),
            dep,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_dep_identity_follows_handle() {
        let f: TimeFn = Rc::new(|t: f64, args: &[f64]| C64::from((args[0] * t).cos()));
        let a = TimeDep::from_rc(f.clone(), [2.0]);
        let b = TimeDep::from_rc(f, [2.0]);
        let c = TimeDep::new(|t: f64, args: &[f64]| C64::from((args[0] * t).cos()), [2.0]);
        assert!(a.same_as(&b));
        assert!(!a.same_as(&c));
        assert!(!a.same_as(&TimeDep::from_rc(a.func.clone(), [3.0])));
        assert_eq!(a.eval(0.0), C64::from(1.0));
    }

    fn drive(t: f64, args: &[f64]) -> C64 { C64::from_polar(1.0, args[0] * t) }

    fn other_drive(t: f64, _args: &[f64]) -> C64 { C64::from(t) }

    #[test]
    fn time_dep_identity_follows_fn_pointer() {
        let a = TimeDep::from_fn(drive, [1.5]);
        let b = TimeDep::from_fn(drive, [1.5]);
        assert!(a.same_as(&b));
        assert!(a.same_as(&a.clone()));
        assert!(!a.same_as(&TimeDep::from_fn(drive, [2.5])));
        assert!(!a.same_as(&TimeDep::from_fn(other_drive, [1.5])));
        assert_eq!(b.eval(0.0), C64::from(1.0));

        let x = DynamicSpec::new_dynamic("zz", [(1.0, [0, 1])], drive, [1.5]);
        let y = DynamicSpec::new_dynamic("zz", [(1.0, [1, 0])], drive, [1.5]);
        assert!(x.dep.same_as(&y.dep));
    }

    #[test]
    fn eval_at_scales_coupling() {
        let term = Term {
            op: OpString::new("z", [0], 2.0),
            provenance: BTreeSet::from([4]),
            dep: TimeDep::new(|t: f64, _: &[f64]| C64::new(0.0, t), []),
        };
        let evaluated = term.eval_at(0.5);
        assert_eq!(evaluated.op.coupling, C64::new(0.0, 1.0));
        assert_eq!(evaluated.provenance, BTreeSet::from([4]));
    }
}
