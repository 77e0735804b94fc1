//! Checked, matrix-free sums of operator terms.

use ndarray as nd;
use num_complex::Complex64 as C64;
use crate::{
    algebra::{ consolidate, normalize },
    apply::inplace_op,
    check::{ ConsistencyChecker, Reporter },
    config::CheckConfig,
    error::OpResult,
    hilbert::{ OperatorBasis, Unordered },
    scalar::Widen,
    terms::{ DynamicSpec, DynamicTerm, StaticSpec, StaticTerm },
};

/// A possibly time-dependent operator `H(t) = H_0 + Σ_k f_k(t) H_k` on a
/// basis, stored as canonical, consolidated terms.
///
/// An `Operator` can only be created from input that passes every enabled
/// consistency check.
#[derive(Debug)]
pub struct Operator<'a, B>
where B: OperatorBasis + ?Sized
{
    basis: &'a B,
    static_terms: Vec<StaticTerm>,
    dynamic_terms: Vec<DynamicTerm<'a>>,
}

impl<'a, B> Operator<'a, B>
where B: OperatorBasis + ?Sized
{
    /// Create a new `Operator`.
    ///
    /// Fails if any term names an unknown symbol or a site outside the basis,
    /// if the basis lacks a capability needed by an enabled check, or if any
    /// enabled check fails.
    pub fn new<R>(
        basis: &'a B,
        static_specs: &[StaticSpec],
        dynamic_specs: &[DynamicSpec<'a>],
        config: CheckConfig,
        reporter: R,
    ) -> OpResult<Self>
    where R: Reporter
    {
        let order = basis.canonical_order().unwrap_or(&Unordered);
        let static_terms = normalize(order, static_specs)?;
        let dynamic_terms = normalize(order, dynamic_specs)?;
        static_terms.iter().map(|term| &term.op)
            .chain(dynamic_terms.iter().map(|term| &term.op))
            .try_for_each(|op| basis.validate_opstr(op))?;
        ConsistencyChecker::new(basis, config, reporter)?
            .check_all(static_specs, dynamic_specs)?;
        let static_terms = consolidate(static_terms)?;
        let dynamic_terms = consolidate(dynamic_terms)?;
        log::debug!(
            "assembled operator from {} static and {} dynamic terms",
            static_terms.len(),
            dynamic_terms.len(),
        );
        Ok(Self { basis, static_terms, dynamic_terms })
    }

    pub fn basis(&self) -> &'a B { self.basis }

    pub fn static_terms(&self) -> &[StaticTerm] { &self.static_terms }

    pub fn dynamic_terms(&self) -> &[DynamicTerm<'a>] { &self.dynamic_terms }

    fn couplings(&self, t: f64) -> impl Iterator<Item = StaticTerm> + '_ {
        self.static_terms.iter()
            .cloned()
            .chain(self.dynamic_terms.iter().map(move |term| term.eval_at(t)))
    }

    fn accumulate<V, Si, So, D>(
        &self,
        v: &nd::ArrayBase<Si, D>,
        t: f64,
        adjoint: bool,
        out: &mut nd::ArrayBase<So, D>,
    ) -> OpResult<()>
    where
        V: Widen<C64>,
        Si: nd::Data<Elem = V>,
        So: nd::DataMut<Elem = C64>,
        D: nd::RemoveAxis,
    {
        for term in self.couplings(t) {
            let op = term.op;
            inplace_op(
                self.basis,
                v,
                &op.opstr,
                &op.indices,
                op.coupling,
                adjoint,
                adjoint,
                out,
            )?;
        }
        Ok(())
    }

    /// Add `H(t) v` to `out`.
    ///
    /// `out` is left unchanged if any term fails to apply.
    pub fn dot_into<V, Si, So, D>(
        &self,
        v: &nd::ArrayBase<Si, D>,
        t: f64,
        out: &mut nd::ArrayBase<So, D>,
    ) -> OpResult<()>
    where
        V: Widen<C64>,
        Si: nd::Data<Elem = V>,
        So: nd::DataMut<Elem = C64>,
        D: nd::RemoveAxis,
    {
        let mut acc: nd::Array<C64, D> = nd::Array::zeros(out.raw_dim());
        self.accumulate(v, t, false, &mut acc)?;
        out.zip_mut_with(&acc, |o, a| { *o += *a; });
        Ok(())
    }

    /// Compute `H(t) v`.
    pub fn dot<V, Si, D>(&self, v: &nd::ArrayBase<Si, D>, t: f64)
        -> OpResult<nd::Array<C64, D>>
    where
        V: Widen<C64>,
        Si: nd::Data<Elem = V>,
        D: nd::RemoveAxis,
    {
        let mut out: nd::Array<C64, D> = nd::Array::zeros(v.raw_dim());
        self.accumulate(v, t, false, &mut out)?;
        Ok(out)
    }

    /// Compute `H(t)† v`.
    pub fn dot_adjoint<V, Si, D>(&self, v: &nd::ArrayBase<Si, D>, t: f64)
        -> OpResult<nd::Array<C64, D>>
    where
        V: Widen<C64>,
        Si: nd::Data<Elem = V>,
        D: nd::RemoveAxis,
    {
        let mut out: nd::Array<C64, D> = nd::Array::zeros(v.raw_dim());
        self.accumulate(v, t, true, &mut out)?;
        Ok(out)
    }
}
