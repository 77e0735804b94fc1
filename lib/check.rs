//! Consistency checks on operator term lists: Hermiticity, declared
//! symmetries, and particle number conservation.
//!
//! Every check compares a canonical forward term set against a transformed
//! one. A failed check logs the offending operator strings, gives its
//! [`Reporter`] the chance to display every offending term, and then returns
//! an error. Checks can only be bypassed by turning them off in the
//! [`CheckConfig`].

use std::{
    any::type_name,
    collections::BTreeSet,
    f64::consts::PI,
};
use indexmap::IndexMap;
use num_traits::Zero;
use crate::{
    algebra::{ consolidate, expand, normalize },
    config::CheckConfig,
    error::{ CheckKind, OpError, OpResult, Requirement, TermPart },
    hilbert::{
        CanonicalOrder,
        Decompose,
        HermitianConjugate,
        OperatorBasis,
        PconSupport,
        SymmetryViolation,
        Unordered,
    },
    terms::{
        Attachment,
        DynamicSpec,
        OpSpec,
        OpString,
        StaticSpec,
        StaticTerm,
        Term,
        TermKey,
    },
};

pub mod report;
pub use report::{ Reporter, ShowAll, StdinPrompt, Unattended, Violation };

/// Euler-Mascheroni constant.
pub const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Time at which dynamic couplings are evaluated for the Hermiticity check.
///
/// This is `cos(π^(1/γ))`. It has no physical meaning; it only needs to be
/// irrational enough that time-dependent couplings do not cancel by accident.
pub fn generic_time() -> f64 { PI.powf(EULER_GAMMA.recip()).cos() }

/// Result of a single check that did not fail.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CheckOutcome {
    Passed,
    /// The check was turned off, or the basis has nothing to check against.
    Skipped,
}

/// Runs consistency checks for a single basis.
///
/// Construction fails if the basis lacks a capability needed by an enabled
/// check, so that no check can fail midway for want of one.
pub struct ConsistencyChecker<'b, B, R>
where B: OperatorBasis + ?Sized
{
    basis: &'b B,
    config: CheckConfig,
    reporter: R,
    order: &'b dyn CanonicalOrder,
}

fn require<T>(cap: Option<T>, hook: &'static str, kind: CheckKind) -> OpResult<T> {
    cap.ok_or(OpError::MissingCapability {
        hook,
        required_by: Requirement::Check(kind),
    })
}

impl<'b, B, R> ConsistencyChecker<'b, B, R>
where
    B: OperatorBasis + ?Sized,
    R: Reporter,
{
    /// Create a new `ConsistencyChecker`.
    pub fn new(basis: &'b B, config: CheckConfig, reporter: R) -> OpResult<Self> {
        if config.check_herm {
            require(basis.canonical_order(), "sort_opstr", CheckKind::Hermiticity)?;
            require(basis.conjugation(), "hc_opstr", CheckKind::Hermiticity)?;
        }
        if config.check_symm && basis.symmetry_test().is_some() {
            require(basis.canonical_order(), "sort_opstr", CheckKind::Symmetry)?;
        }
        if config.check_pcon && basis.pcon_support() == PconSupport::On {
            let kind = CheckKind::ParticleConservation;
            require(basis.canonical_order(), "sort_opstr", kind)?;
            require(basis.decomposition(), "expand_opstr", kind)?;
        }
        let order: &'b dyn CanonicalOrder
            = basis.canonical_order().unwrap_or(&Unordered);
        Ok(Self { basis, config, reporter, order })
    }

    pub fn config(&self) -> CheckConfig { self.config }

    /// Give back the reporter.
    pub fn into_reporter(self) -> R { self.reporter }

    fn fail(&mut self, violation: Violation) -> OpError {
        log::warn!(
            "{} failed: {} operator strings {:?}",
            violation.check,
            violation.part,
            violation.unique_opstrs(),
        );
        if self.reporter.prompt(&violation) {
            self.reporter.show(&violation);
        }
        violation.into_error()
    }

    /// Normalize input entries, failing on any term the basis rejects.
    fn normalized<D>(&self, specs: &[OpSpec<D>]) -> OpResult<Vec<Term<D>>>
    where D: Attachment
    {
        let terms = normalize(self.order, specs)?;
        terms.iter().try_for_each(|term| self.basis.validate_opstr(&term.op))?;
        Ok(terms)
    }

    /// Run every enabled check, in the order Hermiticity, symmetry, particle
    /// conservation, stopping at the first failure.
    pub fn check_all(&mut self, static_specs: &[StaticSpec], dynamic_specs: &[DynamicSpec])
        -> OpResult<()>
    {
        self.check_hermitian(static_specs, dynamic_specs)?;
        self.check_symm(static_specs, dynamic_specs)?;
        self.check_pcon(static_specs, dynamic_specs)?;
        Ok(())
    }

    /* Hermiticity ************************************************************/

    /// Check that static terms and, separately, dynamic terms evaluated at
    /// [`generic_time`] sum to Hermitian operators.
    pub fn check_hermitian(
        &mut self,
        static_specs: &[StaticSpec],
        dynamic_specs: &[DynamicSpec],
    ) -> OpResult<CheckOutcome>
    {
        if !self.config.check_herm { return Ok(CheckOutcome::Skipped); }
        let hc = require(
            self.basis.conjugation(), "hc_opstr", CheckKind::Hermiticity)?;

        let static_terms = self.normalized(static_specs)?;
        self.hermitian_part(hc, &static_terms, TermPart::Static, None)?;

        let t = generic_time();
        let dynamic_terms: Vec<StaticTerm>
            = self.normalized(dynamic_specs)?
            .iter()
            .map(|term| term.eval_at(t))
            .collect();
        self.hermitian_part(hc, &dynamic_terms, TermPart::Dynamic, Some(t))?;

        log::info!("Hermiticity check passed!");
        Ok(CheckOutcome::Passed)
    }

    fn hermitian_part(
        &mut self,
        hc: &dyn HermitianConjugate,
        normalized: &[StaticTerm],
        part: TermPart,
        time: Option<f64>,
    ) -> OpResult<()>
    {
        let forward = self.canonical(normalized)?;
        let backward: Vec<StaticTerm>
            = consolidate(
                forward.iter()
                .map(|term| {
                    term.clone().map_op(|op| self.order.sort_opstr(hc.hc_opstr(op)))
                })
                .collect()
            )?;
        let (odd, missing) = term_difference(&forward, &backward);
        if odd.is_empty() && missing.is_empty() { return Ok(()); }
        let mut violation = Violation::new(CheckKind::Hermiticity, part);
        violation.offending = trace(normalized, &odd);
        violation.missing = missing.into_iter().map(|term| term.op.clone()).collect();
        violation.time = time;
        Err(self.fail(violation))
    }

    /// Expand (if possible) and consolidate.
    fn canonical(&self, normalized: &[StaticTerm]) -> OpResult<Vec<StaticTerm>> {
        match self.basis.decomposition() {
            Some(decomp) => consolidate(expand(decomp, self.order, normalized)),
            None => consolidate(normalized.to_vec()),
        }
    }

    /* Symmetries *************************************************************/

    /// Check the consolidated input against every symmetry declared by the
    /// basis.
    ///
    /// Skipped with a warning if the basis declares no symmetry test.
    pub fn check_symm(
        &mut self,
        static_specs: &[StaticSpec],
        dynamic_specs: &[DynamicSpec],
    ) -> OpResult<CheckOutcome>
    {
        if !self.config.check_symm { return Ok(CheckOutcome::Skipped); }
        let Some(test) = self.basis.symmetry_test() else {
            log::warn!(
                "test for symmetries not implemented for {}; to turn off this \
                warning set `check_symm = false`",
                type_name::<B>(),
            );
            return Ok(CheckOutcome::Skipped);
        };

        let static_ops: Vec<OpString>
            = consolidate(self.normalized(static_specs)?)?
            .into_iter()
            .map(|term| term.op)
            .collect();
        let dynamic_ops: Vec<OpString>
            = consolidate(self.normalized(dynamic_specs)?)?
            .into_iter()
            .map(|term| term.op)
            .collect();
        let report = test.check_symm(&static_ops, &dynamic_ops)?;

        let parts = [
            (TermPart::Static, report.static_blocks),
            (TermPart::Dynamic, report.dynamic_blocks),
        ];
        for (part, blocks) in parts.into_iter() {
            for (label, block) in blocks.into_iter() {
                if block.is_empty() { continue; }
                let mut violation = Violation::new(CheckKind::Symmetry, part);
                violation.symmetry = Some(label);
                match block {
                    SymmetryViolation::Pair { odd, missing } => {
                        violation.offending = odd;
                        violation.missing = missing;
                    },
                    SymmetryViolation::Missing(missing) => {
                        violation.missing = missing;
                    },
                }
                return Err(self.fail(violation));
            }
        }

        log::info!("Symmetry checks passed!");
        Ok(CheckOutcome::Passed)
    }

    /* Particle conservation **************************************************/

    /// Check that every elementary term adds as many particles as it removes.
    ///
    /// Skipped (with a warning) if the basis has no notion of particle
    /// conservation, and skipped silently if it does not enforce it.
    pub fn check_pcon(
        &mut self,
        static_specs: &[StaticSpec],
        dynamic_specs: &[DynamicSpec],
    ) -> OpResult<CheckOutcome>
    {
        if !self.config.check_pcon { return Ok(CheckOutcome::Skipped); }
        match self.basis.pcon_support() {
            PconSupport::Unsupported => {
                log::warn!(
                    "test for particle conservation not implemented for {}; to \
                    turn off this warning set `check_pcon = false`",
                    type_name::<B>(),
                );
                return Ok(CheckOutcome::Skipped);
            },
            PconSupport::Off => { return Ok(CheckOutcome::Skipped); },
            PconSupport::On => { },
        }
        let decomp = require(
            self.basis.decomposition(),
            "expand_opstr",
            CheckKind::ParticleConservation,
        )?;

        let static_terms = self.normalized(static_specs)?;
        self.pcon_part(decomp, &static_terms, TermPart::Static)?;
        let dynamic_terms = self.normalized(dynamic_specs)?;
        self.pcon_part(decomp, &dynamic_terms, TermPart::Dynamic)?;

        log::info!("Particle conservation check passed!");
        Ok(CheckOutcome::Passed)
    }

    fn pcon_part<D>(
        &mut self,
        decomp: &dyn Decompose,
        normalized: &[Term<D>],
        part: TermPart,
    ) -> OpResult<()>
    where D: Attachment
    {
        let elementary = consolidate(expand(decomp, self.order, normalized))?;
        let charged: Vec<&Term<D>>
            = elementary.iter()
            .filter(|term| {
                term.op.opstr.chars()
                    .map(|c| decomp.ladder_charge(c))
                    .sum::<i32>() != 0
            })
            .collect();
        if charged.is_empty() { return Ok(()); }
        let mut violation = Violation::new(CheckKind::ParticleConservation, part);
        violation.offending = trace(normalized, &charged);
        Err(self.fail(violation))
    }
}

/// Split the symmetric difference of two consolidated term lists into terms
/// of `forward` without an identical counterpart in `backward`, and the
/// reverse.
fn term_difference<'t>(forward: &'t [StaticTerm], backward: &'t [StaticTerm])
    -> (Vec<&'t StaticTerm>, Vec<&'t StaticTerm>)
{
    let index = |terms: &'t [StaticTerm]| -> IndexMap<TermKey, &'t StaticTerm> {
        terms.iter().map(|term| (term.key(), term)).collect()
    };
    let fwd = index(forward);
    let bwd = index(backward);
    let unmatched = |a: &IndexMap<TermKey, &'t StaticTerm>, b: &IndexMap<TermKey, &'t StaticTerm>| {
        a.iter()
            .filter(|(key, term)| {
                b.get(*key)
                    .map_or(true, |other| !(other.op.coupling - term.op.coupling).is_zero())
            })
            .map(|(_, term)| *term)
            .collect::<Vec<&'t StaticTerm>>()
    };
    (unmatched(&fwd, &bwd), unmatched(&bwd, &fwd))
}

/// Map terms back to the normalized input entries that produced them.
fn trace<D, E>(normalized: &[Term<D>], terms: &[&Term<E>]) -> Vec<OpString> {
    let positions: BTreeSet<usize>
        = terms.iter()
        .flat_map(|term| term.provenance.iter().copied())
        .collect();
    positions.into_iter()
        .filter_map(|k| normalized.get(k))
        .map(|term| term.op.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use num_complex::Complex64 as C64;
    use crate::{
        apply::CooElements,
        spin::SpinBasis,
        terms::TimeDep,
    };
    use super::*;

    fn herm_only() -> CheckConfig {
        CheckConfig::none().with(CheckKind::Hermiticity, true)
    }

    #[test]
    fn generic_time_is_fixed() {
        let t = generic_time();
        assert!((t - (PI.powf(1.0 / EULER_GAMMA)).cos()).abs() < 1e-15);
        assert!(t.abs() < 1.0 && t != 0.0);
    }

    #[test]
    fn hermitian_pair_passes() {
        let basis = SpinBasis::new(2).unwrap();
        let mut checker = ConsistencyChecker::new(&basis, herm_only(), Unattended).unwrap();
        let specs = [
            StaticSpec::new_static("+-", [(1.0, [0, 1])]),
            StaticSpec::new_static("+-", [(1.0, [1, 0])]),
            StaticSpec::new_static("zz", [(0.5, [0, 1])]),
        ];
        assert_eq!(checker.check_hermitian(&specs, &[]).unwrap(), CheckOutcome::Passed);
    }

    #[test]
    fn hermiticity_independent_of_entry_order() {
        // (0.1 + 0.2) + 0.3 and (0.3 + 0.2) + 0.1 differ in the last bit
        let basis = SpinBasis::new(2).unwrap();
        let mut checker = ConsistencyChecker::new(&basis, herm_only(), Unattended).unwrap();
        let specs = [
            StaticSpec::new_static("+-", [(0.1, [0, 1]), (0.2, [0, 1]), (0.3, [0, 1])]),
            StaticSpec::new_static("-+", [(0.3, [0, 1]), (0.2, [0, 1]), (0.1, [0, 1])]),
        ];
        assert_eq!(checker.check_hermitian(&specs, &[]).unwrap(), CheckOutcome::Passed);
    }

    #[test]
    fn unknown_symbols_are_errors_not_zeros() {
        let basis = SpinBasis::new(2).unwrap();
        let mut checker
            = ConsistencyChecker::new(&basis, CheckConfig::default(), Unattended).unwrap();
        let specs = [StaticSpec::new_static("q", [(1.0, [0])])];
        assert!(matches!(
            checker.check_hermitian(&specs, &[]),
            Err(OpError::UnknownSymbol(_))
        ));
        let outside = [StaticSpec::new_static("zz", [(1.0, [0, 4])])];
        assert!(matches!(
            checker.check_all(&outside, &[]),
            Err(OpError::SiteOutOfRange { site: 4, n_sites: 2 })
        ));
    }

    #[test]
    fn lone_raising_lowering_fails_with_trace() {
        let basis = SpinBasis::new(2).unwrap();
        let mut seen: Vec<Violation> = Vec::new();
        let reporter = |v: &Violation| { seen.push(v.clone()); false };
        let mut checker = ConsistencyChecker::new(&basis, herm_only(), reporter).unwrap();
        let specs = [
            StaticSpec::new_static("zz", [(1.0, [0, 1])]),
            StaticSpec::new_static("+-", [(1.0, [0, 1])]),
        ];
        let res = checker.check_hermitian(&specs, &[]);
        assert!(matches!(
            res,
            Err(OpError::NotHermitian { part: TermPart::Static, ref opstrs })
                if opstrs == &vec!["+-".to_string(), "-+".to_string()]
        ));
        drop(checker);
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].offending, vec![OpString::new("+-", [0, 1], 1.0)]);
        assert_eq!(seen[0].missing, vec![OpString::new("-+", [0, 1], 1.0)]);
    }

    #[test]
    fn complex_couplings_must_conjugate() {
        let basis = SpinBasis::new(1).unwrap();
        let mut checker = ConsistencyChecker::new(&basis, herm_only(), Unattended).unwrap();
        let imag = [StaticSpec::new_static("z", [(C64::new(0.0, 1.0), [0])])];
        assert!(checker.check_hermitian(&imag, &[]).is_err());
        let y = [StaticSpec::new_static("y", [(1.0, [0])])];
        assert!(checker.check_hermitian(&y, &[]).is_ok());
    }

    #[test]
    fn dynamic_terms_checked_separately() {
        let basis = SpinBasis::new(2).unwrap();
        let mut checker = ConsistencyChecker::new(&basis, herm_only(), Unattended).unwrap();
        let drive = TimeDep::new(|t: f64, args: &[f64]| C64::from((args[0] * t).cos()), [2.0]);
        let ok = [DynamicSpec::with_time_dep("x", [(1.0, [0]), (1.0, [1])], drive.clone())];
        assert_eq!(checker.check_hermitian(&[], &ok).unwrap(), CheckOutcome::Passed);

        let phase = TimeDep::new(|t: f64, _: &[f64]| C64::from_polar(1.0, t), []);
        let bad = [DynamicSpec::with_time_dep("z", [(1.0, [0])], phase)];
        assert!(matches!(
            checker.check_hermitian(&[], &bad),
            Err(OpError::NotHermitian { part: TermPart::Dynamic, .. })
        ));
    }

    #[test]
    fn pcon_counts_ladder_symbols() {
        let basis = SpinBasis::new(2).unwrap().conserving_magnetization();
        let config = CheckConfig::none().with(CheckKind::ParticleConservation, true);
        let mut checker = ConsistencyChecker::new(&basis, config, Unattended).unwrap();
        let hopping = [StaticSpec::new_static("+-", [(1.0, [0, 1])])];
        assert_eq!(checker.check_pcon(&hopping, &[]).unwrap(), CheckOutcome::Passed);
        let field = [StaticSpec::new_static("x", [(1.0, [1])])];
        assert!(matches!(
            checker.check_pcon(&field, &[]),
            Err(OpError::ParticleNonConserving { .. })
        ));
    }

    #[test]
    fn pcon_skipped_when_not_enforced() {
        let basis = SpinBasis::new(2).unwrap();
        let mut checker = ConsistencyChecker::new(&basis, CheckConfig::default(), Unattended)
            .unwrap();
        let field = [StaticSpec::new_static("+", [(1.0, [1])])];
        assert_eq!(checker.check_pcon(&field, &[]).unwrap(), CheckOutcome::Skipped);
    }

    struct Bare;

    impl OperatorBasis for Bare {
        fn ns(&self) -> usize { 1 }

        fn op_elements(&self, _op: &OpString) -> OpResult<CooElements<C64>> {
            CooElements::new(
                vec![C64::from(1.0)].into(), vec![0].into(), vec![0].into())
        }
    }

    #[test]
    fn missing_capability_found_at_construction() {
        let res = ConsistencyChecker::new(&Bare, CheckConfig::default(), Unattended);
        assert!(matches!(
            res,
            Err(OpError::MissingCapability {
                hook: "sort_opstr",
                required_by: Requirement::Check(CheckKind::Hermiticity),
            })
        ));
        let config = CheckConfig::default().with(CheckKind::Hermiticity, false);
        let mut checker = ConsistencyChecker::new(&Bare, config, Unattended).unwrap();
        let specs = [StaticSpec::new_static("a", [(1.0, [0])])];
        assert_eq!(checker.check_symm(&specs, &[]).unwrap(), CheckOutcome::Skipped);
        assert_eq!(checker.check_pcon(&specs, &[]).unwrap(), CheckOutcome::Skipped);
        assert!(checker.check_all(&specs, &[]).is_ok());
    }
}
