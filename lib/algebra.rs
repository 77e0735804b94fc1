//! Term normalization, expansion, and consolidation.
//!
//! These three stages turn user input into a minimal canonical term list:
//! ```text
//! [OpSpec] --normalize--> [Term] --expand--> [Term] --consolidate--> [Term]
//! ```
//! Provenance (the positions of the input bonds a term came from) is carried
//! through every stage so that a term surviving consolidation can be traced
//! back to the entries that produced it.

use std::{ cmp::Ordering, collections::BTreeSet };
use indexmap::{ IndexMap, map::Entry };
use num_complex::Complex64 as C64;
use num_traits::Zero;
use crate::{
    error::{ OpError, OpResult, Requirement },
    hilbert::{ CanonicalOrder, Decompose, OperatorBasis },
    terms::{
        Attachment,
        Bond,
        DynamicSpec,
        OpSpec,
        OpString,
        StaticSpec,
        Term,
        TermKey,
    },
};

/// Flatten input entries into one canonically ordered term per bond.
///
/// The provenance of each output term is its own position in the output.
///
/// Fails if a bond's site count differs from the length of its operator
/// string.
pub fn normalize<D>(order: &dyn CanonicalOrder, specs: &[OpSpec<D>])
    -> OpResult<Vec<Term<D>>>
where D: Attachment
{
    let mut terms: Vec<Term<D>> = Vec::new();
    for spec in specs.iter() {
        let n_symbols = spec.opstr.chars().count();
        for bond in spec.bonds.iter() {
            if bond.sites.len() != n_symbols {
                return Err(OpError::OpstrLength {
                    opstr: spec.opstr.clone(),
                    n_symbols,
                    n_sites: bond.sites.len(),
                });
            }
            let op = OpString {
                opstr: spec.opstr.clone(),
                indices: bond.sites.clone(),
                coupling: bond.coupling,
            };
            let position = terms.len();
            terms.push(Term {
                op: order.sort_opstr(op),
                provenance: BTreeSet::from([position]),
                dep: spec.dep.clone(),
            });
        }
    }
    Ok(terms)
}

/// Rewrite every term in elementary symbols, dropping those guaranteed to
/// vanish.
///
/// Each output term inherits the provenance and attachment of the term it was
/// expanded from, and is put back into canonical order.
pub fn expand<D>(
    decomp: &dyn Decompose,
    order: &dyn CanonicalOrder,
    terms: &[Term<D>],
) -> Vec<Term<D>>
where D: Attachment
{
    terms.iter()
        .flat_map(|term| {
            decomp.expand_opstr(&term.op).into_iter()
                .filter(|op| decomp.non_zero(op))
                .map(|op| Term {
                    op: order.sort_opstr(op),
                    provenance: term.provenance.clone(),
                    dep: term.dep.clone(),
                })
        })
        .collect()
}

/// Order in which the contributions to a single term are summed.
///
/// Sorting by real part, then by magnitude of the imaginary part, makes the sum
/// independent of input order and maps conjugate inputs to conjugate sums.
fn summation_order(a: &C64, b: &C64) -> Ordering {
    a.re.total_cmp(&b.re)
        .then_with(|| a.im.abs().total_cmp(&b.im.abs()))
        .then_with(|| a.im.total_cmp(&b.im))
}

/// Merge terms with equal canonical keys, summing couplings and joining
/// provenance, then drop every term whose summed coupling is exactly zero.
///
/// Output order follows the first appearance of each key. Couplings within a
/// key are summed in a fixed order, so the result does not depend on the order
/// of the input.
///
/// Fails if two terms with the same key carry incompatible attachments (i.e.
/// dynamic terms with different time dependence).
pub fn consolidate<D>(terms: Vec<Term<D>>) -> OpResult<Vec<Term<D>>>
where D: Attachment
{
    let mut groups: IndexMap<TermKey, (Term<D>, Vec<C64>)> = IndexMap::new();
    for term in terms.into_iter() {
        match groups.entry(term.key()) {
            Entry::Vacant(slot) => {
                let coupling = term.op.coupling;
                slot.insert((term, vec![coupling]));
            },
            Entry::Occupied(mut slot) => {
                let (acc, parts) = slot.get_mut();
                if !acc.dep.compatible(&term.dep) {
                    let TermKey { opstr, indices } = slot.key().clone();
                    return Err(OpError::ConflictingTimeDep { opstr, indices });
                }
                parts.push(term.op.coupling);
                acc.provenance.extend(term.provenance);
            },
        }
    }
    Ok(
        groups.into_values()
            .filter_map(|(mut term, mut parts)| {
                parts.sort_by(summation_order);
                term.op.coupling = parts.into_iter().sum();
                (!term.op.coupling.is_zero()).then_some(term)
            })
            .collect()
    )
}

/// Compute the minimal canonical list of elementary terms for a set of input
/// entries.
pub fn canonical_expanded<D>(
    order: &dyn CanonicalOrder,
    decomp: &dyn Decompose,
    specs: &[OpSpec<D>],
) -> OpResult<Vec<Term<D>>>
where D: Attachment
{
    let normalized = normalize(order, specs)?;
    let expanded = expand(decomp, order, &normalized);
    log::debug!(
        "expanded {} normalized terms into {} elementary terms",
        normalized.len(),
        expanded.len(),
    );
    consolidate(expanded)
}

/// Rewrite static and dynamic input entries in terms of elementary symbols
/// only, with all equal terms merged and vanishing ones removed.
///
/// Static output is grouped by operator string; dynamic output is grouped by
/// operator string and time dependence. Groups appear in order of first
/// appearance.
///
/// Fails if the basis lacks a canonical order or a decomposition.
pub fn expanded_form<'a, B>(
    basis: &B,
    static_specs: &[StaticSpec],
    dynamic_specs: &[DynamicSpec<'a>],
) -> OpResult<(Vec<StaticSpec>, Vec<DynamicSpec<'a>>)>
where B: OperatorBasis + ?Sized
{
    let order = basis.canonical_order()
        .ok_or(OpError::MissingCapability {
            hook: "sort_opstr",
            required_by: Requirement::ExpandedForm,
        })?;
    let decomp = basis.decomposition()
        .ok_or(OpError::MissingCapability {
            hook: "expand_opstr",
            required_by: Requirement::ExpandedForm,
        })?;
    let static_terms = canonical_expanded(order, decomp, static_specs)?;
    let dynamic_terms = canonical_expanded(order, decomp, dynamic_specs)?;
    Ok((regroup(static_terms), regroup(dynamic_terms)))
}

fn regroup<D>(terms: Vec<Term<D>>) -> Vec<OpSpec<D>>
where D: Attachment
{
    let mut specs: Vec<OpSpec<D>> = Vec::new();
    for Term { op, dep, .. } in terms.into_iter() {
        let bond = Bond { coupling: op.coupling, sites: op.indices };
        if let Some(spec)
            = specs.iter_mut()
            .find(|spec| spec.opstr == op.opstr && spec.dep.compatible(&dep))
        {
            spec.bonds.push(bond);
        } else {
            specs.push(OpSpec { opstr: op.opstr, bonds: vec![bond], dep });
        }
    }
    specs
}
