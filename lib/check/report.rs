//! Violation records and the injectable interface used to present them.

use std::{
    fmt,
    io::{ self, Write },
};
use itertools::Itertools;
use crate::{
    error::{ CheckKind, OpError, TermPart },
    terms::OpString,
};

/// A failed consistency check.
#[derive(Clone, Debug, PartialEq)]
pub struct Violation {
    pub check: CheckKind,
    /// Label of the violated symmetry, for symmetry checks.
    pub symmetry: Option<String>,
    pub part: TermPart,
    /// Input terms responsible for the violation.
    pub offending: Vec<OpString>,
    /// Terms that would have to be added to restore consistency.
    pub missing: Vec<OpString>,
    /// Time at which dynamic couplings were evaluated, if any.
    pub time: Option<f64>,
}

impl Violation {
    pub(crate) fn new(check: CheckKind, part: TermPart) -> Self {
        Self {
            check,
            symmetry: None,
            part,
            offending: Vec::new(),
            missing: Vec::new(),
            time: None,
        }
    }

    /// Return the distinct operator strings involved, in order of first
    /// appearance.
    pub fn unique_opstrs(&self) -> Vec<String> {
        self.offending.iter()
            .chain(self.missing.iter())
            .map(|op| op.opstr.clone())
            .unique()
            .collect()
    }

    /// Total number of reported terms.
    pub fn len(&self) -> usize { self.offending.len() + self.missing.len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Convert to the corresponding hard failure.
    pub fn into_error(self) -> OpError {
        let opstrs = self.unique_opstrs();
        match self.check {
            CheckKind::Hermiticity
                => OpError::NotHermitian { part: self.part, opstrs },
            CheckKind::Symmetry
                => OpError::SymmetryViolated {
                    symmetry: self.symmetry.unwrap_or_default(),
                    part: self.part,
                    opstrs,
                },
            CheckKind::ParticleConservation
                => OpError::ParticleNonConserving { part: self.part, opstrs },
        }
    }
}

fn write_listing(f: &mut fmt::Formatter<'_>, header: &str, ops: &[OpString])
    -> fmt::Result
{
    if ops.is_empty() { return Ok(()); }
    writeln!(f)?;
    write!(f, "  {}:", header)?;
    for (k, op) in ops.iter().enumerate() {
        writeln!(f)?;
        write!(f, "    {}. {}", k + 1, op)?;
    }
    Ok(())
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed for {} terms", self.check, self.part)?;
        if let Some(symmetry) = &self.symmetry {
            write!(f, " under {}", symmetry)?;
        }
        if let Some(t) = self.time {
            write!(f, " at t = {}", t)?;
        }
        write_listing(f, "offending (opstr, indices, coupling)", &self.offending)?;
        write_listing(f, "missing (opstr, indices, coupling)", &self.missing)?;
        Ok(())
    }
}

/// Decides whether, and how, the details of a violation are presented before
/// the check fails.
///
/// The check fails regardless of what a reporter does.
pub trait Reporter {
    /// Return `true` if every offending term should be shown.
    fn prompt(&mut self, violation: &Violation) -> bool;

    /// Present every offending term.
    fn show(&mut self, violation: &Violation) {
        log::warn!("{}", violation);
    }
}

/// Never shows details; suitable for unattended runs.
#[derive(Copy, Clone, Debug, Default)]
pub struct Unattended;

impl Reporter for Unattended {
    fn prompt(&mut self, _violation: &Violation) -> bool { false }
}

/// Always logs full details.
#[derive(Copy, Clone, Debug, Default)]
pub struct ShowAll;

impl Reporter for ShowAll {
    fn prompt(&mut self, _violation: &Violation) -> bool { true }
}

/// Asks on the terminal whether details should be printed.
#[derive(Copy, Clone, Debug, Default)]
pub struct StdinPrompt;

impl Reporter for StdinPrompt {
    fn prompt(&mut self, violation: &Violation) -> bool {
        let stdin = io::stdin();
        let mut line = String::new();
        loop {
            eprint!("Display all {} couplings? (y or n) ", violation.len());
            io::stderr().flush().ok();
            line.clear();
            match stdin.read_line(&mut line) {
                Ok(0) | Err(_) => { return false; },
                Ok(_) => { },
            }
            match line.trim() {
                "y" | "yes" => { return true; },
                "n" | "no" => { return false; },
                _ => { continue; },
            }
        }
    }

    fn show(&mut self, violation: &Violation) {
        eprintln!("{}", violation);
    }
}

impl<F> Reporter for F
where F: FnMut(&Violation) -> bool
{
    fn prompt(&mut self, violation: &Violation) -> bool { self(violation) }
}
