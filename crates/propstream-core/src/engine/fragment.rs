use crate::core::models::molecule::Molecule;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum FragmentError {
    #[error("Invalid fragment mode '{0}' (expected 'hac' or 'mw')")]
    InvalidMode(String),
}

/// Criterion for choosing the dominant fragment of a multi-fragment structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentMode {
    HeavyAtomCount,
    MolecularWeight,
}

impl FromStr for FragmentMode {
    type Err = FragmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hac" | "by-heavy-atom-count" => Ok(FragmentMode::HeavyAtomCount),
            "mw" | "by-molecular-weight" => Ok(FragmentMode::MolecularWeight),
            _ => Err(FragmentError::InvalidMode(s.to_string())),
        }
    }
}

impl fmt::Display for FragmentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FragmentMode::HeavyAtomCount => f.write_str("hac"),
            FragmentMode::MolecularWeight => f.write_str("mw"),
        }
    }
}

/// Reduces `molecule` to its dominant connected fragment.
///
/// Fragments are compared in order of their lowest atom index and a later
/// fragment only wins when its score is strictly greater, so ties go to the
/// earliest one. Every annotation of the input, `_Name` included, is copied
/// onto the result. Single-fragment (and empty) structures are returned
/// unchanged.
pub fn select(molecule: Molecule, mode: FragmentMode) -> Molecule {
    if molecule.fragment_count() <= 1 {
        return molecule;
    }

    let score = |fragment: &Molecule| match mode {
        FragmentMode::HeavyAtomCount => fragment.heavy_atom_count() as f64,
        FragmentMode::MolecularWeight => fragment.molecular_weight(),
    };

    let mut fragments = molecule.fragments().into_iter().enumerate();
    let Some((_, mut best)) = fragments.next() else {
        return molecule;
    };
    let mut best_index = 0;
    let mut best_score = score(&best);
    for (index, fragment) in fragments {
        let s = score(&fragment);
        if s > best_score {
            best = fragment;
            best_index = index;
            best_score = s;
        }
    }

    debug!(%mode, fragment = best_index, score = best_score, "Selected dominant fragment");
    *best.annotations_mut() = molecule.annotations().clone();
    best
}
