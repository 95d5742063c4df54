use super::element::Element;
use nalgebra::Point3;

/// An atom of a parsed structure.
///
/// Hydrogens are either explicit graph atoms, a fixed count declared by the input
/// (bracket atoms in SMILES), or derived from the element's default valence when
/// `hydrogens` is `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// The chemical element.
    pub element: Element,
    /// Formal charge in elementary charge units.
    pub formal_charge: i8,
    /// Mass number, when an isotope was specified.
    pub isotope: Option<u16>,
    /// Whether the atom is part of an aromatic system.
    pub aromatic: bool,
    /// Declared hydrogen count; `None` means implicit hydrogens are derived from valence.
    pub hydrogens: Option<u8>,
    /// Coordinates in Angstroms; all zero for structures read from line notations.
    pub position: Point3<f64>,
}

impl Atom {
    pub fn new(element: Element) -> Self {
        Self {
            element,
            formal_charge: 0,
            isotope: None,
            aromatic: false,
            hydrogens: None,
            position: Point3::origin(),
        }
    }

    pub fn with_position(element: Element, position: Point3<f64>) -> Self {
        Self {
            position,
            ..Self::new(element)
        }
    }

    pub fn is_heavy(&self) -> bool {
        !self.element.is_hydrogen()
    }

    /// Mass of the atom itself, honouring an explicit isotope.
    pub fn mass(&self) -> f64 {
        match self.isotope {
            Some(mass_number) => f64::from(mass_number),
            None => self.element.atomic_mass(),
        }
    }

    /// Valence targets for implicit-hydrogen derivation, shifted by formal charge.
    ///
    /// Group 15/16 elements gain a bond per positive charge (`[NH4+]`), everything
    /// else loses one per unit of charge in either direction (`[CH3-]`, `[CH3+]`).
    pub(crate) fn adjusted_valences(&self) -> impl Iterator<Item = i16> + '_ {
        let charge = i16::from(self.formal_charge);
        let pnictogen_or_chalcogen = matches!(
            self.element,
            Element::N | Element::P | Element::O | Element::S
        );
        self.element.default_valences().iter().map(move |&v| {
            if pnictogen_or_chalcogen {
                i16::from(v) + charge
            } else {
                i16::from(v) - charge.abs()
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_atom_has_neutral_defaults() {
        let atom = Atom::new(Element::C);
        assert_eq!(atom.formal_charge, 0);
        assert_eq!(atom.isotope, None);
        assert!(!atom.aromatic);
        assert_eq!(atom.hydrogens, None);
        assert_eq!(atom.position, Point3::origin());
    }

    #[test]
    fn isotope_overrides_standard_mass() {
        let mut atom = Atom::new(Element::C);
        assert!((atom.mass() - 12.011).abs() < 1e-9);
        atom.isotope = Some(13);
        assert!((atom.mass() - 13.0).abs() < 1e-9);
    }

    #[test]
    fn charge_shifts_valence_targets() {
        let mut nitrogen = Atom::new(Element::N);
        nitrogen.formal_charge = 1;
        assert_eq!(nitrogen.adjusted_valences().collect::<Vec<_>>(), vec![4, 6]);

        let mut carbon = Atom::new(Element::C);
        carbon.formal_charge = -1;
        assert_eq!(carbon.adjusted_valences().collect::<Vec<_>>(), vec![3]);
    }
}
