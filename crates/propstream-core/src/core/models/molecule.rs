use super::annotations::Annotations;
use super::atom::Atom;
use super::element::Element;
use super::ids::AtomId;
use super::topology::{Bond, BondOrder};
use slotmap::{SecondaryMap, SlotMap};
use std::collections::{HashMap, VecDeque};

/// Annotation name reserved for a record's display identifier (the molfile title line).
pub const NAME_ANNOTATION: &str = "_Name";

const HYDROGEN_MASS: f64 = 1.008;

/// A parsed chemical structure together with its string annotations.
///
/// This is the handle every reader produces and every writer consumes. Atom
/// identity is a slotmap key, so ids stay valid for the lifetime of the value
/// and iteration follows insertion order.
#[derive(Debug, Clone, Default)]
pub struct Molecule {
    atoms: SlotMap<AtomId, Atom>,
    bonds: Vec<Bond>,
    bond_adjacency: SecondaryMap<AtomId, Vec<AtomId>>,
    annotations: Annotations,
}

impl Molecule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_atom(&mut self, atom: Atom) -> AtomId {
        let id = self.atoms.insert(atom);
        self.bond_adjacency.insert(id, Vec::new());
        id
    }

    /// Adds a bond between two atoms.
    ///
    /// Returns `None` if either atom does not exist, the atoms are the same, or
    /// the pair is already bonded.
    pub fn add_bond(&mut self, atom1_id: AtomId, atom2_id: AtomId, order: BondOrder) -> Option<()> {
        if atom1_id == atom2_id
            || !self.atoms.contains_key(atom1_id)
            || !self.atoms.contains_key(atom2_id)
        {
            return None;
        }
        if self.bond_adjacency[atom1_id].contains(&atom2_id) {
            return None;
        }

        self.bonds.push(Bond::new(atom1_id, atom2_id, order));
        self.bond_adjacency[atom1_id].push(atom2_id);
        self.bond_adjacency[atom2_id].push(atom1_id);
        Some(())
    }

    pub fn atom(&self, id: AtomId) -> Option<&Atom> {
        self.atoms.get(id)
    }

    pub fn atom_mut(&mut self, id: AtomId) -> Option<&mut Atom> {
        self.atoms.get_mut(id)
    }

    pub fn atoms_iter(&self) -> impl Iterator<Item = (AtomId, &Atom)> {
        self.atoms.iter()
    }

    pub fn atom_ids(&self) -> impl Iterator<Item = AtomId> + '_ {
        self.atoms.keys()
    }

    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }

    pub fn bond_between(&self, atom1_id: AtomId, atom2_id: AtomId) -> Option<&Bond> {
        self.bonds
            .iter()
            .find(|b| b.partner(atom1_id) == Some(atom2_id))
    }

    pub fn get_bonded_neighbors(&self, atom_id: AtomId) -> Option<&[AtomId]> {
        self.bond_adjacency.get(atom_id).map(|v| v.as_slice())
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    pub fn bond_count(&self) -> usize {
        self.bonds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }

    pub fn annotations_mut(&mut self) -> &mut Annotations {
        &mut self.annotations
    }

    pub fn name(&self) -> Option<&str> {
        self.annotations.get(NAME_ANNOTATION)
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.annotations.set(NAME_ANNOTATION, name);
    }

    /// Number of hydrogens carried by the atom that are not graph atoms.
    pub fn implicit_hydrogens(&self, atom_id: AtomId) -> u8 {
        let Some(atom) = self.atoms.get(atom_id) else {
            return 0;
        };
        match atom.hydrogens {
            Some(declared) => declared,
            None => self.derived_hydrogens(atom_id),
        }
    }

    /// Hydrogen count the default-valence model gives the atom, ignoring any declared count.
    pub fn derived_hydrogens(&self, atom_id: AtomId) -> u8 {
        let Some(atom) = self.atoms.get(atom_id) else {
            return 0;
        };

        let mut used: i16 = self
            .bonds
            .iter()
            .filter(|b| b.contains(atom_id))
            .map(|b| i16::from(b.order.valence_contribution()))
            .sum();
        if atom.aromatic {
            used += 1;
        }

        atom.adjusted_valences()
            .find(|&v| v >= used)
            .map(|v| (v - used).clamp(0, i16::from(u8::MAX)) as u8)
            .unwrap_or(0)
    }

    /// Atoms with atomic number above one; explicit hydrogen atoms are not counted.
    pub fn heavy_atom_count(&self) -> usize {
        self.atoms.values().filter(|a| a.is_heavy()).count()
    }

    /// Heavy atoms other than carbon.
    pub fn hetero_atom_count(&self) -> usize {
        self.atoms
            .values()
            .filter(|a| a.is_heavy() && a.element != Element::C)
            .count()
    }

    /// Average molecular weight in g/mol, including implicit hydrogens.
    pub fn molecular_weight(&self) -> f64 {
        self.atoms
            .iter()
            .map(|(id, atom)| atom.mass() + f64::from(self.implicit_hydrogens(id)) * HYDROGEN_MASS)
            .sum()
    }

    pub fn net_charge(&self) -> i32 {
        self.atoms.values().map(|a| i32::from(a.formal_charge)).sum()
    }

    /// Number of independent rings (cyclomatic number of the bond graph).
    pub fn ring_count(&self) -> usize {
        (self.bonds.len() + self.fragment_atom_sets().len()).saturating_sub(self.atoms.len())
    }

    /// Connected components as atom id sets, ordered by their first atom in insertion order.
    pub fn fragment_atom_sets(&self) -> Vec<Vec<AtomId>> {
        let mut seen: SecondaryMap<AtomId, ()> = SecondaryMap::new();
        let mut fragments = Vec::new();

        for start in self.atoms.keys() {
            if seen.contains_key(start) {
                continue;
            }
            let mut members = Vec::new();
            let mut queue = VecDeque::from([start]);
            seen.insert(start, ());
            while let Some(current) = queue.pop_front() {
                members.push(current);
                for &next in &self.bond_adjacency[current] {
                    if seen.insert(next, ()).is_none() {
                        queue.push_back(next);
                    }
                }
            }
            fragments.push(members);
        }
        fragments
    }

    pub fn fragment_count(&self) -> usize {
        self.fragment_atom_sets().len()
    }

    /// Splits the structure into one molecule per connected component.
    ///
    /// Atoms keep their relative insertion order inside each fragment.
    /// Annotations are not carried over.
    pub fn fragments(&self) -> Vec<Molecule> {
        let order: HashMap<AtomId, usize> =
            self.atoms.keys().enumerate().map(|(i, id)| (id, i)).collect();
        self.fragment_atom_sets()
            .into_iter()
            .map(|mut members| {
                members.sort_by_key(|id| order[id]);
                self.extract(&members)
            })
            .collect()
    }

    fn extract(&self, atom_ids: &[AtomId]) -> Molecule {
        let mut fragment = Molecule::new();
        let mut mapping: SecondaryMap<AtomId, AtomId> = SecondaryMap::new();
        for &old_id in atom_ids {
            let new_id = fragment.add_atom(self.atoms[old_id].clone());
            mapping.insert(old_id, new_id);
        }
        for bond in &self.bonds {
            if let (Some(&a1), Some(&a2)) = (mapping.get(bond.atom1_id), mapping.get(bond.atom2_id)) {
                fragment.add_bond(a1, a2, bond.order);
            }
        }
        fragment
    }
}
