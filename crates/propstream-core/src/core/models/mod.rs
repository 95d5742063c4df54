//! # Core Models Module
//!
//! Data structures for the structures that flow through the pipeline.
//!
//! ## Key Components
//!
//! - [`molecule`] - The structure handle: atom graph plus ordered string annotations
//! - [`atom`] - Individual atoms with element, charge, isotope and hydrogen count
//! - [`element`] - Element symbols, atomic masses and default valences
//! - [`topology`] - Bonds and bond orders
//! - [`annotations`] - The insertion-ordered annotation store
//! - [`ids`] - Slotmap key type for atoms
//!
//! ## Usage
//!
//! ```ignore
//! use propstream::core::models::{atom::Atom, element::Element, molecule::Molecule, topology::BondOrder};
//!
//! let mut mol = Molecule::new();
//! let c = mol.add_atom(Atom::new(Element::C));
//! let o = mol.add_atom(Atom::new(Element::O));
//! mol.add_bond(c, o, BondOrder::Single);
//! mol.set_name("methanol");
//! assert_eq!(mol.heavy_atom_count(), 2);
//! ```

pub mod annotations;
pub mod atom;
pub mod element;
pub mod ids;
pub mod molecule;
pub mod topology;
