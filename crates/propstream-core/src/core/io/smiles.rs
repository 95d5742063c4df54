use crate::core::models::atom::Atom;
use crate::core::models::element::Element;
use crate::core::models::ids::AtomId;
use crate::core::models::molecule::Molecule;
use crate::core::models::topology::BondOrder;
use slotmap::SecondaryMap;
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SmilesError {
    #[error("SMILES string is empty")]
    Empty,
    #[error("Parse error at position {position}: {kind}")]
    Parse {
        position: usize,
        kind: SmilesParseErrorKind,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SmilesParseErrorKind {
    #[error("unexpected character '{0}'")]
    UnexpectedCharacter(char),
    #[error("unknown element '{0}'")]
    UnknownElement(String),
    #[error("unterminated bracket atom")]
    UnterminatedBracket,
    #[error("branch or bond without a preceding atom")]
    MissingAtom,
    #[error("unbalanced parenthesis")]
    UnbalancedParenthesis,
    #[error("bond symbol not followed by an atom")]
    DanglingBond,
    #[error("ring closure {0} was never closed")]
    UnclosedRing(u16),
    #[error("ring closure {0} has conflicting bond orders")]
    ConflictingRingBond(u16),
    #[error("ring closure {0} duplicates an existing bond")]
    DuplicateBond(u16),
    #[error("quadruple bonds are not supported")]
    UnsupportedBond,
}

/// Parses a SMILES string into a molecule.
///
/// Supports the organic subset, bracket atoms (isotope, hydrogen count, charge,
/// atom class), explicit bonds, branches, ring closures and `.` separated
/// fragments. Stereo markers (`@`, `/`, `\`) are accepted and discarded.
pub fn parse(text: &str) -> Result<Molecule, SmilesError> {
    if text.trim().is_empty() {
        return Err(SmilesError::Empty);
    }
    Parser::new(text).run()
}

/// Renders a molecule as a SMILES string.
///
/// The output is deterministic for a given atom order but is not canonical:
/// traversal starts at the first atom of each fragment and follows bonds in
/// insertion order. Fragments are joined with `.`.
pub fn write(mol: &Molecule) -> String {
    mol.fragment_atom_sets()
        .iter()
        .filter_map(|fragment| fragment.first())
        .map(|&start| ComponentWriter::new(mol).write(start))
        .collect::<Vec<_>>()
        .join(".")
}

#[derive(Clone, Copy)]
struct PendingBond {
    order: BondOrder,
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    mol: Molecule,
    prev: Option<AtomId>,
    branches: Vec<Option<AtomId>>,
    pending: Option<PendingBond>,
    rings: HashMap<u16, (AtomId, Option<BondOrder>)>,
}

impl Parser {
    fn new(text: &str) -> Self {
        Self {
            chars: text.trim().chars().collect(),
            pos: 0,
            mol: Molecule::new(),
            prev: None,
            branches: Vec::new(),
            pending: None,
            rings: HashMap::new(),
        }
    }

    fn error(&self, kind: SmilesParseErrorKind) -> SmilesError {
        SmilesError::Parse {
            position: self.pos,
            kind,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn run(mut self) -> Result<Molecule, SmilesError> {
        while let Some(c) = self.peek() {
            match c {
                '(' => {
                    if self.prev.is_none() {
                        return Err(self.error(SmilesParseErrorKind::MissingAtom));
                    }
                    self.branches.push(self.prev);
                    self.pos += 1;
                }
                ')' => {
                    if self.pending.is_some() {
                        return Err(self.error(SmilesParseErrorKind::DanglingBond));
                    }
                    let Some(restored) = self.branches.pop() else {
                        return Err(self.error(SmilesParseErrorKind::UnbalancedParenthesis));
                    };
                    self.prev = restored;
                    self.pos += 1;
                }
                '-' | '=' | '#' | '$' | ':' | '/' | '\\' => {
                    if self.prev.is_none() || self.pending.is_some() {
                        return Err(self.error(SmilesParseErrorKind::MissingAtom));
                    }
                    let order = match c {
                        '=' => BondOrder::Double,
                        '#' => BondOrder::Triple,
                        ':' => BondOrder::Aromatic,
                        '$' => return Err(self.error(SmilesParseErrorKind::UnsupportedBond)),
                        _ => BondOrder::Single,
                    };
                    self.pending = Some(PendingBond { order });
                    self.pos += 1;
                }
                '.' => {
                    if self.pending.is_some() {
                        return Err(self.error(SmilesParseErrorKind::DanglingBond));
                    }
                    self.prev = None;
                    self.pos += 1;
                }
                '0'..='9' | '%' => self.ring_closure()?,
                '[' => {
                    let atom = self.bracket_atom()?;
                    self.attach(atom)?;
                }
                _ => {
                    let atom = self.organic_atom()?;
                    self.attach(atom)?;
                }
            }
        }

        if !self.branches.is_empty() {
            return Err(self.error(SmilesParseErrorKind::UnbalancedParenthesis));
        }
        if self.pending.is_some() {
            return Err(self.error(SmilesParseErrorKind::DanglingBond));
        }
        if let Some(&number) = self.rings.keys().min() {
            return Err(self.error(SmilesParseErrorKind::UnclosedRing(number)));
        }
        Ok(self.mol)
    }

    fn implicit_order(&self, a: AtomId, b: AtomId) -> BondOrder {
        let aromatic = |id| self.mol.atom(id).is_some_and(|atom| atom.aromatic);
        if aromatic(a) && aromatic(b) {
            BondOrder::Aromatic
        } else {
            BondOrder::Single
        }
    }

    fn attach(&mut self, atom: Atom) -> Result<(), SmilesError> {
        let id = self.mol.add_atom(atom);
        if let Some(prev) = self.prev {
            let order = match self.pending.take() {
                Some(pending) => pending.order,
                None => self.implicit_order(prev, id),
            };
            self.mol.add_bond(prev, id, order);
        } else if self.pending.is_some() {
            return Err(self.error(SmilesParseErrorKind::DanglingBond));
        }
        self.prev = Some(id);
        Ok(())
    }

    fn ring_closure(&mut self) -> Result<(), SmilesError> {
        let Some(current) = self.prev else {
            return Err(self.error(SmilesParseErrorKind::MissingAtom));
        };
        let number = if self.peek() == Some('%') {
            let digits: String = self.chars.iter().skip(self.pos + 1).take(2).collect();
            if digits.len() != 2 || !digits.chars().all(|c| c.is_ascii_digit()) {
                return Err(self.error(SmilesParseErrorKind::UnexpectedCharacter('%')));
            }
            self.pos += 3;
            digits.parse::<u16>().unwrap_or_default()
        } else {
            let digit = self.peek().and_then(|c| c.to_digit(10)).unwrap_or_default();
            self.pos += 1;
            digit as u16
        };

        let bond = self.pending.take().map(|p| p.order);
        match self.rings.remove(&number) {
            Some((opener, opener_bond)) => {
                let order = match (opener_bond, bond) {
                    (Some(a), Some(b)) if a != b => {
                        return Err(self.error(SmilesParseErrorKind::ConflictingRingBond(number)));
                    }
                    (Some(a), _) | (None, Some(a)) => a,
                    (None, None) => self.implicit_order(opener, current),
                };
                if self.mol.add_bond(opener, current, order).is_none() {
                    return Err(self.error(SmilesParseErrorKind::DuplicateBond(number)));
                }
            }
            None => {
                self.rings.insert(number, (current, bond));
            }
        }
        Ok(())
    }

    fn organic_atom(&mut self) -> Result<Atom, SmilesError> {
        let c = self.peek().unwrap_or_default();
        let two: String = self.chars.iter().skip(self.pos).take(2).collect();
        let (element, aromatic, width) = match two.as_str() {
            "Cl" => (Element::Cl, false, 2),
            "Br" => (Element::Br, false, 2),
            _ => match c {
                'B' => (Element::B, false, 1),
                'C' => (Element::C, false, 1),
                'N' => (Element::N, false, 1),
                'O' => (Element::O, false, 1),
                'P' => (Element::P, false, 1),
                'S' => (Element::S, false, 1),
                'F' => (Element::F, false, 1),
                'I' => (Element::I, false, 1),
                'b' => (Element::B, true, 1),
                'c' => (Element::C, true, 1),
                'n' => (Element::N, true, 1),
                'o' => (Element::O, true, 1),
                'p' => (Element::P, true, 1),
                's' => (Element::S, true, 1),
                _ => return Err(self.error(SmilesParseErrorKind::UnexpectedCharacter(c))),
            },
        };
        self.pos += width;
        let mut atom = Atom::new(element);
        atom.aromatic = aromatic;
        Ok(atom)
    }

    fn read_number(&mut self) -> Option<u32> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if start == self.pos {
            return None;
        }
        self.chars[start..self.pos]
            .iter()
            .collect::<String>()
            .parse()
            .ok()
    }

    fn bracket_atom(&mut self) -> Result<Atom, SmilesError> {
        self.pos += 1;
        let isotope = self.read_number().map(|n| n.min(u32::from(u16::MAX)) as u16);

        let (element, aromatic) = self.bracket_symbol()?;

        while self.peek() == Some('@') {
            self.pos += 1;
        }
        if self.peek().is_some_and(|c| c.is_ascii_uppercase() && c != 'H') {
            // Extended chirality classes such as @TH1 or @SP2.
            while self
                .peek()
                .is_some_and(|c| c.is_ascii_uppercase() && c != 'H')
            {
                self.pos += 1;
            }
            self.read_number();
        }

        let mut hydrogens = 0u8;
        if self.peek() == Some('H') {
            self.pos += 1;
            hydrogens = self
                .read_number()
                .map_or(1, |n| n.min(u32::from(u8::MAX)) as u8);
        }

        let mut charge: i32 = 0;
        while let Some(sign @ ('+' | '-')) = self.peek() {
            self.pos += 1;
            let unit = if sign == '+' { 1 } else { -1 };
            match self.read_number() {
                Some(magnitude) => charge += unit * magnitude.min(15) as i32,
                None => charge += unit,
            }
        }

        if self.peek() == Some(':') {
            self.pos += 1;
            self.read_number();
        }

        if self.peek() != Some(']') {
            return Err(self.error(SmilesParseErrorKind::UnterminatedBracket));
        }
        self.pos += 1;

        let mut atom = Atom::new(element);
        atom.isotope = isotope;
        atom.aromatic = aromatic;
        atom.hydrogens = Some(hydrogens);
        atom.formal_charge = charge.clamp(i8::MIN.into(), i8::MAX.into()) as i8;
        Ok(atom)
    }

    fn bracket_symbol(&mut self) -> Result<(Element, bool), SmilesError> {
        let Some(first) = self.peek() else {
            return Err(self.error(SmilesParseErrorKind::UnterminatedBracket));
        };

        if first.is_ascii_lowercase() {
            for candidate in ["se", "as"] {
                if self.starts_with(candidate) {
                    let element = capitalize(candidate)
                        .parse()
                        .map_err(|_| self.error(SmilesParseErrorKind::UnknownElement(candidate.into())))?;
                    self.pos += 2;
                    return Ok((element, true));
                }
            }
            let symbol = first.to_ascii_uppercase().to_string();
            let element: Element = symbol
                .parse()
                .map_err(|_| self.error(SmilesParseErrorKind::UnknownElement(first.to_string())))?;
            if !element.can_be_aromatic() {
                return Err(self.error(SmilesParseErrorKind::UnknownElement(first.to_string())));
            }
            self.pos += 1;
            return Ok((element, true));
        }

        if !first.is_ascii_uppercase() {
            return Err(self.error(SmilesParseErrorKind::UnexpectedCharacter(first)));
        }
        if let Some(second) = self.chars.get(self.pos + 1).filter(|c| c.is_ascii_lowercase()) {
            let symbol: String = [first, *second].iter().collect();
            if let Ok(element) = symbol.parse() {
                self.pos += 2;
                return Ok((element, false));
            }
        }
        let element = first
            .to_string()
            .parse()
            .map_err(|_| self.error(SmilesParseErrorKind::UnknownElement(first.to_string())))?;
        self.pos += 1;
        Ok((element, false))
    }

    fn starts_with(&self, prefix: &str) -> bool {
        prefix
            .chars()
            .enumerate()
            .all(|(i, c)| self.chars.get(self.pos + i) == Some(&c))
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

struct ComponentWriter<'m> {
    mol: &'m Molecule,
    visited: SecondaryMap<AtomId, ()>,
    on_stack: SecondaryMap<AtomId, ()>,
    children: SecondaryMap<AtomId, Vec<AtomId>>,
    ring_opens: SecondaryMap<AtomId, Vec<AtomId>>,
    ring_closes: SecondaryMap<AtomId, Vec<AtomId>>,
    ring_digits: HashMap<(AtomId, AtomId), u16>,
    free_digits: BTreeSet<u16>,
    next_digit: u16,
}

impl<'m> ComponentWriter<'m> {
    fn new(mol: &'m Molecule) -> Self {
        Self {
            mol,
            visited: SecondaryMap::new(),
            on_stack: SecondaryMap::new(),
            children: SecondaryMap::new(),
            ring_opens: SecondaryMap::new(),
            ring_closes: SecondaryMap::new(),
            ring_digits: HashMap::new(),
            free_digits: BTreeSet::new(),
            next_digit: 1,
        }
    }

    fn write(mut self, start: AtomId) -> String {
        self.explore(start, None);
        let mut out = String::new();
        self.emit(start, &mut out);
        out
    }

    fn explore(&mut self, atom: AtomId, parent: Option<AtomId>) {
        self.visited.insert(atom, ());
        self.on_stack.insert(atom, ());
        self.children.insert(atom, Vec::new());
        let neighbors = self
            .mol
            .get_bonded_neighbors(atom)
            .map(<[AtomId]>::to_vec)
            .unwrap_or_default();
        for next in neighbors {
            if Some(next) == parent {
                continue;
            }
            if !self.visited.contains_key(next) {
                self.children[atom].push(next);
                self.explore(next, Some(atom));
            } else if self.on_stack.contains_key(next) {
                if let Some(entry) = self.ring_opens.entry(next) {
                    entry.or_default().push(atom);
                }
                if let Some(entry) = self.ring_closes.entry(atom) {
                    entry.or_default().push(next);
                }
            }
        }
        self.on_stack.remove(atom);
    }

    fn emit(&mut self, atom: AtomId, out: &mut String) {
        out.push_str(&self.atom_token(atom));

        let closes = self.ring_closes.get(atom).cloned().unwrap_or_default();
        for opener in closes {
            if let Some(digit) = self.ring_digits.remove(&(opener, atom)) {
                push_ring_digit(out, digit);
                self.free_digits.insert(digit);
            }
        }

        let opens = self.ring_opens.get(atom).cloned().unwrap_or_default();
        for closer in opens {
            let digit = self.allocate_digit();
            self.ring_digits.insert((atom, closer), digit);
            out.push_str(self.bond_symbol(atom, closer));
            push_ring_digit(out, digit);
        }

        let children = self.children.get(atom).cloned().unwrap_or_default();
        let count = children.len();
        for (i, child) in children.into_iter().enumerate() {
            let is_last = i + 1 == count;
            if !is_last {
                out.push('(');
            }
            out.push_str(self.bond_symbol(atom, child));
            self.emit(child, out);
            if !is_last {
                out.push(')');
            }
        }
    }

    fn allocate_digit(&mut self) -> u16 {
        if let Some(digit) = self.free_digits.pop_first() {
            return digit;
        }
        let digit = self.next_digit;
        self.next_digit += 1;
        digit
    }

    fn bond_symbol(&self, a: AtomId, b: AtomId) -> &'static str {
        let both_aromatic = [a, b]
            .iter()
            .all(|&id| self.mol.atom(id).is_some_and(|atom| atom.aromatic));
        match self.mol.bond_between(a, b).map(|bond| bond.order) {
            Some(BondOrder::Single) if both_aromatic => "-",
            Some(BondOrder::Double) => "=",
            Some(BondOrder::Triple) => "#",
            Some(BondOrder::Aromatic) if !both_aromatic => ":",
            _ => "",
        }
    }

    fn atom_token(&self, id: AtomId) -> String {
        let Some(atom) = self.mol.atom(id) else {
            return String::new();
        };
        let symbol = if atom.aromatic && atom.element.can_be_aromatic() {
            atom.element.symbol().to_lowercase()
        } else {
            atom.element.symbol().to_string()
        };

        let hydrogens = self.mol.implicit_hydrogens(id);
        let bare = atom.element.is_organic_subset()
            && atom.formal_charge == 0
            && atom.isotope.is_none()
            && hydrogens == self.mol.derived_hydrogens(id);
        if bare {
            return symbol;
        }

        let mut token = String::from("[");
        if let Some(isotope) = atom.isotope {
            token.push_str(&isotope.to_string());
        }
        token.push_str(&symbol);
        match hydrogens {
            0 => {}
            1 => token.push('H'),
            n => token.push_str(&format!("H{n}")),
        }
        match atom.formal_charge {
            0 => {}
            1 => token.push('+'),
            -1 => token.push('-'),
            c if c > 0 => token.push_str(&format!("+{c}")),
            c => token.push_str(&format!("-{}", c.unsigned_abs())),
        }
        token.push(']');
        token
    }
}

fn push_ring_digit(out: &mut String, digit: u16) {
    if digit < 10 {
        out.push_str(&digit.to_string());
    } else {
        out.push_str(&format!("%{digit:02}"));
    }
}
