use crate::core::models::atom::Atom;
use crate::core::models::element::Element;
use crate::core::models::ids::AtomId;
use crate::core::models::molecule::{Molecule, NAME_ANNOTATION};
use crate::core::models::topology::BondOrder;
use nalgebra::Point3;
use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use thiserror::Error;

/// Line that terminates every record of an SD file.
pub const RECORD_TERMINATOR: &str = "$$$$";

const MAX_CHARGES_PER_LINE: usize = 8;

#[derive(Debug, Error)]
pub enum MolfileError {
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: MolfileParseErrorKind },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MolfileParseErrorKind {
    #[error("block must contain at least a header and counts line")]
    TooShort,
    #[error("V3000 connection tables are not supported")]
    V3000,
    #[error("invalid count in counts line (value: '{0}')")]
    InvalidCount(String),
    #[error("block ended before atoms/bonds were fully specified")]
    Truncated,
    #[error("invalid coordinate (value: '{0}')")]
    InvalidCoordinate(String),
    #[error("unsupported atom symbol '{0}'")]
    UnsupportedSymbol(String),
    #[error("invalid bond line")]
    InvalidBond,
    #[error("unsupported bond type {0}")]
    UnsupportedBondType(String),
    #[error("bond references atom outside declared range")]
    AtomOutOfRange,
    #[error("missing 'M  END' line")]
    MissingEnd,
}

fn slice_and_trim(line: &str, start: usize, end: usize) -> &str {
    line.get(start..end.min(line.len())).unwrap_or("").trim()
}

/// One raw SD record: its lines (without the terminator) and the 1-based line
/// number of its first line in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBlock {
    pub first_line: usize,
    pub lines: Vec<String>,
}

/// Reads the next `$$$$`-terminated block.
///
/// `line_no` tracks how many lines of the source have been consumed so far.
/// A trailing block without a terminator is still returned; a trailing run of
/// blank lines is not. Returns `Ok(None)` at end of input.
pub fn read_block<R: BufRead>(reader: &mut R, line_no: &mut usize) -> io::Result<Option<RawBlock>> {
    let first_line = *line_no + 1;
    let mut lines = Vec::new();
    let mut buf = String::new();
    loop {
        buf.clear();
        if reader.read_line(&mut buf)? == 0 {
            break;
        }
        *line_no += 1;
        let line = buf.trim_end_matches(['\n', '\r']);
        if line.trim_end() == RECORD_TERMINATOR {
            return Ok(Some(RawBlock { first_line, lines }));
        }
        lines.push(line.to_string());
    }

    if lines.iter().all(|l| l.trim().is_empty()) {
        Ok(None)
    } else {
        Ok(Some(RawBlock { first_line, lines }))
    }
}

/// Parses a V2000 molfile block, including any trailing SD data items.
///
/// The title line becomes the `_Name` annotation when it is not blank; every
/// `> <name>` data item becomes an annotation with its (possibly multi-line)
/// value.
pub fn parse_block(block: &RawBlock) -> Result<Molecule, MolfileError> {
    let lines = &block.lines;
    let err = |offset: usize, kind| MolfileError::Parse {
        line: block.first_line + offset,
        kind,
    };

    if lines.len() < 4 {
        return Err(err(0, MolfileParseErrorKind::TooShort));
    }
    let counts_line = &lines[3];
    if counts_line.contains("V3000") {
        return Err(err(3, MolfileParseErrorKind::V3000));
    }
    let atom_count = parse_count(slice_and_trim(counts_line, 0, 3)).map_err(|k| err(3, k))?;
    let bond_count = parse_count(slice_and_trim(counts_line, 3, 6)).map_err(|k| err(3, k))?;

    let atom_start = 4;
    let bond_start = atom_start + atom_count;
    let props_start = bond_start + bond_count;
    if lines.len() < props_start {
        return Err(err(lines.len().saturating_sub(1), MolfileParseErrorKind::Truncated));
    }

    let mut mol = Molecule::new();
    let title = lines[0].trim();
    if !title.is_empty() {
        mol.set_name(title);
    }

    let mut ids: Vec<AtomId> = Vec::with_capacity(atom_count);
    for (offset, raw) in lines[atom_start..bond_start].iter().enumerate() {
        let atom = parse_atom_line(raw).map_err(|k| err(atom_start + offset, k))?;
        ids.push(mol.add_atom(atom));
    }

    for (offset, raw) in lines[bond_start..props_start].iter().enumerate() {
        let (a1, a2, order) =
            parse_bond_line(raw, atom_count).map_err(|k| err(bond_start + offset, k))?;
        if order == BondOrder::Aromatic {
            for id in [ids[a1], ids[a2]] {
                if let Some(atom) = mol.atom_mut(id) {
                    atom.aromatic = true;
                }
            }
        }
        mol.add_bond(ids[a1], ids[a2], order);
    }

    let mut data_start = None;
    let mut block_charges: Option<HashMap<usize, i8>> = None;
    for (offset, raw) in lines[props_start..].iter().enumerate() {
        if raw.starts_with("M  END") {
            data_start = Some(props_start + offset + 1);
            break;
        }
        if raw.starts_with("M  CHG") {
            let charges = block_charges.get_or_insert_with(HashMap::new);
            for (index, value) in property_pairs(raw) {
                charges.insert(index, value.clamp(i8::MIN.into(), i8::MAX.into()) as i8);
            }
        } else if raw.starts_with("M  ISO") {
            for (index, value) in property_pairs(raw) {
                if let Some(atom) = ids.get(index).and_then(|&id| mol.atom_mut(id)) {
                    atom.isotope = u16::try_from(value).ok();
                }
            }
        }
    }
    let Some(data_start) = data_start else {
        return Err(err(lines.len().saturating_sub(1), MolfileParseErrorKind::MissingEnd));
    };

    // Any `M  CHG` line supersedes all atom-block charge codes.
    if let Some(charges) = block_charges {
        for (i, &id) in ids.iter().enumerate() {
            if let Some(atom) = mol.atom_mut(id) {
                atom.formal_charge = charges.get(&i).copied().unwrap_or(0);
            }
        }
    }

    parse_data_items(&lines[data_start..], &mut mol);
    Ok(mol)
}

fn parse_count(value: &str) -> Result<usize, MolfileParseErrorKind> {
    value
        .parse::<usize>()
        .map_err(|_| MolfileParseErrorKind::InvalidCount(value.to_string()))
}

fn parse_atom_line(raw: &str) -> Result<Atom, MolfileParseErrorKind> {
    let padded = format!("{raw:<39}");
    let mut coords = [0.0; 3];
    for (k, coord) in coords.iter_mut().enumerate() {
        let field = slice_and_trim(&padded, k * 10, k * 10 + 10);
        *coord = field
            .parse::<f64>()
            .map_err(|_| MolfileParseErrorKind::InvalidCoordinate(field.to_string()))?;
    }

    let symbol = slice_and_trim(&padded, 31, 34);
    let (element, isotope) = match symbol {
        "D" => (Element::H, Some(2)),
        "T" => (Element::H, Some(3)),
        other => (
            other
                .parse::<Element>()
                .map_err(|_| MolfileParseErrorKind::UnsupportedSymbol(other.to_string()))?,
            None,
        ),
    };

    let mut atom = Atom::with_position(element, Point3::new(coords[0], coords[1], coords[2]));
    atom.isotope = isotope;
    atom.formal_charge = match slice_and_trim(&padded, 36, 39) {
        "1" => 3,
        "2" => 2,
        "3" => 1,
        "5" => -1,
        "6" => -2,
        "7" => -3,
        _ => 0,
    };
    Ok(atom)
}

fn parse_bond_line(
    raw: &str,
    atom_count: usize,
) -> Result<(usize, usize, BondOrder), MolfileParseErrorKind> {
    let index = |field: &str| -> Result<usize, MolfileParseErrorKind> {
        let n = field
            .parse::<usize>()
            .map_err(|_| MolfileParseErrorKind::InvalidBond)?;
        if n == 0 || n > atom_count {
            return Err(MolfileParseErrorKind::AtomOutOfRange);
        }
        Ok(n - 1)
    };
    let a1 = index(slice_and_trim(raw, 0, 3))?;
    let a2 = index(slice_and_trim(raw, 3, 6))?;
    let type_field = slice_and_trim(raw, 6, 9);
    let order = type_field
        .parse::<u8>()
        .ok()
        .and_then(BondOrder::from_ctfile)
        .ok_or_else(|| MolfileParseErrorKind::UnsupportedBondType(type_field.to_string()))?;
    Ok((a1, a2, order))
}

/// Parses the `(atom, value)` pairs of an `M  CHG`/`M  ISO` style line; atom
/// indices are returned 0-based.
fn property_pairs(raw: &str) -> Vec<(usize, i32)> {
    let tokens: Vec<&str> = raw.split_whitespace().skip(3).collect();
    tokens
        .chunks(2)
        .filter_map(|pair| match pair {
            [atom, value] => {
                let atom = atom.parse::<usize>().ok()?.checked_sub(1)?;
                Some((atom, value.parse::<i32>().ok()?))
            }
            _ => None,
        })
        .collect()
}

fn parse_data_items(lines: &[String], mol: &mut Molecule) {
    let mut i = 0;
    while i < lines.len() {
        let line = &lines[i];
        i += 1;
        if !line.starts_with('>') {
            continue;
        }
        let Some(name) = data_item_name(line) else {
            continue;
        };
        let mut value_lines = Vec::new();
        while i < lines.len() && !lines[i].is_empty() {
            value_lines.push(lines[i].as_str());
            i += 1;
        }
        mol.annotations_mut().set(name, value_lines.join("\n"));
    }
}

fn data_item_name(header: &str) -> Option<&str> {
    let open = header.find('<')?;
    let close = header[open + 1..].find('>')? + open + 1;
    Some(&header[open + 1..close])
}

/// Writes one SD record: the V2000 connection table, the given data items and
/// the `$$$$` terminator.
///
/// Charges are written both as legacy atom-block codes and as `M  CHG` lines,
/// so that readers that only understand one of the two still see them.
pub fn write_block<W: Write>(
    writer: &mut W,
    mol: &Molecule,
    title: &str,
    data_items: &[(&str, &str)],
) -> io::Result<()> {
    let index: HashMap<AtomId, usize> = mol
        .atom_ids()
        .enumerate()
        .map(|(i, id)| (id, i + 1))
        .collect();

    writeln!(writer, "{title}")?;
    writeln!(writer, "  propstream")?;
    writeln!(writer)?;
    writeln!(
        writer,
        "{:>3}{:>3}  0  0  0  0  0  0  0  0999 V2000",
        mol.atom_count(),
        mol.bond_count()
    )?;

    let mut charges = Vec::new();
    let mut isotopes = Vec::new();
    for (i, (_, atom)) in mol.atoms_iter().enumerate() {
        let charge_code = match atom.formal_charge {
            3 => 1,
            2 => 2,
            1 => 3,
            -1 => 5,
            -2 => 6,
            -3 => 7,
            _ => 0,
        };
        writeln!(
            writer,
            "{:>10.4}{:>10.4}{:>10.4} {:<3} 0{:>3}  0  0  0  0  0  0  0  0  0  0",
            atom.position.x,
            atom.position.y,
            atom.position.z,
            atom.element.symbol(),
            charge_code
        )?;
        if atom.formal_charge != 0 {
            charges.push((i + 1, i32::from(atom.formal_charge)));
        }
        if let Some(isotope) = atom.isotope {
            isotopes.push((i + 1, i32::from(isotope)));
        }
    }

    for bond in mol.bonds() {
        writeln!(
            writer,
            "{:>3}{:>3}{:>3}  0",
            index[&bond.atom1_id],
            index[&bond.atom2_id],
            bond.order.to_ctfile()
        )?;
    }

    write_property_lines(writer, "CHG", &charges)?;
    write_property_lines(writer, "ISO", &isotopes)?;
    writeln!(writer, "M  END")?;

    for (name, value) in data_items {
        if *name == NAME_ANNOTATION {
            continue;
        }
        writeln!(writer, "> <{name}>")?;
        writeln!(writer, "{value}")?;
        writeln!(writer)?;
    }
    writeln!(writer, "{RECORD_TERMINATOR}")?;
    Ok(())
}

fn write_property_lines<W: Write>(
    writer: &mut W,
    tag: &str,
    entries: &[(usize, i32)],
) -> io::Result<()> {
    for chunk in entries.chunks(MAX_CHARGES_PER_LINE) {
        write!(writer, "M  {tag}{:>3}", chunk.len())?;
        for (atom, value) in chunk {
            write!(writer, " {atom:>3} {value:>3}")?;
        }
        writeln!(writer)?;
    }
    Ok(())
}
