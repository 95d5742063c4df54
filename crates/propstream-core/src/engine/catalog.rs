use super::model::format_name;
use std::collections::HashMap;

const DEFAULT_MODELS: [(&str, &str); 22] = [
    ("solubility", "Aqueous solubility model"),
    ("herg", "hERG model"),
    ("AMES", "AMES model"),
    ("CYP2C9_Veith", "CYP2C9 inhibition model"),
    ("CYP3A4_Veith", "CYP3A4 inhibition model"),
    ("CYP2C9_Substrate_CarbonMangels", "CYP2C9 substrate model"),
    ("CYP2D6_Veith", "CYP2D6 inhibition model"),
    ("lipophilicity", "Lipophilicity model"),
    ("ppbr_az", "PPBR model"),
    ("hia_hou", "HIA model"),
    ("CYP2D6_Substrate_CarbonMangels", "CYP2D6 substrate model"),
    ("bioavailability_ma", "Bioavailability model"),
    ("clearance_microsome_az", "Clearance Microsome model"),
    ("ld50_zhu", "LD50 model"),
    ("CYP3A4_Substrate_CarbonMangels", "CYP3A4 Substrate CarbonMangels  model"),
    ("caco2_wang", "CaCO2 Wang model"),
    ("dili", "DILI model"),
    ("vdss_lombardo", "VDss Lombardo model"),
    ("clearance_hepatocyte_az", "Clearance Hepatocyte model"),
    ("half_life+obach", "Half Life Obach model"),
    ("BBB", "Blood Brain Barrier model"),
    ("pgp", "PGP model"),
];

/// Immutable model id to display name table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCatalog {
    names: HashMap<String, String>,
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::from_entries(
            DEFAULT_MODELS
                .iter()
                .map(|(id, name)| (id.to_string(), name.to_string())),
        )
    }
}

impl ModelCatalog {
    pub fn empty() -> Self {
        Self {
            names: HashMap::new(),
        }
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            names: entries.into_iter().collect(),
        }
    }

    /// Returns a catalog with `entries` added on top of this one.
    pub fn extended(&self, entries: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut names = self.names.clone();
        names.extend(entries);
        Self { names }
    }

    /// Display name for `id`; unknown ids stand for themselves.
    pub fn display_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.names.get(id).map_or(id, String::as_str)
    }

    /// Prefix of the output field names produced by model `id`.
    pub fn field_prefix(&self, id: &str) -> String {
        format_name(self.display_name(id))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
