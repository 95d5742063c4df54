use super::model::{ModelError, ModelKind, ModelOutput, PredictiveModel};
use crate::core::models::molecule::Molecule;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

/// File extension of model artifacts.
pub const ARTIFACT_EXTENSION: &str = "jmodel";

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Failed to read model artifact '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse model artifact '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("Unknown descriptor '{name}' in model artifact")]
    UnknownDescriptor { name: String },
    #[error("Invalid domain for descriptor '{descriptor}': lower bound {low} exceeds upper bound {high}")]
    InvalidDomain {
        descriptor: Descriptor,
        low: f64,
        high: f64,
    },
}

/// Whole-molecule descriptors a descriptor model can weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Descriptor {
    AtomCount,
    HeavyAtoms,
    HeteroAtoms,
    MolecularWeight,
    RingCount,
    NetCharge,
}

impl Descriptor {
    pub fn compute(self, molecule: &Molecule) -> f64 {
        match self {
            Descriptor::AtomCount => molecule.atom_count() as f64,
            Descriptor::HeavyAtoms => molecule.heavy_atom_count() as f64,
            Descriptor::HeteroAtoms => molecule.hetero_atom_count() as f64,
            Descriptor::MolecularWeight => molecule.molecular_weight(),
            Descriptor::RingCount => molecule.ring_count() as f64,
            Descriptor::NetCharge => f64::from(molecule.net_charge()),
        }
    }
}

const DESCRIPTOR_NAMES: [(Descriptor, &str); 6] = [
    (Descriptor::AtomCount, "atom_count"),
    (Descriptor::HeavyAtoms, "heavy_atoms"),
    (Descriptor::HeteroAtoms, "hetero_atoms"),
    (Descriptor::MolecularWeight, "molecular_weight"),
    (Descriptor::RingCount, "ring_count"),
    (Descriptor::NetCharge, "net_charge"),
];

impl FromStr for Descriptor {
    type Err = ArtifactError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DESCRIPTOR_NAMES
            .iter()
            .find(|(_, name)| *name == s)
            .map(|(d, _)| *d)
            .ok_or_else(|| ArtifactError::UnknownDescriptor {
                name: s.to_string(),
            })
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = DESCRIPTOR_NAMES
            .iter()
            .find(|(d, _)| d == self)
            .map_or("unknown", |(_, name)| *name);
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ArtifactKind {
    Regressor,
    Classifier,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct ArtifactFile {
    kind: ArtifactKind,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    intercept: f64,
    #[serde(default)]
    weights: BTreeMap<String, f64>,
    #[serde(default)]
    domain: Option<BTreeMap<String, [f64; 2]>>,
}

/// A linear model over whole-molecule descriptors, stored as TOML.
///
/// ```toml
/// kind = "classifier"
/// intercept = -2.0
///
/// [weights]
/// heavy_atoms = 0.25
///
/// [domain]
/// molecular_weight = [0.0, 600.0]
/// ```
///
/// Regressors predict the linear score. Classifiers pass it through the
/// logistic function: the active probability `p` yields the probability pair
/// `[1 - p, p]` and a prediction of `1.0` when `p >= 0.5`. A `[domain]` table
/// adds a domain-of-applicability flag that is true when every listed
/// descriptor lies inside its closed range.
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptorModel {
    id: String,
    kind: ModelKind,
    intercept: f64,
    weights: Vec<(Descriptor, f64)>,
    domain: Vec<(Descriptor, [f64; 2])>,
}

impl DescriptorModel {
    pub fn from_toml_str(id: &str, source_name: &str, text: &str) -> Result<Self, ArtifactError> {
        let file: ArtifactFile = toml::from_str(text).map_err(|e| ArtifactError::Toml {
            path: source_name.to_string(),
            source: e,
        })?;
        if let Some(description) = &file.description {
            debug!(model = id, %description, "Parsed model artifact");
        }

        let mut kind = match file.kind {
            ArtifactKind::Regressor => ModelKind::Regressor,
            ArtifactKind::Classifier => ModelKind::Classifier,
        };
        let weights = file
            .weights
            .into_iter()
            .map(|(name, w)| Ok((name.parse::<Descriptor>()?, w)))
            .collect::<Result<Vec<_>, ArtifactError>>()?;
        let domain = file
            .domain
            .unwrap_or_default()
            .into_iter()
            .map(|(name, range)| Ok((name.parse::<Descriptor>()?, range)))
            .collect::<Result<Vec<_>, ArtifactError>>()?;
        if let Some(&(descriptor, [low, high])) = domain.iter().find(|(_, [low, high])| low > high) {
            return Err(ArtifactError::InvalidDomain {
                descriptor,
                low,
                high,
            });
        }
        if !domain.is_empty() {
            kind = kind.with_domain();
        }

        Ok(Self {
            id: id.to_string(),
            kind,
            intercept: file.intercept,
            weights,
            domain,
        })
    }

    pub fn load(id: &str, path: &Path) -> Result<Self, ArtifactError> {
        let text = std::fs::read_to_string(path).map_err(|e| ArtifactError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        Self::from_toml_str(id, &path.to_string_lossy(), &text)
    }

    fn score(&self, molecule: &Molecule) -> f64 {
        self.weights
            .iter()
            .fold(self.intercept, |acc, (d, w)| acc + w * d.compute(molecule))
    }

    fn in_domain(&self, molecule: &Molecule) -> bool {
        self.domain.iter().all(|(d, [low, high])| {
            let value = d.compute(molecule);
            *low <= value && value <= *high
        })
    }
}

impl PredictiveModel for DescriptorModel {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> ModelKind {
        self.kind
    }

    fn predict(&self, molecule: &Molecule) -> Result<ModelOutput, ModelError> {
        if molecule.is_empty() {
            return Err(ModelError::Evaluation {
                model: self.id.clone(),
                reason: "structure has no atoms".to_string(),
            });
        }

        let score = self.score(molecule);
        if !score.is_finite() {
            return Err(ModelError::Evaluation {
                model: self.id.clone(),
                reason: format!("score is not finite ({score})"),
            });
        }

        let mut output = if self.kind.is_classifier() {
            let active = 1.0 / (1.0 + (-score).exp());
            ModelOutput {
                prediction: if active >= 0.5 { 1.0 } else { 0.0 },
                probability: Some([1.0 - active, active]),
                in_domain: None,
            }
        } else {
            ModelOutput::regression(score)
        };
        if self.kind.has_domain() {
            output.in_domain = Some(self.in_domain(molecule));
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::smiles;
    use std::fs;
    use tempfile::tempdir;

    const REGRESSOR: &str = r#"
kind = "regressor"
description = "toy solubility"
intercept = 1.0

[weights]
heavy_atoms = 0.5
ring_count = -1.0
"#;

    const CLASSIFIER: &str = r#"
kind = "classifier"
intercept = -3.0

[weights]
heavy_atoms = 1.0

[domain]
heavy_atoms = [1.0, 5.0]
"#;

    #[test]
    fn regressor_predicts_linear_score() {
        let model = DescriptorModel::from_toml_str("sol", "inline", REGRESSOR).unwrap();
        assert_eq!(model.kind(), ModelKind::Regressor);

        let benzene = smiles::parse("c1ccccc1").unwrap();
        let output = model.predict(&benzene).unwrap();
        assert!((output.prediction - 3.0).abs() < 1e-12);
        assert_eq!(output.probability, None);
        assert_eq!(output.in_domain, None);
    }

    #[test]
    fn classifier_with_domain_reports_probabilities_and_doa() {
        let model = DescriptorModel::from_toml_str("tox", "inline", CLASSIFIER).unwrap();
        assert_eq!(model.kind(), ModelKind::ClassifierWithDoa);

        let small = model.predict(&smiles::parse("CC").unwrap()).unwrap();
        assert_eq!(small.prediction, 0.0);
        let [inactive, active] = small.probability.unwrap();
        assert!(active < 0.5);
        assert!((inactive + active - 1.0).abs() < 1e-12);
        assert_eq!(small.in_domain, Some(true));

        let large = model.predict(&smiles::parse("CCCCCCCC").unwrap()).unwrap();
        assert_eq!(large.prediction, 1.0);
        assert_eq!(large.in_domain, Some(false));
    }

    #[test]
    fn empty_structure_cannot_be_evaluated() {
        let model = DescriptorModel::from_toml_str("sol", "inline", REGRESSOR).unwrap();
        assert!(matches!(
            model.predict(&Molecule::new()),
            Err(ModelError::Evaluation { .. })
        ));
    }

    #[test]
    fn rejects_unknown_keys_and_inverted_domains() {
        let unknown = "kind = \"regressor\"\nbias = 1.0\n";
        assert!(matches!(
            DescriptorModel::from_toml_str("x", "inline", unknown),
            Err(ArtifactError::Toml { .. })
        ));

        let inverted = "kind = \"regressor\"\n[domain]\nring_count = [3.0, 1.0]\n";
        assert!(matches!(
            DescriptorModel::from_toml_str("x", "inline", inverted),
            Err(ArtifactError::InvalidDomain {
                descriptor: Descriptor::RingCount,
                ..
            })
        ));
    }

    #[test]
    fn rejects_unknown_descriptors() {
        let text = "kind = \"regressor\"\n[weights]\nlogp = 1.0\n";
        assert!(matches!(
            DescriptorModel::from_toml_str("x", "inline", text),
            Err(ArtifactError::UnknownDescriptor { name }) if name == "logp"
        ));
    }

    #[test]
    fn load_reports_missing_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.jmodel");
        assert!(matches!(
            DescriptorModel::load("missing", &path),
            Err(ArtifactError::Io { .. })
        ));

        let path = dir.path().join("sol.jmodel");
        fs::write(&path, REGRESSOR).unwrap();
        assert_eq!(DescriptorModel::load("sol", &path).unwrap().id(), "sol");
    }
}
