use crate::core::io::traits::PropertyValue;
use crate::core::models::molecule::Molecule;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Model '{model}' could not evaluate the structure: {reason}")]
    Evaluation { model: String, reason: String },
}

/// The shape of a model's output, which fixes the fields it contributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Regressor,
    RegressorWithDoa,
    Classifier,
    ClassifierWithDoa,
}

impl ModelKind {
    pub fn is_classifier(self) -> bool {
        matches!(self, ModelKind::Classifier | ModelKind::ClassifierWithDoa)
    }

    pub fn has_domain(self) -> bool {
        matches!(self, ModelKind::RegressorWithDoa | ModelKind::ClassifierWithDoa)
    }

    pub fn with_domain(self) -> Self {
        match self {
            ModelKind::Regressor | ModelKind::RegressorWithDoa => ModelKind::RegressorWithDoa,
            ModelKind::Classifier | ModelKind::ClassifierWithDoa => ModelKind::ClassifierWithDoa,
        }
    }

    pub fn property_suffixes(self) -> &'static [&'static str] {
        match self {
            ModelKind::Regressor => &["_Prediction"],
            ModelKind::RegressorWithDoa => &["_Prediction", "_DOA"],
            ModelKind::Classifier => &["_Prediction", "_Inactive", "_Active"],
            ModelKind::ClassifierWithDoa => &["_Prediction", "_Inactive", "_Active", "_DOA"],
        }
    }

    /// Output field names for a model whose field prefix is `prefix`.
    pub fn property_names(self, prefix: &str) -> Vec<String> {
        self.property_suffixes()
            .iter()
            .map(|suffix| format!("{prefix}{suffix}"))
            .collect()
    }
}

/// Result of running one model on one structure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelOutput {
    pub prediction: f64,
    /// `[inactive, active]`; classifiers only.
    pub probability: Option<[f64; 2]>,
    pub in_domain: Option<bool>,
}

impl ModelOutput {
    pub fn regression(prediction: f64) -> Self {
        Self {
            prediction,
            probability: None,
            in_domain: None,
        }
    }

    /// Values aligned to `kind.property_suffixes()`.
    ///
    /// A field the kind promises but the output lacks is absent rather than
    /// dropped, so names and values never drift apart.
    pub fn values(&self, kind: ModelKind) -> Vec<Option<PropertyValue>> {
        let mut values = vec![Some(PropertyValue::Float(self.prediction))];
        if kind.is_classifier() {
            values.push(self.probability.map(|p| PropertyValue::Float(p[0])));
            values.push(self.probability.map(|p| PropertyValue::Float(p[1])));
        }
        if kind.has_domain() {
            values.push(self.in_domain.map(PropertyValue::Bool));
        }
        values
    }
}

/// A loaded predictive model.
pub trait PredictiveModel {
    fn id(&self) -> &str;

    fn kind(&self) -> ModelKind;

    fn predict(&self, molecule: &Molecule) -> Result<ModelOutput, ModelError>;
}

/// Turns a display name into a field-name prefix safe for SD data items.
pub fn format_name(display_name: &str) -> String {
    display_name.replace(' ', "_").replace("__", "_")
}
