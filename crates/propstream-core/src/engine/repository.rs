use super::artifact::{ARTIFACT_EXTENSION, ArtifactError, DescriptorModel};
use super::model::PredictiveModel;
use reqwest::Url;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

const FETCH_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("Model {id} not available from '{url}': {source}")]
    NotAvailable {
        id: String,
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Model {id} not found at '{}'", path.display())]
    NotFound { id: String, path: PathBuf },
    #[error("Model id '{id}' does not form a valid artifact URL: {reason}")]
    InvalidId { id: String, reason: String },
    #[error("Failed to initialize HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

/// Where model artifacts live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelLocation {
    Remote(Url),
    Local(PathBuf),
}

impl ModelLocation {
    /// A base that parses as a URL with a host is remote; anything else is a
    /// directory on the local filesystem.
    pub fn parse(base: &str) -> Self {
        match Url::parse(base) {
            Ok(mut url) if url.has_host() => {
                if !url.path().ends_with('/') {
                    let path = format!("{}/", url.path());
                    url.set_path(&path);
                }
                ModelLocation::Remote(url)
            }
            _ => ModelLocation::Local(PathBuf::from(base)),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, ModelLocation::Remote(_))
    }
}

impl fmt::Display for ModelLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelLocation::Remote(url) => write!(f, "{url}"),
            ModelLocation::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

fn artifact_name(id: &str) -> String {
    format!("{id}.{ARTIFACT_EXTENSION}")
}

fn artifact_url(base: &Url, id: &str) -> Result<Url, ResolutionError> {
    base.join(&artifact_name(id))
        .map_err(|e| ResolutionError::InvalidId {
            id: id.to_string(),
            reason: e.to_string(),
        })
}

/// Source of loaded models, keyed by model id.
pub trait ModelResolver {
    fn resolve(&self, id: &str) -> Result<Box<dyn PredictiveModel>, ResolutionError>;
}

/// Resolves `<base>/<id>.jmodel` artifacts over HTTP or from a directory.
pub struct ModelRepository {
    location: ModelLocation,
    client: Option<reqwest::blocking::Client>,
}

impl ModelRepository {
    pub fn new(location: ModelLocation) -> Result<Self, ResolutionError> {
        let client = if location.is_remote() {
            Some(
                reqwest::blocking::Client::builder()
                    .timeout(FETCH_TIMEOUT)
                    .build()
                    .map_err(ResolutionError::Client)?,
            )
        } else {
            None
        };
        Ok(Self { location, client })
    }

    pub fn location(&self) -> &ModelLocation {
        &self.location
    }

    /// Remote address of the artifact for `id`, if the repository is remote.
    pub fn artifact_url(&self, id: &str) -> Option<Result<Url, ResolutionError>> {
        match &self.location {
            ModelLocation::Remote(base) => Some(artifact_url(base, id)),
            ModelLocation::Local(_) => None,
        }
    }

    fn fetch(&self, id: &str, url: Url) -> Result<DescriptorModel, ResolutionError> {
        let not_available = |source| ResolutionError::NotAvailable {
            id: id.to_string(),
            url: url.to_string(),
            source,
        };
        let client = self.client.clone().unwrap_or_default();
        debug!(model = id, %url, "Fetching model artifact");
        let text = client
            .get(url.clone())
            .send()
            .and_then(|response| response.error_for_status())
            .and_then(|response| response.text())
            .map_err(not_available)?;
        Ok(DescriptorModel::from_toml_str(id, url.as_str(), &text)?)
    }
}

impl ModelResolver for ModelRepository {
    fn resolve(&self, id: &str) -> Result<Box<dyn PredictiveModel>, ResolutionError> {
        let model = match &self.location {
            ModelLocation::Remote(base) => self.fetch(id, artifact_url(base, id)?)?,
            ModelLocation::Local(dir) => {
                let path = dir.join(artifact_name(id));
                if !path.is_file() {
                    return Err(ResolutionError::NotFound {
                        id: id.to_string(),
                        path,
                    });
                }
                debug!(model = id, path = %path.display(), "Loading model artifact");
                DescriptorModel::load(id, &path)?
            }
        };
        Ok(Box::new(model))
    }
}
