use crate::backend::BackendError;
use std::{fmt, sync::Arc};

const KUBERNETES_AUTHORIZATION_HINT: &str = "a Kubernetes authorization policy is required";
const BACKEND_AUTHORIZATION_HINT: &str = "a policy backend authorization policy is required";

/// An error encountered while reconciling a single unit of work.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("policy backend: {0}")]
    Backend(#[from] BackendError),

    #[error("kubernetes: {0}")]
    Kube(#[from] kube::Error),

    #[error("unable to determine cluster endpoint")]
    MissingEndpoint,

    #[error("invalid CIDR {value:?}: {source}")]
    InvalidCidr {
        value: String,
        #[source]
        source: ipnet::AddrParseError,
    },

    #[error("namespace {namespace} has an invalid type annotation {value:?}")]
    InvalidAnnotation { namespace: String, value: String },

    #[error("failed to obtain credentials for cluster {cluster}: {message}")]
    Credentials { cluster: String, message: String },

    #[error("failed to configure cluster client: {0}")]
    ClientConfig(String),

    #[error("cluster worker failed: {0}")]
    Worker(String),

    #[error("timed out {0}")]
    Timeout(String),

    #[error("{source}; {hint}")]
    Unauthorized {
        #[source]
        source: Box<Error>,
        hint: &'static str,
    },
}

/// The combined view of every unit error recorded in a report.
#[derive(Clone, Debug)]
pub enum Errors {
    One(Arc<Error>),
    Many(Vec<Arc<Error>>),
}

// === impl Error ===

impl Error {
    /// True if the error is an unauthorized or forbidden response from either
    /// a cluster API server or the policy backend.
    pub fn is_unauthorized(&self) -> bool {
        self.authorization_hint().is_some()
    }

    /// Wraps unauthorized and forbidden errors so that they describe the
    /// missing policy. Other errors are returned unchanged.
    pub fn with_authorization_hint(self) -> Self {
        match self.authorization_hint() {
            Some(hint) => Self::Unauthorized {
                source: Box::new(self),
                hint,
            },
            None => self,
        }
    }

    fn authorization_hint(&self) -> Option<&'static str> {
        match self {
            Self::Kube(kube::Error::Api(rsp)) if rsp.code == 401 || rsp.code == 403 => {
                Some(KUBERNETES_AUTHORIZATION_HINT)
            }
            Self::Backend(e) if e.is_forbidden_or_unauthorized() => {
                Some(BACKEND_AUTHORIZATION_HINT)
            }
            _ => None,
        }
    }
}

// === impl Errors ===

impl Errors {
    /// Returns `None` when there are no errors and unwraps a lone error.
    pub fn from_errors(errors: impl IntoIterator<Item = Arc<Error>>) -> Option<Self> {
        let mut errors = errors.into_iter().collect::<Vec<_>>();
        match errors.len() {
            0 => None,
            1 => errors.pop().map(Self::One),
            _ => Some(Self::Many(errors)),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::One(_) => 1,
            Self::Many(errors) => errors.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Error>> {
        match self {
            Self::One(error) => std::slice::from_ref(error).iter(),
            Self::Many(errors) => errors.iter(),
        }
    }
}

impl fmt::Display for Errors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::One(error) => fmt::Display::fmt(error, f),
            Self::Many(errors) => {
                write!(f, "{} errors occurred:", errors.len())?;
                for error in errors {
                    write!(f, "\n\t* {}", error)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for Errors {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::One(error) => Some(error.as_ref()),
            Self::Many(_) => None,
        }
    }
}
