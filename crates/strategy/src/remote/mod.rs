use crate::errors::DetectionBackendError;

pub mod llm_client;
pub mod llm_response;

pub use llm_client::{LanguageModel, OllamaClient};

#[cfg(test)]
pub use llm_client::MockLanguageModel;

/// A wire payload that converts into a domain value after validation.
pub trait RemoteResponse<T> {
    fn to_domain(&self) -> Result<T, DetectionBackendError>;
}
