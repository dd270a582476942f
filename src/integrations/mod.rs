//! External service integrations.

pub mod ollama_client {
    pub use crate::ollama_client::*;
}
