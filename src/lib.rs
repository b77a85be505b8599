//! Compile OpenAPI 3.x documents into operation descriptors.
//!
//! Endpoints of a document become *actions* (call an endpoint) and
//! *triggers* (poll a list endpoint), shaped by per-operation configuration.
//! The output is plain data handed to a [`Renderer`].
//!
//! # Usage
//!
//! ```no_run
//! use opgen::{ApiDocument, GeneratorConfig, JsonRenderer, Renderer, compile};
//!
//! let doc = ApiDocument::parse("openapi: 3.0.0\npaths: {}\n").unwrap();
//! let generation = compile(&doc, &GeneratorConfig::default()).unwrap();
//! let text = JsonRenderer::pretty().render(&generation).unwrap();
//! ```

pub mod assemble;
pub mod config;
pub mod context;
pub mod descriptor;
pub mod document;
pub mod endpoint;
pub mod error;
pub mod field;
pub mod naming;
pub mod pagination;
pub mod render;
pub mod request;
pub mod response;
pub mod schema;
pub mod source;
pub mod transform;

pub use assemble::{TITLE_PHRASE, compile};
pub use config::{ConfigStore, GeneratorConfig};
pub use context::CompileContext;
pub use descriptor::{
    ActionDescriptor, Generation, OperationDescriptor, TriggerDescriptor,
};
pub use document::ApiDocument;
pub use error::{ConfigError, GenerateError, RequestError, SourceError};
pub use render::{JsonRenderer, Renderer};
