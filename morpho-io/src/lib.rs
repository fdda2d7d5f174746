use std::path::Path;

use morpho_core::morphology::MorphoTree;
use morpho_engine::EngineError;
use thiserror::Error;

pub mod geo;
pub mod gmsh;
pub mod swc;

pub use geo::GeoWriter;
pub use gmsh::{ExportMode, ExporterFlags, GmshExporter};
pub use swc::SwcFacade;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),
    #[error("failed to read file {path:?}: {source}")]
    ReadError {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write file {path:?}: {source}")]
    WriteError {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write output stream: {source}")]
    Stream {
        #[source]
        source: std::io::Error,
    },
    #[error("invalid morphology: {0}")]
    InvalidDocument(String),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

pub trait MorphologyLoader {
    fn load(&self, path: &Path) -> Result<MorphoTree, IoError>;
}
