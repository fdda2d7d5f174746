pub mod builder;
pub mod registry;
pub mod sphere;

pub mod errors {
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub enum EngineError {
        #[error("point ({x}, {y}, {z}) is not registered in the list of morphology points")]
        PointNotFound { x: f64, y: f64, z: f64 },
        #[error("branch with id {0} not found")]
        BranchNotFound(u32),
        #[error("branch with id {0} reached twice, morphology tree contains a cycle")]
        BranchRevisited(u32),
    }
}

pub use builder::{BuildOptions, build_point_cloud, build_solid, build_wireframe};
pub use errors::EngineError;
pub use registry::GeoRegistry;
pub use sphere::tessellate_sphere;
