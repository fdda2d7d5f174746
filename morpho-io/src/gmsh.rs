use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use morpho_core::morphology::MorphoTree;
use morpho_engine::{BuildOptions, build_point_cloud, build_solid, build_wireframe};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::IoError;
use crate::geo::GeoWriter;

/// 三种导出模式。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportMode {
    PointCloud,
    #[default]
    Wireframe,
    Solid,
}

impl fmt::Display for ExportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExportMode::PointCloud => "point_cloud",
            ExportMode::Wireframe => "wireframe",
            ExportMode::Solid => "solid",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExporterFlags {
    /// 胞体在线框/实体模式中不生成线段。
    pub single_soma: bool,
}

impl From<ExporterFlags> for BuildOptions {
    fn from(flags: ExporterFlags) -> Self {
        BuildOptions {
            single_soma: flags.single_soma,
        }
    }
}

/// 把形态树导出为 GMSH `.geo` 文本。
///
/// 每次导出先写文件头，再构建一份全新的几何登记表，
/// 登记表完整填充后才开始逐段写出。
pub struct GmshExporter {
    source_name: String,
    flags: ExporterFlags,
}

impl GmshExporter {
    /// `source_name` 只用于文件头注释。
    pub fn new(source_name: impl Into<String>, flags: ExporterFlags) -> Self {
        Self {
            source_name: source_name.into(),
            flags,
        }
    }

    pub fn export_point_cloud<W: Write>(&self, tree: &MorphoTree, out: W) -> Result<(), IoError> {
        let mut writer = self.start(out)?;
        if tree.raw_samples().is_empty() {
            warn!(
                source = %self.source_name,
                "morphology has no raw samples, point cloud is empty"
            );
        }
        let registry = build_point_cloud(tree.raw_samples());
        writer.write_points(&registry)?;
        writer.flush()
    }

    pub fn export_wireframe<W: Write>(&self, tree: &MorphoTree, out: W) -> Result<(), IoError> {
        let mut writer = self.start(out)?;
        let registry = build_wireframe(tree, self.flags.into())?;
        writer.write_points(&registry)?;
        writer.write_segments(&registry)?;
        writer.flush()
    }

    pub fn export_solid<W: Write>(&self, tree: &MorphoTree, out: W) -> Result<(), IoError> {
        let mut writer = self.start(out)?;
        let registry = build_solid(tree, self.flags.into())?;
        debug!(stats = ?registry.stats(), "solid registry populated");
        writer.write_registry(&registry)?;
        writer.flush()
    }

    pub fn export<W: Write>(
        &self,
        mode: ExportMode,
        tree: &MorphoTree,
        out: W,
    ) -> Result<(), IoError> {
        info!(
            source = %self.source_name,
            %mode,
            single_soma = self.flags.single_soma,
            "exporting morphology to GEO"
        );
        match mode {
            ExportMode::PointCloud => self.export_point_cloud(tree, out),
            ExportMode::Wireframe => self.export_wireframe(tree, out),
            ExportMode::Solid => self.export_solid(tree, out),
        }
    }

    /// 导出到文件。文件句柄仅在本次调用内存活，出错时同样会被释放。
    pub fn export_to_path(
        &self,
        mode: ExportMode,
        tree: &MorphoTree,
        path: &Path,
    ) -> Result<(), IoError> {
        let file = File::create(path).map_err(|source| IoError::WriteError {
            path: path.to_path_buf(),
            source,
        })?;
        self.export(mode, tree, BufWriter::new(file))
            .map_err(|err| match err {
                IoError::Stream { source } => IoError::WriteError {
                    path: path.to_path_buf(),
                    source,
                },
                other => other,
            })
    }

    fn start<W: Write>(&self, out: W) -> Result<GeoWriter<W>, IoError> {
        let mut writer = GeoWriter::new(out);
        writer.write_header(&self.source_name)?;
        Ok(writer)
    }
}
