use std::io;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, ValueEnum};
use morpho_config::{AppConfig, ConfigError, ExportMode};
use morpho_io::{ExporterFlags, GmshExporter, MorphologyLoader, SwcFacade};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

/// 将 SWC 神经元形态导出为 GMSH `.geo` 几何描述。
#[derive(Debug, Parser)]
#[command(name = "morpho-app", version)]
struct Cli {
    /// 输入的 SWC 形态文件
    input: PathBuf,
    /// 输出的 .geo 文件，缺省时写到标准输出
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// 导出模式，缺省取配置中的 `export.default_mode`
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,
    /// 胞体以单点表示，不生成胞体线段
    #[arg(long, overrides_with = "no_single_soma")]
    single_soma: bool,
    /// 胞体照常生成线段，覆盖配置中的 `export.single_soma = true`
    #[arg(long, overrides_with = "single_soma")]
    no_single_soma: bool,
    /// 显式指定配置文件
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Cli {
    /// 命令行未指定时返回 `None`，交由配置决定。
    fn single_soma_override(&self) -> Option<bool> {
        match (self.single_soma, self.no_single_soma) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    PointCloud,
    Wireframe,
    Solid,
}

impl From<ModeArg> for ExportMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::PointCloud => ExportMode::PointCloud,
            ModeArg::Wireframe => ExportMode::Wireframe,
            ModeArg::Solid => ExportMode::Solid,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let loaded = load_configuration(cli.config.as_deref());
    let config = loaded.as_ref().cloned().unwrap_or_default();
    // 日志等级来自配置，配置错误在日志初始化之后报告
    init_logging(&config);
    if let Err(err) = &loaded {
        warn!(error = %err, "加载配置失败，使用内建默认值");
    }
    info!("启动 morpho-mesh 导出");

    if let Err(err) = run(&cli, &config) {
        error!(error = %format!("{err:#}"), "导出失败");
        std::process::exit(1);
    }
}

fn run(cli: &Cli, config: &AppConfig) -> anyhow::Result<()> {
    let mode = cli
        .mode
        .map(ExportMode::from)
        .unwrap_or(config.export.default_mode);
    let flags = ExporterFlags {
        single_soma: cli.single_soma_override().unwrap_or(config.export.single_soma),
    };

    let tree = SwcFacade::new()
        .load(&cli.input)
        .with_context(|| format!("无法读取形态文件 {}", cli.input.display()))?;
    info!(
        input = %cli.input.display(),
        branches = tree.len(),
        samples = tree.raw_samples().len(),
        "形态文件加载完成"
    );

    let exporter = GmshExporter::new(cli.input.display().to_string(), flags);
    match &cli.output {
        Some(path) => {
            exporter
                .export_to_path(mode, &tree, path)
                .with_context(|| format!("无法写出 {}", path.display()))?;
            info!(output = %path.display(), %mode, "GEO 文件已写出");
        }
        None => {
            let stdout = io::stdout();
            exporter
                .export(mode, &tree, stdout.lock())
                .context("写出到标准输出失败")?;
        }
    }
    Ok(())
}

/// 显式路径优先，否则按环境变量与 `./config/default.toml` 自动发现。
fn load_configuration(override_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    match override_path {
        Some(path) => AppConfig::from_file(path),
        None => AppConfig::discover(),
    }
}

/// 日志写到标准错误，标准输出留给 GEO 文本。
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(config.logging.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter).with_writer(io::stderr);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}
