use std::fmt;
use std::io::Write;

use morpho_engine::GeoRegistry;

use crate::IoError;

const GMSH_BANNER: &str = "/***************************************************************\n \
* gmsh file generated by morpho-mesh\n\
****************************************************************/\n\n";

/// 绝对值小于该阈值的坐标在输出时写为 `0`。
const ZERO_SNAP_EPSILON: f64 = f64::EPSILON;

/// 仅在格式化阶段把贴近零的坐标写成 `0`，不修改登记表中的值。
///
/// 其余数值使用 `f64` 的最短往返表示（如 `1.3333333333333333`），
/// 而非固定 6 位有效数字（`1.33333`），有效数字超过 6 位时两者文本不同。
#[derive(Debug, Clone, Copy)]
struct Coord(f64);

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.abs() < ZERO_SNAP_EPSILON {
            f.write_str("0")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

struct Joined<'a, T>(&'a [T]);

impl<T: fmt::Display> fmt::Display for Joined<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, item) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{item}")?;
        }
        Ok(())
    }
}

/// GMSH `.geo` 文本写出器。每类实体一段，按编号升序输出，
/// 带 physical 标记的实体追加一行 `Physical ...` 声明。
pub struct GeoWriter<W: Write> {
    out: W,
}

impl<W: Write> GeoWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn write_header(&mut self, source: &str) -> Result<(), IoError> {
        self.emit(format_args!("{GMSH_BANNER}// converted to GEO format from {source}\n"))
    }

    pub fn write_points(&mut self, registry: &GeoRegistry) -> Result<(), IoError> {
        self.open_block("export morphology points")?;
        for record in registry.points() {
            let id = record.id.get();
            let coords = record.point.coords;
            self.emit(format_args!(
                "Point({id}) = {{{}, {}, {}, {}}};\n",
                Coord(coords.x()),
                Coord(coords.y()),
                Coord(coords.z()),
                record.point.diameter
            ))?;
            if record.point.physical {
                self.emit(format_args!("Physical Point({id}) = {{{id}}};\n"))?;
            }
        }
        self.close_block()
    }

    pub fn write_segments(&mut self, registry: &GeoRegistry) -> Result<(), IoError> {
        self.open_block("export morphology segments")?;
        for segment in registry.segments() {
            let id = segment.id.get();
            let start = registry.find_point(segment.start.coords)?.get();
            let end = registry.find_point(segment.end.coords)?.get();
            self.emit(format_args!("Line({id}) = {{{start}, {end}}};\n"))?;
            if segment.physical {
                self.emit(format_args!("Physical Line({id}) = {{{id}}};\n"))?;
            }
        }
        self.close_block()
    }

    pub fn write_circles(&mut self, registry: &GeoRegistry) -> Result<(), IoError> {
        self.open_block("export morphology arc-circle")?;
        for circle in registry.circles() {
            let id = circle.id.get();
            let start = registry.find_point(circle.start.coords)?.get();
            let center = registry.find_point(circle.center.coords)?.get();
            let end = registry.find_point(circle.end.coords)?.get();
            self.emit(format_args!("Circle({id}) = {{{start}, {center}, {end}}};\n"))?;
            if circle.physical {
                self.emit(format_args!("Physical Line({id}) = {{{id}}};\n"))?;
            }
        }
        self.close_block()
    }

    pub fn write_line_loops(&mut self, registry: &GeoRegistry) -> Result<(), IoError> {
        self.open_block("export line loops")?;
        for line_loop in registry.line_loops() {
            let id = line_loop.id.get();
            self.emit(format_args!(
                "Line Loop({id}) = {{{}}};\n",
                Joined(&line_loop.edges)
            ))?;
            if line_loop.ruled {
                self.emit(format_args!("Ruled Surface({id}) = {{{id}}};\n"))?;
            }
            if line_loop.physical {
                self.emit(format_args!("Physical Surface({id}) = {{{id}}};\n"))?;
            }
        }
        self.close_block()
    }

    /// 每个体先声明一个 `Surface Loop`，再以同编号声明 `Volume`。
    pub fn write_volumes(&mut self, registry: &GeoRegistry) -> Result<(), IoError> {
        self.open_block("export volumes")?;
        for volume in registry.volumes() {
            let id = volume.id.get();
            let loops: Vec<usize> = volume.loops.iter().map(|l| l.get()).collect();
            self.emit(format_args!("Surface Loop({id}) = {{{}}};\n", Joined(&loops)))?;
            self.emit(format_args!("Volume({id}) = {{{id}}};\n"))?;
            if volume.physical {
                self.emit(format_args!("Physical Volume({id}) = {{{id}}};\n"))?;
            }
        }
        self.close_block()
    }

    /// 依次写出全部五段：点、线段、圆弧、线环、体。
    pub fn write_registry(&mut self, registry: &GeoRegistry) -> Result<(), IoError> {
        self.write_points(registry)?;
        self.write_segments(registry)?;
        self.write_circles(registry)?;
        self.write_line_loops(registry)?;
        self.write_volumes(registry)
    }

    pub fn flush(&mut self) -> Result<(), IoError> {
        self.out
            .flush()
            .map_err(|source| IoError::Stream { source })
    }

    fn open_block(&mut self, title: &str) -> Result<(), IoError> {
        self.emit(format_args!("\n// {title}\n"))
    }

    fn close_block(&mut self) -> Result<(), IoError> {
        self.emit(format_args!("\n\n"))
    }

    fn emit(&mut self, args: fmt::Arguments<'_>) -> Result<(), IoError> {
        self.out
            .write_fmt(args)
            .map_err(|source| IoError::Stream { source })
    }
}
