use std::collections::HashMap;
use std::fmt;

use morpho_core::geometry::Point3;
use tracing::trace;

use crate::errors::EngineError;

/// 未显式指定时点的直径（GMSH 中即特征长度）。
pub const DEFAULT_DIAMETER: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PointId(usize);

impl PointId {
    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

/// 线段与圆弧共用的线元编号。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LineId(usize);

impl LineId {
    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoopId(usize);

impl LoopId {
    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VolumeId(usize);

impl VolumeId {
    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

/// 待登记的点：坐标、直径与 physical 标记。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub coords: Point3,
    pub diameter: f64,
    pub physical: bool,
}

impl GeoPoint {
    #[inline]
    pub fn new(coords: Point3, diameter: f64) -> Self {
        Self {
            coords,
            diameter,
            physical: false,
        }
    }

    #[inline]
    pub fn at(coords: Point3) -> Self {
        Self::new(coords, DEFAULT_DIAMETER)
    }

    #[inline]
    pub fn physical(mut self, physical: bool) -> Self {
        self.physical = physical;
        self
    }
}

/// 去重键：坐标的位模式。`-0.0` 先归一为 `0.0`，与浮点 `==` 保持一致。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PointKey([u64; 3]);

impl PointKey {
    fn of(coords: Point3) -> Self {
        let bits = |value: f64| (value + 0.0).to_bits();
        Self([bits(coords.x()), bits(coords.y()), bits(coords.z())])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointRecord {
    pub id: PointId,
    pub point: GeoPoint,
}

/// 线段保存端点的值而非编号，序列化时再解析为点编号。
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentRecord {
    pub id: LineId,
    pub start: GeoPoint,
    pub end: GeoPoint,
    pub physical: bool,
}

/// 过三点的圆弧：起点、圆心、终点。
#[derive(Debug, Clone, PartialEq)]
pub struct CircleRecord {
    pub id: LineId,
    pub center: GeoPoint,
    pub start: GeoPoint,
    pub end: GeoPoint,
    pub physical: bool,
}

/// 线环中的一条边，`reversed` 表示逆向遍历（输出时取负号）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopEdge {
    pub line: LineId,
    pub reversed: bool,
}

impl LoopEdge {
    #[inline]
    pub fn forward(line: LineId) -> Self {
        Self {
            line,
            reversed: false,
        }
    }

    #[inline]
    pub fn reverse(line: LineId) -> Self {
        Self {
            line,
            reversed: true,
        }
    }
}

impl fmt::Display for LoopEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // 编号 0 取负仍是 0，不输出 `-0`
        if self.reversed && self.line.get() > 0 {
            write!(f, "-{}", self.line.get())
        } else {
            write!(f, "{}", self.line.get())
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineLoopRecord {
    pub id: LoopId,
    pub edges: Vec<LoopEdge>,
    pub ruled: bool,
    pub physical: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VolumeRecord {
    pub id: VolumeId,
    pub loops: Vec<LoopId>,
    pub physical: bool,
}

/// 线段与圆弧共享的单调递增计数器。
#[derive(Debug, Default, Clone)]
pub struct LineIdCounter {
    next: usize,
}

impl LineIdCounter {
    pub fn next_id(&mut self) -> LineId {
        let id = self.next;
        self.next += 1;
        LineId(id)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RegistryStats {
    pub points: usize,
    pub segments: usize,
    pub circles: usize,
    pub line_loops: usize,
    pub volumes: usize,
}

/// 单次导出使用的几何实体表。
///
/// 各类实体按编号升序存放在稠密数组中：点编号等于首次插入的顺序，
/// 线段/圆弧编号来自共享计数器且单调递增，线环与体的编号等于插入时的容器长度。
/// 因此各数组的迭代顺序即为输出顺序。
#[derive(Debug, Default, Clone)]
pub struct GeoRegistry {
    points: Vec<PointRecord>,
    point_index: HashMap<PointKey, PointId>,
    segments: Vec<SegmentRecord>,
    circles: Vec<CircleRecord>,
    line_ids: LineIdCounter,
    line_loops: Vec<LineLoopRecord>,
    volumes: Vec<VolumeRecord>,
}

impl GeoRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记点；坐标已存在时返回原编号，首次登记的直径与标记保持不变。
    pub fn add_point(&mut self, point: GeoPoint) -> PointId {
        let key = PointKey::of(point.coords);
        if let Some(id) = self.point_index.get(&key) {
            return *id;
        }
        let id = PointId(self.points.len());
        trace!(
            id = id.get(),
            x = point.coords.x(),
            y = point.coords.y(),
            z = point.coords.z(),
            "register point"
        );
        self.points.push(PointRecord { id, point });
        self.point_index.insert(key, id);
        id
    }

    /// 按坐标精确查找点编号。
    pub fn find_point(&self, coords: Point3) -> Result<PointId, EngineError> {
        self.point_index
            .get(&PointKey::of(coords))
            .copied()
            .ok_or(EngineError::PointNotFound {
                x: coords.x(),
                y: coords.y(),
                z: coords.z(),
            })
    }

    pub fn add_segment(&mut self, start: GeoPoint, end: GeoPoint, physical: bool) -> LineId {
        self.add_point(start);
        self.add_point(end);
        let id = self.line_ids.next_id();
        self.segments.push(SegmentRecord {
            id,
            start,
            end,
            physical,
        });
        id
    }

    /// 登记圆弧。圆心先于两端点登记。
    pub fn add_circle(
        &mut self,
        center: GeoPoint,
        start: GeoPoint,
        end: GeoPoint,
        physical: bool,
    ) -> LineId {
        self.add_point(center);
        self.add_point(start);
        self.add_point(end);
        let id = self.line_ids.next_id();
        self.circles.push(CircleRecord {
            id,
            center,
            start,
            end,
            physical,
        });
        id
    }

    pub fn add_line_loop(&mut self, edges: Vec<LoopEdge>, ruled: bool, physical: bool) -> LoopId {
        let id = LoopId(self.line_loops.len());
        self.line_loops.push(LineLoopRecord {
            id,
            edges,
            ruled,
            physical,
        });
        id
    }

    pub fn add_volume(&mut self, loops: Vec<LoopId>, physical: bool) -> VolumeId {
        let id = VolumeId(self.volumes.len());
        self.volumes.push(VolumeRecord {
            id,
            loops,
            physical,
        });
        id
    }

    #[inline]
    pub fn points(&self) -> &[PointRecord] {
        &self.points
    }

    #[inline]
    pub fn segments(&self) -> &[SegmentRecord] {
        &self.segments
    }

    #[inline]
    pub fn circles(&self) -> &[CircleRecord] {
        &self.circles
    }

    #[inline]
    pub fn line_loops(&self) -> &[LineLoopRecord] {
        &self.line_loops
    }

    #[inline]
    pub fn volumes(&self) -> &[VolumeRecord] {
        &self.volumes
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            points: self.points.len(),
            segments: self.segments.len(),
            circles: self.circles.len(),
            line_loops: self.line_loops.len(),
            volumes: self.volumes.len(),
        }
    }
}
