pub mod geometry {
    use glam::DVec3;
    use serde::{Deserialize, Serialize};

    /// 三维点，内部以 `glam::DVec3` 表示，坐标均为双精度。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point3(pub DVec3);

    impl Point3 {
        #[inline]
        pub fn new(x: f64, y: f64, z: f64) -> Self {
            Self(DVec3::new(x, y, z))
        }

        #[inline]
        pub fn origin() -> Self {
            Self(DVec3::ZERO)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn z(self) -> f64 {
            self.0.z
        }

        #[inline]
        pub fn translate(self, offset: Vector3) -> Self {
            Self(self.0 + offset.0)
        }

        #[inline]
        pub fn distance(self, other: Point3) -> f64 {
            self.0.distance(other.0)
        }

        #[inline]
        pub fn as_vec3(self) -> DVec3 {
            self.0
        }
    }

    impl From<DVec3> for Point3 {
        fn from(value: DVec3) -> Self {
            Self(value)
        }
    }

    /// 三维向量，目前只用于沿坐标轴平移球心。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector3(pub DVec3);

    impl Vector3 {
        #[inline]
        pub fn new(x: f64, y: f64, z: f64) -> Self {
            Self(DVec3::new(x, y, z))
        }
    }

    impl std::ops::Neg for Vector3 {
        type Output = Vector3;

        fn neg(self) -> Self::Output {
            Self(-self.0)
        }
    }

    impl From<DVec3> for Vector3 {
        fn from(value: DVec3) -> Self {
            Self(value)
        }
    }

    /// 球体：圆心 + 半径。胞体与带半径的采样点都以此表示。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Sphere3 {
        pub center: Point3,
        pub radius: f64,
    }

    impl Sphere3 {
        #[inline]
        pub fn new(center: Point3, radius: f64) -> Self {
            Self { center, radius }
        }

        /// 沿 X/Y/Z 三轴的六个极点，每轴先负向后正向。
        pub fn extremal_points(&self) -> ([Point3; 2], [Point3; 2], [Point3; 2]) {
            let r = self.radius;
            let axis = |offset: Vector3| {
                [self.center.translate(-offset), self.center.translate(offset)]
            };
            (
                axis(Vector3::new(r, 0.0, 0.0)),
                axis(Vector3::new(0.0, r, 0.0)),
                axis(Vector3::new(0.0, 0.0, r)),
            )
        }
    }

    /// 计算点集质心，空集返回 `None`。
    pub fn centroid(points: &[Point3]) -> Option<Point3> {
        if points.is_empty() {
            return None;
        }
        let sum = points
            .iter()
            .fold(DVec3::ZERO, |acc, point| acc + point.as_vec3());
        Some(Point3(sum / points.len() as f64))
    }
}

pub mod morphology {
    use serde::{Deserialize, Serialize};
    use thiserror::Error;

    use crate::geometry::{Point3, Sphere3, centroid};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct BranchId(u32);

    impl BranchId {
        pub const ROOT: BranchId = BranchId(0);

        #[inline]
        pub fn new(raw: u32) -> Self {
            Self(raw)
        }

        /// 提供原始数值，便于序列化或日志输出。
        #[inline]
        pub fn get(self) -> u32 {
            self.0
        }

        #[inline]
        pub fn index(self) -> usize {
            self.0 as usize
        }
    }

    /// 神经元结构类型。导出时只区分胞体与其余分支。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum BranchKind {
        Soma,
        Axon,
        BasalDendrite,
        ApicalDendrite,
        Undefined,
    }

    impl BranchKind {
        /// 按 SWC 结构类型编号映射，未知编号归为 `Undefined`。
        pub fn from_swc_type(code: i32) -> Self {
            match code {
                1 => BranchKind::Soma,
                2 => BranchKind::Axon,
                3 => BranchKind::BasalDendrite,
                4 => BranchKind::ApicalDendrite,
                _ => BranchKind::Undefined,
            }
        }

        pub fn describe(self) -> &'static str {
            match self {
                BranchKind::Soma => "soma",
                BranchKind::Axon => "axon",
                BranchKind::BasalDendrite => "basal_dendrite",
                BranchKind::ApicalDendrite => "apical_dendrite",
                BranchKind::Undefined => "undefined",
            }
        }
    }

    /// 形态树中两个分叉点之间的一段，保存有序采样点及逐点半径。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Branch {
        kind: BranchKind,
        points: Vec<Point3>,
        radii: Vec<f64>,
        #[serde(default)]
        children: Vec<BranchId>,
    }

    impl Branch {
        /// `points` 与 `radii` 须等长，调用方负责保证。
        pub fn new(kind: BranchKind, points: Vec<Point3>, radii: Vec<f64>) -> Self {
            debug_assert_eq!(points.len(), radii.len());
            Self {
                kind,
                points,
                radii,
                children: Vec::new(),
            }
        }

        #[inline]
        pub fn kind(&self) -> BranchKind {
            self.kind
        }

        #[inline]
        pub fn is_soma(&self) -> bool {
            self.kind == BranchKind::Soma
        }

        #[inline]
        pub fn points(&self) -> &[Point3] {
            &self.points
        }

        #[inline]
        pub fn radii(&self) -> &[f64] {
            &self.radii
        }

        #[inline]
        pub fn children(&self) -> &[BranchId] {
            &self.children
        }

        /// 胞体的聚合球：圆心取采样质心，半径取各采样到质心的平均距离。
        /// 单点胞体的平均距离为零，此时退回到采样半径的平均值。
        /// 非胞体分支返回 `None`。
        pub fn soma_sphere(&self) -> Option<Sphere3> {
            if !self.is_soma() {
                return None;
            }
            let center = centroid(&self.points)?;
            let count = self.points.len() as f64;
            let mean_distance = self
                .points
                .iter()
                .map(|point| point.distance(center))
                .sum::<f64>()
                / count;
            let radius = if mean_distance > 0.0 || self.radii.is_empty() {
                mean_distance
            } else {
                self.radii.iter().sum::<f64>() / self.radii.len() as f64
            };
            Some(Sphere3::new(center, radius))
        }
    }

    /// 原始采样表中的一行。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct RawSample {
        pub x: f64,
        pub y: f64,
        pub z: f64,
        pub diameter: f64,
    }

    impl RawSample {
        #[inline]
        pub fn position(&self) -> Point3 {
            Point3::new(self.x, self.y, self.z)
        }
    }

    /// 与树结构无关的扁平采样表，点云导出直接逐行读取。
    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
    pub struct RawSamples {
        rows: Vec<RawSample>,
    }

    impl RawSamples {
        pub fn new(rows: Vec<RawSample>) -> Self {
            Self { rows }
        }

        #[inline]
        pub fn rows(&self) -> &[RawSample] {
            &self.rows
        }

        #[inline]
        pub fn len(&self) -> usize {
            self.rows.len()
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.rows.is_empty()
        }
    }

    #[derive(Debug, Error)]
    pub enum TreeError {
        #[error("parent branch {0} does not exist")]
        UnknownParent(u32),
    }

    /// 形态树：分支以 `BranchId` 为下标存放，根分支固定为 0。
    /// 子分支只能挂到已存在的分支上，因此经由 `add_branch` 构造的树必然无环。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct MorphoTree {
        branches: Vec<Branch>,
        #[serde(default)]
        raw_samples: RawSamples,
    }

    impl MorphoTree {
        pub fn new(root: Branch) -> Self {
            Self {
                branches: vec![root],
                raw_samples: RawSamples::default(),
            }
        }

        /// 追加分支并登记到父分支的子列表末尾。
        pub fn add_branch(
            &mut self,
            parent: BranchId,
            branch: Branch,
        ) -> Result<BranchId, TreeError> {
            if parent.index() >= self.branches.len() {
                return Err(TreeError::UnknownParent(parent.get()));
            }
            let id = BranchId(self.branches.len() as u32);
            self.branches.push(branch);
            self.branches[parent.index()].children.push(id);
            Ok(id)
        }

        #[inline]
        pub fn root(&self) -> &Branch {
            &self.branches[0]
        }

        #[inline]
        pub fn branch(&self, id: BranchId) -> Option<&Branch> {
            self.branches.get(id.index())
        }

        pub fn branches(&self) -> impl Iterator<Item = (BranchId, &Branch)> {
            self.branches
                .iter()
                .enumerate()
                .map(|(index, branch)| (BranchId(index as u32), branch))
        }

        #[inline]
        pub fn len(&self) -> usize {
            self.branches.len()
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.branches.is_empty()
        }

        #[inline]
        pub fn raw_samples(&self) -> &RawSamples {
            &self.raw_samples
        }

        pub fn set_raw_samples(&mut self, samples: RawSamples) {
            self.raw_samples = samples;
        }
    }

}

#[cfg(test)]
mod tests {
    use super::geometry::*;

    #[test]
    fn extremal_points_are_ordered_negative_first() {
        let sphere = Sphere3::new(Point3::new(1.0, 2.0, 3.0), 0.5);
        let (xs, ys, zs) = sphere.extremal_points();
        assert_eq!(xs, [Point3::new(0.5, 2.0, 3.0), Point3::new(1.5, 2.0, 3.0)]);
        assert_eq!(ys, [Point3::new(1.0, 1.5, 3.0), Point3::new(1.0, 2.5, 3.0)]);
        assert_eq!(zs, [Point3::new(1.0, 2.0, 2.5), Point3::new(1.0, 2.0, 3.5)]);
    }

    #[test]
    fn centroid_of_empty_set_is_none() {
        assert!(centroid(&[]).is_none());
        let c = centroid(&[Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 4.0, 6.0)]).unwrap();
        assert_eq!(c, Point3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn translate_and_distance_agree() {
        let p = Point3::origin().translate(Vector3::new(3.0, 4.0, 0.0));
        assert!((p.distance(Point3::origin()) - 5.0).abs() < f64::EPSILON);
    }
}
