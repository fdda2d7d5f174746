use morpho_core::geometry::Sphere3;
use morpho_core::morphology::{Branch, BranchId, MorphoTree, RawSamples};
use tracing::debug;

use crate::errors::EngineError;
use crate::registry::{GeoPoint, GeoRegistry};
use crate::sphere::tessellate_sphere;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// 胞体以单点表示：不为胞体分支生成线段。
    pub single_soma: bool,
}

/// 点云：忽略树结构，原始采样表每行一个点，保留各自直径。
pub fn build_point_cloud(samples: &RawSamples) -> GeoRegistry {
    let mut registry = GeoRegistry::new();
    for row in samples.rows() {
        registry.add_point(GeoPoint::new(row.position(), row.diameter));
    }
    debug!(rows = samples.len(), points = registry.points().len(), "built point cloud");
    registry
}

/// 线框：每个分支的相邻采样点之间登记一条 physical 线段。
pub fn build_wireframe(
    tree: &MorphoTree,
    options: BuildOptions,
) -> Result<GeoRegistry, EngineError> {
    let mut registry = GeoRegistry::new();
    walk_pre_order(tree, |branch| {
        add_branch_segments(&mut registry, branch, options);
    })?;
    debug!(stats = ?registry.stats(), "built wireframe");
    Ok(registry)
}

/// 实体：胞体生成一个聚合球，其余分支每个采样点按其半径生成一个球，
/// 然后与线框模式一样补上线段。
pub fn build_solid(
    tree: &MorphoTree,
    options: BuildOptions,
) -> Result<GeoRegistry, EngineError> {
    let mut registry = GeoRegistry::new();
    walk_pre_order(tree, |branch| {
        if let Some(sphere) = branch.soma_sphere() {
            tessellate_sphere(&mut registry, &sphere);
        } else {
            for (point, radius) in branch.points().iter().zip(branch.radii()) {
                tessellate_sphere(&mut registry, &Sphere3::new(*point, *radius));
            }
        }
        add_branch_segments(&mut registry, branch, options);
    })?;
    debug!(stats = ?registry.stats(), "built solid object");
    Ok(registry)
}

fn add_branch_segments(registry: &mut GeoRegistry, branch: &Branch, options: BuildOptions) {
    if branch.is_soma() && options.single_soma {
        return;
    }
    for pair in branch.points().windows(2) {
        let start = GeoPoint::at(pair[0]).physical(true);
        let end = GeoPoint::at(pair[1]).physical(true);
        registry.add_segment(start, end, true);
    }
}

/// 从根分支开始深度优先先序遍历，子分支按列表顺序访问。
/// 重复到达同一分支视为环，立即中止。
fn walk_pre_order<F>(tree: &MorphoTree, mut visit: F) -> Result<(), EngineError>
where
    F: FnMut(&Branch),
{
    let mut visited = vec![false; tree.len()];
    let mut pending = vec![BranchId::ROOT];

    while let Some(id) = pending.pop() {
        let branch = tree
            .branch(id)
            .ok_or(EngineError::BranchNotFound(id.get()))?;
        if std::mem::replace(&mut visited[id.index()], true) {
            return Err(EngineError::BranchRevisited(id.get()));
        }
        visit(branch);
        pending.extend(branch.children().iter().rev().copied());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use morpho_core::geometry::Point3;
    use morpho_core::morphology::{BranchKind, RawSample};

    /// 胞体位于原点（单采样、半径 5），一个子分支沿 z 轴延伸 10。
    fn two_branch_tree() -> MorphoTree {
        let mut tree = MorphoTree::new(Branch::new(
            BranchKind::Soma,
            vec![Point3::origin()],
            vec![5.0],
        ));
        tree.add_branch(
            BranchId::ROOT,
            Branch::new(
                BranchKind::Axon,
                vec![Point3::origin(), Point3::new(0.0, 0.0, 10.0)],
                vec![1.0, 1.0],
            ),
        )
        .unwrap();
        tree
    }

    fn line_soma_tree() -> MorphoTree {
        let mut tree = MorphoTree::new(Branch::new(
            BranchKind::Soma,
            vec![
                Point3::new(-1.0, 0.0, 0.0),
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
            ],
            vec![1.0; 3],
        ));
        tree.add_branch(
            BranchId::ROOT,
            Branch::new(
                BranchKind::BasalDendrite,
                vec![
                    Point3::new(1.0, 0.0, 0.0),
                    Point3::new(2.0, 0.0, 0.0),
                    Point3::new(3.0, 0.0, 0.0),
                    Point3::new(4.0, 1.0, 0.0),
                ],
                vec![0.5; 4],
            ),
        )
        .unwrap();
        tree
    }

    #[test]
    fn wireframe_of_two_branch_tree() {
        let registry = build_wireframe(&two_branch_tree(), BuildOptions::default()).unwrap();
        assert_eq!(registry.segments().len(), 1);
        assert_eq!(registry.points().len(), 2);
        assert!(registry.circles().is_empty());

        let segment = &registry.segments()[0];
        assert_eq!(segment.start.coords, Point3::origin());
        assert_eq!(segment.end.coords, Point3::new(0.0, 0.0, 10.0));
        assert!(segment.physical);
        assert!(registry.points().iter().all(|p| p.point.physical));
    }

    #[test]
    fn wireframe_adds_length_minus_one_segments_per_branch() {
        let registry = build_wireframe(&line_soma_tree(), BuildOptions::default()).unwrap();
        // 胞体 3 点 -> 2 段，子分支 4 点 -> 3 段
        assert_eq!(registry.segments().len(), 5);
        // 子分支首点与胞体末点重合
        assert_eq!(registry.points().len(), 6);
    }

    #[test]
    fn single_soma_suppresses_only_soma_segments() {
        let options = BuildOptions { single_soma: true };
        let registry = build_wireframe(&line_soma_tree(), options).unwrap();
        assert_eq!(registry.segments().len(), 3);
        assert!(
            registry
                .segments()
                .iter()
                .all(|s| s.start.coords.x() >= 1.0 && s.end.coords.x() >= 1.0)
        );

        let solid = build_solid(&line_soma_tree(), options).unwrap();
        assert_eq!(solid.segments().len(), 3);
    }

    #[test]
    fn children_are_visited_depth_first_in_order() {
        let mut tree =
            MorphoTree::new(Branch::new(BranchKind::Soma, vec![Point3::origin()], vec![1.0]));
        let segment = |z: f64| {
            Branch::new(
                BranchKind::Axon,
                vec![Point3::new(0.0, 0.0, z), Point3::new(0.0, 0.0, z + 0.5)],
                vec![0.1, 0.1],
            )
        };
        let a = tree.add_branch(BranchId::ROOT, segment(1.0)).unwrap();
        tree.add_branch(BranchId::ROOT, segment(3.0)).unwrap();
        tree.add_branch(a, segment(2.0)).unwrap();

        let registry = build_wireframe(&tree, BuildOptions::default()).unwrap();
        let starts: Vec<f64> = registry.segments().iter().map(|s| s.start.coords.z()).collect();
        assert_eq!(starts, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn solid_tessellates_soma_once_and_each_neurite_sample() {
        let registry = build_solid(&two_branch_tree(), BuildOptions::default()).unwrap();
        // 胞体 1 个球 + 子分支 2 个采样点各 1 个球
        assert_eq!(registry.volumes().len(), 3);
        assert_eq!(registry.circles().len(), 36);
        assert_eq!(registry.line_loops().len(), 24);
        assert_eq!(registry.segments().len(), 1);
        // 线段编号排在全部圆弧之后
        assert_eq!(registry.segments()[0].id.get(), 36);
    }

    #[test]
    fn short_branch_still_gets_spheres_in_solid_mode() {
        let mut tree =
            MorphoTree::new(Branch::new(BranchKind::Soma, vec![Point3::origin()], vec![2.0]));
        tree.add_branch(
            BranchId::ROOT,
            Branch::new(BranchKind::Axon, vec![Point3::new(5.0, 0.0, 0.0)], vec![1.0]),
        )
        .unwrap();
        let registry = build_solid(&tree, BuildOptions::default()).unwrap();
        assert!(registry.segments().is_empty());
        assert_eq!(registry.volumes().len(), 2);
    }

    #[test]
    fn point_cloud_keeps_diameters_and_dedups() {
        let samples = RawSamples::new(vec![
            RawSample { x: 0.0, y: 0.0, z: 0.0, diameter: 10.0 },
            RawSample { x: 0.0, y: 0.0, z: 10.0, diameter: 2.0 },
            RawSample { x: 0.0, y: 0.0, z: 0.0, diameter: 3.0 },
        ]);
        let registry = build_point_cloud(&samples);
        assert_eq!(registry.points().len(), 2);
        assert!((registry.points()[0].point.diameter - 10.0).abs() < f64::EPSILON);
        assert!(registry.points().iter().all(|p| !p.point.physical));
        assert!(registry.segments().is_empty());
    }

    #[test]
    fn dangling_child_reference_is_reported() {
        let json = r#"{
            "branches": [
                {"kind": "soma", "points": [[0.0, 0.0, 0.0]], "radii": [1.0], "children": [4]}
            ]
        }"#;
        let tree: MorphoTree = parse_tree(json);
        let err = build_wireframe(&tree, BuildOptions::default()).unwrap_err();
        assert!(matches!(err, EngineError::BranchNotFound(4)));
    }

    #[test]
    fn cyclic_tree_is_rejected() {
        let json = r#"{
            "branches": [
                {"kind": "soma", "points": [[0.0, 0.0, 0.0]], "radii": [1.0], "children": [1]},
                {"kind": "axon", "points": [[0.0, 0.0, 1.0]], "radii": [1.0], "children": [0]}
            ]
        }"#;
        let tree: MorphoTree = parse_tree(json);
        let err = build_solid(&tree, BuildOptions::default()).unwrap_err();
        assert!(matches!(err, EngineError::BranchRevisited(0)));
    }

    fn parse_tree(json: &str) -> MorphoTree {
        serde_json::from_str(json).expect("parse tree fixture")
    }
}
