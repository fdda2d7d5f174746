//! 球体的粗粒度多面近似：6 个极点、12 段四分之一圆弧、8 个直纹曲面、1 个体。

use morpho_core::geometry::Sphere3;
use tracing::debug;

use crate::registry::{GeoPoint, GeoRegistry, LineId, LoopEdge, VolumeId};

/// 把球体登记到 `registry`，返回包围它的体编号。
///
/// 每个卦限由 x/y/z 三个极点各取其一确定，其边界线环依次为
/// `xy` 弧、`yz` 弧以及逆向的 `xz` 弧。同一对极点之间的弧只登记一次，
/// 由相邻卦限的线环共同引用。圆心也会作为非 physical 点登记，供圆弧引用。
pub fn tessellate_sphere(registry: &mut GeoRegistry, sphere: &Sphere3) -> VolumeId {
    let (xs, ys, zs) = sphere.extremal_points();
    let center = GeoPoint::at(sphere.center);
    let pole = |coords| GeoPoint::at(coords).physical(true);

    let mut xz_arcs: [[Option<LineId>; 2]; 2] = [[None; 2]; 2];
    let mut yz_arcs: [[Option<LineId>; 2]; 2] = [[None; 2]; 2];
    let mut loops = Vec::with_capacity(8);

    for (xi, x) in xs.iter().enumerate() {
        for (yi, y) in ys.iter().enumerate() {
            let xy = registry.add_circle(center, pole(*x), pole(*y), true);
            for (zi, z) in zs.iter().enumerate() {
                let xz = *xz_arcs[xi][zi]
                    .get_or_insert_with(|| registry.add_circle(center, pole(*x), pole(*z), true));
                let yz = *yz_arcs[yi][zi]
                    .get_or_insert_with(|| registry.add_circle(center, pole(*y), pole(*z), true));

                let edges = vec![
                    LoopEdge::forward(xy),
                    LoopEdge::forward(yz),
                    LoopEdge::reverse(xz),
                ];
                loops.push(registry.add_line_loop(edges, true, true));
            }
        }
    }

    let volume = registry.add_volume(loops, false);
    debug!(
        volume = volume.get(),
        radius = sphere.radius,
        "tessellated sphere"
    );
    volume
}
