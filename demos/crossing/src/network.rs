//! The demo road network.
//!
//! ```text
//!                       n (0,100)
//!                       ↑
//!   w2 ───────────────────────────────── e2 ──→ x   (lane 2, y = 3.5)
//!   w1 ───────────────────────────────── e1 ──→ y   (lane 1, y = 0)
//!                       ↑
//!                       sm (0,-20)  signal
//!                       ↑
//!                       s (0,-100)
//! ```
//!
//! Both lanes run west to east and allow lane changes along their whole
//! length.  Only lane 2 continues to `x`, so traffic for `x` entering on
//! lane 1 must change lanes before `e1`.  The side road has lower priority
//! than the arterial and a signal at `sm`.

use ts_core::{EdgeId, KernelConfig, NodeId, Vec2};
use ts_spatial::{EdgeSpec, NodeSpec, RoadNetwork, RoadNetworkBuilder, SpatialResult};

/// Named nodes and entry edges of the demo network.
pub struct Layout {
    pub lane1_entry: EdgeId,
    pub lane2_entry: EdgeId,
    pub side_entry:  EdgeId,
    pub signal:      NodeId,
    pub exit_x:      NodeId,
    pub exit_y:      NodeId,
    pub exit_north:  NodeId,
}

pub fn build_network(kernel: KernelConfig) -> SpatialResult<(RoadNetwork, Layout)> {
    let mut b = RoadNetworkBuilder::new().kernel(kernel);
    let mut at = |x: f64, y: f64| b.add_node(NodeSpec::at(Vec2::new(x, y)));

    let w1 = at(-150.0, 0.0);
    let e1 = at(150.0, 0.0);
    let y  = at(250.0, 0.0);
    let w2 = at(-150.0, 3.5);
    let e2 = at(150.0, 3.5);
    let x  = at(250.0, 3.5);
    let s  = at(0.0, -100.0);
    let n  = at(0.0, 100.0);
    let sm = b.add_node(NodeSpec::at(Vec2::new(0.0, -20.0)).with_signal());

    let arterial = EdgeSpec::default().priority(2).target_velocity(13.9);
    let side = EdgeSpec::default().priority(1).target_velocity(8.3);

    let lane1_entry = b.add_edge(w1, e1, arterial.clone());
    b.add_edge(e1, y, arterial.clone());
    let lane2_entry = b.add_edge(w2, e2, arterial.clone());
    b.add_edge(e2, x, arterial);
    let side_entry = b.add_edge(s, sm, side.clone());
    b.add_edge(sm, n, side);

    let network = b.build()?;
    log::info!(
        "demo network: {} nodes, {} edges, {} intersections",
        network.node_count(),
        network.edge_count(),
        network.conflicts.len(),
    );
    Ok((
        network,
        Layout {
            lane1_entry,
            lane2_entry,
            side_entry,
            signal: sm,
            exit_x: x,
            exit_y: y,
            exit_north: n,
        },
    ))
}
