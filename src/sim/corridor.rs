//! Corridor topology
//!
//! A level's polygons are the corridors of the tube. Each corridor's two
//! local-z-negative vertices form its near edge; the edge midpoint and
//! in-plane angle drive every snap-to-wall placement in the game.

use crate::fixed::{ANG_128, Fx, FxVec3, atan2};
use crate::sim::object::Object;

/// Near-edge geometry of one corridor: the two rim vertices and their
/// midpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorridorProps {
    pub edge_a: FxVec3,
    pub midpoint: FxVec3,
    pub edge_b: FxVec3,
}

/// Near-edge points of a corridor. A valid corridor quad has exactly two
/// vertices with local z < 0; a mesh that violates this is malformed and
/// yields `None` (logged) instead of garbage geometry.
pub fn corridor_props(level_obj: &Object, corridor: usize) -> Option<CorridorProps> {
    let poly = level_obj.polygons.get(corridor)?;
    let verts = level_obj.verts.borrow();

    let mut edge = [FxVec3::ZERO; 2];
    let mut found = 0;
    for &lut in &poly.lut {
        let v = verts[lut];
        if v.z < 0 {
            if found < 2 {
                edge[found] = v;
            }
            found += 1;
        }
    }

    if found != 2 {
        log::error!("corridor {corridor} is malformed: {found} near vertices, expected 2");
        return None;
    }

    let midpoint = FxVec3::new(
        (edge[0].x + edge[1].x) >> 1,
        (edge[0].y + edge[1].y) >> 1,
        (edge[0].z + edge[1].z) >> 1,
    );
    Some(CorridorProps {
        edge_a: edge[0],
        midpoint,
        edge_b: edge[1],
    })
}

/// In-plane rotation of a corridor relative to the tube axis, from the
/// near-edge direction. An axis-parallel edge (zero y delta) degenerates to
/// 0 or a half turn, picked by the corridor normal, instead of dividing by
/// zero in the trig.
pub fn corridor_angle(level_obj: &Object, corridor: usize) -> Fx {
    let Some(props) = corridor_props(level_obj, corridor) else {
        return 0;
    };

    let delta_x = props.midpoint.x - props.edge_a.x;
    let delta_y = props.midpoint.y - props.edge_a.y;

    if delta_y == 0 {
        if level_obj.polygons[corridor].normal.y > 0 {
            0
        } else {
            ANG_128
        }
    } else {
        atan2(delta_x, delta_y)
    }
}

/// Align an object with a corridor: world x/y to the near-edge midpoint at
/// the given z, vertices reset to pristine, then a single negated z
/// rotation by the corridor angle. The core placement primitive shared by
/// the player and every climbing enemy.
pub fn snap_to_corridor(obj: &mut Object, level_obj: &Object, corridor: usize, z: Fx) {
    let Some(props) = corridor_props(level_obj, corridor) else {
        return;
    };

    obj.set_pos(props.midpoint.x, props.midpoint.y, z);
    obj.reset_verts();

    let angle = corridor_angle(level_obj, corridor);
    if angle != 0 {
        obj.rotate(FxVec3::new(0, 0, -angle));
    }
}

/// Step to the neighboring corridor index. Wrapping tubes are circular;
/// open strips return `None` past either boundary.
pub fn next_corridor(index: usize, count: usize, wrap: bool) -> Option<usize> {
    if index + 1 < count {
        Some(index + 1)
    } else if wrap {
        Some(0)
    } else {
        None
    }
}

pub fn prev_corridor(index: usize, count: usize, wrap: bool) -> Option<usize> {
    if index > 0 {
        Some(index - 1)
    } else if wrap {
        Some(count - 1)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MeshData;
    use crate::display::Cel;
    use crate::fixed::{fx, magnitude, vec_sub};

    fn tube_obj(sides: usize, closed: bool) -> Object {
        let mut obj =
            Object::from_mesh(&MeshData::tube(sides, fx(4), fx(4), closed), &Cel::coded(16, 16));
        obj.calc_normals();
        obj
    }

    /// Quad with a hand-authored horizontal near edge.
    fn flat_corridor() -> Object {
        let mesh = MeshData {
            verts: vec![
                [-fx(100), -fx(50), -fx(10)],
                [fx(100), -fx(50), -fx(10)],
                [fx(100), -fx(50), fx(10)],
                [-fx(100), -fx(50), fx(10)],
            ],
            polys: vec![[0, 1, 2, 3]],
        };
        let mut obj = Object::from_mesh(&mesh, &Cel::coded(16, 16));
        // Upward-facing corridor: the degenerate branch keeps it unrotated
        obj.polygons[0].normal = FxVec3::new(0, crate::fixed::ONE, 0);
        obj
    }

    #[test]
    fn test_axis_parallel_edge_scenario() {
        let obj = flat_corridor();
        let props = corridor_props(&obj, 0).unwrap();
        assert_eq!(props.edge_a, FxVec3::new(-fx(100), -fx(50), -fx(10)));
        assert_eq!(props.edge_b, FxVec3::new(fx(100), -fx(50), -fx(10)));
        assert_eq!(props.midpoint, FxVec3::new(0, -fx(50), -fx(10)));
        // Zero y delta takes the degenerate branch: angle 0
        assert_eq!(corridor_angle(&obj, 0), 0);
    }

    #[test]
    fn test_props_idempotent() {
        let obj = tube_obj(16, true);
        for corridor in 0..16 {
            let first = corridor_props(&obj, corridor).unwrap();
            let second = corridor_props(&obj, corridor).unwrap();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_malformed_corridor_is_skipped() {
        // All vertices on the far side: no near edge at all
        let mesh = MeshData {
            verts: vec![
                [0, 0, fx(1)],
                [fx(1), 0, fx(1)],
                [fx(1), fx(1), fx(1)],
                [0, fx(1), fx(1)],
            ],
            polys: vec![[0, 1, 2, 3]],
        };
        let obj = Object::from_mesh(&mesh, &Cel::coded(16, 16));
        assert!(corridor_props(&obj, 0).is_none());
        assert_eq!(corridor_angle(&obj, 0), 0);
        assert!(corridor_props(&obj, 5).is_none());
    }

    #[test]
    fn test_snap_positions_on_midpoint() {
        let level = tube_obj(16, true);
        let mut obj = Object::from_mesh(&MeshData::billboard(), &Cel::coded(8, 8));
        let z = crate::consts::LEVEL_ZNEAR;

        for corridor in [0, 5, 11] {
            snap_to_corridor(&mut obj, &level, corridor, z);
            let props = corridor_props(&level, corridor).unwrap();
            assert_eq!(obj.pos, FxVec3::new(props.midpoint.x, props.midpoint.y, z));
        }
    }

    #[test]
    fn test_snap_angle_roundtrip() {
        // Rotating by -angle then re-deriving the near-edge angle from the
        // rotated mesh yields ~0.
        let level = tube_obj(16, true);
        let mut obj = Object::from_mesh(&MeshData::billboard(), &Cel::coded(8, 8));

        for corridor in 0..16 {
            snap_to_corridor(&mut obj, &level, corridor, 0);
            let angle = corridor_angle(&level, corridor);
            // Undo the snap rotation; verts must return to pristine
            if angle != 0 {
                obj.rotate(FxVec3::new(0, 0, angle));
            }
            let drift = magnitude(vec_sub(obj.verts.borrow()[0], obj.pristine[0]));
            assert!(
                drift < crate::fixed::ONE / 16,
                "corridor {corridor}: drift {drift}"
            );
        }
    }

    #[test]
    fn test_stepping_wraps() {
        let n = 16;
        for i in 0..n {
            assert_eq!(next_corridor(i, n, true), Some((i + 1) % n));
            assert_eq!(prev_corridor(i, n, true), Some((i + n - 1) % n));
        }
    }

    #[test]
    fn test_stepping_clamps_open_strip() {
        let n = 16;
        assert_eq!(next_corridor(n - 1, n, false), None);
        assert_eq!(prev_corridor(0, n, false), None);
        assert_eq!(next_corridor(3, n, false), Some(4));
        assert_eq!(prev_corridor(3, n, false), Some(2));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Stepping never leaves the index range, wraps modularly on
            /// rings and refuses only at open-strip boundaries.
            #[test]
            fn prop_corridor_stepping(index in 0usize..32, count in 1usize..32, wrap: bool) {
                prop_assume!(index < count);

                let next = next_corridor(index, count, wrap);
                let prev = prev_corridor(index, count, wrap);

                if wrap {
                    prop_assert_eq!(next, Some((index + 1) % count));
                    prop_assert_eq!(prev, Some((index + count - 1) % count));
                } else {
                    prop_assert_eq!(next.is_none(), index == count - 1);
                    prop_assert_eq!(prev.is_none(), index == 0);
                }
                if let Some(i) = next {
                    prop_assert!(i < count);
                }
                if let Some(i) = prev {
                    prop_assert!(i < count);
                }
            }
        }
    }
}
