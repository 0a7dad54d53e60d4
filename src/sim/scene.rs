//! Scene accumulator
//!
//! Per-frame polygon submission list with a hard capacity. `begin` resets,
//! `add`/`add_clipped` transform and project an object's polygons and
//! append prepared entries, `end` emits the draw chain in submission order.
//! Depth sorting is an explicit, optional step.

use std::fmt;

use crate::display::{Color, DrawList, Line, MappedCel};
use crate::fixed::Fx;
use crate::sim::camera::{Camera, Projector, poly_to_world_cam, poly_to_world_cam_clip};
use crate::sim::object::Object;

/// Most polygons the rasterizer accepts per frame.
pub const MAX_POLY_RASTER: usize = 120;

/// Submission rejected: the frame's polygon budget is spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneFull;

impl fmt::Display for SceneFull {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scene polygon list is full ({MAX_POLY_RASTER})")
    }
}

struct SceneEntry {
    avgz: Fx,
    cel: MappedCel,
}

pub struct Scene {
    entries: Vec<SceneEntry>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        Self {
            entries: Vec::with_capacity(MAX_POLY_RASTER),
        }
    }

    /// Reset the submission list for a new frame. Capacity is retained, so
    /// steady-state frames never allocate.
    pub fn begin(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn fits(&self, poly_count: usize) -> bool {
        self.entries.len() + poly_count <= MAX_POLY_RASTER && self.entries.len() < MAX_POLY_RASTER
    }

    /// Transform, project and submit every polygon of an object. Rejected
    /// whole if the object would overflow the list; no partial submission.
    pub fn add(
        &mut self,
        obj: &mut Object,
        camera: &Camera,
        proj: &Projector,
        use_inv_lut: bool,
    ) -> Result<(), SceneFull> {
        if !self.fits(obj.polygons.len()) {
            return Err(SceneFull);
        }

        let verts = obj.verts.borrow();
        for poly in &mut obj.polygons {
            poly_to_world_cam(poly, &verts, obj.pos, camera);
            proj.poly_to_screen(poly, use_inv_lut);
            self.entries.push(SceneEntry {
                avgz: poly.avgz,
                cel: MappedCel {
                    image: poly.cel.image.clone(),
                    palette: poly.cel.palette,
                    corners: poly.screen,
                },
            });
        }
        Ok(())
    }

    /// Like `add`, but near-plane pseudo-clipped (exact-divide projection);
    /// polygons entirely behind the plane are skipped.
    pub fn add_clipped(
        &mut self,
        obj: &mut Object,
        camera: &Camera,
        proj: &Projector,
        near: Fx,
    ) -> Result<(), SceneFull> {
        if !self.fits(obj.polygons.len()) {
            return Err(SceneFull);
        }

        let verts = obj.verts.borrow();
        for poly in &mut obj.polygons {
            if poly_to_world_cam_clip(poly, &verts, obj.pos, camera, near) {
                proj.poly_to_screen(poly, false);
                self.entries.push(SceneEntry {
                    avgz: poly.avgz,
                    cel: MappedCel {
                        image: poly.cel.image.clone(),
                        palette: poly.cel.palette,
                        corners: poly.screen,
                    },
                });
            }
        }
        Ok(())
    }

    /// Descending bubble sort on cached depth: farthest polygons first for
    /// back-to-front painting. n stays small, so O(n^2) is fine.
    pub fn sort(&mut self) {
        let n = self.entries.len();
        if n < 2 {
            return;
        }
        for _ in 0..n {
            for j in 0..n - 1 {
                if self.entries[j].avgz < self.entries[j + 1].avgz {
                    self.entries.swap(j, j + 1);
                }
            }
        }
    }

    /// Chain the submitted cels into a draw list, in submission order.
    pub fn end(&self) -> DrawList {
        DrawList {
            cels: self.entries.iter().map(|e| e.cel.clone()).collect(),
        }
    }

    /// Degenerate every submitted polygon into its 4 screen edges.
    pub fn wireframe_lines(&self, color: Color) -> Vec<Line> {
        let mut lines = Vec::with_capacity(self.entries.len() * 4);
        for entry in &self.entries {
            let corners = entry.cel.corners.map(|p| p.to_pixels());
            for i in 0..4 {
                lines.push(Line {
                    from: corners[i],
                    to: corners[(i + 1) % 4],
                    color,
                });
            }
        }
        lines
    }
}
