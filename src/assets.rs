//! Asset loader seam
//!
//! The core never touches storage directly: a typed request goes to an
//! external `AssetLoader`, an opaque byte payload comes back. Load failures
//! at startup sites are fatal and surface as `AssetLoadError`. The single
//! `DiscLock` serializes every loader call, since the level worker and the
//! music streamer share one storage device.

use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::fixed::{Fx, cos, fx, mul, sin};

/// What kind of resource is being requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Mesh,
    Cel,
    Sample,
    Font,
    CelList,
    Instrument,
}

/// Why a load failed.
#[derive(Debug)]
pub struct AssetLoadError {
    pub path: String,
    pub kind: AssetKind,
    pub detail: String,
}

impl AssetLoadError {
    pub fn new(path: &str, kind: AssetKind, detail: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            kind,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for AssetLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to load {:?} asset {:?}: {}",
            self.kind, self.path, self.detail
        )
    }
}

impl std::error::Error for AssetLoadError {}

/// External resource loader. Implementations own the actual storage; the
/// returned payload is moved to the caller and dropped when unloaded.
pub trait AssetLoader: Send + Sync {
    fn load(&self, path: &str, kind: AssetKind) -> Result<Vec<u8>, AssetLoadError>;
}

/// Mutual exclusion over the storage device, shared by every loading path.
pub type DiscLock = Arc<Mutex<()>>;

pub fn new_disc_lock() -> DiscLock {
    Arc::new(Mutex::new(()))
}

/// Mesh interchange payload: 16.16 vertex positions plus quad polygons as
/// vertex-index LUTs. Serialized as JSON by convention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshData {
    pub verts: Vec<[i32; 3]>,
    pub polys: Vec<[usize; 4]>,
}

impl MeshData {
    pub fn from_bytes(path: &str, bytes: &[u8]) -> Result<Self, AssetLoadError> {
        let mesh: MeshData = serde_json::from_slice(bytes)
            .map_err(|e| AssetLoadError::new(path, AssetKind::Mesh, e.to_string()))?;
        let vert_count = mesh.verts.len();
        for poly in &mesh.polys {
            if poly.iter().any(|&i| i >= vert_count) {
                return Err(AssetLoadError::new(
                    path,
                    AssetKind::Mesh,
                    "polygon vertex index out of range",
                ));
            }
        }
        Ok(mesh)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("mesh serialization cannot fail")
    }

    /// Camera-facing unit quad. Vertex order puts the top edge first
    /// (verts 0-1) so the roll primitive's mesh-derived vector (vert 3
    /// minus vert 0) points down the billboard.
    pub fn billboard() -> Self {
        Self {
            verts: vec![
                [-fx(1), fx(1), 0],
                [fx(1), fx(1), 0],
                [fx(1), -fx(1), 0],
                [-fx(1), -fx(1), 0],
            ],
            polys: vec![[0, 1, 2, 3]],
        }
    }

    /// Tube level: a ring of `sides` corridor quads of the given radius,
    /// spanning z in [-depth, +depth]. Corridor indices ascend clockwise
    /// from the top spoke and face normals point out of the tube, which is
    /// the orientation the ring-roll alignment test expects. Open tubes
    /// leave a one-corridor gap so the strip has real boundary corridors.
    pub fn tube(sides: usize, radius: Fx, depth: Fx, closed: bool) -> Self {
        let rim_count = if closed { sides } else { sides + 1 };
        let mut verts = Vec::with_capacity(rim_count * 2);
        // Near rim then far rim, one vertex per spoke
        for &z in &[-depth, depth] {
            for i in 0..rim_count {
                let angle = (crate::fixed::ANG_256 as i64 * i as i64 / rim_count as i64) as Fx;
                verts.push([mul(radius, sin(angle)), mul(radius, cos(angle)), z]);
            }
        }
        let polys = (0..sides)
            .map(|i| {
                let a = i;
                let b = (i + 1) % rim_count;
                [a, b, rim_count + b, rim_count + a]
            })
            .collect();
        Self { verts, polys }
    }

    /// Four-quad player ship. The first polygon leads with the two wing
    /// root vertices: steering drags those, so they sit close to the hull
    /// center.
    pub fn ship() -> Self {
        let root = fx(1) / 10;
        let tail = fx(1) / 4;
        Self {
            verts: vec![
                [-root, 0, 0],     // 0 wing root left
                [root, 0, 0],      // 1 wing root right
                [-fx(1), 0, -fx(1)], // 2 wing tip left
                [fx(1), 0, -fx(1)],  // 3 wing tip right
                [0, tail, fx(1)],  // 4 tail top
                [0, -tail, fx(1)], // 5 tail bottom
            ],
            polys: vec![
                [0, 1, 4, 5],
                [2, 0, 4, 5],
                [1, 3, 5, 4],
                [2, 3, 1, 0],
            ],
        }
    }
}

/// Cel payload: u32 width, u32 height (little endian), a 32-entry RGB15
/// palette, then width*height palette-indexed pixels.
pub struct CelData {
    pub width: u32,
    pub height: u32,
    pub palette: [u16; 32],
    pub pixels: Vec<u8>,
}

impl CelData {
    pub const HEADER_BYTES: usize = 8 + 64;

    pub fn from_bytes(path: &str, bytes: &[u8]) -> Result<Self, AssetLoadError> {
        if bytes.len() < Self::HEADER_BYTES {
            return Err(AssetLoadError::new(path, AssetKind::Cel, "truncated header"));
        }
        let width = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        let height = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
        let mut palette = [0u16; 32];
        for (i, entry) in palette.iter_mut().enumerate() {
            let at = 8 + i * 2;
            *entry = u16::from_le_bytes(bytes[at..at + 2].try_into().unwrap());
        }
        let expected = (width * height) as usize;
        let pixels = &bytes[Self::HEADER_BYTES..];
        if pixels.len() < expected {
            return Err(AssetLoadError::new(
                path,
                AssetKind::Cel,
                format!("expected {expected} pixels, got {}", pixels.len()),
            ));
        }
        Ok(Self {
            width,
            height,
            palette,
            pixels: pixels[..expected].to_vec(),
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(Self::HEADER_BYTES + self.pixels.len());
        bytes.extend_from_slice(&self.width.to_le_bytes());
        bytes.extend_from_slice(&self.height.to_le_bytes());
        for entry in &self.palette {
            bytes.extend_from_slice(&entry.to_le_bytes());
        }
        bytes.extend_from_slice(&self.pixels);
        bytes
    }

    /// Single-color cel payload, for synthesized demo/test assets.
    pub fn solid(width: u32, height: u32, color: u16) -> Self {
        Self {
            width,
            height,
            palette: [color; 32],
            pixels: vec![1; (width * height) as usize],
        }
    }
}
