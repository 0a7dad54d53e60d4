//! Level model and double-buffered loading
//!
//! Exactly two level slots exist: gameplay runs on one while a background
//! worker loads the next into the other. The worker owns the asset-loader
//! calls (behind the shared disc lock) and ships parsed payloads back over
//! a channel; the main thread builds the actual `Level` so mesh sharing
//! stays single-threaded. Slot readiness is tracked explicitly — cycling
//! onto a slot that has not arrived yet blocks instead of trusting load
//! order.

use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread::JoinHandle;

use rand::Rng;
use rand_pcg::Pcg32;

use crate::assets::{AssetKind, AssetLoadError, AssetLoader, DiscLock, MeshData};
use crate::display::{Cel, Color, Palette, rgb15};
use crate::fixed::{FxVec3, fx};
use crate::sim::object::Object;

/// Corridor ceiling per level mesh.
pub const MAX_LEVEL_POLYS: usize = 20;
/// Highest playable level; clearing it wins the game.
pub const MAX_LEVELS: u32 = 99;
pub const STARTING_LEVEL: u32 = 1;
/// Level meshes on disc; the file counter wraps past this.
const MAX_LEVEL_FILES: u32 = 20;
/// Level files whose tubes close into a ring.
const WRAPPING_LEVELS: [u32; 7] = [5, 7, 10, 13, 14, 18, 20];

// Blue and purple even/odd corridor color pairs.
const EVEN_ODD_COLORS: [Color; 4] = [
    rgb15(12, 5, 12),
    rgb15(13, 6, 17),
    rgb15(0, 0, 8),
    rgb15(0, 0, 14),
];

/// One loaded level: the tube object plus per-corridor saved palettes.
pub struct Level {
    pub number: u32,
    pub obj: Object,
    pub palettes: Vec<Palette>,
    pub wireframe_color: Color,
    pub wrap: bool,
}

impl Level {
    /// Build a playable level from its mesh: corridor cels, normals,
    /// even/odd coloring, saved palettes, pristine vertices.
    pub(crate) fn from_mesh(number: u32, mesh: &MeshData, wrap: bool, rng: &mut Pcg32) -> Self {
        let mut obj = Object::from_mesh(mesh, &Cel::coded(16, 16));
        obj.set_pos(0, 0, 0);
        obj.calc_normals();
        obj.freeze_pristine();

        if obj.polygons.len() > MAX_LEVEL_POLYS {
            log::error!(
                "level {number} has {} corridors, limit {MAX_LEVEL_POLYS}",
                obj.polygons.len()
            );
        }

        // Blues or purples, alternating per corridor
        let starting_index = if rng.random_range(0..2u32) == 1 { 2 } else { 0 };
        let mut palettes = Vec::with_capacity(obj.polygons.len());
        for (i, poly) in obj.polygons.iter_mut().enumerate() {
            poly.cel.set_color(EVEN_ODD_COLORS[(i % 2) + starting_index]);
            palettes.push(poly.cel.palette);
        }

        Self {
            number,
            obj,
            palettes,
            wireframe_color: EVEN_ODD_COLORS[starting_index + 1],
            wrap,
        }
    }

    pub fn corridor_count(&self) -> usize {
        self.obj.polygons.len()
    }

    /// Restore a corridor's saved palette.
    pub fn reset_corridor_palette(&mut self, corridor: usize) {
        if let (Some(poly), Some(saved)) =
            (self.obj.polygons.get_mut(corridor), self.palettes.get(corridor))
        {
            poly.cel.palette = *saved;
        }
    }

    /// Flood a corridor's live palette with one color.
    pub fn set_corridor_color(&mut self, corridor: usize, color: Color) {
        if let Some(poly) = self.obj.polygons.get_mut(corridor) {
            poly.cel.set_color(color);
        }
    }

    pub fn reset_corridors(&mut self) {
        for corridor in 0..self.corridor_count() {
            self.reset_corridor_palette(corridor);
        }
    }

    /// Park the tube deep in the distance, pre-rolled for the intro spin.
    pub fn reset_transrot(&mut self) {
        self.obj.set_pos(0, 0, fx(130));
        self.obj.rotate(FxVec3::new(0, -4194304, 0));
    }
}

/// Parsed level payload produced on the worker thread.
struct LevelData {
    number: u32,
    mesh: MeshData,
    wrap: bool,
}

struct LoadRequest {
    slot: usize,
    file_number: u32,
}

struct LoadResult {
    slot: usize,
    data: Result<LevelData, AssetLoadError>,
}

fn load_level_data(
    loader: &dyn AssetLoader,
    disc: &DiscLock,
    file_number: u32,
) -> Result<LevelData, AssetLoadError> {
    let path = format!("Assets/Levels/Level{file_number}");
    let bytes = {
        let _guard = disc.lock().expect("disc lock poisoned");
        loader.load(&path, AssetKind::Mesh)?
    };
    let mesh = MeshData::from_bytes(&path, &bytes)?;
    log::debug!("loaded level file {file_number} ({} corridors)", mesh.polys.len());
    Ok(LevelData {
        number: file_number,
        mesh,
        wrap: WRAPPING_LEVELS.contains(&file_number),
    })
}

/// Double-buffered level slots plus the background loading worker.
pub struct LevelManager {
    slots: [Option<Level>; 2],
    ready: [bool; 2],
    current: usize,
    file_counter: u32,
    first_load: bool,
    req_tx: Sender<LoadRequest>,
    done_rx: Receiver<LoadResult>,
    _worker: JoinHandle<()>,
}

impl LevelManager {
    pub fn new(loader: Arc<dyn AssetLoader>, disc: DiscLock) -> Self {
        let (req_tx, req_rx) = channel::<LoadRequest>();
        let (done_tx, done_rx) = channel::<LoadResult>();

        let worker = std::thread::spawn(move || {
            while let Ok(req) = req_rx.recv() {
                let data = load_level_data(loader.as_ref(), &disc, req.file_number);
                if done_tx
                    .send(LoadResult {
                        slot: req.slot,
                        data,
                    })
                    .is_err()
                {
                    break;
                }
            }
        });

        Self {
            slots: [None, None],
            ready: [false, false],
            current: 0,
            file_counter: STARTING_LEVEL,
            first_load: true,
            req_tx,
            done_rx,
            _worker: worker,
        }
    }

    pub fn reset(&mut self) {
        self.slots = [None, None];
        self.ready = [false, false];
        self.current = 0;
        self.file_counter = STARTING_LEVEL;
        self.first_load = true;
    }

    fn request_load(&mut self, slot: usize) {
        self.ready[slot] = false;
        let req = LoadRequest {
            slot,
            file_number: self.file_counter,
        };
        self.file_counter += 1;
        if self.file_counter > MAX_LEVEL_FILES {
            log::debug!("wrapping level file counter");
            self.file_counter = STARTING_LEVEL;
        }
        // The worker only exits when this sender is dropped
        self.req_tx.send(req).expect("level worker is gone");
    }

    fn accept(&mut self, result: LoadResult, rng: &mut Pcg32) -> Result<(), AssetLoadError> {
        let data = result.data?;
        self.slots[result.slot] = Some(Level::from_mesh(data.number, &data.mesh, data.wrap, rng));
        self.ready[result.slot] = true;
        Ok(())
    }

    /// Block until the given slot's payload has arrived. Payloads for the
    /// other slot received along the way are accepted too.
    fn wait_ready(&mut self, slot: usize, rng: &mut Pcg32) -> Result<(), AssetLoadError> {
        // Drain anything already delivered
        while let Ok(result) = self.done_rx.try_recv() {
            self.accept(result, rng)?;
        }
        while !self.ready[slot] {
            let result = self.done_rx.recv().map_err(|_| {
                AssetLoadError::new("Assets/Levels", AssetKind::Mesh, "level worker died")
            })?;
            self.accept(result, rng)?;
        }
        Ok(())
    }

    /// Advance to the next level. The first call loads both slots and
    /// blocks for both; later calls flip to the prepared slot (blocking
    /// only if its load has not finished) and kick off a reload of the
    /// vacated slot.
    pub fn cycle(&mut self, rng: &mut Pcg32) -> Result<(), AssetLoadError> {
        if self.first_load {
            self.request_load(0);
            self.request_load(1);
            self.wait_ready(0, rng)?;
            self.wait_ready(1, rng)?;
            self.current = 0;
            self.first_load = false;
        } else {
            self.current = 1 - self.current;
            self.wait_ready(self.current, rng)?;
            self.request_load(1 - self.current);
        }
        Ok(())
    }

    pub fn current(&self) -> &Level {
        self.slots[self.current]
            .as_ref()
            .expect("cycle() before first level access")
    }

    pub fn current_mut(&mut self) -> &mut Level {
        self.slots[self.current]
            .as_mut()
            .expect("cycle() before first level access")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    /// Loader that synthesizes tube meshes, mirroring the demo binary.
    struct TubeLoader;

    impl AssetLoader for TubeLoader {
        fn load(&self, path: &str, _kind: AssetKind) -> Result<Vec<u8>, AssetLoadError> {
            let number: u32 = path
                .trim_start_matches("Assets/Levels/Level")
                .parse()
                .map_err(|_| AssetLoadError::new(path, AssetKind::Mesh, "bad level path"))?;
            let closed = WRAPPING_LEVELS.contains(&number);
            Ok(MeshData::tube(16, fx(4), fx(4), closed).to_bytes())
        }
    }

    struct FailingLoader;

    impl AssetLoader for FailingLoader {
        fn load(&self, path: &str, kind: AssetKind) -> Result<Vec<u8>, AssetLoadError> {
            Err(AssetLoadError::new(path, kind, "disc missing"))
        }
    }

    fn manager(loader: impl AssetLoader + 'static) -> (LevelManager, Pcg32) {
        (
            LevelManager::new(Arc::new(loader), crate::assets::new_disc_lock()),
            Pcg32::seed_from_u64(7),
        )
    }

    #[test]
    fn test_first_cycle_fills_both_slots() {
        let (mut lm, mut rng) = manager(TubeLoader);
        lm.cycle(&mut rng).unwrap();
        assert_eq!(lm.current().number, 1);
        assert!(lm.ready[0] && lm.ready[1]);
        assert_eq!(lm.current().corridor_count(), 16);
    }

    #[test]
    fn test_cycle_flips_slots_and_reloads() {
        let (mut lm, mut rng) = manager(TubeLoader);
        lm.cycle(&mut rng).unwrap();
        lm.cycle(&mut rng).unwrap();
        assert_eq!(lm.current().number, 2);
        lm.cycle(&mut rng).unwrap();
        assert_eq!(lm.current().number, 3);
    }

    #[test]
    fn test_file_counter_wraps_past_disc_range() {
        let (mut lm, mut rng) = manager(TubeLoader);
        lm.cycle(&mut rng).unwrap();
        for _ in 0..MAX_LEVEL_FILES {
            lm.cycle(&mut rng).unwrap();
        }
        // 21 cycles consumed 22 files; the counter wrapped back to 1 at 21
        assert_eq!(lm.current().number, 1);
        assert_eq!(lm.current().wrap, false);
    }

    #[test]
    fn test_wrap_flag_follows_file_table() {
        let (mut lm, mut rng) = manager(TubeLoader);
        lm.cycle(&mut rng).unwrap();
        assert!(!lm.current().wrap);
        for _ in 0..4 {
            lm.cycle(&mut rng).unwrap();
        }
        assert_eq!(lm.current().number, 5);
        assert!(lm.current().wrap);
    }

    #[test]
    fn test_load_failure_is_fatal() {
        let (mut lm, mut rng) = manager(FailingLoader);
        assert!(lm.cycle(&mut rng).is_err());
    }

    #[test]
    fn test_even_odd_palette_and_restore() {
        let (mut lm, mut rng) = manager(TubeLoader);
        lm.cycle(&mut rng).unwrap();
        let level = lm.current_mut();
        let saved = level.obj.polygons[3].cel.palette;
        assert_ne!(
            level.obj.polygons[0].cel.palette[0],
            level.obj.polygons[1].cel.palette[0],
            "adjacent corridors alternate colors"
        );

        level.set_corridor_color(3, rgb15(31, 0, 0));
        assert_ne!(level.obj.polygons[3].cel.palette, saved);
        level.reset_corridor_palette(3);
        assert_eq!(level.obj.polygons[3].cel.palette, saved);
    }

    #[test]
    fn test_reset_transrot_parks_in_distance() {
        let (mut lm, mut rng) = manager(TubeLoader);
        lm.cycle(&mut rng).unwrap();
        lm.current_mut().reset_transrot();
        assert_eq!(lm.current().obj.pos.z, fx(130));
    }
}
