//! Audio core seam
//!
//! One-shot samples play fire-and-forget at a priority: the external mixer
//! owns a small fixed channel pool and a higher-priority request may steal a
//! busy channel. Music is a numeric track id streamed by a dedicated worker
//! behind the shared disc lock; the core only starts and stops it.

pub const DEFAULT_AUDIO_PRIORITY: u32 = 100;
pub const DEFAULT_AUDIO_AMPLITUDE: u32 = 0x3FFF;
pub const MAX_AMPLITUDE: u32 = 0x7FFF;

/// One-shot sample effects, in load order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sfx {
    Zap,
    Boom,
    Pulse,
    Whoa,
    Clear,
    Voice,
}

impl Sfx {
    pub const ALL: [Sfx; 6] = [
        Sfx::Zap,
        Sfx::Boom,
        Sfx::Pulse,
        Sfx::Whoa,
        Sfx::Clear,
        Sfx::Voice,
    ];

    pub fn asset_name(self) -> &'static str {
        match self {
            Sfx::Zap => "Zap",
            Sfx::Boom => "Boom",
            Sfx::Pulse => "Pulse",
            Sfx::Whoa => "Whoa",
            Sfx::Clear => "Clear",
            Sfx::Voice => "Voice",
        }
    }
}

/// External audio device. All calls are fire-and-forget; completion is
/// never awaited.
pub trait AudioCore {
    /// Play a one-shot sample. Amplitude range 0..=MAX_AMPLITUDE.
    fn play_sample(&mut self, sfx: Sfx, priority: u32, amplitude: u32);

    /// Retire finished one-shot voices; called once per tick.
    fn service(&mut self);

    /// Begin looping through the background track range.
    fn start_music(&mut self);

    fn stop_music(&mut self);
}

/// Audio sink for tests and headless runs; counts what would have played.
#[derive(Debug, Default)]
pub struct NullAudio {
    pub samples_played: u32,
    pub music_playing: bool,
}

impl AudioCore for NullAudio {
    fn play_sample(&mut self, sfx: Sfx, priority: u32, _amplitude: u32) {
        self.samples_played += 1;
        log::trace!("sfx {sfx:?} at priority {priority}");
    }

    fn service(&mut self) {}

    fn start_music(&mut self) {
        self.music_playing = true;
    }

    fn stop_music(&mut self) {
        self.music_playing = false;
    }
}
