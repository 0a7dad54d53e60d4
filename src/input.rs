//! Input collector seam
//!
//! The core pulls one device snapshot per tick and keeps the previous
//! snapshot alongside it; "pressed this frame" is `current & !previous` for
//! edge-triggered actions, mouse steering uses the raw per-tick delta.

/// Digital button masks.
pub mod button {
    pub const LEFT: u32 = 1 << 0;
    pub const RIGHT: u32 = 1 << 1;
    pub const FIRE: u32 = 1 << 2;
    pub const ZAPPER: u32 = 1 << 3;
    pub const JUMP: u32 = 1 << 4;
}

/// Mouse button masks.
pub mod mouse {
    pub const LEFT: u32 = 1 << 0;
    pub const MIDDLE: u32 = 1 << 1;
    pub const RIGHT: u32 = 1 << 2;
}

/// One device snapshot: button bits plus absolute mouse position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceState {
    pub buttons: u32,
    pub mouse_buttons: u32,
    pub mouse_x: i32,
    pub mouse_y: i32,
}

/// External input device poller.
pub trait InputCollector {
    fn poll(&mut self) -> DeviceState;
}

/// Current + previous snapshot pair held by the tick loop.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputFrames {
    pub current: DeviceState,
    pub previous: DeviceState,
}

impl InputFrames {
    /// Shift current into previous and poll a fresh snapshot.
    pub fn read(&mut self, collector: &mut dyn InputCollector) {
        self.previous = self.current;
        self.current = collector.poll();
    }

    #[inline]
    pub fn held(&self, mask: u32) -> bool {
        self.current.buttons & mask != 0
    }

    /// Edge trigger: down this frame, up the last.
    #[inline]
    pub fn pressed(&self, mask: u32) -> bool {
        self.current.buttons & !self.previous.buttons & mask != 0
    }

    #[inline]
    pub fn mouse_held(&self, mask: u32) -> bool {
        self.current.mouse_buttons & mask != 0
    }

    #[inline]
    pub fn mouse_pressed(&self, mask: u32) -> bool {
        self.current.mouse_buttons & !self.previous.mouse_buttons & mask != 0
    }

    #[inline]
    pub fn any_pressed(&self) -> bool {
        (self.current.buttons != 0 && self.previous.buttons == 0)
            || (self.current.mouse_buttons != 0 && self.previous.mouse_buttons == 0)
    }

    /// Relative mouse x movement since last tick.
    #[inline]
    pub fn mouse_dx(&self) -> i32 {
        self.current.mouse_x - self.previous.mouse_x
    }
}

/// Collector that always reports an idle device.
#[derive(Debug, Default)]
pub struct IdleInput;

impl InputCollector for IdleInput {
    fn poll(&mut self) -> DeviceState {
        DeviceState::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Scripted(Vec<DeviceState>);

    impl InputCollector for Scripted {
        fn poll(&mut self) -> DeviceState {
            if self.0.is_empty() {
                DeviceState::default()
            } else {
                self.0.remove(0)
            }
        }
    }

    #[test]
    fn test_edge_trigger() {
        let mut frames = InputFrames::default();
        let mut dev = Scripted(vec![
            DeviceState {
                buttons: button::FIRE,
                ..Default::default()
            },
            DeviceState {
                buttons: button::FIRE,
                ..Default::default()
            },
        ]);

        frames.read(&mut dev);
        assert!(frames.pressed(button::FIRE));
        frames.read(&mut dev);
        // Still held, no longer an edge
        assert!(frames.held(button::FIRE));
        assert!(!frames.pressed(button::FIRE));
    }

    #[test]
    fn test_mouse_delta() {
        let mut frames = InputFrames::default();
        let mut dev = Scripted(vec![
            DeviceState {
                mouse_x: 10,
                ..Default::default()
            },
            DeviceState {
                mouse_x: 4,
                ..Default::default()
            },
        ]);
        frames.read(&mut dev);
        assert_eq!(frames.mouse_dx(), 10);
        frames.read(&mut dev);
        assert_eq!(frames.mouse_dx(), -6);
    }
}
