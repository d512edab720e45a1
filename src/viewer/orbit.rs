//! Orbit controller - drag/pinch navigation with inertia
//!
//! Converts screen-space gestures into yaw/pitch/FOV changes. After a
//! release the rotation coasts: velocity is divided once on release, then
//! decays every tick by a divisor that grows with elapsed time, until the
//! residual magnitude drops below the stop limit.
//!
//! Gesture handlers usually run off the render thread; they push events
//! through the input channel and only `tick`, called from the render
//! loop, mutates the state.

use std::f32::consts::FRAC_PI_2;

use crossbeam_channel::{unbounded, Receiver, Sender};

use super::{CAMERA_FOV_DEGREE_INIT, CAMERA_FOV_DEGREE_MAX, CAMERA_FOV_DEGREE_MIN};

/// Screen-to-rotation divisor, X axis (larger means slower rotation)
pub const DIVIDE_ROTATE_X: f32 = 500.0;
/// Screen-to-rotation divisor, Y axis
pub const DIVIDE_ROTATE_Y: f32 = 500.0;

/// FOV ratio applied per widening pinch tick
pub const SCALE_RATIO_TICK_EXPANSION: f32 = 1.05;
/// FOV ratio applied per narrowing pinch tick
pub const SCALE_RATIO_TICK_REDUCTION: f32 = 0.95;

/// Seconds between inertia ticks
pub const INERTIA_TICK_INTERVAL_SECS: f64 = 0.020;
/// Residual velocity magnitude below which coasting stops
pub const INERTIA_STOP_LIMIT: f64 = 0.000002;

/// Overall inertia magnitude preset (subtle coasting)
pub const WEAK_INERTIA_RATIO: f64 = 1.0;
/// Overall inertia magnitude preset (pronounced coasting)
pub const STRONG_INERTIA_RATIO: f64 = 10.0;

/// Release speed below which no coasting starts, screen units per second
const FLICK_MIN_SPEED: f32 = 40.0;
/// Gesture duration below which a release counts as a flick
const FLICK_MAX_DURATION_SECS: f32 = 0.2;

/// How a release coasts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InertiaKind {
    /// Directly driven; no post-release coasting
    #[default]
    None,
    /// Deliberate drag: small initial carry, fast decay
    Short,
    /// Quick flick: larger carry, slow decay
    Long,
}

impl InertiaKind {
    /// Divisor applied to the release velocity once
    fn first_tick_divisor(self) -> f64 {
        match self {
            InertiaKind::None => 1.0,
            InertiaKind::Short => 3.0,
            InertiaKind::Long => 2.0,
        }
    }

    /// Per-tick decay divisor after `elapsed` seconds of coasting
    fn decay_divisor(self, elapsed: f64) -> f64 {
        match self {
            InertiaKind::None => 1.0,
            InertiaKind::Short => 2.9 + elapsed * 0.1,
            InertiaKind::Long => 1.4 + elapsed * 0.1,
        }
    }
}

/// Gesture input, queued from whatever thread handles touches
#[derive(Debug, Clone, Copy)]
pub enum GestureEvent {
    /// Finger moved by (dx, dy) screen units
    Drag { dx: f32, dy: f32 },
    /// Pinch tick; scale > 1 narrows the view (zoom in)
    Pinch { scale: f32 },
    /// Fingers lifted with the given velocity and gesture duration
    Release {
        vx: f32,
        vy: f32,
        duration_secs: f32,
    },
}

/// View orientation and coasting state, mutated once per tick
#[derive(Debug, Clone, Copy)]
pub struct OrbitState {
    /// Rotation around the vertical axis, radians
    pub yaw: f32,
    /// Elevation, radians, clamped to straight up/down
    pub pitch: f32,
    /// Field of view, degrees, always within the camera FOV bounds
    pub fov: f32,
    /// Coasting velocity, radians per tick
    pub velocity_yaw: f64,
    /// Coasting velocity, radians per tick
    pub velocity_pitch: f64,
    /// Active coasting mode
    pub inertia: InertiaKind,
}

impl Default for OrbitState {
    fn default() -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.0,
            fov: CAMERA_FOV_DEGREE_INIT,
            velocity_yaw: 0.0,
            velocity_pitch: 0.0,
            inertia: InertiaKind::None,
        }
    }
}

/// Converts gestures into orbit state, with post-release inertia
pub struct OrbitController {
    state: OrbitState,
    strength: f64,
    coasted_secs: f64,
    input_tx: Sender<GestureEvent>,
    input_rx: Receiver<GestureEvent>,
}

impl OrbitController {
    pub fn new() -> Self {
        let (input_tx, input_rx) = unbounded();
        Self {
            state: OrbitState::default(),
            strength: WEAK_INERTIA_RATIO,
            coasted_secs: 0.0,
            input_tx,
            input_rx,
        }
    }

    /// Current orbit state
    pub fn state(&self) -> &OrbitState {
        &self.state
    }

    /// Sender for gesture handlers running off the render thread
    pub fn input(&self) -> Sender<GestureEvent> {
        self.input_tx.clone()
    }

    /// Select an inertia magnitude preset
    pub fn set_strength(&mut self, ratio: f64) {
        self.strength = ratio;
    }

    /// Whether a release is still coasting
    pub fn is_coasting(&self) -> bool {
        self.state.inertia != InertiaKind::None
    }

    /// Apply a drag delta directly (render-thread callers)
    pub fn drag(&mut self, dx: f32, dy: f32) {
        self.state.inertia = InertiaKind::None;
        self.state.velocity_yaw = 0.0;
        self.state.velocity_pitch = 0.0;
        self.rotate(
            (dx / DIVIDE_ROTATE_X) as f64,
            (dy / DIVIDE_ROTATE_Y) as f64,
        );
    }

    /// Apply one pinch tick; the FOV clamp is total, not per-step
    pub fn pinch(&mut self, scale: f32) {
        if scale <= 0.0 {
            return;
        }
        let ratio = if scale > 1.0 {
            SCALE_RATIO_TICK_REDUCTION
        } else {
            SCALE_RATIO_TICK_EXPANSION
        };
        self.state.fov =
            (self.state.fov * ratio).clamp(CAMERA_FOV_DEGREE_MIN, CAMERA_FOV_DEGREE_MAX);
    }

    /// Classify a release and arm the coasting velocity
    pub fn release(&mut self, vx: f32, vy: f32, duration_secs: f32) {
        let speed = (vx * vx + vy * vy).sqrt();
        let kind = if speed < FLICK_MIN_SPEED {
            InertiaKind::None
        } else if duration_secs < FLICK_MAX_DURATION_SECS {
            InertiaKind::Long
        } else {
            InertiaKind::Short
        };

        self.state.inertia = kind;
        self.coasted_secs = 0.0;

        if kind == InertiaKind::None {
            self.state.velocity_yaw = 0.0;
            self.state.velocity_pitch = 0.0;
            return;
        }

        let divisor = kind.first_tick_divisor();
        self.state.velocity_yaw =
            (vx as f64) * INERTIA_TICK_INTERVAL_SECS / DIVIDE_ROTATE_X as f64 / divisor;
        self.state.velocity_pitch =
            (vy as f64) * INERTIA_TICK_INTERVAL_SECS / DIVIDE_ROTATE_Y as f64 / divisor;
    }

    /// Advance one tick: drain queued gestures, then decay any coasting.
    ///
    /// Velocity magnitude never increases from tick to tick, and for any
    /// initial velocity the decay reaches the stop limit in finitely many
    /// ticks (the divisor stays above one and grows with time).
    pub fn tick(&mut self) {
        while let Ok(event) = self.input_rx.try_recv() {
            match event {
                GestureEvent::Drag { dx, dy } => self.drag(dx, dy),
                GestureEvent::Pinch { scale } => self.pinch(scale),
                GestureEvent::Release {
                    vx,
                    vy,
                    duration_secs,
                } => self.release(vx, vy, duration_secs),
            }
        }

        let kind = self.state.inertia;
        if kind == InertiaKind::None {
            return;
        }

        self.rotate(
            self.state.velocity_yaw * self.strength,
            self.state.velocity_pitch * self.strength,
        );

        self.coasted_secs += INERTIA_TICK_INTERVAL_SECS;
        let divisor = kind.decay_divisor(self.coasted_secs);
        self.state.velocity_yaw /= divisor;
        self.state.velocity_pitch /= divisor;

        let residual = (self.state.velocity_yaw * self.state.velocity_yaw
            + self.state.velocity_pitch * self.state.velocity_pitch)
            .sqrt();
        if residual < INERTIA_STOP_LIMIT {
            self.state.velocity_yaw = 0.0;
            self.state.velocity_pitch = 0.0;
            self.state.inertia = InertiaKind::None;
        }
    }

    fn rotate(&mut self, d_yaw: f64, d_pitch: f64) {
        self.state.yaw += d_yaw as f32;
        self.state.pitch = (self.state.pitch + d_pitch as f32).clamp(-FRAC_PI_2, FRAC_PI_2);
    }
}

impl Default for OrbitController {
    fn default() -> Self {
        Self::new()
    }
}
