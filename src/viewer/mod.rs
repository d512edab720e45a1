//! Spherical photo viewer core
//!
//! ## Responsibilities
//!
//! - UV-sphere mesh for equirectangular textures (`sphere`)
//! - Gesture-driven orbit state with inertia (`orbit`)
//! - `SphereView`: texture slot, pose correction, view/projection matrices
//!
//! The consumer owns the GL context, shaders, and texture upload; this
//! module only produces buffers, matrices, and draw calls against the
//! `RenderContext` it is handed.

pub mod orbit;
pub mod sphere;

use glam::Mat4;

use crate::xmp::SphereXmp;
use orbit::OrbitController;
use sphere::UvSphere;

/// Initial field of view, degrees
pub const CAMERA_FOV_DEGREE_INIT: f32 = 45.0;
/// Minimum field of view, degrees
pub const CAMERA_FOV_DEGREE_MIN: f32 = 30.0;
/// Maximum field of view, degrees
pub const CAMERA_FOV_DEGREE_MAX: f32 = 100.0;

/// Near plane for the perspective projection
pub const Z_NEAR: f32 = 0.1;
/// Far plane for the perspective projection
pub const Z_FAR: f32 = 100.0;

/// Radius of the shell the photo is attached to
pub const SHELL_RADIUS: f32 = 2.0;
/// Polygon subdivisions of the shell
pub const SHELL_DIVIDE: usize = 48;

/// Render boundary: the consumer's context receives attribute data and
/// draw calls, nothing else
pub trait RenderContext {
    /// Bind a float attribute array to a shader slot
    fn bind_attribute(&mut self, slot: u32, components: u32, data: &[f32]);
    /// Draw the bound attributes as triangles
    fn draw_triangles(&mut self, vertex_count: u32);
}

/// Equirectangular texture with its capture pose
pub struct SphereTexture {
    /// Raw pixel buffer, as handed in by the consumer
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Capture pose in degrees, from embedded metadata
    pub pose: SphereXmp,
}

/// One spherical photo viewer: shell mesh, orbit state, current texture
pub struct SphereView {
    mesh: UvSphere,
    orbit: OrbitController,
    texture: Option<SphereTexture>,
}

impl SphereView {
    /// Create a viewer with the fixed shell geometry
    pub fn new() -> Self {
        Self {
            mesh: UvSphere::new(SHELL_RADIUS, SHELL_DIVIDE),
            orbit: OrbitController::new(),
            texture: None,
        }
    }

    /// Swap in a new photo and its capture pose
    pub fn set_texture(
        &mut self,
        data: Vec<u8>,
        width: u32,
        height: u32,
        yaw: f32,
        pitch: f32,
        roll: f32,
    ) {
        tracing::debug!(width = width, height = height, "Texture set");
        self.texture = Some(SphereTexture {
            data,
            width,
            height,
            pose: SphereXmp { yaw, pitch, roll },
        });
    }

    /// Current texture, if one was set
    pub fn texture(&self) -> Option<&SphereTexture> {
        self.texture.as_ref()
    }

    /// Shell mesh
    pub fn mesh(&self) -> &UvSphere {
        &self.mesh
    }

    /// Orbit state reader
    pub fn orbit(&self) -> &OrbitController {
        &self.orbit
    }

    /// Orbit controller; call `tick` from the render loop
    pub fn orbit_mut(&mut self) -> &mut OrbitController {
        &mut self.orbit
    }

    /// Model-view rotation: the orbit orientation composed with the
    /// inverse of the capture pose, so the horizon stays level
    pub fn view_rotation(&self) -> Mat4 {
        let state = self.orbit.state();
        let view = Mat4::from_rotation_x(state.pitch) * Mat4::from_rotation_y(state.yaw);

        let pose = self
            .texture
            .as_ref()
            .map(|t| t.pose)
            .unwrap_or_default();
        let correction = Mat4::from_rotation_z(-pose.roll.to_radians())
            * Mat4::from_rotation_x(-pose.pitch.to_radians())
            * Mat4::from_rotation_y(-pose.yaw.to_radians());

        view * correction
    }

    /// Perspective projection for the current field of view
    pub fn projection(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh_gl(self.orbit.state().fov.to_radians(), aspect, Z_NEAR, Z_FAR)
    }

    /// Bind the shell buffers and issue the draw call
    pub fn draw<C: RenderContext>(&self, ctx: &mut C, position_slot: u32, uv_slot: u32) {
        self.mesh.draw(ctx, position_slot, uv_slot);
    }
}

impl Default for SphereView {
    fn default() -> Self {
        Self::new()
    }
}
