//! UV-sphere mesh for equirectangular textures
//!
//! Latitude/longitude subdivision: `divide` rings by `divide` segments,
//! each quad emitted as two triangles. Texture coordinates map an
//! equirectangular image directly (u along longitude, v from the north
//! pole down), so a 360 photo wraps the inside of the shell. Buffers are
//! immutable after construction and safe to read across frames.

use std::f32::consts::{FRAC_PI_2, PI, TAU};

use glam::Vec3;

use super::RenderContext;

/// Triangulated sphere surface with equirectangular UVs
pub struct UvSphere {
    vertices: Vec<f32>,
    uvs: Vec<f32>,
    radius: f32,
    divide: usize,
}

impl UvSphere {
    /// Generate a sphere of the given radius and subdivision count
    pub fn new(radius: f32, divide: usize) -> Self {
        assert!(divide >= 2, "sphere needs at least two subdivisions");

        let mut vertices = Vec::with_capacity(divide * divide * 6 * 3);
        let mut uvs = Vec::with_capacity(divide * divide * 6 * 2);

        let step = 1.0 / divide as f32;
        for ring in 0..divide {
            // Ring 0 starts at the north pole
            let v0 = ring as f32 * step;
            let v1 = (ring + 1) as f32 * step;
            let lat0 = FRAC_PI_2 - v0 * PI;
            let lat1 = FRAC_PI_2 - v1 * PI;

            for seg in 0..divide {
                let u0 = seg as f32 * step;
                let u1 = (seg + 1) as f32 * step;
                let lon0 = u0 * TAU;
                let lon1 = u1 * TAU;

                let p00 = point(radius, lat0, lon0);
                let p01 = point(radius, lat0, lon1);
                let p10 = point(radius, lat1, lon0);
                let p11 = point(radius, lat1, lon1);

                // Two triangles per quad; degenerate slivers at the poles
                // keep the surface closed without special cases
                push_triangle(
                    &mut vertices,
                    &mut uvs,
                    [(p00, u0, v0), (p10, u0, v1), (p11, u1, v1)],
                );
                push_triangle(
                    &mut vertices,
                    &mut uvs,
                    [(p00, u0, v0), (p11, u1, v1), (p01, u1, v0)],
                );
            }
        }

        Self {
            vertices,
            uvs,
            radius,
            divide,
        }
    }

    /// Vertex positions, three floats per vertex
    pub fn vertices(&self) -> &[f32] {
        &self.vertices
    }

    /// Texture coordinates, two floats per vertex
    pub fn uvs(&self) -> &[f32] {
        &self.uvs
    }

    /// Number of vertices in the buffers
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / 3
    }

    /// Number of triangles
    pub fn triangle_count(&self) -> usize {
        self.vertex_count() / 3
    }

    /// Shell radius
    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Subdivision count
    pub fn divide(&self) -> usize {
        self.divide
    }

    /// Bind both attribute arrays and issue the draw call
    pub fn draw<C: RenderContext>(&self, ctx: &mut C, position_slot: u32, uv_slot: u32) {
        ctx.bind_attribute(position_slot, 3, &self.vertices);
        ctx.bind_attribute(uv_slot, 2, &self.uvs);
        ctx.draw_triangles(self.vertex_count() as u32);
    }
}

fn point(radius: f32, lat: f32, lon: f32) -> Vec3 {
    Vec3::new(
        radius * lat.cos() * lon.sin(),
        radius * lat.sin(),
        radius * lat.cos() * lon.cos(),
    )
}

fn push_triangle(vertices: &mut Vec<f32>, uvs: &mut Vec<f32>, corners: [(Vec3, f32, f32); 3]) {
    for (p, u, v) in corners {
        vertices.extend_from_slice(&[p.x, p.y, p.z]);
        uvs.extend_from_slice(&[u, v]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewer::{SHELL_DIVIDE, SHELL_RADIUS};

    #[test]
    fn test_triangle_count_is_two_n_squared() {
        for divide in [2, 8, SHELL_DIVIDE] {
            let sphere = UvSphere::new(SHELL_RADIUS, divide);
            assert_eq!(sphere.triangle_count(), 2 * divide * divide);
            assert_eq!(sphere.vertex_count(), 6 * divide * divide);
            assert_eq!(sphere.uvs().len(), sphere.vertex_count() * 2);
        }
    }

    #[test]
    fn test_every_vertex_on_the_shell() {
        let sphere = UvSphere::new(2.0, 8);
        for chunk in sphere.vertices().chunks_exact(3) {
            let len = Vec3::new(chunk[0], chunk[1], chunk[2]).length();
            assert!((len - 2.0).abs() < 1e-4, "vertex off the shell: {}", len);
        }
    }

    #[test]
    fn test_surface_closed_at_poles() {
        let sphere = UvSphere::new(1.0, 8);
        let ys: Vec<f32> = sphere.vertices().chunks_exact(3).map(|c| c[1]).collect();
        let max_y = ys.iter().cloned().fold(f32::MIN, f32::max);
        let min_y = ys.iter().cloned().fold(f32::MAX, f32::min);
        // Both poles are reached exactly; no open cap
        assert!((max_y - 1.0).abs() < 1e-5);
        assert!((min_y + 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_uvs_span_full_equirectangular_range() {
        let sphere = UvSphere::new(1.0, 8);
        let us: Vec<f32> = sphere.uvs().chunks_exact(2).map(|c| c[0]).collect();
        let vs: Vec<f32> = sphere.uvs().chunks_exact(2).map(|c| c[1]).collect();
        let max = |xs: &[f32]| xs.iter().cloned().fold(f32::MIN, f32::max);
        let min = |xs: &[f32]| xs.iter().cloned().fold(f32::MAX, f32::min);
        // Seam runs to u=1.0 rather than wrapping back to 0
        assert_eq!(min(&us), 0.0);
        assert_eq!(max(&us), 1.0);
        assert_eq!(min(&vs), 0.0);
        assert_eq!(max(&vs), 1.0);
    }

    struct RecordingContext {
        bound: Vec<(u32, u32, usize)>,
        drawn: Option<u32>,
    }

    impl RenderContext for RecordingContext {
        fn bind_attribute(&mut self, slot: u32, components: u32, data: &[f32]) {
            self.bound.push((slot, components, data.len()));
        }

        fn draw_triangles(&mut self, vertex_count: u32) {
            self.drawn = Some(vertex_count);
        }
    }

    #[test]
    fn test_draw_binds_both_slots_then_draws() {
        let sphere = UvSphere::new(SHELL_RADIUS, 4);
        let mut ctx = RecordingContext {
            bound: Vec::new(),
            drawn: None,
        };

        sphere.draw(&mut ctx, 7, 3);

        assert_eq!(
            ctx.bound,
            vec![
                (7, 3, sphere.vertex_count() * 3),
                (3, 2, sphere.vertex_count() * 2),
            ]
        );
        assert_eq!(ctx.drawn, Some(sphere.vertex_count() as u32));
    }
}
