use glam::{Vec2, Vec3};
use gg_core::frame::FrameBuffer;
use gg_core::traits::Scene;
use rayon::prelude::*;

const MAX_STEPS: u32 = 64;
const HIT_EPSILON: f32 = 1e-3;
const FAR: f32 = 20.0;

/// Scène procédurale : une sphère traversée par un tore, vue par une caméra
/// en orbite, ombrée par ses normales (rouge = x, vert = y, bleu = z).
///
/// Ray marching sur une SDF, une rangée de pixels par tâche rayon.
///
/// # Example
/// ```
/// use gg_core::frame::FrameBuffer;
/// use gg_core::traits::Scene;
/// use gg_render::orbit::OrbitScene;
///
/// let mut scene = OrbitScene::default();
/// let mut fb = FrameBuffer::new(32, 16);
/// scene.render(0.0, &mut fb);
/// // Le centre de l'image touche la sphère.
/// assert_eq!(fb.pixel(16, 8).3, 255);
/// ```
#[derive(Clone, Debug)]
pub struct OrbitScene {
    /// Distance of the camera from the origin.
    pub distance: f32,
    /// Orbit speed in radians per second.
    pub speed: f32,
    /// Camera height above the equator.
    pub elevation: f32,
}

impl Default for OrbitScene {
    fn default() -> Self {
        Self {
            distance: 4.5,
            speed: 0.4,
            elevation: 1.2,
        }
    }
}

impl OrbitScene {
    fn camera(&self, time: f32) -> Camera {
        let angle = time * self.speed;
        let eye = Vec3::new(angle.sin() * self.distance, self.elevation, angle.cos() * self.distance);
        let forward = (-eye).normalize_or(Vec3::NEG_Z);
        let right = forward.cross(Vec3::Y).normalize_or(Vec3::X);
        let up = right.cross(forward);
        Camera {
            eye,
            forward,
            right,
            up,
        }
    }
}

#[derive(Clone, Copy)]
struct Camera {
    eye: Vec3,
    forward: Vec3,
    right: Vec3,
    up: Vec3,
}

impl Camera {
    /// Rayon passant par `ndc` (x, y dans [-1, 1], y vers le haut).
    fn ray(&self, ndc: Vec2, aspect: f32) -> Vec3 {
        (self.forward * 1.8 + self.right * ndc.x * aspect + self.up * ndc.y).normalize()
    }
}

/// Sphère de rayon 1 et tore incliné qui tourne avec le temps.
fn distance_field(p: Vec3, time: f32) -> f32 {
    let sphere = p.length() - 1.0;

    let (s, c) = (time * 0.7).sin_cos();
    let q = Vec3::new(p.x, p.y * c - p.z * s, p.y * s + p.z * c);
    let ring = Vec2::new(Vec2::new(q.x, q.z).length() - 1.6, q.y).length() - 0.25;

    sphere.min(ring)
}

fn normal_at(p: Vec3, time: f32) -> Vec3 {
    let e = 1e-3;
    Vec3::new(
        distance_field(p + Vec3::X * e, time) - distance_field(p - Vec3::X * e, time),
        distance_field(p + Vec3::Y * e, time) - distance_field(p - Vec3::Y * e, time),
        distance_field(p + Vec3::Z * e, time) - distance_field(p - Vec3::Z * e, time),
    )
    .normalize_or(Vec3::Z)
}

fn march(origin: Vec3, dir: Vec3, time: f32) -> Option<Vec3> {
    let mut t = 0.0;
    for _ in 0..MAX_STEPS {
        let p = origin + dir * t;
        let d = distance_field(p, time);
        if d < HIT_EPSILON {
            return Some(p);
        }
        t += d;
        if t > FAR {
            break;
        }
    }
    None
}

impl Scene for OrbitScene {
    fn render(&mut self, time: f32, target: &mut FrameBuffer) {
        let (w, h) = (target.width, target.height);
        if w == 0 || h == 0 {
            return;
        }
        let camera = self.camera(time);
        let aspect = w as f32 / h as f32;
        let stride = (w * 4) as usize;

        target
            .data
            .par_chunks_exact_mut(stride)
            .enumerate()
            .for_each(|(y, row)| {
                let ny = 1.0 - 2.0 * (y as f32 + 0.5) / h as f32;
                for (x, px) in row.chunks_exact_mut(4).enumerate() {
                    let nx = 2.0 * (x as f32 + 0.5) / w as f32 - 1.0;
                    let dir = camera.ray(Vec2::new(nx, ny), aspect);
                    match march(camera.eye, dir, time) {
                        Some(hit) => {
                            // Normale → couleur, comme un matériau "normal".
                            let rgb = normal_at(hit, time) * 0.5 + Vec3::splat(0.5);
                            let c = (rgb.clamp(Vec3::ZERO, Vec3::ONE) * 255.0 + Vec3::splat(0.5)).as_uvec3();
                            px.copy_from_slice(&[c.x as u8, c.y as u8, c.z as u8, 255]);
                        }
                        None => px.copy_from_slice(&[0, 0, 0, 0]),
                    }
                }
            });
    }

    fn name(&self) -> &'static str {
        "orbit"
    }
}
