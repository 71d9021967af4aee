use buildplate_settings::CameraSettings;
use glam::{DMat4, DVec2, DVec3};

use crate::scene::ViewParams;

/// A half-line in render space. `direction` is unit length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: DVec3,
    pub direction: DVec3,
}

impl Ray {
    pub fn new(origin: DVec3, direction: DVec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    pub fn at(&self, t: f64) -> DVec3 {
        self.origin + self.direction * t
    }

    /// Distance along the ray to a plane, if it hits in front.
    pub fn intersect_plane(&self, point: DVec3, normal: DVec3) -> Option<f64> {
        let denom = normal.dot(self.direction);
        if denom.abs() < 1e-12 {
            return None;
        }
        let t = normal.dot(point - self.origin) / denom;
        (t >= 0.0).then_some(t)
    }
}

/// Orbit camera around a target in the Y-up render frame.
#[derive(Debug, Clone, Copy)]
pub struct OrbitCamera {
    pub target: DVec3,
    pub distance: f64,
    pub yaw: f64,   // radians
    pub pitch: f64, // radians
    pub fov: f64,   // degrees
    pub aspect_ratio: f64,
    pub near: f64,
    pub far: f64,
    pub min_distance: f64,
    pub max_distance: f64,
    /// Radians per pixel of pointer movement.
    pub orbit_speed: f64,
    orbit_enabled: bool,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self::from_settings(&CameraSettings::default(), 0.005)
    }
}

impl OrbitCamera {
    /// Camera looking at the origin from `settings.initial_position`.
    pub fn from_settings(settings: &CameraSettings, orbit_speed: f64) -> Self {
        let mut camera = Self {
            target: DVec3::ZERO,
            distance: 1.0,
            yaw: 0.0,
            pitch: 0.0,
            fov: settings.fov_degrees,
            aspect_ratio: 1.0,
            near: settings.near,
            far: settings.far,
            min_distance: settings.min_distance,
            max_distance: settings.max_distance,
            orbit_speed,
            orbit_enabled: true,
        };
        camera.set_eye(DVec3::from_array(settings.initial_position));
        camera
    }

    /// Place the eye at `eye`, keeping the target.
    pub fn set_eye(&mut self, eye: DVec3) {
        let offset = eye - self.target;
        let distance = offset.length();
        if distance < 1e-9 {
            return;
        }
        self.distance = distance.clamp(self.min_distance, self.max_distance);
        self.pitch = (offset.y / distance).clamp(-1.0, 1.0).asin();
        self.yaw = offset.z.atan2(offset.x);
        self.clamp_pitch();
    }

    fn clamp_pitch(&mut self) {
        // Avoid flipping over the poles
        let limit = 89.0f64.to_radians();
        self.pitch = self.pitch.clamp(-limit, limit);
    }

    pub fn orbit_enabled(&self) -> bool {
        self.orbit_enabled
    }

    pub fn set_orbit_enabled(&mut self, enabled: bool) {
        self.orbit_enabled = enabled;
    }

    pub fn update_aspect_ratio(&mut self, width: f64, height: f64) {
        if height > 0.0 {
            self.aspect_ratio = width / height;
        }
    }

    /// Orbit by a pointer delta in pixels. Ignored while orbit is disabled.
    pub fn orbit(&mut self, delta_x: f64, delta_y: f64) -> bool {
        if !self.orbit_enabled {
            return false;
        }
        self.yaw += delta_x * self.orbit_speed;
        self.pitch += delta_y * self.orbit_speed;
        self.clamp_pitch();
        true
    }

    pub fn zoom(&mut self, delta: f64) -> bool {
        if !self.orbit_enabled {
            return false;
        }
        self.distance = (self.distance - delta).clamp(self.min_distance, self.max_distance);
        true
    }

    pub fn pan(&mut self, delta_x: f64, delta_y: f64) -> bool {
        if !self.orbit_enabled {
            return false;
        }
        let forward = (self.target - self.eye_position()).normalize();
        let right = forward.cross(DVec3::Y).normalize();
        let up = right.cross(forward).normalize();

        let scale = self.distance * 0.001;
        self.target -= right * delta_x * scale;
        self.target += up * delta_y * scale;
        true
    }

    pub fn eye_position(&self) -> DVec3 {
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();

        // Y-up convention
        let offset = DVec3::new(cos_pitch * cos_yaw, sin_pitch, cos_pitch * sin_yaw) * self.distance;
        self.target + offset
    }

    pub fn view_matrix(&self) -> DMat4 {
        DMat4::look_at_rh(self.eye_position(), self.target, DVec3::Y)
    }

    pub fn projection_matrix(&self) -> DMat4 {
        DMat4::perspective_rh_gl(self.fov.to_radians(), self.aspect_ratio, self.near, self.far)
    }

    pub fn view_params(&self) -> ViewParams {
        ViewParams {
            view: self.view_matrix(),
            projection: self.projection_matrix(),
            eye: self.eye_position(),
        }
    }

    /// Ray through a point in normalised device coordinates.
    pub fn ray_from_ndc(&self, ndc: DVec2) -> Ray {
        let inverse = (self.projection_matrix() * self.view_matrix()).inverse();
        let near = inverse.project_point3(DVec3::new(ndc.x, ndc.y, -1.0));
        let far = inverse.project_point3(DVec3::new(ndc.x, ndc.y, 1.0));
        Ray::new(near, far - near)
    }

    /// Ray through a pixel; `(0, 0)` is the top-left corner.
    pub fn ray_from_screen(&self, x: f64, y: f64, width: f64, height: f64) -> Ray {
        self.ray_from_ndc(screen_to_ndc(x, y, width, height))
    }

    /// Pixel position of a render-space point, if in front of the camera.
    pub fn project_to_screen(&self, point: DVec3, width: f64, height: f64) -> Option<DVec2> {
        let clip = self.projection_matrix() * self.view_matrix() * point.extend(1.0);
        if clip.w <= 0.0 {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        Some(DVec2::new(
            (ndc.x + 1.0) * 0.5 * width,
            (1.0 - ndc.y) * 0.5 * height,
        ))
    }

    pub fn fit_to_bounds(&mut self, min: DVec3, max: DVec3) {
        let center = (min + max) * 0.5;
        let max_dim = (max - min).max_element();
        self.target = center;
        let fov_rad = self.fov.to_radians();
        let distance = (max_dim * 1.2) / (fov_rad / 2.0).tan(); // 1.2 factor for margin
        self.distance = distance.clamp(self.min_distance, self.max_distance);
    }
}

pub fn screen_to_ndc(x: f64, y: f64, width: f64, height: f64) -> DVec2 {
    DVec2::new(
        2.0 * x / width.max(1.0) - 1.0,
        1.0 - 2.0 * y / height.max(1.0),
    )
}
