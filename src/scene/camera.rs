//! 透视相机（只负责反投影；轨道控制在外部）

use glam::{Mat4, Vec2, Vec3};

use super::Ray;

/// 透视相机
#[derive(Clone, Debug)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// 垂直视场角（弧度）
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        // 斜上方 45° 俯视角色胸口
        let xz = Vec2::new(1.0, 1.0).normalize() * 2.0;
        Self {
            position: Vec3::new(xz.x, 1.9, xz.y),
            target: Vec3::new(0.0, 1.0, 0.0),
            up: Vec3::Y,
            fov_y: 60f32.to_radians(),
            aspect: 1.0,
            near: 0.01,
            far: 100.0,
        }
    }
}

impl Camera {
    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }

    /// 像素坐标 → 归一化设备坐标（Y 向上）
    pub fn ndc_from_pixel(pixel: Vec2, viewport: Vec2) -> Vec2 {
        let p = pixel / viewport * 2.0 - Vec2::ONE;
        Vec2::new(p.x, -p.y)
    }

    /// 归一化设备坐标 → 世界射线
    pub fn ray_from_ndc(&self, ndc: Vec2) -> Ray {
        let inverse = (self.projection() * self.view()).inverse();
        // perspective_rh 的深度范围为 [0, 1]
        let near = inverse.project_point3(ndc.extend(0.0));
        let far = inverse.project_point3(ndc.extend(1.0));
        Ray::new(near, far - near)
    }

    pub fn ray_from_pixel(&self, pixel: Vec2, viewport: Vec2) -> Ray {
        self.ray_from_ndc(Self::ndc_from_pixel(pixel, viewport))
    }

    /// 世界点 → 像素坐标（测试与演示用）
    pub fn pixel_from_world(&self, point: Vec3, viewport: Vec2) -> Vec2 {
        let ndc = (self.projection() * self.view()).project_point3(point);
        let p = Vec2::new(ndc.x, -ndc.y);
        (p + Vec2::ONE) * 0.5 * viewport
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_ray_points_at_target() {
        let camera = Camera::default();
        let ray = camera.ray_from_ndc(Vec2::ZERO);
        let expected = (camera.target - camera.position).normalize();
        assert!(ray.direction.dot(expected) > 0.9999);
    }

    #[test]
    fn test_pixel_round_trip() {
        let camera = Camera::default();
        let viewport = Vec2::new(800.0, 800.0);
        let point = Vec3::new(0.0, 1.6875, 0.0);
        let pixel = camera.pixel_from_world(point, viewport);
        let ray = camera.ray_from_pixel(pixel, viewport);
        // 射线应穿过原始点
        let to_point = point - ray.origin;
        let along = to_point.dot(ray.direction);
        assert!((to_point - ray.direction * along).length() < 1e-3);
    }
}
