//! 射线与拾取

use glam::{Mat4, Vec3};

/// 拾取结果
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayHit {
    /// 命中的节点
    pub node: super::NodeId,
    /// 世界空间命中点
    pub point: Vec3,
    /// 沿射线距离
    pub distance: f32,
}

/// 世界空间射线（方向已归一化）
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    #[inline]
    pub fn at(&self, distance: f32) -> Vec3 {
        self.origin + self.direction * distance
    }

    /// 与平面求交（双面），只接受射线前方的交点
    pub fn intersect_plane(&self, plane_point: Vec3, plane_normal: Vec3) -> Option<Vec3> {
        let denom = self.direction.dot(plane_normal);
        if denom.abs() < 1e-6 {
            return None;
        }
        let t = (plane_point - self.origin).dot(plane_normal) / denom;
        if t < 0.0 {
            return None;
        }
        Some(self.at(t))
    }

    /// 与节点局部空间的轴对齐盒求交（slab 法）
    ///
    /// `local_to_world` 必须是刚体变换（无缩放），局部距离即世界距离。
    pub fn intersect_box(&self, local_to_world: &Mat4, center: Vec3, half_extents: Vec3) -> Option<(f32, Vec3)> {
        let world_to_local = local_to_world.inverse();
        let origin = world_to_local.transform_point3(self.origin) - center;
        let direction = world_to_local.transform_vector3(self.direction);

        let mut t_min = f32::NEG_INFINITY;
        let mut t_max = f32::INFINITY;
        for axis in 0..3 {
            let o = origin[axis];
            let d = direction[axis];
            let h = half_extents[axis];
            if d.abs() < 1e-9 {
                if o.abs() > h {
                    return None;
                }
                continue;
            }
            let t1 = (-h - o) / d;
            let t2 = (h - o) / d;
            t_min = t_min.max(t1.min(t2));
            t_max = t_max.min(t1.max(t2));
            if t_min > t_max {
                return None;
            }
        }

        if t_max < 0.0 {
            return None;
        }
        // 起点在盒内时取出射点
        let t = if t_min >= 0.0 { t_min } else { t_max };
        Some((t, self.at(t)))
    }
}
