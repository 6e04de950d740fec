//! 拖拽工作平面
//!
//! 指针在屏幕上的移动经相机反投影成射线，与工作平面求交得到抓取器的新目标。

use glam::{Quat, Vec3};

use crate::scene::Ray;

/// 工作平面策略
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum DragPlanePolicy {
    /// 平面法线 = 点击时视线方向取反，可自由三维拖拽
    #[default]
    ViewAligned,
    /// 平面法线固定为对称轴，拖拽被限制在对称面内
    SymmetryLocked { axis: Vec3 },
}

/// 工作平面
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorkPlane {
    /// 平面上一点（点击点）
    pub origin: Vec3,
    /// 单位法线
    pub normal: Vec3,
    /// 投影结果的附加平移（对称锁定时把目标移回对称面）
    pub shift: Vec3,
}

impl WorkPlane {
    /// 视线对齐平面
    pub fn view_aligned(point: Vec3, ray: &Ray) -> Self {
        Self {
            origin: point,
            normal: -ray.direction,
            shift: Vec3::ZERO,
        }
    }

    /// 对称锁定平面，返回 `(平面, 抓取点)`
    ///
    /// 平面过点击深度，法线为对称轴；抓取点与之后的投影目标都沿轴
    /// 平移到过 `symmetry_origin` 的对称面上。
    pub fn symmetry_locked(point: Vec3, axis: Vec3, symmetry_origin: Vec3) -> (Self, Vec3) {
        let axis = axis.try_normalize().unwrap_or(Vec3::Z);
        let depth = (point - symmetry_origin).dot(axis);
        let shift = -axis * depth;
        let plane = Self {
            origin: point,
            normal: axis,
            shift,
        };
        (plane, point + shift)
    }

    /// 按策略计算平面，返回 `(平面, 抓取点)`
    pub fn compute(policy: DragPlanePolicy, point: Vec3, ray: &Ray, symmetry_origin: Vec3) -> (Self, Vec3) {
        match policy {
            DragPlanePolicy::ViewAligned => (Self::view_aligned(point, ray), point),
            DragPlanePolicy::SymmetryLocked { axis } => Self::symmetry_locked(point, axis, symmetry_origin),
        }
    }

    /// 射线投影到平面；平行或在射线背后时返回 `None`
    pub fn project(&self, ray: &Ray) -> Option<Vec3> {
        ray.intersect_plane(self.origin, self.normal).map(|hit| hit + self.shift)
    }

    /// 平面朝向（局部 +Z 对齐法线）
    pub fn rotation(&self) -> Quat {
        Quat::from_rotation_arc(Vec3::Z, self.normal)
    }
}
