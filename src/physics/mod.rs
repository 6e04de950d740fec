//! 物理世界适配层
//!
//! 骨架只依赖物理引擎的契约：刚体、形状、点约束 / 铰链约束、带迭代次数的步进。
//! 数值求解交给 Rapier3D；本模块负责 glam ↔ nalgebra 的转换和骨架相关的刚体登记。

pub mod config;
mod rig_world;

pub use config::{get_config, reset_config, set_config, RigConfig};
pub use rig_world::{BodyRole, ConstraintKind, ConstraintRecord, RigBodyData, RigWorld};

use glam::{Quat, Vec3};
use rapier3d::math::{Isometry, Point, Real, Rotation, Vector};
use rapier3d::na;
use rapier3d::prelude::Group;

use crate::scene::Pose;

/// 刚体的世界空间位姿（位置 + 朝向）
pub type BodyPose = Pose;

/// 地面碰撞组
pub const FLOOR_GROUP: Group = Group::GROUP_1;
/// 脚底（sole）碰撞组：只有它与地面交互
pub const SOLE_GROUP: Group = Group::GROUP_2;

// ============================================================================
// glam ↔ nalgebra
// ============================================================================

#[inline]
pub(crate) fn to_vector(v: Vec3) -> Vector<Real> {
    Vector::new(v.x, v.y, v.z)
}

#[inline]
pub(crate) fn to_point(v: Vec3) -> Point<Real> {
    Point::new(v.x, v.y, v.z)
}

#[inline]
pub(crate) fn from_vector(v: &Vector<Real>) -> Vec3 {
    Vec3::new(v.x, v.y, v.z)
}

#[inline]
pub(crate) fn to_rotation(q: Quat) -> Rotation<Real> {
    Rotation::new_normalize(na::Quaternion::new(q.w, q.x, q.y, q.z))
}

#[inline]
pub(crate) fn from_rotation(r: &Rotation<Real>) -> Quat {
    // coords 存储顺序为 (i, j, k, w)
    let c = r.coords;
    Quat::from_xyzw(c.x, c.y, c.z, c.w)
}

pub(crate) fn to_isometry(pose: &BodyPose) -> Isometry<Real> {
    Isometry::from_parts(to_vector(pose.translation).into(), to_rotation(pose.rotation))
}

pub(crate) fn from_isometry(iso: &Isometry<Real>) -> BodyPose {
    BodyPose {
        translation: from_vector(&iso.translation.vector),
        rotation: from_rotation(&iso.rotation),
    }
}
