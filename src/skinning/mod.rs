//! 躯干蒙皮
//!
//! - `ProfileCurve`: 过 (半径, 高度) 控制点的 Catmull-Rom 曲线，按弧长取样
//! - `SphereGeometry`: 被重塑的基础回转面
//! - `TorsoSkin`: 重塑、两骨骼权重绑定、CPU 变形

mod profile_curve;
mod sphere;
mod torso;

pub use profile_curve::{Curve, ProfileCurve};
pub use sphere::SphereGeometry;
pub use torso::{RadiusProfile, SkinBoneRef, TorsoProfile, TorsoSkin, VertexInfluence};
