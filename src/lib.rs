//! 关节约束骨架引擎
//!
//! 用指针拖拽摆放由刚体骨骼组成的角色：
//! - `scene`: 可视变换层级（节点树、拾取、相机反投影）
//! - `physics`: 物理世界适配层（Rapier3D）与全局配置
//! - `rig`: 骨骼 / 骨骼链 / 生物装配、抓取器、工作平面、双向同步
//! - `skinning`: 弧长样条驱动的躯干蒙皮
//! - `session`: 指针交互与更新调度

pub mod physics;
pub mod rig;
pub mod scene;
pub mod session;
pub mod skinning;

pub use physics::{get_config, reset_config, set_config, BodyPose, RigConfig, RigWorld};
pub use rig::{
    Bone, BoneFlags, BoneId, Chain, ChainId, ChainRig, ColorState, Creature, CreatureConfig,
    DragPlanePolicy, EditorGroup, Grabber, LinkKind, RigGroup, WorkPlane,
};
pub use scene::{Camera, GroupId, NodeId, NodeLink, Ray, RayHit, SceneGraph};
pub use session::{EditorSession, NextUpdate, PointerMode, UpdateReport};
pub use skinning::{ProfileCurve, RadiusProfile, SphereGeometry, TorsoProfile, TorsoSkin, VertexInfluence};

use thiserror::Error;

/// 装配期错误
///
/// 运行期（步进、同步、拖拽）不产生错误；所有数值合法性在装配时一次性校验。
#[derive(Debug, Error)]
pub enum RigError {
    #[error("骨骼链至少需要 2 个位置，实际 {0}")]
    TooFewPositions(usize),

    #[error("骨骼 {index} 长度非法: {length}")]
    InvalidBoneLength { index: usize, length: f32 },

    #[error("骨骼链位置含非有限值 (索引 {0})")]
    NonFinitePosition(usize),

    #[error("剖面半径 {index} 非法: {radius}")]
    InvalidRadius { index: usize, radius: f32 },

    #[error("剖面采样数不匹配: 期望 {expected}, 实际 {actual}")]
    ProfileMismatch { expected: usize, actual: usize },

    #[error("未知骨骼: {0}")]
    UnknownBone(usize),

    #[error("未知骨骼链: {0}")]
    UnknownChain(usize),

    #[error("骨骼 {0} 没有对应的刚体")]
    MissingBody(usize),

    #[error("肢体挂接点非法: 脊柱骨骼 {spine_bone} (共 {spine_len} 节)")]
    InvalidLimbAttachment { spine_bone: usize, spine_len: usize },

    #[error("蒙皮至少需要 1 节非零长度骨骼")]
    TooFewSkinBones,
}

pub type Result<T> = std::result::Result<T, RigError>;
