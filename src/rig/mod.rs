//! 骨架系统 - 参考 nphysics Multibody 设计
//!
//! 核心设计思想：
//! - Bone: 单节刚性骨骼，同时拥有可视节点与物理刚体
//! - Chain: 首尾点约束相连的骨骼序列（脊柱 / 四肢）
//! - RigGroup: 独占一个物理世界和一个抓取器，负责双向同步与工作平面
//! - Creature: 脊柱 + 四肢 + 地面 + 可选躯干蒙皮

mod bone;
mod chain;
mod chain_rig;
mod creature;
mod grabber;
mod group;
mod sync;
mod work_plane;

pub use bone::{Bone, BoneFlags, ColorState};
pub use chain::{bone_lengths, Chain, ChainBuilder, LinkKind};
pub use chain_rig::ChainRig;
pub use creature::{Creature, CreatureConfig};
pub use grabber::Grabber;
pub use group::RigGroup;
pub use sync::{local_pose_from_world_body_pose, reconcile_bodies_to_visual, sync_visual_from_bodies};
pub use work_plane::{DragPlanePolicy, WorkPlane};

use glam::Vec3;

use crate::scene::{Ray, SceneGraph};
use crate::Result;

// ============================================================================
// 索引类型
// ============================================================================

/// 骨骼索引（Group 内）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BoneId(pub usize);

/// 骨骼链索引（Group 内）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChainId(pub usize);

// ============================================================================
// 可编辑 Group
// ============================================================================

/// 可被指针编辑的 Group
///
/// 不同的装配（单链、生物）在抓取和同步后各自有额外动作，
/// 共同部分由 [`RigGroup`] 提供。
pub trait EditorGroup {
    fn group(&self) -> &RigGroup;

    fn group_mut(&mut self) -> &mut RigGroup;

    /// 抓取骨骼：对齐物理、计算工作平面、挂上抓取约束
    fn grab(&mut self, scene: &mut SceneGraph, bone: BoneId, point: Vec3, ray: &Ray) -> Result<WorkPlane> {
        self.group_mut().grab(scene, bone, point, ray)
    }

    /// 松开抓取器，返回之前是否在抓取
    fn release(&mut self) -> bool {
        self.group_mut().release()
    }

    /// 物理 → 可视同步之后调用
    fn after_sync(&mut self, _scene: &SceneGraph) {}
}
