//! 骨骼节点
//!
//! Bone 是骨架的最小单元：一个可视节点 + 一个刚体。
//! 两者的位姿只在显式对齐点保证一致（抓取开始、步进同步之后），不会自动联动。

use bitflags::bitflags;
use glam::Vec3;
use rapier3d::prelude::RigidBodyHandle;

use crate::physics::RigWorld;
use crate::scene::{GroupId, NodeId, NodeLink, PickBox, SceneGraph};

use super::{BoneId, ChainId};

// ============================================================================
// 骨骼标志
// ============================================================================

bitflags! {
    /// 骨骼标志位
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct BoneFlags: u32 {
        /// 链根：没有指向父骨骼的约束
        const CHAIN_ROOT = 1 << 0;
        /// 链末端
        const CHAIN_TIP = 1 << 1;
        /// 属于脊柱
        const SPINE = 1 << 2;
        /// 属于四肢
        const LIMB = 1 << 3;
        /// 脚（碰撞组清零，不与地面碰撞）
        const FOOT = 1 << 4;
        /// 脚底：被钉在地面上
        const SOLE = 1 << 5;
        /// 可被射线拾取
        const PICKABLE = 1 << 6;
        /// 驱动躯干蒙皮
        const SKINNED = 1 << 7;
    }
}

/// 高亮状态
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColorState {
    #[default]
    Default,
    Highlighted,
}

impl ColorState {
    /// 材质颜色（线性 RGB）
    pub fn rgb(self) -> [f32; 3] {
        match self {
            // 灰蓝
            ColorState::Default => hsl_to_rgb(2.0 / 3.0, 0.1, 0.5),
            // 亮黄
            ColorState::Highlighted => hsl_to_rgb(1.0 / 6.0, 1.0, 0.7),
        }
    }
}

fn hsl_to_rgb(h: f32, s: f32, l: f32) -> [f32; 3] {
    if s == 0.0 {
        return [l, l, l];
    }
    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;
    let hue = |mut t: f32| {
        if t < 0.0 {
            t += 1.0;
        }
        if t > 1.0 {
            t -= 1.0;
        }
        if t < 1.0 / 6.0 {
            p + (q - p) * 6.0 * t
        } else if t < 0.5 {
            q
        } else if t < 2.0 / 3.0 {
            p + (q - p) * 6.0 * (2.0 / 3.0 - t)
        } else {
            p
        }
    };
    [hue(h + 1.0 / 3.0), hue(h), hue(h - 1.0 / 3.0)]
}

// ============================================================================
// 骨骼
// ============================================================================

/// 骨骼
///
/// - 静态数据：长度、所属链、可视节点、刚体（装配后不变）
/// - 动态数据：高亮状态；位姿存放在场景节点与物理刚体中
#[derive(Clone, Debug)]
pub struct Bone {
    /// 骨骼名称
    pub name: String,
    /// Group 内索引
    pub(crate) id: BoneId,
    /// 所属骨骼链
    pub chain: ChainId,
    /// 长度（沿局部 -Y）
    pub length: f32,
    pub color_state: ColorState,
    pub flags: BoneFlags,
    /// 可视节点
    pub node: NodeId,
    /// 物理刚体
    pub body: RigidBodyHandle,
}

impl Bone {
    /// 创建骨骼：在 `parent` 下 `offset` 处建可视节点，再按节点世界位姿建刚体
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn spawn(
        scene: &mut SceneGraph,
        world: &mut RigWorld,
        group: GroupId,
        id: BoneId,
        chain: ChainId,
        name: String,
        parent: NodeId,
        offset: Vec3,
        length: f32,
        mut flags: BoneFlags,
    ) -> Self {
        let node = scene.add_node(Some(parent), &name, offset);
        scene.set_link(node, NodeLink::Bone { group, bone: id });

        // 零长度骨骼（链末端标记）不可拾取
        if length > 0.0 {
            let half = length * 0.5;
            let width = world.config().pick_half_width;
            scene.set_pick_box(
                node,
                Some(PickBox {
                    center: Vec3::new(0.0, -half, 0.0),
                    half_extents: Vec3::new(width, half, width),
                }),
            );
            flags.insert(BoneFlags::PICKABLE);
        }

        let body = world.add_bone_body(node, scene.world_pose(node), length);

        Self {
            name,
            id,
            chain,
            length,
            color_state: ColorState::Default,
            flags,
            node,
            body,
        }
    }

    #[inline]
    pub fn id(&self) -> BoneId {
        self.id
    }

    /// 末端在局部空间的位置（下一节骨骼的挂点）
    #[inline]
    pub fn tip_offset(&self) -> Vec3 {
        Vec3::new(0.0, -self.length, 0.0)
    }

    /// 中点在局部空间的位置
    #[inline]
    pub fn midpoint_offset(&self) -> Vec3 {
        Vec3::new(0.0, -self.length * 0.5, 0.0)
    }

    #[inline]
    pub fn is_chain_root(&self) -> bool {
        self.flags.contains(BoneFlags::CHAIN_ROOT)
    }

    #[inline]
    pub fn is_pickable(&self) -> bool {
        self.flags.contains(BoneFlags::PICKABLE)
    }

    #[inline]
    pub fn is_highlighted(&self) -> bool {
        self.color_state == ColorState::Highlighted
    }

    /// 世界空间中点
    pub fn world_midpoint(&self, scene: &SceneGraph) -> Vec3 {
        scene.local_to_world_point(self.node, self.midpoint_offset())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::RigConfig;

    #[test]
    fn test_highlight_colors_differ() {
        let default = ColorState::Default.rgb();
        let highlighted = ColorState::Highlighted.rgb();
        assert_ne!(default, highlighted);
        // 亮黄：红绿高、蓝低
        assert!(highlighted[0] > 0.9 && highlighted[1] > 0.9 && highlighted[2] < 0.5);
    }

    #[test]
    fn test_spawn_links_node_and_body() {
        let mut scene = SceneGraph::new();
        let mut world = RigWorld::with_config(RigConfig::default());
        let group = scene.alloc_group_id();
        let root = scene.add_node(None, "group", Vec3::ZERO);

        let bone = Bone::spawn(
            &mut scene, &mut world, group, BoneId(0), ChainId(0),
            "b0".to_string(), root, Vec3::new(0.0, 2.0, 0.0), 0.25, BoneFlags::CHAIN_ROOT,
        );

        assert_eq!(scene.link(bone.node), NodeLink::Bone { group, bone: BoneId(0) });
        assert!(bone.is_pickable());
        let pose = world.body_pose(bone.body).unwrap();
        assert!((pose.translation - Vec3::new(0.0, 2.0, 0.0)).length() < 1e-6);
        assert!((bone.world_midpoint(&scene) - Vec3::new(0.0, 1.875, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_zero_length_bone_is_not_pickable() {
        let mut scene = SceneGraph::new();
        let mut world = RigWorld::with_config(RigConfig::default());
        let group = scene.alloc_group_id();
        let root = scene.add_node(None, "group", Vec3::ZERO);

        let bone = Bone::spawn(
            &mut scene, &mut world, group, BoneId(0), ChainId(0),
            "tip".to_string(), root, Vec3::ZERO, 0.0, BoneFlags::CHAIN_TIP,
        );
        assert!(!bone.is_pickable());
        assert!(scene.node(bone.node).unwrap().pick.is_none());
    }
}
