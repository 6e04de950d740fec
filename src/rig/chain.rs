//! 骨骼链构建
//!
//! 输入是一串沿 Y 轴递减的距离，相邻两项之差即骨骼长度：
//! `[2, 1.75, 1.625, 1.5]` → 三节骨骼，长度 0.25 / 0.125 / 0.125。

use glam::Vec3;
use rapier3d::prelude::{ImpulseJointHandle, RigidBodyHandle};

use crate::scene::{NodeId, NodeLink, SceneGraph};
use crate::{Result, RigError};

use super::bone::{Bone, BoneFlags};
use super::group::RigGroup;
use super::work_plane::DragPlanePolicy;
use super::{BoneId, ChainId};

/// 相邻骨骼之间的连接方式
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum LinkKind {
    /// 点约束（球关节）
    #[default]
    Point,
    /// 铰链，轴为前一节骨骼的局部方向
    Hinge { axis: Vec3 },
}

/// 骨骼链
#[derive(Clone, Debug)]
pub struct Chain {
    pub name: String,
    pub(crate) id: ChainId,
    /// 容器节点（根骨骼的父节点）
    pub node: NodeId,
    /// 骨骼，根 → 末端
    pub bones: Vec<BoneId>,
    /// 构建输入
    pub positions: Vec<f32>,
    pub link_kind: LinkKind,
    pub drag_policy: DragPlanePolicy,
    /// 骨骼间约束（`links[i]` 连接 `bones[i]` 与 `bones[i + 1]`）
    pub links: Vec<ImpulseJointHandle>,
}

impl Chain {
    #[inline]
    pub fn id(&self) -> ChainId {
        self.id
    }

    pub fn root(&self) -> Option<BoneId> {
        self.bones.first().copied()
    }

    pub fn tip(&self) -> Option<BoneId> {
        self.bones.last().copied()
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }
}

/// 由距离序列计算骨骼长度并校验
///
/// 除最后一节外长度必须 > 0；最后一节允许为 0（末端标记）。
pub fn bone_lengths(positions: &[f32]) -> Result<Vec<f32>> {
    if positions.len() < 2 {
        return Err(RigError::TooFewPositions(positions.len()));
    }
    if let Some(index) = positions.iter().position(|p| !p.is_finite()) {
        return Err(RigError::NonFinitePosition(index));
    }

    let last = positions.len() - 2;
    positions
        .windows(2)
        .enumerate()
        .map(|(index, pair)| {
            let length = pair[0] - pair[1];
            let valid = if index == last { length >= 0.0 } else { length > 0.0 };
            if valid {
                Ok(length)
            } else {
                Err(RigError::InvalidBoneLength { index, length })
            }
        })
        .collect()
}

/// 骨骼链构建器
#[derive(Clone, Debug)]
pub struct ChainBuilder {
    name: String,
    positions: Vec<f32>,
    parent: Option<NodeId>,
    offset: Vec3,
    link: LinkKind,
    drag_policy: DragPlanePolicy,
    flags: BoneFlags,
}

impl ChainBuilder {
    pub fn new(name: &str, positions: &[f32]) -> Self {
        Self {
            name: name.to_string(),
            positions: positions.to_vec(),
            parent: None,
            offset: Vec3::ZERO,
            link: LinkKind::Point,
            drag_policy: DragPlanePolicy::ViewAligned,
            flags: BoneFlags::empty(),
        }
    }

    /// 容器节点的父节点，默认为 Group 节点
    pub fn parent(mut self, parent: NodeId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// 容器节点相对父节点的偏移
    pub fn offset(mut self, offset: Vec3) -> Self {
        self.offset = offset;
        self
    }

    pub fn link(mut self, link: LinkKind) -> Self {
        self.link = link;
        self
    }

    pub fn drag_policy(mut self, policy: DragPlanePolicy) -> Self {
        self.drag_policy = policy;
        self
    }

    /// 附加到每节骨骼上的标志
    pub fn flags(mut self, flags: BoneFlags) -> Self {
        self.flags = flags;
        self
    }

    /// 在 Group 中构建骨骼链
    ///
    /// 根骨骼位于容器节点的 `(0, positions[0], 0)`，没有父约束；
    /// 之后每节骨骼挂在前一节的 `(0, -prev.length, 0)` 处，
    /// 并以点约束（或铰链）连接前一节末端与本节原点。
    /// 刚体按父 → 子顺序登记。
    pub fn build(self, group: &mut RigGroup, scene: &mut SceneGraph) -> Result<ChainId> {
        let lengths = bone_lengths(&self.positions)?;
        let chain_id = ChainId(group.chains.len());
        let group_id = group.id;

        let parent = self.parent.unwrap_or(group.node);
        let node = scene.add_node(Some(parent), &self.name, self.offset);
        scene.set_link(node, NodeLink::Chain(group_id));

        let last = lengths.len() - 1;
        let mut bones = Vec::with_capacity(lengths.len());
        let mut links = Vec::with_capacity(last);
        let mut prev: Option<(NodeId, RigidBodyHandle, f32)> = None;

        for (i, &length) in lengths.iter().enumerate() {
            let id = BoneId(group.bones.len());
            let mut flags = self.flags;
            if i == 0 {
                flags |= BoneFlags::CHAIN_ROOT;
            }
            if i == last {
                flags |= BoneFlags::CHAIN_TIP;
            }

            let (bone_parent, offset) = match prev {
                None => (node, Vec3::new(0.0, self.positions[0], 0.0)),
                Some((prev_node, _, prev_length)) => (prev_node, Vec3::new(0.0, -prev_length, 0.0)),
            };

            let bone = Bone::spawn(
                scene,
                &mut group.world,
                group_id,
                id,
                chain_id,
                format!("{}.{}", self.name, i),
                bone_parent,
                offset,
                length,
                flags,
            );

            if let Some((_, prev_body, prev_length)) = prev {
                let anchor = Vec3::new(0.0, -prev_length, 0.0);
                let link = match self.link {
                    LinkKind::Point => group.world.add_point_constraint(prev_body, anchor, bone.body, Vec3::ZERO),
                    LinkKind::Hinge { axis } => {
                        group.world.add_hinge_constraint(prev_body, anchor, bone.body, Vec3::ZERO, axis)
                    }
                };
                links.push(link);
            }

            prev = Some((bone.node, bone.body, length));
            bones.push(id);
            group.bones.push(bone);
        }

        if group.world.config().debug_log {
            log::info!(
                "[Rig] 骨骼链 '{}' 构建完成: {} 节骨骼, {} 个约束",
                self.name,
                bones.len(),
                links.len()
            );
        }

        group.chains.push(Chain {
            name: self.name,
            id: chain_id,
            node,
            bones,
            positions: self.positions,
            link_kind: self.link,
            drag_policy: self.drag_policy,
            links,
        });
        Ok(chain_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::{ConstraintKind, RigConfig};

    #[test]
    fn test_bone_lengths() {
        let lengths = bone_lengths(&[2.0, 1.75, 1.625, 1.5]).unwrap();
        assert_eq!(lengths, vec![0.25, 0.125, 0.125]);

        // 末端零长度允许
        let lengths = bone_lengths(&[0.0, -0.35, -0.85, -0.85]).unwrap();
        assert_eq!(lengths.len(), 3);
        assert_eq!(lengths[2], 0.0);
    }

    #[test]
    fn test_bone_lengths_rejects_invalid_input() {
        assert!(matches!(bone_lengths(&[1.0]), Err(RigError::TooFewPositions(1))));
        assert!(matches!(
            bone_lengths(&[2.0, 2.0, 1.0]),
            Err(RigError::InvalidBoneLength { index: 0, .. })
        ));
        assert!(matches!(
            bone_lengths(&[2.0, 1.0, 1.5]),
            Err(RigError::InvalidBoneLength { index: 1, .. })
        ));
        assert!(matches!(bone_lengths(&[2.0, f32::NAN]), Err(RigError::NonFinitePosition(1))));
    }

    #[test]
    fn test_build_creates_bones_and_links() {
        let mut scene = SceneGraph::new();
        let mut group = RigGroup::with_config(&mut scene, None, "group", Vec3::ZERO, RigConfig::default());
        let positions = [2.0, 1.75, 1.625, 1.5];
        let chain_id = ChainBuilder::new("spine", &positions).build(&mut group, &mut scene).unwrap();

        let chain = group.chain(chain_id).unwrap();
        assert_eq!(chain.len(), positions.len() - 1);
        assert_eq!(chain.links.len(), positions.len() - 2);

        for (i, bone_id) in chain.bones.iter().enumerate() {
            let bone = group.bone(*bone_id).unwrap();
            assert!((bone.length - (positions[i] - positions[i + 1])).abs() < 1e-6);
        }

        // 每节非根骨骼都以前一节末端 → 本节原点连接
        for pair in chain.bones.windows(2) {
            let prev = group.bone(pair[0]).unwrap();
            let bone = group.bone(pair[1]).unwrap();
            let records = group.world.constraints_between(prev.body, bone.body);
            assert_eq!(records.len(), 1);
            assert_eq!(records[0].anchor_a, Vec3::new(0.0, -prev.length, 0.0));
            assert_eq!(records[0].anchor_b, Vec3::ZERO);
            assert_eq!(records[0].kind, ConstraintKind::Point);
            assert_eq!(scene.parent(bone.node), Some(prev.node));
        }

        // 根骨骼没有父约束
        let root = group.bone(chain.bones[0]).unwrap();
        assert!(root.is_chain_root());
        assert_eq!(group.world.constraints_on(root.body), 1);
        assert!((scene.world_position(root.node) - Vec3::new(0.0, 2.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_hinge_links() {
        let mut scene = SceneGraph::new();
        let mut group = RigGroup::with_config(&mut scene, None, "group", Vec3::ZERO, RigConfig::default());
        let chain_id = ChainBuilder::new("tail", &[1.0, 0.5, 0.0])
            .link(LinkKind::Hinge { axis: Vec3::Z })
            .build(&mut group, &mut scene)
            .unwrap();

        let chain = group.chain(chain_id).unwrap();
        let record = group.world.constraint(chain.links[0]).unwrap();
        assert_eq!(record.kind, ConstraintKind::Hinge { axis: Vec3::Z });
    }
}
