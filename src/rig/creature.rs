//! 生物装配
//!
//! 一条脊柱 + 两条手臂（挂在上躯干骨骼）+ 两条腿（挂在骨盆）+ 地面 + 可选躯干蒙皮。
//! 四肢在可视层级中是脊柱骨骼的子节点，在物理中只通过显式点约束连接。

use glam::Vec3;
use rapier3d::prelude::{ImpulseJointHandle, InteractionGroups, RigidBodyHandle};

use crate::physics::{get_config, RigConfig, FLOOR_GROUP, SOLE_GROUP};
use crate::scene::{NodeId, NodeLink, SceneGraph};
use crate::skinning::{RadiusProfile, SkinBoneRef, SphereGeometry, TorsoProfile, TorsoSkin};
use crate::{Result, RigError};

use super::bone::BoneFlags;
use super::chain::{Chain, ChainBuilder, LinkKind};
use super::group::RigGroup;
use super::work_plane::DragPlanePolicy;
use super::{BoneId, ChainId, EditorGroup};

/// 生物装配参数
#[derive(Clone, Debug)]
pub struct CreatureConfig {
    /// 脊柱距离序列（自上而下）
    pub spine_positions: Vec<f32>,
    /// 手臂挂接的脊柱骨骼索引
    pub upper_torso_bone: usize,
    pub arm_positions: Vec<f32>,
    /// 手臂的 Z 向偏移（每项一条手臂）
    pub arm_offsets: Vec<f32>,
    pub leg_positions: Vec<f32>,
    /// 腿的 Z 向偏移（每项一条腿）
    pub leg_offsets: Vec<f32>,
    /// 是否添加地面并把脚底钉在上面
    pub floor: bool,
    pub floor_height: f32,
    /// 躯干剖面；None 表示不生成蒙皮
    pub torso: Option<TorsoProfile>,
    /// 躯干基础球面分段 (经向, 纬向)
    pub torso_segments: (u32, u32),
    /// 默认锁定在 z = 0 对称面上，保持生物左右对称；也可改为视平面
    pub spine_drag: DragPlanePolicy,
    pub limb_drag: DragPlanePolicy,
    pub spine_link: LinkKind,
}

impl Default for CreatureConfig {
    fn default() -> Self {
        // 6 节非零长度脊柱骨骼：7 个关节半径，6 个中点半径
        let width = RadiusProfile {
            joints: vec![0.07, 0.09, 0.17, 0.16, 0.13, 0.15, 0.13],
            mids: vec![0.09, 0.15, 0.17, 0.14, 0.14, 0.16],
        };
        let depth = width.scaled(0.7);

        Self {
            spine_positions: vec![2.0, 1.75, 1.625, 1.5, 1.375, 1.25, 1.0, 1.0],
            upper_torso_bone: 2,
            arm_positions: vec![0.0, -0.35, -0.65, -0.85, -0.85],
            arm_offsets: vec![-0.2, 0.2],
            leg_positions: vec![0.0, -0.45, -0.9, -1.0, -1.0],
            leg_offsets: vec![-0.15, 0.15],
            floor: true,
            floor_height: 0.0,
            torso: Some(TorsoProfile {
                width,
                depth: Some(depth),
            }),
            torso_segments: (16, 24),
            spine_drag: DragPlanePolicy::SymmetryLocked { axis: Vec3::Z },
            limb_drag: DragPlanePolicy::ViewAligned,
            spine_link: LinkKind::Point,
        }
    }
}

/// 生物
pub struct Creature {
    group: RigGroup,
    spine: ChainId,
    arms: Vec<ChainId>,
    legs: Vec<ChainId>,
    /// 四肢根部与脊柱之间的约束
    limb_joints: Vec<ImpulseJointHandle>,
    floor: Option<RigidBodyHandle>,
    /// 脚底与地面之间的约束
    floor_pins: Vec<ImpulseJointHandle>,
    torso: Option<TorsoSkin>,
    /// 当前姿态下的躯干顶点（世界空间）
    torso_vertices: Vec<Vec3>,
}

impl Creature {
    pub fn new(scene: &mut SceneGraph, parent: Option<NodeId>, name: &str, creature: CreatureConfig) -> Result<Self> {
        Self::with_config(scene, parent, name, creature, get_config())
    }

    pub fn with_config(
        scene: &mut SceneGraph,
        parent: Option<NodeId>,
        name: &str,
        creature: CreatureConfig,
        config: RigConfig,
    ) -> Result<Self> {
        let spine_len = creature.spine_positions.len().saturating_sub(1);
        if creature.upper_torso_bone >= spine_len {
            return Err(RigError::InvalidLimbAttachment {
                spine_bone: creature.upper_torso_bone,
                spine_len,
            });
        }

        let mut group = RigGroup::with_config(scene, parent, name, Vec3::ZERO, config);

        // ========== 脊柱 ==========
        let spine = ChainBuilder::new("spine", &creature.spine_positions)
            .link(creature.spine_link)
            .drag_policy(creature.spine_drag)
            .flags(BoneFlags::SPINE)
            .build(&mut group, scene)?;
        let spine_bones = chain_bones(&group, spine)?;

        let mut limb_joints = Vec::new();

        // ========== 手臂：挂在上躯干 ==========
        let upper_torso = spine_bones[creature.upper_torso_bone];
        let mut arms = Vec::with_capacity(creature.arm_offsets.len());
        for (i, &z) in creature.arm_offsets.iter().enumerate() {
            let offset = Vec3::new(0.0, 0.0, z);
            let (chain, joint) = attach_limb(
                &mut group,
                scene,
                &format!("arm.{}", i),
                &creature.arm_positions,
                upper_torso,
                offset,
                creature.limb_drag,
            )?;
            arms.push(chain);
            limb_joints.push(joint);
        }

        // ========== 腿：挂在骨盆末端 ==========
        let pelvis = *spine_bones.last().ok_or(RigError::UnknownChain(spine.0))?;
        let pelvis_length = group.bone(pelvis).map(|bone| bone.length).unwrap_or_default();
        let mut legs = Vec::with_capacity(creature.leg_offsets.len());
        for (i, &z) in creature.leg_offsets.iter().enumerate() {
            let offset = Vec3::new(0.0, -pelvis_length, z);
            let (chain, joint) = attach_limb(
                &mut group,
                scene,
                &format!("leg.{}", i),
                &creature.leg_positions,
                pelvis,
                offset,
                creature.limb_drag,
            )?;
            legs.push(chain);
            limb_joints.push(joint);
        }

        // ========== 地面 ==========
        let mut floor = None;
        let mut floor_pins = Vec::new();
        if creature.floor {
            let floor_body = group.world.add_floor_body(creature.floor_height);
            let floor_origin = Vec3::new(0.0, creature.floor_height, 0.0);
            for &leg in &legs {
                floor_pins.extend(pin_sole(&mut group, scene, leg, floor_body, floor_origin)?);
            }
            floor = Some(floor_body);
        }

        // ========== 躯干蒙皮 ==========
        let torso = match &creature.torso {
            Some(profile) => {
                let mut skin_bones = Vec::new();
                for &id in &spine_bones {
                    let bone = group.bone_mut(id).ok_or(RigError::UnknownBone(id.0))?;
                    if bone.length > 0.0 {
                        bone.flags.insert(BoneFlags::SKINNED);
                        skin_bones.push(SkinBoneRef {
                            node: bone.node,
                            length: bone.length,
                        });
                    }
                }
                let (width_segments, height_segments) = creature.torso_segments;
                let geometry = SphereGeometry::new(width_segments, height_segments);
                Some(TorsoSkin::build(scene, &skin_bones, profile, &geometry)?)
            }
            None => None,
        };
        let torso_vertices = torso.as_ref().map(|skin| skin.deform(scene)).unwrap_or_default();

        // 首次步进前让物理与可视一致
        group.reconcile_bodies_to_visual(scene);

        log::info!(
            "[Rig] 生物 '{}' 装配完成: {} 节骨骼, {} 条肢体, {} 个约束, 地面={}, 蒙皮顶点={}",
            name,
            group.bones().len(),
            arms.len() + legs.len(),
            group.world.constraint_count(),
            floor.is_some(),
            torso_vertices.len()
        );

        Ok(Self {
            group,
            spine,
            arms,
            legs,
            limb_joints,
            floor,
            floor_pins,
            torso,
            torso_vertices,
        })
    }

    pub fn spine(&self) -> Option<&Chain> {
        self.group.chain(self.spine)
    }

    pub fn spine_id(&self) -> ChainId {
        self.spine
    }

    pub fn arms(&self) -> &[ChainId] {
        &self.arms
    }

    pub fn legs(&self) -> &[ChainId] {
        &self.legs
    }

    /// 全部肢体（手臂在前）
    pub fn limbs(&self) -> impl Iterator<Item = ChainId> + '_ {
        self.arms.iter().chain(self.legs.iter()).copied()
    }

    pub fn limb_joints(&self) -> &[ImpulseJointHandle] {
        &self.limb_joints
    }

    pub fn floor(&self) -> Option<RigidBodyHandle> {
        self.floor
    }

    pub fn floor_pins(&self) -> &[ImpulseJointHandle] {
        &self.floor_pins
    }

    pub fn torso(&self) -> Option<&TorsoSkin> {
        self.torso.as_ref()
    }

    pub fn torso_vertices(&self) -> &[Vec3] {
        &self.torso_vertices
    }

    /// 把节点改挂到中点离它最近的骨骼下，保持世界变换不变
    pub fn attach_to_nearest_bone(&self, scene: &mut SceneGraph, node: NodeId) -> Option<BoneId> {
        let position = scene.world_position(node);
        let nearest = self
            .group
            .bones()
            .iter()
            .min_by(|a, b| {
                let da = a.world_midpoint(scene).distance_squared(position);
                let db = b.world_midpoint(scene).distance_squared(position);
                da.total_cmp(&db)
            })?;

        scene.reparent_keep_world(node, nearest.node);
        scene.set_link(node, NodeLink::Prop);
        log::debug!("[Rig] 节点 {:?} 挂到骨骼 '{}'", node, nearest.name);
        Some(nearest.id())
    }
}

impl EditorGroup for Creature {
    fn group(&self) -> &RigGroup {
        &self.group
    }

    fn group_mut(&mut self) -> &mut RigGroup {
        &mut self.group
    }

    fn after_sync(&mut self, scene: &SceneGraph) {
        if let Some(skin) = &self.torso {
            self.torso_vertices = skin.deform(scene);
        }
    }
}

fn chain_bones(group: &RigGroup, chain: ChainId) -> Result<Vec<BoneId>> {
    group
        .chain(chain)
        .map(|chain| chain.bones.clone())
        .ok_or(RigError::UnknownChain(chain.0))
}

/// 构建一条肢体：容器节点挂在 `host` 骨骼的 `offset` 处，根骨骼以点约束连接宿主
fn attach_limb(
    group: &mut RigGroup,
    scene: &mut SceneGraph,
    name: &str,
    positions: &[f32],
    host: BoneId,
    offset: Vec3,
    policy: DragPlanePolicy,
) -> Result<(ChainId, ImpulseJointHandle)> {
    let (host_node, host_body) = group
        .bone(host)
        .map(|bone| (bone.node, bone.body))
        .ok_or(RigError::UnknownBone(host.0))?;

    let chain = ChainBuilder::new(name, positions)
        .parent(host_node)
        .offset(offset)
        .drag_policy(policy)
        .flags(BoneFlags::LIMB)
        .build(group, scene)?;

    let root = group
        .chain(chain)
        .and_then(Chain::root)
        .and_then(|id| group.bone(id))
        .ok_or(RigError::UnknownChain(chain.0))?;
    let root_body = root.body;

    // 宿主局部空间中的挂点 = 容器偏移 + 根骨骼在容器中的位置
    let anchor = offset + Vec3::new(0.0, positions[0], 0.0);
    let joint = group.world.add_point_constraint(host_body, anchor, root_body, Vec3::ZERO);
    Ok((chain, joint))
}

/// 把腿的脚底钉在地面上；脚本身清空碰撞组
fn pin_sole(
    group: &mut RigGroup,
    scene: &SceneGraph,
    leg: ChainId,
    floor: RigidBodyHandle,
    floor_origin: Vec3,
) -> Result<Option<ImpulseJointHandle>> {
    let bones = chain_bones(group, leg)?;
    let &[.., foot, sole] = bones.as_slice() else {
        return Ok(None);
    };

    let sole_bone = group.bone_mut(sole).ok_or(RigError::UnknownBone(sole.0))?;
    sole_bone.flags.insert(BoneFlags::SOLE);
    let (sole_body, sole_node) = (sole_bone.body, sole_bone.node);

    let foot_bone = group.bone_mut(foot).ok_or(RigError::UnknownBone(foot.0))?;
    foot_bone.flags.insert(BoneFlags::FOOT);
    let foot_body = foot_bone.body;

    group.world.set_collision_groups(sole_body, InteractionGroups::new(SOLE_GROUP, FLOOR_GROUP));
    group.world.set_collision_groups(foot_body, InteractionGroups::none());

    let sole_position = scene.world_position(sole_node);
    let pin = group
        .world
        .add_point_constraint(floor, sole_position - floor_origin, sole_body, Vec3::ZERO);
    Ok(Some(pin))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::ConstraintKind;

    fn creature(creature: CreatureConfig) -> (SceneGraph, Creature) {
        let mut scene = SceneGraph::new();
        let rig = Creature::with_config(&mut scene, None, "creature", creature, RigConfig::default()).unwrap();
        (scene, rig)
    }

    #[test]
    fn test_creature_topology() {
        let (scene, rig) = creature(CreatureConfig::default());
        let group = rig.group();

        // 脊柱 7 节 + 4 条肢体各 4 节
        assert_eq!(rig.spine().unwrap().len(), 7);
        assert_eq!(rig.limbs().count(), 4);
        assert_eq!(group.bones().len(), 7 + 4 * 4);
        assert_eq!(rig.limb_joints().len(), 4);
        assert_eq!(rig.floor_pins().len(), 2);

        // 链内 6 + 4×3，四肢挂接 4，脚底 2
        assert_eq!(group.world.constraint_count(), 6 + 12 + 4 + 2);

        // 手臂在可视层级中是上躯干骨骼的后代
        let spine = rig.spine().unwrap();
        let upper = group.bone(spine.bones[2]).unwrap();
        let arm = group.chain(rig.arms()[0]).unwrap();
        assert_eq!(scene.parent(arm.node), Some(upper.node));
        let arm_root = group.bone(arm.bones[0]).unwrap();
        assert!((scene.world_position(arm_root.node) - Vec3::new(0.0, 1.625, -0.2)).length() < 1e-5);

        let record = group.world.constraint(rig.limb_joints()[0]).unwrap();
        assert_eq!(record.body_a, upper.body);
        assert_eq!(record.body_b, arm_root.body);
        assert_eq!(record.anchor_a, Vec3::new(0.0, 0.0, -0.2));
        assert_eq!(record.kind, ConstraintKind::Point);
    }

    #[test]
    fn test_floor_collision_filter() {
        let (scene, rig) = creature(CreatureConfig::default());
        let group = rig.group();
        let leg = group.chain(rig.legs()[1]).unwrap();
        let sole = group.bone(*leg.bones.last().unwrap()).unwrap();
        let foot = group.bone(leg.bones[leg.bones.len() - 2]).unwrap();

        assert!(sole.flags.contains(BoneFlags::SOLE));
        assert!(foot.flags.contains(BoneFlags::FOOT));

        let sole_groups = group.world.collision_groups(sole.body).unwrap();
        assert_eq!(sole_groups.memberships, SOLE_GROUP);
        assert_eq!(sole_groups.filter, FLOOR_GROUP);
        assert_eq!(group.world.collision_groups(foot.body).unwrap().filter, rapier3d::prelude::Group::NONE);

        // 脚底位于地面，偏移与腿一致
        assert!((scene.world_position(sole.node) - Vec3::new(0.0, 0.0, 0.15)).length() < 1e-5);
        let pin = group.world.constraint(rig.floor_pins()[1]).unwrap();
        assert_eq!(pin.body_a, rig.floor().unwrap());
        assert!((pin.anchor_a - Vec3::new(0.0, 0.0, 0.15)).length() < 1e-5);
    }

    #[test]
    fn test_creature_at_rest_keeps_pose() {
        let (mut scene, mut rig) = creature(CreatureConfig::default());
        let before: Vec<Vec3> = rig
            .group()
            .bones()
            .iter()
            .map(|bone| scene.world_position(bone.node))
            .collect();

        rig.group_mut().reconcile_bodies_to_visual(&scene);
        rig.group_mut().step(0.1, 1);
        rig.group().sync_visual_from_bodies(&mut scene);
        rig.after_sync(&scene);

        for (bone, expected) in rig.group().bones().iter().zip(before) {
            assert!((scene.world_position(bone.node) - expected).length() < 1e-3, "{}", bone.name);
        }
        assert_eq!(rig.torso_vertices().len(), rig.torso().unwrap().vertex_count());
    }

    #[test]
    fn test_invalid_attachment_is_rejected() {
        let mut scene = SceneGraph::new();
        let config = CreatureConfig {
            upper_torso_bone: 7,
            ..CreatureConfig::default()
        };
        let result = Creature::with_config(&mut scene, None, "creature", config, RigConfig::default());
        assert!(matches!(result, Err(RigError::InvalidLimbAttachment { spine_bone: 7, spine_len: 7 })));
    }

    #[test]
    fn test_attach_prop_to_nearest_bone() {
        let (mut scene, rig) = creature(CreatureConfig {
            torso: None,
            floor: false,
            ..CreatureConfig::default()
        });
        let prop = scene.add_node(None, "hat", Vec3::new(0.0, 1.95, 0.0));

        let bone = rig.attach_to_nearest_bone(&mut scene, prop).unwrap();
        let head = rig.group().bone(bone).unwrap();
        assert_eq!(bone, rig.spine().unwrap().bones[0]);
        assert_eq!(scene.parent(prop), Some(head.node));
        assert_eq!(scene.link(prop), NodeLink::Prop);
        assert!((scene.world_position(prop) - Vec3::new(0.0, 1.95, 0.0)).length() < 1e-5);
    }
}
