//! 骨架 Group
//!
//! 独占一个物理世界与一个抓取器，持有若干骨骼链。

use glam::Vec3;

use crate::physics::{get_config, RigConfig, RigWorld};
use crate::scene::{GroupId, NodeId, NodeLink, Ray, SceneGraph};
use crate::{Result, RigError};

use super::bone::{Bone, ColorState};
use super::chain::Chain;
use super::grabber::Grabber;
use super::sync;
use super::work_plane::WorkPlane;
use super::{BoneId, ChainId};

/// 骨架 Group
pub struct RigGroup {
    pub(crate) id: GroupId,
    pub name: String,
    /// Group 根节点
    pub node: NodeId,
    pub world: RigWorld,
    pub grabber: Grabber,
    pub(crate) bones: Vec<Bone>,
    pub(crate) chains: Vec<Chain>,
}

impl RigGroup {
    /// 使用全局配置创建
    pub fn new(scene: &mut SceneGraph, parent: Option<NodeId>, name: &str, translation: Vec3) -> Self {
        Self::with_config(scene, parent, name, translation, get_config())
    }

    pub fn with_config(
        scene: &mut SceneGraph,
        parent: Option<NodeId>,
        name: &str,
        translation: Vec3,
        config: RigConfig,
    ) -> Self {
        let id = scene.alloc_group_id();
        let node = scene.add_node(parent, name, translation);
        scene.set_link(node, NodeLink::Group(id));

        let max_force = config.grab_max_force;
        let mut world = RigWorld::with_config(config);
        let grabber = Grabber::new(&mut world, max_force);

        Self {
            id,
            name: name.to_string(),
            node,
            world,
            grabber,
            bones: Vec::new(),
            chains: Vec::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn bone(&self, id: BoneId) -> Option<&Bone> {
        self.bones.get(id.0)
    }

    pub fn bone_mut(&mut self, id: BoneId) -> Option<&mut Bone> {
        self.bones.get_mut(id.0)
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    pub fn chain(&self, id: ChainId) -> Option<&Chain> {
        self.chains.get(id.0)
    }

    pub fn chains(&self) -> &[Chain] {
        &self.chains
    }

    /// 骨骼所属的链
    pub fn chain_of(&self, bone: BoneId) -> Option<&Chain> {
        self.bone(bone).and_then(|bone| self.chain(bone.chain))
    }

    // ========================================
    // 同步与步进
    // ========================================

    /// 可视 → 物理
    pub fn reconcile_bodies_to_visual(&mut self, scene: &SceneGraph) {
        sync::reconcile_bodies_to_visual(&mut self.world, scene);
    }

    /// 物理 → 可视
    pub fn sync_visual_from_bodies(&self, scene: &mut SceneGraph) {
        sync::sync_visual_from_bodies(&self.world, scene);
    }

    pub fn step(&mut self, dt: f32, iterations: usize) {
        self.world.step(dt, iterations);
    }

    pub fn step_default(&mut self) {
        self.world.step_default();
    }

    /// 骨骼刚体的最大速度
    pub fn max_velocity(&self) -> f32 {
        self.world.max_bone_velocity()
    }

    // ========================================
    // 拖拽
    // ========================================

    /// 按骨骼所属链的策略计算工作平面，返回 `(平面, 抓取点)`
    ///
    /// 对称面过 Group 根节点的世界原点。
    pub fn work_plane(&self, scene: &SceneGraph, bone: BoneId, point: Vec3, ray: &Ray) -> Result<(WorkPlane, Vec3)> {
        let chain = self.chain_of(bone).ok_or(RigError::UnknownBone(bone.0))?;
        let symmetry_origin = scene.world_position(self.node);
        Ok(WorkPlane::compute(chain.drag_policy, point, ray, symmetry_origin))
    }

    /// 抓取骨骼
    ///
    /// 先把刚体对齐到可视位姿，再计算工作平面，最后挂上抓取约束。
    pub fn grab(&mut self, scene: &SceneGraph, bone: BoneId, point: Vec3, ray: &Ray) -> Result<WorkPlane> {
        let body = self.bone(bone).ok_or(RigError::UnknownBone(bone.0))?.body;

        self.reconcile_bodies_to_visual(scene);
        let (plane, grab_point) = self.work_plane(scene, bone, point, ray)?;

        self.grabber
            .grab(&mut self.world, body, grab_point)
            .ok_or(RigError::MissingBody(bone.0))?;

        log::debug!(
            "[Grab] '{}' 抓取骨骼 {} @ ({:.3}, {:.3}, {:.3})",
            self.name, bone.0, grab_point.x, grab_point.y, grab_point.z
        );
        Ok(plane)
    }

    /// 移动抓取点
    pub fn drag_to(&mut self, target: Vec3) {
        self.grabber.move_to(&mut self.world, target);
    }

    /// 松开抓取器
    pub fn release(&mut self) -> bool {
        let released = self.grabber.release(&mut self.world);
        if released {
            log::debug!("[Grab] '{}' 松开", self.name);
        }
        released
    }

    pub fn set_color_state(&mut self, bone: BoneId, state: ColorState) {
        if let Some(bone) = self.bone_mut(bone) {
            bone.color_state = state;
        }
    }

    /// 骨骼中点（世界空间）
    pub fn bone_midpoint_world(&self, scene: &SceneGraph, bone: BoneId) -> Option<Vec3> {
        self.bone(bone).map(|bone| bone.world_midpoint(scene))
    }
}
