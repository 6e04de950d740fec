//! 单链装配
//!
//! 一条独立的骨骼链。每次抓取时把根骨骼重新钉在它当前的世界位置，
//! 拖拽时整条链绕根部摆动。

use glam::Vec3;

use crate::physics::{get_config, RigConfig};
use crate::scene::{NodeId, Ray, SceneGraph};
use crate::Result;

use super::bone::Bone;
use super::chain::{Chain, ChainBuilder};
use super::grabber::Grabber;
use super::group::RigGroup;
use super::work_plane::WorkPlane;
use super::{BoneId, ChainId, EditorGroup};

pub struct ChainRig {
    group: RigGroup,
    chain: ChainId,
    /// 根部锚点（刚性）
    anchor: Grabber,
}

impl ChainRig {
    pub fn new(scene: &mut SceneGraph, parent: Option<NodeId>, name: &str, positions: &[f32]) -> Result<Self> {
        Self::with_config(scene, parent, name, positions, get_config())
    }

    pub fn with_config(
        scene: &mut SceneGraph,
        parent: Option<NodeId>,
        name: &str,
        positions: &[f32],
        config: RigConfig,
    ) -> Result<Self> {
        let mut group = RigGroup::with_config(scene, parent, name, Vec3::ZERO, config);
        let chain = ChainBuilder::new(name, positions).build(&mut group, scene)?;
        let anchor = Grabber::new(&mut group.world, None);
        group.reconcile_bodies_to_visual(scene);

        Ok(Self { group, chain, anchor })
    }

    pub fn chain_id(&self) -> ChainId {
        self.chain
    }

    pub fn chain(&self) -> Option<&Chain> {
        self.group.chain(self.chain)
    }

    pub fn root_bone(&self) -> Option<&Bone> {
        self.chain()
            .and_then(Chain::root)
            .and_then(|id| self.group.bone(id))
    }

    pub fn anchor(&self) -> &Grabber {
        &self.anchor
    }
}

impl EditorGroup for ChainRig {
    fn group(&self) -> &RigGroup {
        &self.group
    }

    fn group_mut(&mut self) -> &mut RigGroup {
        &mut self.group
    }

    fn grab(&mut self, scene: &mut SceneGraph, bone: BoneId, point: Vec3, ray: &Ray) -> Result<WorkPlane> {
        let plane = self.group.grab(scene, bone, point, ray)?;

        // 重新锚定根骨骼
        if let Some((body, node)) = self.root_bone().map(|root| (root.body, root.node)) {
            let root_position = scene.world_position(node);
            self.anchor.grab(&mut self.group.world, body, root_position);
        }
        Ok(plane)
    }
}
