//! 可视变换层级 - 参考 nphysics MultibodyLink 的变换缓存设计
//!
//! 核心设计思想：
//! - Node: 层级中的一个节点，保存 local_to_parent 与缓存的 local_to_world
//! - SceneGraph: 节点池（arena），按 NodeId 索引
//! - NodeLink: 构建时写入的能力标签，替代运行时类型检查（"这个节点是不是骨骼"）

mod camera;
mod ray;

pub use camera::Camera;
pub use ray::{Ray, RayHit};

use glam::{Mat4, Quat, Vec3};

use crate::rig::BoneId;

// ============================================================================
// 公共类型定义
// ============================================================================

/// 节点索引
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// Group 索引（由场景分配，全局唯一）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GroupId(pub usize);

/// 位姿（平移 + 旋转，无缩放）
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
    pub translation: Vec3,
    pub rotation: Quat,
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }
}

impl Pose {
    pub fn new(translation: Vec3, rotation: Quat) -> Self {
        Self { translation, rotation }
    }

    /// 转换为 4x4 矩阵
    #[inline]
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation, self.translation)
    }

    /// 从矩阵分解（忽略缩放）
    #[inline]
    pub fn from_matrix(m: Mat4) -> Self {
        let (_scale, rotation, translation) = m.to_scale_rotation_translation();
        Self {
            translation,
            rotation: rotation.normalize(),
        }
    }
}

/// 节点能力标签
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum NodeLink {
    /// 普通节点
    #[default]
    None,
    /// Group 根节点
    Group(GroupId),
    /// 骨骼链容器节点
    Chain(GroupId),
    /// 骨骼节点：拾取命中后据此找到 Group 与骨骼
    Bone { group: GroupId, bone: BoneId },
    /// 挂到骨骼上的道具
    Prop,
}

/// 拾取盒（节点局部空间的轴对齐盒）
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PickBox {
    pub center: Vec3,
    pub half_extents: Vec3,
}

/// 场景节点
#[derive(Clone, Debug)]
pub struct Node {
    pub name: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// 相对父节点的平移
    pub translation: Vec3,
    /// 相对父节点的旋转
    pub rotation: Quat,
    /// 全局变换矩阵（缓存）
    pub(crate) local_to_world: Mat4,
    pub link: NodeLink,
    pub pick: Option<PickBox>,
}

impl Node {
    fn new(name: &str, parent: Option<NodeId>, translation: Vec3) -> Self {
        Self {
            name: name.to_string(),
            parent,
            children: Vec::new(),
            translation,
            rotation: Quat::IDENTITY,
            local_to_world: Mat4::IDENTITY,
            link: NodeLink::None,
            pick: None,
        }
    }

    /// 本地变换 (local_to_parent)
    #[inline]
    pub fn local_to_parent(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation, self.translation)
    }
}

// ============================================================================
// 场景
// ============================================================================

/// 场景层级
#[derive(Clone, Debug, Default)]
pub struct SceneGraph {
    nodes: Vec<Node>,
    next_group: usize,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// 分配 Group 索引
    pub fn alloc_group_id(&mut self) -> GroupId {
        let id = GroupId(self.next_group);
        self.next_group += 1;
        id
    }

    /// 添加节点并刷新其全局变换
    pub fn add_node(&mut self, parent: Option<NodeId>, name: &str, translation: Vec3) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::new(name, parent, translation));
        if let Some(parent) = parent {
            self.nodes[parent.0].children.push(id);
        }
        self.update_world(id);
        id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|node| node.parent)
    }

    pub fn link(&self, id: NodeId) -> NodeLink {
        self.nodes.get(id.0).map(|node| node.link).unwrap_or_default()
    }

    pub fn set_link(&mut self, id: NodeId, link: NodeLink) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.link = link;
        }
    }

    pub fn set_pick_box(&mut self, id: NodeId, pick: Option<PickBox>) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.pick = pick;
        }
    }

    /// 本地位姿
    pub fn local_pose(&self, id: NodeId) -> Pose {
        self.nodes
            .get(id.0)
            .map(|node| Pose::new(node.translation, node.rotation))
            .unwrap_or_default()
    }

    /// 设置本地位姿（不刷新全局变换，调用方负责 update_world）
    pub fn set_local_pose(&mut self, id: NodeId, pose: Pose) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.translation = pose.translation;
            node.rotation = pose.rotation;
        }
    }

    /// 全局变换矩阵
    pub fn world_matrix(&self, id: NodeId) -> Mat4 {
        self.nodes
            .get(id.0)
            .map(|node| node.local_to_world)
            .unwrap_or(Mat4::IDENTITY)
    }

    /// 父节点的全局变换（根节点为单位阵）
    pub fn parent_world_matrix(&self, id: NodeId) -> Mat4 {
        self.parent(id)
            .map(|parent| self.world_matrix(parent))
            .unwrap_or(Mat4::IDENTITY)
    }

    pub fn world_pose(&self, id: NodeId) -> Pose {
        Pose::from_matrix(self.world_matrix(id))
    }

    pub fn world_position(&self, id: NodeId) -> Vec3 {
        self.world_matrix(id).w_axis.truncate()
    }

    /// 节点局部点 → 世界
    pub fn local_to_world_point(&self, id: NodeId, point: Vec3) -> Vec3 {
        self.world_matrix(id).transform_point3(point)
    }

    /// 刷新节点及其所有后代的全局变换
    ///
    /// local_to_world = parent.local_to_world * local_to_parent
    pub fn update_world(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let parent_world = self.parent_world_matrix(current);
            let node = &mut self.nodes[current.0];
            node.local_to_world = parent_world * node.local_to_parent();
            stack.extend(node.children.iter().copied());
        }
    }

    /// 刷新全部根节点
    pub fn update_all(&mut self) {
        let roots: Vec<NodeId> = (0..self.nodes.len())
            .map(NodeId)
            .filter(|id| self.nodes[id.0].parent.is_none())
            .collect();
        for root in roots {
            self.update_world(root);
        }
    }

    /// 子树中的所有节点（先序，父节点在前）
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut stack = vec![root];
        while let Some(current) = stack.pop() {
            result.push(current);
            if let Some(node) = self.nodes.get(current.0) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        result
    }

    /// 改挂父节点并保持世界变换不变
    pub fn reparent_keep_world(&mut self, id: NodeId, new_parent: NodeId) {
        if id == new_parent || self.descendants(id).contains(&new_parent) {
            log::warn!("[Scene] 拒绝把节点 {:?} 挂到自己的子树下", id);
            return;
        }
        let world = self.world_matrix(id);
        if let Some(old_parent) = self.parent(id) {
            self.nodes[old_parent.0].children.retain(|child| *child != id);
        }
        self.nodes[new_parent.0].children.push(id);
        self.nodes[id.0].parent = Some(new_parent);

        let local = Pose::from_matrix(self.world_matrix(new_parent).inverse() * world);
        self.set_local_pose(id, local);
        self.update_world(id);
    }

    /// 子树射线拾取，返回最近的命中
    pub fn intersect_subtree(&self, root: NodeId, ray: &Ray) -> Option<RayHit> {
        self.descendants(root)
            .into_iter()
            .filter_map(|id| {
                let node = &self.nodes[id.0];
                let pick = node.pick?;
                ray.intersect_box(&node.local_to_world, pick.center, pick.half_extents)
                    .map(|(distance, point)| RayHit { node: id, point, distance })
            })
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }

    /// 全场景射线拾取
    pub fn intersect(&self, ray: &Ray) -> Option<RayHit> {
        (0..self.nodes.len())
            .map(NodeId)
            .filter(|id| self.nodes[id.0].parent.is_none())
            .filter_map(|root| self.intersect_subtree(root, ray))
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }
}
