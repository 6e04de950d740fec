//! 骨架物理世界
//!
//! 使用 Rapier3D 实现物理世界适配器契约。
//!
//! ## 契约 → Rapier 映射
//! | 契约 | Rapier |
//! |------|--------|
//! | addBody | RigidBodySet + ColliderSet |
//! | addConstraint / removeConstraint | ImpulseJointSet |
//! | 点约束 | SphericalJoint（软约束：自由轴 + 线性位置马达） |
//! | 铰链约束 | RevoluteJoint |
//! | step(dt, iterations) | PhysicsPipeline::step |

use std::collections::HashMap;
use std::num::NonZeroUsize;

use glam::Vec3;
use rapier3d::math::{Real, Vector};
use rapier3d::prelude::*;

use crate::scene::NodeId;

use super::config::{get_config, RigConfig};
use super::{from_isometry, from_vector, to_isometry, to_point, to_vector, BodyPose};
use super::{FLOOR_GROUP, SOLE_GROUP};

/// 地面碰撞盒半边长
const FLOOR_HALF_EXTENT: f32 = 50.0;
/// 地面碰撞盒半厚度
const FLOOR_HALF_THICKNESS: f32 = 0.05;

/// 刚体在骨架中的角色
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyRole {
    /// 骨骼刚体（有对应的可视节点）
    Bone,
    /// 抓取器 / 锚点（运动学刚体，无碰撞体）
    Grabber,
    /// 地面（静态刚体）
    Floor,
}

/// 登记在世界中的刚体
#[derive(Clone, Debug)]
pub struct RigBodyData {
    pub handle: RigidBodyHandle,
    pub role: BodyRole,
    /// 对应的可视节点（仅骨骼刚体有）
    pub visual: Option<NodeId>,
}

/// 约束类型
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ConstraintKind {
    /// 刚性点约束
    Point,
    /// 带最大力的软点约束
    SoftPoint { max_force: f32 },
    /// 铰链（局部轴，位于 body_a 空间）
    Hinge { axis: Vec3 },
}

/// 约束记录（锚点均为各自刚体的局部坐标）
#[derive(Clone, Debug)]
pub struct ConstraintRecord {
    pub body_a: RigidBodyHandle,
    pub anchor_a: Vec3,
    pub body_b: RigidBodyHandle,
    pub anchor_b: Vec3,
    pub kind: ConstraintKind,
}

/// 骨架物理世界
///
/// 每个 Group 独占一个世界；刚体不会跨世界共享。
/// `rig_bodies` 按登记顺序保存，装配时保证父骨骼先于子骨骼登记，
/// 物理 → 可视同步依赖这个顺序。
pub struct RigWorld {
    pipeline: PhysicsPipeline,
    integration_parameters: IntegrationParameters,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    gravity: Vector<Real>,

    /// 登记的刚体（登记顺序 = 同步顺序）
    rig_bodies: Vec<RigBodyData>,
    /// 约束记录
    constraints: HashMap<ImpulseJointHandle, ConstraintRecord>,
    /// 构建时的配置快照
    config: RigConfig,
}

impl RigWorld {
    /// 使用全局配置创建物理世界
    pub fn new() -> Self {
        Self::with_config(get_config())
    }

    /// 使用指定配置创建物理世界
    pub fn with_config(config: RigConfig) -> Self {
        let mut integration_parameters = IntegrationParameters::default();
        integration_parameters.dt = config.step_dt;
        if let Some(iterations) = NonZeroUsize::new(config.solver_iterations) {
            integration_parameters.num_solver_iterations = iterations;
        }

        if config.debug_log {
            log::info!(
                "[Rig] 物理世界创建: dt={}, 迭代={}, 重力Y={}",
                config.step_dt, config.solver_iterations, config.gravity_y
            );
        }

        Self {
            pipeline: PhysicsPipeline::new(),
            integration_parameters,
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            gravity: Vector::new(0.0, config.gravity_y, 0.0),
            rig_bodies: Vec::new(),
            constraints: HashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &RigConfig {
        &self.config
    }

    /// 设置重力
    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = to_vector(gravity);
    }

    pub fn gravity(&self) -> Vec3 {
        from_vector(&self.gravity)
    }

    // ========================================
    // 刚体
    // ========================================

    /// 添加骨骼刚体
    ///
    /// 刚体原点位于骨骼根部，碰撞盒沿 -Y 延伸 `length`。
    /// 碰撞组清零：骨架各部分可以互相穿插。
    pub fn add_bone_body(&mut self, visual: NodeId, pose: BodyPose, length: f32) -> RigidBodyHandle {
        let half_length = length * 0.5;
        let half_y = half_length.max(self.config.min_half_extent);
        let half_xz = (half_length * self.config.bone_shape_ratio).max(self.config.min_half_extent);

        let body = RigidBodyBuilder::dynamic()
            .position(to_isometry(&pose))
            .linear_damping(self.config.linear_damping)
            .angular_damping(self.config.angular_damping)
            .can_sleep(false)
            .build();
        let handle = self.bodies.insert(body);

        let collider = ColliderBuilder::cuboid(half_xz, half_y, half_xz)
            .translation(vector![0.0, -half_length, 0.0])
            .mass(self.config.bone_mass)
            .collision_groups(InteractionGroups::none())
            .build();
        self.colliders.insert_with_parent(collider, handle, &mut self.bodies);

        self.rig_bodies.push(RigBodyData {
            handle,
            role: BodyRole::Bone,
            visual: Some(visual),
        });
        handle
    }

    /// 添加抓取器刚体（运动学，无碰撞体，不参与碰撞）
    pub fn add_grabber_body(&mut self, position: Vec3) -> RigidBodyHandle {
        let body = RigidBodyBuilder::kinematic_position_based()
            .translation(to_vector(position))
            .build();
        let handle = self.bodies.insert(body);
        self.rig_bodies.push(RigBodyData {
            handle,
            role: BodyRole::Grabber,
            visual: None,
        });
        handle
    }

    /// 添加地面（静态刚体，只与脚底碰撞组交互）
    ///
    /// 碰撞盒顶面比 `height` 低一个最小半边长，钉在地面上的脚底刚好贴住而不穿透。
    pub fn add_floor_body(&mut self, height: f32) -> RigidBodyHandle {
        let body = RigidBodyBuilder::fixed()
            .translation(vector![0.0, height, 0.0])
            .build();
        let handle = self.bodies.insert(body);

        let top = -self.config.min_half_extent;
        let collider = ColliderBuilder::cuboid(FLOOR_HALF_EXTENT, FLOOR_HALF_THICKNESS, FLOOR_HALF_EXTENT)
            .translation(vector![0.0, top - FLOOR_HALF_THICKNESS, 0.0])
            .collision_groups(InteractionGroups::new(FLOOR_GROUP, SOLE_GROUP))
            .build();
        self.colliders.insert_with_parent(collider, handle, &mut self.bodies);

        self.rig_bodies.push(RigBodyData {
            handle,
            role: BodyRole::Floor,
            visual: None,
        });
        handle
    }

    /// 设置刚体所有碰撞体的碰撞组
    pub fn set_collision_groups(&mut self, handle: RigidBodyHandle, groups: InteractionGroups) {
        let collider_handles = match self.bodies.get(handle) {
            Some(body) => body.colliders().to_vec(),
            None => return,
        };
        for collider_handle in collider_handles {
            if let Some(collider) = self.colliders.get_mut(collider_handle) {
                collider.set_collision_groups(groups);
            }
        }
    }

    /// 刚体第一个碰撞体的碰撞组
    pub fn collision_groups(&self, handle: RigidBodyHandle) -> Option<InteractionGroups> {
        let body = self.bodies.get(handle)?;
        let collider = self.colliders.get(*body.colliders().first()?)?;
        Some(collider.collision_groups())
    }

    pub fn rig_bodies(&self) -> &[RigBodyData] {
        &self.rig_bodies
    }

    pub fn contains_body(&self, handle: RigidBodyHandle) -> bool {
        self.bodies.contains(handle)
    }

    pub fn body_count(&self) -> usize {
        self.rig_bodies.len()
    }

    /// 刚体世界位姿
    pub fn body_pose(&self, handle: RigidBodyHandle) -> Option<BodyPose> {
        self.bodies.get(handle).map(|body| from_isometry(body.position()))
    }

    /// 直接设置刚体世界位姿（可视 → 物理对齐用）
    pub fn set_body_pose(&mut self, handle: RigidBodyHandle, pose: BodyPose) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.set_position(to_isometry(&pose), true);
        }
    }

    /// 线速度与角速度
    pub fn body_velocity(&self, handle: RigidBodyHandle) -> Option<(Vec3, Vec3)> {
        self.bodies
            .get(handle)
            .map(|body| (from_vector(body.linvel()), from_vector(body.angvel())))
    }

    pub fn set_body_velocity(&mut self, handle: RigidBodyHandle, linear: Vec3, angular: Vec3) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.set_linvel(to_vector(linear), true);
            body.set_angvel(to_vector(angular), true);
        }
    }

    /// 瞬移运动学刚体（当前位置和下一步目标同时更新，不产生速度）
    pub fn teleport_kinematic(&mut self, handle: RigidBodyHandle, position: Vec3) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.set_translation(to_vector(position), true);
        }
    }

    /// 设置运动学刚体下一步的目标位置
    pub fn move_kinematic(&mut self, handle: RigidBodyHandle, position: Vec3) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.set_next_kinematic_translation(to_vector(position));
        }
    }

    /// 骨骼刚体中最大的线速度 / 角速度模长
    pub fn max_bone_velocity(&self) -> f32 {
        self.rig_bodies
            .iter()
            .filter(|data| data.role == BodyRole::Bone)
            .filter_map(|data| self.bodies.get(data.handle))
            .map(|body| body.linvel().norm().max(body.angvel().norm()))
            .fold(0.0, f32::max)
    }

    // ========================================
    // 约束
    // ========================================

    /// 刚性点约束：body_a 的 anchor_a 与 body_b 的 anchor_b 重合
    pub fn add_point_constraint(
        &mut self,
        body_a: RigidBodyHandle,
        anchor_a: Vec3,
        body_b: RigidBodyHandle,
        anchor_b: Vec3,
    ) -> ImpulseJointHandle {
        let joint = SphericalJointBuilder::new()
            .local_anchor1(to_point(anchor_a))
            .local_anchor2(to_point(anchor_b))
            .build();
        self.insert_constraint(body_a, anchor_a, body_b, anchor_b, joint.into(), ConstraintKind::Point)
    }

    /// 软点约束
    ///
    /// 线性轴不锁定，改由位置马达把两锚点拉到一起，马达力受 `max_force` 限制。
    pub fn add_soft_point_constraint(
        &mut self,
        body_a: RigidBodyHandle,
        anchor_a: Vec3,
        body_b: RigidBodyHandle,
        anchor_b: Vec3,
        max_force: f32,
    ) -> ImpulseJointHandle {
        let stiffness = self.config.grab_stiffness;
        let damping = self.config.grab_damping;
        let mut builder = GenericJointBuilder::new(JointAxesMask::empty())
            .local_anchor1(to_point(anchor_a))
            .local_anchor2(to_point(anchor_b));
        for axis in [JointAxis::LinX, JointAxis::LinY, JointAxis::LinZ] {
            builder = builder
                .motor_position(axis, 0.0, stiffness, damping)
                .motor_max_force(axis, max_force);
        }
        self.insert_constraint(
            body_a,
            anchor_a,
            body_b,
            anchor_b,
            builder.build(),
            ConstraintKind::SoftPoint { max_force },
        )
    }

    /// 铰链约束（轴为 body_a 局部空间方向）
    pub fn add_hinge_constraint(
        &mut self,
        body_a: RigidBodyHandle,
        anchor_a: Vec3,
        body_b: RigidBodyHandle,
        anchor_b: Vec3,
        axis: Vec3,
    ) -> ImpulseJointHandle {
        let joint = RevoluteJointBuilder::new(UnitVector::new_normalize(to_vector(axis)))
            .local_anchor1(to_point(anchor_a))
            .local_anchor2(to_point(anchor_b))
            .build();
        self.insert_constraint(body_a, anchor_a, body_b, anchor_b, joint.into(), ConstraintKind::Hinge { axis })
    }

    fn insert_constraint(
        &mut self,
        body_a: RigidBodyHandle,
        anchor_a: Vec3,
        body_b: RigidBodyHandle,
        anchor_b: Vec3,
        joint: GenericJoint,
        kind: ConstraintKind,
    ) -> ImpulseJointHandle {
        let handle = self.impulse_joints.insert(body_a, body_b, joint, true);
        self.constraints.insert(
            handle,
            ConstraintRecord { body_a, anchor_a, body_b, anchor_b, kind },
        );
        handle
    }

    /// 移除约束，返回是否确实存在
    pub fn remove_constraint(&mut self, handle: ImpulseJointHandle) -> bool {
        let removed = self.impulse_joints.remove(handle, true).is_some();
        self.constraints.remove(&handle);
        removed
    }

    pub fn constraint(&self, handle: ImpulseJointHandle) -> Option<&ConstraintRecord> {
        self.constraints.get(&handle)
    }

    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    /// 连接两刚体（按 a → b 方向）的所有约束
    pub fn constraints_between(
        &self,
        body_a: RigidBodyHandle,
        body_b: RigidBodyHandle,
    ) -> Vec<&ConstraintRecord> {
        self.constraints
            .values()
            .filter(|record| record.body_a == body_a && record.body_b == body_b)
            .collect()
    }

    /// 涉及某刚体的约束数量
    pub fn constraints_on(&self, body: RigidBodyHandle) -> usize {
        self.constraints
            .values()
            .filter(|record| record.body_a == body || record.body_b == body)
            .count()
    }

    // ========================================
    // 步进
    // ========================================

    /// 步进物理模拟
    pub fn step(&mut self, dt: f32, iterations: usize) {
        self.integration_parameters.dt = dt;
        if let Some(iterations) = NonZeroUsize::new(iterations) {
            self.integration_parameters.num_solver_iterations = iterations;
        }

        self.pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            None,
            &(),
            &(),
        );

        if self.config.debug_log {
            log::debug!("[Rig] 步进 dt={} 迭代={} 最大速度={:.4}", dt, iterations, self.max_bone_velocity());
        }
    }

    /// 按配置步长步进
    pub fn step_default(&mut self) {
        let dt = self.config.step_dt;
        let iterations = self.config.solver_iterations;
        self.step(dt, iterations);
    }
}

impl Default for RigWorld {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SceneGraph;
    use glam::Quat;

    fn pose(y: f32) -> BodyPose {
        BodyPose { translation: Vec3::new(0.0, y, 0.0), rotation: Quat::IDENTITY }
    }

    #[test]
    fn test_bone_body_has_no_self_collision() {
        let mut scene = SceneGraph::new();
        let node = scene.add_node(None, "bone", Vec3::ZERO);
        let mut world = RigWorld::with_config(RigConfig::default());
        let body = world.add_bone_body(node, pose(1.0), 0.5);

        let groups = world.collision_groups(body).unwrap();
        assert_eq!(groups.memberships, Group::NONE);
        assert_eq!(groups.filter, Group::NONE);
        assert_eq!(world.rig_bodies()[0].visual, Some(node));
    }

    #[test]
    fn test_constraint_add_remove() {
        let mut scene = SceneGraph::new();
        let node = scene.add_node(None, "bone", Vec3::ZERO);
        let mut world = RigWorld::with_config(RigConfig::default());
        let a = world.add_bone_body(node, pose(1.0), 0.5);
        let b = world.add_bone_body(node, pose(0.5), 0.5);

        let joint = world.add_point_constraint(a, Vec3::new(0.0, -0.5, 0.0), b, Vec3::ZERO);
        assert_eq!(world.constraint_count(), 1);
        assert_eq!(world.constraints_between(a, b).len(), 1);
        assert!(world.remove_constraint(joint));
        assert!(!world.remove_constraint(joint));
        assert_eq!(world.constraint_count(), 0);
    }

    #[test]
    fn test_resting_bodies_stay_put() {
        let mut scene = SceneGraph::new();
        let node = scene.add_node(None, "bone", Vec3::ZERO);
        let mut world = RigWorld::with_config(RigConfig::default());
        let a = world.add_bone_body(node, pose(1.0), 0.5);
        let b = world.add_bone_body(node, pose(0.5), 0.5);
        world.add_point_constraint(a, Vec3::new(0.0, -0.5, 0.0), b, Vec3::ZERO);

        world.step(0.1, 1);
        let after = world.body_pose(b).unwrap();
        assert!((after.translation - Vec3::new(0.0, 0.5, 0.0)).length() < 1e-4);
        assert!(world.max_bone_velocity() < 1e-3);
    }
}
