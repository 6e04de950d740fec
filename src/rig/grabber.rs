//! 抓取器
//!
//! 一个运动学刚体，代表指针在三维空间中的抓取点。
//! 拖拽时只移动抓取器，由约束求解器把被抓的骨骼拉过来。

use glam::Vec3;
use rapier3d::prelude::{ImpulseJointHandle, RigidBodyHandle};

use crate::physics::RigWorld;

/// 抓取器
#[derive(Clone, Debug)]
pub struct Grabber {
    body: RigidBodyHandle,
    position: Vec3,
    joint: Option<ImpulseJointHandle>,
    target: Option<RigidBodyHandle>,
    /// 约束最大力；`None` 为刚性约束
    max_force: Option<f32>,
}

impl Grabber {
    /// 在世界中创建抓取器刚体
    pub fn new(world: &mut RigWorld, max_force: Option<f32>) -> Self {
        Self {
            body: world.add_grabber_body(Vec3::ZERO),
            position: Vec3::ZERO,
            joint: None,
            target: None,
            max_force,
        }
    }

    /// 抓住 `target` 上的世界点 `point`
    ///
    /// 已有约束时先释放，保证同一时刻最多一个约束。
    /// 目标刚体不存在时返回 `None`（此时旧约束也已释放）。
    pub fn grab(&mut self, world: &mut RigWorld, target: RigidBodyHandle, point: Vec3) -> Option<ImpulseJointHandle> {
        self.release(world);

        let pose = world.body_pose(target)?;
        let local_point = pose.rotation.inverse() * (point - pose.translation);

        world.teleport_kinematic(self.body, point);
        self.position = point;

        let joint = match self.max_force {
            Some(max_force) => world.add_soft_point_constraint(self.body, Vec3::ZERO, target, local_point, max_force),
            None => world.add_point_constraint(self.body, Vec3::ZERO, target, local_point),
        };
        self.joint = Some(joint);
        self.target = Some(target);
        Some(joint)
    }

    /// 释放约束；没有约束时什么也不做
    pub fn release(&mut self, world: &mut RigWorld) -> bool {
        let Some(joint) = self.joint.take() else {
            return false;
        };
        self.target = None;
        world.remove_constraint(joint);
        true
    }

    /// 移动抓取点（下一步生效）
    pub fn move_to(&mut self, world: &mut RigWorld, point: Vec3) {
        self.position = point;
        world.move_kinematic(self.body, point);
    }

    pub fn body(&self) -> RigidBodyHandle {
        self.body
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn joint(&self) -> Option<ImpulseJointHandle> {
        self.joint
    }

    pub fn target(&self) -> Option<RigidBodyHandle> {
        self.target
    }

    pub fn max_force(&self) -> Option<f32> {
        self.max_force
    }

    pub fn is_grabbing(&self) -> bool {
        self.joint.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::{BodyPose, ConstraintKind, RigConfig};
    use crate::scene::SceneGraph;
    use glam::Quat;
    use std::f32::consts::FRAC_PI_2;

    fn world_with_body(pose: BodyPose) -> (RigWorld, RigidBodyHandle) {
        let mut scene = SceneGraph::new();
        let node = scene.add_node(None, "bone", Vec3::ZERO);
        let mut world = RigWorld::with_config(RigConfig::default());
        let body = world.add_bone_body(node, pose, 0.5);
        (world, body)
    }

    #[test]
    fn test_grab_uses_local_point() {
        let pose = BodyPose::new(Vec3::new(1.0, 2.0, 0.0), Quat::from_rotation_z(FRAC_PI_2));
        let (mut world, body) = world_with_body(pose);
        let mut grabber = Grabber::new(&mut world, None);

        // 绕 Z 转 90° 后局部 -Y 指向世界 +X
        let joint = grabber.grab(&mut world, body, Vec3::new(1.25, 2.0, 0.0)).unwrap();
        let record = world.constraint(joint).unwrap();
        assert_eq!(record.body_a, grabber.body());
        assert_eq!(record.body_b, body);
        assert_eq!(record.anchor_a, Vec3::ZERO);
        assert!((record.anchor_b - Vec3::new(0.0, -0.25, 0.0)).length() < 1e-5);
        assert_eq!(record.kind, ConstraintKind::Point);
        assert!((world.body_pose(grabber.body()).unwrap().translation - Vec3::new(1.25, 2.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_regrab_keeps_single_joint() {
        let (mut world, body) = world_with_body(BodyPose::default());
        let mut grabber = Grabber::new(&mut world, Some(5.0));

        grabber.grab(&mut world, body, Vec3::ZERO);
        grabber.grab(&mut world, body, Vec3::new(0.0, -0.1, 0.0));
        assert_eq!(world.constraints_on(body), 1);
        let record = world.constraint(grabber.joint().unwrap()).unwrap();
        assert_eq!(record.kind, ConstraintKind::SoftPoint { max_force: 5.0 });
    }

    /// 抓住静止骨骼后把抓取器右移 1.0，步进一次，返回骨骼的位移
    fn pull_once(max_force: Option<f32>) -> f32 {
        let (mut world, body) = world_with_body(BodyPose::default());
        let mut grabber = Grabber::new(&mut world, max_force);
        grabber.grab(&mut world, body, Vec3::ZERO).unwrap();
        grabber.move_to(&mut world, Vec3::X);
        world.step(0.1, 1);
        world.body_pose(body).unwrap().translation.x
    }

    #[test]
    fn test_max_force_limits_pull() {
        let rigid = pull_once(None);
        let weak = pull_once(Some(0.1));
        let strong = pull_once(Some(50.0));
        assert!(rigid > 0.1);
        assert!(weak >= 0.0 && weak < rigid * 0.1);
        assert!(weak < strong);
    }

    #[test]
    fn test_release_twice_is_noop() {
        let (mut world, body) = world_with_body(BodyPose::default());
        let mut grabber = Grabber::new(&mut world, None);

        grabber.grab(&mut world, body, Vec3::ZERO);
        assert!(grabber.release(&mut world));
        assert!(!grabber.release(&mut world));
        assert!(!grabber.is_grabbing());
        assert_eq!(grabber.target(), None);
        assert_eq!(world.constraint_count(), 0);
    }
}
