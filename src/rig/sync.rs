//! 物理 ↔ 可视 双向同步
//!
//! 刚体保存世界位姿，可视节点保存相对父节点的位姿；
//! 两者之间的换算集中在 [`local_pose_from_world_body_pose`]。

use glam::Mat4;

use crate::physics::{BodyPose, BodyRole, RigWorld};
use crate::scene::{Pose, SceneGraph};

/// 刚体世界位姿 → 节点本地位姿
///
/// local = parent_world⁻¹ * body_world
#[inline]
pub fn local_pose_from_world_body_pose(parent_world: Mat4, body: BodyPose) -> Pose {
    Pose::from_matrix(parent_world.inverse() * body.to_matrix())
}

/// 物理 → 可视
///
/// 按刚体登记顺序（父骨骼在前）逐个写回，每写一个立即刷新其全局变换，
/// 保证子骨骼换算时父节点的全局矩阵已是最新。
pub fn sync_visual_from_bodies(world: &RigWorld, scene: &mut SceneGraph) {
    for data in world.rig_bodies() {
        if data.role != BodyRole::Bone {
            continue;
        }
        let (Some(node), Some(pose)) = (data.visual, world.body_pose(data.handle)) else {
            continue;
        };
        let local = local_pose_from_world_body_pose(scene.parent_world_matrix(node), pose);
        scene.set_local_pose(node, local);
        scene.update_world(node);
    }
}

/// 可视 → 物理（单向，每次抓取前调用一次）
pub fn reconcile_bodies_to_visual(world: &mut RigWorld, scene: &SceneGraph) {
    let targets: Vec<_> = world
        .rig_bodies()
        .iter()
        .filter(|data| data.role == BodyRole::Bone)
        .filter_map(|data| data.visual.map(|node| (data.handle, node)))
        .collect();

    for (handle, node) in targets {
        world.set_body_pose(handle, scene.world_pose(node));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::RigConfig;
    use glam::{Quat, Vec3};
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_local_pose_identity_parent() {
        let body = BodyPose::new(Vec3::new(1.0, 2.0, 3.0), Quat::from_rotation_y(0.3));
        let local = local_pose_from_world_body_pose(Mat4::IDENTITY, body);
        assert!((local.translation - body.translation).length() < 1e-6);
        assert!(local.rotation.angle_between(body.rotation) < 1e-5);
    }

    #[test]
    fn test_local_pose_rotated_parent() {
        // 父节点在 (0, 2, 0)，绕 Z 转 90°
        let parent = Mat4::from_rotation_translation(Quat::from_rotation_z(FRAC_PI_2), Vec3::new(0.0, 2.0, 0.0));
        // 子刚体位于父节点局部 (0, -0.5, 0) → 世界 (0.5, 2, 0)，同样朝向
        let body = BodyPose::new(Vec3::new(0.5, 2.0, 0.0), Quat::from_rotation_z(FRAC_PI_2));
        let local = local_pose_from_world_body_pose(parent, body);
        assert!((local.translation - Vec3::new(0.0, -0.5, 0.0)).length() < 1e-5);
        assert!(local.rotation.angle_between(Quat::IDENTITY) < 1e-4);

        // 回代：parent * local = body
        let world = parent * local.to_matrix();
        assert!((world.w_axis.truncate() - body.translation).length() < 1e-5);
    }

    #[test]
    fn test_round_trip_sync() {
        let mut scene = SceneGraph::new();
        let mut world = RigWorld::with_config(RigConfig::default());
        let root = scene.add_node(None, "root", Vec3::new(0.0, 2.0, 0.0));
        scene.set_local_pose(root, Pose::new(Vec3::new(0.0, 2.0, 0.0), Quat::from_rotation_x(0.4)));
        scene.update_world(root);
        let child = scene.add_node(Some(root), "child", Vec3::new(0.0, -0.5, 0.0));

        let a = world.add_bone_body(root, Pose::default(), 0.5);
        let b = world.add_bone_body(child, Pose::default(), 0.5);
        world.add_point_constraint(a, Vec3::new(0.0, -0.5, 0.0), b, Vec3::ZERO);

        reconcile_bodies_to_visual(&mut world, &scene);
        let before = scene.world_matrix(child);

        world.step(0.1, 1);
        sync_visual_from_bodies(&world, &mut scene);

        let after = scene.world_matrix(child);
        assert!(before.abs_diff_eq(after, 1e-4));
        assert!((scene.local_pose(child).translation - Vec3::new(0.0, -0.5, 0.0)).length() < 1e-4);
    }
}
