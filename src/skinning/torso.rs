//! 躯干蒙皮
//!
//! 把单位球面重塑成沿脊柱的锥形躯干，并把每个顶点绑定到上下相邻的两节骨骼。
//! 绑定只在构建时计算一次；之后改变姿态只更新骨骼矩阵。

use glam::{Mat4, Vec2, Vec3};
use rayon::prelude::*;

use crate::scene::{NodeId, SceneGraph};
use crate::{Result, RigError};

use super::profile_curve::ProfileCurve;
use super::sphere::SphereGeometry;

/// 半径剖面
///
/// `joints[i]` 为第 i 节骨骼根部关节处的半径，`joints[n]` 为最后一节的末端；
/// `mids[i]` 为第 i 节骨骼中点处的半径。
#[derive(Debug, Clone, PartialEq)]
pub struct RadiusProfile {
    pub joints: Vec<f32>,
    pub mids: Vec<f32>,
}

impl RadiusProfile {
    /// 所有半径乘以同一系数
    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            joints: self.joints.iter().map(|r| r * factor).collect(),
            mids: self.mids.iter().map(|r| r * factor).collect(),
        }
    }

    /// 校验采样数与 `bone_count` 匹配且半径全部为正
    pub fn validate(&self, bone_count: usize) -> Result<()> {
        if self.joints.len() != bone_count + 1 {
            return Err(RigError::ProfileMismatch {
                expected: bone_count + 1,
                actual: self.joints.len(),
            });
        }
        if self.mids.len() != bone_count {
            return Err(RigError::ProfileMismatch {
                expected: bone_count,
                actual: self.mids.len(),
            });
        }
        let radii = self.joints.iter().chain(self.mids.iter());
        for (index, &radius) in radii.enumerate() {
            if !(radius.is_finite() && radius > 0.0) {
                return Err(RigError::InvalidRadius { index, radius });
            }
        }
        Ok(())
    }
}

/// 躯干剖面：宽度（X）与可选的厚度（Z）
#[derive(Debug, Clone, PartialEq)]
pub struct TorsoProfile {
    pub width: RadiusProfile,
    /// None 时截面为圆
    pub depth: Option<RadiusProfile>,
}

/// 参与蒙皮的骨骼（自上而下）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkinBoneRef {
    pub node: NodeId,
    pub length: f32,
}

/// 顶点的两骨骼影响
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexInfluence {
    /// 蒙皮骨骼索引
    pub bones: [usize; 2],
    pub weights: [f32; 2],
}

impl VertexInfluence {
    fn single(bone: usize) -> Self {
        Self {
            bones: [bone, bone],
            weights: [1.0, 0.0],
        }
    }
}

/// 躯干蒙皮
#[derive(Debug, Clone)]
pub struct TorsoSkin {
    bones: Vec<NodeId>,
    inverse_bind: Vec<Mat4>,
    /// 绑定时各关节高度（`n + 1` 项，自上而下）
    joint_heights: Vec<f32>,
    /// 绑定时各骨骼中点高度
    mid_heights: Vec<f32>,
    width_curve: ProfileCurve,
    depth_curve: ProfileCurve,
    bind_vertices: Vec<Vec3>,
    indices: Vec<u32>,
    influences: Vec<VertexInfluence>,
}

impl TorsoSkin {
    /// 按当前（绑定）姿态构建
    pub fn build(
        scene: &SceneGraph,
        bones: &[SkinBoneRef],
        profile: &TorsoProfile,
        geometry: &SphereGeometry,
    ) -> Result<Self> {
        let Some(last) = bones.last() else {
            return Err(RigError::TooFewSkinBones);
        };
        if let Some(index) = bones.iter().position(|bone| !(bone.length > 0.0)) {
            return Err(RigError::InvalidBoneLength {
                index,
                length: bones[index].length,
            });
        }
        profile.width.validate(bones.len())?;
        let depth = profile.depth.as_ref().unwrap_or(&profile.width);
        depth.validate(bones.len())?;

        // 关节与中点高度
        let mut joint_heights: Vec<f32> = bones.iter().map(|bone| scene.world_position(bone.node).y).collect();
        let tip = scene.local_to_world_point(last.node, Vec3::new(0.0, -last.length, 0.0));
        joint_heights.push(tip.y);
        let mid_heights: Vec<f32> = joint_heights.windows(2).map(|pair| (pair[0] + pair[1]) * 0.5).collect();

        let width_curve = profile_curve(&joint_heights, &mid_heights, &profile.width);
        let depth_curve = profile_curve(&joint_heights, &mid_heights, depth);

        // 以顶部骨骼为中心重塑
        let center = scene.world_position(bones[0].node);
        let bind_vertices: Vec<Vec3> = geometry
            .positions
            .par_iter()
            .map(|&p| reshape(p, center, &width_curve, &depth_curve))
            .collect();

        let inverse_bind = bones
            .iter()
            .map(|bone| scene.world_matrix(bone.node).inverse())
            .collect();

        let mut skin = Self {
            bones: bones.iter().map(|bone| bone.node).collect(),
            inverse_bind,
            joint_heights,
            mid_heights,
            width_curve,
            depth_curve,
            bind_vertices,
            indices: geometry.indices.clone(),
            influences: Vec::new(),
        };
        skin.influences = skin
            .bind_vertices
            .iter()
            .map(|v| skin.influence_at_height(v.y))
            .collect();

        log::debug!(
            "[Skin] 躯干蒙皮: {} 节骨骼, {} 个顶点, 剖面长度 {:.3}",
            skin.bones.len(),
            skin.bind_vertices.len(),
            skin.width_curve.length()
        );
        Ok(skin)
    }

    /// 绑定高度 y 处的两骨骼权重
    ///
    /// 相邻两骨骼中点之间，下方骨骼的权重 0 → 0.5（关节处）→ 1 分段线性变化；
    /// 顶部骨骼中点以上全归顶部骨骼，底部骨骼中点以下全归底部骨骼。
    pub fn influence_at_height(&self, y: f32) -> VertexInfluence {
        let mids = &self.mid_heights;
        let n = mids.len();
        if n == 0 || y >= mids[0] {
            return VertexInfluence::single(0);
        }
        if y <= mids[n - 1] {
            return VertexInfluence::single(n - 1);
        }

        // mids 自上而下递减：找到 mids[i] > y >= mids[i + 1]
        let i = mids.partition_point(|&m| m > y).saturating_sub(1).min(n - 2);
        let upper_mid = mids[i];
        let lower_mid = mids[i + 1];
        let joint = self.joint_heights[i + 1];

        let lower_weight = if y >= joint {
            0.5 * (upper_mid - y) / (upper_mid - joint)
        } else {
            0.5 + 0.5 * (joint - y) / (joint - lower_mid)
        };
        VertexInfluence {
            bones: [i, i + 1],
            weights: [1.0 - lower_weight, lower_weight],
        }
    }

    /// 当前骨骼蒙皮矩阵（世界 × 绑定逆矩阵）
    pub fn bone_matrices(&self, scene: &SceneGraph) -> Vec<Mat4> {
        self.bones
            .iter()
            .zip(&self.inverse_bind)
            .map(|(&node, inverse_bind)| scene.world_matrix(node) * *inverse_bind)
            .collect()
    }

    /// CPU 变形：按当前骨骼姿态计算所有顶点的世界位置
    pub fn deform(&self, scene: &SceneGraph) -> Vec<Vec3> {
        let matrices = self.bone_matrices(scene);
        self.bind_vertices
            .par_iter()
            .zip(self.influences.par_iter())
            .map(|(&v, influence)| {
                influence
                    .bones
                    .iter()
                    .zip(influence.weights)
                    .filter(|(_, weight)| *weight > 0.0)
                    .map(|(&bone, weight)| matrices[bone].transform_point3(v) * weight)
                    .sum::<Vec3>()
            })
            .collect()
    }

    pub fn bone_nodes(&self) -> &[NodeId] {
        &self.bones
    }

    pub fn joint_heights(&self) -> &[f32] {
        &self.joint_heights
    }

    pub fn mid_heights(&self) -> &[f32] {
        &self.mid_heights
    }

    pub fn width_curve(&self) -> &ProfileCurve {
        &self.width_curve
    }

    pub fn depth_curve(&self) -> &ProfileCurve {
        &self.depth_curve
    }

    pub fn bind_vertices(&self) -> &[Vec3] {
        &self.bind_vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn influences(&self) -> &[VertexInfluence] {
        &self.influences
    }

    pub fn vertex_count(&self) -> usize {
        self.bind_vertices.len()
    }
}

/// (半径, 高度) 控制点：顶部封口、各关节与中点交替、底部封口
fn profile_curve(joint_heights: &[f32], mid_heights: &[f32], radii: &RadiusProfile) -> ProfileCurve {
    let n = mid_heights.len();
    let top_cap = joint_heights[0] + radii.joints[0] * 0.5;
    let bottom_cap = joint_heights[n] - radii.joints[n] * 0.5;

    let mut control = Vec::with_capacity(2 * n + 3);
    control.push(Vec2::new(0.0, top_cap));
    for i in 0..n {
        control.push(Vec2::new(radii.joints[i], joint_heights[i]));
        control.push(Vec2::new(radii.mids[i], mid_heights[i]));
    }
    control.push(Vec2::new(radii.joints[n], joint_heights[n]));
    control.push(Vec2::new(0.0, bottom_cap));
    ProfileCurve::new(control)
}

/// 球面顶点 → 躯干顶点：极角决定剖面位置，方位角保持不变
fn reshape(p: Vec3, center: Vec3, width: &ProfileCurve, depth: &ProfileCurve) -> Vec3 {
    let u = p.y.clamp(-1.0, 1.0).acos() / std::f32::consts::PI;
    let sample = width.point_at(u);
    let depth_radius = depth.point_at(u).x;
    let direction = Vec2::new(p.x, p.z).normalize_or_zero();
    Vec3::new(
        center.x + direction.x * sample.x,
        sample.y,
        center.z + direction.y * depth_radius,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Pose;
    use glam::Quat;

    /// 自上而下的直脊柱：根部 y = 2，长度依次给定
    fn straight_spine(scene: &mut SceneGraph, lengths: &[f32]) -> Vec<SkinBoneRef> {
        let mut bones = Vec::new();
        let mut parent = scene.add_node(None, "root", Vec3::ZERO);
        let mut offset = Vec3::new(0.0, 2.0, 0.0);
        for &length in lengths {
            let node = scene.add_node(Some(parent), "bone", offset);
            bones.push(SkinBoneRef { node, length });
            parent = node;
            offset = Vec3::new(0.0, -length, 0.0);
        }
        bones
    }

    fn uniform_profile(n: usize, radius: f32) -> TorsoProfile {
        TorsoProfile {
            width: RadiusProfile {
                joints: vec![radius; n + 1],
                mids: vec![radius; n],
            },
            depth: None,
        }
    }

    fn build(lengths: &[f32]) -> (SceneGraph, TorsoSkin) {
        let mut scene = SceneGraph::new();
        let bones = straight_spine(&mut scene, lengths);
        let skin = TorsoSkin::build(&scene, &bones, &uniform_profile(lengths.len(), 0.1), &SphereGeometry::new(12, 16))
            .unwrap();
        (scene, skin)
    }

    #[test]
    fn test_joint_gets_half_weights() {
        let (_scene, skin) = build(&[0.25, 0.125, 0.125]);
        // 第 0 / 1 节骨骼之间的关节在 y = 1.75
        let influence = skin.influence_at_height(1.75);
        assert_eq!(influence.bones, [0, 1]);
        assert!((influence.weights[0] - 0.5).abs() < 1e-6);
        assert!((influence.weights[1] - 0.5).abs() < 1e-6);

        let influence = skin.influence_at_height(1.625);
        assert_eq!(influence.bones, [1, 2]);
        assert!((influence.weights[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_ends_get_full_weight() {
        let (_scene, skin) = build(&[0.25, 0.125, 0.125]);
        let above = skin.influence_at_height(2.5);
        assert_eq!(above.bones[0], 0);
        assert_eq!(above.weights, [1.0, 0.0]);

        let below = skin.influence_at_height(1.0);
        assert_eq!(below.bones[0], 2);
        assert_eq!(below.weights, [1.0, 0.0]);
    }

    #[test]
    fn test_weights_are_monotonic_between_midpoints() {
        let (_scene, skin) = build(&[0.25, 0.125, 0.125]);
        // 第 0 节中点 1.875，第 1 节中点 1.6875
        let mut previous = 0.0;
        for step in 0..=10 {
            let y = 1.875 - step as f32 * (1.875 - 1.6875) / 10.0;
            let influence = skin.influence_at_height(y);
            let lower: f32 = influence
                .bones
                .iter()
                .zip(influence.weights)
                .filter(|(bone, _)| **bone == 1)
                .map(|(_, weight)| weight)
                .sum();
            assert!(lower >= previous - 1e-6);
            assert!((influence.weights[0] + influence.weights[1] - 1.0).abs() < 1e-6);
            previous = lower;
        }
    }

    #[test]
    fn test_reshape_spans_spine() {
        let (_scene, skin) = build(&[0.25, 0.125, 0.125]);
        let heights: Vec<f32> = skin.bind_vertices().iter().map(|v| v.y).collect();
        let top = heights.iter().copied().fold(f32::MIN, f32::max);
        let bottom = heights.iter().copied().fold(f32::MAX, f32::min);
        // 上下封口各外延半个关节半径
        assert!((top - 2.05).abs() < 1e-4);
        assert!((bottom - 1.45).abs() < 1e-4);
        assert_eq!(skin.influences().len(), skin.vertex_count());
    }

    #[test]
    fn test_round_section_without_depth() {
        let (_scene, skin) = build(&[0.25, 0.125, 0.125]);
        assert!((skin.depth_curve().length() - skin.width_curve().length()).abs() < 1e-5);
    }

    #[test]
    fn test_deform_at_bind_pose_is_identity() {
        let (scene, skin) = build(&[0.25, 0.125, 0.125]);
        let deformed = skin.deform(&scene);
        for (a, b) in deformed.iter().zip(skin.bind_vertices()) {
            assert!((*a - *b).length() < 1e-5);
        }
    }

    #[test]
    fn test_deform_follows_moved_bone() {
        let (mut scene, skin) = build(&[0.25, 0.125, 0.125]);
        let top = skin.bone_nodes()[0];
        // 顶部骨骼整体平移
        scene.set_local_pose(top, Pose::new(Vec3::new(0.3, 2.0, 0.0), Quat::IDENTITY));
        scene.update_world(top);

        let deformed = skin.deform(&scene);
        for ((moved, bind), influence) in deformed.iter().zip(skin.bind_vertices()).zip(skin.influences()) {
            if influence.bones[0] == 0 && influence.weights[0] == 1.0 {
                assert!((*moved - (*bind + Vec3::new(0.3, 0.0, 0.0))).length() < 1e-5);
            }
        }
    }

    #[test]
    fn test_profile_validation() {
        let mut scene = SceneGraph::new();
        let bones = straight_spine(&mut scene, &[0.25, 0.125]);
        let sphere = SphereGeometry::new(8, 8);

        let short = uniform_profile(1, 0.1);
        assert!(matches!(
            TorsoSkin::build(&scene, &bones, &short, &sphere),
            Err(RigError::ProfileMismatch { expected: 3, actual: 2 })
        ));

        let mut bad = uniform_profile(2, 0.1);
        bad.width.mids[1] = 0.0;
        assert!(matches!(
            TorsoSkin::build(&scene, &bones, &bad, &sphere),
            Err(RigError::InvalidRadius { index: 4, .. })
        ));

        assert!(matches!(
            TorsoSkin::build(&scene, &[], &uniform_profile(0, 0.1), &sphere),
            Err(RigError::TooFewSkinBones)
        ));
    }
}
