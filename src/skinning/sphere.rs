//! 单位球面网格（经纬分段）

use glam::Vec3;
use std::f32::consts::{PI, TAU};

/// 单位球面
///
/// 顶点按纬线自上而下排列，每条纬线 `width_segments + 1` 个顶点（接缝处重复）。
#[derive(Debug, Clone)]
pub struct SphereGeometry {
    pub positions: Vec<Vec3>,
    pub indices: Vec<u32>,
    pub width_segments: u32,
    pub height_segments: u32,
}

impl SphereGeometry {
    pub fn new(width_segments: u32, height_segments: u32) -> Self {
        let width_segments = width_segments.max(3);
        let height_segments = height_segments.max(2);
        let row = width_segments + 1;

        let mut positions = Vec::with_capacity((row * (height_segments + 1)) as usize);
        for iy in 0..=height_segments {
            let theta = iy as f32 / height_segments as f32 * PI;
            for ix in 0..=width_segments {
                let phi = ix as f32 / width_segments as f32 * TAU;
                positions.push(Vec3::new(
                    -phi.cos() * theta.sin(),
                    theta.cos(),
                    phi.sin() * theta.sin(),
                ));
            }
        }

        // 两极的三角形退化，跳过
        let mut indices = Vec::new();
        for iy in 0..height_segments {
            for ix in 0..width_segments {
                let a = iy * row + ix + 1;
                let b = iy * row + ix;
                let c = (iy + 1) * row + ix;
                let d = (iy + 1) * row + ix + 1;
                if iy != 0 {
                    indices.extend_from_slice(&[a, b, d]);
                }
                if iy != height_segments - 1 {
                    indices.extend_from_slice(&[b, c, d]);
                }
            }
        }

        Self {
            positions,
            indices,
            width_segments,
            height_segments,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}
