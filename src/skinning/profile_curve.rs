//! 剖面曲线
//!
//! 均匀 Catmull-Rom 插值，构建时预计算采样点与累计弧长，
//! 之后按弧长参数取点：参数 0.5 落在曲线长度的一半处，而不是控制点序号的一半。

use glam::Vec2;

/// 曲线 trait
pub trait Curve {
    /// 按曲线参数 t ∈ [0, 1] 取点
    fn point(&self, t: f32) -> Vec2;
}

/// 剖面曲线
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileCurve {
    /// 控制点
    control: Vec<Vec2>,
    /// 累计弧长（`divisions + 1` 项，首项为 0）
    lengths: Vec<f32>,
    /// 采样间隔数
    divisions: u32,
}

impl ProfileCurve {
    pub const DEFAULT_DIVISIONS: u32 = 200;

    pub fn new(control: Vec<Vec2>) -> Self {
        Self::with_divisions(control, Self::DEFAULT_DIVISIONS)
    }

    pub fn with_divisions(control: Vec<Vec2>, divisions: u32) -> Self {
        let divisions = divisions.max(1);
        let mut curve = Self {
            control,
            lengths: Vec::with_capacity(divisions as usize + 1),
            divisions,
        };

        let mut total = 0.0;
        let mut last = curve.point(0.0);
        curve.lengths.push(0.0);
        for i in 1..=divisions {
            let current = curve.point(i as f32 / divisions as f32);
            total += current.distance(last);
            curve.lengths.push(total);
            last = current;
        }
        curve
    }

    pub fn control_points(&self) -> &[Vec2] {
        &self.control
    }

    /// 曲线总长
    pub fn length(&self) -> f32 {
        self.lengths.last().copied().unwrap_or(0.0)
    }

    /// 弧长参数 u → 曲线参数 t
    pub fn u_to_t(&self, u: f32) -> f32 {
        let total = self.length();
        if total <= 0.0 {
            return u.clamp(0.0, 1.0);
        }
        let target = u.clamp(0.0, 1.0) * total;

        // 第一个累计弧长 >= target 的采样
        let i = self.lengths.partition_point(|&l| l < target);
        if i == 0 {
            return 0.0;
        }
        if i >= self.lengths.len() {
            return 1.0;
        }

        let before = self.lengths[i - 1];
        let segment = self.lengths[i] - before;
        let fraction = if segment > 0.0 { (target - before) / segment } else { 0.0 };
        (i as f32 - 1.0 + fraction) / self.divisions as f32
    }

    /// 按弧长参数 u ∈ [0, 1] 取点
    pub fn point_at(&self, u: f32) -> Vec2 {
        self.point(self.u_to_t(u))
    }
}

impl Curve for ProfileCurve {
    fn point(&self, t: f32) -> Vec2 {
        let points = &self.control;
        let Some(&first) = points.first() else {
            return Vec2::ZERO;
        };
        if points.len() == 1 {
            return first;
        }

        let last = points.len() - 1;
        let p = last as f32 * t.clamp(0.0, 1.0);
        let index = (p.floor() as usize).min(last);
        let weight = p - index as f32;

        let p0 = points[index.saturating_sub(1)];
        let p1 = points[index];
        let p2 = points[(index + 1).min(last)];
        let p3 = points[(index + 2).min(last)];
        catmull_rom(weight, p0, p1, p2, p3)
    }
}

/// 均匀 Catmull-Rom 段
#[inline]
fn catmull_rom(t: f32, p0: Vec2, p1: Vec2, p2: Vec2, p3: Vec2) -> Vec2 {
    let v0 = (p2 - p0) * 0.5;
    let v1 = (p3 - p1) * 0.5;
    let t2 = t * t;
    let t3 = t * t2;
    (2.0 * p1 - 2.0 * p2 + v0 + v1) * t3 + (-3.0 * p1 + 3.0 * p2 - 2.0 * v0 - v1) * t2 + v0 * t + p1
}
