//! 骨架物理配置
//!
//! 所有参数扁平化，直接在代码中修改默认值即可。

use once_cell::sync::Lazy;
use std::sync::RwLock;

/// 骨架配置（扁平化，不嵌套）
#[derive(Debug, Clone)]
pub struct RigConfig {
    // ========== 重力 ==========
    /// 重力 Y 分量（负数向下），默认 0.0
    /// 编辑器里的骨架是失重的，只由抓取器拖动
    pub gravity_y: f32,

    // ========== 模拟参数 ==========
    /// 每次更新的固定步长（秒），默认 0.1
    pub step_dt: f32,
    /// 约束求解器迭代次数，默认 1
    pub solver_iterations: usize,
    /// 按住拖拽期间的求解迭代次数，默认 4
    pub drag_solver_iterations: usize,

    // ========== 骨骼刚体 ==========
    /// 线性阻尼，默认 10.0
    /// 阻尼很大：松手后骨架应迅速停下，而不是漂走
    pub linear_damping: f32,
    /// 角速度阻尼，默认 10.0
    pub angular_damping: f32,
    /// 每节骨骼质量，默认 1.0
    pub bone_mass: f32,
    /// 碰撞盒横向半宽 / 纵向半长，默认 0.3
    pub bone_shape_ratio: f32,
    /// 碰撞盒最小半边长（零长度骨骼也需要非退化形状）
    pub min_half_extent: f32,
    /// 拾取盒横向半宽（与可视纺锤体同粗），默认 0.03
    pub pick_half_width: f32,

    // ========== 抓取 ==========
    /// 抓取约束最大力，None 表示刚性点约束
    /// 有上限时拖拽表现为软弹簧，快速甩动不会把骨架拉坏
    pub grab_max_force: Option<f32>,
    /// 软抓取弹簧刚度
    pub grab_stiffness: f32,
    /// 软抓取弹簧阻尼
    pub grab_damping: f32,

    // ========== 调度 ==========
    /// 静止判定阈值（线速度 / 角速度），默认 1e-2
    pub idle_velocity_threshold: f32,
    /// 未静止时下一次更新的间隔（毫秒），默认 300
    pub resettle_interval_ms: u64,

    // ========== 调试 ==========
    /// 是否输出调试日志，默认 false
    pub debug_log: bool,
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            gravity_y: 0.0,

            step_dt: 0.1,
            solver_iterations: 1,
            drag_solver_iterations: 4,

            linear_damping: 10.0,
            angular_damping: 10.0,
            bone_mass: 1.0,
            bone_shape_ratio: 0.3,
            min_half_extent: 0.005,
            pick_half_width: 0.03,

            grab_max_force: Some(50.0),
            grab_stiffness: 200.0,
            grab_damping: 20.0,

            idle_velocity_threshold: 1e-2,
            resettle_interval_ms: 300,

            debug_log: false,
        }
    }
}

/// 全局配置实例
static RIG_CONFIG: Lazy<RwLock<RigConfig>> = Lazy::new(|| RwLock::new(RigConfig::default()));

/// 获取当前配置（只读）
pub fn get_config() -> RigConfig {
    RIG_CONFIG.read().unwrap_or_else(|e| e.into_inner()).clone()
}

/// 手动设置配置（用于运行时调试）
pub fn set_config(config: RigConfig) {
    *RIG_CONFIG.write().unwrap_or_else(|e| e.into_inner()) = config;
}

/// 重置为默认配置
pub fn reset_config() {
    *RIG_CONFIG.write().unwrap_or_else(|e| e.into_inner()) = RigConfig::default();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_editor_friendly() {
        let config = RigConfig::default();
        assert_eq!(config.gravity_y, 0.0);
        assert_eq!(config.solver_iterations, 1);
        assert!((config.idle_velocity_threshold - 1e-2).abs() < 1e-9);
        assert!(config.grab_max_force.is_some());
    }
}
