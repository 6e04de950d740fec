//! 编辑会话
//!
//! 指针事件 → 射线拾取 → 抓取 / 拖拽 / 松开，以及带静止判定的更新调度。
//! 焦点高亮与当前拖拽都是会话上的字段，同一时刻全局最多一个拖拽。

use std::time::Duration;

use glam::{Vec2, Vec3};

use crate::physics::{get_config, RigConfig};
use crate::rig::{BoneId, ChainRig, ColorState, Creature, CreatureConfig, EditorGroup, WorkPlane};
use crate::scene::{Camera, GroupId, NodeLink, Ray, SceneGraph};
use crate::Result;

/// 指针模式
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PointerMode {
    #[default]
    Idle,
    /// 按下时没有命中骨骼，交给外部相机控制
    Camera,
    /// 正在拖拽骨骼
    Dragging,
}

/// 下一次更新的时机
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NextUpdate {
    After(Duration),
    /// 骨架已静止，等待新的输入
    Idle,
}

/// 一次更新的结果
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UpdateReport {
    pub stepped: bool,
    pub max_velocity: f32,
    pub next: NextUpdate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Focus {
    group: usize,
    bone: BoneId,
}

#[derive(Clone, Copy, Debug)]
struct ActiveDrag {
    group: usize,
    plane: WorkPlane,
}

/// 编辑会话
pub struct EditorSession {
    pub scene: SceneGraph,
    pub camera: Camera,
    viewport: Vec2,
    groups: Vec<Box<dyn EditorGroup>>,
    focus: Option<Focus>,
    drag: Option<ActiveDrag>,
    mode: PointerMode,
    update_pending: bool,
    config: RigConfig,
}

impl EditorSession {
    pub fn new(viewport: Vec2) -> Self {
        Self::with_config(viewport, get_config())
    }

    pub fn with_config(viewport: Vec2, config: RigConfig) -> Self {
        let mut camera = Camera::default();
        camera.aspect = aspect(viewport);
        Self {
            scene: SceneGraph::new(),
            camera,
            viewport,
            groups: Vec::new(),
            focus: None,
            drag: None,
            mode: PointerMode::Idle,
            update_pending: true,
            config,
        }
    }

    // ========================================
    // Group 管理
    // ========================================

    pub fn add_group(&mut self, group: Box<dyn EditorGroup>) -> usize {
        self.groups.push(group);
        self.update_pending = true;
        self.groups.len() - 1
    }

    pub fn add_creature(&mut self, name: &str, creature: CreatureConfig) -> Result<usize> {
        let creature = Creature::with_config(&mut self.scene, None, name, creature, self.config.clone())?;
        Ok(self.add_group(Box::new(creature)))
    }

    pub fn add_chain(&mut self, name: &str, positions: &[f32]) -> Result<usize> {
        let chain = ChainRig::with_config(&mut self.scene, None, name, positions, self.config.clone())?;
        Ok(self.add_group(Box::new(chain)))
    }

    pub fn group(&self, index: usize) -> Option<&dyn EditorGroup> {
        self.groups.get(index).map(|group| group.as_ref())
    }

    pub fn group_mut(&mut self, index: usize) -> Option<&mut dyn EditorGroup> {
        let group = self.groups.get_mut(index)?;
        Some(group.as_mut())
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    fn group_index(&self, id: GroupId) -> Option<usize> {
        self.groups.iter().position(|group| group.group().id() == id)
    }

    // ========================================
    // 状态
    // ========================================

    pub fn resize(&mut self, viewport: Vec2) {
        self.viewport = viewport;
        self.camera.aspect = aspect(viewport);
        self.update_pending = true;
    }

    pub fn viewport(&self) -> Vec2 {
        self.viewport
    }

    pub fn mode(&self) -> PointerMode {
        self.mode
    }

    /// 当前焦点 (group 索引, 骨骼)
    pub fn focus(&self) -> Option<(usize, BoneId)> {
        self.focus.map(|focus| (focus.group, focus.bone))
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn update_pending(&self) -> bool {
        self.update_pending
    }

    /// 请求一次更新（外部相机移动等）
    pub fn request_update(&mut self) {
        self.update_pending = true;
    }

    // ========================================
    // 指针
    // ========================================

    pub fn press(&mut self, pixel: Vec2) -> Result<PointerMode> {
        let ray = self.camera.ray_from_pixel(pixel, self.viewport);
        self.press_ray(&ray)
    }

    /// 按下：命中骨骼则抓取并切换焦点，否则进入相机模式
    pub fn press_ray(&mut self, ray: &Ray) -> Result<PointerMode> {
        // 最新的按下优先
        self.release_drag();
        self.update_pending = true;

        let target = self.scene.intersect(ray).and_then(|hit| match self.scene.link(hit.node) {
            NodeLink::Bone { group, bone } => self.group_index(group).map(|index| (index, bone, hit.point)),
            _ => None,
        });

        let Some((index, bone, point)) = target else {
            self.mode = PointerMode::Camera;
            return Ok(self.mode);
        };

        let plane = match self.groups[index].grab(&mut self.scene, bone, point, ray) {
            Ok(plane) => plane,
            Err(err) => {
                self.mode = PointerMode::Idle;
                return Err(err);
            }
        };
        self.set_focus(Focus { group: index, bone });
        self.drag = Some(ActiveDrag { group: index, plane });
        self.mode = PointerMode::Dragging;

        log::debug!("[Session] 按下: group {} 骨骼 {}", index, bone.0);
        Ok(self.mode)
    }

    pub fn pointer_move(&mut self, pixel: Vec2) {
        let ray = self.camera.ray_from_pixel(pixel, self.viewport);
        self.pointer_move_ray(&ray);
    }

    /// 拖拽时把射线投影到工作平面，作为抓取器的新目标
    pub fn pointer_move_ray(&mut self, ray: &Ray) -> Option<Vec3> {
        match self.mode {
            PointerMode::Dragging => {
                let drag = self.drag?;
                let target = drag.plane.project(ray)?;
                self.groups[drag.group].group_mut().drag_to(target);
                self.update_pending = true;
                Some(target)
            }
            PointerMode::Camera => {
                self.update_pending = true;
                None
            }
            PointerMode::Idle => None,
        }
    }

    /// 松开：总是释放当前拖拽
    pub fn release(&mut self) -> bool {
        let released = self.release_drag();
        self.mode = PointerMode::Idle;
        self.update_pending = true;
        released
    }

    fn release_drag(&mut self) -> bool {
        match self.drag.take() {
            Some(drag) => self.groups[drag.group].release(),
            None => false,
        }
    }

    fn set_focus(&mut self, focus: Focus) {
        if self.focus == Some(focus) {
            return;
        }
        if let Some(old) = self.focus.take() {
            if let Some(group) = self.groups.get_mut(old.group) {
                group.group_mut().set_color_state(old.bone, ColorState::Default);
            }
        }
        if let Some(group) = self.groups.get_mut(focus.group) {
            group.group_mut().set_color_state(focus.bone, ColorState::Highlighted);
        }
        self.focus = Some(focus);
    }

    // ========================================
    // 更新
    // ========================================

    /// 一次更新：步进物理 → 同步可视 → 判定是否继续
    ///
    /// 没有待处理的更新时直接返回。
    pub fn update(&mut self) -> UpdateReport {
        if !self.update_pending {
            return UpdateReport {
                stepped: false,
                max_velocity: 0.0,
                next: NextUpdate::Idle,
            };
        }

        let dt = self.config.step_dt;
        let iterations = self.solver_iterations();
        let mut max_velocity: f32 = 0.0;
        for group in self.groups.iter_mut() {
            group.group_mut().step(dt, iterations);
            group.group().sync_visual_from_bodies(&mut self.scene);
            group.after_sync(&self.scene);
            max_velocity = max_velocity.max(group.group().max_velocity());
        }

        self.update_pending = max_velocity > self.config.idle_velocity_threshold;
        let next = if self.update_pending {
            NextUpdate::After(Duration::from_millis(self.config.resettle_interval_ms))
        } else {
            NextUpdate::Idle
        };

        if self.config.debug_log {
            log::debug!("[Session] 更新: 最大速度 {:.4}, 下一次 {:?}", max_velocity, next);
        }

        UpdateReport {
            stepped: true,
            max_velocity,
            next,
        }
    }

    /// 按住拖拽时用更多的求解迭代，拉过可达范围时骨架才能停稳
    fn solver_iterations(&self) -> usize {
        if self.drag.is_some() {
            self.config.solver_iterations.max(self.config.drag_solver_iterations)
        } else {
            self.config.solver_iterations
        }
    }

    /// 连续更新直到静止或达到次数上限，返回实际步进次数
    pub fn settle(&mut self, max_updates: usize) -> usize {
        let mut steps = 0;
        while steps < max_updates && self.update().stepped {
            steps += 1;
        }
        steps
    }
}

fn aspect(viewport: Vec2) -> f32 {
    if viewport.y > 0.0 {
        viewport.x / viewport.y
    } else {
        1.0
    }
}
