//! 无界面演示：装配一个生物，脚本化地拖动胸口再松开，直到骨架静止
//!
//! 运行：`RUST_LOG=debug cargo run --features demo --bin rig_demo`

use glam::{Vec2, Vec3};

use rig_engine::{CreatureConfig, EditorSession, NextUpdate, PointerMode};

const VIEWPORT: Vec2 = Vec2::new(1280.0, 720.0);
const MAX_UPDATES: usize = 500;

fn main() {
    env_logger::init();

    let mut session = EditorSession::new(VIEWPORT);
    let creature = match session.add_creature("creature", CreatureConfig::default()) {
        Ok(index) => index,
        Err(err) => {
            log::error!("[Demo] 装配失败: {}", err);
            return;
        }
    };
    let settled = session.settle(MAX_UPDATES);
    log::info!("[Demo] 初始静止用了 {} 次更新", settled);

    // 从相机视角按下胸口
    let chest = Vec3::new(0.0, 1.6875, 0.0);
    let pixel = session.camera.pixel_from_world(chest, VIEWPORT);
    match session.press(pixel) {
        Ok(PointerMode::Dragging) => log::info!("[Demo] 抓住骨骼 {:?}", session.focus()),
        Ok(mode) => {
            log::warn!("[Demo] 没有命中骨骼 (模式 {:?})", mode);
            return;
        }
        Err(err) => {
            log::error!("[Demo] 抓取失败: {}", err);
            return;
        }
    }

    // 向右上方拖动
    for i in 1..=10 {
        let offset = Vec2::new(8.0, -4.0) * i as f32;
        session.pointer_move(pixel + offset);
        let report = session.update();
        log::info!("[Demo] 拖动 {:2}: 最大速度 {:.4}", i, report.max_velocity);
    }

    session.release();

    let mut updates = 0;
    while updates < MAX_UPDATES {
        let report = session.update();
        if !report.stepped {
            break;
        }
        updates += 1;
        if report.next == NextUpdate::Idle {
            log::info!("[Demo] 松开后 {} 次更新静止", updates);
            break;
        }
    }

    if let Some(group) = session.group(creature) {
        for bone in group.group().bones().iter().filter(|bone| bone.length > 0.0) {
            let p = session.scene.world_position(bone.node);
            println!("{:>10}  ({:+.3}, {:+.3}, {:+.3})", bone.name, p.x, p.y, p.z);
        }
    }
}
