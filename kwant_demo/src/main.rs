use std::sync::Arc;

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use kwant::ash::vk;
use kwant::bootstrap::{EngineSettings, GameInfo, GraphicsSettings, WindowSettings};
use kwant::core::Engine;
use kwant::device::QueueRole;
use kwant::driver::AshDriver;
use kwant::wsi::WinitWindowSystem;

/// Whether to enable validation layers or not
const VALIDATION: bool = cfg!(debug_assertions);

fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let settings = EngineSettings::default()
        .with_game_info(GameInfo::new("Kwant demo", 1))
        .with_validation(VALIDATION)
        .with_window(WindowSettings::normal(
            glam::UVec2::new(1280, 720),
            true,
            "Kwant",
        ))
        .with_graphics(GraphicsSettings::triple_buffering(None));
    let driver = Arc::new(AshDriver::new()?);
    let mut engine = Engine::new(settings, driver, WinitWindowSystem::new()?);

    let transfer = engine.queue(QueueRole::Transfer).priority(0.5).submit();
    let graphics = engine.queue(QueueRole::Graphics).submit();
    transfer.subscribe(|queue| tracing::info!("Transfer queue ready: {:?}", queue.info()));
    graphics.subscribe(|queue| tracing::info!("Graphics queue ready: {:?}", queue.info()));

    // Shaders are optional, the demo still opens a window without them
    let shaders = std::env::args().nth(1).map(std::path::PathBuf::from);
    if let Some(dir) = shaders {
        let vertex = engine
            .shader(dir.join("triangle.vert.spv"))?
            .stage(vk::ShaderStageFlags::VERTEX)
            .build();
        let fragment = engine
            .shader(dir.join("triangle.frag.spv"))?
            .stage(vk::ShaderStageFlags::FRAGMENT)
            .build();
        engine
            .pipeline()
            .shader(&vertex)
            .shader(&fragment)
            .color_attachment(vk::Format::B8G8R8A8_SRGB)
            .build()
            .subscribe(|pipeline| match pipeline {
                Ok(_) => tracing::info!("Triangle pipeline ready"),
                Err(error) => tracing::error!("Triangle pipeline failed: {error}"),
            });
    }

    let result = engine.start().and_then(|_| engine.run());
    let cleanup = engine.cleanup();
    result?;
    cleanup?;
    Ok(())
}
