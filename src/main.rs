//! VRLink daemon
//!
//! Binds the protocol server, wires logging-only listeners and waits for
//! Ctrl-C. Scene content normally comes from a producer embedding the
//! library; the optional demo scene publishes one textured quad so a client
//! can be pointed at a bare daemon and see something.

use std::env;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use vrlink::config::AppConfig;
use vrlink::error::{Error, Result};
use vrlink::interaction::{KeyboardDelta, PoseSnapshot};
use vrlink::mesh::{Mesh, Vertex};
use vrlink::server::VrServer;
use vrlink::tex::{Texture, TextureStage};

/// Parse the config path from command line arguments.
///
/// Supports:
/// - `vrlink <path>` (positional)
/// - `vrlink --config <path>` (flag-based)
/// - `vrlink -c <path>` (short flag)
///
/// Defaults to `/etc/vrlink.toml` if not specified.
fn parse_config_path() -> String {
    let args: Vec<String> = env::args().collect();

    for i in 1..args.len() {
        if (args[i] == "--config" || args[i] == "-c") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }

    if args.len() > 1 && !args[1].starts_with('-') {
        return args[1].clone();
    }

    "/etc/vrlink.toml".to_string()
}

fn main() -> Result<()> {
    let config_path = parse_config_path();
    let config = if Path::new(&config_path).exists() {
        AppConfig::from_file(&config_path)?
    } else {
        AppConfig::default()
    };

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&config.logging.level),
    )
    .init();

    log::info!("VRLink v{} starting...", env!("CARGO_PKG_VERSION"));
    if Path::new(&config_path).exists() {
        log::info!("Using config: {config_path}");
    } else {
        log::info!("No config at {config_path}, using built-in defaults");
    }

    let mut server = VrServer::bind(&config.network.bind_address)?;

    let title = config.app.title.clone();
    server.listeners().add_info(move || title.clone());
    server.listeners().add_status(|connected: bool| {
        if connected {
            log::info!("VR client connected");
        }
    });
    server.listeners().add_interaction(|pose: &PoseSnapshot| {
        log::debug!(
            "pose: helmet at {:?}, buttons L={:#04x} R={:#04x}",
            pose.helmet_position,
            pose.left_buttons,
            pose.right_buttons
        );
    });
    server.listeners().add_keyboard(|delta: &KeyboardDelta| {
        log::debug!(
            "keyboard: {} down, {} up",
            delta.pressed.len(),
            delta.released.len()
        );
    });
    server.listeners().add_fault(|fault: &Error| {
        log::warn!("connection fault: {fault}");
    });

    if config.app.demo_scene {
        server.publish_mesh(demo_quad()?);
        log::info!("Demo scene queued");
    }

    server.start()?;
    log::info!("VRLink running on {}. Press Ctrl-C to stop.", server.local_addr());

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })
    .map_err(|e| std::io::Error::other(format!("Error setting Ctrl-C handler: {e}")))?;

    while running.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_millis(100));
    }

    server.stop();
    log::info!("VRLink stopped");
    Ok(())
}

/// One checkered quad facing the default viewing direction.
fn demo_quad() -> Result<Arc<Mesh>> {
    let mut pixels = Vec::with_capacity(8 * 8 * 4);
    for y in 0..8u32 {
        for x in 0..8u32 {
            let shade = if (x + y) % 2 == 0 { 0xF0 } else { 0x20 };
            pixels.extend_from_slice(&[shade, shade, shade, 0xFF]);
        }
    }
    let texture = Arc::new(Texture::from_rgba(8, 8, pixels)?);

    let mut mesh = Mesh::new();
    let corners = [
        (-0.5, 0.5, [0.0, 1.0]),
        (-0.5, 1.5, [0.0, 0.0]),
        (0.5, 1.5, [1.0, 0.0]),
        (0.5, 0.5, [1.0, 1.0]),
    ];
    let indices: Vec<i32> = corners
        .iter()
        .map(|(x, y, uv)| {
            mesh.add_vertex(
                Vertex::at(*x, *y, 2.0)
                    .with_normal(0.0, 0.0, -1.0)
                    .with_uv(uv[0], uv[1]),
            )
        })
        .collect();
    mesh.add_triangle(indices[0], indices[2], indices[1]);
    mesh.add_triangle(indices[0], indices[3], indices[2]);
    mesh.set_texture(TextureStage::Diffuse, texture);
    Ok(Arc::new(mesh))
}
