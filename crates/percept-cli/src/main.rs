use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use percept_hw::{CameraStream, DeviceMap, FacingMode};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "percept", about = "Percept visual-recognition overlay CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show daemon status
    Status,
    /// Show the current ranked detection list
    Detections,
    /// Switch between the user- and environment-facing cameras
    Toggle,
    /// Clear the detection list
    Clear,
    /// List available capture devices
    Devices,
    /// Run camera diagnostics (bypasses the daemon)
    Test {
        /// Facing mode to open
        #[arg(short, long, default_value = "user")]
        facing: FacingMode,
        /// Device path override (e.g., /dev/video0)
        #[arg(short, long)]
        device: Option<String>,
        /// Save the last captured frame as PNG
        #[arg(short, long)]
        save: Option<String>,
    },
}

#[zbus::proxy(
    interface = "org.freedesktop.Percept1",
    default_service = "org.freedesktop.Percept1",
    default_path = "/org/freedesktop/Percept1"
)]
trait Percept {
    fn toggle_facing(&self) -> zbus::Result<String>;
    fn clear_detections(&self) -> zbus::Result<()>;
    fn detections(&self) -> zbus::Result<String>;
    fn state(&self) -> zbus::Result<String>;
    fn status(&self) -> zbus::Result<String>;
}

async fn proxy() -> Result<PerceptProxy<'static>> {
    let conn = zbus::Connection::session()
        .await
        .context("failed to connect to the session bus")?;
    PerceptProxy::new(&conn)
        .await
        .context("is perceptd running?")
}

/// Re-serialize a JSON payload for human eyes.
fn pretty(json: &str) -> String {
    serde_json::from_str::<serde_json::Value>(json)
        .and_then(|v| serde_json::to_string_pretty(&v))
        .unwrap_or_else(|_| json.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Status => {
            println!("{}", pretty(&proxy().await?.status().await?));
        }
        Commands::Detections => {
            let raw = proxy().await?.detections().await?;
            let detections: serde_json::Value = serde_json::from_str(&raw)?;
            let Some(list) = detections.as_array() else {
                println!("{raw}");
                return Ok(());
            };
            if list.is_empty() {
                println!("No detections");
                return Ok(());
            }
            for d in list {
                println!(
                    "{:>5.1}%  {:<7}  {}",
                    d["confidence"].as_f64().unwrap_or(0.0) * 100.0,
                    d["kind"].as_str().unwrap_or("?"),
                    d["label"].as_str().unwrap_or("?"),
                );
            }
        }
        Commands::Toggle => {
            println!("{}", pretty(&proxy().await?.toggle_facing().await?));
        }
        Commands::Clear => {
            proxy().await?.clear_detections().await?;
            println!("Detections cleared");
        }
        Commands::Devices => {
            let devices = percept_hw::list_devices();
            if devices.is_empty() {
                println!("No capture devices found");
            }
            for d in devices {
                println!("{}  {} ({}, {})", d.path, d.name, d.driver, d.bus);
            }
        }
        Commands::Test {
            facing,
            device,
            save,
        } => run_camera_test(facing, device, save)?,
    }

    Ok(())
}

/// Open a camera directly and report what it delivers.
fn run_camera_test(
    facing: FacingMode,
    device: Option<String>,
    save: Option<String>,
) -> Result<()> {
    let path = match device {
        Some(path) => path,
        None => DeviceMap::default()
            .resolve(facing, &percept_hw::list_devices())
            .with_context(|| format!("no capture device for facing mode {facing}"))?,
    };

    println!("Opening {path} ({facing})...");
    let stream = CameraStream::open(&path, facing, 1080, 1920)?;
    println!("Negotiated {}x{}", stream.width, stream.height);

    // Let the capture thread run briefly, then sample.
    std::thread::sleep(Duration::from_secs(2));
    let Some(frame) = stream.latest_frame() else {
        stream.stop();
        anyhow::bail!("no frame delivered within 2s");
    };
    println!(
        "Captured frame: {}x{}, sequence {}",
        frame.width, frame.height, frame.sequence
    );

    if let Some(out) = save {
        let img = image::RgbImage::from_raw(frame.width, frame.height, frame.data)
            .context("frame buffer does not match its dimensions")?;
        img.save(&out).with_context(|| format!("failed to save {out}"))?;
        println!("Saved {out}");
    }

    stream.stop();
    Ok(())
}
