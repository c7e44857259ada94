use clap::{Parser, Subcommand, ValueEnum};
use picframe::{DisplayDriver, FbiConfig, FbiDriver, HeadlessDriver, Reconciler, Rotation};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt};

mod web;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8000;

#[derive(Parser, Debug)]
#[command(name = "picframe", about = "Picture frame control panel")]
struct Args {
    /// Directory holding uploads/, display.png and the saved selection
    #[arg(long, env = "PICFRAME_DATA_DIR", default_value = ".", global = true)]
    data_dir: PathBuf,

    /// How the physical display is driven
    #[arg(long, value_enum, env = "PICFRAME_DRIVER", default_value_t = DriverKind::Fbi, global = true)]
    driver: DriverKind,

    /// Framebuffer viewer binary
    #[arg(long, env = "PICFRAME_VIEWER", default_value = "fbi", global = true)]
    viewer: String,

    /// Virtual console the viewer takes over
    #[arg(long, env = "PICFRAME_TTY", default_value_t = 1, global = true)]
    tty: u8,

    #[arg(long, env = "PICFRAME_FB_DEVICE", default_value = "/dev/fb0", global = true)]
    fb_device: PathBuf,

    /// Run display commands without sudo
    #[arg(long, global = true)]
    no_sudo: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DriverKind {
    Fbi,
    Headless,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Restore the last image and serve the web panel (default)
    Serve {
        #[arg(long, env = "PICFRAME_HOST", default_value = DEFAULT_HOST)]
        host: String,
        #[arg(short, long, env = "PICFRAME_PORT", default_value_t = DEFAULT_PORT)]
        port: u16,
    },
    /// Show a stored image once and exit
    Show {
        #[arg(value_name = "FILENAME")]
        filename: String,
        /// Counter-clockwise rotation: 0, 90, 180 or 270
        #[arg(short, long, default_value = "0")]
        rotate: Rotation,
    },
    /// Stop the viewer and delete every stored image
    Purge,
    /// List stored images; the current one is marked with `*`
    List,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info,axum::rejection=trace"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();

    let args = Args::parse();
    if let Err(err) = run(args) {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> picframe::Result<()> {
    let mut panel = Reconciler::open(&args.data_dir, create_driver(&args))?;

    let command = args.command.unwrap_or(Command::Serve {
        host: DEFAULT_HOST.to_string(),
        port: DEFAULT_PORT,
    });
    match command {
        Command::Serve { host, port } => serve(host, port, panel),
        Command::Show { filename, rotate } => {
            panel.show(&filename, rotate)?;
            println!("Displaying {filename} at {rotate}°");
            Ok(())
        }
        Command::Purge => {
            let removed = panel.purge()?;
            println!("Purged {removed} image(s)");
            Ok(())
        }
        Command::List => {
            let view = panel.view();
            for name in &view.images {
                let mark = if view.current.as_deref() == Some(name.as_str()) { '*' } else { ' ' };
                println!("{mark} {name}");
            }
            println!("rotation: {}°", view.rotation);
            Ok(())
        }
    }
}

fn create_driver(args: &Args) -> Box<dyn DisplayDriver> {
    match args.driver {
        DriverKind::Fbi => Box::new(FbiDriver::new(FbiConfig {
            viewer: args.viewer.clone(),
            tty: args.tty,
            device: args.fb_device.clone(),
            use_sudo: !args.no_sudo,
            ..FbiConfig::default()
        })),
        DriverKind::Headless => Box::new(HeadlessDriver::new()),
    }
}

#[cfg(feature = "web")]
fn serve(host: String, port: u16, panel: Reconciler) -> picframe::Result<()> {
    web::run_server(host, port, panel)
}

#[cfg(not(feature = "web"))]
fn serve(_host: String, _port: u16, _panel: Reconciler) -> picframe::Result<()> {
    Err(std::io::Error::other("built without the `web` feature").into())
}
