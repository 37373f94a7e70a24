use clap::Parser;
use client::config::ClientConfig;
use client::input::InputManager;
use client::rendering::Renderer;
use client::session::{unix_now, GameClient};
use client::transport::WsConnector;
use log::{error, info};
use macroquad::prelude::*;
use shared::{DEFAULT_SERVER_URL, RECONNECT_DELAY_MS};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// WebSocket URL of the game server
    #[arg(short = 's', long, default_value = DEFAULT_SERVER_URL)]
    server: String,

    /// Authentication token passed to the server
    #[arg(short = 't', long)]
    token: Option<String>,

    /// Delay between reconnection attempts in milliseconds
    #[arg(long, default_value_t = RECONNECT_DELAY_MS)]
    reconnect_delay_ms: u64,

    /// Window width
    #[arg(short = 'w', long, default_value = "1024")]
    width: i32,

    /// Window height (no short flag to avoid conflict with --help)
    #[arg(long, default_value = "768")]
    height: i32,
}

impl Args {
    fn client_config(&self) -> ClientConfig {
        let config = ClientConfig::new(self.server.clone())
            .with_reconnect_delay(Duration::from_millis(self.reconnect_delay_ms));
        match &self.token {
            Some(token) => config.with_token(token.clone()),
            None => config,
        }
    }
}

fn window_conf() -> Conf {
    let args = Args::parse();
    Conf {
        window_title: "Minesweeper".to_owned(),
        window_width: args.width,
        window_height: args.height,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    if let Err(e) = run(args).await {
        error!("Client error: {}", e);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    // The window loop owns the main thread; network tasks run on this runtime
    let runtime = tokio::runtime::Runtime::new()?;
    let _guard = runtime.enter();

    info!("Starting client...");
    info!("Connecting to: {}", args.server);
    info!("Controls: left click to reveal, right click to flag, Esc to quit");

    let mut client = GameClient::new(args.client_config(), WsConnector)?;
    let mut input_manager = InputManager::new();
    let mut renderer = Renderer::new(args.width.max(0) as usize, args.height.max(0) as usize);

    client.start();

    loop {
        client.tick();

        renderer.resize(screen_width(), screen_height());
        let layout = client.board().map(|board| renderer.layout(board));

        let input = input_manager.update(layout.as_ref());
        if input.quit {
            break;
        }
        if let Some(intent) = input.intent {
            client.submit(intent);
        }

        renderer.render(&client, unix_now());
        next_frame().await;
    }

    client.shutdown();
    info!("Client stopped");
    Ok(())
}
