//! Ergodesk Agent CLI
//!
//! Client-side controller for backend-managed sit/stand desks.

use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use crossbeam_channel::Receiver;
use ergodesk_agent::{
    backend::{BackendClient, BackendConfig, BlockingBackendClient},
    config::Config,
    controller::DeskController,
    core::evaluate,
    events::{self, StatusLevel, UiEvent},
    VERSION,
};
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "ergodesk")]
#[command(author = "Ergodesk")]
#[command(version = VERSION)]
#[command(about = "Client-side controller for backend-managed sit/stand desks", long_about = None)]
struct Cli {
    /// Backend base URL (overrides the config file)
    #[arg(long, global = true)]
    backend_url: Option<String>,

    /// CSRF token for mutating calls (overrides the config file)
    #[arg(long, global = true)]
    csrf_token: Option<String>,

    /// Body height in cm used to derive targets (overrides the config file)
    #[arg(long, global = true)]
    user_height: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show live status for one desk, or bulk occupancy for all desks
    Status {
        /// Desk to query; omit for the occupancy overview
        desk_id: Option<String>,
    },

    /// Pair with a desk
    Pair { desk_id: String },

    /// Unpair from the currently paired desk
    Unpair,

    /// Move a desk to a height and wait for it to arrive
    Move {
        desk_id: String,
        /// Target height in cm
        height: i64,

        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },

    /// Show the ergonomic recommendation for a height
    Recommend {
        /// Desk height in cm
        height: i64,
    },

    /// Interactive session: recommendations, sitting reminder, move control
    Watch { desk_id: String },

    /// Manage desks (admin)
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },

    /// Show configuration
    Config,
}

#[derive(Subcommand)]
enum AdminAction {
    /// List registered desks
    List,
    /// Register a new desk
    Add { name: String },
    /// Remove a desk
    Remove { desk_id: String },
}

fn main() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let cli = Cli::parse();
    let config = effective_config(&cli);

    match cli.command {
        Commands::Status { desk_id } => cmd_status(&config, desk_id.as_deref()),
        Commands::Pair { desk_id } => cmd_pair(&config, &desk_id),
        Commands::Unpair => cmd_unpair(&config),
        Commands::Move {
            desk_id,
            height,
            yes,
        } => cmd_move(&config, &desk_id, height, yes),
        Commands::Recommend { height } => cmd_recommend(&config, height),
        Commands::Watch { desk_id } => cmd_watch(&config, &desk_id),
        Commands::Admin { action } => cmd_admin(&config, action),
        Commands::Config => cmd_config(&config),
    }
}

/// Config file with CLI overrides applied.
fn effective_config(cli: &Cli) -> Config {
    let mut config = Config::load().unwrap_or_default();
    if let Some(url) = &cli.backend_url {
        config.backend_url = url.clone();
    }
    if let Some(token) = &cli.csrf_token {
        config.csrf_token = token.clone();
    }
    if let Some(height) = cli.user_height {
        config.user_height_cm = height;
    }
    config
}

fn blocking_client(config: &Config) -> BlockingBackendClient {
    let backend_config = BackendConfig::new(&config.backend_url, &config.csrf_token);
    match BlockingBackendClient::new(backend_config) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_status(config: &Config, desk_id: Option<&str>) {
    let client = blocking_client(config);

    match desk_id {
        Some(desk_id) => match client.desk_status(desk_id) {
            Ok(status) => {
                println!("Desk {desk_id}");
                println!("  Paired: {}", if status.is_paired { "yes" } else { "no" });
                if let Some(height) = status.current_height {
                    println!("  Height: {height}cm");
                }
                if let Some(moving) = status.is_moving {
                    println!("  Moving: {}", if moving { "yes" } else { "no" });
                }
            }
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        },
        None => match client.desks_status() {
            Ok(map) => {
                if map.is_empty() {
                    println!("No desks are occupied.");
                    return;
                }
                let mut entries: Vec<_> = map.into_iter().collect();
                entries.sort_by(|a, b| a.0.cmp(&b.0));
                for (desk_id, occupant) in entries {
                    println!("{desk_id}: occupied by {}", occupant.user);
                }
            }
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        },
    }
}

fn cmd_pair(config: &Config, desk_id: &str) {
    let client = blocking_client(config);
    match client.pair(desk_id) {
        Ok(resp) => {
            println!("{}", resp.message);
            if !resp.success {
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("Pair request failed: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_unpair(config: &Config) {
    let client = blocking_client(config);
    match client.unpair() {
        Ok(resp) => {
            println!("{}", resp.message);
            if !resp.success {
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("Unpair request failed: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_move(config: &Config, desk_id: &str, height: i64, yes: bool) {
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to create runtime: {e}");
            std::process::exit(1);
        }
    };

    let (tx, rx) = events::channel();
    let backend = BackendClient::new(BackendConfig::new(&config.backend_url, &config.csrf_token));
    let controller = DeskController::new(backend, config, tx);

    let paired = runtime.block_on(async {
        controller.select_desk(desk_id).await;
        controller.is_paired(desk_id).await
    });
    drain_events(&rx);

    if !paired {
        eprintln!("Desk {desk_id} is not paired. Run `ergodesk pair {desk_id}` first.");
        std::process::exit(1);
    }

    runtime.block_on(controller.request_move(height));

    if !yes {
        print!("Move desk {desk_id} to {height}cm? [y/N] ");
        use std::io::Write;
        let _ = std::io::stdout().flush();
        let mut answer = String::new();
        if std::io::stdin().read_line(&mut answer).is_err()
            || !answer.trim().eq_ignore_ascii_case("y")
        {
            runtime.block_on(controller.cancel_move());
            println!("Cancelled.");
            return;
        }
    }

    runtime.block_on(controller.confirm_move());

    // The poll loop runs on the runtime's workers; relay its events until
    // the terminal status banner lands.
    let mut failed = false;
    loop {
        match rx.recv_timeout(Duration::from_secs(75)) {
            Ok(UiEvent::OverlayShown { text }) => println!("{text}"),
            Ok(UiEvent::Status(banner)) => {
                println!("[{}] {}", banner.level.as_str(), banner.message);
                failed = banner.level == StatusLevel::Error;
                break;
            }
            Ok(_) => {}
            Err(_) => {
                eprintln!("No response from movement monitor");
                failed = true;
                break;
            }
        }
    }

    // pick up the trailing height sync, if any
    while let Ok(event) = rx.recv_timeout(Duration::from_millis(200)) {
        if let UiEvent::HeightSynced { height_cm } = event {
            println!("Height now {height_cm}cm");
            break;
        }
    }

    runtime.block_on(controller.shutdown());
    if failed {
        std::process::exit(1);
    }
}

fn cmd_recommend(config: &Config, height: i64) {
    let targets = config.targets();
    println!("Targets for body height {}cm:", config.user_height_cm);
    println!(
        "  Sitting: {}cm (±{}cm)",
        targets.sitting_height_cm, targets.margin_cm
    );
    println!(
        "  Standing: {}cm (±{}cm)",
        targets.standing_height_cm, targets.margin_cm
    );
    println!();

    let rec = evaluate(height, &targets);
    println!("At {height}cm: {}", rec.message);
    match rec.dismiss_label {
        Some(dismiss) => println!("  Actions: {} / {}", rec.accept_label, dismiss),
        None => println!("  Action: {}", rec.accept_label),
    }
}

fn cmd_watch(config: &Config, desk_id: &str) {
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to create runtime: {e}");
            std::process::exit(1);
        }
    };

    let (tx, rx) = events::channel();
    let backend = BackendClient::new(BackendConfig::new(&config.backend_url, &config.csrf_token));
    let controller = DeskController::new(backend, config, tx);

    let targets = controller.targets();
    println!("Ergodesk Agent v{VERSION}");
    println!(
        "Targets: sitting {}cm, standing {}cm (±{}cm)",
        targets.sitting_height_cm, targets.standing_height_cm, targets.margin_cm
    );
    println!();
    print_watch_help();
    println!();

    runtime.block_on(async {
        controller.select_desk(desk_id).await;
        controller.start_sitting_ticker().await;
        controller
            .start_status_refresh(Duration::from_secs(config.status_refresh_secs))
            .await;
    });

    // Feed stdin lines through a channel so the main loop can multiplex
    // them with controller events.
    let (line_tx, line_rx) = crossbeam_channel::unbounded::<String>();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if line_tx.send(line).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl+C handler");

    let mut recommendations_on = config.recommendations_enabled;

    while running.load(Ordering::SeqCst) {
        crossbeam_channel::select! {
            recv(rx) -> event => match event {
                Ok(event) => print_event(&event),
                Err(_) => break,
            },
            recv(line_rx) -> line => match line {
                Ok(line) => {
                    let keep_going = handle_watch_command(
                        &runtime,
                        &controller,
                        line.trim(),
                        &mut recommendations_on,
                    );
                    if !keep_going {
                        running.store(false, Ordering::SeqCst);
                    }
                }
                Err(_) => break,
            },
            default(Duration::from_millis(100)) => {}
        }
    }

    println!();
    println!("Stopping...");
    runtime.block_on(controller.shutdown());
}

fn print_watch_help() {
    println!("Commands:");
    println!("  <height>          set the desk height (cm)");
    println!("  sit / stand       move to the sitting / standing target");
    println!("  a / i             accept / ignore the showing recommendation");
    println!("  y / n             confirm / cancel a requested move");
    println!("  p / u             pair / unpair the selected desk");
    println!("  book START END    book the desk (e.g. 2025-06-02T09:00 2025-06-02T17:00)");
    println!("  toggle            turn recommendations on or off");
    println!("  q                 quit");
}

fn handle_watch_command(
    runtime: &tokio::runtime::Runtime,
    controller: &DeskController,
    input: &str,
    recommendations_on: &mut bool,
) -> bool {
    if input.is_empty() {
        return true;
    }

    if let Ok(height) = input.parse::<i64>() {
        runtime.block_on(controller.height_changed(height));
        return true;
    }

    let targets = controller.targets();
    let mut parts = input.split_whitespace();
    match parts.next().unwrap_or_default() {
        "a" | "accept" => runtime.block_on(controller.accept_popup()),
        "i" | "ignore" => runtime.block_on(controller.dismiss_popup()),
        "y" | "confirm" => runtime.block_on(controller.confirm_move()),
        "n" | "cancel" => runtime.block_on(controller.cancel_move()),
        "p" | "pair" => runtime.block_on(controller.pair()),
        "u" | "unpair" => runtime.block_on(controller.unpair()),
        "sit" => runtime.block_on(controller.profile_selected(targets.sitting_height_cm)),
        "stand" => runtime.block_on(controller.profile_selected(targets.standing_height_cm)),
        "book" => {
            let (start, end) = (parts.next(), parts.next());
            match (
                start.and_then(parse_booking_time),
                end.and_then(parse_booking_time),
            ) {
                (Some(start), Some(end)) => {
                    if let Some(desk_id) = runtime.block_on(controller.selected_desk()) {
                        runtime.block_on(controller.book(&desk_id, start, end));
                    } else {
                        println!("Select a desk first.");
                    }
                }
                _ => println!("Please give start and end as YYYY-MM-DDTHH:MM."),
            }
        }
        "toggle" => {
            *recommendations_on = !*recommendations_on;
            runtime.block_on(controller.set_recommendations_enabled(*recommendations_on));
            println!(
                "Recommendations {}",
                if *recommendations_on { "on" } else { "off" }
            );
        }
        "h" | "help" => print_watch_help(),
        "q" | "quit" => return false,
        other => println!("Unknown command: {other} (try `help`)"),
    }
    true
}

fn parse_booking_time(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M"))
        .ok()
}

fn print_event(event: &UiEvent) {
    match event {
        UiEvent::DeskSelected { desk_id } => println!("Selected desk: {desk_id}"),
        UiEvent::PairingChanged { desk_id, paired } => {
            if *paired {
                println!("Desk {desk_id} is paired; move controls unlocked.");
            } else {
                println!("Desk {desk_id} is not paired.");
            }
        }
        UiEvent::HeightSynced { height_cm } => println!("Height: {height_cm}cm"),
        UiEvent::PopupShown(rec) => {
            println!();
            println!("{}", rec.message);
            match rec.dismiss_label {
                Some(dismiss) => println!("  [a] {}   [i] {}", rec.accept_label, dismiss),
                None => println!("  [a] {}", rec.accept_label),
            }
        }
        UiEvent::PopupDismissed => {}
        UiEvent::ConfirmRequested {
            desk_id,
            target_height_cm,
        } => println!("Move desk {desk_id} to {target_height_cm}cm? [y/n]"),
        UiEvent::OverlayShown { text } => println!("{text}"),
        UiEvent::OverlayHidden => {}
        UiEvent::Status(banner) => println!("[{}] {}", banner.level.as_str(), banner.message),
    }
}

fn drain_events(rx: &Receiver<UiEvent>) {
    for event in rx.try_iter() {
        print_event(&event);
    }
}

fn cmd_admin(config: &Config, action: AdminAction) {
    let client = blocking_client(config);

    match action {
        AdminAction::List => match client.admin_list_desks() {
            Ok(desks) => {
                if desks.is_empty() {
                    println!("No desks registered.");
                    return;
                }
                for desk in desks {
                    println!("{}  {}", desk.id, desk.name);
                }
            }
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        },
        AdminAction::Add { name } => match client.admin_create_desk(&name) {
            Ok(desk) => println!("Created desk {} ({})", desk.name, desk.id),
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        },
        AdminAction::Remove { desk_id } => match client.admin_remove_desk(&desk_id) {
            Ok(()) => println!("Removed desk {desk_id}"),
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        },
    }
}

fn cmd_config(config: &Config) {
    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(config).unwrap_or_else(|_| "Error".to_string())
    );
}
