mod collectors;
mod control;
mod poll;
mod util;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use collectors::mdstat;
use control::{SpeedLevel, SyncAction};
use std::io;
use std::time::Duration;
use util::progress::render_bar;

#[derive(Parser, Debug)]
#[command(
    name = "raidctl",
    about = "Control Linux md-RAID check speed and reboot safely after a check",
    version = "0.1"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Set the RAID check speed limit to normal
    Normal,
    /// Set the RAID check speed limit to high
    High {
        /// Minutes to hold high speed before reverting to normal
        minutes: Option<u64>,
    },
    /// Set the RAID check speed limit to low
    Low,
    /// Stop the running RAID check
    Stop,
    /// Start a RAID check
    Start,
    /// Print the number of arrays currently being checked
    Check,
    /// Show check progress as a bar plus a time estimate
    Progress,
    /// Reboot the machine once the RAID check is done
    Reboot,
    /// Stop the RAID check and reboot
    Forcereboot,
    /// Print the status block only
    Status {
        /// Emit a machine-readable JSON snapshot instead
        #[arg(long)]
        json: bool,
    },
    /// Generate a shell completion script on stdout
    Completions { shell: Shell },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None => run_status(true),
        Some(Command::Normal) => run_set_speed(SpeedLevel::Normal),
        Some(Command::High { minutes }) => run_high(minutes),
        Some(Command::Low) => run_set_speed(SpeedLevel::Low),
        Some(Command::Stop) => run_sync_action(SyncAction::Idle, "Stopping raid check"),
        Some(Command::Start) => run_sync_action(SyncAction::Check, "Starting raid check"),
        Some(Command::Check) => run_check(),
        Some(Command::Progress) => run_progress(),
        Some(Command::Reboot) => run_reboot(false),
        Some(Command::Forcereboot) => run_reboot(true),
        Some(Command::Status { json: true }) => run_json_status(),
        Some(Command::Status { json: false }) => run_status(false),
        Some(Command::Completions { shell }) => run_completions(shell),
    }
}

fn run_set_speed(level: SpeedLevel) -> Result<()> {
    println!("Setting raid check to {} speed", level.label());
    control::set_speed(control::SPEED_LIMIT_PATH, level)
}

fn run_high(minutes: Option<u64>) -> Result<()> {
    run_set_speed(SpeedLevel::High)?;

    if let Some(minutes) = minutes {
        println!("for {} minutes", minutes);
        std::thread::sleep(Duration::from_secs(minutes * 60));
        run_set_speed(SpeedLevel::Normal)?;
    }
    Ok(())
}

fn run_sync_action(action: SyncAction, message: &str) -> Result<()> {
    println!("{}", message);
    control::set_sync_action(control::SYNC_ACTION_PATH, action)
}

fn run_check() -> Result<()> {
    let snap = mdstat::read_status(control::MDSTAT_PATH)?;
    println!("{}", snap.active_checks);
    Ok(())
}

fn run_progress() -> Result<()> {
    let snap = mdstat::read_status(control::MDSTAT_PATH)?;
    match snap.progress_pct {
        Some(pct) => {
            println!("{}", render_bar(pct, 50));
            if let Some(eta) = &snap.time_remaining {
                println!("Time left {}", eta);
            }
        }
        None => println!("no check in progress"),
    }
    Ok(())
}

fn run_reboot(forced: bool) -> Result<()> {
    if forced {
        control::set_sync_action(control::SYNC_ACTION_PATH, SyncAction::Idle)?;
    }
    poll::wait_and_reboot(
        &mut poll::MdstatFile,
        std::thread::sleep,
        poll::reboot_host,
        true,
    )
}

fn run_status(with_help: bool) -> Result<()> {
    let snap = mdstat::read_status(control::MDSTAT_PATH)?;
    let raw_speed = control::current_speed(control::SPEED_LIMIT_PATH)?;

    println!("############################");
    if snap.active_checks > 0 {
        println!("# Currently Checking Raid  #");
        if let Some(eta) = &snap.time_remaining {
            println!("# Time left {:<14} #", eta);
        }
    }
    match SpeedLevel::from_raw(&raw_speed) {
        Some(SpeedLevel::Normal) => println!("# Speed Normal             #"),
        Some(SpeedLevel::High)   => println!("# Speed High               #"),
        Some(SpeedLevel::Low)    => println!("# Speed Low                #"),
        None                     => println!("# Speed {:<18} #", raw_speed),
    }
    println!("############################");

    if with_help {
        println!("Available commands:");
        println!("check       - Print the number of arrays being checked");
        println!("progress    - Show check progress and time left");
        println!("normal      - Set speed normal");
        println!("high        - Set speed high, optionally for N minutes");
        println!("low         - Set speed low");
        println!("reboot      - Reboot the machine once the raid check is done");
        println!("forcereboot - Stop raid check and reboot");
        println!("stop        - Stop raid check");
        println!("start       - Start raid check");
        println!("status      - Print this status block only (--json for machine output)");
    }
    Ok(())
}

fn run_json_status() -> Result<()> {
    let snap = mdstat::read_status(control::MDSTAT_PATH)?;
    let raw_speed = control::current_speed(control::SPEED_LIMIT_PATH)?;

    let snapshot = serde_json::json!({
        "timestamp": chrono::Local::now().to_rfc3339(),
        "status": snap,
        "speed_limit": raw_speed,
        "speed_level": SpeedLevel::from_raw(&raw_speed).map(SpeedLevel::label),
    });
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

fn run_completions(shell: Shell) -> Result<()> {
    clap_complete::generate(shell, &mut Cli::command(), "raidctl", &mut io::stdout());
    Ok(())
}
