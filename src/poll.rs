use crate::collectors::mdstat::{self, StatusSnapshot};
use crate::control;
use crate::util::progress::render_bar;
use anyhow::{bail, Context, Result};
use std::time::Duration;

/// Sleep between polls while a check is running.
pub const POLL_INTERVAL: Duration = Duration::from_secs(100);
/// Shorter backoff after a failed status read.
pub const RETRY_INTERVAL: Duration = Duration::from_secs(10);

/// Where the poll loop gets its snapshots. The kernel file in production,
/// a scripted sequence in tests.
pub trait StatusSource {
    fn read(&mut self) -> Result<StatusSnapshot>;
}

/// The real /proc/mdstat.
pub struct MdstatFile;

impl StatusSource for MdstatFile {
    fn read(&mut self) -> Result<StatusSnapshot> {
        mdstat::read_status(control::MDSTAT_PATH)
    }
}

/// Poll until no check is active, then reboot.
///
/// Failed reads are logged and retried forever on the short backoff. Once a
/// read reports idle, one confirmatory re-read closes the race with a check
/// that started in the meantime: a failed re-read is fatal (never reboot on
/// unknown state), a re-read showing a fresh check declines the reboot.
pub fn wait_and_reboot<S, Sleep, Reboot>(
    source: &mut S,
    mut sleep: Sleep,
    reboot: Reboot,
    show_wait_screen: bool,
) -> Result<()>
where
    S: StatusSource,
    Sleep: FnMut(Duration),
    Reboot: FnOnce() -> Result<()>,
{
    loop {
        let snap = match source.read() {
            Ok(snap) => snap,
            Err(err) => {
                eprintln!("status read failed, retrying: {:#}", err);
                sleep(RETRY_INTERVAL);
                continue;
            }
        };

        if snap.active_checks == 0 {
            break;
        }

        sleep(POLL_INTERVAL);
        if show_wait_screen {
            render_wait_screen(&snap);
        }
    }

    let snap = source
        .read()
        .context("final status re-check before reboot")?;
    if snap.active_checks > 0 {
        println!("A check started before the reboot could run; not rebooting.");
        return Ok(());
    }

    println!("RAID check complete. Rebooting...");
    reboot()
}

/// Invoke the host reboot facility.
pub fn reboot_host() -> Result<()> {
    let status = std::process::Command::new("reboot")
        .status()
        .context("failed to run reboot")?;
    if !status.success() {
        bail!("reboot exited with {}", status);
    }
    Ok(())
}

/// Clear the screen and show the wait state. Presentation only; uses the
/// snapshot the loop already holds, so it costs no extra reads.
fn render_wait_screen(snap: &StatusSnapshot) {
    print!("\x1b[2J\x1b[H");
    println!("{}", chrono::Local::now().format("%a %b %e %H:%M:%S %Y"));
    match &snap.time_remaining {
        Some(eta) => println!("Reboot will occur in {}", eta),
        None => println!("Reboot will occur when the RAID check completes"),
    }
    if let Some(pct) = snap.progress_pct {
        println!("{}", render_bar(pct, 50));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    struct Script(std::vec::IntoIter<Result<StatusSnapshot>>);

    impl Script {
        fn new(reads: Vec<Result<StatusSnapshot>>) -> Self {
            Script(reads.into_iter())
        }
    }

    impl StatusSource for Script {
        fn read(&mut self) -> Result<StatusSnapshot> {
            self.0.next().expect("poll loop read past the script")
        }
    }

    fn active(n: usize) -> Result<StatusSnapshot> {
        Ok(StatusSnapshot {
            active_checks: n,
            ..Default::default()
        })
    }

    #[test]
    fn two_active_reads_mean_two_long_sleeps_then_recheck_and_reboot() {
        let mut source = Script::new(vec![active(1), active(1), active(0), active(0)]);
        let mut sleeps = Vec::new();
        let mut rebooted = false;

        wait_and_reboot(&mut source, |d| sleeps.push(d), || { rebooted = true; Ok(()) }, false)
            .unwrap();

        assert_eq!(sleeps, vec![POLL_INTERVAL, POLL_INTERVAL]);
        assert!(rebooted);
        // The confirmatory re-read consumed the last scripted snapshot.
        assert!(source.0.next().is_none());
    }

    #[test]
    fn immediate_idle_still_rechecks_before_reboot() {
        let mut source = Script::new(vec![active(0), active(0)]);
        let mut sleeps = Vec::new();
        let mut rebooted = false;

        wait_and_reboot(&mut source, |d| sleeps.push(d), || { rebooted = true; Ok(()) }, false)
            .unwrap();

        assert!(sleeps.is_empty());
        assert!(rebooted);
    }

    #[test]
    fn read_failures_back_off_short_and_retry() {
        let mut source = Script::new(vec![
            Err(anyhow!("transient")),
            Err(anyhow!("transient")),
            active(0),
            active(0),
        ]);
        let mut sleeps = Vec::new();
        let mut rebooted = false;

        wait_and_reboot(&mut source, |d| sleeps.push(d), || { rebooted = true; Ok(()) }, false)
            .unwrap();

        assert_eq!(sleeps, vec![RETRY_INTERVAL, RETRY_INTERVAL]);
        assert!(rebooted);
    }

    #[test]
    fn failed_recheck_is_fatal_and_never_reboots() {
        let mut source = Script::new(vec![active(0), Err(anyhow!("gone"))]);
        let mut rebooted = false;

        let err = wait_and_reboot(&mut source, |_| {}, || { rebooted = true; Ok(()) }, false)
            .unwrap_err();

        assert!(err.to_string().contains("final status re-check"));
        assert!(!rebooted);
    }

    #[test]
    fn check_starting_during_recheck_declines_the_reboot() {
        let mut source = Script::new(vec![active(0), active(1)]);
        let mut rebooted = false;

        wait_and_reboot(&mut source, |_| {}, || { rebooted = true; Ok(()) }, false).unwrap();

        assert!(!rebooted);
    }
}
