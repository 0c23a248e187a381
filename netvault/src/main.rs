use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use log::{error, info, warn};

use netvault::{
    BackupOptions, DeviceEntry, DeviceSummary, HostKeyVerification, RunSummary, Secrets,
    TaskFailure, load_inventory, logging, run_backups, timestamp_now,
};

#[derive(Parser)]
#[command(name = "netvault", version)]
#[command(about = "Back up network device configurations over SSH", long_about = None)]
struct Cli {
    /// Device inventory YAML
    #[arg(long, global = true, default_value = "config/devices.yml")]
    inventory: PathBuf,

    /// Secrets YAML
    #[arg(long, global = true, default_value = "config/secrets.yml")]
    secrets: PathBuf,

    /// Root directory for artifacts and run summaries
    #[arg(long, global = true, default_value = "backups")]
    backup_dir: PathBuf,

    /// Session timeout in seconds
    #[arg(long, global = true, default_value_t = 5)]
    timeout: u64,

    /// Host key checking
    #[arg(long, global = true, value_enum, default_value_t = HostKeyPolicy::AcceptNew)]
    host_key_policy: HostKeyPolicy,

    /// Custom known_hosts file
    #[arg(long, global = true)]
    known_hosts: Option<PathBuf>,

    /// Directory for the persistent log file
    #[arg(long, global = true, default_value = logging::DEFAULT_LOG_DIR)]
    log_dir: PathBuf,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Back up the devices in the inventory
    Backup {
        /// List what would be backed up without connecting
        #[arg(long)]
        dry_run: bool,

        /// Only back up this device (repeatable)
        #[arg(long = "device", value_name = "NAME")]
        devices: Vec<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum HostKeyPolicy {
    Strict,
    AcceptNew,
    Disabled,
}

impl From<HostKeyPolicy> for HostKeyVerification {
    fn from(policy: HostKeyPolicy) -> Self {
        match policy {
            HostKeyPolicy::Strict => HostKeyVerification::Strict,
            HostKeyPolicy::AcceptNew => HostKeyVerification::AcceptNew,
            HostKeyPolicy::Disabled => HostKeyVerification::Disabled,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.debug { "debug" } else { "info" };
    match logging::open_log_file(&cli.log_dir, Path::new(logging::FALLBACK_LOG_DIR)) {
        Ok(log_file) => {
            let (path, fell_back) = (log_file.path.clone(), log_file.fell_back);
            logging::init(level, Some(log_file));
            if fell_back {
                warn!(
                    "log directory '{}' is not writable, falling back to '{}'",
                    cli.log_dir.display(),
                    path.display()
                );
            }
            info!("logging to {}", path.display());
        }
        Err(e) => {
            logging::init(level, None);
            warn!("file logging disabled: {}", e);
        }
    }

    match &cli.command {
        Commands::Backup { dry_run, devices } => {
            ExitCode::from(run_backup(&cli, *dry_run, devices).await)
        }
    }
}

async fn run_backup(cli: &Cli, dry_run: bool, selected: &[String]) -> u8 {
    let entries = match load_inventory(&cli.inventory) {
        Ok(entries) => entries,
        Err(e) => {
            error!("{}", e);
            return 2;
        }
    };
    let entries = select_devices(entries, selected);

    let run_id = timestamp_now();
    let mut summary = RunSummary::new(run_id.as_str(), run_id.as_str(), dry_run);
    summary.set_devices_total(entries.len());

    if entries.is_empty() {
        warn!("no devices to back up");
    }

    if dry_run {
        for entry in &entries {
            info!(
                "device={} dry-run vendor={} host={}:{} system_backup={}",
                entry.name, entry.vendor, entry.host, entry.port, entry.system_backup
            );
        }
        save_summary(&summary, cli);
        return 0;
    }

    let secrets = match Secrets::load(&cli.secrets) {
        Ok(secrets) => secrets,
        Err(e) => {
            error!("{}", e);
            return 2;
        }
    };

    let mut devices = Vec::with_capacity(entries.len());
    for entry in &entries {
        match secrets.resolve(&entry.secret_ref) {
            Ok(secret) => devices.push(entry.descriptor(secret)),
            Err(e) => {
                error!("device={} skipped: {}", entry.name, e);
                summary.add_device(DeviceSummary::skipped(
                    &entry.name,
                    entry.vendor,
                    &TaskFailure::from(&e),
                ));
            }
        }
    }

    let options = BackupOptions {
        root: cli.backup_dir.clone(),
        timeout: Duration::from_secs(cli.timeout),
        host_key_verification: cli.host_key_policy.into(),
        known_hosts: cli.known_hosts.clone(),
    };

    for run in run_backups(&devices, &options).await {
        summary.add_device(DeviceSummary::from_run(&run));
    }

    save_summary(&summary, cli);
    let totals = &summary.totals;
    info!(
        "run finished processed={} success={} failed={} changed={}",
        totals.devices_processed,
        totals.devices_success,
        totals.devices_failed,
        totals.configs_changed
    );
    summary.exit_code()
}

fn select_devices(entries: Vec<DeviceEntry>, selected: &[String]) -> Vec<DeviceEntry> {
    if selected.is_empty() {
        return entries;
    }
    for name in selected {
        if !entries.iter().any(|entry| &entry.name == name) {
            warn!("device '{}' is not in the inventory", name);
        }
    }
    entries
        .into_iter()
        .filter(|entry| selected.contains(&entry.name))
        .collect()
}

fn save_summary(summary: &RunSummary, cli: &Cli) {
    if let Err(e) = summary.save(&cli.backup_dir) {
        error!("failed to save run summary: {}", e);
    }
}
