pub mod check;
pub mod run;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use tracing::{debug, info};

use warpscale_core::{EngineConfig, WarpscaleConfig};
use warpscale_state::{FleetSnapshot, FleetStore};

/// Config file looked up in the working directory when `--config` is absent.
const DEFAULT_CONFIG_FILE: &str = "warpscale.toml";

/// Configuration file plus flag overrides.
#[derive(Args, Debug, Default)]
pub struct EngineArgs {
    /// Path to warpscale.toml.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Comma-separated group names to evaluate.
    #[arg(long, value_delimiter = ',')]
    pub groups: Vec<String>,

    /// Evaluate every group tagged with this fleet.
    #[arg(long)]
    pub fleet: Option<String>,

    /// Report decisions without executing policies.
    #[arg(long)]
    pub dry_run: bool,

    /// Enable predictive scaling.
    #[arg(long, overrides_with = "no_ps")]
    pub ps: bool,

    /// Disable predictive scaling.
    #[arg(long, overrides_with = "ps")]
    pub no_ps: bool,

    /// Comma-separated lookback windows ("1w,1d").
    #[arg(long, value_delimiter = ',')]
    pub ps_lookback_windows: Vec<String>,

    #[arg(long)]
    pub ps_lookahead_window: Option<String>,

    #[arg(long)]
    pub ps_valid_threshold: Option<f64>,

    #[arg(long)]
    pub ps_valid_period: Option<String>,

    /// Enable flexible down scaling.
    #[arg(long, overrides_with = "no_fds")]
    pub fds: bool,

    /// Disable flexible down scaling.
    #[arg(long, overrides_with = "fds")]
    pub no_fds: bool,

    /// Cooldown after a scale-up before scaling down.
    #[arg(long)]
    pub fds_up_to_down: Option<String>,

    /// Cooldown after a scale-down before scaling down again.
    #[arg(long)]
    pub fds_down_to_down: Option<String>,

    #[arg(long)]
    pub fds_max_sunk_cost: Option<String>,

    /// Use interpolated utilization thresholds.
    #[arg(long)]
    pub fds_variable_thresholds: bool,
}

impl EngineArgs {
    /// Load the config file (if any), apply flag overrides and validate.
    pub fn load(&self) -> anyhow::Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                read_config(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => {
                debug!("no config file, using flags only");
                WarpscaleConfig::default()
            }
        };
        self.apply(&mut config);
        Ok(config.resolve()?)
    }

    fn apply(&self, config: &mut WarpscaleConfig) {
        if !self.groups.is_empty() {
            config.groups.names = self.groups.clone();
        }
        if self.fleet.is_some() {
            config.groups.fleet = self.fleet.clone();
        }
        if self.dry_run {
            config.dry_run = true;
        }

        let ps = &mut config.predictive_scaling;
        if self.ps {
            ps.enabled = true;
        } else if self.no_ps {
            ps.enabled = false;
        }
        if !self.ps_lookback_windows.is_empty() {
            ps.lookback_windows = self.ps_lookback_windows.clone();
        }
        override_with(&mut ps.lookahead_window, &self.ps_lookahead_window);
        override_with(&mut ps.valid_threshold, &self.ps_valid_threshold);
        override_with(&mut ps.valid_period, &self.ps_valid_period);

        let fds = &mut config.flexible_down_scaling;
        if self.fds {
            fds.enabled = true;
        } else if self.no_fds {
            fds.enabled = false;
        }
        override_with(&mut fds.up_down_cooldown, &self.fds_up_to_down);
        override_with(&mut fds.down_down_cooldown, &self.fds_down_to_down);
        override_with(&mut fds.max_sunk_cost, &self.fds_max_sunk_cost);
        if self.fds_variable_thresholds {
            fds.variable_thresholds = true;
        }
    }
}

fn override_with<T: Clone>(slot: &mut Option<T>, flag: &Option<T>) {
    if flag.is_some() {
        slot.clone_from(flag);
    }
}

fn read_config(path: &Path) -> anyhow::Result<WarpscaleConfig> {
    let config = WarpscaleConfig::from_file(path)
        .with_context(|| format!("loading {}", path.display()))?;
    info!(path = %path.display(), "config loaded");
    Ok(config)
}

/// Where fleet and metrics data comes from.
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct SourceArgs {
    /// redb fleet store file (created if missing).
    #[arg(long)]
    pub store: Option<PathBuf>,

    /// JSON fleet snapshot, loaded into an in-memory store.
    #[arg(long)]
    pub snapshot: Option<PathBuf>,
}

impl SourceArgs {
    pub fn open(&self) -> anyhow::Result<FleetStore> {
        if let Some(path) = &self.store {
            let store = FleetStore::open(path)
                .with_context(|| format!("opening store {}", path.display()))?;
            info!(path = %path.display(), "fleet store opened");
            return Ok(store);
        }
        if let Some(path) = &self.snapshot {
            let snapshot = FleetSnapshot::from_file(path)
                .with_context(|| format!("reading snapshot {}", path.display()))?;
            let store = FleetStore::open_in_memory()?;
            store.load_snapshot(&snapshot)?;
            return Ok(store);
        }
        anyhow::bail!("either --store or --snapshot is required")
    }
}
