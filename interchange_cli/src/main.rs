use clap::{Parser, Subcommand};
use interchange_core::config::TimezoneConfig;
use interchange_core::*;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "interchange")]
#[command(about = "Canonical fitness activity toolkit", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override config file location
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a value between units
    Convert {
        #[arg(allow_negative_numbers = true)]
        value: f64,

        /// Source unit, by symbol (km) or name (Kilometers)
        from: Unit,

        /// Target unit
        to: Unit,
    },

    /// Pick the most specific of several activity types
    Pick {
        #[arg(required = true)]
        types: Vec<ActivityType>,
    },

    /// Normalize and validate an activity JSON file, then print its UID
    Check {
        file: PathBuf,

        /// Zone every coordinate lookup resolves to (name or offset in minutes)
        #[arg(long, allow_hyphen_values = true)]
        lookup_zone: Option<String>,

        /// Zone used when no waypoint has a location
        #[arg(long, allow_hyphen_values = true)]
        fallback_zone: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    interchange_core::logging::init_from_config(&config.logging);

    match cli.command {
        Commands::Convert { value, from, to } => cmd_convert(value, from, to),
        Commands::Pick { types } => cmd_pick(&types),
        Commands::Check {
            file,
            lookup_zone,
            fallback_zone,
        } => {
            let mut zones = config.timezone;
            if lookup_zone.is_some() {
                zones.lookup_zone = lookup_zone;
            }
            if fallback_zone.is_some() {
                zones.fallback_zone = fallback_zone;
            }
            cmd_check(&file, &zones)
        }
    }
}

fn cmd_convert(value: f64, from: Unit, to: Unit) -> Result<()> {
    let converted = convert(value, from, to)?;
    println!("{}", converted);
    Ok(())
}

fn cmd_pick(types: &[ActivityType]) -> Result<()> {
    println!("{}", pick_most_specific(types));
    println!(
        "variants: {}",
        if are_variants(types) { "yes" } else { "no" }
    );
    Ok(())
}

fn cmd_check(file: &Path, zones: &TimezoneConfig) -> Result<()> {
    let contents = std::fs::read_to_string(file)?;
    let mut activity: Activity = serde_json::from_str(&contents)?;
    tracing::info!("Loaded {} from {:?}", activity, file);

    activity.clean_stats()?;
    activity.clean_waypoints();

    if activity.fallback_tz.is_none() {
        activity.fallback_tz = zones.fallback_tz()?;
    }

    let lookup_value = zones.lookup_value()?;
    let lookup = move |_lat: f64, _lon: f64| -> Result<TzValue> {
        lookup_value.clone().ok_or_else(|| {
            Error::Resolution("No lookup zone configured for located activities".into())
        })
    };
    let resolver = TimezoneResolver::new(MemoryTzCache::new(), lookup);

    activity.ensure_tz(&resolver, false)?;
    activity.check_sanity()?;

    let uid = activity
        .uid()
        .ok_or_else(|| Error::Precursor("Activity has no start time to derive a UID from".into()))?;
    println!("{}", uid);
    Ok(())
}
