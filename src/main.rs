//! xdna-profile-config: resolve AIE profile/trace settings against a design

use std::env;
use std::path::PathBuf;

use anyhow::{bail, Context};
use xdna_profile_config::config::Config;
use xdna_profile_config::diagnostics::{Diagnostics, Severity};
use xdna_profile_config::parser::settings::write_collection;
use xdna_profile_config::parser::SettingsParser;
use xdna_profile_config::plugin::Plugin;
use xdna_profile_config::resolve::{MetricSetTables, ResolutionEngine, ResolvedConfig};
use xdna_profile_config::topology::StaticTopology;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }
    if args.iter().any(|a| a == "--sample-config") {
        print!("{}", Config::sample_config());
        return Ok(());
    }

    let config = Config::get();
    let mut settings_path = config.settings_path();
    let mut topology_path = config.topology_path();
    let mut plugin = config.plugin();
    let mut write_dir: Option<PathBuf> = None;

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--topology" | "-t" => {
                topology_path = Some(PathBuf::from(iter.next().context("--topology needs a path")?));
            }
            "--plugin" | "-p" => {
                let name = iter.next().context("--plugin needs a name")?;
                plugin = Plugin::from_name(name)
                    .with_context(|| format!("unknown plugin '{}'", name))?;
            }
            "--write-collections" => {
                write_dir = Some(PathBuf::from(iter.next().context("--write-collections needs a directory")?));
            }
            other if other.starts_with('-') => bail!("unknown option '{}'", other),
            other => settings_path = PathBuf::from(other),
        }
    }

    let Some(topology_path) = topology_path else {
        print_usage();
        bail!("no topology given (use --topology or XDP_TOPOLOGY_PATH)");
    };
    let topology = StaticTopology::from_file(&topology_path)?;

    println!("Settings: {}", settings_path.display());
    println!("Topology: {}", topology_path.display());
    println!("Plugin:   {}", plugin);
    println!();

    let mut diags = Diagnostics::new();
    let parser = SettingsParser::new();
    let resolved = match parser.parse_file(&settings_path, plugin, &mut diags) {
        Some(settings) => {
            if let Some(interval) = settings.options.interval_us {
                println!("Interval: {} us", interval);
            }
            let manager = settings.build_collections()?;

            if let Some(dir) = &write_dir {
                for (_, setting, collection) in manager.iter() {
                    write_collection(&dir.join(format!("{}.json", setting)), collection)?;
                }
            }

            let engine = ResolutionEngine::new(&topology, MetricSetTables::for_plugin(plugin));
            let mut resolved = engine.resolve(&manager, &mut diags);
            resolved.prune_orphans();
            resolved
        }
        None => ResolvedConfig::new(),
    };

    print_tables(&resolved);
    print_diagnostics(&diags);

    Ok(())
}

fn print_tables(resolved: &ResolvedConfig) {
    let mut any = false;
    for (module, tables) in resolved.modules() {
        if tables.metrics.is_empty() {
            continue;
        }
        any = true;
        println!("{} ({} tiles)", module, tables.metrics.len());
        println!("{}", "-".repeat(module.as_str().len() + 10));
        for (tile, setting) in &tables.metrics {
            let mut line = format!("  {:<8} {:<28} {}", tile.to_string(), setting.metric, setting.origin);
            if let (Some(ch0), Some(ch1)) = (tables.channel0.get(tile), tables.channel1.get(tile)) {
                line.push_str(&format!("  ch {}/{}", ch0, ch1));
            }
            if let Some(bytes) = tables.bytes.get(tile) {
                line.push_str(&format!("  bytes {}", bytes));
            }
            println!("{}", line);
        }
        println!();
    }
    if !any {
        println!("No tiles configured; plugin defaults apply.");
        println!();
    }
}

fn print_diagnostics(diags: &Diagnostics) {
    let shown: Vec<_> = diags
        .iter()
        .filter(|d| d.severity >= Severity::Warning)
        .collect();
    if shown.is_empty() {
        return;
    }
    println!("Diagnostics ({} warnings, {} errors)", diags.count(Severity::Warning), diags.count(Severity::Error));
    println!("===========");
    for d in shown {
        println!("  {}", d);
    }
}

fn print_usage() {
    println!("Usage: xdna-profile-config [SETTINGS.json] --topology TOPOLOGY.json [options]");
    println!();
    println!("Options:");
    println!("  -t, --topology PATH          design topology description (JSON)");
    println!("  -p, --plugin NAME            aie_profile (default) or aie_trace");
    println!("      --write-collections DIR  write each parsed collection back as JSON");
    println!("      --sample-config          print a sample configuration file");
    println!("  -h, --help                   show this help");
}
