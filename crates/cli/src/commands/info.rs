//! `info` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    filter: String,
    dispatcher: DispatcherInfo,
    source_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sources: Vec<SourceInfo>,
}

#[derive(Serialize)]
struct DispatcherInfo {
    async_workers: usize,
    thread_name_prefix: String,
    flush_timeout_ms: u64,
}

#[derive(Serialize)]
struct SourceInfo {
    id: u32,
    name: String,
    event_source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fields: Vec<String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&blueprint, args.sources);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{json}");
    } else {
        print_config_info(&blueprint, args.sources);
    }

    Ok(())
}

fn build_config_info(blueprint: &contracts::PipelineBlueprint, with_sources: bool) -> ConfigInfo {
    let sources = if with_sources {
        blueprint
            .sources
            .iter()
            .map(|s| SourceInfo {
                id: s.id,
                name: s.name.clone(),
                event_source: s.event_source.clone().unwrap_or_else(|| s.name.clone()),
                description: s.description.clone(),
                fields: s.fields.clone(),
            })
            .collect()
    } else {
        Vec::new()
    };

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        filter: blueprint.filter.expression.clone(),
        dispatcher: DispatcherInfo {
            async_workers: blueprint.dispatcher.async_workers,
            thread_name_prefix: blueprint.dispatcher.thread_name_prefix.clone(),
            flush_timeout_ms: blueprint.dispatcher.flush_timeout_ms,
        },
        source_count: blueprint.sources.len(),
        sources,
    }
}

fn print_config_info(blueprint: &contracts::PipelineBlueprint, with_sources: bool) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               evt-filter Configuration                       ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("🔍 Filter");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!("   └─ Expression: {}", blueprint.filter.expression);

    let d = &blueprint.dispatcher;
    println!("\n⚙️  Dispatcher");
    println!("   ├─ Async workers: {} (+1 inline)", d.async_workers);
    println!("   ├─ Thread names: {}-<n>", d.thread_name_prefix);
    println!("   └─ Flush timeout: {} ms", d.flush_timeout_ms);

    println!("\n🔌 Sources ({})", blueprint.sources.len());
    for (i, source) in blueprint.sources.iter().enumerate() {
        let is_last = i == blueprint.sources.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child_prefix = if is_last { "   " } else { "│  " };

        println!("   {} [{}] {}", prefix, source.id, source.name);
        if with_sources {
            let tag = source.event_source.as_deref().unwrap_or(&source.name);
            println!("   {}  ├─ event source: {}", child_prefix, tag);
            if let Some(ref description) = source.description {
                println!("   {}  ├─ {}", child_prefix, description);
            }
            println!("   {}  └─ fields: {}", child_prefix, source.fields.join(", "));
        }
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use config_loader::{ConfigFormat, ConfigLoader};

    #[test]
    fn test_info_defaults_event_source_to_name() {
        let bp = ConfigLoader::load_from_str(
            "[filter]\nexpression = \"evt.num > 0\"\n\n[[sources]]\nid = 4\nname = \"gcpaudit\"\n",
            ConfigFormat::Toml,
        )
        .unwrap();

        let info = build_config_info(&bp, true);
        assert_eq!(info.sources[0].event_source, "gcpaudit");
        assert_eq!(info.dispatcher.async_workers, 4);

        let brief = build_config_info(&bp, false);
        assert!(brief.sources.is_empty());
        assert_eq!(brief.source_count, 1);
    }
}
