//! Setup file description.

use std::path::PathBuf;

use clap::Args;
use rivulet_config::{ObjectConfig, OperatorRegistry, SetupFile};
use rivulet_engine::{TopologySummary, select_mixmode};
use rivulet_io::read_wav_info;

use super::common::{format_time, load_setup};

#[derive(Args)]
pub struct InfoArgs {
    /// Setup file (TOML)
    #[arg(value_name = "SETUP")]
    setup: PathBuf,
}

fn describe_object(object: &ObjectConfig, reading: bool) -> String {
    match object {
        ObjectConfig::Wav {
            path,
            channels,
            bits,
        } => {
            if reading {
                match read_wav_info(path) {
                    Ok(info) => format!(
                        "wav {} ({} ch, {} Hz, {} bit, {})",
                        path.display(),
                        info.channels,
                        info.sample_rate,
                        info.bits_per_sample,
                        format_time(info.duration_secs())
                    ),
                    Err(err) => format!("wav {} (unreadable: {err})", path.display()),
                }
            } else {
                format!(
                    "wav {} ({} ch, {bits} bit)",
                    path.display(),
                    channels.unwrap_or(2)
                )
            }
        }
        ObjectConfig::Raw {
            path,
            format,
            channels,
            resample_from,
        } => {
            let rate = resample_from.map_or(String::new(), |r| format!(", {r} Hz"));
            format!("raw {} ({format}, {channels} ch{rate})", path.display())
        }
        ObjectConfig::Tone {
            frequency,
            amplitude,
            channels,
            length,
            ..
        } => {
            let length = length.map_or_else(|| "endless".to_string(), format_time);
            format!("tone {frequency} Hz at {amplitude} ({channels} ch, {length})")
        }
        ObjectConfig::Null { channels } => format!("null ({channels} ch)"),
    }
}

fn print_setup(file: &SetupFile, registry: &OperatorRegistry) {
    let engine = &file.engine;
    let summary = TopologySummary {
        chains: file.chains.len(),
        inputs: file.inputs.len(),
        outputs: file.outputs.len(),
        realtime_inputs: 0,
        realtime_outputs: 0,
    };
    println!("Engine");
    println!(
        "  {} Hz, {} frames per cycle, mixmode {} -> {}",
        engine.sample_rate,
        engine.buffersize,
        engine.mixmode,
        select_mixmode(&summary, engine)
    );
    if let Some(length) = engine.length {
        println!("  length {}", format_time(length));
    }
    if engine.looping {
        println!("  looping");
    }
    if engine.interactive {
        println!("  interactive");
    }

    println!();
    println!("Inputs");
    for (i, input) in file.inputs.iter().enumerate() {
        println!("  {}: {}", i + 1, describe_object(input, true));
    }
    println!();
    println!("Outputs");
    for (i, output) in file.outputs.iter().enumerate() {
        println!("  {}: {}", i + 1, describe_object(output, false));
    }

    println!();
    println!("Chains");
    for chain in &file.chains {
        let output = chain
            .output
            .map_or_else(|| "-".to_string(), |o| o.to_string());
        let mut flags = String::new();
        if chain.muted {
            flags.push_str(" [muted]");
        }
        if chain.bypassed {
            flags.push_str(" [bypassed]");
        }
        println!("  {}: input {} -> output {output}{flags}", chain.name, chain.input);
        for (j, op) in chain.operators.iter().enumerate() {
            let specs = registry.param_specs(&op.kind).unwrap_or_default();
            let params: Vec<String> = specs
                .iter()
                .enumerate()
                .map(|(k, spec)| {
                    let value = op.params.get(k).copied().unwrap_or(spec.default);
                    format!("{}={value}", spec.name)
                })
                .collect();
            println!("    {}. {} {}", j + 1, op.kind, params.join(" "));
        }
    }
}

pub fn run(args: InfoArgs) -> anyhow::Result<()> {
    let registry = OperatorRegistry::new();
    let file = load_setup(&args.setup, &registry)?;
    print_setup(&file, &registry);
    Ok(())
}
