use clap::{Parser, Subcommand};
use std::path::PathBuf;

use beatsmith::config::{load_parameters, validate_parameters};
use beatsmith::templates::ArrangementTemplate;
use beatsmith::{theme, Engine, Parameters};

/// Beatbox-to-arrangement engine
#[derive(Parser)]
#[command(name = "beatsmith")]
#[command(about = "Turn a short beatbox recording into a synthwave arrangement")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a recording and write MIDI, rendered audio, and decisions
    Analyze {
        /// Input WAV file (16-bit PCM, mono or stereo, max 30 s)
        input: PathBuf,

        /// Output directory for results
        #[arg(short, long, default_value = "./output")]
        output: PathBuf,

        /// Parameters JSON file (other flags override its values)
        #[arg(short, long)]
        params: Option<PathBuf>,

        /// Theme name from the catalog
        #[arg(long)]
        theme: Option<String>,

        /// Template: synthwave_straight, synthwave_halftime, arp_drive
        #[arg(long)]
        template: Option<String>,

        /// BPM override (40-240); omit to use the estimator
        #[arg(long)]
        bpm: Option<f64>,

        /// Swing amount [0, 1]
        #[arg(long)]
        swing: Option<f32>,

        /// B-emphasis [0, 1]
        #[arg(long)]
        b_emphasis: Option<f32>,

        /// Bars to arrange: 1, 2, 4, 8, 16
        #[arg(long)]
        bars: Option<u32>,

        /// Quiet output
        #[arg(short, long)]
        quiet: bool,
    },
    /// Print the default parameters as JSON
    ShowParams,
    /// Validate a parameters JSON file
    ValidateParams {
        /// Parameters file to validate
        params: PathBuf,
    },
    /// List the theme catalog
    ListThemes,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            input,
            output,
            params,
            theme: theme_name,
            template,
            bpm,
            swing,
            b_emphasis,
            bars,
            quiet,
        } => {
            let mut parameters = match params {
                Some(path) => load_parameters(path)?,
                None => Parameters::default(),
            };
            if let Some(name) = theme_name {
                parameters.theme = name;
            }
            if let Some(name) = template {
                parameters.template = ArrangementTemplate::parse(&name)
                    .ok_or_else(|| anyhow::anyhow!("unknown template '{}'", name))?;
            }
            if let Some(bpm) = bpm {
                parameters.bpm = Some(bpm);
            }
            if let Some(swing) = swing {
                parameters.swing_amount = swing;
                parameters.feel = beatsmith::grid::GrooveFeel::Swing;
            }
            if let Some(b) = b_emphasis {
                parameters.b_emphasis = b;
            }
            if let Some(bars) = bars {
                parameters.bar_count = bars;
            }

            let wav_bytes = std::fs::read(&input)?;
            if !quiet {
                println!("Processing {}...", input.display());
            }

            let engine = Engine::new(parameters);
            let result = engine
                .process(&wav_bytes)
                .map_err(|e| anyhow::anyhow!(e.to_string()))?;

            std::fs::create_dir_all(&output)?;
            std::fs::write(output.join("arrangement.mid"), &result.midi_bytes)?;
            std::fs::write(output.join("render.wav"), &result.wav_bytes)?;
            std::fs::write(
                output.join("decisions.json"),
                serde_json::to_vec_pretty(&result.decisions)?,
            )?;

            if !quiet {
                println!(
                    "{} events arranged at {:.1} BPM{}",
                    result.decisions.len(),
                    result.bpm,
                    if result.tempo_fallback {
                        " (low tempo confidence, defaulted to 120)"
                    } else {
                        ""
                    }
                );
                if result.dropped_outside_lookahead > 0 {
                    println!(
                        "{} events fell outside the lookahead window",
                        result.dropped_outside_lookahead
                    );
                }
                println!("Results saved to {}", output.display());
            }
        }
        Commands::ShowParams => {
            println!("{}", serde_json::to_string_pretty(&Parameters::default())?);
        }
        Commands::ValidateParams { params } => {
            let parameters = load_parameters(&params)?;
            validate_parameters(&parameters).map_err(|e| anyhow::anyhow!(e.to_string()))?;
            println!("Parameters are valid");
            println!("{}", serde_json::to_string_pretty(&parameters)?);
        }
        Commands::ListThemes => {
            for summary in theme::list_themes() {
                println!(
                    "{}  [{}-{} BPM]  {}",
                    summary.name, summary.bpm_range.0, summary.bpm_range.1, summary.description
                );
            }
        }
    }

    Ok(())
}
