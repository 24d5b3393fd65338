//! Command line front end: edit a canvas, run generation jobs against the
//! hosted model and place the results back on the canvas.

use std::{
    io::Read,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand, ValueEnum};
use patch_config::PatchworkConfig;
use patch_io::{JobApi, JobRequest, ModelClient};
use patch_jobs::{CancelToken, JobOutcome, PollPolicy, TokenDelay, poll_job};
use patch_model::{Canvas, JobOutput, LocalAttributes, Position, RemoteAttributes, convert};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "patchwork", version, about = "Compose patch canvases with a hosted generative model")]
struct Cli {
    /// Config file (defaults to ./patchwork.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Canvas file (overrides the configured path)
    #[arg(long, global = true)]
    canvas: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit a job and place its result on the canvas
    Generate {
        #[arg(long)]
        prompt: Option<String>,
        /// Reference image URL
        #[arg(long)]
        image: Option<String>,
        /// Send the current canvas as the starting layout
        #[arg(long)]
        keep_layout: bool,
        /// Which result to apply when the job returns several (default: last)
        #[arg(long)]
        result: Option<usize>,
    },
    /// Keep polling a job that was submitted earlier
    Resume {
        job_id: String,
        #[arg(long)]
        result: Option<usize>,
    },
    /// Print the current status of a job
    Status { job_id: String },
    /// Inspect or edit the canvas
    #[command(subcommand)]
    Canvas(CanvasCommand),
    /// Convert attributes read as JSON from stdin between conventions
    Convert {
        #[arg(value_enum)]
        direction: Direction,
    },
}

#[derive(Subcommand, Debug)]
enum CanvasCommand {
    Show,
    Clear,
    /// Select the patch library for new placements
    Library { name: String },
    Place {
        index: usize,
        #[arg(allow_hyphen_values = true)]
        x: f64,
        #[arg(allow_hyphen_values = true)]
        y: f64,
    },
    Move {
        id: String,
        #[arg(allow_hyphen_values = true)]
        x: f64,
        #[arg(allow_hyphen_values = true)]
        y: f64,
    },
    /// Set attributes from a JSON object of local-convention fields
    Edit { id: String, attributes: String },
    Remove { id: String },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Direction {
    ToLocal,
    ToRemote,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = match cli.config.as_ref() {
        Some(path) => PatchworkConfig::load_from_file(path)?,
        None => PatchworkConfig::load_or_default(),
    };
    config.merge_with_env();
    config.validate()?;
    let canvas_path = cli.canvas.clone().unwrap_or_else(|| config.canvas.path.clone());

    match cli.command {
        Command::Generate {
            prompt,
            image,
            keep_layout,
            result,
        } => {
            let mut canvas = open_canvas(&canvas_path, &config)?;
            let request = JobRequest {
                prompt,
                image,
                initial_patches: if keep_layout {
                    canvas.to_remote_records()
                } else {
                    Vec::new()
                },
                library: Some(canvas.library().to_string()),
            };
            if !request.has_input() {
                bail!("pass --prompt or --image");
            }
            let client = ModelClient::new(&config.api)?;
            let job = client.create_job(&request)?;
            info!(job = %job.id, "submitted job");
            let outcome = wait_for(&client, &job.id, &config)?;
            apply_outcome(&client, &outcome, result, &mut canvas)?;
            canvas.save(&canvas_path)?;
        }
        Command::Resume { job_id, result } => {
            let mut canvas = open_canvas(&canvas_path, &config)?;
            let client = ModelClient::new(&config.api)?;
            let outcome = wait_for(&client, &job_id, &config)?;
            apply_outcome(&client, &outcome, result, &mut canvas)?;
            canvas.save(&canvas_path)?;
        }
        Command::Status { job_id } => {
            let client = ModelClient::new(&config.api)?;
            let job = client.job_status(&job_id)?;
            println!("{}", serde_json::to_string_pretty(&job)?);
        }
        Command::Canvas(command) => {
            let mut canvas = open_canvas(&canvas_path, &config)?;
            if edit_canvas(&mut canvas, command)? {
                canvas.save(&canvas_path)?;
            }
        }
        Command::Convert { direction } => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .context("failed to read stdin")?;
            let output = match direction {
                Direction::ToLocal => {
                    let remote: RemoteAttributes = serde_json::from_str(&input)?;
                    serde_json::to_string_pretty(&convert::to_local(&remote))?
                }
                Direction::ToRemote => {
                    let local: LocalAttributes = serde_json::from_str(&input)?;
                    serde_json::to_string_pretty(&convert::to_remote(&local))?
                }
            };
            println!("{output}");
        }
    }

    Ok(())
}

fn open_canvas(path: &Path, config: &PatchworkConfig) -> Result<Canvas> {
    if path.exists() {
        Canvas::load(path)
    } else {
        Ok(Canvas::new(config.canvas.library.clone()))
    }
}

fn wait_for(client: &ModelClient, job_id: &str, config: &PatchworkConfig) -> Result<JobOutcome> {
    let policy = PollPolicy::from(&config.polling);
    let outcome = poll_job(
        client,
        job_id,
        &policy,
        &mut TokenDelay,
        &CancelToken::new(),
        |outputs| {
            if let Some(latest) = outputs.last() {
                println!("result {}: {}", outputs.len(), latest.image());
            }
        },
    )?;
    Ok(outcome)
}

fn apply_outcome(
    client: &ModelClient,
    outcome: &JobOutcome,
    result: Option<usize>,
    canvas: &mut Canvas,
) -> Result<()> {
    let output = select_output(&outcome.outputs, result)?;
    let records = client.fetch_metadata(output)?;
    canvas.apply_results(&records);
    println!(
        "placed {} patches from {} ({} status checks)",
        canvas.len(),
        output.image(),
        outcome.attempts
    );
    Ok(())
}

/// The result picked with `--result`, or the last one.
fn select_output(outputs: &[JobOutput], result: Option<usize>) -> Result<&JobOutput> {
    let index = result.unwrap_or(outputs.len().saturating_sub(1));
    outputs
        .get(index)
        .ok_or_else(|| anyhow!("job produced {} results, no result {index}", outputs.len()))
}

/// Returns true when the canvas changed.
fn edit_canvas(canvas: &mut Canvas, command: CanvasCommand) -> Result<bool> {
    match command {
        CanvasCommand::Show => {
            println!("{}", serde_json::to_string_pretty(&*canvas)?);
            Ok(false)
        }
        CanvasCommand::Clear => {
            canvas.clear();
            Ok(true)
        }
        CanvasCommand::Library { name } => {
            canvas.select_library(name);
            Ok(true)
        }
        CanvasCommand::Place { index, x, y } => {
            let id = canvas.place(index, Position::new(x, y));
            println!("{id}");
            Ok(true)
        }
        CanvasCommand::Move { id, x, y } => {
            if !canvas.move_to(&id, Position::new(x, y)) {
                bail!("no patch with id {id}");
            }
            Ok(true)
        }
        CanvasCommand::Edit { id, attributes } => {
            let update: LocalAttributes =
                serde_json::from_str(&attributes).context("attributes must be a JSON object")?;
            if !canvas.edit(&id, &update) {
                bail!("no patch with id {id}");
            }
            Ok(true)
        }
        CanvasCommand::Remove { id } => {
            if canvas.remove(&id).is_none() {
                bail!("no patch with id {id}");
            }
            Ok(true)
        }
    }
}
