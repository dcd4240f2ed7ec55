use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use quad_vision::{
    ConcurrencyPolicy, DisplaySlot, FramePipeline, FrameResult, LiveConfig, LiveSession,
    PipelineConfig, Presenter, SyntheticConfig, View, image_helper, synthetic_frames,
};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "visual_tester", version, about = "Grayscale, black/white and edge views of an image or a live stream")]
struct Cli {
    /// Threads used by the row-parallel transforms.
    #[arg(long, global = true, default_value_t = num_cpus::get())]
    threads: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process one image file and write the four views as PNG files.
    Still {
        input: PathBuf,
        /// Directory for `<name>_<view>.png` outputs.
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },
    /// Run the synthetic moving-target stream through a live session.
    Live {
        #[arg(long, default_value_t = 320)]
        width: u32,
        #[arg(long, default_value_t = 240)]
        height: u32,
        #[arg(long, default_value_t = 30)]
        fps: u32,
        /// Stop after this many frames. Runs until Ctrl-C when omitted.
        #[arg(long)]
        frames: Option<u64>,
        #[arg(long, value_enum, default_value_t = Policy::AtMostOne)]
        policy: Policy,
        /// Display messages that may queue before handoffs wait.
        #[arg(long, default_value_t = 4)]
        presenter_capacity: usize,
        /// Write the last displayed views here before stopping.
        #[arg(long)]
        snapshot_dir: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Policy {
    AtMostOne,
    Unbounded,
}

impl From<Policy> for ConcurrencyPolicy {
    fn from(policy: Policy) -> Self {
        match policy {
            Policy::AtMostOne => ConcurrencyPolicy::AtMostOneInFlight,
            Policy::Unbounded => ConcurrencyPolicy::UnboundedOverlap,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG controls verbosity, e.g. RUST_LOG=quad_vision=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();
    let pipeline = FramePipeline::new(PipelineConfig {
        worker_threads: cli.threads,
    })?;

    match cli.command {
        Command::Still { input, output_dir } => run_still(&pipeline, &input, &output_dir),
        Command::Live {
            width,
            height,
            fps,
            frames,
            policy,
            presenter_capacity,
            snapshot_dir,
        } => {
            let source = SyntheticConfig {
                width,
                height,
                fps,
                frames,
            };
            run_live(pipeline, source, policy.into(), presenter_capacity, snapshot_dir).await
        }
    }
}

fn run_still(pipeline: &FramePipeline, input: &Path, output_dir: &Path) -> anyhow::Result<()> {
    let frame = image_helper::load(input)
        .with_context(|| format!("could not load image {}", input.display()))?;

    let mut display = DisplaySlot::new();

    let Some(result) = pipeline.process(Some(&frame)) else {
        println!("The image could not be processed.");
        return Ok(());
    };
    display.handoff(result);

    let snapshot = display.snapshot();
    let labels = snapshot.labels();
    println!("original         {}", labels.original);
    println!("grayscale        {}", labels.grayscale);
    println!("black and white  {}", labels.black_and_white);
    println!("edges            {}", labels.edges);
    println!("time             {}", labels.elapsed);

    if let Some(result) = snapshot.frame.as_deref() {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "frame".to_string());
        save_views(result, output_dir, &stem)?;
    }
    Ok(())
}

async fn run_live(
    pipeline: FramePipeline,
    source: SyntheticConfig,
    policy: ConcurrencyPolicy,
    presenter_capacity: usize,
    snapshot_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let frames = synthetic_frames(source).context("opening the live source")?;
    let (presenter, presenter_task) = Presenter::spawn(presenter_capacity);

    // Stand-in for a window: print each newly displayed frame.
    let mut view = presenter.subscribe();
    let printer = tokio::spawn(async move {
        while view.changed().await.is_ok() {
            let snapshot = view.borrow_and_update().clone();
            if let Some(result) = snapshot.frame.as_deref() {
                println!(
                    "frame {:>5}  {}  {}",
                    result.sequence(),
                    result.resolution_label(View::Original),
                    result.elapsed_label()
                );
            }
        }
    });

    let session = LiveSession::start(frames, pipeline, presenter.clone(), LiveConfig { policy });

    let mut poll = tokio::time::interval(std::time::Duration::from_millis(20));
    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(interrupted);
    loop {
        tokio::select! {
            _ = &mut interrupted => {
                info!("interrupted");
                break;
            }
            _ = poll.tick() => {
                if session.is_finished() {
                    break;
                }
            }
        }
    }

    if let Some(dir) = snapshot_dir {
        if let Some(result) = presenter.snapshot().frame.as_deref() {
            save_views(result, &dir, &format!("live_{}", result.sequence()))?;
        }
    }

    let summary = session.stop().await?;
    println!(
        "delivered {}  published {}  dropped (busy) {}  failed {}  discarded {}",
        summary.delivered, summary.published, summary.dropped_busy, summary.failed, summary.discarded
    );

    let stats = presenter.snapshot().stats;
    println!(
        "handoffs {}  released {}  out of order {}",
        stats.handoffs, stats.released, stats.out_of_order
    );

    presenter.shutdown().await;
    presenter_task.await.context("display task")?;
    printer.await.context("printer task")?;
    Ok(())
}

fn save_views(result: &FrameResult, dir: &Path, stem: &str) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    for view in View::ALL {
        let path = dir.join(format!("{stem}_{}.png", view.name()));
        image_helper::save(&path, result.view(view))
            .with_context(|| format!("writing {}", path.display()))?;
        println!("wrote {}", path.display());
    }
    Ok(())
}
