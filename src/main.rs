use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use reqsynth::io::{
    LockSettings, ResolvedLock, RunCounts, StageTimings, ensure_profile_exists, fmt_sec, secs,
    sha256_file, write_default_profile,
};
use reqsynth::llm::DEFAULT_MODEL;
use reqsynth::{
    AnthropicClient, AnthropicConfig, NormalizedMeta, NormalizedSnapshot, PipelineError,
    Reconciled, RenderConfig, RenderInput, RunManifest, SynthesisConfig, classify, create_lock,
    execute_stage1, execute_stage2, execute_stage3, load_profile, parse_utterance_file,
    read_classified, resolve_lock, write_classified,
};

const DEFAULT_PROFILE: &str = "./profile.json";

#[derive(Parser)]
#[command(name = "reqsynth")]
#[command(
    author,
    version,
    about = "Meeting transcript to requirements document pipeline",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Freeze profile, template and settings into --lock-out, then run
    Tune,
    /// Run with everything taken from --lock-in
    Eval,
}

impl Mode {
    fn as_str(&self) -> &'static str {
        match self {
            Mode::Tune => "tune",
            Mode::Eval => "eval",
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Turn a transcript into a requirements document
    Run {
        /// Utterance file (JSON array of {speaker, timestamp, text})
        #[arg(short, long)]
        input: PathBuf,

        /// Markdown output; snapshots and run_meta.json go next to it
        #[arg(short, long)]
        output_md: PathBuf,

        /// Profile file, created with defaults if missing
        #[arg(long, default_value = DEFAULT_PROFILE)]
        profile: PathBuf,

        #[arg(long, value_enum, default_value = "tune")]
        mode: Mode,

        /// Lock directory to create (tune)
        #[arg(long)]
        lock_out: Option<PathBuf>,

        /// Lock directory to use (eval)
        #[arg(long)]
        lock_in: Option<PathBuf>,

        /// Handlebars template to lock (tune); the built-in one otherwise
        #[arg(long)]
        template: Option<PathBuf>,

        #[arg(long, env = "ANTHROPIC_MODEL", default_value = DEFAULT_MODEL)]
        model: String,

        #[arg(long, env = "REQSYNTH_TEMPERATURE", default_value = "0.2")]
        temperature: f64,

        /// Normalizer calls in flight at once
        #[arg(long, default_value = "4")]
        concurrency: usize,

        /// Per-call normalizer timeout in seconds
        #[arg(long, default_value = "60")]
        timeout_secs: u64,

        /// Skip classification and start from this classified snapshot
        #[arg(long)]
        from_classified: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Reconcile and render a normalized snapshot (no LLM calls)
    Render {
        /// normalized.json
        #[arg(short, long)]
        normalized: PathBuf,

        #[arg(short, long)]
        output_md: PathBuf,

        /// Defaults to the profile recorded in the snapshot
        #[arg(long)]
        profile: Option<PathBuf>,

        #[arg(long)]
        template: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show what reconciliation does to a normalized snapshot
    Analyze {
        /// normalized.json
        #[arg(short, long)]
        normalized: PathBuf,

        /// Defaults to the profile recorded in the snapshot
        #[arg(long)]
        profile: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Write the default profile
    InitProfile {
        #[arg(long, default_value = DEFAULT_PROFILE)]
        profile: PathBuf,

        /// Overwrite an existing profile
        #[arg(long)]
        force: bool,
    },
}

/// Everything `run` needs once the lock has been resolved
struct RunArgs {
    input: PathBuf,
    output_md: PathBuf,
    mode: Mode,
    lock: ResolvedLock,
    api: AnthropicConfig,
    synthesis: SynthesisConfig,
    from_classified: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            input,
            output_md,
            profile,
            mode,
            lock_out,
            lock_in,
            template,
            model,
            temperature,
            concurrency,
            timeout_secs,
            from_classified,
            verbose,
        } => {
            setup_logging(verbose);
            let target = preflight(
                &input,
                from_classified.as_deref(),
                template.as_deref(),
                mode,
                lock_out,
                lock_in,
            )?;
            let api = AnthropicConfig::from_env()?;
            let lock = match target {
                LockTarget::Create(dir) => {
                    let settings = LockSettings { model, temperature };
                    create_lock(&dir, &profile, template.as_deref(), settings)?
                }
                LockTarget::Use(dir) => resolve_lock(&dir)?,
            };
            run_pipeline(RunArgs {
                input,
                output_md,
                mode,
                lock,
                api,
                synthesis: SynthesisConfig {
                    concurrency,
                    call_timeout: Duration::from_secs(timeout_secs),
                },
                from_classified,
            })
            .await
        }
        Commands::Render {
            normalized,
            output_md,
            profile,
            template,
            verbose,
        } => {
            setup_logging(verbose);
            render_snapshot(normalized, output_md, profile, template)
        }
        Commands::Analyze {
            normalized,
            profile,
            verbose,
        } => {
            setup_logging(verbose);
            analyze_snapshot(normalized, profile)
        }
        Commands::InitProfile { profile, force } => {
            setup_logging(false);
            init_profile(profile, force)
        }
    }
}

/// Lock directory to create (tune) or read (eval)
#[derive(Debug, PartialEq, Eq)]
enum LockTarget {
    Create(PathBuf),
    Use(PathBuf),
}

/// Argument and path checks for `run`. Nothing is written until these pass.
fn preflight(
    input: &Path,
    from_classified: Option<&Path>,
    template: Option<&Path>,
    mode: Mode,
    lock_out: Option<PathBuf>,
    lock_in: Option<PathBuf>,
) -> Result<LockTarget, PipelineError> {
    if !input.exists() {
        return Err(PipelineError::Config(format!("input not found: {:?}", input)));
    }
    if let Some(path) = from_classified.filter(|p| !p.exists()) {
        return Err(PipelineError::Config(format!("classified snapshot not found: {:?}", path)));
    }

    match mode {
        Mode::Tune => {
            if let Some(path) = template.filter(|p| !p.exists()) {
                return Err(PipelineError::Config(format!("template not found: {:?}", path)));
            }
            lock_out.map(LockTarget::Create).ok_or_else(|| {
                PipelineError::Config("--lock-out is required in tune mode".to_string())
            })
        }
        Mode::Eval => lock_in.map(LockTarget::Use).ok_or_else(|| {
            PipelineError::Config("--lock-in is required in eval mode".to_string())
        }),
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

async fn run_pipeline(args: RunArgs) -> Result<()> {
    let RunArgs {
        input,
        output_md,
        mode,
        lock,
        api,
        synthesis,
        from_classified,
    } = args;

    let settings = &lock.manifest.settings;
    let profile = load_profile(&lock.profile_path)?;
    let client = AnthropicClient::new(
        api.with_model(settings.model.clone())
            .with_temperature(settings.temperature),
    )?;

    let out_dir = output_md
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let classified_path = out_dir.join("classified.json");
    let normalized_path = out_dir.join("normalized.json");
    let run_meta_path = out_dir.join("run_meta.json");

    let t0 = Instant::now();

    // Stage 0: classification (or resume from a snapshot)
    let labeled = match &from_classified {
        Some(path) => {
            info!("Resuming from classified snapshot {:?}", path);
            let labeled = read_classified(path)?;
            if path != &classified_path {
                write_classified(&classified_path, &labeled)?;
            }
            labeled
        }
        None => {
            info!("Loading utterances from {:?}", input);
            let utterances =
                parse_utterance_file(&input).context("Failed to parse input utterances")?;
            let labeled = classify(&client, &utterances, &profile).await?;
            write_classified(&classified_path, &labeled)?;
            labeled
        }
    };
    let t1 = Instant::now();

    // Stage 1: synthesis
    let stage1 = execute_stage1(&client, &labeled, &profile, &synthesis).await?;
    let snapshot = NormalizedSnapshot {
        meta: NormalizedMeta {
            input_sha256: sha256_file(&classified_path)?,
            model: settings.model.clone(),
            temperature: settings.temperature,
            profile_path: lock.profile_path.display().to_string(),
            profile_sha256: sha256_file(&lock.profile_path)?,
        },
        records: stage1.records,
    };
    snapshot.write(&normalized_path)?;
    info!(
        "Stage 1: {} records ({} discarded, {} fallbacks) -> {:?}",
        snapshot.records.len(),
        stage1.discarded,
        stage1.fallbacks,
        normalized_path
    );
    let t2 = Instant::now();

    // Stage 2: reconciliation
    let reconciled = execute_stage2(snapshot.records.clone(), &profile);
    let t3 = Instant::now();

    // Stage 3: rendering
    let render_input = RenderInput::new(&reconciled, &snapshot.meta, &normalized_path);
    let render_config = RenderConfig {
        template_path: Some(lock.template_path.clone()),
    };
    let written = execute_stage3(&render_input, &output_md, &render_config)?;
    let t4 = Instant::now();

    let timing = StageTimings {
        classify_sec: secs(t1 - t0),
        normalize_sec: secs(t2 - t1),
        reconcile_sec: secs(t3 - t2),
        render_sec: secs(t4 - t3),
        total_sec: secs(t4 - t0),
    };

    let manifest = RunManifest {
        run_id: uuid::Uuid::new_v4().to_string(),
        timestamp: Local::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
        mode: mode.as_str().to_string(),
        input_sha256: sha256_file(&input)?,
        input,
        output_md: written.path.clone(),
        output_substituted: written.substituted,
        classified: classified_path.clone(),
        normalized: normalized_path.clone(),
        lock_dir: Some(lock.dir.clone()),
        lock_manifest: Some(lock.manifest.clone()),
        model: settings.model.clone(),
        temperature: settings.temperature,
        profile_sha256: sha256_file(&lock.profile_path)?,
        template_sha256: sha256_file(&lock.template_path)?,
        counts: counts(labeled.len(), snapshot.records.len(), &reconciled),
        timing,
    };
    manifest.write(&run_meta_path)?;

    println!("[TIME]");
    println!(" - classify:  {}", fmt_sec(manifest.timing.classify_sec));
    println!(" - normalize: {}", fmt_sec(manifest.timing.normalize_sec));
    println!(" - reconcile: {}", fmt_sec(manifest.timing.reconcile_sec));
    println!(" - render:    {}", fmt_sec(manifest.timing.render_sec));
    println!(" - total:     {}", fmt_sec(manifest.timing.total_sec));
    println!("[OK]");
    if written.substituted {
        println!(" - output_md:   {:?} (requested {:?} was locked)", written.path, output_md);
    } else {
        println!(" - output_md:   {:?}", written.path);
    }
    println!(" - classified:  {:?}", classified_path);
    println!(" - normalized:  {:?}", normalized_path);
    println!(" - run_meta:    {:?}", run_meta_path);

    Ok(())
}

fn counts(utterances: usize, records: usize, reconciled: &Reconciled) -> RunCounts {
    RunCounts {
        utterances,
        records,
        fr: reconciled.fr.len(),
        nfr: reconciled.nfr.len(),
        dec: reconciled.dec.len(),
        out_of_scope: reconciled.out_of_scope.len(),
    }
}

/// Snapshot plus the profile it should be reconciled with
fn load_snapshot(
    normalized: &Path,
    profile: Option<PathBuf>,
) -> Result<(NormalizedSnapshot, reqsynth::Profile)> {
    if !normalized.exists() {
        return Err(
            PipelineError::Config(format!("normalized snapshot not found: {:?}", normalized))
                .into(),
        );
    }
    let snapshot = NormalizedSnapshot::read(normalized)?;
    let profile_path = profile.unwrap_or_else(|| match snapshot.meta.profile_path.as_str() {
        "" => PathBuf::from(DEFAULT_PROFILE),
        recorded => PathBuf::from(recorded),
    });
    info!("Using profile {:?}", profile_path);
    let profile = load_profile(&profile_path)?;
    Ok((snapshot, profile))
}

fn render_snapshot(
    normalized: PathBuf,
    output_md: PathBuf,
    profile: Option<PathBuf>,
    template: Option<PathBuf>,
) -> Result<()> {
    let (snapshot, profile) = load_snapshot(&normalized, profile)?;
    let reconciled = execute_stage2(snapshot.records, &profile);

    let input = RenderInput::new(&reconciled, &snapshot.meta, &normalized);
    let written = execute_stage3(
        &input,
        &output_md,
        &RenderConfig {
            template_path: template,
        },
    )?;

    if written.substituted {
        println!("Wrote {:?} ({:?} was locked)", written.path, output_md);
    } else {
        println!("Wrote {:?}", written.path);
    }
    println!(
        "FR: {} NFR: {} DEC: {} Out of scope: {}",
        reconciled.fr.len(),
        reconciled.nfr.len(),
        reconciled.dec.len(),
        reconciled.out_of_scope.len()
    );
    Ok(())
}

fn analyze_snapshot(normalized: PathBuf, profile: Option<PathBuf>) -> Result<()> {
    let (snapshot, profile) = load_snapshot(&normalized, profile)?;
    let total = snapshot.records.len();
    let reconciled = execute_stage2(snapshot.records, &profile);
    let stats = &reconciled.stats;

    println!("Snapshot Analysis");
    println!("=================");
    println!("Records: {}", total);
    println!("Model: {}", snapshot.meta.model);
    println!();

    println!("Reconciliation");
    println!("--------------");
    println!("Tentative decisions dropped: {}", stats.tentative_dropped);
    println!("Superseded decisions: {}", stats.superseded);
    println!("Completed decisions: {}", stats.completed);
    println!("Moved to out of scope: {}", stats.excluded);
    println!("Conflicting FRs dropped: {}", stats.conflicts_dropped);
    println!("Duplicates removed: {}", stats.duplicates_removed);
    println!();

    println!("Result");
    println!("------");
    for (name, records) in [
        ("FR", &reconciled.fr),
        ("NFR", &reconciled.nfr),
        ("DEC", &reconciled.dec),
    ] {
        println!("{}: {}", name, records.len());
        for r in records.iter() {
            println!(
                "  {} [{}] {}",
                r.id.as_deref().unwrap_or("-"),
                r.feature,
                r.statement
            );
        }
    }
    println!("Out of scope: {}", reconciled.out_of_scope.len());
    for r in &reconciled.out_of_scope {
        println!("  [{}] {}", r.feature, r.statement);
    }

    Ok(())
}

fn init_profile(profile: PathBuf, force: bool) -> Result<()> {
    if force {
        write_default_profile(&profile)?;
        println!("Wrote default profile to {:?}", profile);
    } else if ensure_profile_exists(&profile)? {
        println!("Wrote default profile to {:?}", profile);
    } else {
        println!("{:?} already exists (use --force to overwrite)", profile);
    }
    Ok(())
}
