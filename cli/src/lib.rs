pub mod cli;
pub mod output;
pub mod progress;
pub mod session;

use std::sync::Arc;

use anyhow::Context;
use notegen_core::{
    CheckpointStore, Config, FileSource, PipelineOutcome, Settings, TranscriptSource,
    YouTubeSource,
};
use tokio_util::sync::CancellationToken;

use crate::cli::Args;
use crate::progress::ProgressEmitter;

/// Initialize tracing/logging with the given directives
pub fn init_logging(directives: &[&str]) {
    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    for directive in directives {
        match directive.parse() {
            Ok(directive) => filter = filter.add_directive(directive),
            Err(e) => eprintln!("Ignoring log directive {:?}: {}", directive, e),
        }
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Run the command line session. Returns whether notes were written.
pub fn run(args: Args) -> bool {
    init_logging(args.log_directives());

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create Tokio runtime: {}", e);
            return false;
        }
    };

    match rt.block_on(run_session(args)) {
        Ok(completed) => completed,
        Err(e) => {
            tracing::error!("{:#}", e);
            false
        }
    }
}

async fn run_session(args: Args) -> anyhow::Result<bool> {
    let mut config = Config::load_or_default();
    let mut settings = Settings::load(&config.settings_file);
    args.apply_overrides(&mut config, &mut settings);

    if args.save_settings {
        settings.save(&config.settings_file)?;
        println!("Settings saved to {}.", config.settings_file.display());
    }

    if args.discard {
        let store = CheckpointStore::file(config.checkpoint_file.clone());
        store.clear().context("Failed to discard saved progress")?;
        println!("Saved progress discarded ({}).", store.location());
        return Ok(true);
    }

    output::check_output(&args.output)?;

    println!("YouTube Academic Note Generator");

    let source: Arc<dyn TranscriptSource> = if args.transcript_file.is_some() {
        let cwd = std::env::current_dir().context("Failed to read the current directory")?;
        Arc::new(FileSource::with_base_dir(cwd))
    } else {
        Arc::new(YouTubeSource::new(settings.request_timeout())?)
    };

    let cancel = CancellationToken::new();
    let pipeline = notegen_core::open_pipeline(&config, &settings, source)?
        .with_emitter(Arc::new(ProgressEmitter::new()))
        .with_cancel_token(cancel.clone());

    let requested = args.source_id();
    let pending = pipeline.pending_job(requested.as_deref());
    let request = {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        session::resolve_request(
            requested,
            pending.as_ref(),
            args.preset_choice(),
            &mut stdin.lock(),
            &mut stdout,
        )?
    };

    tokio::spawn(watch_interrupts(cancel));

    let outcome = pipeline.run(request).await?;
    tracing::info!(
        state = %outcome.state(),
        source_id = outcome.source_id(),
        "Run finished"
    );

    let total_chunks = match &outcome {
        PipelineOutcome::Completed { total_chunks, .. } => *total_chunks,
        PipelineOutcome::PartiallyFailed {
            next_index,
            total_chunks,
            error,
            ..
        } => {
            eprintln!(
                "\nNote generation stopped at chunk {} of {}: {}",
                next_index + 1,
                total_chunks,
                error
            );
            if *next_index > 0 && error.is_resumable() {
                eprintln!(
                    "Progress is saved to {}. Run notegen again to resume.",
                    pipeline.store().location()
                );
            } else if *next_index > 0 {
                eprintln!(
                    "Progress is saved to {}. Fix the problem above, then run notegen again to resume.",
                    pipeline.store().location()
                );
            }
            return Ok(false);
        }
    };

    let document = outcome.into_document();
    let written = match output::save_notes(&args.output, &document, &config.data_dir) {
        Ok(path) => path,
        Err(e) => {
            // Last resort: the checkpoint is already cleared
            println!("{}", document);
            return Err(e);
        }
    };

    println!(
        "\nNotes successfully generated from {} chunks and saved to {}",
        total_chunks,
        written.display()
    );
    Ok(true)
}

/// Cancel the run on the first Ctrl+C and exit on the second.
async fn watch_interrupts(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_err() {
        return;
    }
    eprintln!("\nInterrupted; stopping after the current chunk (Ctrl+C again to quit now)...");
    cancel.cancel();

    if tokio::signal::ctrl_c().await.is_ok() {
        eprintln!("\nQuitting; progress up to the last finished chunk is saved.");
        std::process::exit(130);
    }
}
