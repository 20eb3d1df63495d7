//! Interactive decisions made before a run starts.

use std::io::{BufRead, Write};

use anyhow::{bail, Context};
use notegen_core::{Checkpoint, ResumePolicy, RunRequest};

/// What to do with saved progress that applies to this run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeChoice {
    Resume,
    StartOver,
}

/// Parse an answer to the resume prompt.
pub fn parse_choice(answer: &str) -> Option<ResumeChoice> {
    match answer.trim().to_lowercase().as_str() {
        "r" | "resume" => Some(ResumeChoice::Resume),
        "s" | "start over" | "restart" => Some(ResumeChoice::StartOver),
        _ => None,
    }
}

fn read_answer<R: BufRead>(input: &mut R) -> anyhow::Result<String> {
    let mut line = String::new();
    let read = input.read_line(&mut line).context("Failed to read answer")?;
    if read == 0 {
        bail!("no answer given (end of input)");
    }
    Ok(line)
}

/// Ask whether to resume `checkpoint`, re-asking until the answer is valid.
pub fn ask_resume<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    checkpoint: &Checkpoint,
) -> anyhow::Result<ResumeChoice> {
    writeln!(
        output,
        "Found saved progress for {} ({} of {} chunks done).",
        checkpoint.source_id,
        checkpoint.next_index,
        checkpoint.total_chunks()
    )?;

    loop {
        write!(output, "Do you want to (r)esume or (s)tart over? ")?;
        output.flush()?;

        match parse_choice(&read_answer(input)?) {
            Some(choice) => return Ok(choice),
            None => writeln!(output, "Invalid choice. Please enter 'r' or 's'.")?,
        }
    }
}

/// Ask for the video to take notes on.
pub fn ask_source<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> anyhow::Result<String> {
    loop {
        write!(output, "Enter the YouTube video URL: ")?;
        output.flush()?;

        let answer = read_answer(input)?;
        let answer = answer.trim();
        if !answer.is_empty() {
            return Ok(answer.to_string());
        }
    }
}

/// Decide what to run from the command line, the saved job and the user's answers.
///
/// `pending` is the saved job that applies to `requested` (see
/// [`notegen_core::Pipeline::pending_job`]). `preset` answers the resume prompt
/// without asking.
pub fn resolve_request<R: BufRead, W: Write>(
    requested: Option<String>,
    pending: Option<&Checkpoint>,
    preset: Option<ResumeChoice>,
    input: &mut R,
    output: &mut W,
) -> anyhow::Result<RunRequest> {
    let Some(checkpoint) = pending else {
        let source_id = match requested {
            Some(id) => id,
            None => ask_source(input, output)?,
        };
        return Ok(RunRequest::new(source_id));
    };

    let choice = match preset {
        Some(choice) => choice,
        None => ask_resume(input, output, checkpoint)?,
    };

    match choice {
        ResumeChoice::Resume => {
            writeln!(output, "Resuming note generation...")?;
            Ok(RunRequest::new(checkpoint.source_id.clone()))
        }
        ResumeChoice::StartOver => {
            writeln!(output, "Starting over...")?;
            let source_id = match requested {
                Some(id) => id,
                None => ask_source(input, output)?,
            };
            Ok(RunRequest::new(source_id).with_policy(ResumePolicy::Discard))
        }
    }
}
