//! Subcommand implementations. Reports are built as strings and printed by
//! [`run`].

use std::fmt::Write as _;
use std::path::Path;

use chrono::{DateTime, Local};
use palaver_common::{ModelCatalog, PalaverError};
use palaver_config::PalaverConfig;
use palaver_engine::archive::ArchiveEntry;
use palaver_engine::token_accountant::Preflight;
use palaver_engine::{ContentPart, ContextAssembler, FsBlobSource, Role, Session, SessionArchive};

use crate::cli::Command;

pub fn run(command: &Command, config: &PalaverConfig) -> Result<(), PalaverError> {
    let report = match command {
        Command::New { output, model } => new_session(config, output, model.as_deref())?,
        Command::Models => models_report(&config.models.catalog()?),
        Command::Inspect { document } => inspect_report(&read_session(document)?),
        Command::Estimate { document, input } => estimate_report(
            read_session(document)?,
            input,
            config.session.chars_per_token,
            config.session.budget_warning_ratio,
        )?,
        Command::Sessions => {
            let archive = SessionArchive::from_config(&config.archive)?;
            sessions_report(archive.dir(), &archive.list()?)
        }
        Command::Recover { document } => recover(document)?,
        Command::Bundle { document, output } => {
            let session = read_session(document)?;
            let text = palaver_engine::export_bundled(&session, &FsBlobSource)?;
            std::fs::write(output, text)?;
            format!(
                "wrote {} with {} attachment(s) embedded",
                output.display(),
                session.attachments().len()
            )
        }
        Command::Config => palaver_config::config_to_json(config),
    };
    println!("{report}");
    Ok(())
}

fn new_session(
    config: &PalaverConfig,
    output: &Path,
    model: Option<&str>,
) -> Result<String, PalaverError> {
    let catalog = config.models.catalog()?;
    let session = Session::start(Some(config.session.system_role.clone()), &catalog, model)?;
    std::fs::write(output, palaver_engine::export(&session)?)?;
    Ok(format!(
        "started {} on {} ({} context tokens)",
        output.display(),
        session.model_id(),
        session.budget().max_context_tokens
    ))
}

fn read_session(path: &Path) -> Result<Session, PalaverError> {
    let text = std::fs::read_to_string(path)?;
    tracing::debug!(path = %path.display(), "reading session document");
    Ok(palaver_engine::import(&text)?)
}

fn models_report(catalog: &ModelCatalog) -> String {
    let mut out = String::new();
    for (id, budget) in catalog.iter() {
        let marker = if id == catalog.default_model() { "*" } else { " " };
        let _ = writeln!(
            out,
            "{marker} {id:<28} context {:>9}  output {:>7}",
            budget.max_context_tokens, budget.max_output_tokens
        );
    }
    out.trim_end().to_string()
}

fn inspect_report(session: &Session) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "model:       {}", session.model_id());
    let role = session
        .system_role()
        .and_then(|r| r.lines().next())
        .unwrap_or("(none)");
    let _ = writeln!(out, "role:        {role}");
    let _ = writeln!(
        out,
        "turns:       {} ({} exchanges)",
        session.history().len(),
        session.exchange_count()
    );
    if session.history().last().map(|t| t.role) == Some(Role::User) {
        let _ = writeln!(out, "             last prompt is unanswered");
    }

    let _ = writeln!(out, "canvases:    {}", session.canvases().occupied());
    for canvas in session.canvases().iter() {
        let _ = writeln!(
            out,
            "  [{}] {} ({} lines{})",
            canvas.slot_index,
            canvas.label,
            canvas.content.lines().count(),
            if canvas.edited { ", edited" } else { "" }
        );
    }

    let _ = writeln!(out, "attachments: {}", session.attachments().len());
    for attachment in session.attachments() {
        let cached = if attachment.extracted_text.is_some() {
            "text cached"
        } else {
            "no text"
        };
        let _ = writeln!(
            out,
            "  {:?} {} ({cached})",
            attachment.kind, attachment.reference
        );
    }

    let budget = session.budget();
    let _ = write!(
        out,
        "tokens:      {} used, {} of {} remaining",
        session.cumulative_tokens(),
        session.remaining(),
        budget.max_context_tokens
    );
    if let Some(usage) = session.last_usage() {
        let (input, output) = session.tokens().usage_share(&usage);
        let _ = write!(
            out,
            "\nlast turn:   {} in ({input:.2}% of context), {} out ({output:.2}% of output limit)",
            usage.input_tokens, usage.output_tokens
        );
    }
    out
}

fn estimate_report(
    mut session: Session,
    input: &str,
    chars_per_token: f64,
    warning_ratio: f64,
) -> Result<String, PalaverError> {
    session.set_chars_per_token(chars_per_token);
    // BudgetExceeded surfaces as an error so the exit status is non-zero.
    let payload = ContextAssembler::new().assemble(&session, &[ContentPart::text(input)])?;
    let estimated = session.tokens().estimate(&payload);
    let remaining = session.remaining();
    let mut out = format!(
        "~{estimated} tokens across {} segments; {remaining} remaining",
        payload.segments().len()
    );
    if session.tokens().preflight(estimated, warning_ratio) == Preflight::NearLimit {
        out.push_str("\nwarning: this prompt uses most of the remaining budget");
    }
    Ok(out)
}

fn sessions_report(dir: &Path, entries: &[ArchiveEntry]) -> String {
    if entries.is_empty() {
        return format!("no saved sessions in {}", dir.display());
    }
    entries
        .iter()
        .map(|entry| {
            let modified: DateTime<Local> = entry.modified.into();
            format!("{}  {}", modified.format("%Y-%m-%d %H:%M"), entry.name)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn recover(path: &Path) -> Result<String, PalaverError> {
    let mut session = read_session(path)?;
    let Some(draft) = session.recover_interrupted() else {
        return Ok("nothing to recover".to_string());
    };
    std::fs::write(path, palaver_engine::export(&session)?)?;
    tracing::info!(path = %path.display(), "interrupted prompt recovered");
    Ok(draft
        .iter()
        .map(|part| match part {
            ContentPart::Text { text } => text.clone(),
            ContentPart::Attachment { reference } => format!("[Attachment: {reference}]"),
            ContentPart::Canvas { slot } => format!("[Canvas slot {slot}]"),
        })
        .collect::<Vec<_>>()
        .join("\n"))
}
