// SPDX-FileCopyrightText: © 2024 David Bliss
//
// SPDX-License-Identifier: GPL-3.0-or-later

mod config;

use anyhow::{Context, Result};
use clap::Parser;
use config::{Cli, Command, Config, TagAction};
use memelet_core::ai::{FfmpegFrameExtractor, OpenAiClient, PayloadBuilder};
use memelet_core::meme::{Details, Layout, MemeItem, Tag};
use memelet_core::{database, Library, MemeId, ProcessOptions, ProcessOutcome, TagTarget};
use std::sync::{Arc, Mutex};
use tracing::info;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_timer(ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let library = open_library(&cli.config)?;

    match cli.command {
        Command::Scan => {
            let summary = library.scan()?;
            println!(
                "discovered: {}, new: {}, removed: {}, restored: {}, album files added: {}, album files removed: {}, skipped: {}",
                summary.discovered,
                summary.new,
                summary.removed,
                summary.restored,
                summary.members_added,
                summary.members_removed,
                summary.skipped
            );
        }
        Command::Process { retry_errors, id } => {
            let options = ProcessOptions {
                retry_errors,
                single_id: id.map(MemeId::new),
            };
            process(&library, &options)?;
        }
        Command::Run { retry_errors } => {
            library.scan()?;
            let options = ProcessOptions {
                retry_errors,
                single_id: None,
            };
            process(&library, &options)?;
        }
        Command::ReconcileTags { id } => {
            let target = id.map(|id| TagTarget::One(MemeId::new(id))).unwrap_or(TagTarget::All);
            let summary = library.reconcile_tags(target)?;
            println!("reconciled: {}, changed: {}", summary.reconciled, summary.changed);
        }
        Command::Stats => {
            let stats = library.stats()?;
            println!("total:      {}", stats.total);
            println!("new:        {}", stats.new);
            println!("processing: {}", stats.processing);
            println!("done:       {}", stats.done);
            println!("error:      {}", stats.error);
            println!("missing:    {}", stats.missing);
        }
        Command::List { status } => {
            let items = match status {
                Some(status) => library.find_by_status(status)?,
                None => library.all()?,
            };
            for item in items {
                println!(
                    "{}\t{}\t{}{}\t{}",
                    item.meme_id,
                    item.status.as_ref(),
                    item.path().display(),
                    if item.is_missing { " (missing)" } else { "" },
                    item.tag_names().join(", ")
                );
            }
        }
        Command::Show { id } => {
            let meme_id = MemeId::new(id);
            let item = library
                .get(meme_id)?
                .ok_or(memelet_core::Error::MemeNotFound(meme_id))?;
            show(&item);
        }
        Command::Edit {
            id,
            description,
            references,
            template,
            caption,
            meaning,
            status,
        } => {
            let meme_id = MemeId::new(id);
            let item = library
                .get(meme_id)?
                .ok_or(memelet_core::Error::MemeNotFound(meme_id))?;

            let details = Details {
                description: description.or(item.details.description),
                references: references.or(item.details.references),
                template: template.or(item.details.template),
                caption: caption.or(item.details.caption),
                meaning: meaning.or(item.details.meaning),
            };
            library.update_details(meme_id, &details, status)?;
        }
        Command::Tag { action } => {
            let tags = match action {
                TagAction::Add { id, tag } => library.add_tag(MemeId::new(id), &tag)?,
                TagAction::Rm { id, tag } => library.remove_tag(MemeId::new(id), &tag)?,
            };
            println!("{}", tag_list(&tags));
        }
        Command::Reorder { id, members } => {
            library.reorder_album(MemeId::new(id), &members)?;
        }
        Command::Remove { id } => {
            library.remove(MemeId::new(id))?;
        }
    }

    Ok(())
}

fn open_library(config: &Config) -> Result<Library> {
    let con = database::setup(&config.db_path)?;
    let con = Arc::new(Mutex::new(con));

    let payload = PayloadBuilder::new(
        &config.memes_dir,
        config.ai_max_upload_bytes,
        config.ai_settings().max_album_parts,
        Arc::new(FfmpegFrameExtractor),
    );
    let analyzer = OpenAiClient::build(config.ai_settings(), payload)
        .context("build AI client")?;

    Library::open(
        &config.memes_dir,
        con,
        config.library_settings(),
        Arc::new(analyzer),
    )
}

fn process(library: &Library, options: &ProcessOptions) -> Result<()> {
    match library.process(options)? {
        ProcessOutcome::Completed(summary) => {
            println!(
                "processed: {}, succeeded: {}, failed: {}, recovered: {}",
                summary.processed, summary.succeeded, summary.failed, summary.recovered
            );
        }
        ProcessOutcome::AlreadyRunning(owner) => {
            info!("Process {} is already processing memes", owner.pid);
            println!("already running (pid {})", owner.pid);
        }
    }
    Ok(())
}

fn show(item: &MemeItem) {
    println!("id:          {}", item.meme_id);
    println!("path:        {}", item.path().display());
    println!("layout:      {}", item.layout.name());
    if let Layout::Album { members, .. } = &item.layout {
        for member in members {
            println!("  {}", member.path.display());
        }
    }
    println!("status:      {}", item.status.as_ref());
    if item.is_missing {
        println!("missing:     yes");
    }
    if let Some(error) = &item.error {
        println!("error:       {}", error.message);
    }

    let fields = [
        ("description", &item.details.description),
        ("references", &item.details.references),
        ("template", &item.details.template),
        ("caption", &item.details.caption),
        ("meaning", &item.details.meaning),
    ];
    for (name, value) in fields {
        if let Some(value) = value {
            println!("{:<12} {}", format!("{}:", name), value);
        }
    }

    println!("tags:        {}", tag_list(&item.tags));
    if let Some(processed_at) = item.processed_at {
        println!("processed:   {}", processed_at);
    }
    println!("created:     {}", item.created_at);
}

fn tag_list(tags: &[Tag]) -> String {
    tags.iter()
        .map(|t| format!("{} ({})", t.name, t.source.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}
