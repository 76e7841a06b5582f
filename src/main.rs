mod cli;
mod clients;
mod error;
mod generate;
mod prompts;
mod roadmap;
mod server;
mod storage;
mod types;

mod metadata {
    include!(concat!(env!("OUT_DIR"), "/pkg_info.rs"));
}

use std::io::Read;
use std::net::SocketAddr;
use std::path::Path;

use clap::{Parser, ValueEnum};
use colored::Colorize;
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto::Builder,
    service::TowerToHyperService,
};
use rmcp::transport::streamable_http_server::{
    StreamableHttpService, session::local::LocalSessionManager,
};
use rmcp::{ServiceExt, transport::stdio};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{
    Cli, Command, EntryArguments, GenerateArguments, ParseArguments, PlanArguments,
    ResetArguments, ServeArguments, TopicsArguments,
};
use crate::error::{ServiceError, ServiceResult};
use crate::prompts::week_export_text;
use crate::roadmap::build_weekly_plan;
use crate::server::RoadmapServer;
use crate::storage::{PlanProgress, log_plan_changes};
use crate::types::{GenerateRequest, PlanKind, TopicItem, WeekRecord};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli.command).await {
        eprintln!("{}: {e}", "error".red());
        std::process::exit(1);
    }
}

async fn run(command: Command) -> ServiceResult<()> {
    match command {
        Command::Serve(args) => serve(args).await,
        Command::Generate(args) => generate(args).await,
        Command::Parse(args) => parse(args),
        Command::Topics(args) => topics(args),
        Command::Progress(args) => progress(args),
        Command::Toggle(args) => {
            let index = args.index()?;
            let mut store = args.plan.store.open_store()?;
            let done = store.toggle_completed(args.plan.kind, index)?;
            store.save()?;
            let state = if done { "done".green() } else { "open".yellow() };
            println!("{} {} is now {state}", entry_label(args.plan.kind), args.position);
            print_progress(&store.progress(args.plan.kind));
            Ok(())
        }
        Command::Link(args) => {
            let index = args.entry.index()?;
            let mut store = args.entry.plan.store.open_store()?;
            store.set_project_link(args.entry.plan.kind, index, &args.url)?;
            store.save()?;
            println!("{} project link saved", "✓".green());
            Ok(())
        }
        Command::Reflect(args) => {
            let index = args.entry.index()?;
            let mut store = args.entry.plan.store.open_store()?;
            store.set_reflection(args.entry.plan.kind, index, &args.text)?;
            store.save()?;
            println!("{} reflection saved", "✓".green());
            Ok(())
        }
        Command::Export(args) => export(args),
        Command::Reset(args) => reset(args),
        Command::Version => {
            println!("{} {}", metadata::BIN_NAME, metadata::PKG_VERSION);
            Ok(())
        }
    }
}

async fn serve(args: ServeArguments) -> ServiceResult<()> {
    args.validate().map_err(ServiceError::Config)?;
    let store = args.store.open_store()?;
    for kind in PlanKind::value_variants() {
        log_plan_changes(&store, *kind);
    }
    let curated = args.store.curated()?;
    let server = RoadmapServer::new(args.providers.clone(), store, curated);
    tracing::info!(
        "Starting {} {} (stdio: {}, http: {})",
        metadata::PKG_NAME,
        metadata::PKG_VERSION,
        args.enable_stdio,
        args.enable_http
    );

    let ct = CancellationToken::new();
    let mut handles = Vec::new();

    if args.enable_stdio {
        let running = server
            .clone()
            .serve(stdio())
            .await
            .map_err(|e| ServiceError::Other(format!("stdio transport failed: {e}")))?;
        let ct = ct.clone();
        handles.push(tokio::spawn(async move {
            tokio::select! {
                _ = running.waiting() => {}
                _ = ct.cancelled() => {}
            }
        }));
    }

    if args.enable_http {
        let addr: SocketAddr = args.http_addr.parse().map_err(|e| {
            ServiceError::Config(format!("Invalid SYNCVERSE_HTTP_ADDR '{}': {e}", args.http_addr))
        })?;
        let factory = server.clone();
        let http_service = TowerToHyperService::new(StreamableHttpService::new(
            move || Ok(factory.clone()),
            LocalSessionManager::default().into(),
            Default::default(),
        ));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("streamable HTTP listening on http://{addr}");
        let ct = ct.clone();
        handles.push(tokio::spawn(async move {
            loop {
                let stream = tokio::select! {
                    _ = ct.cancelled() => break,
                    accepted = listener.accept() => match accepted {
                        Ok((s, _)) => s,
                        Err(e) => {
                            tracing::warn!("accept failed: {e}");
                            continue;
                        }
                    },
                };
                let io = TokioIo::new(stream);
                let service = http_service.clone();
                tokio::spawn(async move {
                    let _ = Builder::new(TokioExecutor::default())
                        .serve_connection(io, service)
                        .await;
                });
            }
        }));
    }

    let shutdown = ct.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutting down");
            shutdown.cancel();
        }
    });

    for handle in handles {
        let _ = handle.await;
    }
    ct.cancel();
    Ok(())
}

fn read_input(file: Option<&Path>) -> ServiceResult<Value> {
    let raw = match file {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    Ok(serde_json::from_str(&raw).unwrap_or(Value::String(raw)))
}

fn entry_label(kind: PlanKind) -> &'static str {
    if kind.is_weekly() { "Week" } else { "Topic" }
}

fn print_json(value: &impl serde::Serialize) -> ServiceResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_weeks(weeks: &[WeekRecord]) {
    for week in weeks {
        let mark = if week.completed { "✓".green() } else { "•".dimmed() };
        println!("{mark} {} {}", format!("Week {}:", week.week).bold(), week.title);
        for detail in &week.details {
            println!("    {detail}");
        }
        for repo in &week.repos {
            println!("    {} {}", "repo".cyan(), repo);
        }
        for playlist in &week.youtube {
            println!("    {} {}", "video".cyan(), playlist);
        }
        for project in &week.projects {
            println!("    {} {}", "project".magenta(), project);
        }
        if !week.project_link.is_empty() {
            println!("    {} {}", "link".green(), week.project_link);
        }
    }
}

fn print_topics(topics: &[TopicItem]) {
    for (i, topic) in topics.iter().enumerate() {
        let mark = if topic.completed { "✓".green() } else { "•".dimmed() };
        println!("{mark} {}. {}", i + 1, topic.title.bold());
        if !topic.short_description.is_empty() {
            println!("    {}", topic.short_description);
        }
        for sub in &topic.subtopics {
            println!("    - {sub}");
        }
    }
}

fn print_progress(progress: &PlanProgress) {
    println!(
        "{} {}/{} ({:.0}%)",
        format!("{} plan:", progress.kind).bold(),
        progress.completed,
        progress.total,
        progress.percent
    );
    if let Some(next) = &progress.next_title {
        println!("{} {next}", "next:".cyan());
    }
    println!("{}", progress.pace.dimmed());
}

async fn generate(args: GenerateArguments) -> ServiceResult<()> {
    let backend = args.providers.backend()?;
    let request = GenerateRequest {
        topic: args.topic.clone().unwrap_or_default(),
        current_knowledge: args.knowledge.clone(),
        premium: args.premium,
    };
    let response = tokio::task::spawn_blocking(move || {
        crate::generate::generate_roadmap(&request, &backend)
    })
    .await
    .map_err(|e| ServiceError::Other(format!("generation task failed: {e}")))??;

    if args.save {
        let kind = if args.premium { PlanKind::Premium } else { PlanKind::Free };
        let mut store = args.store.open_store()?;
        store.put_weeks(kind, &response.weeks)?;
        store.save()?;
        tracing::info!(%kind, "saved roadmap");
    }
    if args.json {
        return print_json(&response);
    }
    println!("{} ({} weeks)", response.title.bold().green(), response.duration_weeks);
    print_weeks(&response.weeks);
    Ok(())
}

fn parse(args: ParseArguments) -> ServiceResult<()> {
    let input = read_input(args.file.as_deref())?;
    let weeks = build_weekly_plan(Some(&input), &args.topic);
    if let Some(kind) = args.save_as {
        if !kind.is_weekly() {
            return Err(ServiceError::Other(
                "the basic plan holds topics; use the topics command".to_string(),
            ));
        }
        let mut store = args.store.open_store()?;
        store.put_weeks(kind, &weeks)?;
        store.save()?;
    }
    if args.json {
        return print_json(&weeks);
    }
    print_weeks(&weeks);
    Ok(())
}

fn topics(args: TopicsArguments) -> ServiceResult<()> {
    let input = read_input(args.file.as_deref())?;
    let table = args.store.curated()?;
    let topics = crate::roadmap::build_topic_plan(
        Some(&input),
        &args.query,
        args.knowledge.as_deref(),
        &table,
    );
    if args.save {
        let mut store = args.store.open_store()?;
        store.put_topics(PlanKind::Basic, &topics)?;
        store.save()?;
    }
    if args.json {
        return print_json(&topics);
    }
    print_topics(&topics);
    Ok(())
}

fn progress(args: PlanArguments) -> ServiceResult<()> {
    let store = args.store.open_store()?;
    if args.kind.is_weekly() {
        print_weeks(&store.load_weeks(args.kind));
    } else {
        print_topics(&store.load_topics(args.kind));
    }
    print_progress(&store.progress(args.kind));
    Ok(())
}

fn export(args: EntryArguments) -> ServiceResult<()> {
    let index = args.index()?;
    if !args.plan.kind.is_weekly() {
        return Err(ServiceError::Other(format!("{} plans have no weeks", args.plan.kind)));
    }
    let weeks = args.plan.store.open_store()?.load_weeks(args.plan.kind);
    if weeks.is_empty() {
        return Err(ServiceError::PlanNotFound(args.plan.kind.to_string()));
    }
    let len = weeks.len();
    let week = weeks
        .get(index)
        .ok_or(ServiceError::IndexOutOfRange { index, len })?;
    println!("{}", week_export_text(week));
    Ok(())
}

fn reset(args: ResetArguments) -> ServiceResult<()> {
    let kind = args.plan.kind;
    if !args.yes {
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(format!("Forget the saved {kind} plan?"))
            .default(false)
            .interact()
            .map_err(|e| ServiceError::Other(e.to_string()))?;
        if !confirmed {
            println!("{}", "kept".yellow());
            return Ok(());
        }
    }
    let mut store = args.plan.store.open_store()?;
    if store.reset(kind) {
        store.save()?;
        println!("{} {kind} plan cleared", "✓".green());
    } else {
        println!("no saved {kind} plan");
    }
    Ok(())
}
