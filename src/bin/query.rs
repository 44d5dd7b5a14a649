// Copyright (c) 2025-present, catdice
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Query driver: one random pick against a built index.

use catdice::Session;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::filter::EnvFilter;

#[derive(Parser)]
#[command(
    name = "catdice-query",
    about = "Picks a random article from a built category-graph index"
)]
struct Args {
    /// Built store directory
    #[arg(long)]
    db_path: PathBuf,

    /// Root category to pick from
    #[arg(long)]
    category_name: String,

    /// Number of nested subcategory traversals to search
    #[arg(long, default_value_t = 0)]
    depth: u8,

    /// Log the traversal path behind the pick
    #[arg(long)]
    with_derivation: bool,
}

fn init_tracing() {
    tracing_log::LogTracer::init().expect("failed to set log tracer");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber).expect("failed to set subscriber");
}

fn main() {
    init_tracing();
    let args = Args::parse();
    if let Err(e) = run(&args) {
        tracing::error!("query failed: {e}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> catdice::Result<()> {
    let mut session = Session::open(&args.db_path)?;

    if let Some(description) = session.reader().describe(&args.category_name)? {
        tracing::debug!("{description}");
    }

    let picked = if args.with_derivation {
        let picked =
            session.pick_random_article_with_derivation(&args.category_name, args.depth)?;
        picked.map(|(page_id, derivation)| {
            tracing::info!("derivation: {}", derivation.join(" -> "));
            page_id
        })
    } else {
        session.pick_random_article(&args.category_name, args.depth)?
    };

    let Some(page_id) = picked else {
        tracing::error!(
            "no article found in category {:?} at depth {}",
            args.category_name,
            args.depth,
        );
        std::process::exit(1);
    };

    tracing::info!("article id: {page_id}");
    println!("https://en.wikipedia.org/?curid={page_id}");
    Ok(())
}
