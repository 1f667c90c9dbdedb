use std::env;

use folio_embed::DeterministicEmbedder;
use folio_engine::{FolioConfig, FolioEngine};
use folio_model::SourceId;

fn print_usage() {
    eprintln!(
        "Usage:\n\
         folio ingest <db_path> --file PATH --source ID [--name NAME] [--async] [--embed]\n\
         folio search <db_path> --query Q [--source ID] [--k N]\n\
         folio search-context <db_path> --query Q [--source ID] [--k N] [--expand N]\n\
         folio search-hybrid <db_path> --query Q [--source ID] [--k N] [--expand N] [--w-bm25 F]\n\
         folio fetch-document <db_path> --source ID [--anchor TEXT] [--start-page N] [--expand N] [--max-chars N]\n\
         folio backfill <db_path> [--source ID] [--batch N]\n\
         \n\
         db_path accepts a real file path or the literal \":memory:\".\n\
         Set RUST_LOG (or pass -v) to raise log verbosity.\n"
    );
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn take_flag(args: &mut Vec<String>, flag: &str) -> bool {
    if let Some(pos) = args.iter().position(|a| a == flag) {
        args.remove(pos);
        true
    } else {
        false
    }
}

fn take_value(args: &mut Vec<String>, flag: &str) -> Option<String> {
    let pos = args.iter().position(|a| a == flag)?;
    if pos + 1 >= args.len() {
        return None;
    }
    args.remove(pos);
    Some(args.remove(pos))
}

/// A demonstration embedder standing in for a real model backend: deterministic
/// and dependency-free, so `--embed`/hybrid flags are exercisable without an
/// external process wired up.
fn demo_embedder() -> DeterministicEmbedder {
    DeterministicEmbedder::new(32, 0xF0110).expect("fixed positive dimension")
}

fn open_engine(db_path: &str, with_embedder: bool) -> Result<FolioEngine, String> {
    let config = FolioConfig { db_path: db_path.into(), ..FolioConfig::default() };
    let engine = FolioEngine::open(config).map_err(|e| e.to_string())?;
    Ok(if with_embedder { engine.with_embedder(demo_embedder()) } else { engine })
}

fn do_ingest(db_path: String, mut rest: Vec<String>) -> Result<(), String> {
    let file = take_value(&mut rest, "--file").ok_or("--file is required")?;
    let source = take_value(&mut rest, "--source").ok_or("--source is required")?;
    let name = take_value(&mut rest, "--name").unwrap_or_else(|| file.clone());
    let use_async = take_flag(&mut rest, "--async");
    let use_embed = take_flag(&mut rest, "--embed");

    let engine = open_engine(&db_path, use_embed)?;
    let source_id = SourceId::from(source);

    if use_async {
        engine.ingest_async(&file, &source_id, &name).map_err(|e| e.to_string())?;
    } else {
        engine.ingest(&file, &source_id, &name).map_err(|e| e.to_string())?;
    }
    println!("ingested {file} as source {source_id}");
    Ok(())
}

fn do_search(db_path: String, mut rest: Vec<String>) -> Result<(), String> {
    let query = take_value(&mut rest, "--query").ok_or("--query is required")?;
    let source = take_value(&mut rest, "--source").map(SourceId::from);
    let k: usize = take_value(&mut rest, "--k").and_then(|v| v.parse().ok()).unwrap_or(10);

    let engine = open_engine(&db_path, false)?;
    let hits = engine.search(&query, source.as_ref(), k).map_err(|e| e.to_string())?;
    println!("{} hits", hits.len());
    for (i, hit) in hits.iter().enumerate() {
        println!("{:>2}. [{}] bm25={:.4} {}", i + 1, hit.source_id, hit.bm25, hit.excerpt);
    }
    Ok(())
}

fn do_search_context(db_path: String, mut rest: Vec<String>) -> Result<(), String> {
    let query = take_value(&mut rest, "--query").ok_or("--query is required")?;
    let source = take_value(&mut rest, "--source").map(SourceId::from);
    let k: usize = take_value(&mut rest, "--k").and_then(|v| v.parse().ok()).unwrap_or(10);
    let expand: i64 = take_value(&mut rest, "--expand").and_then(|v| v.parse().ok()).unwrap_or(1);

    let engine = open_engine(&db_path, false)?;
    let passages = engine
        .search_with_context(&query, source.as_ref(), k, expand)
        .map_err(|e| e.to_string())?;
    print_passages(&passages);
    Ok(())
}

fn do_search_hybrid(db_path: String, mut rest: Vec<String>) -> Result<(), String> {
    let query = take_value(&mut rest, "--query").ok_or("--query is required")?;
    let source = take_value(&mut rest, "--source").map(SourceId::from);
    let k: usize = take_value(&mut rest, "--k").and_then(|v| v.parse().ok()).unwrap_or(10);
    let expand: i64 = take_value(&mut rest, "--expand").and_then(|v| v.parse().ok()).unwrap_or(1);
    let w_bm25: f64 = take_value(&mut rest, "--w-bm25").and_then(|v| v.parse().ok()).unwrap_or(0.5);

    let engine = open_engine(&db_path, true)?;
    let passages = engine
        .search_hybrid(&query, source.as_ref(), k, expand, w_bm25)
        .map_err(|e| e.to_string())?;
    print_passages(&passages);
    Ok(())
}

fn print_passages(passages: &[folio_model::Passage]) {
    println!("{} passages", passages.len());
    for (i, p) in passages.iter().enumerate() {
        let fused = p.fused.map(|f| format!(" fused={f:.4}")).unwrap_or_default();
        let cosine = p.cosine.map(|c| format!(" cosine={c:.4}")).unwrap_or_default();
        println!(
            "{:>2}. [{}] p.{:?}-{:?} bm25={:.4}{cosine}{fused}",
            i + 1,
            p.source_id,
            p.start_page,
            p.end_page,
            p.bm25
        );
        println!("    {}", truncate_chars(&p.text, 160));
    }
}

fn do_fetch_document(db_path: String, mut rest: Vec<String>) -> Result<(), String> {
    let source = take_value(&mut rest, "--source").ok_or("--source is required")?;
    let anchor = take_value(&mut rest, "--anchor");
    let start_page: Option<i64> = take_value(&mut rest, "--start-page").and_then(|v| v.parse().ok());
    let expand: i64 = take_value(&mut rest, "--expand").and_then(|v| v.parse().ok()).unwrap_or(1);
    let max_chars: Option<usize> = take_value(&mut rest, "--max-chars").and_then(|v| v.parse().ok());

    let engine = open_engine(&db_path, false)?;
    let source_id = SourceId::from(source);
    let slice = engine
        .fetch_document(&source_id, start_page, anchor.as_deref(), expand, max_chars)
        .map_err(|e| e.to_string())?;

    println!("{} (p.{:?}-{:?})", slice.display_name, slice.start_page, slice.end_page);
    println!("{}", slice.text);
    Ok(())
}

fn do_backfill(db_path: String, mut rest: Vec<String>) -> Result<(), String> {
    let source = take_value(&mut rest, "--source").map(SourceId::from);
    let batch: usize = take_value(&mut rest, "--batch").and_then(|v| v.parse().ok()).unwrap_or(32);

    let engine = open_engine(&db_path, true)?;
    let embedded = engine.backfill_embeddings(source.as_ref(), batch).map_err(|e| e.to_string())?;
    println!("embedded {embedded} chunk(s)");
    Ok(())
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    let mut it = s.chars();
    let truncated: String = it.by_ref().take(max_chars).collect();
    if it.next().is_some() {
        format!("{truncated}…")
    } else {
        truncated
    }
}

fn main() {
    let mut args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        print_usage();
        return;
    }

    let verbose = take_flag(&mut args, "-v");
    init_logging(verbose);

    let cmd = args.remove(0);
    if args.is_empty() {
        print_usage();
        return;
    }
    let db_path = args.remove(0);

    let res = match cmd.as_str() {
        "ingest" => do_ingest(db_path, args),
        "search" => do_search(db_path, args),
        "search-context" => do_search_context(db_path, args),
        "search-hybrid" => do_search_hybrid(db_path, args),
        "fetch-document" => do_fetch_document(db_path, args),
        "backfill" => do_backfill(db_path, args),
        _ => {
            print_usage();
            return;
        }
    };

    if let Err(err) = res {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
