use std::{io::Read, path::Path};

use clap::Parser;
use mqlhelp::{
    DataDir,
    DocIndex,
    DocRoots,
    ErrorStore,
    QueryEngine,
    docs,
    error,
    error_store::{ErrorSearchResult, NewError},
    formatter::{self, Mode},
    mcp,
    report,
};
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Command, ErrorsAction};

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("MQLHELP_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    // stdout is reserved for MCP traffic.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> error::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match cli.command {
        Command::Mcp => {
            let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;
            let roots = DocRoots::resolve(cli.docs_dir.as_deref())?;
            mcp::run_mcp(&data_dir, roots)?;
        }
        Command::Query(args) => {
            let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;
            let index = load_index(cli.docs_dir.as_deref())?;
            let store = ErrorStore::new(data_dir.errors_db());

            let result = QueryEngine::new(&index, &store)
                .query(&args.query, Mode::from(args.mode))?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print!("{}", formatter::render_text(&result, &args.query));
            }
            store.close()?;
        }
        Command::Search(args) => {
            let index = load_index(cli.docs_dir.as_deref())?;
            let search = docs::search_docs(&index, &args.query, args.count);
            if args.json {
                println!("{}", serde_json::to_string_pretty(&search)?);
            } else {
                println!("{}", search.render());
            }
        }
        Command::Get(args) => {
            let index = load_index(cli.docs_dir.as_deref())?;
            println!("{}", docs::get_doc(&index, &args.filename)?);
        }
        Command::Browse { category } => {
            println!("{}", docs::browse_categories(category.as_deref()));
        }
        Command::Errors { action } => {
            let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;
            let store = ErrorStore::new(data_dir.errors_db());
            cmd_errors(&store, action)?;
            store.close()?;
        }
        Command::Completions(args) => {
            args.generate();
        }
    }

    Ok(())
}

fn load_index(docs_dir: Option<&Path>) -> error::Result<DocIndex> {
    let roots = DocRoots::resolve(docs_dir)?;
    if roots.is_empty() {
        tracing::warn!("no documentation directories found");
    }
    DocIndex::build(&roots)
}

fn cmd_errors(store: &ErrorStore, action: ErrorsAction) -> error::Result<()> {
    match action {
        ErrorsAction::Log {
            code,
            message,
            file,
            solution,
            related_docs,
        } => {
            let record = store.add_error(NewError {
                error_code: code,
                error_message: message,
                file_path: file,
                solution,
                related_docs,
            })?;
            let location = store.path().display().to_string();
            println!("{}", report::render_logged(&record, &location));
        }
        ErrorsAction::List { count } => {
            let records = store.list_common_errors(count)?;
            print!("{}", report::render_common(&records, &store.stats()?));
        }
        ErrorsAction::Search { query, message } => {
            let results = store.lookup(&query, message.as_deref())?;
            print_search_results(&results);
        }
        ErrorsAction::Export { anonymize, output } => {
            let json = store.export_errors(anonymize)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)?;
                    eprintln!("Exported to {}", path.display());
                }
                None => println!("{json}"),
            }
        }
        ErrorsAction::Import { input } => {
            let data = if input.as_os_str() == "-" {
                let mut buf = String::new();
                std::io::stdin().read_to_string(&mut buf)?;
                buf
            } else {
                std::fs::read_to_string(&input)?
            };
            let summary = store.import_errors(&data)?;
            print!("{}", report::render_import(&summary, &store.stats()?));
        }
        ErrorsAction::Stats => {
            print!("{}", report::render_stats(&store.stats()?));
        }
    }
    Ok(())
}

fn print_search_results(results: &[ErrorSearchResult]) {
    if results.is_empty() {
        println!("No matching errors.");
        return;
    }

    for r in results {
        let record = &r.record;
        match r.relevance_score {
            Some(score) => println!(
                "{:.2}  {} - {} (x{})",
                score, record.error_code, record.error_message, record.occurrence_count
            ),
            None => println!(
                "{} - {} (x{})",
                record.error_code, record.error_message, record.occurrence_count
            ),
        }
        if let Some(solution) = &record.solution {
            println!("      {solution}");
        }
    }
}
