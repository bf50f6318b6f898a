use anyhow::{Context, Result};
use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use folio::build::build_site;
use folio::config::Config;
use folio::markdown::Renderer;
use folio::notes;
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    let matches = App::new("folio")
        .version(env!("CARGO_PKG_VERSION"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .setting(AppSettings::VersionlessSubcommands)
        .arg(
            Arg::with_name("root")
                .long("root")
                .takes_value(true)
                .value_name("DIR")
                .help("The project root (defaults to the current directory)"),
        )
        .arg(
            Arg::with_name("config")
                .long("config")
                .takes_value(true)
                .value_name("FILE")
                .conflicts_with("root")
                .help("A project file; its directory is the project root"),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .global(true)
                .help("Enable debug logging"),
        )
        .subcommand(
            SubCommand::with_name("notes")
                .about("Aggregates dated vault notes into Jekyll posts")
                .arg(
                    Arg::with_name("vault")
                        .required(true)
                        .help("The vault directory, laid out as {category}/{DD-MM-YYYY}/{note}"),
                )
                .arg(
                    Arg::with_name("posts")
                        .required(true)
                        .help("The Jekyll `_posts` directory"),
                ),
        )
        .get_matches();

    // `-v` may follow the subcommand, in which case only its matches carry it.
    let verbose = matches.is_present("verbose")
        || matches
            .subcommand()
            .1
            .map_or(false, |sub| sub.is_present("verbose"));
    init_tracing(verbose)?;

    match matches.subcommand() {
        ("notes", Some(matches)) => aggregate_notes(matches),
        _ => build(&matches),
    }
}

fn init_tracing(verbose: bool) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(if verbose {
                tracing::Level::DEBUG.into()
            } else {
                tracing::Level::INFO.into()
            }),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn build(matches: &ArgMatches) -> Result<()> {
    let config = match (matches.value_of("config"), matches.value_of("root")) {
        (Some(file), _) => Config::from_project_file(Path::new(file))?,
        (None, Some(root)) => Config::from_directory(Path::new(root))?,
        (None, None) => Config::from_directory(
            &std::env::current_dir().context("Getting the current directory")?,
        )?,
    };
    let renderer = Renderer::resolve(config.markdown);
    let report = build_site(&config, renderer).context("Building site")?;
    println!("Built {} article(s).", report.articles.len());
    Ok(())
}

fn aggregate_notes(matches: &ArgMatches) -> Result<()> {
    // Both arguments are required, so clap guarantees they're present.
    let vault = PathBuf::from(matches.value_of("vault").unwrap_or_default());
    let posts = PathBuf::from(matches.value_of("posts").unwrap_or_default());
    let written = notes::aggregate(&vault, &posts)
        .with_context(|| format!("Aggregating notes from `{}`", vault.display()))?;
    println!("Wrote {} post(s).", written.len());
    Ok(())
}
