use std::path::{Path, PathBuf};

use catalog::build::{build_site, load_content};
use catalog::collection::{InvalidRowPolicy, LoadOptions};
use catalog::config::{BuildEnv, Config};
use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use tracing_subscriber::EnvFilter;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

fn main() {
    let loading_args = || {
        vec![
            Arg::with_name("project")
                .long("project")
                .takes_value(true)
                .default_value(".")
                .help("The project directory (or any of its subdirectories)"),
            Arg::with_name("skip-invalid")
                .long("skip-invalid")
                .help("Drop rows that fail validation instead of failing the build"),
            Arg::with_name("threads")
                .long("threads")
                .takes_value(true)
                .help("The number of threads used to parse CSV files"),
        ]
    };

    let matches = App::new("catalog")
        .about("Validates and publishes a site's pipeline and resource catalog")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .subcommand(
            SubCommand::with_name("build")
                .about("Validates the content and writes it to the output directory")
                .args(&loading_args())
                .arg(
                    Arg::with_name("output")
                        .long("output")
                        .takes_value(true)
                        .default_value("_site/content")
                        .help("The output directory, relative to the project root"),
                )
                .arg(
                    Arg::with_name("env")
                        .long("env")
                        .takes_value(true)
                        .env("CATALOG_ENV")
                        .possible_values(&["development", "production"])
                        .default_value("development")
                        .help("Production builds use the configured base path"),
                )
                .arg(
                    Arg::with_name("base-path")
                        .long("base-path")
                        .takes_value(true)
                        .env("BASE_PATH")
                        .help("Overrides the base path for any environment"),
                ),
        )
        .subcommand(
            SubCommand::with_name("check")
                .about("Validates the content without writing anything")
                .args(&loading_args()),
        )
        .get_matches();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match matches.subcommand() {
        ("build", Some(m)) => build(m),
        ("check", Some(m)) => check(m),
        _ => Ok(()),
    };
    if let Err(e) = result {
        eprintln!("ERROR {}", e);
        std::process::exit(1);
    }
}

fn build(matches: &ArgMatches) -> Result<()> {
    let config = config(matches)?;
    let options = load_options(matches)?;
    let env = BuildEnv {
        production: matches.value_of("env") == Some("production"),
        base_path_override: matches.value_of("base-path").map(str::to_owned),
    };
    let output = match matches.value_of("output") {
        Some(output) => config.project_root.join(output),
        None => config.project_root.join("_site/content"),
    };
    build_site(&config, &env, &output, &options)?;
    Ok(())
}

fn check(matches: &ArgMatches) -> Result<()> {
    let config = config(matches)?;
    let content = load_content(&config, &load_options(matches)?)?;
    for row in &content.skipped {
        println!("skipped {}", row);
    }
    println!(
        "{} pipelines, {} resources, {} pages OK",
        content.catalog.pipelines.len(),
        content.catalog.resources.len(),
        content.catalog.pages.len()
    );
    Ok(())
}

fn config(matches: &ArgMatches) -> Result<Config> {
    let project = matches.value_of("project").unwrap_or(".");
    Ok(Config::from_directory(&absolute(Path::new(project))?)?)
}

fn absolute(path: &Path) -> Result<PathBuf> {
    Ok(std::env::current_dir()?.join(path))
}

fn load_options(matches: &ArgMatches) -> Result<LoadOptions> {
    let mut options = LoadOptions::default();
    if matches.is_present("skip-invalid") {
        options.policy = InvalidRowPolicy::Skip;
    }
    if let Some(threads) = matches.value_of("threads") {
        options.threads = threads.parse()?;
    }
    Ok(options)
}
