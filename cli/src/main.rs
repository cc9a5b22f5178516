use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use ahash::AHashSet;
use anyhow::{Context, Result};
use clap::Parser;

use shrinker::reader::{read_input, InputKind};
use shrinker::{Driver, PipelineOptions};
use shrinker_config::{parse_merged, Configuration};
use shrinker_dex::Dex;
use shrinker_distribute::{DexEncoder, Mode, OutputTarget, VirtualDex};
use shrinker_enqueue::RootSetBuilder;
use shrinker_graph::{Factory, Lens, Origin, TypeId};

#[derive(Parser)]
#[command(name = "shrinker", version, about, arg_required_else_help(true))]
struct Cli {
    /// Input `.class`/`.dex`/`.jar`/`.zip`/`.apk` files.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    #[arg(long, conflicts_with = "debug")]
    release: bool,

    #[arg(long, conflicts_with = "release")]
    debug: bool,

    /// Output directory, or a `.zip` file.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Classpath/library input, resolved but never shrunk or renamed.
    #[arg(long = "lib")]
    libs: Vec<PathBuf>,

    #[arg(long = "min-api", default_value_t = 21)]
    min_api: u32,

    #[arg(long = "pg-conf")]
    pg_conf: Vec<PathBuf>,

    #[arg(long = "pg-map")]
    pg_map: Option<PathBuf>,

    #[arg(long = "no-tree-shaking")]
    no_tree_shaking: bool,

    #[arg(long = "no-minification")]
    no_minification: bool,

    #[arg(long = "main-dex-rules")]
    main_dex_rules: Option<PathBuf>,

    #[arg(long = "main-dex-list")]
    main_dex_list: Option<PathBuf>,

    #[arg(long = "main-dex-list-output")]
    main_dex_list_output: Option<PathBuf>,
}

/// `DexEncoder` has no concrete implementor in this workspace — DEX byte
/// emission is a described seam, same scope line as `.class` parsing. This
/// stub keeps the pipeline wireable end to end without pretending encoding
/// is implemented.
struct UnimplementedEncoder;

impl DexEncoder for UnimplementedEncoder {
    fn encode(
        &self,
        _factory: &Factory,
        _lens: &Lens,
        _dex: &VirtualDex,
        _version: shrinker_dex::DexVersion,
    ) -> Result<Vec<u8>, shrinker_distribute::DistributeError> {
        Err(shrinker_distribute::DistributeError::Io(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "DEX byte encoding is not implemented",
        )))
    }
}

fn expand_argfiles(args: Vec<String>) -> Result<Vec<String>> {
    let mut out = Vec::with_capacity(args.len());
    for arg in args {
        match arg.strip_prefix('@') {
            Some(path) => {
                let contents = fs::read_to_string(path)
                    .with_context(|| format!("reading argfile {path:?}"))?;
                out.extend(contents.split_whitespace().map(String::from));
            }
            None => out.push(arg),
        }
    }
    Ok(out)
}

fn log_invocation(args: &[String]) {
    let Ok(path) = env::var("LOGGER_OUTPUT") else {
        return;
    };

    let line = args
        .iter()
        .map(|arg| {
            if arg.starts_with('-') || arg.starts_with('@') {
                arg.clone()
            } else {
                fs::canonicalize(arg)
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|_| arg.clone())
            }
        })
        .collect::<Vec<_>>()
        .join("\t");

    if let Ok(mut file) = fs::OpenOptions::new().create(true).append(true).open(path) {
        let _ = writeln!(file, "{line}");
    }
}

/// Ingest one input path: a raw `.dex`, or every `.dex` entry of a
/// `.jar`/`.zip`/`.apk` container. `.class` files have no ingestion path
/// yet (§6's `ClassfileReader` is described-only).
fn ingest_path(driver: &Driver, path: &Path, origin: Origin) -> Result<()> {
    let data = fs::read(path).with_context(|| format!("reading {path:?}"))?;
    match read_input(path, data)? {
        InputKind::Dex(dex) => driver.ingest_dex(&dex, origin, None)?,
        InputKind::Container(zip) => {
            for name in zip.namelist().filter(|n| n.ends_with(".dex")).cloned().collect::<Vec<_>>() {
                let (bytes, _kind) = zip.read(&name)?;
                let dex = Dex::new(bytes)?;
                driver.ingest_dex(&dex, origin, None)?;
            }
        }
        InputKind::Classfile(_) => {
            anyhow::bail!("{path:?}: raw .class ingestion is not implemented");
        }
    }
    Ok(())
}

fn load_config(cli: &Cli) -> Result<Configuration> {
    if cli.pg_conf.is_empty() {
        return Ok(parse_merged(&[])?);
    }
    let mut sources = Vec::with_capacity(cli.pg_conf.len());
    for path in &cli.pg_conf {
        sources.push((
            path.to_string_lossy().into_owned(),
            fs::read_to_string(path).with_context(|| format!("reading {path:?}"))?,
        ));
    }
    let refs: Vec<(&str, &str)> = sources.iter().map(|(f, s)| (f.as_str(), s.as_str())).collect();
    Ok(parse_merged(&refs)?)
}

/// Resolve `--main-dex-list` (one `pkg/Name.class` per line) and
/// `--main-dex-rules` (a Proguard-syntax keep file, same as `--pg-conf`)
/// into the set of types the distributor's `minimal-main-dex` closure
/// walks from.
fn load_main_dex_roots(driver: &Driver, cli: &Cli) -> Result<AHashSet<TypeId>> {
    let mut roots = AHashSet::default();

    if let Some(path) = &cli.main_dex_list {
        let contents = fs::read_to_string(path).with_context(|| format!("reading {path:?}"))?;
        for line in contents.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let descriptor = format!(
                "L{};",
                line.trim_end_matches(".class").replace('.', "/")
            );
            roots.insert(driver.factory().create_type(&descriptor)?);
        }
    }

    if let Some(path) = &cli.main_dex_rules {
        let src = fs::read_to_string(path).with_context(|| format!("reading {path:?}"))?;
        let config = shrinker_config::parse_str(&path.to_string_lossy(), &src)?;
        let root_set = RootSetBuilder::new(driver.factory(), &config).build();
        for item in root_set.no_shrinking.iter().chain(root_set.reason_asked.iter()) {
            if let shrinker_enqueue::Item::Class(class_id) = item {
                roots.insert(driver.factory().with_class(*class_id, |c| c.class_type));
            }
        }
    }

    Ok(roots)
}

fn output_target(cli: &Cli) -> OutputTarget {
    match &cli.output {
        Some(path) if path.extension().and_then(|e| e.to_str()) == Some("zip") => {
            OutputTarget::Zip(path.clone())
        }
        Some(path) => OutputTarget::Directory(path.clone()),
        None => OutputTarget::Directory(PathBuf::from("out")),
    }
}

fn run(cli: &Cli) -> Result<()> {
    let driver = Driver::new();

    for input in &cli.inputs {
        ingest_path(&driver, input, Origin::Program)?;
    }
    for lib in &cli.libs {
        ingest_path(&driver, lib, Origin::Library)?;
    }

    let config = load_config(cli)?;
    let main_dex_roots = load_main_dex_roots(&driver, cli)?;

    // `--release`/`--debug` set the shrink/obfuscate defaults; `-dontshrink`/
    // `-dontobfuscate` in the merged pg-conf can still turn either off, and
    // `--no-tree-shaking`/`--no-minification` are the final override.
    let (default_shrink, default_obfuscate) = match (cli.release, cli.debug) {
        (true, _) => (true, true),
        (_, true) => (false, false),
        (false, false) => (config.shrink, config.obfuscate),
    };

    let opts = PipelineOptions {
        min_api: cli.min_api,
        shrink: !cli.no_tree_shaking && default_shrink && config.shrink,
        obfuscate: !cli.no_minification && default_obfuscate && config.obfuscate,
        ignore_missing_classes: config.ignore_missing_classes,
    };

    let (subtypes, info) = driver.analyze(&config, &opts)?;
    let _layers = driver.schedule_optimizer_layers(&info);

    let surviving = if opts.shrink {
        driver.surviving_program_classes(&info)
    } else {
        driver
            .factory()
            .class_ids()
            .into_iter()
            .filter(|&id| driver.factory().with_class(id, |c| c.origin == Origin::Program))
            .collect()
    };

    let root_set = RootSetBuilder::new(driver.factory(), &config).build();
    let lens = driver.minify(&subtypes, &config, &root_set, &opts);

    let output = output_target(cli);
    let mode = Mode::FillFiles { minimal_main_dex: !main_dex_roots.is_empty() };
    let distribution =
        driver.distribute_and_write(&surviving, &mode, &main_dex_roots, &opts, &lens, &UnimplementedEncoder, &output)?;

    if let Some(path) = &cli.main_dex_list_output {
        let rendered = shrinker_distribute::render_main_dex_list(driver.factory(), &distribution.main_dex_list);
        fs::write(path, rendered).with_context(|| format!("writing {path:?}"))?;
    }

    if let Some(path) = &cli.pg_map {
        let rendered = shrinker_distribute::render_rename_map(driver.factory(), &lens, &surviving);
        fs::write(path, rendered).with_context(|| format!("writing {path:?}"))?;
    }

    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();

    let args = match expand_argfiles(env::args().collect()) {
        Ok(args) => args,
        Err(err) => {
            eprintln!("{err:#}");
            return ExitCode::FAILURE;
        }
    };
    log_invocation(&args);

    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.exit_code() == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE };
        }
    };

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
