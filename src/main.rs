use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{CommandFactory, Parser};

use html_translator::config::{find_default_config, load_config, DEFAULT_CONFIG_FILENAME};
use html_translator::html::{dump_fragments, parse};
use html_translator::languages::{DEFAULT_SOURCE_LANGUAGE, LANGUAGES};
use html_translator::pipeline::{init_default_config, PipelineConfig, TranslatorPipeline};
use html_translator::progress::ConsoleProgress;
use html_translator::session::{SessionStore, SessionWorkspace};

#[derive(Parser, Debug)]
#[command(name = "html-translator")]
#[command(about = "HTML translator (remote LLM backend) with structure preservation", long_about = None)]
struct Args {
    /// Generate default config + prompt files, then exit
    #[arg(long)]
    init_config: bool,

    /// Directory to write config/prompt files (default: current directory)
    #[arg(long, value_name = "DIR")]
    init_config_dir: Option<PathBuf>,

    /// Overwrite existing config/prompt files when used with --init-config
    #[arg(long)]
    force: bool,

    /// Input .html (drag-and-drop supported)
    #[arg(value_name = "HTML")]
    input: Option<PathBuf>,

    /// Output .html (default: <input_stem>_translated.html)
    #[arg(short, long, value_name = "HTML")]
    output: Option<PathBuf>,

    /// Translate a literal text snippet instead of an HTML file
    #[arg(long, value_name = "TEXT", conflicts_with = "input")]
    text: Option<String>,

    /// Source language code for --text (e.g. en)
    #[arg(long)]
    source_lang: Option<String>,

    /// Target language code (e.g. zh-hans, es)
    #[arg(long)]
    target_lang: Option<String>,

    /// Catalog model name (e.g. claude-3-5-sonnet)
    #[arg(long)]
    model: Option<String>,

    /// Max characters per request chunk
    #[arg(long, value_name = "CHARS")]
    chunk_size: Option<usize>,

    /// Disable streaming responses
    #[arg(long)]
    no_streaming: bool,

    /// Config file path (default: search for html-translator.toml upwards)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print catalog models, then exit
    #[arg(long)]
    list_models: bool,

    /// Print supported language codes, then exit
    #[arg(long)]
    list_languages: bool,

    /// Extract fragment JSON (ids + parent tags + text; no LLM)
    #[arg(long, value_name = "JSON")]
    extract_json: Option<PathBuf>,

    /// Only parse + re-serialize HTML (no translation)
    #[arg(long)]
    roundtrip_only: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let progress = ConsoleProgress::new(true);

    if args.init_config {
        let dir = args
            .init_config_dir
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        let written = init_default_config(&dir, args.force).context("init default config")?;
        for path in &written {
            eprintln!("Wrote: {}", path.display());
        }
        if written.is_empty() {
            eprintln!("Nothing written (files exist; use --force to overwrite)");
        }
        return Ok(());
    }

    if args.list_languages {
        for lang in LANGUAGES {
            println!("{:10} {} ({})", lang.code, lang.name, lang.native_name);
        }
        return Ok(());
    }

    let workdir = args
        .input
        .as_deref()
        .and_then(Path::parent)
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let mut cfg = load_pipeline_config(args.config.clone(), &workdir)?;
    if let Some(n) = args.chunk_size {
        cfg.max_chunk_chars = n;
    }
    if args.no_streaming {
        cfg.use_streaming = false;
    }

    if args.list_models {
        for spec in cfg.catalog.iter() {
            let marker = if spec.name == cfg.default_model { "*" } else { " " };
            println!("{} {:20} {}", marker, spec.name, spec.description);
        }
        return Ok(());
    }

    let model = args.model.clone().unwrap_or_else(|| cfg.default_model.clone());
    let target_lang = args
        .target_lang
        .clone()
        .unwrap_or_else(|| cfg.default_target_language.clone());
    let source_lang = args
        .source_lang
        .clone()
        .unwrap_or_else(|| DEFAULT_SOURCE_LANGUAGE.to_string());

    if let Some(text) = args.text {
        let store = SessionStore::new();
        let workspace = open_workspace(&cfg, progress)?;
        let pipeline = TranslatorPipeline::new(cfg, store.clone(), Arc::new(workspace), progress);
        let session = store.create();
        let translated =
            pipeline.translate_text(&session, &text, &source_lang, &target_lang, &model)?;
        println!("{translated}");
        return Ok(());
    }

    let input = match args.input {
        Some(p) => p,
        None => {
            let mut cmd = Args::command();
            cmd.print_help().context("print help")?;
            eprintln!(
                "\n\nUSAGE:\n  html-translator <input.html>\n\nTIPS:\n  - You can drag an .html file onto html-translator to translate.\n  - Default config search: html-translator.toml (upwards), or pass --config.\n"
            );
            return Ok(());
        }
    };
    let output = match args.output {
        Some(p) => p,
        None => {
            let stem = input
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("output")
                .to_string();
            input.with_file_name(format!("{stem}_translated.html"))
        }
    };

    let html = std::fs::read_to_string(&input)
        .with_context(|| format!("read input: {}", input.display()))?;

    if let Some(json_path) = args.extract_json {
        let doc = parse(&html);
        let fragments = dump_fragments(&doc);
        let json = serde_json::to_string_pretty(&fragments).context("serialize fragments")?;
        std::fs::write(&json_path, json)
            .with_context(|| format!("write fragments: {}", json_path.display()))?;
        eprintln!("Extracted {} fragments: {}", fragments.len(), json_path.display());
        return Ok(());
    }

    if args.roundtrip_only {
        let doc = parse(&html);
        std::fs::write(&output, doc.to_html())
            .with_context(|| format!("write output: {}", output.display()))?;
        return Ok(());
    }

    let store = SessionStore::new();
    let workspace = open_workspace(&cfg, progress)?;
    let pipeline = TranslatorPipeline::new(cfg, store.clone(), Arc::new(workspace), progress);
    let session = store.create();
    progress.info(format!("Session {session}"));

    let translated = pipeline.translate_html(&session, &html, &target_lang, &model)?;
    std::fs::write(&output, translated)
        .with_context(|| format!("write output: {}", output.display()))?;
    progress.info(format!("Wrote {}", output.display()));
    Ok(())
}

fn open_workspace(cfg: &PipelineConfig, progress: ConsoleProgress) -> anyhow::Result<SessionWorkspace> {
    let workspace = SessionWorkspace::new(&cfg.upload_dir, &cfg.generated_dir)
        .context("create session workspace")?;
    let swept = workspace.sweep_older_than(cfg.session_max_age);
    if swept > 0 {
        progress.info(format!("Cleaned up {swept} expired sessions"));
    }
    Ok(workspace)
}

fn load_pipeline_config(explicit: Option<PathBuf>, workdir: &Path) -> anyhow::Result<PipelineConfig> {
    let found = explicit.or_else(|| find_default_config(workdir, DEFAULT_CONFIG_FILENAME));
    match found {
        Some(path) => {
            let app = load_config(&path)?;
            let dir = path.parent().map(Path::to_path_buf);
            PipelineConfig::from_app_config(&app, dir.as_deref())
        }
        None => Ok(PipelineConfig::defaults()),
    }
}
