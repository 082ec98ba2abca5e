use std::cell::RefCell;
use std::path::Path;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use cutesy_dom::Document;
use cutesy_dom::NodeId;
use cutesy_editor::DataTransfer;
use cutesy_editor::Editor;
use cutesy_editor::EditorOptions;
use cutesy_editor::EventOutcome;
use cutesy_editor::initialize;
use cutesy_html::HtmlParser;
use cutesy_tree::NodePath;
use encoding_rs::Encoding;
use futures::executor::block_on;
use tracing::debug;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_SELECTOR: &str = "#editor";
const DEFAULT_LOG_FILTER: &str = "warn";
const CHARSET_SNIFF_BYTES: usize = 8192;
const USAGE: &str = "usage: cutesy [--selector SEL] [--move SRC DST]... [--insert DST MARKUP]... \
[--format html|json] [--hover-interval-ms N] [--log-level FILTER] FILE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Html,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Edit {
    Move { source: NodePath, target: NodePath },
    Insert { target: NodePath, markup: String },
}

#[derive(Debug)]
struct CliArgs {
    input: PathBuf,
    selector: String,
    edits: Vec<Edit>,
    format: OutputFormat,
    hover_interval: Option<Duration>,
    log_filter: Option<String>,
}

fn main() {
    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(error) => {
            eprintln!("cutesy startup error: {error}");
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    };
    init_logging(args.log_filter.as_deref());

    match run(&args) {
        Ok(output) => println!("{output}"),
        Err(error) => {
            eprintln!("cutesy error: {error}");
            std::process::exit(1);
        }
    }
}

fn init_logging(filter: Option<&str>) {
    let filter = match filter {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<CliArgs, String> {
    let mut input = None;
    let mut selector = DEFAULT_SELECTOR.to_owned();
    let mut edits = Vec::new();
    let mut format = OutputFormat::Html;
    let mut hover_interval = None;
    let mut log_filter = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--selector" => selector = next_value(&mut args, "--selector")?,
            "--move" => {
                let source = parse_path(&next_value(&mut args, "--move")?)?;
                let target = parse_path(&next_value(&mut args, "--move")?)?;
                edits.push(Edit::Move { source, target });
            }
            "--insert" => {
                let target = parse_path(&next_value(&mut args, "--insert")?)?;
                let markup = next_value(&mut args, "--insert")?;
                edits.push(Edit::Insert { target, markup });
            }
            "--format" => {
                format = match next_value(&mut args, "--format")?.as_str() {
                    "html" => OutputFormat::Html,
                    "json" => OutputFormat::Json,
                    other => {
                        return Err(format!("unsupported format `{other}` (expected: html|json)"));
                    }
                };
            }
            "--hover-interval-ms" => {
                let raw = next_value(&mut args, "--hover-interval-ms")?;
                let millis = raw
                    .parse::<u64>()
                    .map_err(|_| format!("invalid hover interval `{raw}`"))?;
                hover_interval = Some(Duration::from_millis(millis));
            }
            "--log-level" => log_filter = Some(next_value(&mut args, "--log-level")?),
            flag if flag.starts_with("--") => return Err(format!("unknown flag `{flag}`")),
            _ => {
                if input.replace(PathBuf::from(&arg)).is_some() {
                    return Err(format!("unexpected extra input `{arg}`"));
                }
            }
        }
    }

    Ok(CliArgs {
        input: input.ok_or_else(|| "missing input file".to_owned())?,
        selector,
        edits,
        format,
        hover_interval,
        log_filter,
    })
}

fn next_value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String, String> {
    args.next()
        .ok_or_else(|| format!("missing value after {flag}"))
}

fn parse_path(raw: &str) -> Result<NodePath, String> {
    raw.parse::<NodePath>()
        .map_err(|error| format!("invalid path `{raw}`: {error}"))
}

fn run(args: &CliArgs) -> Result<String, String> {
    let document = load_document(&args.input)?;
    let mut options = EditorOptions::default();
    if let Some(interval) = args.hover_interval {
        options = options.with_hover_interval(interval);
    }
    let mut editor = initialize(Rc::new(RefCell::new(document)), &args.selector, options)
        .map_err(|error| error.to_string())?;

    for edit in &args.edits {
        apply_edit(&mut editor, edit)?;
    }

    match args.format {
        OutputFormat::Html => editor.value().map_err(|error| error.to_string()),
        OutputFormat::Json => {
            let tree = editor.tree().map_err(|error| error.to_string())?;
            serde_json::to_string_pretty(&tree).map_err(|error| error.to_string())
        }
    }
}

fn load_document(path: &Path) -> Result<Document, String> {
    let bytes = std::fs::read(path)
        .map_err(|error| format!("failed to read `{}`: {error}", path.display()))?;
    let text = decode_html(&bytes);
    debug!(path = %path.display(), bytes = bytes.len(), "input loaded");
    Ok(HtmlParser.parse_document(&text))
}

/// Replays one edit as the drag events a host would deliver.
fn apply_edit(editor: &mut Editor, edit: &Edit) -> Result<(), String> {
    let (target, transfer) = match edit {
        Edit::Move { source, target } => {
            let node = resolve(editor, source)?;
            let EventOutcome::Transfer(transfer) = editor.drag_start(node) else {
                return Err(format!("`{source}` cannot be dragged"));
            };
            (target, transfer)
        }
        Edit::Insert { target, markup } => (target, DataTransfer::with_text(markup.as_str())),
    };

    let node = resolve(editor, target)?;
    match block_on(editor.drop_on(node, &transfer)) {
        EventOutcome::Committed { path } => {
            info!(%path, "edit applied");
            Ok(())
        }
        EventOutcome::Rejected(rejection) => Err(format!("{edit:?} rejected: {rejection}")),
        other => Err(format!("{edit:?} had no effect ({other:?})")),
    }
}

fn resolve(editor: &Editor, path: &NodePath) -> Result<NodeId, String> {
    editor
        .node_for_path(path)
        .ok_or_else(|| format!("nothing is rendered at `{path}`"))
}

fn decode_html(body: &[u8]) -> String {
    if let Some(label) = parse_charset_from_html_prefix(body) {
        if let Some(encoding) = Encoding::for_label(label.as_bytes()) {
            let (decoded, _, _) = encoding.decode(body);
            return decoded.into_owned();
        }
    }

    String::from_utf8_lossy(body).to_string()
}

fn parse_charset_from_html_prefix(body: &[u8]) -> Option<String> {
    let prefix_len = body.len().min(CHARSET_SNIFF_BYTES);
    let prefix = String::from_utf8_lossy(&body[..prefix_len]);
    let lower = prefix.to_ascii_lowercase();
    let mut search_start = 0_usize;

    while let Some(relative) = lower[search_start..].find("charset=") {
        let charset_start = search_start + relative + "charset=".len();
        if let Some(label) = parse_charset_label(&prefix[charset_start..]) {
            return Some(label);
        }
        search_start = charset_start;
    }

    None
}

fn parse_charset_label(input: &str) -> Option<String> {
    let trimmed = input.trim_start();
    let first = trimmed.chars().next()?;

    let label = if first == '"' || first == '\'' {
        let rest = &trimmed[first.len_utf8()..];
        rest[..rest.find(first)?].trim()
    } else {
        let end = trimmed
            .find(|ch: char| ch.is_whitespace() || matches!(ch, '"' | '\'' | ';' | '>' | '/'))
            .unwrap_or(trimmed.len());
        trimmed[..end].trim()
    };
    (!label.is_empty()).then(|| label.to_owned())
}
