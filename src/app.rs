use std::path::PathBuf;
use std::time::Duration;

use clap::{error::ErrorKind, Parser};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::api::{ApiClient, ApiError};
use crate::cli::args::{BrowseArgs, CliArgs, Command, ListArgs, LoginArgs, QueryArgs};
use crate::cli::browse::{self, BrowseCommand};
use crate::cli::validation;
use crate::config::{self, ConfigFile};
use crate::controller::{ListController, ListState};
use crate::entity::{EntityDescriptor, EntityKind};
use crate::output::{self, OutputFormat};
use crate::runner::{self, Runner};
use crate::session::{Session, SessionStore};

fn format_kv_line(label: &str, value: &str) {
    println!(":: {:<10}: {}", label, value);
}

fn print_err(message: &str) {
    eprintln!("{} {}", "[ERR]".bold().red(), message);
}

fn print_ok(message: &str) {
    println!("{} {}", "OK".bold().green(), message);
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .try_init();
}

/// CLI flag, then `HMS_API_BASE_URL`, then the config file, then the
/// built-in default.
fn resolve_base_url(cli: Option<String>, env: Option<String>, file: Option<String>) -> String {
    cli.or(env)
        .or(file)
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| config::DEFAULT_BASE_URL.to_string())
}

#[derive(Clone, Debug)]
struct RunConfig {
    command: Command,
    base_url: String,
    timeout: u64,
    proxy: Option<String>,
    page_size: usize,
    debounce: Duration,
    session_path: PathBuf,
    output_format: OutputFormat,
    no_color: bool,
}

fn build_run_config(
    args: CliArgs,
    cfg: ConfigFile,
    env_base_url: Option<String>,
) -> Result<RunConfig, String> {
    validation::validate(&args)?;

    let no_color = args.no_color || cfg.no_color.unwrap_or(false);
    let base_url = resolve_base_url(args.base_url, env_base_url, cfg.base_url);
    let timeout = args.timeout.or(cfg.timeout).unwrap_or(10);
    let proxy = args
        .proxy
        .or(cfg.proxy)
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty());

    let page_size = cfg.page_size.unwrap_or(crate::pagination::DEFAULT_PAGE_SIZE);
    if page_size == 0 || page_size > crate::query::MAX_PAGE_SIZE {
        return Err(format!(
            "invalid page_size {page_size} in config, expected 1..={}",
            crate::query::MAX_PAGE_SIZE
        ));
    }
    let debounce_ms = match &args.command {
        Command::Browse(b) => b.debounce_ms,
        _ => None,
    }
    .or(cfg.debounce_ms)
    .unwrap_or(crate::debounce::DEFAULT_DEBOUNCE.as_millis() as u64);

    let session_path = match args.session_file.or(cfg.session_file) {
        Some(p) => config::expand_tilde(&p),
        None => config::default_session_path()
            .ok_or_else(|| "cannot locate home directory for the session file".to_string())?,
    };

    let format_raw = match &args.command {
        Command::List(l) => l.format.clone(),
        Command::Show(r) | Command::Delete(r) => r.format.clone(),
        Command::Stats(st) => st.format.clone(),
        _ => None,
    }
    .or(cfg.output_format)
    .unwrap_or_else(|| "text".to_string());
    let output_format = OutputFormat::parse(&format_raw)
        .ok_or_else(|| format!("invalid output format '{format_raw}', expected text or json"))?;

    Ok(RunConfig {
        command: args.command,
        base_url,
        timeout,
        proxy,
        page_size,
        debounce: Duration::from_millis(debounce_ms),
        session_path,
        output_format,
        no_color,
    })
}

fn runner_for(
    run: &RunConfig,
    entity: EntityKind,
    query: Option<&QueryArgs>,
    session: Session,
) -> Result<Runner, String> {
    let mut options = runner::Options {
        base_url: run.base_url.clone(),
        timeout_seconds: run.timeout,
        proxy: run.proxy.clone(),
        page_size: run.page_size,
        debounce: run.debounce,
        session,
        entity,
        ..runner::Options::default()
    };
    if let Some(q) = query {
        options.search = q.search.clone().unwrap_or_default();
        options.filters = crate::utils::parse_filter_list(&q.filter)?;
        options.page = q.page.unwrap_or(1);
        if let Some(size) = q.page_size {
            options.page_size = size;
        }
    }
    Runner::new(options).map_err(|e| e.to_string())
}

fn spinner(message: String) -> Result<ProgressBar, String> {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_style(
        ProgressStyle::with_template(":: {spinner} {msg} [{elapsed_precise}]")
            .map_err(|e| format!("failed to build progress bar style: {e}"))?,
    );
    pb.set_message(message);
    Ok(pb)
}

async fn write_stdout(bytes: &[u8]) -> Result<(), String> {
    let mut out = tokio::io::stdout();
    out.write_all(bytes)
        .await
        .map_err(|e| format!("failed to write output: {e}"))?;
    out.flush()
        .await
        .map_err(|e| format!("failed to write output: {e}"))
}

fn render_state(
    descriptor: &EntityDescriptor,
    state: &ListState<Value>,
    group_by: Option<&str>,
) -> String {
    match group_by {
        Some(field) => output::render_grouped_text(descriptor, state, field),
        None => output::render_list_text(descriptor, state),
    }
}

async fn run_list(run: &RunConfig, list: ListArgs, session: Session) -> Result<(), String> {
    let runner = runner_for(run, list.entity, Some(&list.query), session)?;
    let descriptor = runner.descriptor().clone();
    let group_by = match list.group_by.as_deref() {
        Some("") => Some(
            descriptor
                .date_field
                .clone()
                .ok_or_else(|| format!("{} has no date field to group by", descriptor.name))?,
        ),
        Some(field) => Some(field.to_string()),
        None => None,
    };

    let text = run.output_format == OutputFormat::Text;
    if text {
        format_kv_line("Target", &runner.list_url());
    }
    let pb = spinner(format!("Loading {}", descriptor.name))?;
    let state = runner.list().await;
    pb.finish_and_clear();
    let state = state.map_err(|e| e.to_string())?;

    match run.output_format {
        OutputFormat::Json => write_stdout(&output::render_json(&state)).await?,
        OutputFormat::Text => {
            if state.error.is_none() {
                print!("{}", render_state(&descriptor, &state, group_by.as_deref()));
                if list.filter_options {
                    println!();
                    print!("{}", output::render_filter_options(&descriptor, &state.items));
                }
            }
        }
    }
    match state.error {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

enum Step {
    Continue,
    Quit,
}

async fn apply_browse_command(
    command: BrowseCommand,
    controller: &ListController<Value>,
    api: &ApiClient,
) -> Result<Step, String> {
    let descriptor = controller.descriptor();
    let sent = match command {
        BrowseCommand::Search(term) => controller.set_search(term),
        BrowseCommand::Filter { key, value } => controller.set_filter(&key, Some(&value)),
        BrowseCommand::Clear(key) => controller.clear_filter(&key),
        BrowseCommand::Reset => {
            let filters = controller.state().filters;
            controller.set_search(String::new()).and_then(|_| {
                filters
                    .keys()
                    .try_for_each(|key| controller.clear_filter(key))
            })
        }
        BrowseCommand::Next => controller.next_page(),
        BrowseCommand::Previous => controller.previous_page(),
        BrowseCommand::Page(n) => controller.go_to_page(n),
        BrowseCommand::Refresh => controller.refresh(),
        BrowseCommand::Show(id) => {
            let record = api
                .get_record(descriptor, &id)
                .await
                .map_err(|e| e.to_string())?;
            print!("{}", output::render_record(descriptor, &record));
            Ok(())
        }
        BrowseCommand::Delete(id) => {
            api.delete_record(descriptor, &id)
                .await
                .map_err(|e| e.to_string())?;
            print_ok(&format!("deleted {} {}", descriptor.name, id));
            controller.refresh()
        }
        BrowseCommand::Options => {
            print!(
                "{}",
                output::render_filter_options(descriptor, &controller.state().items)
            );
            Ok(())
        }
        BrowseCommand::Help => {
            println!("{}", browse::HELP);
            Ok(())
        }
        BrowseCommand::Quit => return Ok(Step::Quit),
    };
    sent.map_err(|e| e.to_string())?;
    Ok(Step::Continue)
}

async fn run_browse(run: &RunConfig, args: BrowseArgs, session: Session) -> Result<(), String> {
    let runner = runner_for(run, args.entity, Some(&args.query), session)?;
    let descriptor = runner.descriptor().clone();
    let controller = runner.controller();
    let api = runner.api();
    let mut updates = controller.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut rendered: Option<u64> = None;

    format_kv_line("Browse", &format!("{} (:help for commands)", descriptor.name));
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => match browse::parse_line(&line) {
                    Ok(Some(command)) => match apply_browse_command(command, &controller, &api).await {
                        Ok(Step::Continue) => {}
                        Ok(Step::Quit) => break,
                        Err(e) => print_err(&e),
                    },
                    Ok(None) => {}
                    Err(e) => print_err(&e),
                },
                Ok(None) => {
                    let state = controller.settle().await.map_err(|e| e.to_string())?;
                    if rendered != Some(state.fetches_issued) {
                        print!("{}", render_state(&descriptor, &state, None));
                    }
                    break;
                }
                Err(e) => return Err(format!("failed to read stdin: {e}")),
            },
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = updates.borrow_and_update().clone();
                if state.is_idle() && rendered != Some(state.fetches_issued) {
                    rendered = Some(state.fetches_issued);
                    print!("{}", render_state(&descriptor, &state, None));
                }
            }
        }
    }
    controller.shutdown().await;
    Ok(())
}

fn validation_failure(error: ApiError) -> String {
    match error {
        ApiError::Validation(errors) => {
            for (field, messages) in errors.iter() {
                for message in messages {
                    eprintln!("  {} {}", format!("{field}:").bold().yellow(), message);
                }
            }
            "the server rejected the record".to_string()
        }
        other => other.to_string(),
    }
}

async fn print_record(
    run: &RunConfig,
    descriptor: &EntityDescriptor,
    record: &Value,
) -> Result<(), String> {
    match run.output_format {
        OutputFormat::Json => write_stdout(&output::render_json(record)).await,
        OutputFormat::Text => {
            print!("{}", output::render_record(descriptor, record));
            Ok(())
        }
    }
}

async fn run_login(run: &RunConfig, args: LoginArgs, store: &SessionStore) -> Result<(), String> {
    let runner = runner_for(run, EntityKind::Persons, None, Session::default())?;
    let session = runner
        .api()
        .login(args.username.trim(), &args.password)
        .await
        .map_err(|e| e.to_string())?;
    store.persist(&session).map_err(|e| e.to_string())?;
    let name = session
        .user
        .as_ref()
        .map(|u| u.display_name())
        .unwrap_or_else(|| args.username.clone());
    print_ok(&format!("logged in as {}", name.bold().cyan()));
    Ok(())
}

async fn run_logout(run: &RunConfig, session: Session, store: &SessionStore) -> Result<(), String> {
    if session.is_authenticated() {
        let runner = runner_for(run, EntityKind::Persons, None, session)?;
        if let Err(e) = runner.api().logout().await {
            log::warn!("server logout failed: {e}");
        }
    }
    store.clear().map_err(|e| e.to_string())?;
    print_ok("logged out");
    Ok(())
}

async fn run_stats(run: &RunConfig, session: Session) -> Result<(), String> {
    let runner = runner_for(run, EntityKind::Persons, None, session)?;
    let pb = spinner("Loading dashboard".to_string())?;
    let stats = runner.api().dashboard().await;
    pb.finish_and_clear();
    let stats = stats.map_err(|e| e.to_string())?;
    match run.output_format {
        OutputFormat::Json => write_stdout(&output::render_json(&stats)).await,
        OutputFormat::Text => {
            print!("{}", output::render_dashboard_text(&stats));
            Ok(())
        }
    }
}

async fn run_async(run: RunConfig) -> Result<(), String> {
    if run.no_color {
        colored::control::set_override(false);
    }
    let store = SessionStore::new(run.session_path.clone());
    let session = store.hydrate().map_err(|e| e.to_string())?;
    log::debug!(
        "session {} ({})",
        if session.is_authenticated() {
            "authenticated"
        } else {
            "anonymous"
        },
        store.path().display()
    );

    match run.command.clone() {
        Command::List(list) => run_list(&run, list, session).await,
        Command::Browse(args) => run_browse(&run, args, session).await,
        Command::Show(args) => {
            let runner = runner_for(&run, args.entity, None, session)?;
            let record = runner
                .api()
                .get_record(runner.descriptor(), args.id.trim())
                .await
                .map_err(|e| e.to_string())?;
            print_record(&run, runner.descriptor(), &record).await
        }
        Command::Create(args) => {
            let body = crate::utils::parse_json_object(&args.data)?;
            let runner = runner_for(&run, args.entity, None, session)?;
            let record = runner
                .api()
                .create_record(runner.descriptor(), &body)
                .await
                .map_err(validation_failure)?;
            print_record(&run, runner.descriptor(), &record).await
        }
        Command::Update(args) => {
            let body = crate::utils::parse_json_object(&args.data)?;
            let runner = runner_for(&run, args.entity, None, session)?;
            let record = runner
                .api()
                .update_record(runner.descriptor(), args.id.trim(), &body)
                .await
                .map_err(validation_failure)?;
            print_record(&run, runner.descriptor(), &record).await
        }
        Command::Delete(args) => {
            let runner = runner_for(&run, args.entity, None, session)?;
            runner
                .api()
                .delete_record(runner.descriptor(), args.id.trim())
                .await
                .map_err(|e| e.to_string())?;
            print_ok(&format!("deleted {} {}", runner.descriptor().name, args.id.trim()));
            Ok(())
        }
        Command::Login(args) => run_login(&run, args, &store).await,
        Command::Logout => run_logout(&run, session, &store).await,
        Command::Stats(_) => run_stats(&run, session).await,
    }
}

fn load_config_for(args: &CliArgs) -> Result<ConfigFile, String> {
    if let Some(path) = args.config.as_deref() {
        return config::load_config(&config::expand_tilde(path), false);
    }
    let Some(path) = config::default_config_path() else {
        return Ok(ConfigFile::default());
    };
    if let Err(e) = config::ensure_default_config_file(&path) {
        log::warn!("{e}");
    }
    config::load_config(&path, true)
}

pub fn run_cli() -> Result<(), String> {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp
            | ErrorKind::DisplayVersion
            | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                print!("{e}");
                return Ok(());
            }
            _ => return Err(e.to_string()),
        },
    };
    init_logging(args.verbose);

    let cfg = load_config_for(&args)?;
    let run = build_run_config(args, cfg, config::base_url_from_env())?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to build runtime: {e}"))?;

    rt.block_on(run_async(run))
}

#[cfg(test)]
mod cli_tests {
    use super::*;

    fn parse(argv: &[&str]) -> CliArgs {
        CliArgs::parse_from(argv)
    }

    #[test]
    fn base_url_precedence_is_cli_env_file_default() {
        let s = |v: &str| Some(v.to_string());
        assert_eq!(
            resolve_base_url(s("http://cli"), s("http://env"), s("http://file")),
            "http://cli"
        );
        assert_eq!(
            resolve_base_url(None, s("http://env"), s("http://file")),
            "http://env"
        );
        assert_eq!(resolve_base_url(None, None, s("http://file")), "http://file");
        assert_eq!(resolve_base_url(None, None, None), config::DEFAULT_BASE_URL);
    }

    #[test]
    fn config_file_fills_unset_flags() {
        let args = parse(&["hmslist", "--session-file", "/tmp/s.json", "list", "persons"]);
        let cfg = ConfigFile {
            timeout: Some(3),
            page_size: Some(50),
            output_format: Some("json".to_string()),
            ..ConfigFile::default()
        };
        let run = build_run_config(args, cfg, None).unwrap();
        assert_eq!(run.timeout, 3);
        assert_eq!(run.page_size, 50);
        assert_eq!(run.output_format, OutputFormat::Json);
        assert_eq!(run.session_path, PathBuf::from("/tmp/s.json"));
    }

    #[test]
    fn flags_override_config_file() {
        let args = parse(&[
            "hmslist",
            "--timeout",
            "30",
            "--session-file",
            "/tmp/s.json",
            "browse",
            "facilities",
            "--debounce",
            "250",
        ]);
        let cfg = ConfigFile {
            timeout: Some(3),
            debounce_ms: Some(900),
            ..ConfigFile::default()
        };
        let run = build_run_config(args, cfg, None).unwrap();
        assert_eq!(run.timeout, 30);
        assert_eq!(run.debounce, Duration::from_millis(250));
        assert_eq!(run.output_format, OutputFormat::Text);
    }

    #[test]
    fn bad_config_page_size_is_rejected() {
        let args = parse(&["hmslist", "--session-file", "/tmp/s.json", "list", "persons"]);
        let cfg = ConfigFile {
            page_size: Some(0),
            ..ConfigFile::default()
        };
        assert!(build_run_config(args, cfg, None).is_err());
    }

    #[test]
    fn runner_gets_query_flags() {
        let args = parse(&[
            "hmslist",
            "--session-file",
            "/tmp/s.json",
            "list",
            "employees",
            "--search",
            "gagnon",
            "--filter",
            "role=nurse",
            "--page",
            "3",
        ]);
        let run = build_run_config(args, ConfigFile::default(), None).unwrap();
        let Command::List(list) = run.command.clone() else {
            panic!("expected list command");
        };
        let runner = runner_for(&run, list.entity, Some(&list.query), Session::default()).unwrap();
        assert_eq!(runner.options().search, "gagnon");
        assert_eq!(runner.options().page, 3);
        assert_eq!(
            runner.options().filters.get("role").map(String::as_str),
            Some("nurse")
        );
    }

    #[test]
    fn stats_takes_its_own_format() {
        let args = parse(&["hmslist", "--session-file", "/tmp/s.json", "stats", "-o", "json"]);
        let run = build_run_config(args, ConfigFile::default(), None).unwrap();
        assert!(matches!(run.command, Command::Stats(_)));
        assert_eq!(run.output_format, OutputFormat::Json);

        let args = parse(&["hmslist", "--session-file", "/tmp/s.json", "stats"]);
        let cfg = ConfigFile {
            output_format: Some("json".to_string()),
            ..ConfigFile::default()
        };
        let run = build_run_config(args, cfg, None).unwrap();
        assert_eq!(run.output_format, OutputFormat::Json);
    }
}
