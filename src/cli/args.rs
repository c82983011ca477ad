use clap::{ArgAction, Args, Parser, Subcommand};

use crate::entity::EntityKind;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "hmslist",
    version,
    about = "search, filter and page through hospital management records",
    long_about = "hmslist is a command line client for the hospital management REST API. It lists persons, employees, facilities, infections, vaccinations and schedules with debounced search, server-side filters and pagination.\n\nExamples:\n  hmslist list facilities --filter type=CLSC\n  hmslist list persons --search tremblay --page 2\n  hmslist browse employees\n  hmslist stats\n  hmslist --base-url http://hms.local:8000 show facilities 12\n\nTip: Use --config to persist connection settings and keep CLI invocations short."
)]
pub struct CliArgs {
    #[arg(
        short = 'v',
        long = "verbose",
        action = ArgAction::Count,
        global = true,
        help_heading = "Output",
        help = "Increase log verbosity (-v, -vv)."
    )]
    pub verbose: u8,

    #[arg(
        long = "no-color",
        visible_alias = "nc",
        global = true,
        help_heading = "Output",
        help = "Disable colored output."
    )]
    pub no_color: bool,

    #[arg(
        short = 'C',
        long = "config",
        visible_alias = "cfg",
        value_name = "FILE",
        global = true,
        help_heading = "Input",
        help = "Path to config file (defaults to ~/.hmslist/config.yml)."
    )]
    pub config: Option<String>,

    #[arg(
        short = 'b',
        long = "base-url",
        visible_alias = "url",
        value_name = "URL",
        global = true,
        help_heading = "Connection",
        help = "Backend base URL (overrides HMS_API_BASE_URL and the config file)."
    )]
    pub base_url: Option<String>,

    #[arg(
        long = "timeout",
        value_name = "SECONDS",
        global = true,
        help_heading = "Connection",
        help = "Request timeout in seconds."
    )]
    pub timeout: Option<u64>,

    #[arg(
        short = 'p',
        long = "proxy",
        value_name = "URL",
        global = true,
        help_heading = "Connection",
        help = "Proxy URL for all requests (e.g. http://127.0.0.1:8080)."
    )]
    pub proxy: Option<String>,

    #[arg(
        long = "session-file",
        value_name = "FILE",
        global = true,
        help_heading = "Connection",
        help = "Where the login token is kept (defaults to ~/.hmslist/session.json)."
    )]
    pub session_file: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Fetch one page of a list and print it.
    List(ListArgs),
    /// Interactive list: read search, filter and page commands from stdin.
    Browse(BrowseArgs),
    /// Print one record.
    Show(RecordArgs),
    /// Create a record from a JSON object.
    Create(CreateArgs),
    /// Replace a record with a JSON object.
    Update(UpdateArgs),
    /// Delete a record.
    Delete(RecordArgs),
    /// Log in and keep the token for later commands.
    Login(LoginArgs),
    /// Drop the stored token.
    Logout,
    /// Print the dashboard totals and distributions.
    Stats(StatsArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct QueryArgs {
    #[arg(
        short = 's',
        long = "search",
        value_name = "TEXT",
        help_heading = "Query",
        help = "Search term."
    )]
    pub search: Option<String>,

    #[arg(
        short = 'f',
        long = "filter",
        value_name = "KEY=VALUE",
        action = ArgAction::Append,
        help_heading = "Query",
        help = "Filter (repeatable or comma-separated, e.g. --filter type=CLSC). A value of 'all' removes the filter."
    )]
    pub filter: Vec<String>,

    #[arg(
        short = 'n',
        long = "page",
        value_name = "N",
        help_heading = "Query",
        help = "Page number (1-based)."
    )]
    pub page: Option<usize>,

    #[arg(
        long = "page-size",
        visible_alias = "ps",
        value_name = "N",
        help_heading = "Query",
        help = "Records per page (1-100)."
    )]
    pub page_size: Option<usize>,
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    #[arg(value_name = "ENTITY", help = "Entity to list.")]
    pub entity: EntityKind,

    #[command(flatten)]
    pub query: QueryArgs,

    #[arg(
        short = 'o',
        long = "format",
        visible_alias = "output-format",
        value_name = "FORMAT",
        help_heading = "Output",
        help = "Output format: text or json."
    )]
    pub format: Option<String>,

    #[arg(
        short = 'g',
        long = "group-by",
        value_name = "FIELD",
        num_args = 0..=1,
        default_missing_value = "",
        help_heading = "Output",
        help = "Group rows by a field (defaults to the entity's date field)."
    )]
    pub group_by: Option<String>,

    #[arg(
        long = "filter-options",
        visible_alias = "facets",
        help_heading = "Output",
        help = "Also print the filter values present on this page with their counts."
    )]
    pub filter_options: bool,
}

#[derive(Args, Debug, Clone)]
pub struct BrowseArgs {
    #[arg(value_name = "ENTITY", help = "Entity to browse.")]
    pub entity: EntityKind,

    #[command(flatten)]
    pub query: QueryArgs,

    #[arg(
        long = "debounce",
        value_name = "MS",
        help_heading = "Query",
        help = "Quiet time before a typed search is sent, in milliseconds."
    )]
    pub debounce_ms: Option<u64>,
}

#[derive(Args, Debug, Clone)]
pub struct RecordArgs {
    #[arg(value_name = "ENTITY")]
    pub entity: EntityKind,

    #[arg(value_name = "ID")]
    pub id: String,

    #[arg(
        short = 'o',
        long = "format",
        value_name = "FORMAT",
        help_heading = "Output",
        help = "Output format: text or json."
    )]
    pub format: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct CreateArgs {
    #[arg(value_name = "ENTITY")]
    pub entity: EntityKind,

    #[arg(
        short = 'd',
        long = "data",
        value_name = "JSON",
        help = "Record fields as a JSON object."
    )]
    pub data: String,
}

#[derive(Args, Debug, Clone)]
pub struct UpdateArgs {
    #[arg(value_name = "ENTITY")]
    pub entity: EntityKind,

    #[arg(value_name = "ID")]
    pub id: String,

    #[arg(
        short = 'd',
        long = "data",
        value_name = "JSON",
        help = "Record fields as a JSON object."
    )]
    pub data: String,
}

#[derive(Args, Debug, Clone)]
pub struct LoginArgs {
    #[arg(short = 'u', long = "username", value_name = "NAME")]
    pub username: String,

    #[arg(short = 'P', long = "password", value_name = "PASSWORD")]
    pub password: String,
}

#[derive(Args, Debug, Clone)]
pub struct StatsArgs {
    #[arg(
        short = 'o',
        long = "format",
        value_name = "FORMAT",
        help_heading = "Output",
        help = "Output format: text or json."
    )]
    pub format: Option<String>,
}
