//! Line commands understood by `hmslist browse`.
//!
//! Every stdin line is one edit of the list view: `/text` types into the
//! search box (an empty `/` clears it), `:filter k=v` picks a dropdown value,
//! `:clear k` resets one filter, `:reset` clears search and filters, and
//! `:next`, `:prev`, `:page N` move between pages.

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BrowseCommand {
    Search(String),
    Filter { key: String, value: String },
    Clear(String),
    Reset,
    Next,
    Previous,
    Page(usize),
    Refresh,
    Show(String),
    Delete(String),
    Options,
    Help,
    Quit,
}

pub const HELP: &str = "\
  /TEXT         search (a bare / clears it)
  :filter K=V   set a filter (V = all removes it)
  :clear K      remove a filter
  :reset        clear search and filters
  :next :prev   move one page
  :page N       jump to page N
  :refresh      fetch the current page again
  :show ID      print one record
  :delete ID    delete a record and refresh
  :options      filter values on this page
  :quit";

pub fn parse_line(line: &str) -> Result<Option<BrowseCommand>, String> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Ok(None);
    }
    if let Some(term) = line.strip_prefix('/') {
        return Ok(Some(BrowseCommand::Search(term.to_string())));
    }
    let Some(rest) = line.trim().strip_prefix(':') else {
        // Plain text is typed into the search box.
        return Ok(Some(BrowseCommand::Search(line.to_string())));
    };
    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    let cmd = match name.to_ascii_lowercase().as_str() {
        "filter" | "f" => {
            let (key, value) = crate::utils::parse_filter_pair(arg)?;
            BrowseCommand::Filter { key, value }
        }
        "clear" | "c" => {
            if arg.is_empty() {
                return Err(":clear needs a filter name".to_string());
            }
            BrowseCommand::Clear(arg.to_ascii_lowercase())
        }
        "reset" => BrowseCommand::Reset,
        "next" | "n" => BrowseCommand::Next,
        "prev" | "previous" | "p" => BrowseCommand::Previous,
        "page" | "g" => {
            let n = arg
                .parse::<usize>()
                .map_err(|_| format!("invalid page '{arg}'"))?;
            BrowseCommand::Page(n)
        }
        "refresh" | "r" => BrowseCommand::Refresh,
        "show" => BrowseCommand::Show(required_id(name, arg)?),
        "delete" | "rm" => BrowseCommand::Delete(required_id(name, arg)?),
        "options" | "o" => BrowseCommand::Options,
        "help" | "h" | "?" => BrowseCommand::Help,
        "quit" | "q" | "exit" => BrowseCommand::Quit,
        other => return Err(format!("unknown command ':{other}' (try :help)")),
    };
    Ok(Some(cmd))
}

fn required_id(name: &str, arg: &str) -> Result<String, String> {
    if arg.is_empty() {
        return Err(format!(":{name} needs a record id"));
    }
    Ok(arg.to_string())
}
