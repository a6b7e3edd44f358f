//! Terminal input parsing.
//!
//! Lines starting with `/` are commands; anything else is a message for the
//! active agent. A leading `//` sends a message that starts with `/`.

use serde_json::Value;

/// Errors raised while parsing a command line.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// The command name is not recognised.
    #[error("unknown command /{0} (try /help)")]
    Unknown(String),

    /// A required argument is missing.
    #[error("/{command} needs {argument}")]
    MissingArgument {
        /// Command name.
        command: &'static str,
        /// Description of the missing argument.
        argument: &'static str,
    },

    /// Action parameters are not valid JSON.
    #[error("action parameters must be JSON: {0}")]
    InvalidParams(#[from] serde_json::Error),
}

/// A parsed line of input.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Blank line.
    Empty,
    /// Send a message to the active agent.
    Message(String),
    /// Reload and list sessions.
    Sessions,
    /// Create a session.
    New,
    /// Close the given session, or the active one.
    Close(Option<String>),
    /// Select a session and optionally an agent.
    Use {
        /// Session ID.
        session: String,
        /// Agent ID; the first agent if absent.
        agent: Option<String>,
    },
    /// Show windows.
    Windows,
    /// Show apps.
    Apps,
    /// Show the timeline.
    Timeline {
        /// Include obsolete items.
        include_obsolete: bool,
    },
    /// Show the raw context dump.
    Context,
    /// Show the raw LLM input dump.
    LlmInput,
    /// Invoke a window action.
    Invoke {
        /// Target window.
        window_id: String,
        /// Action ID.
        action_id: String,
        /// JSON parameters, `{}` if omitted.
        params: Value,
    },
    /// Inject assistant output.
    SimulateAssistant(String),
    /// Inject a tool result.
    SimulateTool {
        /// Tool name.
        tool_name: String,
        /// Tool output.
        content: String,
    },
    /// Refresh the active snapshot.
    Refresh,
    /// Show command help.
    Help,
    /// Exit.
    Quit,
}

/// Command summary printed by `/help`.
pub const HELP: &str = "\
/sessions                       reload and list sessions
/new                            create a session and select its first agent
/use <session> [agent]          select a session and agent
/close [session]                close a session (default: active)
/windows  /apps                 show the active agent's windows or apps
/timeline [all]                 show the timeline (all: include obsolete items)
/context  /llm-input            show raw context or raw LLM input
/invoke <window> <action> [json] invoke a window action
/sim-assistant <text>           inject assistant output
/sim-tool <tool> <text>         inject a tool result
/refresh                        refresh the active agent
/quit                           exit
Anything else is sent to the active agent.";

/// Parse one line of terminal input.
///
/// # Errors
///
/// Returns an error for unknown commands, missing arguments or invalid JSON
/// parameters.
pub fn parse_command(line: &str) -> Result<Command, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Command::Empty);
    }
    if let Some(escaped) = line.strip_prefix("//") {
        return Ok(Command::Message(format!("/{escaped}")));
    }
    let Some(body) = line.strip_prefix('/') else {
        return Ok(Command::Message(line.to_string()));
    };

    let (name, rest) = split_word(body);
    let command = match name {
        "sessions" | "ls" => Command::Sessions,
        "new" => Command::New,
        "close" => Command::Close(non_empty(rest)),
        "use" => {
            let (session, rest) = split_word(rest);
            if session.is_empty() {
                return Err(missing("use", "a session ID"));
            }
            Command::Use {
                session: session.to_string(),
                agent: non_empty(rest),
            }
        }
        "windows" => Command::Windows,
        "apps" => Command::Apps,
        "timeline" => Command::Timeline {
            include_obsolete: rest.eq_ignore_ascii_case("all"),
        },
        "context" => Command::Context,
        "llm-input" => Command::LlmInput,
        "invoke" => {
            let (window_id, rest) = split_word(rest);
            let (action_id, params) = split_word(rest);
            if window_id.is_empty() || action_id.is_empty() {
                return Err(missing("invoke", "a window ID and an action ID"));
            }
            let params = if params.is_empty() {
                Value::Object(serde_json::Map::new())
            } else {
                serde_json::from_str(params)?
            };
            Command::Invoke {
                window_id: window_id.to_string(),
                action_id: action_id.to_string(),
                params,
            }
        }
        "sim-assistant" => Command::SimulateAssistant(
            non_empty(rest).ok_or_else(|| missing("sim-assistant", "some text"))?,
        ),
        "sim-tool" => {
            let (tool_name, content) = split_word(rest);
            if tool_name.is_empty() || content.is_empty() {
                return Err(missing("sim-tool", "a tool name and some text"));
            }
            Command::SimulateTool {
                tool_name: tool_name.to_string(),
                content: content.to_string(),
            }
        }
        "refresh" => Command::Refresh,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(command)
}

/// Split off the first whitespace-delimited word.
fn split_word(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    match text.find(char::is_whitespace) {
        Some(end) => (&text[..end], text[end..].trim()),
        None => (text, ""),
    }
}

fn non_empty(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

const fn missing(command: &'static str, argument: &'static str) -> CommandError {
    CommandError::MissingArgument { command, argument }
}
