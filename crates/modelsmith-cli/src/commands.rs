//! Line-oriented command parsing for the interactive shell.

use std::path::PathBuf;

use modelsmith_core::ModelType;

pub const HELP: &str = "\
Commands:
  <text>                        send a message to the active project
  /new <name>                   create a project and switch to it
  /projects                     list projects
  /use <id|number>              switch the active project
  /rename <name> [| <desc>]     rename the active project
  /delete [id]                  delete a project (the active one by default)
  /doc list                     list documents of the active project
  /doc add <title> [| <body>]   add a document
  /doc show <id>                print a document
  /doc edit <id> <body>         replace a document's body
  /doc delete <id>              delete a document
  /schema                       print the active schema
  /schema set <code>            replace the schema (\\n for newlines)
  /attach <path>...             attach files to the next message
  /model [expert|fast]          show or switch the model
  /stop                         stop the pending request
  /help                         show this help
  /quit                         exit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Send(String),
    NewProject(String),
    ListProjects,
    UseProject(String),
    Rename { name: String, description: Option<String> },
    Delete(Option<String>),
    ListDocs,
    AddDoc { title: String, content: String },
    ShowDoc(String),
    EditDoc { id: String, content: String },
    DeleteDoc(String),
    ShowSchema,
    SetSchema(String),
    Attach(Vec<PathBuf>),
    Model(Option<ModelType>),
    Stop,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error("Unknown command: {0} (try /help)")]
    Unknown(String),

    #[error(transparent)]
    Model(#[from] modelsmith_core::models::model_type::UnknownModelType),
}

/// Split `a | b` into its two halves; the second half is optional
fn split_pipe(rest: &str) -> (String, Option<String>) {
    match rest.split_once('|') {
        Some((a, b)) => (a.trim().to_string(), Some(b.trim().to_string())),
        None => (rest.trim().to_string(), None),
    }
}

fn required(rest: &str, usage: &'static str) -> Result<String, ParseError> {
    let rest = rest.trim();
    if rest.is_empty() {
        return Err(ParseError::Usage(usage));
    }
    Ok(rest.to_string())
}

/// Parse one input line. Returns `Ok(None)` for blank lines.
pub fn parse(line: &str) -> Result<Option<Command>, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    if !line.starts_with('/') {
        return Ok(Some(Command::Send(line.to_string())));
    }

    let (head, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();

    let command = match head {
        "/new" => Command::NewProject(required(rest, "/new <name>")?),
        "/projects" => Command::ListProjects,
        "/use" => Command::UseProject(required(rest, "/use <id|number>")?),
        "/rename" => {
            let (name, description) = split_pipe(rest);
            if name.is_empty() {
                return Err(ParseError::Usage("/rename <name> [| <description>]"));
            }
            Command::Rename { name, description }
        }
        "/delete" => Command::Delete((!rest.is_empty()).then(|| rest.to_string())),
        "/doc" => parse_doc(rest)?,
        "/schema" => match rest.split_once(char::is_whitespace) {
            Some(("set", code)) => Command::SetSchema(code.trim().replace("\\n", "\n")),
            None if rest == "set" => return Err(ParseError::Usage("/schema set <code>")),
            None if rest.is_empty() => Command::ShowSchema,
            _ => return Err(ParseError::Usage("/schema [set <code>]")),
        },
        "/attach" => {
            let paths: Vec<PathBuf> = rest.split_whitespace().map(PathBuf::from).collect();
            if paths.is_empty() {
                return Err(ParseError::Usage("/attach <path>..."));
            }
            Command::Attach(paths)
        }
        "/model" if rest.is_empty() => Command::Model(None),
        "/model" => Command::Model(Some(rest.parse()?)),
        "/stop" => Command::Stop,
        "/help" => Command::Help,
        "/quit" | "/exit" => Command::Quit,
        other => return Err(ParseError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

fn parse_doc(rest: &str) -> Result<Command, ParseError> {
    let (action, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    let args = args.trim();

    match action {
        "list" | "" => Ok(Command::ListDocs),
        "add" => {
            let (title, content) = split_pipe(args);
            if title.is_empty() {
                return Err(ParseError::Usage("/doc add <title> [| <body>]"));
            }
            Ok(Command::AddDoc {
                title,
                content: content.unwrap_or_default().replace("\\n", "\n"),
            })
        }
        "show" => Ok(Command::ShowDoc(required(args, "/doc show <id>")?)),
        "edit" => match args.split_once(char::is_whitespace) {
            Some((id, content)) => Ok(Command::EditDoc {
                id: id.to_string(),
                content: content.trim().replace("\\n", "\n"),
            }),
            None => Err(ParseError::Usage("/doc edit <id> <body>")),
        },
        "delete" => Ok(Command::DeleteDoc(required(args, "/doc delete <id>")?)),
        _ => Err(ParseError::Usage("/doc list|add|show|edit|delete")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_sent() {
        assert_eq!(
            parse("  design a blog schema ").unwrap(),
            Some(Command::Send("design a blog schema".to_string()))
        );
        assert_eq!(parse("   ").unwrap(), None);
    }

    #[test]
    fn test_project_commands() {
        assert_eq!(
            parse("/new Online Shop").unwrap(),
            Some(Command::NewProject("Online Shop".to_string()))
        );
        assert_eq!(
            parse("/rename Shop | orders and payments").unwrap(),
            Some(Command::Rename {
                name: "Shop".to_string(),
                description: Some("orders and payments".to_string()),
            })
        );
        assert_eq!(parse("/delete").unwrap(), Some(Command::Delete(None)));
        assert_eq!(parse("/new"), Err(ParseError::Usage("/new <name>")));
    }

    #[test]
    fn test_doc_commands() {
        assert_eq!(
            parse("/doc add Glossary").unwrap(),
            Some(Command::AddDoc {
                title: "Glossary".to_string(),
                content: String::new(),
            })
        );
        assert_eq!(
            parse("/doc edit abc # Title\\nbody").unwrap(),
            Some(Command::EditDoc {
                id: "abc".to_string(),
                content: "# Title\nbody".to_string(),
            })
        );
        assert_eq!(parse("/doc").unwrap(), Some(Command::ListDocs));
        assert!(parse("/doc rename x").is_err());
    }

    #[test]
    fn test_schema_and_model() {
        assert_eq!(parse("/schema").unwrap(), Some(Command::ShowSchema));
        assert_eq!(
            parse("/schema set erDiagram\\n  A ||--o{ B : has").unwrap(),
            Some(Command::SetSchema("erDiagram\n  A ||--o{ B : has".to_string()))
        );
        assert_eq!(
            parse("/model flash").unwrap(),
            Some(Command::Model(Some(ModelType::Fast)))
        );
        assert!(matches!(parse("/model gpt"), Err(ParseError::Model(_))));
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(
            parse("/frobnicate"),
            Err(ParseError::Unknown("/frobnicate".to_string()))
        );
    }
}
