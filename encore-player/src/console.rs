use encore_core::Command;
use encore_ports::catalog::{CatalogFacet, CatalogQuery};
use encore_ports::types::PieceId;
use serde_json::Value;

pub const HELP: &str = "\
commands:
  play <piece-id>        start a piece, or stop it if it is already on
  stop                   stop playback
  tempo <bpm>            set the tempo
  search <text>          search pieces by title
  style|instrument|composer <text>
                         search pieces by facet
  styles|instruments|composers
                         list facet values
  about <composer>       show composer information
  status                 show the current status
  help                   show this text
  quit                   exit";

#[derive(Clone, Debug, PartialEq)]
pub enum ConsoleCommand {
    Session(Command),
    Search(CatalogQuery),
    List(CatalogFacet),
    ComposerInfo(String),
    Status,
    Help,
    Quit,
}

/// `Ok(None)` for a blank line.
pub fn parse_line(line: &str) -> Result<Option<ConsoleCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word.to_lowercase().as_str() {
        "play" => ConsoleCommand::Session(Command::Play {
            piece_id: PieceId::new(required(word, rest)?),
        }),
        "stop" => ConsoleCommand::Session(Command::Stop),
        "tempo" => ConsoleCommand::Session(Command::SetTempo {
            bpm: Value::String(required(word, rest)?.to_string()),
        }),
        "search" => ConsoleCommand::Search(CatalogQuery::Text(required(word, rest)?.to_string())),
        "style" => ConsoleCommand::Search(CatalogQuery::Style(required(word, rest)?.to_string())),
        "instrument" => {
            ConsoleCommand::Search(CatalogQuery::Instrument(required(word, rest)?.to_string()))
        }
        "composer" => {
            ConsoleCommand::Search(CatalogQuery::Composer(required(word, rest)?.to_string()))
        }
        "styles" => ConsoleCommand::List(CatalogFacet::Styles),
        "instruments" => ConsoleCommand::List(CatalogFacet::Instruments),
        "composers" => ConsoleCommand::List(CatalogFacet::Composers),
        "about" => ConsoleCommand::ComposerInfo(required(word, rest)?.to_string()),
        "status" => ConsoleCommand::Status,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        other => return Err(format!("unknown command `{other}`; try `help`")),
    };
    Ok(Some(command))
}

fn required<'a>(word: &str, rest: &'a str) -> Result<&'a str, String> {
    if rest.is_empty() {
        Err(format!("`{word}` needs an argument"))
    } else {
        Ok(rest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_session_commands() {
        assert_eq!(
            parse_line("play 65f1c0"),
            Ok(Some(ConsoleCommand::Session(Command::Play {
                piece_id: PieceId::from("65f1c0")
            })))
        );
        assert_eq!(
            parse_line("  STOP "),
            Ok(Some(ConsoleCommand::Session(Command::Stop)))
        );
        assert_eq!(
            parse_line("tempo 96"),
            Ok(Some(ConsoleCommand::Session(Command::SetTempo {
                bpm: Value::String("96".to_string())
            })))
        );
    }

    #[test]
    fn search_keeps_the_whole_query() {
        assert_eq!(
            parse_line("search clair de lune"),
            Ok(Some(ConsoleCommand::Search(CatalogQuery::Text(
                "clair de lune".to_string()
            ))))
        );
        assert_eq!(
            parse_line("composers"),
            Ok(Some(ConsoleCommand::List(CatalogFacet::Composers)))
        );
        assert_eq!(
            parse_line("about Erik Satie"),
            Ok(Some(ConsoleCommand::ComposerInfo("Erik Satie".to_string())))
        );
    }

    #[test]
    fn rejects_missing_arguments_and_unknown_words() {
        assert!(parse_line("play").is_err());
        assert!(parse_line("tempo   ").is_err());
        assert!(parse_line("rewind").is_err());
        assert_eq!(parse_line("   "), Ok(None));
    }
}
