use std::io::{BufRead, Write};

use anyhow::{bail, Result};
use clap::{CommandFactory, Parser};

use crate::cli::ShellLine;
use crate::commands::Runner;
use crate::output::Format;

const PROMPT: &str = "teamdesk> ";

/// Read commands until `exit` or end of input. Lists, bins and pending
/// notices live in the runner's dashboard for the whole session.
pub async fn run<R: BufRead, W: Write>(
    runner: &mut Runner,
    mut input: R,
    writer: &mut W,
    format: Format,
) -> Result<()> {
    runner.set_interactive(true);
    writeln!(
        writer,
        "teamdesk shell. Type `help` for commands, `exit` to leave."
    )?;
    let mut line = String::new();
    loop {
        write!(writer, "{PROMPT}")?;
        writer.flush()?;
        line.clear();
        if input.read_line(&mut line)? == 0 {
            writeln!(writer)?;
            break;
        }
        let trimmed = line.trim();
        match trimmed {
            "" => continue,
            "exit" | "quit" => break,
            "help" => {
                writeln!(writer, "{}", ShellLine::command().render_help())?;
                continue;
            }
            _ => {}
        }

        let words = match split_words(trimmed) {
            Ok(words) => words,
            Err(err) => {
                writeln!(writer, "error: {err}")?;
                continue;
            }
        };
        let parsed = match ShellLine::try_parse_from(words) {
            Ok(parsed) => parsed,
            Err(err) => {
                write!(writer, "{err}")?;
                continue;
            }
        };
        let format = if parsed.json { Format::Json } else { format };
        if let Err(err) = runner.execute(parsed.command, format, writer).await {
            writeln!(writer, "error: {err:#}")?;
        }
    }
    runner.close();
    Ok(())
}

/// Whitespace split that keeps single- or double-quoted runs together.
fn split_words(line: &str) -> Result<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut in_word = false;

    for ch in line.chars() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => current.push(ch),
            None if ch == '"' || ch == '\'' => {
                quote = Some(ch);
                in_word = true;
            }
            None if ch.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            None => {
                current.push(ch);
                in_word = true;
            }
        }
    }
    if quote.is_some() {
        bail!("unterminated quote");
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::core::MemoryBackend;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::io::Cursor;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    #[rstest]
    #[case("todo list", vec!["todo", "list"])]
    #[case("todo add 'Write report' --due fri", vec!["todo", "add", "Write report", "--due", "fri"])]
    #[case("forum post \"Lunch?\"  --description ''", vec!["forum", "post", "Lunch?", "--description", ""])]
    fn splits_quoted_words(#[case] line: &str, #[case] expected: Vec<&str>) {
        assert_eq!(split_words(line).unwrap(), expected);
    }

    #[test]
    fn unterminated_quote_is_an_error() {
        assert!(split_words("todo add \"oops").is_err());
    }

    async fn session(script: &str) -> String {
        let dir = TempDir::new().unwrap();
        let config =
            AppConfig::from_parts(dir.path().to_path_buf(), "http://127.0.0.1:9/api", Duration::from_secs(1))
                .unwrap();
        let mut runner = Runner::new(&config, Arc::new(MemoryBackend::with_sample_data()));
        let mut out = Vec::new();
        run(&mut runner, Cursor::new(script.to_string()), &mut out, Format::Text)
            .await
            .unwrap();
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn bin_survives_between_lines() {
        let out = session(
            "login 3 --password demo\n\
             todo add Write report\n\
             todo delete 101\n\
             todo bin\n\
             todo restore 101\n\
             todo list --search report\n\
             exit\n",
        )
        .await;

        assert!(out.contains("Moved to bin: to-do 101"));
        assert!(out.contains("Restored to-do 101"));
        let listing = out.rsplit(PROMPT).nth(1).unwrap();
        assert!(listing.contains("Write report"));
        assert!(listing.contains("0 in bin"));
    }

    #[tokio::test]
    async fn errors_do_not_end_the_session() {
        let out = session("todo list\nbogus\nlogin 4 --password demo\nwhoami\n").await;

        assert!(out.contains("error: Not signed in"));
        assert!(out.contains("unrecognized subcommand 'bogus'"));
        assert!(out.contains("Tom Becker (id 4, "));
    }
}
