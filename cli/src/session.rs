// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use anyhow::{anyhow, bail, Result};
use gpiotoggle::device::Session;
use gpiotoggle::driver::Driver;
use gpiotoggle::toggle::Edge;
use gpiotoggle::Platform;
use rustyline::completion::{Completer, Pair};
use rustyline::config::CompletionType;
use rustyline::error::ReadlineError;
use rustyline::history::FileHistory;
use rustyline_derive::{Helper, Highlighter, Hinter, Validator};

const CMD_SET: [&str; 5] = ["edge", "exit", "help", "read", "write"];

/// Run an interactive session on the driver's device until the user exits.
pub fn interact<P: Platform>(driver: &Driver<P>) -> Result<()> {
    let mut editor = Editor::new("gpiotoggle> ")?;
    let session = driver.device().open()?;
    loop {
        let line = editor.next_line()?;
        match execute(driver, &session, &line) {
            Ok(Reply::Exit) => return Ok(()),
            Ok(Reply::Text(text)) => println!("{text}"),
            Ok(Reply::Empty) => {}
            Err(err) => println!("{err}"),
        }
    }
}

#[derive(Debug, Eq, PartialEq)]
enum Reply {
    Empty,
    Text(String),
    Exit,
}

fn execute<P: Platform>(driver: &Driver<P>, session: &Session<P>, line: &str) -> Result<Reply> {
    let mut words = line.split_ascii_whitespace();
    match words.next() {
        None => Ok(Reply::Empty),
        Some("read") => do_read(session),
        Some("write") => do_write(session, words.next()),
        Some("edge") => do_edge(driver),
        Some("exit") => Ok(Reply::Exit),
        Some("help") | Some("?") => Ok(Reply::Text(help())),
        Some(x) => Err(anyhow!("unknown command: '{}'", x)),
    }
}

fn do_read<P: Platform>(session: &Session<P>) -> Result<Reply> {
    let mut buf = [0; 1];
    session.read(&mut buf)?;
    Ok(Reply::Text(buf[0].to_string()))
}

fn do_write<P: Platform>(session: &Session<P>, data: Option<&str>) -> Result<Reply> {
    let Some(data) = data else {
        bail!("invalid command: require data to write");
    };
    let n = session.write(data.as_bytes())?;
    Ok(Reply::Text(format!("wrote {n} bytes")))
}

// simulates an interrupt on the input line
fn do_edge<P: Platform>(driver: &Driver<P>) -> Result<Reply> {
    Ok(Reply::Text(match driver.controller().on_edge() {
        Edge::Toggled(level) => format!("toggled to {}", u8::from(level)),
        Edge::Suppressed => "suppressed by debounce".to_string(),
        Edge::Failed => "failed to write output".to_string(),
        Edge::Ignored => "ignored - driver is not active".to_string(),
    }))
}

fn help() -> String {
    [
        "COMMANDS:",
        "    read",
        "            Read the level of the output line.",
        "",
        "            e.g.",
        "                read",
        "",
        "    write <data>",
        "            Write data to the device.",
        "            Only the first byte is significant - '1' drives the output",
        "            active and '0' drives it inactive.",
        "",
        "            e.g.",
        "                write 1",
        "",
        "    edge",
        "            Apply a rising edge, as if from the input line.",
        "",
        "    help",
        "            Print this help.",
        "",
        "    exit",
        "            Exit the program.",
    ]
    .join("\n")
}

struct Editor {
    rl: rustyline::Editor<InteractiveHelper, FileHistory>,
    prompt: String,
}

impl Editor {
    fn new(prompt: &str) -> Result<Editor> {
        let config = rustyline::Config::builder()
            .completion_type(CompletionType::List)
            .auto_add_history(true)
            .max_history_size(20)?
            .history_ignore_space(true)
            .build();
        let mut rl = rustyline::Editor::with_config(config)?;
        rl.set_helper(Some(InteractiveHelper {}));
        Ok(Editor {
            rl,
            prompt: prompt.to_string(),
        })
    }

    fn next_line(&mut self) -> Result<String> {
        use std::io::Write;
        let mut stdout = std::io::stdout();
        /*
         * manually print the prompt, as rustyline doesn't if stdout
         * is not a tty. And flush to ensure the prompt and any
         * output buffered from the previous command is sent.
         */
        _ = stdout.write(self.prompt.as_bytes());
        _ = stdout.flush();
        match self.rl.readline(self.prompt.as_str()) {
            Ok(line) => Ok(line),
            Err(ReadlineError::Interrupted) => Ok("exit".to_string()),
            Err(ReadlineError::Eof) => Ok("exit".to_string()),
            Err(e) => Err(anyhow!(e)),
        }
    }
}

#[derive(Helper, Validator, Hinter, Highlighter)]
struct InteractiveHelper {}

impl Completer for InteractiveHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> Result<(usize, Vec<Pair>), ReadlineError> {
        Ok(complete_command(line, pos))
    }
}

fn complete_command(line: &str, pos: usize) -> (usize, Vec<Pair>) {
    // the cursor may sit within the leading whitespace
    let cmd_pos = (line.len() - line.trim_start().len()).min(pos);
    let word = &line[cmd_pos..pos];
    if word.contains(char::is_whitespace) {
        // only the command itself is completed
        return (pos, vec![]);
    }
    let candidates = CMD_SET
        .iter()
        .filter(|x| x.starts_with(word))
        .map(|x| base_pair(x))
        .collect();
    (cmd_pos, candidates)
}

// a pair that ends a command word
fn base_pair(candidate: &str) -> Pair {
    let display = String::from(candidate);
    let mut replacement = display.clone();
    replacement.push(' ');
    Pair {
        display,
        replacement,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpiotoggle::driver::Config;
    use gpiotoggle::sim::{self, Level};

    #[test]
    fn commands() {
        let s = sim::simpleton(64);
        let d = Driver::start(s.clone(), &Config::default()).expect("driver should start");
        let f = d.device().open().expect("device should open");

        assert_eq!(execute(&d, &f, "").unwrap(), Reply::Empty);
        assert_eq!(execute(&d, &f, "read").unwrap(), Reply::Text("0".into()));
        assert_eq!(
            execute(&d, &f, "write 1").unwrap(),
            Reply::Text("wrote 1 bytes".into())
        );
        assert_eq!(s.get_level(60).unwrap(), Level::High);
        assert_eq!(execute(&d, &f, " read ").unwrap(), Reply::Text("1".into()));
        assert_eq!(
            execute(&d, &f, "edge").unwrap(),
            Reply::Text("toggled to 0".into())
        );
        assert_eq!(
            execute(&d, &f, "edge").unwrap(),
            Reply::Text("suppressed by debounce".into())
        );
        assert_eq!(execute(&d, &f, "exit").unwrap(), Reply::Exit);
    }

    #[test]
    fn bad_commands() {
        let s = sim::simpleton(64);
        let d = Driver::start(s, &Config::default()).expect("driver should start");
        let f = d.device().open().expect("device should open");

        assert_eq!(
            execute(&d, &f, "write").unwrap_err().to_string(),
            "invalid command: require data to write"
        );
        assert_eq!(
            execute(&d, &f, "toggle").unwrap_err().to_string(),
            "unknown command: 'toggle'"
        );
        // accepted by the device, but ignored
        assert_eq!(
            execute(&d, &f, "write z").unwrap(),
            Reply::Text("wrote 1 bytes".into())
        );
    }

    #[test]
    fn completion() {
        let (pos, candidates) = complete_command("", 0);
        assert_eq!(pos, 0);
        assert_eq!(candidates.len(), CMD_SET.len());

        let (pos, candidates) = complete_command("  e", 3);
        assert_eq!(pos, 2);
        let names: Vec<&str> = candidates.iter().map(|p| p.display.as_str()).collect();
        assert_eq!(names, ["edge", "exit"]);
        assert_eq!(candidates[0].replacement, "edge ");

        let (_, candidates) = complete_command("write 1", 7);
        assert!(candidates.is_empty());

        // cursor moved back into the leading whitespace
        let (pos, candidates) = complete_command("  read", 1);
        assert_eq!(pos, 1);
        assert_eq!(candidates.len(), CMD_SET.len());

        let (pos, candidates) = complete_command("   ", 0);
        assert_eq!(pos, 0);
        assert_eq!(candidates.len(), CMD_SET.len());
    }
}
