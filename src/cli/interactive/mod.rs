pub mod command;

use std::path::Path;

use crate::prelude::{FdResult, SymbolTable};
use console::style;
use rustyline::error::ReadlineError;

use self::command::{default_actions, run_line, run_script, ActionList, Flow, Session};

pub enum CallbackKind {
    None,
    Heading,
}

/// Receives everything a command prints
pub type Output<'a> = dyn FnMut(&str, CallbackKind) -> FdResult<()> + 'a;

pub fn default_interactive_callback(s: &str, kind: CallbackKind) -> FdResult<()> {
    match kind {
        CallbackKind::None => print!("{}", s),
        CallbackKind::Heading => print!("{}", style(s).bold()),
    }
    Ok(())
}

/// One-line diagnostic naming the command that failed
pub fn report(line: &str, err: &crate::prelude::Error) {
    let cmd = line.split_whitespace().next().unwrap_or("");
    eprintln!("{}: {}", style(cmd).red(), err);
}

/// A command session. The table it owns is the implicit target of every
/// command typed into it.
pub struct Interactive {
    actions: ActionList,
    pub session: Session,
}

impl Interactive {
    pub fn new(stab: SymbolTable) -> Self {
        Self {
            actions: default_actions(),
            session: Session::new(stab),
        }
    }

    pub fn execute(&mut self, f: &mut Output<'_>, line: &str) -> FdResult<Flow> {
        run_line(f, line, &mut self.session, &self.actions)
    }

    pub fn read_file(&mut self, f: &mut Output<'_>, path: &Path) -> FdResult<Flow> {
        run_script(f, path, &mut self.session, &self.actions)
    }
}

pub fn command_line(interactive: &mut Interactive) -> FdResult<()> {
    let mut rl = rustyline::DefaultEditor::new().map_err(|err| anyhow::anyhow!("{}", err))?;
    let mut out = default_interactive_callback;
    loop {
        let readline = rl.readline(">> ");
        match readline {
            Ok(line) => {
                if let Err(err) = rl.add_history_entry(line.as_str()) {
                    log::warn!("history: {}", err);
                }
                match interactive.execute(&mut out, &line) {
                    Ok(Flow::Exit) => return Ok(()),
                    Ok(Flow::Continue) => (),
                    Err(err) => report(&line, &err),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => return Ok(()),
            Err(err) => eprintln!("{:?}", err),
        }
    }
}
