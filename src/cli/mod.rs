pub mod interactive;

use std::{fs::File, io::BufReader, path::Path};

use crate::{
    core::{config::generate_completion, listing},
    prelude::{Commands, Config, Error, FdResult, SymbolTable},
};

use self::interactive::{command::Flow, default_interactive_callback, Interactive};

#[cfg(feature = "log")]
fn init_logger(cfg: &Config) -> FdResult<()> {
    simple_logger::SimpleLogger::new()
        .with_level(cfg.log_level())
        .init()
        .map_err(|err| anyhow::anyhow!("{}", err))?;
    Ok(())
}

#[cfg(not(feature = "log"))]
fn init_logger(_cfg: &Config) -> FdResult<()> {
    Ok(())
}

/// Merge a listing into `stab`
pub fn load_symbols(stab: &mut SymbolTable, path: &Path) -> FdResult<usize> {
    let reader = BufReader::new(File::open(path)?);
    let count = listing::import(stab, reader, false)?;
    log::info!("{}: {} symbols", path.display(), count);
    Ok(count)
}

pub fn init(cfg: &Config) -> FdResult<()> {
    if let Some(shell) = cfg.completions {
        generate_completion(shell);
        return Ok(());
    }

    init_logger(cfg)?;

    // the session table every command works on
    let mut stab = SymbolTable::new();
    for path in &cfg.symbols {
        load_symbols(&mut stab, path)?;
    }
    let mut interactive = Interactive::new(stab);
    let mut out = default_interactive_callback;

    match cfg.selected_command() {
        Commands::Shell => interactive::command_line(&mut interactive),
        Commands::Exec { lines } => {
            for (index, line) in lines.iter().enumerate() {
                let flow = interactive
                    .execute(&mut out, line)
                    .map_err(|err| Error::Script {
                        file: "exec".into(),
                        line: index + 1,
                        source: Box::new(err),
                    })?;
                if flow == Flow::Exit {
                    break;
                }
            }
            Ok(())
        }
        Commands::Read { path } => interactive.read_file(&mut out, &path).map(|_| ()),
    }
}
