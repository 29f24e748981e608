use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter},
    path::{Path, PathBuf},
};

use regex::Regex;

use crate::{
    core::{listing, options::OPTIONS},
    prelude::{evaluate, Error, FdResult, OptionValue, Options, SymbolTable},
};

use super::{CallbackKind, Output};

/// Deepest chain of command files reading each other
const MAX_SCRIPT_DEPTH: usize = 16;

/// Widest address `=` will pad to
const MAX_WIDTH: usize = 16;

const SYM_HELP: &str = "Edit or inspect the symbol table
    sym clear                          remove every symbol
    sym set <name> <expr>              define or move a symbol
    sym del <name>...                  delete symbols
    sym import <file>                  replace the table with a listing
    sym import+ <file>                 merge a listing into the table
    sym export <file>                  write the table as a listing
    sym find [regex]                   list symbols in address order
    sym rename <regex> <replacement>   rename every matching symbol";

const OPT_HELP: &str = "Show or change session options
    opt                                list every option
    opt <name>                         show one option
    opt <name> <value>                 change an option";

const HELP_FOOTER: &str = "Type \"help <topic>\" for more information.
Press Ctrl+D to quit.
";

pub fn default_actions() -> ActionList {
    ActionList {
        actions: vec![
            Action::new(
                "help",
                vec![Param::with_default("command", "")],
                help_parser,
                "Display help",
            ),
            Action::new(
                "?",
                vec![Param::with_default("command", "")],
                help_parser,
                "Display help",
            ),
            Action::new("exit", vec![], exit_parser, "Quit the program"),
            Action::new("q", vec![], exit_parser, "Quit the program"),
            Action::new(
                "=",
                vec![Param::new("expression")],
                eval_parser,
                "Evaluate an address expression and show the nearest symbol",
            ),
            Action::new(
                "opt",
                vec![
                    Param::with_default("name", ""),
                    Param::with_default("value", ""),
                ],
                opt_parser,
                OPT_HELP,
            ),
            Action::new(
                "read",
                vec![Param::new("file")],
                read_parser,
                "Run every line of a command file",
            ),
            Action::new(
                "sym",
                vec![
                    Param::new("subcommand"),
                    Param::with_default("args", ""),
                ],
                sym_parser,
                SYM_HELP,
            ),
        ],
    }
}

/// Command syntax:
/// An action name followed by its parameters, split like a shell would
/// so that quoted arguments may contain spaces:
/// read "~/debug sessions/setup.cmd"
pub struct ActionList {
    actions: Vec<Action>,
}

impl ActionList {
    pub fn eval(&self, input: &str) -> FdResult<Commands> {
        let words = shell_words::split(input)?;
        let mut split = words.iter().map(String::as_str);
        let cmd = split.next().unwrap_or("");
        let args: Vec<&str> = split.collect();
        let action = self
            .actions
            .iter()
            .find(|x| x.name == cmd)
            .ok_or_else(|| Error::UnknownCommand(cmd.into()))?;

        action.eval(&args)
    }

    fn help(&self, f: &mut Output<'_>, cmd: &str) -> FdResult<()> {
        if cmd.is_empty() {
            f("Available commands:\n", CallbackKind::Heading)?;
            for action in &self.actions {
                action.help(f)?;
            }
            f("\nAvailable options:\n", CallbackKind::Heading)?;
            for def in OPTIONS {
                f(&format!("    {}\n", def.name), CallbackKind::None)?;
            }
            f("\n", CallbackKind::None)?;
            return f(HELP_FOOTER, CallbackKind::None);
        }

        let mut printed = false;
        for action in &self.actions {
            if action.name.starts_with(cmd) {
                printed = true;
                action.help(f)?;
            }
        }
        if let Some(def) = OPTIONS.iter().find(|def| def.name == cmd) {
            printed = true;
            f("OPTION: ", CallbackKind::Heading)?;
            f(
                &format!("{} ({})\n    {}\n", def.name, def.type_name(), def.help),
                CallbackKind::None,
            )?;
        }
        if printed {
            Ok(())
        } else {
            Err(Error::UnknownCommand(cmd.into()))
        }
    }
}

#[derive(Default)]
pub struct Param {
    name: String,
    default_value: Option<String>,
}

impl Param {
    fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            default_value: None,
        }
    }

    fn with_default(name: &str, default_value: &str) -> Self {
        Self {
            name: name.into(),
            default_value: Some(default_value.into()),
        }
    }
}

type CommandParser = fn(&[&str], &[Param]) -> FdResult<Commands>;

pub struct Action {
    help: String,
    name: String,
    params: Vec<Param>,
    parser: CommandParser,
}

impl Action {
    fn new(name: &str, params: Vec<Param>, parser: CommandParser, help: &str) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            params,
            parser,
        }
    }

    fn eval(&self, args: &[&str]) -> FdResult<Commands> {
        (self.parser)(args, &self.params)
    }

    fn help(&self, f: &mut Output<'_>) -> FdResult<()> {
        f(&self.name, CallbackKind::Heading)?;
        self.params.iter().try_for_each(|x| {
            if let Some(default_value) = &x.default_value {
                f(
                    &format!(" [{}='{}']", x.name, default_value),
                    CallbackKind::None,
                )
            } else {
                f(&format!(" [{}]", x.name), CallbackKind::None)
            }
        })?;
        f(&format!(" {}\n", self.help), CallbackKind::None)?;
        Ok(())
    }
}

/// What the caller should do after a command ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Everything a command may change: the table, the options and the
/// current nesting of command files
pub struct Session {
    pub stab: SymbolTable,
    pub options: Options,
    depth: usize,
}

impl Session {
    pub fn new(stab: SymbolTable) -> Self {
        Self {
            stab,
            options: Options::default(),
            depth: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub enum SymCommand {
    Clear,
    Set { name: String, value: String },
    Del(Vec<String>),
    Import { path: PathBuf, merge: bool },
    Export(PathBuf),
    Find(Option<String>),
    Rename { pattern: String, replacement: String },
}

#[derive(Debug, Clone)]
pub enum Commands {
    Exit,
    Help(String),
    Eval(String),
    Opt(Option<String>, Option<String>),
    Read(PathBuf),
    Sym(SymCommand),
}

impl Commands {
    pub fn execute(
        &self,
        f: &mut Output<'_>,
        session: &mut Session,
        actions: &ActionList,
    ) -> FdResult<Flow> {
        match self {
            Commands::Exit => return Ok(Flow::Exit),
            Commands::Help(cmd) => actions.help(f, cmd)?,
            Commands::Eval(expr) => {
                let stab = &session.stab;
                let address = evaluate(stab, expr)?;
                let width = (session.options.width as usize).min(MAX_WIDTH);
                let mut line = format!("0x{:0width$x}", address, width = width);
                if let Some(nearest) = stab.nearest(address) {
                    line.push_str(&format!(" = {}", nearest));
                }
                f(&format!("{}\n", line), CallbackKind::None)?;
            }
            Commands::Opt(name, value) => opt(f, session, name.as_deref(), value.as_deref())?,
            Commands::Read(path) => return run_script(f, path, session, actions),
            Commands::Sym(sym) => sym.execute(f, &mut session.stab, &session.options)?,
        }
        Ok(Flow::Continue)
    }
}

fn show_option(f: &mut Output<'_>, name: &str, value: OptionValue) -> FdResult<()> {
    f(&format!("{:>32} = {}\n", name, value), CallbackKind::None)
}

fn opt(
    f: &mut Output<'_>,
    session: &mut Session,
    name: Option<&str>,
    value: Option<&str>,
) -> FdResult<()> {
    match (name, value) {
        (None, _) => {
            for (name, value) in session.options.values() {
                show_option(f, name, value)?;
            }
        }
        (Some(name), None) => show_option(f, name, session.options.get(name)?)?,
        (Some(name), Some(text)) => {
            session.options.set(name, text, &session.stab)?;
            if name == "color" {
                console::set_colors_enabled(session.options.color);
                console::set_colors_enabled_stderr(session.options.color);
            }
        }
    }
    Ok(())
}

impl SymCommand {
    fn execute(
        &self,
        f: &mut Output<'_>,
        stab: &mut SymbolTable,
        options: &Options,
    ) -> FdResult<()> {
        match self {
            SymCommand::Clear => stab.clear(),
            SymCommand::Set { name, value } => {
                let address = evaluate(stab, value)?;
                stab.set(name, address)?;
            }
            SymCommand::Del(names) => {
                for name in names {
                    stab.delete(name)?;
                }
            }
            SymCommand::Import { path, merge } => {
                let reader = BufReader::new(File::open(path)?);
                let count = listing::import(stab, reader, !merge)?;
                if !options.quiet {
                    f(&format!("{} symbols imported\n", count), CallbackKind::None)?;
                }
            }
            SymCommand::Export(path) => {
                let mut writer = BufWriter::new(File::create(path)?);
                let count = listing::export(stab, &mut writer)?;
                if !options.quiet {
                    f(&format!("{} symbols exported\n", count), CallbackKind::None)?;
                }
            }
            SymCommand::Find(pattern) => {
                let re = pattern.as_deref().map(Regex::new).transpose()?;
                for (name, address) in listing::find(stab, re.as_ref())? {
                    f(&format!("0x{:04x}: {}\n", address, name), CallbackKind::None)?;
                }
            }
            SymCommand::Rename {
                pattern,
                replacement,
            } => {
                let re = Regex::new(pattern)?;
                let renamed = listing::rename(stab, &re, replacement)?;
                if !options.quiet {
                    for (old, new) in &renamed {
                        f(&format!("    {} -> {}\n", old, new), CallbackKind::None)?;
                    }
                    f(
                        &format!("{} symbols renamed\n", renamed.len()),
                        CallbackKind::None,
                    )?;
                }
            }
        }
        Ok(())
    }
}

/// Run one command line. Blank lines and `#` comments do nothing.
pub fn run_line(
    f: &mut Output<'_>,
    line: &str,
    session: &mut Session,
    actions: &ActionList,
) -> FdResult<Flow> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(Flow::Continue);
    }
    actions.eval(line)?.execute(f, session, actions)
}

/// Run a command file line by line, stopping at the first failure.
/// Files may `read` other files up to 16 levels deep.
pub fn run_script(
    f: &mut Output<'_>,
    path: &Path,
    session: &mut Session,
    actions: &ActionList,
) -> FdResult<Flow> {
    if session.depth >= MAX_SCRIPT_DEPTH {
        return Err(Error::ScriptDepth(path.display().to_string()));
    }
    session.depth += 1;
    let flow = run_lines(f, path, session, actions);
    session.depth -= 1;
    flow
}

fn run_lines(
    f: &mut Output<'_>,
    path: &Path,
    session: &mut Session,
    actions: &ActionList,
) -> FdResult<Flow> {
    let reader = BufReader::new(File::open(path)?);
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let flow = run_line(f, &line, session, actions).map_err(|err| Error::Script {
            file: path.display().to_string(),
            line: index + 1,
            source: Box::new(err),
        })?;
        if flow == Flow::Exit {
            return Ok(Flow::Exit);
        }
    }
    Ok(Flow::Continue)
}

/* Command parsers */

fn get_arg_or(args: &[&str], params: &[Param], index: usize) -> FdResult<String> {
    match (args.get(index), params.get(index)) {
        (Some(arg), Some(_)) => Ok(arg.to_string()),
        (None, Some(Param {
            default_value: Some(def),
            ..
        })) => Ok(def.into()),
        _ => Err(Error::InsufficientArguments),
    }
}

fn has_too_many_args(args: &[&str], params: &[Param]) -> FdResult<()> {
    if args.len() > params.len() {
        Err(Error::TooManyArguments)
    } else {
        Ok(())
    }
}

fn exact_args<'a, 'b>(args: &'a [&'b str], count: usize) -> FdResult<&'a [&'b str]> {
    match args.len() {
        n if n < count => Err(Error::InsufficientArguments),
        n if n > count => Err(Error::TooManyArguments),
        _ => Ok(args),
    }
}

fn expand_path(text: &str) -> FdResult<PathBuf> {
    let expanded = shellexpand::full(text).map_err(|err| anyhow::anyhow!("{}", err))?;
    Ok(PathBuf::from(expanded.into_owned()))
}

fn help_parser(args: &[&str], params: &[Param]) -> FdResult<Commands> {
    has_too_many_args(args, params)?;

    let cmd = get_arg_or(args, params, 0)?;

    Ok(Commands::Help(cmd))
}

fn exit_parser(args: &[&str], params: &[Param]) -> FdResult<Commands> {
    has_too_many_args(args, params)?;
    Ok(Commands::Exit)
}

fn eval_parser(args: &[&str], _params: &[Param]) -> FdResult<Commands> {
    // the expression may have been split on its spaces
    if args.is_empty() {
        return Err(Error::InsufficientArguments);
    }
    Ok(Commands::Eval(args.join(" ")))
}

fn opt_parser(args: &[&str], _params: &[Param]) -> FdResult<Commands> {
    // numeric values are expressions and may have been split on spaces
    match args {
        [] => Ok(Commands::Opt(None, None)),
        [name] => Ok(Commands::Opt(Some(name.to_string()), None)),
        [name, value @ ..] => Ok(Commands::Opt(
            Some(name.to_string()),
            Some(value.join(" ")),
        )),
    }
}

fn read_parser(args: &[&str], params: &[Param]) -> FdResult<Commands> {
    has_too_many_args(args, params)?;
    let path = get_arg_or(args, params, 0)?;
    Ok(Commands::Read(expand_path(&path)?))
}

fn sym_parser(args: &[&str], _params: &[Param]) -> FdResult<Commands> {
    let (sub, rest) = args.split_first().ok_or(Error::InsufficientArguments)?;

    let cmd = match *sub {
        "clear" => {
            exact_args(rest, 0)?;
            SymCommand::Clear
        }
        "set" => match rest {
            [name, value @ ..] if !value.is_empty() => SymCommand::Set {
                name: name.to_string(),
                value: value.join(" "),
            },
            _ => return Err(Error::InsufficientArguments),
        },
        "del" => {
            if rest.is_empty() {
                return Err(Error::InsufficientArguments);
            }
            SymCommand::Del(rest.iter().map(|x| x.to_string()).collect())
        }
        "import" | "import+" => SymCommand::Import {
            path: expand_path(exact_args(rest, 1)?[0])?,
            merge: *sub == "import+",
        },
        "export" => SymCommand::Export(expand_path(exact_args(rest, 1)?[0])?),
        "find" => match rest {
            [] => SymCommand::Find(None),
            [pattern] => SymCommand::Find(Some(pattern.to_string())),
            _ => return Err(Error::TooManyArguments),
        },
        "rename" => {
            let rest = exact_args(rest, 2)?;
            SymCommand::Rename {
                pattern: rest[0].to_string(),
                replacement: rest[1].to_string(),
            }
        }
        _ => return Err(Error::UnknownCommand(format!("sym {}", sub))),
    };

    Ok(Commands::Sym(cmd))
}
