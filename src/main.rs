//! # shadeset
//!
//! Command-line editor for the `1_settings.glsl` document read by the
//! kwin-effects-glsl shader renderer.
//!
//! ## Mental model
//! - **Canonical file**: `<shader dir>/1_settings.glsl`. The renderer reads it; we keep it pointed at
//!   the active profile (symlink, or a synced copy with `--copy-links`).
//! - **Profiles**: `<shader dir>/profiles/<name>.profile`. The first one is seeded from
//!   `1_settings.glsl.example` (or from an existing canonical file).
//! - **Store**: `<config dir>/shadeset/settings.json` remembers the shader dir, active profile,
//!   whitelist mirror and the AutoSave / DefaultEnabled flags.
//!
//! Every command here is one-shot, so mutating commands save right away. `watch` is the only
//! long-running command: it follows external edits to the canonical file until killed.
//!
//! Mutating commands and `watch` hold the single-instance marker; read-only commands don't.

mod presenter;
mod validate;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use shadeset_engine::logging;
use shadeset_engine::{
    loge, logi, logw, EngineError, EngineEvent, InstanceGuard, JsonSettingsStore, LinkMode,
    RendererEndpoint, Session, SessionOptions, ShaderPaths,
};

use presenter::{Presenter, TablePresenter};

const USAGE: &str = "\
usage: shadeset [options] <command>

options:
  --shader-dir <DIR>   shader directory (else SHADESET_SHADER_DIR, the store, the data dirs)
  --config <FILE>      settings store (default: <config dir>/shadeset/settings.json)
  --log-file <FILE>    append log lines to FILE (or SHADESET_LOG_FILE)
  --copy-links         keep the canonical file as a copy instead of a symlink

commands:
  show [--json]                 shaders, settings and tooltips
  status                        enabled shaders
  toggle <SHADER_ID>            flip a shader on/off
  set <NAME> <VALUE>            edit a setting (1, -0.5, vec2(1.0, 2.0), vec3(...))
  move-up <NAME>                move a shader one place up in the order
  move-down <NAME>              move a shader one place down in the order
  order <NAME>...               replace the whole order
  whitelist <TEXT>...           replace the whitelist
  check                         report order/block inconsistencies
  profile list                  list profiles (* = active)
  profile create                new profile from the template
  profile copy <NAME>           duplicate a profile
  profile rename <OLD> <NEW>    rename a profile
  profile delete <NAME>         delete a profile (never the last one)
  profile activate <NAME>       make a profile active
  config                        print the store
  config auto-save <on|off>
  config default-enabled <on|off>
  config blacklist <TEXT>...    windows the renderer never touches
  watch                         follow external edits until interrupted
";

const LOG_FILE_ENV: &str = "SHADESET_LOG_FILE";

#[derive(Debug, Default)]
struct Cli {
    shader_dir: Option<PathBuf>,
    config: Option<PathBuf>,
    log_file: Option<PathBuf>,
    copy_links: bool,
    command: Command,
}

#[derive(Debug, Default, PartialEq, Eq)]
enum Command {
    #[default]
    Help,
    Show { json: bool },
    Status,
    Toggle(String),
    Set { name: String, value: String },
    MoveUp(String),
    MoveDown(String),
    Order(Vec<String>),
    Whitelist(String),
    Check,
    Profile(ProfileCommand),
    Config(Option<(ConfigFlag, bool)>),
    Blacklist(String),
    Watch,
}

#[derive(Debug, PartialEq, Eq)]
enum ProfileCommand {
    List,
    Create,
    Copy(String),
    Rename(String, String),
    Delete(String),
    Activate(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigFlag {
    AutoSave,
    DefaultEnabled,
}

impl Command {
    /// Commands that write the document, the profiles or the store.
    fn mutates(&self) -> bool {
        !matches!(
            self,
            Command::Help
                | Command::Show { .. }
                | Command::Status
                | Command::Check
                | Command::Profile(ProfileCommand::List)
                | Command::Config(None)
        )
    }
}

fn parse_args(args: impl IntoIterator<Item = String>) -> anyhow::Result<Cli> {
    let mut cli = Cli::default();
    let mut rest: Vec<String> = Vec::new();

    let mut it = args.into_iter();
    while let Some(a) = it.next() {
        match a.as_str() {
            "--shader-dir" => cli.shader_dir = Some(PathBuf::from(value_of(&a, it.next())?)),
            "--config" => cli.config = Some(PathBuf::from(value_of(&a, it.next())?)),
            "--log-file" => cli.log_file = Some(PathBuf::from(value_of(&a, it.next())?)),
            "--copy-links" => cli.copy_links = true,
            "-h" | "--help" => return Ok(Cli { command: Command::Help, ..cli }),
            _ => rest.push(a),
        }
    }

    cli.command = parse_command(&rest)?;
    Ok(cli)
}

fn value_of(flag: &str, v: Option<String>) -> anyhow::Result<String> {
    v.ok_or_else(|| anyhow!("{flag} needs a value"))
}

fn parse_command(words: &[String]) -> anyhow::Result<Command> {
    let words: Vec<&str> = words.iter().map(String::as_str).collect();
    let cmd = match words.as_slice() {
        [] | ["help"] => Command::Help,
        ["show"] => Command::Show { json: false },
        ["show", "--json"] => Command::Show { json: true },
        ["status"] => Command::Status,
        ["toggle", id] => Command::Toggle(id.to_string()),
        ["set", name, value @ ..] if !value.is_empty() => Command::Set {
            name: name.to_string(),
            // Let `set X vec3(1.0, 2.0, 3.0)` work unquoted.
            value: value.join(" "),
        },
        ["move-up", name] => Command::MoveUp(name.to_string()),
        ["move-down", name] => Command::MoveDown(name.to_string()),
        ["order", names @ ..] if !names.is_empty() => {
            Command::Order(names.iter().map(|s| s.to_string()).collect())
        }
        ["whitelist", text @ ..] => Command::Whitelist(text.join(" ")),
        ["check"] => Command::Check,
        ["profile", "list"] | ["profile"] => Command::Profile(ProfileCommand::List),
        ["profile", "create"] => Command::Profile(ProfileCommand::Create),
        ["profile", "copy", name] => Command::Profile(ProfileCommand::Copy(name.to_string())),
        ["profile", "rename", old, new] => {
            Command::Profile(ProfileCommand::Rename(old.to_string(), new.to_string()))
        }
        ["profile", "delete", name] => Command::Profile(ProfileCommand::Delete(name.to_string())),
        ["profile", "activate", name] => Command::Profile(ProfileCommand::Activate(name.to_string())),
        ["config"] => Command::Config(None),
        ["config", "blacklist", text @ ..] => Command::Blacklist(text.join(" ")),
        ["config", flag, state] => {
            let flag = match *flag {
                "auto-save" => ConfigFlag::AutoSave,
                "default-enabled" => ConfigFlag::DefaultEnabled,
                other => bail!("unknown config flag '{other}'"),
            };
            Command::Config(Some((flag, parse_switch(state)?)))
        }
        ["watch"] => Command::Watch,
        other => bail!("unrecognized command: {}", other.join(" ")),
    };
    Ok(cmd)
}

fn parse_switch(s: &str) -> anyhow::Result<bool> {
    match s {
        "on" | "true" | "1" => Ok(true),
        "off" | "false" | "0" => Ok(false),
        other => bail!("expected on/off, got '{other}'"),
    }
}

fn main() {
    let cli = match parse_args(std::env::args().skip(1)) {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("shadeset: {e}\n\n{USAGE}");
            std::process::exit(2);
        }
    };

    // --- Logging init ---------------------------------------------------------------
    // --log-file <path> (append) or env SHADESET_LOG_FILE. Stdout is for command output.
    let log_file = cli.log_file.clone().or_else(|| {
        std::env::var(LOG_FILE_ENV)
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
    });
    let run_id = logging::init(log_file);
    logging::info_to_stderr(true);
    logi!("INIT", "run_id={run_id}");

    if cli.command == Command::Help {
        print!("{USAGE}");
        return;
    }

    if let Err(e) = run(cli) {
        loge!("ERROR", "{e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    // Held until run() returns; a second editor exits here.
    let _instance = if cli.command.mutates() {
        match InstanceGuard::acquire() {
            Ok(guard) => Some(guard),
            Err(EngineError::AlreadyRunning { pid }) => {
                bail!("another shadeset instance is running (pid {pid})")
            }
            Err(e) => return Err(e).context("single-instance check"),
        }
    } else {
        None
    };

    let store_path = cli.config.clone().unwrap_or_else(JsonSettingsStore::default_path);
    let store = JsonSettingsStore::open(&store_path)
        .with_context(|| format!("settings store {}", store_path.display()))?;
    logi!("CONFIG", "store: {}", store.path().display());

    let paths = ShaderPaths::discover(cli.shader_dir.as_deref(), &store)
        .context("no shader directory found (use --shader-dir)")?;
    logi!("CONFIG", "shader dir: {}", paths.shader_dir().display());

    let options = SessionOptions {
        link_mode: if cli.copy_links { LinkMode::Copy } else { LinkMode::platform_default() },
        watch: cli.command == Command::Watch,
        renderer: RendererEndpoint::from_env(),
    };
    let mut session = Session::open(paths, Box::new(store), options)?;

    execute(cli.command, &mut session)
}

fn execute(command: Command, session: &mut Session) -> anyhow::Result<()> {
    let table = TablePresenter::default();

    match command {
        Command::Help => print!("{USAGE}"),
        Command::Show { json } => {
            let out = Presenter::for_flags(json).view(session.view(), session.active_profile())?;
            print!("{out}");
        }
        Command::Status => print!("{}", table.status(session.view())),
        Command::Toggle(id) => {
            if !session.toggle_shader(&id)? {
                bail!("no shader '{id}'");
            }
            persist(session)?;
        }
        Command::Set { name, value } => {
            if !session.edit_setting(&name, &value)? {
                logw!("EDIT", "'{name}' unchanged (unknown, inside a disabled shader, or same value)");
            }
            persist(session)?;
        }
        Command::MoveUp(name) => {
            session.move_shader_up(&name)?;
            persist(session)?;
        }
        Command::MoveDown(name) => {
            session.move_shader_down(&name)?;
            persist(session)?;
        }
        Command::Order(names) => {
            session.set_order(&names)?;
            persist(session)?;
        }
        Command::Whitelist(text) => {
            session.update_whitelist(&text)?;
            persist(session)?;
        }
        Command::Check => {
            let label = session
                .paths()
                .canonical()
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let issues = validate::check_view(&label, session.view());
            validate::emit_issues("CHECK", &issues);
            validate::emit_summary("CHECK", &label, &issues);
        }
        Command::Profile(cmd) => profile(cmd, session, &table)?,
        Command::Config(None) => {
            println!("{}", serde_json::to_string_pretty(&session.settings())?);
        }
        Command::Config(Some((flag, on))) => match flag {
            ConfigFlag::AutoSave => session.set_auto_save(on)?,
            ConfigFlag::DefaultEnabled => session.set_default_enabled(on)?,
        },
        Command::Blacklist(text) => {
            let stored = session.set_blacklist(&text)?;
            logi!("CONFIG", "blacklist: \"{stored}\"");
        }
        Command::Watch => watch(session, &table)?,
    }
    Ok(())
}

/// One-shot commands save whatever AutoSave did not.
fn persist(session: &mut Session) -> anyhow::Result<()> {
    if session.is_dirty() {
        session.save()?;
    }
    Ok(())
}

fn profile(cmd: ProfileCommand, session: &mut Session, table: &TablePresenter) -> anyhow::Result<()> {
    match cmd {
        ProfileCommand::List => {}
        ProfileCommand::Create => {
            let p = session.create_profile()?;
            logi!("PROFILE", "created '{}'", p.name);
        }
        ProfileCommand::Copy(name) => {
            let p = session.copy_profile(&name)?;
            logi!("PROFILE", "copied '{name}' to '{}'", p.name);
        }
        ProfileCommand::Rename(old, new) => {
            session.rename_profile(&old, &new)?;
        }
        ProfileCommand::Delete(name) => session.delete_profile(&name)?,
        ProfileCommand::Activate(name) => session.activate_profile(&name)?,
    }
    print!("{}", table.profiles(&session.profiles()?, session.active_profile()));
    Ok(())
}

fn watch(session: &mut Session, table: &TablePresenter) -> anyhow::Result<()> {
    let events = session.subscribe();
    logi!("WATCH", "watching {} (Ctrl-C to stop)", session.paths().canonical().display());
    print!("{}", table.status(session.view()));

    loop {
        // Canonical file can be briefly missing mid-save by another editor; try again next tick.
        if let Err(e) = session.wait_external_change(Duration::from_secs(1)) {
            logw!("WATCH", "reload failed: {e}");
        }
        for ev in events.try_iter() {
            if let EngineEvent::ExternalChange { .. } = ev {
                print!("{}", table.status(session.view()));
            }
        }
    }
}
