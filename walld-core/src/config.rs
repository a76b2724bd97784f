use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, WalldError};
use crate::interface::Interface;
use crate::models::{TimeUnit, Value};
use crate::paths::expand_home;
use crate::variable::Variable;

/// Interface name in `[PreHooks]` / `[PostHooks]` that matches every interface.
pub const ALL_INTERFACES: &str = "*";

/// The config file as written on disk.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigDocument {
    #[serde(rename = "Daemon", alias = "daemon", default)]
    pub daemon: DaemonSettings,
    #[serde(rename = "Interfaces", alias = "interfaces", default)]
    pub interfaces: BTreeMap<String, InterfaceDecl>,
    #[serde(rename = "PreHooks", alias = "pre_hooks", default)]
    pub pre_hooks: BTreeMap<String, HookDecl>,
    #[serde(rename = "PostHooks", alias = "post_hooks", default)]
    pub post_hooks: BTreeMap<String, HookDecl>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DaemonSettings {
    #[serde(alias = "interval")]
    pub schedule: i64,
    #[serde(alias = "unit")]
    pub units: String,
    pub shuffle: bool,
    pub path: Option<String>,
    pub recursive: bool,
    pub active_interfaces: Vec<String>,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            schedule: 1,
            units: "h".into(),
            shuffle: true,
            path: None,
            recursive: false,
            active_interfaces: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum InterfaceDecl {
    Args(Vec<String>),
    Verbose(VerboseInterface),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerboseInterface {
    pub args: Vec<String>,
    #[serde(default)]
    pub variables: BTreeMap<String, VariableDecl>,
    pub pre_hook: Option<HookDecl>,
    pub post_hook: Option<HookDecl>,
}

/// Either a single command or a list of commands.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum HookDecl {
    Single(Vec<String>),
    Many(Vec<Vec<String>>),
}

impl HookDecl {
    pub fn commands(&self) -> Vec<Vec<String>> {
        match self {
            Self::Single(cmd) if cmd.is_empty() => Vec::new(),
            Self::Single(cmd) => vec![cmd.clone()],
            Self::Many(cmds) => cmds.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum VariableDecl {
    Enumeration(EnumerationDecl),
    Declared(DeclaredVariable),
    /// A bare value is a constant.
    Bare(Value),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnumerationDecl {
    pub current: Value,
    pub options: Vec<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeclaredVariable {
    pub value: Value,
    #[serde(rename = "const", default)]
    pub constant: bool,
}

impl VariableDecl {
    fn build(self, name: &str) -> Result<Variable> {
        match self {
            Self::Enumeration(e) => Variable::enumeration(name, e.current, e.options),
            Self::Declared(DeclaredVariable {
                value,
                constant: true,
            })
            | Self::Bare(value) => Ok(Variable::constant(value)),
            Self::Declared(DeclaredVariable { value, .. }) => Ok(Variable::mutable(value)),
        }
    }
}

/// Validated daemon configuration. Built once at startup.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub interval: Duration,
    pub shuffle: bool,
    pub source_path: Option<PathBuf>,
    pub recursive: bool,
    /// Ordered, duplicate free, and every entry is a key of `interfaces`.
    pub active_interfaces: Vec<String>,
    pub interfaces: BTreeMap<String, Interface>,
}

impl Configuration {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| WalldError::Config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let doc: ConfigDocument = toml::from_str(content)?;
        Self::from_document(doc)
    }

    pub fn from_document(doc: ConfigDocument) -> Result<Self> {
        let ConfigDocument {
            daemon,
            interfaces: decls,
            pre_hooks,
            post_hooks,
        } = doc;

        let unit: TimeUnit = daemon
            .units
            .parse()
            .map_err(|_| WalldError::UnknownTimeUnits(daemon.units.clone()))?;
        let interval = u64::try_from(daemon.schedule)
            .ok()
            .filter(|v| *v > 0)
            .and_then(|v| unit.duration(v))
            .ok_or(WalldError::InvalidSchedule(daemon.schedule))?;

        let mut interfaces = BTreeMap::new();
        for (name, decl) in decls {
            let iface = build_interface(&name, decl)?;
            interfaces.insert(name, iface);
        }

        apply_global_hooks(&mut interfaces, &pre_hooks, Interface::add_pre_hook)?;
        apply_global_hooks(&mut interfaces, &post_hooks, Interface::add_post_hook)?;

        let mut active_interfaces: Vec<String> = Vec::new();
        for name in daemon.active_interfaces {
            if !interfaces.contains_key(&name) {
                return Err(WalldError::Config(format!(
                    "active interface `{name}` is not declared under [Interfaces]"
                )));
            }
            if !active_interfaces.contains(&name) {
                active_interfaces.push(name);
            }
        }

        Ok(Self {
            interval,
            shuffle: daemon.shuffle,
            source_path: daemon.path.as_deref().map(expand_home),
            recursive: daemon.recursive,
            active_interfaces,
            interfaces,
        })
    }
}

fn build_interface(name: &str, decl: InterfaceDecl) -> Result<Interface> {
    match decl {
        InterfaceDecl::Args(args) => Interface::new(name, &args, BTreeMap::new()),
        InterfaceDecl::Verbose(v) => {
            let mut variables = BTreeMap::new();
            for (var_name, var_decl) in v.variables {
                let var = var_decl.build(&var_name)?;
                variables.insert(var_name, var);
            }
            let mut iface = Interface::new(name, &v.args, variables)?;
            for cmd in v.pre_hook.iter().flat_map(HookDecl::commands) {
                iface.add_pre_hook(&cmd)?;
            }
            for cmd in v.post_hook.iter().flat_map(HookDecl::commands) {
                iface.add_post_hook(&cmd)?;
            }
            Ok(iface)
        }
    }
}

fn apply_global_hooks(
    interfaces: &mut BTreeMap<String, Interface>,
    hooks: &BTreeMap<String, HookDecl>,
    add: fn(&mut Interface, &[String]) -> Result<()>,
) -> Result<()> {
    for (target, decl) in hooks {
        let commands = decl.commands();
        if target == ALL_INTERFACES {
            for iface in interfaces.values_mut() {
                for cmd in &commands {
                    add(iface, cmd)?;
                }
            }
        } else {
            let iface = interfaces.get_mut(target).ok_or_else(|| {
                WalldError::Config(format!("hooks given for undeclared interface `{target}`"))
            })?;
            for cmd in &commands {
                add(iface, cmd)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
[Daemon]
schedule = 30
units = "m"
shuffle = false
path = "/srv/walls"
recursive = true
active_interfaces = ["swww", "feh", "swww"]

[Interfaces]
feh = ["feh", "--bg-fill", "%f"]

[Interfaces.swww]
args = ["swww", "img", "%f", "--transition-type", "%transition", "--transition-fps", "%fps"]
pre_hook = ["swww", "query"]
post_hook = [["notify-send", "%f"], ["true"]]

[Interfaces.swww.variables]
fps = { value = 60 }
step = { value = 90, const = true }
transition = { current = "grow", options = ["grow", "wipe", "fade"] }
label = "swww"

[PreHooks]
"*" = ["logger", "rotating"]

[PostHooks]
feh = [["echo", "done"]]
"#;

    #[test]
    fn test_parse_full_document() {
        let config = Configuration::from_toml_str(FULL).unwrap();
        assert_eq!(config.interval, Duration::from_secs(1800));
        assert!(!config.shuffle);
        assert!(config.recursive);
        assert_eq!(config.source_path, Some(PathBuf::from("/srv/walls")));
        assert_eq!(config.active_interfaces, vec!["swww", "feh"]);

        let swww = &config.interfaces["swww"];
        assert!(matches!(swww.variables()["fps"], Variable::Mutable { .. }));
        assert!(matches!(swww.variables()["step"], Variable::Constant { .. }));
        assert!(matches!(swww.variables()["label"], Variable::Constant { .. }));
        assert!(matches!(
            swww.variables()["transition"],
            Variable::Enumeration { .. }
        ));

        let cmd = swww.resolve(Path::new("/srv/walls/a.png"));
        assert_eq!(
            cmd.argv,
            vec!["swww", "img", "/srv/walls/a.png", "--transition-type", "grow", "--transition-fps", "60"]
        );
        // local hook first, then the global one
        assert_eq!(
            cmd.pre_hooks,
            vec![vec!["swww", "query"], vec!["logger", "rotating"]]
        );
        assert_eq!(cmd.post_hooks.len(), 2);

        let feh = config.interfaces["feh"].resolve(Path::new("/x.jpg"));
        assert_eq!(feh.pre_hooks, vec![vec!["logger", "rotating"]]);
        assert_eq!(feh.post_hooks, vec![vec!["echo", "done"]]);
    }

    #[test]
    fn test_defaults() {
        let config = Configuration::from_toml_str("").unwrap();
        assert_eq!(config.interval, Duration::from_secs(3600));
        assert!(config.shuffle);
        assert!(config.source_path.is_none());
        assert!(config.interfaces.is_empty());
    }

    #[test]
    fn test_aliases() {
        let config = Configuration::from_toml_str(
            r#"
[daemon]
interval = 45
unit = "seconds"
"#,
        )
        .unwrap();
        assert_eq!(config.interval, Duration::from_secs(45));
    }

    #[test]
    fn test_invalid_schedule_and_units() {
        let err = Configuration::from_toml_str("[Daemon]\nschedule = 0").unwrap_err();
        assert!(matches!(err, WalldError::InvalidSchedule(0)));

        let err = Configuration::from_toml_str("[Daemon]\nunits = \"d\"").unwrap_err();
        assert!(matches!(err, WalldError::UnknownTimeUnits(ref u) if u == "d"));

        let err = Configuration::from_toml_str("[Daemon]\nschedule = 9223372036854775807\nunits = \"s\"")
            .unwrap_err();
        assert!(matches!(err, WalldError::InvalidSchedule(i64::MAX)));
    }

    #[test]
    fn test_structural_errors() {
        // undeclared active interface
        assert!(Configuration::from_toml_str("[Daemon]\nactive_interfaces = [\"nope\"]").is_err());
        // dangling variable reference
        assert!(Configuration::from_toml_str("[Interfaces]\nx = [\"x\", \"%fps\"]").is_err());
        // verbose interface without args
        assert!(Configuration::from_toml_str("[Interfaces.x]\nvariables = {}").is_err());
        // enumeration cannot be const
        assert!(Configuration::from_toml_str(
            r#"
[Interfaces.x]
args = ["x", "%t"]
variables = { t = { current = "a", options = ["a"], const = true } }
"#
        )
        .is_err());
        // hooks for an unknown interface
        assert!(Configuration::from_toml_str(
            "[Interfaces]\nx = [\"x\"]\n[PreHooks]\ny = [\"echo\"]"
        )
        .is_err());
    }
}
