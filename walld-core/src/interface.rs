use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WalldError};
use crate::variable::Variable;

/// Name reserved for the wallpaper placeholder `%f`.
pub const WALLPAPER_PLACEHOLDER: &str = "f";

/// One element of a command template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Literal(String),
    Wallpaper,
    Variable(String),
}

impl Token {
    /// `%f` is the wallpaper, `%name` a variable reference and `%%text` the
    /// literal `%text`. Anything else is taken verbatim.
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix('%') {
            Some(rest) if rest.starts_with('%') => Self::Literal(rest.to_string()),
            Some(WALLPAPER_PLACEHOLDER) => Self::Wallpaper,
            Some(name) if !name.is_empty() => Self::Variable(name.to_string()),
            _ => Self::Literal(raw.to_string()),
        }
    }

    fn render(&self, wallpaper: &str, variables: &BTreeMap<String, Variable>) -> String {
        match self {
            Self::Literal(s) => s.clone(),
            Self::Wallpaper => wallpaper.to_string(),
            // references are validated when the interface is built
            Self::Variable(name) => variables
                .get(name)
                .map(|v| v.value().to_string())
                .unwrap_or_else(|| format!("%{name}")),
        }
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // escape only what would otherwise parse as something else
            Self::Literal(s) if Token::parse(s) != *self => write!(f, "%{s}"),
            Self::Literal(s) => f.write_str(s),
            Self::Wallpaper => write!(f, "%{WALLPAPER_PLACEHOLDER}"),
            Self::Variable(name) => write!(f, "%{name}"),
        }
    }
}

pub type Template = Vec<Token>;

fn parse_template(raw: &[String]) -> Template {
    raw.iter().map(|t| Token::parse(t)).collect()
}

fn render_template(
    template: &[Token],
    wallpaper: &str,
    variables: &BTreeMap<String, Variable>,
) -> Vec<String> {
    template
        .iter()
        .map(|t| t.render(wallpaper, variables))
        .collect()
}

/// An external backend command plus the variables its template refers to.
#[derive(Debug, Clone)]
pub struct Interface {
    name: String,
    args: Template,
    variables: BTreeMap<String, Variable>,
    pre_hooks: Vec<Template>,
    post_hooks: Vec<Template>,
}

impl Interface {
    pub fn new(
        name: impl Into<String>,
        args: &[String],
        variables: BTreeMap<String, Variable>,
    ) -> Result<Self> {
        let name = name.into();
        if args.is_empty() {
            return Err(WalldError::Config(format!(
                "interface `{name}` has an empty argument list"
            )));
        }
        if variables.contains_key(WALLPAPER_PLACEHOLDER) {
            return Err(WalldError::Config(format!(
                "interface `{name}` declares variable `{WALLPAPER_PLACEHOLDER}`, which is reserved for the wallpaper path"
            )));
        }
        let iface = Self {
            args: parse_template(args),
            name,
            variables,
            pre_hooks: Vec::new(),
            post_hooks: Vec::new(),
        };
        iface.check_references(&iface.args)?;
        Ok(iface)
    }

    pub fn add_pre_hook(&mut self, command: &[String]) -> Result<()> {
        let hook = self.hook_template(command)?;
        self.pre_hooks.push(hook);
        Ok(())
    }

    pub fn add_post_hook(&mut self, command: &[String]) -> Result<()> {
        let hook = self.hook_template(command)?;
        self.post_hooks.push(hook);
        Ok(())
    }

    fn hook_template(&self, command: &[String]) -> Result<Template> {
        if command.is_empty() {
            return Err(WalldError::Config(format!(
                "interface `{}` has an empty hook command",
                self.name
            )));
        }
        let template = parse_template(command);
        self.check_references(&template)?;
        Ok(template)
    }

    fn check_references(&self, template: &[Token]) -> Result<()> {
        for token in template {
            if let Token::Variable(var) = token {
                if !self.variables.contains_key(var) {
                    return Err(WalldError::Config(format!(
                        "interface `{}` references undeclared variable `{var}`",
                        self.name
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variables(&self) -> &BTreeMap<String, Variable> {
        &self.variables
    }

    pub fn variable_mut(&mut self, name: &str) -> Option<&mut Variable> {
        self.variables.get_mut(name)
    }

    /// The template as written in the config document.
    pub fn template(&self) -> Vec<String> {
        self.args.iter().map(ToString::to_string).collect()
    }

    /// Substitute the wallpaper path and current variable values. The
    /// wallpaper set only holds UTF-8 paths, so `%f` is substituted exactly.
    pub fn resolve(&self, wallpaper: &Path) -> ResolvedCommand {
        let wallpaper = wallpaper.to_string_lossy();
        ResolvedCommand {
            interface: self.name.clone(),
            pre_hooks: self
                .pre_hooks
                .iter()
                .map(|h| render_template(h, &wallpaper, &self.variables))
                .collect(),
            argv: render_template(&self.args, &wallpaper, &self.variables),
            post_hooks: self
                .post_hooks
                .iter()
                .map(|h| render_template(h, &wallpaper, &self.variables))
                .collect(),
        }
    }
}

/// Concrete argument lists for one interface and one wallpaper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedCommand {
    pub interface: String,
    pub pre_hooks: Vec<Vec<String>>,
    pub argv: Vec<String>,
    pub post_hooks: Vec<Vec<String>>,
}
