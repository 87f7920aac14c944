use std::{env, iter::Peekable, path::PathBuf, str::Chars};

use crate::error::{PathError, PathResult};

/// Locates user directories and turns user-supplied path strings into absolute paths.
pub trait PathResolver {
    /// Expands `$VAR`, `${VAR}` and a leading `~`, then anchors relative results at the
    /// current working directory.
    ///
    /// # Errors
    ///
    /// * [`PathError::Empty`] if the path is blank
    /// * [`PathError::CurrentDir`] if the working directory cannot be determined
    /// * [`PathError::MissingEnvVar`] if a referenced variable is not set
    /// * [`PathError::UnclosedVariable`] if a `${` is never closed
    ///
    /// # Example
    ///
    /// ```
    /// use cfm_utils::path::{PathResolver, SystemPathResolver};
    ///
    /// let cache = SystemPathResolver.resolve_path("$HOME/.cache/cfm").unwrap();
    /// assert!(cache.is_absolute());
    /// ```
    fn resolve_path(&self, path: &str) -> PathResult<PathBuf>;

    /// `$HOME`, or `/home/$USER` when it is unset.
    fn home_dir(&self) -> PathBuf;

    /// `$XDG_CONFIG_HOME`, defaulting to `~/.config`.
    fn xdg_config_home(&self) -> PathBuf;

    /// `$XDG_CACHE_HOME`, defaulting to `~/.cache`.
    fn xdg_cache_home(&self) -> PathBuf;
}

/// [`PathResolver`] backed by the process environment.
pub struct SystemPathResolver;

impl PathResolver for SystemPathResolver {
    fn resolve_path(&self, path: &str) -> PathResult<PathBuf> {
        let path = path.trim();
        if path.is_empty() {
            return Err(PathError::Empty);
        }

        let expanded = PathBuf::from(self.expand(path)?);
        if expanded.is_absolute() {
            return Ok(expanded);
        }

        env::current_dir()
            .map(|cwd| cwd.join(expanded))
            .map_err(|source| PathError::CurrentDir { source })
    }

    fn home_dir(&self) -> PathBuf {
        env::var("HOME").map(PathBuf::from).unwrap_or_else(|_| {
            let user = env::var("USER").unwrap_or_else(|_| "root".into());
            PathBuf::from("/home").join(user)
        })
    }

    fn xdg_config_home(&self) -> PathBuf {
        env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| self.home_dir().join(".config"))
    }

    fn xdg_cache_home(&self) -> PathBuf {
        env::var("XDG_CACHE_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| self.home_dir().join(".cache"))
    }
}

impl SystemPathResolver {
    fn expand(&self, path: &str) -> PathResult<String> {
        let mut out = String::with_capacity(path.len());
        let mut chars = path.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '~' if out.is_empty() => out.push_str(&self.home_dir().to_string_lossy()),
                '$' if chars.peek() == Some(&'{') => {
                    chars.next();
                    let name = braced_name(&mut chars)?;
                    out.push_str(&self.lookup(&name, path)?);
                }
                '$' => {
                    let name = bare_name(&mut chars);
                    if name.is_empty() {
                        out.push('$');
                    } else {
                        out.push_str(&self.lookup(&name, path)?);
                    }
                }
                _ => out.push(c),
            }
        }

        Ok(out)
    }

    fn lookup(&self, name: &str, input: &str) -> PathResult<String> {
        let dir = match name {
            "HOME" => self.home_dir(),
            "XDG_CONFIG_HOME" => self.xdg_config_home(),
            "XDG_CACHE_HOME" => self.xdg_cache_home(),
            _ => {
                return env::var(name).map_err(|_| PathError::MissingEnvVar {
                    var: name.into(),
                    input: input.into(),
                })
            }
        };
        Ok(dir.to_string_lossy().into_owned())
    }
}

fn braced_name(chars: &mut Peekable<Chars>) -> PathResult<String> {
    let mut name = String::new();
    for c in chars.by_ref() {
        if c == '}' {
            return Ok(name);
        }
        name.push(c);
    }
    Err(PathError::UnclosedVariable {
        input: format!("${{{name}"),
    })
}

fn bare_name(chars: &mut Peekable<Chars>) -> String {
    let mut name = String::new();
    while let Some(c) = chars.next_if(|c| c.is_alphanumeric() || *c == '_') {
        name.push(c);
    }
    name
}

/// Shorthand for [`SystemPathResolver::resolve_path`].
pub fn resolve_path(path: &str) -> PathResult<PathBuf> {
    SystemPathResolver.resolve_path(path)
}

pub fn home_dir() -> PathBuf {
    SystemPathResolver.home_dir()
}

pub fn xdg_config_home() -> PathBuf {
    SystemPathResolver.xdg_config_home()
}

pub fn xdg_cache_home() -> PathBuf {
    SystemPathResolver.xdg_cache_home()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn set_vars(vars: &[(&str, &str)]) {
        for (key, value) in vars {
            env::set_var(key, value);
        }
    }

    fn clear_vars(keys: &[&str]) {
        for key in keys {
            env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_expand_plain_and_braced() {
        set_vars(&[("CFM_TEST_VAR", "mirror")]);
        let resolver = SystemPathResolver;
        assert_eq!(resolver.expand("$CFM_TEST_VAR/a").unwrap(), "mirror/a");
        assert_eq!(resolver.expand("${CFM_TEST_VAR}/a").unwrap(), "mirror/a");
        assert_eq!(resolver.expand("a/$").unwrap(), "a/$");
        assert_eq!(resolver.expand("a/$!b").unwrap(), "a/$!b");
        clear_vars(&["CFM_TEST_VAR"]);
    }

    #[test]
    #[serial]
    fn test_expand_errors() {
        let resolver = SystemPathResolver;
        assert!(matches!(
            resolver.expand("${UNCLOSED"),
            Err(PathError::UnclosedVariable { .. })
        ));
        assert!(matches!(
            resolver.expand("$CFM_SURELY_NOT_SET"),
            Err(PathError::MissingEnvVar { .. })
        ));
    }

    #[test]
    #[serial]
    fn test_xdg_defaults_and_overrides() {
        set_vars(&[("HOME", "/tmp/home")]);
        clear_vars(&["XDG_CONFIG_HOME", "XDG_CACHE_HOME"]);

        assert_eq!(xdg_config_home(), PathBuf::from("/tmp/home/.config"));
        assert_eq!(xdg_cache_home(), PathBuf::from("/tmp/home/.cache"));

        set_vars(&[("XDG_CONFIG_HOME", "/tmp/cfg"), ("XDG_CACHE_HOME", "/tmp/c")]);
        assert_eq!(xdg_config_home(), PathBuf::from("/tmp/cfg"));
        assert_eq!(
            resolve_path("$XDG_CACHE_HOME/cfm").unwrap(),
            PathBuf::from("/tmp/c/cfm")
        );

        clear_vars(&["XDG_CONFIG_HOME", "XDG_CACHE_HOME", "HOME"]);
    }

    #[test]
    #[serial]
    fn test_resolve_path() {
        set_vars(&[("HOME", "/tmp/home")]);

        assert!(matches!(resolve_path("  "), Err(PathError::Empty)));
        assert_eq!(resolve_path("/abs").unwrap(), PathBuf::from("/abs"));
        assert_eq!(resolve_path("~/x").unwrap(), PathBuf::from("/tmp/home/x"));
        assert_eq!(
            resolve_path("rel/~/x").unwrap(),
            env::current_dir().unwrap().join("rel/~/x")
        );

        clear_vars(&["HOME"]);
    }

    #[test]
    #[serial]
    fn test_home_dir_falls_back_to_user() {
        clear_vars(&["HOME"]);
        set_vars(&[("USER", "forge")]);
        assert_eq!(home_dir(), PathBuf::from("/home/forge"));
    }
}
