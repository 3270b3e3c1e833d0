//! `.env` file support: `KEY=value` lines loaded into the process environment.
//!
//! Blank lines and `#` comments are skipped, an `export ` prefix is allowed,
//! values may be single- or double-quoted, and unquoted values end at `#`.
//! Variables already present in the environment are never overwritten.

use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct LoadedEnvFile {
    pub path: PathBuf,
    /// Named on the command line rather than picked up from the working directory.
    pub explicit: bool,
}

/// Handle `--env-file <path>` / `--env-file=<path>`, falling back to `./.env`.
pub fn configure_from_args(args: impl IntoIterator<Item = String>) -> Result<Option<LoadedEnvFile>, String> {
    match env_file_arg(args)? {
        Some(path) => {
            if !path.is_file() {
                return Err(format!("env file not found: {}", path.display()));
            }
            load(&path)?;
            Ok(Some(LoadedEnvFile { path, explicit: true }))
        }
        None => {
            let cwd = std::env::current_dir().map_err(|e| format!("unable to read current directory: {}", e))?;
            let path = cwd.join(".env");
            if !path.is_file() {
                return Ok(None);
            }
            load(&path)?;
            Ok(Some(LoadedEnvFile { path, explicit: false }))
        }
    }
}

fn env_file_arg(args: impl IntoIterator<Item = String>) -> Result<Option<PathBuf>, String> {
    let mut args = args.into_iter();
    let mut found: Option<PathBuf> = None;

    while let Some(arg) = args.next() {
        let value = if arg == "--env-file" {
            args.next()
                .ok_or_else(|| "`--env-file` requires a path argument".to_string())?
        } else if let Some(v) = arg.strip_prefix("--env-file=") {
            v.to_string()
        } else if arg == "--" {
            break;
        } else {
            return Err(format!("unrecognised argument: {}", arg));
        };

        if value.is_empty() {
            return Err("`--env-file` requires a path argument".to_string());
        }
        if found.replace(PathBuf::from(value)).is_some() {
            return Err("`--env-file` provided more than once".to_string());
        }
    }

    Ok(found)
}

fn load(path: &Path) -> Result<(), String> {
    let contents = std::fs::read_to_string(path).map_err(|e| format!("failed to read {}: {}", path.display(), e))?;

    for (index, line) in contents.lines().enumerate() {
        let parsed = parse_line(line).map_err(|e| format!("{}:{}: {}", path.display(), index + 1, e))?;
        if let Some((key, value)) = parsed
            && std::env::var_os(&key).is_none()
        {
            // Mutating the process environment is unsafe once other threads exist;
            // this runs at startup before any are spawned.
            unsafe {
                std::env::set_var(key, value);
            }
        }
    }
    Ok(())
}

fn parse_line(line: &str) -> Result<Option<(String, String)>, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let line = line.strip_prefix("export ").map(str::trim_start).unwrap_or(line);

    let (key, raw) = line.split_once('=').ok_or_else(|| "missing '=' in assignment".to_string())?;
    let key = key.trim();
    if key.is_empty() {
        return Err("environment variable name cannot be empty".to_string());
    }
    if key.contains(char::is_whitespace) {
        return Err(format!("environment variable name contains whitespace: {}", key));
    }

    Ok(Some((key.to_string(), parse_value(raw.trim())?)))
}

fn parse_value(raw: &str) -> Result<String, String> {
    let Some(quote) = raw.chars().next().filter(|c| *c == '"' || *c == '\'') else {
        let unquoted = raw.split('#').next().unwrap_or_default();
        return Ok(unquoted.trim_end().to_string());
    };

    let mut value = String::new();
    let mut chars = raw[1..].chars();
    while let Some(ch) = chars.next() {
        match ch {
            // escapes only inside double quotes
            '\\' if quote == '"' => match chars.next() {
                Some('n') => value.push('\n'),
                Some('t') => value.push('\t'),
                Some(other) => value.push(other),
                None => return Err("unterminated escape sequence in double-quoted value".to_string()),
            },
            c if c == quote => {
                let rest = chars.as_str().trim();
                if rest.is_empty() || rest.starts_with('#') {
                    return Ok(value);
                }
                return Err("unexpected characters after closing quote".to_string());
            }
            c => value.push(c),
        }
    }
    Err("unterminated quoted value".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(k: &str, v: &str) -> Option<(String, String)> {
        Some((k.to_string(), v.to_string()))
    }

    #[test]
    fn parses_assignments() {
        assert_eq!(parse_line("CITIES=Dresden,Basel").unwrap(), pair("CITIES", "Dresden,Basel"));
        assert_eq!(parse_line("export POLL_INTERVAL_SECS = 60").unwrap(), pair("POLL_INTERVAL_SECS", "60"));
        assert_eq!(parse_line("DATABASE_PATH=parking.db # local").unwrap(), pair("DATABASE_PATH", "parking.db"));
        assert_eq!(parse_line("EMPTY=").unwrap(), pair("EMPTY", ""));
    }

    #[test]
    fn skips_blank_lines_and_comments() {
        assert_eq!(parse_line("").unwrap(), None);
        assert_eq!(parse_line("   # FEED_FAKE=1").unwrap(), None);
    }

    #[test]
    fn handles_quoting() {
        assert_eq!(parse_line(r#"A="x # not a comment""#).unwrap(), pair("A", "x # not a comment"));
        assert_eq!(parse_line(r#"B="line\nbreak \"q\"""#).unwrap(), pair("B", "line\nbreak \"q\""));
        assert_eq!(parse_line(r"C='raw\n' # trailing").unwrap(), pair("C", r"raw\n"));
        assert!(parse_line(r#"D="open"#).is_err());
        assert!(parse_line(r#"E="x" y"#).is_err());
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(parse_line("NO_EQUALS").is_err());
        assert!(parse_line("=value").is_err());
        assert!(parse_line("BAD KEY=value").is_err());
    }

    #[test]
    fn reads_env_file_argument() {
        let args = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        assert_eq!(env_file_arg(args(&[])).unwrap(), None);
        assert_eq!(env_file_arg(args(&["--env-file", "a.env"])).unwrap(), Some(PathBuf::from("a.env")));
        assert_eq!(env_file_arg(args(&["--env-file=b.env"])).unwrap(), Some(PathBuf::from("b.env")));
        assert_eq!(env_file_arg(args(&["--", "--whatever"])).unwrap(), None);
        assert!(env_file_arg(args(&["--env-file"])).is_err());
        assert!(env_file_arg(args(&["--env-file="])).is_err());
        assert!(env_file_arg(args(&["--env-file=a", "--env-file=b"])).is_err());
        assert!(env_file_arg(args(&["--verbose"])).is_err());
    }
}
