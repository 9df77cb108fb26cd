use serde::Deserialize;
use snafu::prelude::*;
use std::{
    fs, io,
    path::{Path, PathBuf},
    process::Command,
    string::FromUtf8Error,
};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Could not read config file `{}': {}", filename.to_string_lossy(), source))]
    ReadConfigFile {
        filename: PathBuf,
        source: io::Error,
    },

    #[snafu(display("Could not parse config file `{}': {}", filename.to_string_lossy(), source))]
    ParseConfigFile {
        filename: PathBuf,
        source: toml::de::Error,
    },

    #[snafu(display("Must specify at least 1 for `timeout'"))]
    TimeoutIsZero {},

    #[snafu(display("Could not execute password command `{}': {}", command, source))]
    ExecutePasswordCommand { command: String, source: io::Error },

    #[snafu(display(
        "Could not decode password command `{}' output as utf-8: {}",
        command,
        source
    ))]
    DecodePasswordCommand {
        command: String,
        source: FromUtf8Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Deserialize)]
pub struct Config {
    /// Username for HTTP Basic authentication.
    pub username: String,

    /// Shell command which will print a password to stdout.
    pub password_command: String,

    /// Session URL to connect to, e.g. `https://jmap.example.com/.well-known/jmap`.
    pub session_url: String,

    /// Timeout, in seconds, for each HTTP request.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

fn default_timeout() -> u64 {
    5
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).context(ReadConfigFileSnafu {
            filename: path.as_ref(),
        })?;
        Self::parse(&contents, path.as_ref())
    }

    fn parse(contents: &str, filename: &Path) -> Result<Self> {
        let config: Self =
            toml::from_str(contents).context(ParseConfigFileSnafu { filename })?;

        // Perform final validation.
        ensure!(config.timeout > 0, TimeoutIsZeroSnafu {});
        Ok(config)
    }

    pub fn password(&self) -> Result<String> {
        let output = Command::new("sh")
            .arg("-c")
            .arg(self.password_command.as_str())
            .output()
            .context(ExecutePasswordCommandSnafu {
                command: &self.password_command,
            })?;
        let stdout = String::from_utf8(output.stdout).context(DecodePasswordCommandSnafu {
            command: &self.password_command,
        })?;
        Ok(stdout.trim_end_matches(&['\r', '\n'][..]).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILENAME: &str = "jmapc.toml";

    #[test]
    fn timeout_defaults_to_five_seconds() {
        let config = Config::parse(
            r#"
            username = "ness@onett.example"
            password_command = "pass show jmap"
            session_url = "https://jmap.example.com/.well-known/jmap"
            "#,
            Path::new(FILENAME),
        )
        .unwrap();
        assert_eq!(config.timeout, 5);
        assert_eq!(config.username, "ness@onett.example");
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let result = Config::parse(
            r#"
            username = "ness"
            password_command = "true"
            session_url = "https://jmap.example.com/"
            timeout = 0
            "#,
            Path::new(FILENAME),
        );
        assert!(matches!(result, Err(Error::TimeoutIsZero {})));
    }

    #[test]
    fn missing_session_url_is_a_parse_error() {
        let result = Config::parse(
            r#"
            username = "ness"
            password_command = "true"
            "#,
            Path::new(FILENAME),
        );
        assert!(matches!(result, Err(Error::ParseConfigFile { .. })));
    }
}
