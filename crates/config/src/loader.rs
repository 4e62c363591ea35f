use std::{fmt::Write as _, path::Path};

use serde::Deserialize;
use toml::Value;

use crate::{Config, Error, env};

pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let path = path.as_ref().to_path_buf();
    let content = std::fs::read_to_string(&path).map_err(Error::ConfigOpen)?;
    let mut raw_config: Value = toml::from_str(&content).map_err(Error::ConfigParse)?;

    expand_env_vars(&mut Vec::new(), &mut raw_config)?;

    let config = Config::deserialize(raw_config)?;

    Ok(config)
}

fn expand_env_vars<'a>(path: &mut Vec<Result<&'a str, usize>>, value: &'a mut Value) -> Result<(), Error> {
    match value {
        Value::String(s) => match env::expand(s, std::env::var) {
            Ok(expanded) => *s = expanded,
            Err(reason) => return Err(Error::EnvVarSubstitution { path: render_path(path), reason }),
        },
        Value::Array(values) => {
            for (i, value) in values.iter_mut().enumerate() {
                path.push(Err(i));
                expand_env_vars(path, value)?;
                path.pop();
            }
        }
        Value::Table(map) => {
            for (key, value) in map {
                path.push(Ok(key.as_str()));
                expand_env_vars(path, value)?;
                path.pop();
            }
        }
        Value::Integer(_) | Value::Float(_) | Value::Boolean(_) | Value::Datetime(_) => (),
    }

    Ok(())
}

fn render_path(path: &[Result<&str, usize>]) -> String {
    let mut rendered = String::new();

    for segment in path {
        match segment {
            Ok(s) => {
                rendered.push_str(s);
                rendered.push('.');
            }
            Err(i) => write!(rendered, "[{i}]").unwrap(),
        }
    }

    if rendered.ends_with('.') {
        rendered.pop();
    }

    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn expands_env_var_in_place() {
        // SAFETY: test-only, single-threaded env mutation scoped to this test.
        unsafe { std::env::set_var("GATEWAY_TEST_HOST", "example.internal") };

        let mut value: Value = toml::from_str("[server]\nhost = \"$GATEWAY_TEST_HOST\"\n").unwrap();
        expand_env_vars(&mut Vec::new(), &mut value).unwrap();

        assert_eq!(value["server"]["host"].as_str(), Some("example.internal"));

        unsafe { std::env::remove_var("GATEWAY_TEST_HOST") };
    }

    #[test]
    fn unset_env_var_is_a_config_error() {
        let mut value: Value = toml::from_str("key = \"$GATEWAY_TEST_DEFINITELY_UNSET\"\n").unwrap();
        let err = expand_env_vars(&mut Vec::new(), &mut value).unwrap_err();
        assert!(matches!(err, Error::EnvVarSubstitution { .. }));
    }

    #[test]
    fn load_reads_and_expands_file() {
        unsafe { std::env::set_var("GATEWAY_TEST_PORT_SUFFIX", "") };

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nhost = \"0.0.0.0\"\nport = 9090\n").unwrap();

        let config = load(file.path()).unwrap();
        assert_eq!(config.server.port, 9090);

        unsafe { std::env::remove_var("GATEWAY_TEST_PORT_SUFFIX") };
    }
}
