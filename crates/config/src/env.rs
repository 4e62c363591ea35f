//! `$NAME` / `$NAME<suffix>` environment-variable interpolation for TOML config values.
//!
//! Unlike the Jinja-style `{{ env.NAME }}` templating this crate's loader
//! pattern was originally built around, the wire syntax here is a literal
//! leading `$` on an identifier run, optionally followed by trailing
//! non-identifier text that is preserved verbatim. A referenced variable
//! that isn't set is a fatal error, never a silent empty substitution.

use std::env::VarError;

/// Expand `$NAME` / `$NAME<suffix>` references in `input`, reading values
/// through `lookup`. `lookup` takes the variable name and returns its value,
/// matching `std::env::var`'s `Result<String, VarError>` signature so the
/// default entry point can just pass `std::env::var`.
pub fn expand(input: &str, mut lookup: impl FnMut(&str) -> Result<String, VarError>) -> Result<String, String> {
    let bytes = input.as_bytes();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'$' {
            out.push(bytes[i] as char);
            i += 1;
            continue;
        }

        let start = i + 1;
        let mut end = start;
        while end < bytes.len() && is_ident_byte(bytes[end]) {
            end += 1;
        }

        if end == start {
            // Lone '$' with no identifier following it: pass through unchanged.
            out.push('$');
            i += 1;
            continue;
        }

        let name = &input[start..end];
        match lookup(name) {
            Ok(value) => out.push_str(&value),
            Err(VarError::NotPresent) => return Err(format!("environment variable `{name}` is not set")),
            Err(VarError::NotUnicode(_)) => {
                return Err(format!("environment variable `{name}` is not valid UTF-8"));
            }
        }

        i = end;
    }

    Ok(out)
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(map: &[(&str, &str)]) -> impl Fn(&str) -> Result<String, VarError> + '_ {
        move |name| {
            map.iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.to_string())
                .ok_or(VarError::NotPresent)
        }
    }

    #[test]
    fn plain_string_is_unchanged() {
        assert_eq!(expand("hello", lookup(&[])).unwrap(), "hello");
    }

    #[test]
    fn whole_value_substitution() {
        assert_eq!(expand("$OPENAI_KEY", lookup(&[("OPENAI_KEY", "sk-abc")])).unwrap(), "sk-abc");
    }

    #[test]
    fn suffix_is_preserved() {
        assert_eq!(
            expand("$HOST<:8080>", lookup(&[("HOST", "localhost")])).unwrap(),
            "localhost<:8080>"
        );
    }

    #[test]
    fn unset_variable_is_fatal() {
        let err = expand("$MISSING", lookup(&[])).unwrap_err();
        assert!(err.contains("MISSING"));
    }

    #[test]
    fn lone_dollar_passes_through() {
        assert_eq!(expand("a $ b", lookup(&[])).unwrap(), "a $ b");
    }
}
