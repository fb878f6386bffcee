//! Standard extensions available to every manifest.
//!
//! - `escapeStringRegex(str)`: quote regex metacharacters in `str`
//! - `regexMatch(regex, str)`: whether `regex` matches anywhere in `str`
//! - `regexSubst(regex, src, repl)`: replace every match, `$1` style groups allowed
//! - `semverParse(v)`: `{major, minor, patch, prerelease, metadata}` of a version
//! - `semverMatchesConstraint(v, constraint)`: whether `v` satisfies `constraint`
//!
//! Versions may carry a leading `v` and omit the minor or patch number
//! (`v1.2` is `1.2.0`). Constraints use the comma-separated comparator
//! syntax of the `semver` crate (`>=1.2, <2`).

use std::rc::Rc;

use regex::Regex;
use semver::{Version, VersionReq};
use serde_json::{json, Value};

use super::{EvalError, Extension};

/// All standard extensions, keyed by the name they are registered under.
pub fn standard() -> Vec<(&'static str, Extension)> {
    vec![
        ("escapeStringRegex", Rc::new(escape_string_regex) as Extension),
        ("regexMatch", Rc::new(regex_match) as Extension),
        ("regexSubst", Rc::new(regex_subst) as Extension),
        ("semverParse", Rc::new(semver_parse) as Extension),
        (
            "semverMatchesConstraint",
            Rc::new(semver_matches_constraint) as Extension,
        ),
    ]
}

fn escape_string_regex(args: &[Value]) -> Result<Value, EvalError> {
    let [input] = args else {
        return Err(arity("escapeStringRegex", 1, args.len()));
    };
    let input = string_arg("escapeStringRegex", input)?;
    Ok(Value::String(regex::escape(input)))
}

fn regex_match(args: &[Value]) -> Result<Value, EvalError> {
    let [pattern, input] = args else {
        return Err(arity("regexMatch", 2, args.len()));
    };
    let regex = compile("regexMatch", string_arg("regexMatch", pattern)?)?;
    Ok(Value::Bool(regex.is_match(string_arg("regexMatch", input)?)))
}

fn regex_subst(args: &[Value]) -> Result<Value, EvalError> {
    let [pattern, src, repl] = args else {
        return Err(arity("regexSubst", 3, args.len()));
    };
    let regex = compile("regexSubst", string_arg("regexSubst", pattern)?)?;
    let src = string_arg("regexSubst", src)?;
    let repl = string_arg("regexSubst", repl)?;
    Ok(Value::String(regex.replace_all(src, repl).into_owned()))
}

fn semver_parse(args: &[Value]) -> Result<Value, EvalError> {
    let [version] = args else {
        return Err(arity("semverParse", 1, args.len()));
    };
    let version = parse_version("semverParse", string_arg("semverParse", version)?)?;
    Ok(json!({
        "major": version.major,
        "minor": version.minor,
        "patch": version.patch,
        "prerelease": version.pre.as_str(),
        "metadata": version.build.as_str(),
    }))
}

fn semver_matches_constraint(args: &[Value]) -> Result<Value, EvalError> {
    let [version, constraint] = args else {
        return Err(arity("semverMatchesConstraint", 2, args.len()));
    };
    let name = "semverMatchesConstraint";
    let version = parse_version(name, string_arg(name, version)?)?;
    let constraint = VersionReq::parse(string_arg(name, constraint)?)
        .map_err(|e| EvalError::extension(name, format!("failed to parse constraint: {e}")))?;
    Ok(Value::Bool(constraint.matches(&version)))
}

// ============================================================================
// PRIVATE HELPERS
// ============================================================================

fn compile(name: &str, pattern: &str) -> Result<Regex, EvalError> {
    Regex::new(pattern).map_err(|e| EvalError::extension(name, e.to_string()))
}

fn parse_version(name: &str, text: &str) -> Result<Version, EvalError> {
    let text = text.trim();
    let text = text.strip_prefix(['v', 'V']).unwrap_or(text);
    let core_end = text.find(['-', '+']).unwrap_or(text.len());
    let (core, suffix) = text.split_at(core_end);
    let missing = 2usize.saturating_sub(core.matches('.').count());
    let padded = format!("{core}{}{suffix}", ".0".repeat(missing));
    Version::parse(&padded)
        .map_err(|e| EvalError::extension(name, format!("failed to parse semver: {e}")))
}

fn string_arg<'a>(name: &str, value: &'a Value) -> Result<&'a str, EvalError> {
    value
        .as_str()
        .ok_or_else(|| EvalError::extension(name, format!("expected a string, got {value}")))
}

fn arity(name: &str, expected: usize, got: usize) -> EvalError {
    EvalError::extension(name, format!("expected {expected} arguments, got {got}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(name: &str, args: &[Value]) -> Result<Value, EvalError> {
        let (_, ext) = standard()
            .into_iter()
            .find(|(n, _)| *n == name)
            .expect("extension is registered");
        ext(args)
    }

    #[test]
    fn escape_quotes_metacharacters() {
        assert_eq!(
            call("escapeStringRegex", &[json!("a.b*c")]).unwrap(),
            json!("a\\.b\\*c")
        );
    }

    #[test]
    fn match_and_substitute() {
        assert_eq!(
            call("regexMatch", &[json!("^fo+$"), json!("fooo")]).unwrap(),
            json!(true)
        );
        assert_eq!(
            call("regexSubst", &[json!("(\\w+)@x"), json!("a@x b@x"), json!("$1!")]).unwrap(),
            json!("a! b!")
        );
    }

    #[test]
    fn wrong_arguments_are_extension_errors() {
        assert!(matches!(
            call("regexMatch", &[json!("a")]),
            Err(EvalError::Extension { .. })
        ));
        assert!(matches!(
            call("escapeStringRegex", &[json!(1)]),
            Err(EvalError::Extension { .. })
        ));
        assert!(call("regexMatch", &[json!("("), json!("x")]).is_err());
    }

    #[test]
    fn semver_parse_splits_the_version() {
        assert_eq!(
            call("semverParse", &[json!("1.2.3-rc.1+build.5")]).unwrap(),
            json!({
                "major": 1,
                "minor": 2,
                "patch": 3,
                "prerelease": "rc.1",
                "metadata": "build.5",
            })
        );
        assert_eq!(
            call("semverParse", &[json!("v2.4")]).unwrap(),
            json!({"major": 2, "minor": 4, "patch": 0, "prerelease": "", "metadata": ""})
        );
        assert!(call("semverParse", &[json!("not-a-version")]).is_err());
    }

    #[test]
    fn semver_constraints() {
        let matches = |v: &str, c: &str| call("semverMatchesConstraint", &[json!(v), json!(c)]);
        assert_eq!(matches("1.4.0", ">=1.2, <2").unwrap(), json!(true));
        assert_eq!(matches("2.0.0", ">=1.2, <2").unwrap(), json!(false));
        assert_eq!(matches("v1.3", "~1.3").unwrap(), json!(true));
        assert!(matches("1.0.0", "not a constraint").is_err());
    }
}
