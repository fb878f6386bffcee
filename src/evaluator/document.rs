//! # Document Evaluator
//!
//! Reference [`Evaluator`] for a minimal declarative document dialect. A
//! document is YAML (and therefore also JSON). Objects carrying one of the
//! keys below are directives and evaluate to something other than themselves:
//!
//! ```yaml
//! base: { $import: lib/base.yaml }          # evaluated value of another document
//! text: { $importstr: banner.txt }          # raw text of a file
//! name: { $native: regexSubst, args: ["-", "a-b", "_"] }
//! port: { $trace: "resolving port", value: 8080 }
//! all:  { $cases: cases.manitest.yaml, omit: [actual], started: s, completed: c }
//! ```
//!
//! `$cases` rebuilds a test manifest case by case in name order, skipping the
//! `omit`ted fields without evaluating them and optionally calling the
//! `started` / `completed` extensions around each case.
//!
//! Imports resolve relative to the importing file first, then against each
//! library path in order.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::{json, Map, Value};
use tracing::warn;

use crate::walker::walk;
use super::{
    natives, normalize_path, EvalError, Evaluator, Extension, ImportGraph, ManifestProgram,
    SyntaxNode,
};

const IMPORT: &str = "$import";
const IMPORT_STR: &str = "$importstr";
const NATIVE: &str = "$native";
const TRACE: &str = "$trace";
const CASES: &str = "$cases";

/// Evaluator for YAML/JSON documents with `$`-directives.
pub struct DocumentEvaluator {
    library_paths: Vec<PathBuf>,
    extensions: HashMap<String, Extension>,
    trace: Box<dyn Write>,
    /// Files currently being evaluated, innermost last.
    import_stack: Vec<PathBuf>,
}

impl DocumentEvaluator {
    pub fn new(library_paths: Vec<PathBuf>) -> Self {
        let mut evaluator = Self {
            library_paths,
            extensions: HashMap::new(),
            trace: Box::new(std::io::stderr()),
            import_stack: Vec::new(),
        };
        for (name, extension) in natives::standard() {
            evaluator.register_extension(name, extension);
        }
        evaluator
    }

    // =====================
    // Parsing
    // =====================

    fn read_source(file: &Path) -> Result<String, EvalError> {
        std::fs::read_to_string(file).map_err(|e| EvalError::Read {
            file: file.display().to_string(),
            reason: e.to_string(),
        })
    }

    fn parse_source(name: &str, source: &str) -> Result<Value, EvalError> {
        if source.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_yaml::from_str::<Value>(source).map_err(|e| EvalError::Parse {
            file: name.to_string(),
            message: e.to_string(),
        })
    }

    fn parse_file(file: &Path) -> Result<Value, EvalError> {
        let source = Self::read_source(file)?;
        Self::parse_source(&file.display().to_string(), &source)
    }

    fn directive_of(map: &Map<String, Value>) -> Option<&'static str> {
        [IMPORT, IMPORT_STR, NATIVE, TRACE, CASES]
            .into_iter()
            .find(|directive| map.contains_key(*directive))
    }

    fn to_syntax(node: &Value) -> SyntaxNode {
        match node {
            Value::Object(map) => {
                let import = [IMPORT, IMPORT_STR, CASES]
                    .into_iter()
                    .find_map(|directive| Some((directive, map.get(directive)?.as_str()?)));
                match import {
                    Some((IMPORT_STR, target)) => SyntaxNode::text_import(target),
                    Some((_, target)) => SyntaxNode::import(target),
                    None => SyntaxNode::branch(map.values().map(Self::to_syntax).collect()),
                }
            }
            Value::Array(items) => SyntaxNode::branch(items.iter().map(Self::to_syntax).collect()),
            _ => SyntaxNode::default(),
        }
    }

    // =====================
    // Evaluation
    // =====================

    fn eval_in_file(&mut self, file: &Path, node: &Value) -> Result<Value, EvalError> {
        if self.import_stack.iter().any(|open| open == file) {
            return Err(EvalError::Import {
                importer: self
                    .import_stack
                    .last()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
                target: file.display().to_string(),
                reason: "import cycle".to_string(),
            });
        }
        self.import_stack.push(file.to_path_buf());
        let result = self.eval(file, node);
        self.import_stack.pop();
        result
    }

    fn eval(&mut self, file: &Path, node: &Value) -> Result<Value, EvalError> {
        match node {
            Value::Object(map) => match Self::directive_of(map) {
                Some(directive) => self.eval_directive(file, directive, map),
                None => {
                    let mut out = Map::new();
                    for (key, value) in map {
                        out.insert(key.clone(), self.eval(file, value)?);
                    }
                    Ok(Value::Object(out))
                }
            },
            Value::Array(items) => items
                .iter()
                .map(|item| self.eval(file, item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            scalar => Ok(scalar.clone()),
        }
    }

    fn eval_directive(
        &mut self,
        file: &Path,
        directive: &str,
        map: &Map<String, Value>,
    ) -> Result<Value, EvalError> {
        match directive {
            IMPORT => {
                let target = self.resolve_operand(file, directive, map)?;
                let document = Self::parse_file(&target)?;
                self.eval_in_file(&target, &document)
            }
            IMPORT_STR => {
                let target = self.resolve_operand(file, directive, map)?;
                Self::read_source(&target).map(Value::String)
            }
            NATIVE => self.eval_native(file, map),
            TRACE => {
                let message = match self.eval(file, &map[TRACE])? {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                if let Err(e) = writeln!(self.trace, "TRACE: {} {}", file.display(), message) {
                    warn!(file = %file.display(), error = %e, "unable to write trace output");
                }
                match map.get("value") {
                    Some(value) => self.eval(file, value),
                    None => Ok(Value::Null),
                }
            }
            CASES => self.eval_cases(file, map),
            other => Err(EvalError::Directive {
                directive: other.to_string(),
                message: "unsupported directive".to_string(),
            }),
        }
    }

    fn resolve_operand(
        &self,
        file: &Path,
        directive: &str,
        map: &Map<String, Value>,
    ) -> Result<PathBuf, EvalError> {
        let target = map
            .get(directive)
            .and_then(Value::as_str)
            .ok_or_else(|| EvalError::Directive {
                directive: directive.to_string(),
                message: "operand must be a string path".to_string(),
            })?;
        self.resolve_import(file, target)
    }

    fn eval_native(&mut self, file: &Path, map: &Map<String, Value>) -> Result<Value, EvalError> {
        let name = map
            .get(NATIVE)
            .and_then(Value::as_str)
            .ok_or_else(|| EvalError::Directive {
                directive: NATIVE.to_string(),
                message: "extension name must be a string".to_string(),
            })?;
        let args = match map.get("args") {
            None => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| self.eval(file, item))
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => {
                return Err(EvalError::Directive {
                    directive: NATIVE.to_string(),
                    message: "args must be an array".to_string(),
                })
            }
        };
        self.call_extension(name, &args)
    }

    fn call_extension(&self, name: &str, args: &[Value]) -> Result<Value, EvalError> {
        let extension = self
            .extensions
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::UnknownExtension(name.to_string()))?;
        extension(args)
    }

    fn eval_cases(&mut self, file: &Path, map: &Map<String, Value>) -> Result<Value, EvalError> {
        let manifest_path = self.resolve_operand(file, CASES, map)?;
        let omit: Vec<String> = match map.get("omit") {
            Some(Value::Array(fields)) => fields
                .iter()
                .filter_map(|f| f.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        };
        let started = map.get("started").and_then(Value::as_str).map(str::to_string);
        let completed = map.get("completed").and_then(Value::as_str).map(str::to_string);

        let raw = Self::parse_file(&manifest_path)?;
        // A manifest that is itself computed has to be evaluated as a whole.
        let raw = match &raw {
            Value::Object(m) if Self::directive_of(m).is_none() => raw,
            _ => self.eval_in_file(&manifest_path, &raw)?,
        };
        let Value::Object(cases) = raw else {
            return Err(EvalError::Runtime(format!(
                "{}: test manifest must be an object of test cases",
                manifest_path.display()
            )));
        };

        self.import_stack.push(manifest_path.clone());
        let result = self.eval_case_map(&manifest_path, cases, &omit, started, completed);
        self.import_stack.pop();
        result
    }

    fn eval_case_map(
        &mut self,
        manifest_path: &Path,
        cases: Map<String, Value>,
        omit: &[String],
        started: Option<String>,
        completed: Option<String>,
    ) -> Result<Value, EvalError> {
        let mut out = Map::new();
        // serde_json maps iterate in key order.
        for (name, case) in cases {
            if let Some(started) = &started {
                self.call_extension(started, &[Value::String(name.clone()), json!({})])?;
            }

            let value = match case {
                Value::Object(fields) if Self::directive_of(&fields).is_none() => {
                    let mut kept = Map::new();
                    for (field, value) in fields {
                        if omit.contains(&field) {
                            continue;
                        }
                        kept.insert(field, self.eval(manifest_path, &value)?);
                    }
                    Value::Object(kept)
                }
                other => match self.eval(manifest_path, &other)? {
                    Value::Object(mut fields) => {
                        fields.retain(|field, _| !omit.contains(field));
                        Value::Object(fields)
                    }
                    evaluated => evaluated,
                },
            };

            let value = match &completed {
                Some(completed) => {
                    self.call_extension(completed, &[Value::String(name.clone()), value])?
                }
                None => value,
            };
            out.insert(name, value);
        }
        Ok(Value::Object(out))
    }
}

impl Default for DocumentEvaluator {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl ImportGraph for DocumentEvaluator {
    fn syntax_tree(&mut self, file: &Path) -> Result<SyntaxNode, EvalError> {
        Ok(Self::to_syntax(&Self::parse_file(file)?))
    }

    fn resolve_import(&self, importer: &Path, target: &str) -> Result<PathBuf, EvalError> {
        let target_path = Path::new(target);
        let mut candidates = Vec::new();
        if target_path.is_absolute() {
            candidates.push(target_path.to_path_buf());
        } else {
            let base = importer.parent().unwrap_or_else(|| Path::new(""));
            candidates.push(base.join(target_path));
            candidates.extend(self.library_paths.iter().map(|dir| dir.join(target_path)));
        }

        candidates
            .into_iter()
            .find(|candidate| candidate.is_file())
            .map(|found| normalize_path(&found))
            .ok_or_else(|| EvalError::Import {
                importer: importer.display().to_string(),
                target: target.to_string(),
                reason: "file not found".to_string(),
            })
    }
}

impl Evaluator for DocumentEvaluator {
    fn evaluate_file(&mut self, file: &Path) -> Result<Value, EvalError> {
        let file = normalize_path(file);
        let document = Self::parse_file(&file)?;
        // Entry points start from an empty stack even after an unwound call.
        self.import_stack.clear();
        self.eval_in_file(&file, &document)
    }

    fn evaluate_snippet(&mut self, virtual_name: &str, source: &str) -> Result<Value, EvalError> {
        let document = Self::parse_source(virtual_name, source)?;
        self.import_stack.clear();
        // The snippet is not on disk, so it never takes part in cycle detection.
        self.eval(&normalize_path(Path::new(virtual_name)), &document)
    }

    fn find_static_imports(&mut self, root: &Path) -> Result<Vec<PathBuf>, EvalError> {
        let root = normalize_path(root);
        Ok(walk(self, &root)?
            .into_iter()
            .filter(|file| *file != root)
            .collect())
    }

    fn register_extension(&mut self, name: &str, extension: Extension) {
        self.extensions.insert(name.to_string(), extension);
    }

    fn set_trace_output(&mut self, sink: Box<dyn Write>) {
        self.trace = sink;
    }

    fn manifest_program(&self, file: &Path, program: ManifestProgram<'_>) -> String {
        let target = normalize_path(file).display().to_string();
        let directive = match program {
            ManifestProgram::RunCases { started, completed } => json!({
                CASES: target,
                "started": started,
                "completed": completed,
            }),
            ManifestProgram::FixturesOnly => json!({
                CASES: target,
                "omit": ["actual"],
            }),
        };
        directive.to_string()
    }
}
