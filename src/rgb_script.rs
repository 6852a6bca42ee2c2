//! One loaded pattern script and its evaluation gate.
//!
//! A script is a Rhai source file whose top-level expression produces an
//! object map with the contract surface:
//!
//! - `apiVersion` — integer > 0
//! - `rgbMap: |width, height, rgb, step|` — returns an array of `height`
//!   rows, each an array of `width` packed-RGB integers
//! - `rgbMapStepCount: |width, height|` — returns the number of steps the
//!   pattern cycles through at that grid size
//! - `name`, `author` — optional metadata strings
//!
//! The first contract call on an instance runs the evaluation gate:
//! compile, evaluate, shape-check, version-check, in that fixed order. The
//! first violated condition becomes the instance's [`ScriptFault`] and the
//! instance is permanently inert; nothing a script does can raise across
//! the contract boundary. Each instance owns its engine and AST, so scripts
//! cannot observe each other through shared globals.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::warn;
use rhai::{Dynamic, Engine, FnPtr, Map, AST};

use crate::rgb_map::{GridSize, RgbMap};
use crate::script_fault::ScriptFault;

/// Outcome of the evaluation gate. Transitions are one-way: an `Invalid`
/// instance never retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalState {
    Unevaluated,
    Valid,
    Invalid,
}

/// Runtime state resolved once by the gate and reused on every call.
struct ScriptRuntime {
    engine: Engine,
    ast: AST,
    rgb_map: FnPtr,
    rgb_map_step_count: FnPtr,
}

/// A pattern script: raw source plus lazily-evaluated runtime state.
pub struct RgbScript {
    file_name: String,
    contents: String,
    state: EvalState,
    fault: Option<ScriptFault>,
    api_version: i64,
    name: String,
    author: String,
    runtime: Option<ScriptRuntime>,
}

impl Default for RgbScript {
    fn default() -> Self {
        Self::new()
    }
}

impl RgbScript {
    /// An unbound instance: no file, no contents, permanently inert until
    /// rebound. The normal result of a catalog lookup miss.
    pub fn new() -> Self {
        Self {
            file_name: String::new(),
            contents: String::new(),
            state: EvalState::Unevaluated,
            fault: None,
            api_version: 0,
            name: String::new(),
            author: String::new(),
            runtime: None,
        }
    }

    /// An instance bound to in-memory source (tests, `check` on stdin).
    pub fn from_source(contents: impl Into<String>) -> Self {
        Self { contents: contents.into(), ..Self::new() }
    }

    /// Read a script file. The logical file name is derived from the path;
    /// evaluation stays lazy.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading script '{}'", path.display()))?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self { file_name, contents, ..Self::new() })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn contents(&self) -> &str {
        &self.contents
    }

    pub fn state(&self) -> EvalState {
        self.state
    }

    /// Why the instance is `Invalid`, if it is.
    pub fn fault(&self) -> Option<&ScriptFault> {
        self.fault.as_ref()
    }

    /// Run the evaluation gate if it has not run yet. Returns whether the
    /// instance is usable. Idempotent: the outcome is cached.
    pub fn evaluate(&mut self) -> bool {
        if self.state == EvalState::Unevaluated {
            match self.evaluate_contract() {
                Ok(()) => self.state = EvalState::Valid,
                Err(fault) => {
                    warn!("rejecting script {:?}: {}", self.file_name, fault.message);
                    // No partial state survives a failed gate.
                    self.runtime = None;
                    self.api_version = 0;
                    self.name.clear();
                    self.author.clear();
                    self.fault = Some(fault);
                    self.state = EvalState::Invalid;
                }
            }
        }
        self.state == EvalState::Valid
    }

    /// Compile, evaluate, shape-check, version-check — in that order, so the
    /// first violated condition determines the reported fault.
    fn evaluate_contract(&mut self) -> std::result::Result<(), ScriptFault> {
        let engine = sandboxed_engine();

        let ast = engine
            .compile(&self.contents)
            .map_err(|err| ScriptFault::from_parse_error(&err))?;

        let value = engine
            .eval_ast::<Dynamic>(&ast)
            .map_err(|err| ScriptFault::from_eval_error(&err))?;

        let Some(object) = value.try_cast::<Map>() else {
            return Err(ScriptFault::missing_entry_point(
                "top-level expression did not produce an object",
            ));
        };

        let rgb_map = callable(&object, "rgbMap")?;
        let rgb_map_step_count = callable(&object, "rgbMapStepCount")?;

        let api_version = match object.get("apiVersion") {
            None => {
                return Err(ScriptFault::invalid_api_version("missing apiVersion property"))
            }
            Some(value) => match as_number(value) {
                Some(version) if version > 0 => version,
                Some(version) => {
                    return Err(ScriptFault::invalid_api_version(format!(
                        "apiVersion must be positive, got {version}"
                    )))
                }
                None => {
                    return Err(ScriptFault::invalid_api_version("apiVersion is not numeric"))
                }
            },
        };

        self.name = string_property(&object, "name");
        self.author = string_property(&object, "author");
        self.api_version = api_version;
        self.runtime = Some(ScriptRuntime { engine, ast, rgb_map, rgb_map_step_count });
        Ok(())
    }

    /// The grid for one step: every cell is either the given color or 0.
    /// Returns the empty grid unless the instance is `Valid` and the script
    /// produced an array of rows.
    pub fn rgb_map(&mut self, size: GridSize, raw_color: u32, step: i64) -> RgbMap {
        if !self.evaluate() {
            return RgbMap::empty();
        }
        let Some(rt) = self.runtime.as_ref() else {
            return RgbMap::empty();
        };
        let args = (size.width as i64, size.height as i64, raw_color as i64, step);
        match rt.rgb_map.call::<Dynamic>(&rt.engine, &rt.ast, args) {
            Ok(value) => grid_from_value(size, value),
            Err(err) => {
                warn!("rgbMap call failed in {:?}: {err}", self.file_name);
                RgbMap::empty()
            }
        }
    }

    /// How many steps the pattern cycles through at this grid size, or `-1`
    /// when the instance is not usable (distinct from a legitimate `0`).
    pub fn rgb_map_step_count(&mut self, size: GridSize) -> i64 {
        if !self.evaluate() {
            return -1;
        }
        let Some(rt) = self.runtime.as_ref() else {
            return -1;
        };
        let args = (size.width as i64, size.height as i64);
        match rt.rgb_map_step_count.call::<Dynamic>(&rt.engine, &rt.ast, args) {
            Ok(value) => as_number(&value).unwrap_or(-1),
            Err(err) => {
                warn!("rgbMapStepCount call failed in {:?}: {err}", self.file_name);
                -1
            }
        }
    }

    /// Metadata name, or `""` when absent or not `Valid`.
    pub fn name(&mut self) -> &str {
        self.evaluate();
        &self.name
    }

    /// Metadata author, or `""` when absent or not `Valid`.
    pub fn author(&mut self) -> &str {
        self.evaluate();
        &self.author
    }

    /// Contract version, or `0` when not yet evaluated or `Invalid`.
    pub fn api_version(&mut self) -> i64 {
        self.evaluate();
        self.api_version
    }
}

/// Fresh engine per instance, with execution bounded so a pathological
/// script cannot stall the render loop.
fn sandboxed_engine() -> Engine {
    let mut engine = Engine::new();
    engine.set_max_expr_depths(64, 64);
    engine.set_max_call_levels(64);
    engine.set_max_operations(100_000);
    engine.set_max_string_size(10_000);
    engine.set_max_array_size(1_000);
    engine.set_max_map_size(500);
    engine
}

fn callable(object: &Map, name: &str) -> std::result::Result<FnPtr, ScriptFault> {
    object
        .get(name)
        .cloned()
        .and_then(|value| value.try_cast::<FnPtr>())
        .ok_or_else(|| ScriptFault::missing_entry_point(format!("{name} is missing or not callable")))
}

fn as_number(value: &Dynamic) -> Option<i64> {
    if let Ok(int) = value.as_int() {
        Some(int)
    } else if let Ok(float) = value.as_float() {
        Some(float as i64)
    } else {
        None
    }
}

fn string_property(object: &Map, name: &str) -> String {
    object
        .get(name)
        .and_then(|value| value.clone().into_string().ok())
        .unwrap_or_default()
}

/// Adapt the script's array-of-rows return value into a grid of exactly the
/// requested dimensions: missing cells stay 0, excess cells are ignored.
fn grid_from_value(size: GridSize, value: Dynamic) -> RgbMap {
    let Some(rows) = value.try_cast::<rhai::Array>() else {
        warn!("rgbMap did not return an array of rows");
        return RgbMap::empty();
    };
    let mut map = RgbMap::new(size);
    for (y, row) in rows.into_iter().take(size.height as usize).enumerate() {
        let Some(cells) = row.try_cast::<rhai::Array>() else {
            continue;
        };
        for (x, cell) in cells.into_iter().take(size.width as usize).enumerate() {
            if let Ok(rgb) = cell.as_int() {
                map.set(x as u32, y as u32, rgb as u32);
            }
        }
    }
    map
}
