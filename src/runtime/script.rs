/// Script execution capability
///
/// RunCode nodes execute arbitrary user code, so the capability sits behind the
/// `ScriptExecutor` trait and is chosen at startup: a sandboxed Lua interpreter
/// (mlua) or a disabled executor that refuses every script. Log output is routed
/// to a `LogSink` handed in per call rather than captured globally.
///
/// Computation nodes reuse the same sandbox in expression-only mode.

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex};

/// Globals removed from every sandboxed interpreter
const BLOCKED_GLOBALS: &[&str] = &[
    "os", "io", "debug", "package", "require", "load", "loadfile", "dofile", "collectgarbage",
];

/// Global names rejected outright in computation expressions
const BLOCKED_IDENTIFIERS: &[&str] = &[
    "os", "io", "debug", "package", "require", "load", "loadstring", "loadfile", "dofile",
    "rawget", "rawset", "rawequal", "getmetatable", "setmetatable", "_G", "_ENV", "coroutine",
    "collectgarbage",
];

/// First blocked global referenced by an expression
///
/// Only whole identifiers count: string literal contents and field names after
/// `.` or `:` are skipped, so `'download'` and `ratio.x` pass.
fn blocked_identifier(expression: &str) -> Option<&'static str> {
    let chars: Vec<char> = expression.chars().collect();
    let mut i = 0;
    let mut field_access = false;

    while i < chars.len() {
        let c = chars[i];
        if c == '"' || c == '\'' {
            i += 1;
            while i < chars.len() && chars[i] != c {
                if chars[i] == '\\' {
                    i += 1;
                }
                i += 1;
            }
            i += 1;
            field_access = false;
        } else if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            if !field_access {
                let word: String = chars[start..i].iter().collect();
                if let Some(name) = BLOCKED_IDENTIFIERS.iter().find(|name| **name == word) {
                    return Some(*name);
                }
            }
            field_access = false;
        } else if c.is_ascii_digit() {
            // Numerals, including 1.5, 0x1F and 1e10
            while i < chars.len()
                && (chars[i].is_ascii_alphanumeric() || (chars[i] == '.' && chars.get(i + 1) != Some(&'.')))
            {
                i += 1;
            }
            field_access = false;
        } else if c == '.' && chars.get(i + 1) == Some(&'.') {
            // Concatenation, not a field access
            i += 2;
            field_access = false;
        } else {
            if !c.is_whitespace() {
                field_access = c == '.' || c == ':';
            }
            i += 1;
        }
    }
    None
}

/// Nesting depth after which table conversion gives up (guards self-referencing tables)
const MAX_TABLE_DEPTH: usize = 32;

/// Severity of a captured log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Log,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Log => "log",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// One structured line emitted by a script
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogLine {
    pub level: LogLevel,
    pub message: String,
}

/// Receiver for script log output
pub trait LogSink: Send + Sync {
    fn log(&self, line: LogLine);
}

/// Log sink that keeps every line in memory
#[derive(Debug, Default)]
pub struct ConsoleBuffer {
    lines: Mutex<Vec<LogLine>>,
}

impl ConsoleBuffer {
    /// Drain all captured lines
    pub fn take(&self) -> Vec<LogLine> {
        match self.lines.lock() {
            Ok(mut lines) => std::mem::take(&mut *lines),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl LogSink for ConsoleBuffer {
    fn log(&self, line: LogLine) {
        tracing::debug!("📝 script {}: {}", line.level.as_str(), line.message);
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line);
        }
    }
}

/// Pluggable executor for RunCode scripts
///
/// Returns the script's value; log output goes to `sink`.
pub trait ScriptExecutor: Send + Sync + std::fmt::Debug {
    fn execute(&self, code: &str, sink: Arc<dyn LogSink>) -> Result<Value>;
}

/// Sandboxed Lua 5.4 interpreter, one fresh state per evaluation
#[derive(Debug, Clone, Copy)]
pub struct LuaSandbox {
    /// Heap limit in bytes; 0 disables the limit
    memory_limit: usize,
}

impl Default for LuaSandbox {
    fn default() -> Self {
        Self::new(64 * 1024 * 1024)
    }
}

impl LuaSandbox {
    pub fn new(memory_limit: usize) -> Self {
        Self { memory_limit }
    }

    /// Run a script chunk and return the value it evaluates to
    pub fn run(&self, code: &str, sink: Arc<dyn LogSink>) -> Result<Value> {
        let lua = self.new_state()?;
        install_console(&lua, sink)?;

        let result: mlua::Value = lua.load(code).eval().map_err(|e| anyhow::anyhow!(clean_error(&e)))?;
        lua_to_json(result, 0)
    }

    /// Evaluate a single expression (no statements) and return its value
    pub fn evaluate(&self, expression: &str) -> Result<Value> {
        if let Some(name) = blocked_identifier(expression) {
            tracing::warn!("🚨 Blocked expression using '{}': {}", name, expression);
            return Err(anyhow::anyhow!("Expression uses a blocked construct: {}", name));
        }

        let lua = self.new_state()?;
        let result: mlua::Value = lua
            .load(format!("return {}", expression))
            .eval()
            .map_err(|e| anyhow::anyhow!("Invalid expression: {}", clean_error(&e)))?;
        lua_to_json(result, 0)
    }

    fn new_state(&self) -> Result<mlua::Lua> {
        let lua = mlua::Lua::new();
        if self.memory_limit > 0 {
            lua.set_memory_limit(self.memory_limit)
                .map_err(|e| anyhow::anyhow!("Failed to apply Lua memory limit: {}", e))?;
        }

        let globals = lua.globals();
        for name in BLOCKED_GLOBALS {
            globals
                .set(*name, mlua::Nil)
                .map_err(|e| anyhow::anyhow!("Failed to remove Lua global '{}': {}", name, e))?;
        }
        Ok(lua)
    }
}

/// `ScriptExecutor` backed by the Lua sandbox
#[derive(Debug, Clone, Copy, Default)]
pub struct LuaScriptExecutor {
    sandbox: LuaSandbox,
}

impl LuaScriptExecutor {
    pub fn new(sandbox: LuaSandbox) -> Self {
        Self { sandbox }
    }
}

impl ScriptExecutor for LuaScriptExecutor {
    fn execute(&self, code: &str, sink: Arc<dyn LogSink>) -> Result<Value> {
        self.sandbox.run(code, sink)
    }
}

/// Executor used when scripts are switched off in configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledScriptExecutor;

impl ScriptExecutor for DisabledScriptExecutor {
    fn execute(&self, _code: &str, _sink: Arc<dyn LogSink>) -> Result<Value> {
        Err(anyhow::anyhow!(
            "Script execution is disabled (set FLOWDECK_ALLOW_SCRIPTS=true to enable)"
        ))
    }
}

/// Expose `print` and `console.log/info/warn/error` wired to the sink
fn install_console(lua: &mlua::Lua, sink: Arc<dyn LogSink>) -> Result<()> {
    let install = || -> mlua::Result<()> {
        let console = lua.create_table()?;
        for level in [LogLevel::Log, LogLevel::Info, LogLevel::Warn, LogLevel::Error] {
            console.set(level.as_str(), logger(lua, Arc::clone(&sink), level)?)?;
        }
        let globals = lua.globals();
        globals.set("console", console)?;
        globals.set("print", logger(lua, Arc::clone(&sink), LogLevel::Log)?)?;
        Ok(())
    };
    install().map_err(|e| anyhow::anyhow!("Failed to install console: {}", e))
}

fn logger(lua: &mlua::Lua, sink: Arc<dyn LogSink>, level: LogLevel) -> mlua::Result<mlua::Function> {
    lua.create_function(move |_, args: mlua::Variadic<mlua::Value>| {
        let message = args.iter().map(render_value).collect::<Vec<_>>().join(" ");
        sink.log(LogLine { level, message });
        Ok(())
    })
}

fn render_value(value: &mlua::Value) -> String {
    match value {
        mlua::Value::Nil => "nil".to_string(),
        mlua::Value::Boolean(b) => b.to_string(),
        mlua::Value::Integer(i) => i.to_string(),
        mlua::Value::Number(f) => f.to_string(),
        mlua::Value::String(s) => s.to_string_lossy().to_string(),
        mlua::Value::Table(_) => lua_to_json(value.clone(), 0)
            .map(|json| json.to_string())
            .unwrap_or_else(|_| "table".to_string()),
        other => other.type_name().to_string(),
    }
}

/// Drop the interpreter traceback, keeping only the error message
fn clean_error(error: &mlua::Error) -> String {
    let message = error.to_string();
    message
        .split("\nstack traceback")
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// Convert a Lua value into JSON
///
/// Tables with contiguous integer keys starting at 1 become arrays, every other
/// table becomes an object. Functions and userdata become null.
fn lua_to_json(lua_value: mlua::Value, depth: usize) -> Result<Value> {
    match lua_value {
        mlua::Value::Nil => Ok(Value::Null),
        mlua::Value::Boolean(b) => Ok(Value::Bool(b)),
        mlua::Value::Integer(i) => Ok(Value::Number(serde_json::Number::from(i))),
        mlua::Value::Number(f) => Ok(serde_json::Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)),
        mlua::Value::String(s) => Ok(Value::String(s.to_string_lossy().to_string())),
        mlua::Value::Table(table) => {
            if depth >= MAX_TABLE_DEPTH {
                return Ok(Value::Null);
            }

            let mut is_array = true;
            let mut max_index = 0;
            let mut count = 0;

            for pair in table.pairs::<mlua::Value, mlua::Value>() {
                let (key, _) = pair.map_err(|e| anyhow::anyhow!("Failed to iterate Lua table: {}", e))?;
                count += 1;
                match key {
                    mlua::Value::Integer(i) if i > 0 => max_index = max_index.max(i as usize),
                    _ => {
                        is_array = false;
                        break;
                    }
                }
            }

            if is_array && count > 0 && count == max_index {
                let mut items = Vec::with_capacity(max_index);
                for i in 1..=max_index {
                    let item: mlua::Value = table
                        .get(i)
                        .map_err(|e| anyhow::anyhow!("Failed to read Lua table value: {}", e))?;
                    items.push(lua_to_json(item, depth + 1)?);
                }
                Ok(Value::Array(items))
            } else {
                let mut object = serde_json::Map::new();
                for pair in table.pairs::<mlua::Value, mlua::Value>() {
                    let (key, value) = pair.map_err(|e| anyhow::anyhow!("Failed to iterate Lua table: {}", e))?;
                    let key = match key {
                        mlua::Value::String(s) => s.to_string_lossy().to_string(),
                        mlua::Value::Integer(i) => i.to_string(),
                        mlua::Value::Number(f) => f.to_string(),
                        mlua::Value::Boolean(b) => b.to_string(),
                        _ => continue,
                    };
                    object.insert(key, lua_to_json(value, depth + 1)?);
                }
                Ok(Value::Object(object))
            }
        }
        _ => Ok(Value::Null),
    }
}
