//! Line-oriented parser for sandbox unit sources.
//!
//! Grammar, one statement per line:
//!
//! ```text
//! # comment
//! let NAME = 42 | "text" | alias.attr.path
//! import a.b.c [as NAME]
//! from a.b import x [as y], z
//! fn NAME: import a; from b import c
//! fail "message"
//! ```

use crate::error::{Result, SandboxError};

/// A parsed statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    /// `let name = expr`
    Let { name: String, expr: Expr },
    /// `import unit [as alias]`
    Import { unit: String, alias: Option<String> },
    /// `from unit import name [as alias], ...`
    FromImport {
        unit: String,
        names: Vec<ImportName>,
    },
    /// `fn name: stmt; stmt`
    Function { name: String, body: Vec<Stmt> },
    /// `fail "message"`
    Fail { message: String },
}

/// One entry of a `from ... import` list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportName {
    pub name: String,
    pub alias: Option<String>,
}

impl ImportName {
    /// The name the entry is bound under in the importing scope.
    pub fn binding(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// Right-hand side of a `let`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Int(i64),
    Str(String),
    /// Dotted path read from the unit's bindings at execution time.
    Path(Vec<String>),
}

/// Parses a unit's source text.
pub fn parse_source(unit: &str, source: &str) -> Result<Vec<Stmt>> {
    let mut stmts = Vec::new();

    for (index, raw) in source.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let stmt = parse_line(line).map_err(|message| SandboxError::Parse {
            unit: unit.to_string(),
            line: index + 1,
            message,
        })?;
        stmts.push(stmt);
    }

    Ok(stmts)
}

fn parse_line(line: &str) -> std::result::Result<Stmt, String> {
    if let Some(rest) = strip_keyword(line, "fn") {
        return parse_function(rest);
    }
    parse_simple(line)
}

/// Parses every statement that may also appear inside a function body.
fn parse_simple(line: &str) -> std::result::Result<Stmt, String> {
    if let Some(rest) = strip_keyword(line, "let") {
        parse_let(rest)
    } else if let Some(rest) = strip_keyword(line, "import") {
        parse_import(rest)
    } else if let Some(rest) = strip_keyword(line, "from") {
        parse_from_import(rest)
    } else if let Some(rest) = strip_keyword(line, "fail") {
        Ok(Stmt::Fail {
            message: parse_string(rest.trim())
                .ok_or_else(|| format!("expected a quoted message, found '{}'", rest.trim()))?,
        })
    } else {
        Err(format!("unrecognised statement '{}'", line))
    }
}

fn parse_let(rest: &str) -> std::result::Result<Stmt, String> {
    let (name, value) = rest
        .split_once('=')
        .ok_or_else(|| "expected '=' in let".to_string())?;
    let name = ident(name.trim())?;
    let value = value.trim();

    let expr = if let Some(text) = parse_string(value) {
        Expr::Str(text)
    } else if let Ok(number) = value.parse::<i64>() {
        Expr::Int(number)
    } else {
        Expr::Path(dotted(value)?.split('.').map(str::to_string).collect())
    };

    Ok(Stmt::Let { name, expr })
}

fn parse_import(rest: &str) -> std::result::Result<Stmt, String> {
    let (unit, alias) = split_alias(rest.trim())?;
    Ok(Stmt::Import {
        unit: dotted(unit)?,
        alias,
    })
}

fn parse_from_import(rest: &str) -> std::result::Result<Stmt, String> {
    let (unit, list) = rest
        .split_once(" import ")
        .ok_or_else(|| "expected 'import' after 'from <unit>'".to_string())?;

    let mut names = Vec::new();
    for entry in list.split(',') {
        let (name, alias) = split_alias(entry.trim())?;
        names.push(ImportName {
            name: ident(name)?,
            alias,
        });
    }

    Ok(Stmt::FromImport {
        unit: dotted(unit.trim())?,
        names,
    })
}

fn parse_function(rest: &str) -> std::result::Result<Stmt, String> {
    let (name, body) = rest
        .split_once(':')
        .ok_or_else(|| "expected ':' after function name".to_string())?;
    let name = ident(name.trim())?;

    let mut stmts = Vec::new();
    for part in body.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        match parse_simple(part)? {
            Stmt::Let { .. } => return Err("let is not allowed in a function body".into()),
            stmt => stmts.push(stmt),
        }
    }

    Ok(Stmt::Function { name, body: stmts })
}

/// Returns the text after `keyword` if the line starts with it as a word.
fn strip_keyword<'a>(line: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(keyword)?;
    if rest.starts_with(char::is_whitespace) {
        Some(rest)
    } else {
        None
    }
}

fn split_alias(text: &str) -> std::result::Result<(&str, Option<String>), String> {
    match text.split_once(" as ") {
        Some((name, alias)) => Ok((name.trim(), Some(ident(alias.trim())?))),
        None => Ok((text, None)),
    }
}

fn parse_string(text: &str) -> Option<String> {
    let inner = text.strip_prefix('"')?.strip_suffix('"')?;
    Some(inner.to_string())
}

fn ident(text: &str) -> std::result::Result<String, String> {
    let mut chars = text.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };

    if valid {
        Ok(text.to_string())
    } else {
        Err(format!("invalid identifier '{}'", text))
    }
}

fn dotted(text: &str) -> std::result::Result<String, String> {
    for segment in text.split('.') {
        ident(segment)?;
    }
    Ok(text.to_string())
}
