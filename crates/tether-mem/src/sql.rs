//! Tokenizer and single-statement parser for the memory backend's SQL
//! subset.
//!
//! The subset is what the layers above actually emit: `create table`,
//! `insert`, `select` with an optional single equality filter, `delete`,
//! and the transaction verbs. The parser consumes exactly one statement and
//! reports the byte offset just past it, which is what
//! `Connection::prepare` needs for tail inspection.

use tether_core::{Error, Result, Value};

/// One column in a `create table` definition. Type words are accepted and
/// ignored (storage is dynamically typed); `autoincrement` is honored.
#[derive(Debug, Clone)]
pub(crate) struct ColumnSpec {
    pub(crate) name: String,
    pub(crate) autoincrement: bool,
}

/// A value position: literal or named parameter.
#[derive(Debug, Clone)]
pub(crate) enum Expr {
    Param(String),
    Literal(Value),
}

#[derive(Debug, Clone)]
pub(crate) enum SelectColumns {
    All,
    Named(Vec<String>),
}

/// Parsed statement, column references still by name.
#[derive(Debug, Clone)]
pub(crate) enum Ast {
    Create {
        table: String,
        columns: Vec<ColumnSpec>,
    },
    Insert {
        table: String,
        columns: Vec<String>,
        values: Vec<Expr>,
    },
    Select {
        table: String,
        columns: SelectColumns,
        filter: Option<(String, Expr)>,
    },
    Update {
        table: String,
        sets: Vec<(String, Expr)>,
        filter: Option<(String, Expr)>,
    },
    Delete {
        table: String,
        filter: Option<(String, Expr)>,
    },
    Begin,
    Commit,
    Rollback,
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Str(String),
    Int(i64),
    Real(f64),
    Param(String),
    LParen,
    RParen,
    Comma,
    Star,
    Eq,
    Semi,
}

fn syntax(near: &str) -> Error {
    Error::backend(format!("syntax error near {near:?}"))
}

struct Scanner<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    /// Consume a quote-delimited token (opening quote at `self.pos`),
    /// unescaping doubled quotes. Bytes are collected and re-validated so
    /// multi-byte text survives intact.
    fn quoted(&mut self, quote: u8, unterminated: &str) -> Result<String> {
        let bytes = self.src.as_bytes();
        self.pos += 1;
        let mut raw = Vec::new();
        loop {
            match bytes.get(self.pos) {
                None => return Err(Error::backend(unterminated)),
                Some(&b) if b == quote => {
                    if bytes.get(self.pos + 1) == Some(&quote) {
                        raw.push(quote);
                        self.pos += 2;
                    } else {
                        self.pos += 1;
                        break;
                    }
                }
                Some(&b) => {
                    raw.push(b);
                    self.pos += 1;
                }
            }
        }
        String::from_utf8(raw).map_err(|_| Error::backend("invalid utf-8 in quoted token"))
    }

    /// Next token plus the byte offset just past it.
    fn scan(&mut self) -> Result<Option<(Tok, usize)>> {
        let bytes = self.src.as_bytes();
        while self.pos < bytes.len() && bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
        if self.pos >= bytes.len() {
            return Ok(None);
        }
        let ch = bytes[self.pos] as char;
        let tok = match ch {
            '(' => {
                self.pos += 1;
                Tok::LParen
            }
            ')' => {
                self.pos += 1;
                Tok::RParen
            }
            ',' => {
                self.pos += 1;
                Tok::Comma
            }
            '*' => {
                self.pos += 1;
                Tok::Star
            }
            '=' => {
                self.pos += 1;
                Tok::Eq
            }
            ';' => {
                self.pos += 1;
                Tok::Semi
            }
            '\'' => {
                let raw = self.quoted(b'\'', "unterminated string literal")?;
                Tok::Str(raw)
            }
            '"' => {
                let raw = self.quoted(b'"', "unterminated quoted identifier")?;
                Tok::Ident(raw.to_lowercase())
            }
            ':' => {
                self.pos += 1;
                let start = self.pos;
                while bytes
                    .get(self.pos)
                    .is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'_')
                {
                    self.pos += 1;
                }
                if self.pos == start {
                    return Err(syntax(":"));
                }
                // Parameter names stay case-sensitive, as written in the SQL.
                Tok::Param(format!(":{}", &self.src[start..self.pos]))
            }
            c if c.is_ascii_digit() || c == '-' => {
                let start = self.pos;
                if c == '-' {
                    self.pos += 1;
                    if !bytes.get(self.pos).is_some_and(|b| b.is_ascii_digit()) {
                        return Err(syntax("-"));
                    }
                }
                let mut real = false;
                while let Some(&b) = bytes.get(self.pos) {
                    if b.is_ascii_digit() {
                        self.pos += 1;
                    } else if b == b'.' && !real {
                        real = true;
                        self.pos += 1;
                    } else {
                        break;
                    }
                }
                let text = &self.src[start..self.pos];
                if real {
                    Tok::Real(text.parse().map_err(|_| syntax(text))?)
                } else {
                    Tok::Int(text.parse().map_err(|_| syntax(text))?)
                }
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = self.pos;
                while bytes
                    .get(self.pos)
                    .is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'_')
                {
                    self.pos += 1;
                }
                Tok::Ident(self.src[start..self.pos].to_ascii_lowercase())
            }
            other => return Err(syntax(&other.to_string())),
        };
        Ok(Some((tok, self.pos)))
    }
}

struct Parser<'a> {
    scanner: Scanner<'a>,
    peeked: Option<Option<(Tok, usize)>>,
    last_end: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            scanner: Scanner::new(src),
            peeked: None,
            last_end: 0,
        }
    }

    fn peek(&mut self) -> Result<Option<&Tok>> {
        if self.peeked.is_none() {
            self.peeked = Some(self.scanner.scan()?);
        }
        Ok(match &self.peeked {
            Some(Some((tok, _))) => Some(tok),
            _ => None,
        })
    }

    fn next(&mut self) -> Result<Option<Tok>> {
        let item = match self.peeked.take() {
            Some(item) => item,
            None => self.scanner.scan()?,
        };
        Ok(item.map(|(tok, end)| {
            self.last_end = end;
            tok
        }))
    }

    fn ident(&mut self) -> Result<String> {
        match self.next()? {
            Some(Tok::Ident(name)) => Ok(name),
            other => Err(syntax(&format!("{other:?}"))),
        }
    }

    fn keyword(&mut self, word: &str) -> Result<()> {
        match self.next()? {
            Some(Tok::Ident(name)) if name == word => Ok(()),
            other => Err(syntax(&format!("{other:?}, expected {word}"))),
        }
    }

    fn punct(&mut self, tok: &Tok) -> Result<()> {
        match self.next()? {
            Some(found) if &found == tok => Ok(()),
            other => Err(syntax(&format!("{other:?}"))),
        }
    }

    /// Consume the keyword if it is next; used for optional noise words.
    fn eat_keyword(&mut self, word: &str) -> Result<bool> {
        if matches!(self.peek()?, Some(Tok::Ident(name)) if name == word) {
            self.next()?;
            return Ok(true);
        }
        Ok(false)
    }

    fn expr(&mut self) -> Result<Expr> {
        match self.next()? {
            Some(Tok::Str(text)) => Ok(Expr::Literal(Value::Text(text))),
            Some(Tok::Int(v)) => Ok(Expr::Literal(Value::Integer(v))),
            Some(Tok::Real(v)) => Ok(Expr::Literal(Value::Real(v))),
            Some(Tok::Param(name)) => Ok(Expr::Param(name)),
            Some(Tok::Ident(name)) if name == "null" => Ok(Expr::Literal(Value::Null)),
            other => Err(syntax(&format!("{other:?}"))),
        }
    }

    fn filter(&mut self) -> Result<Option<(String, Expr)>> {
        if !self.eat_keyword("where")? {
            return Ok(None);
        }
        let column = self.ident()?;
        self.punct(&Tok::Eq)?;
        let value = self.expr()?;
        Ok(Some((column, value)))
    }
}

/// Parse the first statement in `text`.
///
/// Returns the statement and the byte offset just past its final token.
/// Whatever follows — a separator, whitespace, or a second statement — is
/// the caller's to inspect. Tokens that continue the first statement
/// ungrammatically are a syntax error here, not a tail.
pub(crate) fn parse(text: &str) -> Result<(Ast, usize)> {
    let mut p = Parser::new(text);
    let head = match p.next()? {
        Some(Tok::Ident(word)) => word,
        Some(other) => return Err(syntax(&format!("{other:?}"))),
        None => return Err(Error::backend("empty statement")),
    };

    let ast = match head.as_str() {
        "create" => {
            p.keyword("table")?;
            let table = p.ident()?;
            p.punct(&Tok::LParen)?;
            let mut columns = Vec::new();
            loop {
                let name = p.ident()?;
                let mut autoincrement = false;
                // Type and constraint words up to the next separator.
                loop {
                    match p.peek()? {
                        Some(Tok::Ident(word)) => {
                            if word == "autoincrement" {
                                autoincrement = true;
                            }
                            p.next()?;
                        }
                        _ => break,
                    }
                }
                columns.push(ColumnSpec {
                    name,
                    autoincrement,
                });
                match p.next()? {
                    Some(Tok::Comma) => {}
                    Some(Tok::RParen) => break,
                    other => return Err(syntax(&format!("{other:?}"))),
                }
            }
            Ast::Create { table, columns }
        }
        "insert" => {
            p.keyword("into")?;
            let table = p.ident()?;
            p.punct(&Tok::LParen)?;
            let mut columns = Vec::new();
            loop {
                columns.push(p.ident()?);
                match p.next()? {
                    Some(Tok::Comma) => {}
                    Some(Tok::RParen) => break,
                    other => return Err(syntax(&format!("{other:?}"))),
                }
            }
            p.keyword("values")?;
            p.punct(&Tok::LParen)?;
            let mut values = Vec::new();
            loop {
                values.push(p.expr()?);
                match p.next()? {
                    Some(Tok::Comma) => {}
                    Some(Tok::RParen) => break,
                    other => return Err(syntax(&format!("{other:?}"))),
                }
            }
            Ast::Insert {
                table,
                columns,
                values,
            }
        }
        "select" => {
            let columns = if matches!(p.peek()?, Some(Tok::Star)) {
                p.next()?;
                SelectColumns::All
            } else {
                let mut names = Vec::new();
                loop {
                    names.push(p.ident()?);
                    if matches!(p.peek()?, Some(Tok::Comma)) {
                        p.next()?;
                    } else {
                        break;
                    }
                }
                SelectColumns::Named(names)
            };
            p.keyword("from")?;
            let table = p.ident()?;
            let filter = p.filter()?;
            Ast::Select {
                table,
                columns,
                filter,
            }
        }
        "update" => {
            let table = p.ident()?;
            p.keyword("set")?;
            let mut sets = Vec::new();
            loop {
                let column = p.ident()?;
                p.punct(&Tok::Eq)?;
                sets.push((column, p.expr()?));
                if matches!(p.peek()?, Some(Tok::Comma)) {
                    p.next()?;
                } else {
                    break;
                }
            }
            let filter = p.filter()?;
            Ast::Update {
                table,
                sets,
                filter,
            }
        }
        "delete" => {
            p.keyword("from")?;
            let table = p.ident()?;
            let filter = p.filter()?;
            Ast::Delete { table, filter }
        }
        "begin" => {
            p.eat_keyword("transaction")?;
            Ast::Begin
        }
        "commit" => Ast::Commit,
        "rollback" => {
            p.eat_keyword("transaction")?;
            Ast::Rollback
        }
        other => return Err(syntax(other)),
    };

    // One statement per parse: the next token must end it or separate it.
    match p.peek()? {
        None | Some(Tok::Semi) => Ok((ast, p.last_end)),
        Some(tok) => Err(syntax(&format!("{tok:?}"))),
    }
}
