//! Build constraints: `//go:build` expressions, legacy `// +build` lines and
//! GOOS/GOARCH file-name suffixes, evaluated against a [`BuildContext`].

use std::collections::BTreeSet;
use thiserror::Error;

/// Operating systems go/build recognises in file names and tags.
pub const KNOWN_OS: &[&str] = &[
    "aix", "android", "darwin", "dragonfly", "freebsd", "hurd", "illumos", "ios", "js", "linux",
    "nacl", "netbsd", "openbsd", "plan9", "solaris", "wasip1", "windows", "zos",
];

/// Operating systems that satisfy the `unix` tag.
pub const UNIX_OS: &[&str] = &[
    "aix", "android", "darwin", "dragonfly", "freebsd", "hurd", "illumos", "ios", "linux",
    "netbsd", "openbsd", "solaris",
];

/// Architectures go/build recognises in file names and tags.
pub const KNOWN_ARCH: &[&str] = &[
    "386", "amd64", "amd64p32", "arm", "armbe", "arm64", "arm64be", "loong64", "mips", "mipsle",
    "mips64", "mips64le", "mips64p32", "mips64p32le", "ppc", "ppc64", "ppc64le", "riscv",
    "riscv64", "s390", "s390x", "sparc", "sparc64", "wasm",
];

/// Newest `go1.N` release tag considered satisfied.
pub const GO_MINOR_RELEASE: u32 = 23;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid build constraint: {0}")]
pub struct ConstraintError(pub String);

/// Target platform and tag set files are selected for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildContext {
    pub goos: String,
    pub goarch: String,
    pub tags: BTreeSet<String>,
    pub include_tests: bool,
}

impl BuildContext {
    pub fn new(goos: impl Into<String>, goarch: impl Into<String>) -> Self {
        BuildContext {
            goos: goos.into(),
            goarch: goarch.into(),
            tags: BTreeSet::new(),
            include_tests: false,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_tests(mut self, include_tests: bool) -> Self {
        self.include_tests = include_tests;
        self
    }

    /// Whether a single build tag holds in this context.
    pub fn matches_tag(&self, tag: &str) -> bool {
        if tag == self.goos || tag == self.goarch || tag == "gc" {
            return true;
        }
        match (self.goos.as_str(), tag) {
            ("android", "linux") | ("illumos", "solaris") | ("ios", "darwin") => return true,
            _ => {}
        }
        if tag == "unix" && UNIX_OS.contains(&self.goos.as_str()) {
            return true;
        }
        if let Some(minor) = tag.strip_prefix("go1.") {
            return minor.parse::<u32>().is_ok_and(|n| n <= GO_MINOR_RELEASE);
        }
        self.tags.contains(tag)
    }

    /// go/build's `_GOOS`, `_GOARCH` and `_GOOS_GOARCH` file-name rule.
    pub fn matches_file_name(&self, file_name: &str) -> bool {
        let stem = file_name.strip_suffix(".go").unwrap_or(file_name);
        let stem = stem.strip_suffix("_test").unwrap_or(stem);
        // The part before the first underscore is never a constraint.
        let Some(first) = stem.find('_') else {
            return true;
        };
        let parts: Vec<&str> = stem[first..].split('_').collect();
        let n = parts.len();

        if n >= 2 && KNOWN_OS.contains(&parts[n - 2]) && KNOWN_ARCH.contains(&parts[n - 1]) {
            return self.matches_tag(parts[n - 2]) && self.matches_tag(parts[n - 1]);
        }
        let last = parts[n - 1];
        if KNOWN_OS.contains(&last) || KNOWN_ARCH.contains(&last) {
            return self.matches_tag(last);
        }
        true
    }

    /// Evaluate the constraints in a file's header. Files without any match.
    pub fn matches_source(&self, source: &str) -> Result<bool, ConstraintError> {
        match header_constraint(source)? {
            Some(expr) => Ok(expr.eval(&|tag| self.matches_tag(tag))),
            None => Ok(true),
        }
    }
}

/// Boolean build expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Tag(String),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn eval(&self, ok: &dyn Fn(&str) -> bool) -> bool {
        match self {
            Expr::Tag(tag) => ok(tag),
            Expr::Not(inner) => !inner.eval(ok),
            Expr::And(a, b) => a.eval(ok) && b.eval(ok),
            Expr::Or(a, b) => a.eval(ok) || b.eval(ok),
        }
    }

    fn and(a: Expr, b: Expr) -> Expr {
        Expr::And(Box::new(a), Box::new(b))
    }

    fn or(a: Expr, b: Expr) -> Expr {
        Expr::Or(Box::new(a), Box::new(b))
    }
}

/// The constraint governing a file, read from the comment block before its
/// package clause. `//go:build` wins over `// +build`.
pub fn header_constraint(source: &str) -> Result<Option<Expr>, ConstraintError> {
    let mut go_build = None;
    let mut plus_build = Vec::new();

    for line in source.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some(comment) = line.strip_prefix("//") else {
            break;
        };
        if let Some(expr) = comment.strip_prefix("go:build") {
            if go_build.is_some() {
                return Err(ConstraintError("multiple //go:build lines".to_string()));
            }
            go_build = Some(parse_expr(expr)?);
        } else if let Some(rest) = comment.trim_start().strip_prefix("+build") {
            if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                plus_build.push(parse_plus_build(rest)?);
            }
        }
    }

    if go_build.is_some() {
        return Ok(go_build);
    }
    Ok(plus_build.into_iter().reduce(Expr::and))
}

/// `// +build a,!b c` means `(a && !b) || c`.
fn parse_plus_build(line: &str) -> Result<Expr, ConstraintError> {
    let mut options = Vec::new();
    for option in line.split_whitespace() {
        let mut terms = Vec::new();
        for term in option.split(',') {
            let (negated, tag) = match term.strip_prefix('!') {
                Some(tag) => (true, tag),
                None => (false, term),
            };
            if !is_tag(tag) {
                return Err(ConstraintError(format!("bad +build term {term:?}")));
            }
            let tag = Expr::Tag(tag.to_string());
            terms.push(if negated { Expr::Not(Box::new(tag)) } else { tag });
        }
        options.extend(terms.into_iter().reduce(Expr::and));
    }
    options
        .into_iter()
        .reduce(Expr::or)
        .ok_or_else(|| ConstraintError("empty +build line".to_string()))
}

fn is_tag(word: &str) -> bool {
    !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Tag(String),
    Not,
    And,
    Or,
    Open,
    Close,
}

fn tokenize(input: &str) -> Result<Vec<Token>, ConstraintError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            c if c.is_whitespace() => {}
            '!' => tokens.push(Token::Not),
            '(' => tokens.push(Token::Open),
            ')' => tokens.push(Token::Close),
            '&' | '|' => {
                if chars.next_if(|&(_, next)| next == c).is_none() {
                    return Err(ConstraintError(format!("unexpected {c:?} in {input:?}")));
                }
                tokens.push(if c == '&' { Token::And } else { Token::Or });
            }
            c if c.is_ascii_alphanumeric() || c == '_' || c == '.' => {
                let mut end = i + c.len_utf8();
                while let Some(&(j, next)) = chars.peek() {
                    if !(next.is_ascii_alphanumeric() || next == '_' || next == '.') {
                        break;
                    }
                    end = j + next.len_utf8();
                    chars.next();
                }
                tokens.push(Token::Tag(input[i..end].to_string()));
            }
            other => {
                return Err(ConstraintError(format!("unexpected {other:?} in {input:?}")));
            }
        }
    }
    Ok(tokens)
}

/// Parse a `//go:build` expression body.
pub fn parse_expr(input: &str) -> Result<Expr, ConstraintError> {
    let tokens = tokenize(input)?;
    let mut parser = ExprParser { tokens, pos: 0 };
    let expr = parser.or()?;
    if parser.pos != parser.tokens.len() {
        return Err(ConstraintError(format!("trailing tokens in {:?}", input.trim())));
    }
    Ok(expr)
}

struct ExprParser {
    tokens: Vec<Token>,
    pos: usize,
}

impl ExprParser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn or(&mut self) -> Result<Expr, ConstraintError> {
        let mut left = self.and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            left = Expr::or(left, self.and()?);
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, ConstraintError> {
        let mut left = self.not()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            left = Expr::and(left, self.not()?);
        }
        Ok(left)
    }

    fn not(&mut self) -> Result<Expr, ConstraintError> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            return Ok(Expr::Not(Box::new(self.not()?)));
        }
        self.atom()
    }

    fn atom(&mut self) -> Result<Expr, ConstraintError> {
        match self.tokens.get(self.pos).cloned() {
            Some(Token::Open) => {
                self.pos += 1;
                let inner = self.or()?;
                if self.peek() != Some(&Token::Close) {
                    return Err(ConstraintError("missing )".to_string()));
                }
                self.pos += 1;
                Ok(inner)
            }
            Some(Token::Tag(tag)) => {
                self.pos += 1;
                Ok(Expr::Tag(tag))
            }
            Some(other) => Err(ConstraintError(format!("unexpected {other:?}"))),
            None => Err(ConstraintError("unexpected end of expression".to_string())),
        }
    }
}
