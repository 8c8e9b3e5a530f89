//! Target platform flags and conda selector evaluation.
//!
//! Recipe lines may carry a trailing selector annotation such as
//! `# [linux and py3k]`. The annotated line is kept only when the selector
//! evaluates to true against the [`Platform`] flag set. The flag set is an
//! explicit value passed into the filter, so alternate targets can be
//! evaluated without any global state.

/// The fixed set of platform and interpreter flags a selector can name.
///
/// A selector naming any other identifier is a hard error for that recipe,
/// since it means the recipe cannot be translated safely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    pub linux: bool,
    pub osx: bool,
    pub win: bool,
    pub unix: bool,
    /// True on any x86 target, 32-bit included.
    pub x86: bool,
    pub x86_64: bool,
    pub aarch64: bool,
    pub py2k: bool,
    pub py3k: bool,
    pub py27: bool,
    pub py36: bool,
    pub perl_threaded: bool,
}

impl Platform {
    /// The target the converter emits derivations for: 64-bit Linux with a
    /// modern Python 3.
    pub fn linux_x86_64() -> Self {
        Self {
            linux: true,
            osx: false,
            win: false,
            unix: true,
            x86: true,
            x86_64: true,
            aarch64: false,
            py2k: false,
            py3k: true,
            py27: false,
            py36: true,
            perl_threaded: true,
        }
    }

    fn flag(&self, name: &str) -> Option<bool> {
        Some(match name {
            "linux" => self.linux,
            "osx" => self.osx,
            "win" => self.win,
            "unix" => self.unix,
            "x86" => self.x86,
            "x86_64" => self.x86_64,
            "aarch64" => self.aarch64,
            "py2k" => self.py2k,
            "py3k" => self.py3k,
            "py27" => self.py27,
            "py36" => self.py36,
            "perl_threaded" => self.perl_threaded,
            _ => return None,
        })
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::linux_x86_64()
    }
}

/// Splits a recipe line into its content and an optional selector expression.
///
/// The selector is the bracketed tail of a trailing `# [...]` comment. Lines
/// without one are returned as-is.
fn split_selector(line: &str) -> (&str, Option<&str>) {
    let trimmed = line.trim_end();

    if !trimmed.ends_with(']') {
        return (line, None);
    }

    match trimmed.rfind("# [") {
        Some(pos) => {
            let expr = &trimmed[pos + 3..trimmed.len() - 1];
            (&line[..pos], Some(expr))
        }
        None => (line, None),
    }
}

/// Decides whether a single recipe line survives selector filtering.
///
/// Returns the line content (selector comment removed) when kept, `None`
/// when the selector evaluates to false, and an error message when the
/// selector cannot be evaluated.
pub fn filter_line<'a>(
    line: &'a str,
    platform: &Platform,
) -> Result<Option<&'a str>, (String, String)> {
    let (content, selector) = split_selector(line);

    match selector {
        None => Ok(Some(line)),
        Some(expr) => match eval_selector(expr, platform) {
            Ok(true) => Ok(Some(content)),
            Ok(false) => Ok(None),
            Err(reason) => Err((expr.to_string(), reason)),
        },
    }
}

/// Evaluates a selector expression against the platform flags.
///
/// Grammar: `or := and ("or" and)*`, `and := unary ("and" unary)*`,
/// `unary := "not" unary | "(" or ")" | flag`.
pub fn eval_selector(expr: &str, platform: &Platform) -> Result<bool, String> {
    let tokens = tokenize(expr)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        platform,
    };
    let value = parser.or_expr()?;

    if parser.pos != parser.tokens.len() {
        return Err(format!("unexpected trailing token in '{expr}'"));
    }

    Ok(value)
}

#[derive(Debug, PartialEq, Eq)]
enum Token {
    Ident(String),
    And,
    Or,
    Not,
    Open,
    Close,
}

fn tokenize(expr: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = expr.chars().peekable();

    while let Some(&ch) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ')' => {
                chars.next();
                tokens.push(Token::Close);
            }
            c if c.is_ascii_alphanumeric() || c == '_' => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        word.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(match word.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    _ => Token::Ident(word),
                });
            }
            c => return Err(format!("unexpected character '{c}'")),
        }
    }

    if tokens.is_empty() {
        return Err("empty selector".to_string());
    }

    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    platform: &'a Platform,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn or_expr(&mut self) -> Result<bool, String> {
        let mut acc = self.and_expr()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            // No short-circuit: the right side must still be well-formed.
            let rhs = self.and_expr()?;
            acc = acc || rhs;
        }
        Ok(acc)
    }

    fn and_expr(&mut self) -> Result<bool, String> {
        let mut acc = self.unary()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let rhs = self.unary()?;
            acc = acc && rhs;
        }
        Ok(acc)
    }

    fn unary(&mut self) -> Result<bool, String> {
        match self.peek() {
            Some(Token::Not) => {
                self.pos += 1;
                Ok(!self.unary()?)
            }
            Some(Token::Open) => {
                self.pos += 1;
                let value = self.or_expr()?;
                if self.peek() != Some(&Token::Close) {
                    return Err("missing closing parenthesis".to_string());
                }
                self.pos += 1;
                Ok(value)
            }
            Some(Token::Ident(name)) => {
                let value = self
                    .platform
                    .flag(name)
                    .ok_or_else(|| format!("unknown flag '{name}'"))?;
                self.pos += 1;
                Ok(value)
            }
            _ => Err("expected flag, 'not' or '('".to_string()),
        }
    }
}
