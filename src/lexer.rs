//! Pascal Lexer
//!
//! Tokenizes Pascal source. Keywords are case-insensitive, comments and
//! whitespace are discarded, and newlines only advance the line counter.

use std::fmt;

use logos::{FilterResult, Logos, Skip};

use crate::error::{Diagnostic, Span};

/// Reason a lexeme was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LexError {
    /// Input no token matches; skipped with a warning
    #[default]
    Invalid,
    /// Integer literal that does not fit in 64 bits
    IntegerOverflow,
    /// Block comment with no closing delimiter
    UnterminatedComment,
}

impl LexError {
    /// Diagnostic for the rejected `text` found on `line`
    pub fn diagnostic(self, text: &str, line: usize) -> Diagnostic {
        match self {
            LexError::Invalid => {
                let mut chars = text.chars();
                let message = match (chars.next(), chars.next()) {
                    (Some(c), None) => format!("Invalid character '{}' on line {}", c, line),
                    _ => format!("Invalid token '{}' on line {}", text, line),
                };
                Diagnostic::warning(Some(line), message)
            }
            LexError::IntegerOverflow => Diagnostic::error(
                Some(line),
                format!("Integer literal '{}' is out of range", text),
            ),
            LexError::UnterminatedComment => {
                Diagnostic::error(Some(line), "Unterminated comment")
            }
        }
    }
}

/// Pascal tokens
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(extras = usize)]
#[logos(error = LexError)]
#[logos(skip r"[ \t\r\f]+")]
pub enum Token {
    // === Literals ===

    /// Integer literal
    #[regex(r"[0-9]+", |lex| lex.slice().parse().map_err(|_| LexError::IntegerOverflow))]
    Integer(i64),

    /// Real literal (decimal point and/or exponent)
    #[regex(r"[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().parse().ok())]
    #[regex(r"[0-9]+[eE][+-]?[0-9]+", |lex| lex.slice().parse().ok())]
    Real(f64),

    /// Exactly one quoted character: 'a', '\''
    #[regex(r"'(\\'|[^'])'", char_literal, priority = 10)]
    Char(char),

    /// Quoted text: 'text' or "text"
    #[regex(r"'(\\'|[^'])*'", |lex| unquote(lex.slice()))]
    #[regex(r#""(\\"|[^"])*""#, |lex| unquote(lex.slice()))]
    String(String),

    // === Keywords ===

    #[token("program", ignore(ascii_case))]
    Program,
    #[token("begin", ignore(ascii_case))]
    Begin,
    #[token("end", ignore(ascii_case))]
    End,
    #[token("var", ignore(ascii_case))]
    Var,
    #[token("integer", ignore(ascii_case))]
    IntegerType,
    #[token("real", ignore(ascii_case))]
    RealType,
    #[token("boolean", ignore(ascii_case))]
    BooleanType,
    #[token("char", ignore(ascii_case))]
    CharType,
    #[token("string", ignore(ascii_case))]
    StringType,
    #[token("array", ignore(ascii_case))]
    Array,
    #[token("of", ignore(ascii_case))]
    Of,
    #[token("if", ignore(ascii_case))]
    If,
    #[token("then", ignore(ascii_case))]
    Then,
    #[token("else", ignore(ascii_case))]
    Else,
    #[token("while", ignore(ascii_case))]
    While,
    #[token("do", ignore(ascii_case))]
    Do,
    #[token("for", ignore(ascii_case))]
    For,
    #[token("to", ignore(ascii_case))]
    To,
    #[token("downto", ignore(ascii_case))]
    Downto,
    #[token("repeat", ignore(ascii_case))]
    Repeat,
    #[token("until", ignore(ascii_case))]
    Until,
    #[token("and", ignore(ascii_case))]
    And,
    #[token("or", ignore(ascii_case))]
    Or,
    #[token("not", ignore(ascii_case))]
    Not,
    #[token("div", ignore(ascii_case))]
    Div,
    #[token("mod", ignore(ascii_case))]
    Mod,
    #[token("writeln", ignore(ascii_case))]
    Writeln,
    #[token("write", ignore(ascii_case))]
    Write,
    #[token("readln", ignore(ascii_case))]
    Readln,
    #[token("length", ignore(ascii_case))]
    Length,
    #[token("true", ignore(ascii_case))]
    True,
    #[token("false", ignore(ascii_case))]
    False,
    #[token("function", ignore(ascii_case))]
    Function,
    #[token("procedure", ignore(ascii_case))]
    Procedure,

    /// Identifier (case preserved)
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Identifier(String),

    // === Operators ===

    #[token(":=")]
    Assign,
    #[token(">=")]
    Ge,
    #[token("<=")]
    Le,
    #[token("<>")]
    Ne,
    #[token("..")]
    DotDot,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token(">")]
    Gt,
    #[token("<")]
    Lt,
    #[token("=")]
    Eq,

    // === Delimiters ===

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(";")]
    Semicolon,
    #[token(".")]
    Dot,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,

    // === Trivia (never produced) ===

    #[token("{", |lex| skip_comment(lex, "}"))]
    #[token("(*", |lex| skip_comment(lex, "*)"))]
    #[regex(r"//[^\n]*", logos::skip)]
    #[regex(r"#[^\n]*", logos::skip)]
    Comment,

    #[token("\n", |lex| { lex.extras += 1; Skip })]
    Newline,
}

/// Skip a block comment up to and including `close`
fn skip_comment(lex: &mut logos::Lexer<Token>, close: &str) -> FilterResult<(), LexError> {
    match lex.remainder().find(close) {
        Some(end) => {
            lex.extras += lex.remainder()[..end].matches('\n').count();
            lex.bump(end + close.len());
            FilterResult::Skip
        }
        None => {
            lex.bump(lex.remainder().len());
            FilterResult::Error(LexError::UnterminatedComment)
        }
    }
}

/// Strip the delimiting quotes and resolve escaped quotes
fn unquote(s: &str) -> String {
    s[1..s.len() - 1].replace("\\'", "'").replace("\\\"", "\"")
}

fn char_literal(lex: &mut logos::Lexer<Token>) -> Option<char> {
    let text = unquote(lex.slice());
    let mut chars = text.chars();
    let c = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    Some(c)
}

impl Token {
    /// Token class name used in syntax error reports
    pub fn kind(&self) -> &'static str {
        match self {
            Token::Integer(_) | Token::Real(_) => "NUM",
            Token::Char(_) => "CHARLIT",
            Token::String(_) => "STRING",
            Token::Identifier(_) => "ID",
            Token::Program => "PROGRAM",
            Token::Begin => "BEGIN",
            Token::End => "END",
            Token::Var => "VAR",
            Token::IntegerType => "INTEGER",
            Token::RealType => "REAL",
            Token::BooleanType => "BOOLEAN",
            Token::CharType => "CHAR",
            Token::StringType => "STRING_TYPE",
            Token::Array => "ARRAY",
            Token::Of => "OF",
            Token::If => "IF",
            Token::Then => "THEN",
            Token::Else => "ELSE",
            Token::While => "WHILE",
            Token::Do => "DO",
            Token::For => "FOR",
            Token::To => "TO",
            Token::Downto => "DOWNTO",
            Token::Repeat => "REPEAT",
            Token::Until => "UNTIL",
            Token::And => "AND",
            Token::Or => "OR",
            Token::Not => "NOT",
            Token::Div => "DIV",
            Token::Mod => "MOD",
            Token::Writeln => "WRITELN",
            Token::Write => "WRITE",
            Token::Readln => "READLN",
            Token::Length => "LENGTH",
            Token::True => "TRUE",
            Token::False => "FALSE",
            Token::Function => "FUNCTION",
            Token::Procedure => "PROCEDURE",
            Token::Assign => "ASSIGN",
            Token::Ge => "GE",
            Token::Le => "LE",
            Token::Ne => "NE",
            Token::DotDot => "DOTDOT",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Gt => ">",
            Token::Lt => "<",
            Token::Eq => "=",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::Semicolon => ";",
            Token::Dot => ".",
            Token::Comma => ",",
            Token::Colon => ":",
            Token::Comment => "COMMENT",
            Token::Newline => "NEWLINE",
        }
    }
}

/// Spanned token for error reporting
#[derive(Debug, Clone)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
    pub line: usize,
    /// Source text of the lexeme
    pub text: String,
}

impl fmt::Display for SpannedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>4} {:<12} {}", self.line, self.token.kind(), self.text)
    }
}

/// Lazy token stream over a source text.
///
/// Rejected input is yielded as a diagnostic and skipped; the stream always
/// continues after it. Unknown characters are warnings, out-of-range integers
/// and unterminated comments are errors. Construct a new `Lexer` to restart.
#[derive(Clone)]
pub struct Lexer<'src> {
    inner: logos::Lexer<'src, Token>,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            inner: Token::lexer(source),
        }
    }

    /// Line of the most recently produced lexeme (1-based)
    pub fn line(&self) -> usize {
        self.inner.extras + 1
    }
}

impl<'src> Iterator for Lexer<'src> {
    type Item = Result<SpannedToken, Diagnostic>;

    fn next(&mut self) -> Option<Self::Item> {
        let result = self.inner.next()?;
        let line = self.line();
        let text = self.inner.slice();
        // literals and unterminated comments may span lines
        self.inner.extras += text.matches('\n').count();

        Some(match result {
            Ok(token) => Ok(SpannedToken {
                token,
                span: self.inner.span().into(),
                line,
                text: text.to_string(),
            }),
            Err(err) => Err(err.diagnostic(text, line)),
        })
    }
}

/// Tokenize source code, collecting lexical diagnostics separately
pub fn tokenize(source: &str) -> (Vec<SpannedToken>, Vec<Diagnostic>) {
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    for result in Lexer::new(source) {
        match result {
            Ok(token) => tokens.push(token),
            Err(diagnostic) => errors.push(diagnostic),
        }
    }

    (tokens, errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source).0.into_iter().map(|t| t.token).collect()
    }

    #[test]
    fn test_simple_tokens() {
        let tokens = kinds("x := y + 10;");
        assert_eq!(
            tokens,
            vec![
                Token::Identifier("x".into()),
                Token::Assign,
                Token::Identifier("y".into()),
                Token::Plus,
                Token::Integer(10),
                Token::Semicolon,
            ]
        );
    }

    #[test]
    fn test_keywords_case_insensitive() {
        let tokens = kinds("PROGRAM Begin eNd WriteLn write");
        assert_eq!(
            tokens,
            vec![
                Token::Program,
                Token::Begin,
                Token::End,
                Token::Writeln,
                Token::Write
            ]
        );
    }

    #[test]
    fn test_keyword_prefix_is_identifier() {
        let tokens = kinds("endpoint dox iff");
        assert!(matches!(&tokens[0], Token::Identifier(s) if s == "endpoint"));
        assert!(matches!(&tokens[1], Token::Identifier(s) if s == "dox"));
        assert!(matches!(&tokens[2], Token::Identifier(s) if s == "iff"));
    }

    #[test]
    fn test_numbers() {
        let tokens = kinds("42 3.14 1e3 2.5E-2");
        assert_eq!(tokens[0], Token::Integer(42));
        assert_eq!(tokens[1], Token::Real(3.14));
        assert_eq!(tokens[2], Token::Real(1000.0));
        assert_eq!(tokens[3], Token::Real(0.025));
    }

    #[test]
    fn test_range_is_not_real() {
        let tokens = kinds("[1..5]");
        assert_eq!(
            tokens,
            vec![
                Token::LBracket,
                Token::Integer(1),
                Token::DotDot,
                Token::Integer(5),
                Token::RBracket,
            ]
        );
    }

    #[test]
    fn test_char_and_string_literals() {
        let tokens = kinds(r#"'a' 'abc' '' '\'' "dq" 'it\'s'"#);
        assert_eq!(tokens[0], Token::Char('a'));
        assert_eq!(tokens[1], Token::String("abc".into()));
        assert_eq!(tokens[2], Token::String(String::new()));
        assert_eq!(tokens[3], Token::Char('\''));
        assert_eq!(tokens[4], Token::String("dq".into()));
        assert_eq!(tokens[5], Token::String("it's".into()));
    }

    #[test]
    fn test_comments_discarded() {
        let tokens = kinds("a { skip } b // rest\n c # shell\n d (* block *) e");
        let names: Vec<_> = tokens
            .iter()
            .map(|t| match t {
                Token::Identifier(s) => s.as_str(),
                _ => "?",
            })
            .collect();
        assert_eq!(names, vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn test_line_numbers() {
        let (tokens, _) = tokenize("a\nb\n\n{ one\ntwo }\nc");
        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[1].line, 2);
        assert_eq!(tokens[2].line, 6);
    }

    #[test]
    fn test_invalid_character_is_skipped() {
        let (tokens, errors) = tokenize("a @ b\n$");
        assert_eq!(tokens.len(), 2);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].message, "Invalid character '@' on line 1");
        assert_eq!(errors[1].line, Some(2));
        assert!(!errors[0].is_error());
    }

    #[test]
    fn test_compound_operators() {
        let tokens = kinds(":= >= <= <> .. : > < = .");
        assert_eq!(
            tokens,
            vec![
                Token::Assign,
                Token::Ge,
                Token::Le,
                Token::Ne,
                Token::DotDot,
                Token::Colon,
                Token::Gt,
                Token::Lt,
                Token::Eq,
                Token::Dot,
            ]
        );
    }

    #[test]
    fn test_lexer_is_restartable() {
        let source = "begin x end";
        let first: Vec<_> = Lexer::new(source).filter_map(|t| t.ok()).collect();
        let second: Vec<_> = Lexer::new(source).filter_map(|t| t.ok()).collect();
        assert_eq!(first.len(), 3);
        assert_eq!(
            first.iter().map(|t| &t.token).collect::<Vec<_>>(),
            second.iter().map(|t| &t.token).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_block_comment_spanning_lines() {
        let (tokens, errors) = tokenize("i := 1; (* note\n  more * ) \n *) i := 2\nj");
        assert!(errors.is_empty());
        let kinds: Vec<_> = tokens.iter().map(|t| t.token.kind()).collect();
        assert_eq!(kinds, vec!["ID", "ASSIGN", "NUM", ";", "ID", "ASSIGN", "NUM", "ID"]);
        assert_eq!(tokens[4].line, 3);
        assert_eq!(tokens[7].line, 4);
    }

    #[test]
    fn test_unterminated_comment_is_error() {
        let (tokens, errors) = tokenize("a (* never closed\nb");
        assert_eq!(tokens.len(), 1);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].is_error());
        assert_eq!(errors[0].to_string(), "Line 1: Error: Unterminated comment");

        let (_, errors) = tokenize("a { open");
        assert!(errors[0].is_error());
    }

    #[test]
    fn test_integer_overflow_is_error() {
        let (tokens, errors) = tokenize("99999999999999999999 - 3");
        assert_eq!(tokens.len(), 2);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].is_error());
        assert_eq!(
            errors[0].message,
            "Integer literal '99999999999999999999' is out of range"
        );
        assert_eq!(kinds("9223372036854775807"), vec![Token::Integer(i64::MAX)]);
    }

    #[test]
    fn test_multiline_string_advances_line() {
        let (tokens, _) = tokenize("'a\nb' x\ny");
        assert_eq!(tokens[0].token, Token::String("a\nb".into()));
        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[1].line, 2);
        assert_eq!(tokens[2].line, 3);
    }
}
