/// All lexemes of the kernel sub-language (a Python-style function subset).
#[derive(Clone, Debug, PartialEq)]
pub enum Lexeme {
    // Keywords
    Def,
    Return,
    Pass,
    If,
    Elif,
    Else,
    While,
    For,
    In,
    And,
    Or,
    Not,
    True,
    False,
    None,

    // Symbols
    LParen,      // (
    RParen,      // )
    LBracket,    // [
    RBracket,    // ]
    Comma,       // ,
    Colon,       // :
    Semicolon,   // ;
    Dot,         // .
    Arrow,       // ->
    At,          // @
    Eq,          // =
    EqEq,        // ==
    NotEq,       // !=
    Lt,          // <
    LtEq,        // <=
    Gt,          // >
    GtEq,        // >=
    Plus,        // +
    Minus,       // -
    Star,        // *
    StarStar,    // **
    Slash,       // /
    SlashSlash,  // //
    Percent,     // %
    PlusEq,      // +=
    MinusEq,     // -=
    StarEq,      // *=
    SlashEq,     // /=

    // Literals
    Integer(i64),
    Float(f64),
    Str(String),
    Ident(String),

    // Layout
    Newline,
    Indent,
    Dedent,

    // End of file
    Eof,
}

impl Lexeme {
    /// Try to match an identifier string to a keyword lexeme.
    pub fn from_keyword(s: &str) -> Option<Lexeme> {
        match s {
            "def" => Some(Lexeme::Def),
            "return" => Some(Lexeme::Return),
            "pass" => Some(Lexeme::Pass),
            "if" => Some(Lexeme::If),
            "elif" => Some(Lexeme::Elif),
            "else" => Some(Lexeme::Else),
            "while" => Some(Lexeme::While),
            "for" => Some(Lexeme::For),
            "in" => Some(Lexeme::In),
            "and" => Some(Lexeme::And),
            "or" => Some(Lexeme::Or),
            "not" => Some(Lexeme::Not),
            "True" => Some(Lexeme::True),
            "False" => Some(Lexeme::False),
            "None" => Some(Lexeme::None),
            _ => None,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Lexeme::Def => "'def'",
            Lexeme::Return => "'return'",
            Lexeme::Pass => "'pass'",
            Lexeme::If => "'if'",
            Lexeme::Elif => "'elif'",
            Lexeme::Else => "'else'",
            Lexeme::While => "'while'",
            Lexeme::For => "'for'",
            Lexeme::In => "'in'",
            Lexeme::And => "'and'",
            Lexeme::Or => "'or'",
            Lexeme::Not => "'not'",
            Lexeme::True => "'True'",
            Lexeme::False => "'False'",
            Lexeme::None => "'None'",
            Lexeme::LParen => "'('",
            Lexeme::RParen => "')'",
            Lexeme::LBracket => "'['",
            Lexeme::RBracket => "']'",
            Lexeme::Comma => "','",
            Lexeme::Colon => "':'",
            Lexeme::Semicolon => "';'",
            Lexeme::Dot => "'.'",
            Lexeme::Arrow => "'->'",
            Lexeme::At => "'@'",
            Lexeme::Eq => "'='",
            Lexeme::EqEq => "'=='",
            Lexeme::NotEq => "'!='",
            Lexeme::Lt => "'<'",
            Lexeme::LtEq => "'<='",
            Lexeme::Gt => "'>'",
            Lexeme::GtEq => "'>='",
            Lexeme::Plus => "'+'",
            Lexeme::Minus => "'-'",
            Lexeme::Star => "'*'",
            Lexeme::StarStar => "'**'",
            Lexeme::Slash => "'/'",
            Lexeme::SlashSlash => "'//'",
            Lexeme::Percent => "'%'",
            Lexeme::PlusEq => "'+='",
            Lexeme::MinusEq => "'-='",
            Lexeme::StarEq => "'*='",
            Lexeme::SlashEq => "'/='",
            Lexeme::Integer(_) => "integer literal",
            Lexeme::Float(_) => "float literal",
            Lexeme::Str(_) => "string literal",
            Lexeme::Ident(_) => "identifier",
            Lexeme::Newline => "end of line",
            Lexeme::Indent => "indentation",
            Lexeme::Dedent => "dedent",
            Lexeme::Eof => "end of file",
        }
    }
}
