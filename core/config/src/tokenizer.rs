//! A small hand-rolled scanner over Proguard-syntax rule text.
//!
//! The teacher has no text-grammar parser to imitate (its parsers are all
//! binary `winnow` combinators over bytes); rule text is not byte-oriented,
//! so this is a manual line/char scanner instead, structured the same way
//! the teacher structures its binary parsers — one `next_token`-shaped
//! function walking a cursor, no external parser-combinator dependency.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A bare word: an option name, identifier, pattern, or number.
    Word(String),
    LBrace,
    RBrace,
    LParen,
    RParen,
    Semicolon,
    Comma,
    Not,
    Ellipsis,
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pos {
    pub line: usize,
    pub column: usize,
}

pub struct Tokenizer<'a> {
    src: &'a str,
    chars: std::str::CharIndices<'a>,
    peeked: Option<(usize, char)>,
    line: usize,
    column: usize,
    pub last_pos: Pos,
}

impl<'a> Tokenizer<'a> {
    pub fn new(src: &'a str) -> Self {
        Tokenizer {
            src,
            chars: src.char_indices(),
            peeked: None,
            line: 1,
            column: 1,
            last_pos: Pos { line: 1, column: 1 },
        }
    }

    fn bump(&mut self) -> Option<(usize, char)> {
        let next = self.peeked.take().or_else(|| self.chars.next());
        if let Some((_, c)) = next {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        next
    }

    fn peek(&mut self) -> Option<(usize, char)> {
        if self.peeked.is_none() {
            self.peeked = self.chars.next();
        }
        self.peeked
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some((_, c)) if c.is_whitespace() => {
                    self.bump();
                }
                Some((_, '#')) => {
                    while let Some((_, c)) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                _ => break,
            }
        }
    }

    /// The 1-indexed (line, column) of the token most recently returned.
    pub fn pos(&self) -> Pos {
        self.last_pos
    }

    /// The source line containing `pos`, for error snippets.
    pub fn line_text(&self, line: usize) -> &'a str {
        self.src.lines().nth(line - 1).unwrap_or("")
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_trivia();
        self.last_pos = Pos { line: self.line, column: self.column };
        let Some((_, c)) = self.bump() else {
            return Token::Eof;
        };
        match c {
            '{' => Token::LBrace,
            '}' => Token::RBrace,
            '(' => Token::LParen,
            ')' => Token::RParen,
            ';' => Token::Semicolon,
            ',' => Token::Comma,
            '!' => Token::Not,
            '.' if self.peek().map(|(_, c)| c) == Some('.') => {
                self.bump();
                if self.peek().map(|(_, c)| c) == Some('.') {
                    self.bump();
                }
                Token::Ellipsis
            }
            _ => {
                let mut word = String::new();
                word.push(c);
                while let Some((_, c)) = self.peek() {
                    if c.is_whitespace() || "{}(),;!".contains(c) {
                        break;
                    }
                    word.push(c);
                    self.bump();
                }
                Token::Word(word)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_comments_and_whitespace() {
        let mut t = Tokenizer::new("# a comment\n-keep class Foo {\n  *;\n}");
        assert_eq!(t.next_token(), Token::Word("-keep".into()));
        assert_eq!(t.next_token(), Token::Word("class".into()));
        assert_eq!(t.next_token(), Token::Word("Foo".into()));
        assert_eq!(t.next_token(), Token::LBrace);
        assert_eq!(t.next_token(), Token::Word("*".into()));
        assert_eq!(t.next_token(), Token::Semicolon);
        assert_eq!(t.next_token(), Token::RBrace);
        assert_eq!(t.next_token(), Token::Eof);
    }
}
