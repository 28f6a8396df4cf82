//! Tokenizer for ASN.1 module text.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
	/// Identifier, type reference or keyword.
	Ident(String),
	/// Integer or real literal, including a leading minus sign.
	Number(String),
	/// `"..."` with doubled quotes unescaped.
	CString(String),
	/// `'...'B` or `'...'H`, kept verbatim.
	BitString(String),
	Assign,
	LBrace,
	RBrace,
	LParen,
	RParen,
	LBracket,
	RBracket,
	LVersion,
	RVersion,
	Comma,
	Semicolon,
	Colon,
	Dot,
	Range,
	Ellipsis,
	Pipe,
	Lt,
	Gt,
	At,
	Bang,
	Caret,
	Ampersand,
}

impl Token {
	pub(crate) fn is_ident(&self, word: &str) -> bool {
		matches!(self, Token::Ident(w) if w == word)
	}
}

impl fmt::Display for Token {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Token::Ident(w) | Token::Number(w) => f.write_str(w),
			Token::CString(s) => write!(f, "\"{s}\""),
			Token::BitString(s) => f.write_str(s),
			Token::Assign => f.write_str("::="),
			Token::LBrace => f.write_str("{"),
			Token::RBrace => f.write_str("}"),
			Token::LParen => f.write_str("("),
			Token::RParen => f.write_str(")"),
			Token::LBracket => f.write_str("["),
			Token::RBracket => f.write_str("]"),
			Token::LVersion => f.write_str("[["),
			Token::RVersion => f.write_str("]]"),
			Token::Comma => f.write_str(","),
			Token::Semicolon => f.write_str(";"),
			Token::Colon => f.write_str(":"),
			Token::Dot => f.write_str("."),
			Token::Range => f.write_str(".."),
			Token::Ellipsis => f.write_str("..."),
			Token::Pipe => f.write_str("|"),
			Token::Lt => f.write_str("<"),
			Token::Gt => f.write_str(">"),
			Token::At => f.write_str("@"),
			Token::Bang => f.write_str("!"),
			Token::Caret => f.write_str("^"),
			Token::Ampersand => f.write_str("&"),
		}
	}
}

/// A token with its 1-based source position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Spanned {
	pub token: Token,
	pub line: usize,
	pub column: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LexError {
	pub line: usize,
	pub column: usize,
	pub message: String,
}

struct Lexer {
	chars: Vec<char>,
	pos: usize,
	line: usize,
	column: usize,
}

impl Lexer {
	fn peek(&self) -> Option<char> {
		self.chars.get(self.pos).copied()
	}

	fn peek_at(&self, n: usize) -> Option<char> {
		self.chars.get(self.pos + n).copied()
	}

	fn bump(&mut self) -> Option<char> {
		let ch = self.peek()?;
		self.pos += 1;
		if ch == '\n' {
			self.line += 1;
			self.column = 1;
		} else {
			self.column += 1;
		}
		Some(ch)
	}

	fn starts_with(&self, s: &str) -> bool {
		s.chars().enumerate().all(|(i, c)| self.peek_at(i) == Some(c))
	}

	fn bump_n(&mut self, n: usize) {
		for _ in 0..n {
			self.bump();
		}
	}

	/// Skips a `--` comment; it ends at the next `--` or at end of line.
	fn skip_line_comment(&mut self) {
		self.bump_n(2);
		while let Some(ch) = self.peek() {
			if ch == '\n' {
				return;
			}
			if self.starts_with("--") {
				self.bump_n(2);
				return;
			}
			self.bump();
		}
	}

	fn skip_block_comment(&mut self) -> Result<(), String> {
		self.bump_n(2);
		let mut depth = 1usize;
		while depth > 0 {
			if self.starts_with("/*") {
				self.bump_n(2);
				depth += 1;
			} else if self.starts_with("*/") {
				self.bump_n(2);
				depth -= 1;
			} else if self.bump().is_none() {
				return Err("unterminated block comment".to_string());
			}
		}
		Ok(())
	}

	fn identifier(&mut self) -> String {
		let mut word = String::new();
		while let Some(ch) = self.peek() {
			if ch.is_ascii_alphanumeric() {
				word.push(ch);
				self.bump();
			} else if ch == '-' && self.peek_at(1).is_some_and(|c| c.is_ascii_alphanumeric()) {
				word.push(ch);
				self.bump();
			} else {
				break;
			}
		}
		word
	}

	fn number(&mut self) -> String {
		let mut text = String::new();
		if self.peek() == Some('-') {
			text.push('-');
			self.bump();
		}
		while let Some(ch) = self.peek().filter(char::is_ascii_digit) {
			text.push(ch);
			self.bump();
		}
		if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
			text.push('.');
			self.bump();
			while let Some(ch) = self.peek().filter(char::is_ascii_digit) {
				text.push(ch);
				self.bump();
			}
		}
		text
	}

	fn cstring(&mut self) -> Result<String, String> {
		self.bump();
		let mut text = String::new();
		loop {
			match self.bump() {
				None => return Err("unterminated character string".to_string()),
				Some('"') if self.peek() == Some('"') => {
					self.bump();
					text.push('"');
				}
				Some('"') => return Ok(text),
				Some(ch) => text.push(ch),
			}
		}
	}

	fn bstring(&mut self) -> Result<String, String> {
		self.bump();
		let mut text = String::from("'");
		loop {
			match self.bump() {
				None => return Err("unterminated bit or hex string".to_string()),
				Some('\'') => break,
				Some(ch) if ch.is_whitespace() => {}
				Some(ch) => text.push(ch),
			}
		}
		text.push('\'');
		match self.bump() {
			Some(radix @ ('B' | 'H')) => {
				text.push(radix);
				Ok(text)
			}
			_ => Err("bit or hex string must end in 'B or 'H".to_string()),
		}
	}

	fn punct(&mut self) -> Option<Token> {
		let (token, len) = if self.starts_with("::=") {
			(Token::Assign, 3)
		} else if self.starts_with("...") {
			(Token::Ellipsis, 3)
		} else if self.starts_with("..") {
			(Token::Range, 2)
		} else if self.starts_with("[[") {
			(Token::LVersion, 2)
		} else if self.starts_with("]]") {
			(Token::RVersion, 2)
		} else {
			let token = match self.peek()? {
				'{' => Token::LBrace,
				'}' => Token::RBrace,
				'(' => Token::LParen,
				')' => Token::RParen,
				'[' => Token::LBracket,
				']' => Token::RBracket,
				',' => Token::Comma,
				';' => Token::Semicolon,
				':' => Token::Colon,
				'.' => Token::Dot,
				'|' => Token::Pipe,
				'<' => Token::Lt,
				'>' => Token::Gt,
				'@' => Token::At,
				'!' => Token::Bang,
				'^' => Token::Caret,
				'&' => Token::Ampersand,
				_ => return None,
			};
			(token, 1)
		};
		self.bump_n(len);
		Some(token)
	}
}

/// Splits `text` into tokens, collecting every lexical error.
pub(crate) fn tokenize(text: &str) -> (Vec<Spanned>, Vec<LexError>) {
	let mut lexer = Lexer {
		chars: text.chars().collect(),
		pos: 0,
		line: 1,
		column: 1,
	};
	let mut tokens = Vec::new();
	let mut errors = Vec::new();

	while let Some(ch) = lexer.peek() {
		let (line, column) = (lexer.line, lexer.column);
		let result = if ch.is_whitespace() {
			lexer.bump();
			continue;
		} else if lexer.starts_with("--") {
			lexer.skip_line_comment();
			continue;
		} else if lexer.starts_with("/*") {
			lexer.skip_block_comment().map(|()| None)
		} else if ch.is_ascii_alphabetic() {
			Ok(Some(Token::Ident(lexer.identifier())))
		} else if ch.is_ascii_digit() || (ch == '-' && lexer.peek_at(1).is_some_and(|c| c.is_ascii_digit())) {
			Ok(Some(Token::Number(lexer.number())))
		} else if ch == '"' {
			lexer.cstring().map(|s| Some(Token::CString(s)))
		} else if ch == '\'' {
			lexer.bstring().map(|s| Some(Token::BitString(s)))
		} else if let Some(token) = lexer.punct() {
			Ok(Some(token))
		} else {
			lexer.bump();
			Err(format!("unexpected character '{ch}'"))
		};

		match result {
			Ok(Some(token)) => tokens.push(Spanned { token, line, column }),
			Ok(None) => {}
			Err(message) => errors.push(LexError { line, column, message }),
		}
	}

	(tokens, errors)
}
