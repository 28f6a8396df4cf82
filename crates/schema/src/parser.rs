//! Recursive-descent parser for ASN.1 modules.
//!
//! ## Supported Syntax
//!
//! ```text
//! module     = ModuleRef oid? DEFINITIONS tagdefault? (EXTENSIBILITY IMPLIED)? ::= BEGIN body END
//! tagdefault = (EXPLICIT | IMPLICIT | AUTOMATIC) TAGS
//! body       = exports? imports? assignment*
//! assignment = TypeRef ::= type | valueref type ::= value
//! type       = tag* builtin constraint*
//! tag        = "[" (UNIVERSAL | APPLICATION | PRIVATE)? number "]" (IMPLICIT | EXPLICIT)?
//! ```
//!
//! Value assignments and constraints are consumed without being modelled.
//! After a syntax error the parser skips ahead to the next assignment, so
//! one file can report several problems.

use crate::lexer::{Spanned, Token};
use crate::model::{
	AsnType, CharacterString, Component, Import, Module, NamedNumber, Presence, TagClass, TagDefault, TagMode, TagSpec, TypeAssignment, TypeKind,
};

/// Type references that name constructs outside the supported subset.
const UNSUPPORTED: &[&str] = &["CLASS", "INSTANCE", "EMBEDDED", "CHARACTER", "TYPE-IDENTIFIER", "ABSTRACT-SYNTAX"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SyntaxError {
	pub line: usize,
	pub column: usize,
	pub message: String,
}

type PResult<T> = Result<T, SyntaxError>;

struct Parser<'a> {
	tokens: &'a [Spanned],
	pos: usize,
	errors: Vec<SyntaxError>,
}

fn is_upper(word: &str) -> bool {
	word.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}

impl<'a> Parser<'a> {
	fn peek(&self) -> Option<&'a Token> {
		self.peek_at(0)
	}

	fn peek_at(&self, n: usize) -> Option<&'a Token> {
		self.tokens.get(self.pos + n).map(|t| &t.token)
	}

	fn at_end(&self) -> bool {
		self.pos >= self.tokens.len()
	}

	fn next(&mut self) -> Option<&'a Token> {
		let token = self.peek()?;
		self.pos += 1;
		Some(token)
	}

	fn line(&self) -> usize {
		self.tokens.get(self.pos).or(self.tokens.last()).map_or(1, |t| t.line)
	}

	fn error_at(&self, index: usize, message: String) -> SyntaxError {
		match self.tokens.get(index).or(self.tokens.last()) {
			Some(t) => SyntaxError {
				line: t.line,
				column: t.column,
				message,
			},
			None => SyntaxError {
				line: 1,
				column: 1,
				message,
			},
		}
	}

	fn unexpected(&self, expected: &str) -> SyntaxError {
		let found = match self.peek() {
			Some(token) => format!("`{token}`"),
			None => "end of input".to_string(),
		};
		self.error_at(self.pos, format!("expected {expected}, found {found}"))
	}

	fn eat(&mut self, token: &Token) -> bool {
		if self.peek() == Some(token) {
			self.pos += 1;
			true
		} else {
			false
		}
	}

	fn eat_keyword(&mut self, word: &str) -> bool {
		if self.peek().is_some_and(|t| t.is_ident(word)) {
			self.pos += 1;
			true
		} else {
			false
		}
	}

	fn expect(&mut self, token: &Token) -> PResult<()> {
		if self.eat(token) { Ok(()) } else { Err(self.unexpected(&format!("`{token}`"))) }
	}

	fn expect_keyword(&mut self, word: &str) -> PResult<()> {
		if self.eat_keyword(word) { Ok(()) } else { Err(self.unexpected(&format!("`{word}`"))) }
	}

	fn ident(&mut self) -> PResult<String> {
		match self.peek() {
			Some(Token::Ident(word)) => {
				self.pos += 1;
				Ok(word.clone())
			}
			_ => Err(self.unexpected("an identifier")),
		}
	}

	fn type_reference(&mut self) -> PResult<String> {
		match self.peek() {
			Some(Token::Ident(word)) if is_upper(word) => {
				self.pos += 1;
				Ok(word.clone())
			}
			_ => Err(self.unexpected("a module or type reference")),
		}
	}

	/// Whether an assignment can start at token `index`.
	fn is_sync_point(&self, index: usize) -> bool {
		let at = |n: usize| self.tokens.get(index + n).map(|t| &t.token);
		match at(0) {
			Some(Token::Ident(word)) if word == "END" => true,
			Some(Token::Ident(word)) => {
				if at(1) == Some(&Token::Assign) {
					return true;
				}
				!is_upper(word)
					&& matches!(at(1), Some(Token::Ident(ty)) if is_upper(ty))
					&& (at(2) == Some(&Token::Assign) || at(3) == Some(&Token::Assign))
			}
			_ => false,
		}
	}

	/// Skips to the next assignment after a failed one that started at `start`.
	fn recover(&mut self, start: usize) {
		if self.pos == start {
			self.pos += 1;
		}
		while !self.at_end() && !self.is_sync_point(self.pos) {
			self.pos += 1;
		}
	}

	/// Skips one bracketed group starting at the current opener, returning its text.
	fn skip_group(&mut self) -> PResult<String> {
		let start = self.pos;
		let mut depth = 0usize;
		loop {
			let Some(token) = self.next() else {
				return Err(self.error_at(start, "unbalanced brackets".to_string()));
			};
			match token {
				Token::LBrace | Token::LParen | Token::LBracket | Token::LVersion => depth += 1,
				Token::RBrace | Token::RParen | Token::RBracket | Token::RVersion => depth = depth.saturating_sub(1),
				_ => {}
			}
			if depth == 0 {
				break;
			}
		}
		Ok(self.text(start))
	}

	fn text(&self, start: usize) -> String {
		self.tokens[start..self.pos]
			.iter()
			.map(|t| t.token.to_string())
			.collect::<Vec<_>>()
			.join(" ")
	}

	/// Consumes a value without interpreting it and returns its source text.
	fn skip_value(&mut self) -> PResult<String> {
		let start = self.pos;
		self.value_atom()?;
		while matches!(self.peek(), Some(Token::Colon | Token::Dot)) {
			self.pos += 1;
			self.value_atom()?;
		}
		Ok(self.text(start))
	}

	fn value_atom(&mut self) -> PResult<()> {
		match self.peek() {
			Some(Token::LBrace) => self.skip_group().map(|_| ()),
			Some(Token::Ident(_) | Token::Number(_) | Token::CString(_) | Token::BitString(_)) => {
				self.pos += 1;
				Ok(())
			}
			_ => Err(self.unexpected("a value")),
		}
	}

	fn module(&mut self) -> PResult<Module> {
		let mut module = Module::new(self.type_reference()?);
		if self.peek() == Some(&Token::LBrace) {
			self.skip_group()?;
		}
		self.expect_keyword("DEFINITIONS")?;

		let tag_default = if self.eat_keyword("EXPLICIT") {
			Some(TagDefault::Explicit)
		} else if self.eat_keyword("IMPLICIT") {
			Some(TagDefault::Implicit)
		} else if self.eat_keyword("AUTOMATIC") {
			Some(TagDefault::Automatic)
		} else {
			None
		};
		if let Some(tag_default) = tag_default {
			self.expect_keyword("TAGS")?;
			module.tag_default = tag_default;
		}
		if self.eat_keyword("EXTENSIBILITY") {
			self.expect_keyword("IMPLIED")?;
			module.extensibility_implied = true;
		}
		self.expect(&Token::Assign)?;
		self.expect_keyword("BEGIN")?;

		if self.eat_keyword("EXPORTS") {
			while !self.eat(&Token::Semicolon) {
				if self.next().is_none() {
					return Err(self.unexpected("`;` after EXPORTS"));
				}
			}
		}
		if self.eat_keyword("IMPORTS") {
			module.imports = self.imports()?;
		}

		loop {
			if self.at_end() {
				return Err(self.unexpected("`END`"));
			}
			if self.eat_keyword("END") {
				return Ok(module);
			}
			let start = self.pos;
			if let Err(e) = self.assignment(&mut module) {
				self.errors.push(e);
				self.recover(start);
			}
		}
	}

	fn imports(&mut self) -> PResult<Vec<Import>> {
		let mut imports = Vec::new();
		while !self.eat(&Token::Semicolon) {
			let mut symbols = Vec::new();
			loop {
				symbols.push(self.ident()?);
				if self.peek() == Some(&Token::LBrace) && self.peek_at(1) == Some(&Token::RBrace) {
					self.pos += 2;
				}
				if !self.eat(&Token::Comma) {
					break;
				}
			}
			self.expect_keyword("FROM")?;
			let module = self.type_reference()?;
			if self.peek() == Some(&Token::LBrace) {
				self.skip_group()?;
			}
			imports.push(Import { module, symbols });
		}
		Ok(imports)
	}

	fn assignment(&mut self, module: &mut Module) -> PResult<()> {
		let line = self.line();
		let name = self.ident()?;

		if is_upper(&name) && self.peek() == Some(&Token::Assign) {
			self.pos += 1;
			let ty = self.parse_type()?;
			module.types.push(TypeAssignment { name, ty, line });
			return Ok(());
		}

		// Value, object and object set assignments: `name Type ::= value`.
		while !self.eat(&Token::Assign) {
			match self.peek() {
				None => return Err(self.unexpected("`::=`")),
				Some(Token::LBrace | Token::LParen) => {
					self.skip_group()?;
				}
				Some(_) => self.pos += 1,
			}
		}
		self.skip_value()?;
		Ok(())
	}

	fn parse_type(&mut self) -> PResult<AsnType> {
		let mut tags = Vec::new();
		while self.peek() == Some(&Token::LBracket) {
			tags.push(self.tag()?);
		}
		let kind = self.type_kind()?;
		while self.peek() == Some(&Token::LParen) {
			self.skip_group()?;
		}
		Ok(AsnType { tags, kind })
	}

	fn tag(&mut self) -> PResult<TagSpec> {
		self.expect(&Token::LBracket)?;
		let class = if self.eat_keyword("UNIVERSAL") {
			TagClass::Universal
		} else if self.eat_keyword("APPLICATION") {
			TagClass::Application
		} else if self.eat_keyword("PRIVATE") {
			TagClass::Private
		} else {
			TagClass::Context
		};

		let number = match self.peek() {
			Some(Token::Number(n)) => n
				.parse::<u32>()
				.map_err(|_| self.error_at(self.pos, format!("invalid tag number `{n}`")))?,
			_ => return Err(self.unexpected("a literal tag number")),
		};
		self.pos += 1;
		self.expect(&Token::RBracket)?;

		let mode = if self.eat_keyword("IMPLICIT") {
			Some(TagMode::Implicit)
		} else if self.eat_keyword("EXPLICIT") {
			Some(TagMode::Explicit)
		} else {
			None
		};
		Ok(TagSpec { class, number, mode })
	}

	fn type_kind(&mut self) -> PResult<TypeKind> {
		let start = self.pos;
		let word = match self.peek() {
			Some(Token::Ident(word)) if word != "END" => word.as_str(),
			_ => return Err(self.unexpected("a type")),
		};
		self.pos += 1;

		if let Some(kind) = CharacterString::from_keyword(word) {
			return Ok(TypeKind::CharacterString(kind));
		}

		Ok(match word {
			"BOOLEAN" => TypeKind::Boolean,
			"NULL" => TypeKind::Null,
			"REAL" => TypeKind::Real,
			"RELATIVE-OID" => TypeKind::RelativeOid,
			"UTCTime" => TypeKind::UtcTime,
			"GeneralizedTime" => TypeKind::GeneralizedTime,
			"INTEGER" => {
				let named = if self.peek() == Some(&Token::LBrace) { self.named_numbers()? } else { Vec::new() };
				TypeKind::Integer(named)
			}
			"ENUMERATED" => TypeKind::Enumerated(self.enumeration()?),
			"BIT" => {
				self.expect_keyword("STRING")?;
				if self.peek() == Some(&Token::LBrace) {
					self.skip_group()?;
				}
				TypeKind::BitString
			}
			"OCTET" => {
				self.expect_keyword("STRING")?;
				TypeKind::OctetString
			}
			"OBJECT" => {
				self.expect_keyword("IDENTIFIER")?;
				TypeKind::ObjectIdentifier
			}
			"ANY" => {
				if self.eat_keyword("DEFINED") {
					self.expect_keyword("BY")?;
					self.ident()?;
				}
				TypeKind::Any
			}
			"SEQUENCE" => self.structured(true)?,
			"SET" => self.structured(false)?,
			"CHOICE" => TypeKind::Choice(self.components(false)?),
			w if UNSUPPORTED.contains(&w) => {
				return Err(self.error_at(start, format!("unsupported ASN.1 construct `{w}`")));
			}
			w if is_upper(w) => {
				if self.peek() == Some(&Token::LBrace) {
					return Err(self.error_at(start, format!("parameterized type `{w}` is not supported")));
				}
				if self.eat(&Token::Dot) {
					let name = self.type_reference()?;
					TypeKind::Reference {
						module: Some(w.to_string()),
						name,
					}
				} else {
					TypeKind::Reference {
						module: None,
						name: w.to_string(),
					}
				}
			}
			w => return Err(self.error_at(start, format!("expected a type, found `{w}`"))),
		})
	}

	/// `SEQUENCE { ... }`, `SEQUENCE OF T` and the SET equivalents.
	fn structured(&mut self, sequence: bool) -> PResult<TypeKind> {
		if self.peek() == Some(&Token::LBrace) {
			let components = self.components(true)?;
			return Ok(if sequence { TypeKind::Sequence(components) } else { TypeKind::Set(components) });
		}

		if self.eat_keyword("SIZE") || self.peek() == Some(&Token::LParen) {
			self.skip_group()?;
		}
		self.expect_keyword("OF")?;
		if let Some(Token::Ident(word)) = self.peek()
			&& !is_upper(word)
		{
			self.pos += 1;
		}
		let element = Box::new(self.parse_type()?);
		Ok(if sequence { TypeKind::SequenceOf(element) } else { TypeKind::SetOf(element) })
	}

	fn components(&mut self, with_presence: bool) -> PResult<Vec<Component>> {
		self.expect(&Token::LBrace)?;
		let mut out = Vec::new();
		if self.eat(&Token::RBrace) {
			return Ok(out);
		}
		loop {
			self.component(&mut out, with_presence)?;
			if !self.eat(&Token::Comma) {
				break;
			}
		}
		self.expect(&Token::RBrace)?;
		Ok(out)
	}

	fn component(&mut self, out: &mut Vec<Component>, with_presence: bool) -> PResult<()> {
		if self.eat(&Token::Ellipsis) {
			if self.eat(&Token::Bang) {
				self.skip_value()?;
			}
			return Ok(());
		}

		if self.eat(&Token::LVersion) {
			if matches!(self.peek(), Some(Token::Number(_))) && self.peek_at(1) == Some(&Token::Colon) {
				self.pos += 2;
			}
			loop {
				self.component(out, with_presence)?;
				if !self.eat(&Token::Comma) {
					break;
				}
			}
			return self.expect(&Token::RVersion);
		}

		if self.peek().is_some_and(|t| t.is_ident("COMPONENTS")) {
			return Err(self.error_at(self.pos, "unsupported ASN.1 construct `COMPONENTS OF`".to_string()));
		}

		let name = self.ident()?;
		let ty = self.parse_type()?;
		let mut presence = Presence::Required;
		if with_presence {
			if self.eat_keyword("OPTIONAL") {
				presence = Presence::Optional;
			} else if self.eat_keyword("DEFAULT") {
				presence = Presence::Default(self.skip_value()?);
			}
		}
		out.push(Component { name, ty, presence });
		Ok(())
	}

	fn number(&mut self) -> PResult<i64> {
		match self.peek() {
			Some(Token::Number(n)) => {
				let value = n
					.parse::<i64>()
					.map_err(|_| self.error_at(self.pos, format!("invalid number `{n}`")))?;
				self.pos += 1;
				Ok(value)
			}
			_ => Err(self.unexpected("a number")),
		}
	}

	fn named_numbers(&mut self) -> PResult<Vec<NamedNumber>> {
		self.expect(&Token::LBrace)?;
		let mut out = Vec::new();
		loop {
			if !self.eat(&Token::Ellipsis) {
				let name = self.ident()?;
				self.expect(&Token::LParen)?;
				let value = self.number()?;
				self.expect(&Token::RParen)?;
				out.push(NamedNumber { name, value });
			}
			if !self.eat(&Token::Comma) {
				break;
			}
		}
		self.expect(&Token::RBrace)?;
		Ok(out)
	}

	/// Parses enumeration items, numbering unnumbered ones with the lowest free value.
	fn enumeration(&mut self) -> PResult<Vec<NamedNumber>> {
		self.expect(&Token::LBrace)?;
		let mut items: Vec<(String, Option<i64>)> = Vec::new();
		loop {
			if self.eat(&Token::Ellipsis) {
				if self.eat(&Token::Bang) {
					self.skip_value()?;
				}
			} else {
				let name = self.ident()?;
				let value = if self.eat(&Token::LParen) {
					let value = self.number()?;
					self.expect(&Token::RParen)?;
					Some(value)
				} else {
					None
				};
				items.push((name, value));
			}
			if !self.eat(&Token::Comma) {
				break;
			}
		}
		self.expect(&Token::RBrace)?;

		let mut used: Vec<i64> = items.iter().filter_map(|(_, v)| *v).collect();
		let mut out = Vec::with_capacity(items.len());
		for (name, value) in items {
			let value = match value {
				Some(value) => value,
				None => {
					let mut next = 0;
					while used.contains(&next) {
						next += 1;
					}
					used.push(next);
					next
				}
			};
			out.push(NamedNumber { name, value });
		}
		Ok(out)
	}
}

/// Parses every module in a token stream.
///
/// Returns the modules that parsed completely and every syntax error found.
pub(crate) fn parse_modules(tokens: &[Spanned]) -> (Vec<Module>, Vec<SyntaxError>) {
	let mut parser = Parser {
		tokens,
		pos: 0,
		errors: Vec::new(),
	};
	let mut modules = Vec::new();

	while !parser.at_end() {
		let before = parser.errors.len();
		match parser.module() {
			Ok(module) if parser.errors.len() == before => modules.push(module),
			Ok(_) => {}
			Err(e) => {
				parser.errors.push(e);
				break;
			}
		}
	}

	if modules.is_empty() && parser.errors.is_empty() {
		parser.errors.push(SyntaxError {
			line: 1,
			column: 1,
			message: "no module definition found".to_string(),
		});
	}

	(modules, parser.errors)
}
