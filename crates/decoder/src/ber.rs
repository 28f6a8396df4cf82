//! BER type-length-value reading.
//!
//! Implements the identifier and length octet rules of X.690, including high
//! tag numbers and the indefinite length form. Contents are borrowed from the
//! input; nothing is copied until a primitive value is interpreted.

use crate::descriptor::{Tag, TagClass};
use crate::error::{DecodeError, Result};

/// Maximum nesting depth accepted while scanning indefinite-length values.
pub const MAX_DEPTH: usize = 64;

/// One encoded value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tlv<'a> {
	pub tag: Tag,
	pub constructed: bool,
	/// Content octets, without the end-of-contents marker.
	pub contents: &'a [u8],
	/// The complete encoding, identifier through end-of-contents.
	pub raw: &'a [u8],
}

impl<'a> Tlv<'a> {
	/// Reader over the nested values of a constructed encoding.
	pub fn children(&self) -> BerReader<'a> {
		BerReader::new(self.contents)
	}

	/// Parses the contents as exactly one nested value.
	pub fn single_child(&self) -> Result<Tlv<'a>> {
		if !self.constructed {
			return Err(DecodeError::ExpectedConstructed(self.tag));
		}
		let mut children = self.children();
		let child = children.read_tlv()?.ok_or(DecodeError::UnexpectedEnd)?;
		if !children.is_empty() {
			return Err(DecodeError::TrailingData {
				remaining: children.remaining(),
			});
		}
		Ok(child)
	}
}

/// Sequential reader over concatenated encodings.
#[derive(Debug, Clone)]
pub struct BerReader<'a> {
	data: &'a [u8],
	pos: usize,
}

impl<'a> BerReader<'a> {
	pub fn new(data: &'a [u8]) -> Self {
		Self { data, pos: 0 }
	}

	pub fn is_empty(&self) -> bool {
		self.pos >= self.data.len()
	}

	pub fn remaining(&self) -> usize {
		self.data.len().saturating_sub(self.pos)
	}

	pub fn position(&self) -> usize {
		self.pos
	}

	/// Reads the next value, or `None` at the end of input.
	pub fn read_tlv(&mut self) -> Result<Option<Tlv<'a>>> {
		if self.is_empty() {
			return Ok(None);
		}
		let (tlv, next) = read_at(self.data, self.pos, 0)?;
		self.pos = next;
		Ok(Some(tlv))
	}

	/// Returns the next value without consuming it.
	pub fn peek_tlv(&self) -> Result<Option<Tlv<'a>>> {
		self.clone().read_tlv()
	}
}

impl<'a> Iterator for BerReader<'a> {
	type Item = Result<Tlv<'a>>;

	fn next(&mut self) -> Option<Self::Item> {
		match self.read_tlv() {
			Ok(Some(tlv)) => Some(Ok(tlv)),
			Ok(None) => None,
			Err(e) => {
				self.pos = self.data.len();
				Some(Err(e))
			}
		}
	}
}

fn byte_at(data: &[u8], pos: usize) -> Result<u8> {
	data.get(pos).copied().ok_or(DecodeError::UnexpectedEnd)
}

/// Reads one TLV starting at `start`; returns it and the offset after it.
fn read_at(data: &[u8], start: usize, depth: usize) -> Result<(Tlv<'_>, usize)> {
	if depth > MAX_DEPTH {
		return Err(DecodeError::TooDeep(MAX_DEPTH));
	}

	let mut pos = start;
	let first = byte_at(data, pos)?;
	pos += 1;

	let class = TagClass::from_bits(first >> 6);
	let constructed = first & 0x20 != 0;
	let mut number = u32::from(first & 0x1f);
	if number == 0x1f {
		number = 0;
		loop {
			let b = byte_at(data, pos)?;
			pos += 1;
			if number > (u32::MAX >> 7) {
				return Err(DecodeError::TagTooLarge);
			}
			number = (number << 7) | u32::from(b & 0x7f);
			if b & 0x80 == 0 {
				break;
			}
		}
	}
	let tag = Tag::new(class, number);

	let len_byte = byte_at(data, pos)?;
	pos += 1;

	if len_byte == 0x80 {
		if !constructed {
			return Err(DecodeError::IndefinitePrimitive(tag));
		}
		let contents_start = pos;
		loop {
			if byte_at(data, pos)? == 0 && byte_at(data, pos + 1)? == 0 {
				let contents = &data[contents_start..pos];
				let end = pos + 2;
				return Ok((
					Tlv {
						tag,
						constructed,
						contents,
						raw: &data[start..end],
					},
					end,
				));
			}
			let (_, next) = read_at(data, pos, depth + 1)?;
			pos = next;
		}
	}

	let length = if len_byte & 0x80 == 0 {
		usize::from(len_byte)
	} else {
		let count = usize::from(len_byte & 0x7f);
		if count == 0x7f || count > size_of::<usize>() {
			return Err(DecodeError::LengthTooLarge);
		}
		let mut length = 0usize;
		for _ in 0..count {
			length = (length << 8) | usize::from(byte_at(data, pos)?);
			pos += 1;
		}
		length
	};

	let end = pos.checked_add(length).ok_or(DecodeError::LengthTooLarge)?;
	if end > data.len() {
		return Err(DecodeError::Truncated {
			declared: length,
			available: data.len() - pos,
		});
	}

	Ok((
		Tlv {
			tag,
			constructed,
			contents: &data[pos..end],
			raw: &data[start..end],
		},
		end,
	))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_short_form_primitive() {
		let data = [0x02, 0x01, 0x05];
		let mut reader = BerReader::new(&data);
		let tlv = reader.read_tlv().unwrap().unwrap();
		assert_eq!(tlv.tag, Tag::INTEGER);
		assert!(!tlv.constructed);
		assert_eq!(tlv.contents, &[0x05]);
		assert!(reader.read_tlv().unwrap().is_none());
	}

	#[test]
	fn test_high_tag_number_and_long_length() {
		let mut data = vec![0x9f, 0x81, 0x00, 0x81, 0x80];
		data.extend(std::iter::repeat_n(0xaa, 0x80));
		let tlv = BerReader::new(&data).read_tlv().unwrap().unwrap();
		assert_eq!(tlv.tag, Tag::context(128));
		assert_eq!(tlv.contents.len(), 0x80);
	}

	#[test]
	fn test_indefinite_length_spans_nested_values() {
		// SEQUENCE (indefinite) { INTEGER 1, [0] (indefinite) { NULL } }
		let data = [0x30, 0x80, 0x02, 0x01, 0x01, 0xa0, 0x80, 0x05, 0x00, 0x00, 0x00, 0x00, 0x00, 0x04, 0x00];
		let mut reader = BerReader::new(&data);
		let seq = reader.read_tlv().unwrap().unwrap();
		assert_eq!(seq.tag, Tag::SEQUENCE);
		assert_eq!(seq.raw.len(), 13);

		let children: Vec<_> = seq.children().collect::<Result<_>>().unwrap();
		assert_eq!(children.len(), 2);
		assert_eq!(children[1].tag, Tag::context(0));
		assert_eq!(children[1].single_child().unwrap().tag, Tag::NULL);

		let next = reader.read_tlv().unwrap().unwrap();
		assert_eq!(next.tag, Tag::OCTET_STRING);
	}

	#[test]
	fn test_truncated_contents() {
		let err = BerReader::new(&[0x04, 0x05, 0x01]).read_tlv().unwrap_err();
		assert_eq!(
			err,
			DecodeError::Truncated {
				declared: 5,
				available: 1
			}
		);
	}

	#[test]
	fn test_indefinite_primitive_is_rejected() {
		let err = BerReader::new(&[0x04, 0x80, 0x00, 0x00]).read_tlv().unwrap_err();
		assert_eq!(err, DecodeError::IndefinitePrimitive(Tag::OCTET_STRING));
	}

	#[test]
	fn test_nesting_limit() {
		let mut data = Vec::new();
		for _ in 0..=MAX_DEPTH + 1 {
			data.extend([0x30, 0x80]);
		}
		let err = BerReader::new(&data).read_tlv().unwrap_err();
		assert_eq!(err, DecodeError::TooDeep(MAX_DEPTH));
	}
}
