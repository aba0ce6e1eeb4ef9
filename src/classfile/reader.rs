use crate::classfile::ClassFormatError;

const MAGIC: u32 = 0xCAFE_BABE;

/// Big-endian cursor over class file bytes, bounded to `end`.
#[derive(Debug, Clone)]
pub(crate) struct ClassReader<'a> {
	data: &'a [u8],
	pos: usize,
	end: usize,
}

impl<'a> ClassReader<'a> {
	pub(crate) fn new(data: &'a [u8]) -> Self {
		Self {
			data,
			pos: 0,
			end: data.len(),
		}
	}

	/// Offset from the start of the underlying data.
	pub(crate) fn position(&self) -> usize {
		self.pos
	}

	pub(crate) fn expect_magic(&mut self) -> Result<(), ClassFormatError> {
		if self.read_u4()? != MAGIC {
			return Err(ClassFormatError::InvalidMagic);
		}
		Ok(())
	}

	pub(crate) fn read_u1(&mut self) -> Result<u8, ClassFormatError> {
		let value = *self.read_slice(1)?.first().ok_or(ClassFormatError::UnexpectedEof)?;
		Ok(value)
	}

	pub(crate) fn read_u2(&mut self) -> Result<u16, ClassFormatError> {
		let bytes = self.read_slice(2)?;
		Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
	}

	pub(crate) fn read_u4(&mut self) -> Result<u32, ClassFormatError> {
		let bytes = self.read_slice(4)?;
		Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
	}

	pub(crate) fn read_slice(&mut self, len: usize) -> Result<&'a [u8], ClassFormatError> {
		let end = self.pos.checked_add(len).ok_or(ClassFormatError::UnexpectedEof)?;
		if end > self.end {
			return Err(ClassFormatError::UnexpectedEof);
		}
		let slice = &self.data[self.pos..end];
		self.pos = end;
		Ok(slice)
	}

	pub(crate) fn skip(&mut self, len: usize) -> Result<(), ClassFormatError> {
		self.read_slice(len).map(|_| ())
	}

	/// Split off a reader over the next `len` bytes and advance past them.
	///
	/// Offsets reported by the returned reader stay relative to the same data.
	pub(crate) fn bounded(&mut self, len: usize) -> Result<ClassReader<'a>, ClassFormatError> {
		let start = self.pos;
		self.skip(len)?;
		Ok(ClassReader {
			data: self.data,
			pos: start,
			end: self.pos,
		})
	}
}

/// A decoded `CONSTANT_Utf8` entry.
#[derive(Debug, Clone)]
pub(crate) struct Utf8 {
	pub(crate) bytes: Vec<u8>,
	/// `None` when the bytes are not valid modified UTF-8.
	pub(crate) text: Option<String>,
}

impl Utf8 {
	fn new(bytes: Vec<u8>) -> Self {
		let text = decode_modified_utf8(&bytes);
		Self { bytes, text }
	}
}

#[derive(Debug, Clone)]
pub(crate) enum Constant {
	Utf8(Utf8),
	Class { name_index: u16 },
	String { string_index: u16 },
	NameAndType { name_index: u16, descriptor_index: u16 },
	MethodType { descriptor_index: u16 },
	Module { name_index: u16 },
	Package { name_index: u16 },
	/// Entries without UTF-8 references, copied verbatim.
	Raw { tag: u8, bytes: Vec<u8> },
	/// Index 0 and the slot after a long or double.
	Unusable,
}

/// Which UTF-8 reference of a constant is meant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PoolField {
	First,
	Second,
}

#[derive(Debug, Clone)]
pub(crate) struct ConstantPool {
	entries: Vec<Constant>,
}

impl ConstantPool {
	pub(crate) fn parse(reader: &mut ClassReader<'_>) -> Result<Self, ClassFormatError> {
		let count = reader.read_u2()? as usize;
		let mut entries = Vec::with_capacity(count);
		entries.push(Constant::Unusable);

		while entries.len() < count {
			let tag = reader.read_u1()?;
			let entry = match tag {
				1 => {
					let length = reader.read_u2()? as usize;
					Constant::Utf8(Utf8::new(reader.read_slice(length)?.to_vec()))
				}
				3 | 4 => Constant::Raw {
					tag,
					bytes: reader.read_slice(4)?.to_vec(),
				},
				5 | 6 => {
					let bytes = reader.read_slice(8)?.to_vec();
					entries.push(Constant::Raw { tag, bytes });
					Constant::Unusable
				}
				7 => Constant::Class {
					name_index: reader.read_u2()?,
				},
				8 => Constant::String {
					string_index: reader.read_u2()?,
				},
				9 | 10 | 11 | 17 | 18 => Constant::Raw {
					tag,
					bytes: reader.read_slice(4)?.to_vec(),
				},
				12 => Constant::NameAndType {
					name_index: reader.read_u2()?,
					descriptor_index: reader.read_u2()?,
				},
				15 => Constant::Raw {
					tag,
					bytes: reader.read_slice(3)?.to_vec(),
				},
				16 => Constant::MethodType {
					descriptor_index: reader.read_u2()?,
				},
				19 => Constant::Module {
					name_index: reader.read_u2()?,
				},
				20 => Constant::Package {
					name_index: reader.read_u2()?,
				},
				other => return Err(ClassFormatError::UnsupportedConstant { tag: other }),
			};
			entries.push(entry);
		}

		Ok(Self { entries })
	}

	pub(crate) fn entries(&self) -> impl Iterator<Item = (u16, &Constant)> {
		self.entries
			.iter()
			.enumerate()
			.map(|(index, entry)| (index as u16, entry))
	}

	pub(crate) fn utf8(&self, index: u16) -> Result<&Utf8, ClassFormatError> {
		match self.entries.get(index as usize) {
			Some(Constant::Utf8(utf8)) => Ok(utf8),
			_ => Err(ClassFormatError::InvalidConstantIndex { index }),
		}
	}

	pub(crate) fn set_utf8(&mut self, index: u16, bytes: Vec<u8>) {
		if let Some(entry) = self.entries.get_mut(index as usize)
			&& matches!(entry, Constant::Utf8(_))
		{
			*entry = Constant::Utf8(Utf8::new(bytes));
		}
	}

	pub(crate) fn push_utf8(&mut self, bytes: Vec<u8>) -> Result<u16, ClassFormatError> {
		let index = u16::try_from(self.entries.len())
			.ok()
			.filter(|&index| index < u16::MAX)
			.ok_or(ClassFormatError::ConstantPoolOverflow)?;
		self.entries.push(Constant::Utf8(Utf8::new(bytes)));
		Ok(index)
	}

	/// Point a UTF-8 reference held by constant `index` at `target`.
	pub(crate) fn repoint(&mut self, index: u16, field: PoolField, target: u16) {
		let Some(entry) = self.entries.get_mut(index as usize) else {
			return;
		};
		match (entry, field) {
			(Constant::Class { name_index }, PoolField::First)
			| (Constant::Module { name_index }, PoolField::First)
			| (Constant::Package { name_index }, PoolField::First)
			| (Constant::NameAndType { name_index, .. }, PoolField::First) => *name_index = target,
			(Constant::String { string_index }, PoolField::First) => *string_index = target,
			(Constant::MethodType { descriptor_index }, PoolField::First)
			| (Constant::NameAndType {
				descriptor_index, ..
			}, PoolField::Second) => *descriptor_index = target,
			_ => {}
		}
	}

	/// Serialize `constant_pool_count` followed by every entry.
	pub(crate) fn write(&self, out: &mut Vec<u8>) -> Result<(), ClassFormatError> {
		let count = u16::try_from(self.entries.len())
			.map_err(|_| ClassFormatError::ConstantPoolOverflow)?;
		out.extend_from_slice(&count.to_be_bytes());

		for entry in &self.entries {
			match entry {
				Constant::Utf8(utf8) => {
					let length = u16::try_from(utf8.bytes.len()).map_err(|_| {
						ClassFormatError::Utf8TooLong {
							length: utf8.bytes.len(),
						}
					})?;
					out.push(1);
					out.extend_from_slice(&length.to_be_bytes());
					out.extend_from_slice(&utf8.bytes);
				}
				Constant::Class { name_index } => write_ref(out, 7, *name_index),
				Constant::String { string_index } => write_ref(out, 8, *string_index),
				Constant::NameAndType {
					name_index,
					descriptor_index,
				} => {
					write_ref(out, 12, *name_index);
					out.extend_from_slice(&descriptor_index.to_be_bytes());
				}
				Constant::MethodType { descriptor_index } => write_ref(out, 16, *descriptor_index),
				Constant::Module { name_index } => write_ref(out, 19, *name_index),
				Constant::Package { name_index } => write_ref(out, 20, *name_index),
				Constant::Raw { tag, bytes } => {
					out.push(*tag);
					out.extend_from_slice(bytes);
				}
				Constant::Unusable => {}
			}
		}

		Ok(())
	}
}

fn write_ref(out: &mut Vec<u8>, tag: u8, index: u16) {
	out.push(tag);
	out.extend_from_slice(&index.to_be_bytes());
}

/// Decode the JVM's modified UTF-8.
///
/// NUL is `C0 80` and supplementary characters are surrogate pairs of
/// three-byte sequences. Returns `None` for bytes that do not form a
/// valid string, such as lone surrogates.
pub(crate) fn decode_modified_utf8(bytes: &[u8]) -> Option<String> {
	if let Ok(text) = std::str::from_utf8(bytes) {
		return Some(text.to_string());
	}

	let mut units = Vec::with_capacity(bytes.len());
	let mut i = 0;
	while i < bytes.len() {
		let b = bytes[i] as u16;
		if b & 0x80 == 0 {
			units.push(b);
			i += 1;
		} else if b & 0xE0 == 0xC0 {
			let b2 = continuation(bytes, i + 1)?;
			units.push(((b & 0x1F) << 6) | b2);
			i += 2;
		} else if b & 0xF0 == 0xE0 {
			let b2 = continuation(bytes, i + 1)?;
			let b3 = continuation(bytes, i + 2)?;
			units.push(((b & 0x0F) << 12) | (b2 << 6) | b3);
			i += 3;
		} else {
			return None;
		}
	}

	String::from_utf16(&units).ok()
}

fn continuation(bytes: &[u8], i: usize) -> Option<u16> {
	let b = *bytes.get(i)?;
	(b & 0xC0 == 0x80).then_some((b & 0x3F) as u16)
}

/// Encode a string as the JVM's modified UTF-8.
pub(crate) fn encode_modified_utf8(text: &str) -> Vec<u8> {
	let mut out = Vec::with_capacity(text.len());
	for unit in text.encode_utf16() {
		match unit {
			0x0001..=0x007F => out.push(unit as u8),
			0x0000 | 0x0080..=0x07FF => {
				out.push(0xC0 | (unit >> 6) as u8);
				out.push(0x80 | (unit & 0x3F) as u8);
			}
			_ => {
				out.push(0xE0 | (unit >> 12) as u8);
				out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
				out.push(0x80 | (unit & 0x3F) as u8);
			}
		}
	}
	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_reader_reads_big_endian() {
		let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07];
		let mut reader = ClassReader::new(&data);
		assert_eq!(reader.read_u1().unwrap(), 0x01);
		assert_eq!(reader.read_u2().unwrap(), 0x0203);
		assert_eq!(reader.read_u4().unwrap(), 0x0405_0607);
		assert!(matches!(
			reader.read_u1(),
			Err(ClassFormatError::UnexpectedEof)
		));
	}

	#[test]
	fn test_bounded_reader_stops_at_limit() {
		let data = [0, 1, 2, 3, 4];
		let mut reader = ClassReader::new(&data);
		reader.skip(1).unwrap();
		let mut sub = reader.bounded(2).unwrap();
		assert_eq!(sub.position(), 1);
		assert_eq!(sub.read_u2().unwrap(), 0x0102);
		assert!(sub.read_u1().is_err());
		assert_eq!(reader.read_u1().unwrap(), 3);
	}

	#[test]
	fn test_bad_magic() {
		let data = [0xCA, 0xFE, 0xBA, 0xBF];
		let mut reader = ClassReader::new(&data);
		assert!(matches!(
			reader.expect_magic(),
			Err(ClassFormatError::InvalidMagic)
		));
	}

	#[test]
	fn test_pool_keeps_long_slots() {
		// count = 4: Long (two slots), Utf8 "x"
		let data = [
			0x00, 0x04, 5, 0, 0, 0, 0, 0, 0, 0, 1, 1, 0x00, 0x01, b'x',
		];
		let mut reader = ClassReader::new(&data);
		let pool = ConstantPool::parse(&mut reader).unwrap();
		assert_eq!(pool.entries().count(), 4);
		assert_eq!(pool.utf8(3).unwrap().text.as_deref(), Some("x"));
		assert!(pool.utf8(2).is_err());

		let mut out = Vec::new();
		pool.write(&mut out).unwrap();
		assert_eq!(out, data);
	}

	#[test]
	fn test_unknown_tag() {
		let data = [0x00, 0x02, 99];
		let mut reader = ClassReader::new(&data);
		assert!(matches!(
			ConstantPool::parse(&mut reader),
			Err(ClassFormatError::UnsupportedConstant { tag: 99 })
		));
	}

	#[test]
	fn test_modified_utf8_nul_and_supplementary() {
		let text = "a\0b\u{1F600}";
		let encoded = encode_modified_utf8(text);
		assert_eq!(&encoded[..4], &[b'a', 0xC0, 0x80, b'b']);
		assert_eq!(encoded.len(), 4 + 6);
		assert_eq!(decode_modified_utf8(&encoded).as_deref(), Some(text));
	}

	#[test]
	fn test_lone_surrogate_is_not_decoded() {
		let lone = [0xED, 0xA0, 0x80];
		assert_eq!(decode_modified_utf8(&lone), None);
	}
}
