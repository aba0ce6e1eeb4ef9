use std::collections::{BTreeMap, HashMap};

use crate::classfile::descriptor::{map_descriptor, map_signature, map_type};
use crate::classfile::reader::{
	ClassReader, Constant, ConstantPool, PoolField, encode_modified_utf8,
};
use crate::classfile::{ClassFormatError, ClassRemapper};

/// How a UTF-8 constant is interpreted at one place it is referenced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
	/// Member names, attribute names and other text that is never remapped.
	Identity,
	/// The name held by a `CONSTANT_Class`.
	Type,
	/// A field or method descriptor.
	Descriptor,
	/// A generic signature.
	Signature,
	/// A string literal.
	Value,
	/// The `SourceFile` attribute.
	SourceFile,
}

impl Role {
	/// The remapped text, or `None` when this role never changes the text.
	fn apply<R>(self, text: &str, remapper: &R) -> Result<Option<String>, ClassFormatError>
	where
		R: ClassRemapper + ?Sized,
	{
		Ok(match self {
			Role::Identity => None,
			Role::Type => Some(map_type(text, remapper)?),
			Role::Descriptor => Some(map_descriptor(text, remapper)?),
			Role::Signature => Some(map_signature(text, remapper)?),
			Role::Value => Some(remapper.map_value(text)),
			Role::SourceFile => Some(remapper.map_source_file(text)),
		})
	}
}

/// Where a UTF-8 reference is stored.
#[derive(Debug, Clone, Copy)]
enum Slot {
	Pool(u16, PoolField),
	/// Byte offset of a `u2` index, relative to the end of the constant pool.
	Body(usize),
}

#[derive(Debug, Clone, Copy)]
struct Use {
	slot: Slot,
	index: u16,
	role: Role,
}

/// Rewrite every name in a class file through `remapper`.
///
/// Non-UTF-8 constants keep their indices, so bytecode is copied verbatim.
/// UTF-8 constants are rewritten in place when all of their uses agree on
/// the new text; otherwise the disagreeing uses are re-pointed at another
/// entry holding their text, appended if none exists.
pub fn rewrite_class<R>(bytes: &[u8], remapper: &R) -> Result<Vec<u8>, ClassFormatError>
where
	R: ClassRemapper + ?Sized,
{
	let mut reader = ClassReader::new(bytes);
	reader.expect_magic()?;
	reader.skip(4)?; // minor_version, major_version
	let mut pool = ConstantPool::parse(&mut reader)?;
	let body_start = reader.position();
	let mut body = bytes[body_start..].to_vec();

	let uses = {
		let mut collector = UseCollector {
			pool: &pool,
			uses: Vec::new(),
		};
		collector.collect_pool()?;
		collector.walk_class(&mut ClassReader::new(&bytes[body_start..]))?;
		collector.uses
	};

	let mut targets: Vec<Option<Vec<u8>>> = Vec::with_capacity(uses.len());
	for u in &uses {
		let target = match &pool.utf8(u.index)?.text {
			Some(text) => u
				.role
				.apply(text, remapper)?
				.filter(|mapped| mapped != text)
				.map(|mapped| encode_modified_utf8(&mapped)),
			None => None,
		};
		targets.push(target);
	}

	// Rewrite in place where every use agrees, or where no use keeps the old text.
	let mut by_index: BTreeMap<u16, Vec<usize>> = BTreeMap::new();
	for (i, u) in uses.iter().enumerate() {
		by_index.entry(u.index).or_default().push(i);
	}
	for (index, use_ids) in &by_index {
		if use_ids.iter().any(|&i| targets[i].is_none()) {
			continue;
		}
		if let Some(first) = use_ids.first().and_then(|&i| targets[i].clone()) {
			pool.set_utf8(*index, first);
		}
	}

	let mut lookup: HashMap<Vec<u8>, u16> = HashMap::new();
	for (index, entry) in pool.entries() {
		if let Constant::Utf8(utf8) = entry {
			lookup.entry(utf8.bytes.clone()).or_insert(index);
		}
	}

	for (u, target) in uses.iter().zip(targets) {
		let Some(target) = target else {
			continue;
		};
		if pool.utf8(u.index)?.bytes == target {
			continue;
		}
		let new_index = match lookup.get(&target) {
			Some(&index) => index,
			None => {
				let index = pool.push_utf8(target.clone())?;
				lookup.insert(target, index);
				index
			}
		};
		match u.slot {
			Slot::Pool(entry, field) => pool.repoint(entry, field, new_index),
			Slot::Body(offset) => {
				body[offset..offset + 2].copy_from_slice(&new_index.to_be_bytes())
			}
		}
	}

	let mut out = Vec::with_capacity(bytes.len() + 64);
	out.extend_from_slice(&bytes[..8]); // magic, minor_version, major_version
	pool.write(&mut out)?;
	out.extend_from_slice(&body);
	Ok(out)
}

/// Decoded text of every UTF-8 constant in a class file, in pool order.
pub fn utf8_constants(bytes: &[u8]) -> Result<Vec<String>, ClassFormatError> {
	let mut reader = ClassReader::new(bytes);
	reader.expect_magic()?;
	reader.skip(4)?;
	let pool = ConstantPool::parse(&mut reader)?;

	Ok(pool
		.entries()
		.filter_map(|(_, entry)| match entry {
			Constant::Utf8(utf8) => Some(
				utf8.text
					.clone()
					.unwrap_or_else(|| String::from_utf8_lossy(&utf8.bytes).into_owned()),
			),
			_ => None,
		})
		.collect())
}

/// Records every UTF-8 reference the rewrite knows how to interpret.
struct UseCollector<'p> {
	pool: &'p ConstantPool,
	uses: Vec<Use>,
}

impl UseCollector<'_> {
	fn record(&mut self, slot: Slot, index: u16, role: Role) -> Result<(), ClassFormatError> {
		self.pool.utf8(index)?;
		self.uses.push(Use { slot, index, role });
		Ok(())
	}

	fn collect_pool(&mut self) -> Result<(), ClassFormatError> {
		let pool = self.pool;
		for (at, entry) in pool.entries() {
			let first = Slot::Pool(at, PoolField::First);
			match *entry {
				Constant::Class { name_index } => self.record(first, name_index, Role::Type)?,
				Constant::String { string_index } => {
					self.record(first, string_index, Role::Value)?
				}
				Constant::NameAndType {
					name_index,
					descriptor_index,
				} => {
					self.record(first, name_index, Role::Identity)?;
					self.record(
						Slot::Pool(at, PoolField::Second),
						descriptor_index,
						Role::Descriptor,
					)?;
				}
				Constant::MethodType { descriptor_index } => {
					self.record(first, descriptor_index, Role::Descriptor)?
				}
				Constant::Module { name_index } | Constant::Package { name_index } => {
					self.record(first, name_index, Role::Identity)?
				}
				Constant::Utf8(_) | Constant::Raw { .. } | Constant::Unusable => {}
			}
		}
		Ok(())
	}

	/// Read a `u2` UTF-8 index from the body and record it.
	fn utf8_ref(
		&mut self,
		reader: &mut ClassReader<'_>,
		role: Role,
	) -> Result<u16, ClassFormatError> {
		let offset = reader.position();
		let index = reader.read_u2()?;
		self.record(Slot::Body(offset), index, role)?;
		Ok(index)
	}

	/// Like `utf8_ref`, for references where 0 means absent.
	fn optional_utf8_ref(
		&mut self,
		reader: &mut ClassReader<'_>,
		role: Role,
	) -> Result<(), ClassFormatError> {
		let offset = reader.position();
		let index = reader.read_u2()?;
		if index != 0 {
			self.record(Slot::Body(offset), index, role)?;
		}
		Ok(())
	}

	fn walk_class(&mut self, reader: &mut ClassReader<'_>) -> Result<(), ClassFormatError> {
		reader.skip(6)?; // access_flags, this_class, super_class
		let interfaces = reader.read_u2()? as usize;
		reader.skip(interfaces * 2)?;

		for _ in 0..2 {
			// fields, then methods
			let count = reader.read_u2()?;
			for _ in 0..count {
				reader.skip(2)?; // access_flags
				self.utf8_ref(reader, Role::Identity)?;
				self.utf8_ref(reader, Role::Descriptor)?;
				self.walk_attributes(reader)?;
			}
		}

		self.walk_attributes(reader)
	}

	fn walk_attributes(&mut self, reader: &mut ClassReader<'_>) -> Result<(), ClassFormatError> {
		let pool = self.pool;
		let count = reader.read_u2()?;
		for _ in 0..count {
			let name_index = self.utf8_ref(reader, Role::Identity)?;
			let length = reader.read_u4()? as usize;
			let mut attr = reader.bounded(length)?;

			let Some(name) = pool.utf8(name_index)?.text.as_deref() else {
				continue;
			};
			match name {
				"SourceFile" => {
					self.utf8_ref(&mut attr, Role::SourceFile)?;
				}
				"Signature" => {
					self.utf8_ref(&mut attr, Role::Signature)?;
				}
				"Code" => {
					attr.skip(4)?; // max_stack, max_locals
					let code_length = attr.read_u4()? as usize;
					attr.skip(code_length)?;
					let exception_table_length = attr.read_u2()? as usize;
					attr.skip(exception_table_length * 8)?;
					self.walk_attributes(&mut attr)?;
				}
				"LocalVariableTable" | "LocalVariableTypeTable" => {
					let role = if name == "LocalVariableTable" {
						Role::Descriptor
					} else {
						Role::Signature
					};
					let entries = attr.read_u2()?;
					for _ in 0..entries {
						attr.skip(4)?; // start_pc, length
						self.utf8_ref(&mut attr, Role::Identity)?;
						self.utf8_ref(&mut attr, role)?;
						attr.skip(2)?; // index
					}
				}
				"RuntimeVisibleAnnotations" | "RuntimeInvisibleAnnotations" => {
					let annotations = attr.read_u2()?;
					for _ in 0..annotations {
						self.walk_annotation(&mut attr)?;
					}
				}
				"RuntimeVisibleParameterAnnotations" | "RuntimeInvisibleParameterAnnotations" => {
					let parameters = attr.read_u1()?;
					for _ in 0..parameters {
						let annotations = attr.read_u2()?;
						for _ in 0..annotations {
							self.walk_annotation(&mut attr)?;
						}
					}
				}
				"RuntimeVisibleTypeAnnotations" | "RuntimeInvisibleTypeAnnotations" => {
					let annotations = attr.read_u2()?;
					for _ in 0..annotations {
						self.walk_type_annotation(&mut attr)?;
					}
				}
				"AnnotationDefault" => self.walk_element_value(&mut attr)?,
				"Record" => {
					let components = attr.read_u2()?;
					for _ in 0..components {
						self.utf8_ref(&mut attr, Role::Identity)?;
						self.utf8_ref(&mut attr, Role::Descriptor)?;
						self.walk_attributes(&mut attr)?;
					}
				}
				"InnerClasses" => {
					let classes = attr.read_u2()?;
					for _ in 0..classes {
						attr.skip(4)?; // inner_class_info_index, outer_class_info_index
						self.optional_utf8_ref(&mut attr, Role::Identity)?;
						attr.skip(2)?; // inner_class_access_flags
					}
				}
				"MethodParameters" => {
					let parameters = attr.read_u1()?;
					for _ in 0..parameters {
						self.optional_utf8_ref(&mut attr, Role::Identity)?;
						attr.skip(2)?; // access_flags
					}
				}
				_ => {}
			}
		}
		Ok(())
	}

	fn walk_annotation(&mut self, reader: &mut ClassReader<'_>) -> Result<(), ClassFormatError> {
		self.utf8_ref(reader, Role::Descriptor)?;
		let pairs = reader.read_u2()?;
		for _ in 0..pairs {
			self.utf8_ref(reader, Role::Identity)?;
			self.walk_element_value(reader)?;
		}
		Ok(())
	}

	fn walk_element_value(&mut self, reader: &mut ClassReader<'_>) -> Result<(), ClassFormatError> {
		match reader.read_u1()? {
			b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' => reader.skip(2)?,
			b's' => {
				self.utf8_ref(reader, Role::Value)?;
			}
			b'e' => {
				self.utf8_ref(reader, Role::Descriptor)?;
				self.utf8_ref(reader, Role::Identity)?;
			}
			b'c' => {
				self.utf8_ref(reader, Role::Descriptor)?;
			}
			b'@' => self.walk_annotation(reader)?,
			b'[' => {
				let values = reader.read_u2()?;
				for _ in 0..values {
					self.walk_element_value(reader)?;
				}
			}
			tag => return Err(ClassFormatError::InvalidElementTag { tag }),
		}
		Ok(())
	}

	fn walk_type_annotation(
		&mut self,
		reader: &mut ClassReader<'_>,
	) -> Result<(), ClassFormatError> {
		let target_type = reader.read_u1()?;
		match target_type {
			0x13..=0x15 => {}
			0x00 | 0x01 | 0x16 => reader.skip(1)?,
			0x10 | 0x11 | 0x12 | 0x17 | 0x42..=0x46 => reader.skip(2)?,
			0x47..=0x4B => reader.skip(3)?,
			0x40 | 0x41 => {
				let table_length = reader.read_u2()? as usize;
				reader.skip(table_length * 6)?;
			}
			other => {
				return Err(ClassFormatError::InvalidTypeAnnotationTarget { target_type: other });
			}
		}
		let path_length = reader.read_u1()? as usize;
		reader.skip(path_length * 2)?;
		self.walk_annotation(reader)
	}
}
