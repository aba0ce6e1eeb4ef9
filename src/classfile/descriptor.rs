use crate::classfile::{ClassFormatError, ClassRemapper};

/// Map the name held by a `CONSTANT_Class`: an internal name, or an array descriptor.
pub fn map_type<R>(name: &str, remapper: &R) -> Result<String, ClassFormatError>
where
	R: ClassRemapper + ?Sized,
{
	if name.starts_with('[') {
		map_descriptor(name, remapper)
	} else {
		Ok(remapper.map(name))
	}
}

/// Map every object type in a field or method descriptor.
pub fn map_descriptor<R>(descriptor: &str, remapper: &R) -> Result<String, ClassFormatError>
where
	R: ClassRemapper + ?Sized,
{
	let invalid = || ClassFormatError::InvalidDescriptor(descriptor.to_string());

	if descriptor.is_empty() {
		return Err(invalid());
	}

	let mut out = String::with_capacity(descriptor.len());
	let mut rest = descriptor;
	while let Some(c) = rest.chars().next() {
		match c {
			'L' => {
				let end = rest.find(';').ok_or_else(invalid)?;
				let name = &rest[1..end];
				if name.is_empty() {
					return Err(invalid());
				}
				out.push('L');
				out.push_str(&remapper.map(name));
				out.push(';');
				rest = &rest[end + 1..];
			}
			'B' | 'C' | 'D' | 'F' | 'I' | 'J' | 'S' | 'Z' | 'V' | '[' | '(' | ')' => {
				out.push(c);
				rest = &rest[1..];
			}
			_ => return Err(invalid()),
		}
	}

	Ok(out)
}

/// Map every class type in a generic class, method or field signature.
pub fn map_signature<R>(signature: &str, remapper: &R) -> Result<String, ClassFormatError>
where
	R: ClassRemapper + ?Sized,
{
	SignatureMapper {
		signature,
		pos: 0,
		out: String::with_capacity(signature.len()),
		remapper,
	}
	.run()
}

struct SignatureMapper<'s, 'r, R: ?Sized> {
	signature: &'s str,
	pos: usize,
	out: String,
	remapper: &'r R,
}

impl<R> SignatureMapper<'_, '_, R>
where
	R: ClassRemapper + ?Sized,
{
	fn run(mut self) -> Result<String, ClassFormatError> {
		if self.peek() == Some(b'<') {
			self.type_parameters()?;
		}

		if self.peek() == Some(b'(') {
			self.expect(b'(')?;
			while self.peek() != Some(b')') {
				self.type_signature()?;
			}
			self.expect(b')')?;
			self.type_signature()?;
			while self.peek() == Some(b'^') {
				self.expect(b'^')?;
				self.type_signature()?;
			}
		} else {
			// Superclass and interfaces, or a single field type.
			if self.peek().is_none() {
				return Err(self.error());
			}
			while self.peek().is_some() {
				self.type_signature()?;
			}
		}

		if self.pos != self.signature.len() {
			return Err(self.error());
		}
		Ok(self.out)
	}

	fn error(&self) -> ClassFormatError {
		ClassFormatError::InvalidSignature(self.signature.to_string())
	}

	fn peek(&self) -> Option<u8> {
		self.signature.as_bytes().get(self.pos).copied()
	}

	fn expect(&mut self, c: u8) -> Result<(), ClassFormatError> {
		if self.peek() != Some(c) {
			return Err(self.error());
		}
		self.pos += 1;
		self.out.push(c as char);
		Ok(())
	}

	/// Take a non-empty identifier ending before one of `stops`.
	fn identifier(&mut self, stops: &[u8]) -> Result<&'_ str, ClassFormatError> {
		let signature = self.signature;
		let start = self.pos;
		while let Some(c) = self.peek() {
			if stops.contains(&c) {
				if self.pos == start {
					break;
				}
				return Ok(&signature[start..self.pos]);
			}
			self.pos += 1;
		}
		Err(self.error())
	}

	fn type_parameters(&mut self) -> Result<(), ClassFormatError> {
		self.expect(b'<')?;
		loop {
			let name = self.identifier(b":")?.to_string();
			self.out.push_str(&name);
			while self.peek() == Some(b':') {
				self.expect(b':')?;
				if matches!(self.peek(), Some(b'L' | b'[' | b'T')) {
					self.type_signature()?;
				}
			}
			if self.peek() == Some(b'>') {
				return self.expect(b'>');
			}
		}
	}

	fn type_signature(&mut self) -> Result<(), ClassFormatError> {
		match self.peek() {
			Some(c @ (b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b'V')) => self.expect(c),
			Some(b'[') => {
				self.expect(b'[')?;
				self.type_signature()
			}
			Some(b'T') => {
				self.expect(b'T')?;
				let name = self.identifier(b";")?.to_string();
				self.out.push_str(&name);
				self.expect(b';')
			}
			Some(b'L') => {
				self.pos += 1;
				self.class_type()
			}
			_ => Err(self.error()),
		}
	}

	/// A class type after its leading `L`, including nested `.Inner` types.
	fn class_type(&mut self) -> Result<(), ClassFormatError> {
		let mut class_name = self.identifier(b"<.;")?.to_string();
		let mapped = self.remapper.map(&class_name);
		self.out.push('L');
		self.out.push_str(&mapped);

		loop {
			match self.peek() {
				Some(b'<') => self.type_arguments()?,
				Some(b'.') => {
					self.expect(b'.')?;
					let inner = self.identifier(b"<.;")?.to_string();
					let mapped_outer = format!("{}$", self.remapper.map(&class_name));
					class_name = format!("{class_name}${inner}");
					let mapped = self.remapper.map(&class_name);
					let start = if mapped.starts_with(&mapped_outer) {
						mapped_outer.len()
					} else {
						mapped.rfind('$').map_or(0, |i| i + 1)
					};
					self.out.push_str(&mapped[start..]);
				}
				Some(b';') => return self.expect(b';'),
				_ => return Err(self.error()),
			}
		}
	}

	fn type_arguments(&mut self) -> Result<(), ClassFormatError> {
		self.expect(b'<')?;
		loop {
			match self.peek() {
				Some(b'>') => return self.expect(b'>'),
				Some(b'*') => self.expect(b'*')?,
				Some(c @ (b'+' | b'-')) => {
					self.expect(c)?;
					self.type_signature()?;
				}
				Some(_) => self.type_signature()?,
				None => return Err(self.error()),
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	struct Prefix(&'static str, &'static str);

	impl ClassRemapper for Prefix {
		fn map(&self, internal_name: &str) -> String {
			match internal_name.strip_prefix(self.0) {
				Some(rest) => format!("{}{}", self.1, rest),
				None => internal_name.to_string(),
			}
		}
	}

	const MAPPER: Prefix = Prefix("com/foo/", "shaded/foo/");

	#[test]
	fn test_map_type() {
		assert_eq!(map_type("com/foo/Bar", &MAPPER).unwrap(), "shaded/foo/Bar");
		assert_eq!(
			map_type("[[Lcom/foo/Bar;", &MAPPER).unwrap(),
			"[[Lshaded/foo/Bar;"
		);
		assert_eq!(map_type("[I", &MAPPER).unwrap(), "[I");
	}

	#[test]
	fn test_map_method_descriptor() {
		assert_eq!(
			map_descriptor("(ILcom/foo/Bar;[Ljava/lang/String;)Lcom/foo/Baz;", &MAPPER).unwrap(),
			"(ILshaded/foo/Bar;[Ljava/lang/String;)Lshaded/foo/Baz;"
		);
		assert_eq!(map_descriptor("()V", &MAPPER).unwrap(), "()V");
	}

	#[test]
	fn test_malformed_descriptors() {
		for bad in ["", "Lcom/foo/Bar", "L;", "(X)V"] {
			assert!(
				matches!(
					map_descriptor(bad, &MAPPER),
					Err(ClassFormatError::InvalidDescriptor(_))
				),
				"{bad:?} should be rejected"
			);
		}
	}

	#[test]
	fn test_map_field_signature() {
		assert_eq!(
			map_signature("Ljava/util/List<Lcom/foo/Bar;>;", &MAPPER).unwrap(),
			"Ljava/util/List<Lshaded/foo/Bar;>;"
		);
		assert_eq!(
			map_signature("Ljava/util/Map<+Lcom/foo/A;*>;", &MAPPER).unwrap(),
			"Ljava/util/Map<+Lshaded/foo/A;*>;"
		);
	}

	#[test]
	fn test_map_class_signature_with_type_parameters() {
		let signature = "<L:Lcom/foo/A;T::Ljava/lang/Comparable<TT;>;>Lcom/foo/Base<TL;>;Ljava/io/Serializable;";
		assert_eq!(
			map_signature(signature, &MAPPER).unwrap(),
			"<L:Lshaded/foo/A;T::Ljava/lang/Comparable<TT;>;>Lshaded/foo/Base<TL;>;Ljava/io/Serializable;"
		);
	}

	#[test]
	fn test_map_method_signature_with_throws() {
		assert_eq!(
			map_signature("<E:Ljava/lang/Exception;>(TE;[Lcom/foo/A;)V^TE;^Lcom/foo/Err;", &MAPPER)
				.unwrap(),
			"<E:Ljava/lang/Exception;>(TE;[Lshaded/foo/A;)V^TE;^Lshaded/foo/Err;"
		);
	}

	#[test]
	fn test_map_inner_class_signature() {
		assert_eq!(
			map_signature("Lcom/foo/Outer<TT;>.Inner<Lcom/foo/A;>;", &MAPPER).unwrap(),
			"Lshaded/foo/Outer<TT;>.Inner<Lshaded/foo/A;>;"
		);
	}

	#[test]
	fn test_malformed_signatures() {
		for bad in ["", "Lcom/foo/Bar", "<T>V", "(Lcom/foo/A;", "Q"] {
			assert!(
				matches!(
					map_signature(bad, &MAPPER),
					Err(ClassFormatError::InvalidSignature(_))
				),
				"{bad:?} should be rejected"
			);
		}
	}
}
