//! Conversion between the modified UTF-8 of the class file and [`JavaString`].
//!
//! Modified UTF-8 stores `\0` using two bytes and supplementary characters as two three byte
//! surrogates. See <https://docs.oracle.com/javase/specs/jvms/se22/html/jvms-4.html#jvms-4.4.7>.

use std::borrow::Cow;
use anyhow::{anyhow, Context, Result};
use java_string::{JavaStr, JavaString};

/// Decodes the contents of a `CONSTANT_Utf8_info` entry.
pub(crate) fn decode(bytes: &[u8]) -> Result<JavaString> {
	JavaString::from_modified_utf8(bytes.to_vec())
		.with_context(|| anyhow!("invalid java utf8 contents"))
}

/// Encodes a string for a `CONSTANT_Utf8_info` entry.
pub(crate) fn encode(string: &JavaStr) -> Cow<'_, [u8]> {
	string.to_modified_utf8()
}

#[cfg(test)]
mod testing {
	use anyhow::Result;
	use java_string::JavaStr;
	use pretty_assertions::assert_eq;
	use crate::jstring::{decode, encode};

	fn check(raw: &[u8], string: &str) -> Result<()> {
		let string = JavaStr::from_str(string);
		assert_eq!(encode(string).as_ref(), raw);
		assert_eq!(decode(raw)?, string);
		Ok(())
	}

	#[test]
	fn ascii_class_name() -> Result<()> {
		check(b"java/lang/Object", "java/lang/Object")
	}

	#[test]
	fn nul_takes_two_bytes() -> Result<()> {
		check(&[b'a', 0b1100_0000, 0b1000_0000, b'b'], "a\0b")
	}

	#[test]
	fn supplementary_as_surrogates() -> Result<()> {
		check(&[0b1110_1101, 0b1010_0000, 0b1000_0000, 0b1110_1101, 0b1011_0000, 0b1000_0000], "\u{010000}")
	}

	#[test]
	fn lone_surrogate_survives() -> Result<()> {
		let raw = [0b1110_1101, 0b1010_0000, 0b1000_0000];
		assert_eq!(encode(&decode(&raw)?).as_ref(), &raw);
		Ok(())
	}

	#[test]
	fn invalid_byte_fails() {
		assert!(decode(&[b'a', 0xff]).is_err());
	}
}
