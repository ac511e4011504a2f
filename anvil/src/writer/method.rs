use anyhow::{anyhow, Context, Result};
use log::trace;
use crate::bytes::ClassWrite;
use crate::class_constants::attribute;
use crate::pool::ConstantPool;
use crate::tree::annotation::Annotation;
use crate::tree::code::{Instruction, Label, LocalVariable, StackMapFrame, TryCatch};
use crate::tree::MethodHeader;
use crate::visitor::{MethodVisitor, SourceId};
use crate::writer::attributes::{write_annotations, write_attribute, write_attribute_fix_length, write_parameter_annotations};
use crate::writer::code::{write_code, CodeEvent, MethodCode, MethodContext};

/// Records the contents of a method, they're encoded once the method is finished.
#[derive(Debug)]
pub struct MethodWriter {
	header: MethodHeader,
	/// The reader whose constant pool the writer shares.
	source: Option<SourceId>,
	/// The `method_info` as read, if it's copied unchanged.
	verbatim: Option<Vec<u8>>,
	annotations: Vec<Annotation>,
	parameter_annotations: Option<Vec<Vec<Annotation>>>,
	code: Option<MethodCode>,
}

impl MethodWriter {
	pub(crate) fn new(header: MethodHeader, source: Option<SourceId>) -> MethodWriter {
		MethodWriter {
			header,
			source,
			verbatim: None,
			annotations: Vec::new(),
			parameter_annotations: None,
			code: None,
		}
	}

	fn code(&mut self) -> &mut MethodCode {
		self.code.get_or_insert_with(MethodCode::default)
	}

	fn event(&mut self, event: CodeEvent) -> Result<()> {
		self.code().events.push(event);
		Ok(())
	}

	/// Writes the `method_info`.
	pub(crate) fn write(self, writer: &mut Vec<u8>, pool: &mut ConstantPool, context: &MethodContext) -> Result<()> {
		let header = &self.header;
		if let Some(raw) = &self.verbatim {
			trace!("copying {:?}{:?} of {:?} unchanged", header.name, header.descriptor, context.class);
			writer.write_u8_slice(raw);
			return Ok(());
		}

		writer.write_u16(header.access);
		writer.write_u16(pool.put_utf8(&header.name));
		writer.write_u16(pool.put_utf8(&header.descriptor));

		let mut attribute_count = 0;
		let mut buffer = Vec::new();

		if let Some(code) = &self.code {
			attribute_count += 1;
			write_attribute(&mut buffer, pool, attribute::CODE, |w, pool| {
				write_code(w, pool, context, header, code)
					.with_context(|| anyhow!("failed to write `Code` attribute of method {:?} {:?}", header.name, header.descriptor))
			})?;
		}
		if !header.exceptions.is_empty() {
			attribute_count += 1;
			write_attribute(&mut buffer, pool, attribute::EXCEPTIONS, |w, pool| {
				w.write_slice(&header.exceptions,
					|w, len| w.write_usize_as_u16(len).context("too many exceptions"),
					|w, exception| {
						w.write_u16(pool.put_class(exception));
						Ok(())
					},
				)
			})?;
		}
		if let Some(signature) = &header.signature {
			attribute_count += 1;
			write_attribute_fix_length(&mut buffer, pool, attribute::SIGNATURE, 2)?;
			buffer.write_u16(pool.put_utf8(signature));
		}
		if header.deprecated {
			attribute_count += 1;
			write_attribute_fix_length(&mut buffer, pool, attribute::DEPRECATED, 0)?;
		}
		if header.synthetic {
			attribute_count += 1;
			write_attribute_fix_length(&mut buffer, pool, attribute::SYNTHETIC, 0)?;
		}

		if !self.annotations.is_empty() {
			attribute_count += 1;
			write_attribute(&mut buffer, pool, attribute::RUNTIME_VISIBLE_ANNOTATIONS, |w, pool| {
				write_annotations(w, pool, &self.annotations)
			})?;
		}
		if let Some(parameters) = &self.parameter_annotations {
			attribute_count += 1;
			write_attribute(&mut buffer, pool, attribute::RUNTIME_VISIBLE_PARAMETER_ANNOTATIONS, |w, pool| {
				write_parameter_annotations(w, pool, parameters)
			})?;
		}

		writer.write_usize_as_u16(attribute_count).context("too many attributes on method")?;
		writer.write_u8_slice(&buffer);
		Ok(())
	}
}

impl MethodVisitor for MethodWriter {
	fn copy_verbatim(&mut self, source: SourceId, header: &MethodHeader, raw: &[u8]) -> bool {
		if self.source == Some(source) && &self.header == header {
			self.verbatim = Some(raw.to_vec());
			true
		} else {
			false
		}
	}

	fn visit_annotation(&mut self, annotation: Annotation) -> Result<()> {
		self.annotations.push(annotation);
		Ok(())
	}

	fn visit_parameter_annotations(&mut self, parameters: Vec<Vec<Annotation>>) -> Result<()> {
		self.parameter_annotations = Some(parameters);
		Ok(())
	}

	fn visit_try_catch(&mut self, try_catch: TryCatch) -> Result<()> {
		self.code().try_catches.push(try_catch);
		Ok(())
	}

	fn visit_label(&mut self, label: Label) -> Result<()> {
		self.event(CodeEvent::Label(label))
	}

	fn visit_debug_label(&mut self, label: Label) -> Result<()> {
		self.event(CodeEvent::DebugLabel(label))
	}

	fn visit_line_number(&mut self, line: u16, start: Label) -> Result<()> {
		self.event(CodeEvent::LineNumber(line, start))
	}

	fn visit_frame(&mut self, frame: StackMapFrame) -> Result<()> {
		self.event(CodeEvent::Frame(frame))
	}

	fn visit_instruction(&mut self, instruction: Instruction) -> Result<()> {
		self.event(CodeEvent::Instruction(instruction))
	}

	fn visit_local_variable(&mut self, local_variable: LocalVariable) -> Result<()> {
		self.code().local_variables.push(local_variable);
		Ok(())
	}

	fn visit_max_stack(&mut self, max_stack: u16, max_locals: u16) -> Result<()> {
		let code = self.code();
		code.max_stack = max_stack;
		code.max_locals = max_locals;
		Ok(())
	}
}
