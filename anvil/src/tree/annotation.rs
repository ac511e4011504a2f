use java_string::JavaString;

#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
	/// The field descriptor of the annotation interface.
	pub annotation_type: JavaString,
	pub element_value_pairs: Vec<(JavaString, ElementValue)>,
}

impl Annotation {
	pub fn new(annotation_type: impl Into<JavaString>) -> Annotation {
		Annotation {
			annotation_type: annotation_type.into(),
			element_value_pairs: Vec::new(),
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElementValue {
	Byte(i8),
	Char(u16),
	Double(f64),
	Float(f32),
	Int(i32),
	Long(i64),
	Short(i16),
	Boolean(bool),
	String(JavaString),
	Enum { type_name: JavaString, const_name: JavaString },
	/// A return descriptor, like `Ljava/lang/Object;` or `V`.
	Class(JavaString),
	Annotation(Annotation),
	Array(Vec<ElementValue>),
}
