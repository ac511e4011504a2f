/// Evaluates a [`crate::error::Visit`], returning early from the surrounding function if the visitor abandoned
/// the class.
///
/// The surrounding function must itself return a [`crate::error::Visit`].
macro_rules! visit {
	($e:expr) => {
		match $e? {
			std::ops::ControlFlow::Continue(value) => value,
			std::ops::ControlFlow::Break(abandoned) => return Ok(std::ops::ControlFlow::Break(abandoned)),
		}
	};
}

pub(crate) use visit;
