//! Request matching primitives.
//!
//! - `glob` - URL glob compilation (`*` segment wildcard, `**` remainder)
//! - `route` - method matcher and route matcher combining method + glob

mod glob;
mod route;

pub use glob::{CompiledUrlPattern, PatternScope};
pub use route::{CompiledRoute, MethodMatcher, RouteMatcher};
