//! Rule evaluation
//!
//! Rules are loaded once per run into an immutable [`RuleSet`] and evaluated
//! per service by the [`Engine`]. Evaluation never fails as a whole: rules
//! whose condition or templates cannot be evaluated are dropped and reported
//! in the [`Evaluation`] trace.

pub mod condition;
pub mod engine;
pub mod expr;
pub mod loader;
pub mod matcher;
pub mod resolver;
pub mod template;

pub use condition::{Comparison, Condition, ConditionError};
pub use engine::{apply, DropReason, DroppedRule, Engine, Evaluation};
pub use expr::{ArithmeticEvaluator, ExprError, ExpressionEvaluator};
pub use loader::{embedded_version, load_dir, load_embedded, RuleLoadError, RuleSet};
pub use template::{interpolate, InterpolationError};
