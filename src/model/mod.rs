pub mod expression;
pub mod statement;
pub mod scope;
pub mod scoped;

pub use expression::{BinaryOperator, CallArgument, Literal, Location, MethodCall, NativeExpression, StringLiteralId, UnaryOperator, Variable};
pub use statement::{Assignment, AssignmentOperation, Statement};
pub use scope::{FieldDescriptor, Scope, ScopeId, ScopeTable, ScopeType};
pub use scoped::{ScopedExpression, ScopedStatement, ScopedVariable};
