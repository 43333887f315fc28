use std::fmt;

use crate::model::expression::{Location, MethodCall, NativeExpression};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssignmentOperation {
    SetEquals,
    PlusEquals,
    MinusEquals
}

impl AssignmentOperation {
    pub fn symbol(&self) -> &'static str {
        match self {
            AssignmentOperation::SetEquals => "=",
            AssignmentOperation::PlusEquals => "+=",
            AssignmentOperation::MinusEquals => "-="
        }
    }

    /// Whether the previous value of the target is read.
    pub fn reads_target(&self) -> bool {
        match self {
            AssignmentOperation::SetEquals => false,
            AssignmentOperation::PlusEquals | AssignmentOperation::MinusEquals => true
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Assignment {
    pub location: Location,
    pub operation: AssignmentOperation,
    pub expression: NativeExpression,
    pub from_compiler: bool
}

impl Assignment {
    pub fn new(location: Location, operation: AssignmentOperation, expression: NativeExpression) -> Assignment {
        Assignment {
            location,
            operation,
            expression,
            from_compiler: false
        }
    }

    pub fn set(location: Location, expression: NativeExpression) -> Assignment {
        Assignment::new(location, AssignmentOperation::SetEquals, expression)
    }

    pub fn compiler(location: Location, expression: NativeExpression) -> Assignment {
        Assignment {
            location,
            operation: AssignmentOperation::SetEquals,
            expression,
            from_compiler: true
        }
    }

    /// `x = <literal>` on a scalar target.
    pub fn is_constant_scalar_assignment(&self) -> bool {
        self.operation == AssignmentOperation::SetEquals
            && self.location.is_scalar()
            && self.expression.literal().is_some()
    }
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.location, self.operation.symbol(), self.expression)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Statement {
    Assignment(Assignment),
    /// Evaluates a condition and sets the flags read by the following branch.
    Compare(NativeExpression),
    /// A call evaluated for its side effects. Always holds [`NativeExpression::Call`].
    MethodCall(NativeExpression),
    Return(Option<NativeExpression>),
    BranchSource
}

impl Statement {
    pub fn call(call: MethodCall) -> Statement {
        Statement::MethodCall(NativeExpression::Call(call))
    }

    /// The single expression held by the statement, if any.
    pub fn expression(&self) -> Option<&NativeExpression> {
        match self {
            Statement::Assignment(assignment) => Some(&assignment.expression),
            Statement::Compare(expression) => Some(expression),
            Statement::MethodCall(expression) => Some(expression),
            Statement::Return(expression) => expression.as_ref(),
            Statement::BranchSource => None
        }
    }

    /// The same statement evaluating `expression` instead.
    pub fn with_expression(&self, expression: NativeExpression) -> Statement {
        match self {
            Statement::Assignment(assignment) => {
                Statement::Assignment(Assignment { expression, ..assignment.clone() })
            }
            Statement::Compare(_) => Statement::Compare(expression),
            Statement::MethodCall(_) => {
                match expression {
                    NativeExpression::Call(_) => Statement::MethodCall(expression),
                    _ => panic!("a call statement can not evaluate '{}'", expression)
                }
            }
            Statement::Return(Some(_)) => Statement::Return(Some(expression)),
            Statement::Return(None) | Statement::BranchSource => {
                panic!("statement '{}' holds no expression to replace", self)
            }
        }
    }

    pub fn assignment(&self) -> Option<&Assignment> {
        match self {
            Statement::Assignment(assignment) => Some(assignment),
            _ => None
        }
    }

    pub fn contains_method_call(&self) -> bool {
        let in_target = self.assignment()
            .and_then(|assignment| assignment.location.index())
            .map(|index| index.contains_method_call())
            .unwrap_or(false);

        in_target || self.expression().map(|expression| expression.contains_method_call()).unwrap_or(false)
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Assignment(assignment) => write!(f, "{}", assignment),
            Statement::Compare(expression) => write!(f, "cmp {}", expression),
            Statement::MethodCall(expression) => write!(f, "{}", expression),
            Statement::Return(Some(expression)) => write!(f, "return {}", expression),
            Statement::Return(None) => write!(f, "return"),
            Statement::BranchSource => write!(f, "branch")
        }
    }
}

#[test]
fn test_with_expression1() {
    let statement = Statement::Assignment(Assignment::set(Location::scalar("x"), NativeExpression::int(1)));
    let replaced = statement.with_expression(NativeExpression::int(2));
    assert_eq!("x = 2", replaced.to_string());

    let statement = Statement::Return(Some(NativeExpression::scalar("y")));
    assert_eq!("return 3", statement.with_expression(NativeExpression::int(3)).to_string());
}

#[test]
#[should_panic]
fn test_with_expression_branch_source1() {
    Statement::BranchSource.with_expression(NativeExpression::int(1));
}

#[test]
fn test_call_in_array_index1() {
    let statement = Statement::Assignment(Assignment::set(
        Location::array("a", NativeExpression::call("f", vec![])),
        NativeExpression::int(1)
    ));

    assert!(statement.contains_method_call());
    assert!(!statement.expression().map(|expression| expression.contains_method_call()).unwrap_or(false));
}
