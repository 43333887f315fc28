use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::model::expression::{Location, NativeExpression, Variable};
use crate::model::scope::{ScopeId, ScopeTable};
use crate::model::statement::Statement;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopedStatement {
    pub statement: Statement,
    pub scope: ScopeId
}

impl ScopedStatement {
    pub fn new(statement: Statement, scope: ScopeId) -> ScopedStatement {
        ScopedStatement {
            statement,
            scope
        }
    }

    /// The variables whose values the statement reads.
    pub fn reads(&self, scopes: &ScopeTable) -> BTreeSet<ScopedVariable> {
        let mut locations = Vec::new();
        if let Some(expression) = self.statement.expression() {
            locations.extend(expression.locations());
        }

        if let Some(assignment) = self.statement.assignment() {
            if let Some(index) = assignment.location.index() {
                locations.extend(index.locations());
            }

            if assignment.operation.reads_target() {
                locations.push(&assignment.location);
            }
        }

        locations
            .into_iter()
            .map(|location| ScopedVariable::resolve(location.variable(), self.scope, scopes))
            .collect()
    }

    /// The variables the statement may write. A call may write every global.
    pub fn redefined(&self, scopes: &ScopeTable) -> BTreeSet<ScopedVariable> {
        let mut redefined = BTreeSet::new();
        if let Some(assignment) = self.statement.assignment() {
            redefined.insert(ScopedVariable::resolve(assignment.location.variable(), self.scope, scopes));
        }

        if self.statement.contains_method_call() {
            redefined.extend(ScopedVariable::globals(scopes));
        }

        redefined
    }

    /// The scalar variable the statement assigns, if it is a scalar assignment.
    pub fn assigned_scalar(&self, scopes: &ScopeTable) -> Option<ScopedVariable> {
        self.statement.assignment()
            .filter(|assignment| assignment.location.is_scalar())
            .map(|assignment| ScopedVariable::resolve(assignment.location.variable(), self.scope, scopes))
    }

    pub fn with_statement(&self, statement: Statement) -> ScopedStatement {
        ScopedStatement::new(statement, self.scope)
    }
}

impl fmt::Display for ScopedStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @s{}", self.statement, self.scope.0)
    }
}

/// A variable together with the scope that declares it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopedVariable {
    pub variable: Variable,
    pub scope: ScopeId
}

impl ScopedVariable {
    pub fn new(variable: Variable, scope: ScopeId) -> ScopedVariable {
        ScopedVariable {
            variable,
            scope
        }
    }

    /// Resolves a variable read or written in `scope` to its declaration.
    pub fn resolve(variable: &Variable, scope: ScopeId, scopes: &ScopeTable) -> ScopedVariable {
        match scopes.lookup(scope, variable) {
            Some(declaring) => ScopedVariable::new(variable.clone(), declaring),
            None => panic!("variable {} is not declared in scope {:?} or any enclosing scope", variable, scope)
        }
    }

    pub fn of_location(location: &Location, scope: ScopeId, scopes: &ScopeTable) -> ScopedVariable {
        ScopedVariable::resolve(location.variable(), scope, scopes)
    }

    pub fn globals(scopes: &ScopeTable) -> Vec<ScopedVariable> {
        let global = scopes.global_scope();
        scopes.variables(global)
            .iter()
            .map(|field| ScopedVariable::new(field.variable.clone(), global))
            .collect()
    }

    pub fn is_global(&self, scopes: &ScopeTable) -> bool {
        scopes.is_global(self.scope)
    }

    pub fn is_array(&self, scopes: &ScopeTable) -> bool {
        scopes.field(self.scope, &self.variable).map(|field| field.is_array()).unwrap_or(false)
    }
}

impl fmt::Display for ScopedVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@s{}", self.variable, self.scope.0)
    }
}

/// An expression in the innermost scope declaring any variable it reads. Expressions
/// reading no variable belong to the global scope. Compared by expression and scope.
#[derive(Debug, Clone)]
pub struct ScopedExpression {
    pub expression: NativeExpression,
    pub scope: ScopeId,
    variables: BTreeSet<ScopedVariable>
}

impl ScopedExpression {
    pub fn new(expression: &NativeExpression, scope: ScopeId, scopes: &ScopeTable) -> ScopedExpression {
        let variables = expression.locations()
            .into_iter()
            .map(|location| ScopedVariable::of_location(location, scope, scopes))
            .collect::<BTreeSet<_>>();

        let expression_scope = scopes.chain(scope)
            .into_iter()
            .find(|candidate| variables.iter().any(|variable| variable.scope == *candidate))
            .unwrap_or_else(|| scopes.global_scope());

        ScopedExpression {
            expression: expression.clone(),
            scope: expression_scope,
            variables
        }
    }

    pub fn uses(&self, variable: &ScopedVariable) -> bool {
        self.variables.contains(variable)
    }

    pub fn variables(&self) -> &BTreeSet<ScopedVariable> {
        &self.variables
    }
}

impl PartialEq for ScopedExpression {
    fn eq(&self, other: &ScopedExpression) -> bool {
        self.expression == other.expression && self.scope == other.scope
    }
}

impl Eq for ScopedExpression {}

impl Hash for ScopedExpression {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.expression.hash(state);
        self.scope.hash(state);
    }
}

impl fmt::Display for ScopedExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @s{}", self.expression, self.scope.0)
    }
}

#[cfg(test)]
fn test_scopes() -> (ScopeTable, ScopeId, ScopeId) {
    use crate::model::scope::{FieldDescriptor, ScopeType};

    let mut scopes = ScopeTable::new(vec![FieldDescriptor::scalar(Variable::new("g"))]);
    let parameters = scopes.add_scope(scopes.global_scope(), ScopeType::Parameter, vec![FieldDescriptor::scalar(Variable::new("a"))]);
    let local = scopes.add_scope(parameters, ScopeType::Local, vec![
        FieldDescriptor::scalar(Variable::new("b")),
        FieldDescriptor::array(Variable::new("arr"), 4)
    ]);
    (scopes, parameters, local)
}

#[test]
fn test_expression_scope1() {
    use crate::model::expression::BinaryOperator;

    let (scopes, parameters, local) = test_scopes();
    let a_plus_g = NativeExpression::binary(BinaryOperator::Add, NativeExpression::scalar("a"), NativeExpression::scalar("g"));
    let a_plus_b = NativeExpression::binary(BinaryOperator::Add, NativeExpression::scalar("a"), NativeExpression::scalar("b"));
    let constant = NativeExpression::binary(BinaryOperator::Add, NativeExpression::int(1), NativeExpression::int(2));

    assert_eq!(parameters, ScopedExpression::new(&a_plus_g, local, &scopes).scope);
    assert_eq!(local, ScopedExpression::new(&a_plus_b, local, &scopes).scope);
    assert_eq!(scopes.global_scope(), ScopedExpression::new(&constant, local, &scopes).scope);
    assert_eq!(ScopedExpression::new(&a_plus_g, local, &scopes), ScopedExpression::new(&a_plus_g, parameters, &scopes));
}

#[test]
fn test_reads_and_redefinitions1() {
    use crate::model::statement::{Assignment, AssignmentOperation};

    let (scopes, _, local) = test_scopes();
    let statement = ScopedStatement::new(
        Statement::Assignment(Assignment::new(
            Location::array("arr", NativeExpression::scalar("b")),
            AssignmentOperation::PlusEquals,
            NativeExpression::call("f", vec![NativeExpression::scalar("a")])
        )),
        local
    );

    let reads = statement.reads(&scopes).into_iter().map(|variable| variable.variable.name).collect::<Vec<_>>();
    assert_eq!(vec!["a", "arr", "b"], reads);

    let redefined = statement.redefined(&scopes);
    assert!(redefined.contains(&ScopedVariable::new(Variable::new("arr"), local)));
    assert!(redefined.contains(&ScopedVariable::new(Variable::new("g"), scopes.global_scope())));
    assert_eq!(None, statement.assigned_scalar(&scopes));
}

#[test]
#[should_panic]
fn test_undeclared_variable1() {
    let (scopes, _, local) = test_scopes();
    ScopedVariable::resolve(&Variable::new("nope"), local, &scopes);
}
