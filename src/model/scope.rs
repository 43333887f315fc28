use crate::model::expression::Variable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeType {
    Global,
    Parameter,
    Local
}

/// A declared variable. Arrays carry their length.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldDescriptor {
    pub variable: Variable,
    pub length: Option<i64>
}

impl FieldDescriptor {
    pub fn scalar(variable: Variable) -> FieldDescriptor {
        FieldDescriptor {
            variable,
            length: None
        }
    }

    pub fn array(variable: Variable, length: i64) -> FieldDescriptor {
        FieldDescriptor {
            variable,
            length: Some(length)
        }
    }

    pub fn is_array(&self) -> bool {
        self.length.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub variables: Vec<FieldDescriptor>,
    pub parent: Option<ScopeId>,
    pub scope_type: ScopeType
}

/// Owns every scope visible from one procedure. The first scope is the global one.
#[derive(Debug, Clone)]
pub struct ScopeTable {
    scopes: Vec<Scope>
}

impl ScopeTable {
    pub fn new(globals: Vec<FieldDescriptor>) -> ScopeTable {
        ScopeTable {
            scopes: vec![
                Scope {
                    variables: globals,
                    parent: None,
                    scope_type: ScopeType::Global
                }
            ]
        }
    }

    pub fn global_scope(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn add_scope(&mut self, parent: ScopeId, scope_type: ScopeType, variables: Vec<FieldDescriptor>) -> ScopeId {
        self.scopes.push(Scope {
            variables,
            parent: Some(parent),
            scope_type
        });

        ScopeId(self.scopes.len() - 1)
    }

    pub fn scope_ids(&self) -> impl Iterator<Item=ScopeId> {
        (0..self.scopes.len()).map(ScopeId)
    }

    pub fn scope(&self, scope: ScopeId) -> &Scope {
        &self.scopes[scope.0]
    }

    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.scopes[scope.0].parent
    }

    pub fn scope_type(&self, scope: ScopeId) -> ScopeType {
        self.scopes[scope.0].scope_type
    }

    pub fn is_global(&self, scope: ScopeId) -> bool {
        self.scope_type(scope) == ScopeType::Global
    }

    pub fn variables(&self, scope: ScopeId) -> &[FieldDescriptor] {
        &self.scopes[scope.0].variables
    }

    pub fn declares(&self, scope: ScopeId, variable: &Variable) -> bool {
        self.field_in(scope, variable).is_some()
    }

    fn field_in(&self, scope: ScopeId, variable: &Variable) -> Option<&FieldDescriptor> {
        self.scopes[scope.0].variables.iter().find(|field| &field.variable == variable)
    }

    /// The scope declaring `variable`, searching from `scope` outwards.
    pub fn lookup(&self, scope: ScopeId, variable: &Variable) -> Option<ScopeId> {
        let mut current = Some(scope);
        while let Some(scope) = current {
            if self.declares(scope, variable) {
                return Some(scope);
            }

            current = self.parent(scope);
        }

        None
    }

    pub fn field(&self, scope: ScopeId, variable: &Variable) -> Option<&FieldDescriptor> {
        self.lookup(scope, variable).and_then(|declaring| self.field_in(declaring, variable))
    }

    /// The scope itself followed by its enclosing scopes.
    pub fn chain(&self, scope: ScopeId) -> Vec<ScopeId> {
        let mut chain = vec![scope];
        let mut current = scope;
        while let Some(parent) = self.parent(current) {
            chain.push(parent);
            current = parent;
        }

        chain
    }

    /// Declares a compiler temporary in an existing scope.
    pub fn add_temporary(&mut self, scope: ScopeId, variable: Variable) {
        if self.declares(scope, &variable) {
            panic!("temporary {} is already declared in scope {:?}", variable, scope);
        }

        self.scopes[scope.0].variables.push(FieldDescriptor::scalar(variable));
    }

    /// The innermost scope that is neither global nor a parameter scope.
    pub fn innermost_local(&self, scope: ScopeId) -> Option<ScopeId> {
        self.chain(scope)
            .into_iter()
            .find(|scope| self.scope_type(*scope) == ScopeType::Local)
    }
}

#[test]
fn test_lookup_climbs1() {
    let mut scopes = ScopeTable::new(vec![FieldDescriptor::scalar(Variable::new("g"))]);
    let parameters = scopes.add_scope(scopes.global_scope(), ScopeType::Parameter, vec![FieldDescriptor::scalar(Variable::new("p"))]);
    let local = scopes.add_scope(parameters, ScopeType::Local, vec![FieldDescriptor::array(Variable::new("a"), 10)]);
    let inner = scopes.add_scope(local, ScopeType::Local, vec![FieldDescriptor::scalar(Variable::new("g"))]);

    assert_eq!(Some(inner), scopes.lookup(inner, &Variable::new("g")));
    assert_eq!(Some(scopes.global_scope()), scopes.lookup(local, &Variable::new("g")));
    assert_eq!(Some(parameters), scopes.lookup(inner, &Variable::new("p")));
    assert_eq!(None, scopes.lookup(inner, &Variable::new("missing")));
    assert!(scopes.field(inner, &Variable::new("a")).map(|field| field.is_array()).unwrap_or(false));
    assert_eq!(vec![inner, local, parameters, scopes.global_scope()], scopes.chain(inner));
}

#[test]
#[should_panic]
fn test_duplicate_temporary1() {
    let mut scopes = ScopeTable::new(vec![]);
    let global = scopes.global_scope();
    scopes.add_temporary(global, Variable::compiler("t0"));
    scopes.add_temporary(global, Variable::compiler("t0"));
}
